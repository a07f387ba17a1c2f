//! Structured data extracted from a page, as handed over by the metadata
//! transport. Nothing in here is trusted.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WebPage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            entity_type: entity_type.into(),
            properties,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub values: PropertyValues,
}

impl Property {
    pub fn new(name: impl Into<String>, values: PropertyValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PropertyValues::Strings(vec![value.into()]))
    }

    pub fn long(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, PropertyValues::Longs(vec![value]))
    }
}

/// Value list of a property. Exactly one kind per property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValues {
    Bools(Vec<bool>),
    Longs(Vec<i64>),
    Strings(Vec<String>),
    Entities(Vec<Entity>),
}

impl PropertyValues {
    pub fn single_string(&self) -> Option<&str> {
        match self {
            PropertyValues::Strings(values) if values.len() == 1 => Some(values[0].as_str()),
            _ => None,
        }
    }

    pub fn single_long(&self) -> Option<i64> {
        match self {
            PropertyValues::Longs(values) if values.len() == 1 => Some(values[0]),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValues::Bools(_) => "bools",
            PropertyValues::Longs(_) => "longs",
            PropertyValues::Strings(_) => "strings",
            PropertyValues::Entities(_) => "entities",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_tagged_values() {
        let raw = r#"{
            "url": "https://search.brave.com/search?q=shoes",
            "entities": [{
                "type": "Product",
                "properties": [
                    {"name": "@context", "values": {"strings": ["https://schema.org"]}},
                    {"name": "creatives", "values": {"entities": []}}
                ]
            }]
        }"#;
        let page: WebPage = serde_json::from_str(raw).unwrap();

        assert_eq!(page.entities.len(), 1);
        assert_eq!(page.entities[0].entity_type, "Product");
        assert_eq!(
            page.entities[0].properties[0].values.single_string(),
            Some("https://schema.org")
        );
        assert_eq!(page.entities[0].properties[1].values.kind(), "entities");
    }

    #[test]
    fn single_value_accessors_reject_lists() {
        let values = PropertyValues::Strings(vec!["a".into(), "b".into()]);
        assert_eq!(values.single_string(), None);
        assert_eq!(PropertyValues::Longs(vec![]).single_long(), None);
        assert_eq!(PropertyValues::Longs(vec![30]).single_long(), Some(30));
    }
}
