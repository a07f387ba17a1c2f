//! Builders for well-formed search result ad markup.

use crate::attributes::{CONTEXT_PROPERTY, CREATIVES_PROPERTY, PRODUCT_TYPE, SEARCH_RESULT_AD_TYPE};
use crate::document::{Entity, Property, PropertyValues, WebPage};

/// All thirteen attributes with values derived from `creative_instance_id`.
pub fn ad_properties(creative_instance_id: &str) -> Vec<Property> {
    vec![
        Property::string("data-placement-id", format!("placement-{creative_instance_id}")),
        Property::string("data-creative-instance-id", creative_instance_id),
        Property::string("data-creative-set-id", "creative-set-1"),
        Property::string("data-campaign-id", "campaign-1"),
        Property::string("data-advertiser-id", "advertiser-1"),
        Property::string("data-landing-page", "https://advertiser.example/landing"),
        Property::string("data-headline-text", "Headline"),
        Property::string("data-description", "Description"),
        Property::string("data-rewards-value", "0.5"),
        Property::string("data-conversion-type-value", "postview"),
        Property::string("data-conversion-url-pattern-value", "https://advertiser.example/*"),
        Property::string("data-conversion-advertiser-public-key-value", "cHVibGljLWtleQ=="),
        Property::long("data-conversion-observation-window-value", 30),
    ]
}

pub fn ad_entity(creative_instance_id: &str) -> Entity {
    Entity::new(SEARCH_RESULT_AD_TYPE, ad_properties(creative_instance_id))
}

pub fn product_page(creatives: Vec<Entity>) -> WebPage {
    WebPage {
        url: Some("https://search.brave.com/search?q=test".to_string()),
        title: None,
        entities: vec![Entity::new(
            PRODUCT_TYPE,
            vec![
                Property::string(CONTEXT_PROPERTY, "https://schema.org"),
                Property::new(CREATIVES_PROPERTY, PropertyValues::Entities(creatives)),
            ],
        )],
    }
}
