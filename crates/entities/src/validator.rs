use std::collections::BTreeSet;

use tracing::{debug, warn, Level};

use crate::ad::{AdRecord, Conversion, TabAdMap};
use crate::attributes::{
    AdAttribute, ValueShape, CONTEXT_PROPERTY, CREATIVES_PROPERTY, PRODUCT_TYPE,
    SEARCH_RESULT_AD_TYPE, TYPE_PROPERTY,
};
use crate::document::{Entity, PropertyValues, WebPage};
use crate::errors::ValidationError;

/// Extracts search result ads from a page. Malformed markup yields an empty
/// map and a log line; there is no partial result.
pub fn validate(page: &WebPage) -> TabAdMap {
    match parse_web_page(page) {
        Ok(ads) => {
            log_ads(&ads);
            ads
        }
        Err(err) => {
            warn!(error = %err, url = ?page.url, "rejected search result ad markup");
            TabAdMap::new()
        }
    }
}

/// Strict parse behind [`validate`]. `Ok` with an empty map means the page
/// simply carries no ads.
pub fn parse_web_page(page: &WebPage) -> Result<TabAdMap, ValidationError> {
    for entity in page
        .entities
        .iter()
        .filter(|entity| entity.entity_type == PRODUCT_TYPE)
    {
        if let Some(ads) = parse_product(entity)? {
            return Ok(ads);
        }
    }
    Ok(TabAdMap::new())
}

/// `None` when the product has no creatives and the next one should be tried.
fn parse_product(entity: &Entity) -> Result<Option<TabAdMap>, ValidationError> {
    let mut creatives: Option<&PropertyValues> = None;
    for property in &entity.properties {
        match property.name.as_str() {
            CONTEXT_PROPERTY | TYPE_PROPERTY => continue,
            CREATIVES_PROPERTY => {
                if creatives.replace(&property.values).is_some() {
                    return Err(ValidationError::DuplicateCreatives);
                }
            }
            other => return Err(ValidationError::UnexpectedProductProperty(other.to_string())),
        }
    }

    let Some(values) = creatives else {
        return Ok(None);
    };
    let ad_entities = match values {
        PropertyValues::Entities(entities) => entities,
        other => return Err(ValidationError::CreativesNotEntities(other.kind())),
    };
    if ad_entities.is_empty() {
        return Err(ValidationError::EmptyCreatives);
    }

    let mut ads = TabAdMap::with_capacity(ad_entities.len());
    for ad_entity in ad_entities {
        if ad_entity.entity_type != SEARCH_RESULT_AD_TYPE {
            return Err(ValidationError::WrongAdType(ad_entity.entity_type.clone()));
        }
        let ad = parse_ad(ad_entity)?;
        ads.insert(ad.creative_instance_id.clone(), ad);
    }
    Ok(Some(ads))
}

fn parse_ad(entity: &Entity) -> Result<AdRecord, ValidationError> {
    let mut draft = AdDraft::default();
    let mut seen = BTreeSet::new();
    for property in &entity.properties {
        let attribute = AdAttribute::from_name(&property.name)
            .ok_or_else(|| ValidationError::UnknownAttribute(property.name.clone()))?;
        if !seen.insert(attribute) {
            return Err(ValidationError::DuplicateAttribute(attribute.name()));
        }
        let value = read_value(attribute, &property.values)
            .ok_or(ValidationError::InvalidValue(attribute.name()))?;
        draft.set(attribute, value);
    }
    draft.finish()
}

enum AttributeValue {
    Text(String),
    Decimal(f64),
    Integer(i32),
}

fn read_value(attribute: AdAttribute, values: &PropertyValues) -> Option<AttributeValue> {
    match attribute.shape() {
        ValueShape::Text => values
            .single_string()
            .map(|value| AttributeValue::Text(value.to_string())),
        ValueShape::Decimal => values
            .single_string()
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .map(AttributeValue::Decimal),
        ValueShape::Integer => values
            .single_long()
            .and_then(|value| i32::try_from(value).ok())
            .map(AttributeValue::Integer),
    }
}

/// Attribute slots filled while walking one ad entity. Never leaves this
/// module; `finish` turns it into a complete record or an error.
#[derive(Default)]
struct AdDraft {
    placement_id: Option<String>,
    creative_instance_id: Option<String>,
    creative_set_id: Option<String>,
    campaign_id: Option<String>,
    advertiser_id: Option<String>,
    target_url: Option<String>,
    headline_text: Option<String>,
    description: Option<String>,
    value: Option<f64>,
    conversion_type: Option<String>,
    conversion_url_pattern: Option<String>,
    conversion_public_key: Option<String>,
    conversion_observation_window: Option<i32>,
}

impl AdDraft {
    fn set(&mut self, attribute: AdAttribute, value: AttributeValue) {
        match (attribute, value) {
            (AdAttribute::RewardsValue, AttributeValue::Decimal(v)) => self.value = Some(v),
            (AdAttribute::ConversionObservationWindow, AttributeValue::Integer(v)) => {
                self.conversion_observation_window = Some(v)
            }
            (attribute, AttributeValue::Text(v)) => {
                let slot = match attribute {
                    AdAttribute::PlacementId => &mut self.placement_id,
                    AdAttribute::CreativeInstanceId => &mut self.creative_instance_id,
                    AdAttribute::CreativeSetId => &mut self.creative_set_id,
                    AdAttribute::CampaignId => &mut self.campaign_id,
                    AdAttribute::AdvertiserId => &mut self.advertiser_id,
                    AdAttribute::LandingPage => &mut self.target_url,
                    AdAttribute::HeadlineText => &mut self.headline_text,
                    AdAttribute::Description => &mut self.description,
                    AdAttribute::ConversionType => &mut self.conversion_type,
                    AdAttribute::ConversionUrlPattern => &mut self.conversion_url_pattern,
                    AdAttribute::ConversionAdvertiserPublicKey => {
                        &mut self.conversion_public_key
                    }
                    AdAttribute::RewardsValue | AdAttribute::ConversionObservationWindow => return,
                };
                *slot = Some(v);
            }
            _ => {}
        }
    }

    fn missing(&self) -> Vec<&'static str> {
        let present = [
            self.placement_id.is_some(),
            self.creative_instance_id.is_some(),
            self.creative_set_id.is_some(),
            self.campaign_id.is_some(),
            self.advertiser_id.is_some(),
            self.target_url.is_some(),
            self.headline_text.is_some(),
            self.description.is_some(),
            self.value.is_some(),
            self.conversion_type.is_some(),
            self.conversion_url_pattern.is_some(),
            self.conversion_public_key.is_some(),
            self.conversion_observation_window.is_some(),
        ];
        AdAttribute::ALL
            .into_iter()
            .filter(|attribute| !present[attribute.index()])
            .map(AdAttribute::name)
            .collect()
    }

    fn finish(self) -> Result<AdRecord, ValidationError> {
        let missing = self.missing();
        match self {
            AdDraft {
                placement_id: Some(placement_id),
                creative_instance_id: Some(creative_instance_id),
                creative_set_id: Some(creative_set_id),
                campaign_id: Some(campaign_id),
                advertiser_id: Some(advertiser_id),
                target_url: Some(target_url),
                headline_text: Some(headline_text),
                description: Some(description),
                value: Some(value),
                conversion_type: Some(conversion_type),
                conversion_url_pattern: Some(url_pattern),
                conversion_public_key: Some(advertiser_public_key),
                conversion_observation_window: Some(observation_window),
            } => Ok(AdRecord {
                placement_id,
                creative_instance_id,
                creative_set_id,
                campaign_id,
                advertiser_id,
                target_url,
                headline_text,
                description,
                value,
                conversion: Conversion {
                    conversion_type,
                    url_pattern,
                    advertiser_public_key,
                    observation_window,
                },
            }),
            _ => Err(ValidationError::MissingAttributes(missing)),
        }
    }
}

fn log_ads(ads: &TabAdMap) {
    if !tracing::enabled!(Level::DEBUG) {
        return;
    }
    if ads.is_empty() {
        debug!("no search result ad found");
        return;
    }
    for ad in ads.values() {
        debug!(
            placement_id = %ad.placement_id,
            creative_instance_id = %ad.creative_instance_id,
            creative_set_id = %ad.creative_set_id,
            campaign_id = %ad.campaign_id,
            advertiser_id = %ad.advertiser_id,
            target_url = %ad.target_url,
            headline_text = %ad.headline_text,
            description = %ad.description,
            value = ad.value,
            conversion_type = %ad.conversion.conversion_type,
            conversion_url_pattern = %ad.conversion.url_pattern,
            conversion_public_key = %ad.conversion.advertiser_public_key,
            conversion_observation_window = ad.conversion.observation_window,
            "parsed search result ad"
        );
    }
}
