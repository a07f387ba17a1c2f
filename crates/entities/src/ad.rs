use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Ads of one tab session keyed by creative instance id.
pub type TabAdMap = HashMap<String, AdRecord>;

/// A fully validated search result ad. Only the validator builds these from
/// page data, so every field is always populated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdRecord {
    pub placement_id: String,
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    pub advertiser_id: String,
    pub target_url: String,
    pub headline_text: String,
    pub description: String,
    pub value: f64,
    pub conversion: Conversion,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    #[serde(rename = "type")]
    pub conversion_type: String,
    pub url_pattern: String,
    pub advertiser_public_key: String,
    /// Days.
    pub observation_window: i32,
}
