//! Closed set of attributes a `SearchResultAd` entity may carry.

pub const PRODUCT_TYPE: &str = "Product";
pub const SEARCH_RESULT_AD_TYPE: &str = "SearchResultAd";

pub const CONTEXT_PROPERTY: &str = "@context";
pub const TYPE_PROPERTY: &str = "@type";
pub const CREATIVES_PROPERTY: &str = "creatives";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum AdAttribute {
    PlacementId,
    CreativeInstanceId,
    CreativeSetId,
    CampaignId,
    AdvertiserId,
    LandingPage,
    HeadlineText,
    Description,
    RewardsValue,
    ConversionType,
    ConversionUrlPattern,
    ConversionAdvertiserPublicKey,
    ConversionObservationWindow,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueShape {
    /// Exactly one string.
    Text,
    /// Exactly one string holding a finite decimal number.
    Decimal,
    /// Exactly one integer in 32-bit range.
    Integer,
}

impl AdAttribute {
    pub const ALL: [AdAttribute; 13] = [
        AdAttribute::PlacementId,
        AdAttribute::CreativeInstanceId,
        AdAttribute::CreativeSetId,
        AdAttribute::CampaignId,
        AdAttribute::AdvertiserId,
        AdAttribute::LandingPage,
        AdAttribute::HeadlineText,
        AdAttribute::Description,
        AdAttribute::RewardsValue,
        AdAttribute::ConversionType,
        AdAttribute::ConversionUrlPattern,
        AdAttribute::ConversionAdvertiserPublicKey,
        AdAttribute::ConversionObservationWindow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AdAttribute::PlacementId => "data-placement-id",
            AdAttribute::CreativeInstanceId => "data-creative-instance-id",
            AdAttribute::CreativeSetId => "data-creative-set-id",
            AdAttribute::CampaignId => "data-campaign-id",
            AdAttribute::AdvertiserId => "data-advertiser-id",
            AdAttribute::LandingPage => "data-landing-page",
            AdAttribute::HeadlineText => "data-headline-text",
            AdAttribute::Description => "data-description",
            AdAttribute::RewardsValue => "data-rewards-value",
            AdAttribute::ConversionType => "data-conversion-type-value",
            AdAttribute::ConversionUrlPattern => "data-conversion-url-pattern-value",
            AdAttribute::ConversionAdvertiserPublicKey => {
                "data-conversion-advertiser-public-key-value"
            }
            AdAttribute::ConversionObservationWindow => "data-conversion-observation-window-value",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attribute| attribute.name() == name)
    }

    pub fn shape(self) -> ValueShape {
        match self {
            AdAttribute::RewardsValue => ValueShape::Decimal,
            AdAttribute::ConversionObservationWindow => ValueShape::Integer,
            _ => ValueShape::Text,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for attribute in AdAttribute::ALL {
            assert_eq!(AdAttribute::from_name(attribute.name()), Some(attribute));
        }
        assert_eq!(AdAttribute::from_name("data-unknown"), None);
        assert_eq!(AdAttribute::from_name("@type"), None);
    }

    #[test]
    fn indices_follow_declaration_order() {
        for (idx, attribute) in AdAttribute::ALL.into_iter().enumerate() {
            assert_eq!(attribute.index(), idx);
        }
    }
}
