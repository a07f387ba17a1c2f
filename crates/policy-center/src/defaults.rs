use crate::model::{
    AdsPolicy, DispatchPolicy, FeatureFlags, HostPolicy, IngestPolicy, PolicySnapshot,
};

pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "search.brave.com",
    "search.brave.software",
    "search.bravesoftware.com",
    "safesearch.brave.com",
    "safesearch.brave.software",
    "safesearch.bravesoftware.com",
];

pub fn default_snapshot() -> PolicySnapshot {
    PolicySnapshot {
        rev: 1,
        ads: AdsPolicy { enabled: true },
        features: FeatureFlags {
            search_result_ad_confirmation_events: true,
        },
        hosts: HostPolicy {
            allowed: DEFAULT_ALLOWED_HOSTS
                .iter()
                .map(|host| host.to_string())
                .collect(),
        },
        ingest: IngestPolicy {
            fetch_timeout_ms: 10_000,
        },
        dispatch: DispatchPolicy {
            report_timeout_ms: 30_000,
        },
        provenance: Default::default(),
    }
}
