use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PolicySnapshot {
    pub rev: u64,
    pub ads: AdsPolicy,
    pub features: FeatureFlags,
    pub hosts: HostPolicy,
    pub ingest: IngestPolicy,
    pub dispatch: DispatchPolicy,
    pub provenance: HashMap<String, PolicyProvenance>,
}

/// The user-level "ads enabled" input. Consent is decided elsewhere.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AdsPolicy {
    pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct FeatureFlags {
    pub search_result_ad_confirmation_events: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct HostPolicy {
    pub allowed: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct IngestPolicy {
    pub fetch_timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct DispatchPolicy {
    pub report_timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyProvenance {
    pub path: String,
    pub source: PolicySource,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicySource {
    Builtin,
    File,
    Env,
    Cli,
    RuntimeOverride,
}

/// Provenance-free view handed to the pipeline.
#[derive(Clone, Debug)]
pub struct PolicyView {
    pub rev: u64,
    pub ads: AdsPolicy,
    pub features: FeatureFlags,
    pub hosts: HostPolicy,
    pub ingest: IngestPolicy,
    pub dispatch: DispatchPolicy,
}

impl From<PolicySnapshot> for PolicyView {
    fn from(snapshot: PolicySnapshot) -> Self {
        Self {
            rev: snapshot.rev,
            ads: snapshot.ads,
            features: snapshot.features,
            hosts: snapshot.hosts,
            ingest: snapshot.ingest,
            dispatch: snapshot.dispatch,
        }
    }
}

impl PolicyView {
    pub fn is_reporting_enabled(&self) -> bool {
        self.ads.enabled
    }

    /// Ingestion runs only when ads are on and the confirmation events
    /// feature is enabled.
    pub fn ingestion_enabled(&self) -> bool {
        self.ads.enabled && self.features.search_result_ad_confirmation_events
    }

    /// `https` and an exact host match against the allow list.
    pub fn is_allowed_host(&self, url: &Url) -> bool {
        if url.scheme() != "https" {
            return false;
        }
        match url.host_str() {
            Some(host) => self
                .hosts
                .allowed
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(host)),
            None => false,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.ingest.fetch_timeout_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch.report_timeout_ms)
    }
}

impl PolicySnapshot {
    pub fn set_provenance(&mut self, path: &str, source: PolicySource) {
        self.provenance.insert(
            path.to_string(),
            PolicyProvenance {
                path: path.to_string(),
                source,
            },
        );
    }

    pub fn view(&self) -> PolicyView {
        PolicyView::from(self.clone())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeOverrideSpec {
    pub path: String,
    pub value: serde_json::Value,
    pub owner: String,
    pub reason: String,
    pub ttl_seconds: u64,
}
