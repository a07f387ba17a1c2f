use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::errors::PolicyError;
use crate::loader::{load_snapshot_with_options, LoadOptions};
use crate::model::{PolicySnapshot, PolicySource, RuntimeOverrideSpec};
use crate::override_store::RuntimeOverrideStore;

#[async_trait]
pub trait PolicyCenter: Send + Sync {
    async fn snapshot(&self) -> Arc<PolicySnapshot>;
    async fn reload(&self) -> Result<(), PolicyError>;
    async fn apply_override(&self, override_spec: RuntimeOverrideSpec) -> Result<(), PolicyError>;
    async fn clear_override(&self, path: &str) -> Result<bool, PolicyError>;
    fn subscribe(&self) -> watch::Receiver<Arc<PolicySnapshot>>;
}

struct PolicyState {
    base: PolicySnapshot,
    snapshot: PolicySnapshot,
    overrides: RuntimeOverrideStore,
    rev_counter: u64,
}

impl PolicyState {
    fn new(base: PolicySnapshot) -> Self {
        let rev_counter = base.rev;
        Self {
            base: base.clone(),
            snapshot: base,
            overrides: RuntimeOverrideStore::default(),
            rev_counter,
        }
    }

    /// Rebuilds the live snapshot from `base` plus every unexpired override
    /// and bumps the revision.
    fn recompute(&mut self) -> Result<Arc<PolicySnapshot>, PolicyError> {
        let mut next = self.base.clone();
        for (path, value) in self.overrides.active_entries() {
            apply_override_to_snapshot(&mut next, &path, &value, PolicySource::RuntimeOverride)?;
        }
        self.rev_counter = self.rev_counter.saturating_add(1);
        next.rev = self.rev_counter;
        self.snapshot = next;
        Ok(Arc::new(self.snapshot.clone()))
    }
}

pub struct InMemoryPolicyCenter {
    state: Arc<Mutex<PolicyState>>,
    watch_tx: watch::Sender<Arc<PolicySnapshot>>,
    source: Option<LoadOptions>,
}

impl InMemoryPolicyCenter {
    pub fn new(snapshot: PolicySnapshot) -> Self {
        Self::build(snapshot, None)
    }

    /// Loads the initial snapshot from `options`; `reload` re-reads the same
    /// sources.
    pub fn from_options(options: LoadOptions) -> Result<Self, PolicyError> {
        let snapshot = load_snapshot_with_options(&options)?;
        Ok(Self::build(snapshot, Some(options)))
    }

    fn build(snapshot: PolicySnapshot, source: Option<LoadOptions>) -> Self {
        let state = PolicyState::new(snapshot);
        let (watch_tx, _watch_rx) = watch::channel(Arc::new(state.snapshot.clone()));
        Self {
            state: Arc::new(Mutex::new(state)),
            watch_tx,
            source,
        }
    }

    fn publish(&self, snapshot: Arc<PolicySnapshot>) {
        // send_replace stores the value even when no receiver is attached.
        self.watch_tx.send_replace(snapshot);
    }
}

#[async_trait]
impl PolicyCenter for InMemoryPolicyCenter {
    async fn snapshot(&self) -> Arc<PolicySnapshot> {
        let guard = self.state.lock().await;
        Arc::new(guard.snapshot.clone())
    }

    async fn reload(&self) -> Result<(), PolicyError> {
        let options = self
            .source
            .as_ref()
            .ok_or_else(|| PolicyError::ReloadUnavailable("center was built from a fixed snapshot".into()))?;
        let base = load_snapshot_with_options(options)?;
        let mut guard = self.state.lock().await;
        guard.base = base;
        let snapshot = guard.recompute()?;
        drop(guard);
        info!(rev = snapshot.rev, "policy reloaded");
        self.publish(snapshot);
        Ok(())
    }

    async fn apply_override(&self, override_spec: RuntimeOverrideSpec) -> Result<(), PolicyError> {
        let RuntimeOverrideSpec {
            path,
            value,
            owner,
            reason,
            ttl_seconds,
        } = override_spec;
        let ttl = (ttl_seconds > 0).then(|| Duration::from_secs(ttl_seconds));

        // Reject bad paths and values before they reach the store.
        let mut probe = PolicySnapshot::default();
        apply_override_to_snapshot(&mut probe, &path, &value, PolicySource::RuntimeOverride)?;

        let mut guard = self.state.lock().await;
        info!(%path, %owner, %reason, ?ttl, "applying policy override");
        guard
            .overrides
            .insert(path.clone(), RuntimeOverrideStore::entry(value, owner, reason, ttl));
        let snapshot = guard.recompute()?;
        drop(guard);
        self.publish(snapshot);

        if let Some(ttl) = ttl {
            let state = Arc::clone(&self.state);
            let watch_tx = self.watch_tx.clone();
            tokio::spawn(async move {
                sleep(ttl).await;
                let mut guard = state.lock().await;
                if !guard.overrides.expire(&path) {
                    return;
                }
                match guard.recompute() {
                    Ok(snapshot) => {
                        drop(guard);
                        watch_tx.send_replace(snapshot);
                    }
                    Err(err) => warn!(%path, "policy override expiry recompute failed: {err}"),
                }
            });
        }

        Ok(())
    }

    async fn clear_override(&self, path: &str) -> Result<bool, PolicyError> {
        let mut guard = self.state.lock().await;
        if guard.overrides.remove(path).is_none() {
            return Ok(false);
        }
        let snapshot = guard.recompute()?;
        drop(guard);
        self.publish(snapshot);
        Ok(true)
    }

    fn subscribe(&self) -> watch::Receiver<Arc<PolicySnapshot>> {
        self.watch_tx.subscribe()
    }
}

pub(crate) fn apply_override_to_snapshot(
    snapshot: &mut PolicySnapshot,
    path: &str,
    value: &Value,
    source: PolicySource,
) -> Result<(), PolicyError> {
    let changed = match path {
        "ads.enabled" => merge(&mut snapshot.ads.enabled, to_bool(value)?),
        "features.search_result_ad_confirmation_events" => merge(
            &mut snapshot.features.search_result_ad_confirmation_events,
            to_bool(value)?,
        ),
        "hosts.allowed" => merge(&mut snapshot.hosts.allowed, to_host_list(value)?),
        "ingest.fetch_timeout_ms" => merge(
            &mut snapshot.ingest.fetch_timeout_ms,
            to_timeout_ms(value)?,
        ),
        "dispatch.report_timeout_ms" => merge(
            &mut snapshot.dispatch.report_timeout_ms,
            to_timeout_ms(value)?,
        ),
        path => return Err(PolicyError::UnsupportedPath(path.to_string())),
    };
    if changed {
        snapshot.set_provenance(path, source);
    }
    Ok(())
}

fn merge<T: PartialEq>(target: &mut T, candidate: T) -> bool {
    if *target == candidate {
        return false;
    }
    *target = candidate;
    true
}

fn to_bool(value: &Value) -> Result<bool, PolicyError> {
    value
        .as_bool()
        .ok_or_else(|| PolicyError::InvalidValue(format!("expected bool, got {value}")))
}

fn to_timeout_ms(value: &Value) -> Result<u64, PolicyError> {
    match value.as_u64() {
        Some(0) => Err(PolicyError::InvalidValue("timeout must be positive".into())),
        Some(ms) => Ok(ms),
        None => Err(PolicyError::InvalidValue(format!(
            "expected positive integer, got {value}"
        ))),
    }
}

/// Accepts a list of strings or one string with `,` or `|` between hosts.
fn to_host_list(value: &Value) -> Result<Vec<String>, PolicyError> {
    let hosts: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| PolicyError::InvalidValue(format!("expected host, got {item}")))
            })
            .collect::<Result<_, _>>()?,
        Value::String(raw) => raw
            .split([',', '|'])
            .map(str::to_string)
            .collect(),
        Value::Null => Vec::new(),
        other => {
            return Err(PolicyError::InvalidValue(format!(
                "expected host list, got {other}"
            )))
        }
    };
    Ok(hosts
        .into_iter()
        .map(|host| host.trim().to_ascii_lowercase())
        .filter(|host| !host.is_empty())
        .collect())
}
