use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// Runtime overrides keyed by policy path. Iteration is path ordered, so the
/// recomputed snapshot does not depend on insertion order.
#[derive(Clone, Debug, Default)]
pub struct RuntimeOverrideStore {
    entries: BTreeMap<String, RuntimeOverride>,
}

#[derive(Clone, Debug)]
pub struct RuntimeOverride {
    pub value: Value,
    pub owner: String,
    pub reason: String,
    pub expires_at: Option<Instant>,
}

impl RuntimeOverride {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }
}

impl RuntimeOverrideStore {
    pub fn insert(&mut self, path: String, entry: RuntimeOverride) {
        self.entries.insert(path, entry);
    }

    pub fn entry(value: Value, owner: String, reason: String, ttl: Option<Duration>) -> RuntimeOverride {
        RuntimeOverride {
            value,
            owner,
            reason,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    /// Removes the override at `path` only if it has expired. A newer override
    /// written to the same path after the timer started stays in place.
    pub fn expire(&mut self, path: &str) -> bool {
        let now = Instant::now();
        match self.entries.get(path) {
            Some(entry) if !entry.is_live(now) => {
                self.entries.remove(path);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, path: &str) -> Option<RuntimeOverride> {
        self.entries.remove(path)
    }

    /// Drops expired entries and returns the live ones.
    pub fn active_entries(&mut self) -> Vec<(String, Value)> {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.entries
            .iter()
            .map(|(path, entry)| (path.clone(), entry.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expired_entries_are_dropped() {
        let mut store = RuntimeOverrideStore::default();
        store.insert(
            "ads.enabled".into(),
            RuntimeOverrideStore::entry(json!(false), "qa".into(), "test".into(), Some(Duration::ZERO)),
        );
        store.insert(
            "ingest.fetch_timeout_ms".into(),
            RuntimeOverrideStore::entry(json!(50), "qa".into(), "test".into(), None),
        );

        let active = store.active_entries();
        assert_eq!(active, vec![("ingest.fetch_timeout_ms".to_string(), json!(50))]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expire_keeps_live_replacement() {
        let mut store = RuntimeOverrideStore::default();
        store.insert(
            "ads.enabled".into(),
            RuntimeOverrideStore::entry(json!(false), "qa".into(), "second".into(), None),
        );
        assert!(!store.expire("ads.enabled"));
        assert!(store.remove("ads.enabled").is_some());
        assert!(store.is_empty());
    }
}
