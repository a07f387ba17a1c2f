use crate::api::{InMemoryPolicyCenter, PolicyCenter};
use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::loader::{load_snapshot, load_snapshot_with_options, LoadOptions};
use crate::model::{PolicySource, RuntimeOverrideSpec};
use std::env;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use url::Url;

fn override_spec(path: &str, value: serde_json::Value, ttl_seconds: u64) -> RuntimeOverrideSpec {
    RuntimeOverrideSpec {
        path: path.into(),
        value,
        owner: "test".into(),
        reason: "unit test".into(),
        ttl_seconds,
    }
}

#[test]
fn default_snapshot_enables_pipeline_on_search_hosts() {
    let snapshot = default_snapshot();
    assert!(snapshot.ads.enabled);
    assert!(snapshot.features.search_result_ad_confirmation_events);
    assert_eq!(snapshot.ingest.fetch_timeout_ms, 10_000);
    assert_eq!(snapshot.dispatch.report_timeout_ms, 30_000);

    let view = snapshot.view();
    assert!(view.ingestion_enabled());
    assert!(view.is_allowed_host(&Url::parse("https://search.brave.com/search?q=x").unwrap()));
    assert!(view.is_allowed_host(&Url::parse("https://safesearch.brave.software/").unwrap()));
}

#[test]
fn host_check_requires_https_and_exact_match() {
    let view = default_snapshot().view();
    for rejected in [
        "http://search.brave.com/search?q=x",
        "https://brave.com/",
        "https://evil.search.brave.com/",
        "https://search.brave.com.evil.net/",
        "file:///tmp/search.brave.com",
    ] {
        let url = Url::parse(rejected).unwrap();
        assert!(!view.is_allowed_host(&url), "{rejected} should be rejected");
    }
}

#[test]
fn yaml_file_overrides_defaults() {
    let _guard = env_guard().lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("policy.yaml");
    std::fs::write(
        &file_path,
        r#"ads:
  enabled: false
hosts:
  allowed:
    - search.example.com
ingest:
  fetch_timeout_ms: 250
"#,
    )
    .unwrap();

    let snapshot = load_snapshot(Some(&file_path)).unwrap();
    assert!(!snapshot.ads.enabled);
    assert_eq!(snapshot.hosts.allowed, vec!["search.example.com"]);
    assert_eq!(snapshot.ingest.fetch_timeout_ms, 250);
    assert_eq!(snapshot.dispatch.report_timeout_ms, 30_000);
    assert_eq!(
        snapshot.provenance.get("ingest.fetch_timeout_ms").unwrap().source,
        PolicySource::File
    );
    assert_eq!(
        snapshot.provenance.get("dispatch.report_timeout_ms").unwrap().source,
        PolicySource::Builtin
    );
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let _guard = env_guard().lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let options = LoadOptions {
        paths: vec![dir.path().join("absent.yaml")],
        include_env: false,
        include_cli_env: false,
    };
    let snapshot = load_snapshot_with_options(&options).unwrap();
    assert_eq!(snapshot.hosts.allowed.len(), 6);
}

#[test]
fn unknown_path_in_file_is_rejected() {
    let _guard = env_guard().lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("policy.yaml");
    std::fs::write(&file_path, "ads:\n  budget: 3\n").unwrap();

    let err = load_snapshot(Some(&file_path)).unwrap_err();
    assert!(matches!(err, PolicyError::UnsupportedPath(path) if path == "ads.budget"));
}

#[test]
fn env_overrides_record_provenance() {
    let _guard = env_guard().lock().unwrap();
    let key = "SEARCHADS_POLICY__DISPATCH__REPORT_TIMEOUT_MS";
    env::set_var(key, "1500");
    env::set_var("SEARCHADS_POLICY__HOSTS__ALLOWED", "a.example,b.example");
    let snapshot = load_snapshot(None);
    env::remove_var(key);
    env::remove_var("SEARCHADS_POLICY__HOSTS__ALLOWED");

    let snapshot = snapshot.expect("load snapshot");
    assert_eq!(snapshot.dispatch.report_timeout_ms, 1500);
    assert_eq!(snapshot.hosts.allowed, vec!["a.example", "b.example"]);
    assert_eq!(
        snapshot
            .provenance
            .get("dispatch.report_timeout_ms")
            .expect("provenance")
            .source,
        PolicySource::Env
    );
}

#[test]
fn json_env_and_cli_overrides_layer_in_order() {
    let _guard = env_guard().lock().unwrap();
    env::set_var(
        "SEARCHADS_POLICY_OVERRIDE_JSON",
        r#"{"ads": {"enabled": false}, "ingest": {"fetch_timeout_ms": 42}}"#,
    );
    env::set_var(
        "SEARCHADS_POLICY_CLI_OVERRIDES",
        "ads.enabled=true,hosts.allowed=one.example|two.example",
    );
    let snapshot = load_snapshot(None);
    env::remove_var("SEARCHADS_POLICY_OVERRIDE_JSON");
    env::remove_var("SEARCHADS_POLICY_CLI_OVERRIDES");

    let snapshot = snapshot.expect("load snapshot with cli");
    assert!(snapshot.ads.enabled);
    assert_eq!(snapshot.ingest.fetch_timeout_ms, 42);
    assert_eq!(snapshot.hosts.allowed, vec!["one.example", "two.example"]);
    assert_eq!(
        snapshot.provenance.get("ads.enabled").unwrap().source,
        PolicySource::Cli
    );
    assert_eq!(
        snapshot.provenance.get("ingest.fetch_timeout_ms").unwrap().source,
        PolicySource::Env
    );
}

#[test]
fn zero_timeout_is_invalid() {
    let _guard = env_guard().lock().unwrap();
    env::set_var("SEARCHADS_POLICY_CLI_OVERRIDES", "ingest.fetch_timeout_ms=0");
    let result = load_snapshot(None);
    env::remove_var("SEARCHADS_POLICY_CLI_OVERRIDES");
    assert!(matches!(result, Err(PolicyError::InvalidValue(_))));
}

#[tokio::test]
async fn override_updates_snapshot() {
    let center = InMemoryPolicyCenter::new(default_snapshot());
    center
        .apply_override(override_spec("ads.enabled", serde_json::json!(false), 0))
        .await
        .unwrap();
    let snapshot = center.snapshot().await;
    assert!(!snapshot.ads.enabled);
    assert_eq!(
        snapshot.provenance.get("ads.enabled").unwrap().source,
        PolicySource::RuntimeOverride
    );
}

#[tokio::test]
async fn invalid_override_leaves_snapshot_untouched() {
    let center = InMemoryPolicyCenter::new(default_snapshot());
    let before = center.snapshot().await.rev;
    let err = center
        .apply_override(override_spec("ads.enabled", serde_json::json!("maybe"), 0))
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyError::InvalidValue(_)));
    assert_eq!(center.snapshot().await.rev, before);
}

#[tokio::test]
async fn subscribe_streams_updates() {
    let center = InMemoryPolicyCenter::new(default_snapshot());
    let mut rx = center.subscribe();
    let original_rev = rx.borrow().rev;

    center
        .apply_override(override_spec(
            "features.search_result_ad_confirmation_events",
            serde_json::json!(false),
            0,
        ))
        .await
        .unwrap();
    rx.changed().await.unwrap();
    let snapshot = Arc::clone(&rx.borrow());
    assert_ne!(snapshot.rev, original_rev);
    assert!(!snapshot.features.search_result_ad_confirmation_events);
}

#[tokio::test]
async fn clearing_override_restores_base() {
    let center = InMemoryPolicyCenter::new(default_snapshot());
    center
        .apply_override(override_spec("ads.enabled", serde_json::json!(false), 0))
        .await
        .unwrap();
    assert!(center.clear_override("ads.enabled").await.unwrap());
    assert!(!center.clear_override("ads.enabled").await.unwrap());
    assert!(center.snapshot().await.ads.enabled);
}

#[tokio::test(start_paused = true)]
async fn ttl_override_expires() {
    let center = InMemoryPolicyCenter::new(default_snapshot());
    let mut rx = center.subscribe();
    center
        .apply_override(override_spec("ads.enabled", serde_json::json!(false), 1))
        .await
        .unwrap();
    rx.changed().await.unwrap();
    assert!(!rx.borrow().ads.enabled);

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    rx.changed().await.unwrap();
    assert!(rx.borrow().ads.enabled);
}

#[tokio::test]
async fn reload_without_source_is_refused() {
    let center = InMemoryPolicyCenter::new(default_snapshot());
    assert!(matches!(
        center.reload().await,
        Err(PolicyError::ReloadUnavailable(_))
    ));
}

#[tokio::test]
async fn reload_rereads_file_and_keeps_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("policy.yaml");
    std::fs::write(&file_path, "ingest:\n  fetch_timeout_ms: 100\n").unwrap();
    let options = LoadOptions {
        paths: vec![file_path.clone()],
        include_env: false,
        include_cli_env: false,
    };
    let center = InMemoryPolicyCenter::from_options(options).unwrap();
    center
        .apply_override(override_spec("ads.enabled", serde_json::json!(false), 0))
        .await
        .unwrap();

    std::fs::write(&file_path, "ingest:\n  fetch_timeout_ms: 200\n").unwrap();
    center.reload().await.unwrap();

    let snapshot = center.snapshot().await;
    assert_eq!(snapshot.ingest.fetch_timeout_ms, 200);
    assert!(!snapshot.ads.enabled);
}

fn env_guard() -> &'static Mutex<()> {
    static ENV_GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_GUARD.get_or_init(|| Mutex::new(()))
}
