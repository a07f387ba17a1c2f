use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, Registry, TextEncoder};
use searchads_registry::metrics as registry_metrics;
use tracing::error;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        registry_metrics::register_metrics(global_registry());
    });
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

/// Prometheus text exposition of every registered metric.
pub fn render_text() -> String {
    register_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&global_registry().gather(), &mut buffer) {
        error!(?err, "failed to encode prometheus metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
