//! Metrics the core emits: a process-global [`prometheus::Registry`] with
//! lazily-registered `CounterVec`/`GaugeVec`/`HistogramVec` statics.
//!
//! The HTTP `/metrics` exposition endpoint is an external collaborator; this
//! module only owns the registry and the increment call sites used by
//! [`crate::instance`], [`crate::manager`] and [`crate::reconciler`].

use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "dnsweaver";

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-global metrics registry. Callers that expose `/metrics`
/// gather from this.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

static PROVIDER_API_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();
fn provider_api_requests_total() -> &'static CounterVec {
    PROVIDER_API_REQUESTS_TOTAL.get_or_init(|| {
        let c = CounterVec::new(
            Opts::new(
                format!("{NAMESPACE}_provider_api_requests_total"),
                "Total provider API requests by provider, operation and status",
            ),
            &["provider", "op", "status"],
        )
        .unwrap();
        registry().register(Box::new(c.clone())).ok();
        c
    })
}

static PROVIDER_API_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
fn provider_api_duration_seconds() -> &'static HistogramVec {
    PROVIDER_API_DURATION_SECONDS.get_or_init(|| {
        let h = HistogramVec::new(
            HistogramOpts::new(
                format!("{NAMESPACE}_provider_api_duration_seconds"),
                "Provider API call duration in seconds by provider and operation",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["provider", "op"],
        )
        .unwrap();
        registry().register(Box::new(h.clone())).ok();
        h
    })
}

static PROVIDER_HEALTHY: OnceLock<GaugeVec> = OnceLock::new();
fn provider_healthy() -> &'static GaugeVec {
    PROVIDER_HEALTHY.get_or_init(|| {
        let g = GaugeVec::new(
            Opts::new(format!("{NAMESPACE}_provider_healthy"), "1 if the provider's last API call succeeded"),
            &["provider"],
        )
        .unwrap();
        registry().register(Box::new(g.clone())).ok();
        g
    })
}

static PROVIDER_AVAILABLE: OnceLock<GaugeVec> = OnceLock::new();
fn provider_available() -> &'static GaugeVec {
    PROVIDER_AVAILABLE.get_or_init(|| {
        let g = GaugeVec::new(
            Opts::new(format!("{NAMESPACE}_provider_available"), "1 if the provider instance is initialized and reachable"),
            &["provider", "type"],
        )
        .unwrap();
        registry().register(Box::new(g.clone())).ok();
        g
    })
}

static PROVIDER_INIT_RETRIES_TOTAL: OnceLock<CounterVec> = OnceLock::new();
fn provider_init_retries_total() -> &'static CounterVec {
    PROVIDER_INIT_RETRIES_TOTAL.get_or_init(|| {
        let c = CounterVec::new(
            Opts::new(format!("{NAMESPACE}_provider_init_retries_total"), "Total provider initialization retries by result"),
            &["provider", "result"],
        )
        .unwrap();
        registry().register(Box::new(c.clone())).ok();
        c
    })
}

static PROVIDERS_READY: OnceLock<prometheus::Gauge> = OnceLock::new();
fn providers_ready() -> &'static prometheus::Gauge {
    PROVIDERS_READY.get_or_init(|| {
        let g = prometheus::Gauge::new(format!("{NAMESPACE}_providers_ready"), "Number of providers currently ready").unwrap();
        registry().register(Box::new(g.clone())).ok();
        g
    })
}

static PROVIDERS_PENDING: OnceLock<prometheus::Gauge> = OnceLock::new();
fn providers_pending() -> &'static prometheus::Gauge {
    PROVIDERS_PENDING.get_or_init(|| {
        let g = prometheus::Gauge::new(format!("{NAMESPACE}_providers_pending"), "Number of providers awaiting successful initialization").unwrap();
        registry().register(Box::new(g.clone())).ok();
        g
    })
}

static RECONCILE_ACTIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();
fn reconcile_actions_total() -> &'static CounterVec {
    RECONCILE_ACTIONS_TOTAL.get_or_init(|| {
        let c = CounterVec::new(
            Opts::new(format!("{NAMESPACE}_reconcile_actions_total"), "Total reconciler actions by type and status"),
            &["action", "status"],
        )
        .unwrap();
        registry().register(Box::new(c.clone())).ok();
        c
    })
}

/// Records one provider API call's outcome and duration.
pub fn observe_api_call(provider: &str, op: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    provider_api_requests_total()
        .with_label_values(&[provider, op, status])
        .inc();
    provider_api_duration_seconds()
        .with_label_values(&[provider, op])
        .observe(duration.as_secs_f64());
}

pub fn set_provider_healthy(provider: &str, healthy: bool) {
    provider_healthy()
        .with_label_values(&[provider])
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn set_provider_available(provider: &str, kind: &str, available: bool) {
    provider_available()
        .with_label_values(&[provider, kind])
        .set(if available { 1.0 } else { 0.0 });
}

pub fn inc_init_retry(provider: &str, success: bool) {
    let result = if success { "success" } else { "failed" };
    provider_init_retries_total()
        .with_label_values(&[provider, result])
        .inc();
}

pub fn set_providers_ready_pending(ready: usize, pending: usize) {
    providers_ready().set(ready as f64);
    providers_pending().set(pending as f64);
}

pub fn inc_reconcile_action(action: &str, status: &str) {
    reconcile_actions_total().with_label_values(&[action, status]).inc();
}

/// Reads the current `provider_healthy` gauge value for a provider. Test-only.
#[cfg(test)]
pub(crate) fn provider_healthy_value(provider: &str) -> f64 {
    provider_healthy().with_label_values(&[provider]).get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_panicking() {
        observe_api_call("test", "list", true, Duration::from_millis(5));
        set_provider_healthy("test", true);
        set_provider_available("test", "memory", true);
        inc_init_retry("test", false);
        set_providers_ready_pending(1, 2);
        inc_reconcile_action("create", "success");
        let families = registry().gather();
        assert!(!families.is_empty());
    }
}
