//! Prometheus metrics for proxy operations
//!
//! - Operations by action and outcome
//! - Per-record failures by action
//! - Backend commands that hit their timeout

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;
use tracing::error;

lazy_static::lazy_static! {
    /// Metrics registry for the proxy
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("photon_proxy_operations_total", "Operations completed"),
        &["action", "outcome"]
    ).expect("valid metric definition");

    pub static ref RECORD_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("photon_proxy_record_failures_total", "Records whose backend command failed"),
        &["action"]
    ).expect("valid metric definition");

    pub static ref COMMAND_TIMEOUTS_TOTAL: IntCounter = IntCounter::new(
        "photon_proxy_command_timeouts_total",
        "Backend commands that did not resolve in time"
    ).expect("valid metric definition");
}

static INIT: Once = Once::new();

/// Register all metrics with [`METRICS_REGISTRY`]. Safe to call repeatedly.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: [Box<dyn prometheus::core::Collector>; 3] = [
            Box::new(OPERATIONS_TOTAL.clone()),
            Box::new(RECORD_FAILURES_TOTAL.clone()),
            Box::new(COMMAND_TIMEOUTS_TOTAL.clone()),
        ];
        for collector in collectors {
            if let Err(e) = METRICS_REGISTRY.register(collector) {
                error!(error = %e, "failed to register metric");
            }
        }
    });
}

/// Render registered metrics in the Prometheus text format.
pub fn export_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&METRICS_REGISTRY.gather(), &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
