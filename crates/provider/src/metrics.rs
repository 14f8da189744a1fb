use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = {
        let counter = IntCounterVec::new(
            Opts::new(
                "cds_api_requests_total",
                "Total number of CDS open API attempts by action and outcome.",
            ),
            &["action", "outcome"],
        )
        .expect("valid metric definition");
        REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register cds_api_requests_total");
        counter
    };
    pub static ref API_RETRIES_TOTAL: IntCounterVec = {
        let counter = IntCounterVec::new(
            Opts::new(
                "cds_api_retries_total",
                "Total number of CDS open API retries by action.",
            ),
            &["action"],
        )
        .expect("valid metric definition");
        REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register cds_api_retries_total");
        counter
    };
}

/// Force registration so the counters show up before the first call.
pub fn register_metrics() {
    lazy_static::initialize(&API_REQUESTS_TOTAL);
    lazy_static::initialize(&API_RETRIES_TOTAL);
}

pub fn record_attempt(action: &str, outcome: &str) {
    API_REQUESTS_TOTAL.with_label_values(&[action, outcome]).inc();
}

pub fn record_retry(action: &str) {
    API_RETRIES_TOTAL.with_label_values(&[action]).inc();
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> String {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_are_exported() {
        register_metrics();
        record_attempt("MetricsProbe", "ok");
        record_retry("MetricsProbe");

        let text = gather_metrics();
        assert!(text.contains("cds_api_requests_total"));
        assert!(text.contains("action=\"MetricsProbe\""));
        assert!(text.contains("cds_api_retries_total"));
    }
}
