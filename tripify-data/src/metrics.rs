use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Data-service collectors, owned by the state rather than a process-wide
/// default registry.
pub struct DataMetrics {
    pub registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub grpc_requests_total: IntCounterVec,
    pub data_requests_total: IntCounter,
    pub cache_hits_total: IntCounter,
    pub external_api_calls_total: IntCounter,
}

impl DataMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
            )
            .buckets(vec![0.1, 0.3, 0.5, 0.7, 1.0, 3.0, 5.0, 7.0, 10.0]),
            &["method", "path", "status"],
        )?;
        let grpc_requests_total = IntCounterVec::new(
            Opts::new("grpc_requests_total", "Total number of gRPC requests"),
            &["method", "status"],
        )?;
        let data_requests_total = IntCounter::new(
            "tripify_data_requests_total",
            "Total number of data requests",
        )?;
        let cache_hits_total =
            IntCounter::new("tripify_cache_hits_total", "Cache hits")?;
        let external_api_calls_total = IntCounter::new(
            "tripify_external_api_calls_total",
            "External API calls",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(grpc_requests_total.clone()))?;
        registry.register(Box::new(data_requests_total.clone()))?;
        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(external_api_calls_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            grpc_requests_total,
            data_requests_total,
            cache_hits_total,
            external_api_calls_total,
        })
    }

    /// Prometheus text exposition of everything registered here.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(err) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!(error = %err, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_contains_registered_families() {
        let metrics = DataMetrics::new().unwrap();
        metrics.data_requests_total.inc();
        metrics.cache_hits_total.inc();
        let text = metrics.export();
        assert!(text.contains("tripify_data_requests_total 1"));
        assert!(text.contains("tripify_cache_hits_total 1"));
    }
}
