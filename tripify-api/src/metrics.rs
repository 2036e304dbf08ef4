use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Gateway collectors. Constructed once at startup and passed through
/// `AppState`; nothing registers into a process-global default registry.
pub struct Metrics {
    pub registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub grpc_requests_total: IntCounterVec,
    pub grpc_request_duration_seconds: HistogramVec,
    pub trip_operations_total: IntCounterVec,
    pub user_operations_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let buckets = vec![0.1, 0.3, 0.5, 0.7, 1.0, 3.0, 5.0, 7.0, 10.0];

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status_code"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
            )
            .buckets(buckets.clone()),
            &["method", "route", "status_code"],
        )?;
        let grpc_requests_total = IntCounterVec::new(
            Opts::new("grpc_requests_total", "Total number of gRPC requests"),
            &["service", "method", "status"],
        )?;
        let grpc_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "grpc_request_duration_seconds",
                "Duration of gRPC requests in seconds",
            )
            .buckets(buckets),
            &["service", "method", "status"],
        )?;
        let trip_operations_total = IntCounterVec::new(
            Opts::new("trip_operations_total", "Total number of trip operations"),
            &["operation", "status"],
        )?;
        let user_operations_total = IntCounterVec::new(
            Opts::new("user_operations_total", "Total number of user operations"),
            &["operation", "status"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(grpc_requests_total.clone()))?;
        registry.register(Box::new(grpc_request_duration_seconds.clone()))?;
        registry.register(Box::new(trip_operations_total.clone()))?;
        registry.register(Box::new(user_operations_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            grpc_requests_total,
            grpc_request_duration_seconds,
            trip_operations_total,
            user_operations_total,
        })
    }

    pub fn record_trip_operation(&self, operation: &str, status: &str) {
        self.trip_operations_total
            .with_label_values(&[operation, status])
            .inc();
    }

    pub fn record_user_operation(&self, operation: &str, status: &str) {
        self.user_operations_total
            .with_label_values(&[operation, status])
            .inc();
    }

    pub fn record_grpc(&self, service: &str, method: &str, status: &str, duration_seconds: f64) {
        self.grpc_requests_total
            .with_label_values(&[service, method, status])
            .inc();
        self.grpc_request_duration_seconds
            .with_label_values(&[service, method, status])
            .observe(duration_seconds);
    }

    /// Prometheus text exposition format.
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
    fn two_instances_do_not_collide() {
        // DI registries, not a global: building twice must not panic on
        // duplicate registration.
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_trip_operation("create", "success");
        b.record_trip_operation("create", "success");
        assert!(a.export().contains("trip_operations_total"));
    }
}
