use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripify_data::grpc::DataGrpc;
use tripify_data::limiter::FixedWindowLimiter;
use tripify_data::metrics::DataMetrics;
use tripify_data::providers::Providers;
use tripify_data::{app, DataState, SERVICE_NAME};
use tripify_proto::v1::data_service_server::DataServiceServer;
use tripify_registry::{HealthCheck, RegistryClient, ServiceRegistration};
use tripify_store::{RedisClient, TieredCache};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripify_data=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tripify_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!(
        "Starting Tripify data service on port {} (gRPC {})",
        config.server.port,
        config.server.grpc_port
    );

    let redis = RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to open Redis client");
    let cache = Arc::new(TieredCache::new(Some(redis)));

    let metrics = Arc::new(DataMetrics::new().expect("Failed to build metrics registry"));
    let providers = Arc::new(Providers::new(
        config.external.clone(),
        cache,
        metrics.clone(),
    ));
    let limiter = Arc::new(FixedWindowLimiter::new(
        config.rate_limit.max_requests,
        Duration::from_secs(config.rate_limit.window_seconds.max(1) as u64),
    ));

    let state = DataState {
        providers: providers.clone(),
        limiter,
        metrics: metrics.clone(),
        version: config.service.version.clone(),
        started_at: Instant::now(),
    };

    // gRPC server in the same process, separate port.
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], config.server.grpc_port));
    let grpc_service = DataServiceServer::new(DataGrpc::new(providers, metrics));
    tokio::spawn(async move {
        if let Err(err) = tonic::transport::Server::builder()
            .add_service(grpc_service)
            .serve(grpc_addr)
            .await
        {
            tracing::error!(error = %err, "gRPC server exited");
        }
    });
    tracing::info!("Data service gRPC listening on {}", grpc_addr);

    // Registry registration: bounded retries, never fatal.
    let registry = RegistryClient::new(&config.registry.host, config.registry.port);
    let http_id = format!("{}-http", SERVICE_NAME);
    let grpc_id = format!("{}-grpc", SERVICE_NAME);
    {
        let registry = registry.clone();
        let host = config.service.host.clone();
        let http_port = config.server.port;
        let grpc_port = config.server.grpc_port;
        let attempts = config.registry.attempts;
        let backoff = Duration::from_secs(config.registry.backoff_seconds);
        let http_id = http_id.clone();
        let grpc_id = grpc_id.clone();
        tokio::spawn(async move {
            let http_reg = ServiceRegistration {
                id: http_id,
                name: format!("{}-http", SERVICE_NAME),
                address: host.clone(),
                port: http_port,
                tags: vec!["http".into(), "data".into(), "external-apis".into()],
                check: Some(HealthCheck::http(format!(
                    "http://{}:{}/health",
                    host, http_port
                ))),
                meta: Default::default(),
            };
            registry.register_with_retry(&http_reg, attempts, backoff).await;

            let grpc_reg = ServiceRegistration {
                id: grpc_id,
                name: SERVICE_NAME.to_string(),
                address: host.clone(),
                port: grpc_port,
                tags: vec!["data".into(), "grpc".into(), "external-apis".into()],
                check: Some(HealthCheck::grpc(format!("{}:{}", host, grpc_port))),
                meta: Default::default(),
            };
            registry.register_with_retry(&grpc_reg, attempts, backoff).await;
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await
    .unwrap();

    // Deregister on the way out; failures only get logged.
    if let Err(err) = registry.deregister(&http_id).await {
        tracing::warn!(error = %err, "failed to deregister HTTP service");
    }
    if let Err(err) = registry.deregister(&grpc_id).await {
        tracing::warn!(error = %err, "failed to deregister gRPC service");
    }
}
