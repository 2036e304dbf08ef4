use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripify_api::grpc::{GatewayGrpc, TripGrpc, UserGrpc};
use tripify_api::metrics::Metrics;
use tripify_api::state::{AppState, AuthConfig};
use tripify_api::{app, SERVICE_NAME};
use tripify_proto::v1::api_gateway_server::ApiGatewayServer;
use tripify_proto::v1::data_service_client::DataServiceClient;
use tripify_proto::v1::trip_service_server::TripServiceServer;
use tripify_proto::v1::user_service_server::UserServiceServer;
use tripify_registry::{HealthCheck, RegistryClient, ServiceRegistration};
use tripify_store::{
    DbClient, PostgresTripRepository, PostgresUserRepository, RedisClient, TieredCache,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripify_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tripify_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!(
        "Starting Tripify API on port {} (gRPC {})",
        config.server.port,
        config.server.grpc_port
    );

    // Postgres
    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    // Redis
    let redis = RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to open Redis client");
    let redis_arc = Arc::new(redis.clone());
    let cache = Arc::new(TieredCache::new(Some(redis)));

    let metrics = Arc::new(Metrics::new().expect("Failed to build metrics registry"));
    let registry = Arc::new(RegistryClient::new(
        &config.registry.host,
        config.registry.port,
    ));

    // Lazy channel: the data service may come up after the gateway.
    let data_channel = tonic::transport::Endpoint::from_shared(
        config.external.data_service_grpc_url.clone(),
    )
    .expect("Invalid data service URL")
    .connect_lazy();

    let state = AppState {
        trip_repo: Arc::new(PostgresTripRepository::new(db.pool.clone())),
        user_repo: Arc::new(PostgresUserRepository::new(db.pool.clone())),
        redis: redis_arc,
        cache,
        metrics,
        registry: registry.clone(),
        data_client: DataServiceClient::new(data_channel),
        http: reqwest::Client::new(),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rate_limit: config.rate_limit.clone(),
        external: config.external.clone(),
        version: config.service.version.clone(),
        environment: config.service.environment.clone(),
        started_at: Instant::now(),
    };

    // gRPC server: trips, users and the gateway routing surface.
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], config.server.grpc_port));
    {
        let state = state.clone();
        tokio::spawn(async move {
            let result = tonic::transport::Server::builder()
                .add_service(TripServiceServer::new(TripGrpc { state: state.clone() }))
                .add_service(UserServiceServer::new(UserGrpc { state: state.clone() }))
                .add_service(ApiGatewayServer::new(GatewayGrpc { state }))
                .serve(grpc_addr)
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "gRPC server exited");
            }
        });
    }
    tracing::info!("Gateway gRPC listening on {}", grpc_addr);

    // Registry registration: bounded retries with fixed backoff, non-fatal.
    let service_id = format!("{}-{}", SERVICE_NAME, config.server.port);
    {
        let registry = registry.clone();
        let host = config.service.host.clone();
        let port = config.server.port;
        let attempts = config.registry.attempts;
        let backoff = Duration::from_secs(config.registry.backoff_seconds);
        let service_id = service_id.clone();
        tokio::spawn(async move {
            let registration = ServiceRegistration {
                id: service_id,
                name: SERVICE_NAME.to_string(),
                address: host.clone(),
                port,
                tags: vec!["http".into(), "grpc".into(), "gateway".into()],
                check: Some(HealthCheck::http(format!("http://{}:{}/health", host, port))),
                meta: Default::default(),
            };
            registry
                .register_with_retry(&registration, attempts, backoff)
                .await;
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

    if let Err(err) = registry.deregister(&service_id).await {
        tracing::warn!(error = %err, "failed to deregister from service registry");
    }
}
