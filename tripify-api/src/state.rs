use std::sync::Arc;
use std::time::Instant;

use tonic::transport::Channel;

use tripify_core::repository::{TripRepository, UserRepository};
use tripify_proto::v1::data_service_client::DataServiceClient;
use tripify_registry::RegistryClient;
use tripify_store::app_config::{ExternalApis, RateLimitConfig};
use tripify_store::{RedisClient, TieredCache};

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub trip_repo: Arc<dyn TripRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub redis: Arc<RedisClient>,
    pub cache: Arc<TieredCache>,
    pub metrics: Arc<Metrics>,
    pub registry: Arc<RegistryClient>,
    pub data_client: DataServiceClient<Channel>,
    pub http: reqwest::Client,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub external: ExternalApis,
    pub version: String,
    pub environment: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
