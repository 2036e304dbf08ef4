pub mod app_config;
pub mod cache;
pub mod database;
pub mod redis_repo;
pub mod trip_repo;
pub mod user_repo;

pub use cache::{LocalCache, TieredCache};
pub use database::DbClient;
pub use redis_repo::RedisClient;
pub use trip_repo::PostgresTripRepository;
pub use user_repo::PostgresUserRepository;
