pub mod admin;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod scheduler;
pub mod server;
pub mod store;

pub use config::{
    AppConfig, CacheConfig, LoggingConfig, RateLimitConfig, RedisConfig, ServerConfig,
    StatsSettings,
};
pub use error::ApiError;
pub use observability::init_tracing;
pub use scheduler::{SchedulerHandle, SnapshotScheduler};
pub use server::{AppState, ServerBuilder, TagcacheServer, build_app};
pub use store::create_store;
