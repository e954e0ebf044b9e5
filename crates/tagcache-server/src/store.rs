use std::sync::Arc;

use tagcache_store::DynStore;
use tagcache_store_memory::create_memory_store;
use tagcache_store_redis::RedisStore;

use crate::config::RedisConfig;

/// Create the backing store based on configuration.
///
/// - **Redis disabled**: in-memory store (single instance only)
/// - **Redis enabled**: connects to Redis, falls back to in-memory on failure
///
/// The fallback lets the server start and answer admin requests while Redis
/// is down; cached data is then local to this process.
pub async fn create_store(config: &RedisConfig) -> DynStore {
    if !config.enabled {
        tracing::info!("Redis disabled, using in-memory store");
        return create_memory_store();
    }

    match RedisStore::connect(&config.store_config()).await {
        Ok(store) => {
            tracing::info!(url = %config.url, "Connected to Redis");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                category = %e.category(),
                "Failed to connect to Redis. Falling back to in-memory store."
            );
            create_memory_store()
        }
    }
}
