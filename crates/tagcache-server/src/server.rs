use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tagcache::{KeySpace, RateLimiter, StatsConfig, StatsRecorder, TagCache};
use tagcache_store::DynStore;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::admin::admin_routes;
use crate::config::AppConfig;
use crate::scheduler::SnapshotScheduler;
use crate::store::create_store;
use crate::{handlers, middleware as app_middleware};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: TagCache,
    pub limiter: RateLimiter,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wires the cache, stats recorder and limiter over one store.
    pub fn new(config: AppConfig, store: DynStore) -> Self {
        let stats = Arc::new(StatsRecorder::with_config(
            store.clone(),
            StatsConfig::default().with_history_capacity(config.stats.history_capacity),
        ));
        let cache = TagCache::new(store.clone(), stats)
            .with_key_space(KeySpace::new(config.cache.key_prefix.clone()));
        Self {
            cache,
            limiter: RateLimiter::new(store),
            config: Arc::new(config),
        }
    }

    /// Builds state over the store selected by `config.redis`.
    pub async fn from_config(config: AppConfig) -> Self {
        let store = create_store(&config.redis).await;
        Self::new(config, store)
    }

    pub fn stats(&self) -> &Arc<StatsRecorder> {
        self.cache.stats()
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .merge(admin_routes(state.clone()))
        // Middleware stack (order: trace -> request metrics)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(app_middleware::request_metrics)),
        )
        .with_state(state)
}

pub struct TagcacheServer {
    addr: SocketAddr,
    app: Router,
    scheduler: SnapshotScheduler,
}

pub struct ServerBuilder {
    config: AppConfig,
    store: Option<DynStore>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            store: None,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Uses `store` instead of connecting according to `config.redis`.
    pub fn with_store(mut self, store: DynStore) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn build(self) -> TagcacheServer {
        let addr = self.config.addr();
        let interval = self.config.snapshot_interval();
        let state = match self.store {
            Some(store) => AppState::new(self.config, store),
            None => AppState::from_config(self.config).await,
        };
        let scheduler = SnapshotScheduler::new(state.stats().clone(), interval);

        TagcacheServer {
            addr,
            app: build_app(state),
            scheduler,
        }
    }
}

impl TagcacheServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let scheduler = self.scheduler.start();
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        scheduler.stop().await;
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagcache_store_memory::create_memory_store;

    #[tokio::test]
    async fn test_state_uses_configured_prefix_and_capacity() {
        let mut cfg = AppConfig::default();
        cfg.cache.key_prefix = "app:".into();
        cfg.stats.history_capacity = 2;
        let store = create_memory_store();
        let state = AppState::new(cfg, store.clone());

        state
            .cache
            .set("k", &1, 60, &Default::default())
            .await
            .unwrap();
        assert!(store.get("app:k").await.unwrap().is_some());

        for _ in 0..3 {
            state.stats().snapshot_to_store().await.unwrap();
        }
        assert_eq!(state.stats().history().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_builder_uses_injected_store() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "127.0.0.1".into();
        cfg.server.port = 9190;
        let server = ServerBuilder::new()
            .with_config(cfg)
            .with_store(create_memory_store())
            .build()
            .await;
        assert_eq!(server.addr, "127.0.0.1:9190".parse::<SocketAddr>().unwrap());
    }
}
