//! HTTP server
//!
//! Wires the store, tracker, generator and trigger into one [`AppState`],
//! serves the REST and WebSocket routes, and runs the daily trigger as a
//! background task for the lifetime of the server.

pub mod api;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::scheduler::{ScheduleGenerator, ScheduleTrigger, SchedulerResult};
use crate::storage::SharedStore;
use crate::tracking::LocationTracker;

pub use api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Persistence store
    pub store: SharedStore,

    /// Subscriber registry
    pub broadcaster: Arc<Broadcaster>,

    /// Collector position owner
    pub tracker: Arc<LocationTracker>,

    /// Daily trigger
    pub trigger: Arc<ScheduleTrigger>,

    /// Server start time
    pub start_time: Instant,

    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Build every component on top of `store`
    pub fn new(store: SharedStore, config: Config) -> SchedulerResult<Self> {
        let broadcaster = Arc::new(Broadcaster::new());
        let tracker = Arc::new(LocationTracker::new(store.clone(), broadcaster.clone()));
        let generator = Arc::new(ScheduleGenerator::new(store.clone(), broadcaster.clone()));
        let trigger = Arc::new(ScheduleTrigger::new(config.scheduler.clone(), generator)?);

        Ok(Self {
            store,
            broadcaster,
            tracker,
            trigger,
            start_time: Instant::now(),
            config: Arc::new(config),
        })
    }
}

// ============================================================================
// Server
// ============================================================================

/// Main takatrack server
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server over `store`
    pub fn new(config: Config, store: SharedStore) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::ConfigError(format!("{e:#}")))?;

        let state =
            AppState::new(store, config).map_err(|e| ServerError::InitError(e.to_string()))?;

        Ok(Self { state })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let server_config = &self.state.config.server;
        let mut router = create_router(self.state.clone());

        if server_config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if server_config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.state.config.server.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("{addr}: {e}")))?;

        tracing::info!("Starting takatrack server on {}", addr);

        self.start_background_tasks();

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()));

        self.state.trigger.stop();
        tracing::info!("takatrack server shutdown complete");
        result
    }

    /// Start background tasks
    fn start_background_tasks(&self) {
        if !self.state.config.scheduler.enabled {
            tracing::info!("Daily schedule trigger disabled");
            return;
        }

        let trigger = self.state.trigger.clone();
        tokio::spawn(async move {
            if let Err(e) = trigger.start().await {
                tracing::error!(error = %e, "Schedule trigger exited");
            }
        });

        tracing::info!("Background tasks started");
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        let config = &self.state.config;
        ServerInfo {
            bind_address: config.server.bind_address,
            sqlite_path: config.database.sqlite_path.display().to_string(),
            schedule_time: config.scheduler.run_time.clone(),
            horizon_days: config.scheduler.horizon_days,
            scheduler_enabled: config.scheduler.enabled,
            cors_enabled: config.server.enable_cors,
            request_logging_enabled: config.server.enable_request_logging,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub sqlite_path: String,
    pub schedule_time: String,
    pub horizon_days: i64,
    pub scheduler_enabled: bool,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "takatrack Server\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Database: {}\n\
             Daily Schedule: {} (horizon {} days, {})\n\
             CORS: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.sqlite_path,
            self.schedule_time,
            self.horizon_days,
            if self.scheduler_enabled { "enabled" } else { "disabled" },
            if self.cors_enabled { "enabled" } else { "disabled" },
            if self.request_logging_enabled { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone)]
pub enum ServerError {
    /// Configuration error
    ConfigError(String),

    /// Initialization error
    InitError(String),

    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::InitError(msg) => write!(f, "Initialization error: {}", msg),
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::create_memory_store;

    #[test]
    fn test_server_creation() {
        let server = Server::new(Config::default(), create_memory_store());
        assert!(server.is_ok());
    }

    #[test]
    fn test_server_rejects_invalid_config() {
        let mut config = Config::default();
        config.scheduler.run_time = "later".to_string();

        let err = Server::new(config, create_memory_store()).err().unwrap();
        assert!(matches!(err, ServerError::ConfigError(_)));
    }

    #[test]
    fn test_server_info() {
        let mut config = Config::default();
        config.server.enable_cors = false;
        let server = Server::new(config, create_memory_store()).unwrap();
        let info = server.info();

        assert_eq!(info.horizon_days, 3);
        assert!(!info.cors_enabled);
        assert!(info.display().contains("Daily Schedule: 00:00"));
    }

    #[tokio::test]
    async fn test_app_state_components() {
        let server = Server::new(Config::default(), create_memory_store()).unwrap();
        let state = server.state();

        assert!(state.tracker.get_location().unwrap().is_none());
        assert_eq!(state.broadcaster.subscriber_count(), 0);
        assert!(!state.trigger.is_running());
    }
}
