//! HTTP introspection API
//!
//! Read-only endpoints over the hub and presence state for dashboards
//! and operational checks. All write traffic goes through the WebSocket
//! layer; nothing here mutates the system.
//!
//! Endpoints:
//! - `GET /health` - liveness probe
//! - `GET /metrics` - counter snapshot as JSON
//! - `GET /hub/history` - buffered events, filterable by `type`, `source`, `limit`
//! - `GET /hub/categories` - domain catalog with per-category counts
//! - `GET /presence` - online user ids

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::catalog::Category;
use crate::hub::{CategoryCount, Event, EventHub};
use crate::observability::LifecycleEvent;
use crate::realtime::PresenceSet;

// ==================
// Configuration
// ==================

/// HTTP introspection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpApiConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins; empty means permissive
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4001
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl HttpApiConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ==================
// Shared State
// ==================

/// State shared across handlers
struct ApiState {
    hub: Arc<EventHub>,
    presence: Arc<PresenceSet>,
}

// ==================
// Response Types
// ==================

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Catalog entries plus live per-category counts
#[derive(Debug, Serialize)]
struct CategoriesResponse {
    categories: Vec<Category>,
    counts: Vec<CategoryCount>,
}

/// History query parameters
#[derive(Debug, Deserialize)]
struct HistoryQuery {
    /// Exact event type to match
    #[serde(rename = "type")]
    event_type: Option<String>,
    /// Exact source to match
    source: Option<String>,
    /// Keep only the most recent N entries
    limit: Option<usize>,
}

// ==================
// Server
// ==================

/// HTTP introspection server
pub struct HttpApi {
    config: HttpApiConfig,
    router: Router,
}

impl HttpApi {
    pub fn new(config: HttpApiConfig, hub: Arc<EventHub>, presence: Arc<PresenceSet>) -> Self {
        let router = Self::build_router(&config, hub, presence);
        Self { config, router }
    }

    /// Build the router with all endpoints
    fn build_router(
        config: &HttpApiConfig,
        hub: Arc<EventHub>,
        presence: Arc<PresenceSet>,
    ) -> Router {
        let state = Arc::new(ApiState { hub, presence });

        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            use tower_http::cors::AllowOrigin;
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/hub/history", get(history_handler))
            .route("/hub/categories", get(categories_handler))
            .route("/presence", get(presence_handler))
            .with_state(state)
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind the configured address and serve until the process exits
    pub async fn start(self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener
    ///
    /// Binding is separate from serving so tests can listen on an
    /// ephemeral port.
    pub async fn serve(self, listener: TcpListener) -> Result<(), std::io::Error> {
        if let Ok(addr) = listener.local_addr() {
            LifecycleEvent::HttpListening.emit(&[("addr", &addr.to_string())]);
        }
        axum::serve(listener, self.router).await
    }
}

// ==================
// Handlers
// ==================

async fn health_handler() -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

async fn metrics_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let json_str = state.hub.metrics().to_json();

    let metrics: Value = serde_json::from_str(&json_str)
        .unwrap_or_else(|_| json!({"error": "Failed to serialize metrics"}));

    (StatusCode::OK, Json(metrics))
}

async fn history_handler(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let mut events = state
        .hub
        .history_filtered(query.event_type.as_deref(), query.source.as_deref());

    // Tail slice: the most recent `limit` entries, still oldest first
    if let Some(limit) = query.limit {
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
    }

    let total = events.len();
    let entries: Vec<&Event> = events.iter().map(|event| event.as_ref()).collect();

    (
        StatusCode::OK,
        Json(json!({ "events": entries, "total": total })),
    )
}

async fn categories_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let response = CategoriesResponse {
        categories: state.hub.catalog().all(),
        counts: state.hub.counts_by_category(),
    };

    (StatusCode::OK, Json(response))
}

async fn presence_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let user_ids = state.presence.online_users();
    let total = user_ids.len();

    (
        StatusCode::OK,
        Json(json!({ "userIds": user_ids, "total": total })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubConfig;

    #[test]
    fn test_default_config() {
        let config = HttpApiConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 4001);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let config = HttpApiConfig {
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_router_builds() {
        let hub = Arc::new(EventHub::new(HubConfig::default()));
        let presence = Arc::new(PresenceSet::new());
        let api = HttpApi::new(HttpApiConfig::default(), hub, presence);
        let _router = api.router();
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("ok"));
    }
}
