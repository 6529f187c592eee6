#![forbid(unsafe_code)]

//! # Gantry API
//!
//! The HTTP ingress: JSON over HTTP, every route tenant-scoped via path
//! or the `X-Tenant-Id` header.
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | POST | `/workflows` | create a definition |
//! | PUT | `/workflows/{id}` | partial update |
//! | POST | `/workflows/{id}/publish` | draft -> published |
//! | GET | `/workflows/{id}/executions` | list runs |
//! | POST | `/nodes/{node_id}/trigger` | external trigger |
//! | GET | `/nodes/{node_id}/executions` | list node attempts |
//! | POST | `/scheduler/{tenant}/events` | create/update scheduled event |
//! | GET | `/scheduler/{tenant}/events` | list scheduled events |
//! | PATCH | `/scheduler/{tenant}/events/{id}/status` | set status |
//! | POST | `/scheduler/{tenant}/events/{id}/trigger` | fire immediately |
//! | GET/POST | `/webhooks/{provider}/{tenant}/{workflow}` | inbound webhook |
//!
//! Error contract: 400 validation, 401 bad signature, 404 not found,
//! 409 state conflict, 410 cancelled, 5xx internal.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::{AppState, WebhookSecrets};

use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the full ingress router over the given application state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/workflows", post(routes::workflows::create))
        .route("/workflows/{id}", put(routes::workflows::update))
        .route("/workflows/{id}/publish", post(routes::workflows::publish))
        .route(
            "/workflows/{id}/executions",
            get(routes::workflows::list_executions),
        )
        .route("/nodes/{node_id}/trigger", post(routes::nodes::trigger))
        .route(
            "/nodes/{node_id}/executions",
            get(routes::nodes::list_executions),
        )
        .route(
            "/scheduler/{tenant}/events",
            post(routes::scheduler::upsert).get(routes::scheduler::list),
        )
        .route(
            "/scheduler/{tenant}/events/{id}/status",
            patch(routes::scheduler::set_status),
        )
        .route(
            "/scheduler/{tenant}/events/{id}/trigger",
            post(routes::scheduler::fire),
        )
        .route(
            "/webhooks/{provider}/{tenant}/{workflow}",
            get(routes::webhooks::challenge).post(routes::webhooks::receive),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
