//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use gantry_core::TenantId;
use gantry_engine::Engine;
use gantry_storage::{ExecutionRepository, ScheduledEventRepository, WorkflowRepository};
use gantry_strategy::StrategyRegistry;

use crate::error::ApiError;

/// Per-provider, per-tenant webhook signing secrets.
#[derive(Debug, Clone, Default)]
pub struct WebhookSecrets {
    secrets: HashMap<String, String>,
}

impl WebhookSecrets {
    /// Create an empty secret set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret for `(provider, tenant)`, builder-style.
    #[must_use]
    pub fn with(mut self, provider: &str, tenant: TenantId, secret: impl Into<String>) -> Self {
        self.secrets.insert(Self::key(provider, tenant), secret.into());
        self
    }

    /// Look up the secret for `(provider, tenant)`.
    #[must_use]
    pub fn get(&self, provider: &str, tenant: TenantId) -> Option<&str> {
        self.secrets.get(&Self::key(provider, tenant)).map(String::as_str)
    }

    fn key(provider: &str, tenant: TenantId) -> String {
        format!("{provider}:{tenant}")
    }
}

/// Everything the route handlers need.
#[derive(Clone)]
pub struct AppState {
    /// The execution engine.
    pub engine: Arc<Engine>,
    /// Workflow definitions.
    pub workflows: Arc<dyn WorkflowRepository>,
    /// Run snapshots.
    pub executions: Arc<dyn ExecutionRepository>,
    /// Scheduled events.
    pub schedules: Arc<dyn ScheduledEventRepository>,
    /// Strategy registry for config validation.
    pub strategies: Arc<StrategyRegistry>,
    /// Webhook signing secrets.
    pub webhook_secrets: Arc<WebhookSecrets>,
}

/// Extract the tenant from the `X-Tenant-Id` header.
pub fn tenant_from_headers(headers: &HeaderMap) -> Result<TenantId, ApiError> {
    let raw = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Validation("missing X-Tenant-Id header".into()))?;
    raw.parse()
        .map_err(|_| ApiError::Validation("X-Tenant-Id must be a UUID".into()))
}
