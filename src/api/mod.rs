pub mod admin;
pub mod bookings;
pub mod commission;
pub mod health;
pub mod notifications;
pub mod provider;
pub mod services;

use crate::config::Config;
use crate::engine::identity::ProviderIdentity;
use crate::error::AppError;
use crate::orchestration::{Actor, Marketplace};
use axum::{
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub marketplace: Arc<Marketplace>,
    pub config: Config,
}

impl AppState {
    pub fn new(marketplace: Arc<Marketplace>, config: Config) -> Self {
        Self {
            marketplace,
            config,
        }
    }
}

/// Provider identity passed as `providerId` and comma-separated `emails`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityQuery {
    pub provider_id: Option<String>,
    pub emails: Option<String>,
}

impl IdentityQuery {
    /// `None` when neither parameter carries a usable value.
    pub fn identity(&self) -> Option<ProviderIdentity> {
        let emails = self
            .emails
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let identity = ProviderIdentity::new(self.provider_id.as_deref(), emails);
        (!identity.is_empty()).then_some(identity)
    }

    pub fn require_identity(&self) -> Result<ProviderIdentity, AppError> {
        self.identity().ok_or_else(|| {
            AppError::BadRequest("providerId or emails is required".to_string())
        })
    }

    /// Provider when an identity is given, administrator otherwise.
    pub fn actor(&self) -> Actor {
        match self.identity() {
            Some(identity) => Actor::Provider(identity),
            None => Actor::Administrator,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/commission", get(commission::get_commission))
        .route("/v1/services", get(services::get_catalog))
        .route("/v1/provider/bookings", get(provider::get_bookings))
        .route("/v1/provider/services", get(provider::get_services))
        .route("/v1/provider/summary", get(provider::get_summary))
        .route("/v1/bookings/:id/status", patch(bookings::update_status))
        .route("/v1/bookings/:id", axum::routing::delete(bookings::delete))
        .route("/v1/services/:id/status", patch(services::update_status))
        .route("/v1/services/:id", axum::routing::delete(services::delete))
        .route(
            "/v1/notifications",
            get(notifications::get_feed).post(notifications::send),
        )
        .route("/v1/notifications/seen", post(notifications::mark_seen))
        .route("/v1/notifications/clear", post(notifications::clear))
        .route("/v1/admin/summary", get(admin::get_summary))
        .route(
            "/v1/admin/reports/bookings.csv",
            get(admin::get_bookings_csv),
        )
        .route("/v1/admin/reconciliation", get(admin::get_reconciliation))
        .route(
            "/v1/admin/reconciliation/:collection/:id",
            axum::routing::delete(admin::discard_pending),
        )
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_query() {
        let q = IdentityQuery {
            provider_id: Some("SP-1".into()),
            emails: Some(" a@x.com, ,B@x.com".into()),
        };
        let identity = q.identity().unwrap();
        assert_eq!(identity.provider_id.as_deref(), Some("sp-1"));
        assert_eq!(identity.aliases.len(), 2);
        assert!(matches!(q.actor(), Actor::Provider(_)));

        let empty = IdentityQuery::default();
        assert!(empty.identity().is_none());
        assert_eq!(empty.actor(), Actor::Administrator);
        assert!(empty.require_identity().is_err());
    }
}
