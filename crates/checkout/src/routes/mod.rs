//! HTTP route definitions.

pub mod fulfillment;
pub mod tax;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// All routes for the checkout service.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/tax", tax::routes())
        .nest("/api/fulfillment", fulfillment::routes())
        .nest("/webhooks", webhooks::routes())
}
