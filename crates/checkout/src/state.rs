//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::CheckoutConfig;
use crate::fulfillment::{FulfillmentDispatcher, ProviderRegistry};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CheckoutConfig,
    pool: PgPool,
    registry: Arc<ProviderRegistry>,
    dispatcher: Arc<FulfillmentDispatcher>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: CheckoutConfig,
        pool: PgPool,
        registry: Arc<ProviderRegistry>,
        dispatcher: Arc<FulfillmentDispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                registry,
                dispatcher,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.inner.registry
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<FulfillmentDispatcher> {
        &self.inner.dispatcher
    }
}
