//! Provider resolution: `(store, provider type)` to a ready adapter.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use pawprint_core::{ProviderType, StoreId};

use crate::db::RepositoryError;
use crate::models::FulfillmentProviderConfig;
use crate::resilience::BreakerRegistry;

use super::{
    FulfillmentError, FulfillmentProvider, GootenProvider, PrintfulProvider, ProdigiProvider,
    ShapewaysProvider,
};

/// Storage port for provider credentials.
#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    /// The active config for `(store_id, provider)`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    async fn active_config(
        &self,
        store_id: StoreId,
        provider: ProviderType,
    ) -> Result<Option<FulfillmentProviderConfig>, RepositoryError>;
}

/// Resolution port consumed by the dispatcher and webhook routes, so tests
/// can substitute a stub provider without any HTTP machinery.
#[async_trait]
pub trait ProviderResolver: Send + Sync {
    /// Resolve a ready adapter for `(store_id, provider)`.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::ProviderNotConfigured`] when no active
    /// credentials exist for the pair.
    async fn resolve(
        &self,
        store_id: StoreId,
        provider: ProviderType,
    ) -> Result<Arc<dyn FulfillmentProvider>, FulfillmentError>;
}

/// Lazily constructs one adapter per `(store, provider type)` and memoizes it
/// for the process lifetime. Breakers come from the shared
/// [`BreakerRegistry`]: one per provider type, so every store's calls to a
/// provider share that provider's failure budget.
pub struct ProviderRegistry {
    configs: Arc<dyn ProviderConfigStore>,
    breakers: Arc<BreakerRegistry>,
    call_timeout: Duration,
    adapters: RwLock<HashMap<(StoreId, ProviderType), Arc<dyn FulfillmentProvider>>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(
        configs: Arc<dyn ProviderConfigStore>,
        breakers: Arc<BreakerRegistry>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            configs,
            breakers,
            call_timeout,
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// The breaker registry backing this provider registry.
    #[must_use]
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    fn cached(&self, key: (StoreId, ProviderType)) -> Option<Arc<dyn FulfillmentProvider>> {
        self.adapters
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Construct the adapter for a config. Exhaustive over the closed
    /// [`ProviderType`] enum: adding a provider is a compile-time change, not
    /// a runtime fallthrough.
    fn build(
        &self,
        config: &FulfillmentProviderConfig,
    ) -> Result<Arc<dyn FulfillmentProvider>, FulfillmentError> {
        let breaker = self.breakers.for_provider(config.provider);
        let adapter: Arc<dyn FulfillmentProvider> = match config.provider {
            ProviderType::Printful => {
                Arc::new(PrintfulProvider::new(config, breaker, self.call_timeout)?)
            }
            ProviderType::Gooten => {
                Arc::new(GootenProvider::new(config, breaker, self.call_timeout)?)
            }
            ProviderType::Prodigi => {
                Arc::new(ProdigiProvider::new(config, breaker, self.call_timeout)?)
            }
            ProviderType::Shapeways => {
                Arc::new(ShapewaysProvider::new(config, breaker, self.call_timeout)?)
            }
        };
        Ok(adapter)
    }
}

#[async_trait]
impl ProviderResolver for ProviderRegistry {
    async fn resolve(
        &self,
        store_id: StoreId,
        provider: ProviderType,
    ) -> Result<Arc<dyn FulfillmentProvider>, FulfillmentError> {
        let key = (store_id, provider);
        if let Some(adapter) = self.cached(key) {
            return Ok(adapter);
        }

        let config = self
            .configs
            .active_config(store_id, provider)
            .await?
            .filter(|config| config.is_active)
            .ok_or(FulfillmentError::ProviderNotConfigured { store_id, provider })?;

        let adapter = self.build(&config)?;
        self.adapters
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, Arc::clone(&adapter));

        tracing::debug!(store_id = %store_id, provider = %provider, "constructed provider adapter");
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pawprint_core::ProviderConfigId;
    use secrecy::SecretString;

    use crate::fulfillment::InMemoryProviderConfigStore;
    use crate::resilience::BreakerConfig;

    use super::*;

    fn config(store_id: StoreId, provider: ProviderType, is_active: bool) -> FulfillmentProviderConfig {
        FulfillmentProviderConfig {
            id: ProviderConfigId::generate(),
            store_id,
            provider,
            api_key: SecretString::from("test-key".to_string()),
            api_secret: None,
            config: serde_json::json!({}),
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn registry(configs: InMemoryProviderConfigStore) -> ProviderRegistry {
        ProviderRegistry::new(
            Arc::new(configs),
            Arc::new(BreakerRegistry::new(&BreakerConfig::default())),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_missing_config_is_unconfigured_error() {
        let registry = registry(InMemoryProviderConfigStore::new());
        let result = registry
            .resolve(StoreId::generate(), ProviderType::Printful)
            .await;
        assert!(matches!(
            result,
            Err(FulfillmentError::ProviderNotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn test_inactive_config_is_unconfigured_error() {
        let store_id = StoreId::generate();
        let configs = InMemoryProviderConfigStore::new();
        configs.insert(config(store_id, ProviderType::Gooten, false));

        let registry = registry(configs);
        let result = registry.resolve(store_id, ProviderType::Gooten).await;
        assert!(matches!(
            result,
            Err(FulfillmentError::ProviderNotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolves_and_memoizes_adapter() {
        let store_id = StoreId::generate();
        let configs = InMemoryProviderConfigStore::new();
        configs.insert(config(store_id, ProviderType::Prodigi, true));

        let registry = registry(configs);
        let first = registry
            .resolve(store_id, ProviderType::Prodigi)
            .await
            .expect("resolves");
        let second = registry
            .resolve(store_id, ProviderType::Prodigi)
            .await
            .expect("resolves");

        assert_eq!(first.provider_type(), ProviderType::Prodigi);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_every_provider_type_constructs() {
        let store_id = StoreId::generate();
        let configs = InMemoryProviderConfigStore::new();
        for provider in ProviderType::ALL {
            configs.insert(config(store_id, provider, true));
        }

        let registry = registry(configs);
        for provider in ProviderType::ALL {
            let adapter = registry
                .resolve(store_id, provider)
                .await
                .expect("adapter builds");
            assert_eq!(adapter.provider_type(), provider);
        }
    }
}
