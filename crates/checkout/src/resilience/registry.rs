//! Per-provider circuit breaker registry.

use std::collections::HashMap;
use std::sync::Arc;

use pawprint_core::ProviderType;

use super::{BreakerConfig, BreakerSnapshot, CircuitBreaker};

/// Owns one [`CircuitBreaker`] per provider type for the process lifetime.
///
/// Constructed once at startup and passed by dependency injection, so tests
/// can build isolated registries and a future shared backing store would be a
/// registry swap rather than a call-site change. Breaker state is
/// process-local; scaled-out instances trip independently.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: HashMap<ProviderType, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Build a registry with one breaker per provider, all sharing `config`.
    #[must_use]
    pub fn new(config: &BreakerConfig) -> Self {
        let breakers = ProviderType::ALL
            .into_iter()
            .map(|provider| {
                (
                    provider,
                    Arc::new(CircuitBreaker::new(provider.as_str(), config.clone())),
                )
            })
            .collect();
        Self { breakers }
    }

    /// The breaker guarding calls to `provider`.
    ///
    /// # Panics
    ///
    /// Never panics in practice: the map is populated for every variant of
    /// the closed [`ProviderType`] enum at construction.
    #[must_use]
    pub fn for_provider(&self, provider: ProviderType) -> Arc<CircuitBreaker> {
        Arc::clone(
            self.breakers
                .get(&provider)
                .expect("registry covers every provider type"),
        )
    }

    /// Snapshots of every breaker, for the admin surface.
    #[must_use]
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(&BreakerConfig::default())
    }
}
