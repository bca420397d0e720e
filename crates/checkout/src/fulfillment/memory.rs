//! In-memory store implementations.
//!
//! Suitable for tests and local development. Not for production use: state
//! dies with the process and there is no cross-instance visibility.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use pawprint_core::{FulfillmentRequestId, FulfillmentStatus, ProviderType, StoreId};

use crate::db::RepositoryError;
use crate::models::{FulfillmentProviderConfig, FulfillmentRequest};

use super::dispatcher::FulfillmentRequestStore;
use super::registry::ProviderConfigStore;

/// In-memory implementation of [`FulfillmentRequestStore`].
#[derive(Debug, Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<HashMap<FulfillmentRequestId, FulfillmentRequest>>,
}

impl InMemoryRequestStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<FulfillmentRequestId, FulfillmentRequest>> {
        self.requests
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<FulfillmentRequestId, FulfillmentRequest>> {
        self.requests
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn update<F>(&self, id: FulfillmentRequestId, apply: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut FulfillmentRequest),
    {
        let mut requests = self.write();
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("fulfillment request {id}")))?;
        apply(request);
        request.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl FulfillmentRequestStore for InMemoryRequestStore {
    async fn insert(&self, request: &FulfillmentRequest) -> Result<(), RepositoryError> {
        self.write().insert(request.id, request.clone());
        Ok(())
    }

    async fn get(
        &self,
        id: FulfillmentRequestId,
    ) -> Result<Option<FulfillmentRequest>, RepositoryError> {
        Ok(self.read().get(&id).cloned())
    }

    async fn list(&self, store_id: StoreId) -> Result<Vec<FulfillmentRequest>, RepositoryError> {
        let mut requests: Vec<_> = self
            .read()
            .values()
            .filter(|request| request.store_id == store_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn find_by_external_id(
        &self,
        store_id: StoreId,
        provider: ProviderType,
        external_id: &str,
    ) -> Result<Option<FulfillmentRequest>, RepositoryError> {
        Ok(self
            .read()
            .values()
            .find(|request| {
                request.store_id == store_id
                    && request.provider == provider
                    && request.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn mark_submitted(
        &self,
        id: FulfillmentRequestId,
        external_id: &str,
    ) -> Result<(), RepositoryError> {
        self.update(id, |request| {
            request.status = FulfillmentStatus::Submitted;
            request.external_id = Some(external_id.to_string());
            request.error_message = None;
        })
    }

    async fn mark_failed(
        &self,
        id: FulfillmentRequestId,
        error_message: &str,
    ) -> Result<(), RepositoryError> {
        self.update(id, |request| {
            request.status = FulfillmentStatus::Failed;
            request.error_message = Some(error_message.to_string());
        })
    }

    async fn set_status(
        &self,
        id: FulfillmentRequestId,
        status: FulfillmentStatus,
    ) -> Result<(), RepositoryError> {
        self.update(id, |request| request.status = status)
    }

    async fn reset_for_retry(&self, id: FulfillmentRequestId) -> Result<(), RepositoryError> {
        self.update(id, |request| {
            request.status = FulfillmentStatus::Pending;
            request.external_id = None;
            request.error_message = None;
        })
    }
}

/// In-memory implementation of [`ProviderConfigStore`].
#[derive(Debug, Default)]
pub struct InMemoryProviderConfigStore {
    configs: RwLock<HashMap<(StoreId, ProviderType), FulfillmentProviderConfig>>,
}

impl InMemoryProviderConfigStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a config (for test setup).
    pub fn insert(&self, config: FulfillmentProviderConfig) {
        self.configs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((config.store_id, config.provider), config);
    }
}

#[async_trait]
impl ProviderConfigStore for InMemoryProviderConfigStore {
    async fn active_config(
        &self,
        store_id: StoreId,
        provider: ProviderType,
    ) -> Result<Option<FulfillmentProviderConfig>, RepositoryError> {
        Ok(self
            .configs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(store_id, provider))
            .cloned())
    }
}
