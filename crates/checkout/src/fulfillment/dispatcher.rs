//! Fulfillment request dispatch and the retry-from-failure state machine.
//!
//! The `FulfillmentRequest` row is the single source of truth; all mutation
//! goes through the dispatcher so the status machine stays consistent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pawprint_core::{FulfillmentRequestId, FulfillmentStatus, ProviderType, StoreId};
use tracing::{info, instrument, warn};

use crate::db::RepositoryError;
use crate::models::{FulfillmentRequest, NewFulfillmentRequest, NewProviderOrder};

use super::{FulfillmentError, FulfillmentQueue, ProviderResolver};

/// Storage port for fulfillment request rows.
///
/// Implemented by the Postgres repository and by an in-memory store for
/// tests. Rows are never deleted.
#[async_trait]
pub trait FulfillmentRequestStore: Send + Sync {
    /// # Errors
    /// Returns an error if persistence fails.
    async fn insert(&self, request: &FulfillmentRequest) -> Result<(), RepositoryError>;

    /// # Errors
    /// Returns an error if the lookup fails.
    async fn get(
        &self,
        id: FulfillmentRequestId,
    ) -> Result<Option<FulfillmentRequest>, RepositoryError>;

    /// All requests for a store, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn list(&self, store_id: StoreId) -> Result<Vec<FulfillmentRequest>, RepositoryError>;

    /// Find the request a provider webhook refers to.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    async fn find_by_external_id(
        &self,
        store_id: StoreId,
        provider: ProviderType,
        external_id: &str,
    ) -> Result<Option<FulfillmentRequest>, RepositoryError>;

    /// Record a successful submission.
    ///
    /// # Errors
    /// Returns an error if persistence fails.
    async fn mark_submitted(
        &self,
        id: FulfillmentRequestId,
        external_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Record a failed submission.
    ///
    /// # Errors
    /// Returns an error if persistence fails.
    async fn mark_failed(
        &self,
        id: FulfillmentRequestId,
        error_message: &str,
    ) -> Result<(), RepositoryError>;

    /// Set the status without touching other fields.
    ///
    /// # Errors
    /// Returns an error if persistence fails.
    async fn set_status(
        &self,
        id: FulfillmentRequestId,
        status: FulfillmentStatus,
    ) -> Result<(), RepositoryError>;

    /// Back to `pending` with `external_id` and `error_message` cleared.
    ///
    /// # Errors
    /// Returns an error if persistence fails.
    async fn reset_for_retry(&self, id: FulfillmentRequestId) -> Result<(), RepositoryError>;
}

/// Persists request state, invokes provider adapters through the registry,
/// and exposes retry-from-failure.
pub struct FulfillmentDispatcher {
    requests: Arc<dyn FulfillmentRequestStore>,
    providers: Arc<dyn ProviderResolver>,
    queue: FulfillmentQueue,
}

impl FulfillmentDispatcher {
    #[must_use]
    pub fn new(
        requests: Arc<dyn FulfillmentRequestStore>,
        providers: Arc<dyn ProviderResolver>,
        queue: FulfillmentQueue,
    ) -> Self {
        Self {
            requests,
            providers,
            queue,
        }
    }

    /// The request store, shared with the webhook route.
    #[must_use]
    pub fn requests(&self) -> &Arc<dyn FulfillmentRequestStore> {
        &self.requests
    }

    /// Create a request for an order that needs physical fulfillment and
    /// enqueue it for background submission.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails or the queue is unavailable.
    #[instrument(skip(self, input), fields(store_id = %input.store_id, provider = %input.provider))]
    pub async fn create(
        &self,
        input: NewFulfillmentRequest,
    ) -> Result<FulfillmentRequest, FulfillmentError> {
        let now = Utc::now();
        let request = FulfillmentRequest {
            id: FulfillmentRequestId::generate(),
            store_id: input.store_id,
            order_id: input.order_id,
            provider: input.provider,
            status: FulfillmentStatus::Pending,
            external_id: None,
            error_message: None,
            payload: input.payload,
            created_at: now,
            updated_at: now,
        };
        self.requests.insert(&request).await?;
        self.queue.enqueue(request.id)?;

        info!(request_id = %request.id, "created fulfillment request");
        Ok(request)
    }

    /// Submit a pending request to its provider.
    ///
    /// Runs on the background worker, never inline with an HTTP request.
    /// Provider failures - including breaker fast-fails and timeouts - are
    /// captured onto the row (`status = failed`, `error_message` set) instead
    /// of propagating, so operators always have a durable, retryable record.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::RequestNotFound`] for an unknown id and
    /// storage errors from persisting the outcome. Provider errors never
    /// escape this method.
    #[instrument(skip(self))]
    pub async fn submit(&self, request_id: FulfillmentRequestId) -> Result<(), FulfillmentError> {
        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or(FulfillmentError::RequestNotFound(request_id))?;

        let order = NewProviderOrder {
            order_id: request.order_id,
            recipient: request.payload.recipient.clone(),
            items: request.payload.items.clone(),
            shipping_method: request.payload.shipping_method.clone(),
        };

        let provider = match self.providers.resolve(request.store_id, request.provider).await {
            Ok(provider) => provider,
            Err(error) => {
                warn!(request_id = %request_id, error = %error, "provider unavailable");
                self.requests.mark_failed(request_id, &error.to_string()).await?;
                return Ok(());
            }
        };

        match provider.create_order(&order).await {
            Ok(provider_order) => {
                info!(
                    request_id = %request_id,
                    external_id = %provider_order.external_id,
                    "submitted fulfillment request"
                );
                self.requests
                    .mark_submitted(request_id, &provider_order.external_id)
                    .await?;
            }
            Err(error) => {
                warn!(request_id = %request_id, error = %error, "fulfillment submission failed");
                self.requests
                    .mark_failed(request_id, &error.to_string())
                    .await?;
            }
        }

        Ok(())
    }

    /// Retry a failed or cancelled request.
    ///
    /// Clears `external_id`/`error_message`, resets the status to `pending`,
    /// and re-enqueues for asynchronous processing - it does not block on the
    /// provider call completing. Retrying a request whose first attempt has
    /// not finished can duplicate the upstream order; the provider-side
    /// idempotency key is the only guard (see DESIGN.md).
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::RequestNotFound`] for an unknown id (or
    /// one belonging to another store) and
    /// [`FulfillmentError::Validation`] when the current status is not
    /// `failed` or `cancelled`; the row is left untouched in both cases.
    #[instrument(skip(self))]
    pub async fn retry(
        &self,
        store_id: StoreId,
        request_id: FulfillmentRequestId,
    ) -> Result<(), FulfillmentError> {
        let request = self
            .requests
            .get(request_id)
            .await?
            .filter(|request| request.store_id == store_id)
            .ok_or(FulfillmentError::RequestNotFound(request_id))?;

        if !request.status.can_retry() {
            return Err(FulfillmentError::Validation(format!(
                "Cannot retry request in {} status",
                request.status
            )));
        }

        self.requests.reset_for_retry(request_id).await?;
        self.queue.enqueue(request_id)?;

        info!(request_id = %request_id, "re-enqueued fulfillment request");
        Ok(())
    }

    /// Administratively cancel a request.
    ///
    /// Only changes the persisted status; an in-flight provider call is not
    /// aborted.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::RequestNotFound`] for an unknown id and
    /// [`FulfillmentError::Validation`] unless the status is `pending` or
    /// `failed`.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        store_id: StoreId,
        request_id: FulfillmentRequestId,
    ) -> Result<(), FulfillmentError> {
        let request = self
            .requests
            .get(request_id)
            .await?
            .filter(|request| request.store_id == store_id)
            .ok_or(FulfillmentError::RequestNotFound(request_id))?;

        if !request.status.can_cancel() {
            return Err(FulfillmentError::Validation(format!(
                "Cannot cancel request in {} status",
                request.status
            )));
        }

        self.requests
            .set_status(request_id, FulfillmentStatus::Cancelled)
            .await?;

        info!(request_id = %request_id, "cancelled fulfillment request");
        Ok(())
    }

    /// Apply a provider webhook event to the matching request.
    ///
    /// The event is matched by external order id, which doubles as the
    /// order-id cross-check compensating for providers without webhook
    /// signing. Returns `None` - and changes nothing - when no request
    /// matches or the request is not in a provider-driven state
    /// (`submitted`/`shipped`).
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or the status write fails.
    #[instrument(skip(self))]
    pub async fn record_provider_event(
        &self,
        store_id: StoreId,
        provider: ProviderType,
        external_id: &str,
        status: FulfillmentStatus,
    ) -> Result<Option<FulfillmentRequestId>, FulfillmentError> {
        let Some(request) = self
            .requests
            .find_by_external_id(store_id, provider, external_id)
            .await?
        else {
            warn!(provider = %provider, external_id = %external_id, "webhook for unknown order");
            return Ok(None);
        };

        if !matches!(
            request.status,
            FulfillmentStatus::Submitted | FulfillmentStatus::Shipped
        ) {
            warn!(
                request_id = %request.id,
                current = %request.status,
                incoming = %status,
                "ignoring webhook for request outside provider-driven states"
            );
            return Ok(None);
        }

        self.requests.set_status(request.id, status).await?;
        info!(request_id = %request.id, status = %status, "applied provider event");
        Ok(Some(request.id))
    }

    /// Fetch one request, store-scoped.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::RequestNotFound`] for an unknown id or one
    /// belonging to another store.
    pub async fn get(
        &self,
        store_id: StoreId,
        request_id: FulfillmentRequestId,
    ) -> Result<FulfillmentRequest, FulfillmentError> {
        self.requests
            .get(request_id)
            .await?
            .filter(|request| request.store_id == store_id)
            .ok_or(FulfillmentError::RequestNotFound(request_id))
    }

    /// List a store's requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<FulfillmentRequest>, FulfillmentError> {
        Ok(self.requests.list(store_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use pawprint_core::OrderId;

    use crate::fulfillment::{FulfillmentProvider, InMemoryRequestStore, ProviderApiError};
    use crate::models::{
        CatalogProduct, OrderItem, ProviderOrder, Recipient, ShippingRate, SubmissionPayload,
    };

    use super::*;

    /// Provider stub with scripted create_order outcomes.
    struct StubProvider {
        outcome: Result<String, String>,
        calls: std::sync::atomic::AtomicU32,
    }

    impl StubProvider {
        fn succeeding(external_id: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(external_id.to_string()),
                calls: std::sync::atomic::AtomicU32::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(message.to_string()),
                calls: std::sync::atomic::AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FulfillmentProvider for StubProvider {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Printful
        }

        async fn create_order(
            &self,
            _order: &NewProviderOrder,
        ) -> Result<ProviderOrder, ProviderApiError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            match &self.outcome {
                Ok(external_id) => Ok(ProviderOrder {
                    external_id: external_id.clone(),
                    status: "draft".to_string(),
                    tracking_number: None,
                    tracking_url: None,
                }),
                Err(message) => Err(ProviderApiError::Api {
                    status: 502,
                    body: message.clone(),
                }),
            }
        }

        async fn get_order(&self, _id: &str) -> Result<ProviderOrder, ProviderApiError> {
            unreachable!("not exercised")
        }

        async fn cancel_order(&self, _id: &str) -> Result<(), ProviderApiError> {
            unreachable!("not exercised")
        }

        async fn shipping_rates(
            &self,
            _recipient: &Recipient,
            _items: &[OrderItem],
        ) -> Result<Vec<ShippingRate>, ProviderApiError> {
            unreachable!("not exercised")
        }

        async fn catalog(&self, _page: Option<u32>) -> Result<Vec<CatalogProduct>, ProviderApiError> {
            unreachable!("not exercised")
        }

        fn verify_webhook(&self, _payload: &[u8], _signature: &str) -> bool {
            true
        }
    }

    struct StubResolver {
        provider: Arc<StubProvider>,
    }

    #[async_trait]
    impl ProviderResolver for StubResolver {
        async fn resolve(
            &self,
            _store_id: StoreId,
            _provider: ProviderType,
        ) -> Result<Arc<dyn FulfillmentProvider>, FulfillmentError> {
            Ok(Arc::clone(&self.provider) as Arc<dyn FulfillmentProvider>)
        }
    }

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            recipient: Recipient {
                name: "Test Person".to_string(),
                email: None,
                phone: None,
                address1: "1 Test Ln".to_string(),
                address2: None,
                city: "Testville".to_string(),
                state_code: None,
                country_code: "US".to_string(),
                zip: "00001".to_string(),
            },
            items: vec![OrderItem {
                sku: "100".to_string(),
                quantity: 1,
                retail_price: None,
                name: None,
                attributes: serde_json::Value::Null,
            }],
            shipping_method: None,
        }
    }

    fn dispatcher(
        store: Arc<InMemoryRequestStore>,
        provider: Arc<StubProvider>,
    ) -> (FulfillmentDispatcher, tokio::sync::mpsc::Receiver<FulfillmentRequestId>) {
        let (queue, receiver) = FulfillmentQueue::new(16);
        (
            FulfillmentDispatcher::new(store, Arc::new(StubResolver { provider }), queue),
            receiver,
        )
    }

    async fn seeded_request(
        dispatcher: &FulfillmentDispatcher,
        store_id: StoreId,
    ) -> FulfillmentRequest {
        dispatcher
            .create(NewFulfillmentRequest {
                store_id,
                order_id: OrderId::generate(),
                provider: ProviderType::Printful,
                payload: payload(),
            })
            .await
            .expect("request created")
    }

    #[tokio::test]
    async fn test_create_enqueues_pending_request() {
        let store = Arc::new(InMemoryRequestStore::new());
        let (dispatcher, mut receiver) = dispatcher(Arc::clone(&store), StubProvider::succeeding("x"));
        let store_id = StoreId::generate();

        let request = seeded_request(&dispatcher, store_id).await;

        assert_eq!(request.status, FulfillmentStatus::Pending);
        assert_eq!(receiver.recv().await, Some(request.id));
    }

    #[tokio::test]
    async fn test_submit_success_persists_external_id() {
        let store = Arc::new(InMemoryRequestStore::new());
        let (dispatcher, _receiver) = dispatcher(Arc::clone(&store), StubProvider::succeeding("PF-1"));
        let request = seeded_request(&dispatcher, StoreId::generate()).await;

        dispatcher.submit(request.id).await.expect("submit runs");

        let stored = store.get(request.id).await.expect("lookup").expect("row exists");
        assert_eq!(stored.status, FulfillmentStatus::Submitted);
        assert_eq!(stored.external_id.as_deref(), Some("PF-1"));
        assert_eq!(stored.error_message, None);
    }

    #[tokio::test]
    async fn test_submit_failure_is_captured_not_propagated() {
        let store = Arc::new(InMemoryRequestStore::new());
        let (dispatcher, _receiver) =
            dispatcher(Arc::clone(&store), StubProvider::failing("upstream exploded"));
        let request = seeded_request(&dispatcher, StoreId::generate()).await;

        // The provider error must not escape the dispatcher boundary.
        dispatcher.submit(request.id).await.expect("submit captures failure");

        let stored = store.get(request.id).await.expect("lookup").expect("row exists");
        assert_eq!(stored.status, FulfillmentStatus::Failed);
        let message = stored.error_message.expect("error recorded");
        assert!(message.contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_submit_unknown_id_is_not_found() {
        let store = Arc::new(InMemoryRequestStore::new());
        let (dispatcher, _receiver) = dispatcher(store, StubProvider::succeeding("x"));

        let result = dispatcher.submit(FulfillmentRequestId::generate()).await;
        assert!(matches!(result, Err(FulfillmentError::RequestNotFound(_))));
    }

    #[tokio::test]
    async fn test_retry_rejected_for_submitted_status() {
        let store = Arc::new(InMemoryRequestStore::new());
        let provider = StubProvider::succeeding("PF-2");
        let (dispatcher, _receiver) = dispatcher(Arc::clone(&store), Arc::clone(&provider));
        let store_id = StoreId::generate();
        let request = seeded_request(&dispatcher, store_id).await;
        dispatcher.submit(request.id).await.expect("submit runs");

        let result = dispatcher.retry(store_id, request.id).await;

        let Err(FulfillmentError::Validation(message)) = result else {
            panic!("expected validation error, got {result:?}");
        };
        assert_eq!(message, "Cannot retry request in submitted status");

        // Row untouched: still submitted, external id intact, no new provider call.
        let stored = store.get(request.id).await.expect("lookup").expect("row exists");
        assert_eq!(stored.status, FulfillmentStatus::Submitted);
        assert_eq!(stored.external_id.as_deref(), Some("PF-2"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_failed_request_resets_and_enqueues() {
        let store = Arc::new(InMemoryRequestStore::new());
        let (dispatcher, mut receiver) =
            dispatcher(Arc::clone(&store), StubProvider::failing("boom"));
        let store_id = StoreId::generate();
        let request = seeded_request(&dispatcher, store_id).await;
        let _ = receiver.recv().await; // drain the create enqueue
        dispatcher.submit(request.id).await.expect("submit captures failure");

        dispatcher.retry(store_id, request.id).await.expect("retry allowed");

        let stored = store.get(request.id).await.expect("lookup").expect("row exists");
        assert_eq!(stored.status, FulfillmentStatus::Pending);
        assert_eq!(stored.external_id, None);
        assert_eq!(stored.error_message, None);
        // Re-enqueued, not submitted inline.
        assert_eq!(receiver.recv().await, Some(request.id));
    }

    #[tokio::test]
    async fn test_retry_scoped_by_store() {
        let store = Arc::new(InMemoryRequestStore::new());
        let (dispatcher, _receiver) = dispatcher(Arc::clone(&store), StubProvider::failing("boom"));
        let request = seeded_request(&dispatcher, StoreId::generate()).await;
        dispatcher.submit(request.id).await.expect("submit captures failure");

        let result = dispatcher.retry(StoreId::generate(), request.id).await;
        assert!(matches!(result, Err(FulfillmentError::RequestNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_only_from_pending_or_failed() {
        let store = Arc::new(InMemoryRequestStore::new());
        let (dispatcher, _receiver) = dispatcher(Arc::clone(&store), StubProvider::succeeding("PF-3"));
        let store_id = StoreId::generate();

        let pending = seeded_request(&dispatcher, store_id).await;
        dispatcher.cancel(store_id, pending.id).await.expect("pending cancels");
        let stored = store.get(pending.id).await.expect("lookup").expect("row exists");
        assert_eq!(stored.status, FulfillmentStatus::Cancelled);

        let submitted = seeded_request(&dispatcher, store_id).await;
        dispatcher.submit(submitted.id).await.expect("submit runs");
        let result = dispatcher.cancel(store_id, submitted.id).await;
        assert!(matches!(result, Err(FulfillmentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancelled_request_can_be_retried() {
        let store = Arc::new(InMemoryRequestStore::new());
        let (dispatcher, _receiver) = dispatcher(Arc::clone(&store), StubProvider::succeeding("x"));
        let store_id = StoreId::generate();
        let request = seeded_request(&dispatcher, store_id).await;
        dispatcher.cancel(store_id, request.id).await.expect("cancel allowed");

        dispatcher.retry(store_id, request.id).await.expect("retry allowed");
        let stored = store.get(request.id).await.expect("lookup").expect("row exists");
        assert_eq!(stored.status, FulfillmentStatus::Pending);
    }
}
