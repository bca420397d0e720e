//! Fault-tolerant dispatch of physical-goods orders to print-on-demand
//! providers.
//!
//! Four heterogeneous provider APIs sit behind one
//! [`FulfillmentProvider`](provider::FulfillmentProvider) contract. Every
//! network call is routed through the provider's dedicated circuit breaker so
//! one provider's outage cannot consume request budget for the others.
//! Request state is durable: submission failures are persisted onto the
//! [`FulfillmentRequest`](crate::models::FulfillmentRequest) row rather than
//! thrown past the dispatcher, so operators always have a retryable record.

mod dispatcher;
mod gooten;
mod memory;
mod printful;
mod prodigi;
mod provider;
mod queue;
mod registry;
mod shapeways;

pub use dispatcher::{FulfillmentDispatcher, FulfillmentRequestStore};
pub use gooten::GootenProvider;
pub use memory::{InMemoryProviderConfigStore, InMemoryRequestStore};
pub use printful::PrintfulProvider;
pub use prodigi::ProdigiProvider;
pub use provider::FulfillmentProvider;
pub use queue::{spawn_submit_worker, FulfillmentQueue};
pub use registry::{ProviderConfigStore, ProviderRegistry, ProviderResolver};
pub use shapeways::ShapewaysProvider;

use std::time::Duration;

use pawprint_core::{FulfillmentRequestId, ProviderType, StoreId};
use thiserror::Error;

use crate::db::RepositoryError;

/// Error talking to one provider's API.
///
/// Not retried automatically by the adapter; the dispatcher persists it onto
/// the request row and operators retry explicitly.
#[derive(Debug, Error)]
pub enum ProviderApiError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned a non-success status.
    #[error("API error: {status} - {body}")]
    Api {
        status: u16,
        body: String,
    },

    /// The provider returned a shape the adapter's schema does not accept.
    #[error("unexpected {provider} response: {detail}")]
    UnexpectedResponse {
        provider: ProviderType,
        detail: String,
    },

    /// The request could not be built from the stored payload.
    #[error("invalid request for {provider}: {detail}")]
    InvalidRequest {
        provider: ProviderType,
        detail: String,
    },

    /// Fast-failed by the circuit breaker; back off instead of retrying
    /// immediately.
    #[error("circuit breaker open for {provider}, retry in {}s", retry_after.as_secs())]
    CircuitOpen {
        provider: ProviderType,
        retry_after: Duration,
    },

    /// The call exceeded the bounded per-call timeout.
    #[error("request to {provider} timed out after {}s", timeout.as_secs())]
    Timeout {
        provider: ProviderType,
        timeout: Duration,
    },
}

/// Errors surfaced by the dispatcher and registry.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("fulfillment request not found: {0}")]
    RequestNotFound(FulfillmentRequestId),

    /// Operator input rejected (e.g. retry from a non-retryable status).
    #[error("{0}")]
    Validation(String),

    /// No active credentials for the requested store/provider pair.
    #[error(
        "no active {provider} configuration for store {store_id}; \
         add credentials under fulfillment settings"
    )]
    ProviderNotConfigured {
        store_id: StoreId,
        provider: ProviderType,
    },

    #[error(transparent)]
    Provider(#[from] ProviderApiError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The submit queue is gone or saturated; the request stays pending.
    #[error("fulfillment queue unavailable")]
    QueueUnavailable,
}
