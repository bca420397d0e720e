//! Asynchronous submit queue.
//!
//! HTTP handlers never block on a provider call: creating or retrying a
//! request performs the state transition, pushes the id here, and returns.
//! A background worker drains the queue and drives the dispatcher.

use std::sync::Arc;

use pawprint_core::FulfillmentRequestId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{FulfillmentDispatcher, FulfillmentError};

/// Sending half of the submit queue.
#[derive(Clone)]
pub struct FulfillmentQueue {
    sender: mpsc::Sender<FulfillmentRequestId>,
}

impl FulfillmentQueue {
    /// Create a bounded queue; the receiver goes to
    /// [`spawn_submit_worker`].
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FulfillmentRequestId>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Enqueue a request for background submission without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::QueueUnavailable`] when the worker is gone
    /// or the queue is saturated; the request row stays `pending` and an
    /// operator can retry once capacity frees up.
    pub fn enqueue(&self, request_id: FulfillmentRequestId) -> Result<(), FulfillmentError> {
        self.sender
            .try_send(request_id)
            .map_err(|_| FulfillmentError::QueueUnavailable)
    }
}

/// Spawn the worker that drains the queue and submits each request.
///
/// Submission failures are persisted by the dispatcher; only storage-level
/// errors surface here, and they are logged rather than crashing the loop.
pub fn spawn_submit_worker(
    dispatcher: Arc<FulfillmentDispatcher>,
    mut receiver: mpsc::Receiver<FulfillmentRequestId>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request_id) = receiver.recv().await {
            if let Err(error) = dispatcher.submit(request_id).await {
                tracing::error!(
                    request_id = %request_id,
                    error = %error,
                    "fulfillment submission failed outside provider call"
                );
            }
        }
        tracing::info!("fulfillment queue closed, submit worker exiting");
    })
}
