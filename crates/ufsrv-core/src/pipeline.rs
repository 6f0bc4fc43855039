//! Async receive pipeline.
//!
//! Envelopes are processed on tokio's blocking pool, at most
//! `worker_concurrency` at a time. Every worker shares the processor's
//! cipher and therefore its single session lock, so ratchet state is still
//! touched by one worker at a time; only decoding, bypass and native-push
//! work runs in parallel.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::receiving::{EnvelopeProcessor, ReceiveOutcome, ReceiveSummary};
use crate::{CoreError, Result};

/// Bounded worker pool over an [`EnvelopeProcessor`].
#[derive(Clone)]
pub struct ReceivePipeline {
    processor: Arc<EnvelopeProcessor>,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl ReceivePipeline {
    /// Create a pipeline running at most `concurrency` workers.
    ///
    /// A concurrency of zero is raised to one.
    pub fn new(processor: EnvelopeProcessor, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            processor: Arc::new(processor),
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    /// Maximum number of concurrent workers.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process one serialized envelope.
    pub async fn process(&self, envelope: Vec<u8>) -> Result<ReceiveOutcome> {
        self.spawn(envelope).await?
    }

    /// Process a batch of serialized envelopes.
    ///
    /// Outcomes are returned in input order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Worker`] if a worker panicked.
    pub async fn process_batch(&self, envelopes: Vec<Vec<u8>>) -> Result<Vec<ReceiveOutcome>> {
        let count = envelopes.len();
        let handles: Vec<_> = envelopes
            .into_iter()
            .map(|envelope| self.spawn(envelope))
            .collect();

        let mut outcomes = Vec::with_capacity(count);
        for handle in handles {
            outcomes.push(handle.await??);
        }

        let summary = ReceiveSummary::of(&outcomes);
        info!(
            count,
            delivered = summary.delivered,
            rejected = summary.rejected,
            "Processed envelope batch"
        );
        Ok(outcomes)
    }

    fn spawn(&self, envelope: Vec<u8>) -> JoinHandle<Result<ReceiveOutcome>> {
        let processor = self.processor.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| CoreError::Worker(e.to_string()))?;
            debug!(len = envelope.len(), "Worker picked up envelope");

            Ok(tokio::task::spawn_blocking(move || processor.process_bytes(&envelope)).await?)
        })
    }
}
