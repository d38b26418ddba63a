use std::sync::Arc;

use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use super::payload::{self, PayloadError};
use crate::readings::{repo::ReadingRepo, utc_now_naive};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("ingest queue is full")]
    QueueFull,
    #[error("ingest queue is closed")]
    Closed,
}

/// Producer handle onto the bounded ingest queue.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<f64>,
}

impl IngestQueue {
    /// Parses a raw message and enqueues its value. Never waits: a full queue
    /// rejects the message.
    pub fn submit(&self, raw: &[u8]) -> Result<f64, IngestError> {
        let value = payload::parse(raw)?;
        self.tx.try_send(value).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => IngestError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => IngestError::Closed,
        })?;
        Ok(value)
    }

    /// Like [`submit`](Self::submit), but failures are logged and dropped.
    pub fn submit_or_drop(&self, raw: &[u8]) {
        match self.submit(raw) {
            Ok(value) => debug!(value, "reading queued"),
            Err(IngestError::Payload(e)) => warn!(error = %e, "discarding sensor message"),
            Err(e) => warn!(error = %e, "dropping sensor message"),
        }
    }
}

/// Fixed pool of workers persisting queued readings. With one worker, writes land
/// in arrival order.
pub struct IngestPipeline {
    queue: IngestQueue,
    workers: Vec<JoinHandle<()>>,
}

impl IngestPipeline {
    pub fn start(repo: Arc<dyn ReadingRepo>, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..workers)
            .map(|id| tokio::spawn(worker(id, rx.clone(), repo.clone())))
            .collect::<Vec<_>>();
        info!(capacity, workers = workers.len(), "ingest pipeline started");
        Self {
            queue: IngestQueue { tx },
            workers,
        }
    }

    pub fn queue(&self) -> IngestQueue {
        self.queue.clone()
    }

    /// Closes the queue and waits for the workers to drain it. Every other
    /// [`IngestQueue`] clone must already be dropped, or this waits for them.
    pub async fn shutdown(self) {
        drop(self.queue);
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!(error = %e, "ingest worker panicked");
            }
        }
        info!("ingest pipeline stopped");
    }
}

async fn worker(id: usize, rx: Arc<Mutex<mpsc::Receiver<f64>>>, repo: Arc<dyn ReadingRepo>) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(value) = next else { break };
        match repo.insert(value, utc_now_naive()).await {
            Ok(reading) => info!(worker = id, reading_id = reading.id, value, "reading stored"),
            Err(e) => error!(worker = id, value, error = %format!("{e:#}"), "dropping reading"),
        }
    }
    debug!(worker = id, "ingest worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryReadingRepo;

    #[tokio::test]
    async fn persists_valid_messages_in_order() {
        let repo = Arc::new(MemoryReadingRepo::default());
        let pipeline = IngestPipeline::start(repo.clone(), 16, 1);
        let queue = pipeline.queue();

        let messages: [&[u8]; 3] = [br#"{"value": 1.5}"#, br#"{"value": 2}"#, br#"{"value": 3.25}"#];
        for raw in messages {
            queue.submit(raw).unwrap();
        }
        drop(queue);
        pipeline.shutdown().await;

        let values: Vec<f64> = repo.readings().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.5, 2.0, 3.25]);
    }

    #[tokio::test]
    async fn malformed_messages_persist_nothing() {
        let repo = Arc::new(MemoryReadingRepo::default());
        let pipeline = IngestPipeline::start(repo.clone(), 16, 1);
        let queue = pipeline.queue();

        assert!(matches!(
            queue.submit(b"not json"),
            Err(IngestError::Payload(PayloadError::NotJson(_)))
        ));
        assert!(matches!(
            queue.submit(br#"{"temp": 1}"#),
            Err(IngestError::Payload(PayloadError::MissingValue))
        ));
        queue.submit_or_drop(b"{");
        drop(queue);
        pipeline.shutdown().await;

        assert!(repo.readings().is_empty());
    }

    #[tokio::test]
    async fn full_queue_rejects_instead_of_blocking() {
        let repo = Arc::new(MemoryReadingRepo::default());
        repo.hold_writes();
        let pipeline = IngestPipeline::start(repo.clone(), 1, 1);
        let queue = pipeline.queue();

        // First value is taken by the worker (then blocks on the held store),
        // second fills the single slot, the next one has nowhere to go.
        queue.submit(br#"{"value": 1}"#).unwrap();
        repo.wait_for_pending_write().await;
        queue.submit(br#"{"value": 2}"#).unwrap();
        assert!(matches!(
            queue.submit(br#"{"value": 3}"#),
            Err(IngestError::QueueFull)
        ));

        repo.release_writes();
        drop(queue);
        pipeline.shutdown().await;
        assert_eq!(repo.readings().len(), 2);
    }

    #[tokio::test]
    async fn store_failure_is_dropped_and_worker_keeps_going() {
        let repo = Arc::new(MemoryReadingRepo::default());
        repo.fail_next_insert();
        let pipeline = IngestPipeline::start(repo.clone(), 8, 1);
        let queue = pipeline.queue();

        queue.submit(br#"{"value": 10}"#).unwrap();
        queue.submit(br#"{"value": 11}"#).unwrap();
        drop(queue);
        pipeline.shutdown().await;

        let values: Vec<f64> = repo.readings().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![11.0]);
    }

    #[tokio::test]
    async fn several_workers_drain_everything() {
        let repo = Arc::new(MemoryReadingRepo::default());
        let pipeline = IngestPipeline::start(repo.clone(), 64, 4);
        let queue = pipeline.queue();
        for i in 0..40 {
            queue.submit(format!(r#"{{"value": {i}}}"#).as_bytes()).unwrap();
        }
        drop(queue);
        pipeline.shutdown().await;
        assert_eq!(repo.readings().len(), 40);
    }
}
