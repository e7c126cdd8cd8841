//! Worker pool
//!
//! Bounded pool draining the fire channel. Each worker handles one fire at a
//! time; lifecycle transitions are persisted by the executor before the
//! worker picks up the next fire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::{Fire, TriggerEngine, UserDataExecutor};

/// Cancellation tokens for queued and in-flight fires, keyed by job id.
/// Deleting a job cancels its token; workers observe it at suspension points.
#[derive(Clone, Default)]
pub struct CancellationMap {
    inner: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl CancellationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, job_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        self.inner.lock().unwrap().insert(job_id, token.clone());
        token
    }

    pub fn cancel(&self, job_id: &Uuid) -> bool {
        match self.inner.lock().unwrap().get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, job_id: &Uuid) {
        self.inner.lock().unwrap().remove(job_id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct WorkerPool {
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Fire>>>,
    executor: Arc<UserDataExecutor>,
    engine: Arc<TriggerEngine>,
    cancellations: CancellationMap,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(
        rx: mpsc::Receiver<Fire>,
        executor: Arc<UserDataExecutor>,
        engine: Arc<TriggerEngine>,
        cancellations: CancellationMap,
        concurrency: usize,
    ) -> Self {
        Self {
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            executor,
            engine,
            cancellations,
            concurrency,
        }
    }

    /// Spawn the workers. They exit when the fire channel closes.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        (0..self.concurrency)
            .map(|worker| {
                let rx = self.rx.clone();
                let executor = self.executor.clone();
                let engine = self.engine.clone();
                let cancellations = self.cancellations.clone();
                tokio::spawn(async move {
                    debug!("worker {} started", worker);
                    loop {
                        let fire = {
                            let mut rx = rx.lock().await;
                            rx.recv().await
                        };
                        let Some(fire) = fire else { break };
                        let job_id = fire.job_id;
                        executor.execute(fire).await;
                        cancellations.remove(&job_id);
                        engine.complete(job_id);
                    }
                    debug!("worker {} stopped", worker);
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_map_register_and_cancel() {
        let map = CancellationMap::new();
        let job_id = Uuid::new_v4();

        let token = map.register(job_id);
        assert!(!token.is_cancelled());
        assert_eq!(map.len(), 1);

        assert!(map.cancel(&job_id));
        assert!(token.is_cancelled());

        map.remove(&job_id);
        assert!(map.is_empty());
        assert!(!map.cancel(&job_id));
    }

    #[test]
    fn test_cancel_unknown_job_is_noop() {
        let map = CancellationMap::new();
        assert!(!map.cancel(&Uuid::new_v4()));
    }
}
