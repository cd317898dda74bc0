//! Concurrency policies for detail collection
//!
//! All three policies run the same [`UnitOfWork`] over the same URL list and differ
//! only in how many units are in flight and who drives them:
//! - [`WorkerPool`]: N spawned workers pulling from a shared queue
//! - [`InFlightLimit`]: one task multiplexing every unit behind a semaphore
//! - [`Sequential`]: one unit at a time with a pause after each

use crate::config::{CollectConfig, ConcurrencyMode};
use crate::crawler::orchestrator::UnitOfWork;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Strategy for dispatching units of work
#[async_trait]
pub trait DispatchPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Runs `unit` once per URL and returns when every URL has been handled
    /// or `cancel` fires
    async fn dispatch(&self, urls: Vec<String>, unit: Arc<UnitOfWork>, cancel: CancellationToken);
}

/// Builds the policy selected by the collection config
pub fn build_policy(config: &CollectConfig) -> Box<dyn DispatchPolicy> {
    match config.mode {
        ConcurrencyMode::WorkerPool => Box::new(WorkerPool::new(config.concurrency)),
        ConcurrencyMode::InFlight => Box::new(InFlightLimit::new(config.concurrency)),
        ConcurrencyMode::Sequential => {
            Box::new(Sequential::new(Duration::from_millis(config.request_delay_ms)))
        }
    }
}

/// Fixed number of workers sharing one queue
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

#[async_trait]
impl DispatchPolicy for WorkerPool {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    async fn dispatch(&self, urls: Vec<String>, unit: Arc<UnitOfWork>, cancel: CancellationToken) {
        let workers = self.workers.min(urls.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(urls)));

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let unit = Arc::clone(&unit);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                        let Some(url) = next else { break };

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                tracing::debug!("Worker {} stopping on cancellation", id);
                                break;
                            }
                            _ = unit.process(&url) => {}
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }
    }
}

/// Single task with at most `limit` units in flight
pub struct InFlightLimit {
    limit: usize,
}

impl InFlightLimit {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }
}

#[async_trait]
impl DispatchPolicy for InFlightLimit {
    fn name(&self) -> &'static str {
        "in-flight"
    }

    async fn dispatch(&self, urls: Vec<String>, unit: Arc<UnitOfWork>, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.limit));

        // Permits are taken inside each future so the set keeps being polled
        let mut in_flight: FuturesUnordered<_> = urls
            .into_iter()
            .map(|url| {
                let semaphore = Arc::clone(&semaphore);
                let unit = Arc::clone(&unit);
                let cancel = cancel.clone();
                async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        permit = semaphore.acquire_owned() => {
                            let Ok(_permit) = permit else { return };
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => {}
                                _ = unit.process(&url) => {}
                            }
                        }
                    }
                }
            })
            .collect();

        while in_flight.next().await.is_some() {}
    }
}

/// One unit at a time with a pause after each
pub struct Sequential {
    delay: Duration,
}

impl Sequential {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl DispatchPolicy for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn dispatch(&self, urls: Vec<String>, unit: Arc<UnitOfWork>, cancel: CancellationToken) {
        for url in urls {
            if cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = unit.process(&url) => {}
            }

            if !self.delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
        }
    }
}
