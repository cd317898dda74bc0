//! Crawler module for listing walks and detail collection
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with retry and backoff
//! - Listing pagination and detail link extraction
//! - Pluggable concurrency policies
//! - Per-URL orchestration and counters
//! - Turning interrupts into cancellation

mod fetcher;
mod links;
mod orchestrator;
mod policy;
mod stats;

pub use fetcher::{build_http_client, FailureKind, FetchResult, PageFetcher, RetryPolicy, SessionPool};
pub use links::{
    discover_page_count, extract_detail_links, HttpListingSource, LinkCollection, LinkCollector,
    ListingSource,
};
pub use orchestrator::{Collection, Orchestrator, UnitOfWork, UnitVerdict};
pub use policy::{build_policy, DispatchPolicy, InFlightLimit, Sequential, WorkerPool};
pub use stats::{CollectionStats, StatsSnapshot};

use crate::config::Config;
use crate::extract::RecordAssembler;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs the link collection phase
///
/// Walks the listing over HTTP with a session pool of its own, which is closed
/// before returning.
pub async fn collect_links(config: &Config, cancel: &CancellationToken) -> LinkCollection {
    let source = HttpListingSource::new(PageFetcher::from_config(&config.fetch));
    let links = LinkCollector::new(&source, &config.listing)
        .collect(config.listing.max_pages, cancel)
        .await;
    source.close().await;
    links
}

/// Runs the detail collection phase
///
/// Fetches every URL under the configured policy. The session pool is closed
/// before returning, whether or not the run was cancelled.
pub async fn collect_records(
    config: &Config,
    urls: Vec<String>,
    cancel: &CancellationToken,
) -> Collection {
    let fetcher = PageFetcher::from_config(&config.fetch);
    let pool = Arc::clone(fetcher.pool());

    let assembler = RecordAssembler::new(config.fields.clone(), config.validity.clone());
    let unit = UnitOfWork::new(fetcher, assembler, config.collect.progress_every);
    let orchestrator = Orchestrator::new(unit, build_policy(&config.collect));

    let collection = orchestrator.run(urls, cancel).await;
    pool.close();
    collection
}

/// Turns interrupts into cancellation
///
/// The first interrupt cancels `cancel` so the run can finish with what it has.
/// Returns `true` once a second interrupt arrives, `false` if interrupts cannot be
/// listened for.
pub async fn watch_interrupts<F, Fut>(mut interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        tracing::warn!("Cannot listen for interrupts: {}", e);
        return false;
    }
    tracing::warn!("Interrupt received, finishing with what was collected (interrupt again to exit now)");
    cancel.cancel();

    match interrupt().await {
        Ok(()) => {
            tracing::warn!("Second interrupt received, exiting");
            true
        }
        Err(e) => {
            tracing::warn!("Cannot listen for interrupts: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::time::Duration;
    use tokio::sync::Notify;

    type Interrupt = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

    /// Each call waits for one `notify_one`
    fn interrupts(notify: &Arc<Notify>) -> impl FnMut() -> Interrupt {
        let notify = Arc::clone(notify);
        move || -> Interrupt {
            let notify = Arc::clone(&notify);
            Box::pin(async move {
                notify.notified().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_first_interrupt_cancels_second_exits() {
        let notify = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(watch_interrupts(interrupts(&notify), cancel.clone()));

        notify.notify_one();
        tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
            .await
            .unwrap();
        assert!(!watcher.is_finished());

        notify.notify_one();
        let exit = tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .unwrap()
            .unwrap();
        assert!(exit);
    }

    #[tokio::test]
    async fn test_unavailable_interrupts_do_not_cancel() {
        let cancel = CancellationToken::new();
        let exit = watch_interrupts(
            || async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal handler")) },
            cancel.clone(),
        )
        .await;

        assert!(!exit);
        assert!(!cancel.is_cancelled());
    }
}
