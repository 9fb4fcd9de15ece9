//! Sync orchestration: accounts first (building the identity map), then
//! services and invoices concurrently against the finished map.
//!
//! Each pass walks HostBill pages strictly in order. The page count comes
//! from the first page fetched; a page that fails anywhere between fetch and
//! upsert is reported and skipped, and the cursor moves on. Only a failed
//! token refresh stops the run.

pub mod identity;
pub mod translate;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::hostbill::{ClientsPage, Paginated, SourceApi};
use crate::report::ErrorReporter;
use crate::types::RecordKind;
use crate::zoho::records::UpsertBatch;
use crate::zoho::{TargetApi, UpsertOutcome};

pub use self::identity::IdentityMap;

/// Counters for one record kind's pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub kind: RecordKind,
    /// Page count reported by HostBill; `0` if it was never learned.
    pub total_pages: u32,
    pub pages_processed: u32,
    pub failed_pages: u32,
    pub records_sent: usize,
    /// The pass stopped before `total_pages` because the first page failed
    /// or shutdown was requested.
    pub incomplete: bool,
}

impl PassSummary {
    fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            total_pages: 0,
            pages_processed: 0,
            failed_pages: 0,
            records_sent: 0,
            incomplete: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub accounts: PassSummary,
    pub services: PassSummary,
    pub invoices: PassSummary,
    pub identity_map: IdentityMap,
}

impl SyncReport {
    pub fn failed_pages(&self) -> u32 {
        self.accounts.failed_pages + self.services.failed_pages + self.invoices.failed_pages
    }
}

/// What a single page produced: the page count if the listing decoded, and
/// how many records were sent.
struct PageOutcome {
    total_pages: Option<u32>,
    result: SyncResult<usize>,
}

impl PageOutcome {
    fn unfetched(error: SyncError) -> Self {
        Self {
            total_pages: None,
            result: Err(error),
        }
    }
}

/// Log a decoded listing's pagination metadata and return its page count.
fn listed<P: Paginated>(kind: RecordKind, page: u32, listing: &P) -> Option<u32> {
    let sorter = listing.sorter();
    debug!(
        %kind,
        page,
        total_pages = sorter.totalpages,
        per_page = ?sorter.perpage,
        "Fetched listing page"
    );
    Some(listing.total_pages())
}

/// Owns both API clients and the error reporter for one run.
pub struct SyncPipeline<S, T> {
    source: S,
    target: T,
    reporter: Arc<dyn ErrorReporter>,
    shutdown: CancellationToken,
}

impl<S: SourceApi, T: TargetApi> SyncPipeline<S, T> {
    pub fn new(
        source: S,
        target: T,
        reporter: Arc<dyn ErrorReporter>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            reporter,
            shutdown,
        }
    }

    /// Run all three passes. Services and invoices start only once the
    /// accounts pass has finished writing the identity map.
    pub async fn run(&self) -> SyncResult<SyncReport> {
        let (accounts, identity_map) = self.sync_accounts().await?;
        info!(mapped = identity_map.len(), "Accounts pass finished");
        if identity_map.is_empty() {
            warn!("No accounts mapped; services will be unlinked and invoices skipped");
        }

        let (services, invoices) = tokio::join!(
            self.sync_services(&identity_map),
            self.sync_invoices(&identity_map)
        );

        Ok(SyncReport {
            accounts,
            services: services?,
            invoices: invoices?,
            identity_map,
        })
    }

    pub async fn sync_accounts(&self) -> SyncResult<(PassSummary, IdentityMap)> {
        let map = Mutex::new(IdentityMap::new());
        let summary = self
            .paginate(RecordKind::Accounts, |page| self.accounts_page(page, &map))
            .await?;
        let map = map.into_inner().unwrap_or_else(PoisonError::into_inner);
        Ok((summary, map))
    }

    pub async fn sync_services(&self, map: &IdentityMap) -> SyncResult<PassSummary> {
        self.paginate(RecordKind::Services, |page| async move {
            let listing = match self.source.services(page).await {
                Ok(l) => l,
                Err(e) => return PageOutcome::unfetched(e),
            };
            let batch = translate::translate_services(&listing, map);
            PageOutcome {
                total_pages: listed(RecordKind::Services, page, &listing),
                result: self.upsert(&batch, RecordKind::Services).await.map(|_| batch.len()),
            }
        })
        .await
    }

    pub async fn sync_invoices(&self, map: &IdentityMap) -> SyncResult<PassSummary> {
        self.paginate(RecordKind::Invoices, |page| async move {
            let listing = match self.source.invoices(page).await {
                Ok(l) => l,
                Err(e) => return PageOutcome::unfetched(e),
            };
            let result = match translate::translate_invoices(&listing, map) {
                Ok(batch) => self
                    .upsert(&batch, RecordKind::Invoices)
                    .await
                    .map(|_| batch.len()),
                Err(e) => Err(e),
            };
            PageOutcome {
                total_pages: listed(RecordKind::Invoices, page, &listing),
                result,
            }
        })
        .await
    }

    async fn accounts_page(&self, page: u32, map: &Mutex<IdentityMap>) -> PageOutcome {
        let listing = match self.source.clients(page).await {
            Ok(l) => l,
            Err(e) => return PageOutcome::unfetched(e),
        };
        PageOutcome {
            total_pages: listed(RecordKind::Accounts, page, &listing),
            result: self.push_accounts(&listing, map).await,
        }
    }

    /// Fetch details for every listed client (in listing order, which the
    /// positional identity merge relies on), upsert them and record the IDs.
    async fn push_accounts(
        &self,
        listing: &ClientsPage,
        map: &Mutex<IdentityMap>,
    ) -> SyncResult<usize> {
        let mut details = Vec::with_capacity(listing.clients.len());
        for client in &listing.clients {
            details.push(self.source.client_details(&client.id).await?);
        }
        let batch = translate::translate_accounts(&details);

        self.target.refresh_token().await?;
        let outcome = self.upsert(&batch, RecordKind::Accounts).await?;

        let mut map = map.lock().unwrap_or_else(PoisonError::into_inner);
        let written = identity::merge(&outcome.body, &mut map, listing)?;
        debug!(written, total = map.len(), "Recorded Zoho account IDs");
        Ok(batch.len())
    }

    async fn upsert<R: Serialize>(
        &self,
        batch: &UpsertBatch<R>,
        kind: RecordKind,
    ) -> SyncResult<UpsertOutcome> {
        let payload = serde_json::to_vec(batch).map_err(|e| SyncError::Translation {
            kind,
            message: format!("failed to encode upsert batch: {}", e),
        })?;
        if batch.is_empty() {
            debug!(%kind, "Nothing eligible on this page, sending empty batch");
        }
        let outcome = self.target.upsert(&payload, kind).await?;
        if outcome.partial_failure {
            warn!(%kind, records = batch.len(), "Failed to sync some {}", kind);
        } else {
            info!(%kind, "Synced {} {}", batch.len(), kind);
        }
        Ok(outcome)
    }

    /// Drive `step` over pages `0..total`, where `total` is learned from the
    /// first page. Page errors are reported and skipped; fatal errors return.
    async fn paginate<F, Fut>(&self, kind: RecordKind, mut step: F) -> SyncResult<PassSummary>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PageOutcome>,
    {
        let mut summary = PassSummary::new(kind);
        let mut total: Option<u32> = None;
        let mut page: u32 = 0;

        loop {
            if self.shutdown.is_cancelled() {
                warn!(%kind, page, "Shutdown requested, stopping pass");
                summary.incomplete = true;
                break;
            }

            debug!(%kind, call = %kind.source_call(), page, "Processing page");
            let outcome = step(page).await;
            if total.is_none() {
                // A listing that reports zero pages still had page 0 processed.
                total = outcome.total_pages.map(|t| t.max(1));
                summary.total_pages = total.unwrap_or(0);
            }
            summary.pages_processed += 1;

            match outcome.result {
                Ok(sent) => summary.records_sent += sent,
                Err(e) if e.is_fatal() => {
                    error!(%kind, page, "{}", e);
                    self.reporter.notify(&e, &format!("{} page {}", kind, page));
                    return Err(e);
                }
                Err(e) => {
                    summary.failed_pages += 1;
                    warn!(%kind, page, "Skipping page: {}", e);
                    self.reporter.notify(&e, &format!("{} page {}", kind, page));
                }
            }

            page += 1;
            match total {
                Some(t) if page >= t => break,
                Some(_) => {}
                None => {
                    warn!(%kind, "Page count unknown after a failed first page, abandoning pass");
                    summary.incomplete = true;
                    break;
                }
            }
        }

        info!(
            %kind,
            pages = summary.pages_processed,
            failed = summary.failed_pages,
            records = summary.records_sent,
            "Pass finished"
        );
        Ok(summary)
    }
}
