//! hostbill-zoho-sync: one-shot batch sync from HostBill into Zoho CRM.
//!
//! Clients become Zoho Accounts, hosting services become Services linked to
//! those accounts, and invoices become Invoices linked the same way. HostBill
//! is read page by page; each page is translated and upserted before the next
//! one is fetched.

#![warn(clippy::all)]

mod cli;
mod config;
mod error;
mod hostbill;
mod report;
mod shutdown;
mod sync;
mod types;
mod zoho;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Config;
use hostbill::HostBillClient;
use report::{BugsnagReporter, ErrorReporter};
use sync::SyncPipeline;
use zoho::{OAuthCredentials, TargetApi, ZohoClient};

/// How long to wait at exit for queued error reports.
const REPORT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config_path = config::expand_tilde(&cli.config);
    let mut config = Config::load(&config_path)?;
    if let Some(secs) = cli.timeout_secs {
        config.http.timeout_secs = secs.max(1);
    }
    tracing::debug!(?config, "Loaded configuration");

    let timeout = config.timeout();
    let zoho = ZohoClient::new(
        config.zoho_endpoints()?,
        OAuthCredentials {
            refresh_token: config.zoho.credentials.refresh_token.clone(),
            client_id: config.zoho.credentials.client_id.clone(),
            client_secret: config.zoho.credentials.client_secret.clone(),
        },
        timeout,
    )?;

    if cli.auth_only {
        zoho.refresh_token().await?;
        tracing::info!("Zoho credentials are valid");
        return Ok(());
    }

    let hostbill = HostBillClient::new(
        &config.hostbill_base_url(),
        &config.hostbill.credentials.api_id,
        &config.hostbill.credentials.api_key,
        timeout,
    )?;
    let bugsnag = Arc::new(BugsnagReporter::new(
        report::BUGSNAG_NOTIFY_URL,
        &config.bugsnag.credentials.api_key,
        &config.bugsnag.release_stage,
        timeout,
    )?);
    let reporter: Arc<dyn ErrorReporter> = bugsnag.clone();

    let shutdown_token = shutdown::install_signal_handler();
    let pipeline = SyncPipeline::new(hostbill, zoho, reporter, shutdown_token.clone());

    let outcome = pipeline.run().await;
    bugsnag.flush(REPORT_FLUSH_TIMEOUT).await;
    let report = outcome?;
    for pass in [&report.accounts, &report.services, &report.invoices] {
        tracing::info!(
            kind = %pass.kind,
            pages = pass.pages_processed,
            total_pages = pass.total_pages,
            failed = pass.failed_pages,
            records = pass.records_sent,
            incomplete = pass.incomplete,
            "Pass summary"
        );
    }

    if shutdown_token.is_cancelled() {
        tracing::warn!("Sync interrupted by shutdown signal");
    } else if report.failed_pages() > 0 {
        tracing::warn!(
            failed_pages = report.failed_pages(),
            "Sync finished with skipped pages"
        );
    } else {
        tracing::info!(
            mapped_accounts = report.identity_map.len(),
            "Sync finished"
        );
    }

    Ok(())
}
