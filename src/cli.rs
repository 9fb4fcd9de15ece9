use clap::Parser;

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "hostbill-zoho-sync",
    version,
    about = "Sync HostBill clients, services and invoices into Zoho CRM"
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short = 'c', long, default_value = "configs/config.yml", env = "SYNC_CONFIG")]
    pub config: String,

    /// Log level (RUST_LOG takes precedence when set)
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Only refresh the Zoho access token to verify credentials, then exit
    #[arg(long)]
    pub auth_only: bool,

    /// HTTP request timeout in seconds (overrides http.timeout_secs)
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}
