use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// HostBill admin API call names used by the sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCall {
    GetClients,
    GetClientDetails,
    /// HostBill calls hosting services "accounts".
    GetAccounts,
    GetInvoices,
}

impl SourceCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCall::GetClients => "getClients",
            SourceCall::GetClientDetails => "getClientDetails",
            SourceCall::GetAccounts => "getAccounts",
            SourceCall::GetInvoices => "getInvoices",
        }
    }
}

impl fmt::Display for SourceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Zoho CRM module a batch is upserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Accounts,
    Services,
    Invoices,
}

impl RecordKind {
    /// Module name as it appears in the Zoho API path.
    pub fn module(&self) -> &'static str {
        match self {
            RecordKind::Accounts => "Accounts",
            RecordKind::Services => "Services",
            RecordKind::Invoices => "Invoices",
        }
    }

    /// HostBill listing call that feeds this kind.
    pub fn source_call(&self) -> SourceCall {
        match self {
            RecordKind::Accounts => SourceCall::GetClients,
            RecordKind::Services => SourceCall::GetAccounts,
            RecordKind::Invoices => SourceCall::GetInvoices,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.module().to_lowercase())
    }
}
