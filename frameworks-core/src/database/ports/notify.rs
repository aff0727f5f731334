use async_trait::async_trait;
use frameworks_model::Report;

use crate::error::Result;

/// Outbound mail. The SMTP transport behind this is configured once at
/// startup; callers treat failures as non-fatal.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// Delivers a persisted investigation report to whoever should see it.
#[async_trait]
pub trait ReportNotifier: Send + Sync {
    async fn notify(&self, report: &Report) -> Result<()>;
}
