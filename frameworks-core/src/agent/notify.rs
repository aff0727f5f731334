//! Email delivery for investigation reports.

use std::sync::Arc;

use async_trait::async_trait;
use frameworks_model::Report;
use tracing::info;

use crate::database::ports::{BillingDirectory, Mailer, ReportNotifier};
use crate::error::{CoreError, Result};
use crate::infra::email::render_report_email;

/// Sends a persisted report to the tenant's billing contact. Tenants with
/// no address on file are skipped quietly.
pub struct EmailReportNotifier {
    billing: Arc<dyn BillingDirectory>,
    mailer: Arc<dyn Mailer>,
}

impl std::fmt::Debug for EmailReportNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailReportNotifier").finish_non_exhaustive()
    }
}

impl EmailReportNotifier {
    pub fn new(billing: Arc<dyn BillingDirectory>, mailer: Arc<dyn Mailer>) -> Self {
        Self { billing, mailer }
    }
}

#[async_trait]
impl ReportNotifier for EmailReportNotifier {
    async fn notify(&self, report: &Report) -> Result<()> {
        let Some(email) = self
            .billing
            .billing_email(report.tenant_id)
            .await
            .map_err(|e| CoreError::Notify(e.to_string()))?
        else {
            info!(tenant_id = %report.tenant_id, "no billing email on file, skipping report delivery");
            return Ok(());
        };

        let rendered = render_report_email(report);
        self.mailer
            .send(&email, &rendered.subject, &rendered.html)
            .await
            .map_err(|e| CoreError::Notify(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use frameworks_model::{ReportTrigger, TenantId};
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Billing {}

        #[async_trait]
        impl BillingDirectory for Billing {
            async fn tier_level(&self, tenant_id: TenantId) -> Result<i32>;
            async fn billing_email(&self, tenant_id: TenantId) -> Result<Option<String>>;
        }
    }

    mock! {
        Mail {}

        #[async_trait]
        impl Mailer for Mail {
            async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
        }
    }

    fn report(tenant_id: TenantId) -> Report {
        Report {
            id: 7,
            tenant_id,
            trigger: ReportTrigger::Heartbeat,
            summary: "summary".to_string(),
            metrics_reviewed: Vec::new(),
            root_cause: "unknown".to_string(),
            recommendations: Vec::new(),
            created_at: Utc::now(),
            read_at: None,
        }
    }

    #[tokio::test]
    async fn delivers_to_the_billing_address() {
        let tenant = TenantId::new();
        let mut billing = MockBilling::new();
        billing
            .expect_billing_email()
            .with(eq(tenant))
            .returning(|_| Ok(Some("ops@acme.example".to_string())));

        let mut mailer = MockMail::new();
        mailer
            .expect_send()
            .withf(|to, subject, _| {
                to == "ops@acme.example" && subject.contains("Stream Triage Report")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let notifier = EmailReportNotifier::new(Arc::new(billing), Arc::new(mailer));
        notifier.notify(&report(tenant)).await.unwrap();
    }

    #[tokio::test]
    async fn missing_address_is_a_quiet_skip() {
        let tenant = TenantId::new();
        let mut billing = MockBilling::new();
        billing.expect_billing_email().returning(|_| Ok(None));

        let mut mailer = MockMail::new();
        mailer.expect_send().times(0);

        let notifier = EmailReportNotifier::new(Arc::new(billing), Arc::new(mailer));
        notifier.notify(&report(tenant)).await.unwrap();
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_notify() {
        let tenant = TenantId::new();
        let mut billing = MockBilling::new();
        billing
            .expect_billing_email()
            .returning(|_| Ok(Some("ops@acme.example".to_string())));

        let mut mailer = MockMail::new();
        mailer
            .expect_send()
            .returning(|_, _, _| Err(CoreError::Notify("relay refused".to_string())));

        let notifier = EmailReportNotifier::new(Arc::new(billing), Arc::new(mailer));
        let err = notifier.notify(&report(tenant)).await.unwrap_err();
        assert!(matches!(err, CoreError::Notify(_)));
    }
}
