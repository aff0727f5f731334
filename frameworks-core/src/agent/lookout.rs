//! The lookout trigger: feeds the investigation workflow from an external
//! incident topic.
//!
//! The handler never blocks its consumer partition: malformed messages are
//! logged and acknowledged, and transient snapshot failures return success
//! to the bus.

use std::sync::Arc;

use chrono::Duration;
use frameworks_model::{ReportTrigger, TenantId};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::database::ports::{AnalyticsReader, BillingDirectory, StreamDirectory};
use crate::error::Result;

use super::investigation::InvestigationWorkflow;
use super::{count_live_streams, load_snapshot};

/// Wire shape of an incident bus message.
#[derive(Debug, Clone, Deserialize)]
pub struct IncidentMessage {
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub severity: String,
}

#[derive(Debug, Clone)]
pub struct LookoutConfig {
    pub required_tier_level: i32,
    pub window: Duration,
    pub page_size: u32,
}

impl Default for LookoutConfig {
    fn default() -> Self {
        Self {
            required_tier_level: 1,
            window: Duration::minutes(15),
            page_size: 100,
        }
    }
}

pub struct LookoutTrigger {
    config: LookoutConfig,
    billing: Arc<dyn BillingDirectory>,
    streams: Arc<dyn StreamDirectory>,
    analytics: Arc<dyn AnalyticsReader>,
    investigation: InvestigationWorkflow,
}

impl std::fmt::Debug for LookoutTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookoutTrigger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LookoutTrigger {
    pub fn new(
        config: LookoutConfig,
        billing: Arc<dyn BillingDirectory>,
        streams: Arc<dyn StreamDirectory>,
        analytics: Arc<dyn AnalyticsReader>,
        investigation: InvestigationWorkflow,
    ) -> Self {
        Self {
            config,
            billing,
            streams,
            analytics,
            investigation,
        }
    }

    /// Entry point for the consumer framework. Always returns `Ok` so the
    /// message is acknowledged; nothing here is worth re-queueing.
    pub async fn handle_raw(&self, cancel: &CancellationToken, payload: &[u8]) -> Result<()> {
        let message: IncidentMessage = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "malformed incident message, acknowledging");
                return Ok(());
            }
        };
        self.handle(cancel, message).await
    }

    pub async fn handle(&self, cancel: &CancellationToken, message: IncidentMessage) -> Result<()> {
        let Some(tenant_id) = message.tenant_id.filter(|t| !t.is_nil()) else {
            warn!("incident message without a valid tenant id, acknowledging");
            return Ok(());
        };

        match self.billing.tier_level(tenant_id).await {
            Ok(tier) if tier >= self.config.required_tier_level => {}
            Ok(_) => {
                info!(%tenant_id, "tenant below required tier, skipping incident");
                return Ok(());
            }
            Err(err) => {
                warn!(%tenant_id, error = %err, "billing lookup failed, acknowledging incident");
                return Ok(());
            }
        }

        let active_streams = match count_live_streams(
            self.streams.as_ref(),
            tenant_id,
            self.config.page_size,
            true,
        )
        .await
        {
            Ok(count) => count,
            Err(err) => {
                warn!(%tenant_id, error = %err, "stream listing failed, acknowledging incident");
                return Ok(());
            }
        };

        let snapshot = match load_snapshot(
            self.analytics.as_ref(),
            tenant_id,
            active_streams,
            self.config.window,
        )
        .await
        {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!(%tenant_id, "no health snapshot for incident window, acknowledging");
                return Ok(());
            }
            Err(err) => {
                // Transient upstream trouble must never stall the partition.
                warn!(%tenant_id, error = %err, "snapshot load failed, acknowledging incident");
                return Ok(());
            }
        };

        let reason = if message.summary.is_empty() {
            format!("incident severity: {}", message.severity)
        } else {
            message.summary.clone()
        };

        if let Err(err) = self
            .investigation
            .run(cancel, tenant_id, ReportTrigger::Lookout, &reason, &snapshot)
            .await
        {
            warn!(%tenant_id, error = %err, "lookout investigation failed");
        }
        Ok(())
    }
}
