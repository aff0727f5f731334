//! Token accounting for orchestrator calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TenantId;

/// One orchestrator invocation's token spend. Recorded whether or not the
/// call produced usable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub tenant_id: TenantId,
    /// Which workflow spent the tokens (`heartbeat-decision`,
    /// `investigation`, `lookout`).
    pub component: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub recorded_at: DateTime<Utc>,
}
