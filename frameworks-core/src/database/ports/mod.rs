pub mod aggregates;
pub mod analytics;
pub mod directory;
pub mod llm;
pub mod notify;
pub mod olap;
pub mod reports;
pub mod source;

pub use aggregates::AggregateStore;
pub use analytics::AnalyticsReader;
pub use directory::{
    BillingDirectory, ClusterDirectory, StreamDirectory, StreamSummary, TenantRegistry,
    TenantSummary,
};
pub use llm::{ChatMessage, ChatRole, Orchestrator, OrchestratorReply, TokenCounts, TokenStreamer};
pub use notify::{Mailer, ReportNotifier};
pub use olap::OlapSink;
pub use reports::{MarkRead, ReportStore};
pub use source::{EventSource, IncidentSource};
