use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("sink write failed: {0}")]
    SinkTransient(String),

    #[error("upstream not configured: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream fetch failed: {0}")]
    UpstreamTransient(String),

    #[error("decision output malformed: {0}")]
    DecisionMalformed(String),

    #[error("investigation failed: {0}")]
    InvestigationFailed(String),

    #[error("report persistence failed: {0}")]
    Persistence(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("no alerts to render")]
    NoAlerts,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::SinkTransient(err.to_string())
    }
}

impl From<clickhouse::error::Error> for CoreError {
    fn from(err: clickhouse::error::Error) -> Self {
        CoreError::SinkTransient(err.to_string())
    }
}

impl CoreError {
    /// Business-level errors are isolated per tenant/event/alert and logged;
    /// everything else surfaces to the consumer or driver.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidEvent(_)
                | CoreError::UpstreamTransient(_)
                | CoreError::DecisionMalformed(_)
                | CoreError::InvestigationFailed(_)
                | CoreError::Persistence(_)
                | CoreError::Notify(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
