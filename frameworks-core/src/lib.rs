//! # FrameWorks observability and triage core
//!
//! The hardest subsystem of the control plane: it ingests high-volume
//! live-streaming telemetry, reduces it into queryable analytical and
//! operational state, and drives two reactive control loops.
//!
//! ## Overview
//!
//! - **Ingest pipeline**: a typed event router that validates a
//!   heterogeneous message stream and fans events out to the OLAP store
//!   (append-only time-series tables) and the OLTP store (reduced per-stream
//!   aggregates).
//! - **Heartbeat agent**: a per-tenant health sweep that applies hard
//!   thresholds first and falls back to an LLM-backed triage decision;
//!   investigations produce persisted, deduplicated reports.
//! - **Infrastructure monitor**: a cluster/node sweep combining hard
//!   thresholds, persistence confirmation, baseline deviation, and cooldown,
//!   emitting templated operator alert email.
//!
//! External collaborators (tenant registry, billing, stream and cluster
//! directories, the LLM orchestrator, SMTP) are ports under
//! [`database::ports`]; Postgres, ClickHouse, and in-memory backends live
//! under [`database`].

/// Error types and handling
pub mod error;

/// Wall-clock capability, injectable in tests
pub mod clock;

/// Event validation, routing, and OLAP row mapping
pub mod ingest;

/// Reduction semantics for the per-stream aggregate store
pub mod reduce;

/// Baseline statistics, cooldown gating, and threshold checks
pub mod triage;

/// Heartbeat agent, lookout trigger, and the investigation workflow
pub mod agent;

/// Infrastructure monitor and alert rendering
pub mod infra;

/// Storage ports and backends
pub mod database;

/// Long-running drivers (consumer, lookout, heartbeat, infra)
pub mod runtime;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
