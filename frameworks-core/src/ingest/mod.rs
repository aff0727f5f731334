//! Telemetry ingest pipeline: validation, routing, and OLAP row mapping.

pub mod router;
pub mod rows;
pub mod validate;

pub use router::{IngestRouter, RouteStats};
pub use validate::validate;
