//! Storage ports and their backends.
//!
//! Ports are async traits, one file per concern. Backends: Postgres for the
//! OLTP side (aggregates, reports), ClickHouse for the OLAP side
//! (append-only telemetry tables), and in-memory implementations used by
//! tests and local development.

pub mod infrastructure;
pub mod memory;
pub mod ports;
