//! Daemon configuration, loaded from environment variables (with a `.env`
//! file honored in development). CLI flags override host and port.

use anyhow::Context;
use chrono::Duration;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // OLTP store (aggregates, reports)
    pub database_url: String,

    // OLAP store (telemetry tables)
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: String,
    pub clickhouse_password: String,

    // Outbound mail
    pub smtp_host: String,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,

    // LLM orchestrator endpoint (OpenAI-compatible chat completions)
    pub llm_endpoint: String,
    pub llm_api_key: String,
    pub llm_model: String,

    // Heartbeat agent
    pub heartbeat_interval_secs: u64,
    pub heartbeat_window_minutes: i64,
    pub required_tier_level: i32,
    pub consider_active_only: bool,
    pub warning_buffer: f64,
    pub warning_fps: f64,
    pub warning_bitrate: f64,
    pub warning_issue_count: i64,
    pub warning_packet_loss: f64,

    // Infrastructure monitor
    pub infra_tick_secs: u64,
    pub infra_cooldown_hours: i64,
    pub persistence_window_minutes: i64,
    pub stale_threshold_minutes: i64,
    pub cpu_threshold: f64,
    pub memory_threshold: f64,
    pub disk_warning: f64,
    pub disk_critical: f64,

    // Ingest
    pub ingest_buffer: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server_host: env_or("SERVER_HOST", "0.0.0.0"),
            server_port: parse_env("SERVER_PORT", 9450),

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (Postgres OLTP store)")?,

            clickhouse_url: env_or("CLICKHOUSE_URL", "http://localhost:8123"),
            clickhouse_database: env_or("CLICKHOUSE_DATABASE", "frameworks"),
            clickhouse_user: env_or("CLICKHOUSE_USER", "default"),
            clickhouse_password: env_or("CLICKHOUSE_PASSWORD", ""),

            smtp_host: env_or("SMTP_HOST", "localhost"),
            smtp_username: std::env::var("SMTP_USERNAME").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            smtp_from: env_or("SMTP_FROM", "alerts@frameworks.dev"),

            llm_endpoint: env_or("LLM_ENDPOINT", "http://localhost:11434/v1/chat/completions"),
            llm_api_key: env_or("LLM_API_KEY", ""),
            llm_model: env_or("LLM_MODEL", "llama3.1:70b"),

            heartbeat_interval_secs: parse_env("HEARTBEAT_INTERVAL_SECS", 30 * 60),
            heartbeat_window_minutes: parse_env("HEARTBEAT_WINDOW_MINUTES", 15),
            required_tier_level: parse_env("REQUIRED_TIER_LEVEL", 1),
            consider_active_only: parse_env("CONSIDER_ACTIVE_ONLY", true),
            warning_buffer: parse_env("WARNING_BUFFER", 1.5),
            warning_fps: parse_env("WARNING_FPS", 24.0),
            warning_bitrate: parse_env("WARNING_BITRATE", 800_000.0),
            warning_issue_count: parse_env("WARNING_ISSUE_COUNT", 1),
            warning_packet_loss: parse_env("WARNING_PACKET_LOSS", 0.02),

            infra_tick_secs: parse_env("INFRA_TICK_SECS", 5 * 60),
            infra_cooldown_hours: parse_env("INFRA_COOLDOWN_HOURS", 4),
            persistence_window_minutes: parse_env("PERSISTENCE_WINDOW_MINUTES", 20),
            stale_threshold_minutes: parse_env("STALE_THRESHOLD_MINUTES", 10),
            cpu_threshold: parse_env("CPU_THRESHOLD", 95.0),
            memory_threshold: parse_env("MEMORY_THRESHOLD", 95.0),
            disk_warning: parse_env("DISK_WARNING", 90.0),
            disk_critical: parse_env("DISK_CRITICAL", 95.0),

            ingest_buffer: parse_env("INGEST_BUFFER", 1024),
        })
    }

    pub fn heartbeat_config(&self) -> frameworks_core::agent::HeartbeatConfig {
        frameworks_core::agent::HeartbeatConfig {
            interval: std::time::Duration::from_secs(self.heartbeat_interval_secs),
            required_tier_level: self.required_tier_level,
            window: Duration::minutes(self.heartbeat_window_minutes),
            consider_active_only: self.consider_active_only,
            thresholds: frameworks_core::triage::ThresholdConfig {
                warning_buffer: self.warning_buffer,
                warning_fps: self.warning_fps,
                warning_bitrate: self.warning_bitrate,
                warning_issue_count: self.warning_issue_count,
                warning_packet_loss: self.warning_packet_loss,
            },
            page_size: 100,
        }
    }

    pub fn lookout_config(&self) -> frameworks_core::agent::lookout::LookoutConfig {
        frameworks_core::agent::lookout::LookoutConfig {
            required_tier_level: self.required_tier_level,
            window: Duration::minutes(self.heartbeat_window_minutes),
            page_size: 100,
        }
    }

    pub fn infra_config(&self) -> frameworks_core::infra::InfraMonitorConfig {
        frameworks_core::infra::InfraMonitorConfig {
            cooldown: Duration::hours(self.infra_cooldown_hours),
            stale_threshold: Duration::minutes(self.stale_threshold_minutes),
            persistence_window: Duration::minutes(self.persistence_window_minutes),
            persistence_windows: 4,
            persistence_min_violate: 3,
            cpu_threshold: self.cpu_threshold,
            memory_threshold: self.memory_threshold,
            disk_warning: self.disk_warning,
            disk_critical: self.disk_critical,
            page_size: 100,
        }
    }
}
