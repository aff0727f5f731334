//! Reduction semantics for the per-stream aggregate.
//!
//! Defined once as pure functions over [`StreamAggregate`] and mirrored by
//! the single-statement upserts in the Postgres backend. Invariants:
//! `current_viewers >= 0` and `peak_viewers >= current_viewers` hold after
//! every application; `session_start_time` is set at most once per session
//! and cleared only by the terminal `stream-end` transition.

use frameworks_model::event::{
    ConnectionAction, EventMeta, StreamStatePayload, UserConnectionPayload,
};
use frameworks_model::{MistStatus, StreamAggregate};

/// Raw statuses that open a session when none is in progress.
pub fn is_session_start_status(raw: &str) -> bool {
    matches!(raw, "start" | "started" | "ingest_start" | "live")
}

/// `stream-lifecycle`: state replacement plus monotone counters.
pub fn apply_stream_lifecycle(
    agg: &mut StreamAggregate,
    meta: &EventMeta,
    payload: &StreamStatePayload,
) {
    agg.status = Some(payload.status.clone());
    if let Some(mist) = MistStatus::parse(&payload.status) {
        agg.mist_status = Some(mist);
    }
    if agg.session_start_time.is_none() && is_session_start_status(&payload.status) {
        agg.session_start_time = Some(meta.timestamp);
    }
    if let Some(viewers) = payload.total_viewers {
        agg.peak_viewers = agg.peak_viewers.max(viewers);
    }
    if let Some(connections) = payload.total_connections {
        agg.total_connections = agg.total_connections.max(connections);
    }
    if let Some(track_count) = payload.track_count {
        agg.track_count = Some(track_count);
    }
    if let Some(bitrate) = payload.primary_bitrate {
        agg.bitrate_kbps = Some((bitrate / 1000) as i32);
    }
    agg.node_id = Some(payload.node_id.clone());
    agg.last_updated = meta.timestamp;
}

/// `user-connection`: viewer counting and byte accounting.
pub fn apply_user_connection(
    agg: &mut StreamAggregate,
    meta: &EventMeta,
    payload: &UserConnectionPayload,
) {
    match payload.action {
        ConnectionAction::Connect => {
            agg.current_viewers += 1;
            agg.peak_viewers = agg.peak_viewers.max(agg.current_viewers);
            agg.total_connections += 1;
        }
        ConnectionAction::Disconnect => {
            agg.current_viewers = (agg.current_viewers - 1).max(0);
            agg.total_session_duration += payload.seconds_connected.unwrap_or(0);
            let up = payload.uploaded_bytes.unwrap_or(0);
            let down = payload.downloaded_bytes.unwrap_or(0);
            agg.upbytes += up;
            agg.downbytes += down;
            agg.bandwidth_in += up;
            agg.bandwidth_out += down;
        }
    }
    agg.last_updated = meta.timestamp;
}

/// `stream-end`: terminal transition. Sets the end time and releases the
/// session so the next start can open a fresh one.
pub fn apply_stream_end(
    agg: &mut StreamAggregate,
    meta: &EventMeta,
    payload: &StreamStatePayload,
) {
    agg.status = Some(payload.status.clone());
    if let Some(mist) = MistStatus::parse(&payload.status) {
        agg.mist_status = Some(mist);
    }
    agg.session_end_time = Some(meta.timestamp);
    agg.session_start_time = None;
    agg.last_updated = meta.timestamp;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use frameworks_model::TenantId;
    use uuid::Uuid;

    fn meta() -> EventMeta {
        EventMeta {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: "helmsman".to_string(),
            schema_version: "1.0".to_string(),
        }
    }

    fn lifecycle(status: &str) -> StreamStatePayload {
        StreamStatePayload {
            tenant_id: TenantId::new(),
            internal_name: "live+demo".to_string(),
            node_id: "node-1".to_string(),
            status: status.to_string(),
            buffer_state: None,
            buffer_seconds: None,
            downloaded_bytes: None,
            uploaded_bytes: None,
            total_viewers: None,
            total_connections: None,
            total_inputs: None,
            total_outputs: None,
            viewer_seconds: None,
            health_score: None,
            has_issues: None,
            issues_desc: None,
            track_count: None,
            quality_tier: None,
            primary_width: None,
            primary_height: None,
            primary_fps: None,
            primary_codec: None,
            primary_bitrate: None,
        }
    }

    fn connection(action: ConnectionAction) -> UserConnectionPayload {
        UserConnectionPayload {
            tenant_id: TenantId::new(),
            internal_name: "live+demo".to_string(),
            session_id: "sess".to_string(),
            action,
            seconds_connected: Some(60),
            downloaded_bytes: Some(1_000),
            uploaded_bytes: Some(100),
            country_code: None,
            city: None,
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn viewer_counters_stay_consistent_under_any_interleaving() {
        // Deterministic pseudo-random walk over connect/disconnect; the
        // invariants must hold after every single step.
        let mut agg = StreamAggregate::new(TenantId::new(), "live+demo", Utc::now());
        let mut seed = 0x2545F491u64;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let action = if seed & 1 == 0 {
                ConnectionAction::Connect
            } else {
                ConnectionAction::Disconnect
            };
            apply_user_connection(&mut agg, &meta(), &connection(action));
            assert!(agg.current_viewers >= 0);
            assert!(agg.peak_viewers >= agg.current_viewers);
        }
    }

    #[test]
    fn disconnect_on_empty_stream_clamps_at_zero() {
        let mut agg = StreamAggregate::new(TenantId::new(), "live+demo", Utc::now());
        apply_user_connection(&mut agg, &meta(), &connection(ConnectionAction::Disconnect));
        assert_eq!(agg.current_viewers, 0);
        assert_eq!(agg.total_session_duration, 60);
        assert_eq!(agg.upbytes, 100);
        assert_eq!(agg.downbytes, 1_000);
        assert_eq!(agg.bandwidth_in, 100);
        assert_eq!(agg.bandwidth_out, 1_000);
    }

    #[test]
    fn lifecycle_replay_is_idempotent() {
        let m = meta();
        let mut payload = lifecycle("live");
        payload.total_viewers = Some(12);
        payload.total_connections = Some(40);
        payload.track_count = Some(3);
        payload.primary_bitrate = Some(4_500_000);

        let mut once = StreamAggregate::new(payload.tenant_id, "live+demo", m.timestamp);
        apply_stream_lifecycle(&mut once, &m, &payload);

        let mut twice = once.clone();
        apply_stream_lifecycle(&mut twice, &m, &payload);

        assert_eq!(once, twice);
        assert_eq!(twice.peak_viewers, 12);
        assert_eq!(twice.total_connections, 40);
        assert_eq!(twice.bitrate_kbps, Some(4_500));
    }

    #[test]
    fn session_start_set_once_and_cleared_on_end() {
        let mut agg = StreamAggregate::new(TenantId::new(), "live+demo", Utc::now());

        let first = meta();
        apply_stream_lifecycle(&mut agg, &first, &lifecycle("live"));
        assert_eq!(agg.session_start_time, Some(first.timestamp));

        // A later start status must not move the session open time.
        let mut later = meta();
        later.timestamp = first.timestamp + Duration::minutes(10);
        apply_stream_lifecycle(&mut agg, &later, &lifecycle("started"));
        assert_eq!(agg.session_start_time, Some(first.timestamp));

        let mut end = meta();
        end.timestamp = first.timestamp + Duration::minutes(30);
        apply_stream_end(&mut agg, &end, &lifecycle("offline"));
        assert_eq!(agg.session_start_time, None);
        assert_eq!(agg.session_end_time, Some(end.timestamp));
        assert_eq!(agg.mist_status, Some(MistStatus::Offline));

        // The next session opens cleanly.
        let mut restart = meta();
        restart.timestamp = first.timestamp + Duration::hours(1);
        apply_stream_lifecycle(&mut agg, &restart, &lifecycle("ingest_start"));
        assert_eq!(agg.session_start_time, Some(restart.timestamp));
    }

    #[test]
    fn raw_status_outside_enum_preserves_mist_status() {
        let mut agg = StreamAggregate::new(TenantId::new(), "live+demo", Utc::now());
        apply_stream_lifecycle(&mut agg, &meta(), &lifecycle("ready"));
        assert_eq!(agg.mist_status, Some(MistStatus::Ready));

        // "READY" is not a literal match; the stored value survives.
        apply_stream_lifecycle(&mut agg, &meta(), &lifecycle("READY"));
        assert_eq!(agg.mist_status, Some(MistStatus::Ready));
        assert_eq!(agg.status.as_deref(), Some("READY"));
    }
}
