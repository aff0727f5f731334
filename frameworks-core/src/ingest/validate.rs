//! Event validation: tag dispatch into typed payloads.
//!
//! Pure, no I/O. Unknown tags and missing required fields surface as
//! [`CoreError::InvalidEvent`]; the router counts the failure and drops the
//! event without propagating.

use frameworks_model::event::*;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Validates a raw envelope into a typed [`TelemetryEvent`].
pub fn validate(envelope: EventEnvelope) -> Result<TelemetryEvent> {
    let EventEnvelope {
        event_id,
        event_type,
        timestamp,
        source,
        tenant_id,
        internal_name,
        schema_version,
        data,
    } = envelope;

    // Producers may put the tenant and stream scope on the envelope instead
    // of the payload; fold them in before shape-checking.
    let mut data = match data {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(CoreError::InvalidEvent(format!(
                "event {event_id}: payload must be an object, got {other}"
            )));
        }
    };
    if let Some(tenant) = tenant_id {
        data.entry("tenant_id")
            .or_insert_with(|| Value::String(tenant.to_string()));
    }
    if let Some(name) = internal_name {
        data.entry("internal_name")
            .or_insert_with(|| Value::String(name));
    }
    let data = Value::Object(data);

    let payload = match event_type.as_str() {
        "stream-ingest" => EventPayload::StreamIngest(shape(&event_type, data)?),
        "stream-lifecycle" => EventPayload::StreamLifecycle(shape(&event_type, data)?),
        "stream-buffer" => EventPayload::StreamBuffer(shape(&event_type, data)?),
        "stream-end" => EventPayload::StreamEnd(shape(&event_type, data)?),
        "stream-view" => EventPayload::StreamView(shape(&event_type, data)?),
        "user-connection" => EventPayload::UserConnection(shape(&event_type, data)?),
        "client-lifecycle" => EventPayload::ClientLifecycle(shape(&event_type, data)?),
        "track-list" => EventPayload::TrackList(shape(&event_type, data)?),
        "bandwidth-threshold" => EventPayload::BandwidthThreshold(shape(&event_type, data)?),
        "recording-lifecycle" => EventPayload::RecordingLifecycle(shape(&event_type, data)?),
        "push-lifecycle" => EventPayload::PushLifecycle(shape(&event_type, data)?),
        "node-lifecycle" => EventPayload::NodeLifecycle(shape(&event_type, data)?),
        "load-balancing" => EventPayload::LoadBalancing(shape(&event_type, data)?),
        "clip-lifecycle" => EventPayload::ClipLifecycle(shape(&event_type, data)?),
        unknown => {
            return Err(CoreError::InvalidEvent(format!(
                "event {event_id}: unknown event type {unknown:?}"
            )));
        }
    };

    Ok(TelemetryEvent {
        meta: EventMeta {
            event_id,
            timestamp,
            source,
            schema_version,
        },
        payload,
    })
}

fn shape<T: DeserializeOwned>(event_type: &str, data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| CoreError::InvalidEvent(format!("{event_type}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use frameworks_model::TenantId;
    use serde_json::json;
    use uuid::Uuid;

    fn envelope(event_type: &str, data: Value) -> EventEnvelope {
        EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            source: "helmsman".to_string(),
            tenant_id: None,
            internal_name: None,
            schema_version: "1.0".to_string(),
            data,
        }
    }

    #[test]
    fn validates_user_connection() {
        let tenant = TenantId::new();
        let event = validate(envelope(
            "user-connection",
            json!({
                "tenant_id": tenant,
                "internal_name": "live+demo",
                "session_id": "sess-1",
                "action": "connect",
            }),
        ))
        .unwrap();

        assert_eq!(event.kind(), "user-connection");
        assert_eq!(event.tenant_id(), Some(tenant));
        match event.payload {
            EventPayload::UserConnection(p) => {
                assert_eq!(p.action, ConnectionAction::Connect);
                assert_eq!(p.seconds_connected, None);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = validate(envelope("stream-teleport", json!({}))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidEvent(_)));
    }

    #[test]
    fn rejects_missing_required_fields() {
        // user-connection without a session_id
        let err = validate(envelope(
            "user-connection",
            json!({
                "tenant_id": TenantId::new(),
                "internal_name": "live+demo",
                "action": "connect",
            }),
        ))
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidEvent(_)));
    }

    #[test]
    fn envelope_scope_folds_into_payload() {
        let tenant = TenantId::new();
        let mut env = envelope(
            "stream-view",
            json!({}),
        );
        env.tenant_id = Some(tenant);
        env.internal_name = Some("live+demo".to_string());

        let event = validate(env).unwrap();
        assert_eq!(event.tenant_id(), Some(tenant));
        assert_eq!(event.payload.internal_name(), Some("live+demo"));
    }

    #[test]
    fn unknown_push_action_takes_end_shape() {
        let event = validate(envelope(
            "push-lifecycle",
            json!({
                "tenant_id": TenantId::new(),
                "internal_name": "live+demo",
                "action": "paused",
            }),
        ))
        .unwrap();
        match event.payload {
            EventPayload::PushLifecycle(p) => assert_eq!(p.action(), PushAction::End),
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
