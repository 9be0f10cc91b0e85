use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Playback lifecycle notifications published by a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    SessionStarted,
    FrameSent,
    FrameDropped,
    Stopped,
}

/// Immutable event envelope for logging and observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub id: Uuid,
    pub session: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    Session { frame_count: usize },
    Frame { index: usize, bytes: usize },
    Dropped { index: usize, reason: String },
    Stopped,
}

impl PlaybackEvent {
    pub fn new(session: Uuid, kind: EventKind, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            session,
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn session_started(session: Uuid, frame_count: usize) -> Self {
        Self::new(
            session,
            EventKind::SessionStarted,
            EventPayload::Session { frame_count },
        )
    }

    pub fn frame_sent(session: Uuid, index: usize, bytes: usize) -> Self {
        Self::new(
            session,
            EventKind::FrameSent,
            EventPayload::Frame { index, bytes },
        )
    }

    pub fn frame_dropped(session: Uuid, index: usize, reason: impl Into<String>) -> Self {
        Self::new(
            session,
            EventKind::FrameDropped,
            EventPayload::Dropped {
                index,
                reason: reason.into(),
            },
        )
    }

    pub fn stopped(session: Uuid) -> Self {
        Self::new(session, EventKind::Stopped, EventPayload::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kind_and_payload() {
        let session = Uuid::new_v4();
        let event = PlaybackEvent::frame_sent(session, 3, 120);
        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["kind"], "FrameSent");
        assert_eq!(json["payload"]["Frame"]["index"], 3);
        assert_eq!(json["session"], session.to_string());
    }
}
