use crate::protocol::events;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Topic every detection packet travels on.
pub const TOPIC_DETECTION: &str = "detection";

/// Coarse origin tag for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Vision,
    Screen,
    System,
    /// Produced locally by the debounced classifier, never by a sensor.
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketMeta {
    pub category: Category,
    /// Seconds since the Unix epoch, assigned at construction. Used for
    /// relative-time rendering only, never for ordering.
    pub timestamp: f64,
}

/// The unit of communication with the sensor producers. Immutable after
/// construction; serialized once, deserialized once, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub event: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub meta: PacketMeta,
}

/// Packets whose latest value must survive reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickyKind {
    SessionStart,
    Persona,
}

#[derive(Debug, thiserror::Error)]
#[error("packet codec: {0}")]
pub struct CodecError(#[from] serde_json::Error);

impl Packet {
    pub fn new(category: Category, event: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event: event.into(),
            data,
            meta: PacketMeta {
                category,
                timestamp: Utc::now().timestamp_micros() as f64 / 1e6,
            },
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Sticky classification of this packet, if any.
    pub fn sticky_kind(&self) -> Option<StickyKind> {
        match self.event.as_str() {
            events::SESSION_START => Some(StickyKind::SessionStart),
            events::PERSONA_UPDATE => Some(StickyKind::Persona),
            _ => None,
        }
    }

    /// String field from the payload, if present and a string.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}
