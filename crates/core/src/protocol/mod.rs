//! Wire-level event envelope shared with the sensor producers.

pub mod events;
pub mod packet;

pub use packet::{Category, CodecError, Packet, PacketMeta, StickyKind, TOPIC_DETECTION};
