//! vigil — signal reaction orchestrator.
//!
//! Sensor producers watch the user (camera, active window) and emit packets
//! on a shared channel. This crate is the reacting side: it decides under
//! noisy, bursty, duplicated signals whether to respond with a synthesized
//! persona-flavored voice line, and keeps the channel session consistent
//! across disconnects.
//!
//! Pipeline: inbound [`protocol::Packet`] → [`memory::EventMemory`] admit/drop
//! → ([`classify::DebounceGate`] for ambiguous windows) →
//! [`reaction::ReactionDispatcher`] → [`transport::TransportSession`].

pub mod agent;
pub mod classify;
pub mod config;
pub mod memory;
pub mod protocol;
pub mod reaction;
pub mod speech;
pub mod transport;
