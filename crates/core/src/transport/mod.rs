//! Channel abstraction and the resilient session wrapped around it.

pub mod session;
pub mod wire;

use crate::speech::{AudioFormat, AudioSegment};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use session::{Phase, SendOutcome, TransportSession};
pub use wire::MemoryWire;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("not connected")]
    NotConnected,
}

/// Factory for links to the shared channel. One `connect` call yields one
/// link; reconnects go through the factory again.
#[async_trait]
pub trait Wire: Send + Sync {
    type Link: Link;

    async fn connect(&self) -> Result<Self::Link, TransportError>;
}

/// One live connection to the channel.
#[async_trait]
pub trait Link: Send {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Backpressure signal from the channel; sends are dropped while false.
    fn is_ready(&self) -> bool;

    /// Cancelled when the underlying connection is lost. Clonable, so the
    /// session can watch it without holding the link.
    fn closed_token(&self) -> CancellationToken;

    /// The inbound byte stream. Yields `None` after the first call.
    fn take_inbound(&mut self) -> Option<mpsc::Receiver<Vec<u8>>>;

    async fn close(&mut self);

    async fn open_audio(&mut self, format: AudioFormat) -> Result<Box<dyn AudioSink>, TransportError>;
}

/// Outbound audio track for one reaction.
#[async_trait]
pub trait AudioSink: Send {
    async fn write(&mut self, segment: &AudioSegment) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}
