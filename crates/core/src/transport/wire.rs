use crate::speech::{AudioFormat, AudioSegment};
use crate::transport::{AudioSink, Link, TransportError, Wire};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// In-process channel double. Serves the local driver loop and every
/// transport test: scriptable connect failures, readiness, link drops and
/// inbound injection, with full visibility into what got published.
#[derive(Clone, Default)]
pub struct MemoryWire {
    state: Arc<Mutex<WireState>>,
}

#[derive(Default)]
struct WireState {
    fail_next_connects: u32,
    connect_count: u32,
    ready: bool,
    published: Vec<(String, Vec<u8>)>,
    audio: Vec<AudioSegment>,
    current: Option<LinkHandles>,
}

struct LinkHandles {
    closed: CancellationToken,
    inbound_tx: mpsc::Sender<Vec<u8>>,
}

impl MemoryWire {
    pub fn new() -> Self {
        let wire = Self::default();
        wire.state.lock().unwrap().ready = true;
        wire
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.state.lock().unwrap().fail_next_connects = n;
    }

    pub fn connect_count(&self) -> u32 {
        self.state.lock().unwrap().connect_count
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    /// Every payload published so far, any topic.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn audio_segments(&self) -> Vec<AudioSegment> {
        self.state.lock().unwrap().audio.clone()
    }

    /// Simulate an unexpected connection loss.
    pub fn drop_link(&self) {
        if let Some(handles) = self.state.lock().unwrap().current.take() {
            handles.closed.cancel();
        }
    }

    /// Deliver bytes to the current link's inbound stream.
    pub fn inject(&self, bytes: Vec<u8>) {
        let tx = self
            .state
            .lock()
            .unwrap()
            .current
            .as_ref()
            .map(|h| h.inbound_tx.clone());
        if let Some(tx) = tx {
            let _ = tx.try_send(bytes);
        }
    }
}

#[async_trait]
impl Wire for MemoryWire {
    type Link = MemoryLink;

    async fn connect(&self) -> Result<MemoryLink, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.connect_count += 1;
        if state.fail_next_connects > 0 {
            state.fail_next_connects -= 1;
            return Err(TransportError::ConnectFailed("scripted failure".into()));
        }
        let closed = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        state.current = Some(LinkHandles { closed: closed.clone(), inbound_tx });
        Ok(MemoryLink {
            state: self.state.clone(),
            closed,
            inbound: Some(inbound_rx),
        })
    }
}

pub struct MemoryLink {
    state: Arc<Mutex<WireState>>,
    closed: CancellationToken,
    inbound: Option<mpsc::Receiver<Vec<u8>>>,
}

#[async_trait]
impl Link for MemoryLink {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::SendFailed("link closed".into()));
        }
        self.state.lock().unwrap().published.push((topic.to_owned(), payload));
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    fn take_inbound(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.inbound.take()
    }

    async fn close(&mut self) {
        self.closed.cancel();
        let mut state = self.state.lock().unwrap();
        if state
            .current
            .as_ref()
            .is_some_and(|h| h.closed.is_cancelled())
        {
            state.current = None;
        }
    }

    async fn open_audio(&mut self, _format: AudioFormat) -> Result<Box<dyn AudioSink>, TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::NotConnected);
        }
        Ok(Box::new(MemorySink { state: self.state.clone() }))
    }
}

struct MemorySink {
    state: Arc<Mutex<WireState>>,
}

#[async_trait]
impl AudioSink for MemorySink {
    async fn write(&mut self, segment: &AudioSegment) -> Result<(), TransportError> {
        self.state.lock().unwrap().audio.push(segment.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_inspect() {
        let wire = MemoryWire::new();
        let mut link = wire.connect().await.unwrap();
        link.publish("detection", b"hello".to_vec()).await.unwrap();
        assert_eq!(wire.published_on("detection"), vec![b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn scripted_connect_failures() {
        let wire = MemoryWire::new();
        wire.fail_next_connects(2);
        assert!(wire.connect().await.is_err());
        assert!(wire.connect().await.is_err());
        assert!(wire.connect().await.is_ok());
        assert_eq!(wire.connect_count(), 3);
    }

    #[tokio::test]
    async fn drop_link_cancels_closed_token() {
        let wire = MemoryWire::new();
        let link = wire.connect().await.unwrap();
        let token = link.closed_token();
        assert!(!token.is_cancelled());
        wire.drop_link();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn inject_reaches_inbound() {
        let wire = MemoryWire::new();
        let mut link = wire.connect().await.unwrap();
        let mut inbound = link.take_inbound().unwrap();
        wire.inject(b"ping".to_vec());
        assert_eq!(inbound.recv().await.unwrap(), b"ping");
        assert!(link.take_inbound().is_none());
    }
}
