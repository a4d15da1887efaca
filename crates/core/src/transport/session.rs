use crate::protocol::{Packet, StickyKind, TOPIC_DETECTION};
use crate::speech::AudioFormat;
use crate::transport::{AudioSink, Link, TransportError, Wire};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    /// Link up, transmitting.
    Connected,
    /// Link up, transmission suppressed; reception still processed.
    Paused,
}

/// What `send` did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Not connected; sticky packets were still recorded for replay.
    DroppedDisconnected,
    DroppedPaused,
    /// Channel reported backpressure.
    DroppedNotReady,
    Failed,
}

/// Connection state machine around the shared channel: explicit
/// connect/disconnect intent, pause, retry scheduling after loss, and
/// sticky replay on every transition into Connected.
///
/// Single-owner: all calls happen on the agent actor. The reconnect timer
/// is not self-driving — the owner polls [`retry_deadline`] and calls
/// [`tick_reconnect`] when it expires.
pub struct TransportSession<W: Wire> {
    wire: W,
    link: Option<W::Link>,
    phase: Phase,
    should_reconnect: bool,
    pending_sticky: HashMap<StickyKind, Packet>,
    retry_delay: Duration,
    retry_at: Option<Instant>,
    closed: CancellationToken,
    phase_tx: watch::Sender<Phase>,
    inbound_tx: mpsc::Sender<Packet>,
}

impl<W: Wire> TransportSession<W> {
    pub fn new(wire: W, retry_delay: Duration, inbound_tx: mpsc::Sender<Packet>) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Disconnected);
        Self {
            wire,
            link: None,
            phase: Phase::Disconnected,
            should_reconnect: false,
            pending_sticky: HashMap::new(),
            retry_delay,
            retry_at: None,
            closed: CancellationToken::new(),
            phase_tx,
            inbound_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Connected or Paused — the link itself is up either way.
    pub fn is_connected(&self) -> bool {
        matches!(self.phase, Phase::Connected | Phase::Paused)
    }

    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Fires when the current link drops. Never fires while disconnected.
    pub fn closed_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// When the next reconnect attempt is due, if one is scheduled.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "session phase change");
            self.phase = phase;
            let _ = self.phase_tx.send(phase);
        }
    }

    /// Declare connect intent and attempt the connection. No-op when the
    /// link is already up.
    pub async fn connect(&mut self) {
        self.should_reconnect = true;
        if self.is_connected() {
            return;
        }
        self.try_connect().await;
    }

    /// Drop connect intent, cancel any scheduled retry, and tear the link
    /// down gracefully.
    pub async fn disconnect(&mut self) {
        self.should_reconnect = false;
        self.retry_at = None;
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        self.closed = CancellationToken::new();
        self.set_phase(Phase::Disconnected);
    }

    /// Run a scheduled reconnect attempt. Call when [`retry_deadline`]
    /// expires.
    pub async fn tick_reconnect(&mut self) {
        self.retry_at = None;
        if self.is_connected() || !self.should_reconnect {
            return;
        }
        self.try_connect().await;
    }

    /// React to the current link dropping: notify, and schedule a retry if
    /// intent still holds.
    pub fn on_connection_lost(&mut self) {
        warn!("connection lost");
        self.link = None;
        self.closed = CancellationToken::new();
        self.set_phase(Phase::Disconnected);
        if self.should_reconnect {
            self.retry_at = Some(Instant::now() + self.retry_delay);
            self.set_phase(Phase::Connecting);
        }
    }

    async fn try_connect(&mut self) {
        self.set_phase(Phase::Connecting);
        match self.wire.connect().await {
            Ok(mut link) => {
                // Intent may have been dropped while the attempt was in
                // flight; the late link must not survive it.
                if !self.should_reconnect {
                    link.close().await;
                    self.set_phase(Phase::Disconnected);
                    return;
                }
                self.closed = link.closed_token();
                if let Some(inbound) = link.take_inbound() {
                    spawn_inbound_forwarder(inbound, self.inbound_tx.clone(), self.closed.clone());
                }
                self.link = Some(link);
                self.retry_at = None;
                self.set_phase(Phase::Connected);
                info!(conn_id = %uuid::Uuid::new_v4(), "connected");
                self.flush_sticky().await;
            }
            Err(error) => {
                warn!(%error, "connect attempt failed");
                if self.should_reconnect {
                    self.retry_at = Some(Instant::now() + self.retry_delay);
                } else {
                    self.set_phase(Phase::Disconnected);
                }
            }
        }
    }

    /// Suppress or resume transmission. Meaningful only while the link is
    /// up; resuming flushes sticky state immediately.
    pub async fn set_paused(&mut self, paused: bool) {
        match (self.phase, paused) {
            (Phase::Connected, true) => self.set_phase(Phase::Paused),
            (Phase::Paused, false) => {
                self.set_phase(Phase::Connected);
                self.flush_sticky().await;
            }
            _ => {}
        }
    }

    /// Send a packet. Sticky kinds are recorded for replay before any
    /// phase check; non-sticky packets are best-effort and never queued.
    pub async fn send(&mut self, packet: &Packet) -> SendOutcome {
        if let Some(kind) = packet.sticky_kind() {
            self.pending_sticky.insert(kind, packet.clone());
        }
        match self.phase {
            Phase::Paused => SendOutcome::DroppedPaused,
            Phase::Disconnected | Phase::Connecting => SendOutcome::DroppedDisconnected,
            Phase::Connected => {
                let Some(link) = self.link.as_mut() else {
                    return SendOutcome::DroppedDisconnected;
                };
                if !link.is_ready() {
                    debug!(event = %packet.event, "channel not ready, dropping");
                    return SendOutcome::DroppedNotReady;
                }
                match transmit(link, packet).await {
                    Ok(()) => SendOutcome::Sent,
                    Err(error) => {
                        warn!(%error, event = %packet.event, "send failed");
                        SendOutcome::Failed
                    }
                }
            }
        }
    }

    /// Replay buffered sticky state after entering Connected. Session-start
    /// is one-shot: cleared after its first successful flush. Persona is
    /// current truth: re-sent on every reconnect until replaced.
    async fn flush_sticky(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if let Some(packet) = self.pending_sticky.get(&StickyKind::SessionStart).cloned() {
            match transmit(link, &packet).await {
                Ok(()) => {
                    self.pending_sticky.remove(&StickyKind::SessionStart);
                }
                Err(error) => warn!(%error, "session-start replay failed"),
            }
        }
        if let Some(packet) = self.pending_sticky.get(&StickyKind::Persona).cloned() {
            if let Err(error) = transmit(link, &packet).await {
                warn!(%error, "persona replay failed");
            }
        }
    }

    /// Open an outbound audio track. Refused while paused or down.
    pub async fn open_audio(
        &mut self,
        format: AudioFormat,
    ) -> Result<Box<dyn AudioSink>, TransportError> {
        if self.phase != Phase::Connected {
            return Err(TransportError::NotConnected);
        }
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        link.open_audio(format).await
    }

    #[cfg(test)]
    fn pending_sticky_len(&self) -> usize {
        self.pending_sticky.len()
    }
}

async fn transmit<L: Link>(link: &mut L, packet: &Packet) -> Result<(), TransportError> {
    let payload = packet
        .encode()
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    link.publish(TOPIC_DETECTION, payload).await
}

/// Decode inbound bytes into packets for the agent loop. Malformed payloads
/// are dropped with a log line; the stream keeps going.
fn spawn_inbound_forwarder(
    mut inbound: mpsc::Receiver<Vec<u8>>,
    out: mpsc::Sender<Packet>,
    closed: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = closed.cancelled() => break,
                maybe = inbound.recv() => {
                    let Some(bytes) = maybe else { break };
                    match Packet::decode(&bytes) {
                        Ok(packet) => {
                            if out.send(packet).await.is_err() {
                                break;
                            }
                        }
                        Err(error) => warn!(%error, "dropping malformed inbound packet"),
                    }
                }
            }
        }
    });
}
