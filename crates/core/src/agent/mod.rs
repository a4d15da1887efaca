//! The reacting-side actor: one task owns the session, the memory, the
//! persona and the debounce gate, so none of them ever see concurrent
//! mutation. Everything else reaches the agent through channels.

use crate::classify::{DebounceGate, WindowRules, WindowVerdict};
use crate::config::VigilCfg;
use crate::memory::EventMemory;
use crate::protocol::{events, Packet};
use crate::reaction::{Persona, ReactionDispatcher};
use crate::speech::Synthesizer;
use crate::transport::{TransportSession, Wire};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_llm::provider::LlmProvider;

/// Stream key for foreground-window debouncing. There is exactly one
/// foreground window, hence one stream.
const FOCUS_STREAM: &str = "focus";

#[derive(Debug)]
pub enum AgentCommand {
    Connect,
    Disconnect,
    SetPaused(bool),
    Send(Packet),
}

/// Cheap clonable handle for driving the agent from outside.
#[derive(Clone)]
pub struct AgentHandle {
    commands: mpsc::Sender<AgentCommand>,
    token: CancellationToken,
}

impl AgentHandle {
    pub async fn connect(&self) {
        let _ = self.commands.send(AgentCommand::Connect).await;
    }

    pub async fn disconnect(&self) {
        let _ = self.commands.send(AgentCommand::Disconnect).await;
    }

    pub async fn set_paused(&self, paused: bool) {
        let _ = self.commands.send(AgentCommand::SetPaused(paused)).await;
    }

    pub async fn send(&self, packet: Packet) {
        let _ = self.commands.send(AgentCommand::Send(packet)).await;
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

enum Step {
    Shutdown,
    Command(Option<AgentCommand>),
    Inbound(Option<Packet>),
    LinkLost,
    Retry,
}

pub struct Agent<W: Wire> {
    cfg: VigilCfg,
    session: TransportSession<W>,
    memory: EventMemory,
    persona: Persona,
    rules: WindowRules,
    debounce: DebounceGate,
    dispatcher: ReactionDispatcher,
    classifier: Option<Arc<dyn LlmProvider>>,
    inbound_tx: mpsc::Sender<Packet>,
    inbound_rx: mpsc::Receiver<Packet>,
    cmd_rx: mpsc::Receiver<AgentCommand>,
    token: CancellationToken,
}

impl<W: Wire> Agent<W> {
    pub fn new(
        cfg: VigilCfg,
        wire: W,
        generator: Option<Arc<dyn LlmProvider>>,
        classifier: Option<Arc<dyn LlmProvider>>,
        synth: Arc<dyn Synthesizer>,
    ) -> (Self, AgentHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel(cfg.inbound_buffer);
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let token = CancellationToken::new();
        let session = TransportSession::new(
            wire,
            Duration::from_secs_f64(cfg.reconnect_delay_secs),
            inbound_tx.clone(),
        );
        let agent = Self {
            memory: EventMemory::new(cfg.history_cap, cfg.default_cooldown_secs),
            rules: WindowRules::from_keywords(&cfg.distracting_keywords, &cfg.productive_keywords),
            debounce: DebounceGate::new(Duration::from_secs_f64(cfg.debounce_window_secs)),
            dispatcher: ReactionDispatcher::new(generator, synth),
            persona: Persona::default(),
            session,
            classifier,
            inbound_tx,
            inbound_rx,
            cmd_rx,
            token: token.clone(),
            cfg,
        };
        let handle = AgentHandle { commands: cmd_tx, token };
        (agent, handle)
    }

    /// Run until shutdown. Connects immediately; reconnects are driven by
    /// the session's retry deadline.
    pub async fn run(mut self) {
        self.session.connect().await;
        loop {
            let step = {
                let closed = self.session.closed_signal();
                let link_up = self.session.is_connected();
                let retry_at = self.session.retry_deadline();
                tokio::select! {
                    _ = self.token.cancelled() => Step::Shutdown,
                    maybe = self.cmd_rx.recv() => Step::Command(maybe),
                    maybe = self.inbound_rx.recv() => Step::Inbound(maybe),
                    _ = closed.cancelled(), if link_up => Step::LinkLost,
                    _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                        Step::Retry
                    }
                }
            };
            match step {
                Step::Shutdown => break,
                Step::Command(None) | Step::Inbound(None) => break,
                Step::Command(Some(cmd)) => self.handle_command(cmd).await,
                Step::Inbound(Some(packet)) => self.handle_packet(packet).await,
                Step::LinkLost => self.session.on_connection_lost(),
                Step::Retry => self.session.tick_reconnect().await,
            }
        }
        self.debounce.cancel_all();
        self.session.disconnect().await;
        info!("agent stopped");
    }

    async fn handle_command(&mut self, cmd: AgentCommand) {
        match cmd {
            AgentCommand::Connect => self.session.connect().await,
            AgentCommand::Disconnect => self.session.disconnect().await,
            AgentCommand::SetPaused(paused) => self.session.set_paused(paused).await,
            AgentCommand::Send(packet) => {
                let outcome = self.session.send(&packet).await;
                debug!(event = %packet.event, ?outcome, "outbound send");
            }
        }
    }

    async fn handle_packet(&mut self, packet: Packet) {
        debug!(event = %packet.event, category = ?packet.meta.category, "packet received");
        match packet.event.as_str() {
            events::SESSION_START => {
                info!("session started, clearing memory");
                self.memory.clear();
                self.debounce.cancel_all();
            }
            events::SESSION_END => {
                info!("session ended");
                self.debounce.cancel_all();
            }
            events::PERSONA_UPDATE => {
                if self.persona.apply_update(&packet.data) {
                    info!(persona = %self.persona.name, "persona updated");
                } else {
                    warn!("persona update without a personality field, ignored");
                }
            }
            events::WINDOW_CHANGE => self.handle_window_change(packet).await,
            events::FLAGGED | events::GAMING | events::DISTRACTING_APP => {
                let cooldown = Some(self.cfg.distraction_cooldown_secs);
                self.admit_and_react(&packet, cooldown).await;
            }
            _ => self.admit_and_react(&packet, None).await,
        }
    }

    /// A window change always supersedes whatever judgment was pending on
    /// the focus stream.
    async fn handle_window_change(&mut self, packet: Packet) {
        let title = packet.field("window_title").unwrap_or("");
        let process = packet.field("process_name").unwrap_or("");
        match self.rules.classify(title, process) {
            WindowVerdict::Distracting => {
                self.debounce.cancel(FOCUS_STREAM);
                let mut flagged = packet;
                flagged.event = events::DISTRACTING_APP.to_owned();
                let cooldown = Some(self.cfg.distraction_cooldown_secs);
                self.admit_and_react(&flagged, cooldown).await;
            }
            WindowVerdict::Productive => {
                debug!(title, "productive window");
                self.debounce.cancel(FOCUS_STREAM);
            }
            WindowVerdict::Ambiguous => match &self.classifier {
                Some(classifier) => {
                    debug!(title, "ambiguous window, arming debounce");
                    self.debounce.arm(
                        FOCUS_STREAM,
                        packet,
                        classifier.clone(),
                        self.inbound_tx.clone(),
                    );
                }
                None => debug!(title, "ambiguous window, no classifier configured"),
            },
        }
    }

    async fn admit_and_react(&mut self, packet: &Packet, cooldown_override: Option<f64>) {
        if !self.memory.admit(&packet.event, &packet.data, cooldown_override) {
            debug!(event = %packet.event, "suppressed by cooldown");
            return;
        }
        let summary = self.memory.summarize();
        self.dispatcher
            .react(&self.persona, &summary, packet, &mut self.session)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Category;
    use crate::speech::MockSynth;
    use crate::transport::MemoryWire;
    use serde_json::{json, Map};
    use vigil_llm::provider::MockProvider;

    fn cfg() -> VigilCfg {
        VigilCfg {
            debounce_window_secs: 0.05,
            reconnect_delay_secs: 0.05,
            ..VigilCfg::default()
        }
    }

    fn spawn_agent(cfg: VigilCfg, wire: &MemoryWire, synth: &MockSynth) -> AgentHandle {
        let (agent, handle) = Agent::new(
            cfg,
            wire.clone(),
            Some(Arc::new(MockProvider::new("Back to work."))),
            Some(Arc::new(MockProvider::new("DISTRACTING"))),
            Arc::new(synth.clone()),
        );
        tokio::spawn(agent.run());
        handle
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    fn vision(event: &str) -> Vec<u8> {
        Packet::new(Category::Vision, event, Map::new()).encode().unwrap()
    }

    fn window(title: &str) -> Vec<u8> {
        let mut data = Map::new();
        data.insert("window_title".into(), json!(title));
        data.insert("process_name".into(), json!("firefox"));
        Packet::new(Category::Screen, events::WINDOW_CHANGE, data)
            .encode()
            .unwrap()
    }

    #[tokio::test]
    async fn vision_event_triggers_reaction() {
        let wire = MemoryWire::new();
        let synth = MockSynth::new(1);
        let handle = spawn_agent(cfg(), &wire, &synth);
        wait_until(|| wire.connect_count() >= 1).await;

        wire.inject(vision(events::SLEEPING));
        wait_until(|| synth.spoken().len() == 1).await;
        assert!(!wire.audio_segments().is_empty());
        handle.shutdown();
    }

    #[tokio::test]
    async fn cooldown_suppresses_duplicate_events() {
        let wire = MemoryWire::new();
        let synth = MockSynth::new(1);
        let handle = spawn_agent(cfg(), &wire, &synth);
        wait_until(|| wire.connect_count() >= 1).await;

        wire.inject(vision(events::SLEEPING));
        wait_until(|| synth.spoken().len() == 1).await;
        wire.inject(vision(events::SLEEPING));
        // a different event type is still admittable
        wire.inject(vision(events::ABSENT));
        wait_until(|| synth.spoken().len() == 2).await;
        assert_eq!(synth.spoken().len(), 2);
        handle.shutdown();
    }

    #[tokio::test]
    async fn session_start_clears_cooldowns() {
        let wire = MemoryWire::new();
        let synth = MockSynth::new(1);
        let handle = spawn_agent(cfg(), &wire, &synth);
        wait_until(|| wire.connect_count() >= 1).await;

        wire.inject(vision(events::SLEEPING));
        wait_until(|| synth.spoken().len() == 1).await;
        wire.inject(Packet::new(Category::System, events::SESSION_START, Map::new()).encode().unwrap());
        wire.inject(vision(events::SLEEPING));
        wait_until(|| synth.spoken().len() == 2).await;
        handle.shutdown();
    }

    #[tokio::test]
    async fn distracting_window_reacts_immediately() {
        let wire = MemoryWire::new();
        let synth = MockSynth::new(1);
        let handle = spawn_agent(cfg(), &wire, &synth);
        wait_until(|| wire.connect_count() >= 1).await;

        wire.inject(window("YouTube - cat videos"));
        wait_until(|| synth.spoken().len() == 1).await;
        handle.shutdown();
    }

    #[tokio::test]
    async fn productive_window_stays_silent() {
        let wire = MemoryWire::new();
        let synth = MockSynth::new(1);
        let handle = spawn_agent(cfg(), &wire, &synth);
        wait_until(|| wire.connect_count() >= 1).await;

        wire.inject(window("main.rs - Visual Studio Code"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(synth.spoken().is_empty());
        handle.shutdown();
    }

    #[tokio::test]
    async fn ambiguous_window_is_debounced_then_flagged() {
        let wire = MemoryWire::new();
        let synth = MockSynth::new(1);
        let handle = spawn_agent(cfg(), &wire, &synth);
        wait_until(|| wire.connect_count() >= 1).await;

        wire.inject(window("weather.com"));
        // classifier verdict is DISTRACTING; after the quiet window the
        // synthetic flagged packet feeds back into the loop
        wait_until(|| synth.spoken().len() == 1).await;
        handle.shutdown();
    }

    #[tokio::test]
    async fn reconnects_after_link_drop() {
        let wire = MemoryWire::new();
        let synth = MockSynth::new(1);
        let handle = spawn_agent(cfg(), &wire, &synth);
        wait_until(|| wire.connect_count() >= 1).await;

        wire.drop_link();
        wait_until(|| wire.connect_count() >= 2).await;

        wire.inject(vision(events::SLEEPING));
        wait_until(|| synth.spoken().len() == 1).await;
        handle.shutdown();
    }
}
