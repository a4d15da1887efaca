use crate::protocol::Packet;
use crate::reaction::{build_context, build_instructions, Persona, SAFETY_LINE};
use crate::speech::Synthesizer;
use crate::transport::{TransportSession, Wire};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vigil_llm::provider::{CompletionRequest, LlmProvider};

/// Composes a reaction: generate a persona line, synthesize it, stream the
/// audio out. Admission already rate-limits invocations, but different
/// event types can still be admitted back to back, so an explicit in-flight
/// guard keeps two reactions from talking over each other.
pub struct ReactionDispatcher {
    generator: Option<Arc<dyn LlmProvider>>,
    synth: Arc<dyn Synthesizer>,
    in_flight: Mutex<()>,
}

impl ReactionDispatcher {
    pub fn new(generator: Option<Arc<dyn LlmProvider>>, synth: Arc<dyn Synthesizer>) -> Self {
        Self { generator, synth, in_flight: Mutex::new(()) }
    }

    /// Generate and speak a reaction to an already-admitted packet.
    /// Generation failure falls back to a fixed safety line; synthesis or
    /// sink failure abandons this reaction.
    pub async fn react<W: Wire>(
        &self,
        persona: &Persona,
        memory_summary: &str,
        packet: &Packet,
        session: &mut TransportSession<W>,
    ) {
        let _guard = self.in_flight.lock().await;

        let text = match &self.generator {
            Some(generator) => {
                let request = CompletionRequest::instructed(
                    build_instructions(persona),
                    build_context(memory_summary, packet),
                );
                match generator.complete(request).await {
                    Ok(resp) => {
                        debug!(
                            provider = generator.name(),
                            input_tokens = resp.input_tokens,
                            output_tokens = resp.output_tokens,
                            "reaction generated"
                        );
                        resp.content
                    }
                    Err(error) => {
                        warn!(%error, event = %packet.event, "generation failed, using safety line");
                        SAFETY_LINE.to_owned()
                    }
                }
            }
            None => {
                debug!("no generator configured, using safety line");
                SAFETY_LINE.to_owned()
            }
        };

        let mut segments = match self.synth.synthesize(&text).await {
            Ok(stream) => stream,
            Err(error) => {
                warn!(%error, "synthesis failed, reaction abandoned");
                return;
            }
        };

        // Sink is opened lazily: the first segment decides the format.
        let mut sink = None;
        let mut written = 0usize;
        while let Some(next) = segments.recv().await {
            let segment = match next {
                Ok(segment) => segment,
                Err(error) => {
                    warn!(%error, "segment stream broke mid-reaction");
                    break;
                }
            };
            if sink.is_none() {
                match session.open_audio(segment.format).await {
                    Ok(s) => sink = Some(s),
                    Err(error) => {
                        warn!(%error, "could not open audio sink, reaction abandoned");
                        return;
                    }
                }
            }
            if let Some(sink) = sink.as_mut() {
                if let Err(error) = sink.write(&segment).await {
                    warn!(%error, "audio write failed, reaction abandoned");
                    return;
                }
                written += 1;
            }
        }

        if let Some(mut sink) = sink {
            if let Err(error) = sink.close().await {
                warn!(%error, "audio sink close failed");
            }
        }
        info!(event = %packet.event, segments = written, "reaction spoken");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{events, Category};
    use crate::speech::MockSynth;
    use crate::transport::MemoryWire;
    use serde_json::Map;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use vigil_llm::provider::MockProvider;

    async fn connected_session(
        wire: &MemoryWire,
    ) -> (TransportSession<MemoryWire>, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(8);
        let mut s = TransportSession::new(wire.clone(), Duration::from_secs(3), tx);
        s.connect().await;
        (s, rx)
    }

    fn packet(event: &str) -> Packet {
        Packet::new(Category::Vision, event, Map::new())
    }

    #[tokio::test]
    async fn generated_text_is_synthesized_and_published() {
        let wire = MemoryWire::new();
        let (mut session, _inbound) = connected_session(&wire).await;
        let synth = MockSynth::new(2);
        let dispatcher = ReactionDispatcher::new(
            Some(Arc::new(MockProvider::new("Wake up."))),
            Arc::new(synth.clone()),
        );

        dispatcher
            .react(&Persona::default(), "No activity recorded yet.", &packet(events::SLEEPING), &mut session)
            .await;

        assert_eq!(synth.spoken(), vec!["Wake up."]);
        assert_eq!(wire.audio_segments().len(), 2);
    }

    #[tokio::test]
    async fn generation_failure_speaks_safety_line() {
        let wire = MemoryWire::new();
        let (mut session, _inbound) = connected_session(&wire).await;
        let synth = MockSynth::new(1);
        let dispatcher = ReactionDispatcher::new(
            Some(Arc::new(MockProvider::failing("rate limited"))),
            Arc::new(synth.clone()),
        );

        dispatcher
            .react(&Persona::default(), "", &packet(events::ABSENT), &mut session)
            .await;

        assert_eq!(synth.spoken(), vec![SAFETY_LINE]);
        assert_eq!(wire.audio_segments().len(), 1);
    }

    #[tokio::test]
    async fn missing_generator_speaks_safety_line() {
        let wire = MemoryWire::new();
        let (mut session, _inbound) = connected_session(&wire).await;
        let synth = MockSynth::new(1);
        let dispatcher = ReactionDispatcher::new(None, Arc::new(synth.clone()));

        dispatcher
            .react(&Persona::default(), "", &packet(events::GAZE_AWAY), &mut session)
            .await;

        assert_eq!(synth.spoken(), vec![SAFETY_LINE]);
    }

    #[tokio::test]
    async fn zero_segments_opens_no_sink() {
        let wire = MemoryWire::new();
        let (mut session, _inbound) = connected_session(&wire).await;
        let dispatcher = ReactionDispatcher::new(
            Some(Arc::new(MockProvider::new("silence"))),
            Arc::new(MockSynth::new(0)),
        );

        dispatcher
            .react(&Persona::default(), "", &packet(events::SLEEPING), &mut session)
            .await;

        assert!(wire.audio_segments().is_empty());
    }
}
