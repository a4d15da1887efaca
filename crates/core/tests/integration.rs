//! End-to-end runs of the agent over the in-memory wire.

use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::agent::{Agent, AgentHandle};
use vigil_core::config::VigilCfg;
use vigil_core::protocol::{events, Category, Packet, TOPIC_DETECTION};
use vigil_core::speech::MockSynth;
use vigil_core::transport::MemoryWire;
use vigil_llm::provider::MockProvider;

fn cfg() -> VigilCfg {
    VigilCfg {
        debounce_window_secs: 0.05,
        reconnect_delay_secs: 0.05,
        ..VigilCfg::default()
    }
}

fn spawn(wire: &MemoryWire, synth: &MockSynth) -> AgentHandle {
    let (agent, handle) = Agent::new(
        cfg(),
        wire.clone(),
        Some(Arc::new(MockProvider::new("Focus."))),
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

fn encoded(category: Category, event: &str, data: Map<String, serde_json::Value>) -> Vec<u8> {
    Packet::new(category, event, data).encode().unwrap()
}

fn wire_events(wire: &MemoryWire) -> Vec<String> {
    wire.published_on(TOPIC_DETECTION)
        .iter()
        .map(|bytes| Packet::decode(bytes).unwrap().event)
        .collect()
}

#[tokio::test]
async fn detection_becomes_spoken_audio() {
    let wire = MemoryWire::new();
    let synth = MockSynth::new(2);
    let handle = spawn(&wire, &synth);
    wait_until(|| wire.connect_count() >= 1).await;

    wire.inject(encoded(Category::Vision, events::SLEEPING, Map::new()));
    wait_until(|| !wire.audio_segments().is_empty()).await;
    assert_eq!(synth.spoken(), vec!["Focus."]);
    assert_eq!(wire.audio_segments().len(), 2);
    handle.shutdown();
}

#[tokio::test]
async fn repeat_event_inside_cooldown_is_silent() {
    let wire = MemoryWire::new();
    let synth = MockSynth::new(1);
    let handle = spawn(&wire, &synth);
    wait_until(|| wire.connect_count() >= 1).await;

    wire.inject(encoded(Category::Vision, events::PHONE_DETECTED, Map::new()));
    wait_until(|| synth.spoken().len() == 1).await;
    wire.inject(encoded(Category::Vision, events::PHONE_DETECTED, Map::new()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(synth.spoken().len(), 1);
    handle.shutdown();
}

#[tokio::test]
async fn ambiguous_window_pipeline_flags_and_reacts() {
    let wire = MemoryWire::new();
    let synth = MockSynth::new(1);
    let handle = spawn(&wire, &synth);
    wait_until(|| wire.connect_count() >= 1).await;

    let mut data = Map::new();
    data.insert("window_title".into(), json!("some obscure site"));
    data.insert("process_name".into(), json!("firefox"));
    wire.inject(encoded(Category::Screen, events::WINDOW_CHANGE, data));

    // quiet window elapses, classifier says distracting, agent speaks
    wait_until(|| synth.spoken().len() == 1).await;
    handle.shutdown();
}

#[tokio::test]
async fn sticky_persona_survives_a_reconnect() {
    let wire = MemoryWire::new();
    let synth = MockSynth::new(1);
    let handle = spawn(&wire, &synth);
    wait_until(|| wire.connect_count() >= 1).await;

    let mut data = Map::new();
    data.insert("personality".into(), json!("COACH"));
    handle
        .send(Packet::new(Category::System, events::PERSONA_UPDATE, data))
        .await;
    wait_until(|| wire_events(&wire).contains(&events::PERSONA_UPDATE.to_owned())).await;

    wire.drop_link();
    wait_until(|| wire.connect_count() >= 2).await;
    wait_until(|| {
        wire_events(&wire)
            .iter()
            .filter(|e| *e == events::PERSONA_UPDATE)
            .count()
            >= 2
    })
    .await;
    handle.shutdown();
}

#[tokio::test]
async fn pause_silences_outbound_until_resume() {
    let wire = MemoryWire::new();
    let synth = MockSynth::new(1);
    let handle = spawn(&wire, &synth);
    wait_until(|| wire.connect_count() >= 1).await;

    handle.set_paused(true).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle
        .send(Packet::new(Category::Vision, events::SLEEPING, Map::new()))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(wire_events(&wire).is_empty());

    handle.set_paused(false).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle
        .send(Packet::new(Category::Vision, events::SLEEPING, Map::new()))
        .await;
    wait_until(|| wire_events(&wire) == vec![events::SLEEPING.to_owned()]).await;
    handle.shutdown();
}
