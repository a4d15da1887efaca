//! Local driver: runs the agent against an in-process wire and a small
//! REPL standing in for the sensor producers.

use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vigil_core::agent::{Agent, AgentHandle};
use vigil_core::config::VigilCfg;
use vigil_core::protocol::{events, Category, Packet};
use vigil_core::speech::http::HttpSynth;
use vigil_core::speech::{AudioFormat, MockSynth, Synthesizer};
use vigil_core::transport::MemoryWire;
use vigil_llm::provider::LlmProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = VigilCfg::from_env();
    let format = AudioFormat {
        sample_rate: cfg.speech_sample_rate,
        channels: cfg.speech_channels,
    };

    let generator: Option<Arc<dyn LlmProvider>> = match vigil_llm::http::from_env() {
        Some(p) => {
            info!(provider = p.name(), "reaction generator configured");
            Some(Arc::new(p))
        }
        None => {
            warn!("no VIGIL_LLM_MODEL/VIGIL_LLM_API_KEY, reactions fall back to the safety line");
            None
        }
    };
    let classifier: Option<Arc<dyn LlmProvider>> =
        vigil_llm::http::classifier_from_env().map(|p| Arc::new(p) as Arc<dyn LlmProvider>);
    if classifier.is_none() {
        warn!("no VIGIL_CLASSIFIER_MODEL, ambiguous windows will not be judged");
    }

    let synth: Arc<dyn Synthesizer> = match HttpSynth::from_env(format) {
        Some(s) => Arc::new(s),
        None => {
            warn!("no VIGIL_TTS_URL, using the mock synthesizer");
            Arc::new(MockSynth::new(2))
        }
    };

    let wire = MemoryWire::new();
    let (agent, handle) = Agent::new(cfg, wire.clone(), generator, classifier, synth);
    let mut agent_task = tokio::spawn(agent.run());

    let mut lines = spawn_repl();
    println!("vigil ready. commands: sleep absent gaze phone game window <title> persona <name> [desc] start end connect disconnect pause resume raw <json> q");

    loop {
        tokio::select! {
            _ = &mut agent_task => break,
            maybe = lines.recv() => {
                let Some(line) = maybe else { break };
                if !dispatch_line(&line, &wire, &handle).await {
                    handle.shutdown();
                }
            }
        }
    }
    Ok(())
}

/// Blocking readline on its own thread, feeding lines to the async side.
fn spawn_repl() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let Ok(mut editor) = rustyline::DefaultEditor::new() else {
            return;
        };
        loop {
            match editor.readline("vigil> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(&line);
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => {
                    let _ = tx.send("q".to_owned());
                    break;
                }
            }
        }
    });
    rx
}

fn inject(wire: &MemoryWire, category: Category, event: &str, data: Map<String, serde_json::Value>) {
    match Packet::new(category, event, data).encode() {
        Ok(bytes) => wire.inject(bytes),
        Err(error) => warn!(%error, "could not encode packet"),
    }
}

/// Returns false when the loop should shut down.
async fn dispatch_line(line: &str, wire: &MemoryWire, handle: &AgentHandle) -> bool {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else { return true };
    let rest: Vec<&str> = words.collect();

    match cmd {
        "q" | "quit" | "exit" => return false,
        "sleep" => inject(wire, Category::Vision, events::SLEEPING, Map::new()),
        "absent" => inject(wire, Category::Vision, events::ABSENT, Map::new()),
        "gaze" => inject(wire, Category::Vision, events::GAZE_AWAY, Map::new()),
        "phone" => inject(wire, Category::Vision, events::PHONE_DETECTED, Map::new()),
        "game" => inject(wire, Category::Screen, events::GAMING, Map::new()),
        "window" => {
            let mut data = Map::new();
            data.insert("window_title".into(), json!(rest.join(" ")));
            data.insert("process_name".into(), json!("repl"));
            inject(wire, Category::Screen, events::WINDOW_CHANGE, data);
        }
        "persona" => match rest.split_first() {
            Some((name, desc)) => {
                let mut data = Map::new();
                data.insert("personality".into(), json!(name));
                if !desc.is_empty() {
                    data.insert("description".into(), json!(desc.join(" ")));
                }
                inject(wire, Category::System, events::PERSONA_UPDATE, data);
            }
            None => println!("usage: persona <name> [description]"),
        },
        "start" => inject(wire, Category::System, events::SESSION_START, Map::new()),
        "end" => inject(wire, Category::System, events::SESSION_END, Map::new()),
        "connect" => handle.connect().await,
        "disconnect" => handle.disconnect().await,
        "pause" => handle.set_paused(true).await,
        "resume" => handle.set_paused(false).await,
        "drop" => wire.drop_link(),
        "raw" => wire.inject(rest.join(" ").into_bytes()),
        other => println!("unknown command: {other}"),
    }

    // give the reaction a moment to land before the next prompt draws
    tokio::time::sleep(Duration::from_millis(20)).await;
    true
}
