use crate::protocol::{events, Category, Packet};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vigil_llm::provider::{CompletionRequest, LlmProvider};

const CLASSIFIER_INSTRUCTIONS: &str = "You judge whether a computer window \
represents a distraction from focused work. Reply with exactly one word: \
DISTRACTING or PRODUCTIVE. When genuinely unsure, reply PRODUCTIVE.";

/// Debounced judgment for ambiguous window signals. At most one timer is
/// live per stream; arming a stream cancels whatever was pending on it.
/// Surviving the quiet window is the proof that nothing else happened,
/// so only then does the classifier get called.
pub struct DebounceGate {
    window: Duration,
    pending: HashMap<String, CancellationToken>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: HashMap::new() }
    }

    /// Cancel any pending judgment on `stream` and arm a new one. A positive
    /// verdict comes back as a synthetic packet on `out`; anything else is
    /// logged and dropped.
    pub fn arm(
        &mut self,
        stream: &str,
        packet: Packet,
        classifier: Arc<dyn LlmProvider>,
        out: mpsc::Sender<Packet>,
    ) {
        self.cancel(stream);
        let token = CancellationToken::new();
        self.pending.insert(stream.to_owned(), token.clone());

        let window = self.window;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(window) => {
                    // Re-check: cancellation can land in the same poll as
                    // timer expiry.
                    if token.is_cancelled() {
                        return;
                    }
                    // Mark the entry spent so has_pending stays truthful
                    // after the timer wins.
                    token.cancel();
                    judge(packet, classifier, out).await;
                }
            }
        });
    }

    /// Cancel the pending judgment on `stream`, if any.
    pub fn cancel(&mut self, stream: &str) {
        if let Some(token) = self.pending.remove(stream) {
            token.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, token) in self.pending.drain() {
            token.cancel();
        }
    }

    pub fn has_pending(&self, stream: &str) -> bool {
        self.pending
            .get(stream)
            .is_some_and(|token| !token.is_cancelled())
    }
}

async fn judge(packet: Packet, classifier: Arc<dyn LlmProvider>, out: mpsc::Sender<Packet>) {
    let context = format!(
        "window_title: {}\nprocess_name: {}",
        packet.field("window_title").unwrap_or("unknown"),
        packet.field("process_name").unwrap_or("unknown"),
    );
    let request = CompletionRequest::instructed(CLASSIFIER_INSTRUCTIONS, context);

    let verdict = match classifier.complete(request).await {
        Ok(resp) => parse_verdict(&resp.content),
        Err(error) => {
            warn!(%error, "window classification failed");
            return;
        }
    };

    match verdict {
        Some(true) => {
            let mut data = packet.data.clone();
            data.insert("flagged_by".into(), "debounce-classifier".into());
            let flagged = Packet::new(Category::Synthetic, events::FLAGGED, data);
            if out.send(flagged).await.is_err() {
                debug!("agent gone, dropping classifier verdict");
            }
        }
        Some(false) => debug!(event = %packet.event, "window judged productive"),
        None => debug!(event = %packet.event, "classifier gave no verdict"),
    }
}

/// Some(true) = distracting, Some(false) = productive, None = no verdict.
fn parse_verdict(content: &str) -> Option<bool> {
    let c = content.to_lowercase();
    if c.contains("distracting") {
        Some(true)
    } else if c.contains("productive") {
        Some(false)
    } else {
        None
    }
}
