use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone)]
struct EventLog {
    at: f64,
    event: String,
    data: Map<String, Value>,
}

/// Per-event-type cooldown ledger with a bounded recent-history ring and
/// cumulative counters. Owned by the agent actor; never shared across tasks.
///
/// `admit` fuses "should I react" with "record that I did" in one call, so
/// two admissions of the same type inside one cooldown window can never
/// both pass.
#[derive(Debug)]
pub struct EventMemory {
    history: VecDeque<EventLog>,
    last_alert: HashMap<String, f64>,
    violation_counts: BTreeMap<String, u32>,
    history_cap: usize,
    default_cooldown: f64,
}

fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

impl EventMemory {
    pub fn new(history_cap: usize, default_cooldown: f64) -> Self {
        Self {
            history: VecDeque::with_capacity(history_cap),
            last_alert: HashMap::new(),
            violation_counts: BTreeMap::new(),
            history_cap,
            default_cooldown,
        }
    }

    /// Admit an event if its type is out of cooldown, recording it in the
    /// same step. Returns false and mutates nothing when still cooling down.
    pub fn admit(
        &mut self,
        event: &str,
        data: &Map<String, Value>,
        cooldown_override: Option<f64>,
    ) -> bool {
        self.admit_at(now_secs(), event, data, cooldown_override)
    }

    fn admit_at(
        &mut self,
        now: f64,
        event: &str,
        data: &Map<String, Value>,
        cooldown_override: Option<f64>,
    ) -> bool {
        let cooldown = cooldown_override.unwrap_or(self.default_cooldown);
        if let Some(&last) = self.last_alert.get(event) {
            if now - last <= cooldown {
                debug!(event, elapsed = now - last, cooldown, "still cooling down");
                return false;
            }
        }

        self.last_alert.insert(event.to_owned(), now);
        if self.history_cap > 0 {
            if self.history.len() >= self.history_cap {
                self.history.pop_front();
            }
            self.history.push_back(EventLog {
                at: now,
                event: event.to_owned(),
                data: data.clone(),
            });
        }
        *self.violation_counts.entry(event.to_owned()).or_insert(0) += 1;
        true
    }

    /// Render the recent record for the reaction generator: most-recent
    /// first with relative ages, then cumulative per-type counts.
    pub fn summarize(&self) -> String {
        self.summarize_at(now_secs())
    }

    fn summarize_at(&self, now: f64) -> String {
        if self.history.is_empty() {
            return "No activity recorded yet.".to_owned();
        }
        let mut out = String::from("Recent events (most recent first):\n");
        for log in self.history.iter().rev() {
            let age = (now - log.at).max(0.0);
            let rendered = if age < 60.0 {
                format!("{}s ago", age as u64)
            } else {
                format!("{}m ago", (age / 60.0) as u64)
            };
            out.push_str(&format!("- {} ({})", log.event, rendered));
            if !log.data.is_empty() {
                out.push_str(&format!(
                    " {}",
                    serde_json::to_string(&log.data).unwrap_or_default()
                ));
            }
            out.push('\n');
        }
        out.push_str("Violation counts this session:\n");
        for (event, count) in &self.violation_counts {
            out.push_str(&format!("- {event}: {count}\n"));
        }
        out
    }

    /// Forget everything. Called on session start.
    pub fn clear(&mut self) {
        self.history.clear();
        self.last_alert.clear();
        self.violation_counts.clear();
    }

    pub fn violation_count(&self, event: &str) -> u32 {
        self.violation_counts.get(event).copied().unwrap_or(0)
    }
}
