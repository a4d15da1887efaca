use std::collections::HashMap;

/// All vigil tunables. Defaults are compiled in; `from_env` overrides any
/// field from a `VIGIL_`-prefixed variable (`VIGIL_DEFAULT_COOLDOWN_SECS`,
/// `VIGIL_DEBOUNCE_WINDOW_SECS`, ...).
#[derive(Debug, Clone)]
pub struct VigilCfg {
    /// Minimum gap between reactions to the same event type.
    pub default_cooldown_secs: f64,
    /// Cooldown applied to distraction events (organic and debounce-flagged).
    pub distraction_cooldown_secs: f64,
    /// Quiet period before an ambiguous window is judged.
    pub debounce_window_secs: f64,
    /// Recent-event ring capacity in the memory summary.
    pub history_cap: usize,
    /// Delay before a reconnect attempt after connection loss or failure.
    pub reconnect_delay_secs: f64,
    /// Inbound packet channel depth.
    pub inbound_buffer: usize,
    /// Sample format the HTTP synthesizer labels its segments with.
    pub speech_sample_rate: u32,
    pub speech_channels: u16,
    /// Window keyword policy, comma-separated in the env override.
    pub distracting_keywords: Vec<String>,
    pub productive_keywords: Vec<String>,
}

impl Default for VigilCfg {
    fn default() -> Self {
        Self {
            default_cooldown_secs: 10.0,
            distraction_cooldown_secs: 30.0,
            debounce_window_secs: 5.0,
            history_cap: 5,
            reconnect_delay_secs: 3.0,
            inbound_buffer: 256,
            speech_sample_rate: 24_000,
            speech_channels: 1,
            distracting_keywords: [
                "youtube", "netflix", "twitch", "steam", "discord", "reddit", "twitter",
                "instagram", "tiktok",
            ]
            .map(str::to_owned)
            .to_vec(),
            productive_keywords: [
                "visual studio code", "intellij", "terminal", "vim", "emacs", "jupyter",
                "docs", "jira",
            ]
            .map(str::to_owned)
            .to_vec(),
        }
    }
}

impl VigilCfg {
    /// Load config from the process environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&map)
    }

    fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            default_cooldown_secs: get_or(m, "VIGIL_DEFAULT_COOLDOWN_SECS", d.default_cooldown_secs),
            distraction_cooldown_secs: get_or(m, "VIGIL_DISTRACTION_COOLDOWN_SECS", d.distraction_cooldown_secs),
            debounce_window_secs: get_or(m, "VIGIL_DEBOUNCE_WINDOW_SECS", d.debounce_window_secs),
            history_cap: get_or(m, "VIGIL_HISTORY_CAP", d.history_cap),
            reconnect_delay_secs: get_or(m, "VIGIL_RECONNECT_DELAY_SECS", d.reconnect_delay_secs),
            inbound_buffer: get_or(m, "VIGIL_INBOUND_BUFFER", d.inbound_buffer),
            speech_sample_rate: get_or(m, "VIGIL_SPEECH_SAMPLE_RATE", d.speech_sample_rate),
            speech_channels: get_or(m, "VIGIL_SPEECH_CHANNELS", d.speech_channels),
            distracting_keywords: get_list_or(m, "VIGIL_DISTRACTING_KEYWORDS", d.distracting_keywords),
            productive_keywords: get_list_or(m, "VIGIL_PRODUCTIVE_KEYWORDS", d.productive_keywords),
        }
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_list_or(map: &HashMap<String, String>, key: &str, default: Vec<String>) -> Vec<String> {
    match map.get(key) {
        Some(raw) => raw
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        None => default,
    }
}
