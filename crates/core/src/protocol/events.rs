//! Event names recognized across the channel. Producers send these as the
//! `event` field; unknown names still flow through the default reaction path.

/// Vision: eyes closed past the sleep threshold.
pub const SLEEPING: &str = "SLEEPING";
/// Vision: nobody in frame.
pub const ABSENT: &str = "ABSENT";
/// Vision: looking away from the screen.
pub const GAZE_AWAY: &str = "GAZE_AWAY";
/// Vision: phone in hand.
pub const PHONE_DETECTED: &str = "PHONE_DETECTED";

/// Screen: a known game in the foreground.
pub const GAMING: &str = "GAMING";
/// Screen: a known distracting app or site in the foreground.
pub const DISTRACTING_APP: &str = "DISTRACTING_APP";
/// Screen: foreground window changed, classification undecided.
pub const WINDOW_CHANGE: &str = "WINDOW_CHANGE";

/// System: a new watch session begins; all memory is reset.
pub const SESSION_START: &str = "SESSION_START";
/// System: the watch session ends.
pub const SESSION_END: &str = "SESSION_END";
/// System: persona selection changed (`data.personality`, optional
/// `data.description`).
pub const PERSONA_UPDATE: &str = "PERSONA_UPDATE";

/// Synthetic: emitted by the debounced classifier when it judges an
/// ambiguous window distracting.
pub const FLAGGED: &str = "FLAGGED";
