use crate::protocol::Packet;
use crate::reaction::Persona;

/// Spoken when generation fails. Never stored in memory or persona state.
pub const SAFETY_LINE: &str = "Hey. Eyes on your work.";

const PROMPT_SECTIONS: &[&str] = &[
    "## Role\n\
     You are a focus companion watching over someone who asked you to keep \
     them on task. A sensor just caught them slipping. Respond with one \
     short spoken remark.",
    "## Rules\n\
     - One or two sentences, spoken aloud, no stage directions.\n\
     - Plain English, no markdown, no emoji.\n\
     - Stay entirely in the current persona.\n\
     - Use the behavior record: call out repeat offenses by count when the \
     same event keeps appearing.\n\
     - Never invent events that are not in the record.",
    "## Input\n\
     The user message carries the behavior record so far and the event that \
     just fired, with its raw fields.",
];

/// System instructions bound to the current persona.
pub fn build_instructions(persona: &Persona) -> String {
    let mut out = PROMPT_SECTIONS.join("\n\n");
    out.push_str(&format!(
        "\n\n## Current persona\n{}: {}",
        persona.name, persona.description
    ));
    out
}

/// User-message context: memory summary plus the triggering event.
pub fn build_context(memory_summary: &str, packet: &Packet) -> String {
    let data = if packet.data.is_empty() {
        String::new()
    } else {
        format!(
            "\nDetails: {}",
            serde_json::to_string(&packet.data).unwrap_or_default()
        )
    };
    format!(
        "{}\n\nJust now: {}{}",
        memory_summary, packet.event, data
    )
}
