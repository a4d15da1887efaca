use serde_json::{Map, Value};

/// The named reaction style currently applied to generated speech.
/// Mutable selection, owned by the agent actor; updated from persona-update
/// packets.
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub description: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "WARDEN".to_owned(),
            description: "A stern but fair supervisor. Direct, dry, never cruel. \
                          Calls out slacking immediately and expects better."
                .to_owned(),
        }
    }
}

impl Persona {
    /// Apply a persona-update payload (`personality`, optional
    /// `description`). Returns false and changes nothing when the payload
    /// has no name.
    pub fn apply_update(&mut self, data: &Map<String, Value>) -> bool {
        let Some(name) = data.get("personality").and_then(Value::as_str) else {
            return false;
        };
        self.name = name.to_owned();
        if let Some(description) = data.get("description").and_then(Value::as_str) {
            self.description = description.to_owned();
        }
        true
    }
}
