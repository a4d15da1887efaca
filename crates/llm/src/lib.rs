//! Narrow LLM collaborator contract for vigil.
//!
//! The orchestrator consumes two external text services through the same
//! provider trait: the reaction generator (persona-bound scolding lines) and
//! the ambiguous-window classifier. Both are "instructions + context in,
//! text out" and must be safe to call repeatedly.

pub mod http;
pub mod provider;
