//! Window classification: a fast keyword pass first, then a debounced
//! LLM judgment for whatever stays ambiguous.

mod debounce;
mod rules;

pub use debounce::DebounceGate;
pub use rules::{WindowRule, WindowRules, WindowVerdict};
