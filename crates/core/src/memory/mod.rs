//! Cooldown/dedup ledger over event types.

mod ledger;

pub use ledger::EventMemory;
