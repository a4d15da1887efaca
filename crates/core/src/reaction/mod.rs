//! Turning an admitted event into a spoken reaction.

mod dispatcher;
mod persona;
mod prompts;

pub use dispatcher::ReactionDispatcher;
pub use persona::Persona;
pub use prompts::{build_context, build_instructions, SAFETY_LINE};
