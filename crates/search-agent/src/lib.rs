//! A terminal search assistant that answers questions with web search,
//! Wikipedia and Arxiv.
//!
//! The crate includes a CLI for using it in the terminal. The pieces are
//! also usable as a library: resolve credentials, build a registry of
//! lookup tools, and drive a [`Session`] with your own front end.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod credentials;
pub mod input;
pub mod renderer;
mod session;
pub mod tools;

pub use session::{PLACEHOLDER_ANSWER, Session};

/// The first assistant message shown in a new chat. It isn't part of the
/// conversation sent to the model.
pub const GREETING: &str =
    "Hi! I'm a search bot powered by AI. What can I find for you today?";

/// Re-exports of [`search_agent_core`] crate.
pub mod core {
    pub use search_agent_core::*;
}
