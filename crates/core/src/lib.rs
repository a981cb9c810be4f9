//! Core logic including the agent loop, tool registry, conversation state
//! and the model client.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod tool;

pub use agent::{
    Action, Agent, AgentBuilder, AgentConfig, AgentError, AgentEvent,
    EventReceiver, EventSender, ParsedOutput, event_channel, parse_output,
};
pub use model_client::RetryPolicy;
