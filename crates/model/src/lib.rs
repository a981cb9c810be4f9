//! A provider-neutral abstraction over chat language models.
//!
//! The agent talks to every model through the types defined here, so the
//! same reasoning loop can drive a hosted API or a scripted stub without
//! any change to its code.
//!
//! Types in this crate don't define any behavior, they are the contract
//! that provider crates implement and the agent consumes.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
