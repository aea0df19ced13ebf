//! The agent process supervisor: spawns a coding-agent child process and
//! turns its stdio traffic into [`achub_core::Event`]s.

mod error;
mod process;

pub use error::AgentError;
pub use process::{AgentState, ManagedAgent};
