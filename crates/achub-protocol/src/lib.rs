//! Dialect-specific translation between the hub's internal event model and
//! whatever each coding agent actually speaks on stdio (spec §4.3).

mod acp;
mod base;
mod codex;
mod echo;
mod link;
mod registry;

pub use acp::AcpAdapter;
pub use base::{AdapterError, ErasedProtocolAdapter, ProtocolAdapter, ToolCall};
pub use codex::CodexAdapter;
pub use echo::EchoAdapter;
pub use link::AgentLink;
pub use registry::adapter_for;
