//! The immutable, config-derived description of one agent to supervise.

use std::collections::HashMap;
use std::path::PathBuf;

/// Wire dialect an agent speaks, selecting which adapter in `achub-protocol`
/// handles it. Kept as a string-keyed enum (not an open string) because the
/// adapter registry is a fixed, closed set (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Acp,
    CodexAppServer,
    Echo,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Acp => "acp",
            ProtocolKind::CodexAppServer => "codex_app_server",
            ProtocolKind::Echo => "echo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "acp" => Some(ProtocolKind::Acp),
            "codex_app_server" => Some(ProtocolKind::CodexAppServer),
            "echo" => Some(ProtocolKind::Echo),
            _ => None,
        }
    }
}

/// One entry of `HubConfig.agents`: the resolved, trustworthy description of
/// a child process the hub is allowed to spawn. `command` is always resolved
/// from the fixed agent registry — never taken verbatim from user input.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub id: String,
    pub agent: String,
    pub protocol: ProtocolKind,
    pub command: Vec<String>,
    pub sandbox: PathBuf,
    pub env: HashMap<String, String>,
}
