//! Maps a configured [`ProtocolKind`] to its adapter implementation.

use achub_core::ProtocolKind;

use crate::acp::AcpAdapter;
use crate::base::ErasedProtocolAdapter;
use crate::codex::CodexAdapter;
use crate::echo::EchoAdapter;
use crate::link::AgentLink;

pub fn adapter_for(kind: ProtocolKind, agent: AgentLink) -> Box<dyn ErasedProtocolAdapter> {
    match kind {
        ProtocolKind::Acp => Box::new(AcpAdapter::new(agent)),
        ProtocolKind::CodexAppServer => Box::new(CodexAdapter::new(agent)),
        ProtocolKind::Echo => Box::new(EchoAdapter::new(agent)),
    }
}
