//! Echo adapter — plain text over stdio, no handshake, no structured
//! messages at all (spec §4.3). Used for the built-in `echo` test agent.

use serde_json::Value;

use crate::base::{AdapterError, ProtocolAdapter, ToolCall};
use crate::link::AgentLink;

pub struct EchoAdapter {
    agent: AgentLink,
}

impl EchoAdapter {
    pub fn new(agent: AgentLink) -> Self {
        Self { agent }
    }
}

impl ProtocolAdapter for EchoAdapter {
    fn is_tool_call(&self, _message: &Value) -> bool {
        false
    }

    fn extract_tool_call(&self, _message: &Value) -> Option<ToolCall> {
        None
    }

    fn is_completion(&self, _message: &Value) -> bool {
        false
    }

    fn extract_text(&self, _message: &Value) -> Option<String> {
        None
    }

    async fn initialize(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn send_task(&self, task: &str) -> Result<(), AdapterError> {
        self.agent.send_text(task).await
    }

    async fn send_tool_result(
        &self,
        _correlation_id: &str,
        _result: &Value,
        _ok: bool,
    ) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn never_reports_tool_calls_or_completion() {
        let a = EchoAdapter::new(AgentLink::dangling());
        let msg = json!({"id": 1, "method": "tools/call", "params": {"tool": "shell"}});
        assert!(!a.is_tool_call(&msg));
        assert!(!a.is_completion(&msg));
        assert!(a.extract_text(&msg).is_none());
    }
}
