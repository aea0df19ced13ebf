//! ACP (Agent Client Protocol) adapter — JSON-RPC 2.0 over stdio (spec §4.3).

use std::sync::atomic::AtomicU64;

use serde_json::{json, Value};

use crate::base::{next_request_id, AdapterError, ProtocolAdapter, ToolCall};
use crate::link::AgentLink;

const TOOL_CALL_METHODS: &[&str] = &["acp/toolCall", "tools/call", "tool/execute", "shell/execute"];

pub struct AcpAdapter {
    agent: AgentLink,
    request_id: AtomicU64,
}

impl AcpAdapter {
    pub fn new(agent: AgentLink) -> Self {
        Self {
            agent,
            request_id: AtomicU64::new(1),
        }
    }
}

impl ProtocolAdapter for AcpAdapter {
    fn is_tool_call(&self, message: &Value) -> bool {
        let has_id = message.get("id").is_some();
        if !has_id {
            return false;
        }
        if let Some(method) = message.get("method").and_then(Value::as_str) {
            if TOOL_CALL_METHODS.contains(&method) {
                return true;
            }
        }
        message
            .get("params")
            .and_then(Value::as_object)
            .map(|p| p.contains_key("tool"))
            .unwrap_or(false)
    }

    fn extract_tool_call(&self, message: &Value) -> Option<ToolCall> {
        let correlation_id = correlation_id_of(message)?;
        let params = message.get("params").and_then(Value::as_object);
        let tool_name = params
            .and_then(|p| p.get("tool").or_else(|| p.get("name")))
            .and_then(Value::as_str)
            .or_else(|| message.get("method").and_then(Value::as_str))
            .unwrap_or("unknown")
            .to_string();
        let args = params
            .and_then(|p| p.get("arguments").or_else(|| p.get("args")))
            .cloned()
            .unwrap_or_else(|| json!({}));
        Some(ToolCall {
            correlation_id,
            tool_name,
            args,
        })
    }

    fn is_completion(&self, message: &Value) -> bool {
        if let (Some(result), Some(_id)) = (message.get("result"), message.get("id")) {
            if let Some(role) = result
                .get("message")
                .and_then(|m| m.get("role"))
                .and_then(Value::as_str)
            {
                if role == "assistant" {
                    return true;
                }
            }
        }
        matches!(
            message.get("method").and_then(Value::as_str),
            Some("acp/messageComplete") | Some("acp/done")
        )
    }

    fn extract_text(&self, message: &Value) -> Option<String> {
        extract_message_text(message.get("result"))
            .or_else(|| extract_message_text(message.get("params")))
    }

    async fn initialize(&self) -> Result<(), AdapterError> {
        let req_id = next_request_id(&self.request_id);
        self.agent
            .send_json(&json!({
                "jsonrpc": "2.0",
                "id": req_id,
                "method": "initialize",
                "params": {
                    "capabilities": {},
                    "clientInfo": {"name": "acp-hub", "version": "0.1.0"},
                },
            }))
            .await?;
        self.agent
            .send_json(&json!({"jsonrpc": "2.0", "method": "initialized"}))
            .await
    }

    async fn send_task(&self, task: &str) -> Result<(), AdapterError> {
        let req_id = next_request_id(&self.request_id);
        self.agent
            .send_json(&json!({
                "jsonrpc": "2.0",
                "id": req_id,
                "method": "acp/sendMessage",
                "params": {
                    "message": {"role": "user", "content": {"type": "text", "text": task}},
                },
            }))
            .await
    }

    async fn send_tool_result(
        &self,
        correlation_id: &str,
        result: &Value,
        ok: bool,
    ) -> Result<(), AdapterError> {
        let payload = if ok {
            json!({"jsonrpc": "2.0", "id": correlation_id, "result": result})
        } else {
            let message = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("tool failed");
            json!({
                "jsonrpc": "2.0",
                "id": correlation_id,
                "error": {"code": -32000, "message": message},
            })
        };
        self.agent.send_json(&payload).await
    }
}

fn correlation_id_of(message: &Value) -> Option<String> {
    match message.get("id")? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn extract_message_text(value: Option<&Value>) -> Option<String> {
    let value = value?;
    let content = value.get("message").and_then(|m| m.get("content"))?;
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => content.get("text").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> AcpAdapter {
        // Tests here only exercise the pure message-classification helpers,
        // so a dangling link is fine — they never call the effectful methods.
        AcpAdapter::new(AgentLink::dangling())
    }

    #[test]
    fn recognizes_tool_call_methods() {
        let a = adapter();
        let msg = json!({"id": 1, "method": "tools/call", "params": {}});
        assert!(a.is_tool_call(&msg));
    }

    #[test]
    fn recognizes_params_tool_shape() {
        let a = adapter();
        let msg = json!({"id": 2, "method": "custom", "params": {"tool": "shell"}});
        assert!(a.is_tool_call(&msg));
    }

    #[test]
    fn extract_tool_call_prefers_tool_over_name() {
        let a = adapter();
        let msg = json!({"id": "c1", "params": {"tool": "shell/execute", "arguments": {"command": "echo hi"}}});
        let call = a.extract_tool_call(&msg).unwrap();
        assert_eq!(call.correlation_id, "c1");
        assert_eq!(call.tool_name, "shell/execute");
        assert_eq!(call.args["command"], "echo hi");
    }

    #[test]
    fn completion_from_assistant_message() {
        let a = adapter();
        let msg = json!({
            "id": 1,
            "result": {"message": {"role": "assistant", "content": {"text": "done"}}},
        });
        assert!(a.is_completion(&msg));
        assert_eq!(a.extract_text(&msg).as_deref(), Some("done"));
    }

    #[test]
    fn completion_from_notification_method() {
        let a = adapter();
        let msg = json!({"method": "acp/done"});
        assert!(a.is_completion(&msg));
    }

    #[test]
    fn not_a_tool_call_without_id() {
        let a = adapter();
        let msg = json!({"method": "tools/call", "params": {}});
        assert!(!a.is_tool_call(&msg));
    }
}
