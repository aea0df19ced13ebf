//! Codex app-server adapter — JSON-RPC-shaped, but omits the `"jsonrpc"`
//! field entirely (spec §4.3).

use std::sync::atomic::AtomicU64;

use serde_json::{json, Value};

use crate::base::{next_request_id, AdapterError, ProtocolAdapter, ToolCall};
use crate::link::AgentLink;

const TOOL_CALL_METHODS: &[&str] = &["tool/execute", "shell/execute", "approval/request"];

pub struct CodexAdapter {
    agent: AgentLink,
    request_id: AtomicU64,
}

impl CodexAdapter {
    pub fn new(agent: AgentLink) -> Self {
        Self {
            agent,
            request_id: AtomicU64::new(1),
        }
    }
}

impl ProtocolAdapter for CodexAdapter {
    fn is_tool_call(&self, message: &Value) -> bool {
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        message.get("id").is_some() && TOOL_CALL_METHODS.contains(&method)
    }

    fn extract_tool_call(&self, message: &Value) -> Option<ToolCall> {
        let correlation_id = match message.get("id")? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let params = message.get("params").and_then(Value::as_object)?;
        let tool_name = params
            .get("tool")
            .or_else(|| params.get("command"))
            .and_then(Value::as_str)
            .or_else(|| message.get("method").and_then(Value::as_str))?
            .to_string();
        let args = params
            .get("arguments")
            .or_else(|| params.get("args"))
            .cloned()
            .unwrap_or_else(|| json!({}));
        Some(ToolCall {
            correlation_id,
            tool_name,
            args,
        })
    }

    // Codex has no distinct "done" method for most turns: a response
    // carrying an `id` that isn't a recognized tool call is treated as the
    // completion of our `thread/create` request, same as the original.
    fn is_completion(&self, message: &Value) -> bool {
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        if matches!(method, "thread/complete" | "turn/complete") {
            return true;
        }
        message.get("result").is_some() && message.get("id").is_some()
    }

    fn extract_text(&self, message: &Value) -> Option<String> {
        if let Some(result) = message.get("result") {
            match result {
                Value::String(s) => return Some(s.clone()),
                Value::Object(_) => {
                    if let Some(text) = result.get("text").or_else(|| result.get("content")) {
                        if let Some(s) = text.as_str() {
                            return Some(s.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        let params = message.get("params")?.as_object()?;
        params
            .get("text")
            .or_else(|| params.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    async fn initialize(&self) -> Result<(), AdapterError> {
        let req_id = next_request_id(&self.request_id);
        self.agent
            .send_json(&json!({
                "id": req_id,
                "method": "initialize",
                "params": {
                    "capabilities": {},
                    "clientInfo": {"name": "acp-hub", "version": "0.1.0"},
                },
            }))
            .await?;
        self.agent
            .send_json(&json!({"method": "initialized"}))
            .await
    }

    async fn send_task(&self, task: &str) -> Result<(), AdapterError> {
        let req_id = next_request_id(&self.request_id);
        self.agent
            .send_json(&json!({
                "id": req_id,
                "method": "thread/create",
                "params": {"message": task},
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
            json!({"id": correlation_id, "result": result})
        } else {
            let message = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("failed");
            json!({"id": correlation_id, "error": {"code": -1, "message": message}})
        };
        self.agent.send_json(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> CodexAdapter {
        CodexAdapter::new(AgentLink::dangling())
    }

    #[test]
    fn recognizes_tool_call() {
        let a = adapter();
        let msg = json!({"id": 1, "method": "shell/execute", "params": {"tool": "shell", "args": {}}});
        assert!(a.is_tool_call(&msg));
        let call = a.extract_tool_call(&msg).unwrap();
        assert_eq!(call.tool_name, "shell");
    }

    #[test]
    fn recognizes_all_three_tool_call_methods() {
        let a = adapter();
        for method in ["tool/execute", "shell/execute", "approval/request"] {
            let msg = json!({"id": 1, "method": method, "params": {"tool": "shell"}});
            assert!(a.is_tool_call(&msg), "{method} should be recognized as a tool call");
        }
    }

    #[test]
    fn any_id_bearing_result_is_completion() {
        let a = adapter();
        let msg = json!({"id": 7, "result": {"text": "done"}});
        assert!(a.is_completion(&msg));
        assert_eq!(a.extract_text(&msg).as_deref(), Some("done"));
    }

    #[test]
    fn thread_complete_method_is_completion_regardless_of_id() {
        let a = adapter();
        let msg = json!({"method": "thread/complete", "params": {"text": "done"}});
        assert!(a.is_completion(&msg));
        assert_eq!(a.extract_text(&msg).as_deref(), Some("done"));
    }

    #[test]
    fn tool_call_is_not_also_completion() {
        let a = adapter();
        let msg = json!({"id": 1, "method": "shell/execute", "params": {"tool": "shell", "args": {}}});
        assert!(!a.is_completion(&msg));
    }

    #[test]
    fn message_without_jsonrpc_field_still_parses() {
        let a = adapter();
        let msg = json!({"id": 2, "result": "plain text"});
        assert!(message_has_no_jsonrpc_key(&msg));
        assert_eq!(a.extract_text(&msg).as_deref(), Some("plain text"));
    }

    #[test]
    fn extract_text_falls_back_to_result_content_then_params() {
        let a = adapter();
        let msg = json!({"id": 3, "result": {"content": "via content"}});
        assert_eq!(a.extract_text(&msg).as_deref(), Some("via content"));

        let msg = json!({"method": "turn/complete", "params": {"content": "via params content"}});
        assert_eq!(a.extract_text(&msg).as_deref(), Some("via params content"));
    }

    fn message_has_no_jsonrpc_key(v: &Value) -> bool {
        v.get("jsonrpc").is_none()
    }
}
