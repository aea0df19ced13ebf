//! Central tool execution engine (spec §4.4).
//!
//! Every tool call goes through here so it is journaled before and after
//! execution, checked against the allowlist/denylist, bounded by a
//! timeout, and run one at a time — no two tool calls for the same agent
//! ever overlap.

use std::path::PathBuf;
use std::time::Duration;

use achub_core::{event, EventBus};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::ToolError;
use crate::files::FilesTool;
use crate::shell::ShellTool;

pub struct ToolRunner {
    bus: EventBus,
    shell: ShellTool,
    files: FilesTool,
    lock: Mutex<()>,
    require_tool_approval: bool,
}

impl ToolRunner {
    pub fn new(
        bus: EventBus,
        sandbox: PathBuf,
        timeout: Duration,
        shell_allowlist: Vec<String>,
        require_tool_approval: bool,
    ) -> Self {
        Self {
            bus,
            shell: ShellTool::new(Some(sandbox.display().to_string()), timeout, shell_allowlist),
            files: FilesTool::new(sandbox),
            lock: Mutex::new(()),
            require_tool_approval,
        }
    }

    /// Execute `tool_name` with `args` on behalf of `agent_id`, publishing
    /// `tool.invocation` and `tool.result` events around the call.
    ///
    /// An unrecognized tool name is a hard error — unlike the original
    /// prototype, it never silently falls back to shell execution.
    pub async fn execute(
        &self,
        agent_id: &str,
        tool_name: &str,
        args: &Value,
        correlation_id: Option<&str>,
    ) -> Value {
        let _guard = self.lock.lock().await;

        if self.require_tool_approval {
            tracing::warn!(
                agent = agent_id,
                tool = tool_name,
                "require_tool_approval is set but no approval UI is wired; auto-approving"
            );
        }

        self.bus
            .publish(event::tool_invocation(agent_id, tool_name, args.clone(), correlation_id))
            .await;

        let outcome = self.dispatch(tool_name, args).await;
        let (ok, result) = match outcome {
            Ok(value) => (true, value),
            Err(e) => (false, serde_json::json!({"error": e.to_string()})),
        };

        self.bus
            .publish(event::tool_result(
                agent_id,
                tool_name,
                ok,
                result.clone(),
                correlation_id,
            ))
            .await;

        result
    }

    async fn dispatch(&self, tool_name: &str, args: &Value) -> Result<Value, ToolError> {
        match tool_name {
            "shell/execute" | "shell" => self.shell.run(args).await,
            "files/read" => self.files.read(args).await,
            "files/write" => self.files.write(args).await,
            "files/list" => self.files.list(args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runner() -> (ToolRunner, EventBus) {
        let bus = EventBus::new();
        let runner = ToolRunner::new(
            bus.clone(),
            std::env::temp_dir(),
            Duration::from_secs(5),
            vec!["echo".to_string()],
            false,
        );
        (runner, bus)
    }

    #[tokio::test]
    async fn shell_tool_executes_and_publishes_events() {
        let (runner, bus) = runner();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        bus.subscribe_fn(Some("tool."), move |event| {
            let seen = seen2.clone();
            let kind = event.kind.clone();
            async move {
                seen.lock().unwrap().push(kind);
                Ok(())
            }
        })
        .await;

        let result = runner
            .execute("agent-1", "shell", &json!({"command": "echo hi"}), Some("c1"))
            .await;
        assert_eq!(result["stdout"], "hi\n");
        assert_eq!(seen.lock().unwrap().as_slice(), ["tool.invocation", "tool.result"]);
    }

    #[tokio::test]
    async fn unknown_tool_never_falls_back_to_shell() {
        let (runner, _bus) = runner();
        let result = runner
            .execute("agent-1", "does/not/exist", &json!({"command": "echo should-not-run"}), None)
            .await;
        assert!(result["error"].as_str().unwrap().contains("unknown tool"));
    }
}
