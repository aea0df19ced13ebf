//! Shell command execution with timeout, truncation, and the
//! allowlist/denylist policy (spec §4.4).

use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::process::Command;

use crate::error::ToolError;

/// Keep only the trailing chunk of output once it exceeds this many
/// characters, so a runaway build doesn't blow up the journal or the
/// agent's own context window.
const OUTPUT_LIMIT_CHARS: usize = 4096;

/// Matched as a substring against the space-joined argv. Always enforced,
/// independent of the configured allowlist — an allowlisted prefix can't
/// un-deny a hard-denied command (see the worked example in spec §8.4).
const HARD_DENYLIST: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "mkfs",
    "dd if=/dev/zero",
    "dd if=/dev/random",
    ":(){:|:&};:",
    "chmod -R 777 /",
    "curl | sh",
    "wget | sh",
];

pub struct ShellTool {
    pub cwd: Option<String>,
    pub timeout: Duration,
    pub allowlist: Vec<String>,
}

impl Default for ShellTool {
    fn default() -> Self {
        Self {
            cwd: None,
            timeout: Duration::from_secs(30),
            allowlist: Vec::new(),
        }
    }
}

impl ShellTool {
    pub fn new(cwd: Option<String>, timeout: Duration, allowlist: Vec<String>) -> Self {
        Self {
            cwd,
            timeout,
            allowlist,
        }
    }

    fn argv_from(args: &Value) -> Result<Vec<String>, ToolError> {
        let command = args
            .get("command")
            .or_else(|| args.get("argv"))
            .or_else(|| args.get("cmd"));
        match command {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).ok_or(ToolError::BadCommand))
                .collect(),
            Some(Value::String(s)) => Ok(vec!["sh".to_string(), "-c".to_string(), s.clone()]),
            _ => Err(ToolError::BadCommand),
        }
    }

    /// Empty allowlist rejects everything; a hard-denylist hit is checked
    /// first and can't be overridden by an allowlisted prefix.
    fn check_policy(&self, joined: &str) -> Result<(), ToolError> {
        if let Some(hit) = HARD_DENYLIST.iter().find(|d| joined.contains(*d)) {
            return Err(ToolError::Denied(hit.to_string()));
        }
        if self.allowlist.is_empty() {
            return Err(ToolError::Disabled);
        }
        if !self.allowlist.iter().any(|a| joined.contains(a.as_str())) {
            return Err(ToolError::NotAllowlisted);
        }
        Ok(())
    }

    pub async fn run(&self, args: &Value) -> Result<Value, ToolError> {
        let argv = Self::argv_from(args)?;
        let joined = argv.join(" ");
        self.check_policy(&joined)?;

        let cwd = args
            .get("cwd")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.cwd.clone());

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        if let Some(dir) = &cwd {
            cmd.current_dir(dir);
        }

        let mut timed_out = false;
        let child = cmd.spawn()?;
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                timed_out = true;
                // The child was already dropped by the timed-out future;
                // kill_on_drop(true) ensures it's gone, nothing left to reap.
                return Ok(json!({
                    "exit_code": Value::Null,
                    "stdout": "",
                    "stderr": "",
                    "argv": argv,
                    "timed_out": timed_out,
                }));
            }
        };

        let stdout = truncate(&String::from_utf8_lossy(&output.stdout));
        let stderr = truncate(&String::from_utf8_lossy(&output.stderr));

        Ok(json!({
            "exit_code": output.status.code(),
            "stdout": stdout,
            "stderr": stderr,
            "argv": argv,
            "timed_out": timed_out,
        }))
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= OUTPUT_LIMIT_CHARS {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let omitted = chars.len() - OUTPUT_LIMIT_CHARS;
    let tail: String = chars[chars.len() - OUTPUT_LIMIT_CHARS..].iter().collect();
    format!("... (truncated {omitted} chars) ...\n{tail}")
}
