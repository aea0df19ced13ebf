//! The agent process supervisor (spec §4.2).
//!
//! Spawns a child with its sandbox as working directory, frames its stdout
//! into `agent.stdout`/`agent.jsonrpc` events and its stderr into
//! `agent.stderr` events, and exposes `send_json`/`send_text`/`close_stdin`/
//! `terminate` to the protocol adapter that owns this agent.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use achub_core::{event, AgentSpec, EventBus};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::AgentError;

/// Lifecycle states from spec §3: `New → Starting → Running → {Exited, Terminated}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    New,
    Starting,
    Running,
    Exited,
    Terminated,
}

/// A live, supervised agent child process.
pub struct ManagedAgent {
    spec: AgentSpec,
    bus: EventBus,
    state: Arc<Mutex<AgentState>>,
    stdin: Option<ChildStdin>,
    ctrl_tx: Option<mpsc::Sender<()>>,
    exited_rx: watch::Receiver<bool>,
    exited_tx: Option<watch::Sender<bool>>,
    reader_tasks: Vec<JoinHandle<()>>,
    terminated: Arc<AtomicBool>,
}

impl ManagedAgent {
    pub fn new(spec: AgentSpec, bus: EventBus) -> Self {
        let (exited_tx, exited_rx) = watch::channel(false);
        Self {
            spec,
            bus,
            state: Arc::new(Mutex::new(AgentState::New)),
            stdin: None,
            ctrl_tx: None,
            exited_rx,
            exited_tx: Some(exited_tx),
            reader_tasks: Vec::new(),
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock().unwrap()
    }

    /// Spawn the configured argv and start the stdout/stderr readers and the
    /// exit waiter. Publishes `agent.started` before any reader can publish.
    pub async fn start(&mut self) -> Result<(), AgentError> {
        {
            let mut st = self.state.lock().unwrap();
            if *st != AgentState::New {
                return Err(AgentError::AlreadyStarted(self.spec.id.clone()));
            }
            *st = AgentState::Starting;
        }

        self.bus
            .publish(event::agent_started(&self.spec.id, &self.spec.command))
            .await;

        let mut cmd = Command::new(&self.spec.command[0]);
        cmd.args(&self.spec.command[1..])
            .current_dir(&self.spec.sandbox)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &self.spec.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|source| AgentError::Spawn {
            id: self.spec.id.clone(),
            source,
        })?;
        let stdin = child.stdin.take().expect("stdin piped at spawn");
        let stdout = child.stdout.take().expect("stdout piped at spawn");
        let stderr = child.stderr.take().expect("stderr piped at spawn");
        self.stdin = Some(stdin);

        let (ctrl_tx, mut ctrl_rx) = mpsc::channel::<()>(1);
        self.ctrl_tx = Some(ctrl_tx);

        self.reader_tasks.push(tokio::spawn(read_stdout(
            self.spec.id.clone(),
            stdout,
            self.bus.clone(),
        )));
        self.reader_tasks.push(tokio::spawn(read_stderr(
            self.spec.id.clone(),
            stderr,
            self.bus.clone(),
        )));

        let bus = self.bus.clone();
        let id = self.spec.id.clone();
        let state = Arc::clone(&self.state);
        let exited_tx = self.exited_tx.take().expect("exited_tx set once");

        tokio::spawn(async move {
            let exit_code = tokio::select! {
                status = child.wait() => status_to_code(status),
                _ = ctrl_rx.recv() => terminate_child(&mut child).await,
            };
            bus.publish(event::agent_exited(&id, exit_code)).await;
            *state.lock().unwrap() = AgentState::Exited;
            let _ = exited_tx.send(true);
        });

        *self.state.lock().unwrap() = AgentState::Running;
        Ok(())
    }

    /// Serialize `value` as compact JSON with no embedded newlines and write
    /// it as one line.
    pub async fn send_json(&mut self, value: &Value) -> Result<(), AgentError> {
        let line = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
        self.write_line(&line).await
    }

    /// Write `text`, ensuring exactly one trailing newline.
    pub async fn send_text(&mut self, text: &str) -> Result<(), AgentError> {
        let trimmed = text.strip_suffix('\n').unwrap_or(text);
        self.write_line(trimmed).await
    }

    async fn write_line(&mut self, line: &str) -> Result<(), AgentError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AgentError::NotStarted(self.spec.id.clone()))?;
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        stdin
            .write_all(&bytes)
            .await
            .map_err(|e| AgentError::WriteFailed(self.spec.id.clone(), e))?;
        stdin
            .flush()
            .await
            .map_err(|e| AgentError::WriteFailed(self.spec.id.clone(), e))
    }

    /// Close the write end of stdin so a `cat`-style child sees EOF.
    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    /// Polite termination: SIGTERM, 3s grace, then force-kill. Awaits full
    /// exit before returning. Idempotent — a second call is a no-op.
    pub async fn terminate(&mut self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.ctrl_tx.take() {
            let _ = tx.send(()).await;
        }
        let mut rx = self.exited_rx.clone();
        let _ = rx.wait_for(|exited| *exited).await;
        *self.state.lock().unwrap() = AgentState::Terminated;

        for task in self.reader_tasks.drain(..) {
            let abort = task.abort_handle();
            if tokio::time::timeout(Duration::from_millis(200), task)
                .await
                .is_err()
            {
                abort.abort();
            }
        }
    }

    /// Resolves once `agent.exited` has been published for this agent.
    pub async fn wait_exited(&self) {
        let mut rx = self.exited_rx.clone();
        let _ = rx.wait_for(|exited| *exited).await;
    }
}

fn status_to_code(status: std::io::Result<std::process::ExitStatus>) -> i32 {
    status.ok().and_then(|s| s.code()).unwrap_or(-1)
}

async fn terminate_child(child: &mut tokio::process::Child) -> i32 {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
    match tokio::time::timeout(Duration::from_secs(3), child.wait()).await {
        Ok(status) => status_to_code(status),
        Err(_) => {
            let _ = child.start_kill();
            status_to_code(child.wait().await)
        }
    }
}

async fn read_stdout(agent_id: String, stdout: ChildStdout, bus: EventBus) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = decode_line(&buf);
                match serde_json::from_str::<Value>(&text) {
                    Ok(msg @ Value::Object(_)) => {
                        bus.publish(event::agent_jsonrpc(&agent_id, msg)).await;
                    }
                    _ => {
                        bus.publish(event::agent_stdout(&agent_id, &text)).await;
                    }
                }
            }
            Err(err) => {
                tracing::warn!(agent = %agent_id, error = %err, "stdout read failed");
                break;
            }
        }
    }
}

async fn read_stderr(agent_id: String, stderr: ChildStderr, bus: EventBus) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = decode_line(&buf);
                bus.publish(event::agent_stderr(&agent_id, &text)).await;
            }
            Err(err) => {
                tracing::warn!(agent = %agent_id, error = %err, "stderr read failed");
                break;
            }
        }
    }
}

fn decode_line(buf: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(buf).into_owned();
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use achub_core::ProtocolKind;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    fn spec(command: Vec<&str>) -> AgentSpec {
        AgentSpec {
            id: "a1".to_string(),
            agent: "echo".to_string(),
            protocol: ProtocolKind::Echo,
            command: command.into_iter().map(String::from).collect(),
            sandbox: std::env::temp_dir(),
            env: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn stdout_lines_become_events_in_order() {
        let bus = EventBus::new();
        let seen: Arc<StdMutex<Vec<(String, String)>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe_fn(None, move |e| {
            let seen = Arc::clone(&seen_clone);
            let kind = e.kind.clone();
            let text = e
                .payload
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            async move {
                seen.lock().unwrap().push((kind, text));
                Ok(())
            }
        })
        .await;

        let mut agent = ManagedAgent::new(
            spec(vec!["sh", "-c", "echo hello; echo world"]),
            bus.clone(),
        );
        agent.start().await.unwrap();
        agent.wait_exited().await;
        // allow the reader tasks a beat to drain their final lines
        tokio::time::sleep(Duration::from_millis(50)).await;

        let recorded = seen.lock().unwrap().clone();
        let kinds: Vec<&str> = recorded.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(kinds[0], "agent.started");
        assert!(kinds.contains(&"agent.stdout"));
        assert_eq!(kinds.last().unwrap(), &"agent.exited");
    }

    #[tokio::test]
    async fn json_object_line_becomes_jsonrpc_event() {
        let bus = EventBus::new();
        let seen: Arc<StdMutex<Vec<Value>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe_fn(Some("agent.jsonrpc"), move |e| {
            let seen = Arc::clone(&seen_clone);
            let msg = e.payload.get("message").cloned().unwrap_or(Value::Null);
            async move {
                seen.lock().unwrap().push(msg);
                Ok(())
            }
        })
        .await;

        let mut agent = ManagedAgent::new(
            spec(vec!["sh", "-c", r#"echo '{"jsonrpc":"2.0","method":"ping"}'"#]),
            bus.clone(),
        );
        agent.start().await.unwrap();
        agent.wait_exited().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let recorded = seen.lock().unwrap().clone();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0]["method"], "ping");
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let bus = EventBus::new();
        let mut agent = ManagedAgent::new(spec(vec!["sleep", "5"]), bus);
        agent.start().await.unwrap();
        agent.terminate().await;
        agent.terminate().await;
        assert_eq!(agent.state(), AgentState::Terminated);
    }
}
