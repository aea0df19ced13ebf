//! The central orchestrator (spec §4.1, §4.6).
//!
//! Lifecycle: config → spawn agents → initialize protocols → send task →
//! monitor for tool calls/completion/exit → shut down → journal closed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use achub_agent::ManagedAgent;
use achub_core::{event, EventBus, HandlerError};
use achub_protocol::{adapter_for, AgentLink, ErasedProtocolAdapter};
use achub_router::{RouteMode, Router};
use achub_tools::ToolRunner;
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::config::HubConfig;
use crate::console::print_event;
use crate::error::HubError;
use crate::journal::Journal;

/// How long to wait for every agent to signal completion before giving up
/// and reporting a timeout (spec §4.6).
const MONITOR_CEILING: Duration = Duration::from_secs(120);

/// Grace period before closing stdin for echo-protocol agents, so they have
/// a moment to see the task on stdin before EOF ends their input.
const ECHO_STDIN_CLOSE_DELAY: Duration = Duration::from_millis(500);

struct RunningAgent {
    handle: Arc<AsyncMutex<ManagedAgent>>,
    adapter: Arc<dyn ErasedProtocolAdapter>,
    tool_runner: Arc<ToolRunner>,
    protocol: achub_core::ProtocolKind,
}

pub struct Hub {
    config: HubConfig,
    bus: EventBus,
    journal: Arc<Journal>,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let journal = Arc::new(Journal::new(config.journal_path.clone()));
        Self {
            config,
            bus: EventBus::new(),
            journal,
        }
    }

    /// Run one task end-to-end. Returns the process exit code (spec §4.6):
    /// `0` success, `1` hub-level failure, `2` config error, `130` interrupted.
    pub async fn run_task(&self, task: &str, agent_id: Option<&str>, route: RouteMode) -> i32 {
        match self.run_task_inner(task, agent_id, route).await {
            Ok(()) => 0,
            Err(HubError::Config(_)) => 2,
            Err(err) => {
                eprintln!("error: {err}");
                1
            }
        }
    }

    async fn run_task_inner(
        &self,
        task: &str,
        agent_id: Option<&str>,
        route: RouteMode,
    ) -> Result<(), HubError> {
        self.journal.open().map_err(HubError::Journal)?;
        let journal = Arc::clone(&self.journal);
        self.bus
            .subscribe_fn(None, move |event| {
                let journal = Arc::clone(&journal);
                let event = event.clone();
                async move {
                    journal.write(&event).map_err(|e| Box::new(e) as HandlerError)
                }
            })
            .await;
        self.bus
            .subscribe_fn(None, |event| {
                print_event(event);
                async { Ok(()) }
            })
            .await;

        let config = if let Some(id) = agent_id {
            self.config.only(id)?
        } else {
            self.config.clone()
        };

        let result = self.run_with_config(task, agent_id, route, &config).await;

        self.journal.close();
        result
    }

    async fn run_with_config(
        &self,
        task: &str,
        agent_id: Option<&str>,
        route: RouteMode,
        config: &HubConfig,
    ) -> Result<(), HubError> {
        let mut running: Vec<(String, RunningAgent)> = Vec::new();

        for spec in &config.agents {
            let mut agent = ManagedAgent::new(spec.clone(), self.bus.clone());
            agent.start().await?;
            let handle = Arc::new(AsyncMutex::new(agent));
            let link = AgentLink::new(&handle);
            let adapter: Arc<dyn ErasedProtocolAdapter> = Arc::from(adapter_for(spec.protocol, link));
            let tool_runner = Arc::new(ToolRunner::new(
                self.bus.clone(),
                spec.sandbox.clone(),
                Duration::from_secs(30),
                config.shell_allowlist.clone(),
                config.require_tool_approval,
            ));
            running.push((
                spec.id.clone(),
                RunningAgent {
                    handle,
                    adapter,
                    tool_runner,
                    protocol: spec.protocol,
                },
            ));
        }

        let shutdown_result = self.drive_task(task, agent_id, route, &running).await;

        for (id, agent) in &running {
            let mut guard = agent.handle.lock().await;
            guard.terminate().await;
            tracing::debug!(agent = %id, "terminated");
        }

        shutdown_result
    }

    async fn drive_task(
        &self,
        task: &str,
        agent_id: Option<&str>,
        route: RouteMode,
        running: &[(String, RunningAgent)],
    ) -> Result<(), HubError> {
        let agent_ids: Vec<String> = running.iter().map(|(id, _)| id.clone()).collect();
        self.bus.publish(event::hub_started(&agent_ids)).await;

        for (id, agent) in running {
            if let Err(err) = agent.adapter.initialize().await {
                tracing::warn!(agent = %id, error = %err, "initialization failed, continuing");
            }
        }

        let router_agents: Vec<(String, Arc<dyn ErasedProtocolAdapter>)> = running
            .iter()
            .map(|(id, agent)| (id.clone(), Arc::clone(&agent.adapter)))
            .collect();
        let router = Arc::new(Router::new(self.bus.clone(), router_agents, route));

        self.bus.publish(event::task_submitted(task, route.as_str())).await;
        router.send_task(task, agent_id).await?;

        self.monitor(running, Arc::clone(&router)).await;

        self.bus.publish(event::task_completed(task)).await;
        self.bus.publish(event::hub_stopped()).await;
        Ok(())
    }

    async fn monitor(&self, running: &[(String, RunningAgent)], router: Arc<Router>) {
        let completed = Arc::new(std::sync::Mutex::new(HashSet::<String>::new()));
        let total = running.len();
        let (done_tx, mut done_rx) = watch::channel(false);

        let adapters: std::collections::HashMap<String, Arc<dyn ErasedProtocolAdapter>> = running
            .iter()
            .map(|(id, agent)| (id.clone(), Arc::clone(&agent.adapter)))
            .collect();
        let tool_runners: std::collections::HashMap<String, Arc<ToolRunner>> = running
            .iter()
            .map(|(id, agent)| (id.clone(), Arc::clone(&agent.tool_runner)))
            .collect();

        let completed_clone = Arc::clone(&completed);
        let done_tx_clone = done_tx.clone();

        let sub = self
            .bus
            .subscribe_fn(Some("agent."), move |event| {
                let completed = Arc::clone(&completed_clone);
                let done_tx = done_tx_clone.clone();
                let adapters = adapters.clone();
                let tool_runners = tool_runners.clone();
                let router = Arc::clone(&router);
                let event = event.clone();
                async move {
                    handle_agent_event(event, &adapters, &tool_runners, &completed, total, &done_tx, &router)
                        .await;
                    Ok(())
                }
            })
            .await;

        tokio::time::sleep(ECHO_STDIN_CLOSE_DELAY).await;
        for (id, agent) in running {
            if agent.protocol == achub_core::ProtocolKind::Echo {
                agent.handle.lock().await.close_stdin();
                tracing::debug!(agent = %id, "closed stdin for echo agent");
            }
        }

        if tokio::time::timeout(MONITOR_CEILING, done_rx.wait_for(|done| *done))
            .await
            .is_err()
        {
            tracing::warn!(timeout_secs = MONITOR_CEILING.as_secs(), "monitoring timed out");
        }

        sub.unsubscribe().await;
    }
}

async fn handle_agent_event(
    event: achub_core::Event,
    adapters: &std::collections::HashMap<String, Arc<dyn ErasedProtocolAdapter>>,
    tool_runners: &std::collections::HashMap<String, Arc<ToolRunner>>,
    completed: &std::sync::Mutex<HashSet<String>>,
    total: usize,
    done_tx: &watch::Sender<bool>,
    router: &Router,
) {
    let Some(agent_id) = event.agent_id.clone() else {
        return;
    };

    match event.kind.as_str() {
        "agent.jsonrpc" => {
            let Some(adapter) = adapters.get(&agent_id) else {
                return;
            };
            let message = event.payload.get("message").cloned().unwrap_or(serde_json::Value::Null);

            if adapter.is_tool_call(&message) {
                if let Some(call) = adapter.extract_tool_call(&message) {
                    if let Some(runner) = tool_runners.get(&agent_id) {
                        let result = runner
                            .execute(&agent_id, &call.tool_name, &call.args, Some(&call.correlation_id))
                            .await;
                        let ok = result.get("error").is_none();
                        if let Err(err) = adapter
                            .send_tool_result(&call.correlation_id, &result, ok)
                            .await
                        {
                            tracing::warn!(agent = %agent_id, error = %err, "failed to send tool result");
                        }
                    }
                }
                return;
            }

            if adapter.is_completion(&message) {
                if let Some(text) = adapter.extract_text(&message) {
                    println!("\n[{agent_id}:result] {text}");
                }
                mark_done(&agent_id, completed, total, done_tx);
                return;
            }

            if router.mode() == RouteMode::Moderator {
                if let Some(text) = adapter.extract_text(&message) {
                    if let Err(err) = router.forward_output(&agent_id, &text).await {
                        tracing::warn!(agent = %agent_id, error = %err, "failed to forward output");
                    }
                }
            }
        }
        "agent.exited" => {
            mark_done(&agent_id, completed, total, done_tx);
        }
        _ => {}
    }
}

fn mark_done(agent_id: &str, completed: &std::sync::Mutex<HashSet<String>>, total: usize, done_tx: &watch::Sender<bool>) {
    let mut guard = completed.lock().unwrap();
    guard.insert(agent_id.to_string());
    if guard.len() >= total {
        let _ = done_tx.send(true);
    }
}
