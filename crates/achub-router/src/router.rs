//! Multi-agent task distribution (spec §4.5).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use achub_core::{event, EventBus};
use achub_protocol::ErasedProtocolAdapter;

use crate::error::RouterError;
use crate::mode::RouteMode;

/// Forwarded messages are capped so a runaway moderator conversation can't
/// flood the other agents' stdin forever.
const MAX_FORWARDS: usize = 50;

pub struct Router {
    bus: EventBus,
    agent_ids: Vec<String>,
    adapters: Vec<Arc<dyn ErasedProtocolAdapter>>,
    mode: RouteMode,
    rr_index: AtomicUsize,
    forward_count: AtomicUsize,
}

impl Router {
    /// `agents` must be given in the order agents should be addressed for
    /// round-robin and moderator modes (moderator always picks index 0).
    /// Adapters are shared (`Arc`) since the hub controller also dispatches
    /// directly to them for tool-call and completion handling.
    pub fn new(
        bus: EventBus,
        agents: Vec<(String, Arc<dyn ErasedProtocolAdapter>)>,
        mode: RouteMode,
    ) -> Self {
        let (agent_ids, adapters) = agents.into_iter().unzip();
        Self {
            bus,
            agent_ids,
            adapters,
            mode,
            rr_index: AtomicUsize::new(0),
            forward_count: AtomicUsize::new(0),
        }
    }

    pub fn mode(&self) -> RouteMode {
        self.mode
    }

    fn index_of(&self, agent_id: &str) -> Option<usize> {
        self.agent_ids.iter().position(|id| id == agent_id)
    }

    pub async fn send_task(&self, task: &str, agent_id: Option<&str>) -> Result<(), RouterError> {
        if self.agent_ids.is_empty() {
            return Err(RouterError::Empty);
        }
        match self.mode {
            RouteMode::Single => self.send_single(task, agent_id).await,
            RouteMode::Broadcast => self.send_broadcast(task).await,
            RouteMode::RoundRobin => self.send_round_robin(task).await,
            RouteMode::Moderator => self.send_to(0, task).await,
        }
    }

    async fn send_single(&self, task: &str, agent_id: Option<&str>) -> Result<(), RouterError> {
        let index = match agent_id {
            Some(id) => self.index_of(id).ok_or_else(|| RouterError::UnknownAgent(id.to_string()))?,
            None => 0,
        };
        self.send_to(index, task).await
    }

    async fn send_broadcast(&self, task: &str) -> Result<(), RouterError> {
        for index in 0..self.agent_ids.len() {
            self.send_to(index, task).await?;
        }
        Ok(())
    }

    async fn send_round_robin(&self, task: &str) -> Result<(), RouterError> {
        let index = self.rr_index.fetch_add(1, Ordering::SeqCst) % self.agent_ids.len();
        self.send_to(index, task).await
    }

    async fn send_to(&self, index: usize, task: &str) -> Result<(), RouterError> {
        self.adapters[index].send_task(task).await.map_err(RouterError::from)
    }

    /// Forward `text`, attributed to `from_agent_id`, to every other agent.
    /// A no-op outside [`RouteMode::Moderator`]. Rate-limited by
    /// `MAX_FORWARDS` across the lifetime of this router.
    pub async fn forward_output(&self, from_agent_id: &str, text: &str) -> Result<(), RouterError> {
        if self.mode != RouteMode::Moderator {
            return Ok(());
        }
        for (index, to_id) in self.agent_ids.iter().enumerate() {
            if to_id == from_agent_id {
                continue;
            }
            if self.forward_count.fetch_add(1, Ordering::SeqCst) >= MAX_FORWARDS {
                tracing::warn!(cap = MAX_FORWARDS, "forwarding cap reached, dropping message");
                return Ok(());
            }
            let message = format!("[from {from_agent_id}]: {text}");
            self.send_to(index, &message).await?;
            let preview: String = text.chars().take(200).collect();
            self.bus
                .publish(event::router_forwarded(from_agent_id, to_id, &preview))
                .await;
        }
        Ok(())
    }
}
