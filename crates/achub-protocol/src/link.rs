//! A weak handle to the [`ManagedAgent`] an adapter translates for.
//!
//! Spec §3: "Adapters weakly reference their agent (relation only; the
//! agent outlives the adapter via hub ownership)." The hub keeps the only
//! strong `Arc`; adapters only ever see a [`std::sync::Weak`] and fail with
//! [`AdapterError::AgentGone`] if the hub has already dropped it.

use std::sync::{Arc, Weak};

use achub_agent::ManagedAgent;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::base::AdapterError;

#[derive(Clone)]
pub struct AgentLink(Weak<Mutex<ManagedAgent>>);

impl AgentLink {
    pub fn new(agent: &Arc<Mutex<ManagedAgent>>) -> Self {
        Self(Arc::downgrade(agent))
    }

    /// A link to nothing, useful in unit tests that only exercise an
    /// adapter's pure message-classification methods.
    pub fn dangling() -> Self {
        Self(Weak::new())
    }

    pub async fn send_json(&self, value: &Value) -> Result<(), AdapterError> {
        let agent = self.0.upgrade().ok_or(AdapterError::AgentGone)?;
        let mut guard = agent.lock().await;
        guard.send_json(value).await.map_err(AdapterError::from)
    }

    pub async fn send_text(&self, text: &str) -> Result<(), AdapterError> {
        let agent = self.0.upgrade().ok_or(AdapterError::AgentGone)?;
        let mut guard = agent.lock().await;
        guard.send_text(text).await.map_err(AdapterError::from)
    }
}
