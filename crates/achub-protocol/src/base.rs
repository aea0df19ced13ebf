//! The adapter capability shared by all three protocol dialects (spec §4.3).

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

/// What the adapter recovered from an in-band tool-call request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub correlation_id: String,
    pub tool_name: String,
    pub args: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("agent process is gone")]
    AgentGone,

    #[error("agent write failed: {0}")]
    Agent(#[from] achub_agent::AgentError),

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),
}

/// Capability every protocol dialect implements: handshake, task submission,
/// tool-call recognition, result encoding, completion detection.
///
/// `is_tool_call`/`extract_tool_call`/`is_completion`/`extract_text` are pure
/// functions over an already-parsed JSON message (spec §3); the rest are
/// effectful writes to the owned agent's stdin.
pub trait ProtocolAdapter: Send + Sync {
    fn is_tool_call(&self, message: &Value) -> bool;
    fn extract_tool_call(&self, message: &Value) -> Option<ToolCall>;
    fn is_completion(&self, message: &Value) -> bool;
    fn extract_text(&self, message: &Value) -> Option<String>;

    fn initialize(&self) -> impl Future<Output = Result<(), AdapterError>> + Send;
    fn send_task(&self, task: &str) -> impl Future<Output = Result<(), AdapterError>> + Send;
    fn send_tool_result(
        &self,
        correlation_id: &str,
        result: &Value,
        ok: bool,
    ) -> impl Future<Output = Result<(), AdapterError>> + Send;
}

/// Object-safe erasure of [`ProtocolAdapter`] so the hub controller can hold
/// `Box<dyn ErasedProtocolAdapter>` per agent regardless of dialect.
pub trait ErasedProtocolAdapter: Send + Sync {
    fn is_tool_call(&self, message: &Value) -> bool;
    fn extract_tool_call(&self, message: &Value) -> Option<ToolCall>;
    fn is_completion(&self, message: &Value) -> bool;
    fn extract_text(&self, message: &Value) -> Option<String>;
    fn initialize<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>>;
    fn send_task<'a>(
        &'a self,
        task: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>>;
    fn send_tool_result<'a>(
        &'a self,
        correlation_id: &'a str,
        result: &'a Value,
        ok: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>>;
}

impl<T: ProtocolAdapter> ErasedProtocolAdapter for T {
    fn is_tool_call(&self, message: &Value) -> bool {
        ProtocolAdapter::is_tool_call(self, message)
    }

    fn extract_tool_call(&self, message: &Value) -> Option<ToolCall> {
        ProtocolAdapter::extract_tool_call(self, message)
    }

    fn is_completion(&self, message: &Value) -> bool {
        ProtocolAdapter::is_completion(self, message)
    }

    fn extract_text(&self, message: &Value) -> Option<String> {
        ProtocolAdapter::extract_text(self, message)
    }

    fn initialize<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(ProtocolAdapter::initialize(self))
    }

    fn send_task<'a>(
        &'a self,
        task: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(ProtocolAdapter::send_task(self, task))
    }

    fn send_tool_result<'a>(
        &'a self,
        correlation_id: &'a str,
        result: &'a Value,
        ok: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + 'a>> {
        Box::pin(ProtocolAdapter::send_tool_result(
            self,
            correlation_id,
            result,
            ok,
        ))
    }
}

pub(crate) fn next_request_id(counter: &std::sync::atomic::AtomicU64) -> u64 {
    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
}
