/// Errors surfaced directly to the caller of [`crate::process::ManagedAgent`].
///
/// Per spec §4.2/§7: a write to a closed pipe surfaces here, to the caller —
/// never onto the event bus (the bus only ever sees the agent exit).
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent {0} already started")]
    AlreadyStarted(String),

    #[error("agent {0} not started")]
    NotStarted(String),

    #[error("failed to spawn agent {id}: {source}")]
    Spawn {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("write to agent {0} failed: {1}")]
    WriteFailed(String, std::io::Error),
}
