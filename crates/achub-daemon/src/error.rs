#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Agent(#[from] achub_agent::AgentError),

    #[error(transparent)]
    Router(#[from] achub_router::RouterError),

    #[error(transparent)]
    Adapter(#[from] achub_protocol::AdapterError),

    #[error("journal I/O error: {0}")]
    Journal(#[source] std::io::Error),
}
