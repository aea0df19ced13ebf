#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("router has no agents configured")]
    Empty,

    #[error("adapter error: {0}")]
    Adapter(#[from] achub_protocol::AdapterError),
}
