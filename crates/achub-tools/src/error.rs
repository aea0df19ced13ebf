#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("blocked: denylist match {0:?}")]
    Denied(String),

    #[error("blocked: shell execution is disabled")]
    Disabled,

    #[error("blocked: not in shell allowlist")]
    NotAllowlisted,

    #[error("path escapes workspace: {0}")]
    PathEscape(String),

    #[error("cannot interpret command argument")]
    BadCommand,

    #[error("spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
}
