//! Config loading for a hub run (spec §6). The agent registry is fixed and
//! closed — a config can only reference `codex`, `copilot`, or `echo`; it
//! never supplies an arbitrary command to execute.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use achub_core::{AgentSpec, ProtocolKind};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("agents[{index}].agent: unknown agent {name:?}. Allowed: codex, copilot, echo")]
    UnknownAgent { index: usize, name: String },

    #[error("duplicate agent id: {0:?}")]
    DuplicateAgentId(String),

    #[error("agents[{index}].sandbox must be under workspace_root ({workspace_root})")]
    SandboxEscapesWorkspace { index: usize, workspace_root: PathBuf },

    #[error("no agent with id={0:?} in config")]
    NoSuchAgent(String),

    #[error("{0} must be a non-empty array")]
    EmptyArray(&'static str),
}

struct KnownAgent {
    command: &'static [&'static str],
    protocol: ProtocolKind,
}

fn known_agent(name: &str) -> Option<KnownAgent> {
    match name {
        "codex" => Some(KnownAgent {
            command: &["codex", "app-server"],
            protocol: ProtocolKind::CodexAppServer,
        }),
        "copilot" => Some(KnownAgent {
            command: &["copilot", "--acp", "--stdio"],
            protocol: ProtocolKind::Acp,
        }),
        "echo" => Some(KnownAgent {
            command: &["cat"],
            protocol: ProtocolKind::Echo,
        }),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct RawAgent {
    id: String,
    agent: String,
    sandbox: Option<String>,
    #[serde(default)]
    env: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    workspace_root: String,
    journal_path: String,
    #[serde(default)]
    watch_paths: Vec<String>,
    agents: Vec<RawAgent>,
    #[serde(default)]
    require_tool_approval: bool,
    #[serde(default)]
    shell_allowlist: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub workspace_root: PathBuf,
    pub journal_path: PathBuf,
    pub watch_paths: Vec<PathBuf>,
    pub agents: Vec<AgentSpec>,
    pub require_tool_approval: bool,
    pub shell_allowlist: Vec<String>,
}

impl HubConfig {
    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Restrict this config to a single agent, as `--agent <id>` does.
    pub fn only(&self, agent_id: &str) -> Result<HubConfig, ConfigError> {
        let agent = self
            .agent(agent_id)
            .ok_or_else(|| ConfigError::NoSuchAgent(agent_id.to_string()))?
            .clone();
        Ok(HubConfig {
            agents: vec![agent],
            ..self.clone()
        })
    }
}

pub fn load_config(path: &Path) -> Result<HubConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let raw_text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
    let raw: RawConfig = serde_json::from_str(&raw_text)?;

    let workspace_root = PathBuf::from(&raw.workspace_root);
    let journal_path = PathBuf::from(&raw.journal_path);
    let watch_paths: Vec<PathBuf> = raw.watch_paths.into_iter().map(PathBuf::from).collect();

    if raw.agents.is_empty() {
        return Err(ConfigError::EmptyArray("agents"));
    }

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut agents = Vec::with_capacity(raw.agents.len());

    for (index, raw_agent) in raw.agents.into_iter().enumerate() {
        if !seen_ids.insert(raw_agent.id.clone()) {
            return Err(ConfigError::DuplicateAgentId(raw_agent.id));
        }

        let known = known_agent(&raw_agent.agent).ok_or_else(|| ConfigError::UnknownAgent {
            index,
            name: raw_agent.agent.clone(),
        })?;

        let sandbox = match raw_agent.sandbox {
            Some(path) => {
                let resolved = PathBuf::from(path);
                if !resolved.starts_with(&workspace_root) {
                    return Err(ConfigError::SandboxEscapesWorkspace {
                        index,
                        workspace_root: workspace_root.clone(),
                    });
                }
                resolved
            }
            None => workspace_root.join("workspaces").join(&raw_agent.agent),
        };

        agents.push(AgentSpec {
            id: raw_agent.id,
            agent: raw_agent.agent,
            protocol: known.protocol,
            command: known.command.iter().map(|s| s.to_string()).collect(),
            sandbox,
            env: raw_agent.env,
        });
    }

    Ok(HubConfig {
        workspace_root,
        journal_path,
        watch_paths,
        agents,
        require_tool_approval: raw.require_tool_approval,
        shell_allowlist: raw.shell_allowlist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("acp-hub.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_minimal_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        let body = format!(
            r#"{{
                "workspace_root": {ws:?},
                "journal_path": "run.jsonl",
                "watch_paths": ["."],
                "agents": [{{"id": "e1", "agent": "echo"}}]
            }}"#,
            ws = ws.display()
        );
        let path = write_config(dir.path(), &body);
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.agents.len(), 1);
        assert_eq!(cfg.agents[0].protocol, ProtocolKind::Echo);
        assert_eq!(cfg.agents[0].sandbox, ws.join("workspaces").join("echo"));
    }

    #[test]
    fn rejects_unknown_agent_name() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{
            "workspace_root": "/tmp/ws",
            "journal_path": "run.jsonl",
            "watch_paths": ["."],
            "agents": [{"id": "x", "agent": "bogus"}]
        }"#;
        let path = write_config(dir.path(), body);
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAgent { .. }));
    }

    #[test]
    fn rejects_duplicate_agent_ids() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{
            "workspace_root": "/tmp/ws",
            "journal_path": "run.jsonl",
            "watch_paths": ["."],
            "agents": [{"id": "a", "agent": "echo"}, {"id": "a", "agent": "echo"}]
        }"#;
        let path = write_config(dir.path(), body);
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAgentId(_)));
    }

    #[test]
    fn rejects_sandbox_override_escaping_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        let body = format!(
            r#"{{
                "workspace_root": {ws:?},
                "journal_path": "run.jsonl",
                "watch_paths": ["."],
                "agents": [{{"id": "a", "agent": "echo", "sandbox": "/tmp/elsewhere"}}]
            }}"#,
            ws = ws.display()
        );
        let path = write_config(dir.path(), &body);
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::SandboxEscapesWorkspace { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_config(Path::new("/nonexistent/acp-hub.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
