//! Sandbox-scoped file read/write (spec §4.4). Every path is resolved
//! relative to the agent's sandbox directory and rejected if it resolves
//! outside it.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::error::ToolError;

pub struct FilesTool {
    sandbox: PathBuf,
}

impl FilesTool {
    pub fn new(sandbox: PathBuf) -> Self {
        Self { sandbox }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let requested = Path::new(path);
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.sandbox.join(requested)
        };
        let sandbox_abs = dunce(&self.sandbox);
        let resolved = dunce(&joined);
        if !resolved.starts_with(&sandbox_abs) {
            return Err(ToolError::PathEscape(resolved.display().to_string()));
        }
        Ok(resolved)
    }

    pub async fn read(&self, args: &Value) -> Result<Value, ToolError> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or("");
        let resolved = self.resolve(path)?;
        if !resolved.exists() {
            return Ok(json!({"error": format!("file not found: {path}")}));
        }
        if !resolved.is_file() {
            return Ok(json!({"error": format!("not a file: {path}")}));
        }
        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => Ok(json!({
                "path": resolved.display().to_string(),
                "size": content.len(),
                "content": content,
            })),
            Err(e) => Ok(json!({"error": e.to_string()})),
        }
    }

    pub async fn write(&self, args: &Value) -> Result<Value, ToolError> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or("");
        let content = args.get("content").and_then(Value::as_str).unwrap_or("");
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(json!({"error": e.to_string()}));
            }
        }
        match tokio::fs::write(&resolved, content).await {
            Ok(()) => Ok(json!({
                "path": resolved.display().to_string(),
                "written": content.len(),
            })),
            Err(e) => Ok(json!({"error": e.to_string()})),
        }
    }

    pub async fn list(&self, args: &Value) -> Result<Value, ToolError> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let resolved = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut rd = match tokio::fs::read_dir(&resolved).await {
            Ok(rd) => rd,
            Err(e) => return Ok(json!({"error": e.to_string()})),
        };
        while let Ok(Some(entry)) = rd.next_entry().await {
            entries.push(entry.file_name().to_string_lossy().to_string());
        }
        entries.sort();
        Ok(json!({"path": resolved.display().to_string(), "entries": entries}))
    }
}

/// Normalize a path without requiring it to exist (`Path::canonicalize`
/// would fail for a file we're about to create).
fn dunce(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesTool::new(dir.path().to_path_buf());
        tool.write(&json!({"path": "a.txt", "content": "hello"}))
            .await
            .unwrap();
        let read = tool.read(&json!({"path": "a.txt"})).await.unwrap();
        assert_eq!(read["content"], "hello");
    }

    #[tokio::test]
    async fn rejects_path_escaping_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesTool::new(dir.path().to_path_buf());
        let err = tool.read(&json!({"path": "../../etc/passwd"})).await;
        assert!(matches!(err, Err(ToolError::PathEscape(_))));
    }

    #[tokio::test]
    async fn read_missing_file_reports_error_not_err_result() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesTool::new(dir.path().to_path_buf());
        let result = tool.read(&json!({"path": "missing.txt"})).await.unwrap();
        assert!(result["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn list_directory_entries_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesTool::new(dir.path().to_path_buf());
        tool.write(&json!({"path": "b.txt", "content": ""})).await.unwrap();
        tool.write(&json!({"path": "a.txt", "content": ""})).await.unwrap();
        let listing = tool.list(&json!({"path": "."})).await.unwrap();
        let entries: Vec<&str> = listing["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(entries, vec!["a.txt", "b.txt"]);
    }
}
