//! The internal event model.
//!
//! Everything displayed by a UI subscriber and persisted to the journal is
//! normalized into an [`Event`] first. Construction helpers below mirror the
//! taxonomy fixed by the wire contract: the `kind` strings and payload shapes
//! are part of the external interface, not an implementation detail.

use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single, immutable occurrence in a hub run.
///
/// `ts` orders by publish time, not by creation time — an event constructed
/// early but published late sorts late. Equality is structural so tests can
/// assert on events directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub ts: f64,
    pub kind: String,
    pub payload: Map<String, Value>,
    pub agent_id: Option<String>,
}

impl Event {
    pub fn new(kind: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            ts: now_secs(),
            kind: kind.into(),
            payload,
            agent_id: None,
        }
    }

    pub fn for_agent(
        kind: impl Into<String>,
        agent_id: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            ts: now_secs(),
            kind: kind.into(),
            payload,
            agent_id: Some(agent_id.into()),
        }
    }

    /// Serialize to the wire shape: a JSON object with keys sorted
    /// recursively through every nested object, `agent_id` omitted when
    /// absent (spec §3/§6, matching the original's
    /// `json.dumps(..., sort_keys=True)`).
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(aid) = &self.agent_id {
            out.insert("agent_id".to_string(), Value::String(aid.clone()));
        }
        out.insert("kind".to_string(), Value::String(self.kind.clone()));
        out.insert("payload".to_string(), Value::Object(self.payload.clone()));
        out.insert(
            "ts".to_string(),
            serde_json::Number::from_f64(self.ts)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
        sort_keys(Value::Object(out))
    }

    pub fn to_json_line(&self) -> String {
        self.to_json().to_string()
    }
}

/// Recursively re-insert every object's keys in sorted order. `serde_json`
/// with `preserve_order` renders a `Map` in insertion order, so sorting
/// happens here rather than at serialization time.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                let v = map[&key].clone();
                sorted.insert(key, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn obj(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

// --- Agent process lifecycle -------------------------------------------------

pub fn agent_started(agent_id: &str, command: &[String]) -> Event {
    Event::for_agent(
        "agent.started",
        agent_id,
        obj(vec![("command", Value::from(command.to_vec()))]),
    )
}

pub fn agent_exited(agent_id: &str, exit_code: i32) -> Event {
    Event::for_agent(
        "agent.exited",
        agent_id,
        obj(vec![("exit_code", Value::from(exit_code))]),
    )
}

pub fn agent_stdout(agent_id: &str, text: &str) -> Event {
    Event::for_agent("agent.stdout", agent_id, obj(vec![("text", Value::from(text))]))
}

pub fn agent_stderr(agent_id: &str, text: &str) -> Event {
    Event::for_agent("agent.stderr", agent_id, obj(vec![("text", Value::from(text))]))
}

pub fn agent_jsonrpc(agent_id: &str, message: Value) -> Event {
    Event::for_agent("agent.jsonrpc", agent_id, obj(vec![("message", message)]))
}

// --- Tool runner --------------------------------------------------------------

pub fn tool_invocation(
    agent_id: &str,
    tool: &str,
    args: Value,
    correlation_id: Option<&str>,
) -> Event {
    Event::for_agent(
        "tool.invocation",
        agent_id,
        obj(vec![
            ("tool", Value::from(tool)),
            ("args", args),
            ("correlation_id", correlation_id.map(Value::from).unwrap_or(Value::Null)),
        ]),
    )
}

pub fn tool_result(
    agent_id: &str,
    tool: &str,
    ok: bool,
    result: Value,
    correlation_id: Option<&str>,
) -> Event {
    Event::for_agent(
        "tool.result",
        agent_id,
        obj(vec![
            ("tool", Value::from(tool)),
            ("ok", Value::from(ok)),
            ("result", result),
            ("correlation_id", correlation_id.map(Value::from).unwrap_or(Value::Null)),
        ]),
    )
}

// --- Filesystem watch (event shape only — polling is an external collaborator) -

pub fn fs_changed(path: &str, change: &str) -> Event {
    Event::new(
        "fs.changed",
        obj(vec![("path", Value::from(path)), ("change", Value::from(change))]),
    )
}

// --- Hub lifecycle --------------------------------------------------------------

pub fn hub_started(agents: &[String]) -> Event {
    Event::new("hub.started", obj(vec![("agents", Value::from(agents.to_vec()))]))
}

pub fn hub_stopped() -> Event {
    Event::new("hub.stopped", Map::new())
}

pub fn task_submitted(task: &str, route: &str) -> Event {
    Event::new(
        "task.submitted",
        obj(vec![("task", Value::from(task)), ("route", Value::from(route))]),
    )
}

pub fn task_completed(task: &str) -> Event {
    Event::new("task.completed", obj(vec![("task", Value::from(task))]))
}

pub fn router_forwarded(from: &str, to: &str, text: &str) -> Event {
    Event::new(
        "router.forwarded",
        obj(vec![
            ("from", Value::from(from)),
            ("to", Value::from(to)),
            ("text", Value::from(text)),
        ]),
    )
}

pub fn system_note(text: &str) -> Event {
    Event::new("system.note", obj(vec![("text", Value::from(text))]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_json_omits_agent_id_when_absent() {
        let e = hub_stopped();
        let v = e.to_json();
        assert!(v.get("agent_id").is_none());
        assert_eq!(v.get("kind").unwrap(), "hub.stopped");
    }

    #[test]
    fn to_json_includes_agent_id_when_present() {
        let e = agent_stdout("a1", "hello");
        let v = e.to_json();
        assert_eq!(v.get("agent_id").unwrap(), "a1");
        assert_eq!(v["payload"]["text"], "hello");
    }

    #[test]
    fn equality_is_structural() {
        let mut e1 = agent_stdout("a1", "hi");
        let mut e2 = e1.clone();
        e1.ts = 1.0;
        e2.ts = 1.0;
        assert_eq!(e1, e2);
    }

    #[test]
    fn json_keys_are_sorted() {
        let e = agent_stdout("a1", "hi");
        let rendered = e.to_json_line();
        let agent_pos = rendered.find("agent_id").unwrap();
        let kind_pos = rendered.find("\"kind\"").unwrap();
        let payload_pos = rendered.find("payload").unwrap();
        let ts_pos = rendered.find("\"ts\"").unwrap();
        assert!(agent_pos < kind_pos && kind_pos < payload_pos && payload_pos < ts_pos);
    }

    #[test]
    fn nested_payload_keys_are_also_sorted() {
        // tool_result's payload is built in call-site order (tool, ok,
        // result, correlation_id) — the rendered JSON must not preserve
        // that order.
        let e = tool_result("a1", "shell", true, Value::from("out"), Some("c1"));
        let rendered = e.to_json_line();
        let correlation_pos = rendered.find("correlation_id").unwrap();
        let ok_pos = rendered.find("\"ok\"").unwrap();
        let result_pos = rendered.find("\"result\"").unwrap();
        let tool_pos = rendered.find("\"tool\"").unwrap();
        assert!(correlation_pos < ok_pos && ok_pos < result_pos && result_pos < tool_pos);
    }
}
