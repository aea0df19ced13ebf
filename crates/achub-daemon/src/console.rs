//! Human-readable console sink: a narrow, curated subset of event kinds,
//! not the full journal (spec §6).

use achub_core::Event;

pub fn print_event(event: &Event) {
    match event.kind.as_str() {
        "agent.stdout" => {
            let text = event.payload.get("text").and_then(|v| v.as_str()).unwrap_or_default();
            println!("[{}] {}", event.agent_id.as_deref().unwrap_or("?"), text);
        }
        "agent.stderr" => {
            let text = event.payload.get("text").and_then(|v| v.as_str()).unwrap_or_default();
            eprintln!("[{}:err] {}", event.agent_id.as_deref().unwrap_or("?"), text);
        }
        "tool.invocation" => {
            let tool = event.payload.get("tool").and_then(|v| v.as_str()).unwrap_or_default();
            let args = event.payload.get("args").cloned().unwrap_or_default();
            println!("[tool] {tool} -> {args}");
        }
        "tool.result" => {
            let ok = event.payload.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
            let tool = event.payload.get("tool").and_then(|v| v.as_str()).unwrap_or_default();
            println!("[tool] {} {tool}", if ok { "ok" } else { "failed" });
        }
        _ => {}
    }
}
