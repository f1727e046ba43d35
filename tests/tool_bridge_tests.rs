// Tool-call bridge tests: one correlated response per call id, argument
// plumbing into the note collaborator, unknown-tool handling.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use voxnote::notes::NoteSink;
use voxnote::tools::{tool_declarations, ToolCall, ToolInvocationBridge};

#[derive(Default)]
struct RecordingNoteSink {
    calls: parking_lot::Mutex<Vec<(Option<String>, Option<String>)>>,
}

#[async_trait::async_trait]
impl NoteSink for RecordingNoteSink {
    async fn create_note(&self, title: Option<String>, content: Option<String>) -> Result<String> {
        self.calls.lock().push((title, content));
        Ok("draft saved as test.md".to_string())
    }
}

struct FailingNoteSink;

#[async_trait::async_trait]
impl NoteSink for FailingNoteSink {
    async fn create_note(&self, _: Option<String>, _: Option<String>) -> Result<String> {
        anyhow::bail!("disk full")
    }
}

#[tokio::test]
async fn test_create_note_response_carries_call_id() {
    let sink = Arc::new(RecordingNoteSink::default());
    let bridge = ToolInvocationBridge::new(Arc::clone(&sink) as Arc<dyn NoteSink>);

    let outcome = bridge
        .dispatch(ToolCall {
            id: "abc".to_string(),
            name: "create_note".to_string(),
            args: json!({ "title": "Groceries", "content": "milk, eggs" }),
        })
        .await;

    assert_eq!(outcome.id, "abc");
    assert_eq!(outcome.name, "create_note");
    assert_eq!(outcome.result["status"], "ok");

    let calls = sink.calls.lock();
    assert_eq!(calls.len(), 1, "exactly one handler invocation per call");
    assert_eq!(
        calls[0],
        (Some("Groceries".to_string()), Some("milk, eggs".to_string()))
    );
}

#[tokio::test]
async fn test_missing_arguments_pass_through_as_none() {
    let sink = Arc::new(RecordingNoteSink::default());
    let bridge = ToolInvocationBridge::new(Arc::clone(&sink) as Arc<dyn NoteSink>);

    let outcome = bridge
        .dispatch(ToolCall {
            id: "1".to_string(),
            name: "create_note".to_string(),
            args: json!({}),
        })
        .await;

    assert_eq!(outcome.result["status"], "ok");
    assert_eq!(sink.calls.lock()[0], (None, None));
}

#[tokio::test]
async fn test_unknown_tool_yields_error_response_with_same_id() {
    let sink = Arc::new(RecordingNoteSink::default());
    let bridge = ToolInvocationBridge::new(Arc::clone(&sink) as Arc<dyn NoteSink>);

    let outcome = bridge
        .dispatch(ToolCall {
            id: "xyz".to_string(),
            name: "set_reminder".to_string(),
            args: json!({}),
        })
        .await;

    assert_eq!(outcome.id, "xyz", "errors still correlate to the call id");
    assert_eq!(outcome.result["status"], "error");
    assert!(sink.calls.lock().is_empty(), "no handler ran");
}

#[tokio::test]
async fn test_handler_failure_becomes_error_result() {
    let bridge = ToolInvocationBridge::new(Arc::new(FailingNoteSink) as Arc<dyn NoteSink>);

    let outcome = bridge
        .dispatch(ToolCall {
            id: "fail-1".to_string(),
            name: "create_note".to_string(),
            args: json!({ "title": "t" }),
        })
        .await;

    assert_eq!(outcome.id, "fail-1");
    assert_eq!(outcome.result["status"], "error");
    assert!(outcome.result["detail"]
        .as_str()
        .unwrap()
        .contains("disk full"));
}

#[test]
fn test_declared_tools_cover_note_creation() {
    let declarations = tool_declarations();
    assert_eq!(declarations.len(), 1);
    assert_eq!(declarations[0].name, "create_note");
    assert!(declarations[0].parameters["properties"]["title"].is_object());
}
