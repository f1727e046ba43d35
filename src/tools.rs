//! Tool-call bridge between the live session and local collaborators.
//!
//! The remote model surfaces function-call requests mid-conversation; this
//! bridge dispatches them by name and returns exactly one correlated result
//! per call id. Whether the model should ask the user before creating a note
//! is expressed in the session instructions, not here.

use crate::live::messages::ToolDeclaration;
use crate::notes::NoteSink;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const CREATE_NOTE_TOOL: &str = "create_note";

/// A function-invocation request surfaced by the session.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// The single correlated result for one tool call.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub id: String,
    pub name: String,
    pub result: Value,
}

/// Tool signatures declared to the remote model at session setup.
pub fn tool_declarations() -> Vec<ToolDeclaration> {
    vec![ToolDeclaration {
        name: CREATE_NOTE_TOOL.to_string(),
        description: "Create a draft note for the user. Call only after the user has agreed \
                      to the proposed title and content."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Short note title" },
                "content": { "type": "string", "description": "Markdown body of the note" }
            }
        }),
    }]
}

pub struct ToolInvocationBridge {
    notes: Arc<dyn NoteSink>,
}

impl ToolInvocationBridge {
    pub fn new(notes: Arc<dyn NoteSink>) -> Self {
        Self { notes }
    }

    /// Invoke the matching handler and produce the response for this call id.
    pub async fn dispatch(&self, call: ToolCall) -> ToolOutcome {
        let result = match call.name.as_str() {
            CREATE_NOTE_TOOL => self.create_note(&call.args).await,
            other => {
                warn!("tool call for unknown tool '{other}' (id={})", call.id);
                Err(anyhow::anyhow!("unknown tool: {other}"))
            }
        };

        let result = match result {
            Ok(detail) => json!({ "status": "ok", "detail": detail }),
            Err(e) => {
                error!("tool '{}' failed (id={}): {e:#}", call.name, call.id);
                json!({ "status": "error", "detail": e.to_string() })
            }
        };

        ToolOutcome {
            id: call.id,
            name: call.name,
            result,
        }
    }

    async fn create_note(&self, args: &Value) -> Result<String> {
        let title = args
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string);

        let detail = self.notes.create_note(title, content).await?;
        info!("created note draft: {detail}");
        Ok(detail)
    }
}
