//! Wire messages exchanged with the live model service.
//!
//! Everything is JSON text frames over the WebSocket: one setup message at
//! open, then realtime-input frames outbound and server events inbound.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One outbound window of captured audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeFrame {
    /// Base64-encoded little-endian 16-bit PCM samples
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl RealtimeFrame {
    pub fn pcm(data: String, sample_rate: u32) -> Self {
        Self {
            data,
            mime_type: format!("audio/pcm;rate={sample_rate}"),
        }
    }
}

/// Tool signature declared to the model at setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool arguments
    pub parameters: Value,
}

/// Session configuration sent once when the connection opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSetup {
    /// Output voice identity
    pub voice: String,
    pub input_transcription: bool,
    pub output_transcription: bool,
    /// Assistant persona plus size-capped notes context
    pub system_instruction: String,
    pub tools: Vec<ToolDeclaration>,
}

/// Messages this client sends after setup.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Setup { setup: SessionSetup },
    RealtimeInput { frame: RealtimeFrame },
    ToolResponse { id: String, name: String, result: Value },
}

/// Messages the service sends during a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Synthesized speech: base64 16-bit PCM at 24kHz
    Audio { data: String },
    /// Partial transcription of the user's microphone audio
    InputTranscription { text: String },
    /// Partial transcription of the model's synthesized speech
    OutputTranscription { text: String },
    /// The current utterance finished
    TurnComplete,
    /// Server-detected barge-in: cancel queued playback immediately
    Interrupted,
    /// Function-call request
    ToolCall {
        id: String,
        name: String,
        #[serde(default)]
        args: Value,
    },
    Error { message: String },
}
