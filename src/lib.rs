pub mod audio;
pub mod config;
pub mod live;
pub mod notes;
pub mod playback;
pub mod tools;
pub mod transcript;

pub use audio::{CaptureBackend, CaptureConfig, CaptureStage, MicBackend, MicFrame, SessionRecorder};
pub use config::Config;
pub use live::{
    ClientMessage, RealtimeFrame, ServerEvent, SessionController, SessionError, SessionSetup,
    SessionState, ToolDeclaration,
};
pub use notes::{FileNoteStore, NoteSink};
pub use playback::{OutputClock, PlaybackScheduler, PlaybackSink, SampleClock, ScheduledChunk, SpeakerSink};
pub use tools::{ToolCall, ToolInvocationBridge, ToolOutcome};
pub use transcript::{Speaker, TranscriptAggregator, TranscriptEntry};
