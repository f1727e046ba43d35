//! Session lifecycle: owns the audio resource bundle, wires capture,
//! playback, transcript and tool handling to session events, and funnels
//! every exit path through one idempotent teardown.

use super::client::{FrameSender, InboundEvent, LiveClient};
use super::messages::{ClientMessage, SessionSetup};
use crate::audio::{CaptureBackend, CaptureConfig, CaptureStage, MicBackend, MicFrame, SessionRecorder};
use crate::config::Config;
use crate::notes::NoteSink;
use crate::playback::{decode_pcm16, PlaybackScheduler, PlaybackSink, SpeakerSink};
use crate::tools::{tool_declarations, ToolCall, ToolInvocationBridge};
use crate::transcript::{Speaker, TranscriptAggregator, TranscriptEntry};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Assistant persona for the voice session. The note-confirmation flow is
/// deliberately expressed here as instructions rather than as local state:
/// the model proposes a note out loud and only calls the tool after a verbal
/// yes.
const PERSONA: &str = "You are a friendly voice assistant inside a personal note-taking app. \
Keep replies short and conversational; you are being spoken, not read. \
When the user asks to save something as a note, propose a title and a short \
summary out loud, wait for the user to agree, and only then call the \
create_note tool. Use the user's notes context below to answer questions \
about their existing notes.";

#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone access refused or unavailable; nothing was acquired.
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),

    /// Transport or auth failure while connecting; partial resources have
    /// been released.
    #[error("could not open live session: {0}")]
    OpenFailure(String),

    /// Mid-session failure reported by the transport.
    #[error("live session failed: {0}")]
    Runtime(String),

    /// Malformed inbound audio payload.
    #[error("malformed audio payload: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
}

/// Everything a running session holds: audio devices, the socket, the
/// playback timeline and the tasks pumping them. Created whole by `start`,
/// cleared whole by `stop` — components receive handles but never replace
/// bundle fields themselves.
struct ResourceBundle {
    capture: Box<dyn CaptureBackend>,
    client: Option<LiveClient>,
    sink: Arc<dyn PlaybackSink>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    recorder: Option<Arc<Mutex<SessionRecorder>>>,
    capture_task: JoinHandle<()>,
    router_task: JoinHandle<()>,
    completion_task: JoinHandle<()>,
}

/// Owns the one live voice session. Cloning shares the same session.
#[derive(Clone)]
pub struct SessionController {
    config: Config,
    bridge: Arc<ToolInvocationBridge>,
    transcript: Arc<Mutex<TranscriptAggregator>>,
    state: Arc<Mutex<SessionState>>,
    bundle: Arc<Mutex<Option<ResourceBundle>>>,
}

impl SessionController {
    pub fn new(config: Config, notes: Arc<dyn NoteSink>) -> Self {
        Self {
            config,
            bridge: Arc::new(ToolInvocationBridge::new(notes)),
            transcript: Arc::new(Mutex::new(TranscriptAggregator::new())),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            bundle: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Ordered `{speaker, text}` log for display collaborators.
    pub async fn transcript_snapshot(&self) -> Vec<TranscriptEntry> {
        self.transcript.lock().await.entries().to_vec()
    }

    /// Start a voice session. `context_notes` is the user's notes text woven
    /// into the system instructions (size-capped).
    pub async fn start(&self, context_notes: &str) -> Result<(), SessionError> {
        // One mutex is the single authority over the resource bundle; start
        // and stop serialize on it.
        let mut bundle = self.bundle.lock().await;
        if bundle.is_some() {
            warn!("voice session already active");
            return Ok(());
        }
        *self.state.lock().await = SessionState::Connecting;

        let session_id = format!("voice-{}", uuid::Uuid::new_v4());
        info!("starting voice session {session_id}");

        // Microphone first: a permission failure must abort before anything
        // else is acquired.
        let mut capture: Box<dyn CaptureBackend> = Box::new(MicBackend::new(CaptureConfig {
            sample_rate: self.config.audio.capture_sample_rate,
            device: self.config.audio.input_device.clone(),
        }));
        let mic_rx = match capture.start().await {
            Ok(rx) => rx,
            Err(e) => {
                *self.state.lock().await = SessionState::Idle;
                return Err(SessionError::PermissionDenied(format!("{e:#}")));
            }
        };

        let playback_rate = self.config.audio.playback_sample_rate;
        let opened =
            tokio::task::spawn_blocking(move || SpeakerSink::open(playback_rate)).await;
        let (sink, done_rx) = match opened {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                let _ = capture.stop().await;
                *self.state.lock().await = SessionState::Idle;
                return Err(SessionError::OpenFailure(format!("audio output: {e:#}")));
            }
            Err(e) => {
                let _ = capture.stop().await;
                *self.state.lock().await = SessionState::Idle;
                return Err(SessionError::OpenFailure(format!("audio output: {e}")));
            }
        };
        let sink: Arc<dyn PlaybackSink> = sink;

        let api_key = std::env::var(&self.config.live.api_key_env).ok();
        if api_key.is_none() {
            warn!(
                "{} is not set; connecting without credentials",
                self.config.live.api_key_env
            );
        }
        let setup = SessionSetup {
            voice: self.config.live.voice.clone(),
            input_transcription: true,
            output_transcription: true,
            system_instruction: build_system_instruction(
                PERSONA,
                context_notes,
                self.config.live.context_char_cap,
            ),
            tools: tool_declarations(),
        };

        let (client, events) =
            match LiveClient::connect(&self.config.live.endpoint, api_key.as_deref(), setup).await
            {
                Ok(opened) => opened,
                Err(e) => {
                    let _ = capture.stop().await;
                    if let Err(close_err) = sink.close().await {
                        warn!("failed to close audio output after open failure: {close_err:#}");
                    }
                    *self.state.lock().await = SessionState::Idle;
                    return Err(SessionError::OpenFailure(format!("{e:#}")));
                }
            };

        let recorder = if self.config.audio.record_replies {
            match SessionRecorder::create(
                Path::new(&self.config.audio.recordings_path),
                &session_id,
                playback_rate,
            ) {
                Ok(recorder) => Some(Arc::new(Mutex::new(recorder))),
                Err(e) => {
                    warn!("reply recording disabled: {e:#}");
                    None
                }
            }
        } else {
            None
        };

        let scheduler = Arc::new(Mutex::new(PlaybackScheduler::new(
            Arc::clone(&sink),
            self.config.audio.priming_delay_secs,
            playback_rate,
        )));

        let capture_task = tokio::spawn(run_capture(
            mic_rx,
            client.frame_sender(),
            self.config.audio.frame_window,
            self.config.audio.capture_sample_rate,
        ));

        let completion_scheduler = Arc::clone(&scheduler);
        let completion_task = tokio::spawn(run_completions(done_rx, completion_scheduler));

        let router_task = tokio::spawn(run_router(RouterContext {
            events,
            scheduler: Arc::clone(&scheduler),
            transcript: Arc::clone(&self.transcript),
            bridge: Arc::clone(&self.bridge),
            responder: client.message_sender(),
            recorder: recorder.clone(),
            controller: self.clone(),
        }));

        *bundle = Some(ResourceBundle {
            capture,
            client: Some(client),
            sink,
            scheduler,
            recorder,
            capture_task,
            router_task,
            completion_task,
        });
        *self.state.lock().await = SessionState::Active;
        info!("voice session {session_id} active");
        Ok(())
    }

    /// The single teardown path. Safe to call from any state; calling it on
    /// an idle controller is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.bundle.lock().await;
        let Some(mut bundle) = guard.take() else {
            *self.state.lock().await = SessionState::Idle;
            debug!("stop requested with no active session");
            return Ok(());
        };
        *self.state.lock().await = SessionState::Idle;

        // Stop the pumps before releasing what they pump into.
        bundle.capture_task.abort();
        bundle.router_task.abort();
        bundle.completion_task.abort();

        if let Err(e) = bundle.capture.stop().await {
            warn!("failed to stop microphone: {e:#}");
        }

        bundle.scheduler.lock().await.interrupt().await;

        if let Some(client) = bundle.client.take() {
            client.close().await;
        }

        if let Err(e) = bundle.sink.close().await {
            warn!("failed to close audio output: {e:#}");
        }

        if let Some(recorder) = bundle.recorder.take() {
            match Arc::try_unwrap(recorder) {
                Ok(recorder) => match recorder.into_inner().finalize() {
                    Ok(path) => info!("session replies saved to {}", path.display()),
                    Err(e) => warn!("failed to finalize reply recording: {e:#}"),
                },
                Err(_) => warn!("reply recorder still referenced at teardown"),
            }
        }

        info!("voice session torn down");
        Ok(())
    }
}

/// Capture pump: mic frames through the framing stage into the session.
async fn run_capture(
    mut mic_rx: mpsc::Receiver<MicFrame>,
    frames: FrameSender,
    window: usize,
    sample_rate: u32,
) {
    let mut stage = CaptureStage::new(window, sample_rate);
    while let Some(frame) = mic_rx.recv().await {
        stage.push(&frame.samples, &frames);
    }
    debug!(
        "capture pump finished after {} frames ({} dropped)",
        stage.frames_sent(),
        frames.dropped_frames()
    );
}

/// Active-set bookkeeping: sources the sink finished playing naturally.
async fn run_completions(
    mut done_rx: mpsc::UnboundedReceiver<u64>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
) {
    while let Some(source_id) = done_rx.recv().await {
        scheduler.lock().await.on_source_ended(source_id);
    }
}

struct RouterContext {
    events: mpsc::Receiver<InboundEvent>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    transcript: Arc<Mutex<TranscriptAggregator>>,
    bridge: Arc<ToolInvocationBridge>,
    responder: mpsc::Sender<ClientMessage>,
    recorder: Option<Arc<Mutex<SessionRecorder>>>,
    controller: SessionController,
}

/// Inbound message router: audio to the scheduler, transcription to the
/// aggregator, tool calls to the bridge. Remote errors and closure funnel
/// into the controller's teardown.
async fn run_router(ctx: RouterContext) {
    let RouterContext {
        mut events,
        scheduler,
        transcript,
        bridge,
        responder,
        recorder,
        controller,
    } = ctx;

    use super::messages::ServerEvent::*;

    while let Some(inbound) = events.recv().await {
        match inbound {
            InboundEvent::Event(Audio { data }) => {
                if let Some(recorder) = &recorder {
                    if let Ok(pcm) = decode_pcm16(&data) {
                        if let Err(e) = recorder.lock().await.write(&pcm) {
                            warn!("reply recording write failed: {e:#}");
                        }
                    }
                }
                // Decode failures skip the chunk and leave the timeline
                // cursor untouched; the stream resynchronizes on the next
                // good chunk.
                if let Err(e) = scheduler.lock().await.enqueue(&data).await {
                    warn!("{}", SessionError::Decode(e.to_string()));
                }
            }
            InboundEvent::Event(InputTranscription { text }) => {
                transcript.lock().await.apply_delta(Speaker::User, &text);
            }
            InboundEvent::Event(OutputTranscription { text }) => {
                transcript.lock().await.apply_delta(Speaker::Model, &text);
            }
            InboundEvent::Event(TurnComplete) => {
                transcript.lock().await.complete_turn();
            }
            InboundEvent::Event(Interrupted) => {
                scheduler.lock().await.interrupt().await;
            }
            InboundEvent::Event(ToolCall { id, name, args }) => {
                let outcome = bridge.dispatch(crate::tools::ToolCall { id, name, args }).await;
                let message = ClientMessage::ToolResponse {
                    id: outcome.id,
                    name: outcome.name,
                    result: outcome.result,
                };
                if let Err(e) = responder.send(message).await {
                    warn!("failed to send tool response: {e}");
                }
            }
            InboundEvent::Event(Error { message }) => {
                error!("{}", SessionError::Runtime(message));
                spawn_teardown(&controller);
                break;
            }
            InboundEvent::Closed => {
                info!("remote closed the session");
                spawn_teardown(&controller);
                break;
            }
            InboundEvent::TransportError(message) => {
                error!("{}", SessionError::Runtime(message));
                spawn_teardown(&controller);
                break;
            }
        }
    }
    debug!("session router finished");
}

/// Teardown runs on a fresh task: `stop` aborts the router, and the router
/// must not cancel itself halfway through cleanup.
fn spawn_teardown(controller: &SessionController) {
    let controller = controller.clone();
    tokio::spawn(async move {
        if let Err(e) = controller.stop().await {
            error!("teardown failed: {e:#}");
        }
    });
}

/// Persona plus size-capped notes context.
fn build_system_instruction(persona: &str, context_notes: &str, char_cap: usize) -> String {
    let context = truncate_chars(context_notes, char_cap);
    if context.is_empty() {
        persona.to_string()
    } else {
        format!("{persona}\n\nNotes context:\n{context}")
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
