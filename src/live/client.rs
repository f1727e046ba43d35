//! WebSocket client for the live session.
//!
//! Owns the socket split: a writer task drains the outbound queue, a reader
//! task parses server events and forwards them to the session router.

use super::messages::{ClientMessage, RealtimeFrame, ServerEvent, SessionSetup};
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Outbound queue depth. Frames beyond this are dropped rather than queued
/// unbounded behind a slow network.
const OUTBOUND_QUEUE_DEPTH: usize = 32;

/// Transport-level view of the session delivered to the router.
#[derive(Debug)]
pub enum InboundEvent {
    Event(ServerEvent),
    /// Remote closed the connection
    Closed,
    /// Transport failure mid-session
    TransportError(String),
}

/// Non-blocking submitter for capture frames.
///
/// Frame submission is fire-and-forget per window; when the bounded outbound
/// queue is full the newest frame is dropped and counted instead of stalling
/// the capture loop.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<ClientMessage>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    pub fn new(tx: mpsc::Sender<ClientMessage>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn submit(&self, frame: RealtimeFrame) {
        match self.tx.try_send(ClientMessage::RealtimeInput { frame }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if n % 50 == 1 {
                    warn!("outbound queue full; {n} capture frames dropped so far");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("outbound queue closed; dropping capture frame");
            }
        }
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct LiveClient {
    outbound_tx: mpsc::Sender<ClientMessage>,
    writer_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
}

impl LiveClient {
    /// Open the session: connect, send the setup message, spawn the writer
    /// and reader tasks.
    pub async fn connect(
        endpoint: &str,
        api_key: Option<&str>,
        setup: SessionSetup,
    ) -> Result<(Self, mpsc::Receiver<InboundEvent>)> {
        let mut request = endpoint
            .into_client_request()
            .with_context(|| format!("invalid live endpoint: {endpoint}"))?;
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .context("API key contains invalid header characters")?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        info!("connecting to live session at {endpoint}");
        let (ws, _response) = connect_async(request)
            .await
            .context("failed to open live session")?;
        let (mut ws_tx, mut ws_rx) = ws.split();

        let setup_text = serde_json::to_string(&ClientMessage::Setup { setup })?;
        ws_tx
            .send(Message::Text(setup_text))
            .await
            .context("failed to send session setup")?;
        info!("live session open");

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientMessage>(OUTBOUND_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::channel::<InboundEvent>(64);

        let writer_task = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to serialize outbound message: {e}");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                    warn!("outbound send failed: {e}");
                    break;
                }
            }
            // Queue closed or send failed; close the socket best-effort.
            let _ = ws_tx.close().await;
            debug!("session writer task finished");
        });

        let reader_task = tokio::spawn(async move {
            while let Some(message) = ws_rx.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if event_tx.send(InboundEvent::Event(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("unrecognized server message ({e}): {text}"),
                    },
                    Ok(Message::Close(frame)) => {
                        debug!("server closed the session: {frame:?}");
                        let _ = event_tx.send(InboundEvent::Closed).await;
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(other) => debug!("ignoring non-text message: {other:?}"),
                    Err(e) => {
                        let _ = event_tx
                            .send(InboundEvent::TransportError(e.to_string()))
                            .await;
                        break;
                    }
                }
            }
            debug!("session reader task finished");
        });

        Ok((
            Self {
                outbound_tx,
                writer_task,
                reader_task,
            },
            event_rx,
        ))
    }

    /// Non-blocking sender for the capture stage.
    pub fn frame_sender(&self) -> FrameSender {
        FrameSender::new(self.outbound_tx.clone())
    }

    /// Queue-backed sender for ordered messages (tool responses).
    pub fn message_sender(&self) -> mpsc::Sender<ClientMessage> {
        self.outbound_tx.clone()
    }

    /// Close the session: flush the writer (which sends the close frame) and
    /// stop the reader.
    pub async fn close(self) {
        drop(self.outbound_tx);
        if tokio::time::timeout(Duration::from_secs(2), self.writer_task)
            .await
            .is_err()
        {
            warn!("session writer did not flush in time");
        }
        self.reader_task.abort();
    }
}
