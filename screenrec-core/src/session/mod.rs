//! Recording session state machine
//!
//! ```text
//! Idle ──start──▶ Recording ──stop / external end──▶ Stopping ──Stopped──▶ Finalized
//!                     │                                  │
//!                     └──────────── encoder error ───────┴──────────────▶ Failed
//! ```
//!
//! A session owns its capture handles, its mixer graph and its encoder.
//! Everything is released when it reaches `Finalized` or `Failed`.

mod compose;

pub use compose::{compose, ComposedStream};

use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

use crate::capture::{AcquiredSources, MediaSourceHandle, MixedAudio, TerminationListener};
use crate::config::NamingPolicy;
use crate::encode::{self, EncoderEvent, EncoderEventReceiver, MediaEncoder};
use crate::error::{RecorderError, Result, SessionError};
use crate::output::Artifact;
use crate::types::Handle;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, not recording
    #[default]
    Idle,
    /// Encoder running, chunks arriving
    Recording,
    /// Stop requested, waiting for the encoder to finish
    Stopping,
    /// Artifact produced
    Finalized,
    /// Encoder failed; nothing produced
    Failed,
}

impl SessionState {
    /// Whether the session still holds resources
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Stopping)
    }
}

/// Why a session started stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Explicit stop request
    Requested,
    /// The platform ended the display capture
    ExternalTermination,
}

/// Terminal result of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Finalized(Artifact),
    Failed(SessionError),
}

/// Lifecycle notifications for whoever renders the recorder
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// Recording began
    Started { session: Handle, mime_type: String },
    /// Stop in progress
    Stopping { session: Handle, reason: StopReason },
    /// Artifact ready for download/playback
    Finalized { session: Handle, artifact: Artifact },
    /// Session ended without an artifact
    Failed { session: Handle, error: SessionError },
    /// Human-readable problem report
    Diagnostic(String),
}

/// Everything a session releases when it ends
#[derive(Debug, Default)]
pub struct SessionResources {
    /// Acquired capture handles
    pub sources: Option<AcquiredSources>,
    /// Mixer graph, if audio went through one
    pub mixer: Option<MixedAudio>,
}

impl SessionResources {
    /// Resources with capture handles and an optional mixer
    pub fn new(sources: AcquiredSources, mixer: Option<MixedAudio>) -> Self {
        Self {
            sources: Some(sources),
            mixer,
        }
    }

    /// Stop capture handles that are still live
    pub fn stop_sources(&self) -> usize {
        self.sources.as_ref().map(|s| s.release()).unwrap_or(0)
    }

    /// Stop capture handles and tear down the mixer
    pub fn release(&mut self) -> usize {
        let stopped = self.stop_sources();
        if let Some(mut mixer) = self.mixer.take() {
            mixer.teardown();
        }
        stopped
    }

    /// Live tracks across capture handles and the mixer output
    pub fn live_track_count(&self) -> usize {
        let sources = self
            .sources
            .as_ref()
            .map(|s| s.live_track_count())
            .unwrap_or(0);
        let mixer = self
            .mixer
            .as_ref()
            .map(|m| usize::from(m.track().is_live()))
            .unwrap_or(0);
        sources + mixer
    }
}

/// One recording, from start to artifact
pub struct RecordingSession {
    id: Handle,
    state: SessionState,
    naming: NamingPolicy,
    stream: Option<ComposedStream>,
    encoder: Option<Box<dyn MediaEncoder>>,
    encoder_events: Option<EncoderEventReceiver>,
    mime_type: String,
    termination: Option<TerminationListener>,
    chunks: Vec<Bytes>,
    bytes_buffered: usize,
    resources: SessionResources,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    encoder_stop_calls: u32,
    notify: broadcast::Sender<RecorderEvent>,
}

impl RecordingSession {
    /// Create an idle session publishing to `notify`
    pub fn new(naming: NamingPolicy, notify: broadcast::Sender<RecorderEvent>) -> Self {
        Self {
            id: Handle::new(),
            state: SessionState::Idle,
            naming,
            stream: None,
            encoder: None,
            encoder_events: None,
            mime_type: encode::DEFAULT_MIME_TYPE.to_string(),
            termination: None,
            chunks: Vec::new(),
            bytes_buffered: 0,
            resources: SessionResources::default(),
            started_at: None,
            stopped_at: None,
            encoder_stop_calls: 0,
            notify,
        }
    }

    pub fn id(&self) -> Handle {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Container type negotiated by the encoder
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The composed stream being recorded
    pub fn stream(&self) -> Option<&ComposedStream> {
        self.stream.as_ref()
    }

    /// Display stream for a live feedback view
    ///
    /// Render it muted; it carries the captured system audio.
    pub fn preview_source(&self) -> Option<&MediaSourceHandle> {
        if !self.is_active() {
            return None;
        }
        self.resources.sources.as_ref().map(|s| &s.display)
    }

    /// Live tracks still owned by this session
    pub fn live_track_count(&self) -> usize {
        self.resources.live_track_count()
    }

    /// How many times the encoder was asked to stop
    pub fn encoder_stop_calls(&self) -> u32 {
        self.encoder_stop_calls
    }

    /// Start recording `stream` with `encoder`
    ///
    /// Takes ownership of `resources`. If `termination` is given, its firing
    /// moves the session to `Stopping` as if `stop()` had been called. On
    /// failure the resources are released and nothing is retained.
    pub fn start(
        &mut self,
        stream: ComposedStream,
        mut encoder: Box<dyn MediaEncoder>,
        resources: SessionResources,
        termination: Option<TerminationListener>,
    ) -> Result<()> {
        if self.state != SessionState::Idle {
            let mut resources = resources;
            resources.release();
            return Err(RecorderError::SessionAlreadyRunning);
        }

        self.resources = resources;

        if stream.is_empty() {
            warn!("Session {}: composed stream has no live tracks", self.id);
            self.resources.release();
            return Err(SessionError::NoTracks.into());
        }

        let (tx, rx) = encode::event_channel();
        if let Err(e) = encoder.start(&stream, tx) {
            error!("Session {}: encoder failed to start: {}", self.id, e);
            self.resources.release();
            self.state = SessionState::Failed;
            self.publish(RecorderEvent::Failed {
                session: self.id,
                error: e.clone(),
            });
            return Err(e.into());
        }

        self.mime_type = encoder.mime_type().to_string();
        self.encoder = Some(encoder);
        self.encoder_events = Some(rx);
        self.termination = termination;
        self.stream = Some(stream);
        self.state = SessionState::Recording;
        self.started_at = Some(Instant::now());

        info!(
            "Session {} recording ({} live track(s), {})",
            self.id,
            self.stream.as_ref().map(|s| s.live_track_count()).unwrap_or(0),
            self.mime_type
        );
        self.publish(RecorderEvent::Started {
            session: self.id,
            mime_type: self.mime_type.clone(),
        });

        Ok(())
    }

    /// Ask the encoder to stop
    ///
    /// Returns `false` (and does nothing) unless the session is recording,
    /// so the encoder sees at most one stop per session.
    pub fn stop(&mut self) -> bool {
        self.begin_stop(StopReason::Requested)
    }

    fn begin_stop(&mut self, reason: StopReason) -> bool {
        if self.state != SessionState::Recording {
            debug!("Session {}: stop ignored in state {:?}", self.id, self.state);
            return false;
        }

        self.state = SessionState::Stopping;
        self.stopped_at = Some(Instant::now());
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.stop();
            self.encoder_stop_calls += 1;
        }

        info!("Session {} stopping ({:?})", self.id, reason);
        self.publish(RecorderEvent::Stopping {
            session: self.id,
            reason,
        });
        true
    }

    /// React to the platform ending the display capture
    ///
    /// Detaches the termination listener, stops every handle not already
    /// stopped, then stops the encoder. Returns `false` if the session had
    /// already left `Recording` or the signal was already handled.
    pub fn handle_external_termination(&mut self) -> bool {
        if self.state != SessionState::Recording || self.termination.take().is_none() {
            return false;
        }

        let stopped = self.resources.stop_sources();
        info!(
            "Session {}: screen sharing ended externally, released {} track(s)",
            self.id, stopped
        );
        self.begin_stop(StopReason::ExternalTermination)
    }

    /// Apply one encoder event
    ///
    /// Returns the outcome when the event ends the session.
    pub fn handle_encoder_event(&mut self, event: EncoderEvent) -> Option<SessionOutcome> {
        match event {
            EncoderEvent::DataAvailable(chunk) => {
                if !self.is_active() {
                    warn!(
                        "Session {}: dropping {}-byte chunk in state {:?}",
                        self.id,
                        chunk.len(),
                        self.state
                    );
                    return None;
                }
                self.bytes_buffered += chunk.len();
                self.chunks.push(chunk);
                trace!(
                    "Session {}: chunk #{} ({} bytes buffered)",
                    self.id,
                    self.chunks.len(),
                    self.bytes_buffered
                );
                None
            }
            EncoderEvent::Stopped => {
                if !self.is_active() {
                    return None;
                }
                if self.state == SessionState::Recording {
                    debug!("Session {}: encoder stopped on its own", self.id);
                }
                Some(self.finalize())
            }
            EncoderEvent::Error(msg) => {
                if !self.is_active() {
                    return None;
                }
                Some(self.fail(SessionError::encoder(msg)))
            }
        }
    }

    /// Wait for and apply the next encoder event or termination signal
    ///
    /// Returns the outcome once the session ends; `None` after an
    /// intermediate event, or immediately if the session isn't active.
    pub async fn next_event(&mut self) -> Option<SessionOutcome> {
        if !self.is_active() {
            return None;
        }

        // The listener stays ready once fired; only poll it while recording.
        let recording = self.state == SessionState::Recording;
        let input = {
            let events = self.encoder_events.as_mut()?;
            let termination = &mut self.termination;
            tokio::select! {
                biased;
                event = events.recv() => Input::Encoder(event),
                _ = termination_fired(termination), if recording => Input::Terminated,
            }
        };

        match input {
            Input::Encoder(Some(event)) => self.handle_encoder_event(event),
            Input::Encoder(None) => Some(self.fail(SessionError::encoder(
                "encoder went away without finishing",
            ))),
            Input::Terminated => {
                self.handle_external_termination();
                None
            }
        }
    }

    fn finalize(&mut self) -> SessionOutcome {
        let chunks = std::mem::take(&mut self.chunks);
        let artifact = Artifact::assemble(&chunks, &self.mime_type, self.naming);
        self.bytes_buffered = 0;

        self.teardown();
        self.state = SessionState::Finalized;

        info!(
            "Session {} finalized: {} ({} bytes)",
            self.id,
            artifact.name(),
            artifact.len()
        );
        self.publish(RecorderEvent::Finalized {
            session: self.id,
            artifact: artifact.clone(),
        });

        SessionOutcome::Finalized(artifact)
    }

    fn fail(&mut self, error: SessionError) -> SessionOutcome {
        error!(
            "Session {} failed: {} (discarding {} chunk(s))",
            self.id,
            error,
            self.chunks.len()
        );
        self.chunks.clear();
        self.bytes_buffered = 0;

        self.teardown();
        self.state = SessionState::Failed;

        self.publish(RecorderEvent::Failed {
            session: self.id,
            error: error.clone(),
        });

        SessionOutcome::Failed(error)
    }

    fn teardown(&mut self) {
        self.termination = None;
        self.encoder_events = None;
        self.encoder = None;
        let stopped = self.resources.release();
        debug!("Session {}: released {} track(s)", self.id, stopped);
    }

    fn publish(&self, event: RecorderEvent) {
        // No subscribers is fine.
        let _ = self.notify.send(event);
    }

    /// Session statistics
    pub fn stats(&self) -> SessionStats {
        let elapsed = match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => stop.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };

        SessionStats {
            id: self.id,
            state: self.state,
            mime_type: self.mime_type.clone(),
            chunks_buffered: self.chunks.len(),
            bytes_buffered: self.bytes_buffered,
            elapsed,
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.is_active() {
            warn!("Session {} dropped while {:?}", self.id, self.state);
            if self.state == SessionState::Recording {
                if let Some(encoder) = self.encoder.as_mut() {
                    encoder.stop();
                }
            }
            self.teardown();
        }
    }
}

enum Input {
    Encoder(Option<EncoderEvent>),
    Terminated,
}

async fn termination_fired(listener: &mut Option<TerminationListener>) {
    match listener {
        Some(listener) => listener.ended().await,
        None => std::future::pending().await,
    }
}

/// Session statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub id: Handle,
    pub state: SessionState,
    pub mime_type: String,
    /// Chunks waiting for finalization
    pub chunks_buffered: usize,
    /// Bytes waiting for finalization
    pub bytes_buffered: usize,
    /// Time spent recording
    pub elapsed: Duration,
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Session {}: {:?} - {}, {} chunk(s), {} bytes, {:.1}s",
            self.id,
            self.state,
            self.mime_type,
            self.chunks_buffered,
            self.bytes_buffered,
            self.elapsed.as_secs_f64()
        )
    }
}
