//! Start/stop orchestration
//!
//! Glues capture, mixing, composition and recording together in response to
//! user start/stop actions and the platform ending a screen share.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::capture::{
    AcquiredSources, AudioMixer, CaptureSource, MediaSourceHandle, MediaTrack, MixedAudio,
    MixerInput,
};
use crate::config::CaptureRequest;
use crate::encode::EncoderFactory;
use crate::error::{RecorderError, Result};
use crate::output::Artifact;
use crate::session::{
    compose, RecorderEvent, RecordingSession, SessionOutcome, SessionResources, SessionState,
    SessionStats,
};
use crate::types::{AudioFormat, Handle};

/// Capacity of the recorder event channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Which controls the UI should offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl Affordances {
    /// Nothing recording
    pub const IDLE: Self = Self {
        start_enabled: true,
        stop_enabled: false,
    };

    /// Recording in progress
    pub const RECORDING: Self = Self {
        start_enabled: false,
        stop_enabled: true,
    };
}

impl Default for Affordances {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Drives one recording at a time
pub struct LifecycleController {
    handle: Handle,
    request: CaptureRequest,
    capture: CaptureSource,
    encoders: Arc<dyn EncoderFactory>,
    session: Option<RecordingSession>,
    affordances: Affordances,
    events: broadcast::Sender<RecorderEvent>,
    last_artifact: Option<Artifact>,
}

impl LifecycleController {
    /// Create a controller recording with `request`
    pub fn new(
        request: CaptureRequest,
        capture: CaptureSource,
        encoders: Arc<dyn EncoderFactory>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        for warning in request.validate() {
            warn!("{}", warning);
        }

        Self {
            handle: Handle::new(),
            request,
            capture,
            encoders,
            session: None,
            affordances: Affordances::IDLE,
            events,
            last_artifact: None,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The request used for every start
    pub fn request(&self) -> &CaptureRequest {
        &self.request
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    /// State of the current (or most recent) session
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(SessionState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_active())
    }

    pub fn affordances(&self) -> Affordances {
        self.affordances
    }

    /// Artifact of the most recent finalized session
    pub fn last_artifact(&self) -> Option<&Artifact> {
        self.last_artifact.as_ref()
    }

    /// Display stream for a muted live preview while recording
    pub fn preview_source(&self) -> Option<&MediaSourceHandle> {
        self.session.as_ref().and_then(|s| s.preview_source())
    }

    /// Statistics of the current (or most recent) session
    pub fn stats(&self) -> Option<SessionStats> {
        self.session.as_ref().map(|s| s.stats())
    }

    /// Acquire capture, wire audio and start recording
    ///
    /// Affordances flip only once recording has started. On failure every
    /// handle acquired by the attempt is released, the error is reported
    /// and the controller stays ready for another attempt.
    pub async fn on_start_requested(&mut self) -> Result<()> {
        if self.is_recording() {
            let err = RecorderError::SessionAlreadyRunning;
            self.report(&err);
            return Err(err);
        }

        match self.start_session().await {
            Ok(session) => {
                self.session = Some(session);
                self.affordances = Affordances::RECORDING;
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    async fn start_session(&self) -> Result<RecordingSession> {
        info!(
            "Controller {}: start requested ({})",
            self.handle, self.request.strategy
        );

        let sources = self.capture.acquire(&self.request).await?;
        let (audio, mixer) = self.wire_audio(&sources);
        let stream = compose(&sources.display, audio.as_ref());

        debug!(
            "Composed stream {}: {} live track(s), audio: {}",
            stream.id(),
            stream.live_track_count(),
            stream.audio().is_some()
        );

        let encoder = match self
            .encoders
            .create(&stream, self.request.mime_type.as_deref())
        {
            Ok(encoder) => encoder,
            Err(e) => {
                SessionResources::new(sources, mixer).release();
                return Err(e.into());
            }
        };

        let termination = sources.video_track().map(|t| t.termination_listener());
        let mut session = RecordingSession::new(self.request.naming, self.events.clone());
        session.start(
            stream,
            encoder,
            SessionResources::new(sources, mixer),
            termination,
        )?;

        Ok(session)
    }

    /// Pick the audio track to record for the configured strategy
    fn wire_audio(&self, sources: &AcquiredSources) -> (Option<MediaTrack>, Option<MixedAudio>) {
        if !self.request.strategy.uses_mixer() {
            let track = sources
                .display
                .audio_tracks()
                .find(|t| t.is_live())
                .cloned();
            debug!("Recording display audio directly: {}", track.is_some());
            return (track, None);
        }

        let mut inputs =
            vec![MixerInput::new(sources.display.clone()).with_gain(self.request.gains.system)];
        if let Some(mic) = &sources.microphone {
            inputs.push(MixerInput::new(mic.clone()).with_gain(self.request.gains.microphone));
        }

        let format = AudioFormat {
            sample_rate: self.request.display_audio.sample_rate,
            channels: 2,
            ..AudioFormat::default()
        };
        let mixed = AudioMixer::new(format).mix(&inputs);

        // A silent mixer adds nothing to the recording.
        let track = (!mixed.is_silent()).then(|| mixed.track().clone());
        (track, Some(mixed))
    }

    /// Stop the running session
    ///
    /// Returns `false` if nothing was recording.
    pub fn on_stop_requested(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) => session.stop(),
            None => {
                debug!("Controller {}: stop requested with no session", self.handle);
                false
            }
        }
    }

    /// Stop the running session because the platform ended the share
    ///
    /// Repeated calls for the same session are no-ops.
    pub fn on_external_termination(&mut self) -> bool {
        self.session
            .as_mut()
            .is_some_and(|s| s.handle_external_termination())
    }

    /// Process the next session event
    ///
    /// Returns the outcome when the session ends. Returns `None` right away
    /// when nothing is recording.
    pub async fn next_event(&mut self) -> Option<SessionOutcome> {
        let outcome = self.session.as_mut()?.next_event().await?;
        self.apply_outcome(&outcome);
        Some(outcome)
    }

    /// Drive the session until it produces an artifact or fails
    pub async fn run_until_complete(&mut self) -> Result<Artifact> {
        loop {
            if !self.is_recording() {
                return Err(RecorderError::NoActiveSession);
            }
            match self.next_event().await {
                Some(SessionOutcome::Finalized(artifact)) => return Ok(artifact),
                Some(SessionOutcome::Failed(e)) => return Err(e.into()),
                None => continue,
            }
        }
    }

    fn apply_outcome(&mut self, outcome: &SessionOutcome) {
        self.affordances = Affordances::IDLE;
        match outcome {
            SessionOutcome::Finalized(artifact) => {
                info!(
                    "Controller {}: recording ready as {}",
                    self.handle,
                    artifact.name()
                );
                self.last_artifact = Some(artifact.clone());
            }
            SessionOutcome::Failed(e) => {
                self.report(&RecorderError::Session(e.clone()));
            }
        }
    }

    fn report(&self, err: &RecorderError) {
        let message = match err.user_hint() {
            Some(hint) => format!("{} ({})", err, hint),
            None => err.to_string(),
        };
        if err.is_user_recoverable() {
            error!("Recording failed: {}", message);
        } else {
            error!("Recording unavailable: {}", message);
        }
        let _ = self.events.send(RecorderEvent::Diagnostic(message));
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("handle", &self.handle)
            .field("backend", &self.capture.backend_name())
            .field("state", &self.state())
            .field("affordances", &self.affordances)
            .finish()
    }
}
