//! Mock infrastructure for testing
//!
//! Provides a scripted capture backend and a controllable encoder so the
//! lifecycle can be driven without a desktop session.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use screenrec_core::capture::{CaptureBackend, MediaSourceHandle, MediaTrack};
use screenrec_core::config::{AudioConstraints, CaptureRequest};
use screenrec_core::encode::{EncoderEvent, EncoderEventSender, EncoderFactory, MediaEncoder};
use screenrec_core::error::{CaptureError, SessionError};
use screenrec_core::session::ComposedStream;
use screenrec_core::types::{
    AudioFormat, AudioFrame, DisplaySurface, TrackKind, TrackOrigin, TrackSettings,
};

/// Create an audio frame at the default format
pub fn audio_frame(samples: Vec<f32>, pts: u64) -> AudioFrame {
    AudioFrame::new(AudioFormat::default(), samples, pts)
}

/// Capture backend that answers from a script
pub struct MockBackend {
    surface: Option<DisplaySurface>,
    system_audio: bool,
    microphone: bool,
    deny_display: bool,
    deny_microphone: bool,
    handed_out: Mutex<Vec<MediaTrack>>,
    display_calls: AtomicUsize,
    mic_calls: AtomicUsize,
}

impl MockBackend {
    /// Backend where the user picks a whole monitor, no audio
    pub fn monitor() -> Self {
        Self::with_surface(Some(DisplaySurface::Monitor))
    }

    /// Backend where the user picks `surface` (`None` = not reported)
    pub fn with_surface(surface: Option<DisplaySurface>) -> Self {
        Self {
            surface,
            system_audio: false,
            microphone: true,
            deny_display: false,
            deny_microphone: false,
            handed_out: Mutex::new(Vec::new()),
            display_calls: AtomicUsize::new(0),
            mic_calls: AtomicUsize::new(0),
        }
    }

    /// Include a system audio track with the display
    pub fn system_audio(mut self, enabled: bool) -> Self {
        self.system_audio = enabled;
        self
    }

    /// Whether the microphone stream carries an audio track
    pub fn microphone(mut self, enabled: bool) -> Self {
        self.microphone = enabled;
        self
    }

    /// Dismiss the display picker
    pub fn deny_display(mut self) -> Self {
        self.deny_display = true;
        self
    }

    /// Refuse microphone permission
    pub fn deny_microphone(mut self) -> Self {
        self.deny_microphone = true;
        self
    }

    /// Every track handed out so far
    pub fn tracks(&self) -> Vec<MediaTrack> {
        self.handed_out.lock().clone()
    }

    /// Tracks handed out that are still live
    pub fn live_tracks(&self) -> usize {
        self.handed_out.lock().iter().filter(|t| t.is_live()).count()
    }

    /// The most recent display video track
    pub fn last_video(&self) -> Option<MediaTrack> {
        self.handed_out
            .lock()
            .iter()
            .rev()
            .find(|t| t.kind() == TrackKind::Video)
            .cloned()
    }

    /// The most recent audio track of `origin`
    pub fn last_audio(&self, origin: TrackOrigin) -> Option<MediaTrack> {
        self.handed_out
            .lock()
            .iter()
            .rev()
            .find(|t| t.kind() == TrackKind::Audio && t.origin() == origin)
            .cloned()
    }

    pub fn display_calls(&self) -> usize {
        self.display_calls.load(Ordering::SeqCst)
    }

    pub fn mic_calls(&self) -> usize {
        self.mic_calls.load(Ordering::SeqCst)
    }

    fn hand_out(&self, track: MediaTrack) -> MediaTrack {
        self.handed_out.lock().push(track.clone());
        track
    }
}

#[async_trait]
impl CaptureBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn display_media(
        &self,
        request: &CaptureRequest,
    ) -> Result<MediaSourceHandle, CaptureError> {
        self.display_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_display {
            return Err(CaptureError::denied("picker dismissed"));
        }

        let settings = TrackSettings {
            display_surface: self.surface,
            ..TrackSettings::default()
        }
        .with_dimensions(1920, 1080);
        let mut tracks = vec![self.hand_out(MediaTrack::new(
            TrackKind::Video,
            TrackOrigin::Display,
            "mock:screen",
            settings,
        ))];

        if self.system_audio && request.hints.system_audio.is_included() {
            tracks.push(self.hand_out(MediaTrack::audio(
                TrackOrigin::Display,
                "mock:system-audio",
                TrackSettings::audio(AudioFormat::default()),
            )));
        }

        Ok(MediaSourceHandle::new(TrackOrigin::Display, tracks))
    }

    async fn user_media(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<MediaSourceHandle, CaptureError> {
        self.mic_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_microphone {
            return Err(CaptureError::denied("microphone blocked"));
        }

        let mut tracks = Vec::new();
        if self.microphone {
            let format = AudioFormat {
                sample_rate: constraints.sample_rate,
                ..AudioFormat::default()
            };
            tracks.push(self.hand_out(MediaTrack::audio(
                TrackOrigin::Microphone,
                "mock:mic",
                TrackSettings::audio(format),
            )));
        }

        Ok(MediaSourceHandle::new(TrackOrigin::Microphone, tracks))
    }
}

/// What the test can see and drive of the current encoder
#[derive(Default)]
struct ControlState {
    events: Option<EncoderEventSender>,
    stop_calls: usize,
    created: usize,
    video_tracks: usize,
    audio_tracks: usize,
    audio_origin: Option<TrackOrigin>,
}

/// Shared view of the encoders a factory creates
#[derive(Clone, Default)]
pub struct EncoderControl {
    state: Arc<Mutex<ControlState>>,
}

impl EncoderControl {
    /// Emit a data-available chunk
    pub fn push_chunk(&self, data: &[u8]) -> bool {
        self.send(EncoderEvent::DataAvailable(Bytes::copy_from_slice(data)))
    }

    /// Emit an encoder error
    pub fn fail(&self, msg: &str) -> bool {
        self.send(EncoderEvent::Error(msg.to_string()))
    }

    /// Emit a stop-completion without being asked
    pub fn finish(&self) -> bool {
        self.send(EncoderEvent::Stopped)
    }

    /// Drop the event sender, as a crashed encoder would
    pub fn disconnect(&self) {
        self.state.lock().events = None;
    }

    fn send(&self, event: EncoderEvent) -> bool {
        match &self.state.lock().events {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Times `stop()` reached an encoder
    pub fn stop_calls(&self) -> usize {
        self.state.lock().stop_calls
    }

    /// Encoders created so far
    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    /// (video, audio) track counts of the last started stream
    pub fn stream_tracks(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.video_tracks, state.audio_tracks)
    }

    /// Origin of the last started stream's audio track
    pub fn audio_origin(&self) -> Option<TrackOrigin> {
        self.state.lock().audio_origin
    }
}

/// Encoder factory producing [`MockEncoder`]s
pub struct MockEncoderFactory {
    control: EncoderControl,
    mime_type: String,
    unavailable: bool,
    fail_start: bool,
    deferred_stop: bool,
}

impl MockEncoderFactory {
    pub fn new(control: EncoderControl) -> Self {
        Self {
            control,
            mime_type: "video/webm;codecs=vp9,opus".to_string(),
            unavailable: false,
            fail_start: false,
            deferred_stop: false,
        }
    }

    /// Negotiate this container type
    pub fn mime_type(mut self, mime: &str) -> Self {
        self.mime_type = mime.to_string();
        self
    }

    /// Report that recording isn't supported
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Fail when recording starts
    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Leave stop-completion to [`EncoderControl::finish`]
    pub fn deferred_stop(mut self) -> Self {
        self.deferred_stop = true;
        self
    }
}

impl EncoderFactory for MockEncoderFactory {
    fn create(
        &self,
        _stream: &ComposedStream,
        mime_type: Option<&str>,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError> {
        if self.unavailable {
            return Err(CaptureError::unavailable("no encoder"));
        }
        self.control.state.lock().created += 1;
        Ok(Box::new(MockEncoder {
            control: self.control.clone(),
            mime_type: mime_type.unwrap_or(&self.mime_type).to_string(),
            fail_start: self.fail_start,
            deferred_stop: self.deferred_stop,
        }))
    }
}

/// Encoder that records nothing and reports through its control handle
///
/// `stop()` answers with `Stopped` right away unless the stop is deferred.
pub struct MockEncoder {
    control: EncoderControl,
    mime_type: String,
    fail_start: bool,
    deferred_stop: bool,
}

impl MediaEncoder for MockEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn start(
        &mut self,
        stream: &ComposedStream,
        events: EncoderEventSender,
    ) -> Result<(), SessionError> {
        if self.fail_start {
            return Err(SessionError::encoder("could not open muxer"));
        }

        let mut state = self.control.state.lock();
        state.events = Some(events);
        state.video_tracks = usize::from(stream.video().is_some());
        state.audio_tracks = usize::from(stream.audio().is_some());
        state.audio_origin = stream.audio().map(|t| t.origin());
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.control.state.lock();
        state.stop_calls += 1;
        if self.deferred_stop {
            return;
        }
        if let Some(tx) = &state.events {
            let _ = tx.send(EncoderEvent::Stopped);
        }
    }
}
