//! Screen and microphone capture
//!
//! This module handles:
//! - The backend seam platforms implement ([`CaptureBackend`])
//! - Acquisition with whole-screen validation ([`CaptureSource`])
//! - Live track handles and the audio mixing graph

pub mod mixer;
#[cfg(all(feature = "portal", target_os = "linux"))]
pub mod portal;
pub mod track;

pub use mixer::{AudioMixer, MixedAudio, MixerInput};
#[cfg(all(feature = "portal", target_os = "linux"))]
pub use portal::PortalCapture;
pub use track::{MediaSourceHandle, MediaTrack, TerminationListener, TrackStatus};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AudioConstraints, CaptureRequest};
use crate::error::CaptureError;
use crate::types::DisplaySurface;

/// Platform capture primitives
///
/// Implementations prompt the user as needed and hand back live tracks.
/// Denial maps to [`CaptureError::UserDenied`], a missing API to
/// [`CaptureError::PlatformUnavailable`].
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Acquire a display stream (video plus optional system audio)
    async fn display_media(
        &self,
        request: &CaptureRequest,
    ) -> Result<MediaSourceHandle, CaptureError>;

    /// Acquire a microphone stream
    async fn user_media(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<MediaSourceHandle, CaptureError>;
}

/// Handles produced by a successful acquisition
#[derive(Debug, Clone)]
pub struct AcquiredSources {
    /// Display stream; always has a monitor video track
    pub display: MediaSourceHandle,
    /// Separately requested microphone stream
    pub microphone: Option<MediaSourceHandle>,
}

impl AcquiredSources {
    /// The display video track
    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.display.video_track()
    }

    /// Number of tracks still live across all handles
    pub fn live_track_count(&self) -> usize {
        self.display.live_track_count()
            + self
                .microphone
                .as_ref()
                .map(|m| m.live_track_count())
                .unwrap_or(0)
    }

    /// Stop every track still live
    pub fn release(&self) -> usize {
        let mut stopped = self.display.stop();
        if let Some(mic) = &self.microphone {
            stopped += mic.stop();
        }
        stopped
    }
}

/// Acquires whole-screen capture through a backend
#[derive(Clone)]
pub struct CaptureSource {
    backend: Arc<dyn CaptureBackend>,
}

impl CaptureSource {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self { backend }
    }

    /// Backend name
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Acquire display (and, if the strategy asks for it, microphone) streams
    ///
    /// The display video must report a `monitor` surface. On any failure
    /// every handle acquired so far is released before returning.
    pub async fn acquire(&self, request: &CaptureRequest) -> Result<AcquiredSources, CaptureError> {
        info!(
            "Requesting display capture via {} (strategy: {})",
            self.backend.name(),
            request.strategy
        );

        let display = self.backend.display_media(request).await?;

        let surface = match display.video_track() {
            Some(track) => track.settings().display_surface,
            None => {
                display.stop();
                return Err(CaptureError::unavailable(
                    "Display capture returned no video track",
                ));
            }
        };

        // A track that doesn't report its surface is treated as not-a-monitor.
        let surface = surface.unwrap_or(DisplaySurface::Window);
        if surface != DisplaySurface::Monitor {
            warn!("Display surface must be 'monitor', got '{}'", surface);
            display.stop();
            return Err(CaptureError::WrongSurface { selected: surface });
        }

        let (track_count, system_audio) = (display.tracks().len(), display.has_live_audio());
        debug!(
            "Display stream acquired: {} track(s), system audio: {}",
            track_count, system_audio
        );

        let microphone = if request.strategy.requests_microphone() {
            match self.backend.user_media(&request.microphone).await {
                Ok(mic) => {
                    debug!("Microphone stream acquired: {} track(s)", mic.tracks().len());
                    Some(mic)
                }
                Err(e) => {
                    display.stop();
                    return Err(e);
                }
            }
        } else {
            None
        };

        info!("Capture acquired (microphone: {})", microphone.is_some());

        Ok(AcquiredSources {
            display,
            microphone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioStrategy;
    use crate::types::{AudioFormat, TrackOrigin, TrackSettings};
    use parking_lot::Mutex;

    struct FixedBackend {
        surface: Option<DisplaySurface>,
        system_audio: bool,
        mic_denied: bool,
        handed_out: Mutex<Vec<MediaTrack>>,
    }

    impl FixedBackend {
        fn new(surface: Option<DisplaySurface>) -> Self {
            Self {
                surface,
                system_audio: false,
                mic_denied: false,
                handed_out: Mutex::new(Vec::new()),
            }
        }

        fn live(&self) -> usize {
            self.handed_out.lock().iter().filter(|t| t.is_live()).count()
        }
    }

    #[async_trait]
    impl CaptureBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn display_media(
            &self,
            _request: &CaptureRequest,
        ) -> Result<MediaSourceHandle, CaptureError> {
            let video = match self.surface {
                Some(surface) => MediaTrack::display_video(surface),
                None => MediaTrack::new(
                    crate::types::TrackKind::Video,
                    TrackOrigin::Display,
                    "screen",
                    TrackSettings::default(),
                ),
            };
            let mut tracks = vec![video];
            if self.system_audio {
                tracks.push(MediaTrack::audio(
                    TrackOrigin::Display,
                    "system",
                    TrackSettings::audio(AudioFormat::default()),
                ));
            }
            self.handed_out.lock().extend(tracks.iter().cloned());
            Ok(MediaSourceHandle::new(TrackOrigin::Display, tracks))
        }

        async fn user_media(
            &self,
            _constraints: &AudioConstraints,
        ) -> Result<MediaSourceHandle, CaptureError> {
            if self.mic_denied {
                return Err(CaptureError::denied("microphone"));
            }
            let mic = MediaTrack::audio(
                TrackOrigin::Microphone,
                "mic",
                TrackSettings::audio(AudioFormat::default()),
            );
            self.handed_out.lock().push(mic.clone());
            Ok(MediaSourceHandle::new(TrackOrigin::Microphone, vec![mic]))
        }
    }

    #[tokio::test]
    async fn test_window_surface_rejected_and_released() {
        let backend = Arc::new(FixedBackend::new(Some(DisplaySurface::Window)));
        let source = CaptureSource::new(backend.clone());

        let err = source
            .acquire(&CaptureRequest::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CaptureError::WrongSurface {
                selected: DisplaySurface::Window
            }
        );
        assert_eq!(backend.live(), 0);
    }

    #[tokio::test]
    async fn test_unreported_surface_rejected() {
        let backend = Arc::new(FixedBackend::new(None));
        let source = CaptureSource::new(backend.clone());
        let err = source
            .acquire(&CaptureRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::WrongSurface { .. }));
        assert_eq!(backend.live(), 0);
    }

    #[tokio::test]
    async fn test_mic_denial_releases_display() {
        let mut backend = FixedBackend::new(Some(DisplaySurface::Monitor));
        backend.mic_denied = true;
        let backend = Arc::new(backend);
        let source = CaptureSource::new(backend.clone());

        let err = source
            .acquire(&CaptureRequest::new(AudioStrategy::SeparateMicAndSystemAudio))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::UserDenied(_)));
        assert_eq!(backend.live(), 0);
    }

    #[tokio::test]
    async fn test_microphone_only_requested_when_strategy_asks() {
        let backend = Arc::new(FixedBackend::new(Some(DisplaySurface::Monitor)));
        let source = CaptureSource::new(backend.clone());

        let acquired = source
            .acquire(&CaptureRequest::new(AudioStrategy::CombinedDisplayAudio))
            .await
            .unwrap();
        assert!(acquired.microphone.is_none());

        let acquired_mic = source
            .acquire(&CaptureRequest::new(AudioStrategy::SeparateMicAndSystemAudio))
            .await
            .unwrap();
        assert!(acquired_mic.microphone.is_some());

        acquired.release();
        acquired_mic.release();
        assert_eq!(backend.live(), 0);
    }

    #[tokio::test]
    async fn test_display_with_system_audio_acquired() {
        let mut backend = FixedBackend::new(Some(DisplaySurface::Monitor));
        backend.system_audio = true;
        let backend = Arc::new(backend);
        let source = CaptureSource::new(backend.clone());

        let acquired = source
            .acquire(&CaptureRequest::new(AudioStrategy::CombinedDisplayAudio))
            .await
            .unwrap();
        assert_eq!(acquired.display.tracks().len(), 2);
        assert!(acquired.display.has_live_audio());
        assert_eq!(acquired.live_track_count(), 2);

        assert_eq!(acquired.release(), 2);
        assert_eq!(backend.live(), 0);
    }
}
