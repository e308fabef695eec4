//! xdg-desktop-portal display capture
//!
//! Uses ashpd to ask the screencast portal for a monitor. The portal picker
//! is the consent dialog: dismissing it maps to `UserDenied`. The portal
//! carries no microphone, so `user_media` reports `PlatformUnavailable`.
//! When the compositor closes the session the video track ends, which is
//! the share-ended signal sessions listen for.

use ashpd::desktop::screencast::{CursorMode, Screencast, SourceType};
use ashpd::desktop::PersistMode;
use ashpd::WindowIdentifier;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{CaptureBackend, MediaSourceHandle, MediaTrack};
use crate::config::{AudioConstraints, CaptureRequest};
use crate::error::CaptureError;
use crate::types::{DisplaySurface, TrackKind, TrackOrigin, TrackSettings};

/// Capture backend talking to the screencast portal
pub struct PortalCapture {
    screencast: Screencast<'static>,
}

impl PortalCapture {
    /// Connect to the screencast portal
    pub async fn new() -> Result<Self, CaptureError> {
        let screencast = Screencast::new().await?;
        Ok(Self { screencast })
    }
}

fn surface_for(source: SourceType) -> Option<DisplaySurface> {
    match source {
        SourceType::Monitor => Some(DisplaySurface::Monitor),
        SourceType::Window => Some(DisplaySurface::Window),
        SourceType::Virtual => None,
    }
}

/// Wait for the first `Closed` signal and end `track`
///
/// Returns `true` if the signal ended a live track.
async fn end_on_close<S: Stream>(track: &MediaTrack, closed: S, closed_flag: &AtomicBool) -> bool {
    let mut closed = std::pin::pin!(closed);
    if closed.next().await.is_none() {
        return false;
    }
    closed_flag.store(true, Ordering::SeqCst);
    track.end()
}

#[async_trait]
impl CaptureBackend for PortalCapture {
    fn name(&self) -> &str {
        "xdg-desktop-portal"
    }

    async fn display_media(
        &self,
        request: &CaptureRequest,
    ) -> Result<MediaSourceHandle, CaptureError> {
        info!("Creating screencast session via portal");
        let session = self.screencast.create_session().await?;

        // Picker hints have no portal equivalent beyond the source type.
        debug!(
            "Requesting {} source (hints: {:?})",
            request.surface, request.hints
        );
        self.screencast
            .select_sources(
                &session,
                CursorMode::Embedded,
                SourceType::Monitor.into(),
                false,
                None,
                PersistMode::DoNot,
            )
            .await?;

        let response = self
            .screencast
            .start(&session, None::<&WindowIdentifier>)
            .await?
            .response()?;

        let Some(stream) = response.streams().first() else {
            if let Err(e) = session.close().await {
                warn!("Failed to close screencast session: {}", e);
            }
            return Err(CaptureError::unavailable("No streams returned from portal"));
        };

        let mut settings = TrackSettings {
            display_surface: stream.source_type().and_then(surface_for),
            ..TrackSettings::default()
        };
        if let Some((width, height)) = stream.size() {
            settings = settings.with_dimensions(width.max(0) as u32, height.max(0) as u32);
        }

        let node_id = stream.pipe_wire_node_id();
        info!(
            "Screencast started: node_id={}, surface={:?}",
            node_id, settings.display_surface
        );

        let video = MediaTrack::new(
            TrackKind::Video,
            TrackOrigin::Display,
            format!("portal:{}", node_id),
            settings,
        );

        let session = Arc::new(session);
        let closed_by_portal = Arc::new(AtomicBool::new(false));
        let watcher = {
            let (session, track, flag) =
                (session.clone(), video.clone(), closed_by_portal.clone());
            tokio::spawn(async move {
                match session.receive_closed().await {
                    Ok(closed) => {
                        if end_on_close(&track, closed, &flag).await {
                            info!("Screencast session {} closed by the compositor", node_id);
                        }
                    }
                    Err(e) => warn!("Cannot watch screencast session {}: {}", node_id, e),
                }
            })
        };

        video.on_release(move || {
            watcher.abort();
            // A session the compositor closed is already gone.
            if closed_by_portal.load(Ordering::SeqCst) {
                return;
            }
            match tokio::runtime::Handle::try_current() {
                Ok(rt) => {
                    rt.spawn(async move {
                        if let Err(e) = session.close().await {
                            warn!("Failed to close screencast session: {}", e);
                        }
                    });
                }
                Err(_) => warn!("No runtime to close screencast session {}", node_id),
            }
        });

        Ok(MediaSourceHandle::new(TrackOrigin::Display, vec![video]))
    }

    async fn user_media(
        &self,
        _constraints: &AudioConstraints,
    ) -> Result<MediaSourceHandle, CaptureError> {
        Err(CaptureError::unavailable(
            "The screencast portal does not provide microphone capture",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TrackStatus;

    #[test]
    fn test_surface_mapping() {
        assert_eq!(surface_for(SourceType::Monitor), Some(DisplaySurface::Monitor));
        assert_eq!(surface_for(SourceType::Window), Some(DisplaySurface::Window));
        assert_eq!(surface_for(SourceType::Virtual), None);
    }

    #[tokio::test]
    async fn test_close_signal_ends_track() {
        let track = MediaTrack::display_video(DisplaySurface::Monitor);
        let mut listener = track.termination_listener();
        let flag = AtomicBool::new(false);

        assert!(end_on_close(&track, futures::stream::iter([()]), &flag).await);
        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(track.status(), TrackStatus::Ended);
        listener.ended().await;
    }

    #[tokio::test]
    async fn test_watch_ending_without_signal_keeps_track() {
        let track = MediaTrack::display_video(DisplaySurface::Monitor);
        let flag = AtomicBool::new(false);

        assert!(!end_on_close(&track, futures::stream::empty::<()>(), &flag).await);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(track.is_live());
        track.stop();
    }

    #[tokio::test]
    #[ignore] // Requires a desktop session with xdg-desktop-portal
    async fn test_portal_display_media() {
        let portal = PortalCapture::new().await.unwrap();
        let display = portal
            .display_media(&CaptureRequest::default())
            .await
            .unwrap();
        assert!(display.video_track().is_some());
        display.stop();
    }
}
