//! Live media tracks and the stream handles that group them
//!
//! A [`MediaTrack`] is a cheap, cloneable reference to one live video or
//! audio track. Clones share state: stopping one clone stops them all.
//! A [`MediaSourceHandle`] groups the tracks returned by one acquisition
//! (e.g. display video plus its system audio).

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::types::{AudioFrame, DisplaySurface, Handle, TrackKind, TrackOrigin, TrackSettings};

/// Capacity of a track's audio feed
const AUDIO_FEED_CAPACITY: usize = 64;

/// Lifecycle status of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// Producing media
    Live,
    /// Stopped by its owner
    Stopped,
    /// Ended by the platform (e.g. the user stopped sharing)
    Ended,
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

struct TrackInner {
    id: Handle,
    kind: TrackKind,
    origin: TrackOrigin,
    label: String,
    settings: TrackSettings,
    status: watch::Sender<TrackStatus>,
    audio_feed: Mutex<Option<broadcast::Sender<Arc<AudioFrame>>>>,
    release_hook: Mutex<Option<ReleaseHook>>,
}

/// Handle to one live track
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    /// Create a live track
    pub fn new(
        kind: TrackKind,
        origin: TrackOrigin,
        label: impl Into<String>,
        settings: TrackSettings,
    ) -> Self {
        let (status, _) = watch::channel(TrackStatus::Live);
        let audio_feed = match kind {
            TrackKind::Audio => Some(broadcast::channel(AUDIO_FEED_CAPACITY).0),
            TrackKind::Video => None,
        };

        Self {
            inner: Arc::new(TrackInner {
                id: Handle::new(),
                kind,
                origin,
                label: label.into(),
                settings,
                status,
                audio_feed: Mutex::new(audio_feed),
                release_hook: Mutex::new(None),
            }),
        }
    }

    /// Create a display video track for the given surface
    pub fn display_video(surface: DisplaySurface) -> Self {
        Self::new(
            TrackKind::Video,
            TrackOrigin::Display,
            format!("screen:{}", surface),
            TrackSettings::display(surface),
        )
    }

    /// Create an audio track
    pub fn audio(origin: TrackOrigin, label: impl Into<String>, settings: TrackSettings) -> Self {
        Self::new(TrackKind::Audio, origin, label, settings)
    }

    /// Register a closure run once when the track stops or ends
    ///
    /// Backends use this to release platform resources (portal sessions,
    /// device streams). If the track is already dead the hook runs at once.
    pub fn on_release(&self, hook: impl FnOnce() + Send + 'static) {
        if self.is_live() {
            *self.inner.release_hook.lock() = Some(Box::new(hook));
        } else {
            hook();
        }
    }

    /// Unique track id
    pub fn id(&self) -> Handle {
        self.inner.id
    }

    /// Track kind
    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    /// Track origin
    pub fn origin(&self) -> TrackOrigin {
        self.inner.origin
    }

    /// Human-readable label
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Settings reported by the platform
    pub fn settings(&self) -> &TrackSettings {
        &self.inner.settings
    }

    /// Current status
    pub fn status(&self) -> TrackStatus {
        *self.inner.status.borrow()
    }

    /// Whether the track is still producing media
    pub fn is_live(&self) -> bool {
        self.status() == TrackStatus::Live
    }

    /// Stop the track
    ///
    /// Returns `true` if this call released the track, `false` if it was
    /// already stopped or ended. Stopping does not fire the termination
    /// signal.
    pub fn stop(&self) -> bool {
        self.transition(TrackStatus::Stopped)
    }

    /// Mark the track as ended by the platform
    ///
    /// Called by capture backends when the user stops sharing from the
    /// platform chrome. Fires the termination signal.
    pub fn end(&self) -> bool {
        self.transition(TrackStatus::Ended)
    }

    fn transition(&self, to: TrackStatus) -> bool {
        let changed = self.inner.status.send_if_modified(|status| {
            if *status == TrackStatus::Live {
                *status = to;
                true
            } else {
                false
            }
        });

        if changed {
            // Dropping the sender closes every subscriber's feed.
            self.inner.audio_feed.lock().take();
            let hook = self.inner.release_hook.lock().take();
            if let Some(hook) = hook {
                hook();
            }
            debug!("Track {} ({}) -> {:?}", self.inner.id, self.inner.label, to);
        }

        changed
    }

    /// Subscribe to this track's audio frames
    ///
    /// Returns `None` for video tracks and for tracks that are no longer live.
    pub fn subscribe_audio(&self) -> Option<broadcast::Receiver<Arc<AudioFrame>>> {
        self.inner.audio_feed.lock().as_ref().map(|tx| tx.subscribe())
    }

    /// Push an audio frame into this track's feed
    ///
    /// Returns the number of subscribers that received it; 0 when nobody
    /// listens or the track is dead.
    pub fn push_audio(&self, frame: AudioFrame) -> usize {
        match self.inner.audio_feed.lock().as_ref() {
            Some(tx) => tx.send(Arc::new(frame)).unwrap_or(0),
            None => 0,
        }
    }

    /// Listener that resolves when the platform ends this track
    pub fn termination_listener(&self) -> TerminationListener {
        TerminationListener {
            track: self.clone(),
            rx: self.inner.status.subscribe(),
        }
    }

    /// Whether two handles refer to the same track
    pub fn same_track(&self, other: &MediaTrack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("origin", &self.inner.origin)
            .field("label", &self.inner.label)
            .field("status", &self.status())
            .finish()
    }
}

/// Waits for a track's external termination
#[derive(Debug)]
pub struct TerminationListener {
    track: MediaTrack,
    rx: watch::Receiver<TrackStatus>,
}

impl TerminationListener {
    /// Resolve once the track has been ended by the platform
    ///
    /// Never resolves if the track is stopped by its owner instead.
    pub async fn ended(&mut self) {
        if self.rx.wait_for(|s| *s == TrackStatus::Ended).await.is_err() {
            // Sender lives inside the track we hold, so this cannot close.
            std::future::pending::<()>().await;
        }
    }

    /// The watched track
    pub fn track(&self) -> &MediaTrack {
        &self.track
    }
}

/// Tracks returned by one acquisition
#[derive(Debug, Clone)]
pub struct MediaSourceHandle {
    id: Handle,
    origin: TrackOrigin,
    tracks: Vec<MediaTrack>,
}

impl MediaSourceHandle {
    /// Group tracks into a source handle
    pub fn new(origin: TrackOrigin, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Handle::new(),
            origin,
            tracks,
        }
    }

    /// Handle id
    pub fn id(&self) -> Handle {
        self.id
    }

    /// Where the tracks came from
    pub fn origin(&self) -> TrackOrigin {
        self.origin
    }

    /// All tracks
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Video tracks
    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    /// Audio tracks
    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    /// First video track, if any
    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.video_tracks().next()
    }

    /// Whether any audio track is still live
    pub fn has_live_audio(&self) -> bool {
        self.audio_tracks().any(|t| t.is_live())
    }

    /// Number of tracks still live
    pub fn live_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    /// Whether any track is still live
    pub fn is_live(&self) -> bool {
        self.live_track_count() > 0
    }

    /// Stop every track that is still live
    ///
    /// Returns the number of tracks this call stopped.
    pub fn stop(&self) -> usize {
        let stopped = self.tracks.iter().filter(|t| t.stop()).count();
        if stopped > 0 {
            info!("Released {} {} track(s)", stopped, self.origin);
        }
        stopped
    }
}

impl Drop for TrackInner {
    fn drop(&mut self) {
        if *self.status.borrow() == TrackStatus::Live {
            warn!("Track {} ({}) dropped while live", self.id, self.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mic_track() -> MediaTrack {
        MediaTrack::audio(
            TrackOrigin::Microphone,
            "mic",
            TrackSettings::audio(AudioFormat::default()),
        )
    }

    #[test]
    fn test_stop_releases_exactly_once() {
        let track = MediaTrack::display_video(DisplaySurface::Monitor);
        let clone = track.clone();

        assert!(track.stop());
        assert!(!clone.stop());
        assert!(!track.end());
        assert_eq!(clone.status(), TrackStatus::Stopped);
    }

    #[test]
    fn test_release_hook_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let track = mic_track();
        let c = count.clone();
        track.on_release(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        track.end();
        track.stop();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_audio_feed_closes_on_stop() {
        let track = mic_track();
        let mut rx = track.subscribe_audio().expect("audio track has a feed");

        assert_eq!(track.push_audio(AudioFrame::new(AudioFormat::default(), vec![0.1, 0.2], 0)), 1);
        track.stop();

        assert!(rx.try_recv().is_ok());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
        assert!(track.subscribe_audio().is_none());
    }

    #[test]
    fn test_video_track_has_no_audio_feed() {
        let track = MediaTrack::display_video(DisplaySurface::Window);
        assert!(track.subscribe_audio().is_none());
        assert_eq!(track.settings().display_surface, Some(DisplaySurface::Window));
    }

    #[test]
    fn test_handle_stop_counts_live_tracks() {
        let video = MediaTrack::display_video(DisplaySurface::Monitor);
        let audio = mic_track();
        let handle = MediaSourceHandle::new(TrackOrigin::Display, vec![video.clone(), audio]);

        video.end();
        assert_eq!(handle.live_track_count(), 1);
        assert_eq!(handle.stop(), 1);
        assert!(!handle.is_live());
    }

    #[tokio::test]
    async fn test_termination_listener_fires_on_end_only() {
        let track = MediaTrack::display_video(DisplaySurface::Monitor);
        let mut listener = track.termination_listener();

        track.end();
        tokio::time::timeout(std::time::Duration::from_secs(1), listener.ended())
            .await
            .expect("listener should resolve after end()");

        let stopped = MediaTrack::display_video(DisplaySurface::Monitor);
        let mut listener = stopped.termination_listener();
        stopped.stop();
        let res =
            tokio::time::timeout(std::time::Duration::from_millis(50), listener.ended()).await;
        assert!(res.is_err(), "stop() must not fire the termination signal");
    }
}
