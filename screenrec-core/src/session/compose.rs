//! Assembly of the stream handed to the encoder

use crate::capture::{MediaSourceHandle, MediaTrack};
use crate::types::Handle;

/// The tracks an encoder records: one video, at most one audio
#[derive(Debug, Clone)]
pub struct ComposedStream {
    id: Handle,
    video: Option<MediaTrack>,
    audio: Option<MediaTrack>,
}

impl ComposedStream {
    pub fn id(&self) -> Handle {
        self.id
    }

    /// The video track
    pub fn video(&self) -> Option<&MediaTrack> {
        self.video.as_ref()
    }

    /// The audio track, if any
    pub fn audio(&self) -> Option<&MediaTrack> {
        self.audio.as_ref()
    }

    /// All tracks, video first
    pub fn tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.video.iter().chain(self.audio.iter())
    }

    /// Number of tracks that are still live
    pub fn live_track_count(&self) -> usize {
        self.tracks().filter(|t| t.is_live()).count()
    }

    /// Whether there is nothing live to record
    pub fn is_empty(&self) -> bool {
        self.live_track_count() == 0
    }
}

/// Collect the display's video track and the optional audio track
pub fn compose(video: &MediaSourceHandle, audio: Option<&MediaTrack>) -> ComposedStream {
    ComposedStream {
        id: Handle::new(),
        video: video.video_track().cloned(),
        audio: audio.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioFormat, DisplaySurface, TrackKind, TrackOrigin, TrackSettings};

    #[test]
    fn test_compose_one_video_one_audio() {
        let video = MediaTrack::display_video(DisplaySurface::Monitor);
        let system = MediaTrack::audio(
            TrackOrigin::Display,
            "system",
            TrackSettings::audio(AudioFormat::default()),
        );
        let display = MediaSourceHandle::new(TrackOrigin::Display, vec![video, system.clone()]);

        let stream = compose(&display, Some(&system));
        assert_eq!(stream.live_track_count(), 2);
        assert_eq!(stream.video().map(|t| t.kind()), Some(TrackKind::Video));
        assert!(stream.audio().is_some_and(|a| a.same_track(&system)));

        display.stop();
        assert!(stream.is_empty());
    }

    #[test]
    fn test_compose_without_audio() {
        let display = MediaSourceHandle::new(
            TrackOrigin::Display,
            vec![MediaTrack::display_video(DisplaySurface::Monitor)],
        );
        let stream = compose(&display, None);
        assert_eq!(stream.tracks().count(), 1);
        assert!(stream.audio().is_none());
        display.stop();
    }
}
