//! Core types for screenrec
//!
//! These types describe tracks, surfaces and audio frames as they move
//! through the capture, mixing and recording stages.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique track/session IDs
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a track or session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Create a new unique handle
    pub fn new() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// Where a track came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOrigin {
    /// Display capture (screen video and system audio)
    Display,
    /// Microphone input
    Microphone,
    /// Synthetic track produced by the audio mixer
    Mixer,
}

impl std::fmt::Display for TrackOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackOrigin::Display => write!(f, "display"),
            TrackOrigin::Microphone => write!(f, "microphone"),
            TrackOrigin::Mixer => write!(f, "mixer"),
        }
    }
}

/// Kind of display surface a capture represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySurface {
    /// Full monitor/display capture
    #[default]
    Monitor,
    /// Individual window capture
    Window,
    /// A single browser tab
    Browser,
}

impl std::fmt::Display for DisplaySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplaySurface::Monitor => write!(f, "monitor"),
            DisplaySurface::Window => write!(f, "window"),
            DisplaySurface::Browser => write!(f, "browser"),
        }
    }
}

impl std::str::FromStr for DisplaySurface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monitor" | "screen" | "fullscreen" => Ok(Self::Monitor),
            "window" => Ok(Self::Window),
            "browser" | "tab" => Ok(Self::Browser),
            _ => Err(format!("Unknown display surface: {}", s)),
        }
    }
}

/// Settings reported by a live track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSettings {
    /// Surface type of a display video track
    pub display_surface: Option<DisplaySurface>,
    /// Video dimensions (width, height), if known
    pub dimensions: Option<(u32, u32)>,
    /// Audio sample rate in Hz, if known
    pub sample_rate: Option<u32>,
    /// Number of audio channels, if known
    pub channels: Option<u32>,
}

impl TrackSettings {
    /// Settings for a display video track
    pub fn display(surface: DisplaySurface) -> Self {
        Self {
            display_surface: Some(surface),
            ..Default::default()
        }
    }

    /// Settings for an audio track
    pub fn audio(format: AudioFormat) -> Self {
        Self {
            sample_rate: Some(format.sample_rate),
            channels: Some(format.channels),
            ..Default::default()
        }
    }

    /// Set the video dimensions
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }
}

/// Audio sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioSampleFormat {
    /// 32-bit floating point, little-endian (interleaved)
    #[default]
    F32LE,
    /// 16-bit signed integer, little-endian (interleaved)
    S16LE,
}

/// Audio format information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz (e.g., 44100)
    pub sample_rate: u32,
    /// Number of channels (1=mono, 2=stereo)
    pub channels: u32,
    /// Audio sample format
    pub format: AudioSampleFormat,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            format: AudioSampleFormat::F32LE,
        }
    }
}

/// Audio frame data
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Audio format
    pub format: AudioFormat,
    /// Interleaved samples as f32
    pub samples: Vec<f32>,
    /// Presentation timestamp in nanoseconds
    pub pts: u64,
    /// Number of samples per channel
    pub sample_count: u32,
}

impl AudioFrame {
    /// Create a new audio frame
    pub fn new(format: AudioFormat, samples: Vec<f32>, pts: u64) -> Self {
        let sample_count = (samples.len() / format.channels.max(1) as usize) as u32;
        Self {
            format,
            samples,
            pts,
            sample_count,
        }
    }

    /// Duration of this frame in nanoseconds
    pub fn duration_ns(&self) -> u64 {
        if self.format.sample_rate == 0 {
            return 0;
        }
        (self.sample_count as u64 * 1_000_000_000) / self.format.sample_rate as u64
    }

    /// Copy of this frame with every sample multiplied by `gain`
    pub fn scaled(&self, gain: f32) -> Self {
        let samples = if gain == 1.0 {
            self.samples.clone()
        } else {
            self.samples.iter().map(|s| s * gain).collect()
        };

        Self {
            format: self.format,
            samples,
            pts: self.pts,
            sample_count: self.sample_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let a = Handle::new();
        let b = Handle::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_display_surface_parse() {
        assert_eq!("monitor".parse::<DisplaySurface>(), Ok(DisplaySurface::Monitor));
        assert_eq!("tab".parse::<DisplaySurface>(), Ok(DisplaySurface::Browser));
        assert_eq!("Window".parse::<DisplaySurface>(), Ok(DisplaySurface::Window));
        assert!("desk".parse::<DisplaySurface>().is_err());
    }

    #[test]
    fn test_audio_frame_duration() {
        let frame = AudioFrame::new(AudioFormat::default(), vec![0.0; 882], 0);
        assert_eq!(frame.sample_count, 441);
        assert_eq!(frame.duration_ns(), 10_000_000);
    }

    #[test]
    fn test_scaled_is_not_clamped() {
        let frame = AudioFrame::new(AudioFormat::default(), vec![0.8, -0.8], 7);
        let louder = frame.scaled(2.0);
        assert_eq!(louder.samples, vec![1.6, -1.6]);
        assert_eq!(louder.pts, 7);
    }
}
