//! Configuration types for screenrec
//!
//! Provides the capture request, audio constraints and session hints
//! handed to capture backends, plus file-based defaults.

pub mod file;

pub use file::{sample_config, ConfigFile};

use serde::{Deserialize, Serialize};

use crate::error::{RecorderError, Result};
use crate::types::DisplaySurface;

/// How audio is sourced for a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AudioStrategy {
    /// System audio from the display capture plus a separately requested
    /// microphone, mixed into one track
    #[default]
    SeparateMicAndSystemAudio,
    /// Whatever audio the display capture returns, recorded as-is
    CombinedDisplayAudio,
    /// System audio from the display capture only, through the mixer
    SystemAudioOnly,
}

impl AudioStrategy {
    /// Whether a separate microphone stream is requested
    pub fn requests_microphone(&self) -> bool {
        matches!(self, Self::SeparateMicAndSystemAudio)
    }

    /// Whether audio goes through the mixer graph
    pub fn uses_mixer(&self) -> bool {
        !matches!(self, Self::CombinedDisplayAudio)
    }
}

impl std::fmt::Display for AudioStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SeparateMicAndSystemAudio => write!(f, "separate-mic-and-system-audio"),
            Self::CombinedDisplayAudio => write!(f, "combined-display-audio"),
            Self::SystemAudioOnly => write!(f, "system-audio-only"),
        }
    }
}

impl std::str::FromStr for AudioStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "separate-mic-and-system-audio" | "mixed" | "both" => {
                Ok(Self::SeparateMicAndSystemAudio)
            }
            "combined-display-audio" | "combined" | "display" => Ok(Self::CombinedDisplayAudio),
            "system-audio-only" | "system" | "desktop" => Ok(Self::SystemAudioOnly),
            _ => Err(format!("Unknown audio strategy: {}", s)),
        }
    }
}

/// Include/exclude hint passed to the capture picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Inclusion {
    #[default]
    Include,
    Exclude,
}

impl Inclusion {
    pub fn is_included(&self) -> bool {
        matches!(self, Self::Include)
    }
}

/// Audio processing constraints for a capture request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioConstraints {
    /// Enable echo cancellation
    pub echo_cancellation: bool,
    /// Enable noise suppression
    pub noise_suppression: bool,
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Mute local playback of captured system audio while recording
    pub suppress_local_audio_playback: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 44100,
            suppress_local_audio_playback: true,
        }
    }
}

/// Hints for the platform capture picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHints {
    /// Allow switching the shared surface during capture
    pub surface_switching: Inclusion,
    /// Offer this application's own surface in the picker
    pub self_browser_surface: Inclusion,
    /// Offer system audio alongside the display
    pub system_audio: Inclusion,
}

impl Default for SessionHints {
    fn default() -> Self {
        Self {
            surface_switching: Inclusion::Include,
            self_browser_surface: Inclusion::Exclude,
            system_audio: Inclusion::Include,
        }
    }
}

/// Per-source gain applied by the mixer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixerGains {
    /// Gain for system audio (1.0 = unity)
    pub system: f32,
    /// Gain for the microphone (1.0 = unity)
    pub microphone: f32,
}

impl Default for MixerGains {
    fn default() -> Self {
        Self {
            system: 1.0,
            microphone: 1.0,
        }
    }
}

/// How artifact file names get their extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NamingPolicy {
    /// Extension follows the encoder's negotiated container type
    #[default]
    FromContainer,
    /// Always `.mp4`, whatever the container
    LegacyMp4,
}

/// Complete description of what to capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// Surface the user must pick (only `Monitor` is accepted)
    pub surface: DisplaySurface,
    /// Constraints for the display's system audio
    pub display_audio: AudioConstraints,
    /// Constraints for the separate microphone stream
    pub microphone: AudioConstraints,
    /// Picker hints
    pub hints: SessionHints,
    /// Audio sourcing strategy
    pub strategy: AudioStrategy,
    /// Mixer gains
    pub gains: MixerGains,
    /// Artifact naming policy
    pub naming: NamingPolicy,
    /// Preferred container MIME type (encoder may negotiate another)
    pub mime_type: Option<String>,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self::new(AudioStrategy::default())
    }
}

impl CaptureRequest {
    /// Whole-screen request with the given audio strategy
    pub fn new(strategy: AudioStrategy) -> Self {
        let microphone = AudioConstraints {
            suppress_local_audio_playback: false,
            ..AudioConstraints::default()
        };

        Self {
            surface: DisplaySurface::Monitor,
            display_audio: AudioConstraints::default(),
            microphone,
            hints: SessionHints::default(),
            strategy,
            gains: MixerGains::default(),
            naming: NamingPolicy::default(),
            mime_type: None,
        }
    }

    /// Set the audio strategy
    pub fn with_strategy(mut self, strategy: AudioStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the display audio constraints
    pub fn with_display_audio(mut self, constraints: AudioConstraints) -> Self {
        self.display_audio = constraints;
        self
    }

    /// Set the microphone constraints
    pub fn with_microphone(mut self, constraints: AudioConstraints) -> Self {
        self.microphone = constraints;
        self
    }

    /// Set the picker hints
    pub fn with_hints(mut self, hints: SessionHints) -> Self {
        self.hints = hints;
        self
    }

    /// Set the system audio gain
    pub fn with_system_gain(mut self, gain: f32) -> Self {
        self.gains.system = gain;
        self
    }

    /// Set the microphone gain
    pub fn with_mic_gain(mut self, gain: f32) -> Self {
        self.gains.microphone = gain;
        self
    }

    /// Set local playback suppression for captured system audio
    pub fn with_suppress_local_audio_playback(mut self, suppress: bool) -> Self {
        self.display_audio.suppress_local_audio_playback = suppress;
        self
    }

    /// Set the artifact naming policy
    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    /// Set the preferred container MIME type
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// Validate and return non-fatal warnings
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.strategy != AudioStrategy::CombinedDisplayAudio
            && !self.hints.system_audio.is_included()
        {
            warnings.push(format!(
                "Audio strategy {} uses system audio, but the picker is asked to exclude it",
                self.strategy
            ));
        }

        for (name, gain) in [
            ("system", self.gains.system),
            ("microphone", self.gains.microphone),
        ] {
            if gain.is_finite() && !(0.0..=1.0).contains(&gain) {
                warnings.push(format!(
                    "{} gain {} is outside 0.0-1.0; mixed audio may clip",
                    name, gain
                ));
            }
        }

        warnings
    }

    /// Validate, failing on settings no backend can honor
    pub fn validate_strict(&self) -> Result<Vec<String>> {
        if self.surface != DisplaySurface::Monitor {
            return Err(RecorderError::config(format!(
                "Only whole-screen capture is supported, got surface '{}'",
                self.surface
            )));
        }

        for constraints in [&self.display_audio, &self.microphone] {
            if constraints.sample_rate == 0 {
                return Err(RecorderError::config("Sample rate must be non-zero"));
            }
        }

        if !self.gains.system.is_finite() || !self.gains.microphone.is_finite() {
            return Err(RecorderError::config("Mixer gains must be finite numbers"));
        }

        if let Some(mime) = &self.mime_type {
            if !mime.contains('/') {
                return Err(RecorderError::config(format!(
                    "Invalid MIME type: {}",
                    mime
                )));
            }
        }

        Ok(self.validate())
    }
}
