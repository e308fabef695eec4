//! Configuration file loading
//!
//! Loads user defaults from `~/.config/screenrec/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{
    AudioConstraints, AudioStrategy, CaptureRequest, Inclusion, MixerGains, NamingPolicy,
    SessionHints,
};
use crate::error::{RecorderError, Result};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Capture picker settings
    #[serde(default)]
    pub capture: CaptureSettings,

    /// System audio constraints
    #[serde(default)]
    pub audio: AudioSettings,

    /// Microphone constraints
    #[serde(default)]
    pub microphone: MicrophoneSettings,

    /// Mixer gains
    #[serde(default)]
    pub mixer: MixerSettings,

    /// Artifact settings
    #[serde(default)]
    pub output: OutputSettings,
}

/// Capture picker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Audio strategy (separate-mic-and-system-audio, combined-display-audio, system-audio-only)
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Allow switching the shared surface mid-capture
    #[serde(default = "default_include")]
    pub surface_switching: Inclusion,

    /// Offer our own surface in the picker
    #[serde(default = "default_exclude")]
    pub self_browser_surface: Inclusion,

    /// Offer system audio in the picker
    #[serde(default = "default_include")]
    pub system_audio: Inclusion,
}

/// System audio constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    #[serde(default = "default_true")]
    pub echo_cancellation: bool,

    #[serde(default = "default_true")]
    pub noise_suppression: bool,

    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Mute local playback of captured system audio
    #[serde(default = "default_true")]
    pub suppress_local_audio_playback: bool,
}

/// Microphone constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrophoneSettings {
    #[serde(default = "default_true")]
    pub echo_cancellation: bool,

    #[serde(default = "default_true")]
    pub noise_suppression: bool,

    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

/// Mixer gains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerSettings {
    /// System audio gain (1.0 = unity)
    #[serde(default = "default_gain")]
    pub system_gain: f32,

    /// Microphone gain (1.0 = unity)
    #[serde(default = "default_gain")]
    pub mic_gain: f32,
}

/// Artifact settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Preferred container MIME type (empty = encoder default)
    #[serde(default)]
    pub mime_type: String,

    /// File naming policy (from-container, legacy-mp4)
    #[serde(default)]
    pub naming: NamingPolicy,
}

fn default_strategy() -> String {
    AudioStrategy::default().to_string()
}

fn default_include() -> Inclusion {
    Inclusion::Include
}

fn default_exclude() -> Inclusion {
    Inclusion::Exclude
}

fn default_true() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_gain() -> f32 {
    1.0
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            surface_switching: Inclusion::Include,
            self_browser_surface: Inclusion::Exclude,
            system_audio: Inclusion::Include,
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: default_sample_rate(),
            suppress_local_audio_playback: true,
        }
    }
}

impl Default for MicrophoneSettings {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: default_sample_rate(),
        }
    }
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            system_gain: default_gain(),
            mic_gain: default_gain(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("screenrec").join("config.toml")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".config").join("screenrec").join("config.toml")
        } else {
            PathBuf::from("/etc/screenrec/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| RecorderError::config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| RecorderError::config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RecorderError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RecorderError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| RecorderError::config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Build a capture request from these settings
    pub fn to_request(&self) -> Result<CaptureRequest> {
        let strategy: AudioStrategy = self
            .capture
            .strategy
            .parse()
            .map_err(RecorderError::config)?;

        let mut request = CaptureRequest::new(strategy)
            .with_hints(SessionHints {
                surface_switching: self.capture.surface_switching,
                self_browser_surface: self.capture.self_browser_surface,
                system_audio: self.capture.system_audio,
            })
            .with_display_audio(AudioConstraints {
                echo_cancellation: self.audio.echo_cancellation,
                noise_suppression: self.audio.noise_suppression,
                sample_rate: self.audio.sample_rate,
                suppress_local_audio_playback: self.audio.suppress_local_audio_playback,
            })
            .with_microphone(AudioConstraints {
                echo_cancellation: self.microphone.echo_cancellation,
                noise_suppression: self.microphone.noise_suppression,
                sample_rate: self.microphone.sample_rate,
                suppress_local_audio_playback: false,
            })
            .with_naming(self.output.naming);

        request.gains = MixerGains {
            system: self.mixer.system_gain,
            microphone: self.mixer.mic_gain,
        };

        if !self.output.mime_type.is_empty() {
            request = request.with_mime_type(self.output.mime_type.clone());
        }

        for warning in request.validate_strict()? {
            warn!("{}", warning);
        }

        Ok(request)
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# screenrec configuration

[capture]
# Audio strategy: separate-mic-and-system-audio, combined-display-audio, system-audio-only
strategy = "separate-mic-and-system-audio"

# Picker hints: include or exclude
surface_switching = "include"
self_browser_surface = "exclude"
system_audio = "include"

[audio]
# Constraints for system audio captured with the screen
echo_cancellation = true
noise_suppression = true
sample_rate = 44100

# Mute local playback of captured system audio while recording
suppress_local_audio_playback = true

[microphone]
echo_cancellation = true
noise_suppression = true
sample_rate = 44100

[mixer]
# Gains are applied as-is; sources are summed without normalization
system_gain = 1.0
mic_gain = 1.0

[output]
# Preferred container type; empty lets the encoder choose
mime_type = ""

# File extension policy: from-container, legacy-mp4
naming = "from-container"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.capture.strategy, "separate-mic-and-system-audio");
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.mixer.mic_gain, 1.0);
    }

    #[test]
    fn test_sample_config_parses() {
        let config: ConfigFile = toml::from_str(&sample_config()).unwrap();
        assert_eq!(config.capture.self_browser_surface, Inclusion::Exclude);
        assert_eq!(config.output.naming, NamingPolicy::FromContainer);
    }

    #[test]
    fn test_to_request_rejects_unknown_strategy() {
        let mut config = ConfigFile::default();
        config.capture.strategy = "surround".to_string();
        assert!(config.to_request().is_err());
    }
}
