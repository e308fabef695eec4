//! Error types for screenrec

use thiserror::Error;

use crate::types::DisplaySurface;

/// Result type alias using RecorderError
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Failures while acquiring capture streams
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// Permission refused or picker dialog dismissed
    #[error("Capture permission denied: {0}")]
    UserDenied(String),

    /// The user picked something other than a whole screen
    #[error("Display surface must be 'monitor', got '{selected}'")]
    WrongSurface {
        /// Surface the user actually selected
        selected: DisplaySurface,
    },

    /// Capture primitives are not available on this platform
    #[error("Capture unavailable: {0}")]
    PlatformUnavailable(String),
}

impl CaptureError {
    /// Create a user-denied error
    pub fn denied(msg: impl Into<String>) -> Self {
        Self::UserDenied(msg.into())
    }

    /// Create a platform-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::PlatformUnavailable(msg.into())
    }
}

/// Failures of a recording session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The composed stream had no live tracks at start time
    #[error("Composed stream has no tracks")]
    NoTracks,

    /// The encoder reported an error while recording
    #[error("Encoder failure: {0}")]
    EncoderFailure(String),
}

impl SessionError {
    /// Create an encoder failure
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::EncoderFailure(msg.into())
    }
}

/// Main error type for screenrec operations
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Capture acquisition failed
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Recording session failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No recording session is active
    #[error("No active recording session")]
    NoActiveSession,

    /// A session is already running
    #[error("Recording session already running")]
    SessionAlreadyRunning,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error with added context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RecorderError>,
    },
}

impl RecorderError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with context layers removed
    pub fn root(&self) -> &RecorderError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// A short hint telling the user what to do about this error
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::Capture(CaptureError::UserDenied(_)) => {
                Some("Allow screen capture in the permission dialog and try again")
            }
            Self::Capture(CaptureError::WrongSurface { .. }) => {
                Some("Select an entire screen, not a window or browser tab")
            }
            Self::Capture(CaptureError::PlatformUnavailable(_)) => {
                Some("Screen capture is not supported here; check that xdg-desktop-portal is running")
            }
            Self::Session(SessionError::NoTracks) => {
                Some("The shared screen ended before recording started; start a new recording")
            }
            Self::Session(SessionError::EncoderFailure(_)) => {
                Some("The recording was discarded; start a new recording")
            }
            Self::Config(_) => Some("Check ~/.config/screenrec/config.toml"),
            Self::SessionAlreadyRunning => Some("Stop the current recording first"),
            Self::NoActiveSession | Self::Io(_) | Self::WithContext { .. } => None,
        }
    }

    /// Whether retrying (possibly after user action) can succeed
    pub fn is_user_recoverable(&self) -> bool {
        match self.root() {
            Self::Capture(CaptureError::PlatformUnavailable(_)) => false,
            Self::Io(_) => false,
            _ => true,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<RecorderError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(all(feature = "portal", target_os = "linux"))]
impl From<ashpd::Error> for CaptureError {
    fn from(err: ashpd::Error) -> Self {
        match err {
            ashpd::Error::Response(ashpd::desktop::ResponseError::Cancelled) => {
                Self::UserDenied("Screen selection cancelled".to_string())
            }
            other => Self::PlatformUnavailable(other.to_string()),
        }
    }
}
