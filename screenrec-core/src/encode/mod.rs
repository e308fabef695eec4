//! Platform encoder seam
//!
//! Container encoding is done by the platform. screenrec only drives an
//! encoder through [`MediaEncoder`] and consumes the events it emits:
//!
//! - zero or more [`EncoderEvent::DataAvailable`] chunks, in production order
//! - then exactly one [`EncoderEvent::Stopped`] after `stop()` is called,
//!   delivered after every chunk of the session
//! - or an [`EncoderEvent::Error`] at any point, which ends the session

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{CaptureError, SessionError};
use crate::session::ComposedStream;

/// Default container type when the encoder doesn't negotiate one
pub const DEFAULT_MIME_TYPE: &str = "video/webm";

/// Event emitted by a running encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// A chunk of encoded data is ready
    DataAvailable(Bytes),
    /// The encoder finished after a stop request
    Stopped,
    /// The encoder failed
    Error(String),
}

/// Sender half handed to an encoder on start
pub type EncoderEventSender = mpsc::UnboundedSender<EncoderEvent>;

/// Receiver half owned by the recording session
pub type EncoderEventReceiver = mpsc::UnboundedReceiver<EncoderEvent>;

/// Create the event channel for one session
pub fn event_channel() -> (EncoderEventSender, EncoderEventReceiver) {
    mpsc::unbounded_channel()
}

/// A platform encoder recording one composed stream
pub trait MediaEncoder: Send {
    /// Negotiated container MIME type (e.g. `video/webm;codecs=vp9`)
    fn mime_type(&self) -> &str;

    /// Begin encoding `stream`, reporting through `events`
    fn start(
        &mut self,
        stream: &ComposedStream,
        events: EncoderEventSender,
    ) -> Result<(), SessionError>;

    /// Ask the encoder to flush and stop
    ///
    /// Completion is reported asynchronously with [`EncoderEvent::Stopped`].
    fn stop(&mut self);
}

/// Creates an encoder per session
pub trait EncoderFactory: Send + Sync {
    /// Create an encoder for `stream`, preferring `mime_type` if given
    ///
    /// A platform without recording support returns
    /// [`CaptureError::PlatformUnavailable`].
    fn create(
        &self,
        stream: &ComposedStream,
        mime_type: Option<&str>,
    ) -> Result<Box<dyn MediaEncoder>, CaptureError>;
}

/// The base type of a MIME string, lowercased and without parameters
pub fn base_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_lowercase()
}

/// File extension for a container MIME type
pub fn extension_for_mime(mime: &str) -> &'static str {
    match base_mime(mime).as_str() {
        "video/webm" | "audio/webm" => "webm",
        "video/mp4" | "audio/mp4" => "mp4",
        "video/x-matroska" | "video/matroska" => "mkv",
        "video/quicktime" => "mov",
        "video/ogg" | "audio/ogg" => "ogg",
        "video/x-msvideo" => "avi",
        _ => "bin",
    }
}
