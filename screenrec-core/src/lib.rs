//! screenrec Core Library
//!
//! Whole-screen recording sessions with mixed microphone and system audio.
//!
//! This library provides:
//! - Display and microphone acquisition with whole-screen validation
//! - A gain-stage audio mixer feeding one output track
//! - A recording session that buffers encoder chunks into one artifact
//! - A lifecycle controller reacting to start, stop and share-ended signals
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐    ┌─────────────┐    ┌──────────┐    ┌──────────────────┐
//! │ CaptureSource  │───▶│ AudioMixer  │───▶│ compose  │───▶│ RecordingSession │──▶ Artifact
//! │ (display, mic) │    │ (gain + sum)│    │          │    │ (encoder chunks) │
//! └────────────────┘    └─────────────┘    └──────────┘    └──────────────────┘
//!          ▲                                                        │
//!          └──────────────── LifecycleController ◀──────────────────┘
//! ```
//!
//! Capture and encoding are platform primitives behind the
//! [`capture::CaptureBackend`] and [`encode::EncoderFactory`] traits.

pub mod capture;
pub mod config;
pub mod encode;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod types;

pub use capture::{CaptureBackend, CaptureSource, MediaSourceHandle, MediaTrack};
pub use config::{AudioStrategy, CaptureRequest, NamingPolicy};
pub use error::{CaptureError, RecorderError, Result, SessionError};
pub use output::Artifact;
pub use pipeline::{Affordances, LifecycleController};
pub use session::{RecorderEvent, RecordingSession, SessionOutcome, SessionState};
pub use types::{DisplaySurface, Handle, TrackKind, TrackOrigin};
