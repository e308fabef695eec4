//! Audio mixing for multiple sources
//!
//! Routes each audio source through a fixed gain stage into one shared
//! destination track:
//!
//! ```text
//! system audio ──▶ gain(g₁) ──┐
//!                             ├──▶ destination ──▶ mixed track
//! microphone   ──▶ gain(g₂) ──┘
//! ```
//!
//! Gains are applied as plain multipliers and stage outputs are summed.
//! Nothing is normalized or limited, so two full-scale sources can clip.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::track::{MediaSourceHandle, MediaTrack};
use crate::types::{AudioFormat, AudioFrame, TrackOrigin, TrackSettings};

/// One source to mix, with its gain
#[derive(Debug, Clone)]
pub struct MixerInput {
    /// Source stream; its first live audio track is used
    pub handle: MediaSourceHandle,
    /// Gain multiplier (1.0 = unity); not clamped
    pub gain: f32,
}

impl MixerInput {
    /// Input at unity gain
    pub fn new(handle: MediaSourceHandle) -> Self {
        Self { handle, gain: 1.0 }
    }

    /// Set the gain
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }
}

/// Builds mixing graphs
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioMixer {
    /// Format advertised by the destination track
    pub output_format: AudioFormat,
}

impl AudioMixer {
    /// Create a mixer whose output advertises `output_format`
    pub fn new(output_format: AudioFormat) -> Self {
        Self { output_format }
    }

    /// Wire `inputs` into a fresh graph
    ///
    /// Inputs without a live audio track are skipped. With nothing left to
    /// connect the result is a silent track, not an error. Must be called
    /// from within a Tokio runtime.
    pub fn mix(&self, inputs: &[MixerInput]) -> MixedAudio {
        let destination = MediaTrack::audio(
            TrackOrigin::Mixer,
            "mixer:destination",
            TrackSettings::audio(self.output_format),
        );

        let (stage_tx, stage_rx) = mpsc::unbounded_channel();
        let mut stages = Vec::new();

        for input in inputs {
            let Some(track) = input.handle.audio_tracks().find(|t| t.is_live()) else {
                debug!(
                    "Skipping {} source {}: no live audio track",
                    input.handle.origin(),
                    input.handle.id()
                );
                continue;
            };
            let Some(rx) = track.subscribe_audio() else {
                continue;
            };

            let index = stages.len();
            let task = tokio::spawn(run_gain_stage(index, rx, input.gain, stage_tx.clone()));
            debug!(
                "Connected {} ({}) -> gain({}) -> destination",
                track.label(),
                input.handle.origin(),
                input.gain
            );
            stages.push(GainStage {
                source: track.clone(),
                gain: input.gain,
                task,
            });
        }
        drop(stage_tx);

        let frames_mixed = Arc::new(AtomicU64::new(0));
        let destination_task = if stages.is_empty() {
            info!("No audio sources to mix, mixer output is silent");
            None
        } else {
            info!("Audio mixer wired with {} source(s)", stages.len());
            Some(tokio::spawn(run_destination(
                stage_rx,
                stages.len(),
                destination.clone(),
                frames_mixed.clone(),
            )))
        };

        MixedAudio {
            destination,
            stages,
            destination_task,
            frames_mixed,
            torn_down: false,
        }
    }
}

/// A source routed through its gain stage
struct GainStage {
    source: MediaTrack,
    gain: f32,
    task: JoinHandle<()>,
}

/// A wired mixing graph and its output track
pub struct MixedAudio {
    destination: MediaTrack,
    stages: Vec<GainStage>,
    destination_task: Option<JoinHandle<()>>,
    frames_mixed: Arc<AtomicU64>,
    torn_down: bool,
}

impl MixedAudio {
    /// The mixed output track
    pub fn track(&self) -> &MediaTrack {
        &self.destination
    }

    /// Whether no source was connected
    pub fn is_silent(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of connected sources
    pub fn source_count(&self) -> usize {
        self.stages.len()
    }

    /// Gains of the connected sources, in connection order
    pub fn gains(&self) -> Vec<f32> {
        self.stages.iter().map(|s| s.gain).collect()
    }

    /// Frames emitted by the destination so far
    pub fn frames_mixed(&self) -> u64 {
        self.frames_mixed.load(Ordering::Relaxed)
    }

    /// Disconnect every stage and release the destination
    ///
    /// Source tracks are left running; they belong to whoever acquired them.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        for stage in &self.stages {
            stage.task.abort();
            trace!("Disconnected {}", stage.source.label());
        }
        if let Some(task) = self.destination_task.take() {
            task.abort();
        }
        self.destination.stop();

        info!(
            "Audio mixer torn down after {} frame(s)",
            self.frames_mixed()
        );
    }
}

impl Drop for MixedAudio {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for MixedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixedAudio")
            .field("destination", &self.destination)
            .field("sources", &self.stages.len())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

enum StageMessage {
    Frame { stage: usize, frame: AudioFrame },
    Closed { stage: usize },
}

/// Scale every frame of one source and forward it to the destination
async fn run_gain_stage(
    stage: usize,
    mut rx: broadcast::Receiver<Arc<AudioFrame>>,
    gain: f32,
    tx: mpsc::UnboundedSender<StageMessage>,
) {
    loop {
        match rx.recv().await {
            Ok(frame) => {
                let scaled = frame.scaled(gain);
                if tx.send(StageMessage::Frame { stage, frame: scaled }).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Gain stage {} dropped {} audio frames due to lag", stage, n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Gain stage {} source closed", stage);
                let _ = tx.send(StageMessage::Closed { stage });
                break;
            }
        }
    }
}

/// Sum one frame per open stage into the output track
async fn run_destination(
    mut rx: mpsc::UnboundedReceiver<StageMessage>,
    stage_count: usize,
    output: MediaTrack,
    frames_mixed: Arc<AtomicU64>,
) {
    let mut pending: Vec<VecDeque<AudioFrame>> = (0..stage_count).map(|_| VecDeque::new()).collect();
    let mut open = vec![true; stage_count];

    while let Some(message) = rx.recv().await {
        match message {
            StageMessage::Frame { stage, frame } => pending[stage].push_back(frame),
            StageMessage::Closed { stage } => open[stage] = false,
        }

        while let Some(mixed) = take_ready(&mut pending, &open) {
            output.push_audio(mixed);
            frames_mixed.fetch_add(1, Ordering::Relaxed);
        }

        if open.iter().all(|o| !o) {
            break;
        }
    }

    debug!("Mixer destination drained");
}

/// Pop and sum one frame per stage once every open stage has one queued
fn take_ready(pending: &mut [VecDeque<AudioFrame>], open: &[bool]) -> Option<AudioFrame> {
    let ready = pending
        .iter()
        .zip(open)
        .all(|(queue, open)| !queue.is_empty() || !open);
    if !ready || pending.iter().all(|q| q.is_empty()) {
        return None;
    }

    let frames: Vec<AudioFrame> = pending.iter_mut().filter_map(|q| q.pop_front()).collect();
    sum_frames(&frames)
}

/// Sample-wise sum of already-scaled frames
///
/// The shorter frames are padded with silence. The result takes the first
/// frame's format and the earliest timestamp.
pub fn sum_frames(frames: &[AudioFrame]) -> Option<AudioFrame> {
    let first = frames.first()?;
    let max_len = frames.iter().map(|f| f.samples.len()).max().unwrap_or(0);

    let mut samples = vec![0.0f32; max_len];
    for frame in frames {
        for (out, sample) in samples.iter_mut().zip(&frame.samples) {
            *out += sample;
        }
    }

    let pts = frames.iter().map(|f| f.pts).min().unwrap_or(first.pts);
    Some(AudioFrame::new(first.format, samples, pts))
}
