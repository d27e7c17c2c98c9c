//! Voice-note recording.
//!
//! The pipeline moves `Idle -> Acquiring -> Recording -> Idle`. Acquisition
//! is split into [`CapturePipeline::begin`] and
//! [`CapturePipeline::finish_acquire`] so an event loop can await the
//! device without holding the pipeline; [`CapturePipeline::start_recording`]
//! does both for callers that can simply await.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use murmur_shared::constants::{VOICE_MESSAGE_LABEL, VOICE_MIME_TYPE};
use murmur_shared::{Author, Message, MessageBody, VoiceNote};

use crate::audio::{AudioCaptureDevice, CaptureConfig, CaptureError, MicrophoneStream};

/// Future resolving to an acquired microphone.
pub type AcquireFuture = BoxFuture<'static, Result<MicrophoneStream, CaptureError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    Acquiring,
    Recording,
}

enum Phase {
    Idle,
    Acquiring,
    Recording(Recording),
}

struct Recording {
    stream: MicrophoneStream,
    chunks: Vec<Bytes>,
    bytes: usize,
}

impl Recording {
    fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.bytes += chunk.len();
        self.chunks.push(chunk);
    }
}

/// Owns the microphone while recording and turns buffered audio into a
/// [`VoiceClip`].
pub struct CapturePipeline {
    device: Arc<dyn AudioCaptureDevice>,
    config: CaptureConfig,
    phase: Phase,
}

impl CapturePipeline {
    pub fn new(device: Arc<dyn AudioCaptureDevice>, config: CaptureConfig) -> Self {
        Self {
            device,
            config,
            phase: Phase::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        match self.phase {
            Phase::Idle => CaptureState::Idle,
            Phase::Acquiring => CaptureState::Acquiring,
            Phase::Recording(_) => CaptureState::Recording,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.phase, Phase::Recording(_))
    }

    /// Start acquiring the microphone.
    ///
    /// Returns `None` (and changes nothing) unless the pipeline is idle, so
    /// a second start never opens a second capture.
    pub fn begin(&mut self) -> Option<AcquireFuture> {
        if !matches!(self.phase, Phase::Idle) {
            debug!(state = ?self.state(), "Recording already in progress");
            return None;
        }
        self.phase = Phase::Acquiring;
        let device = self.device.clone();
        Some(Box::pin(async move { device.acquire().await }))
    }

    /// Complete an acquisition started with [`begin`](Self::begin).
    ///
    /// On error the pipeline goes back to idle with nothing retained.
    pub fn finish_acquire(
        &mut self,
        result: Result<MicrophoneStream, CaptureError>,
    ) -> Result<(), CaptureError> {
        if !matches!(self.phase, Phase::Acquiring) {
            // Nobody is waiting for this stream; dropping it releases it.
            warn!(state = ?self.state(), "Microphone acquired outside of a start request");
            return Ok(());
        }
        match result {
            Ok(stream) => {
                self.phase = Phase::Recording(Recording {
                    stream,
                    chunks: Vec::new(),
                    bytes: 0,
                });
                info!("Voice recording started");
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Idle;
                warn!(error = %e, "Microphone unavailable");
                Err(e)
            }
        }
    }

    /// Acquire the microphone and start buffering. No-op unless idle.
    pub async fn start_recording(&mut self) -> Result<(), CaptureError> {
        let Some(acquire) = self.begin() else {
            return Ok(());
        };
        let result = acquire.await;
        self.finish_acquire(result)
    }

    /// Wait for the next chunk from the device.
    ///
    /// `None` means the device stopped delivering while recording. Pending
    /// forever when not recording.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        match &mut self.phase {
            Phase::Recording(rec) => rec.stream.next_chunk().await,
            _ => std::future::pending().await,
        }
    }

    pub fn push_chunk(&mut self, chunk: Bytes) {
        if let Phase::Recording(rec) = &mut self.phase {
            rec.push(chunk);
        }
    }

    /// Stop recording, release the microphone, and finalize the buffer.
    ///
    /// Returns `None` without side effects when not recording.
    pub fn stop_recording(&mut self) -> Option<VoiceClip> {
        if !self.is_recording() {
            return None;
        }
        let Phase::Recording(mut rec) = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return None;
        };

        for chunk in rec.stream.drain() {
            rec.push(chunk);
        }
        rec.stream.release();

        let clip = VoiceClip::finalize(&rec.chunks, rec.bytes, &self.config);
        info!(
            bytes = rec.bytes,
            duration_secs = clip.duration_secs,
            "Voice recording stopped"
        );
        Some(clip)
    }

    /// The device went away mid-recording: release it and keep what was
    /// captured so far.
    pub fn on_device_lost(&mut self) -> Option<VoiceClip> {
        if self.is_recording() {
            warn!("Microphone lost while recording");
        }
        self.stop_recording()
    }
}

/// A finished recording.
#[derive(Debug, Clone)]
pub struct VoiceClip {
    pub handle: Uuid,
    /// WAV container around the captured PCM.
    pub audio: Bytes,
    pub duration_secs: u32,
}

impl VoiceClip {
    fn finalize(chunks: &[Bytes], pcm_len: usize, config: &CaptureConfig) -> Self {
        let audio = wav_container(chunks, pcm_len, config);
        let per_second = config.bytes_per_second_estimate.max(1);
        let duration_secs = ((pcm_len as f64) / per_second as f64).round() as u32;
        Self {
            handle: Uuid::new_v4(),
            audio,
            duration_secs,
        }
    }

    /// Own-authored voice message carrying this clip.
    pub fn into_message(self) -> Message {
        Message::new(
            Author::Me,
            VOICE_MESSAGE_LABEL,
            MessageBody::Voice(VoiceNote {
                handle: self.handle,
                mime_type: VOICE_MIME_TYPE.to_string(),
                duration_secs: self.duration_secs,
                audio: self.audio,
            }),
        )
    }
}

/// 16-bit PCM WAV: 44-byte RIFF header followed by the samples.
fn wav_container(chunks: &[Bytes], pcm_len: usize, config: &CaptureConfig) -> Bytes {
    let channels = config.channels.max(1);
    let block_align = channels * 2;
    let byte_rate = config.sample_rate * block_align as u32;

    let mut out = BytesMut::with_capacity(44 + pcm_len);
    out.put_slice(b"RIFF");
    out.put_u32_le(36 + pcm_len as u32);
    out.put_slice(b"WAVE");
    out.put_slice(b"fmt ");
    out.put_u32_le(16);
    out.put_u16_le(1);
    out.put_u16_le(channels);
    out.put_u32_le(config.sample_rate);
    out.put_u32_le(byte_rate);
    out.put_u16_le(block_align);
    out.put_u16_le(16);
    out.put_slice(b"data");
    out.put_u32_le(pcm_len as u32);
    for chunk in chunks {
        out.put_slice(chunk);
    }
    out.freeze()
}
