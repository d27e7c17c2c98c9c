use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use murmur_shared::constants::VOICE_BYTES_PER_SECOND;

/// Number of encoded frames buffered between the audio callback and the
/// capture pipeline before frames start being dropped.
const CHUNK_CHANNEL_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Microphone access denied")]
    PermissionDenied,

    #[error("No input device available")]
    NoInputDevice,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_size_ms: u32,
    /// Divisor for the duration estimate of a finished recording.
    pub bytes_per_second_estimate: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            frame_size_ms: 20,
            bytes_per_second_estimate: VOICE_BYTES_PER_SECOND,
        }
    }
}

impl CaptureConfig {
    pub fn frame_size_samples(&self) -> usize {
        (self.sample_rate as usize * self.frame_size_ms as usize * self.channels as usize) / 1000
    }
}

/// Exclusive access to a microphone.
///
/// Implementations hand out a [`MicrophoneStream`]; the device stays held
/// until that stream is released or dropped.
pub trait AudioCaptureDevice: Send + Sync {
    fn acquire(&self) -> BoxFuture<'_, Result<MicrophoneStream, CaptureError>>;
}

/// An acquired microphone delivering encoded audio chunks.
///
/// The chunk channel closing while the stream is still held means the
/// device went away underneath us.
pub struct MicrophoneStream {
    chunks: mpsc::Receiver<Bytes>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl MicrophoneStream {
    pub fn new(chunks: mpsc::Receiver<Bytes>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            chunks,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next chunk. `None` once the device stopped delivering.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.chunks.recv().await
    }

    /// Take every chunk already delivered without waiting.
    pub fn drain(&mut self) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        while let Ok(chunk) = self.chunks.try_recv() {
            chunks.push(chunk);
        }
        chunks
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Give the device back. Dropping the stream does the same.
    pub fn release(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            self.chunks.close();
            release();
        }
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for MicrophoneStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrophoneStream")
            .field("released", &self.is_released())
            .finish()
    }
}

/// The default system input device via cpal.
///
/// cpal streams cannot move between threads, so each acquisition runs the
/// stream on its own thread which drops it when the [`MicrophoneStream`]
/// is released.
#[derive(Debug, Clone, Default)]
pub struct CpalMicrophone {
    config: CaptureConfig,
}

impl CpalMicrophone {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl AudioCaptureDevice for CpalMicrophone {
    fn acquire(&self) -> BoxFuture<'_, Result<MicrophoneStream, CaptureError>> {
        let config = self.config.clone();
        Box::pin(async move {
            let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
            let (ready_tx, ready_rx) = oneshot::channel();
            let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

            std::thread::Builder::new()
                .name("murmur-microphone".into())
                .spawn(move || run_input_stream(config, chunk_tx, ready_tx, release_rx))
                .map_err(|e| CaptureError::Device(e.to_string()))?;

            ready_rx
                .await
                .map_err(|_| CaptureError::Device("capture thread exited".into()))??;

            Ok::<_, CaptureError>(MicrophoneStream::new(chunk_rx, move || {
                let _ = release_tx.send(());
            }))
        })
    }
}

/// Body of the capture thread: open the stream, report readiness, then
/// hold the stream until released.
fn run_input_stream(
    config: CaptureConfig,
    chunk_tx: mpsc::Sender<Bytes>,
    ready: oneshot::Sender<Result<(), CaptureError>>,
    release_rx: std::sync::mpsc::Receiver<()>,
) {
    let stream = match open_input_stream(&config, chunk_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(())).is_err() {
        return;
    }

    // Returns on release or when the MicrophoneStream is dropped.
    let _ = release_rx.recv();
    drop(stream);
    debug!("Microphone released");
}

fn open_input_stream(
    config: &CaptureConfig,
    chunk_tx: mpsc::Sender<Bytes>,
) -> Result<cpal::Stream, CaptureError> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::NoInputDevice)?;

    info!(device = ?device.name(), "Using input device");

    let stream_config = cpal::StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let frame_bytes = config.frame_size_samples() * 2;
    let mut pending: Vec<u8> = Vec::with_capacity(frame_bytes);

    // The error callback drops the sender so the pipeline sees the channel
    // close and treats it as device loss.
    let sender = Arc::new(Mutex::new(Some(chunk_tx)));
    let data_sender = sender.clone();

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                for sample in data {
                    let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    pending.extend_from_slice(&pcm.to_le_bytes());
                }
                if pending.len() < frame_bytes {
                    return;
                }
                let chunk = Bytes::from(std::mem::take(&mut pending));
                let guard = data_sender.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(tx) = guard.as_ref() {
                    if tx.try_send(chunk).is_err() {
                        warn!("Capture chunk channel full, dropping frame");
                    }
                }
            },
            move |err| {
                error!("Audio input error: {err}");
                sender.lock().unwrap_or_else(PoisonError::into_inner).take();
            },
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoInputDevice,
            other => CaptureError::Stream(other.to_string()),
        })?;

    stream
        .play()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    debug!("Audio capture started");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_frame_size() {
        let config = CaptureConfig::default();
        assert_eq!(config.frame_size_samples(), 960);
    }

    #[tokio::test]
    async fn test_release_runs_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let (_tx, rx) = mpsc::channel(4);
        let stream = MicrophoneStream::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        stream.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let (_tx, rx) = mpsc::channel(4);
        {
            let _stream = MicrophoneStream::new(rx, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drain_and_closed_channel() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = MicrophoneStream::new(rx, || {});
        tx.try_send(Bytes::from_static(b"ab")).unwrap();
        tx.try_send(Bytes::from_static(b"cd")).unwrap();

        assert_eq!(stream.drain().len(), 2);
        drop(tx);
        assert!(stream.next_chunk().await.is_none());
    }
}
