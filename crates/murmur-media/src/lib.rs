//! Media side of a conversation: microphone capture into voice notes, file
//! attachments, and the call overlay state machine.

pub mod attachment;
pub mod audio;
pub mod call;
pub mod capture;

pub use attachment::{attach, classify, media_type_for_name, FilePreview, LocalFile, MemoryFile};
pub use audio::{AudioCaptureDevice, CaptureConfig, CaptureError, CpalMicrophone, MicrophoneStream};
pub use call::{CallError, CallSession, CallState};
pub use capture::{AcquireFuture, CapturePipeline, CaptureState, VoiceClip};
