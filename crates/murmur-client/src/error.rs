use thiserror::Error;

use murmur_media::{CallError, CaptureError};

/// Errors surfaced to the presentation layer.
///
/// Reply backend failures never appear here; they turn into the fallback
/// notice inside the conversation.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No contact selected")]
    NoActiveContact,

    #[error("Recording failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Call error: {0}")]
    Call(#[from] CallError),

    /// The session event loop is gone.
    #[error("Session closed")]
    Closed,
}
