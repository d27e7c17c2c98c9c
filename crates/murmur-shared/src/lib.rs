//! Types shared by every murmur crate: contact identity, the message
//! record, and the capability traits the pipelines are built on.

pub mod constants;
pub mod message;
pub mod resource;
pub mod types;

pub use message::{FileAttachment, FileClass, Message, MessageBody, VoiceNote};
pub use resource::{FileResource, ResourceFuture};
pub use types::{Author, CallKind, Contact, ContactId, MessageId};
