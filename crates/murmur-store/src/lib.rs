//! # murmur-store
//!
//! In-memory conversation storage for the murmur client.
//!
//! Every contact gets its own ordered log, created on first reference and
//! kept for the lifetime of the [`MessageStore`]. Besides the messages a
//! log carries the transient per-conversation state the session needs:
//! the set of selected message ids and the message currently being edited.

pub mod log;
pub mod messages;

pub use log::ConversationLog;
pub use messages::MessageStore;
