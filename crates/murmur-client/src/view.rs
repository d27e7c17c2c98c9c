//! Render data handed to the presentation layer.

use serde::Serialize;

use murmur_media::CallSession;
use murmur_shared::{Contact, Message, MessageId};

/// Everything needed to draw the active conversation and the call overlay.
///
/// A fresh snapshot is published after every processed intent and every
/// resolved background operation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub contact: Option<Contact>,
    pub messages: Vec<Message>,
    pub is_typing: bool,
    pub selected: Vec<MessageId>,
    pub editing: Option<MessageId>,
    /// Voice note currently playing back.
    pub playing: Option<MessageId>,
    pub is_recording: bool,
    /// The open call, which may belong to a contact other than the active one.
    pub call: Option<CallSession>,
}

impl SessionView {
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
