use std::collections::HashMap;

use tracing::debug;

use murmur_shared::{ContactId, Message, MessageBody, MessageId};

use crate::log::ConversationLog;

/// Per-contact message logs keyed by [`ContactId`].
#[derive(Debug, Default)]
pub struct MessageStore {
    logs: HashMap<ContactId, ConversationLog>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log for `contact` unless one exists already.
    pub fn ensure_log(&mut self, contact: ContactId) -> &mut ConversationLog {
        self.logs.entry(contact).or_default()
    }

    pub fn log(&self, contact: ContactId) -> Option<&ConversationLog> {
        self.logs.get(&contact)
    }

    pub fn messages(&self, contact: ContactId) -> &[Message] {
        self.logs
            .get(&contact)
            .map(|log| log.messages())
            .unwrap_or_default()
    }

    /// Append at the end of the contact's log and return the assigned id.
    pub fn append(&mut self, contact: ContactId, message: Message) -> MessageId {
        let id = self.ensure_log(contact).push(message);
        debug!(contact = %contact.short(), message_id = %id, "Message appended");
        id
    }

    /// Replace the display text of an own-authored message.
    ///
    /// Returns `false` and changes nothing when the id is unknown or the
    /// message was written by the contact.
    pub fn edit(&mut self, contact: ContactId, id: MessageId, content: impl Into<String>) -> bool {
        let Some(message) = self.logs.get_mut(&contact).and_then(|log| log.get_mut(id)) else {
            return false;
        };
        if !message.is_own() {
            return false;
        }
        message.content = content.into();
        debug!(contact = %contact.short(), message_id = %id, "Message edited");
        true
    }

    /// Add `id` to the selection, or remove it if already selected.
    /// Returns whether it is selected afterwards; ids not present in the
    /// log are ignored.
    pub fn toggle_select(&mut self, contact: ContactId, id: MessageId) -> bool {
        self.logs
            .get_mut(&contact)
            .map(|log| log.toggle_selected(id))
            .unwrap_or(false)
    }

    pub fn clear_selection(&mut self, contact: ContactId) {
        if let Some(log) = self.logs.get_mut(&contact) {
            log.clear_selected();
        }
    }

    /// Remove every selected message and clear the selection.
    pub fn delete_selected(&mut self, contact: ContactId) -> usize {
        let removed = self
            .logs
            .get_mut(&contact)
            .map(|log| log.remove_selected())
            .unwrap_or(0);
        if removed > 0 {
            debug!(contact = %contact.short(), removed, "Selected messages deleted");
        }
        removed
    }

    /// Enter edit mode for an own-authored message and return its text.
    pub fn begin_edit(&mut self, contact: ContactId, id: MessageId) -> Option<String> {
        let log = self.logs.get_mut(&contact)?;
        let draft = log.get(id).filter(|m| m.is_own()).map(|m| m.content.clone())?;
        log.set_editing(Some(id));
        Some(draft)
    }

    /// Apply `content` to the message in edit mode and leave edit mode.
    pub fn save_edit(&mut self, contact: ContactId, content: impl Into<String>) -> bool {
        let Some(id) = self.logs.get(&contact).and_then(|log| log.editing()) else {
            return false;
        };
        let saved = self.edit(contact, id, content);
        self.cancel_edit(contact);
        saved
    }

    pub fn cancel_edit(&mut self, contact: ContactId) {
        if let Some(log) = self.logs.get_mut(&contact) {
            log.set_editing(None);
        }
    }

    /// Start playing a voice note. Ids that are unknown or not voice
    /// messages are ignored; starting another note replaces the current one.
    pub fn play_voice(&mut self, contact: ContactId, id: MessageId) -> bool {
        let Some(log) = self.logs.get_mut(&contact) else {
            return false;
        };
        if !matches!(log.get(id).map(|m| &m.body), Some(MessageBody::Voice(_))) {
            return false;
        }
        log.set_playing(Some(id));
        debug!(contact = %contact.short(), message_id = %id, "Voice note playing");
        true
    }

    /// Playback paused, finished or failed.
    pub fn stop_playback(&mut self, contact: ContactId) {
        if let Some(log) = self.logs.get_mut(&contact) {
            log.set_playing(None);
        }
    }

    /// Clear selection, edit mode and playback, keeping the messages.
    pub fn reset_transient(&mut self, contact: ContactId) {
        if let Some(log) = self.logs.get_mut(&contact) {
            log.reset_transient();
        }
    }
}
