use std::collections::BTreeSet;

use murmur_shared::{Message, MessageId};

/// One contact's ordered message history plus its selection and edit state.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Vec<Message>,
    /// High-water mark for id assignment; never decreases, so ids stay
    /// unique after deletes.
    last_id: u64,
    selected: BTreeSet<MessageId>,
    editing: Option<MessageId>,
    /// Voice note currently playing back.
    playing: Option<MessageId>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            last_id: 0,
            selected: BTreeSet::new(),
            editing: None,
            playing: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn selected(&self) -> &BTreeSet<MessageId> {
        &self.selected
    }

    pub fn editing(&self) -> Option<MessageId> {
        self.editing
    }

    pub fn playing(&self) -> Option<MessageId> {
        self.playing
    }

    pub(crate) fn push(&mut self, mut message: Message) -> MessageId {
        if message.id.0 == 0 || message.id.0 <= self.last_id {
            message.id = MessageId(self.last_id + 1);
        }
        self.last_id = message.id.0;
        let id = message.id;
        self.messages.push(message);
        id
    }

    pub(crate) fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Returns whether `id` is selected afterwards.
    pub(crate) fn toggle_selected(&mut self, id: MessageId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        if self.selected.remove(&id) {
            return false;
        }
        self.selected.insert(id);
        true
    }

    pub(crate) fn clear_selected(&mut self) {
        self.selected.clear();
    }

    pub(crate) fn remove_selected(&mut self) -> usize {
        if self.selected.is_empty() {
            return 0;
        }
        let before = self.messages.len();
        let selected = std::mem::take(&mut self.selected);
        self.messages.retain(|m| !selected.contains(&m.id));
        if self.editing.is_some_and(|id| selected.contains(&id)) {
            self.editing = None;
        }
        if self.playing.is_some_and(|id| selected.contains(&id)) {
            self.playing = None;
        }
        before - self.messages.len()
    }

    pub(crate) fn set_editing(&mut self, id: Option<MessageId>) {
        self.editing = id;
    }

    pub(crate) fn set_playing(&mut self, id: Option<MessageId>) {
        self.playing = id;
    }

    /// Drop selection, edit mode and playback (contact switch).
    pub(crate) fn reset_transient(&mut self) {
        self.selected.clear();
        self.editing = None;
        self.playing = None;
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_shared::Author;

    #[test]
    fn test_preassigned_id_kept_when_ahead() {
        let mut log = ConversationLog::new();
        let mut message = Message::text(Author::Me, "a");
        message.id = MessageId(5);
        assert_eq!(log.push(message), MessageId(5));
        assert_eq!(log.push(Message::text(Author::Me, "b")), MessageId(6));
    }

    #[test]
    fn test_stale_id_is_reassigned() {
        let mut log = ConversationLog::new();
        log.push(Message::text(Author::Me, "a"));
        let mut message = Message::text(Author::Me, "b");
        message.id = MessageId(1);
        assert_eq!(log.push(message), MessageId(2));
        assert_eq!(log.messages().len(), 2);
    }

    #[test]
    fn test_remove_selected_reports_count() {
        let mut log = ConversationLog::new();
        let a = log.push(Message::text(Author::Me, "a"));
        log.push(Message::text(Author::Me, "b"));
        assert_eq!(log.remove_selected(), 0);

        assert!(log.toggle_selected(a));
        assert_eq!(log.remove_selected(), 1);
        assert!(log.selected().is_empty());
        assert!(log.get(a).is_none());
    }

    #[test]
    fn test_deleting_playing_note_stops_playback() {
        let mut log = ConversationLog::new();
        let a = log.push(Message::text(Author::Me, "a"));
        let b = log.push(Message::text(Author::Me, "b"));

        log.set_playing(Some(b));
        log.toggle_selected(a);
        log.remove_selected();
        assert_eq!(log.playing(), Some(b));

        log.toggle_selected(b);
        log.remove_selected();
        assert_eq!(log.playing(), None);
    }
}
