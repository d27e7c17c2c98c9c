//! The message record kept in every conversation log.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::resource::FileResource;
use crate::types::{Author, MessageId};

/// A single chat message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Sequence number within the owning contact's log.
    pub id: MessageId,
    pub author: Author,
    /// Display text. For voice and file messages this is the caption
    /// shown next to the attachment.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub body: MessageBody,
}

impl Message {
    /// A message with no id yet; the store assigns one on append.
    pub fn new(author: Author, content: impl Into<String>, body: MessageBody) -> Self {
        Self {
            id: MessageId(0),
            author,
            content: content.into(),
            created_at: Utc::now(),
            body,
        }
    }

    pub fn text(author: Author, content: impl Into<String>) -> Self {
        Self::new(author, content, MessageBody::Text)
    }

    /// Whether the local user wrote it (right alignment, edit and delete rights).
    pub fn is_own(&self) -> bool {
        self.author.is_me()
    }

    /// Local `hh:mm AM/PM` label.
    pub fn time_label(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%I:%M %p")
            .to_string()
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MessageBody {
    Text,
    Voice(VoiceNote),
    File(FileAttachment),
}

/// A recorded voice note.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceNote {
    pub handle: Uuid,
    pub mime_type: String,
    /// Estimated from the byte size, not decoded.
    pub duration_secs: u32,
    #[serde(skip)]
    pub audio: Bytes,
}

/// Coarse file category driving the icon and preview choice.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    Image,
    Pdf,
    Document,
    Spreadsheet,
    Presentation,
    Archive,
    Video,
    Audio,
    Other,
}

impl FileClass {
    /// Icon glyph prefixed to the file name. Images render inline instead.
    pub fn glyph(&self) -> Option<&'static str> {
        match self {
            FileClass::Image => None,
            FileClass::Pdf => Some("📄"),
            FileClass::Document => Some("📝"),
            FileClass::Spreadsheet => Some("📊"),
            FileClass::Presentation => Some("📋"),
            FileClass::Archive => Some("📦"),
            FileClass::Video => Some("🎥"),
            FileClass::Audio => Some("🎵"),
            FileClass::Other => Some("📎"),
        }
    }
}

/// A file shared in the conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub name: String,
    pub size: u64,
    pub media_type: String,
    pub class: FileClass,
    pub locator: String,
    #[serde(skip)]
    pub resource: Arc<dyn FileResource>,
}

impl FileAttachment {
    pub fn is_image(&self) -> bool {
        self.class == FileClass::Image
    }

    /// Size rounded to one decimal megabyte, e.g. `"2.4 MB"`.
    pub fn size_label(&self) -> String {
        format!("{:.1} MB", self.size as f64 / 1024.0 / 1024.0)
    }

    pub async fn download(&self) -> std::io::Result<Bytes> {
        self.resource.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContactId;

    #[test]
    fn test_own_flag_follows_author() {
        assert!(Message::text(Author::Me, "hi").is_own());
        assert!(!Message::text(Author::Contact(ContactId::new()), "hi").is_own());
    }

    #[test]
    fn test_time_label_shape() {
        let label = Message::text(Author::Me, "hi").time_label();
        assert_eq!(label.len(), 8);
        assert!(label.ends_with("AM") || label.ends_with("PM"));
    }

    #[test]
    fn test_body_serializes_with_kind_tag() {
        let msg = Message::text(Author::Me, "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["body"]["kind"], "text");
        assert_eq!(json["content"], "hi");
        assert!(json.get("createdAt").is_some());
    }
}
