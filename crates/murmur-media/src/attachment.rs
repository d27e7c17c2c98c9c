//! File attachments.
//!
//! A chosen file is wrapped, never transcoded or size-checked, into a file
//! message. Classification looks only at the declared media type, falling
//! back to the file-name extension when no type was declared.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use murmur_shared::{Author, FileAttachment, FileClass, FileResource, Message, MessageBody, ResourceFuture};

/// Classify a file for iconography and preview.
pub fn classify(media_type: &str, name: &str) -> FileClass {
    let declared = media_type.trim().to_ascii_lowercase();
    if declared.is_empty() {
        return match media_type_for_name(name) {
            "" => FileClass::Other,
            guessed => classify_type(guessed),
        };
    }
    classify_type(&declared)
}

fn classify_type(t: &str) -> FileClass {
    // Office XML types all contain "officedocument", so spreadsheets and
    // presentations are matched before documents.
    if t.starts_with("image/") {
        FileClass::Image
    } else if t.contains("pdf") {
        FileClass::Pdf
    } else if t.contains("spreadsheet") || t.contains("excel") {
        FileClass::Spreadsheet
    } else if t.contains("presentation") || t.contains("powerpoint") {
        FileClass::Presentation
    } else if t.contains("document") || t.contains("word") {
        FileClass::Document
    } else if t.contains("zip") || t.contains("rar") {
        FileClass::Archive
    } else if t.contains("video") {
        FileClass::Video
    } else if t.contains("audio") {
        FileClass::Audio
    } else {
        FileClass::Other
    }
}

/// Media type implied by a file name's extension, or `""` if unknown.
pub fn media_type_for_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "zip" => "application/zip",
        "rar" => "application/vnd.rar",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "txt" => "text/plain",
        _ => "",
    }
}

/// Wrap a chosen file into an own-authored file message.
///
/// `None` (the picker was dismissed) yields `None`.
pub fn attach(file: Option<Arc<dyn FileResource>>) -> Option<Message> {
    let file = file?;
    let class = classify(file.media_type(), file.name());
    let content = match class.glyph() {
        Some(glyph) => format!("{glyph} {}", file.name()),
        None => file.name().to_string(),
    };

    info!(
        file_name = %file.name(),
        size = file.size(),
        class = ?class,
        "File attached"
    );

    let attachment = FileAttachment {
        name: file.name().to_string(),
        size: file.size(),
        media_type: file.media_type().to_string(),
        class,
        locator: file.locator(),
        resource: file,
    };
    Some(Message::new(Author::Me, content, MessageBody::File(attachment)))
}

/// How a file message renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum FilePreview {
    /// Images render inline.
    InlineImage { locator: String },
    /// Everything else renders as a card with a download link.
    Card {
        glyph: String,
        name: String,
        size_label: String,
        download: String,
    },
}

impl FilePreview {
    pub fn for_attachment(attachment: &FileAttachment) -> Self {
        match attachment.class.glyph() {
            None => FilePreview::InlineImage {
                locator: attachment.locator.clone(),
            },
            Some(glyph) => FilePreview::Card {
                glyph: glyph.to_string(),
                name: attachment.name.clone(),
                size_label: attachment.size_label(),
                download: attachment.locator.clone(),
            },
        }
    }
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    media_type: String,
    size: u64,
}

impl LocalFile {
    /// Stat `path`; the media type comes from its extension.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let media_type = media_type_for_name(&name).to_string();
        Ok(Self {
            path,
            name,
            media_type,
            size: metadata.len(),
        })
    }
}

impl FileResource for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn locator(&self) -> String {
        format!("file://{}", self.path.display())
    }

    fn read(&self) -> ResourceFuture<'_> {
        Box::pin(async move { tokio::fs::read(&self.path).await.map(Bytes::from) })
    }
}

/// A file whose bytes are already in memory (e.g. handed over by a picker).
#[derive(Debug, Clone)]
pub struct MemoryFile {
    id: Uuid,
    name: String,
    media_type: String,
    data: Bytes,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

impl FileResource for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn locator(&self) -> String {
        format!("mem://file/{}", self.id)
    }

    fn read(&self) -> ResourceFuture<'_> {
        let data = self.data.clone();
        Box::pin(async move { Ok(data) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_declared_types() {
        assert_eq!(classify("image/png", "x"), FileClass::Image);
        assert_eq!(classify("application/pdf", "x"), FileClass::Pdf);
        assert_eq!(classify("application/msword", "x"), FileClass::Document);
        assert_eq!(classify("application/vnd.ms-excel", "x"), FileClass::Spreadsheet);
        assert_eq!(classify("application/vnd.ms-powerpoint", "x"), FileClass::Presentation);
        assert_eq!(classify("application/zip", "x"), FileClass::Archive);
        assert_eq!(classify("video/mp4", "x"), FileClass::Video);
        assert_eq!(classify("audio/mpeg", "x"), FileClass::Audio);
        assert_eq!(classify("text/plain", "x"), FileClass::Other);
    }

    #[test]
    fn test_classify_office_xml() {
        assert_eq!(classify(media_type_for_name("a.xlsx"), "a.xlsx"), FileClass::Spreadsheet);
        assert_eq!(classify(media_type_for_name("a.pptx"), "a.pptx"), FileClass::Presentation);
        assert_eq!(classify(media_type_for_name("a.docx"), "a.docx"), FileClass::Document);
    }

    #[test]
    fn test_declared_type_wins_over_name() {
        assert_eq!(classify("application/pdf", "photo.png"), FileClass::Pdf);
    }

    #[test]
    fn test_classify_falls_back_to_extension() {
        assert_eq!(classify("", "Holiday.JPG"), FileClass::Image);
        assert_eq!(classify("", "notes"), FileClass::Other);
    }

    #[test]
    fn test_attach_none_is_noop() {
        assert!(attach(None).is_none());
    }

    #[test]
    fn test_attach_document() {
        let file = MemoryFile::new("report.pdf", "application/pdf", vec![0u8; 2_621_440]);
        let message = attach(Some(Arc::new(file))).unwrap();

        assert!(message.is_own());
        assert_eq!(message.content, "📄 report.pdf");
        let MessageBody::File(attachment) = &message.body else {
            panic!("expected file body");
        };
        assert_eq!(attachment.size, 2_621_440);
        assert_eq!(attachment.size_label(), "2.5 MB");

        match FilePreview::for_attachment(attachment) {
            FilePreview::Card { name, size_label, download, .. } => {
                assert_eq!(name, "report.pdf");
                assert_eq!(size_label, "2.5 MB");
                assert!(download.starts_with("mem://file/"));
            }
            other => panic!("expected card, got {other:?}"),
        }
    }

    #[test]
    fn test_attach_image_renders_inline() {
        let file = MemoryFile::new("cat.png", "image/png", vec![1u8, 2, 3]);
        let message = attach(Some(Arc::new(file))).unwrap();
        assert_eq!(message.content, "cat.png");

        let MessageBody::File(attachment) = &message.body else {
            panic!("expected file body");
        };
        assert!(attachment.is_image());
        assert!(matches!(
            FilePreview::for_attachment(attachment),
            FilePreview::InlineImage { .. }
        ));
    }

    #[test]
    fn test_large_files_accepted() {
        #[derive(Debug)]
        struct Huge;
        impl FileResource for Huge {
            fn name(&self) -> &str {
                "disk.iso"
            }
            fn media_type(&self) -> &str {
                "application/octet-stream"
            }
            fn size(&self) -> u64 {
                8 * 1024 * 1024 * 1024
            }
            fn locator(&self) -> String {
                "mem://huge".into()
            }
            fn read(&self) -> ResourceFuture<'_> {
                Box::pin(async { Ok(Bytes::new()) })
            }
        }

        let message = attach(Some(Arc::new(Huge))).unwrap();
        assert_eq!(message.content, "📎 disk.iso");
    }

    #[tokio::test]
    async fn test_local_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.mp3");
        tokio::fs::write(&path, b"ID3-data").await.unwrap();

        let file = LocalFile::open(&path).await.unwrap();
        assert_eq!(file.name(), "song.mp3");
        assert_eq!(file.media_type(), "audio/mpeg");
        assert_eq!(file.size(), 8);

        let message = attach(Some(Arc::new(file))).unwrap();
        assert_eq!(message.content, "🎵 song.mp3");
        let MessageBody::File(attachment) = &message.body else {
            panic!("expected file body");
        };
        assert!(attachment.locator.starts_with("file://"));
        assert_eq!(attachment.download().await.unwrap().as_ref(), b"ID3-data");
    }

    #[tokio::test]
    async fn test_local_file_missing() {
        let dir = TempDir::new().unwrap();
        assert!(LocalFile::open(dir.path().join("nope.txt")).await.is_err());
    }
}
