//! File attachments.
//!
//! An attachment lives only until the next send.  Its bytes are then folded into the user
//! message: images as a base64 data URI inside markdown image syntax, everything else as a fenced
//! block labelled with the file name.  Nothing else about the file is kept.

use std::path::{Path, PathBuf};

use base64::Engine;

use crate::error::{Error, Result};
use crate::types::Locale;

/// A file staged for the next send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    path: PathBuf,
    name: String,
    mime: String,
}

impl Attachment {
    /// Stage the file at `path`.  The contents are read at send time, not now.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::attachment("not a readable file", path));
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let mime = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self { path, name, mime })
    }

    /// Where the file lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name shown to the user and in the message.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The MIME type guessed from the extension.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// True when the file is embedded as an image.
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// Read the file and render it as message text, without the leading separator.
    pub async fn render(&self, locale: Locale) -> Result<String> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|err| Error::attachment(err.to_string(), &self.path))?;
        if self.is_image() {
            let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(format!(
                "![{}](data:{};base64,{})",
                locale.strings().image_alt,
                self.mime,
                data
            ))
        } else {
            let text = String::from_utf8_lossy(&bytes);
            Ok(format!("--- {} ---\n```\n{}\n```", self.name, text))
        }
    }
}

/// A composed user turn, ready for the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTurn {
    /// The typed text, untouched.  Titles are derived from it.
    pub text: String,
    /// The message content: the text plus any rendered attachment.
    pub content: String,
    /// Whether a file accompanied the text, readable or not.
    pub has_attachment: bool,
}

impl UserTurn {
    /// Fold an optional attachment into `text`.
    ///
    /// A file that cannot be read does not abort the turn: the locale's error marker is appended
    /// instead and the failure is logged.
    pub async fn compose(text: &str, attachment: Option<&Attachment>, locale: Locale) -> Self {
        let mut content = text.to_string();
        if let Some(attachment) = attachment {
            match attachment.render(locale).await {
                Ok(rendered) => {
                    content.push_str("\n\n");
                    content.push_str(&rendered);
                }
                Err(err) => {
                    tracing::error!(
                        path = %attachment.path().display(),
                        error = %err,
                        "could not read attachment"
                    );
                    content.push_str("\n\n");
                    content.push_str(locale.strings().file_read_error);
                }
            }
        }
        Self {
            text: text.to_string(),
            content,
            has_attachment: attachment.is_some(),
        }
    }

    /// A turn with no attachment.
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            content: text.to_string(),
            has_attachment: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, MessageContent};

    fn write(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Attachment::new(dir.path().join("nope.txt")).unwrap_err();
        assert!(err.is_attachment());
        let err = Attachment::new(dir.path()).unwrap_err();
        assert!(err.is_attachment());
    }

    #[test]
    fn mime_is_guessed_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = Attachment::new(write(&dir, "cat.png", b"png")).unwrap();
        assert_eq!(png.mime(), "image/png");
        assert!(png.is_image());
        assert_eq!(png.name(), "cat.png");

        let notes = Attachment::new(write(&dir, "notes.rs", b"fn main() {}")).unwrap();
        assert!(!notes.is_image());

        let blob = Attachment::new(write(&dir, "blob", b"\x00\x01")).unwrap();
        assert_eq!(blob.mime(), "application/octet-stream");
    }

    #[tokio::test]
    async fn image_becomes_markdown_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = Attachment::new(write(&dir, "pixel.png", b"Hello World")).unwrap();

        let turn = UserTurn::compose("", Some(&attachment), Locale::Tr).await;
        assert_eq!(
            turn.content,
            "\n\n![Görsel](data:image/png;base64,SGVsbG8gV29ybGQ=)"
        );
        assert!(turn.has_attachment);
        assert!(turn.text.is_empty());

        let message = Message::user(turn.content);
        assert!(message.is_multimodal());
        let MessageContent::Multimodal(parts) = message.api_content() else {
            panic!("expected multimodal content");
        };
        assert_eq!(parts.len(), 2);
    }

    #[tokio::test]
    async fn text_file_becomes_fenced_block() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = Attachment::new(write(&dir, "notes.txt", b"line one\nline two")).unwrap();

        let turn = UserTurn::compose("Summarize", Some(&attachment), Locale::En).await;
        assert_eq!(
            turn.content,
            "Summarize\n\n--- notes.txt ---\n```\nline one\nline two\n```"
        );
        assert_eq!(turn.text, "Summarize");
    }

    #[tokio::test]
    async fn unreadable_file_appends_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "gone.txt", b"soon gone");
        let attachment = Attachment::new(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let turn = UserTurn::compose("Hi", Some(&attachment), Locale::Tr).await;
        assert_eq!(turn.content, "Hi\n\n[Dosya yüklenirken hata oluştu]");
        assert!(turn.has_attachment);
    }

    #[tokio::test]
    async fn no_attachment_keeps_text() {
        let turn = UserTurn::compose("Merhaba", None, Locale::Tr).await;
        assert_eq!(turn, UserTurn::text("Merhaba"));
    }
}
