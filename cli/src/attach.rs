//! Reading context files passed with `--attach`.

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use slidesmith_common::{Attachment, AttachmentKind};

/// Images are sent inline as base64; anything else is read as text.
pub fn read_attachment(path: &Path) -> Result<Attachment> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime = mime_guess::from_path(path).first();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    let attachment = match mime {
        Some(m) if m.type_() == mime_guess::mime::IMAGE => Attachment {
            name,
            kind: AttachmentKind::Binary,
            mime_type: Some(m.essence_str().to_owned()),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        },
        other => Attachment {
            name,
            kind: AttachmentKind::Text,
            mime_type: other.map(|m| m.essence_str().to_owned()),
            data: String::from_utf8_lossy(&bytes).into_owned(),
        },
    };
    tracing::debug!(name = %attachment.name, kind = ?attachment.kind, "attached file");
    Ok(attachment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_are_inlined_and_text_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("chart.png");
        std::fs::write(&img, [0x89, b'P', b'N', b'G']).unwrap();
        let notes = dir.path().join("notes.md");
        std::fs::write(&notes, "# Q3 numbers\nup 12%").unwrap();

        let a = read_attachment(&img).unwrap();
        assert_eq!(a.kind, AttachmentKind::Binary);
        assert_eq!(a.mime_type.as_deref(), Some("image/png"));
        assert_eq!(a.data, "iVBORw==");

        let b = read_attachment(&notes).unwrap();
        assert_eq!(b.kind, AttachmentKind::Text);
        assert_eq!(b.name, "notes.md");
        assert_eq!(b.data, "# Q3 numbers\nup 12%");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_attachment(Path::new("/nonexistent/brief.txt")).is_err());
    }
}
