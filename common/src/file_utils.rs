use std::io;
use std::path::{Path, PathBuf};

/// Default deck file stem used when a deck has no title.
pub const DEFAULT_DECK_NAME: &str = "Presentation";

/// Create a URL-friendly slug from a title
pub fn create_slug(title: &str) -> String {
    title
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c.is_whitespace() || c == '-' || c == '_' {
                Some('-')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(50)
        .collect()
}

/// File name for an exported deck: the title with path-hostile characters
/// replaced, or the default name when the title is blank.
pub fn deck_file_name(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim_matches('.').trim();
    if stem.is_empty() {
        format!("{DEFAULT_DECK_NAME}.pptx")
    } else {
        format!("{stem}.pptx")
    }
}

/// Ensure an output directory exists
pub async fn ensure_dir<P: AsRef<Path>>(dir: P) -> io::Result<()> {
    let path = dir.as_ref();
    if !path.exists() {
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}

/// Write bytes into `dir/filename`, creating the directory first.
pub async fn save_bytes<P: AsRef<Path>>(dir: P, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let dir = dir.as_ref();
    ensure_dir(dir).await?;

    let file_path = dir.join(filename);
    tokio::fs::write(&file_path, bytes).await?;

    Ok(file_path)
}
