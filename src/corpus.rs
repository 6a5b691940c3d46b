//! Corpus directory scanning.
//!
//! Loads plain-text documents (`.txt` / `.md`) from the configured corpus
//! directory. Richer formats (PDF, HTML) are handled by an upstream
//! extraction collaborator and arrive through the ingest contract as
//! `(source, text)` pairs.

use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

use crate::models::Document;

/// Load every `.txt` / `.md` file under `dir`. Unreadable files are skipped
/// with a warning rather than failing the scan.
pub fn load_documents(dir: &Path) -> Vec<Document> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut docs = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("txt") | Some("md") => {}
            _ => continue,
        }

        let text = match std::fs::read_to_string(path) {
            Ok(t) => t.trim().to_string(),
            Err(e) => {
                tracing::warn!("Skipping unreadable corpus file {}: {e}", path.display());
                continue;
            }
        };
        if text.is_empty() {
            continue;
        }

        let source = path.to_string_lossy().to_string();
        let title = extract_title(&source, &text);
        docs.push(Document {
            source,
            text,
            title,
        });
    }

    // Deterministic order regardless of directory traversal
    docs.sort_by(|a, b| a.source.cmp(&b.source));
    docs
}

/// Derive a display title: markdown heading first, then the first non-empty
/// line (truncated), then the file stem.
pub fn extract_title(source: &str, content: &str) -> String {
    let stem = file_stem(source);

    if source.to_ascii_lowercase().ends_with(".md") {
        for line in content.lines() {
            let s = line.trim();
            if s.is_empty() {
                continue;
            }
            if let Some(heading) = s.strip_prefix('#') {
                let heading = normalize_ws(heading.trim_start_matches('#').trim());
                if !heading.is_empty() {
                    return heading;
                }
            }
            break;
        }
    }

    for line in content.lines() {
        let s = line.trim();
        if !s.is_empty() {
            return truncate_title(&normalize_ws(s), 120);
        }
    }

    stem
}

/// Default title when the extraction collaborator supplies none.
pub fn file_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source.to_string())
}

/// Hex SHA-256 of the document text, used by the incremental indexer to
/// detect changed content.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Replace exotic whitespace with plain spaces and collapse runs.
fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_title(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let head: String = s.chars().take(max_chars).collect();
    format!("{head}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_markdown_heading_wins() {
        let title = extract_title("data/notes.md", "\n\n## Quarterly Review\nbody text");
        assert_eq!(title, "Quarterly Review");
    }

    #[test]
    fn test_first_line_fallback() {
        let title = extract_title("data/plain.txt", "\nFirst   line here\nrest");
        assert_eq!(title, "First line here");
    }

    #[test]
    fn test_long_first_line_truncated() {
        let long = "word ".repeat(60);
        let title = extract_title("data/plain.txt", &long);
        assert!(title.chars().count() <= 121);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_file_stem_fallback() {
        let title = extract_title("data/report.md", "");
        assert_eq!(title, "report");
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let a = content_hash("alpha");
        let b = content_hash("alpha");
        let c = content_hash("beta");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_load_documents_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "# Alpha\ncontent").unwrap();
        fs::write(dir.path().join("b.txt"), "Beta content").unwrap();
        fs::write(dir.path().join("c.bin"), "ignored").unwrap();
        fs::write(dir.path().join("empty.txt"), "   ").unwrap();

        let docs = load_documents(dir.path());
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().any(|d| d.title == "Alpha"));
        assert!(docs.iter().any(|d| d.title == "Beta content"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        assert!(load_documents(Path::new("/nonexistent/corpus")).is_empty());
    }
}
