use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

pub fn hash_content(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)
}

pub fn build_excerpt(content: &str, max_length: usize) -> String {
    let normalized: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.chars().take(max_length).collect()
}

/// Strips HTML tags and collapses whitespace when the content looks like
/// markup; otherwise just collapses whitespace. No HTML parser crate is in
/// the dependency stack, so tag stripping is a regex pass rather than a
/// DOM walk — acceptable here since only plain text is extracted, never
/// structure.
pub fn normalize_content(raw_content: &str, _source_url: &str) -> String {
    let lower = raw_content.to_lowercase();
    let looks_like_html = lower.contains("<html") || raw_content.contains("</");
    let text = if looks_like_html {
        TAG_RE.replace_all(raw_content, " ").into_owned()
    } else {
        raw_content.to_string()
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let safe_chunk_size = chunk_size.max(100);
    let safe_overlap = overlap.min(safe_chunk_size.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let length = chars.len();

    loop {
        let end = (start + safe_chunk_size).min(length);
        let chunk: String = chars[start..end].iter().collect::<String>().trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        if end == length {
            break;
        }
        start = end - safe_overlap;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_content_is_deterministic() {
        assert_eq!(hash_content("abc"), hash_content("abc"));
        assert_ne!(hash_content("abc"), hash_content("abd"));
    }

    #[test]
    fn normalize_strips_html_tags() {
        let html = "<html><body><p>Hello  world</p></body></html>";
        assert_eq!(normalize_content(html, "http://x"), "Hello world");
    }

    #[test]
    fn normalize_collapses_plain_whitespace() {
        assert_eq!(normalize_content("a   b\n\nc", "http://x"), "a b c");
    }

    #[test]
    fn chunk_text_respects_overlap() {
        let chunks = chunk_text(&"a".repeat(250), 100, 20);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].len() <= 100);
    }

    #[test]
    fn chunk_text_empty_input_yields_no_chunks() {
        assert!(chunk_text("", 500, 100).is_empty());
    }
}
