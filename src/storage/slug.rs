//! Filesystem-safe identifiers derived from free text.

/// Placeholder used when nothing usable survives slugification.
pub const FALLBACK_SLUG: &str = "untitled";

/// Longest slug, in bytes. Leaves room for collision suffixes and `.md`
/// under the usual 255-byte file name limit.
pub const MAX_SLUG_LEN: usize = 100;

/// Convert arbitrary text (project names, document filenames) into a slug.
///
/// Path separators become `_`, traversal sequences are removed, unicode is
/// transliterated to ASCII, every other non-word character becomes `-`, and
/// runs of separators collapse. The result is lowercase, never empty, and at
/// most [`MAX_SLUG_LEN`] bytes.
pub fn slugify(text: &str) -> String {
    if text.trim().is_empty() {
        return FALLBACK_SLUG.to_string();
    }

    let mut text = text.replace(['/', '\\'], "_").replace("..", "");
    for dotted in ["_._", "._", "_."] {
        text = text.replace(dotted, "_");
    }
    while text.contains("__") {
        text = text.replace("__", "_");
    }
    let text = text.trim_matches('_');
    if text.trim_matches(|c| c == '_' || c == '.').is_empty() {
        return FALLBACK_SLUG.to_string();
    }

    let ascii = deunicode::deunicode(text);

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_separator = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_separator {
                slug.push('-');
                pending_separator = false;
            }
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    if pending_separator {
        slug.push('-');
    }

    let slug = truncate(&slug, MAX_SLUG_LEN).trim_matches(|c| c == '-' || c == '.');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Normalise a knowledge document filename: an optional `.md` suffix is
/// dropped (any case), the stem slugified, and `.md` appended.
pub fn document_filename(name: &str) -> String {
    let trimmed = name.trim();
    let stem = match trimmed.len().checked_sub(3) {
        Some(split)
            if trimmed.is_char_boundary(split)
                && trimmed[split..].eq_ignore_ascii_case(".md") =>
        {
            &trimmed[..split]
        }
        _ => trimmed,
    };
    format!("{}.md", slugify(stem))
}
