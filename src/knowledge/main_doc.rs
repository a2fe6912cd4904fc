//! Sections of a project's main document.
//!
//! The main document is free-form markdown. A section starts at a `##` line
//! whose text matches the requested header exactly and runs until the next
//! heading of level 1 or 2, outside fenced code blocks.

use std::ops::Range;

use crate::error::{KnowledgeError, ResourceKind, Result};
use crate::knowledge::document::is_fence;

/// Depth of a markdown ATX heading line, if it is one.
fn heading_level(line: &str) -> Option<usize> {
    let line = line.trim_end_matches(['\n', '\r']);
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    match line[hashes..].chars().next() {
        None => Some(hashes),
        Some(c) if c == ' ' || c == '\t' => Some(hashes),
        Some(_) => None,
    }
}

fn header_text(line: &str) -> Option<&str> {
    (heading_level(line) == Some(2)).then(|| line.trim_end_matches(['\n', '\r'])[2..].trim())
}

/// Header as callers pass it: with or without the leading `## `. Deeper
/// markers (`### Foo`) are kept as part of the header text.
fn normalize_header(header: &str) -> Result<&str> {
    let header = header.trim();
    let header = match heading_level(header) {
        Some(2) => header[2..].trim(),
        _ => header,
    };
    if header.is_empty() {
        return Err(KnowledgeError::invalid_content("section header cannot be empty"));
    }
    if header.contains(['\n', '\r']) {
        return Err(KnowledgeError::invalid_content("section header must be a single line"));
    }
    Ok(header)
}

/// Byte range of the section under `header`, heading line included.
fn locate(text: &str, header: &str) -> Option<Range<usize>> {
    let mut in_fence = false;
    let mut offset = 0;
    let mut start = None;

    for line in text.split_inclusive('\n') {
        if is_fence(line) {
            in_fence = !in_fence;
        } else if !in_fence {
            match start {
                None if header_text(line) == Some(header) => start = Some(offset),
                Some(begin) if heading_level(line).is_some_and(|level| level <= 2) => {
                    return Some(begin..offset);
                }
                _ => {}
            }
        }
        offset += line.len();
    }
    start.map(|begin| begin..text.len())
}

fn check_body(content: &str) -> Result<()> {
    let mut in_fence = false;
    for line in content.split('\n') {
        if is_fence(line) {
            in_fence = !in_fence;
        } else if !in_fence && heading_level(line).is_some_and(|level| level <= 2) {
            return Err(KnowledgeError::invalid_content(
                "section content cannot contain level 1 or 2 headings",
            ));
        }
    }
    if in_fence {
        return Err(KnowledgeError::invalid_content(
            "section content has an unclosed code fence",
        ));
    }
    Ok(())
}

fn format_section(header: &str, content: &str) -> String {
    let content = content.trim();
    if content.is_empty() {
        format!("## {header}\n")
    } else {
        format!("## {header}\n\n{content}\n")
    }
}

/// Body of the section under `header`, without its heading line.
pub fn get_section(text: &str, header: &str) -> Result<String> {
    let header = normalize_header(header)?;
    let range = locate(text, header)
        .ok_or_else(|| KnowledgeError::not_found(ResourceKind::Section, header))?;
    let section = &text[range];
    let body = section.split_once('\n').map_or("", |(_, rest)| rest);
    Ok(body.trim().to_string())
}

/// Replace the section under `header`, appending it when absent.
pub fn replace_section(text: &str, header: &str, content: &str) -> Result<String> {
    let header = normalize_header(header)?;
    check_body(content)?;
    let section = format_section(header, content);

    Ok(match locate(text, header) {
        Some(range) => {
            let rest = &text[range.end..];
            let separator = if rest.is_empty() { "" } else { "\n" };
            format!("{}{section}{separator}{rest}", &text[..range.start])
        }
        None => {
            let existing = text.trim_end();
            if existing.is_empty() {
                section
            } else {
                format!("{existing}\n\n{section}")
            }
        }
    })
}

/// Remove the section under `header`, heading included.
pub fn remove_section(text: &str, header: &str) -> Result<String> {
    let header = normalize_header(header)?;
    let range = locate(text, header)
        .ok_or_else(|| KnowledgeError::not_found(ResourceKind::Section, header))?;
    let before = text[..range.start].trim_end();
    let after = &text[range.end..];
    Ok(match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (false, true) => format!("{before}\n"),
        (false, false) => format!("{before}\n\n{after}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = "# Project

Overview text.

## Setup

Run the installer.

### Details
Sub-section stays with Setup.

```md
## not a section
```

## Conventions
Use snake_case.
";

    #[test]
    fn gets_section_with_subheadings() {
        let setup = get_section(MAIN, "Setup").unwrap();
        assert!(setup.starts_with("Run the installer."));
        assert!(setup.contains("### Details"));
        assert!(setup.contains("## not a section"));
        assert!(!setup.contains("Conventions"));

        assert_eq!(get_section(MAIN, "## Conventions").unwrap(), "Use snake_case.");
    }

    #[test]
    fn header_match_is_exact() {
        assert!(get_section(MAIN, "setup").unwrap_err().is_not_found());
        assert!(get_section(MAIN, "not a section").unwrap_err().is_not_found());
        assert_eq!(get_section(MAIN, "  ").unwrap_err().code(), "INVALID_CONTENT");
    }

    #[test]
    fn replace_keeps_neighbours() {
        let updated = replace_section(MAIN, "Setup", "Use the script.").unwrap();
        assert_eq!(get_section(&updated, "Setup").unwrap(), "Use the script.");
        assert_eq!(get_section(&updated, "Conventions").unwrap(), "Use snake_case.");
        assert!(updated.starts_with("# Project\n\nOverview text.\n\n## Setup\n"));
        assert!(!updated.contains("### Details"));
    }

    #[test]
    fn replace_appends_missing_section() {
        let updated = replace_section(MAIN, "Testing", "cargo test").unwrap();
        assert!(updated.ends_with("Use snake_case.\n\n## Testing\n\ncargo test\n"));
        assert_eq!(replace_section("", "Only", "x").unwrap(), "## Only\n\nx\n");
    }

    #[test]
    fn replace_rejects_section_breaking_content() {
        let err = replace_section(MAIN, "Setup", "a\n## Sneaky\nb").unwrap_err();
        assert_eq!(err.code(), "INVALID_CONTENT");
    }

    #[test]
    fn replace_rejects_unclosed_fence() {
        let err = replace_section(MAIN, "Setup", "```sh\n./install.sh").unwrap_err();
        assert_eq!(err.code(), "INVALID_CONTENT");

        let updated = replace_section(MAIN, "Setup", "```sh\n./install.sh\n```").unwrap();
        assert_eq!(get_section(&updated, "Conventions").unwrap(), "Use snake_case.");
    }

    #[test]
    fn deeper_header_markers_are_not_stripped() {
        assert_eq!(normalize_header("## Setup").unwrap(), "Setup");
        assert_eq!(normalize_header("### Details").unwrap(), "### Details");
        assert!(get_section(MAIN, "### Details").unwrap_err().is_not_found());
        assert_eq!(normalize_header("##").unwrap_err().code(), "INVALID_CONTENT");
    }

    #[test]
    fn remove_section_and_missing() {
        let updated = remove_section(MAIN, "Setup").unwrap();
        assert!(get_section(&updated, "Setup").unwrap_err().is_not_found());
        assert!(updated.contains("Overview text.\n\n## Conventions\n"));

        let last_removed = remove_section(MAIN, "Conventions").unwrap();
        assert!(last_removed.ends_with("```\n"));

        assert!(remove_section(MAIN, "Missing").unwrap_err().is_not_found());
    }
}
