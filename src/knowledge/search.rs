//! Keyword search over a project's knowledge documents.
//!
//! Exhaustive scan, no index: every `*.md` file under `knowledge/` is parsed
//! and each keyword is matched case-insensitively against the introduction
//! and each chapter independently. Results are presence-based, not ranked.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::knowledge::document;
use crate::knowledge::markdown_files;
use crate::knowledge::types::{Document, Metadata};

/// Characters of context kept on each side of a match.
pub const CONTEXT_CHARS: usize = 50;

const ELLIPSIS: &str = "...";

/// One chapter (or the pre-chapter text, titled `""`) with matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterMatch {
    pub chapter: String,
    pub chapter_summary: String,
    /// Sorted.
    pub keywords_found: Vec<String>,
    pub match_context: BTreeMap<String, Vec<String>>,
}

/// All matches in one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub file: String,
    pub match_count: usize,
    pub metadata: Metadata,
    pub matching_chapters: Vec<ChapterMatch>,
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Lowercase keywords from a whitespace-separated query, duplicates dropped.
pub fn keywords(query: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        let word: String = word.chars().map(fold).collect();
        if !out.contains(&word) {
            out.push(word);
        }
    }
    out
}

/// A context excerpt for every occurrence of `keyword` in `text`, overlapping
/// occurrences included. Truncated sides are marked with `...`.
pub fn excerpts(text: &str, keyword: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let folded: Vec<char> = chars.iter().copied().map(fold).collect();
    let needle: Vec<char> = keyword.chars().map(fold).collect();
    if needle.is_empty() || needle.len() > folded.len() {
        return Vec::new();
    }

    folded
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle.as_slice())
        .map(|(at, _)| {
            let start = at.saturating_sub(CONTEXT_CHARS);
            let end = (at + needle.len() + CONTEXT_CHARS).min(chars.len());
            let snippet: String = chars[start..end].iter().collect();
            let mut excerpt = String::new();
            if start > 0 {
                excerpt.push_str(ELLIPSIS);
            }
            excerpt.push_str(snippet.trim());
            if end < chars.len() {
                excerpt.push_str(ELLIPSIS);
            }
            excerpt
        })
        .collect()
}

fn match_section(title: &str, summary: &str, text: &str, keywords: &[String]) -> Option<ChapterMatch> {
    let mut found = BTreeSet::new();
    let mut context = BTreeMap::new();
    for keyword in keywords {
        let hits = excerpts(text, keyword);
        if !hits.is_empty() {
            found.insert(keyword.clone());
            context.insert(keyword.clone(), hits);
        }
    }
    (!found.is_empty()).then(|| ChapterMatch {
        chapter: title.to_string(),
        chapter_summary: summary.to_string(),
        keywords_found: found.into_iter().collect(),
        match_context: context,
    })
}

/// Matching sections of one parsed document, pre-chapter text first.
pub fn match_document(doc: &Document, keywords: &[String]) -> Vec<ChapterMatch> {
    let mut matches = Vec::new();
    if !doc.introduction.is_empty() {
        matches.extend(match_section("", "", &doc.introduction, keywords));
    }
    for chapter in &doc.chapters {
        matches.extend(match_section(
            &chapter.title,
            &chapter.summary,
            &chapter.content,
            keywords,
        ));
    }
    matches
}

/// Search every knowledge document of the project at `project_dir`.
///
/// Files that cannot be read or parsed are skipped. A project without a
/// knowledge directory, or an empty query, yields no hits.
pub async fn search(project_dir: &Path, query: &str) -> Result<Vec<SearchHit>> {
    let keywords = keywords(query);
    if keywords.is_empty() {
        return Ok(Vec::new());
    }

    let mut hits = Vec::new();
    for (file, path) in markdown_files(project_dir).await? {
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "skipping unreadable knowledge file");
                continue;
            }
        };
        let doc = match document::parse(&text) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "skipping unparseable knowledge file");
                continue;
            }
        };

        let matching_chapters = match_document(&doc, &keywords);
        if !matching_chapters.is_empty() {
            hits.push(SearchHit {
                file,
                match_count: matching_chapters.len(),
                metadata: doc.metadata,
                matching_chapters,
            });
        }
    }

    tracing::debug!(query, hits = hits.len(), "search complete");
    Ok(hits)
}
