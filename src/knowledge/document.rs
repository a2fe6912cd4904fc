//! Knowledge document parsing, rendering, and chapter operations.
//!
//! The body is split on heading lines of depth 2 to 4 (`##`, `###`, `####`)
//! outside fenced code blocks. A chapter's content runs from its heading up
//! to, not including, the next heading; text before the first heading is the
//! introduction. Chapter operations consume the document and return the
//! changed one, leaving every other chapter byte-for-byte untouched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{KnowledgeError, ResourceKind, Result};
use crate::knowledge::frontmatter::{self, Metadata};
use crate::knowledge::types::{Chapter, ChapterRef, Document, InsertPosition, NewChapter};

/// Most chapters a document may hold.
pub const MAX_CHAPTERS: usize = 50;

/// Soft length limit for a chapter summary, in characters.
pub const SUMMARY_CHARS: usize = 100;

/// Level used for chapters added through the API.
pub const DEFAULT_LEVEL: u8 = 2;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{2,4})[ \t]+(.*\S)[ \t]*$").expect("valid heading pattern"));

/// Level and title of a chapter heading line.
pub fn heading(line: &str) -> Option<(u8, &str)> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let caps = HEADING.captures(line)?;
    let level = caps.get(1)?.as_str().len() as u8;
    let title = caps.get(2)?.as_str().trim();
    Some((level, title))
}

pub(crate) fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Whether `text` leaves a code fence open. An open fence would hide every
/// later heading of the document it is written into.
pub(crate) fn leaves_fence_open(text: &str) -> bool {
    text.split('\n').filter(|line| is_fence(line)).count() % 2 == 1
}

/// Lines of `text`, each paired with its heading if it is one. Lines inside
/// fenced code blocks are never headings.
fn scan(text: &str) -> impl Iterator<Item = (&str, Option<(u8, &str)>)> {
    let mut in_fence = false;
    text.split('\n').map(move |line| {
        if is_fence(line) {
            in_fence = !in_fence;
            return (line, None);
        }
        if in_fence {
            (line, None)
        } else {
            (line, heading(line))
        }
    })
}

/// Parse a full knowledge document.
pub fn parse(text: &str) -> Result<Document> {
    let (yaml, body) = frontmatter::split(text)?;
    let metadata = match yaml {
        Some(yaml) => Metadata::from_yaml(yaml)?,
        None => Metadata::default(),
    };
    let (introduction, chapters) = parse_body(body);
    Ok(Document {
        metadata,
        introduction: introduction.trim().to_string(),
        chapters,
    })
}

/// Split a body into its raw introduction and chapters.
pub fn parse_body(body: &str) -> (String, Vec<Chapter>) {
    let mut introduction: Vec<&str> = Vec::new();
    let mut chapters = Vec::new();
    let mut current: Option<(u8, &str, Vec<&str>)> = None;

    for (line, heading) in scan(body) {
        if let Some((level, title)) = heading {
            if let Some(done) = current.take() {
                chapters.push(finish_chapter(done));
            }
            current = Some((level, title, vec![line]));
        } else if let Some((_, _, lines)) = current.as_mut() {
            lines.push(line);
        } else {
            introduction.push(line);
        }
    }
    if let Some(done) = current {
        chapters.push(finish_chapter(done));
    }

    (introduction.join("\n"), chapters)
}

fn finish_chapter((level, title, lines): (u8, &str, Vec<&str>)) -> Chapter {
    Chapter {
        title: title.to_string(),
        level,
        summary: summarize(&lines[1..]),
        content: lines.join("\n"),
    }
}

/// First run of non-blank lines, joined with spaces. Stops at a blank line,
/// once the text passes [`SUMMARY_CHARS`], or at the end of the chapter.
fn summarize(lines: &[&str]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut length = 0;
    for (i, line) in lines.iter().enumerate() {
        let text = line.trim();
        if text.is_empty() {
            if parts.is_empty() {
                continue;
            }
            break;
        }
        length += text.chars().count() + usize::from(!parts.is_empty());
        parts.push(text);
        let next_blank = lines.get(i + 1).is_some_and(|next| next.trim().is_empty());
        if next_blank || length > SUMMARY_CHARS {
            break;
        }
    }
    parts.join(" ")
}

/// Render metadata and a body into the on-disk format.
pub fn render(metadata: &Metadata, body: &str) -> Result<String> {
    if metadata.is_empty() {
        return Err(KnowledgeError::invalid_content("document metadata cannot be empty"));
    }
    let yaml = metadata.to_yaml()?;
    let body = body.trim_end();
    if body.is_empty() {
        Ok(format!("---\n{yaml}---\n"))
    } else {
        Ok(format!("---\n{yaml}---\n{body}\n"))
    }
}

/// Reject text that would re-parse into extra chapters or swallow the
/// chapters after it.
fn check_no_headings(text: &str, what: &str) -> Result<()> {
    if scan(text).any(|(_, heading)| heading.is_some()) {
        return Err(KnowledgeError::invalid_content(format!(
            "{what} cannot contain level 2-4 headings; add them as separate chapters"
        )));
    }
    if leaves_fence_open(text) {
        return Err(KnowledgeError::invalid_content(format!(
            "{what} has an unclosed code fence"
        )));
    }
    Ok(())
}

fn check_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(KnowledgeError::invalid_content("chapter title cannot be empty"));
    }
    if title.contains(['\n', '\r']) {
        return Err(KnowledgeError::invalid_content("chapter title must be a single line"));
    }
    Ok(())
}

fn build_chapter(title: &str, level: u8, body: &str) -> Result<Chapter> {
    check_title(title)?;
    check_no_headings(body, "chapter content")?;

    let title = title.trim();
    let hashes = "#".repeat(usize::from(level));
    let body = body.trim();
    let content = if body.is_empty() {
        format!("{hashes} {title}")
    } else {
        format!("{hashes} {title}\n\n{body}")
    };
    let lines: Vec<&str> = content.split('\n').collect();
    Ok(Chapter {
        title: title.to_string(),
        level,
        summary: summarize(&lines[1..]),
        content,
    })
}

impl Document {
    /// Build a new document, validating everything before anything is kept.
    pub fn new(metadata: Metadata, introduction: &str, chapters: &[NewChapter]) -> Result<Self> {
        if metadata.title.trim().is_empty() {
            return Err(KnowledgeError::invalid_content("title cannot be empty"));
        }
        if metadata.keywords.is_empty() {
            return Err(KnowledgeError::invalid_content("at least one keyword is required"));
        }
        if chapters.len() > MAX_CHAPTERS {
            return Err(KnowledgeError::invalid_content(format!(
                "a document holds at most {MAX_CHAPTERS} chapters"
            )));
        }
        check_no_headings(introduction, "introduction")?;

        let mut built: Vec<Chapter> = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            let chapter = build_chapter(&chapter.title, DEFAULT_LEVEL, &chapter.content)?;
            if built.iter().any(|c| c.title == chapter.title) {
                return Err(KnowledgeError::invalid_content(format!(
                    "duplicate chapter title: {}",
                    chapter.title
                )));
            }
            built.push(chapter);
        }

        Ok(Self {
            metadata,
            introduction: introduction.trim().to_string(),
            chapters: built,
        })
    }

    /// Normalised body: introduction and chapters separated by blank lines.
    pub fn body(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.chapters.len() + 1);
        if !self.introduction.trim().is_empty() {
            parts.push(self.introduction.trim());
        }
        parts.extend(self.chapters.iter().map(|c| c.content.trim_end()));
        parts.join("\n\n")
    }

    pub fn render(&self) -> Result<String> {
        render(&self.metadata, &self.body())
    }

    /// Position of the chapter `target` names.
    pub fn position(&self, target: &ChapterRef) -> Result<usize> {
        let found = match target {
            ChapterRef::Title(title) => self.chapters.iter().position(|c| &c.title == title),
            ChapterRef::Index(index) => (*index < self.chapters.len()).then_some(*index),
        };
        found.ok_or_else(|| KnowledgeError::not_found(ResourceKind::Chapter, target.to_string()))
    }

    pub fn chapter(&self, target: &ChapterRef) -> Result<&Chapter> {
        Ok(&self.chapters[self.position(target)?])
    }

    /// Replace a chapter's body, keeping its heading and level.
    pub fn replace_chapter(mut self, target: &ChapterRef, content: &str) -> Result<Self> {
        let index = self.position(target)?;
        let old = &self.chapters[index];
        let replacement = build_chapter(&old.title, old.level, content)?;
        self.chapters[index] = replacement;
        Ok(self)
    }

    /// Insert a new level-2 chapter.
    pub fn insert_chapter(mut self, chapter: &NewChapter, at: &InsertPosition) -> Result<Self> {
        if self.chapters.len() >= MAX_CHAPTERS {
            return Err(KnowledgeError::invalid_content(format!(
                "a document holds at most {MAX_CHAPTERS} chapters"
            )));
        }
        let chapter = build_chapter(&chapter.title, DEFAULT_LEVEL, &chapter.content)?;
        if self.chapters.iter().any(|c| c.title == chapter.title) {
            return Err(KnowledgeError::already_exists(ResourceKind::Chapter, chapter.title));
        }

        let index = match at {
            InsertPosition::Start => 0,
            InsertPosition::End => self.chapters.len(),
            InsertPosition::Before(target) => self.position(target)?,
            InsertPosition::After(target) => self.position(target)? + 1,
        };
        self.chapters.insert(index, chapter);
        Ok(self)
    }

    pub fn remove_chapter(mut self, target: &ChapterRef) -> Result<Self> {
        let index = self.position(target)?;
        self.chapters.remove(index);
        Ok(self)
    }
}
