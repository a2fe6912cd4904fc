//! YAML front matter as a closed value type.
//!
//! Front matter is parsed into [`MetaValue`], which can only hold scalars,
//! sequences, and mappings. YAML tags (`!!python/object`, `!custom`, ...)
//! have no representation and fail the whole parse, so nothing in a document
//! header can ask for code to run.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::{KnowledgeError, Result};

/// A front matter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<MetaValue>),
    Mapping(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    /// Scalars rendered as text; `None` for null, sequences, and mappings.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Null | Self::Sequence(_) | Self::Mapping(_) => None,
        }
    }

    fn to_yaml(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Float(f) => Value::Number((*f).into()),
            Self::String(s) => Value::String(s.clone()),
            Self::Sequence(items) => Value::Sequence(items.iter().map(Self::to_yaml).collect()),
            Self::Mapping(map) => Value::Mapping(
                map.iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.to_yaml()))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<Value> for MetaValue {
    type Error = KnowledgeError;

    fn try_from(value: Value) -> Result<Self> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().ok_or_else(|| {
                    KnowledgeError::invalid_content("unsupported number in front matter")
                })?),
            },
            Value::String(s) => Self::String(s),
            Value::Sequence(items) => Self::Sequence(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Mapping(map) => Self::Mapping(convert_mapping(map)?),
            Value::Tagged(tagged) => {
                return Err(KnowledgeError::invalid_content(format!(
                    "tagged value {} is not allowed in front matter",
                    tagged.tag
                )))
            }
        })
    }
}

fn convert_mapping(map: Mapping) -> Result<BTreeMap<String, MetaValue>> {
    map.into_iter()
        .map(|(key, value)| {
            let key = MetaValue::try_from(key)?.as_text().ok_or_else(|| {
                KnowledgeError::invalid_content("front matter keys must be scalars")
            })?;
            Ok((key, MetaValue::try_from(value)?))
        })
        .collect()
}

/// Document metadata carried in the front matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub title: String,
    pub keywords: Vec<String>,
    pub created: String,
    pub updated: String,
    /// Keys other than the four above, kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, MetaValue>,
}

impl Metadata {
    /// Fresh metadata with both timestamps set to now. Keywords are
    /// trimmed, blank ones dropped, and duplicates removed keeping the first.
    pub fn new(title: impl Into<String>, keywords: &[String]) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            title: title.into(),
            keywords: dedup_keywords(keywords.iter().map(|k| k.trim().to_string())),
            created: now.clone(),
            updated: now,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.keywords.is_empty()
            && self.created.is_empty()
            && self.updated.is_empty()
            && self.extra.is_empty()
    }

    pub fn touch(&mut self) {
        self.updated = chrono::Utc::now().to_rfc3339();
    }

    /// Parse the YAML between the `---` fences.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)
            .map_err(|e| KnowledgeError::invalid_content(format!("invalid front matter: {e}")))?;
        let mut fields = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(map) => convert_mapping(map)?,
            Value::Tagged(tagged) => {
                return Err(KnowledgeError::invalid_content(format!(
                    "tagged value {} is not allowed in front matter",
                    tagged.tag
                )))
            }
            _ => return Err(KnowledgeError::invalid_content("front matter must be a mapping")),
        };

        let mut text_field = |key: &str| {
            fields
                .remove(key)
                .and_then(|v| v.as_text())
                .unwrap_or_default()
        };
        let title = text_field("title");
        let created = text_field("created");
        let updated = text_field("updated");

        let keywords = match fields.remove("keywords") {
            Some(MetaValue::Sequence(items)) => {
                dedup_keywords(items.iter().filter_map(MetaValue::as_text))
            }
            Some(scalar) => dedup_keywords(scalar.as_text()),
            None => Vec::new(),
        };

        Ok(Self {
            title,
            keywords,
            created,
            updated,
            extra: fields,
        })
    }

    /// Serialize to YAML in the canonical key order: title, keywords,
    /// created, updated, then any extra keys.
    pub fn to_yaml(&self) -> Result<String> {
        let mut map = Mapping::new();
        map.insert("title".into(), Value::String(self.title.clone()));
        map.insert(
            "keywords".into(),
            Value::Sequence(self.keywords.iter().cloned().map(Value::String).collect()),
        );
        map.insert("created".into(), Value::String(self.created.clone()));
        map.insert("updated".into(), Value::String(self.updated.clone()));
        for (key, value) in &self.extra {
            map.insert(Value::String(key.clone()), value.to_yaml());
        }
        serde_yaml::to_string(&map)
            .map_err(|e| KnowledgeError::invalid_content(format!("front matter encoding: {e}")))
    }
}

fn dedup_keywords(keywords: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for keyword in keywords {
        if !keyword.is_empty() && !seen.contains(&keyword) {
            seen.push(keyword);
        }
    }
    seen
}

/// Split `text` into its front matter block (without fences) and the body.
///
/// Text without an opening `---` line has no front matter. An opening fence
/// without a closing one is invalid.
pub fn split(text: &str) -> Result<(Option<&str>, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(first_end) = text.find('\n') else {
        return Ok((None, text));
    };
    if text[..first_end].trim_end() != "---" {
        return Ok((None, text));
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    for line in text[yaml_start..].split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if bare == "---" || bare == "..." {
            let yaml = &text[yaml_start..offset];
            let body = &text[offset + line.len()..];
            return Ok((Some(yaml), body));
        }
        offset += line.len();
    }
    Err(KnowledgeError::invalid_content("front matter is not terminated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_extra_fields() {
        let yaml = "title: API Guide\nkeywords: [api, rest, api]\ncreated: 2024-01-01T00:00:00Z\nupdated: 2024-01-02T00:00:00Z\nversion: 3\ntags:\n  owner: team\n";
        let meta = Metadata::from_yaml(yaml).unwrap();
        assert_eq!(meta.title, "API Guide");
        assert_eq!(meta.keywords, vec!["api", "rest"]);
        assert_eq!(meta.created, "2024-01-01T00:00:00Z");
        assert_eq!(meta.extra["version"], MetaValue::Integer(3));
        let MetaValue::Mapping(tags) = &meta.extra["tags"] else {
            panic!("expected mapping");
        };
        assert_eq!(tags["owner"], MetaValue::String("team".into()));
    }

    #[test]
    fn tagged_values_are_rejected() {
        for yaml in [
            "title: !!python/object/apply:os.system ['echo hacked']\n",
            "title: x\nextra: !custom {a: 1}\n",
            "!!python/object:__main__.Exploit {}\n",
        ] {
            let err = Metadata::from_yaml(yaml).unwrap_err();
            assert_eq!(err.code(), "INVALID_CONTENT", "yaml: {yaml}");
        }
    }

    #[test]
    fn malformed_yaml_is_invalid_content() {
        let err = Metadata::from_yaml("title: [unclosed\n").unwrap_err();
        assert_eq!(err.code(), "INVALID_CONTENT");
        let err = Metadata::from_yaml("- just\n- a list\n").unwrap_err();
        assert_eq!(err.code(), "INVALID_CONTENT");
    }

    #[test]
    fn yaml_round_trip_keeps_values() {
        let mut meta = Metadata::new("Guide: part 1", &["api".into(), "  ".into(), "yes".into()]);
        meta.extra.insert("priority".into(), MetaValue::Float(0.5));
        meta.extra.insert("draft".into(), MetaValue::Bool(true));

        let yaml = meta.to_yaml().unwrap();
        assert!(yaml.starts_with("title:"));
        let reparsed = Metadata::from_yaml(&yaml).unwrap();
        assert_eq!(reparsed, meta);
        assert_eq!(reparsed.keywords, vec!["api", "yes"]);
    }

    #[test]
    fn split_finds_fences() {
        let (yaml, body) = split("---\ntitle: x\n---\nbody text\n").unwrap();
        assert_eq!(yaml, Some("title: x\n"));
        assert_eq!(body, "body text\n");

        let (yaml, body) = split("no front matter").unwrap();
        assert!(yaml.is_none());
        assert_eq!(body, "no front matter");

        let (yaml, body) = split("---\r\ntitle: x\r\n---\r\nbody").unwrap();
        assert_eq!(yaml, Some("title: x\r\n"));
        assert_eq!(body, "body");

        assert!(split("---\ntitle: x\nbody without closing fence\n").is_err());
    }
}
