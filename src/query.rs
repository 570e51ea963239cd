//! Queries and their string checks.
//!
//! A query selects usage events of one kind (class, field or method) whose
//! names pass every configured [`StringCheck`]. Queries are also written and
//! read in a small text grammar:
//!
//! ```text
//! method:owner=[e]util.List;name=add
//! field:o="com.example.Config";n=[c]DEBUG
//! class:name=[w]Info
//! ```
//!
//! Keys may be abbreviated to their first letter. Values may be quoted and may
//! carry a mode marker: `[c]` contains, `[e]` exact, `[w]` contains word.
//! Unmarked values use [`DEFAULT_CHECK_MODE`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub use crate::config::DEFAULT_CHECK_MODE;
use crate::visitor::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMode {
    Exact,
    Contains,
    /// The pattern must cover whole dot-separated segments.
    ContainsWord,
}

impl CheckMode {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Exact => "[e]",
            Self::Contains => "[c]",
            Self::ContainsWord => "[w]",
        }
    }

    fn from_marker(value: &str) -> (Option<Self>, &str) {
        for mode in [Self::Exact, Self::Contains, Self::ContainsWord] {
            if let Some(rest) = value.strip_prefix(mode.marker()) {
                return (Some(mode), rest);
            }
        }
        (None, value)
    }
}

/// A case-sensitive test against one normalized string. Without a pattern
/// the check accepts everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StringCheck {
    pub mode: CheckMode,
    pub pattern: Option<String>,
}

impl StringCheck {
    pub fn new(mode: CheckMode, pattern: impl Into<String>) -> Self {
        Self {
            mode,
            pattern: Some(pattern.into()),
        }
    }

    pub fn exact(pattern: impl Into<String>) -> Self {
        Self::new(CheckMode::Exact, pattern)
    }

    pub fn contains(pattern: impl Into<String>) -> Self {
        Self::new(CheckMode::Contains, pattern)
    }

    pub fn contains_word(pattern: impl Into<String>) -> Self {
        Self::new(CheckMode::ContainsWord, pattern)
    }

    pub fn any() -> Self {
        Self {
            mode: DEFAULT_CHECK_MODE,
            pattern: None,
        }
    }

    pub fn is_any(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let Some(pattern) = self.pattern.as_deref() else {
            return true;
        };
        match self.mode {
            CheckMode::Exact => candidate == pattern,
            CheckMode::Contains => candidate.contains(pattern),
            CheckMode::ContainsWord => contains_word(candidate, pattern),
        }
    }
}

impl Default for StringCheck {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for StringCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pattern {
            Some(pattern) if needs_quotes(pattern) => {
                write!(f, "\"{}{pattern}\"", self.mode.marker())
            }
            Some(pattern) => write!(f, "{}{pattern}", self.mode.marker()),
            None => f.write_str("*"),
        }
    }
}

/// Patterns the grammar would otherwise trim, split or unquote.
fn needs_quotes(pattern: &str) -> bool {
    pattern.trim() != pattern
        || pattern.contains(';')
        || (pattern.len() > 1 && pattern.starts_with('"') && pattern.ends_with('"'))
}

/// A word match can only start at the beginning of the string or right after
/// a dot, and must end at the end of the string or right before a dot.
fn contains_word(haystack: &str, word: &str) -> bool {
    std::iter::once(0)
        .chain(haystack.match_indices('.').map(|(i, _)| i + 1))
        .any(|start| {
            haystack[start..]
                .strip_prefix(word)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    Class {
        name: StringCheck,
    },
    Field {
        owner: StringCheck,
        name: StringCheck,
        descriptor: StringCheck,
    },
    Method {
        owner: StringCheck,
        name: StringCheck,
        descriptor: StringCheck,
    },
}

impl Query {
    pub fn matches(&self, usage: &Usage<'_>) -> bool {
        match (self, usage) {
            (Self::Class { name }, Usage::Class { name: class }) => name.matches(class),
            (
                Self::Field {
                    owner,
                    name,
                    descriptor,
                },
                Usage::Field {
                    owner: field_owner,
                    name: field_name,
                    descriptor: field_descriptor,
                },
            ) => {
                owner.matches(field_owner)
                    && name.matches(field_name)
                    && descriptor.matches(field_descriptor)
            }
            (
                Self::Method {
                    owner,
                    name,
                    descriptor,
                },
                Usage::Method {
                    owner: method_owner,
                    name: method_name,
                    descriptor: method_descriptor,
                    ..
                },
            ) => {
                owner.matches(method_owner)
                    && name.matches(method_name)
                    && descriptor.matches(method_descriptor)
            }
            _ => false,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Class { .. } => "class",
            Self::Field { .. } => "field",
            Self::Method { .. } => "method",
        }
    }

    fn checks(&self) -> Vec<(&'static str, &StringCheck)> {
        match self {
            Self::Class { name } => vec![("name", name)],
            Self::Field {
                owner,
                name,
                descriptor,
            }
            | Self::Method {
                owner,
                name,
                descriptor,
            } => vec![("owner", owner), ("name", name), ("descriptor", descriptor)],
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.type_name())?;
        let mut wrote_any = false;
        for (key, check) in self.checks() {
            if check.is_any() {
                continue;
            }
            if wrote_any {
                f.write_str(";")?;
            }
            write!(f, "{key}={check}")?;
            wrote_any = true;
        }
        if !wrote_any {
            f.write_str("*")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryParseError {
    #[error("query {0:?} has no type prefix (expected class:, field: or method:)")]
    MissingType(String),

    #[error("unknown query type {0:?}")]
    UnknownType(String),

    #[error("expected key=value, got {0:?}")]
    MalformedPair(String),

    #[error("unknown key {key:?} for a {query_type} query")]
    UnknownKey { query_type: &'static str, key: String },

    #[error("key {0:?} given more than once")]
    DuplicateKey(&'static str),

    #[error("empty value for key {0:?}")]
    EmptyValue(&'static str),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QueryType {
    Class,
    Field,
    Method,
}

impl QueryType {
    fn name(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Field => "field",
            Self::Method => "method",
        }
    }

    fn canonical_key(self, key: &str) -> Option<&'static str> {
        let key = match key.to_ascii_lowercase().as_str() {
            "n" | "name" => "name",
            "o" | "owner" => "owner",
            "d" | "descriptor" => "descriptor",
            _ => return None,
        };
        match (self, key) {
            (Self::Class, "name") | (Self::Field | Self::Method, _) => Some(key),
            _ => None,
        }
    }
}

impl FromStr for Query {
    type Err = QueryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_part, tags) = s
            .split_once(':')
            .ok_or_else(|| QueryParseError::MissingType(s.to_string()))?;

        let query_type = match type_part.trim().to_ascii_lowercase().as_str() {
            "c" | "class" => QueryType::Class,
            "f" | "field" => QueryType::Field,
            "m" | "method" => QueryType::Method,
            other => return Err(QueryParseError::UnknownType(other.to_string())),
        };

        let mut owner = None;
        let mut name = None;
        let mut descriptor = None;

        let tags = tags.trim();
        if tags != "*" {
            for pair in split_pairs(tags).filter(|p| !p.trim().is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| QueryParseError::MalformedPair(pair.to_string()))?;
                let key_name = query_type.canonical_key(key.trim()).ok_or_else(|| {
                    QueryParseError::UnknownKey {
                        query_type: query_type.name(),
                        key: key.trim().to_string(),
                    }
                })?;
                let slot = match key_name {
                    "owner" => &mut owner,
                    "descriptor" => &mut descriptor,
                    _ => &mut name,
                };
                if slot.is_some() {
                    return Err(QueryParseError::DuplicateKey(key_name));
                }
                *slot = Some(parse_check(key_name, value)?);
            }
        }

        let owner = owner.unwrap_or_default();
        let name = name.unwrap_or_default();
        let descriptor = descriptor.unwrap_or_default();
        Ok(match query_type {
            QueryType::Class => Query::Class { name },
            QueryType::Field => Query::Field {
                owner,
                name,
                descriptor,
            },
            QueryType::Method => Query::Method {
                owner,
                name,
                descriptor,
            },
        })
    }
}

/// Splits on `;` outside double quotes.
fn split_pairs(tags: &str) -> impl Iterator<Item = &str> {
    let mut quoted = false;
    tags.split(move |c| {
        if c == '"' {
            quoted = !quoted;
        }
        c == ';' && !quoted
    })
}

fn parse_check(key: &'static str, value: &str) -> Result<StringCheck, QueryParseError> {
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    let (mode, pattern) = CheckMode::from_marker(value);
    if pattern.is_empty() {
        return Err(QueryParseError::EmptyValue(key));
    }
    Ok(StringCheck::new(mode.unwrap_or(DEFAULT_CHECK_MODE), pattern))
}
