// Statement matchers
//
// A matcher decides whether an intercepted statement is relevant to a
// breakpoint. Breakpoints only see the trait; the text and query matchers
// below are the standard criteria a console editor produces.

use crate::error::DebugResult;
use crate::types::{QueryType, StatementInfo};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;

/// Predicate over an intercepted statement
///
/// Implementations are called concurrently from every intercepting thread and
/// must not block.
pub trait StatementMatcher: Send + Sync {
    fn matches(&self, info: &StatementInfo) -> bool;
}

impl<F> StatementMatcher for F
where
    F: Fn(&StatementInfo) -> bool + Send + Sync,
{
    fn matches(&self, info: &StatementInfo) -> bool {
        self(info)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatchKind {
    StartsWith,
    Contains,
    Equals,
    /// The whole text must match the regular expression
    Regex,
}

#[derive(Debug, Clone)]
enum Needle {
    StartsWith(String),
    Contains(String),
    Equals(String),
    Regex(Regex),
}

/// Matches a piece of text (statement, thread name) against a pattern
#[derive(Debug, Clone)]
pub struct TextMatcher {
    kind: TextMatchKind,
    pattern: String,
    case_sensitive: bool,
    needle: Needle,
}

impl TextMatcher {
    pub fn new(
        kind: TextMatchKind,
        pattern: impl Into<String>,
        case_sensitive: bool,
    ) -> DebugResult<Self> {
        let pattern = pattern.into();

        let folded = if case_sensitive {
            pattern.clone()
        } else {
            pattern.to_lowercase()
        };

        let needle = match kind {
            TextMatchKind::StartsWith => Needle::StartsWith(folded),
            TextMatchKind::Contains => Needle::Contains(folded),
            TextMatchKind::Equals => Needle::Equals(folded),
            TextMatchKind::Regex => {
                // Must stand alone so it cannot escape the anchors below
                Regex::new(&pattern)?;
                Needle::Regex(
                    RegexBuilder::new(&format!("^(?:{})$", pattern))
                        .case_insensitive(!case_sensitive)
                        .build()?,
                )
            }
        };

        Ok(Self {
            kind,
            pattern,
            case_sensitive,
            needle,
        })
    }

    pub fn contains(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            kind: TextMatchKind::Contains,
            needle: Needle::Contains(pattern.to_lowercase()),
            pattern,
            case_sensitive: false,
        }
    }

    pub fn kind(&self) -> TextMatchKind {
        self.kind
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.needle {
            Needle::StartsWith(needle) => self.fold(text).starts_with(needle.as_str()),
            Needle::Contains(needle) => self.fold(text).contains(needle.as_str()),
            Needle::Equals(needle) => self.fold(text) == needle.as_str(),
            Needle::Regex(regex) => regex.is_match(text),
        }
    }

    fn fold<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.case_sensitive {
            Cow::Borrowed(text)
        } else {
            Cow::Owned(text.to_lowercase())
        }
    }
}

/// Conjunction of the criteria the console lets a user combine
///
/// Absent criteria do not constrain; an empty matcher matches every statement.
#[derive(Debug, Clone, Default)]
pub struct QueryMatcher {
    pub thread_name: Option<TextMatcher>,
    pub statement: Option<TextMatcher>,
    pub query_types: Option<HashSet<QueryType>>,
}

impl QueryMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread_name(mut self, matcher: TextMatcher) -> Self {
        self.thread_name = Some(matcher);
        self
    }

    pub fn with_statement(mut self, matcher: TextMatcher) -> Self {
        self.statement = Some(matcher);
        self
    }

    pub fn with_query_types(mut self, types: impl IntoIterator<Item = QueryType>) -> Self {
        self.query_types = Some(types.into_iter().collect());
        self
    }
}

impl StatementMatcher for QueryMatcher {
    fn matches(&self, info: &StatementInfo) -> bool {
        if let Some(types) = &self.query_types {
            if !types.contains(&info.query_type) {
                return false;
            }
        }

        if let Some(thread_name) = &self.thread_name {
            if !thread_name.is_match(&info.thread_name) {
                return false;
            }
        }

        match &self.statement {
            Some(statement) => info.queries.iter().any(|sql| statement.is_match(sql)),
            None => true,
        }
    }
}
