// Breakpoint definitions
//
// JSON description of the breakpoints to replay against, built into
// stmt-debug breakpoints with the standard matchers and processors.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use stmt_debug::{
    Breakpoint, BreakpointId, DebugResult, LogProcessor, Phase, QueryMatcher, QueryType,
    StatementProcessor, StaticProcessor, TextMatchKind, TextMatcher,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakpointDefinition {
    pub id: BreakpointId,
    #[serde(default)]
    pub hit_count: Option<u32>,
    #[serde(default)]
    pub breaking: bool,
    #[serde(default)]
    pub matcher: Option<MatcherDefinition>,
    #[serde(default)]
    pub before: Option<ProcessorDefinition>,
    #[serde(default)]
    pub replacement: Option<ProcessorDefinition>,
    #[serde(default)]
    pub after: Option<ProcessorDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherDefinition {
    #[serde(default)]
    pub thread_name: Option<TextDefinition>,
    #[serde(default)]
    pub statement: Option<TextDefinition>,
    #[serde(default)]
    pub query_types: Option<Vec<QueryType>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextDefinition {
    pub kind: TextMatchKind,
    pub pattern: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorDefinition {
    /// Log the statement under a label
    Log(String),
    /// Yield a fixed text
    Static(String),
}

impl TextDefinition {
    fn build(&self) -> DebugResult<TextMatcher> {
        TextMatcher::new(self.kind, self.pattern.clone(), self.case_sensitive)
    }
}

impl MatcherDefinition {
    fn build(&self) -> DebugResult<QueryMatcher> {
        let mut matcher = QueryMatcher::new();

        if let Some(thread_name) = &self.thread_name {
            matcher = matcher.with_thread_name(thread_name.build()?);
        }
        if let Some(statement) = &self.statement {
            matcher = matcher.with_statement(statement.build()?);
        }
        if let Some(types) = &self.query_types {
            matcher = matcher.with_query_types(types.iter().copied());
        }

        Ok(matcher)
    }
}

impl ProcessorDefinition {
    fn build(&self) -> Box<dyn StatementProcessor> {
        match self {
            ProcessorDefinition::Log(label) => Box::new(LogProcessor::new(label.clone())),
            ProcessorDefinition::Static(text) => Box::new(StaticProcessor::new(text.clone())),
        }
    }
}

impl BreakpointDefinition {
    pub fn build(&self) -> DebugResult<Breakpoint> {
        let mut builder = Breakpoint::builder(self.id).breaking(self.breaking);

        if let Some(hit_count) = self.hit_count {
            builder = builder.hit_count(hit_count);
        }
        if let Some(matcher) = &self.matcher {
            builder = builder.matcher(matcher.build()?);
        }

        let slots = [
            (Phase::Before, &self.before),
            (Phase::Replacement, &self.replacement),
            (Phase::After, &self.after),
        ];
        for (phase, definition) in slots {
            if let Some(definition) = definition {
                builder = builder.processor(phase, definition.build());
            }
        }

        Ok(builder.build())
    }
}

/// Parse a JSON array of breakpoint definitions
pub fn parse(json: &str) -> Result<Vec<Breakpoint>> {
    let definitions: Vec<BreakpointDefinition> =
        serde_json::from_str(json).context("Invalid breakpoint definitions")?;

    definitions
        .iter()
        .map(|definition| {
            definition
                .build()
                .with_context(|| format!("Invalid breakpoint {}", definition.id))
        })
        .collect()
}

pub fn load(path: &Path) -> Result<Vec<Breakpoint>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read breakpoint definitions from {}", path.display()))?;
    parse(&json).with_context(|| format!("Failed to load {}", path.display()))
}
