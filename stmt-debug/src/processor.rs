// Statement processors
//
// Hooks run on behalf of a matched breakpoint: before the statement, in place
// of it, or after it completed.

use crate::types::StatementInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Processor-defined payload returned from a hook
pub type ProcessOutput = serde_json::Value;

/// Point in a statement's execution at which a processor runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Before,
    Replacement,
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Before => "before",
            Phase::Replacement => "replacement",
            Phase::After => "after",
        };
        f.write_str(name)
    }
}

/// Action over an intercepted statement
///
/// Errors are returned to whoever invoked the processor; the breakpoint does
/// not inspect them.
pub trait StatementProcessor: Send + Sync {
    fn process(&self, info: &StatementInfo) -> anyhow::Result<ProcessOutput>;
}

impl<F> StatementProcessor for F
where
    F: Fn(&StatementInfo) -> anyhow::Result<ProcessOutput> + Send + Sync,
{
    fn process(&self, info: &StatementInfo) -> anyhow::Result<ProcessOutput> {
        self(info)
    }
}

/// Logs the statement it is invoked for
#[derive(Debug, Clone)]
pub struct LogProcessor {
    label: String,
}

impl LogProcessor {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl StatementProcessor for LogProcessor {
    fn process(&self, info: &StatementInfo) -> anyhow::Result<ProcessOutput> {
        info!(
            label = %self.label,
            thread = %info.thread_name,
            query_type = %info.query_type,
            "{}",
            info.sql()
        );
        Ok(ProcessOutput::Null)
    }
}

/// Yields a fixed text, typically the statement to run instead of the
/// intercepted one
#[derive(Debug, Clone)]
pub struct StaticProcessor {
    text: String,
}

impl StaticProcessor {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl StatementProcessor for StaticProcessor {
    fn process(&self, _info: &StatementInfo) -> anyhow::Result<ProcessOutput> {
        Ok(ProcessOutput::String(self.text.clone()))
    }
}
