// Statement type definitions
//
// Common types shared by matchers, processors and the evaluator

use serde::{Deserialize, Serialize};
use std::fmt;

pub type BreakpointId = i32;
pub type ThreadId = u64;

// Coarse classification of an intercepted statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl QueryType {
    /// Classify a statement by its leading keyword
    pub fn detect(sql: &str) -> Self {
        let keyword: String = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();

        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" | "WITH" => QueryType::Select,
            "INSERT" => QueryType::Insert,
            "UPDATE" => QueryType::Update,
            "DELETE" => QueryType::Delete,
            _ => QueryType::Other,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryType::Select => "SELECT",
            QueryType::Insert => "INSERT",
            QueryType::Update => "UPDATE",
            QueryType::Delete => "DELETE",
            QueryType::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// One intercepted operation as seen by matchers and processors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementInfo {
    pub query_type: QueryType,
    pub queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
    #[serde(default)]
    pub thread_name: String,
    #[serde(default)]
    pub thread_id: ThreadId,
}

impl StatementInfo {
    /// Describe a single statement, classifying it from its text
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        Self {
            query_type: QueryType::detect(&sql),
            queries: vec![sql],
            parameters: None,
            thread_name: String::new(),
            thread_id: 0,
        }
    }

    /// Describe a batch; the batch is classified by its first statement
    pub fn batch<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queries: Vec<String> = queries.into_iter().map(Into::into).collect();
        let query_type = queries
            .first()
            .map(String::as_str)
            .map_or(QueryType::Other, QueryType::detect);

        Self {
            query_type,
            queries,
            parameters: None,
            thread_name: String::new(),
            thread_id: 0,
        }
    }

    pub fn with_thread(mut self, thread_id: ThreadId, thread_name: impl Into<String>) -> Self {
        self.thread_id = thread_id;
        self.thread_name = thread_name.into();
        self
    }

    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = Some(parameters.into());
        self
    }

    /// Full statement text, batch entries separated by `;`
    pub fn sql(&self) -> String {
        self.queries.join(";\n")
    }
}
