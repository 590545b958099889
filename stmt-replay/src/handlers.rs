// Replay request handling
//
// Turns one line of input (an intercepted statement as JSON) into one line of
// output describing what the breakpoints did with it.

use serde::Serialize;
use serde_json::{json, Value};
use stmt_debug::{BreakpointId, Evaluator, Execution, ProcessOutput, StatementInfo, ThreadId};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct ExecutionReport {
    thread_id: ThreadId,
    #[serde(flatten)]
    execution: Execution,
}

#[derive(Debug, Serialize)]
struct PreviewReport {
    thread_id: ThreadId,
    hits: Vec<BreakpointId>,
}

pub struct ReplayHandler {
    evaluator: Evaluator,
    preview: bool,
}

impl ReplayHandler {
    pub fn new(evaluator: Evaluator, preview: bool) -> Self {
        Self { evaluator, preview }
    }

    pub fn handle_line(&self, line: &str) -> Value {
        let info: StatementInfo = match serde_json::from_str(line) {
            Ok(info) => info,
            Err(e) => {
                warn!("Invalid statement: {}", e);
                return json!({ "error": format!("Invalid statement: {}", e) });
            }
        };

        if self.preview {
            let report = PreviewReport {
                thread_id: info.thread_id,
                hits: self.evaluator.preview(&info),
            };
            return to_value(&report);
        }

        // The replayed statement only echoes its text
        let echo = |info: &StatementInfo| -> anyhow::Result<ProcessOutput> {
            Ok(ProcessOutput::String(info.sql()))
        };
        let result = self.evaluator.execute(&info, echo);

        match result {
            Ok(execution) => {
                debug!("Statement hit {:?}", execution.hits);
                to_value(&ExecutionReport {
                    thread_id: info.thread_id,
                    execution,
                })
            }
            Err(e) => {
                warn!("Statement failed: {}", e);
                json!({ "thread_id": info.thread_id, "error": e.to_string() })
            }
        }
    }
}

fn to_value<T: Serialize>(report: &T) -> Value {
    serde_json::to_value(report).unwrap_or_else(|e| json!({ "error": e.to_string() }))
}
