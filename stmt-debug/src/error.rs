// Error definitions
//
// Matching itself never fails; errors come from registration and from the
// processors and statements run on behalf of a matched breakpoint.

use crate::processor::Phase;
use crate::types::BreakpointId;
use thiserror::Error;

pub type DebugResult<T> = Result<T, DebugError>;

#[derive(Debug, Error)]
pub enum DebugError {
    #[error("Breakpoint {0} is already registered")]
    DuplicateBreakpoint(BreakpointId),

    #[error("Breakpoint {0} not found")]
    BreakpointNotFound(BreakpointId),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("{phase} processor of breakpoint {breakpoint_id} failed: {source}")]
    Processor {
        breakpoint_id: BreakpointId,
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },

    #[error("Statement execution failed: {0}")]
    Statement(#[source] anyhow::Error),

    #[error("Statement aborted at breakpoint(s) {breakpoint_ids:?}")]
    Aborted { breakpoint_ids: Vec<BreakpointId> },
}
