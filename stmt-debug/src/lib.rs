// Breakpoint evaluation for intercepted SQL statements
//
// Decides, for every statement flowing through a debugging proxy, which
// registered breakpoints fire:
// - Matchers and processors as pluggable trait objects
// - Hit counts that fire exactly once under concurrent evaluation
// - Before / replacement / after hook dispatch
// - Suspension of breaking hits until a debugger session resumes them

pub mod breakpoint;
pub mod error;
pub mod evaluator;
pub mod matcher;
pub mod processor;
pub mod registry;
pub mod session;
pub mod types;

pub use breakpoint::{Breakpoint, BreakpointBuilder};
pub use error::{DebugError, DebugResult};
pub use evaluator::{Dispatch, Evaluator, Execution, ProcessorReport, StatementOutcome};
pub use matcher::{QueryMatcher, StatementMatcher, TextMatchKind, TextMatcher};
pub use processor::{LogProcessor, Phase, ProcessOutput, StatementProcessor, StaticProcessor};
pub use registry::BreakpointRegistry;
pub use session::{
    session_channel, AutoResume, BreakpointHit, DebuggerSession, PendingHit, Resume,
    SessionChannel, SuspendHandler,
};
pub use types::{BreakpointId, QueryType, StatementInfo, ThreadId};
