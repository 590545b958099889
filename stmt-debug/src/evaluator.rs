// Breakpoint evaluation over the registry
//
// Tests every registered breakpoint against an intercepted statement and
// drives the before / replacement / after hooks of the ones that fired.

use crate::breakpoint::Breakpoint;
use crate::error::{DebugError, DebugResult};
use crate::processor::{Phase, ProcessOutput};
use crate::registry::BreakpointRegistry;
use crate::session::{AutoResume, BreakpointHit, Resume, SuspendHandler};
use crate::types::{BreakpointId, StatementInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output of one processor invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorReport {
    pub breakpoint_id: BreakpointId,
    pub phase: Phase,
    pub output: ProcessOutput,
}

/// What happened to the intercepted statement itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatementOutcome {
    Executed { output: ProcessOutput },
    Replaced,
    Skipped,
}

/// Result of driving one statement through its breakpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub hits: Vec<BreakpointId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<Resume>,
    pub outcome: StatementOutcome,
    pub reports: Vec<ProcessorReport>,
}

/// Breakpoints that fired for one statement, in registration order
#[derive(Debug, Clone, Default)]
pub struct Dispatch {
    breakpoints: Vec<Arc<Breakpoint>>,
}

impl Dispatch {
    pub fn breakpoints(&self) -> &[Arc<Breakpoint>] {
        &self.breakpoints
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn breakpoint_ids(&self) -> Vec<BreakpointId> {
        self.breakpoints.iter().map(|bp| bp.id()).collect()
    }

    /// Whether the caller must suspend before the statement runs
    pub fn is_breaking(&self) -> bool {
        self.breakpoints.iter().any(|bp| bp.is_breaking())
    }

    pub fn breaking_ids(&self) -> Vec<BreakpointId> {
        self.breakpoints
            .iter()
            .filter(|bp| bp.is_breaking())
            .map(|bp| bp.id())
            .collect()
    }

    /// Whether the statement's own effect is replaced
    pub fn has_replacement(&self) -> bool {
        self.breakpoints
            .iter()
            .any(|bp| bp.replacement_processor().is_some())
    }

    /// Run one processor slot of every matched breakpoint, in order
    ///
    /// Stops at the first failing processor.
    pub fn run_phase(
        &self,
        phase: Phase,
        info: &StatementInfo,
    ) -> DebugResult<Vec<ProcessorReport>> {
        let mut reports = Vec::new();

        for breakpoint in &self.breakpoints {
            let Some(processor) = breakpoint.processor(phase) else {
                continue;
            };

            debug!("Running {} processor of breakpoint {}", phase, breakpoint.id());

            let output = processor
                .process(info)
                .map_err(|source| DebugError::Processor {
                    breakpoint_id: breakpoint.id(),
                    phase,
                    source,
                })?;

            reports.push(ProcessorReport {
                breakpoint_id: breakpoint.id(),
                phase,
                output,
            });
        }

        Ok(reports)
    }
}

/// Evaluates intercepted statements against a shared registry
///
/// Cheap to clone; every intercepting thread may hold its own copy.
#[derive(Clone)]
pub struct Evaluator {
    registry: Arc<BreakpointRegistry>,
    suspender: Arc<dyn SuspendHandler>,
}

impl Evaluator {
    /// Evaluator whose breaking hits resume immediately
    pub fn new(registry: Arc<BreakpointRegistry>) -> Self {
        Self {
            registry,
            suspender: Arc::new(AutoResume::default()),
        }
    }

    pub fn with_suspend_handler(mut self, handler: impl SuspendHandler + 'static) -> Self {
        self.suspender = Arc::new(handler);
        self
    }

    pub fn registry(&self) -> &Arc<BreakpointRegistry> {
        &self.registry
    }

    /// Every breakpoint that fires for `info`, consuming hit counts
    pub fn evaluate(&self, info: &StatementInfo) -> Dispatch {
        let breakpoints: Vec<Arc<Breakpoint>> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|bp| bp.matches(info, true))
            .collect();

        if !breakpoints.is_empty() {
            debug!(
                "Statement on thread '{}' hit {} breakpoint(s)",
                info.thread_name,
                breakpoints.len()
            );
        }

        Dispatch { breakpoints }
    }

    /// The first breakpoint that fires; later ones are not evaluated
    pub fn first_match(&self, info: &StatementInfo) -> Option<Arc<Breakpoint>> {
        self.registry
            .snapshot()
            .into_iter()
            .find(|bp| bp.matches(info, true))
    }

    /// Ids of the breakpoints whose matcher accepts `info`, without touching
    /// any hit count
    pub fn preview(&self, info: &StatementInfo) -> Vec<BreakpointId> {
        self.registry
            .snapshot()
            .iter()
            .filter(|bp| bp.matches(info, false))
            .map(|bp| bp.id())
            .collect()
    }

    /// Drive one intercepted statement through the breakpoints it hits
    ///
    /// `statement` performs the original operation; it is not called when a
    /// matched breakpoint replaces it or the debugger skips or fails it.
    pub fn execute<F>(&self, info: &StatementInfo, statement: F) -> DebugResult<Execution>
    where
        F: FnOnce(&StatementInfo) -> anyhow::Result<ProcessOutput>,
    {
        let dispatch = self.evaluate(info);
        let hits = dispatch.breakpoint_ids();

        if dispatch.is_empty() {
            let output = statement(info).map_err(DebugError::Statement)?;
            return Ok(Execution {
                hits,
                resume: None,
                outcome: StatementOutcome::Executed { output },
                reports: Vec::new(),
            });
        }

        let mut reports = dispatch.run_phase(Phase::Before, info)?;

        let resume = if dispatch.is_breaking() {
            let hit = BreakpointHit {
                breakpoint_ids: dispatch.breaking_ids(),
                statement: info.clone(),
                thread_name: info.thread_name.clone(),
            };
            Some(self.suspender.suspend(&hit))
        } else {
            None
        };

        match resume {
            Some(Resume::Fail) => {
                warn!("Statement aborted at breakpoint(s) {:?}", hits);
                return Err(DebugError::Aborted {
                    breakpoint_ids: dispatch.breaking_ids(),
                });
            }
            Some(Resume::Skip) => {
                info!("Statement skipped at breakpoint(s) {:?}", hits);
                return Ok(Execution {
                    hits,
                    resume,
                    outcome: StatementOutcome::Skipped,
                    reports,
                });
            }
            Some(Resume::Run) | None => {}
        }

        let outcome = if dispatch.has_replacement() {
            reports.extend(dispatch.run_phase(Phase::Replacement, info)?);
            StatementOutcome::Replaced
        } else {
            let output = statement(info).map_err(DebugError::Statement)?;
            StatementOutcome::Executed { output }
        };

        reports.extend(dispatch.run_phase(Phase::After, info)?);

        Ok(Execution {
            hits,
            resume,
            outcome,
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{QueryMatcher, TextMatcher};
    use crate::processor::{StatementProcessor, StaticProcessor};
    use crate::session::session_channel;
    use crate::types::QueryType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, entry: &str) -> impl StatementProcessor + 'static {
        let log = Arc::clone(log);
        let entry = entry.to_string();
        move |_: &StatementInfo| -> anyhow::Result<ProcessOutput> {
            log.lock().unwrap().push(entry.clone());
            Ok(ProcessOutput::String(entry.clone()))
        }
    }

    fn run_statement(log: &Log) -> impl FnOnce(&StatementInfo) -> anyhow::Result<ProcessOutput> {
        let log = Arc::clone(log);
        move |info: &StatementInfo| -> anyhow::Result<ProcessOutput> {
            log.lock().unwrap().push("statement".to_string());
            Ok(ProcessOutput::String(info.sql()))
        }
    }

    fn deletes() -> QueryMatcher {
        QueryMatcher::new().with_query_types([QueryType::Delete])
    }

    fn evaluator(breakpoints: Vec<Breakpoint>) -> Evaluator {
        let registry = Arc::new(BreakpointRegistry::new());
        registry.replace_all(breakpoints).unwrap();
        Evaluator::new(registry)
    }

    #[test]
    fn test_evaluate_collects_all_matches_in_order() {
        let evaluator = evaluator(vec![
            Breakpoint::builder(3).matcher(deletes()).build(),
            Breakpoint::builder(1).matcher(QueryMatcher::new()).build(),
            Breakpoint::builder(2)
                .matcher(QueryMatcher::new().with_statement(TextMatcher::contains("author")))
                .build(),
        ]);

        let dispatch = evaluator.evaluate(&StatementInfo::new("DELETE FROM book"));
        assert_eq!(dispatch.breakpoint_ids(), vec![3, 1]);
        assert!(!dispatch.is_breaking());

        let dispatch = evaluator.evaluate(&StatementInfo::new("SELECT * FROM author"));
        assert_eq!(dispatch.breakpoint_ids(), vec![1, 2]);
    }

    #[test]
    fn test_first_match_leaves_later_counters_alone() {
        let evaluator = evaluator(vec![
            Breakpoint::builder(1).matcher(QueryMatcher::new()).build(),
            Breakpoint::builder(2).hit_count(2).build(),
        ]);
        let info = StatementInfo::new("SELECT 1");

        assert_eq!(evaluator.first_match(&info).unwrap().id(), 1);
        let second = evaluator.registry().get(2).unwrap();
        assert_eq!(second.current_hit_count(), Some(2));
    }

    #[test]
    fn test_preview_does_not_consume_hit_counts() {
        let evaluator = evaluator(vec![
            Breakpoint::builder(1).matcher(deletes()).hit_count(1).build(),
            Breakpoint::builder(2).hit_count(1).build(),
        ]);
        let info = StatementInfo::new("DELETE FROM book");

        assert_eq!(evaluator.preview(&info), vec![1]);
        assert_eq!(evaluator.preview(&info), vec![1]);
        assert_eq!(evaluator.registry().get(1).unwrap().current_hit_count(), Some(1));

        assert_eq!(evaluator.evaluate(&info).breakpoint_ids(), vec![1, 2]);
    }

    #[test]
    fn test_execute_without_hits_runs_statement() {
        let log = Log::default();
        let evaluator = evaluator(vec![Breakpoint::builder(1).matcher(deletes()).build()]);

        let execution = evaluator
            .execute(&StatementInfo::new("SELECT 1"), run_statement(&log))
            .unwrap();

        assert!(execution.hits.is_empty());
        assert_eq!(
            execution.outcome,
            StatementOutcome::Executed {
                output: ProcessOutput::String("SELECT 1".to_string())
            }
        );
        assert_eq!(*log.lock().unwrap(), vec!["statement"]);
    }

    #[test]
    fn test_execute_runs_phases_in_order() {
        let log = Log::default();
        let evaluator = evaluator(vec![
            Breakpoint::builder(1)
                .matcher(deletes())
                .before(recorder(&log, "before-1"))
                .after(recorder(&log, "after-1"))
                .build(),
            Breakpoint::builder(2)
                .matcher(deletes())
                .before(recorder(&log, "before-2"))
                .after(recorder(&log, "after-2"))
                .build(),
        ]);

        let execution = evaluator
            .execute(&StatementInfo::new("DELETE FROM book"), run_statement(&log))
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["before-1", "before-2", "statement", "after-1", "after-2"]
        );
        assert_eq!(execution.hits, vec![1, 2]);
        assert_eq!(execution.resume, None);
        let phases: Vec<Phase> = execution.reports.iter().map(|r| r.phase).collect();
        assert_eq!(phases, vec![Phase::Before, Phase::Before, Phase::After, Phase::After]);
    }

    #[test]
    fn test_replacement_takes_the_place_of_statement() {
        let log = Log::default();
        let evaluator = evaluator(vec![Breakpoint::builder(1)
            .matcher(deletes())
            .replacement(StaticProcessor::new("SELECT 0"))
            .after(recorder(&log, "after"))
            .build()]);

        let execution = evaluator
            .execute(&StatementInfo::new("DELETE FROM book"), run_statement(&log))
            .unwrap();

        assert_eq!(execution.outcome, StatementOutcome::Replaced);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
        assert_eq!(
            execution.reports[0],
            ProcessorReport {
                breakpoint_id: 1,
                phase: Phase::Replacement,
                output: ProcessOutput::String("SELECT 0".to_string()),
            }
        );
    }

    #[test]
    fn test_breaking_hit_skip_and_fail() {
        let log = Log::default();
        let breakpoints = || {
            vec![
                Breakpoint::builder(1).matcher(deletes()).before(recorder(&log, "before")).build(),
                Breakpoint::builder(2)
                    .matcher(deletes())
                    .breaking(true)
                    .after(recorder(&log, "after"))
                    .build(),
            ]
        };
        let info = StatementInfo::new("DELETE FROM book");

        let skipping = evaluator(breakpoints()).with_suspend_handler(AutoResume(Resume::Skip));
        let execution = skipping.execute(&info, run_statement(&log)).unwrap();
        assert_eq!(execution.outcome, StatementOutcome::Skipped);
        assert_eq!(execution.resume, Some(Resume::Skip));
        assert_eq!(*log.lock().unwrap(), vec!["before"]);

        log.lock().unwrap().clear();
        let failing = evaluator(breakpoints()).with_suspend_handler(AutoResume(Resume::Fail));
        let err = failing.execute(&info, run_statement(&log)).unwrap_err();
        assert!(matches!(
            err,
            DebugError::Aborted { ref breakpoint_ids } if breakpoint_ids == &vec![2]
        ));
        assert_eq!(*log.lock().unwrap(), vec!["before"]);

        log.lock().unwrap().clear();
        let running = evaluator(breakpoints()).with_suspend_handler(AutoResume(Resume::Run));
        let execution = running.execute(&info, run_statement(&log)).unwrap();
        assert_eq!(execution.resume, Some(Resume::Run));
        assert_eq!(*log.lock().unwrap(), vec!["before", "statement", "after"]);
    }

    #[test]
    fn test_processor_failure_stops_execution() {
        let log = Log::default();
        let evaluator = evaluator(vec![Breakpoint::builder(4)
            .matcher(deletes())
            .before(|_: &StatementInfo| -> anyhow::Result<ProcessOutput> {
                anyhow::bail!("audit table locked")
            })
            .build()]);

        let err = evaluator
            .execute(&StatementInfo::new("DELETE FROM book"), run_statement(&log))
            .unwrap_err();

        match err {
            DebugError::Processor { breakpoint_id, phase, source } => {
                assert_eq!(breakpoint_id, 4);
                assert_eq!(phase, Phase::Before);
                assert_eq!(source.to_string(), "audit table locked");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_statement_failure_is_surfaced() {
        let evaluator = evaluator(Vec::new());
        let err = evaluator
            .execute(&StatementInfo::new("SELECT 1"), |_: &StatementInfo| {
                Err(anyhow::anyhow!("connection refused"))
            })
            .unwrap_err();

        assert!(matches!(err, DebugError::Statement(_)));
    }

    #[test]
    fn test_hit_count_fires_once_across_threads() {
        let evaluator = evaluator(vec![Breakpoint::builder(1)
            .matcher(deletes())
            .hit_count(10)
            .build()]);
        let info = StatementInfo::new("DELETE FROM book");
        let fired = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..5 {
                        if !evaluator.evaluate(&info).is_empty() {
                            fired.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_debugger_session_resumes_statement() {
        let log = Log::default();
        let (channel, mut session) = session_channel(8);
        let evaluator = evaluator(vec![Breakpoint::builder(5)
            .matcher(deletes())
            .breaking(true)
            .build()])
        .with_suspend_handler(channel);

        let intercepted = {
            let log = Arc::clone(&log);
            tokio::task::spawn_blocking(move || {
                let info = StatementInfo::new("DELETE FROM book").with_thread(1, "worker-1");
                evaluator.execute(&info, run_statement(&log))
            })
        };

        let pending = session.next_hit().await.unwrap();
        assert_eq!(pending.hit.breakpoint_ids, vec![5]);
        assert_eq!(pending.hit.thread_name, "worker-1");
        assert!(log.lock().unwrap().is_empty());
        pending.resume(Resume::Run);

        let execution = intercepted.await.unwrap().unwrap();
        assert_eq!(execution.resume, Some(Resume::Run));
        assert_eq!(*log.lock().unwrap(), vec!["statement"]);
    }
}
