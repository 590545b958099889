// Suspension of intercepted statements
//
// A breaking hit parks the intercepting thread until a debugger session
// decides how the statement continues. The evaluator only knows the
// SuspendHandler trait; SessionChannel hands hits to an async debugger
// session over a channel and waits for its answer.

use crate::types::{BreakpointId, StatementInfo};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// How a suspended statement continues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resume {
    /// Run the statement (or its replacement) and the after processors
    Run,
    /// Do not run the statement; the caller sees it as skipped
    Skip,
    /// Abort the statement with an error
    Fail,
}

/// A breaking match, as shown to the person debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakpointHit {
    pub breakpoint_ids: Vec<BreakpointId>,
    pub statement: StatementInfo,
    pub thread_name: String,
}

pub trait SuspendHandler: Send + Sync {
    /// Called on the intercepting thread; returns once execution may continue
    fn suspend(&self, hit: &BreakpointHit) -> Resume;
}

/// Resumes every hit immediately with the same decision
#[derive(Debug, Clone, Copy)]
pub struct AutoResume(pub Resume);

impl Default for AutoResume {
    fn default() -> Self {
        AutoResume(Resume::Run)
    }
}

impl SuspendHandler for AutoResume {
    fn suspend(&self, hit: &BreakpointHit) -> Resume {
        info!(
            "Breakpoint(s) {:?} hit on thread '{}', resuming with {:?}",
            hit.breakpoint_ids, hit.thread_name, self.0
        );
        self.0
    }
}

/// A hit waiting for the debugger's decision
#[derive(Debug)]
pub struct PendingHit {
    pub hit: BreakpointHit,
    resume_tx: oneshot::Sender<Resume>,
}

impl PendingHit {
    pub fn resume(self, decision: Resume) {
        if self.resume_tx.send(decision).is_err() {
            warn!(
                "Suspended thread for breakpoint(s) {:?} is gone",
                self.hit.breakpoint_ids
            );
        }
    }
}

/// Intercepting side of a debugger session
///
/// `suspend` blocks the calling thread and must not be called from within an
/// async task; run the intercepted work on a plain thread or in
/// `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct SessionChannel {
    hit_tx: mpsc::Sender<PendingHit>,
}

/// Debugger side of a session, receiving hits as they occur
#[derive(Debug)]
pub struct DebuggerSession {
    hit_rx: mpsc::Receiver<PendingHit>,
}

impl DebuggerSession {
    /// Wait for the next suspended statement; `None` once every channel is gone
    pub async fn next_hit(&mut self) -> Option<PendingHit> {
        self.hit_rx.recv().await
    }

    /// Take a hit if one is already waiting
    pub fn try_next_hit(&mut self) -> Option<PendingHit> {
        self.hit_rx.try_recv().ok()
    }
}

/// Connect an intercepting side to a debugger session
///
/// `capacity` bounds the number of hits queued before suspending threads
/// wait for room as well as for a decision.
pub fn session_channel(capacity: usize) -> (SessionChannel, DebuggerSession) {
    let (hit_tx, hit_rx) = mpsc::channel(capacity);
    (SessionChannel { hit_tx }, DebuggerSession { hit_rx })
}

impl SuspendHandler for SessionChannel {
    fn suspend(&self, hit: &BreakpointHit) -> Resume {
        let (resume_tx, resume_rx) = oneshot::channel();
        let pending = PendingHit {
            hit: hit.clone(),
            resume_tx,
        };

        debug!("Suspending thread '{}' at {:?}", hit.thread_name, hit.breakpoint_ids);

        if self.hit_tx.blocking_send(pending).is_err() {
            warn!(
                "Debugger session closed, resuming breakpoint(s) {:?}",
                hit.breakpoint_ids
            );
            return Resume::Run;
        }

        match resume_rx.blocking_recv() {
            Ok(decision) => {
                debug!("Resuming thread '{}' with {:?}", hit.thread_name, decision);
                decision
            }
            Err(_) => {
                warn!(
                    "Hit dropped without a decision, resuming breakpoint(s) {:?}",
                    hit.breakpoint_ids
                );
                Resume::Run
            }
        }
    }
}
