// Breakpoint evaluation
//
// A breakpoint combines an optional matcher, an optional hit-count threshold
// and three processor slots. Everything except the remaining hit count is
// fixed at construction, so a breakpoint is shared between intercepting
// threads behind an Arc without further locking.

use crate::matcher::StatementMatcher;
use crate::processor::{Phase, StatementProcessor};
use crate::types::{BreakpointId, StatementInfo};
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

pub struct Breakpoint {
    id: BreakpointId,
    matcher: Option<Box<dyn StatementMatcher>>,
    hit_count: Option<u32>,
    // Present iff hit_count is; counts down to the firing evaluation
    current_hit_count: Option<AtomicI64>,
    breaking: bool,
    before: Option<Box<dyn StatementProcessor>>,
    replacement: Option<Box<dyn StatementProcessor>>,
    after: Option<Box<dyn StatementProcessor>>,
}

impl Breakpoint {
    /// Start describing a breakpoint; nothing is observable until `build`
    pub fn builder(id: BreakpointId) -> BreakpointBuilder {
        BreakpointBuilder {
            id,
            matcher: None,
            hit_count: None,
            breaking: false,
            before: None,
            replacement: None,
            after: None,
        }
    }

    /// Decide whether this breakpoint fires for `info`
    ///
    /// With `track_hit_count` set, every evaluation that gets past the matcher
    /// consumes one unit of the hit-count budget, and the evaluation that
    /// brings it to exactly zero is the one that fires. Without it the
    /// counter is neither read nor written.
    ///
    /// A breakpoint with neither a matcher nor a hit count never fires.
    pub fn matches(&self, info: &StatementInfo, track_hit_count: bool) -> bool {
        let counter = if track_hit_count {
            self.current_hit_count.as_ref()
        } else {
            None
        };

        if let Some(counter) = counter {
            // Budget already spent, skip the matcher entirely
            if counter.load(Ordering::SeqCst) <= 0 {
                return false;
            }
        }

        let mut has_matcher = false;

        if let Some(matcher) = &self.matcher {
            if !matcher.matches(info) {
                return false;
            }
            has_matcher = true;
        }

        if let Some(counter) = counter {
            let remaining = counter.fetch_sub(1, Ordering::SeqCst) - 1;

            match remaining.cmp(&0) {
                CmpOrdering::Greater => return false,
                CmpOrdering::Less => {
                    // Lost the race against the firing evaluation
                    counter.store(0, Ordering::SeqCst);
                    return false;
                }
                CmpOrdering::Equal => {
                    debug!("Breakpoint {} reached its hit count", self.id);
                    has_matcher = true;
                }
            }
        }

        has_matcher
    }

    pub fn id(&self) -> BreakpointId {
        self.id
    }

    pub fn matcher(&self) -> Option<&dyn StatementMatcher> {
        self.matcher.as_deref()
    }

    pub fn hit_count(&self) -> Option<u32> {
        self.hit_count
    }

    /// Remaining evaluations before the breakpoint fires, if it counts hits
    pub fn current_hit_count(&self) -> Option<i64> {
        self.current_hit_count
            .as_ref()
            .map(|counter| counter.load(Ordering::SeqCst))
    }

    pub fn is_breaking(&self) -> bool {
        self.breaking
    }

    pub fn before_processor(&self) -> Option<&dyn StatementProcessor> {
        self.before.as_deref()
    }

    pub fn replacement_processor(&self) -> Option<&dyn StatementProcessor> {
        self.replacement.as_deref()
    }

    pub fn after_processor(&self) -> Option<&dyn StatementProcessor> {
        self.after.as_deref()
    }

    pub fn processor(&self, phase: Phase) -> Option<&dyn StatementProcessor> {
        match phase {
            Phase::Before => self.before_processor(),
            Phase::Replacement => self.replacement_processor(),
            Phase::After => self.after_processor(),
        }
    }

    pub fn has_processors(&self) -> bool {
        self.before.is_some() || self.replacement.is_some() || self.after.is_some()
    }
}

impl fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breakpoint")
            .field("id", &self.id)
            .field("has_matcher", &self.matcher.is_some())
            .field("hit_count", &self.hit_count)
            .field("current_hit_count", &self.current_hit_count())
            .field("breaking", &self.breaking)
            .field("before", &self.before.is_some())
            .field("replacement", &self.replacement.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Collects the parts of a breakpoint before it is built in one step
pub struct BreakpointBuilder {
    id: BreakpointId,
    matcher: Option<Box<dyn StatementMatcher>>,
    hit_count: Option<u32>,
    breaking: bool,
    before: Option<Box<dyn StatementProcessor>>,
    replacement: Option<Box<dyn StatementProcessor>>,
    after: Option<Box<dyn StatementProcessor>>,
}

impl BreakpointBuilder {
    pub fn matcher(self, matcher: impl StatementMatcher + 'static) -> Self {
        self.boxed_matcher(Box::new(matcher))
    }

    pub fn boxed_matcher(mut self, matcher: Box<dyn StatementMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Fire only on the `hit_count`-th tracked evaluation
    pub fn hit_count(mut self, hit_count: u32) -> Self {
        self.hit_count = Some(hit_count);
        self
    }

    pub fn breaking(mut self, breaking: bool) -> Self {
        self.breaking = breaking;
        self
    }

    pub fn before(self, processor: impl StatementProcessor + 'static) -> Self {
        self.processor(Phase::Before, Box::new(processor))
    }

    pub fn replacement(self, processor: impl StatementProcessor + 'static) -> Self {
        self.processor(Phase::Replacement, Box::new(processor))
    }

    pub fn after(self, processor: impl StatementProcessor + 'static) -> Self {
        self.processor(Phase::After, Box::new(processor))
    }

    pub fn processor(mut self, phase: Phase, processor: Box<dyn StatementProcessor>) -> Self {
        let slot = match phase {
            Phase::Before => &mut self.before,
            Phase::Replacement => &mut self.replacement,
            Phase::After => &mut self.after,
        };
        *slot = Some(processor);
        self
    }

    pub fn build(self) -> Breakpoint {
        Breakpoint {
            id: self.id,
            matcher: self.matcher,
            hit_count: self.hit_count,
            current_hit_count: self.hit_count.map(|n| AtomicI64::new(i64::from(n))),
            breaking: self.breaking,
            before: self.before,
            replacement: self.replacement,
            after: self.after,
        }
    }
}
