// Breakpoint registry
//
// Holds the registered breakpoints in registration order. Registration and
// removal are serialized by the lock; evaluation works on a snapshot so
// matchers never run while the lock is held.

use crate::breakpoint::Breakpoint;
use crate::error::{DebugError, DebugResult};
use crate::types::BreakpointId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug)]
pub struct BreakpointRegistry {
    breakpoints: RwLock<Vec<Arc<Breakpoint>>>,
    next_id: AtomicI32,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self {
            breakpoints: RwLock::new(Vec::new()),
            next_id: AtomicI32::new(1),
        }
    }

    /// Allocate an id not used by any breakpoint registered so far
    pub fn next_id(&self) -> BreakpointId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a breakpoint after the existing ones
    pub fn add(&self, breakpoint: Breakpoint) -> DebugResult<Arc<Breakpoint>> {
        let mut breakpoints = self.write();
        let id = breakpoint.id();

        if breakpoints.iter().any(|bp| bp.id() == id) {
            return Err(DebugError::DuplicateBreakpoint(id));
        }

        let breakpoint = Arc::new(breakpoint);
        breakpoints.push(Arc::clone(&breakpoint));
        self.reserve(id);

        info!("Registered breakpoint {} ({} total)", id, breakpoints.len());
        Ok(breakpoint)
    }

    /// Unregister a breakpoint; evaluations already holding it finish normally
    pub fn remove(&self, id: BreakpointId) -> DebugResult<Arc<Breakpoint>> {
        let mut breakpoints = self.write();

        let index = breakpoints
            .iter()
            .position(|bp| bp.id() == id)
            .ok_or(DebugError::BreakpointNotFound(id))?;

        let removed = breakpoints.remove(index);
        info!("Removed breakpoint {} ({} remaining)", id, breakpoints.len());
        Ok(removed)
    }

    /// Swap the whole set at once, as when a console pushes its breakpoint list
    pub fn replace_all<I>(&self, breakpoints: I) -> DebugResult<()>
    where
        I: IntoIterator<Item = Breakpoint>,
    {
        let mut seen = HashSet::new();
        let mut replacement = Vec::new();

        for breakpoint in breakpoints {
            if !seen.insert(breakpoint.id()) {
                return Err(DebugError::DuplicateBreakpoint(breakpoint.id()));
            }
            replacement.push(Arc::new(breakpoint));
        }

        let mut current = self.write();
        for breakpoint in &replacement {
            self.reserve(breakpoint.id());
        }
        debug!("Replacing {} breakpoints with {}", current.len(), replacement.len());
        *current = replacement;
        Ok(())
    }

    pub fn get(&self, id: BreakpointId) -> Option<Arc<Breakpoint>> {
        self.read().iter().find(|bp| bp.id() == id).cloned()
    }

    /// Registered breakpoints in registration order
    pub fn snapshot(&self) -> Vec<Arc<Breakpoint>> {
        self.read().clone()
    }

    pub fn ids(&self) -> Vec<BreakpointId> {
        self.read().iter().map(|bp| bp.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        let mut breakpoints = self.write();
        info!("Clearing {} breakpoints", breakpoints.len());
        breakpoints.clear();
    }

    fn reserve(&self, id: BreakpointId) {
        self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
    }

    // A panicking matcher never runs under the lock, so the list itself is
    // always consistent
    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Breakpoint>>> {
        self.breakpoints.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Breakpoint>>> {
        self.breakpoints.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BreakpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}
