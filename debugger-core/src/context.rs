// Debugging context
//
// The single source of truth for "where is the user currently looking":
// current thread, current frame, current location. Stack and variable
// views consume it; the session and stepper produce it on every stop.

use crate::error::{CoreError, CoreResult};
use jdwp_transport::{Location, ThreadId, ThreadStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// Bitmask values naming which context facet changed.
pub mod facets {
    pub const THREAD: u8 = 0x01;
    pub const FRAME: u8 = 0x02;
    pub const LOCATION: u8 = 0x04;
}

pub type FacetMask = u8;

/// Thread state captured from the transport at suspension time. Frame 0 is
/// the top of the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub thread: ThreadId,
    pub name: String,
    pub status: ThreadStatus,
    pub frames: Vec<Location>,
}

impl ThreadSnapshot {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Notification that some part of the context moved. `brief` marks a
/// transient change that further changes will follow immediately, e.g. one
/// issued just before a resume.
#[derive(Debug, Clone)]
pub struct ContextChangeEvent {
    pub facets: FacetMask,
    pub brief: bool,
    pub thread: Option<ThreadId>,
    pub frame: usize,
    pub location: Option<Location>,
}

/// Context listeners run synchronously on the notifying thread and must
/// not block.
pub trait ContextListener: Send + Sync {
    fn context_changed(&self, event: &ContextChangeEvent);
}

#[derive(Debug, Default)]
struct CtxState {
    snapshot: Option<ThreadSnapshot>,
    frame: usize,
    /// Cleared when the target resumes; a stale snapshot can no longer be
    /// mutated against.
    valid: bool,
}

impl CtxState {
    fn location(&self) -> Option<Location> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.frames.get(self.frame).copied())
    }
}

/// Owns the (thread, frame, location) tuple for one session. Mutated only
/// while the session is suspended.
pub struct DebuggingContext {
    state: Mutex<CtxState>,
    listeners: Mutex<Vec<(u64, Arc<dyn ContextListener>)>>,
    next_subscription: AtomicU64,
}

impl Default for DebuggingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DebuggingContext {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CtxState::default()),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Current thread, if one is selected.
    pub fn thread(&self) -> Option<ThreadId> {
        self.state
            .lock()
            .unwrap()
            .snapshot
            .as_ref()
            .map(|s| s.thread)
    }

    /// Name of the current thread.
    pub fn thread_name(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .snapshot
            .as_ref()
            .map(|s| s.name.clone())
    }

    /// Current frame index into the thread's stack; 0 is the top frame.
    pub fn frame(&self) -> usize {
        self.state.lock().unwrap().frame
    }

    /// Location of the current frame.
    pub fn location(&self) -> Option<Location> {
        self.state.lock().unwrap().location()
    }

    /// Snapshot backing the current selection.
    pub fn snapshot(&self) -> Option<ThreadSnapshot> {
        self.state.lock().unwrap().snapshot.clone()
    }

    /// Whether the context may be mutated (target suspended since the
    /// last capture).
    pub fn is_valid(&self) -> bool {
        self.state.lock().unwrap().valid
    }

    /// Select a thread from a fresh snapshot. The thread must be live;
    /// the frame always resets to the top of the stack.
    pub fn set_thread(&self, snapshot: ThreadSnapshot, brief: bool) -> CoreResult<()> {
        if !snapshot.status.is_live() {
            return Err(CoreError::IncompatibleState(format!(
                "thread \"{}\" is no longer live",
                snapshot.name
            )));
        }
        let event = {
            let mut state = self.state.lock().unwrap();
            state.snapshot = Some(snapshot);
            state.frame = 0;
            state.valid = true;
            ContextChangeEvent {
                facets: facets::THREAD | facets::FRAME | facets::LOCATION,
                brief,
                thread: state.snapshot.as_ref().map(|s| s.thread),
                frame: 0,
                location: state.location(),
            }
        };
        self.fire(&event);
        Ok(())
    }

    /// Select a frame of the current thread. The index is validated
    /// against the snapshot's frame count at the moment of setting.
    pub fn set_frame(&self, index: usize) -> CoreResult<()> {
        let event = {
            let mut state = self.state.lock().unwrap();
            let snapshot = state.snapshot.as_ref().ok_or(CoreError::NoCurrentThread)?;
            if !state.valid {
                return Err(CoreError::IncompatibleState(
                    "thread has resumed since the context was captured".to_string(),
                ));
            }
            if index >= snapshot.frame_count() {
                return Err(CoreError::IncompatibleState(format!(
                    "frame index {} out of range (thread has {} frames)",
                    index,
                    snapshot.frame_count()
                )));
            }
            if state.frame == index {
                return Ok(());
            }
            state.frame = index;
            ContextChangeEvent {
                facets: facets::FRAME | facets::LOCATION,
                brief: false,
                thread: state.snapshot.as_ref().map(|s| s.thread),
                frame: index,
                location: state.location(),
            }
        };
        self.fire(&event);
        Ok(())
    }

    /// Mark the snapshot stale because the target is about to run. No
    /// notification; a stop with fresh state follows soon.
    pub fn invalidate(&self) {
        self.state.lock().unwrap().valid = false;
    }

    /// Drop all context silently. Used when the session disconnects.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        *state = CtxState::default();
        debug!("debugging context reset");
    }

    /// Subscribe to context changes. The subscription unregisters the
    /// listener when dropped.
    pub fn add_listener(
        self: &Arc<Self>,
        listener: Arc<dyn ContextListener>,
    ) -> ContextSubscription {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().push((id, listener));
        ContextSubscription {
            context: Arc::downgrade(self),
            id,
        }
    }

    fn fire(&self, event: &ContextChangeEvent) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener.context_changed(event);
        }
    }

    fn remove_listener(&self, id: u64) {
        self.listeners.lock().unwrap().retain(|(lid, _)| *lid != id);
    }
}

/// RAII handle for a context subscription; dropping it unregisters the
/// listener.
pub struct ContextSubscription {
    context: Weak<DebuggingContext>,
    id: u64,
}

impl Drop for ContextSubscription {
    fn drop(&mut self) {
        if let Some(context) = self.context.upgrade() {
            context.remove_listener(self.id);
        }
    }
}
