// Event dispatcher
//
// Owns the pump task for a connection, routes incoming events to listeners
// in priority order, and computes the collective resume decision: the
// debuggee only runs again when every matched listener agrees.

use crate::error::{CoreError, CoreResult};
use crate::priority::PriorityList;
use async_trait::async_trait;
use jdwp_transport::events::suspend_policy;
use jdwp_transport::{DebugTransport, Event, EventKind, EventSet};
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Listener priorities. Higher values are notified first.
pub mod priorities {
    /// Inclusive lower bound of the valid range.
    pub const LOWEST: u16 = 1;
    /// Inclusive upper bound of the valid range.
    pub const HIGHEST: u16 = 1023;
    /// Where ordinary listeners land unless they have a reason not to.
    pub const DEFAULT: u16 = 512;
    /// Reserved for the session lifecycle listener.
    pub const SESSION: u16 = 768;
    /// Start of the band reserved for breakpoint listeners, who must see
    /// events before anything else so hit counts and conditions are
    /// evaluated first.
    pub const BREAKPOINT_BAND: u16 = 960;
}

/// What a listener is, for reserved-band enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Normal,
    Breakpoint,
    Session,
}

/// Matches events to interested listeners. A closed set: the protocol's
/// event taxonomy is finite, so broader interests are expressed with the
/// grouping selectors rather than open-ended type tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSelector {
    VmStart,
    VmDeath,
    ThreadStart,
    ThreadDeath,
    ClassPrepare,
    Breakpoint,
    Step,
    MethodEntry,
    MethodExit,
    Exception,
    /// Any event that carries a code location.
    Locatable,
    /// Every event.
    Any,
}

impl EventSelector {
    pub fn matches(&self, event: &EventKind) -> bool {
        match self {
            EventSelector::VmStart => matches!(event, EventKind::VmStart { .. }),
            EventSelector::VmDeath => matches!(event, EventKind::VmDeath),
            EventSelector::ThreadStart => matches!(event, EventKind::ThreadStart { .. }),
            EventSelector::ThreadDeath => matches!(event, EventKind::ThreadDeath { .. }),
            EventSelector::ClassPrepare => matches!(event, EventKind::ClassPrepare { .. }),
            EventSelector::Breakpoint => matches!(event, EventKind::Breakpoint { .. }),
            EventSelector::Step => matches!(event, EventKind::Step { .. }),
            EventSelector::MethodEntry => matches!(event, EventKind::MethodEntry { .. }),
            EventSelector::MethodExit => matches!(event, EventKind::MethodExit { .. }),
            EventSelector::Exception => matches!(event, EventKind::Exception { .. }),
            EventSelector::Locatable => event.location().is_some(),
            EventSelector::Any => true,
        }
    }
}

/// A party interested in protocol events. The return value is the
/// listener's vote: `true` to let the debuggee resume, `false` to keep it
/// suspended. An error counts as a no-resume vote, except
/// `CoreError::Disconnected` which ends the dispatch loop.
#[async_trait]
pub trait DispatchListener: Send + Sync {
    fn kind(&self) -> ListenerKind {
        ListenerKind::Normal
    }

    async fn event_occurred(&self, event: &Event) -> CoreResult<bool>;
}

/// Receives the pump's terminal notifications: the debuggee stayed
/// suspended after an event set, or the connection is gone.
#[async_trait]
pub trait DispatchObserver: Send + Sync {
    async fn suspended(&self, event: &Event);
    async fn disconnected(&self);
}

struct TableEntry {
    selector: EventSelector,
    listeners: PriorityList<Arc<dyn DispatchListener>>,
}

/// Outcome of dispatching one event set.
#[derive(Debug)]
enum SetOutcome {
    Resume,
    /// Consensus was to stay suspended; carries the first event that voted
    /// to suspend.
    Suspend(Event),
}

/// Routes protocol events to prioritized listeners and runs the
/// resume/suspend consensus. One pump task per active connection.
pub struct EventDispatcher {
    table: Mutex<Vec<TableEntry>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Vec::new()),
            pump: Mutex::new(None),
        }
    }

    /// Add a listener for events the selector matches. Not idempotent:
    /// registering the same listener twice makes it fire twice.
    pub fn register(
        &self,
        selector: EventSelector,
        listener: Arc<dyn DispatchListener>,
        priority: u16,
    ) -> CoreResult<()> {
        if !(priorities::LOWEST..=priorities::HIGHEST).contains(&priority) {
            return Err(CoreError::InvalidPriority {
                priority,
                reason: "outside the valid range",
            });
        }
        let kind = listener.kind();
        if priority >= priorities::BREAKPOINT_BAND && kind != ListenerKind::Breakpoint {
            return Err(CoreError::InvalidPriority {
                priority,
                reason: "band reserved for breakpoint listeners",
            });
        }
        if priority == priorities::SESSION && kind != ListenerKind::Session {
            return Err(CoreError::InvalidPriority {
                priority,
                reason: "reserved for the session listener",
            });
        }

        let mut table = self.table.lock().unwrap();
        match table.iter_mut().find(|entry| entry.selector == selector) {
            Some(entry) => entry.listeners.add(listener, priority),
            None => {
                let mut listeners = PriorityList::new();
                listeners.add(listener, priority);
                table.push(TableEntry {
                    selector,
                    listeners,
                });
            }
        }
        debug!("registered {:?} listener at priority {}", selector, priority);
        Ok(())
    }

    /// Remove a listener from a selector's list. A no-op when absent;
    /// one-shot listeners are usually never removed because the request
    /// behind them is deleted server-side after firing, and a dead entry
    /// in the table is harmless.
    pub fn unregister(&self, selector: EventSelector, listener: &Arc<dyn DispatchListener>) {
        let mut table = self.table.lock().unwrap();
        if let Some(entry) = table.iter_mut().find(|entry| entry.selector == selector) {
            let removed = entry
                .listeners
                .remove_where(|l| Arc::ptr_eq(l, listener));
            if removed {
                debug!("unregistered {:?} listener", selector);
            }
        }
        // The selector entry itself stays; it would likely be re-added.
    }

    /// Listener lists for the first selector matching the event, snapshot
    /// outside the table lock so listeners can register listeners.
    fn matched_listeners(&self, event: &EventKind) -> Option<Vec<Arc<dyn DispatchListener>>> {
        let table = self.table.lock().unwrap();
        table
            .iter()
            .find(|entry| entry.selector.matches(event))
            .map(|entry| entry.listeners.iter().cloned().collect())
    }

    /// Dispatch a single event to its matched listeners in priority order,
    /// ANDing their votes.
    async fn dispatch_event(&self, event: &Event) -> CoreResult<bool> {
        let Some(listeners) = self.matched_listeners(&event.details) else {
            // Nobody asked about this event; do not hold the debuggee.
            return Ok(true);
        };

        let mut should_resume = true;
        for listener in listeners {
            match listener.event_occurred(event).await {
                Ok(vote) => should_resume &= vote,
                Err(CoreError::Disconnected) => return Err(CoreError::Disconnected),
                Err(e) => {
                    // Fail safe toward halting: a broken listener must not
                    // cost the user control of the debuggee.
                    error!("listener failed on {:?}: {:#}", event.details, e);
                    should_resume = false;
                }
            }
        }
        Ok(should_resume)
    }

    /// Dispatch a whole event set. Events are processed in set order; the
    /// consensus is the AND across all of them.
    async fn dispatch_set(&self, set: &EventSet) -> CoreResult<SetOutcome> {
        let mut should_resume = true;
        let mut suspending: Option<Event> = None;

        for event in &set.events {
            debug!("dispatching event: {:?}", event.details);
            let vote = self.dispatch_event(event).await?;
            should_resume &= vote;
            if !vote && suspending.is_none() {
                suspending = Some(event.clone());
            }
        }

        match suspending {
            None if should_resume => Ok(SetOutcome::Resume),
            Some(event) => Ok(SetOutcome::Suspend(event)),
            // Unreachable in practice: a false consensus records an event.
            None => Ok(SetOutcome::Resume),
        }
    }

    /// Start the pump over a connected transport. Pulls event sets until
    /// disconnection or `stop`.
    pub fn start(
        self: &Arc<Self>,
        transport: Arc<dyn DebugTransport>,
        observer: Weak<dyn DispatchObserver>,
    ) {
        let dispatcher = Arc::clone(self);
        let handle = tokio::spawn(async move {
            dispatcher.pump_loop(transport, observer).await;
        });

        let mut pump = self.pump.lock().unwrap();
        if let Some(old) = pump.replace(handle) {
            // A stale pump from a previous connection must not keep
            // pulling events.
            old.abort();
        }
        info!("event pump started");
    }

    /// Stop the pump. Aborting mid-wait is the normal shutdown path, not
    /// an error.
    pub fn stop(&self) {
        if let Some(handle) = self.pump.lock().unwrap().take() {
            handle.abort();
            info!("event pump stopped");
        }
    }

    async fn pump_loop(
        &self,
        transport: Arc<dyn DebugTransport>,
        observer: Weak<dyn DispatchObserver>,
    ) {
        loop {
            let set = match transport.next_event_set().await {
                Ok(set) => set,
                Err(e) => {
                    info!("event pump ending: {}", e);
                    if let Some(observer) = observer.upgrade() {
                        observer.disconnected().await;
                    }
                    break;
                }
            };

            debug!(
                "received event set: {} events, suspend_policy={}",
                set.events.len(),
                set.suspend_policy
            );

            match self.dispatch_set(&set).await {
                Ok(SetOutcome::Resume) => {
                    if let Err(e) = resume_set(&*transport, &set).await {
                        if e.is_disconnect() {
                            if let Some(observer) = observer.upgrade() {
                                observer.disconnected().await;
                            }
                            break;
                        }
                        warn!("failed to resume event set: {}", e);
                    } else {
                        debug!("resumed debuggee after event set");
                    }
                }
                Ok(SetOutcome::Suspend(event)) => {
                    if set.suspend_policy != suspend_policy::NONE {
                        if let Some(observer) = observer.upgrade() {
                            observer.suspended(&event).await;
                        }
                    }
                }
                Err(CoreError::Disconnected) => {
                    info!("disconnect signaled during dispatch");
                    if let Some(observer) = observer.upgrade() {
                        observer.disconnected().await;
                    }
                    break;
                }
                Err(e) => {
                    // The pump must never die because one set went wrong;
                    // report and keep reading events.
                    error!("event set dispatch failed: {:#}", e);
                }
            }
        }
    }
}

/// Undo whatever suspension the event set caused.
async fn resume_set(
    transport: &dyn DebugTransport,
    set: &EventSet,
) -> jdwp_transport::JdwpResult<()> {
    match set.suspend_policy {
        suspend_policy::NONE => Ok(()),
        suspend_policy::EVENT_THREAD => match set.suspended_thread() {
            Some(thread) => transport.resume_thread(thread).await,
            None => Ok(()),
        },
        _ => transport.resume_all().await,
    }
}
