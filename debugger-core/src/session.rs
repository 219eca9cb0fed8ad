// Session lifecycle
//
// The top-level state machine: owns the connection, the dispatcher and its
// pump, the debugging context, and the stepper, and fans lifecycle events
// out to registered listeners.

use crate::context::{DebuggingContext, ThreadSnapshot};
use crate::dispatch::{
    priorities, DispatchListener, DispatchObserver, EventDispatcher, EventSelector, ListenerKind,
};
use crate::error::{CoreError, CoreResult};
use crate::settings::CoreSettings;
use crate::stepper::Stepper;
use async_trait::async_trait;
use jdwp_transport::{DebugTransport, Event, EventKind, JdwpResult, TransportConnector};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Lifecycle states. `Suspended` implies an active connection; it and
/// `Connected` are the two facets of being attached to a live debuggee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Suspended,
    Closing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Suspended => "suspended",
            SessionState::Closing => "closing",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Suspended)
    }
}

/// Lifecycle notifications, delivered through one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    /// The debuggee has been launched or attached.
    Activated,
    /// The debuggee stopped and control returned to the user.
    Suspended,
    /// The debuggee is about to run again.
    Resuming,
    /// The connection is being torn down.
    Closing,
    /// The connection is gone.
    Deactivated,
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session: String,
    pub kind: SessionEventKind,
    /// A transient event; more changes follow immediately (e.g. a
    /// `Resuming` that a stop may chase within milliseconds).
    pub brief: bool,
}

/// Session listeners run synchronously on the notifying thread, in
/// registration order, and must not block. A panicking listener is logged
/// and does not abort the transition or starve later listeners.
pub trait SessionListener: Send + Sync {
    fn session_event(&self, event: &SessionEvent);
}

/// Receives one-line human-readable notices (stepping reports and the
/// like) for display in whatever status surface the front-end has.
pub trait StatusSink: Send + Sync {
    fn status(&self, message: &str);
}

/// Default sink: route status lines to the log.
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn status(&self, message: &str) {
        info!("{}", message);
    }
}

static CONNECTION_SERIAL: AtomicU64 = AtomicU64::new(1);

/// A live or prospective attachment to one debuggee. Identity-based:
/// two connections built from identical parameters are still distinct.
pub struct Connection {
    serial: u64,
    connector: Arc<dyn TransportConnector>,
    transport: Option<Arc<dyn DebugTransport>>,
}

impl Connection {
    pub fn new(connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            serial: CONNECTION_SERIAL.fetch_add(1, Ordering::SeqCst),
            connector,
            transport: None,
        }
    }

    /// True when attaching to a VM somebody else started.
    pub fn is_remote(&self) -> bool {
        self.connector.is_remote()
    }

    pub fn address(&self) -> String {
        self.connector.address()
    }

    /// The transport handle; `None` until `connect()` has succeeded.
    pub fn transport(&self) -> Option<Arc<dyn DebugTransport>> {
        self.transport.clone()
    }

    pub(crate) async fn open(&mut self) -> JdwpResult<Arc<dyn DebugTransport>> {
        let transport = self.connector.connect().await?;
        self.transport = Some(Arc::clone(&transport));
        Ok(transport)
    }

    pub(crate) fn release(&mut self) {
        self.transport = None;
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
    }
}

impl Eq for Connection {}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("serial", &self.serial)
            .field("address", &self.address())
            .field("open", &self.transport.is_some())
            .finish()
    }
}

/// One logical debugging session. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    id: String,
    settings: CoreSettings,
    state: Mutex<SessionState>,
    connection: Mutex<Option<Connection>>,
    dispatcher: Arc<EventDispatcher>,
    context: Arc<DebuggingContext>,
    stepper: Mutex<Option<Arc<Stepper>>>,
    /// Dispatch registrations made at connect time, removed at teardown.
    registrations: Mutex<Vec<(EventSelector, Arc<dyn DispatchListener>)>>,
    listeners: Mutex<Vec<(u64, Arc<dyn SessionListener>)>>,
    next_subscription: AtomicU64,
    status_sink: Arc<dyn StatusSink>,
    /// Released by the VmStart event; launch-mode connects wait on it so
    /// the VM is stable before `connect` returns.
    vm_started: Semaphore,
    /// True while listener callbacks are running; `close()` issued from a
    /// callback is deferred until the pass completes.
    notifying: AtomicBool,
    close_pending: AtomicBool,
}

impl Session {
    pub fn new(id: impl Into<String>, settings: CoreSettings) -> Self {
        Self::with_status_sink(id, settings, Arc::new(TracingStatus))
    }

    pub fn with_status_sink(
        id: impl Into<String>,
        settings: CoreSettings,
        status_sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: id.into(),
                settings,
                state: Mutex::new(SessionState::Disconnected),
                connection: Mutex::new(None),
                dispatcher: Arc::new(EventDispatcher::new()),
                context: Arc::new(DebuggingContext::new()),
                stepper: Mutex::new(None),
                registrations: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                status_sink,
                vm_started: Semaphore::new(0),
                notifying: AtomicBool::new(false),
                close_pending: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == SessionState::Suspended
    }

    /// The context views read "where the user is looking" from.
    pub fn context(&self) -> Arc<DebuggingContext> {
        Arc::clone(&self.inner.context)
    }

    /// The dispatcher, for capabilities wanting prioritized event
    /// notification (breakpoint managers, watchers).
    pub fn dispatcher(&self) -> Arc<EventDispatcher> {
        Arc::clone(&self.inner.dispatcher)
    }

    /// The stepper for the active connection.
    pub fn stepper(&self) -> CoreResult<Arc<Stepper>> {
        self.inner
            .stepper
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| self.inner.wrong_state("an active connection"))
    }

    /// Transport of the active connection, for collaborators that need to
    /// issue their own protocol calls (breakpoint resolution and such).
    pub fn transport(&self) -> Option<Arc<dyn DebugTransport>> {
        self.inner.transport()
    }

    /// Register a lifecycle listener. Insertion-ordered; duplicates are
    /// refused. The returned subscription unregisters on drop; hold it
    /// for the lifetime of the subscribing object.
    pub fn add_listener(
        &self,
        listener: Arc<dyn SessionListener>,
    ) -> CoreResult<SessionSubscription> {
        let mut listeners = self.inner.listeners.lock().unwrap();
        if listeners.iter().any(|(_, l)| Arc::ptr_eq(l, &listener)) {
            return Err(CoreError::DuplicateListener);
        }
        let id = self.inner.next_subscription.fetch_add(1, Ordering::SeqCst);
        listeners.push((id, listener));
        Ok(SessionSubscription {
            session: Arc::downgrade(&self.inner),
            id,
        })
    }

    /// Launch or attach. Returns once the connection is live and, for
    /// launch-mode connections, the VM has reported its start event.
    pub async fn connect(&self, mut connection: Connection) -> CoreResult<()> {
        self.inner.transition(
            "connect",
            &[SessionState::Disconnected],
            SessionState::Connecting,
        )?;

        let transport = match connection.open().await {
            Ok(transport) => transport,
            Err(e) => {
                self.inner.set_state(SessionState::Disconnected);
                return Err(CoreError::connect(e));
            }
        };
        info!("session {} connected to {}", self.inner.id, connection.address());
        let remote = connection.is_remote();
        *self.inner.connection.lock().unwrap() = Some(connection);

        // The session observes VM start/death and unowned step stops at
        // the reserved priority so it sees them before ordinary listeners.
        let session_listener: Arc<dyn DispatchListener> = self.inner.clone();
        for selector in [
            EventSelector::VmStart,
            EventSelector::VmDeath,
            EventSelector::Step,
        ] {
            self.inner.register_dispatch(
                selector,
                Arc::clone(&session_listener),
                priorities::SESSION,
            )?;
        }

        // The stepper belongs to this connection; it registers for the
        // one-shot step and method-exit requests it will create.
        let stepper = Arc::new(Stepper::new(
            Arc::clone(&transport),
            Arc::clone(&self.inner.context),
            Arc::downgrade(&self.inner),
            self.inner.settings.clone(),
        ));
        for selector in [EventSelector::Step, EventSelector::MethodExit] {
            self.inner.register_dispatch(
                selector,
                stepper.clone() as Arc<dyn DispatchListener>,
                priorities::DEFAULT,
            )?;
        }
        *self.inner.stepper.lock().unwrap() = Some(stepper);

        self.inner.set_state(SessionState::Connected);
        self.inner.fire(SessionEventKind::Activated, false);

        // Stale permits from an earlier connection must not satisfy this
        // connect's rendezvous.
        while let Ok(permit) = self.inner.vm_started.try_acquire() {
            permit.forget();
        }

        let observer_arc: Arc<dyn DispatchObserver> = self.inner.clone();
        let observer: Weak<dyn DispatchObserver> = Arc::downgrade(&observer_arc);
        self.inner.dispatcher.start(transport, observer);

        if !remote {
            // A launched VM starts suspended and is only stable once its
            // start event has arrived.
            match self.inner.vm_started.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(CoreError::Disconnected),
            }
            if !self.is_connected() {
                return Err(CoreError::Disconnected);
            }
        }

        Ok(())
    }

    /// Let the debuggee run again after a stop.
    pub async fn resume_vm(&self) -> CoreResult<()> {
        self.inner.resume_vm().await
    }

    /// Explicitly pause the debuggee.
    pub async fn suspend_vm(&self) -> CoreResult<()> {
        self.inner.require_state("suspend", &[SessionState::Connected])?;
        let transport = self.inner.transport().ok_or(CoreError::Disconnected)?;
        transport
            .suspend_all()
            .await
            .map_err(CoreError::stepping)?;
        self.inner.set_state(SessionState::Suspended);
        self.inner.fire(SessionEventKind::Suspended, false);
        Ok(())
    }

    /// Tear down the connection. With `force`, or for a VM this session
    /// launched itself, the debuggee is terminated; otherwise it is left
    /// running and merely detached from.
    pub async fn disconnect(&self, force: bool) -> CoreResult<()> {
        self.inner.require_state(
            "disconnect",
            &[SessionState::Connected, SessionState::Suspended],
        )?;

        let (transport, remote) = {
            let connection = self.inner.connection.lock().unwrap();
            match connection.as_ref() {
                Some(c) => (c.transport(), c.is_remote()),
                None => (None, true),
            }
        };

        if let Some(transport) = transport {
            let goodbye = if remote && !force {
                transport.dispose().await
            } else {
                transport.exit(0).await
            };
            if let Err(e) = goodbye {
                // The VM racing us to the exit is not a problem.
                debug!("goodbye command failed: {}", e);
            }
        }

        self.inner.finish_disconnect();
        Ok(())
    }

    /// Destroy the session. Requires the Disconnected state. Called from
    /// within a listener callback, destruction is deferred until the
    /// notification pass completes.
    pub fn close(&self) -> CoreResult<()> {
        self.inner
            .require_state("close", &[SessionState::Disconnected])?;
        if self.inner.notifying.load(Ordering::SeqCst) {
            self.inner.close_pending.store(true, Ordering::SeqCst);
            debug!("close deferred until listener notification completes");
        } else {
            self.inner.do_close();
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionInner {
    fn transport(&self) -> Option<Arc<dyn DebugTransport>> {
        self.connection
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|c| c.transport())
    }

    fn set_state(&self, to: SessionState) {
        *self.state.lock().unwrap() = to;
    }

    fn wrong_state(&self, required: &'static str) -> CoreError {
        CoreError::InvalidState {
            required,
            actual: self.state.lock().unwrap().as_str(),
        }
    }

    fn require_state(&self, _op: &'static str, allowed: &[SessionState]) -> CoreResult<()> {
        let state = *self.state.lock().unwrap();
        if allowed.contains(&state) {
            return Ok(());
        }
        Err(CoreError::InvalidState {
            required: allowed[0].as_str(),
            actual: state.as_str(),
        })
    }

    fn transition(
        &self,
        op: &'static str,
        allowed: &[SessionState],
        to: SessionState,
    ) -> CoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if !allowed.contains(&state) {
            return Err(CoreError::InvalidState {
                required: allowed[0].as_str(),
                actual: state.as_str(),
            });
        }
        debug!("session {}: {} ({} -> {})", self.id, op, state.as_str(), to.as_str());
        *state = to;
        Ok(())
    }

    fn register_dispatch(
        &self,
        selector: EventSelector,
        listener: Arc<dyn DispatchListener>,
        priority: u16,
    ) -> CoreResult<()> {
        self.dispatcher
            .register(selector, Arc::clone(&listener), priority)?;
        self.registrations
            .lock()
            .unwrap()
            .push((selector, listener));
        Ok(())
    }

    pub(crate) async fn resume_vm(&self) -> CoreResult<()> {
        // Connected is also allowed: the VM tracks suspension as a count,
        // and chained steps re-resume without an intervening stop.
        self.transition(
            "resume",
            &[SessionState::Suspended, SessionState::Connected],
            SessionState::Connected,
        )?;
        // The context is stale the moment the target runs; views get a
        // brief warning before the resume goes out.
        self.context.invalidate();
        self.fire(SessionEventKind::Resuming, true);

        let transport = self.transport().ok_or(CoreError::Disconnected)?;
        transport.resume_all().await.map_err(CoreError::stepping)?;
        Ok(())
    }

    /// The stepper resumes through here after arming its request.
    pub(crate) async fn resume_for_step(&self) -> CoreResult<()> {
        self.resume_vm().await
    }

    pub(crate) fn status(&self, message: &str) {
        self.status_sink.status(message);
    }

    /// Tear down everything tied to the active connection and notify
    /// listeners. Safe to call from the pump task: nothing here awaits.
    /// Claims the Closing state; a second caller (the pump noticing the
    /// wire drop while a disconnect is in flight) backs off.
    fn finish_disconnect(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if matches!(*state, SessionState::Disconnected | SessionState::Closing) {
                return;
            }
            *state = SessionState::Closing;
        }
        info!("session {} disconnecting", self.id);

        self.dispatcher.stop();

        if let Some(stepper) = self.stepper.lock().unwrap().take() {
            stepper.cancel();
        }

        for (selector, listener) in self.registrations.lock().unwrap().drain(..) {
            self.dispatcher.unregister(selector, &listener);
        }

        // Unblock a launch-mode connect still waiting for VmStart.
        self.vm_started.add_permits(1);

        self.context.reset();

        if let Some(mut connection) = self.connection.lock().unwrap().take() {
            connection.release();
        }

        self.set_state(SessionState::Disconnected);
        self.fire(SessionEventKind::Closing, false);
        self.fire(SessionEventKind::Deactivated, false);
    }

    fn fire(&self, kind: SessionEventKind, brief: bool) {
        let event = SessionEvent {
            session: self.id.clone(),
            kind,
            brief,
        };
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        self.notifying.store(true, Ordering::SeqCst);
        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.session_event(&event)));
            if outcome.is_err() {
                error!("session listener panicked on {:?}", kind);
            }
        }
        self.notifying.store(false, Ordering::SeqCst);

        if self.close_pending.swap(false, Ordering::SeqCst) {
            self.do_close();
        }
    }

    fn do_close(&self) {
        self.listeners.lock().unwrap().clear();
        info!("session {} closed", self.id);
    }

    fn remove_listener(&self, id: u64) {
        self.listeners.lock().unwrap().retain(|(lid, _)| *lid != id);
    }
}

/// The session's own seat at the dispatch table: it watches VM start and
/// death, and keeps unowned step stops suspended. The default answer is
/// "do not resume" - control belongs to the user unless some listener
/// argues otherwise.
#[async_trait]
impl DispatchListener for SessionInner {
    fn kind(&self) -> ListenerKind {
        ListenerKind::Session
    }

    async fn event_occurred(&self, event: &Event) -> CoreResult<bool> {
        match &event.details {
            EventKind::VmStart { .. } => {
                debug!("session {}: VM started", self.id);
                self.vm_started.add_permits(1);
                Ok(false)
            }
            EventKind::VmDeath => {
                debug!("session {}: VM death reported", self.id);
                Ok(false)
            }
            EventKind::Step { .. } => {
                // A step the stepper armed is the stepper's call (it may
                // be mid synthetic skip); an unowned step stop stays
                // suspended for the user.
                let owned = self
                    .stepper
                    .lock()
                    .unwrap()
                    .as_ref()
                    .map(|s| s.owns_request(event.request_id))
                    .unwrap_or(false);
                Ok(owned)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl DispatchObserver for SessionInner {
    async fn suspended(&self, event: &Event) {
        if !self.state.lock().unwrap().is_connected() {
            // Events can trickle in between the wire dropping and the
            // disconnect event being processed; ignore them.
            return;
        }

        // Capture where the stop happened so views have a thread, stack,
        // and location to show.
        if let (Some(thread), Some(transport)) = (event.details.thread(), self.transport()) {
            let name = transport
                .thread_name(thread)
                .await
                .unwrap_or_else(|_| "<unknown>".to_string());
            let status = transport
                .thread_status(thread)
                .await
                .unwrap_or(jdwp_transport::ThreadStatus::Running);
            let frames = match transport.frames(thread).await {
                Ok(frames) => frames.into_iter().map(|f| f.location).collect(),
                Err(e) => {
                    warn!("could not read frames of stopped thread: {}", e);
                    Vec::new()
                }
            };
            let snapshot = ThreadSnapshot {
                thread,
                name,
                status,
                frames,
            };
            if let Err(e) = self.context.set_thread(snapshot, true) {
                warn!("could not set context for stop: {}", e);
            }
        }

        self.set_state(SessionState::Suspended);
        self.fire(SessionEventKind::Suspended, false);
    }

    async fn disconnected(&self) {
        self.finish_disconnect();
    }
}

/// RAII handle for a session subscription; dropping it unregisters the
/// listener.
#[derive(Debug)]
pub struct SessionSubscription {
    session: Weak<SessionInner>,
    id: u64,
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        if let Some(session) = self.session.upgrade() {
            session.remove_listener(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        events: Mutex<Vec<(SessionEventKind, bool)>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }

        fn kinds(&self) -> Vec<SessionEventKind> {
            self.events.lock().unwrap().iter().map(|(k, _)| *k).collect()
        }
    }

    impl SessionListener for Recorder {
        fn session_event(&self, event: &SessionEvent) {
            self.events.lock().unwrap().push((event.kind, event.brief));
        }
    }

    #[test]
    fn new_session_is_disconnected() {
        let session = Session::new("s1", CoreSettings::default());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
        assert!(session.stepper().is_err());
    }

    #[test]
    fn duplicate_listener_is_refused() {
        let session = Session::new("s1", CoreSettings::default());
        let recorder = Recorder::new();

        let _sub = session.add_listener(recorder.clone()).unwrap();
        let err = session.add_listener(recorder).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateListener));
    }

    #[tokio::test]
    async fn resume_requires_suspended_state() {
        let session = Session::new("s1", CoreSettings::default());
        let err = session.resume_vm().await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn disconnect_requires_connection() {
        let session = Session::new("s1", CoreSettings::default());
        let err = session.disconnect(false).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[test]
    fn close_requires_disconnected_state() {
        let session = Session::new("s1", CoreSettings::default());
        session.inner.set_state(SessionState::Connected);
        assert!(matches!(
            session.close(),
            Err(CoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn listeners_fire_in_registration_order_despite_panic() {
        let session = Session::new("s1", CoreSettings::default());

        struct Panicker;
        impl SessionListener for Panicker {
            fn session_event(&self, _event: &SessionEvent) {
                panic!("listener bug");
            }
        }

        let first = Recorder::new();
        let second = Recorder::new();
        let _a = session.add_listener(first.clone()).unwrap();
        let _b = session.add_listener(Arc::new(Panicker)).unwrap();
        let _c = session.add_listener(second.clone()).unwrap();

        session.inner.fire(SessionEventKind::Activated, false);

        assert_eq!(first.kinds(), vec![SessionEventKind::Activated]);
        assert_eq!(second.kinds(), vec![SessionEventKind::Activated]);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let session = Session::new("s1", CoreSettings::default());
        let recorder = Recorder::new();

        let sub = session.add_listener(recorder.clone()).unwrap();
        drop(sub);

        session.inner.fire(SessionEventKind::Activated, false);
        assert!(recorder.kinds().is_empty());
    }

    #[test]
    fn close_from_listener_callback_is_deferred() {
        let session = Session::new("s1", CoreSettings::default());

        struct Closer {
            session: Mutex<Option<Session>>,
        }
        impl SessionListener for Closer {
            fn session_event(&self, _event: &SessionEvent) {
                if let Some(session) = self.session.lock().unwrap().take() {
                    // Must not tear the listener list out from under the
                    // running notification pass.
                    session.close().unwrap();
                }
            }
        }

        let tail = Recorder::new();
        let _a = session
            .add_listener(Arc::new(Closer {
                session: Mutex::new(Some(session.clone())),
            }))
            .unwrap();
        let _b = session.add_listener(tail.clone()).unwrap();

        session.inner.fire(SessionEventKind::Deactivated, false);

        // The later listener still saw the event; the list is only
        // cleared afterwards.
        assert_eq!(tail.kinds(), vec![SessionEventKind::Deactivated]);
        assert!(session.inner.listeners.lock().unwrap().is_empty());
    }

    #[test]
    fn connections_are_identity_equal() {
        use jdwp_transport::mock::{MockConnector, MockTransport};

        let transport = Arc::new(MockTransport::new());
        let a = Connection::new(Arc::new(MockConnector::new(transport.clone())));
        let b = Connection::new(Arc::new(MockConnector::new(transport)));

        assert_eq!(a, a);
        assert_ne!(a, b);
        assert!(a.transport().is_none());
    }
}
