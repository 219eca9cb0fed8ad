// Shared fixtures for the integration suites: a scripted debuggee behind
// the mock transport, plus recording listeners.

#![allow(dead_code)]

use async_trait::async_trait;
use debugger_core::{
    CoreResult, CoreSettings, DispatchListener, ListenerKind, Session, SessionEvent,
    SessionEventKind, SessionListener, StatusSink,
};
use jdwp_transport::events::suspend_policy;
use jdwp_transport::mock::{MockConnector, MockThread, MockTransport};
use jdwp_transport::types::MethodInfo;
use jdwp_transport::{Event, EventKind, EventSet, Frame, Location, ThreadStatus};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const THREAD: u64 = 0x10;
pub const CLASS: u64 = 0x1;

pub fn location(method_id: u64, index: u64) -> Location {
    Location {
        type_tag: 1,
        class_id: CLASS,
        method_id,
        index,
    }
}

/// A "main" thread with a three-frame stack, with resolvable methods.
pub fn seed_debuggee(transport: &MockTransport) {
    transport.add_thread(
        THREAD,
        MockThread {
            name: "main".to_string(),
            status: ThreadStatus::Running,
            frames: vec![
                Frame {
                    frame_id: 0xf0,
                    location: location(2, 0),
                },
                Frame {
                    frame_id: 0xf1,
                    location: location(3, 10),
                },
                Frame {
                    frame_id: 0xf2,
                    location: location(4, 20),
                },
            ],
        },
    );
    transport.add_method(
        CLASS,
        MethodInfo {
            method_id: 2,
            name: "compute".to_string(),
            signature: "()I".to_string(),
            mod_bits: 0x0001,
        },
    );
    transport.add_method(
        CLASS,
        MethodInfo {
            method_id: 3,
            name: "run".to_string(),
            signature: "()V".to_string(),
            mod_bits: 0x0001,
        },
    );
    transport.add_method(
        CLASS,
        MethodInfo {
            method_id: 4,
            name: "main".to_string(),
            signature: "([Ljava/lang/String;)V".to_string(),
            mod_bits: 0x0009,
        },
    );
    // A compiler-generated accessor for synthetic-skip scenarios.
    transport.add_method(
        CLASS,
        MethodInfo {
            method_id: 9,
            name: "access$000".to_string(),
            signature: "()I".to_string(),
            mod_bits: 0x1008,
        },
    );
}

pub fn breakpoint_set(request_id: i32) -> EventSet {
    EventSet {
        suspend_policy: suspend_policy::ALL,
        events: vec![Event {
            request_id,
            details: EventKind::Breakpoint {
                thread: THREAD,
                location: location(2, 0),
            },
        }],
    }
}

pub fn step_set(request_id: i32, loc: Location) -> EventSet {
    EventSet {
        suspend_policy: suspend_policy::ALL,
        events: vec![Event {
            request_id,
            details: EventKind::Step {
                thread: THREAD,
                location: loc,
            },
        }],
    }
}

pub fn vm_start_set() -> EventSet {
    EventSet {
        suspend_policy: suspend_policy::ALL,
        events: vec![Event {
            request_id: 0,
            details: EventKind::VmStart { thread: THREAD },
        }],
    }
}

pub fn method_exit_set(request_id: i32, loc: Location, value: jdwp_transport::Value) -> EventSet {
    EventSet {
        suspend_policy: suspend_policy::ALL,
        events: vec![Event {
            request_id,
            details: EventKind::MethodExit {
                thread: THREAD,
                location: loc,
                return_value: Some(value),
            },
        }],
    }
}

/// Records session lifecycle events.
pub struct EventLog {
    events: Mutex<Vec<(SessionEventKind, bool)>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn kinds(&self) -> Vec<SessionEventKind> {
        self.events.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    pub fn entries(&self) -> Vec<(SessionEventKind, bool)> {
        self.events.lock().unwrap().clone()
    }
}

impl SessionListener for EventLog {
    fn session_event(&self, event: &SessionEvent) {
        self.events
            .lock()
            .unwrap()
            .push((event.kind, event.brief));
    }
}

/// Stands in for a breakpoint manager: votes to keep the target stopped.
pub struct HoldListener;

#[async_trait]
impl DispatchListener for HoldListener {
    fn kind(&self) -> ListenerKind {
        ListenerKind::Breakpoint
    }

    async fn event_occurred(&self, _event: &Event) -> CoreResult<bool> {
        Ok(false)
    }
}

/// Captures status lines the core emits.
pub struct StatusLog {
    lines: Mutex<Vec<String>>,
}

impl StatusLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(Vec::new()),
        })
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl StatusSink for StatusLog {
    fn status(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
}

/// Poll until the condition holds or two seconds pass.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// A session attached to a scripted debuggee, with an event log installed.
pub struct Harness {
    pub session: Session,
    pub transport: Arc<MockTransport>,
    pub log: Arc<EventLog>,
    pub status: Arc<StatusLog>,
    _subscription: debugger_core::SessionSubscription,
}

pub async fn attached_session(settings: CoreSettings) -> Harness {
    let transport = Arc::new(MockTransport::new());
    seed_debuggee(&transport);

    let status = StatusLog::new();
    let session = Session::with_status_sink("test-session", settings, status.clone());
    let log = EventLog::new();
    let subscription = session.add_listener(log.clone()).unwrap();

    let connection = debugger_core::Connection::new(Arc::new(MockConnector::new(Arc::clone(
        &transport,
    ))));
    session.connect(connection).await.unwrap();

    Harness {
        session,
        transport,
        log,
        status,
        _subscription: subscription,
    }
}

/// Drive the session into the Suspended state with a breakpoint stop.
pub async fn suspend_at_breakpoint(harness: &Harness) {
    harness
        .session
        .dispatcher()
        .register(
            debugger_core::EventSelector::Breakpoint,
            Arc::new(HoldListener),
            1000,
        )
        .unwrap();
    harness.transport.push_event_set(breakpoint_set(1));
    let session = harness.session.clone();
    wait_until(move || session.is_suspended()).await;
}
