// Debugger session and event-dispatch core
//
// Drives a target JVM through the JDWP transport: owns the connection and
// its event pump, tracks run/suspend state, manages single-step requests,
// and routes protocol events to prioritized listeners under a resume
// consensus - the debuggee only runs again when every listener agrees.
//
// The surrounding layers (views, editors, command shells) observe session
// and context-change events, issue step/resume/breakpoint requests through
// this API, and resolve source locations through the transport.

pub mod context;
pub mod dispatch;
pub mod error;
pub mod priority;
pub mod session;
pub mod settings;
pub mod stepper;

pub use context::{
    facets, ContextChangeEvent, ContextListener, ContextSubscription, DebuggingContext, FacetMask,
    ThreadSnapshot,
};
pub use dispatch::{
    priorities, DispatchListener, DispatchObserver, EventDispatcher, EventSelector, ListenerKind,
};
pub use error::{CoreError, CoreResult};
pub use priority::PriorityList;
pub use session::{
    Connection, Session, SessionEvent, SessionEventKind, SessionListener, SessionState,
    SessionSubscription, StatusSink, TracingStatus,
};
pub use settings::CoreSettings;
pub use stepper::{StepPhase, Stepper};
