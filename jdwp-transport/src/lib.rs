// JDWP transport layer
//
// Implements the subset of the protocol a source-level debugger front-end
// drives: connection management, event delivery, event requests (steps,
// breakpoints, method-exit watches), and the thread/class introspection
// needed to render stops. The `DebugTransport` trait is the seam the
// debugger core consumes; `MockTransport` is the matching test double.

pub mod client;
pub mod commands;
pub mod connection;
pub mod eventloop;
pub mod events;
pub mod mock;
pub mod protocol;
pub mod reader;
pub mod reftype;
pub mod request;
pub mod thread;
pub mod types;
pub mod vm;

pub use client::{
    DebugTransport, LaunchConnector, SocketAttachConnector, SourceLocation, TransportConnector,
};
pub use connection::JdwpConnection;
pub use events::{Event, EventKind, EventSet};
pub use protocol::{JdwpError, JdwpResult};
pub use request::{StepDepth, StepSize, SuspendPolicy};
pub use types::{
    Frame, Location, MethodInfo, ObjectId, RequestId, ThreadId, ThreadStatus, Value, ValueData,
};
