// Transport seam consumed by the debugger core
//
// The core never touches the wire directly; it drives a `DebugTransport`
// trait object, connected through a `TransportConnector` chosen at
// configuration time. `JdwpConnection` is the real implementation; see
// `mock` for the deterministic test double.

use crate::connection::JdwpConnection;
use crate::events::EventSet;
use crate::protocol::{JdwpError, JdwpResult};
use crate::request::{StepDepth, StepSize, SuspendPolicy};
use crate::types::{Frame, Location, MethodInfo, RequestId, ThreadId, ThreadStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

/// A code location resolved to human-readable source terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub class_name: String,
    pub method_name: String,
    pub source_file: Option<String>,
    pub line: Option<i32>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)?;
        match (&self.source_file, self.line) {
            (Some(file), Some(line)) => write!(f, " ({}:{})", file, line),
            (Some(file), None) => write!(f, " ({})", file),
            _ => Ok(()),
        }
    }
}

/// Turn a JNI signature like "Lcom/acme/Main;" into "com.acme.Main".
pub fn signature_to_class_name(signature: &str) -> String {
    signature
        .trim_start_matches('L')
        .trim_end_matches(';')
        .replace('/', ".")
}

/// The debug-protocol surface the core consumes. Everything here is an
/// outbound call to the debuggee except `next_event_set`, which blocks
/// until the VM pushes the next batch of events.
#[async_trait]
pub trait DebugTransport: Send + Sync + fmt::Debug {
    /// Pull the next event set; `Err(Disconnected)` once the peer is gone.
    async fn next_event_set(&self) -> JdwpResult<EventSet>;

    /// Create a one-shot step request on the thread. The request deletes
    /// itself server-side after firing once.
    async fn create_step_request(
        &self,
        thread: ThreadId,
        size: StepSize,
        depth: StepDepth,
        excludes: &[String],
    ) -> JdwpResult<RequestId>;

    /// Create a one-shot method-exit watch on the thread.
    async fn create_method_exit_request(&self, thread: ThreadId) -> JdwpResult<RequestId>;

    /// Create a breakpoint request at the location.
    async fn create_breakpoint_request(&self, location: Location) -> JdwpResult<RequestId>;

    /// Delete an outstanding event request.
    async fn clear_request(&self, event_kind: u8, request: RequestId) -> JdwpResult<()>;

    async fn suspend_all(&self) -> JdwpResult<()>;
    async fn resume_all(&self) -> JdwpResult<()>;
    async fn resume_thread(&self, thread: ThreadId) -> JdwpResult<()>;

    async fn thread_name(&self, thread: ThreadId) -> JdwpResult<String>;
    async fn thread_status(&self, thread: ThreadId) -> JdwpResult<ThreadStatus>;
    async fn frames(&self, thread: ThreadId) -> JdwpResult<Vec<Frame>>;

    /// Name, signature and modifiers of the method containing a location.
    async fn method_info(&self, location: &Location) -> JdwpResult<MethodInfo>;

    /// Resolve a location to class/method/file/line terms.
    async fn describe_location(&self, location: &Location) -> JdwpResult<SourceLocation>;

    /// Whether method-exit events deliver return values on this VM.
    fn can_get_return_values(&self) -> bool;

    /// Detach, leaving the debuggee running.
    async fn dispose(&self) -> JdwpResult<()>;

    /// Terminate the debuggee.
    async fn exit(&self, code: i32) -> JdwpResult<()>;
}

#[async_trait]
impl DebugTransport for JdwpConnection {
    async fn next_event_set(&self) -> JdwpResult<EventSet> {
        JdwpConnection::next_event_set(self).await
    }

    async fn create_step_request(
        &self,
        thread: ThreadId,
        size: StepSize,
        depth: StepDepth,
        excludes: &[String],
    ) -> JdwpResult<RequestId> {
        self.set_step_request(thread, size, depth, excludes).await
    }

    async fn create_method_exit_request(&self, thread: ThreadId) -> JdwpResult<RequestId> {
        self.set_method_exit_request(thread, self.can_get_return_values())
            .await
    }

    async fn create_breakpoint_request(&self, location: Location) -> JdwpResult<RequestId> {
        self.set_breakpoint_request(location, SuspendPolicy::All)
            .await
    }

    async fn clear_request(&self, event_kind: u8, request: RequestId) -> JdwpResult<()> {
        JdwpConnection::clear_request(self, event_kind, request).await
    }

    async fn suspend_all(&self) -> JdwpResult<()> {
        self.suspend_vm().await
    }

    async fn resume_all(&self) -> JdwpResult<()> {
        self.resume_vm().await
    }

    async fn resume_thread(&self, thread: ThreadId) -> JdwpResult<()> {
        JdwpConnection::resume_thread(self, thread).await
    }

    async fn thread_name(&self, thread: ThreadId) -> JdwpResult<String> {
        JdwpConnection::thread_name(self, thread).await
    }

    async fn thread_status(&self, thread: ThreadId) -> JdwpResult<ThreadStatus> {
        JdwpConnection::thread_status(self, thread).await
    }

    async fn frames(&self, thread: ThreadId) -> JdwpResult<Vec<Frame>> {
        JdwpConnection::frames(self, thread).await
    }

    async fn method_info(&self, location: &Location) -> JdwpResult<MethodInfo> {
        self.method_by_id(location.class_id, location.method_id).await
    }

    async fn describe_location(&self, location: &Location) -> JdwpResult<SourceLocation> {
        let signature = self.type_signature(location.class_id).await?;
        let method = self.method_by_id(location.class_id, location.method_id).await?;
        let source_file = self.source_file(location.class_id).await?;
        let line = match self.line_table(location).await {
            Ok(table) => table.line_at(location.index),
            // Native and synthetic methods have no line table.
            Err(JdwpError::ErrorCode(_, _)) => None,
            Err(other) => return Err(other),
        };

        Ok(SourceLocation {
            class_name: signature_to_class_name(&signature),
            method_name: method.name,
            source_file,
            line,
        })
    }

    fn can_get_return_values(&self) -> bool {
        self.reports_return_values.load(Ordering::Relaxed)
    }

    async fn dispose(&self) -> JdwpResult<()> {
        self.dispose_vm().await
    }

    async fn exit(&self, code: i32) -> JdwpResult<()> {
        self.exit_vm(code).await
    }
}

/// Establishes transports. Chosen once when the hosting application is
/// configured; sessions call it on every `connect`.
#[async_trait]
pub trait TransportConnector: Send + Sync + fmt::Debug {
    async fn connect(&self) -> JdwpResult<Arc<dyn DebugTransport>>;

    /// True when attaching to an already-running VM, false when this
    /// connector launched the debuggee itself.
    fn is_remote(&self) -> bool;

    /// Human-readable peer address for status lines.
    fn address(&self) -> String;
}

/// Attach to a VM already listening on a JDWP socket.
#[derive(Debug, Clone)]
pub struct SocketAttachConnector {
    pub host: String,
    pub port: u16,
}

impl SocketAttachConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl TransportConnector for SocketAttachConnector {
    async fn connect(&self) -> JdwpResult<Arc<dyn DebugTransport>> {
        let conn = JdwpConnection::open(&self.host, self.port).await?;
        Ok(Arc::new(conn))
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Launch a JVM with the JDWP agent listening, then attach to it.
#[derive(Debug, Clone)]
pub struct LaunchConnector {
    pub java: String,
    pub args: Vec<String>,
    pub main_class: String,
    pub port: u16,
}

#[async_trait]
impl TransportConnector for LaunchConnector {
    async fn connect(&self) -> JdwpResult<Arc<dyn DebugTransport>> {
        let agent = format!(
            "-agentlib:jdwp=transport=dt_socket,server=y,suspend=y,address={}",
            self.port
        );

        let child = tokio::process::Command::new(&self.java)
            .arg(agent)
            .args(&self.args)
            .arg(&self.main_class)
            .spawn()?;
        info!(
            "launched debuggee pid={:?} main={}",
            child.id(),
            self.main_class
        );

        // The agent needs a moment to open its listen socket.
        let mut attempt = 0;
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            match JdwpConnection::open("localhost", self.port).await {
                Ok(conn) => return Ok(Arc::new(conn)),
                Err(e) if attempt < 25 => {
                    attempt += 1;
                    tracing::debug!("attach attempt {} failed: {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn address(&self) -> String {
        format!("localhost:{} ({})", self.port, self.main_class)
    }
}
