// Deterministic, in-memory transport test double
//
// Downstream crates drive their event pumps against scripted event sets and
// assert on the requests the code under test issued.

use crate::client::{DebugTransport, SourceLocation, TransportConnector};
use crate::events::EventSet;
use crate::protocol::{JdwpError, JdwpResult};
use crate::request::{StepDepth, StepSize};
use crate::types::{Frame, Location, MethodInfo, RequestId, ThreadId, ThreadStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One scripted thread visible through the mock.
#[derive(Debug, Clone)]
pub struct MockThread {
    pub name: String,
    pub status: ThreadStatus,
    pub frames: Vec<Frame>,
}

/// Record of a step request issued through the mock.
#[derive(Debug, Clone)]
pub struct StepRequestRecord {
    pub id: RequestId,
    pub thread: ThreadId,
    pub size: StepSize,
    pub depth: StepDepth,
    pub excludes: Vec<String>,
}

#[derive(Debug, Default)]
struct MockState {
    next_request: RequestId,
    threads: HashMap<ThreadId, MockThread>,
    methods: HashMap<(u64, u64), MethodInfo>,
    can_get_return_values: bool,
    fail_next_step_request: bool,

    step_requests: Vec<StepRequestRecord>,
    method_exit_requests: Vec<(RequestId, ThreadId)>,
    breakpoint_requests: Vec<(RequestId, Location)>,
    cleared: Vec<(u8, RequestId)>,
    resume_all_calls: usize,
    suspend_all_calls: usize,
    resumed_threads: Vec<ThreadId>,
    disposed: bool,
    exit_code: Option<i32>,
}

#[derive(Debug)]
pub struct MockTransport {
    event_tx: Mutex<Option<mpsc::Sender<EventSet>>>,
    event_rx: tokio::sync::Mutex<mpsc::Receiver<EventSet>>,
    state: Mutex<MockState>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        Self {
            event_tx: Mutex::new(Some(event_tx)),
            event_rx: tokio::sync::Mutex::new(event_rx),
            state: Mutex::new(MockState {
                next_request: 100,
                can_get_return_values: true,
                ..MockState::default()
            }),
        }
    }

    /// Queue an event set for the pump to pull.
    pub fn push_event_set(&self, set: EventSet) {
        let tx = self.event_tx.lock().unwrap();
        if let Some(tx) = tx.as_ref() {
            tx.try_send(set).expect("mock event buffer full");
        }
    }

    /// Simulate the debuggee going away: queued sets still drain, then
    /// `next_event_set` reports `Disconnected`.
    pub fn close(&self) {
        self.event_tx.lock().unwrap().take();
    }

    pub fn add_thread(&self, id: ThreadId, thread: MockThread) {
        self.state.lock().unwrap().threads.insert(id, thread);
    }

    pub fn add_method(&self, class_id: u64, method: MethodInfo) {
        self.state
            .lock()
            .unwrap()
            .methods
            .insert((class_id, method.method_id), method);
    }

    pub fn set_can_get_return_values(&self, supported: bool) {
        self.state.lock().unwrap().can_get_return_values = supported;
    }

    /// Make the next step-request creation fail with a thread-state error.
    pub fn fail_next_step_request(&self) {
        self.state.lock().unwrap().fail_next_step_request = true;
    }

    pub fn step_requests(&self) -> Vec<StepRequestRecord> {
        self.state.lock().unwrap().step_requests.clone()
    }

    pub fn method_exit_requests(&self) -> Vec<(RequestId, ThreadId)> {
        self.state.lock().unwrap().method_exit_requests.clone()
    }

    pub fn breakpoint_requests(&self) -> Vec<(RequestId, Location)> {
        self.state.lock().unwrap().breakpoint_requests.clone()
    }

    pub fn cleared_requests(&self) -> Vec<(u8, RequestId)> {
        self.state.lock().unwrap().cleared.clone()
    }

    pub fn resume_all_count(&self) -> usize {
        self.state.lock().unwrap().resume_all_calls
    }

    pub fn suspend_all_count(&self) -> usize {
        self.state.lock().unwrap().suspend_all_calls
    }

    pub fn resumed_threads(&self) -> Vec<ThreadId> {
        self.state.lock().unwrap().resumed_threads.clone()
    }

    pub fn dispose_called(&self) -> bool {
        self.state.lock().unwrap().disposed
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.state.lock().unwrap().exit_code
    }
}

#[async_trait]
impl DebugTransport for MockTransport {
    async fn next_event_set(&self) -> JdwpResult<EventSet> {
        let mut rx = self.event_rx.lock().await;
        rx.recv().await.ok_or(JdwpError::Disconnected)
    }

    async fn create_step_request(
        &self,
        thread: ThreadId,
        size: StepSize,
        depth: StepDepth,
        excludes: &[String],
    ) -> JdwpResult<RequestId> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_step_request {
            state.fail_next_step_request = false;
            return Err(JdwpError::ErrorCode(13, "THREAD_NOT_SUSPENDED"));
        }
        state.next_request += 1;
        let id = state.next_request;
        state.step_requests.push(StepRequestRecord {
            id,
            thread,
            size,
            depth,
            excludes: excludes.to_vec(),
        });
        Ok(id)
    }

    async fn create_method_exit_request(&self, thread: ThreadId) -> JdwpResult<RequestId> {
        let mut state = self.state.lock().unwrap();
        state.next_request += 1;
        let id = state.next_request;
        state.method_exit_requests.push((id, thread));
        Ok(id)
    }

    async fn create_breakpoint_request(&self, location: Location) -> JdwpResult<RequestId> {
        let mut state = self.state.lock().unwrap();
        state.next_request += 1;
        let id = state.next_request;
        state.breakpoint_requests.push((id, location));
        Ok(id)
    }

    async fn clear_request(&self, event_kind: u8, request: RequestId) -> JdwpResult<()> {
        self.state
            .lock()
            .unwrap()
            .cleared
            .push((event_kind, request));
        Ok(())
    }

    async fn suspend_all(&self) -> JdwpResult<()> {
        self.state.lock().unwrap().suspend_all_calls += 1;
        Ok(())
    }

    async fn resume_all(&self) -> JdwpResult<()> {
        self.state.lock().unwrap().resume_all_calls += 1;
        Ok(())
    }

    async fn resume_thread(&self, thread: ThreadId) -> JdwpResult<()> {
        self.state.lock().unwrap().resumed_threads.push(thread);
        Ok(())
    }

    async fn thread_name(&self, thread: ThreadId) -> JdwpResult<String> {
        let state = self.state.lock().unwrap();
        state
            .threads
            .get(&thread)
            .map(|t| t.name.clone())
            .ok_or(JdwpError::ErrorCode(10, "INVALID_THREAD"))
    }

    async fn thread_status(&self, thread: ThreadId) -> JdwpResult<ThreadStatus> {
        let state = self.state.lock().unwrap();
        state
            .threads
            .get(&thread)
            .map(|t| t.status)
            .ok_or(JdwpError::ErrorCode(10, "INVALID_THREAD"))
    }

    async fn frames(&self, thread: ThreadId) -> JdwpResult<Vec<Frame>> {
        let state = self.state.lock().unwrap();
        state
            .threads
            .get(&thread)
            .map(|t| t.frames.clone())
            .ok_or(JdwpError::ErrorCode(10, "INVALID_THREAD"))
    }

    async fn method_info(&self, location: &Location) -> JdwpResult<MethodInfo> {
        let state = self.state.lock().unwrap();
        state
            .methods
            .get(&(location.class_id, location.method_id))
            .cloned()
            .ok_or(JdwpError::ErrorCode(23, "INVALID_METHODID"))
    }

    async fn describe_location(&self, location: &Location) -> JdwpResult<SourceLocation> {
        let method = self.method_info(location).await?;
        Ok(SourceLocation {
            class_name: format!("mock.Type{:x}", location.class_id),
            method_name: method.name,
            source_file: None,
            line: None,
        })
    }

    fn can_get_return_values(&self) -> bool {
        self.state.lock().unwrap().can_get_return_values
    }

    async fn dispose(&self) -> JdwpResult<()> {
        self.state.lock().unwrap().disposed = true;
        Ok(())
    }

    async fn exit(&self, code: i32) -> JdwpResult<()> {
        self.state.lock().unwrap().exit_code = Some(code);
        Ok(())
    }
}

/// Connector handing out a pre-built mock transport.
#[derive(Debug, Clone)]
pub struct MockConnector {
    transport: Arc<MockTransport>,
    remote: bool,
    refuse: bool,
}

impl MockConnector {
    pub fn new(transport: Arc<MockTransport>) -> Self {
        Self {
            transport,
            remote: true,
            refuse: false,
        }
    }

    /// Present the connection as launch-mode rather than attach-mode.
    pub fn local(mut self) -> Self {
        self.remote = false;
        self
    }

    /// Refuse the next connect with an IO error.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self) -> JdwpResult<Arc<dyn DebugTransport>> {
        if self.refuse {
            return Err(JdwpError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(self.transport.clone() as Arc<dyn DebugTransport>)
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    fn address(&self) -> String {
        "mock:0".to_string()
    }
}
