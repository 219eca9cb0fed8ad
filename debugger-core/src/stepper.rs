// Stepper
//
// Translates logical step-into/over/out operations into one-shot protocol
// step requests, arms them, and resumes the target. When the step event
// fires it applies policy first: steps landing in synthetic methods are
// transparently stepped out of, and method-exit events are reported as
// "method X returned Y" without stopping.

use crate::context::DebuggingContext;
use crate::dispatch::DispatchListener;
use crate::error::{CoreError, CoreResult};
use crate::session::SessionInner;
use crate::settings::CoreSettings;
use async_trait::async_trait;
use jdwp_transport::commands::event_kinds;
use jdwp_transport::{
    DebugTransport, Event, EventKind, Location, RequestId, StepDepth, StepSize, ThreadId,
};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error, info, warn};

/// Synthetic frames do not nest meaningfully in practice, but nothing in
/// the protocol forbids it; the ceiling turns a pathological debuggee into
/// a reported error instead of an endless silent step loop.
const MAX_SYNTHETIC_HOPS: u32 = 32;

/// Where an outstanding step stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Request created but the target not yet resumed.
    Pending,
    /// Target resumed; the one-shot request will fire or be cleared.
    Armed,
}

#[derive(Debug)]
struct PendingStep {
    thread: ThreadId,
    request: RequestId,
    method_exit: Option<RequestId>,
    phase: StepPhase,
    synthetic_hops: u32,
}

/// Per-session stepping state machine. At most one step request is
/// outstanding per thread; creating a new one first deletes its
/// predecessor.
pub struct Stepper {
    transport: Arc<dyn DebugTransport>,
    context: Arc<DebuggingContext>,
    session: Weak<SessionInner>,
    settings: CoreSettings,
    pending: Mutex<Option<PendingStep>>,
}

impl Stepper {
    pub(crate) fn new(
        transport: Arc<dyn DebugTransport>,
        context: Arc<DebuggingContext>,
        session: Weak<SessionInner>,
        settings: CoreSettings,
    ) -> Self {
        Self {
            transport,
            context,
            session,
            settings,
            pending: Mutex::new(None),
        }
    }

    /// Step into the next executed line, entering calls.
    pub async fn step_into(&self) -> CoreResult<()> {
        self.step(StepDepth::Into).await
    }

    /// Step to the next line in the current frame, over calls.
    pub async fn step_over(&self) -> CoreResult<()> {
        self.step(StepDepth::Over).await
    }

    /// Step out of the current frame.
    pub async fn step_out(&self) -> CoreResult<()> {
        self.step(StepDepth::Out).await
    }

    /// Phase of the outstanding step request, `None` when idle.
    pub fn phase(&self) -> Option<StepPhase> {
        self.pending.lock().unwrap().as_ref().map(|p| p.phase)
    }

    /// Returns once the request is armed and the resume has been issued,
    /// not once the step completes.
    async fn step(&self, depth: StepDepth) -> CoreResult<()> {
        let thread = self.context.thread().ok_or(CoreError::NoCurrentThread)?;

        // One outstanding request per thread: delete the previous one
        // before creating its replacement.
        let previous = self.pending.lock().unwrap().take();
        if let Some(previous) = previous {
            self.clear_requests(&previous).await;
        }

        let request = self
            .transport
            .create_step_request(thread, StepSize::Line, depth, &self.settings.stepping_excludes)
            .await
            .map_err(CoreError::stepping)?;

        // Return values only exist for a step-out, and only when the VM
        // can deliver them.
        let method_exit = if depth == StepDepth::Out && self.transport.can_get_return_values() {
            match self.transport.create_method_exit_request(thread).await {
                Ok(id) => Some(id),
                Err(e) => {
                    self.clear_step_request(request).await;
                    return Err(CoreError::stepping(e));
                }
            }
        } else {
            None
        };

        info!("step {} armed on thread {:#x}", depth, thread);
        *self.pending.lock().unwrap() = Some(PendingStep {
            thread,
            request,
            method_exit,
            phase: StepPhase::Pending,
            synthetic_hops: 0,
        });

        let session = self.session.upgrade().ok_or(CoreError::Disconnected)?;
        session.resume_for_step().await?;

        let mut pending = self.pending.lock().unwrap();
        if let Some(p) = pending.as_mut() {
            if p.request == request {
                p.phase = StepPhase::Armed;
            }
        }
        Ok(())
    }

    /// Whether the given request id is the outstanding step request or
    /// its companion method-exit watch.
    pub(crate) fn owns_request(&self, request: RequestId) -> bool {
        match self.pending.lock().unwrap().as_ref() {
            Some(p) => p.request == request || p.method_exit == Some(request),
            None => false,
        }
    }

    /// Forget the outstanding request without touching the transport.
    /// Used when the connection is already gone.
    pub(crate) fn cancel(&self) {
        if self.pending.lock().unwrap().take().is_some() {
            debug!("outstanding step request dropped");
        }
    }

    async fn clear_step_request(&self, request: RequestId) {
        if let Err(e) = self
            .transport
            .clear_request(event_kinds::SINGLE_STEP, request)
            .await
        {
            warn!("failed to clear step request {}: {}", request, e);
        }
    }

    async fn clear_requests(&self, step: &PendingStep) {
        self.clear_step_request(step.request).await;
        if let Some(id) = step.method_exit {
            if let Err(e) = self
                .transport
                .clear_request(self.method_exit_kind(), id)
                .await
            {
                warn!("failed to clear method-exit request {}: {}", id, e);
            }
        }
    }

    fn method_exit_kind(&self) -> u8 {
        if self.transport.can_get_return_values() {
            event_kinds::METHOD_EXIT_WITH_RETURN_VALUE
        } else {
            event_kinds::METHOD_EXIT
        }
    }

    async fn location_is_synthetic(&self, location: &Location) -> bool {
        match self.transport.method_info(location).await {
            Ok(method) => method.is_synthetic(),
            Err(e) => {
                // If the method cannot be resolved, stop there rather than
                // silently stepping onward.
                warn!("could not resolve method for step location: {}", e);
                false
            }
        }
    }

    /// The one-shot step request fired. Decide whether the user sees the
    /// stop or whether policy keeps the target moving.
    async fn step_completed(&self, event: &Event, location: &Location) -> CoreResult<bool> {
        let (thread, hops) = {
            let pending = self.pending.lock().unwrap();
            match pending.as_ref() {
                Some(p) if p.request == event.request_id => (p.thread, p.synthetic_hops),
                // Someone else's step request; not our stop to veto.
                _ => return Ok(true),
            }
        };

        if self.settings.skip_synthetics && self.location_is_synthetic(location).await {
            if hops >= MAX_SYNTHETIC_HOPS {
                // Defensive ceiling: report and hand control to the user
                // instead of looping forever through synthetic frames.
                error!(
                    "abandoning synthetic skip after {} hops on thread {:#x}",
                    hops, thread
                );
                self.finish_pending().await;
                return Ok(false);
            }

            // The user never asked to be here: step out of the synthetic
            // frame and let the target keep running.
            debug!("stepping out of synthetic method (hop {})", hops + 1);
            let request = match self
                .transport
                .create_step_request(
                    thread,
                    StepSize::Line,
                    StepDepth::Out,
                    &self.settings.stepping_excludes,
                )
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    error!("failed to create synthetic skip-out request: {}", e);
                    self.finish_pending().await;
                    return Ok(false);
                }
            };

            let mut pending = self.pending.lock().unwrap();
            if let Some(p) = pending.as_mut() {
                p.request = request;
                p.synthetic_hops = hops + 1;
                p.phase = StepPhase::Armed;
            }
            return Ok(true);
        }

        // A real stop. The request already deleted itself server-side via
        // its count filter; only the companion watch needs cleanup.
        self.finish_pending().await;
        Ok(false)
    }

    /// Clear the pending slot and any still-armed companion request.
    async fn finish_pending(&self) {
        let finished = self.pending.lock().unwrap().take();
        if let Some(finished) = finished {
            if let Some(id) = finished.method_exit {
                if let Err(e) = self
                    .transport
                    .clear_request(self.method_exit_kind(), id)
                    .await
                {
                    warn!("failed to clear method-exit request {}: {}", id, e);
                }
            }
        }
    }

    /// A method-exit watch fired during a step-out: report the return
    /// value, then keep going; this stop is informational.
    async fn method_exited(&self, event: &Event, location: &Location) -> CoreResult<bool> {
        let owned = {
            let mut pending = self.pending.lock().unwrap();
            match pending.as_mut() {
                Some(p) if p.method_exit == Some(event.request_id) => {
                    // The watch was one-shot; it is gone server-side now.
                    p.method_exit = None;
                    true
                }
                _ => false,
            }
        };
        if !owned {
            return Ok(true);
        }

        let method = match self.transport.method_info(location).await {
            Ok(m) => m.name,
            Err(_) => "<unknown>".to_string(),
        };
        let value = match &event.details {
            EventKind::MethodExit {
                return_value: Some(value),
                ..
            } => value.display(),
            _ => "(value unavailable)".to_string(),
        };

        if let Some(session) = self.session.upgrade() {
            session.status(&format!("method {} returned {}", method, value));
        }
        Ok(true)
    }
}

#[async_trait]
impl DispatchListener for Stepper {
    async fn event_occurred(&self, event: &Event) -> CoreResult<bool> {
        match &event.details {
            EventKind::Step { location, .. } => {
                let location = *location;
                self.step_completed(event, &location).await
            }
            EventKind::MethodExit { location, .. } => {
                let location = *location;
                self.method_exited(event, &location).await
            }
            _ => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jdwp_transport::mock::MockTransport;
    use jdwp_transport::types::MethodInfo;

    fn location(class_id: u64, method_id: u64) -> Location {
        Location {
            type_tag: 1,
            class_id,
            method_id,
            index: 0,
        }
    }

    fn step_event(request_id: RequestId, loc: Location) -> Event {
        Event {
            request_id,
            details: EventKind::Step {
                thread: 0x10,
                location: loc,
            },
        }
    }

    fn stepper_with(transport: &Arc<MockTransport>, settings: CoreSettings) -> Stepper {
        Stepper::new(
            Arc::clone(transport) as Arc<dyn DebugTransport>,
            Arc::new(DebuggingContext::new()),
            Weak::new(),
            settings,
        )
    }

    fn arm(stepper: &Stepper, request: RequestId, method_exit: Option<RequestId>) {
        *stepper.pending.lock().unwrap() = Some(PendingStep {
            thread: 0x10,
            request,
            method_exit,
            phase: StepPhase::Armed,
            synthetic_hops: 0,
        });
    }

    fn plain_method(method_id: u64) -> MethodInfo {
        MethodInfo {
            method_id,
            name: "compute".to_string(),
            signature: "()I".to_string(),
            mod_bits: 0x0001,
        }
    }

    fn synthetic_method(method_id: u64) -> MethodInfo {
        MethodInfo {
            method_id,
            name: "access$100".to_string(),
            signature: "()V".to_string(),
            mod_bits: 0x1008,
        }
    }

    #[tokio::test]
    async fn unowned_step_event_votes_resume() {
        let transport = Arc::new(MockTransport::new());
        let stepper = stepper_with(&transport, CoreSettings::default());

        let vote = stepper
            .event_occurred(&step_event(999, location(1, 2)))
            .await
            .unwrap();
        assert!(vote);
    }

    #[tokio::test]
    async fn own_step_event_stops_and_clears_pending() {
        let transport = Arc::new(MockTransport::new());
        transport.add_method(1, plain_method(2));
        let stepper = stepper_with(&transport, CoreSettings::default());
        arm(&stepper, 42, None);

        let vote = stepper
            .event_occurred(&step_event(42, location(1, 2)))
            .await
            .unwrap();
        assert!(!vote);
        assert!(stepper.phase().is_none());
    }

    #[tokio::test]
    async fn completion_clears_companion_method_exit_watch() {
        let transport = Arc::new(MockTransport::new());
        transport.add_method(1, plain_method(2));
        let stepper = stepper_with(&transport, CoreSettings::default());
        arm(&stepper, 42, Some(77));

        stepper
            .event_occurred(&step_event(42, location(1, 2)))
            .await
            .unwrap();

        let cleared = transport.cleared_requests();
        assert_eq!(
            cleared,
            vec![(event_kinds::METHOD_EXIT_WITH_RETURN_VALUE, 77)]
        );
    }

    #[tokio::test]
    async fn synthetic_stop_steps_out_and_votes_resume() {
        let transport = Arc::new(MockTransport::new());
        transport.add_method(1, synthetic_method(2));
        let stepper = stepper_with(&transport, CoreSettings::default());
        arm(&stepper, 42, None);

        let vote = stepper
            .event_occurred(&step_event(42, location(1, 2)))
            .await
            .unwrap();
        assert!(vote);

        // A fresh step-out request replaced the fired one.
        let requests = transport.step_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].depth, StepDepth::Out);
        assert_eq!(stepper.phase(), Some(StepPhase::Armed));
    }

    #[tokio::test]
    async fn synthetic_stop_with_skip_disabled_is_a_real_stop() {
        let transport = Arc::new(MockTransport::new());
        transport.add_method(1, synthetic_method(2));
        let settings = CoreSettings {
            skip_synthetics: false,
            ..CoreSettings::default()
        };
        let stepper = stepper_with(&transport, settings);
        arm(&stepper, 42, None);

        let vote = stepper
            .event_occurred(&step_event(42, location(1, 2)))
            .await
            .unwrap();
        assert!(!vote);
        assert!(transport.step_requests().is_empty());
    }

    #[tokio::test]
    async fn synthetic_skip_is_bounded() {
        let transport = Arc::new(MockTransport::new());
        transport.add_method(1, synthetic_method(2));
        let stepper = stepper_with(&transport, CoreSettings::default());
        arm(&stepper, 42, None);
        stepper
            .pending
            .lock()
            .unwrap()
            .as_mut()
            .unwrap()
            .synthetic_hops = MAX_SYNTHETIC_HOPS;

        let vote = stepper
            .event_occurred(&step_event(42, location(1, 2)))
            .await
            .unwrap();

        // Ceiling hit: no further request, control stays with the user.
        assert!(!vote);
        assert!(transport.step_requests().is_empty());
        assert!(stepper.phase().is_none());
    }

    #[tokio::test]
    async fn method_exit_watch_reports_and_resumes() {
        let transport = Arc::new(MockTransport::new());
        transport.add_method(1, plain_method(2));
        let stepper = stepper_with(&transport, CoreSettings::default());
        arm(&stepper, 42, Some(77));

        let event = Event {
            request_id: 77,
            details: EventKind::MethodExit {
                thread: 0x10,
                location: location(1, 2),
                return_value: Some(jdwp_transport::Value {
                    tag: 73,
                    data: jdwp_transport::ValueData::Int(5),
                }),
            },
        };

        let vote = stepper.event_occurred(&event).await.unwrap();
        assert!(vote);

        // The watch is spent; the step request itself is still armed.
        let pending = stepper.pending.lock().unwrap();
        let p = pending.as_ref().unwrap();
        assert_eq!(p.method_exit, None);
        assert_eq!(p.request, 42);
    }
}
