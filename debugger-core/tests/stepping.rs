// Stepping flows end to end: request lifecycle, the one-outstanding-step
// invariant, synthetic-method skipping through the pump, and method-return
// reporting.

mod support;

use debugger_core::{CoreError, CoreSettings, SessionEventKind, SessionState, StepPhase};
use jdwp_transport::commands::event_kinds;
use jdwp_transport::{StepDepth, Value, ValueData};
use support::*;

#[tokio::test]
async fn step_without_current_thread_is_refused() {
    let harness = attached_session(CoreSettings::default()).await;

    // Connected but never stopped: no thread is selected.
    let err = harness.session.stepper().unwrap().step_over().await.unwrap_err();
    assert!(matches!(err, CoreError::NoCurrentThread));

    // No request went out and the session state did not move.
    assert!(harness.transport.step_requests().is_empty());
    assert_eq!(harness.session.state(), SessionState::Connected);
}

#[tokio::test]
async fn step_over_arms_a_one_shot_request_and_resumes() {
    let settings = CoreSettings {
        stepping_excludes: vec!["java.*".to_string(), "sun.*".to_string()],
        ..CoreSettings::default()
    };
    let harness = attached_session(settings).await;
    suspend_at_breakpoint(&harness).await;

    let stepper = harness.session.stepper().unwrap();
    stepper.step_over().await.unwrap();

    let requests = harness.transport.step_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].thread, THREAD);
    assert_eq!(requests[0].depth, StepDepth::Over);
    assert_eq!(requests[0].excludes, vec!["java.*", "sun.*"]);

    // The stepper resumed the session once the request was armed.
    assert_eq!(harness.transport.resume_all_count(), 1);
    assert_eq!(harness.session.state(), SessionState::Connected);
    assert_eq!(stepper.phase(), Some(StepPhase::Armed));
    assert_eq!(
        harness.log.kinds().last(),
        Some(&SessionEventKind::Resuming)
    );
}

#[tokio::test]
async fn consecutive_steps_clear_the_previous_request() {
    let harness = attached_session(CoreSettings::default()).await;
    suspend_at_breakpoint(&harness).await;

    let stepper = harness.session.stepper().unwrap();
    stepper.step_into().await.unwrap();
    let first = harness.transport.step_requests()[0].id;

    stepper.step_into().await.unwrap();

    // The second creation deleted the first request: the two never
    // coexist on the thread.
    assert!(harness
        .transport
        .cleared_requests()
        .contains(&(event_kinds::SINGLE_STEP, first)));

    let requests = harness.transport.step_requests();
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[1].id, first);
}

#[tokio::test]
async fn step_completion_suspends_for_the_user() {
    let harness = attached_session(CoreSettings::default()).await;
    suspend_at_breakpoint(&harness).await;

    let stepper = harness.session.stepper().unwrap();
    stepper.step_over().await.unwrap();
    let request = harness.transport.step_requests()[0].id;

    // The step lands on an ordinary method: a real stop.
    harness.transport.push_event_set(step_set(request, location(3, 10)));

    let session = harness.session.clone();
    wait_until(move || session.is_suspended()).await;

    assert_eq!(stepper.phase(), None);
    assert_eq!(harness.session.context().location(), Some(location(2, 0)));
    assert_eq!(
        harness.log.kinds().last(),
        Some(&SessionEventKind::Suspended)
    );
    // Only the step's own resume happened; the completion stayed stopped.
    assert_eq!(harness.transport.resume_all_count(), 1);
}

#[tokio::test]
async fn synthetic_stop_is_skipped_transparently() {
    let harness = attached_session(CoreSettings::default()).await;
    suspend_at_breakpoint(&harness).await;

    let stepper = harness.session.stepper().unwrap();
    stepper.step_into().await.unwrap();
    let request = harness.transport.step_requests()[0].id;

    // The step lands in a compiler-generated accessor (method 9).
    harness.transport.push_event_set(step_set(request, location(9, 0)));

    // The stepper issues a step-out and the consensus resumes the target;
    // the user never sees the intermediate stop.
    let transport = harness.transport.clone();
    wait_until(move || transport.resume_all_count() == 2).await;

    let requests = harness.transport.step_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].depth, StepDepth::Out);
    assert_eq!(stepper.phase(), Some(StepPhase::Armed));
    assert!(!harness.session.is_suspended());

    // The replacement request completes in user code: now it is a stop.
    harness
        .transport
        .push_event_set(step_set(requests[1].id, location(3, 10)));
    let session = harness.session.clone();
    wait_until(move || session.is_suspended()).await;
}

#[tokio::test]
async fn synthetic_stop_with_skip_disabled_stops_normally() {
    let settings = CoreSettings {
        skip_synthetics: false,
        ..CoreSettings::default()
    };
    let harness = attached_session(settings).await;
    suspend_at_breakpoint(&harness).await;

    let stepper = harness.session.stepper().unwrap();
    stepper.step_into().await.unwrap();
    let request = harness.transport.step_requests()[0].id;

    harness.transport.push_event_set(step_set(request, location(9, 0)));

    let session = harness.session.clone();
    wait_until(move || session.is_suspended()).await;

    // No skip-out was issued; the synthetic frame is the user's stop.
    assert_eq!(harness.transport.step_requests().len(), 1);
    assert_eq!(stepper.phase(), None);
}

#[tokio::test]
async fn step_out_reports_the_return_value_and_keeps_going() {
    let harness = attached_session(CoreSettings::default()).await;
    suspend_at_breakpoint(&harness).await;

    let stepper = harness.session.stepper().unwrap();
    stepper.step_out().await.unwrap();

    // Step-out on a return-value-capable VM also arms a method-exit watch.
    let watches = harness.transport.method_exit_requests();
    assert_eq!(watches.len(), 1);
    let (watch_id, watch_thread) = watches[0];
    assert_eq!(watch_thread, THREAD);

    harness.transport.push_event_set(method_exit_set(
        watch_id,
        location(2, 5),
        Value {
            tag: 73,
            data: ValueData::Int(42),
        },
    ));

    // Informational: reported, then resumed without stopping.
    let transport = harness.transport.clone();
    wait_until(move || transport.resume_all_count() == 2).await;
    assert!(!harness.session.is_suspended());

    let lines = harness.status.lines();
    assert_eq!(lines, vec!["method compute returned (int) 42"]);
}

#[tokio::test]
async fn step_out_without_return_value_support_skips_the_watch() {
    let harness = attached_session(CoreSettings::default()).await;
    harness.transport.set_can_get_return_values(false);
    suspend_at_breakpoint(&harness).await;

    harness.session.stepper().unwrap().step_out().await.unwrap();

    assert_eq!(harness.transport.step_requests().len(), 1);
    assert!(harness.transport.method_exit_requests().is_empty());
}

#[tokio::test]
async fn completed_step_clears_the_companion_watch() {
    let harness = attached_session(CoreSettings::default()).await;
    suspend_at_breakpoint(&harness).await;

    let stepper = harness.session.stepper().unwrap();
    stepper.step_out().await.unwrap();
    let request = harness.transport.step_requests()[0].id;
    let (watch_id, _) = harness.transport.method_exit_requests()[0];

    // The step completes without the watch ever firing.
    harness.transport.push_event_set(step_set(request, location(3, 10)));

    let session = harness.session.clone();
    wait_until(move || session.is_suspended()).await;

    assert!(harness
        .transport
        .cleared_requests()
        .contains(&(event_kinds::METHOD_EXIT_WITH_RETURN_VALUE, watch_id)));
}

#[tokio::test]
async fn protocol_failure_surfaces_as_stepping_error() {
    let harness = attached_session(CoreSettings::default()).await;
    suspend_at_breakpoint(&harness).await;

    harness.transport.fail_next_step_request();

    let stepper = harness.session.stepper().unwrap();
    let err = stepper.step_over().await.unwrap_err();
    assert!(matches!(err, CoreError::Stepping(_)));

    // The session stays suspended; the user retains control.
    assert_eq!(harness.session.state(), SessionState::Suspended);
    assert_eq!(stepper.phase(), None);
}
