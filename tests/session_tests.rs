/// Integration tests for the analysis session lifecycle.
///
/// Unit tests for individual state transitions live in `src/session.rs`.
/// These tests drive the full submit → poll → terminal flow through
/// `run_to_completion` with scripted transports, covering:
///
/// - Inline completion (cache hit on submit)
/// - Multi-poll computations reaching a terminal status
/// - Failure propagation from submit and from poll
/// - Cancellation via the timer handle mid-computation
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use obrcast::api::types::{
    ComputationHandle, ComputationStatus, ImpactMetadata, ImpactRequest, ImpactResult, PollOutcome,
    SubmitOutcome, YearlyMetric,
};
use obrcast::session::{ImpactTransport, Session, SessionState, run_to_completion};

// ===========================================================================
// Scripted transport
// ===========================================================================

/// A transport that answers submit once and replays a scripted poll sequence.
struct ScriptedTransport {
    submit: Mutex<Option<Result<SubmitOutcome>>>,
    polls: Mutex<Vec<Result<PollOutcome>>>,
    poll_calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(submit: Result<SubmitOutcome>, polls: Vec<Result<PollOutcome>>) -> Self {
        Self {
            submit: Mutex::new(Some(submit)),
            polls: Mutex::new(polls),
            poll_calls: AtomicUsize::new(0),
        }
    }

    fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

impl ImpactTransport for ScriptedTransport {
    fn submit_impact(&self, _request: &ImpactRequest) -> Result<SubmitOutcome> {
        self.submit
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| anyhow::bail!("submit called twice"))
    }

    fn poll_impact(&self, _computation_id: &str) -> Result<PollOutcome> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let mut polls = self.polls.lock().unwrap();
        if polls.is_empty() {
            anyhow::bail!("poll script exhausted");
        }
        polls.remove(0)
    }
}

fn sample_result(median: f64) -> Box<ImpactResult> {
    Box::new(ImpactResult {
        median_income_by_year: vec![
            YearlyMetric {
                year: 2025,
                value: median,
            },
            YearlyMetric {
                year: 2026,
                value: median * 1.03,
            },
        ],
        absolute_poverty_by_year: vec![YearlyMetric {
            year: 2025,
            value: 0.17,
        }],
        relative_poverty_by_year: vec![],
        decile_yearly_changes: vec![],
        metadata: ImpactMetadata::default(),
    })
}

fn computing(id: &str) -> SubmitOutcome {
    SubmitOutcome::Computing(ComputationHandle {
        computation_id: id.to_string(),
        status: ComputationStatus::Computing,
    })
}

fn fast_session() -> Session {
    Session::new(Duration::from_millis(5))
}

// ===========================================================================
// 1. Inline completion
// ===========================================================================

#[test]
fn inline_result_completes_without_polling() {
    let transport = ScriptedTransport::new(Ok(SubmitOutcome::Completed(sample_result(31_000.0))), vec![]);
    let mut session = fast_session();

    let result = run_to_completion(
        &transport,
        &mut session,
        &ImpactRequest::official("spring_2025"),
        |_| {},
    )
    .unwrap();

    assert_eq!(result.median_income_by_year[0].value, 31_000.0);
    assert_eq!(transport.poll_count(), 0);
    assert!(session.result().is_some());
    assert!(!session.has_live_timer());
}

// ===========================================================================
// 2. Polling to a terminal status
// ===========================================================================

#[test]
fn computation_polls_until_completed() {
    let transport = ScriptedTransport::new(
        Ok(computing("job-1")),
        vec![
            Ok(PollOutcome::Computing),
            Ok(PollOutcome::Computing),
            Ok(PollOutcome::Completed(sample_result(29_500.0))),
        ],
    );
    let mut session = fast_session();

    let mut observed = Vec::new();
    let result = run_to_completion(
        &transport,
        &mut session,
        &ImpactRequest::official("autumn_2024"),
        |state| observed.push(format!("{state:?}")),
    )
    .unwrap();

    assert_eq!(result.median_income_by_year[0].value, 29_500.0);
    assert_eq!(transport.poll_count(), 3);
    // Submitting first, then the submit outcome, then one entry per poll
    assert_eq!(observed.len(), 5);
    assert!(observed[0].starts_with("Submitting"));
}

#[test]
fn pending_polls_keep_the_computing_state() {
    let transport = ScriptedTransport::new(
        Ok(computing("job-2")),
        vec![
            Ok(PollOutcome::Computing),
            Ok(PollOutcome::Completed(sample_result(30_000.0))),
        ],
    );
    let mut session = fast_session();

    let mut computing_seen = 0;
    run_to_completion(
        &transport,
        &mut session,
        &ImpactRequest::official("spring_2025"),
        |state| {
            if matches!(state, SessionState::Computing(_)) {
                computing_seen += 1;
            }
        },
    )
    .unwrap();

    // Computing after submit, and again after the pending poll
    assert_eq!(computing_seen, 2);
}

// ===========================================================================
// 3. Failures
// ===========================================================================

#[test]
fn submit_error_terminates_the_session() {
    let transport = ScriptedTransport::new(Err(anyhow::anyhow!("connection refused")), vec![]);
    let mut session = fast_session();

    let err = run_to_completion(
        &transport,
        &mut session,
        &ImpactRequest::official("spring_2025"),
        |_| {},
    )
    .unwrap_err();

    assert!(err.to_string().contains("connection refused"));
    assert_eq!(session.error(), Some("connection refused"));
    assert!(session.result().is_none());
    assert_eq!(transport.poll_count(), 0);
}

#[test]
fn failed_poll_surfaces_the_server_message() {
    let transport = ScriptedTransport::new(
        Ok(computing("job-3")),
        vec![
            Ok(PollOutcome::Computing),
            Ok(PollOutcome::Failed("simulation crashed".to_string())),
        ],
    );
    let mut session = fast_session();

    let err = run_to_completion(
        &transport,
        &mut session,
        &ImpactRequest::official("spring_2025"),
        |_| {},
    )
    .unwrap_err();

    assert!(err.to_string().contains("simulation crashed"));
    assert_eq!(session.error(), Some("simulation crashed"));
    assert!(!session.has_live_timer());
}

#[test]
fn poll_transport_error_terminates_the_session() {
    let transport = ScriptedTransport::new(
        Ok(computing("job-4")),
        vec![Err(anyhow::anyhow!("gateway timeout"))],
    );
    let mut session = fast_session();

    let err = run_to_completion(
        &transport,
        &mut session,
        &ImpactRequest::official("spring_2025"),
        |_| {},
    )
    .unwrap_err();

    assert!(err.to_string().contains("gateway timeout"));
    assert_eq!(transport.poll_count(), 1);
}

// ===========================================================================
// 4. Cancellation
// ===========================================================================

#[test]
fn cancelling_the_timer_aborts_the_poll_loop() {
    // Long interval so the loop parks in the timer wait until cancelled.
    let transport = ScriptedTransport::new(Ok(computing("job-5")), vec![]);
    let mut session = Session::new(Duration::from_secs(60));

    session.begin_submit();
    session.on_submit_outcome(transport.submit_impact(&ImpactRequest::official("x")).unwrap());
    let cancel = session.poll_cancellation().unwrap();

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        cancel.cancel();
    });

    let ticked = session.timer().unwrap().wait();
    canceller.join().unwrap();

    assert!(!ticked);
    assert_eq!(transport.poll_count(), 0);
}

#[test]
fn resubmission_invalidates_the_previous_computation() {
    let mut session = fast_session();

    session.begin_submit();
    session.on_submit_outcome(computing("old"));
    let old_cancel = session.poll_cancellation().unwrap();

    // A second submission cancels the old timer before anything else.
    session.begin_submit();
    assert!(old_cancel.is_cancelled());
    assert!(session.is_loading());

    session.on_submit_outcome(computing("new"));
    assert!(session.has_live_timer());
    match session.state() {
        SessionState::Computing(handle) => assert_eq!(handle.computation_id, "new"),
        other => panic!("expected computing, got {other:?}"),
    }
}
