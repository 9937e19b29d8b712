//! Submission/polling state machine for impact analyses.
//!
//! One [`Session`] owns the lifecycle of a single user-initiated analysis:
//!
//! ```text
//! Idle -> Submitting -> Completed | Failed
//!                    -> Computing -> Computing (poll pending)
//!                                 -> Completed | Failed
//! ```
//!
//! Exactly one computation is active per session. Starting a new submission
//! cancels the previous poll timer before transitioning, so two concurrent
//! pollers can never exist. The timer is an explicitly owned handle —
//! [`PollTimer`] — cancelled on every exit path: a new submission, a
//! terminal poll status, or dropping the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::api::types::{
    ComputationHandle, ImpactRequest, ImpactResult, PollOutcome, SubmitOutcome,
};

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// The two remote operations the state machine depends on.
///
/// Implemented by [`ForecastApiClient`](crate::api::ForecastApiClient); tests
/// drive the machine with scripted implementations.
pub trait ImpactTransport {
    fn submit_impact(&self, request: &ImpactRequest) -> Result<SubmitOutcome>;
    fn poll_impact(&self, computation_id: &str) -> Result<PollOutcome>;
}

// ---------------------------------------------------------------------------
// Poll timer
// ---------------------------------------------------------------------------

/// Cancellation handle for a [`PollTimer`], safe to hand to another thread.
#[derive(Debug, Clone)]
pub struct PollCancellation(Arc<AtomicBool>);

impl PollCancellation {
    /// Cancel the associated timer. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An owned, cancellable wait between polls.
///
/// Dropping the timer cancels it, so every exit path that releases the
/// owning session also releases the pending wait — a dangling poll cannot
/// outlive its handle.
#[derive(Debug)]
pub struct PollTimer {
    interval: Duration,
    cancelled: Arc<AtomicBool>,
}

/// Granularity of the cancellation check while waiting.
const WAIT_SLICE: Duration = Duration::from_millis(25);

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle that can cancel this timer from elsewhere.
    pub fn cancellation(&self) -> PollCancellation {
        PollCancellation(Arc::clone(&self.cancelled))
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for one poll interval, waking early on cancellation.
    ///
    /// Returns `true` if the full interval elapsed, `false` if the timer was
    /// cancelled before or during the wait.
    pub fn wait(&self) -> bool {
        let deadline = Instant::now() + self.interval;
        while Instant::now() < deadline {
            if self.is_cancelled() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            std::thread::sleep(remaining.min(WAIT_SLICE));
        }
        !self.is_cancelled()
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Where a session currently stands.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// No analysis started yet.
    Idle,
    /// Submission in flight (the "loading" phase).
    Submitting,
    /// Server-side computation running; polling until terminal.
    Computing(ComputationHandle),
    Completed(Box<ImpactResult>),
    Failed(String),
}

/// State machine for one user-initiated analysis.
///
/// The enum state makes the side-effect invariant structural: a transition
/// replaces the whole state, so at most one of {loading, computing, error,
/// result} is observable at any time.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    timer: Option<PollTimer>,
    poll_interval: Duration,
}

impl Session {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: SessionState::Idle,
            timer: None,
            poll_interval,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True while the initial submission is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self.state, SessionState::Submitting)
    }

    /// True while a server-side computation is being polled.
    pub fn is_computing(&self) -> bool {
        matches!(self.state, SessionState::Computing(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SessionState::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&ImpactResult> {
        match &self.state {
            SessionState::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// True if a poll timer exists and has not been cancelled.
    pub fn has_live_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// The current timer, while computing.
    pub fn timer(&self) -> Option<&PollTimer> {
        self.timer.as_ref()
    }

    /// Cancellation handle for the current computation's timer, if any.
    pub fn poll_cancellation(&self) -> Option<PollCancellation> {
        self.timer.as_ref().map(|t| t.cancellation())
    }

    /// Start a new submission.
    ///
    /// Cancels and releases any previous poll timer first — a prior
    /// in-flight computation is invalidated, never polled again.
    pub fn begin_submit(&mut self) {
        self.clear_timer();
        self.state = SessionState::Submitting;
    }

    /// Apply the submission response.
    pub fn on_submit_outcome(&mut self, outcome: SubmitOutcome) {
        match outcome {
            SubmitOutcome::Completed(result) => {
                self.clear_timer();
                self.state = SessionState::Completed(result);
            }
            SubmitOutcome::Computing(handle) => {
                self.clear_timer();
                self.timer = Some(PollTimer::new(self.poll_interval));
                self.state = SessionState::Computing(handle);
            }
        }
    }

    /// Record a submission request failure.
    pub fn on_submit_error(&mut self, message: String) {
        self.clear_timer();
        self.state = SessionState::Failed(message);
    }

    /// Apply one poll response. A pending poll leaves the state untouched;
    /// terminal statuses release the timer.
    pub fn on_poll_outcome(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Computing => {}
            PollOutcome::Completed(result) => {
                self.clear_timer();
                self.state = SessionState::Completed(result);
            }
            PollOutcome::Failed(message) => {
                self.clear_timer();
                self.state = SessionState::Failed(message);
            }
        }
    }

    /// Record a poll request failure.
    pub fn on_poll_error(&mut self, message: String) {
        self.clear_timer();
        self.state = SessionState::Failed(message);
    }

    fn clear_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Blocking driver
// ---------------------------------------------------------------------------

/// Drive a session from submission to a terminal state.
///
/// Polls strictly sequentially: each wait starts only after the previous
/// poll call returned. `on_progress` is invoked after every transition so
/// callers can report status.
pub fn run_to_completion<T: ImpactTransport>(
    transport: &T,
    session: &mut Session,
    request: &ImpactRequest,
    mut on_progress: impl FnMut(&SessionState),
) -> Result<ImpactResult> {
    session.begin_submit();
    on_progress(session.state());

    match transport.submit_impact(request) {
        Ok(outcome) => session.on_submit_outcome(outcome),
        Err(err) => session.on_submit_error(err.to_string()),
    }
    on_progress(session.state());

    loop {
        let computation_id = match session.state() {
            SessionState::Computing(handle) => handle.computation_id.clone(),
            _ => break,
        };

        let ticked = match session.timer() {
            Some(timer) => timer.wait(),
            None => false,
        };
        if !ticked {
            anyhow::bail!("analysis cancelled");
        }

        match transport.poll_impact(&computation_id) {
            Ok(outcome) => session.on_poll_outcome(outcome),
            Err(err) => session.on_poll_error(err.to_string()),
        }
        on_progress(session.state());
    }

    match session.state() {
        SessionState::Completed(result) => Ok((**result).clone()),
        SessionState::Failed(message) => anyhow::bail!("{message}"),
        _ => anyhow::bail!("analysis ended without a terminal status"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ComputationStatus, ImpactMetadata, YearlyMetric};

    fn sample_result() -> Box<ImpactResult> {
        Box::new(ImpactResult {
            median_income_by_year: vec![YearlyMetric {
                year: 2025,
                value: 31_000.0,
            }],
            absolute_poverty_by_year: vec![],
            relative_poverty_by_year: vec![],
            decile_yearly_changes: vec![],
            metadata: ImpactMetadata::default(),
        })
    }

    fn computing_handle(id: &str) -> ComputationHandle {
        ComputationHandle {
            computation_id: id.to_string(),
            status: ComputationStatus::Computing,
        }
    }

    #[test]
    fn timer_wait_elapses_when_not_cancelled() {
        let timer = PollTimer::new(Duration::from_millis(10));
        assert!(timer.wait());
    }

    #[test]
    fn cancelled_timer_returns_false_immediately() {
        let timer = PollTimer::new(Duration::from_secs(60));
        timer.cancel();
        let start = Instant::now();
        assert!(!timer.wait());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cancellation_handle_wakes_a_waiting_timer() {
        let timer = PollTimer::new(Duration::from_secs(60));
        let cancel = timer.cancellation();
        let waiter = std::thread::spawn(move || timer.wait());
        std::thread::sleep(Duration::from_millis(50));
        cancel.cancel();
        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn dropping_timer_cancels_it() {
        let timer = PollTimer::new(Duration::from_secs(60));
        let cancel = timer.cancellation();
        drop(timer);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn submitting_sets_only_loading() {
        let mut session = Session::new(Duration::from_millis(10));
        session.begin_submit();
        assert!(session.is_loading());
        assert!(!session.is_computing());
        assert!(session.error().is_none());
        assert!(session.result().is_none());
    }

    #[test]
    fn computing_outcome_creates_one_timer() {
        let mut session = Session::new(Duration::from_millis(10));
        session.begin_submit();
        session.on_submit_outcome(SubmitOutcome::Computing(computing_handle("a")));
        assert!(session.is_computing());
        assert!(!session.is_loading());
        assert!(session.has_live_timer());
    }

    #[test]
    fn resubmit_cancels_previous_timer() {
        let mut session = Session::new(Duration::from_millis(10));
        session.begin_submit();
        session.on_submit_outcome(SubmitOutcome::Computing(computing_handle("a")));
        let first = session.poll_cancellation().unwrap();

        session.begin_submit();
        assert!(first.is_cancelled());
        assert!(!session.has_live_timer());

        session.on_submit_outcome(SubmitOutcome::Computing(computing_handle("b")));
        assert!(session.has_live_timer());
        assert!(first.is_cancelled());
    }

    #[test]
    fn completed_poll_clears_timer_and_sets_result() {
        let mut session = Session::new(Duration::from_millis(10));
        session.begin_submit();
        session.on_submit_outcome(SubmitOutcome::Computing(computing_handle("a")));
        let cancel = session.poll_cancellation().unwrap();

        session.on_poll_outcome(PollOutcome::Completed(sample_result()));
        assert!(!session.is_loading());
        assert!(!session.is_computing());
        assert!(session.error().is_none());
        assert_eq!(session.result().unwrap().median_income_by_year.len(), 1);
        assert!(cancel.is_cancelled());
        assert!(!session.has_live_timer());
    }

    #[test]
    fn failed_poll_clears_result_and_sets_error() {
        let mut session = Session::new(Duration::from_millis(10));
        session.begin_submit();
        session.on_submit_outcome(SubmitOutcome::Completed(sample_result()));
        assert!(session.result().is_some());

        session.begin_submit();
        session.on_submit_outcome(SubmitOutcome::Computing(computing_handle("a")));
        session.on_poll_outcome(PollOutcome::Failed("simulation crashed".to_string()));

        assert!(session.result().is_none());
        assert_eq!(session.error(), Some("simulation crashed"));
        assert!(!session.has_live_timer());
    }

    #[test]
    fn pending_poll_keeps_state_and_timer() {
        let mut session = Session::new(Duration::from_millis(10));
        session.begin_submit();
        session.on_submit_outcome(SubmitOutcome::Computing(computing_handle("a")));
        session.on_poll_outcome(PollOutcome::Computing);
        assert!(session.is_computing());
        assert!(session.has_live_timer());
    }

    #[test]
    fn dropping_session_cancels_pending_timer() {
        let mut session = Session::new(Duration::from_secs(60));
        session.begin_submit();
        session.on_submit_outcome(SubmitOutcome::Computing(computing_handle("a")));
        let cancel = session.poll_cancellation().unwrap();

        drop(session);
        assert!(cancel.is_cancelled());
    }
}
