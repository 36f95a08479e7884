use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::countdown::VerificationTimer;
use super::event::{Command, Completion, Event, Outcome};
use super::scheduler::PollScheduler;
use super::state::{PhaseTransition, ReduceOutcome, StateDelta, WorkflowState};
use super::telemetry::{TelemetryEvent, TelemetryRecorder};
use super::time::{Clock, RequestSeq};
use super::view::WorkflowView;
use crate::config::MonitorConfig;
use crate::error::{ClientError, Operation};
use crate::services::assessment::{
    frame_url, AnalyzeResponse, AssessmentBackend, Decision, StateResponse, VerifyRequest, VerifyResponse,
};

#[derive(Debug, Clone, Copy)]
struct InFlight {
    op: Operation,
    issued_at: Instant,
}

/// Single owner of the workflow state.
///
/// Poll ticks, countdown ticks, operator commands and request completions
/// all arrive on one channel; state only changes inside [`Reactor::handle`]
/// or the awaited operations, never inside a spawned request task.
pub struct Reactor<B: AssessmentBackend> {
    pub receiver: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    pub state: WorkflowState,
    pub countdown: VerificationTimer,
    pub telemetry: TelemetryRecorder,
    scheduler: Option<PollScheduler>,
    last_seq: RequestSeq,
    in_flight: HashMap<RequestSeq, InFlight>,
    last_error: Option<String>,
    opened_at: Option<(String, Instant)>,
    view_tx: watch::Sender<WorkflowView>,
    session_id: Uuid,
    started_at: Instant,
}

impl<B: AssessmentBackend> Reactor<B> {
    pub fn new(
        receiver: mpsc::Receiver<Event>,
        tx: mpsc::Sender<Event>,
        backend: Arc<B>,
        clock: Arc<dyn Clock>,
        config: MonitorConfig,
    ) -> Self {
        let countdown = VerificationTimer::new(tx.clone(), config.countdown_interval());
        let (view_tx, _) = watch::channel(WorkflowView::default());
        Self {
            receiver,
            tx,
            backend,
            clock,
            state: WorkflowState::new(config.ordering),
            config,
            countdown,
            telemetry: TelemetryRecorder::new(),
            scheduler: None,
            last_seq: RequestSeq::default(),
            in_flight: HashMap::new(),
            last_error: None,
            opened_at: None,
            view_tx,
            session_id: Uuid::new_v4(),
            started_at: Instant::now(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowView> {
        self.view_tx.subscribe()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn pending_requests(&self) -> usize {
        self.in_flight.len()
    }

    /// An analyze or verify request is outstanding.
    pub fn busy(&self) -> bool {
        self.in_flight
            .values()
            .any(|f| matches!(f.op, Operation::Analyze | Operation::Verify))
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.as_ref().is_some_and(PollScheduler::is_running)
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            state: self.state.clone(),
            phase: self.state.phase().clone(),
            seconds_left: self.countdown.seconds_left(),
            busy: self.busy(),
            last_error: self.last_error.clone(),
            frame_url: self
                .state
                .frame
                .as_deref()
                .and_then(|f| frame_url(&self.config.api_base, f)),
        }
    }

    /// Event Step: applies one event. Network work is spawned, never awaited.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::PollTick => {
                self.issue(Command::Analyze);
            }
            Event::CountdownTick => {
                self.countdown.tick(self.clock.now());
            }
            Event::Command(command) => {
                self.issue(command);
            }
            Event::Completed(completion) => {
                if let Some(follow_up) = self.apply(completion) {
                    self.issue(follow_up);
                }
            }
        }
        self.publish();
    }

    /// Waits for the next event and handles it. `false` once the channel is closed.
    pub async fn step(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }

    /// Async Driver Loop. Refreshes once, starts polling, and runs until
    /// `shutdown` fires; both repeating timers are cancelled on the way out.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(session = %self.session_id, "Reactor started. Backend: {}", self.config.api_base);

        self.issue(Command::Refresh);
        self.scheduler = Some(PollScheduler::start(self.config.poll_interval(), self.tx.clone()));
        self.publish();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = self.receiver.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }

        self.teardown();
    }

    /// Stops both timers. Outstanding requests are left to resolve; their
    /// completions are never applied.
    pub fn teardown(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        self.countdown.stop();

        let summary = self
            .telemetry
            .aggregate_session(self.started_at.elapsed().as_millis() as u64);
        info!(session = %self.session_id, "Reactor stopped: {:?}", summary);
        self.telemetry.record(summary);
        self.publish();
    }

    /// Runs one analysis cycle to completion, including the follow-up
    /// refresh when the backend reports a dispatch.
    pub async fn advance_analysis(&mut self) -> Result<AnalyzeResponse, ClientError> {
        let (seq, _) = self.begin(Command::Analyze);
        let result = self.backend.analyze_next().await;
        let follow_up = self.apply(Completion {
            seq,
            outcome: Outcome::Analyzed(result.clone()),
        });
        if follow_up.is_some() {
            // A failed refresh is surfaced through last_error.
            let _ = self.refresh_state().await;
        }
        self.publish();
        result
    }

    /// Fetches the full state. On failure the cached state stays as it was.
    pub async fn refresh_state(&mut self) -> Result<StateResponse, ClientError> {
        let (seq, _) = self.begin(Command::Refresh);
        let result = self.backend.fetch_state().await;
        self.apply(Completion {
            seq,
            outcome: Outcome::Refreshed(result.clone()),
        });
        self.publish();
        result
    }

    /// Submits a decision, then refreshes exactly once if it succeeded.
    pub async fn submit_verification(&mut self, decision: Decision) -> Result<VerifyResponse, ClientError> {
        let (seq, request) = self.begin(Command::Verify(decision));
        let request = request.unwrap_or(VerifyRequest { decision, frame: None });
        let result = self.backend.submit_verification(request).await;
        let follow_up = self.apply(Completion {
            seq,
            outcome: Outcome::Verified {
                decision,
                result: result.clone(),
            },
        });
        if follow_up.is_some() {
            let _ = self.refresh_state().await;
        }
        self.publish();
        result
    }

    /// Allocates a request token and books the request. Analyze and verify
    /// clear the error banner; refresh leaves it.
    fn begin(&mut self, command: Command) -> (RequestSeq, Option<VerifyRequest>) {
        let seq = self.last_seq.next();
        self.last_seq = seq;

        let op = match command {
            Command::Analyze => Operation::Analyze,
            Command::Verify(_) => Operation::Verify,
            Command::Refresh => Operation::FetchState,
        };

        self.telemetry.record(TelemetryEvent::RequestIssued {
            seq,
            op,
            overlapping: self.in_flight.len(),
        });
        self.in_flight.insert(seq, InFlight { op, issued_at: Instant::now() });

        let request = match command {
            Command::Analyze => {
                self.last_error = None;
                None
            }
            Command::Verify(decision) => {
                self.last_error = None;
                if !self.state.phase().is_pending() {
                    warn!("Submitting {} with no pending verification in local view", decision);
                }
                let frame = if self.config.correlate_decisions {
                    self.state.verification.as_ref().map(|v| v.frame.clone())
                } else {
                    None
                };
                Some(VerifyRequest { decision, frame })
            }
            Command::Refresh => None,
        };

        debug!("issued {:?} {}", seq, op);
        (seq, request)
    }

    fn issue(&mut self, command: Command) -> RequestSeq {
        let (seq, request) = self.begin(command);
        let backend = Arc::clone(&self.backend);

        match (command, request) {
            (Command::Analyze, _) => {
                self.spawn_request(seq, async move { Outcome::Analyzed(backend.analyze_next().await) });
            }
            (Command::Verify(decision), request) => {
                let request = request.unwrap_or(VerifyRequest { decision, frame: None });
                self.spawn_request(seq, async move {
                    Outcome::Verified {
                        decision,
                        result: backend.submit_verification(request).await,
                    }
                });
            }
            (Command::Refresh, _) => {
                self.spawn_request(seq, async move { Outcome::Refreshed(backend.fetch_state().await) });
            }
        }
        seq
    }

    fn spawn_request<F>(&self, seq: RequestSeq, request: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = request.await;
            if tx.send(Event::Completed(Completion { seq, outcome })).await.is_err() {
                debug!("reactor gone, dropping completion {:?}", seq);
            }
        });
    }

    /// Merges a resolved request into the state. Returns the follow-up the
    /// caller must run (always a refresh) when read-your-writes requires it.
    fn apply(&mut self, completion: Completion) -> Option<Command> {
        let Completion { seq, outcome } = completion;
        let latency_ms = self
            .in_flight
            .remove(&seq)
            .map(|f| f.issued_at.elapsed().as_millis() as u64)
            .unwrap_or(0);

        let follow_up = match outcome {
            Outcome::Analyzed(Ok(result)) => {
                self.succeeded(seq, Operation::Analyze, latency_ms);
                let dispatched = result.alert_dispatched;
                info!(
                    "Analysis {:?}: frame={} score={:.3} level={} intent={}",
                    seq,
                    result.filename.as_deref().unwrap_or("-"),
                    result.score,
                    result.level,
                    result.intent
                );
                let reduced = self.state.reduce(StateDelta::AnalysisApplied { seq, result });
                self.observe(seq, Operation::Analyze, reduced);
                if dispatched {
                    info!("Alert dispatched by analysis {:?}; refreshing", seq);
                    Some(Command::Refresh)
                } else {
                    None
                }
            }
            Outcome::Verified { decision, result: Ok(response) } => {
                self.succeeded(seq, Operation::Verify, latency_ms);
                info!("Verification {:?} accepted: {}", seq, decision);
                let reduced = self.state.reduce(StateDelta::VerificationReplaced { seq, decision, response });
                self.observe(seq, Operation::Verify, reduced);
                Some(Command::Refresh)
            }
            Outcome::Refreshed(Ok(snapshot)) => {
                self.succeeded(seq, Operation::FetchState, latency_ms);
                let reduced = self.state.reduce(StateDelta::Snapshot { seq, state: snapshot });
                self.observe(seq, Operation::FetchState, reduced);
                None
            }
            Outcome::Analyzed(Err(err)) | Outcome::Refreshed(Err(err)) | Outcome::Verified { result: Err(err), .. } => {
                self.failed(seq, latency_ms, err);
                None
            }
        };

        self.countdown.sync(self.state.verification.as_ref(), self.clock.now());
        follow_up
    }

    fn succeeded(&mut self, seq: RequestSeq, op: Operation, latency_ms: u64) {
        self.telemetry
            .record(TelemetryEvent::RequestCompleted { seq, op, latency_ms });
    }

    fn failed(&mut self, seq: RequestSeq, latency_ms: u64, err: ClientError) {
        let op = err.operation();
        warn!("{:?} {} ({})", seq, err, err.detail());
        self.telemetry
            .record(TelemetryEvent::RequestFailed { seq, op, latency_ms });
        self.last_error = Some(err.to_string());
    }

    fn observe(&mut self, seq: RequestSeq, op: Operation, reduced: ReduceOutcome) {
        if reduced.is_stale() {
            debug!("Dropped stale {} response {:?}", op, seq);
            self.telemetry.record(TelemetryEvent::StaleDropped { seq, op });
        }

        for transition in reduced.transitions {
            match transition {
                PhaseTransition::Opened { frame, expires_at } => {
                    info!("Verification pending for {} until {}", frame, expires_at);
                    self.opened_at = Some((frame.clone(), Instant::now()));
                    self.telemetry.record(TelemetryEvent::VerificationOpened { frame });
                }
                PhaseTransition::Resolved { frame, decision } => {
                    info!("Verification for {} resolved: {}", frame, decision);
                    let response_ms = self.take_opened(&frame);
                    self.telemetry.record(TelemetryEvent::VerificationResolved {
                        frame,
                        decision,
                        response_ms,
                    });
                }
                PhaseTransition::Expired { frame } => {
                    info!("Verification for {} closed by backend", frame);
                    self.take_opened(&frame);
                    self.telemetry.record(TelemetryEvent::VerificationExpired { frame });
                }
            }
        }

        if reduced.alert_changed {
            let frame = self
                .state
                .last_alert_payload
                .as_ref()
                .and_then(|p| p.frame().map(str::to_string));
            info!("Alert payload updated (frame {:?})", frame);
            self.telemetry.record(TelemetryEvent::AlertObserved { frame });
        }
    }

    fn take_opened(&mut self, frame: &str) -> Option<u64> {
        match self.opened_at.take() {
            Some((opened, at)) if opened == frame => Some(at.elapsed().as_millis() as u64),
            other => {
                self.opened_at = other;
                None
            }
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}
