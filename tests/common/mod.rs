#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use riskwatch::config::{MonitorConfig, ResponseOrdering};
use riskwatch::kernel::time::ManualClock;
use riskwatch::services::assessment::{
    AlertPayload, AnalyzeResponse, AssessmentBackend, RiskLevel, StateResponse, VerificationRecord,
    VerifyRequest, VerifyResponse,
};
use riskwatch::{ClientError, Operation, Reactor};

/// One scripted backend reply. A gated reply waits until the test releases it.
pub struct Scripted<T> {
    result: Result<T, ClientError>,
    gate: Option<oneshot::Receiver<()>>,
}

impl<T> Scripted<T> {
    pub fn ready(result: Result<T, ClientError>) -> Self {
        Self { result, gate: None }
    }

    pub fn gated(result: Result<T, ClientError>) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { result, gate: Some(rx) }, tx)
    }
}

#[derive(Default)]
pub struct FakeBackend {
    analyze: Mutex<VecDeque<Scripted<AnalyzeResponse>>>,
    state: Mutex<VecDeque<Scripted<StateResponse>>>,
    verify: Mutex<VecDeque<Scripted<VerifyResponse>>>,
    pub analyze_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub verify_requests: Mutex<Vec<VerifyRequest>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_analysis(&self, result: Result<AnalyzeResponse, ClientError>) {
        self.analyze.lock().unwrap().push_back(Scripted::ready(result));
    }

    pub fn push_gated_analysis(&self, result: Result<AnalyzeResponse, ClientError>) -> oneshot::Sender<()> {
        let (scripted, release) = Scripted::gated(result);
        self.analyze.lock().unwrap().push_back(scripted);
        release
    }

    pub fn push_state(&self, result: Result<StateResponse, ClientError>) {
        self.state.lock().unwrap().push_back(Scripted::ready(result));
    }

    pub fn push_verify(&self, result: Result<VerifyResponse, ClientError>) {
        self.verify.lock().unwrap().push_back(Scripted::ready(result));
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn analyses(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn verifies(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

async fn resolve<T>(queue: &Mutex<VecDeque<Scripted<T>>>, op: Operation) -> Result<T, ClientError> {
    let next = queue.lock().unwrap().pop_front();
    match next {
        Some(Scripted { result, gate }) => {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            result
        }
        None => Err(ClientError::Status { op, status: 503 }),
    }
}

#[async_trait]
impl AssessmentBackend for FakeBackend {
    async fn fetch_state(&self) -> Result<StateResponse, ClientError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        resolve(&self.state, Operation::FetchState).await
    }

    async fn analyze_next(&self) -> Result<AnalyzeResponse, ClientError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        resolve(&self.analyze, Operation::Analyze).await
    }

    async fn submit_verification(&self, request: VerifyRequest) -> Result<VerifyResponse, ClientError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verify_requests.lock().unwrap().push(request);
        resolve(&self.verify, Operation::Verify).await
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn pending(frame: &str, expires_in_secs: i64) -> VerificationRecord {
    VerificationRecord::pending(frame, t0() + Duration::seconds(expires_in_secs))
}

pub fn analysis(frame: &str, score: f64, level: RiskLevel) -> AnalyzeResponse {
    AnalyzeResponse {
        filename: Some(frame.to_string()),
        score,
        level,
        intent: "unknown_intent".to_string(),
        verification: None,
        alert_dispatched: false,
    }
}

pub fn medium(frame: &str, expires_in_secs: i64) -> AnalyzeResponse {
    AnalyzeResponse {
        verification: Some(pending(frame, expires_in_secs)),
        ..analysis(frame, 0.55, RiskLevel::Medium)
    }
}

pub fn high_dispatched(frame: &str) -> AnalyzeResponse {
    AnalyzeResponse {
        intent: "threatening_object".to_string(),
        alert_dispatched: true,
        ..analysis(frame, 0.9, RiskLevel::High)
    }
}

pub fn alert(frame: &str, reason: &str) -> AlertPayload {
    AlertPayload(json!({
        "frame": frame,
        "reason": reason,
        "dispatch_result": { "status": 200, "body": "simulated-send-ok" }
    }))
}

pub fn server_state(frame: &str, level: RiskLevel, alert_payload: Option<AlertPayload>) -> StateResponse {
    StateResponse {
        frame: Some(frame.to_string()),
        score: match level {
            RiskLevel::Low => 0.1,
            RiskLevel::Medium => 0.55,
            RiskLevel::High => 0.9,
        },
        level,
        intent: "unknown_intent".to_string(),
        verification: None,
        last_alert_payload: alert_payload,
        history: Vec::new(),
    }
}

pub fn config(ordering: ResponseOrdering) -> MonitorConfig {
    MonitorConfig {
        ordering,
        ..MonitorConfig::default()
    }
}

pub fn reactor_with(backend: Arc<FakeBackend>, config: MonitorConfig) -> (Reactor<FakeBackend>, Arc<ManualClock>) {
    let (tx, rx) = mpsc::channel(100);
    let clock = Arc::new(ManualClock::new(t0()));
    let reactor = Reactor::new(rx, tx, backend, clock.clone(), config);
    (reactor, clock)
}

pub fn reactor(backend: Arc<FakeBackend>) -> (Reactor<FakeBackend>, Arc<ManualClock>) {
    reactor_with(backend, config(ResponseOrdering::Arrival))
}
