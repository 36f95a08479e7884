use std::collections::VecDeque;

use super::event::TelemetryEvent;
use crate::error::Operation;
use crate::services::assessment::Decision;

#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub fetch_state: RequestStats,
    pub analyze: RequestStats,
    pub verify: RequestStats,
    pub verification: VerificationStats,
    pub alerts_observed: u64,
    pub stale_dropped: u64,
    /// Largest number of requests outstanding at once.
    pub max_overlap: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    pub issued: u64,
    pub completed: u64,
    pub failed: u64,
    pub total_latency_ms: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct VerificationStats {
    pub opened: u64,
    pub confirmed: u64,
    pub dismissed: u64,
    pub expired: u64,
    pub total_response_ms: u64,
    pub avg_response_ms: f64,
}

impl TelemetrySnapshot {
    fn stats_mut(&mut self, op: Operation) -> Option<&mut RequestStats> {
        match op {
            Operation::FetchState => Some(&mut self.fetch_state),
            Operation::Analyze => Some(&mut self.analyze),
            Operation::Verify => Some(&mut self.verify),
            _ => None,
        }
    }
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();
    let mut timed_responses = 0u64;

    for event in events {
        match event {
            TelemetryEvent::RequestIssued { op, overlapping, .. } => {
                if let Some(stats) = snap.stats_mut(*op) {
                    stats.issued += 1;
                }
                snap.max_overlap = snap.max_overlap.max(overlapping + 1);
            }
            TelemetryEvent::RequestCompleted { op, latency_ms, .. } => {
                if let Some(stats) = snap.stats_mut(*op) {
                    stats.completed += 1;
                    stats.total_latency_ms += latency_ms;
                }
            }
            TelemetryEvent::RequestFailed { op, latency_ms, .. } => {
                if let Some(stats) = snap.stats_mut(*op) {
                    stats.failed += 1;
                    stats.total_latency_ms += latency_ms;
                }
            }
            TelemetryEvent::StaleDropped { .. } => snap.stale_dropped += 1,
            TelemetryEvent::VerificationOpened { .. } => snap.verification.opened += 1,
            TelemetryEvent::VerificationResolved { decision, response_ms, .. } => {
                match decision {
                    Decision::Confirm => snap.verification.confirmed += 1,
                    Decision::FalseAlarm => snap.verification.dismissed += 1,
                }
                if let Some(ms) = response_ms {
                    snap.verification.total_response_ms += ms;
                    timed_responses += 1;
                }
            }
            TelemetryEvent::VerificationExpired { .. } => snap.verification.expired += 1,
            TelemetryEvent::AlertObserved { .. } => snap.alerts_observed += 1,
            TelemetryEvent::SessionSummary { .. } => {}
        }
    }

    // Averages
    for stats in [&mut snap.fetch_state, &mut snap.analyze, &mut snap.verify] {
        let finished = stats.completed + stats.failed;
        if finished > 0 {
            stats.avg_latency_ms = stats.total_latency_ms as f64 / finished as f64;
        }
    }

    if timed_responses > 0 {
        snap.verification.avg_response_ms = snap.verification.total_response_ms as f64 / timed_responses as f64;
    }

    snap
}
