use serde::{Deserialize, Serialize};

use crate::error::Operation;
use crate::kernel::time::RequestSeq;
use crate::services::assessment::Decision;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    RequestIssued {
        seq: RequestSeq,
        op: Operation,
        /// Requests of any kind already outstanding when this one was issued.
        overlapping: usize,
    },

    RequestCompleted {
        seq: RequestSeq,
        op: Operation,
        latency_ms: u64,
    },

    RequestFailed {
        seq: RequestSeq,
        op: Operation,
        latency_ms: u64,
    },

    /// Response arrived after a newer write to every field group it carries.
    StaleDropped { seq: RequestSeq, op: Operation },

    VerificationOpened { frame: String },

    VerificationResolved {
        frame: String,
        decision: Decision,
        response_ms: Option<u64>,
    },

    VerificationExpired { frame: String },

    /// A refresh surfaced a new alert payload.
    AlertObserved { frame: Option<String> },

    SessionSummary {
        duration_ms: u64,
        analyses: u64,
        alerts: u64,
        failures: u64,
    },
}
