use std::fmt;

use super::state::{VerificationPhase, WorkflowState};

/// What the operator console shows: the cached workflow state plus
/// session-local status.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowView {
    pub state: WorkflowState,
    pub phase: VerificationPhase,
    /// Present only while a verification record is open.
    pub seconds_left: Option<u64>,
    /// An analyze or verify request is outstanding.
    pub busy: bool,
    pub last_error: Option<String>,
    pub frame_url: Option<String>,
}

impl Default for WorkflowView {
    fn default() -> Self {
        Self {
            state: WorkflowState::default(),
            phase: VerificationPhase::None,
            seconds_left: None,
            busy: false,
            last_error: None,
            frame_url: None,
        }
    }
}

impl fmt::Display for WorkflowView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.last_error {
            writeln!(f, "Error: {}", err)?;
        }

        let s = &self.state;
        writeln!(
            f,
            "frame={} score={:.3} level={} intent={}{}",
            s.frame.as_deref().unwrap_or("-"),
            s.score,
            s.level,
            s.intent,
            if self.busy { " (processing...)" } else { "" }
        )?;

        if let Some(url) = &self.frame_url {
            writeln!(f, "image: {}", url)?;
        }

        if let Some(v) = &s.verification {
            let left = self
                .seconds_left
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string());
            writeln!(
                f,
                "Medium risk detected for frame {}. Please verify. Time left: {}s [confirm | dismiss]",
                v.frame, left
            )?;
        }

        match &s.last_alert_payload {
            Some(payload) => write!(f, "alert: {}", payload.as_value()),
            None => write!(f, "alert: No alerts dispatched yet."),
        }
    }
}
