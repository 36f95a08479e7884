use chrono::{DateTime, Utc};

use crate::config::ResponseOrdering;
use crate::kernel::time::RequestSeq;
use crate::services::assessment::{
    AlertPayload, AnalyzeResponse, Decision, HistoryEntry, RiskLevel, StateResponse,
    VerificationRecord, VerificationStatus, VerifyResponse, UNKNOWN_INTENT,
};

/// Strict state delta. This is the ONLY way workflow state mutates.
#[derive(Debug, Clone)]
pub enum StateDelta {
    /// Optimistic partial overwrite from `POST /analyze`.
    AnalysisApplied { seq: RequestSeq, result: AnalyzeResponse },
    /// `POST /verify` response: touches `verification` only.
    VerificationReplaced {
        seq: RequestSeq,
        decision: Decision,
        response: VerifyResponse,
    },
    /// Authoritative `GET /state`: overwrites the whole aggregate.
    Snapshot { seq: RequestSeq, state: StateResponse },
}

/// Field groups that are written together by a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    /// frame, score, level, intent
    Assessment,
    Verification,
    /// last_alert_payload and history
    Alert,
}

/// Verification sub-machine, keyed by the frame it concerns.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationPhase {
    None,
    Pending { frame: String, expires_at: DateTime<Utc> },
    Resolved { frame: String, decision: Decision },
    Expired { frame: String },
}

impl VerificationPhase {
    pub fn frame(&self) -> Option<&str> {
        match self {
            VerificationPhase::None => None,
            VerificationPhase::Pending { frame, .. }
            | VerificationPhase::Resolved { frame, .. }
            | VerificationPhase::Expired { frame } => Some(frame),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, VerificationPhase::Pending { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhaseTransition {
    Opened { frame: String, expires_at: DateTime<Utc> },
    Resolved { frame: String, decision: Decision },
    Expired { frame: String },
}

/// What a single reduction did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReduceOutcome {
    pub applied: Vec<FieldGroup>,
    pub dropped: Vec<FieldGroup>,
    pub transitions: Vec<PhaseTransition>,
    pub alert_changed: bool,
}

impl ReduceOutcome {
    pub fn is_stale(&self) -> bool {
        self.applied.is_empty() && !self.dropped.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Watermarks {
    assessment: Option<RequestSeq>,
    verification: Option<RequestSeq>,
    alert: Option<RequestSeq>,
}

impl Watermarks {
    fn slot(&mut self, group: FieldGroup) -> &mut Option<RequestSeq> {
        match group {
            FieldGroup::Assessment => &mut self.assessment,
            FieldGroup::Verification => &mut self.verification,
            FieldGroup::Alert => &mut self.alert,
        }
    }
}

/// Client-side cache of the backend workflow.
///
/// `verification` only ever holds an outstanding (pending) record: a record
/// reported with any other status is observed by the phase machine and
/// leaves the slot empty.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub frame: Option<String>,
    pub score: f64,
    pub level: RiskLevel,
    pub intent: String,
    pub verification: Option<VerificationRecord>,
    pub last_alert_payload: Option<AlertPayload>,
    pub history: Vec<HistoryEntry>,
    /// Monotonic version, bumped on every applied write.
    pub version: u64,
    ordering: ResponseOrdering,
    phase: VerificationPhase,
    watermarks: Watermarks,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new(ResponseOrdering::Arrival)
    }
}

impl WorkflowState {
    pub fn new(ordering: ResponseOrdering) -> Self {
        Self {
            frame: None,
            score: 0.0,
            level: RiskLevel::Low,
            intent: UNKNOWN_INTENT.to_string(),
            verification: None,
            last_alert_payload: None,
            history: Vec::new(),
            version: 0,
            ordering,
            phase: VerificationPhase::None,
            watermarks: Watermarks::default(),
        }
    }

    pub fn ordering(&self) -> ResponseOrdering {
        self.ordering
    }

    pub fn phase(&self) -> &VerificationPhase {
        &self.phase
    }

    /// Pure reduction: State + Delta -> Mutated State
    pub fn reduce(&mut self, delta: StateDelta) -> ReduceOutcome {
        let mut outcome = ReduceOutcome::default();

        match delta {
            StateDelta::AnalysisApplied { seq, result } => {
                if self.claim(seq, FieldGroup::Assessment, &mut outcome) {
                    self.frame = result.filename;
                    self.score = result.score;
                    self.level = result.level;
                    self.intent = result.intent;
                }
                if self.claim(seq, FieldGroup::Verification, &mut outcome) {
                    self.replace_verification(result.verification, None, &mut outcome);
                }
            }
            StateDelta::VerificationReplaced { seq, decision, response } => {
                if self.claim(seq, FieldGroup::Verification, &mut outcome) {
                    self.replace_verification(response.verification, Some(decision), &mut outcome);
                }
            }
            StateDelta::Snapshot { seq, state } => {
                if self.claim(seq, FieldGroup::Assessment, &mut outcome) {
                    self.frame = state.frame;
                    self.score = state.score;
                    self.level = state.level;
                    self.intent = state.intent;
                }
                if self.claim(seq, FieldGroup::Verification, &mut outcome) {
                    self.replace_verification(state.verification, None, &mut outcome);
                }
                if self.claim(seq, FieldGroup::Alert, &mut outcome) {
                    outcome.alert_changed = state.last_alert_payload.is_some()
                        && state.last_alert_payload != self.last_alert_payload;
                    self.last_alert_payload = state.last_alert_payload;
                    self.history = state.history;
                }
            }
        }

        if !outcome.applied.is_empty() {
            self.version += 1;
        }
        outcome
    }

    /// Decides whether a response may write `group`, and records the write.
    fn claim(&mut self, seq: RequestSeq, group: FieldGroup, outcome: &mut ReduceOutcome) -> bool {
        let ordering = self.ordering;
        let slot = self.watermarks.slot(group);
        let fresh = match (ordering, *slot) {
            (ResponseOrdering::Arrival, _) => true,
            (ResponseOrdering::DropStale, None) => true,
            (ResponseOrdering::DropStale, Some(mark)) => seq > mark,
        };

        if fresh {
            *slot = Some(slot.map_or(seq, |mark| mark.max(seq)));
            outcome.applied.push(group);
        } else {
            outcome.dropped.push(group);
        }
        fresh
    }

    fn replace_verification(
        &mut self,
        incoming: Option<VerificationRecord>,
        decision: Option<Decision>,
        outcome: &mut ReduceOutcome,
    ) {
        if let Some(next) = next_phase(&self.phase, incoming.as_ref(), decision) {
            let transition = match &next {
                VerificationPhase::Pending { frame, expires_at } => Some(PhaseTransition::Opened {
                    frame: frame.clone(),
                    expires_at: *expires_at,
                }),
                VerificationPhase::Resolved { frame, decision } => Some(PhaseTransition::Resolved {
                    frame: frame.clone(),
                    decision: *decision,
                }),
                VerificationPhase::Expired { frame } => Some(PhaseTransition::Expired { frame: frame.clone() }),
                VerificationPhase::None => None,
            };

            // A record for a different frame supersedes the open window.
            if let VerificationPhase::Pending { frame: old, .. } = &self.phase {
                if next.frame().is_some_and(|f| f != old) {
                    outcome.transitions.push(PhaseTransition::Expired { frame: old.clone() });
                }
            }

            outcome.transitions.extend(transition);
            self.phase = next;
        }

        self.verification = incoming.filter(VerificationRecord::is_outstanding);
    }
}

/// Verification sub-machine step. `None` means no phase change.
fn next_phase(
    current: &VerificationPhase,
    incoming: Option<&VerificationRecord>,
    decision: Option<Decision>,
) -> Option<VerificationPhase> {
    match incoming {
        Some(record) if record.is_outstanding() => {
            let next = VerificationPhase::Pending {
                frame: record.frame.clone(),
                expires_at: record.expires_at,
            };
            (next != *current).then_some(next)
        }
        Some(record) => {
            // A closed record only moves an open window, whichever frame it names.
            if !current.is_pending() {
                return None;
            }
            // Resolutions reported by the backend count as decisions made elsewhere.
            let next = match (decision, record.status) {
                (Some(d), _) => VerificationPhase::Resolved { frame: record.frame.clone(), decision: d },
                (None, VerificationStatus::Confirmed) => VerificationPhase::Resolved {
                    frame: record.frame.clone(),
                    decision: Decision::Confirm,
                },
                (None, VerificationStatus::Dismissed) => VerificationPhase::Resolved {
                    frame: record.frame.clone(),
                    decision: Decision::FalseAlarm,
                },
                (None, _) => VerificationPhase::Expired { frame: record.frame.clone() },
            };
            Some(next)
        }
        None => match current {
            VerificationPhase::Pending { frame, .. } => Some(match decision {
                Some(d) => VerificationPhase::Resolved { frame: frame.clone(), decision: d },
                None => VerificationPhase::Expired { frame: frame.clone() },
            }),
            _ => None,
        },
    }
}
