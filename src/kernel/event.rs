use crate::error::ClientError;
use crate::kernel::time::RequestSeq;
use crate::services::assessment::{AnalyzeResponse, Decision, StateResponse, VerifyResponse};

#[derive(Debug, Clone)]
pub enum Event {
    /// Poll scheduler fired: run one analysis cycle.
    PollTick,
    /// Countdown ticker fired: recompute `seconds_left`.
    CountdownTick,
    /// Operator input.
    Command(Command),
    /// A backend request resolved, successfully or not.
    Completed(Completion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Analyze,
    Verify(Decision),
    Refresh,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub seq: RequestSeq,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Analyzed(Result<AnalyzeResponse, ClientError>),
    Verified {
        decision: Decision,
        result: Result<VerifyResponse, ClientError>,
    },
    Refreshed(Result<StateResponse, ClientError>),
}
