use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UNKNOWN_INTENT: &str = "unknown_intent";

fn unknown_intent() -> String {
    UNKNOWN_INTENT.to_string()
}

/// Ordinal risk classification derived server-side from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Confirmed,
    Dismissed,
    Expired,
}

/// Backend-owned request for human confirmation. The client only caches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub frame: String,
    #[serde(alias = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(default, alias = "startedAt", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: VerificationStatus,
}

impl VerificationRecord {
    pub fn pending(frame: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            frame: frame.into(),
            expires_at,
            started_at: None,
            status: VerificationStatus::Pending,
        }
    }

    /// Still awaiting a human decision.
    pub fn is_outstanding(&self) -> bool {
        self.status == VerificationStatus::Pending
    }
}

/// Opaque record of a dispatched alert. Replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertPayload(pub serde_json::Value);

impl AlertPayload {
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn frame(&self) -> Option<&str> {
        self.0.get("frame").and_then(|v| v.as_str())
    }

    pub fn reason(&self) -> Option<&str> {
        self.0.get("reason").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub level: RiskLevel,
    #[serde(default = "unknown_intent")]
    pub intent: String,
}

/// `GET /state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResponse {
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub level: RiskLevel,
    #[serde(default = "unknown_intent")]
    pub intent: String,
    #[serde(default)]
    pub verification: Option<VerificationRecord>,
    #[serde(default)]
    pub last_alert_payload: Option<AlertPayload>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// `POST /analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub filename: Option<String>,
    pub score: f64,
    pub level: RiskLevel,
    #[serde(default = "unknown_intent")]
    pub intent: String,
    #[serde(default)]
    pub verification: Option<VerificationRecord>,
    #[serde(default)]
    pub alert_dispatched: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Confirm,
    FalseAlarm,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Confirm => "confirm",
            Decision::FalseAlarm => "false_alarm",
        })
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirm" | "real" => Ok(Decision::Confirm),
            "false_alarm" | "dismiss" => Ok(Decision::FalseAlarm),
            other => Err(format!("unknown decision: {}", other)),
        }
    }
}

/// `POST /verify` body. `frame` is only sent when decision correlation is on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub verification: Option<VerificationRecord>,
    #[serde(default)]
    pub alert_dispatched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramesResponse {
    #[serde(default)]
    pub frames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentFrameResponse {
    #[serde(default)]
    pub current: Option<String>,
}
