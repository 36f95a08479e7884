//! Workflow telemetry.
//!
//! Telemetry is a READ-ONLY side-effect layer. It is never consulted by the
//! reducer or the reactor's decisions; it exists for observability and tests.
//! Events carry request tokens, operations, frame ids and timings only.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::TelemetryEvent;
pub use metrics::{compute_snapshot, TelemetrySnapshot};
pub use recorder::TelemetryRecorder;
