use riskwatch::error::Operation;
use riskwatch::kernel::telemetry::{TelemetryEvent, TelemetryRecorder};
use riskwatch::kernel::time::RequestSeq;
use riskwatch::services::assessment::Decision;

#[test]
fn test_request_stats() {
    let mut recorder = TelemetryRecorder::new();
    recorder.record(TelemetryEvent::RequestIssued { seq: RequestSeq(1), op: Operation::Analyze, overlapping: 0 });
    recorder.record(TelemetryEvent::RequestIssued { seq: RequestSeq(2), op: Operation::Analyze, overlapping: 1 });
    recorder.record(TelemetryEvent::RequestIssued { seq: RequestSeq(3), op: Operation::Analyze, overlapping: 2 });
    recorder.record(TelemetryEvent::RequestCompleted { seq: RequestSeq(2), op: Operation::Analyze, latency_ms: 100 });
    recorder.record(TelemetryEvent::RequestCompleted { seq: RequestSeq(1), op: Operation::Analyze, latency_ms: 300 });
    recorder.record(TelemetryEvent::RequestFailed { seq: RequestSeq(3), op: Operation::Analyze, latency_ms: 200 });

    let snap = recorder.snapshot();
    assert_eq!(snap.analyze.issued, 3);
    assert_eq!(snap.analyze.completed, 2);
    assert_eq!(snap.analyze.failed, 1);
    assert_eq!(snap.analyze.avg_latency_ms, 200.0);
    assert_eq!(snap.max_overlap, 3);
    assert_eq!(snap.fetch_state.issued, 0);
}

#[test]
fn test_verification_stats() {
    let mut recorder = TelemetryRecorder::new();
    recorder.record(TelemetryEvent::VerificationOpened { frame: "f1.jpg".into() });
    recorder.record(TelemetryEvent::VerificationResolved {
        frame: "f1.jpg".into(),
        decision: Decision::Confirm,
        response_ms: Some(4000),
    });
    recorder.record(TelemetryEvent::VerificationOpened { frame: "f2.jpg".into() });
    recorder.record(TelemetryEvent::VerificationResolved {
        frame: "f2.jpg".into(),
        decision: Decision::FalseAlarm,
        response_ms: Some(2000),
    });
    recorder.record(TelemetryEvent::VerificationOpened { frame: "f3.jpg".into() });
    recorder.record(TelemetryEvent::VerificationExpired { frame: "f3.jpg".into() });

    let snap = recorder.snapshot();
    assert_eq!(snap.verification.opened, 3);
    assert_eq!(snap.verification.confirmed, 1);
    assert_eq!(snap.verification.dismissed, 1);
    assert_eq!(snap.verification.expired, 1);
    assert_eq!(snap.verification.avg_response_ms, 3000.0);
}

#[test]
fn test_recorder_is_bounded() {
    let mut recorder = TelemetryRecorder::new();
    for i in 0..10_050u64 {
        recorder.record(TelemetryEvent::StaleDropped { seq: RequestSeq(i), op: Operation::Analyze });
    }
    assert_eq!(recorder.len(), 10_000);
    assert_eq!(
        recorder.events().next(),
        Some(&TelemetryEvent::StaleDropped { seq: RequestSeq(50), op: Operation::Analyze })
    );
}

#[test]
fn test_session_summary() {
    let mut recorder = TelemetryRecorder::new();
    recorder.record(TelemetryEvent::RequestCompleted { seq: RequestSeq(1), op: Operation::Analyze, latency_ms: 10 });
    recorder.record(TelemetryEvent::RequestFailed { seq: RequestSeq(2), op: Operation::FetchState, latency_ms: 10 });
    recorder.record(TelemetryEvent::AlertObserved { frame: Some("f1.jpg".into()) });

    match recorder.aggregate_session(60_000) {
        TelemetryEvent::SessionSummary { duration_ms, analyses, alerts, failures } => {
            assert_eq!(duration_ms, 60_000);
            assert_eq!(analyses, 1);
            assert_eq!(alerts, 1);
            assert_eq!(failures, 1);
        }
        other => panic!("Wrong event type: {:?}", other),
    }

    recorder.clear();
    assert!(recorder.is_empty());
}
