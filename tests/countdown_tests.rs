mod common;

use std::time::Duration as StdDuration;

use chrono::Duration;
use common::*;
use riskwatch::kernel::countdown::{seconds_left, VerificationTimer};
use riskwatch::kernel::event::Event;
use riskwatch::kernel::time::{Clock, ManualClock};
use tokio::sync::mpsc;

#[test]
fn test_countdown_from_45_to_zero() {
    let clock = ManualClock::new(t0());
    let expires_at = t0() + Duration::seconds(45);

    let mut observed = Vec::new();
    for _ in 0..50 {
        observed.push(seconds_left(expires_at, clock.now()));
        clock.advance(Duration::seconds(1));
    }

    assert_eq!(observed[0], 45);
    for pair in observed.windows(2).take(45) {
        assert_eq!(pair[0] - 1, pair[1], "decreases by one per second");
    }
    assert_eq!(observed[45], 0);
    assert!(observed[45..].iter().all(|&s| s == 0), "never negative, stays at zero");
}

#[test]
fn test_countdown_rounds_to_nearest_second() {
    let expires_at = t0() + Duration::seconds(45);
    assert_eq!(seconds_left(expires_at, t0() + Duration::milliseconds(400)), 45);
    assert_eq!(seconds_left(expires_at, t0() + Duration::milliseconds(600)), 44);
    assert_eq!(seconds_left(expires_at, expires_at - Duration::milliseconds(300)), 0);
    assert_eq!(seconds_left(expires_at, expires_at + Duration::hours(1)), 0);
}

#[tokio::test]
async fn test_timer_computes_immediately_on_record_change() {
    let (tx, _rx) = mpsc::channel(10);
    let mut timer = VerificationTimer::new(tx, StdDuration::from_secs(1));
    assert_eq!(timer.seconds_left(), None);

    timer.sync(Some(&pending("f7.jpg", 45)), t0());
    assert_eq!(timer.seconds_left(), Some(45), "no one-second lag before the first value");
    assert!(timer.is_ticking());

    timer.tick(t0() + Duration::seconds(3));
    assert_eq!(timer.seconds_left(), Some(42));
}

#[tokio::test]
async fn test_timer_clears_when_record_disappears() {
    let (tx, _rx) = mpsc::channel(10);
    let mut timer = VerificationTimer::new(tx, StdDuration::from_secs(1));

    timer.sync(Some(&pending("f7.jpg", 45)), t0());
    timer.sync(None, t0() + Duration::seconds(2));

    assert_eq!(timer.seconds_left(), None);
    assert!(!timer.is_ticking());
    assert_eq!(timer.tick(t0() + Duration::seconds(3)), None);
}

#[tokio::test]
async fn test_unchanged_record_keeps_countdown() {
    let (tx, _rx) = mpsc::channel(10);
    let mut timer = VerificationTimer::new(tx, StdDuration::from_secs(1));
    let record = pending("f7.jpg", 45);

    timer.sync(Some(&record), t0());
    timer.tick(t0() + Duration::seconds(5));
    timer.sync(Some(&record), t0() + Duration::seconds(5));
    assert_eq!(timer.seconds_left(), Some(40));

    // A replacement window restarts from its own deadline.
    timer.sync(Some(&pending("f8.jpg", 120)), t0() + Duration::seconds(5));
    assert_eq!(timer.seconds_left(), Some(115));
    assert_eq!(timer.record().map(|r| r.frame.as_str()), Some("f8.jpg"));
}

#[tokio::test(start_paused = true)]
async fn test_ticker_fires_every_period_until_cleared() {
    let (tx, mut rx) = mpsc::channel(10);
    let mut timer = VerificationTimer::new(tx, StdDuration::from_secs(1));
    timer.sync(Some(&pending("f7.jpg", 45)), t0());

    let start = tokio::time::Instant::now();
    assert!(matches!(rx.recv().await, Some(Event::CountdownTick)));
    assert!(matches!(rx.recv().await, Some(Event::CountdownTick)));
    assert!(start.elapsed() >= StdDuration::from_secs(2));

    timer.sync(None, t0());
    // Let the cancelled ticker observe its token.
    tokio::time::sleep(StdDuration::from_millis(10)).await;
    while rx.try_recv().is_ok() {}

    tokio::time::sleep(StdDuration::from_secs(5)).await;
    assert!(rx.try_recv().is_err(), "no ticks once the record is gone");
}
