use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::event::Event;
use crate::services::assessment::VerificationRecord;

/// `max(0, round((expires_at - now) / 1s))`
pub fn seconds_left(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let remaining_ms = (expires_at - now).num_milliseconds();
    if remaining_ms <= 0 {
        return 0;
    }
    (remaining_ms as f64 / 1000.0).round() as u64
}

/// Presentational countdown for the open verification record.
///
/// Owns at most one ticker. Any record change cancels the previous ticker
/// before a new one is spawned; a `None` record leaves nothing running.
/// Never clears or expires the record itself.
#[derive(Debug)]
pub struct VerificationTimer {
    tx: mpsc::Sender<Event>,
    period: Duration,
    record: Option<VerificationRecord>,
    seconds_left: Option<u64>,
    ticker: Option<CancellationToken>,
}

impl VerificationTimer {
    pub fn new(tx: mpsc::Sender<Event>, period: Duration) -> Self {
        Self {
            tx,
            period,
            record: None,
            seconds_left: None,
            ticker: None,
        }
    }

    pub fn seconds_left(&self) -> Option<u64> {
        self.seconds_left
    }

    pub fn record(&self) -> Option<&VerificationRecord> {
        self.record.as_ref()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Follows the current verification record. Recomputes immediately on
    /// change; an unchanged record keeps its ticker.
    pub fn sync(&mut self, record: Option<&VerificationRecord>, now: DateTime<Utc>) {
        if self.record.as_ref() == record {
            return;
        }

        self.cancel_ticker();
        self.record = record.cloned();

        self.seconds_left = self.record.as_ref().map(|r| seconds_left(r.expires_at, now));
        if let Some(r) = &self.record {
            debug!("countdown armed for {}: {:?}s", r.frame, self.seconds_left);
            self.spawn_ticker();
        }
    }

    /// Ticker callback. Returns the fresh value, `None` if no record is open.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<u64> {
        self.seconds_left = self.record.as_ref().map(|r| seconds_left(r.expires_at, now));
        self.seconds_left
    }

    pub fn stop(&mut self) {
        self.cancel_ticker();
        self.record = None;
        self.seconds_left = None;
    }

    fn cancel_ticker(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }

    fn spawn_ticker(&mut self) {
        let token = CancellationToken::new();
        let child = token.clone();
        let tx = self.tx.clone();
        let period = self.period;

        tokio::spawn(async move {
            let mut cadence = interval_at(Instant::now() + period, period);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = cadence.tick() => {
                        if tx.send(Event::CountdownTick).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.ticker = Some(token);
    }
}

impl Drop for VerificationTimer {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}
