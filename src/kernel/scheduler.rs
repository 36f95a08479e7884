use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::event::Event;

/// Fixed-period trigger of the analysis cycle.
///
/// Ticks are posted to the reactor and never wait for a previous cycle's
/// request to finish. Stopping (or dropping) the scheduler cancels the task.
#[derive(Debug)]
pub struct PollScheduler {
    period: Duration,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollScheduler {
    /// Spawns the trigger. The first tick fires one full period from now.
    pub fn start(period: Duration, tx: mpsc::Sender<Event>) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            let mut cadence = interval_at(Instant::now() + period, period);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = cadence.tick() => {
                        debug!("poll tick");
                        if tx.send(Event::PollTick).await.is_err() {
                            // Reactor gone.
                            break;
                        }
                    }
                }
            }
        });

        info!("Poll scheduler started. Period: {}ms", period.as_millis());
        Self { period, token, handle: Some(handle) }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished()) && !self.token.is_cancelled()
    }

    pub fn stop(&mut self) {
        if self.handle.take().is_some() {
            self.token.cancel();
            info!("Poll scheduler stopped");
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
