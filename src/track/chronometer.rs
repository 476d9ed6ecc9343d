// src/track/chronometer.rs
//! Periodic elapsed-time ticks for an active recording

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Background task invoking a callback once per period until the callback
/// returns `false` or the chronometer is stopped.
#[derive(Debug)]
pub struct Chronometer {
    period: Duration,
    handle: JoinHandle<()>,
}

impl Chronometer {
    /// Spawn the tick loop. The first tick fires one full period after start.
    pub fn start<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(Duration) -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            // Ticks are not wall-clock aligned; a late tick just pushes the next one back
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if !on_tick(period).await {
                    break;
                }
            }
        });

        Self { period, handle }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the tick loop and wait until it has fully exited
    pub async fn stop(self) {
        self.handle.abort();
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                tracing::warn!("Chronometer task failed: {}", e);
            }
        }
    }
}
