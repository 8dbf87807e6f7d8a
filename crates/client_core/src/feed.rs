//! Polling feed that keeps a date night's reviews fresh.
//!
//! Every UI that shows reviews polls on a fixed interval; failures are
//! logged and the next tick tries again at the same cadence. A shared stop
//! flag, checked once per tick, shuts the loop down.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::{domain::DateNightId, error::ApiException, protocol::ReviewPayload};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::warn;

use crate::AppClient;

/// Where the feed gets its reviews from. Production uses [`AppClient`];
/// tests substitute their own source.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_reviews(
        &self,
        date_night_id: DateNightId,
    ) -> Result<Vec<ReviewPayload>, ApiException>;
}

#[async_trait]
impl ReviewSource for AppClient {
    async fn fetch_reviews(
        &self,
        date_night_id: DateNightId,
    ) -> Result<Vec<ReviewPayload>, ApiException> {
        self.reviews_for_date_night(date_night_id).await
    }
}

/// A running poll loop. Subscribers get the full review list, newest first,
/// after every successful poll.
pub struct ReviewFeed {
    stop: Arc<AtomicBool>,
    updates: broadcast::Sender<Vec<ReviewPayload>>,
    task: JoinHandle<()>,
}

impl ReviewFeed {
    pub fn spawn(
        source: Arc<dyn ReviewSource>,
        date_night_id: DateNightId,
        poll_interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let (updates, _) = broadcast::channel(16);
        let task = tokio::spawn(poll_loop(
            source,
            date_night_id,
            poll_interval,
            Arc::clone(&stop),
            updates.clone(),
        ));
        Self {
            stop,
            updates,
            task,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<ReviewPayload>> {
        self.updates.subscribe()
    }

    /// Flips the stop flag. The loop notices on its next tick; the flag is
    /// never cleared again.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Stops the feed and waits for the loop to wind down.
    pub async fn shutdown(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.task.await;
    }
}

async fn poll_loop(
    source: Arc<dyn ReviewSource>,
    date_night_id: DateNightId,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    updates: broadcast::Sender<Vec<ReviewPayload>>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if stop.load(Ordering::Relaxed) {
            break;
        }
        match source.fetch_reviews(date_night_id).await {
            Ok(reviews) => {
                let _ = updates.send(reviews);
            }
            Err(error) => {
                warn!(
                    date_night_id = date_night_id.0,
                    %error,
                    "review poll failed; retrying on the next tick"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;
