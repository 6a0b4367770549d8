//! Cancellable fixed-cadence background task.
//!
//! `every` runs `tick` immediately and then once per period. Each tick runs
//! as its own task, so a slow tick does not delay the next one and several
//! may be in flight at once. The first tick to return `Break` stops the
//! cadence. Cancelling the returned [`PollHandle`] (or dropping it) stops
//! the cadence and aborts any ticks still in flight.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;

#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// True once the cadence has stopped, by `Break` or by cancellation.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn every<F, Fut>(period: Duration, mut tick: F) -> PollHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = time::interval(period);
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    in_flight.spawn(tick());
                }
                Some(joined) = in_flight.join_next() => match joined {
                    Ok(ControlFlow::Break(())) => break,
                    Ok(ControlFlow::Continue(())) => {}
                    Err(e) if e.is_panic() => tracing::error!("scheduled tick panicked: {}", e),
                    Err(_) => {}
                },
            }
        }
        // dropping `in_flight` aborts ticks that are still running
    });

    PollHandle { task }
}
