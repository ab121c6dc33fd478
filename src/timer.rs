use std::time::Duration;

use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{interval_at, Instant},
};

/// Countdown resolution.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Repeating task pushing `tick` into a queue every `period`, first one `period`
/// after start. Stops when cancelled, dropped, or when the queue is closed.
#[derive(Debug)]
pub struct Countdown {
    task: JoinHandle<()>,
}

impl Countdown {
    pub fn start<T>(period: Duration, queue: UnboundedSender<T>, tick: T) -> Self
    where
        T: Clone + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if queue.send(tick.clone()).is_err() {
                    tracing::debug!("countdown queue closed");
                    break;
                }
            }
        });

        Self { task }
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}
