use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// What a countdown reports back to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Seconds left, emitted once per second starting at the full duration.
    Remaining(u32),
    Expired,
}

/// A tick tagged with the round of the countdown that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub round: u64,
    pub tick: TimerTick,
}

#[derive(Debug)]
enum TimerState {
    Idle,
    Running {
        cancel: watch::Sender<bool>,
        task: JoinHandle<()>,
    },
    Cancelled,
}

/// Single cancellable countdown.
///
/// The countdown itself runs on its own task and only ever talks to the owner
/// by sending [`TimerEvent`]s into a channel. The owner passes every event
/// through [`Timer::accepts`] before acting on it; once the timer has been
/// cancelled or restarted, events from the old round are rejected even if
/// they were already sitting in the channel.
#[derive(Debug)]
pub struct Timer {
    round: u64,
    state: TimerState,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            round: 0,
            state: TimerState::Idle,
        }
    }

    /// Starts a countdown of `seconds`, cancelling any running one. Returns
    /// the round number the new countdown's events will carry.
    pub fn start<T>(&mut self, seconds: u32, tx: mpsc::Sender<T>) -> u64
    where
        T: From<TimerEvent> + Send + 'static,
    {
        self.cancel();
        self.round += 1;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_countdown(self.round, seconds, tx, cancel_rx));
        self.state = TimerState::Running {
            cancel: cancel_tx,
            task,
        };
        self.round
    }

    /// Stops the running countdown. Returns `false` if nothing was running.
    pub fn cancel(&mut self) -> bool {
        match std::mem::replace(&mut self.state, TimerState::Cancelled) {
            TimerState::Running { cancel, task } => {
                let _ = cancel.send(true);
                task.abort();
                true
            }
            previous => {
                self.state = previous;
                false
            }
        }
    }

    /// Whether an event from `round` belongs to the countdown that is running now.
    pub fn accepts(&self, round: u64) -> bool {
        matches!(self.state, TimerState::Running { .. }) && round == self.round
    }

    /// Marks the running countdown as done after its expiry was handled.
    pub fn finish(&mut self, round: u64) -> bool {
        if !self.accepts(round) {
            return false;
        }
        self.state = TimerState::Idle;
        true
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    #[cfg(test)]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, TimerState::Cancelled)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_countdown<T>(
    round: u64,
    seconds: u32,
    tx: mpsc::Sender<T>,
    mut cancel_rx: watch::Receiver<bool>,
) where
    T: From<TimerEvent> + Send + 'static,
{
    let mut remaining = seconds;
    while remaining > 0 {
        let event = TimerEvent {
            round,
            tick: TimerTick::Remaining(remaining),
        };
        if tx.send(event.into()).await.is_err() {
            return;
        }

        tokio::select! {
            biased;
            _ = cancel_rx.changed() => return,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
        remaining -= 1;
    }

    let _ = tx
        .send(
            TimerEvent {
                round,
                tick: TimerTick::Expired,
            }
            .into(),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn counts_down_then_expires_once() {
        let (tx, mut rx) = mpsc::channel::<TimerEvent>(16);
        let mut timer = Timer::new();
        let round = timer.start(3, tx.clone());
        let started = Instant::now();

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.round, round);
            seen.push((event.tick, started.elapsed().as_secs()));
            if event.tick == TimerTick::Expired {
                break;
            }
        }

        assert_eq!(
            seen,
            vec![
                (TimerTick::Remaining(3), 0),
                (TimerTick::Remaining(2), 1),
                (TimerTick::Remaining(1), 2),
                (TimerTick::Expired, 3),
            ]
        );
        assert!(timer.finish(round));
        assert!(!timer.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_further_events() {
        let (tx, mut rx) = mpsc::channel::<TimerEvent>(16);
        let mut timer = Timer::new();
        let round = timer.start(5, tx.clone());

        assert_eq!(rx.recv().await.unwrap().tick, TimerTick::Remaining(5));
        assert_eq!(rx.recv().await.unwrap().tick, TimerTick::Remaining(4));

        assert!(timer.cancel());
        assert!(timer.is_cancelled());
        assert!(!timer.accepts(round));
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_rejects_previous_round() {
        let (tx, mut rx) = mpsc::channel::<TimerEvent>(16);
        let mut timer = Timer::new();
        let first = timer.start(5, tx.clone());
        let second = timer.start(2, tx.clone());
        assert_ne!(first, second);
        assert!(!timer.accepts(first));
        assert!(timer.accepts(second));

        let mut accepted = Vec::new();
        while let Some(event) = rx.recv().await {
            if timer.accepts(event.round) {
                accepted.push(event.tick);
            }
            if event.round == second && event.tick == TimerTick::Expired {
                break;
            }
        }
        assert_eq!(
            accepted,
            vec![
                TimerTick::Remaining(2),
                TimerTick::Remaining(1),
                TimerTick::Expired
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_seconds_expires_immediately() {
        let (tx, mut rx) = mpsc::channel::<TimerEvent>(4);
        let mut timer = Timer::new();
        let round = timer.start(0, tx.clone());
        let event = rx.recv().await.unwrap();
        assert_eq!(event, TimerEvent { round, tick: TimerTick::Expired });
    }
}
