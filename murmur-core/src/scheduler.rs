//! Per-agent ambient timer
//!
//! An armed scheduler owns a timer task that posts the agent's id on the tick
//! channel every `interval`. Whether a tick actually produces a request is
//! decided on the simulation loop by [`AutonomyScheduler::evaluate`].
//!
//! ```text
//! Idle --arm(interval > 0)--> Armed --tick--> Firing --done--> Armed
//!   ^                           |                |
//!   +----------- stop ----------+------ stop ----+
//! ```
//!
//! A stopped scheduler stays `Idle` for good.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::stimulus::{AgentRef, Location};

/// Longest ambient interval a timer accepts (one week)
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed,
    Firing,
}

/// Why a tick produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The scheduler is not running
    Disarmed,
    /// The agent's dialogue engine is switched off
    Disabled,
    /// The agent is nowhere
    NoLocation,
    /// A completion is still in flight
    Busy,
    /// The agent responded less than one interval ago
    TooSoon,
}

/// Outcome of evaluating a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickDecision {
    /// Compose an ambient request for the agent standing at this location
    Fire(Location),
    Skip(SkipReason),
}

/// Ambient timer of one agent
#[derive(Debug)]
pub struct AutonomyScheduler {
    state: SchedulerState,
    interval: Duration,
    cancel: CancellationToken,
}

impl AutonomyScheduler {
    /// Create an unarmed scheduler. An interval of zero never arms.
    pub fn new(interval: Duration) -> Self {
        Self {
            state: SchedulerState::Idle,
            interval,
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the timer task posting `agent` on `ticks`.
    ///
    /// Returns `false` if the interval is zero or above [`MAX_INTERVAL`], the
    /// timer already runs, or the scheduler was stopped. Must be called from
    /// within a tokio runtime.
    pub fn arm(&mut self, agent: AgentRef, ticks: mpsc::Sender<AgentRef>) -> bool {
        if self.interval.is_zero()
            || self.state != SchedulerState::Idle
            || self.cancel.is_cancelled()
        {
            return false;
        }
        if self.interval > MAX_INTERVAL {
            tracing::warn!(
                agent = %agent,
                interval_secs = self.interval.as_secs(),
                "Ambient interval too long; autonomy timer not armed"
            );
            return false;
        }

        let period = self.interval;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = timer.tick() => match ticks.try_send(agent.clone()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            tracing::debug!(agent = %agent, "Tick channel full; dropping tick");
                        }
                        Err(TrySendError::Closed(_)) => break,
                    },
                }
            }

            tracing::debug!(agent = %agent, "Autonomy timer stopped");
        });

        self.state = SchedulerState::Armed;
        true
    }

    /// Enter `Firing`. Returns `false` unless the scheduler was `Armed`.
    pub fn begin_tick(&mut self) -> bool {
        if self.state != SchedulerState::Armed {
            return false;
        }
        self.state = SchedulerState::Firing;
        true
    }

    /// Leave `Firing`
    pub fn finish_tick(&mut self) {
        if self.state == SchedulerState::Firing {
            self.state = SchedulerState::Armed;
        }
    }

    /// Cancel the timer. Terminal.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.state = SchedulerState::Idle;
    }

    /// Decide what a tick arriving at `now` does for `agent` standing at `location`.
    pub fn evaluate(agent: &Agent, location: Option<&Location>, now: Instant) -> TickDecision {
        let scheduler = agent.scheduler();
        if scheduler.state == SchedulerState::Idle {
            return TickDecision::Skip(SkipReason::Disarmed);
        }
        if !agent.is_enabled() {
            return TickDecision::Skip(SkipReason::Disabled);
        }
        let Some(location) = location else {
            return TickDecision::Skip(SkipReason::NoLocation);
        };
        if agent.is_busy() {
            return TickDecision::Skip(SkipReason::Busy);
        }
        if let Some(last) = agent.last_response()
            && now.saturating_duration_since(last) < scheduler.interval
        {
            return TickDecision::Skip(SkipReason::TooSoon);
        }

        TickDecision::Fire(location.clone())
    }
}

impl Drop for AutonomyScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
