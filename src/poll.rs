//! Bounded polling for long-running server-side operations
//!
//! One loop serves every resource kind. What counts as done or as a dead end is
//! decided by a [`PollPolicy`]; the two shipped policies are
//! [`INSTANCE_READINESS`] and [`JOB_COMPLETION`].

use crate::config::duration_ms;
use crate::error::GdsResult;
use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Growth of the sleep interval between two fetches
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Sleep the initial interval every time
    Fixed,
    /// Multiply the interval by `factor` after each sleep, up to `max_interval`
    Exponential {
        #[serde(deserialize_with = "positive_factor")]
        factor: u32,
        #[serde(deserialize_with = "duration_ms::deserialize")]
        max_interval: Duration,
    },
}

impl Backoff {
    /// Interval to use after sleeping `current`, never below one millisecond
    pub fn next(&self, current: Duration) -> Duration {
        let next = match self {
            Backoff::Fixed => current,
            Backoff::Exponential { factor, max_interval } => current
                .checked_mul(*factor)
                .unwrap_or(*max_interval)
                .min(*max_interval),
        };
        next.max(MIN_INTERVAL)
    }
}

fn positive_factor<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let factor = u32::deserialize(deserializer)?;
    if factor == 0 {
        return Err(de::Error::custom("backoff factor must be at least 1"));
    }
    Ok(factor)
}

/// Time budget and pacing of a wait
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    #[serde(deserialize_with = "duration_ms::deserialize")]
    pub initial_interval: Duration,
    /// Wall-clock budget of the whole wait, fetches included
    #[serde(deserialize_with = "duration_ms::deserialize")]
    pub max_wait: Duration,
    pub backoff: Backoff,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(200),
            max_wait: Duration::from_secs(300),
            backoff: Backoff::Fixed,
        }
    }
}

impl PollConfig {
    pub fn fixed(interval: Duration, max_wait: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_wait,
            backoff: Backoff::Fixed,
        }
    }
}

/// Outcome of a bounded wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<S> {
    /// The resource reached its success state
    Converged(S),
    /// The budget ran out first; carries the last snapshot seen
    Pending(Option<S>),
    /// The resource vanished (`None`) or reported a terminal failure state
    Failed(Option<S>),
}

impl<S> PollOutcome<S> {
    pub fn is_converged(&self) -> bool {
        matches!(self, PollOutcome::Converged(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PollOutcome::Pending(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PollOutcome::Failed(_))
    }

    /// Last snapshot observed, whatever the outcome
    pub fn snapshot(&self) -> Option<&S> {
        match self {
            PollOutcome::Converged(s) => Some(s),
            PollOutcome::Pending(s) | PollOutcome::Failed(s) => s.as_ref(),
        }
    }
}

/// Classifies snapshots of a polled resource
pub trait PollPolicy<S> {
    fn is_success(&self, snapshot: &S) -> bool;

    fn is_terminal_failure(&self, snapshot: &S) -> bool;

    /// Short description used in progress logging
    fn describe(&self, snapshot: &S) -> String;
}

/// A snapshot that reports a server-side status string
pub trait StatusSnapshot {
    fn status(&self) -> &str;
}

/// Policy over fixed sets of status strings
#[derive(Debug, Clone, Copy)]
pub struct StatusPolicy {
    pub success: &'static [&'static str],
    pub terminal_failure: &'static [&'static str],
}

/// Cloud instance is usable once `running`; `deleting`/`destroying` never recover
pub const INSTANCE_READINESS: StatusPolicy = StatusPolicy {
    success: &["running"],
    terminal_failure: &["deleting", "destroying"],
};

/// Compute job is done once `exited`
pub const JOB_COMPLETION: StatusPolicy = StatusPolicy {
    success: &["exited"],
    terminal_failure: &["failed"],
};

impl<S: StatusSnapshot> PollPolicy<S> for StatusPolicy {
    fn is_success(&self, snapshot: &S) -> bool {
        self.success.contains(&snapshot.status())
    }

    fn is_terminal_failure(&self, snapshot: &S) -> bool {
        self.terminal_failure.contains(&snapshot.status())
    }

    fn describe(&self, snapshot: &S) -> String {
        format!("Current status: {}", snapshot.status())
    }
}

/// Suspension between two fetches, and the clock the budget is measured on
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);

    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fetch snapshots until the policy reports success or terminal failure, or
/// until `max_wait` has passed on the sleeper's clock.
///
/// The deadline is checked before every fetch, so a slow fetch or a long last
/// sleep can end the wait at most one round late. Only `fetch` is repeated. Errors returned by `fetch` end the wait and are
/// propagated unchanged. A fetch returning `None` means the resource is gone.
pub async fn poll_until<S, F, Fut, P>(
    mut fetch: F,
    policy: &P,
    config: &PollConfig,
    sleeper: &dyn Sleeper,
) -> GdsResult<PollOutcome<S>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GdsResult<Option<S>>>,
    P: PollPolicy<S> + ?Sized,
{
    let started = sleeper.now();
    let mut interval = config.initial_interval.max(MIN_INTERVAL);
    let mut last = None;

    while sleeper.now().saturating_duration_since(started) < config.max_wait {
        let snapshot = match fetch().await? {
            Some(snapshot) => snapshot,
            None => return Ok(PollOutcome::Failed(None)),
        };

        if policy.is_terminal_failure(&snapshot) {
            return Ok(PollOutcome::Failed(Some(snapshot)));
        }
        if policy.is_success(&snapshot) {
            return Ok(PollOutcome::Converged(snapshot));
        }

        debug!(
            "Not ready yet. {}. Retrying in {:?}",
            policy.describe(&snapshot),
            interval
        );
        sleeper.sleep(interval).await;
        interval = config.backoff.next(interval);
        last = Some(snapshot);
    }

    debug!(
        "Gave up waiting after {:?}",
        sleeper.now().saturating_duration_since(started)
    );
    Ok(PollOutcome::Pending(last))
}
