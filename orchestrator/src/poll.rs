//! Bounded polling.
//!
//! Every wait in the suite (metadata file, node health, relayer readiness,
//! halt, resume) goes through [`poll_until`]. A poll is split into two
//! halves:
//!
//! - the **query** talks to the outside world. Its errors are transient
//!   (container still starting, file half written) and only logged.
//! - the **check** decides on the query's observation. `Ok(Some(_))` ends the
//!   poll, `Ok(None)` keeps waiting, `Err(_)` aborts immediately.
//!
//! Every query runs under a time cap, so a query that never answers counts as
//! a transient error instead of stalling the poll. The loop stops on success,
//! on a check error, or once its [`PollBound`] is exhausted, in which case it
//! returns [`E2eError::Timeout`].

use {
    crate::error::{E2eError, Result},
    log::{debug, trace},
    std::{future::Future, time::Duration},
    tokio::time::{sleep, timeout, Instant},
};

/// Longest a single query may run unless the policy says otherwise.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// When a poll gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBound {
    /// Stop once this much time has elapsed since the first query.
    Deadline(Duration),
    /// Stop after this many queries.
    Attempts(u32),
}

/// Interval and bound of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub bound: PollBound,
    pub query_timeout: Duration,
}

impl PollPolicy {
    pub const fn timeout(timeout: Duration, interval: Duration) -> Self {
        Self {
            interval,
            bound: PollBound::Deadline(timeout),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub const fn attempts(attempts: u32, interval: Duration) -> Self {
        Self {
            interval,
            bound: PollBound::Attempts(attempts),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub const fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Time the next query may take. Never runs past a deadline.
    fn query_budget(&self, elapsed: Duration) -> Duration {
        match self.bound {
            PollBound::Deadline(timeout) => {
                self.query_timeout.min(timeout.saturating_sub(elapsed))
            }
            PollBound::Attempts(_) => self.query_timeout,
        }
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        match self.bound {
            PollBound::Deadline(timeout) => elapsed >= timeout,
            PollBound::Attempts(max) => attempts >= max,
        }
    }
}

/// Queries until `check` accepts an observation, `check` fails, or the policy
/// bound is reached. Sleeps `policy.interval` after every unsuccessful query.
pub async fn poll_until<O, T, P, Fut, C>(
    what: &str,
    policy: &PollPolicy,
    mut query: P,
    mut check: C,
) -> Result<T>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<O>>,
    C: FnMut(O) -> Result<Option<T>>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_error = None;

    loop {
        attempts = attempts.saturating_add(1);
        let budget = policy.query_budget(start.elapsed());
        match timeout(budget, query()).await {
            Ok(Ok(observation)) => {
                if let Some(value) = check(observation)? {
                    debug!("{} satisfied after {} attempts", what, attempts);
                    return Ok(value);
                }
            }
            Ok(Err(e)) => {
                trace!("polling for {} hit transient error: {}", what, e);
                last_error = Some(e.to_string());
            }
            Err(_) => {
                trace!("polling for {}: query gave no answer within {:?}", what, budget);
                last_error = Some(format!("query gave no answer within {budget:?}"));
            }
        }

        let elapsed = start.elapsed();
        if policy.exhausted(attempts, elapsed) {
            return Err(E2eError::Timeout {
                what: what.to_string(),
                attempts,
                elapsed,
                last_error,
            });
        }
        sleep(policy.interval).await;
    }
}
