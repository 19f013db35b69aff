//! The fixed retry ladder used by scans.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default waits between scan attempts, in seconds.
pub const DEFAULT_LADDER_SECS: [u64; 6] = [5, 10, 15, 25, 40, 65];

/// An explicit, ordered sequence of waits between scan attempts.
///
/// The ladder allows one attempt per entry. Before attempt `k` (1-based,
/// `k >= 2`) the scan sleeps entry `k - 1`; the final entry would precede
/// an attempt that never happens, so it is never slept.
///
/// # Examples
///
/// ```rust
/// use scangate::coordinator::RetryLadder;
/// use std::time::Duration;
///
/// let ladder = RetryLadder::default();
/// assert_eq!(ladder.attempts(), 6);
/// assert_eq!(ladder.delay_before(1), None);
/// assert_eq!(ladder.delay_before(2), Some(Duration::from_secs(5)));
/// assert_eq!(ladder.delay_before(6), Some(Duration::from_secs(40)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryLadder {
    #[serde(with = "ladder_secs")]
    steps: Vec<Duration>,
}

impl RetryLadder {
    /// Creates a ladder from explicit waits. An empty ladder still allows
    /// one attempt.
    pub fn new(steps: impl Into<Vec<Duration>>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// A ladder allowing exactly one attempt.
    pub fn single_attempt() -> Self {
        Self::new(vec![Duration::ZERO])
    }

    /// Returns the waits in order.
    pub fn steps(&self) -> &[Duration] {
        &self.steps
    }

    /// Number of attempts this ladder allows.
    pub fn attempts(&self) -> usize {
        self.steps.len().max(1)
    }

    /// Wait before 1-based `attempt`, or `None` for the first attempt and
    /// for attempts past the end of the ladder.
    pub fn delay_before(&self, attempt: usize) -> Option<Duration> {
        if attempt < 2 || attempt > self.attempts() {
            return None;
        }
        self.steps.get(attempt - 2).copied()
    }

    /// Total time slept if every attempt fails.
    pub fn total_wait(&self) -> Duration {
        (2..=self.attempts())
            .filter_map(|attempt| self.delay_before(attempt))
            .sum()
    }
}

impl Default for RetryLadder {
    fn default() -> Self {
        Self::new(
            DEFAULT_LADDER_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect::<Vec<_>>(),
        )
    }
}

mod ladder_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(steps: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let secs: Vec<u64> = steps.iter().map(Duration::as_secs).collect();
        secs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Vec::<u64>::deserialize(deserializer)?;
        Ok(secs.into_iter().map(Duration::from_secs).collect())
    }
}
