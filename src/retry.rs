// Copyright 2025 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Restart policies for the supervisor.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::OperatorError;

/// Decides whether, and after what delay, a terminated pipeline run is
/// restarted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RetryPolicy {
    /// Restart a bounded number of times with exponential backoff.
    #[serde(rename_all = "camelCase")]
    Times {
        /// Restarts left before the policy is exhausted.
        remaining: u32,
        /// Delay before the next restart.
        #[serde(with = "humantime_serde")]
        delay: Duration,
        /// Factor applied to the delay after each restart. Must be >= 1.
        multiplier: f64,
    },

    /// Restart forever, sleeping a uniform random duration between restarts.
    #[serde(rename_all = "camelCase")]
    Infinite {
        /// Lower bound of the restart delay.
        #[serde(with = "humantime_serde")]
        min_delay: Duration,
        /// Upper bound of the restart delay.
        #[serde(with = "humantime_serde")]
        max_delay: Duration,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Times {
            remaining: 3,
            delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A bounded policy: `attempts` restarts, starting at `delay` and
    /// multiplying it by `multiplier` after each restart.
    pub fn times(attempts: u32, delay: Duration, multiplier: f64) -> Self {
        RetryPolicy::Times {
            remaining: attempts,
            delay,
            multiplier,
        }
    }

    /// An unbounded policy sleeping a uniform random duration in
    /// `[min_delay, max_delay]` between restarts.
    pub fn infinite(min_delay: Duration, max_delay: Duration) -> Self {
        RetryPolicy::Infinite {
            min_delay,
            max_delay,
        }
    }

    /// Validates the policy's numeric constraints.
    pub fn validate(&self) -> Result<(), OperatorError> {
        match self {
            RetryPolicy::Times { multiplier, .. } => {
                if *multiplier < 1.0 {
                    return Err(OperatorError::InvalidConfig {
                        reason: "retry multiplier must be at least 1".to_string(),
                    });
                }
            }
            RetryPolicy::Infinite {
                min_delay,
                max_delay,
            } => {
                if min_delay > max_delay {
                    return Err(OperatorError::InvalidConfig {
                        reason: "retry minDelay must not exceed maxDelay".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Decides the next restart.
    ///
    /// Returns the delay to sleep and the policy to carry into the next
    /// attempt, or `None` when the policy is exhausted.
    pub fn next_attempt(&self) -> Option<(Duration, RetryPolicy)> {
        match self {
            RetryPolicy::Times {
                remaining,
                delay,
                multiplier,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let next = RetryPolicy::Times {
                    remaining: remaining - 1,
                    delay: delay.mul_f64(*multiplier),
                    multiplier: *multiplier,
                };
                Some((*delay, next))
            }
            RetryPolicy::Infinite {
                min_delay,
                max_delay,
            } => {
                let delay = if min_delay == max_delay {
                    *min_delay
                } else {
                    let secs = rand::thread_rng()
                        .gen_range(min_delay.as_secs_f64()..=max_delay.as_secs_f64());
                    Duration::from_secs_f64(secs)
                };
                Some((delay, self.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_yields_exact_attempts_and_delays() {
        let mut policy = RetryPolicy::times(3, Duration::from_secs(1), 2.0);
        let mut delays = Vec::new();

        while let Some((delay, next)) = policy.next_attempt() {
            delays.push(delay);
            policy = next;
        }

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ]
        );
        assert_eq!(policy.next_attempt(), None);
    }

    #[test]
    fn test_times_zero_never_restarts() {
        let policy = RetryPolicy::times(0, Duration::from_secs(1), 2.0);
        assert!(policy.next_attempt().is_none());
    }

    #[test]
    fn test_infinite_delays_stay_in_bounds() {
        let lo = Duration::from_millis(100);
        let hi = Duration::from_millis(500);
        let policy = RetryPolicy::infinite(lo, hi);

        for _ in 0..50 {
            let (delay, next) = policy.next_attempt().expect("infinite always restarts");
            assert!(delay >= lo && delay <= hi, "delay out of bounds: {delay:?}");
            assert_eq!(next, policy);
        }
    }

    #[test]
    fn test_sub_unit_multiplier_rejected() {
        let policy = RetryPolicy::times(2, Duration::from_secs(1), 0.5);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_inverted_infinite_bounds_rejected() {
        let policy = RetryPolicy::infinite(Duration::from_secs(5), Duration::from_secs(1));
        assert!(policy.validate().is_err());
    }
}
