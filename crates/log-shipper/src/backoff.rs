// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decorrelated jitter retry delays.
//!
//! Each delay is drawn relative to the previous one:
//!
//! ```text
//! current = min(max_delay, max(seed_delay, current * 3 * U[0, 1)))
//! ```
//!
//! starting from `current = seed_delay`. The sequence never drops below the
//! seed, never exceeds the maximum and yields exactly `max_retries` values.
//! See <https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/>.

use std::time::Duration;

use rand::Rng;

/// Parameters of a decorrelated jitter sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub seed_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// Starts a new delay sequence drawing randomness from `rng`.
    pub fn delays<'a, G: Rng + ?Sized>(&self, rng: &'a mut G) -> DecorrelatedJitter<'a, G> {
        DecorrelatedJitter::new(self.max_retries, self.seed_delay, self.max_delay, rng)
    }
}

/// Lazy, finite iterator of retry delays.
#[derive(Debug)]
pub struct DecorrelatedJitter<'a, G: Rng + ?Sized> {
    rng: &'a mut G,
    remaining: u32,
    seed: Duration,
    max: Duration,
    current: Duration,
}

impl<'a, G: Rng + ?Sized> DecorrelatedJitter<'a, G> {
    pub fn new(max_retries: u32, seed_delay: Duration, max_delay: Duration, rng: &'a mut G) -> Self {
        DecorrelatedJitter {
            rng,
            remaining: max_retries,
            seed: seed_delay,
            max: max_delay,
            current: seed_delay,
        }
    }
}

impl<G: Rng + ?Sized> Iterator for DecorrelatedJitter<'_, G> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let factor = 3.0 * self.rng.gen::<f64>();
        // An overflowing product is clamped to the maximum anyway.
        let jittered = Duration::try_from_secs_f64(self.current.as_secs_f64() * factor)
            .unwrap_or(self.max);
        self.current = jittered.max(self.seed).min(self.max);
        Some(self.current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl<G: Rng + ?Sized> ExactSizeIterator for DecorrelatedJitter<'_, G> {}
