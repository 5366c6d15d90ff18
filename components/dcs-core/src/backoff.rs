/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A small exponential-backoff counter shared by every retrying component:
//! the cellular adapter (max 4, init 1s), the Wi-Fi adapter's connect and
//! disconnect retries (max 3, init 1s each), and the default connection
//! coordinator's `RetryTechTimer` (unbounded attempts, capped at 6h).
//!
//! The wait for the Nth attempt (0-indexed) is `initial * 2^N`, capped. This
//! formula — rather than a mutable "current backoff, doubled in place" field
//! — is what lets the cellular adapter's documented quirk fall out for free: the next
//! backoff after a success is `initial * 2^1`, already the doubled value of
//! the very first attempt ever made.

use std::time::Duration;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    cap: Option<Duration>,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, cap: Option<Duration>, max_attempts: Option<u32>) -> Self {
        Backoff {
            initial,
            cap,
            max_attempts,
            attempts: 0,
        }
    }

    /// Cellular: max 4 attempts, init 1s, uncapped duration.
    pub fn cellular() -> Self {
        Self::new(Duration::from_secs(1), None, Some(4))
    }

    /// Wi-Fi connect/disconnect retry: max 3 attempts, init 1s, uncapped duration.
    pub fn wifi() -> Self {
        Self::new(Duration::from_secs(1), None, Some(3))
    }

    /// Default connection coordinator's `RetryTechTimer`: unbounded attempts,
    /// capped at 6 hours.
    pub fn coordinator() -> Self {
        Self::new(Duration::from_secs(1), Some(Duration::from_secs(6 * 3600)), None)
    }

    fn duration_for(&self, attempts: u32) -> Duration {
        let shift = attempts.min(31);
        let factor = 1u32 << shift;
        let raw = self.initial.saturating_mul(factor);
        match self.cap {
            Some(cap) if raw > cap => cap,
            _ => raw,
        }
    }

    /// Arm the timer for the next attempt: returns the wait duration and
    /// advances the attempt counter, unless attempts are exhausted.
    pub fn arm(&mut self) -> Result<Duration, Error> {
        if let Some(max) = self.max_attempts {
            if self.attempts >= max {
                return Err(Error::Overflow);
            }
        }
        let wait = self.duration_for(self.attempts);
        self.attempts += 1;
        Ok(wait)
    }

    /// Reset the attempt counter to the given value. Every caller except the
    /// cellular adapter resets to 0; the cellular adapter resets to 1 to
    /// preserve the source's quirk (see module docs).
    pub fn reset_to(&mut self, attempts: u32) {
        self.attempts = attempts;
    }

    pub fn reset(&mut self) {
        self.reset_to(0);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.max_attempts, Some(max) if self.attempts >= max)
    }
}
