/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Client session identity and the session-cleanup contract.
//!
//! Session identifiers are opaque to the core: the registry never
//! interprets them beyond equality. `SessionId` reserves `0` as its own
//! "no session" sentinel and stores the caller's id shifted by one
//! internally, so that a caller-supplied identifier of zero still maps to
//! a distinct, non-sentinel value.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Build a `SessionId` from a caller-provided, possibly-zero identifier.
    pub fn new(raw: u64) -> Self {
        SessionId(raw + 1)
    }

    pub fn raw(self) -> u64 {
        self.0 - 1
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_session_id_round_trips() {
        let s = SessionId::new(0);
        assert_eq!(s.raw(), 0);
    }

    #[test]
    fn distinct_raw_ids_stay_distinct() {
        assert_ne!(SessionId::new(0), SessionId::new(1));
    }
}
