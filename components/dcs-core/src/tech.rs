/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::fmt;

/// A technology tag, as seen at the external boundary.
///
/// `Unknown` is a sentinel: it never names a real channel, but it is a
/// valid value to pass around (e.g. as the "no technology selected yet"
/// state of the default connection coordinator).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Technology {
    Cellular,
    Wifi,
    Ethernet,
    Unknown,
}

impl Technology {
    /// Canonical name used in log output and on the external boundary.
    pub fn name(self) -> &'static str {
        match self {
            Technology::Cellular => "cellular",
            Technology::Wifi => "wifi",
            Technology::Ethernet => "ethernet",
            Technology::Unknown => "unknown",
        }
    }

    /// The three technologies actually supported by the dispatcher.
    /// `Unknown` is deliberately excluded.
    pub fn all() -> [Technology; 3] {
        [Technology::Cellular, Technology::Wifi, Technology::Ethernet]
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_excludes_unknown() {
        assert_eq!(Technology::all().len(), 3);
        assert!(!Technology::all().contains(&Technology::Unknown));
    }

    #[test]
    fn display_matches_name() {
        assert_eq!(Technology::Wifi.to_string(), "wifi");
    }
}
