/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use dcs_core::traits::Lease;
use dcs_core::OpState;

/// One record per known Ethernet interface. `link_up` and `ip_assigned`
/// are both driven by driver/PA notifications, never by the adapter's own
/// `start`/`stop` calls, which only synthesize the upstream event.
pub struct EthernetConn {
    pub interface: String,
    pub op_state: OpState,
    pub desired: bool,
    pub link_up: bool,
    pub lease: Option<Lease>,
}

impl EthernetConn {
    pub fn new(interface: String) -> Self {
        EthernetConn {
            interface,
            op_state: OpState::Down,
            desired: false,
            link_up: false,
            lease: None,
        }
    }

    pub fn ip_assigned(&self) -> bool {
        self.lease.is_some()
    }
}
