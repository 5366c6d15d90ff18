/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use dcs_core::traits::Lease;
use dcs_core::{Backoff, OpState};

use crate::driver::ApRef;

/// One record per known SSID. Only the currently `selected` record (see
/// adapter state) ever has a live `ap_ref`, `lease`, or a running retry timer.
pub struct WifiConn {
    pub ssid: String,
    pub op_state: OpState,
    pub desired: bool,
    pub ap_ref: Option<ApRef>,
    pub lease: Option<Lease>,
    pub connect_retry: Backoff,
    pub disconnect_retry: Backoff,
    pub generation: u64,
}

impl WifiConn {
    pub fn new(ssid: String) -> Self {
        WifiConn {
            ssid,
            op_state: OpState::Down,
            desired: false,
            ap_ref: None,
            lease: None,
            connect_retry: Backoff::wifi(),
            disconnect_retry: Backoff::wifi(),
            generation: 0,
        }
    }
}
