/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use dcs_core::{Backoff, OpState};

/// Per-profile connection record. `desired` tracks whether the registry
/// has an active hold on this channel; the adapter has no visibility into
/// the registry's own refcount, so it keeps its own flag set on `start`
/// and cleared on `stop`.
pub struct CellularConn {
    pub profile_index: u32,
    pub op_state: OpState,
    pub desired: bool,
    pub retry: Backoff,
    pub retry_timer_armed: bool,
    pub generation: u64,
}

impl CellularConn {
    pub fn new(profile_index: u32) -> Self {
        CellularConn {
            profile_index,
            op_state: OpState::Down,
            desired: false,
            retry: Backoff::cellular(),
            retry_timer_armed: false,
            generation: 0,
        }
    }
}
