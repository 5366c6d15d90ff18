/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The internal command queue: a well-defined yield point so that a
//! Start/Stop issued synchronously from inside a callback doesn't unwind
//! through an adapter from within that same callback.

use dcs_core::ChannelRef;

#[derive(Clone, Copy, Debug)]
pub enum Command {
    Start(ChannelRef),
    Stop(ChannelRef),
    /// Kick off (or continue) a cross-technology scan; the aggregator
    /// itself tracks which technologies are still pending.
    ChannelQuery,
}
