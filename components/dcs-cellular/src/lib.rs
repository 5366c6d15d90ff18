/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The cellular technology adapter: per-profile session state, the
//! packet-switched registration gate, and the retry discipline that
//! collapses modem chatter into Up/Down/TempDown.

pub mod adapter;
pub mod conn;
pub mod driver;

pub use adapter::{CellularAdapter, TechEvent};
pub use conn::CellularConn;
pub use driver::{
    CellularDriver, ConState, NetRegRejectHandler, Profile, PsChangeHandler, PsRegState, RejectCause, SessionStateHandler,
};
