/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Logging initialisation. Every DCS component logs through the `log`
//! facade only; the host process calls `init()` exactly once, before
//! constructing a [`crate::DataChannelService`].

/// Install `env_logger` as the global logger. Safe to call more than once
/// per process; a second call is a logged no-op rather than a panic.
pub fn init() {
    if let Err(err) = env_logger::try_init() {
        log::debug!("logger already initialised: {err}");
    }
}
