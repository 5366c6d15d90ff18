/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The event/state vocabulary shared by the registry and every adapter:
//! the technology-reported `OpState`, the client-facing `AdminState`, and
//! the `EventKind` carried on a channel event.

/// The operational state a technology adapter reports for one of its
/// connection records. `TempDown` is a transient: a failure happened but a
/// retry is already scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpState {
    Up,
    Down,
    TempDown,
}

/// The admin state reported to clients: purely a function of
/// `ref_count > 0`, never touched directly by an adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminState {
    Up,
    Down,
}

impl AdminState {
    pub fn from_ref_count(ref_count: u32) -> Self {
        if ref_count > 0 {
            AdminState::Up
        } else {
            AdminState::Down
        }
    }
}

/// The kind of a channel event delivered to a subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Up,
    Down,
    TempDown,
}
