/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Named handle aliases shared between the registry and every adapter, so
//! that `dcs-cellular`/`dcs-wifi`/`dcs-ethernet` don't need to depend on
//! `dcs-registry` just to talk about a `TechRef`.

use crate::handle::Handle;

pub enum ChannelMarker {}
pub enum RequestMarker {}
pub enum HandlerMarker {}
pub enum TechMarker {}

/// A stable reference to a ChannelDb, handed out by `get_reference`.
pub type ChannelRef = Handle<ChannelMarker>;

/// Consumed on `stop`; issued fresh on every successful `start`.
pub type RequestRef = Handle<RequestMarker>;

/// Identifies an event-handler subscription.
pub type HandlerRef = Handle<HandlerMarker>;

/// The ChannelDb's handle into a technology adapter's per-connection record.
/// The same opaque integer space is used on both sides of the
/// ChannelDb <-> per-tech-conn pair.
pub type TechRef = Handle<TechMarker>;
