/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use dcs_core::handle::Handle;

/// Distinct from `dcs_core::RequestRef`: the coordinator tracks its own
/// request count (clients asking "give me a default connection"),
/// independent of any one channel's registry-side `RequestRef`s.
pub enum CoordRequestMarker {}
pub type CoordRequestRef = Handle<CoordRequestMarker>;
