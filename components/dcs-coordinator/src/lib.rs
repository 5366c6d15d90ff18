/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

pub mod coordinator;
pub mod ids;
pub mod ranked;

pub use coordinator::Coordinator;
pub use ids::CoordRequestRef;
pub use ranked::RankedTechs;
