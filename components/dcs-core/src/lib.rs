/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Shared vocabulary for the Data Channel Service: technology tags, opaque
//! handles, error kinds, the configuration store, the external platform and
//! driver traits, and the backoff helper used by every retrying component.

pub mod backoff;
pub mod config;
pub mod error;
pub mod handle;
pub mod ids;
pub mod state;
pub mod tech;
pub mod traits;

pub use backoff::Backoff;
pub use error::{Error, Result};
pub use ids::{ChannelRef, HandlerRef, RequestRef, TechRef};
pub use state::{AdminState, EventKind, OpState};
pub use tech::Technology;
