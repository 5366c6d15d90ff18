/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Channel Registry, Technology Dispatcher and Channel-Query Aggregator:
//! the catalogue of known channels, per-client start-request tracking,
//! per-client event subscription, and the rule that the underlying
//! technology link is brought up on the first request and torn down on the
//! last release.
//!
//! Grounded on `foxbox_taxonomy::adapters::manager::AdapterManager`: a
//! central registry that adapters register themselves with, guarded by a
//! lock held only for the duration of each method, with a companion
//! watcher/event-handler list per registered entity.

pub mod adapter;
pub mod aggregator;
pub mod channel_db;
pub mod command;
pub mod dispatcher;
pub mod registry;
pub mod session;

pub use adapter::TechAdapter;
pub use aggregator::{Aggregator, QueryCallback};
pub use channel_db::{ChannelDb, ChannelEvent};
pub use command::Command;
pub use dispatcher::Dispatcher;
pub use registry::{EventCallback, Registry};
pub use session::SessionId;
