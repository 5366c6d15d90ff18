/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

pub mod adapter;
pub mod conn;
pub mod driver;

pub use adapter::{WifiAdapter, WifiAdapterEvent};
pub use conn::WifiConn;
pub use driver::{ApRef, ConnectionEvent, ConnectionEventHandler, SecurityProtocol, WifiDriver};
