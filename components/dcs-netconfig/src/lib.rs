/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

pub mod helper;
pub mod lease;
pub mod route;

pub use helper::{NetConfigBackup, NetConfigHelper};
pub use lease::parse_lease_file;
pub use route::{resolve_prefix_length, validate_dest_addr};
