/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Ethernet driver contract: a cached interface enumeration and a link
//! up/down indication callback. Ethernet has no connect handshake of its
//! own -- the adapter's job is entirely about watching link carrier state
//! and kicking DHCP.

use dcs_core::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    Up(String),
    Down(String),
}

pub type LinkEventHandler = Box<dyn Fn(LinkEvent) + Send + Sync>;

pub trait EthernetDriver: Send + Sync {
    /// Enumerate the interfaces this driver manages. Expensive enough
    /// upstream that the adapter caches the result.
    fn get_channel_list(&self) -> Result<Vec<String>>;

    fn add_event_ind_handler(&self, handler: LinkEventHandler);
}
