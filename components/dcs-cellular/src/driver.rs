/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The cellular modem driver contract: the imperative calls the adapter
//! issues, plus the handler-registration points the host wires at startup
//! so that driver callbacks reach the adapter's `on_*` event entry points.

use async_trait::async_trait;

use dcs_core::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConState {
    Connecting,
    Connected,
    Disconnected,
    Suspended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PsRegState {
    Home,
    Roaming,
    None,
}

impl PsRegState {
    pub fn is_attached(self) -> bool {
        matches!(self, PsRegState::Home | PsRegState::Roaming)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectCause {
    ImplicitDetach,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub index: u32,
    pub apn: String,
}

pub type SessionStateHandler = Box<dyn Fn(u32, ConState) + Send + Sync>;
pub type PsChangeHandler = Box<dyn Fn(PsRegState) + Send + Sync>;
pub type NetRegRejectHandler = Box<dyn Fn(RejectCause) + Send + Sync>;

#[async_trait]
pub trait CellularDriver: Send + Sync {
    fn get_profile(&self, index: u32) -> Result<Profile>;

    fn get_profile_list(&self) -> Result<Vec<Profile>>;

    async fn start_session(&self, profile: u32) -> Result<()>;

    async fn stop_session(&self, profile: u32) -> Result<()>;

    fn get_session_state(&self, profile: u32) -> Result<ConState>;

    fn get_interface_name(&self, profile: u32) -> Result<String>;

    fn get_apn(&self, profile: u32) -> Result<String>;

    async fn set_default_apn(&self, profile: u32) -> Result<()>;

    fn get_ipv4_gateway_address(&self, profile: u32) -> Result<Option<String>>;

    fn get_ipv6_gateway_address(&self, profile: u32) -> Result<Option<String>>;

    /// `(dns1, dns2)`.
    fn get_ipv4_dns_addresses(&self, profile: u32) -> Result<(Option<String>, Option<String>)>;

    /// `(dns1, dns2)`.
    fn get_ipv6_dns_addresses(&self, profile: u32) -> Result<(Option<String>, Option<String>)>;

    fn add_session_state_handler(&self, handler: SessionStateHandler);

    fn get_packet_switched_state(&self) -> PsRegState;

    fn add_packet_switched_change_handler(&self, handler: PsChangeHandler);

    fn add_net_reg_reject_handler(&self, handler: NetRegRejectHandler);

    fn get_radio_access_tech_in_use(&self) -> Result<String>;
}
