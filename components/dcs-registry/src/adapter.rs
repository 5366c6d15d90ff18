/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The adapter-side contract the Technology Dispatcher routes calls
//! through. Each of `dcs-cellular`, `dcs-wifi` and `dcs-ethernet`
//! implements this trait once for its own connection database; the
//! registry and dispatcher never know which technology they're talking to
//! beyond the `Technology` tag used to pick the right `Arc<dyn TechAdapter>`.
//!
//! Methods take `&self`: every concrete adapter guards its connection
//! database behind its own internal lock, the way
//! `AdapterManager::back_end` is an `Arc<MainLock<State>>` guarded
//! independently of the manager's own call sites.

use async_trait::async_trait;

use dcs_core::{OpState, Result, TechRef};

#[async_trait]
pub trait TechAdapter: Send + Sync {
    /// Find or create the per-connection record for `name`, returning its
    /// handle. Fails with `Unavailable` if the technology does not
    /// recognize `name`.
    fn create_tech_ref(&self, name: &str) -> Result<TechRef>;

    /// Called when a ChannelDb referencing `tech_ref` is deleted. Per-tech
    /// connection records otherwise live for the life of the process; this
    /// is a hook for bookkeeping, not deallocation.
    fn release_tech_ref(&self, tech_ref: TechRef);

    /// Early preflight check before a `start` is allowed to proceed.
    fn allow_channel_start(&self, tech_ref: TechRef) -> Result<()>;

    /// `(operational state, network interface name when up)`.
    fn get_op_state(&self, tech_ref: TechRef) -> (OpState, Option<String>);

    async fn start(&self, tech_ref: TechRef) -> Result<()>;

    async fn stop(&self, tech_ref: TechRef) -> Result<()>;

    /// Re-attempt a connection that was left down by a prior retry cycle.
    async fn retry_channel(&self, tech_ref: TechRef) -> Result<()>;

    fn get_net_interface(&self, tech_ref: TechRef) -> Option<String>;

    /// `(ipv4 gateway, ipv6 gateway)`.
    fn get_default_gw_address(&self, tech_ref: TechRef) -> (Option<String>, Option<String>);

    /// `(ipv4 dns servers, ipv6 dns servers)`.
    fn get_dns_addresses(&self, tech_ref: TechRef) -> (Vec<String>, Vec<String>);

    /// Scan for channels of this technology. Cellular and
    /// (after the first call) Ethernet resolve synchronously; Wi-Fi
    /// resolves once the driver's `ScanDone`/`ScanFailed` event arrives.
    async fn get_channel_list(&self) -> Result<Vec<String>>;
}
