/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Platform Adapter trait: the narrow seam through which the
//! core reaches the raw system calls (DHCP, `/etc/resolv.conf`, kernel
//! routes, interface state, time-protocol queries). The concrete PA is an
//! external collaborator and out of scope; this trait is the contract the
//! core programs against.

use async_trait::async_trait;

use crate::error::Result;

/// A DHCP lease's routers and DNS servers, already capped at 1 gateway and
/// 2 DNS servers per address family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lease {
    pub gateway_v4: Option<String>,
    pub gateway_v6: Option<String>,
    pub dns_v4: Vec<String>,
    pub dns_v6: Vec<String>,
}

/// The system's current default route, as reported by the PA.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultGateway {
    pub v4: Option<String>,
    pub v6: Option<String>,
    pub interface_v4: Option<String>,
    pub interface_v6: Option<String>,
}

/// UTC time returned by a time-protocol query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStruct {
    pub unix_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOp {
    Add,
    Delete,
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Start DHCP on `interface`; resolves once a lease is obtained or DHCP fails.
    async fn ask_for_ip_address(&self, interface: &str) -> Result<Lease>;

    /// Idempotent DHCP teardown on `interface`.
    async fn stop_dhcp(&self, interface: &str) -> Result<()>;

    /// The PA-specific DHCP lease file path for `interface`. `Unsupported`
    /// is an allowed response.
    fn get_dhcp_lease_file_path(&self, interface: &str) -> Result<String>;

    async fn set_default_gateway(&self, interface: &str, addr: &str, is_v6: bool) -> Result<()>;

    async fn delete_default_gateway(&self) -> Result<()>;

    async fn get_default_gateway(&self) -> Result<DefaultGateway>;

    /// `prefix_length` of `None` means "host route" (the original's empty
    /// prefix-length string passed straight through to the platform call).
    async fn change_route(
        &self,
        op: RouteOp,
        dest: &str,
        prefix_length: Option<u8>,
        interface: &str,
    ) -> Result<()>;

    /// Install 0-2 DNS servers; returns which of (dns1, dns2) were actually
    /// added (the PA must deduplicate against what's already installed).
    async fn set_dns_name_servers(
        &self,
        dns1: Option<&str>,
        dns2: Option<&str>,
    ) -> Result<(bool, bool)>;

    async fn restore_initial_dns_name_servers(&self, backup: &[String]) -> Result<()>;

    /// `(v4_up, v6_up)`.
    async fn get_interface_state(&self, interface: &str) -> Result<(bool, bool)>;

    async fn get_time_with_time_protocol(&self, server: &str) -> Result<TimeStruct>;

    async fn get_time_with_network_time_protocol(&self, server: &str) -> Result<TimeStruct>;
}
