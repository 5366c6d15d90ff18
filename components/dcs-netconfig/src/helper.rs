/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Network Config Helper: the only component that holds a
//! `NetConfigBackup`, and the sole writer of the system default route,
//! DNS servers, and static routes.

use std::sync::{Arc, Mutex};

use log::{debug, info};

use dcs_core::config::TimeProtocol;
use dcs_core::traits::{PlatformAdapter, RouteOp, TimeStruct};
use dcs_core::{ChannelRef, Error, Result};
use dcs_registry::Registry;

use crate::lease::parse_lease_file;
use crate::route::{resolve_prefix_length, validate_dest_addr};

/// A snapshot of whatever the system's default route and DNS servers were
/// before the core started touching them, so they can be put back when
/// the last channel relying on them goes away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetConfigBackup {
    pub gw_v4: Option<String>,
    pub gw_v6: Option<String>,
    pub iface_v4: Option<String>,
    pub iface_v6: Option<String>,
    pub dns: Vec<String>,
}

impl NetConfigBackup {
    pub fn is_empty(&self) -> bool {
        self.gw_v4.is_none() && self.gw_v6.is_none()
    }
}

pub struct NetConfigHelper<P: PlatformAdapter + 'static> {
    pa: Arc<P>,
    backup: Mutex<NetConfigBackup>,
}

impl<P: PlatformAdapter + 'static> NetConfigHelper<P> {
    pub fn new(pa: Arc<P>) -> Self {
        NetConfigHelper { pa, backup: Mutex::new(NetConfigBackup::default()) }
    }

    pub fn backup(&self) -> NetConfigBackup {
        self.backup.lock().unwrap().clone()
    }

    pub async fn backup_default_gw(&self) -> Result<()> {
        let current = self.pa.get_default_gateway().await?;
        let mut backup = self.backup.lock().unwrap();
        backup.gw_v4 = current.v4;
        backup.gw_v6 = current.v6;
        backup.iface_v4 = current.interface_v4;
        backup.iface_v6 = current.interface_v6;
        Ok(())
    }

    fn resolve_channel(&self, registry: &Registry, channel_ref: ChannelRef) -> Result<(String, Option<String>, Option<String>)> {
        let channel = registry
            .channel(channel_ref)
            .ok_or_else(|| Error::not_found(format!("no such channel ({channel_ref})")))?;
        let interface = registry
            .dispatcher()
            .get_net_interface(channel.tech, channel.tech_ref)?
            .ok_or_else(|| Error::unavailable("channel has no network interface yet"))?;
        let (gw_v4, gw_v6) = registry.dispatcher().get_default_gw_address(channel.tech, channel.tech_ref)?;
        Ok((interface, gw_v4, gw_v6))
    }

    /// Installs v6 before v4; succeeds if at least one family installs
    /// cleanly.
    pub async fn set_default_gw(&self, registry: &Registry, channel_ref: ChannelRef) -> Result<()> {
        let (interface, gw_v4, gw_v6) = self.resolve_channel(registry, channel_ref)?;
        self.pa.delete_default_gateway().await?;

        let mut installed = false;
        if let Some(addr) = &gw_v6 {
            match self.pa.set_default_gateway(&interface, addr, true).await {
                Ok(()) => installed = true,
                Err(err) => debug!("default gw v6 install failed on {interface}: {err}"),
            }
        }
        if let Some(addr) = &gw_v4 {
            match self.pa.set_default_gateway(&interface, addr, false).await {
                Ok(()) => installed = true,
                Err(err) => debug!("default gw v4 install failed on {interface}: {err}"),
            }
        }

        if !installed {
            return Err(Error::unavailable("no default gateway address available to install"));
        }
        info!("installed default gateway on {interface} (v4={gw_v4:?} v6={gw_v6:?})");
        Ok(())
    }

    pub async fn restore_default_gw(&self) -> Result<()> {
        self.pa.delete_default_gateway().await?;
        let backup = self.backup.lock().unwrap().clone();
        if backup.is_empty() {
            return Ok(());
        }
        if let (Some(addr), Some(iface)) = (&backup.gw_v6, &backup.iface_v6) {
            let _ = self.pa.set_default_gateway(iface, addr, true).await;
        }
        if let (Some(addr), Some(iface)) = (&backup.gw_v4, &backup.iface_v4) {
            let _ = self.pa.set_default_gateway(iface, addr, false).await;
        }
        *self.backup.lock().unwrap() = NetConfigBackup::default();
        Ok(())
    }

    pub async fn set_dns(&self, registry: &Registry, channel_ref: ChannelRef) -> Result<()> {
        let channel = registry
            .channel(channel_ref)
            .ok_or_else(|| Error::not_found(format!("no such channel ({channel_ref})")))?;
        let (dns_v4, dns_v6) = registry.dispatcher().get_dns_addresses(channel.tech, channel.tech_ref)?;
        let mut candidates = dns_v4.into_iter().chain(dns_v6);
        let dns1 = candidates.next();
        let dns2 = candidates.next();

        let (added1, added2) = self.pa.set_dns_name_servers(dns1.as_deref(), dns2.as_deref()).await?;
        if !added1 && !added2 {
            return Err(Error::duplicate("dns servers already installed"));
        }
        let mut backup = self.backup.lock().unwrap();
        if added1 {
            if let Some(addr) = &dns1 {
                backup.dns.push(addr.clone());
            }
        }
        if added2 {
            if let Some(addr) = &dns2 {
                backup.dns.push(addr.clone());
            }
        }
        Ok(())
    }

    pub async fn restore_dns(&self) -> Result<()> {
        let installed = std::mem::take(&mut self.backup.lock().unwrap().dns);
        self.pa.restore_initial_dns_name_servers(&installed).await
    }

    pub async fn change_route(
        &self,
        registry: &Registry,
        channel_ref: ChannelRef,
        dest_addr: &str,
        prefix_or_mask: &str,
        add: bool,
    ) -> Result<()> {
        let channel = registry
            .channel(channel_ref)
            .ok_or_else(|| Error::not_found(format!("no such channel ({channel_ref})")))?;
        let interface = registry
            .dispatcher()
            .get_net_interface(channel.tech, channel.tech_ref)?
            .ok_or_else(|| Error::unavailable("channel has no network interface yet"))?;

        let dest = validate_dest_addr(dest_addr)?;
        let is_v6 = dest.is_ipv6();
        let prefix_length = resolve_prefix_length(prefix_or_mask, is_v6)?;

        let op = if add { RouteOp::Add } else { RouteOp::Delete };
        self.pa.change_route(op, dest_addr, prefix_length, &interface).await
    }

    pub async fn get_net_intf_state(&self, interface: &str) -> Result<bool> {
        let (v4_up, v6_up) = self.pa.get_interface_state(interface).await?;
        Ok(v4_up || v6_up)
    }

    /// Sanity-checks system time against `server` using whichever protocol
    /// `/time/protocol` names. Callers treat this as best-effort: a failure
    /// here must never fail the connection attempt that triggered it.
    pub async fn sync_time(&self, protocol: TimeProtocol, server: &str) -> Result<TimeStruct> {
        match protocol {
            TimeProtocol::Time => self.pa.get_time_with_time_protocol(server).await,
            TimeProtocol::Ntp => self.pa.get_time_with_network_time_protocol(server).await,
        }
    }

    /// Reads and parses the DHCP lease file for `interface` via the
    /// platform adapter's lease-file path. `Unsupported` from the PA
    /// propagates as-is.
    pub async fn read_lease(&self, interface: &str) -> Result<dcs_core::traits::Lease> {
        let path = self.pa.get_dhcp_lease_file_path(interface)?;
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| Error::fault(format!("reading lease file {path}: {err}")))?;
        Ok(parse_lease_file(&contents))
    }
}
