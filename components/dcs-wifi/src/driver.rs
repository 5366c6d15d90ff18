/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Wi-Fi driver contract: access-point enumeration, connect/disconnect,
//! scanning, and the connection-event callback the adapter registers at
//! startup.

use async_trait::async_trait;

use dcs_core::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ApRef(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityProtocol {
    Open,
    Psk,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    ScanDone,
    ScanFailed,
}

pub type ConnectionEventHandler = Box<dyn Fn(ConnectionEvent) + Send + Sync>;

#[async_trait]
pub trait WifiDriver: Send + Sync {
    /// Whether the underlying Wi-Fi radio/client is ready to be driven at
    /// all (antenna present, firmware loaded, not disabled by a hardware
    /// kill switch). Both connecting and scanning refuse when this is
    /// `false`.
    fn is_available(&self) -> bool;

    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    async fn scan(&self) -> Result<()>;

    fn get_first_access_point(&self) -> Option<ApRef>;

    fn get_next_access_point(&self, prev: ApRef) -> Option<ApRef>;

    fn get_ssid(&self, ap: ApRef) -> Result<String>;

    fn get_bssid(&self, ap: ApRef) -> Result<String>;

    fn get_signal_strength(&self, ap: ApRef) -> Result<i32>;

    fn load_ssid(&self, ssid: &str) -> Result<ApRef>;

    /// Loaded from the configuration store the way the rest of the core
    /// reads policy: `None` when no credentials are configured for this
    /// SSID (open network).
    fn load_credentials(&self, ssid: &str) -> Result<Option<(SecurityProtocol, String)>>;

    async fn connect(&self, ap: ApRef) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    fn get_current_connection(&self) -> Option<ApRef>;

    fn add_connection_event_handler(&self, handler: ConnectionEventHandler);

    fn configure_psk(&self, ssid: &str, protocol: SecurityProtocol, passphrase: &str) -> Result<()>;

    fn remove_ssid_security_configs(&self, ssid: &str) -> Result<()>;
}
