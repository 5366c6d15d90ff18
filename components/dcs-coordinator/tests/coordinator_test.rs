/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dcs_core::config::{ConfigStore, InMemoryConfigStore};
use dcs_core::handle::Arena;
use dcs_core::ids::TechMarker;
use dcs_core::traits::{DefaultGateway, Lease, PlatformAdapter, RouteOp, TimeStruct};
use dcs_core::{Error, OpState, Result, TechRef, Technology};
use dcs_coordinator::Coordinator;
use dcs_netconfig::NetConfigHelper;
use dcs_registry::{Dispatcher, Registry, TechAdapter};

/// A `TechAdapter` whose `start` outcome is controlled per-call, so tests
/// can force preflight failures without a real driver.
struct FakeAdapter {
    names: Mutex<Arena<String, TechMarker>>,
    fail_start: Mutex<bool>,
    start_calls: AtomicU32,
}

impl FakeAdapter {
    fn new() -> Arc<Self> {
        Arc::new(FakeAdapter {
            names: Mutex::new(Arena::new()),
            fail_start: Mutex::new(false),
            start_calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl TechAdapter for FakeAdapter {
    fn create_tech_ref(&self, name: &str) -> Result<TechRef> {
        Ok(self.names.lock().unwrap().insert(name.to_owned()))
    }
    fn release_tech_ref(&self, _tech_ref: TechRef) {}
    fn allow_channel_start(&self, _tech_ref: TechRef) -> Result<()> {
        if *self.fail_start.lock().unwrap() {
            Err(Error::unavailable("forced failure"))
        } else {
            Ok(())
        }
    }
    fn get_op_state(&self, _tech_ref: TechRef) -> (OpState, Option<String>) {
        (OpState::Up, None)
    }
    async fn start(&self, _tech_ref: TechRef) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn stop(&self, _tech_ref: TechRef) -> Result<()> {
        Ok(())
    }
    async fn retry_channel(&self, _tech_ref: TechRef) -> Result<()> {
        Ok(())
    }
    fn get_net_interface(&self, _tech_ref: TechRef) -> Option<String> {
        None
    }
    fn get_default_gw_address(&self, _tech_ref: TechRef) -> (Option<String>, Option<String>) {
        (Some("10.0.0.1".to_string()), None)
    }
    fn get_dns_addresses(&self, _tech_ref: TechRef) -> (Vec<String>, Vec<String>) {
        (vec!["10.0.0.2".to_string()], vec![])
    }
    async fn get_channel_list(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }
}

struct FakePlatformAdapter {
    gw_calls: AtomicU32,
    delete_gw_calls: AtomicU32,
    restored_dns: Mutex<Vec<Vec<String>>>,
}

impl FakePlatformAdapter {
    fn new() -> Arc<Self> {
        Arc::new(FakePlatformAdapter {
            gw_calls: AtomicU32::new(0),
            delete_gw_calls: AtomicU32::new(0),
            restored_dns: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PlatformAdapter for FakePlatformAdapter {
    async fn ask_for_ip_address(&self, _interface: &str) -> Result<Lease> {
        Err(Error::unsupported("not needed in tests"))
    }
    async fn stop_dhcp(&self, _interface: &str) -> Result<()> {
        Ok(())
    }
    fn get_dhcp_lease_file_path(&self, _interface: &str) -> Result<String> {
        Err(Error::unsupported("no lease file in tests"))
    }
    async fn set_default_gateway(&self, _interface: &str, _addr: &str, _is_v6: bool) -> Result<()> {
        self.gw_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn delete_default_gateway(&self) -> Result<()> {
        self.delete_gw_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn get_default_gateway(&self) -> Result<DefaultGateway> {
        Ok(DefaultGateway {
            v4: Some("192.168.1.1".to_string()),
            v6: None,
            interface_v4: Some("eth0".to_string()),
            interface_v6: None,
        })
    }
    async fn change_route(&self, _op: RouteOp, _dest: &str, _prefix_length: Option<u8>, _interface: &str) -> Result<()> {
        Ok(())
    }
    async fn set_dns_name_servers(&self, _dns1: Option<&str>, _dns2: Option<&str>) -> Result<(bool, bool)> {
        Ok((true, false))
    }
    async fn restore_initial_dns_name_servers(&self, backup: &[String]) -> Result<()> {
        self.restored_dns.lock().unwrap().push(backup.to_vec());
        Ok(())
    }
    async fn get_interface_state(&self, _interface: &str) -> Result<(bool, bool)> {
        Ok((true, false))
    }
    async fn get_time_with_time_protocol(&self, _server: &str) -> Result<TimeStruct> {
        Err(Error::unsupported("not needed in tests"))
    }
    async fn get_time_with_network_time_protocol(&self, _server: &str) -> Result<TimeStruct> {
        Err(Error::unsupported("not needed in tests"))
    }
}

fn new_coordinator(
    cellular: Arc<FakeAdapter>,
    wifi: Arc<FakeAdapter>,
) -> (Coordinator<FakePlatformAdapter>, Arc<FakePlatformAdapter>) {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Technology::Cellular, cellular);
    dispatcher.register(Technology::Wifi, wifi);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let registry = Arc::new(tokio::sync::Mutex::new(Registry::new(dispatcher, tx)));

    // Mimic the root event loop: drain Start/Stop commands and drive the
    // dispatcher, feeding the result back as a tech event.
    let driver_registry = registry.clone();
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                dcs_registry::Command::Start(channel_ref) => {
                    let mut registry = driver_registry.lock().await;
                    let Some(db) = registry.channel(channel_ref) else { continue };
                    let (tech, tech_ref) = (db.tech, db.tech_ref);
                    let result = registry.dispatcher().start(tech, tech_ref).await;
                    let kind = if result.is_ok() { dcs_core::EventKind::Up } else { dcs_core::EventKind::Down };
                    registry.on_tech_event(tech, tech_ref, kind);
                }
                dcs_registry::Command::Stop(channel_ref) => {
                    let mut registry = driver_registry.lock().await;
                    let Some(db) = registry.channel(channel_ref) else { continue };
                    let (tech, tech_ref) = (db.tech, db.tech_ref);
                    let _ = registry.dispatcher().stop(tech, tech_ref).await;
                }
                dcs_registry::Command::ChannelQuery => {}
            }
        }
    });

    let mut config = InMemoryConfigStore::new();
    config.set("cellular", "profileIndex", "0");
    config.set("wifi", "SSID", "home-network");
    let config: Box<dyn ConfigStore> = Box::new(config);
    let config = Arc::new(Mutex::new(config));

    let pa = FakePlatformAdapter::new();
    let netconfig = Arc::new(NetConfigHelper::new(pa.clone()));

    let coordinator = Coordinator::new(registry, netconfig, config);
    coordinator.set_rank(Technology::Cellular, 1);
    coordinator.set_rank(Technology::Wifi, 2);
    (coordinator, pa)
}

/// Gives the background command-drain task and the coordinator's own
/// channel-event worker enough scheduling turns to fully react to
/// whatever was just queued.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn request_starts_top_ranked_technology() {
    let cellular = FakeAdapter::new();
    let wifi = FakeAdapter::new();
    let (coordinator, _pa) = new_coordinator(cellular.clone(), wifi.clone());

    let _req = coordinator.request().await;
    // Let the background command-drain task process Start.
    settle().await;

    assert_eq!(coordinator.current_technology(), Technology::Cellular);
    assert_eq!(cellular.start_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn preflight_failure_falls_through_to_next_technology() {
    let cellular = FakeAdapter::new();
    *cellular.fail_start.lock().unwrap() = true;
    let wifi = FakeAdapter::new();
    let (coordinator, _pa) = new_coordinator(cellular.clone(), wifi.clone());

    let _req = coordinator.request().await;
    settle().await;

    assert_eq!(coordinator.current_technology(), Technology::Unknown);
    assert_eq!(cellular.start_calls.load(Ordering::SeqCst), 0);

    tokio::time::pause();
    tokio::time::advance(std::time::Duration::from_secs(2)).await;
    settle().await;

    assert_eq!(coordinator.current_technology(), Technology::Wifi);
    assert_eq!(wifi.start_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn release_stops_current_technology() {
    let cellular = FakeAdapter::new();
    let wifi = FakeAdapter::new();
    let (coordinator, _pa) = new_coordinator(cellular.clone(), wifi.clone());

    let req = coordinator.request().await;
    settle().await;
    assert_eq!(coordinator.current_technology(), Technology::Cellular);

    coordinator.release(req).await;
    assert_eq!(coordinator.current_technology(), Technology::Unknown);
}

#[tokio::test]
async fn successful_cellular_start_installs_default_route() {
    let cellular = FakeAdapter::new();
    let wifi = FakeAdapter::new();
    let (coordinator, pa) = new_coordinator(cellular.clone(), wifi.clone());

    tokio::time::pause();
    let _req = coordinator.request().await;
    settle().await;
    assert_eq!(coordinator.current_technology(), Technology::Cellular);

    tokio::time::advance(std::time::Duration::from_secs(4)).await;
    settle().await;

    assert_eq!(pa.gw_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn release_restores_original_default_gw_and_dns() {
    let cellular = FakeAdapter::new();
    let wifi = FakeAdapter::new();
    let (coordinator, pa) = new_coordinator(cellular.clone(), wifi.clone());

    tokio::time::pause();
    let req = coordinator.request().await;
    settle().await;
    tokio::time::advance(std::time::Duration::from_secs(4)).await;
    settle().await;

    // Default route and DNS installed once, backing up the original gw.
    assert_eq!(pa.gw_calls.load(Ordering::SeqCst), 1);
    assert_eq!(pa.delete_gw_calls.load(Ordering::SeqCst), 1);
    assert!(pa.restored_dns.lock().unwrap().is_empty());

    coordinator.release(req).await;
    settle().await;

    // Releasing the last request restores the pre-existing default gw
    // (captured by backup_default_gw before the first install) and DNS.
    assert_eq!(coordinator.current_technology(), Technology::Unknown);
    assert_eq!(pa.gw_calls.load(Ordering::SeqCst), 2);
    assert_eq!(pa.delete_gw_calls.load(Ordering::SeqCst), 2);
    assert_eq!(pa.restored_dns.lock().unwrap().as_slice(), &[vec!["10.0.0.2".to_string()]]);
}
