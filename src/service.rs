/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The process-wide event loop: one task owns the registry and drains its
//! internal command queue plus every adapter's event channel, matching
//! §5's "single event loop per process, cooperative" scheduling model.
//! Timers (the coordinator's retry/settle timers, the aggregator's scan
//! deadline) are the loop's only implicit suspension point; everything
//! else here runs to completion between `select!` polls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex as AsyncMutex;

use dcs_cellular::{CellularAdapter, CellularDriver};
use dcs_core::config::{purge_session_cleanup, ConfigStore};
use dcs_core::traits::PlatformAdapter;
use dcs_core::{ChannelRef, EventKind, Technology};
use dcs_coordinator::Coordinator;
use dcs_ethernet::{EthernetAdapter, EthernetDriver};
use dcs_netconfig::NetConfigHelper;
use dcs_registry::{Aggregator, Command, Dispatcher, QueryCallback, Registry};
use dcs_wifi::{WifiAdapter, WifiAdapterEvent, WifiDriver};

struct Inner<PA: PlatformAdapter + 'static> {
    registry: Arc<AsyncMutex<Registry>>,
    coordinator: Coordinator<PA>,
    netconfig: Arc<NetConfigHelper<PA>>,
    config: Arc<Mutex<Box<dyn ConfigStore>>>,
    aggregator: Mutex<Aggregator>,
    query_techs: Mutex<Option<Vec<Technology>>>,
    query_epoch: AtomicU64,
    commands_tx: UnboundedSender<Command>,
}

/// Owns the registry, the three technology adapters, the default
/// connection coordinator, and the channel-query aggregator, and drives
/// them from a single spawned task.
pub struct DataChannelService<PA: PlatformAdapter + 'static> {
    inner: Arc<Inner<PA>>,
}

impl<PA: PlatformAdapter + 'static> Clone for DataChannelService<PA> {
    fn clone(&self) -> Self {
        DataChannelService { inner: self.inner.clone() }
    }
}

impl<PA: PlatformAdapter + 'static> DataChannelService<PA> {
    /// Wires the three technology adapters onto the dispatcher, purges the
    /// `/sessionCleanup` subtree left by any crashed prior process (§6),
    /// and spawns the event loop. `wifi_interface` is the Wi-Fi driver's
    /// managed network interface name, needed by the adapter to report
    /// its operational interface once connected.
    pub fn new<CD, WD, ED>(
        cellular_driver: Arc<CD>,
        wifi_driver: Arc<WD>,
        wifi_interface: impl Into<String>,
        ethernet_driver: Arc<ED>,
        pa: Arc<PA>,
        mut config: Box<dyn ConfigStore>,
    ) -> Self
    where
        CD: CellularDriver + 'static,
        WD: WifiDriver + 'static,
        ED: EthernetDriver + 'static,
    {
        purge_session_cleanup(&mut *config);
        let config = Arc::new(Mutex::new(config));

        let (cellular_tx, mut cellular_rx) = tokio::sync::mpsc::unbounded_channel();
        let (wifi_tx, mut wifi_rx) = tokio::sync::mpsc::unbounded_channel();
        let (ethernet_tx, mut ethernet_rx) = tokio::sync::mpsc::unbounded_channel();

        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Technology::Cellular, CellularAdapter::new(cellular_driver, cellular_tx));
        dispatcher.register(Technology::Wifi, Arc::new(WifiAdapter::new(wifi_driver, pa.clone(), wifi_interface, wifi_tx)));
        dispatcher.register(Technology::Ethernet, Arc::new(EthernetAdapter::new(ethernet_driver, pa.clone(), ethernet_tx)));

        let (commands_tx, mut commands_rx) = tokio::sync::mpsc::unbounded_channel();
        let registry = Arc::new(AsyncMutex::new(Registry::new(dispatcher, commands_tx.clone())));
        let netconfig = Arc::new(NetConfigHelper::new(pa));
        let coordinator = Coordinator::new(registry.clone(), netconfig.clone(), config.clone());

        let service = DataChannelService {
            inner: Arc::new(Inner {
                registry,
                coordinator,
                netconfig,
                config,
                aggregator: Mutex::new(Aggregator::new()),
                query_techs: Mutex::new(None),
                query_epoch: AtomicU64::new(0),
                commands_tx,
            }),
        };

        let loop_inner = service.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    cmd = commands_rx.recv() => match cmd {
                        Some(cmd) => handle_command(&loop_inner, cmd).await,
                        None => break,
                    },
                    event = cellular_rx.recv() => match event {
                        Some((tech_ref, kind)) => {
                            loop_inner.registry.lock().await.on_tech_event(Technology::Cellular, tech_ref, kind);
                        }
                        None => break,
                    },
                    event = wifi_rx.recv() => match event {
                        Some(WifiAdapterEvent::Tech(tech_ref, kind)) => {
                            loop_inner.registry.lock().await.on_tech_event(Technology::Wifi, tech_ref, kind);
                        }
                        Some(WifiAdapterEvent::StaleSsid(ssid)) => purge_stale_ssid(&loop_inner, &ssid).await,
                        None => break,
                    },
                    event = ethernet_rx.recv() => match event {
                        Some((tech_ref, kind)) => {
                            loop_inner.registry.lock().await.on_tech_event(Technology::Ethernet, tech_ref, kind);
                        }
                        None => break,
                    },
                }
            }
        });

        service
    }

    pub fn coordinator(&self) -> &Coordinator<PA> {
        &self.inner.coordinator
    }

    pub fn registry(&self) -> Arc<AsyncMutex<Registry>> {
        self.inner.registry.clone()
    }

    pub fn netconfig(&self) -> Arc<NetConfigHelper<PA>> {
        self.inner.netconfig.clone()
    }

    /// Direct access to the configuration store behind a process-wide
    /// lock, for host code that needs to read or update policy values
    /// (e.g. `/wifi/SSID`) while the service is running.
    pub fn config(&self) -> Arc<Mutex<Box<dyn ConfigStore>>> {
        self.inner.config.clone()
    }

    /// `get_channels`: appends `callback` to the delivery list for the
    /// in-flight scan epoch, or starts a new one across `technologies`.
    pub fn query_channels(&self, technologies: Vec<Technology>, callback: QueryCallback) {
        let should_start = self.inner.aggregator.lock().unwrap().get_channels(&technologies, callback);
        if !should_start {
            return;
        }
        *self.inner.query_techs.lock().unwrap() = Some(technologies);
        let _ = self.inner.commands_tx.send(Command::ChannelQuery);
    }
}

async fn handle_command<PA: PlatformAdapter + 'static>(inner: &Arc<Inner<PA>>, cmd: Command) {
    match cmd {
        Command::Start(channel_ref) => start_channel(inner, channel_ref).await,
        Command::Stop(channel_ref) => stop_channel(inner, channel_ref).await,
        Command::ChannelQuery => start_query_epoch(inner),
    }
}

/// `start()` returning `Ok` only means the adapter *initiated* the
/// session -- the real `Up` arrives later through the adapter's own event
/// channel (cellular/Wi-Fi's driver callback, or Ethernet's own
/// synchronous `emit(Up)` inside `start()`). Only a hard `Err` is
/// translated into a `Down` here; success must not synthesize an `Up`, or
/// every start would deliver a premature `Up` ahead of the real one.
async fn start_channel<PA: PlatformAdapter + 'static>(inner: &Arc<Inner<PA>>, channel_ref: ChannelRef) {
    let Some((tech, tech_ref)) = inner.registry.lock().await.channel(channel_ref).map(|c| (c.tech, c.tech_ref)) else {
        return;
    };
    let result = {
        let registry = inner.registry.lock().await;
        registry.dispatcher().start(tech, tech_ref).await
    };
    if let Err(err) = result {
        warn!("{tech} channel start failed: {err}");
        inner.registry.lock().await.on_tech_event(tech, tech_ref, EventKind::Down);
    }
}

async fn stop_channel<PA: PlatformAdapter + 'static>(inner: &Arc<Inner<PA>>, channel_ref: ChannelRef) {
    let Some((tech, tech_ref)) = inner.registry.lock().await.channel(channel_ref).map(|c| (c.tech, c.tech_ref)) else {
        return;
    };
    let registry = inner.registry.lock().await;
    if let Err(err) = registry.dispatcher().stop(tech, tech_ref).await {
        warn!("{tech} channel stop failed, logging and continuing: {err}");
    }
}

/// Kicks each pending technology's `get_channel_list` concurrently and
/// arms the scan deadline (§4.8, §6). Cellular and (after its first call)
/// Ethernet resolve immediately; Wi-Fi resolves once the driver's scan
/// completes.
fn start_query_epoch<PA: PlatformAdapter + 'static>(inner: &Arc<Inner<PA>>) {
    let Some(technologies) = inner.query_techs.lock().unwrap().take() else {
        return;
    };
    let epoch = inner.query_epoch.fetch_add(1, Ordering::SeqCst) + 1;

    for tech in technologies.iter().copied() {
        let inner = inner.clone();
        tokio::spawn(async move {
            let names = {
                let registry = inner.registry.lock().await;
                registry.dispatcher().get_channel_list(tech).await
            }
            .unwrap_or_else(|err| {
                warn!("channel query: {tech} scan failed: {err}");
                Vec::new()
            });
            let done = inner.aggregator.lock().unwrap().on_tech_result(tech, names);
            if done {
                deliver_query(&inner);
            }
        });
    }

    let deadline = Aggregator::deadline(technologies.len());
    let inner = inner.clone();
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        if inner.query_epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        let still_pending = {
            let mut aggregator = inner.aggregator.lock().unwrap();
            let pending = aggregator.in_flight();
            if pending {
                aggregator.force_complete();
            }
            pending
        };
        if still_pending {
            deliver_query(&inner);
        }
    });
}

fn deliver_query<PA: PlatformAdapter + 'static>(inner: &Arc<Inner<PA>>) {
    let (results, callbacks) = inner.aggregator.lock().unwrap().deliver();
    for callback in callbacks {
        callback(results.clone());
    }
}

async fn purge_stale_ssid<PA: PlatformAdapter + 'static>(inner: &Arc<Inner<PA>>, ssid: &str) {
    let mut registry = inner.registry.lock().await;
    let stale = registry
        .channels_for(Technology::Wifi)
        .into_iter()
        .find(|&r| registry.channel(r).map(|c| c.name == ssid).unwrap_or(false));
    if let Some(channel_ref) = stale {
        registry.remove_idle_channel(channel_ref);
    }
}
