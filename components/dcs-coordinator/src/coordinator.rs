/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Default Connection Coordinator: walks a ranked technology list on
//! behalf of clients who just want "a" data connection, falling through to
//! the next-ranked technology when the current one can't be brought up,
//! and installing the default route and DNS once cellular succeeds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use dcs_core::config::{ConfigStore, Policy, TimeProtocol};
use dcs_core::handle::Arena;
use dcs_core::{Backoff, Error, EventKind, Result, Technology};
use dcs_netconfig::NetConfigHelper;
use dcs_registry::{Registry, SessionId};

use crate::ids::{CoordRequestMarker, CoordRequestRef};
use crate::ranked::RankedTechs;

/// Reserved session identity the coordinator uses for its own
/// registry-side `start`/`stop` calls, distinct from any real client's.
/// `SessionId::new` shifts its argument by one internally, so the raw
/// value picked here must stay clear of `u64::MAX` to avoid overflow.
fn coordinator_session() -> SessionId {
    SessionId::new(u64::MAX - 1)
}

const SETTLE_DELAY: Duration = Duration::from_secs(3);
const DNS_RETRY_DELAY: Duration = Duration::from_secs(30);

struct State {
    ranked: RankedTechs,
    current_tech: Technology,
    requests: Arena<(), CoordRequestMarker>,
    /// Set once `schedule_default_route_install` has actually installed a
    /// default gateway and/or DNS servers for the current technology, so
    /// the stop path knows whether there's anything to restore.
    netconfig_active: bool,
}

pub struct Inner<P: dcs_core::traits::PlatformAdapter + 'static> {
    registry: Arc<AsyncMutex<Registry>>,
    netconfig: Arc<NetConfigHelper<P>>,
    config: Arc<Mutex<Box<dyn ConfigStore>>>,
    state: Mutex<State>,
    retry: Mutex<Backoff>,
    generation: AtomicU64,
    channel_events_tx: UnboundedSender<(Technology, EventKind)>,
}

impl<P: dcs_core::traits::PlatformAdapter + 'static> Inner<P> {
    /// Best-effort time sanity check right after a default route install.
    /// Governed by `/time/protocol` + `/time/server`; never allowed to
    /// fail the connection attempt that triggered it.
    async fn sync_time(&self) {
        let (protocol, server) = {
            let config = self.config.lock().unwrap();
            let policy = Policy::new(&**config);
            (policy.time_protocol(), policy.time_server())
        };
        let (Some(protocol), Some(server)) = (protocol, server) else {
            return;
        };
        if let Err(err) = self.netconfig.sync_time(protocol, &server).await {
            warn!("time sync via {protocol:?} against {server} failed: {err}");
        }
    }
}

pub struct Coordinator<P: dcs_core::traits::PlatformAdapter + 'static> {
    inner: Arc<Inner<P>>,
}

impl<P: dcs_core::traits::PlatformAdapter + 'static> Clone for Coordinator<P> {
    fn clone(&self) -> Self {
        Coordinator { inner: self.inner.clone() }
    }
}

impl<P: dcs_core::traits::PlatformAdapter + 'static> Coordinator<P> {
    pub fn new(
        registry: Arc<AsyncMutex<Registry>>,
        netconfig: Arc<NetConfigHelper<P>>,
        config: Arc<Mutex<Box<dyn ConfigStore>>>,
    ) -> Self {
        let (channel_events_tx, mut channel_events_rx) = tokio::sync::mpsc::unbounded_channel();
        let coordinator = Coordinator {
            inner: Arc::new(Inner {
                registry,
                netconfig,
                config,
                state: Mutex::new(State {
                    ranked: RankedTechs::new(),
                    current_tech: Technology::Unknown,
                    requests: Arena::new(),
                    netconfig_active: false,
                }),
                retry: Mutex::new(Backoff::coordinator()),
                generation: AtomicU64::new(0),
                channel_events_tx,
            }),
        };

        let worker = coordinator.clone();
        tokio::spawn(async move {
            while let Some((tech, kind)) = channel_events_rx.recv().await {
                worker.on_channel_event(tech, kind).await;
            }
        });

        coordinator
    }

    pub fn set_rank(&self, tech: Technology, rank: u32) {
        self.inner.state.lock().unwrap().ranked.set_rank(tech, rank);
    }

    pub fn current_technology(&self) -> Technology {
        self.inner.state.lock().unwrap().current_tech
    }

    /// `request`: on the 0→1 transition, starts the top-ranked technology.
    pub async fn request(&self) -> CoordRequestRef {
        let (request_ref, should_start) = {
            let mut state = self.inner.state.lock().unwrap();
            let request_ref = state.requests.insert(());
            (request_ref, state.requests.len() == 1)
        };
        if should_start {
            let first = self.inner.state.lock().unwrap().ranked.get_first_used_technology();
            if let Some(tech) = first {
                self.try_start_tech_session(tech).await;
            }
        }
        request_ref
    }

    /// `release`: on the 1→0 transition, stops whatever is current.
    pub async fn release(&self, request_ref: CoordRequestRef) {
        let should_stop = {
            let mut state = self.inner.state.lock().unwrap();
            state.requests.remove(request_ref);
            state.requests.is_empty()
        };
        if should_stop {
            let current = self.inner.state.lock().unwrap().current_tech;
            if current != Technology::Unknown {
                self.try_stop_tech_session(current).await;
            }
        }
    }

    fn channel_name_for(&self, tech: Technology) -> Result<String> {
        let config = self.inner.config.lock().unwrap();
        let policy = Policy::new(&**config);
        match tech {
            Technology::Cellular => policy
                .cellular_profile_index()
                .map(|idx| idx.to_string())
                .ok_or_else(|| Error::unavailable("no cellular profile configured")),
            Technology::Wifi => policy.wifi_ssid().ok_or_else(|| Error::unavailable("no wifi ssid configured")),
            Technology::Ethernet | Technology::Unknown => Err(Error::unsupported("technology has no configured channel name")),
        }
    }

    /// Technology-specific preflight, then a registry `start`. On preflight
    /// failure (or a failed start), hands off to the fall-through handler.
    /// A successful cellular start's default-route/DNS install is triggered
    /// from the channel's own `Up` event (see `on_channel_event`), since
    /// that's the only point at which the channel is actually up rather
    /// than merely accepted by the registry.
    pub async fn try_start_tech_session(&self, tech: Technology) {
        let outcome = self.attempt_start(tech).await;
        match outcome {
            Ok(()) => {
                self.inner.state.lock().unwrap().current_tech = tech;
                self.inner.retry.lock().unwrap().reset();
            }
            Err(err) => {
                warn!("default connection: {tech} failed to start ({err}), falling through");
                self.on_fallthrough();
            }
        }
    }

    async fn attempt_start(&self, tech: Technology) -> Result<()> {
        if tech == Technology::Ethernet {
            let mut registry = self.inner.registry.lock().await;
            let names = registry.dispatcher().get_channel_list(Technology::Ethernet).await?;
            let name = names.first().ok_or_else(|| Error::unavailable("no ethernet interface available"))?.clone();
            let channel_ref = registry.get_reference(Technology::Ethernet, &name)?;
            let ref_count_before = registry.channel(channel_ref).map(|c| c.ref_count).unwrap_or(0);
            self.watch_channel(&mut registry, channel_ref, tech)?;
            registry.start(coordinator_session(), channel_ref)?;
            if ref_count_before > 0 {
                debug!("ethernet channel {name} already held by another registry client; reusing it");
            }
            return Ok(());
        }

        let name = self.channel_name_for(tech)?;
        let mut registry = self.inner.registry.lock().await;
        let channel_ref = registry.get_reference(tech, &name)?;
        let ref_count_before = registry.channel(channel_ref).map(|c| c.ref_count).unwrap_or(0);
        self.watch_channel(&mut registry, channel_ref, tech)?;
        registry.start(coordinator_session(), channel_ref)?;
        if ref_count_before > 0 {
            info!("default connection {tech} channel {name} is shared with other registry clients");
        }
        Ok(())
    }

    /// Subscribes to the channel's events so a later adapter-reported
    /// `Down` (retries exhausted out from under an already-started
    /// technology) reaches the fall-through handler too, not just an
    /// immediate preflight failure. Re-subscribing on every start is
    /// harmless: `add_event_handler` replaces this session's prior handler.
    fn watch_channel(&self, registry: &mut Registry, channel_ref: dcs_core::ChannelRef, tech: Technology) -> Result<()> {
        let tx = self.inner.channel_events_tx.clone();
        registry
            .add_event_handler(coordinator_session(), channel_ref, Arc::new(move |ev| {
                let _ = tx.send((tech, ev.kind));
            }))
            .map(|_| ())
    }

    /// Reacts to an event delivered on the coordinator's own subscription:
    /// a `Down` for the technology currently selected, while clients still
    /// want a connection, is exactly the "start attempt fails" signal the
    /// fall-through handler is meant to catch.
    async fn on_channel_event(&self, tech: Technology, kind: EventKind) {
        let (is_current, has_requests) = {
            let state = self.inner.state.lock().unwrap();
            (state.current_tech == tech, !state.requests.is_empty())
        };
        if !is_current || !has_requests {
            return;
        }
        match kind {
            EventKind::Down => {
                warn!("default connection: {tech} went down, falling through");
                let was_active = {
                    let mut state = self.inner.state.lock().unwrap();
                    state.current_tech = Technology::Unknown;
                    std::mem::replace(&mut state.netconfig_active, false)
                };
                if was_active {
                    self.restore_netconfig().await;
                }
                self.on_fallthrough();
            }
            EventKind::Up if tech == Technology::Cellular => self.schedule_default_route_install(),
            EventKind::Up | EventKind::TempDown => {}
        }
    }

    pub async fn try_stop_tech_session(&self, tech: Technology) {
        let name = match self.channel_name_for(tech) {
            Ok(name) => name,
            Err(_) => return,
        };
        {
            let mut registry = self.inner.registry.lock().await;
            let Ok(channel_ref) = registry.get_reference(tech, &name) else { return };
            if let Some(requests) = registry.channel(channel_ref).map(|c| c.start_request_refs.clone()) {
                for request_ref in requests {
                    let _ = registry.stop(coordinator_session(), request_ref);
                }
            }
        }
        let was_active = {
            let mut state = self.inner.state.lock().unwrap();
            state.current_tech = Technology::Unknown;
            std::mem::replace(&mut state.netconfig_active, false)
        };
        if was_active {
            self.restore_netconfig().await;
        }
    }

    /// Puts back whatever default gateway and DNS servers were in place
    /// before the coordinator's own install, per the backup/restore round
    /// trip: `backup_default_gw; set_default_gw(A); ...; restore_default_gw`
    /// restores the original default GW, and the matching DNS restore
    /// leaves resolv.conf exactly as it was. Best-effort: a failure here
    /// is logged and otherwise doesn't block the technology from stopping.
    async fn restore_netconfig(&self) {
        if let Err(err) = self.inner.netconfig.restore_default_gw().await {
            warn!("failed to restore original default gateway: {err}");
        }
        if let Err(err) = self.inner.netconfig.restore_dns().await {
            warn!("failed to restore original dns servers: {err}");
        }
    }

    /// The connection-status fall-through handler: arms a single retry
    /// timer (1s initial, doubled per fire, capped at 6h). On expiry it
    /// stops whatever is current and starts the next technology in rank
    /// order, wrapping to the first when the list is exhausted.
    fn on_fallthrough(&self) {
        let wait = match self.inner.retry.lock().unwrap().arm() {
            Ok(wait) => wait,
            Err(_) => return,
        };
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        let coordinator = Coordinator { inner: inner.clone() };
        tokio::spawn(async move {
            tokio::time::sleep_until(Instant::now() + wait).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let current = inner.state.lock().unwrap().current_tech;
            if current != Technology::Unknown {
                coordinator.try_stop_tech_session(current).await;
            }
            let next = {
                let state = inner.state.lock().unwrap();
                if current == Technology::Unknown {
                    state.ranked.get_first_used_technology()
                } else {
                    state.ranked.next_wrapping(current)
                }
            };
            if let Some(next) = next {
                coordinator.try_start_tech_session(next).await;
            }
        });
    }

    /// After a successful cellular start: settle, then install the
    /// default route (if policy allows) and DNS. A failed DNS install
    /// gets a single 30s re-attempt.
    fn schedule_default_route_install(&self) {
        let name = match self.channel_name_for(Technology::Cellular) {
            Ok(name) => name,
            Err(_) => return,
        };
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SETTLE_DELAY).await;
            let use_default_route = {
                let config = inner.config.lock().unwrap();
                Policy::new(&**config).use_default_route()
            };
            let channel_ref = {
                let mut registry = inner.registry.lock().await;
                match registry.get_reference(Technology::Cellular, &name) {
                    Ok(r) => r,
                    Err(err) => {
                        warn!("default route install: {err}");
                        return;
                    }
                }
            };

            let mut installed_something = false;

            if use_default_route {
                let already_active = inner.state.lock().unwrap().netconfig_active;
                if !already_active {
                    if let Err(err) = inner.netconfig.backup_default_gw().await {
                        warn!("failed to capture original default gateway, restore may be incomplete: {err}");
                    }
                }
                let route_installed = {
                    let registry = inner.registry.lock().await;
                    inner.netconfig.set_default_gw(&registry, channel_ref).await
                };
                match route_installed {
                    Ok(()) => {
                        installed_something = true;
                        inner.sync_time().await;
                    }
                    Err(err) => warn!("failed to install default route: {err}"),
                }
            }

            let install_dns = {
                let registry = inner.registry.lock().await;
                inner.netconfig.set_dns(&registry, channel_ref).await
            };
            match install_dns {
                Ok(()) => installed_something = true,
                Err(err) if !err.is_duplicate() => {
                    warn!("failed to install dns servers, retrying once in 30s: {err}");
                    let inner = inner.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(DNS_RETRY_DELAY).await;
                        let registry = inner.registry.lock().await;
                        match inner.netconfig.set_dns(&registry, channel_ref).await {
                            Ok(()) => inner.state.lock().unwrap().netconfig_active = true,
                            Err(err) => warn!("dns re-attempt also failed: {err}"),
                        }
                    });
                }
                Err(_) => {}
            }

            if installed_something {
                inner.state.lock().unwrap().netconfig_active = true;
            }
        });
    }
}
