/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Ethernet technology adapter: start/stop only synthesize the
//! upstream event from cached link/IP state; the real work happens in
//! reaction to driver link events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, warn};

use dcs_core::handle::Arena;
use dcs_core::ids::TechMarker;
use dcs_core::traits::PlatformAdapter;
use dcs_core::{EventKind, Error, OpState, Result, TechRef};
use dcs_registry::TechAdapter;

use crate::conn::EthernetConn;
use crate::driver::{EthernetDriver, LinkEvent};

pub type TechEvent = (TechRef, EventKind);

struct State {
    conns: Arena<EthernetConn, TechMarker>,
    by_iface: HashMap<String, TechRef>,
    cached_list: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            conns: Arena::new(),
            by_iface: HashMap::new(),
            cached_list: Vec::new(),
        }
    }
}

struct Inner<D: EthernetDriver + 'static> {
    driver: Arc<D>,
    pa: Arc<dyn PlatformAdapter>,
    state: Mutex<State>,
    events_tx: tokio::sync::mpsc::UnboundedSender<TechEvent>,
}

pub struct EthernetAdapter<D: EthernetDriver + 'static> {
    inner: Arc<Inner<D>>,
}

impl<D: EthernetDriver + 'static> EthernetAdapter<D> {
    pub fn new(
        driver: Arc<D>,
        pa: Arc<dyn PlatformAdapter>,
        events_tx: tokio::sync::mpsc::UnboundedSender<TechEvent>,
    ) -> Self {
        let inner = Arc::new(Inner {
            driver,
            pa,
            state: Mutex::new(State::default()),
            events_tx,
        });
        let handler_target = inner.clone();
        inner.driver.add_event_ind_handler(Box::new(move |event| {
            Inner::on_link_event(&handler_target, event);
        }));
        EthernetAdapter { inner }
    }
}

impl<D: EthernetDriver + 'static> Inner<D> {
    fn emit(&self, tech_ref: TechRef, kind: EventKind) {
        if self.events_tx.send((tech_ref, kind)).is_err() {
            warn!("ethernet adapter: event receiver gone, dropping {kind:?} for {tech_ref}");
        }
    }

    fn tech_ref_for(&self, interface: &str) -> Option<TechRef> {
        self.state.lock().unwrap().by_iface.get(interface).copied()
    }

    fn on_link_event(self: &Arc<Self>, event: LinkEvent) {
        match event {
            LinkEvent::Up(interface) => self.on_link_up(interface),
            LinkEvent::Down(interface) => self.on_link_down(interface),
        }
    }

    fn on_link_up(self: &Arc<Self>, interface: String) {
        let Some(tech_ref) = self.tech_ref_for(&interface) else {
            return;
        };
        let needs_dhcp = {
            let mut state = self.state.lock().unwrap();
            let Some(conn) = state.conns.get_mut(tech_ref) else { return };
            conn.link_up = true;
            !conn.ip_assigned()
        };

        if !needs_dhcp {
            self.emit(tech_ref, EventKind::Up);
            return;
        }

        let inner = self.clone();
        tokio::spawn(async move {
            let _ = inner.pa.stop_dhcp(&interface).await;
            match inner.pa.ask_for_ip_address(&interface).await {
                Ok(lease) => {
                    {
                        let mut state = inner.state.lock().unwrap();
                        if let Some(conn) = state.conns.get_mut(tech_ref) {
                            conn.lease = Some(lease);
                            conn.op_state = OpState::Up;
                        }
                    }
                    inner.emit(tech_ref, EventKind::Up);
                }
                Err(err) => {
                    debug!("ethernet {interface}: DHCP failed: {err}");
                    let mut state = inner.state.lock().unwrap();
                    if let Some(conn) = state.conns.get_mut(tech_ref) {
                        conn.op_state = OpState::Down;
                    }
                    drop(state);
                    inner.emit(tech_ref, EventKind::Down);
                }
            }
        });
    }

    fn on_link_down(self: &Arc<Self>, interface: String) {
        let Some(tech_ref) = self.tech_ref_for(&interface) else {
            return;
        };
        {
            let mut state = self.state.lock().unwrap();
            if let Some(conn) = state.conns.get_mut(tech_ref) {
                conn.link_up = false;
                conn.lease = None;
                conn.op_state = OpState::Down;
            }
        }
        let inner = self.clone();
        tokio::spawn(async move {
            let _ = inner.pa.stop_dhcp(&interface).await;
        });
        self.emit(tech_ref, EventKind::Down);
    }
}

#[async_trait]
impl<D: EthernetDriver + 'static> TechAdapter for EthernetAdapter<D> {
    fn create_tech_ref(&self, name: &str) -> Result<TechRef> {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(existing) = state.by_iface.get(name) {
            return Ok(*existing);
        }
        let tech_ref = state.conns.insert(EthernetConn::new(name.to_owned()));
        state.by_iface.insert(name.to_owned(), tech_ref);
        Ok(tech_ref)
    }

    fn release_tech_ref(&self, tech_ref: TechRef) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(conn) = state.conns.remove(tech_ref) {
            state.by_iface.remove(&conn.interface);
        }
    }

    fn allow_channel_start(&self, tech_ref: TechRef) -> Result<()> {
        let state = self.inner.state.lock().unwrap();
        let conn = state.conns.get(tech_ref).ok_or_else(|| Error::not_found("no such ethernet interface"))?;
        if !conn.link_up {
            return Err(Error::unavailable("ethernet link is down"));
        }
        if !conn.ip_assigned() {
            return Err(Error::unavailable("ethernet interface has no ip address yet"));
        }
        Ok(())
    }

    fn get_op_state(&self, tech_ref: TechRef) -> (OpState, Option<String>) {
        let state = self.inner.state.lock().unwrap();
        match state.conns.get(tech_ref) {
            Some(conn) if conn.op_state == OpState::Up => (OpState::Up, Some(conn.interface.clone())),
            Some(conn) => (conn.op_state, None),
            None => (OpState::Down, None),
        }
    }

    async fn start(&self, tech_ref: TechRef) -> Result<()> {
        self.allow_channel_start(tech_ref)?;
        let mut state = self.inner.state.lock().unwrap();
        let conn = state.conns.get_mut(tech_ref).ok_or_else(|| Error::not_found("no such ethernet interface"))?;
        if conn.desired {
            return Err(Error::duplicate("ethernet interface already started"));
        }
        conn.desired = true;
        conn.op_state = OpState::Up;
        drop(state);
        self.inner.emit(tech_ref, EventKind::Up);
        Ok(())
    }

    async fn stop(&self, tech_ref: TechRef) -> Result<()> {
        {
            let mut state = self.inner.state.lock().unwrap();
            let conn = state.conns.get_mut(tech_ref).ok_or_else(|| Error::not_found("no such ethernet interface"))?;
            conn.desired = false;
            conn.op_state = OpState::Down;
        }
        self.inner.emit(tech_ref, EventKind::Down);
        Ok(())
    }

    async fn retry_channel(&self, tech_ref: TechRef) -> Result<()> {
        self.start(tech_ref).await
    }

    fn get_net_interface(&self, tech_ref: TechRef) -> Option<String> {
        let state = self.inner.state.lock().unwrap();
        let conn = state.conns.get(tech_ref)?;
        (conn.op_state == OpState::Up).then(|| conn.interface.clone())
    }

    fn get_default_gw_address(&self, tech_ref: TechRef) -> (Option<String>, Option<String>) {
        let state = self.inner.state.lock().unwrap();
        match state.conns.get(tech_ref).and_then(|c| c.lease.as_ref()) {
            Some(lease) => (lease.gateway_v4.clone(), lease.gateway_v6.clone()),
            None => (None, None),
        }
    }

    fn get_dns_addresses(&self, tech_ref: TechRef) -> (Vec<String>, Vec<String>) {
        let state = self.inner.state.lock().unwrap();
        match state.conns.get(tech_ref).and_then(|c| c.lease.as_ref()) {
            Some(lease) => (lease.dns_v4.clone(), lease.dns_v6.clone()),
            None => (Vec::new(), Vec::new()),
        }
    }

    async fn get_channel_list(&self) -> Result<Vec<String>> {
        let cached = self.inner.state.lock().unwrap().cached_list.clone();
        if !cached.is_empty() {
            return Ok(cached);
        }
        let fresh = self.inner.driver.get_channel_list()?;
        let mut state = self.inner.state.lock().unwrap();
        state.cached_list = fresh.clone();
        Ok(fresh)
    }
}
