/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Wi-Fi technology adapter: a single `selected` connection at a time,
//! connect/disconnect retry discipline, and scan aggregation feeding the
//! channel-query aggregator.
//!
//! The adapter's mutable state lives behind `Arc<Inner<D>>` rather than
//! directly in `WifiAdapter`, so that a plain `&self` trait method can
//! still clone an owning handle and spawn a retry timer that outlives the
//! call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tokio::time::Instant;

use dcs_core::handle::Arena;
use dcs_core::ids::TechMarker;
use dcs_core::traits::PlatformAdapter;
use dcs_core::{Backoff, Error, EventKind, OpState, Result, TechRef};
use dcs_registry::TechAdapter;

use crate::conn::WifiConn;
use crate::driver::{ConnectionEvent, WifiDriver};

const SSID_NAME_LIMIT: usize = 32;
const ACTIVE_LIST_CAP: usize = 64;

/// Events the Wi-Fi adapter raises for the host to act on: ordinary
/// Up/Down/TempDown notifications routed straight into
/// `Registry::on_tech_event`, plus a side-channel naming SSIDs whose
/// ChannelDb should be purged now that a scan found them stale (the
/// registry call that does the deletion needs registry access the
/// adapter itself doesn't have).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WifiAdapterEvent {
    Tech(TechRef, EventKind),
    StaleSsid(String),
}

struct State {
    conns: Arena<WifiConn, TechMarker>,
    by_ssid: HashMap<String, TechRef>,
    selected: Option<TechRef>,
    has_started: bool,
    scanning: bool,
    disconnect_intent: bool,
    scan_waiters: Vec<oneshot::Sender<Vec<String>>>,
}

impl Default for State {
    fn default() -> Self {
        State {
            conns: Arena::new(),
            by_ssid: HashMap::new(),
            selected: None,
            has_started: false,
            scanning: false,
            disconnect_intent: false,
            scan_waiters: Vec::new(),
        }
    }
}

struct Inner<D: WifiDriver + 'static> {
    driver: Arc<D>,
    pa: Arc<dyn PlatformAdapter>,
    interface: String,
    state: Mutex<State>,
    events_tx: UnboundedSender<WifiAdapterEvent>,
}

pub struct WifiAdapter<D: WifiDriver + 'static> {
    inner: Arc<Inner<D>>,
}

impl<D: WifiDriver + 'static> WifiAdapter<D> {
    pub fn new(
        driver: Arc<D>,
        pa: Arc<dyn PlatformAdapter>,
        interface: impl Into<String>,
        events_tx: UnboundedSender<WifiAdapterEvent>,
    ) -> Self {
        let inner = Arc::new(Inner {
            driver,
            pa,
            interface: interface.into(),
            state: Mutex::new(State::default()),
            events_tx,
        });
        let handler_target = inner.clone();
        inner.driver.add_connection_event_handler(Box::new(move |event| {
            Inner::on_connection_event(&handler_target, event);
        }));
        WifiAdapter { inner }
    }
}

impl<D: WifiDriver + 'static> Inner<D> {
    fn emit_tech(&self, tech_ref: TechRef, kind: EventKind) {
        if self.events_tx.send(WifiAdapterEvent::Tech(tech_ref, kind)).is_err() {
            warn!("wifi adapter: event receiver gone, dropping {kind:?} for {tech_ref}");
        }
    }

    fn preflight(&self, tech_ref: TechRef, state: &State) -> Result<()> {
        if !self.driver.is_available() {
            return Err(Error::unsupported("wifi not available"));
        }
        if state.scanning {
            return Err(Error::not_permitted("wifi scan in progress"));
        }
        match state.selected {
            None => Ok(()),
            Some(sel) if sel == tech_ref => Err(Error::duplicate("already the selected wifi connection")),
            Some(_) => Err(Error::not_permitted("another wifi ssid is already selected")),
        }
    }

    fn on_connection_event(self: &Arc<Self>, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => self.on_connected(),
            ConnectionEvent::Disconnected => self.on_disconnected(),
            ConnectionEvent::ScanDone => self.on_scan_done(),
            ConnectionEvent::ScanFailed => self.on_scan_failed(),
        }
    }

    fn on_connected(self: &Arc<Self>) {
        let Some(tech_ref) = self.state.lock().unwrap().selected else {
            return;
        };
        let inner = self.clone();
        tokio::spawn(async move {
            match inner.pa.ask_for_ip_address(&inner.interface).await {
                Ok(lease) => {
                    {
                        let mut state = inner.state.lock().unwrap();
                        if let Some(conn) = state.conns.get_mut(tech_ref) {
                            conn.op_state = OpState::Up;
                            conn.lease = Some(lease);
                            conn.connect_retry.reset();
                            conn.disconnect_retry.reset();
                        }
                    }
                    info!("wifi {tech_ref} connected and leased an address");
                    inner.emit_tech(tech_ref, EventKind::Up);
                }
                Err(err) => {
                    warn!("wifi {tech_ref}: DHCP failed after connect, disconnecting to retry: {err}");
                    let _ = inner.driver.disconnect().await;
                    inner.schedule_connect_retry(tech_ref);
                }
            }
        });
    }

    fn on_disconnected(self: &Arc<Self>) {
        let (tech_ref, by_request, desired) = {
            let mut state = self.state.lock().unwrap();
            let Some(tech_ref) = state.selected else { return };
            let by_request = state.disconnect_intent;
            state.disconnect_intent = false;
            let desired = state.conns.get(tech_ref).map(|c| c.desired).unwrap_or(false);
            (tech_ref, by_request, desired)
        };

        if by_request {
            self.finish_disconnect(tech_ref);
            return;
        }

        if desired {
            debug!("wifi {tech_ref}: link lost, attempting a connect retry");
            self.schedule_connect_retry(tech_ref);
        } else {
            self.finish_disconnect(tech_ref);
        }
    }

    fn finish_disconnect(self: &Arc<Self>, tech_ref: TechRef) {
        let stop_client = {
            let mut state = self.state.lock().unwrap();
            if let Some(conn) = state.conns.get_mut(tech_ref) {
                conn.op_state = OpState::Down;
                conn.ap_ref = None;
                conn.lease = None;
            }
            if state.selected == Some(tech_ref) {
                state.selected = None;
            }
            let stop_client = state.has_started;
            state.has_started = false;
            stop_client
        };
        if stop_client {
            if let Err(err) = self.driver.stop() {
                warn!("wifi client stop failed: {err}");
            }
        }
        self.emit_tech(tech_ref, EventKind::Down);
    }

    fn schedule_connect_retry(self: &Arc<Self>, tech_ref: TechRef) {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            let Some(conn) = state.conns.get_mut(tech_ref) else { return };
            match conn.connect_retry.arm() {
                Ok(wait) => {
                    conn.op_state = OpState::TempDown;
                    conn.generation += 1;
                    Some((wait, conn.generation, conn.ap_ref))
                }
                Err(_) => None,
            }
        };
        match outcome {
            Some((wait, generation, ap_ref)) => {
                self.emit_tech(tech_ref, EventKind::TempDown);
                let inner = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep_until(Instant::now() + wait).await;
                    let still_current = {
                        let state = inner.state.lock().unwrap();
                        state.conns.get(tech_ref).map(|c| c.generation == generation).unwrap_or(false)
                    };
                    if !still_current {
                        return;
                    }
                    if let Some(ap_ref) = ap_ref {
                        let _ = inner.driver.connect(ap_ref).await;
                    }
                });
            }
            None => {
                warn!("wifi {tech_ref}: connect retries exhausted, giving up");
                self.reset_after_fault(tech_ref);
                self.emit_tech(tech_ref, EventKind::Down);
            }
        }
    }

    fn schedule_disconnect_retry(self: &Arc<Self>, tech_ref: TechRef) {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            let Some(conn) = state.conns.get_mut(tech_ref) else { return };
            match conn.disconnect_retry.arm() {
                Ok(wait) => {
                    conn.generation += 1;
                    Some((wait, conn.generation))
                }
                Err(_) => None,
            }
        };
        match outcome {
            Some((wait, generation)) => {
                let inner = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep_until(Instant::now() + wait).await;
                    let still_current = {
                        let state = inner.state.lock().unwrap();
                        state.conns.get(tech_ref).map(|c| c.generation == generation).unwrap_or(false)
                    };
                    if !still_current {
                        return;
                    }
                    if let Err(err) = inner.driver.disconnect().await {
                        debug!("wifi disconnect retry failed: {err}");
                        inner.schedule_disconnect_retry(tech_ref);
                    }
                });
            }
            None => {
                warn!("wifi {tech_ref}: disconnect retries exhausted, forcing Down");
                self.finish_disconnect(tech_ref);
            }
        }
    }

    fn reset_after_fault(&self, tech_ref: TechRef) {
        let mut state = self.state.lock().unwrap();
        if let Some(conn) = state.conns.get_mut(tech_ref) {
            conn.op_state = OpState::Down;
            conn.ap_ref = None;
            conn.lease = None;
        }
        if state.selected == Some(tech_ref) {
            state.selected = None;
        }
        state.has_started = false;
    }

    fn on_scan_done(self: &Arc<Self>) {
        let mut names = Vec::new();
        let mut ap = self.driver.get_first_access_point();
        while let Some(cur) = ap {
            if let Ok(ssid) = self.driver.get_ssid(cur) {
                if ssid.len() <= SSID_NAME_LIMIT && names.len() < ACTIVE_LIST_CAP {
                    names.push(ssid);
                }
            }
            ap = self.driver.get_next_access_point(cur);
        }

        let (waiters, stale) = {
            let mut state = self.state.lock().unwrap();
            state.scanning = false;
            let selected_ssid = state.selected.and_then(|r| state.conns.get(r)).map(|c| c.ssid.clone());
            let stale: Vec<String> = state
                .by_ssid
                .keys()
                .filter(|ssid| !names.contains(ssid) && Some((*ssid).clone()) != selected_ssid)
                .cloned()
                .collect();
            (std::mem::take(&mut state.scan_waiters), stale)
        };

        for ssid in stale {
            let _ = self.events_tx.send(WifiAdapterEvent::StaleSsid(ssid));
        }
        for tx in waiters {
            let _ = tx.send(names.clone());
        }
    }

    fn on_scan_failed(&self) {
        let waiters = {
            let mut state = self.state.lock().unwrap();
            state.scanning = false;
            std::mem::take(&mut state.scan_waiters)
        };
        for tx in waiters {
            let _ = tx.send(Vec::new());
        }
    }
}

#[async_trait]
impl<D: WifiDriver + 'static> TechAdapter for WifiAdapter<D> {
    fn create_tech_ref(&self, name: &str) -> Result<TechRef> {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(existing) = state.by_ssid.get(name) {
            return Ok(*existing);
        }
        let tech_ref = state.conns.insert(WifiConn::new(name.to_owned()));
        state.by_ssid.insert(name.to_owned(), tech_ref);
        Ok(tech_ref)
    }

    fn release_tech_ref(&self, tech_ref: TechRef) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(conn) = state.conns.remove(tech_ref) {
            state.by_ssid.remove(&conn.ssid);
        }
    }

    fn allow_channel_start(&self, tech_ref: TechRef) -> Result<()> {
        let state = self.inner.state.lock().unwrap();
        self.inner.preflight(tech_ref, &state)
    }

    fn get_op_state(&self, tech_ref: TechRef) -> (OpState, Option<String>) {
        let state = self.inner.state.lock().unwrap();
        match state.conns.get(tech_ref) {
            Some(conn) if conn.op_state == OpState::Up => (OpState::Up, Some(self.inner.interface.clone())),
            Some(conn) => (conn.op_state, None),
            None => (OpState::Down, None),
        }
    }

    async fn start(&self, tech_ref: TechRef) -> Result<()> {
        let ssid = {
            let state = self.inner.state.lock().unwrap();
            self.inner.preflight(tech_ref, &state)?;
            state
                .conns
                .get(tech_ref)
                .map(|c| c.ssid.clone())
                .ok_or_else(|| Error::not_found("no such wifi connection"))?
        };

        if let Some((protocol, passphrase)) = self.inner.driver.load_credentials(&ssid)? {
            self.inner.driver.configure_psk(&ssid, protocol, &passphrase)?;
        }

        {
            let mut state = self.inner.state.lock().unwrap();
            if !state.has_started {
                self.inner.driver.start()?;
                state.has_started = true;
            }
            state.disconnect_intent = false;
        }

        let ap_ref = self.inner.driver.load_ssid(&ssid)?;
        {
            let mut state = self.inner.state.lock().unwrap();
            let conn = state
                .conns
                .get_mut(tech_ref)
                .ok_or_else(|| Error::not_found("no such wifi connection"))?;
            conn.ap_ref = Some(ap_ref);
            conn.desired = true;
            conn.connect_retry = Backoff::wifi();
            conn.generation += 1;
            state.selected = Some(tech_ref);
        }

        match self.inner.driver.connect(ap_ref).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_duplicate() => Ok(()),
            Err(_) => {
                self.inner.schedule_connect_retry(tech_ref);
                Ok(())
            }
        }
    }

    async fn stop(&self, tech_ref: TechRef) -> Result<()> {
        {
            let state = self.inner.state.lock().unwrap();
            if state.selected != Some(tech_ref) {
                return Err(Error::not_permitted("not the selected wifi connection"));
            }
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(conn) = state.conns.get_mut(tech_ref) {
                conn.desired = false;
                conn.generation += 1;
            }
            state.disconnect_intent = true;
        }

        match self.inner.driver.disconnect().await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("wifi disconnect failed, scheduling a disconnect retry: {err}");
                self.inner.schedule_disconnect_retry(tech_ref);
                Ok(())
            }
        }
    }

    async fn retry_channel(&self, tech_ref: TechRef) -> Result<()> {
        let ap_ref = {
            let state = self.inner.state.lock().unwrap();
            state
                .conns
                .get(tech_ref)
                .and_then(|c| c.ap_ref)
                .ok_or_else(|| Error::not_found("no such wifi connection"))?
        };
        self.inner.driver.connect(ap_ref).await
    }

    fn get_net_interface(&self, tech_ref: TechRef) -> Option<String> {
        let state = self.inner.state.lock().unwrap();
        let conn = state.conns.get(tech_ref)?;
        (conn.op_state == OpState::Up).then(|| self.inner.interface.clone())
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
        let rx = {
            let mut state = self.inner.state.lock().unwrap();
            if state.scanning {
                return Err(Error::duplicate("wifi scan already in progress"));
            }
            state.scanning = true;
            let (tx, rx) = oneshot::channel();
            state.scan_waiters.push(tx);
            rx
        };
        self.inner.driver.scan().await?;
        rx.await.map_err(|_| Error::fault("wifi scan cancelled"))
    }
}
