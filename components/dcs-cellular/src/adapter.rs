/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The cellular technology adapter: PS-registration gate, per-profile
//! connection records, and the retry discipline that collapses driver
//! chatter into the registry's Up/Down/TempDown vocabulary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use dcs_core::handle::Arena;
use dcs_core::ids::TechMarker;
use dcs_core::{Error, EventKind, OpState, Result, TechRef};
use dcs_registry::TechAdapter;

use crate::conn::CellularConn;
use crate::driver::{CellularDriver, ConState, PsRegState, RejectCause};

/// An event the adapter raises asynchronously (from a retry timer or a
/// driver callback) for the host to forward into
/// `Registry::on_tech_event`.
pub type TechEvent = (TechRef, EventKind);

pub struct CellularAdapter<D: CellularDriver + 'static> {
    driver: Arc<D>,
    conns: Arc<Mutex<Arena<CellularConn, TechMarker>>>,
    by_profile: Arc<Mutex<HashMap<u32, TechRef>>>,
    ps_state: Arc<Mutex<PsRegState>>,
    events_tx: UnboundedSender<TechEvent>,
}

impl<D: CellularDriver + 'static> CellularAdapter<D> {
    pub fn new(driver: Arc<D>, events_tx: UnboundedSender<TechEvent>) -> Arc<Self> {
        let ps_state = Arc::new(Mutex::new(driver.get_packet_switched_state()));
        let adapter = Arc::new(CellularAdapter {
            driver,
            conns: Arc::new(Mutex::new(Arena::new())),
            by_profile: Arc::new(Mutex::new(HashMap::new())),
            ps_state,
            events_tx,
        });
        adapter.wire_driver_handlers();
        adapter
    }

    fn wire_driver_handlers(self: &Arc<Self>) {
        let session = self.clone();
        self.driver.add_session_state_handler(Box::new(move |profile, state| {
            CellularAdapter::on_session_state(&session, profile, state);
        }));
        let ps = self.clone();
        self.driver.add_packet_switched_change_handler(Box::new(move |state| {
            ps.on_ps_change(state);
        }));
        let reject = self.clone();
        self.driver.add_net_reg_reject_handler(Box::new(move |cause| {
            reject.on_net_reg_reject(cause);
        }));
    }

    fn emit(&self, tech_ref: TechRef, kind: EventKind) {
        if self.events_tx.send((tech_ref, kind)).is_err() {
            warn!("cellular adapter: event receiver gone, dropping {kind:?} for {tech_ref}");
        }
    }

    /// Collapse a driver's raw connection state into the registry's
    /// vocabulary, applying the PS gate (a `Connected` report while PS is
    /// not attached is downgraded to `Disconnected`).
    fn collapse(&self, con_state: ConState, ps: PsRegState) -> Option<OpState> {
        match con_state {
            ConState::Connected if ps.is_attached() => Some(OpState::Up),
            ConState::Connected => Some(OpState::Down),
            ConState::Disconnected => Some(OpState::Down),
            ConState::Connecting | ConState::Suspended => None,
        }
    }

    fn on_session_state(self_: &Arc<Self>, profile: u32, con_state: ConState) {
        let tech_ref = {
            let by_profile = self_.by_profile.lock().unwrap();
            match by_profile.get(&profile) {
                Some(r) => *r,
                None => {
                    debug!("session state for unknown profile {profile}, ignoring");
                    return;
                }
            }
        };
        let ps = *self_.ps_state.lock().unwrap();
        let Some(new_state) = self_.collapse(con_state, ps) else {
            return;
        };

        match new_state {
            OpState::Up => self_.on_connected(tech_ref),
            OpState::Down => self_.on_failure(tech_ref),
            OpState::TempDown => unreachable!("collapse never yields TempDown"),
        }
    }

    fn on_connected(self: &Arc<Self>, tech_ref: TechRef) {
        let should_emit = {
            let mut conns = self.conns.lock().unwrap();
            let Some(conn) = conns.get_mut(tech_ref) else { return };
            let was_up = conn.op_state == OpState::Up;
            conn.op_state = OpState::Up;
            conn.retry_timer_armed = false;
            // Per the documented quirk, a success resets the counter to 1
            // rather than 0, so the first backoff after a success is
            // already doubled relative to a connection that never failed.
            conn.retry.reset_to(1);
            conn.generation += 1;
            !was_up
        };
        if should_emit {
            info!("cellular {tech_ref} connected");
            self.emit(tech_ref, EventKind::Up);
        }
    }

    /// The retry discipline: arm the backoff timer, or give up once
    /// attempts are exhausted.
    fn on_failure(self: &Arc<Self>, tech_ref: TechRef) {
        let outcome = {
            let mut conns = self.conns.lock().unwrap();
            let Some(conn) = conns.get_mut(tech_ref) else { return };
            if !conn.desired {
                return;
            }
            if conn.retry_timer_armed {
                debug!("cellular {tech_ref}: retry already scheduled, ignoring duplicate failure");
                return;
            }
            match conn.retry.arm() {
                Ok(wait) => {
                    conn.retry_timer_armed = true;
                    conn.op_state = OpState::TempDown;
                    conn.generation += 1;
                    Some((wait, conn.generation))
                }
                Err(Error::Overflow) => {
                    conn.retry_timer_armed = false;
                    conn.op_state = OpState::Down;
                    conn.generation += 1;
                    None
                }
                Err(_) => None,
            }
        };

        match outcome {
            Some((wait, generation)) => {
                warn!("cellular {tech_ref}: scheduling retry in {wait:?}");
                self.emit(tech_ref, EventKind::TempDown);
                self.spawn_retry_timer(tech_ref, wait, generation);
            }
            None => {
                warn!("cellular {tech_ref}: retries exhausted, giving up");
                self.emit(tech_ref, EventKind::Down);
            }
        }
    }

    fn spawn_retry_timer(self: &Arc<Self>, tech_ref: TechRef, wait: std::time::Duration, generation: u64) {
        let adapter = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(Instant::now() + wait).await;
            adapter.fire_retry(tech_ref, generation).await;
        });
    }

    async fn fire_retry(&self, tech_ref: TechRef, generation: u64) {
        let profile = {
            let mut conns = self.conns.lock().unwrap();
            let Some(conn) = conns.get_mut(tech_ref) else { return };
            if conn.generation != generation || !conn.desired {
                return;
            }
            // The timer has fired: it is no longer "running", so a fresh
            // failure from this retry attempt re-arms instead of being
            // swallowed as a duplicate.
            conn.retry_timer_armed = false;
            conn.profile_index
        };
        if let Err(err) = self.driver.start_session(profile).await {
            debug!("cellular retry start_session failed: {err}");
        }
    }

    fn on_ps_change(&self, new_ps: PsRegState) {
        let was_attached = {
            let mut ps_state = self.ps_state.lock().unwrap();
            let was = ps_state.is_attached();
            *ps_state = new_ps;
            was
        };
        let now_attached = new_ps.is_attached();
        if was_attached == now_attached {
            return;
        }

        let desired_conns: Vec<(TechRef, u32)> = {
            let conns = self.conns.lock().unwrap();
            conns
                .iter()
                .filter(|(_, c)| c.desired)
                .map(|(r, c)| (r, c.profile_index))
                .collect()
        };

        if now_attached {
            info!("cellular PS attached, retrying {} held channel(s)", desired_conns.len());
            for (tech_ref, profile) in desired_conns {
                let driver = self.driver.clone();
                tokio::spawn(async move {
                    let _ = driver.start_session(profile).await;
                });
                let _ = tech_ref;
            }
        } else {
            info!("cellular PS detached, marking {} held channel(s) TempDown", desired_conns.len());
            for (tech_ref, _) in desired_conns {
                {
                    let mut conns = self.conns.lock().unwrap();
                    if let Some(conn) = conns.get_mut(tech_ref) {
                        conn.op_state = OpState::TempDown;
                    }
                }
                self.emit(tech_ref, EventKind::TempDown);
            }
        }
    }

    fn on_net_reg_reject(&self, cause: RejectCause) {
        if cause != RejectCause::ImplicitDetach {
            return;
        }
        let active: Vec<u32> = {
            let conns = self.conns.lock().unwrap();
            conns
                .iter()
                .filter(|(_, c)| c.desired && c.op_state == OpState::Up)
                .map(|(_, c)| c.profile_index)
                .collect()
        };
        if active.is_empty() {
            return;
        }
        warn!("implicit detach with {} active cellular connection(s), re-starting", active.len());
        for profile in active {
            let driver = self.driver.clone();
            tokio::spawn(async move {
                let _ = driver.start_session(profile).await;
            });
        }
    }
}

#[async_trait]
impl<D: CellularDriver + 'static> TechAdapter for CellularAdapter<D> {
    fn create_tech_ref(&self, name: &str) -> Result<TechRef> {
        let profile_index: u32 = name
            .parse()
            .map_err(|_| Error::bad_parameter(format!("not a profile index: {name}")))?;
        if let Some(existing) = self.by_profile.lock().unwrap().get(&profile_index) {
            return Ok(*existing);
        }
        self.driver
            .get_profile(profile_index)
            .map_err(|_| Error::unavailable(format!("no such cellular profile: {profile_index}")))?;
        let tech_ref = self.conns.lock().unwrap().insert(CellularConn::new(profile_index));
        self.by_profile.lock().unwrap().insert(profile_index, tech_ref);
        Ok(tech_ref)
    }

    fn release_tech_ref(&self, tech_ref: TechRef) {
        let mut conns = self.conns.lock().unwrap();
        if let Some(conn) = conns.remove(tech_ref) {
            self.by_profile.lock().unwrap().remove(&conn.profile_index);
        }
    }

    fn allow_channel_start(&self, _tech_ref: TechRef) -> Result<()> {
        if self.ps_state.lock().unwrap().is_attached() {
            Ok(())
        } else {
            Err(Error::unavailable("packet-switched network not attached"))
        }
    }

    fn get_op_state(&self, tech_ref: TechRef) -> (OpState, Option<String>) {
        let conns = self.conns.lock().unwrap();
        match conns.get(tech_ref) {
            Some(conn) => {
                let iface = self.driver.get_interface_name(conn.profile_index).ok();
                (conn.op_state, iface)
            }
            None => (OpState::Down, None),
        }
    }

    async fn start(&self, tech_ref: TechRef) -> Result<()> {
        self.allow_channel_start(tech_ref)?;
        let profile = {
            let mut conns = self.conns.lock().unwrap();
            let conn = conns
                .get_mut(tech_ref)
                .ok_or_else(|| Error::not_found("no such cellular connection"))?;
            conn.desired = true;
            conn.profile_index
        };

        let apn = self.driver.get_apn(profile).unwrap_or_default();
        if apn.is_empty() {
            if let Err(err) = self.driver.set_default_apn(profile).await {
                warn!("set_default_apn({profile}) failed, continuing: {err}");
            }
        }

        match self.driver.start_session(profile).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_duplicate() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn stop(&self, tech_ref: TechRef) -> Result<()> {
        let profile = {
            let mut conns = self.conns.lock().unwrap();
            let conn = conns
                .get_mut(tech_ref)
                .ok_or_else(|| Error::not_found("no such cellular connection"))?;
            conn.desired = false;
            conn.retry_timer_armed = false;
            conn.generation += 1;
            conn.profile_index
        };
        self.driver.stop_session(profile).await
    }

    async fn retry_channel(&self, tech_ref: TechRef) -> Result<()> {
        let profile = {
            let conns = self.conns.lock().unwrap();
            conns
                .get(tech_ref)
                .map(|c| c.profile_index)
                .ok_or_else(|| Error::not_found("no such cellular connection"))?
        };
        self.driver.start_session(profile).await
    }

    fn get_net_interface(&self, tech_ref: TechRef) -> Option<String> {
        let profile = self.conns.lock().unwrap().get(tech_ref)?.profile_index;
        self.driver.get_interface_name(profile).ok()
    }

    fn get_default_gw_address(&self, tech_ref: TechRef) -> (Option<String>, Option<String>) {
        let Some(profile) = self.conns.lock().unwrap().get(tech_ref).map(|c| c.profile_index) else {
            return (None, None);
        };
        (
            self.driver.get_ipv4_gateway_address(profile).ok().flatten(),
            self.driver.get_ipv6_gateway_address(profile).ok().flatten(),
        )
    }

    fn get_dns_addresses(&self, tech_ref: TechRef) -> (Vec<String>, Vec<String>) {
        let Some(profile) = self.conns.lock().unwrap().get(tech_ref).map(|c| c.profile_index) else {
            return (Vec::new(), Vec::new());
        };
        let (v4a, v4b) = self.driver.get_ipv4_dns_addresses(profile).unwrap_or((None, None));
        let (v6a, v6b) = self.driver.get_ipv6_dns_addresses(profile).unwrap_or((None, None));
        (
            [v4a, v4b].into_iter().flatten().collect(),
            [v6a, v6b].into_iter().flatten().collect(),
        )
    }

    async fn get_channel_list(&self) -> Result<Vec<String>> {
        let profiles = self.driver.get_profile_list()?;
        Ok(profiles.into_iter().map(|p| p.index.to_string()).collect())
    }
}
