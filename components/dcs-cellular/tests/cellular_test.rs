/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use dcs_cellular::{
    CellularAdapter, CellularDriver, ConState, NetRegRejectHandler, Profile, PsChangeHandler, PsRegState, SessionStateHandler,
};
use dcs_core::{EventKind, Error, Result};
use dcs_registry::TechAdapter;

#[derive(Default)]
struct FakeDriver {
    profiles: Mutex<HashMap<u32, Profile>>,
    ps_state: Mutex<PsRegState>,
    session_handlers: Mutex<Vec<SessionStateHandler>>,
    ps_handlers: Mutex<Vec<PsChangeHandler>>,
    reject_handlers: Mutex<Vec<NetRegRejectHandler>>,
    start_calls: AtomicU32,
}

impl FakeDriver {
    fn with_profile(index: u32) -> Arc<Self> {
        let driver = FakeDriver {
            ps_state: Mutex::new(PsRegState::Home),
            ..Default::default()
        };
        driver.profiles.lock().unwrap().insert(
            index,
            Profile {
                index,
                apn: "internet".into(),
            },
        );
        Arc::new(driver)
    }

    fn fire_session_state(&self, profile: u32, state: ConState) {
        for h in self.session_handlers.lock().unwrap().iter() {
            h(profile, state);
        }
    }

    fn fire_ps_change(&self, state: PsRegState) {
        for h in self.ps_handlers.lock().unwrap().iter() {
            h(state);
        }
    }
}

#[async_trait]
impl CellularDriver for FakeDriver {
    fn get_profile(&self, index: u32) -> Result<Profile> {
        self.profiles
            .lock()
            .unwrap()
            .get(&index)
            .cloned()
            .ok_or_else(|| Error::not_found("no such profile"))
    }
    fn get_profile_list(&self) -> Result<Vec<Profile>> {
        Ok(self.profiles.lock().unwrap().values().cloned().collect())
    }
    async fn start_session(&self, _profile: u32) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn stop_session(&self, _profile: u32) -> Result<()> {
        Ok(())
    }
    fn get_session_state(&self, _profile: u32) -> Result<ConState> {
        Ok(ConState::Disconnected)
    }
    fn get_interface_name(&self, _profile: u32) -> Result<String> {
        Ok("rmnet0".into())
    }
    fn get_apn(&self, _profile: u32) -> Result<String> {
        Ok("internet".into())
    }
    async fn set_default_apn(&self, _profile: u32) -> Result<()> {
        Ok(())
    }
    fn get_ipv4_gateway_address(&self, _profile: u32) -> Result<Option<String>> {
        Ok(Some("10.0.0.1".into()))
    }
    fn get_ipv6_gateway_address(&self, _profile: u32) -> Result<Option<String>> {
        Ok(None)
    }
    fn get_ipv4_dns_addresses(&self, _profile: u32) -> Result<(Option<String>, Option<String>)> {
        Ok((Some("8.8.8.8".into()), None))
    }
    fn get_ipv6_dns_addresses(&self, _profile: u32) -> Result<(Option<String>, Option<String>)> {
        Ok((None, None))
    }
    fn add_session_state_handler(&self, handler: SessionStateHandler) {
        self.session_handlers.lock().unwrap().push(handler);
    }
    fn get_packet_switched_state(&self) -> PsRegState {
        *self.ps_state.lock().unwrap()
    }
    fn add_packet_switched_change_handler(&self, handler: PsChangeHandler) {
        self.ps_handlers.lock().unwrap().push(handler);
    }
    fn add_net_reg_reject_handler(&self, handler: NetRegRejectHandler) {
        self.reject_handlers.lock().unwrap().push(handler);
    }
    fn get_radio_access_tech_in_use(&self) -> Result<String> {
        Ok("LTE".into())
    }
}

#[tokio::test]
async fn start_rejected_while_packet_switched_detached() {
    let driver = FakeDriver::with_profile(7);
    *driver.ps_state.lock().unwrap() = PsRegState::None;
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let adapter = CellularAdapter::new(driver, tx);

    let tech_ref = adapter.create_tech_ref("7").unwrap();
    let err = adapter.start(tech_ref).await.unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));
}

#[tokio::test(start_paused = true)]
async fn retry_exhausts_after_four_attempts_then_emits_down() {
    let driver = FakeDriver::with_profile(7);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let adapter = CellularAdapter::new(driver.clone(), tx);

    let tech_ref = adapter.create_tech_ref("7").unwrap();
    adapter.start(tech_ref).await.unwrap();
    assert_eq!(driver.start_calls.load(Ordering::SeqCst), 1);

    // First failure: arms the 1s retry and reports TempDown.
    driver.fire_session_state(7, ConState::Disconnected);
    assert_eq!(rx.recv().await.unwrap(), (tech_ref, EventKind::TempDown));

    // Retries at 1s, 2s, 4s, 8s; the fourth failure exhausts the counter.
    for wait_secs in [1u64, 2, 4, 8] {
        tokio::time::advance(Duration::from_secs(wait_secs) + Duration::from_millis(10)).await;
        tokio::task::yield_now().await;
        driver.fire_session_state(7, ConState::Disconnected);
        if wait_secs < 8 {
            assert_eq!(rx.recv().await.unwrap(), (tech_ref, EventKind::TempDown));
        } else {
            assert_eq!(rx.recv().await.unwrap(), (tech_ref, EventKind::Down));
        }
    }
}

#[tokio::test]
async fn connect_success_resets_retry_counter_to_one() {
    let driver = FakeDriver::with_profile(7);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let adapter = CellularAdapter::new(driver.clone(), tx);

    let tech_ref = adapter.create_tech_ref("7").unwrap();
    adapter.start(tech_ref).await.unwrap();
    driver.fire_session_state(7, ConState::Connected);
    assert_eq!(rx.recv().await.unwrap(), (tech_ref, EventKind::Up));
}

#[tokio::test]
async fn ps_detach_marks_held_channel_temp_down_and_reattach_retries() {
    let driver = FakeDriver::with_profile(7);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let adapter = CellularAdapter::new(driver.clone(), tx);

    let tech_ref = adapter.create_tech_ref("7").unwrap();
    adapter.start(tech_ref).await.unwrap();
    driver.fire_session_state(7, ConState::Connected);
    assert_eq!(rx.recv().await.unwrap(), (tech_ref, EventKind::Up));

    driver.fire_ps_change(PsRegState::None);
    assert_eq!(rx.recv().await.unwrap(), (tech_ref, EventKind::TempDown));

    let calls_before = driver.start_calls.load(Ordering::SeqCst);
    driver.fire_ps_change(PsRegState::Home);
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    assert!(driver.start_calls.load(Ordering::SeqCst) > calls_before);
}
