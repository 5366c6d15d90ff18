/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! End-to-end registry scenarios against a fake adapter: a shared cellular
//! channel held by two sessions, and session close releasing only the
//! requests that session itself holds.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dcs_core::handle::Arena;
use dcs_core::ids::TechMarker;
use dcs_core::{Error, OpState, Result, TechRef, Technology};
use dcs_registry::{ChannelEvent, Dispatcher, Registry, SessionId, TechAdapter};

struct FakeCellular {
    names: Mutex<Arena<String, TechMarker>>,
    op_state: Mutex<OpState>,
    start_calls: AtomicU32,
    stop_calls: AtomicU32,
}

impl FakeCellular {
    fn new() -> Self {
        FakeCellular {
            names: Mutex::new(Arena::new()),
            op_state: Mutex::new(OpState::Down),
            start_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TechAdapter for FakeCellular {
    fn create_tech_ref(&self, name: &str) -> Result<TechRef> {
        Ok(self.names.lock().unwrap().insert(name.to_owned()))
    }
    fn release_tech_ref(&self, _tech_ref: TechRef) {}
    fn allow_channel_start(&self, _tech_ref: TechRef) -> Result<()> {
        Ok(())
    }
    fn get_op_state(&self, _tech_ref: TechRef) -> (OpState, Option<String>) {
        (*self.op_state.lock().unwrap(), None)
    }
    async fn start(&self, _tech_ref: TechRef) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        *self.op_state.lock().unwrap() = OpState::Up;
        Ok(())
    }
    async fn stop(&self, _tech_ref: TechRef) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.op_state.lock().unwrap() = OpState::Down;
        Ok(())
    }
    async fn retry_channel(&self, _tech_ref: TechRef) -> Result<()> {
        Ok(())
    }
    fn get_net_interface(&self, _tech_ref: TechRef) -> Option<String> {
        None
    }
    fn get_default_gw_address(&self, _tech_ref: TechRef) -> (Option<String>, Option<String>) {
        (None, None)
    }
    fn get_dns_addresses(&self, _tech_ref: TechRef) -> (Vec<String>, Vec<String>) {
        (vec![], vec![])
    }
    async fn get_channel_list(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }
}

fn new_registry(adapter: Arc<FakeCellular>) -> (Registry, tokio::sync::mpsc::UnboundedReceiver<dcs_registry::Command>) {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Technology::Cellular, adapter);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (Registry::new(dispatcher, tx), rx)
}

#[tokio::test]
async fn shared_cellular_start_session_emits_up_once_driven() {
    let adapter = Arc::new(FakeCellular::new());
    let (mut registry, mut rx) = new_registry(adapter.clone());

    let channel = registry.get_reference(Technology::Cellular, "1").unwrap();

    let events_a: Arc<Mutex<Vec<ChannelEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let events_a2 = events_a.clone();
    registry
        .add_event_handler(
            SessionId::new(1),
            channel,
            Arc::new(move |ev| events_a2.lock().unwrap().push(ev)),
        )
        .unwrap();

    let events_b: Arc<Mutex<Vec<ChannelEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let events_b2 = events_b.clone();
    registry
        .add_event_handler(
            SessionId::new(2),
            channel,
            Arc::new(move |ev| events_b2.lock().unwrap().push(ev)),
        )
        .unwrap();

    let req_a = registry.start(SessionId::new(1), channel).unwrap();
    // First start posts a Start command; drain it and drive the adapter,
    // mimicking what the event loop would do.
    assert!(matches!(rx.recv().await, Some(dcs_registry::Command::Start(_))));
    let (tech, tech_ref) = {
        let db = registry.channel(channel).unwrap();
        (db.tech, db.tech_ref)
    };
    registry.dispatcher().start(tech, tech_ref).await.unwrap();
    registry.on_tech_event(tech, tech_ref, dcs_core::EventKind::Up);

    let req_b = registry.start(SessionId::new(2), channel).unwrap();
    // Second start: channel already up, so no second Start command and an
    // immediate synthesized Up to subscriber B only.
    assert!(rx.try_recv().is_err());
    assert_eq!(adapter.start_calls.load(Ordering::SeqCst), 1);
    assert_eq!(events_b.lock().unwrap().len(), 1);

    registry.stop(SessionId::new(1), req_a).unwrap();
    assert_eq!(adapter.stop_calls.load(Ordering::SeqCst), 0);
    assert_eq!(registry.channel(channel).unwrap().ref_count, 1);

    registry.stop(SessionId::new(2), req_b).unwrap();
    assert!(matches!(rx.recv().await, Some(dcs_registry::Command::Stop(_))));
    registry.dispatcher().stop(tech, tech_ref).await.unwrap();
    assert_eq!(adapter.stop_calls.load(Ordering::SeqCst), 1);
}

/// A Wi-Fi-like adapter: the first `tech_ref` to start "wins" the radio,
/// and any other already-up `tech_ref` sees `allow_channel_start` return
/// `Duplicate` once it is itself the selected one (mirroring
/// `components/dcs-wifi/src/adapter.rs`'s `preflight`).
struct FakeSelectingAdapter {
    names: Mutex<Arena<String, TechMarker>>,
    selected: Mutex<Option<TechRef>>,
    start_calls: AtomicU32,
}

impl FakeSelectingAdapter {
    fn new() -> Self {
        FakeSelectingAdapter {
            names: Mutex::new(Arena::new()),
            selected: Mutex::new(None),
            start_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TechAdapter for FakeSelectingAdapter {
    fn create_tech_ref(&self, name: &str) -> Result<TechRef> {
        Ok(self.names.lock().unwrap().insert(name.to_owned()))
    }
    fn release_tech_ref(&self, _tech_ref: TechRef) {}
    fn allow_channel_start(&self, tech_ref: TechRef) -> Result<()> {
        let mut selected = self.selected.lock().unwrap();
        match *selected {
            Some(sel) if sel == tech_ref => Err(Error::duplicate("already the selected SSID")),
            Some(_) => Err(Error::not_permitted("another SSID is already selected")),
            None => {
                *selected = Some(tech_ref);
                Ok(())
            }
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
        (None, None)
    }
    fn get_dns_addresses(&self, _tech_ref: TechRef) -> (Vec<String>, Vec<String>) {
        (vec![], vec![])
    }
    async fn get_channel_list(&self) -> Result<Vec<String>> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn duplicate_start_on_already_selected_channel_shares_instead_of_erroring() {
    let adapter = Arc::new(FakeSelectingAdapter::new());
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Technology::Wifi, adapter.clone());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut registry = Registry::new(dispatcher, tx);

    let channel = registry.get_reference(Technology::Wifi, "home").unwrap();

    // First session selects this SSID: allow_channel_start returns Ok, no
    // one is up yet so a Start command is posted.
    let req_a = registry.start(SessionId::new(1), channel).unwrap();
    assert!(matches!(rx.recv().await, Some(dcs_registry::Command::Start(_))));
    let tech_ref = registry.channel(channel).unwrap().tech_ref;
    registry.dispatcher().start(Technology::Wifi, tech_ref).await.unwrap();
    registry.on_tech_event(Technology::Wifi, tech_ref, dcs_core::EventKind::Up);

    // Second session asks for the same already-selected SSID:
    // allow_channel_start returns Duplicate, which must fall through to
    // the ref-count/Up logic rather than aborting the start.
    let req_b = registry.start(SessionId::new(2), channel).unwrap();
    assert!(rx.try_recv().is_err());
    assert_eq!(registry.channel(channel).unwrap().ref_count, 2);
    assert_eq!(adapter.start_calls.load(Ordering::SeqCst), 1);

    registry.stop(SessionId::new(1), req_a).unwrap();
    registry.stop(SessionId::new(2), req_b).unwrap();
    assert!(matches!(rx.recv().await, Some(dcs_registry::Command::Stop(_))));
}

#[tokio::test]
async fn session_close_stops_held_channel_but_not_other_holders() {
    let adapter = Arc::new(FakeCellular::new());
    let (mut registry, _rx) = new_registry(adapter.clone());

    let channel = registry.get_reference(Technology::Cellular, "1").unwrap();
    let handler_fired = Arc::new(Mutex::new(false));
    let handler_fired2 = handler_fired.clone();
    registry
        .add_event_handler(
            SessionId::new(2),
            channel,
            Arc::new(move |_ev| *handler_fired2.lock().unwrap() = true),
        )
        .unwrap();

    let _req_a = registry.start(SessionId::new(1), channel).unwrap();
    let _req_b = registry.start(SessionId::new(2), channel).unwrap();
    assert_eq!(registry.channel(channel).unwrap().ref_count, 2);

    registry.close_session(SessionId::new(1), |_name| false);

    assert_eq!(registry.channel(channel).unwrap().ref_count, 1);
    assert!(*handler_fired.lock().unwrap());
}
