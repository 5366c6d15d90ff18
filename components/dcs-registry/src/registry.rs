/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Channel Registry itself.

use std::collections::HashMap;

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use dcs_core::handle::Arena;
use dcs_core::ids::{ChannelMarker, HandlerMarker, RequestMarker};
use dcs_core::{AdminState, ChannelRef, Error, EventKind, HandlerRef, OpState, RequestRef, Result, TechRef, Technology};

pub use crate::channel_db::{ChannelEvent, EventCallback, EventHandler};
use crate::channel_db::ChannelDb;
use crate::command::Command;
use crate::dispatcher::Dispatcher;
use crate::session::SessionId;

struct RequestEntry {
    channel: ChannelRef,
    session: SessionId,
}

pub struct Registry {
    channels: Arena<ChannelDb, ChannelMarker>,
    by_name: HashMap<(Technology, String), ChannelRef>,
    by_tech_ref: HashMap<(Technology, TechRef), ChannelRef>,
    requests: Arena<RequestEntry, RequestMarker>,
    /// Minting handler refs through an arena keyed by channel doubles as
    /// the reverse index `remove_event_handler` needs.
    handlers: Arena<ChannelRef, HandlerMarker>,
    session_requests: HashMap<SessionId, Vec<RequestRef>>,
    dispatcher: Dispatcher,
    commands_tx: UnboundedSender<Command>,
}

impl Registry {
    pub fn new(dispatcher: Dispatcher, commands_tx: UnboundedSender<Command>) -> Self {
        Registry {
            channels: Arena::new(),
            by_name: HashMap::new(),
            by_tech_ref: HashMap::new(),
            requests: Arena::new(),
            handlers: Arena::new(),
            session_requests: HashMap::new(),
            dispatcher,
            commands_tx,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn channel(&self, channel_ref: ChannelRef) -> Option<&ChannelDb> {
        self.channels.get(channel_ref)
    }

    pub fn channels_for(&self, tech: Technology) -> Vec<ChannelRef> {
        self.channels
            .iter()
            .filter(|(_, db)| db.tech == tech)
            .map(|(r, _)| r)
            .collect()
    }

    /// `get_reference`: creates a ChannelDb on first ask.
    pub fn get_reference(&mut self, tech: Technology, name: &str) -> Result<ChannelRef> {
        if let Some(existing) = self.by_name.get(&(tech, name.to_owned())) {
            return Ok(*existing);
        }
        let tech_ref = self.dispatcher.create_tech_ref(tech, name)?;
        let channel_ref = self.channels.insert(ChannelDb::new(name.to_owned(), tech, tech_ref));
        self.by_name.insert((tech, name.to_owned()), channel_ref);
        self.by_tech_ref.insert((tech, tech_ref), channel_ref);
        debug!("registered channel {name} ({tech})");
        Ok(channel_ref)
    }

    pub fn get_technology(&self, channel_ref: ChannelRef) -> Result<Technology> {
        Ok(self.require_channel(channel_ref)?.tech)
    }

    pub fn get_state(&self, channel_ref: ChannelRef) -> Result<(AdminState, Option<String>)> {
        let channel = self.require_channel(channel_ref)?;
        let iface = self
            .dispatcher
            .get_net_interface(channel.tech, channel.tech_ref)
            .unwrap_or(None);
        Ok((AdminState::from_ref_count(channel.ref_count), iface))
    }

    fn require_channel(&self, channel_ref: ChannelRef) -> Result<&ChannelDb> {
        self.channels
            .get(channel_ref)
            .ok_or_else(|| Error::not_found(format!("no such channel ({channel_ref})")))
    }

    /// `start`.
    pub fn start(&mut self, session: SessionId, channel_ref: ChannelRef) -> Result<RequestRef> {
        let (tech, tech_ref, ref_count_before) = {
            let channel = self.require_channel(channel_ref)?;
            (channel.tech, channel.tech_ref, channel.ref_count)
        };

        // `Duplicate` (e.g. Wi-Fi: this is already the selected connection)
        // is success per §7, not an abort -- only a non-Duplicate error
        // (NotPermitted, Unavailable, ...) rejects the request here.
        match self.dispatcher.allow_channel_start(tech, tech_ref) {
            Ok(()) | Err(Error::Duplicate(_)) => {}
            Err(err) => return Err(err),
        }

        let (op_state, _) = self.dispatcher.get_op_state(tech, tech_ref)?;

        let request_ref = self.requests.insert(RequestEntry { channel: channel_ref, session });
        self.session_requests.entry(session).or_default().push(request_ref);

        let channel = self.channels.get_mut(channel_ref).expect("channel just validated");
        channel.ref_count += 1;
        channel.start_request_refs.push(request_ref);

        if ref_count_before > 0 && op_state == OpState::Up {
            debug!("channel {} already up, synthesizing Up for this subscriber", channel.name);
            channel.notify_session(session, EventKind::Up, channel_ref);
        } else {
            debug!("posting Start for channel {}", channel.name);
            let _ = self.commands_tx.send(Command::Start(channel_ref));
        }
        Ok(request_ref)
    }

    /// `stop`.
    pub fn stop(&mut self, session: SessionId, request_ref: RequestRef) -> Result<()> {
        let entry = self
            .requests
            .remove(request_ref)
            .ok_or_else(|| Error::not_found("no such request"))?;
        self.remove_session_request(entry.session, request_ref);

        let channel_ref = entry.channel;
        let channel = self
            .channels
            .get_mut(channel_ref)
            .ok_or_else(|| Error::not_found("channel for request no longer exists"))?;
        channel.start_request_refs.retain(|r| *r != request_ref);
        channel.ref_count = channel.ref_count.saturating_sub(1);

        if channel.ref_count > 0 {
            channel.notify_session(session, EventKind::Down, channel_ref);
        } else {
            debug!("posting Stop for channel {}", channel.name);
            let _ = self.commands_tx.send(Command::Stop(channel_ref));
        }
        Ok(())
    }

    fn remove_session_request(&mut self, session: SessionId, request_ref: RequestRef) {
        if let Some(list) = self.session_requests.get_mut(&session) {
            list.retain(|r| *r != request_ref);
        }
    }

    /// `add_event_handler`: replaces any prior handler for the
    /// same `(session, channel)` pair.
    pub fn add_event_handler(
        &mut self,
        session: SessionId,
        channel_ref: ChannelRef,
        callback: EventCallback,
    ) -> Result<HandlerRef> {
        self.require_channel(channel_ref)?;
        let handler_ref = self.handlers.insert(channel_ref);
        let channel = self.channels.get_mut(channel_ref).expect("channel just validated");
        let replaced = channel.set_handler(EventHandler { session, handler_ref, callback });
        if let Some(old_ref) = replaced {
            self.handlers.remove(old_ref);
        }
        Ok(handler_ref)
    }

    /// `remove_event_handler`: idempotent.
    pub fn remove_event_handler(&mut self, handler_ref: HandlerRef) {
        if let Some(channel_ref) = self.handlers.remove(handler_ref) {
            if let Some(channel) = self.channels.get_mut(channel_ref) {
                channel.remove_handler(handler_ref);
            }
        }
    }

    /// Invoked by the event loop when an adapter reports a state change for
    /// `tech_ref`. `Down` resets the registry's own view of the refcount:
    /// every outstanding RequestRef for the channel is invalidated, since
    /// the adapter has already torn the link down out from under them --
    /// PS detach and retry exhaustion both surface as a Down here.
    pub fn on_tech_event(&mut self, tech: Technology, tech_ref: TechRef, kind: EventKind) {
        let Some(&channel_ref) = self.by_tech_ref.get(&(tech, tech_ref)) else {
            warn!("tech event for unknown {tech} tech_ref {tech_ref}");
            return;
        };
        if kind == EventKind::Down {
            self.invalidate_requests(channel_ref);
        }
        if let Some(channel) = self.channels.get(channel_ref) {
            info!("channel {} ({}) -> {:?}", channel.name, tech, kind);
            channel.notify_all(kind, channel_ref);
        }
    }

    fn invalidate_requests(&mut self, channel_ref: ChannelRef) {
        let Some(channel) = self.channels.get_mut(channel_ref) else {
            return;
        };
        let stale = std::mem::take(&mut channel.start_request_refs);
        channel.ref_count = 0;
        for request_ref in stale {
            if let Some(entry) = self.requests.remove(request_ref) {
                self.remove_session_request(entry.session, request_ref);
            }
        }
    }

    /// Delete a channel with no outstanding holders. Used by the aggregator
    /// to purge Wi-Fi ChannelDbs whose SSID fell out of range
    /// and, generically, any idle channel no longer worth keeping.
    pub fn remove_idle_channel(&mut self, channel_ref: ChannelRef) -> bool {
        let Some(channel) = self.channels.get(channel_ref) else {
            return false;
        };
        if !channel.is_idle() {
            return false;
        }
        let (tech, tech_ref, name) = (channel.tech, channel.tech_ref, channel.name.clone());
        self.channels.remove(channel_ref);
        self.by_name.remove(&(tech, name));
        self.by_tech_ref.remove(&(tech, tech_ref));
        let _ = self.dispatcher.release_tech_ref(tech, tech_ref);
        true
    }

    /// Session-close contract: stop every request the session
    /// still holds, unless `stays_on_exit` says it should be left running
    /// for another client to pick up.
    pub fn close_session(&mut self, session: SessionId, stays_on_exit: impl Fn(&str) -> bool) {
        let requests = self.session_requests.remove(&session).unwrap_or_default();
        for request_ref in requests {
            let Some(entry) = self.requests.get(request_ref) else {
                continue;
            };
            let Some(channel) = self.channels.get(entry.channel) else {
                continue;
            };
            if stays_on_exit(&channel.name) {
                info!("leaving channel {} running past session close (stay-on-exit)", channel.name);
                self.requests.remove(request_ref);
                continue;
            }
            if let Err(err) = self.stop(session, request_ref) {
                warn!("session cleanup: stop failed, logging and continuing: {err}");
            }
        }
    }
}
