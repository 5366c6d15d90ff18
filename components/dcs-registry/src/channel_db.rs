/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The registry's per-channel record.

use std::sync::Arc;

use dcs_core::{ChannelRef, EventKind, HandlerRef, RequestRef, TechRef, Technology};

use crate::session::SessionId;

/// A channel event delivered to a subscriber: `(ChannelRef, EventKind, code)`.
/// `code` is a technology-specific detail code, 0 when unused.
#[derive(Clone, Debug)]
pub struct ChannelEvent {
    pub channel: ChannelRef,
    pub kind: EventKind,
    pub code: i32,
}

impl ChannelEvent {
    pub fn new(channel: ChannelRef, kind: EventKind) -> Self {
        ChannelEvent { channel, kind, code: 0 }
    }
}

pub type EventCallback = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// One subscriber: owned by exactly one ChannelDb and exactly one client
/// session. A second `add_event_handler` for the same
/// `(session, channel)` pair silently replaces the first.
pub struct EventHandler {
    pub session: SessionId,
    pub handler_ref: HandlerRef,
    pub callback: EventCallback,
}

/// One ChannelDb per (technology, channel name) pair.
pub struct ChannelDb {
    pub name: String,
    pub tech: Technology,
    pub tech_ref: TechRef,
    pub ref_count: u32,
    pub event_handlers: Vec<EventHandler>,
    pub start_request_refs: Vec<RequestRef>,
}

impl ChannelDb {
    pub fn new(name: String, tech: Technology, tech_ref: TechRef) -> Self {
        ChannelDb {
            name,
            tech,
            tech_ref,
            ref_count: 0,
            event_handlers: Vec::new(),
            start_request_refs: Vec::new(),
        }
    }

    /// `ref_count == 0` and no pending technology operation: deletable.
    /// The registry is the only component that knows about pending
    /// operations, so this only checks the refcount half.
    pub fn is_idle(&self) -> bool {
        self.ref_count == 0
    }

    pub fn handler_for_session(&self, session: SessionId) -> Option<&EventHandler> {
        self.event_handlers.iter().find(|h| h.session == session)
    }

    /// Insert `handler`, replacing any prior handler for the same session.
    /// Returns the handler_ref of the entry that was replaced, if any.
    pub fn set_handler(&mut self, handler: EventHandler) -> Option<HandlerRef> {
        let replaced = self
            .event_handlers
            .iter()
            .position(|h| h.session == handler.session)
            .map(|idx| self.event_handlers.remove(idx).handler_ref);
        self.event_handlers.push(handler);
        replaced
    }

    pub fn remove_handler(&mut self, handler_ref: HandlerRef) -> bool {
        let before = self.event_handlers.len();
        self.event_handlers.retain(|h| h.handler_ref != handler_ref);
        self.event_handlers.len() != before
    }

    pub fn notify_all(&self, kind: EventKind, channel_ref: ChannelRef) {
        for handler in &self.event_handlers {
            (handler.callback)(ChannelEvent::new(channel_ref, kind));
        }
    }

    pub fn notify_session(&self, session: SessionId, kind: EventKind, channel_ref: ChannelRef) {
        if let Some(handler) = self.handler_for_session(session) {
            (handler.callback)(ChannelEvent::new(channel_ref, kind));
        }
    }
}
