/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Data Channel Service: a process-wide coordinator that arbitrates
//! cellular, Wi-Fi and Ethernet data channels across client sessions.
//!
//! This crate wires the independently-testable pieces in
//! `dcs-core`/`dcs-registry`/`dcs-cellular`/`dcs-wifi`/`dcs-ethernet`/
//! `dcs-netconfig`/`dcs-coordinator` into one running
//! [`service::DataChannelService`]. The platform adapter, the three
//! technology drivers, and the IPC/CLI surface a host process exposes on
//! top of this are all external collaborators supplied by the embedder.

pub mod logging;
pub mod service;

pub use service::DataChannelService;
