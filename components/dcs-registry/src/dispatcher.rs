/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Technology Dispatcher: a thin, stateless façade over the
//! three per-technology adapters. Its only job is to keep the registry
//! ignorant of which technologies actually exist.

use std::collections::HashMap;
use std::sync::Arc;

use dcs_core::{Error, OpState, Result, TechRef, Technology};

use crate::adapter::TechAdapter;

#[derive(Default)]
pub struct Dispatcher {
    adapters: HashMap<Technology, Arc<dyn TechAdapter>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tech: Technology, adapter: Arc<dyn TechAdapter>) {
        self.adapters.insert(tech, adapter);
    }

    fn adapter(&self, tech: Technology) -> Result<&Arc<dyn TechAdapter>> {
        self.adapters
            .get(&tech)
            .ok_or_else(|| Error::unsupported(format!("no adapter registered for {tech}")))
    }

    pub fn create_tech_ref(&self, tech: Technology, name: &str) -> Result<TechRef> {
        self.adapter(tech)?.create_tech_ref(name)
    }

    pub fn release_tech_ref(&self, tech: Technology, tech_ref: TechRef) -> Result<()> {
        self.adapter(tech)?.release_tech_ref(tech_ref);
        Ok(())
    }

    pub fn allow_channel_start(&self, tech: Technology, tech_ref: TechRef) -> Result<()> {
        self.adapter(tech)?.allow_channel_start(tech_ref)
    }

    pub fn get_op_state(&self, tech: Technology, tech_ref: TechRef) -> Result<(OpState, Option<String>)> {
        Ok(self.adapter(tech)?.get_op_state(tech_ref))
    }

    pub async fn start(&self, tech: Technology, tech_ref: TechRef) -> Result<()> {
        self.adapter(tech)?.start(tech_ref).await
    }

    pub async fn stop(&self, tech: Technology, tech_ref: TechRef) -> Result<()> {
        self.adapter(tech)?.stop(tech_ref).await
    }

    pub async fn retry_channel(&self, tech: Technology, tech_ref: TechRef) -> Result<()> {
        self.adapter(tech)?.retry_channel(tech_ref).await
    }

    pub fn get_net_interface(&self, tech: Technology, tech_ref: TechRef) -> Result<Option<String>> {
        Ok(self.adapter(tech)?.get_net_interface(tech_ref))
    }

    pub fn get_default_gw_address(
        &self,
        tech: Technology,
        tech_ref: TechRef,
    ) -> Result<(Option<String>, Option<String>)> {
        Ok(self.adapter(tech)?.get_default_gw_address(tech_ref))
    }

    pub fn get_dns_addresses(
        &self,
        tech: Technology,
        tech_ref: TechRef,
    ) -> Result<(Vec<String>, Vec<String>)> {
        Ok(self.adapter(tech)?.get_dns_addresses(tech_ref))
    }

    pub async fn get_channel_list(&self, tech: Technology) -> Result<Vec<String>> {
        self.adapter(tech)?.get_channel_list().await
    }

    pub fn supported_technologies(&self) -> Vec<Technology> {
        self.adapters.keys().copied().collect()
    }
}
