/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The Channel Query Aggregator: gathers per-technology scan
//! results into one cross-technology list with a hard deadline. Cellular
//! and (after its first call) Ethernet resolve synchronously; Wi-Fi
//! resolves asynchronously once its driver reports `ScanDone`/`ScanFailed`.
//!
//! The aggregator owns no timer itself -- timers are the event loop's sole
//! suspension point, so the service that owns the loop arms a single
//! deadline (`20s * number of technologies`) and calls `force_complete`
//! when it fires.

use std::collections::HashSet;
use std::time::Duration;

use log::{debug, warn};

use dcs_core::Technology;

pub type QueryCallback = Box<dyn FnOnce(Vec<(Technology, String)>) + Send>;

#[derive(Default)]
pub struct Aggregator {
    in_flight: bool,
    pending: HashSet<Technology>,
    results: Vec<(Technology, String)>,
    callbacks: Vec<QueryCallback>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Deadline for the in-flight scan epoch.
    pub fn deadline(technology_count: usize) -> Duration {
        Duration::from_secs(20) * technology_count.max(1) as u32
    }

    /// `get_channels`: always appends `callback` to the
    /// delivery list. Returns `true` exactly when a *new* scan epoch needs
    /// to be kicked off across `technologies`.
    pub fn get_channels(&mut self, technologies: &[Technology], callback: QueryCallback) -> bool {
        self.callbacks.push(callback);
        if self.in_flight {
            debug!("scan already in flight, appended callback to delivery list");
            return false;
        }
        self.in_flight = true;
        self.pending = technologies.iter().copied().collect();
        self.results.clear();
        true
    }

    /// Record the result of one technology's scan. Returns `true` once
    /// every technology has reported and the epoch is ready to deliver.
    pub fn on_tech_result(&mut self, tech: Technology, names: Vec<String>) -> bool {
        if !self.pending.remove(&tech) {
            warn!("scan result for {tech} arrived outside an in-flight epoch, ignoring");
            return false;
        }
        self.results.extend(names.into_iter().map(|name| (tech, name)));
        self.pending.is_empty()
    }

    /// The deadline fired: force every still-pending technology to
    /// complete with an empty result.
    pub fn force_complete(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        warn!("channel query deadline reached with {} technologies still pending", self.pending.len());
        self.pending.clear();
    }

    /// Consume the epoch: returns the aggregated list and every callback
    /// waiting on it, and resets the aggregator for the next scan.
    pub fn deliver(&mut self) -> (Vec<(Technology, String)>, Vec<QueryCallback>) {
        self.in_flight = false;
        let results = std::mem::take(&mut self.results);
        let callbacks = std::mem::take(&mut self.callbacks);
        (results, callbacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn second_get_channels_only_appends_callback() {
        let mut agg = Aggregator::new();
        let started = agg.get_channels(&[Technology::Cellular, Technology::Wifi], Box::new(|_| {}));
        assert!(started);
        let started_again = agg.get_channels(&[Technology::Cellular, Technology::Wifi], Box::new(|_| {}));
        assert!(!started_again);
    }

    #[test]
    fn delivers_exactly_once_after_all_pending_clear() {
        let mut agg = Aggregator::new();
        let delivered = Arc::new(Mutex::new(None));
        let delivered2 = delivered.clone();
        agg.get_channels(
            &[Technology::Cellular, Technology::Ethernet],
            Box::new(move |results| {
                *delivered2.lock().unwrap() = Some(results);
            }),
        );
        assert!(!agg.on_tech_result(Technology::Cellular, vec!["1".into()]));
        assert!(agg.on_tech_result(Technology::Ethernet, vec!["eth0".into()]));
        let (results, callbacks) = agg.deliver();
        assert_eq!(results.len(), 2);
        for cb in callbacks {
            cb(results.clone());
        }
        assert_eq!(delivered.lock().unwrap().as_ref().unwrap().len(), 2);
        assert!(!agg.in_flight());
    }

    #[test]
    fn force_complete_clears_pending_for_timeout_delivery() {
        let mut agg = Aggregator::new();
        agg.get_channels(&[Technology::Wifi], Box::new(|_| {}));
        agg.force_complete();
        let (results, _) = agg.deliver();
        assert!(results.is_empty());
    }
}
