/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The ranked technology list the fall-through handler walks: at most one
//! entry per technology, ordered by an arbitrary `u32` rank.

use dcs_core::Technology;

#[derive(Default)]
pub struct RankedTechs {
    entries: Vec<(u32, Technology)>,
}

impl RankedTechs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or moves `tech` to `rank`. A collision with an existing
    /// rank shifts that entry (and anything at or above it) up by one
    /// before inserting.
    pub fn set_rank(&mut self, tech: Technology, rank: u32) {
        self.entries.retain(|(_, t)| *t != tech);
        for entry in self.entries.iter_mut() {
            if entry.0 >= rank {
                entry.0 += 1;
            }
        }
        self.entries.push((rank, tech));
        self.entries.sort_by_key(|(r, _)| *r);
    }

    pub fn get_first_used_technology(&self) -> Option<Technology> {
        self.entries.first().map(|(_, t)| *t)
    }

    /// The entry immediately after `current` in rank order, or `None` at
    /// the end of the list (the fall-through handler is what wraps).
    pub fn get_next_used_technology(&self, current: Technology) -> Option<Technology> {
        let idx = self.entries.iter().position(|(_, t)| *t == current)?;
        self.entries.get(idx + 1).map(|(_, t)| *t)
    }

    /// Like `get_next_used_technology`, but wraps to the first entry once
    /// the list is exhausted.
    pub fn next_wrapping(&self, current: Technology) -> Option<Technology> {
        self.get_next_used_technology(current).or_else(|| self.get_first_used_technology())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_rank_shifts_collisions_up() {
        let mut ranked = RankedTechs::new();
        ranked.set_rank(Technology::Cellular, 1);
        ranked.set_rank(Technology::Wifi, 1);
        assert_eq!(ranked.get_first_used_technology(), Some(Technology::Wifi));
        assert_eq!(ranked.get_next_used_technology(Technology::Wifi), Some(Technology::Cellular));
    }

    #[test]
    fn next_wraps_to_first() {
        let mut ranked = RankedTechs::new();
        ranked.set_rank(Technology::Wifi, 1);
        ranked.set_rank(Technology::Cellular, 2);
        assert_eq!(ranked.get_next_used_technology(Technology::Cellular), None);
        assert_eq!(ranked.next_wrapping(Technology::Cellular), Some(Technology::Wifi));
    }

    #[test]
    fn re_ranking_a_known_technology_moves_it() {
        let mut ranked = RankedTechs::new();
        ranked.set_rank(Technology::Wifi, 1);
        ranked.set_rank(Technology::Cellular, 2);
        ranked.set_rank(Technology::Cellular, 1);
        assert_eq!(ranked.get_first_used_technology(), Some(Technology::Cellular));
    }
}
