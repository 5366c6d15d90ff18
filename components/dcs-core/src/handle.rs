/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Opaque, phantom-typed handles and the arena that backs them.
//!
//! Process-wide handle tables use opaque integer keys on both sides of the
//! ChannelDb / per-tech-conn pair, never raw pointers. `Handle<Marker>` is
//! that integer key, generalized from the `Id<T>` phantom-type idiom used
//! for service and feature identifiers elsewhere in this codebase, but
//! backed by a monotonic counter instead of a string atom since these
//! handles are never printed on the wire -- only channel/interface *names*
//! are.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// An opaque handle tagged with a marker type `M` so that, say, a
/// `Handle<RequestMarker>` can never be confused with a `Handle<ChannelMarker>`
/// at compile time, even though both are backed by a plain `u64`.
pub struct Handle<M> {
    id: u64,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Handle<M> {
    fn new(id: u64) -> Self {
        Handle {
            id,
            _marker: PhantomData,
        }
    }

    pub fn value(&self) -> u64 {
        self.id
    }
}

impl<M> Clone for Handle<M> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<M> Copy for Handle<M> {}
impl<M> PartialEq for Handle<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<M> Eq for Handle<M> {}
impl<M> Hash for Handle<M> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl<M> fmt::Debug for Handle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.id)
    }
}
impl<M> fmt::Display for Handle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// A process-wide arena: mints fresh, never-reused handles and stores one
/// value per handle. Handles are minted starting at 1 so that `0` remains
/// available to callers as an explicit "no handle" sentinel where needed.
#[derive(Debug)]
pub struct Arena<T, M> {
    next_id: u64,
    entries: HashMap<Handle<M>, T>,
}

impl<T, M> Default for Arena<T, M> {
    fn default() -> Self {
        Arena {
            next_id: 1,
            entries: HashMap::new(),
        }
    }
}

impl<T, M> Arena<T, M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh handle and store `value` under it. The handle is
    /// guaranteed to never have been issued before by this arena.
    pub fn insert(&mut self, value: T) -> Handle<M> {
        let handle = Handle::new(self.next_id);
        self.next_id += 1;
        self.entries.insert(handle, value);
        handle
    }

    pub fn get(&self, handle: Handle<M>) -> Option<&T> {
        self.entries.get(&handle)
    }

    pub fn get_mut(&mut self, handle: Handle<M>) -> Option<&mut T> {
        self.entries.get_mut(&handle)
    }

    pub fn remove(&mut self, handle: Handle<M>) -> Option<T> {
        self.entries.remove(&handle)
    }

    pub fn contains(&self, handle: Handle<M>) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<M>, &T)> {
        self.entries.iter().map(|(h, v)| (*h, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<M>, &mut T)> {
        self.entries.iter_mut().map(|(h, v)| (*h, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Marker {}

    #[test]
    fn handles_are_never_reused() {
        let mut arena: Arena<&'static str, Marker> = Arena::new();
        let a = arena.insert("a");
        arena.remove(a);
        let b = arena.insert("b");
        assert_ne!(a.value(), b.value());
    }

    #[test]
    fn get_and_remove() {
        let mut arena: Arena<i32, Marker> = Arena::new();
        let h = arena.insert(42);
        assert_eq!(arena.get(h), Some(&42));
        assert_eq!(arena.remove(h), Some(42));
        assert_eq!(arena.get(h), None);
    }
}
