// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The per-interface sequence store.
//!
//! Each egress interface gets its own 16-bit Identification counter,
//! created lazily on the first sequential-mode packet seen for that
//! interface and seeded with a random value. The counter lives for as
//! long as the engine does.
//!
//! Two levels of synchronization are used. The map itself sits behind
//! a reader-writer lock which is only taken for writing to insert a
//! new interface; the common case is a read lock held just long enough
//! to clone out the entry. The counter in each entry is an atomic, so
//! concurrent [`IfSeq::advance`] calls on one interface are linearized
//! and never hand out the same value twice.

use crate::api::IfIndex;
use crate::sys::sync::KRwLock;
use core::num::NonZeroU32;
use core::sync::atomic::AtomicU16;
use core::sync::atomic::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::vec::Vec;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SeqError {
    /// The store already tracks its configured maximum of interfaces.
    #[error("max capacity of {0} interfaces reached")]
    MaxCapacity(u32),

    /// Growing the map failed.
    #[error("failed to allocate interface state")]
    AllocFailed,
}

/// The sequence state of a single egress interface.
#[derive(Debug)]
pub struct IfSeq {
    ifindex: IfIndex,
    next_id: AtomicU16,
}

impl IfSeq {
    fn new(ifindex: IfIndex, seed: u16) -> Self {
        Self { ifindex, next_id: AtomicU16::new(seed) }
    }

    pub fn ifindex(&self) -> IfIndex {
        self.ifindex
    }

    /// Take the next ID, returning it and bumping the counter by one,
    /// wrapping at 2^16.
    #[inline]
    pub fn advance(&self) -> u16 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The ID the next call to [`Self::advance`] would return.
    pub fn peek(&self) -> u16 {
        self.next_id.load(Ordering::Relaxed)
    }
}

/// A handle to an interface's sequence state, as returned by
/// [`SeqStore::get_or_create`].
#[derive(Clone, Debug)]
pub struct SeqHandle {
    state: Arc<IfSeq>,
    created: bool,
}

impl SeqHandle {
    /// Was the state created by the lookup that returned this handle?
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn advance(&self) -> u16 {
        self.state.advance()
    }

    pub fn peek(&self) -> u16 {
        self.state.peek()
    }
}

pub struct SeqStore {
    limit: NonZeroU32,
    map: KRwLock<HashMap<IfIndex, Arc<IfSeq>>>,
}

impl SeqStore {
    pub fn new(limit: NonZeroU32) -> Self {
        Self { limit, map: KRwLock::new(HashMap::new()) }
    }

    /// Look up the state for `ifindex`, creating it if this is the
    /// first time the interface has been seen.
    ///
    /// `seed` is called at most once, and only when the state is
    /// created. If several contexts race to create the same entry,
    /// exactly one of them wins and they all get a handle to that
    /// single entry.
    ///
    /// # Errors
    ///
    /// If the store is at max capacity, or the map cannot grow, no
    /// state is created and an error is returned. A later call for
    /// the same interface simply tries again.
    pub fn get_or_create<F>(
        &self,
        ifindex: IfIndex,
        seed: F,
    ) -> Result<SeqHandle, SeqError>
    where
        F: FnOnce() -> u16,
    {
        if let Some(state) = self.map.read().get(&ifindex) {
            return Ok(SeqHandle { state: Arc::clone(state), created: false });
        }

        let mut map = self.map.write();

        // Somebody else got here between our read and write locks.
        if let Some(state) = map.get(&ifindex) {
            return Ok(SeqHandle { state: Arc::clone(state), created: false });
        }

        let limit = self.limit.get();
        if map.len() >= limit as usize {
            return Err(SeqError::MaxCapacity(limit));
        }

        map.try_reserve(1).map_err(|_| SeqError::AllocFailed)?;
        let state = Arc::new(IfSeq::new(ifindex, seed()));
        map.insert(ifindex, Arc::clone(&state));
        Ok(SeqHandle { state, created: true })
    }

    /// Return the next ID for `ifindex` without creating state.
    pub fn peek(&self, ifindex: IfIndex) -> Option<u16> {
        self.map.read().get(&ifindex).map(|s| s.peek())
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dump the next ID of every tracked interface, ordered by index.
    pub fn dump(&self) -> Vec<(IfIndex, u16)> {
        let mut out: Vec<_> =
            self.map.read().values().map(|s| (s.ifindex(), s.peek())).collect();
        out.sort_unstable_by_key(|(idx, _)| *idx);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn store(limit: u32) -> SeqStore {
        SeqStore::new(NonZeroU32::new(limit).unwrap())
    }

    #[test]
    fn lazy_create_then_advance() {
        let seqs = store(8);
        assert!(seqs.is_empty());
        assert_eq!(seqs.peek(IfIndex(5)), None);

        let hdl = seqs.get_or_create(IfIndex(5), || 1000).unwrap();
        assert!(hdl.created());
        assert_eq!(hdl.advance(), 1000);
        assert_eq!(hdl.advance(), 1001);

        let again = seqs
            .get_or_create(IfIndex(5), || panic!("seeded twice"))
            .unwrap();
        assert!(!again.created());
        assert_eq!(again.advance(), 1002);
        assert_eq!(seqs.peek(IfIndex(5)), Some(1003));
        assert_eq!(seqs.len(), 1);
    }

    #[test]
    fn wraps_at_u16_max() {
        let seqs = store(8);
        let hdl = seqs.get_or_create(IfIndex(1), || u16::MAX - 1).unwrap();
        assert_eq!(hdl.advance(), u16::MAX - 1);
        assert_eq!(hdl.advance(), u16::MAX);
        assert_eq!(hdl.advance(), 0);
        assert_eq!(hdl.advance(), 1);
    }

    #[test]
    fn interfaces_are_isolated() {
        let seqs = store(8);
        let a = seqs.get_or_create(IfIndex(1), || 10).unwrap();
        a.advance();
        assert_eq!(seqs.peek(IfIndex(1)), Some(11));

        let b = seqs.get_or_create(IfIndex(2), || 500).unwrap();
        b.advance();
        b.advance();
        assert_eq!(seqs.peek(IfIndex(1)), Some(11));
        assert_eq!(seqs.peek(IfIndex(2)), Some(502));
        assert_eq!(seqs.dump(), vec![(IfIndex(1), 11), (IfIndex(2), 502)]);
    }

    #[test]
    fn max_capacity() {
        let seqs = store(2);
        seqs.get_or_create(IfIndex(1), || 0).unwrap();
        seqs.get_or_create(IfIndex(2), || 0).unwrap();
        assert_eq!(
            seqs.get_or_create(IfIndex(3), || 0).unwrap_err(),
            SeqError::MaxCapacity(2)
        );
        assert_eq!(seqs.peek(IfIndex(3)), None);

        // Known interfaces are unaffected by the limit.
        assert!(seqs.get_or_create(IfIndex(1), || 0).is_ok());
    }

    #[test]
    fn concurrent_first_access_creates_once() {
        const THREADS: usize = 16;

        let seqs = store(8);
        let seeded = core::sync::atomic::AtomicU32::new(0);
        let barrier = Barrier::new(THREADS);

        let mut ids: Vec<u16> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        let hdl = seqs
                            .get_or_create(IfIndex(9), || {
                                seeded.fetch_add(1, Ordering::Relaxed);
                                0xFFF8
                            })
                            .unwrap();
                        hdl.advance()
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(seeded.load(Ordering::Relaxed), 1);
        assert_eq!(seqs.len(), 1);

        // Every thread got a distinct value, and together they form
        // the run starting at the seed (wrapping past u16::MAX).
        let mut expected: Vec<u16> =
            (0..THREADS as u16).map(|i| 0xFFF8u16.wrapping_add(i)).collect();
        ids.sort_unstable();
        expected.sort_unstable();
        assert_eq!(ids, expected);
        assert_eq!(seqs.peek(IfIndex(9)), Some(0xFFF8u16.wrapping_add(16)));
    }
}
