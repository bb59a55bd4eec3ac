// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Named counters shared across packet-processing contexts.
//!
//! Counters are bumped from any number of contexts at once, so each
//! one is an atomic. A snapshot reads each counter individually: the
//! values taken as a group may reflect a packet that is only partially
//! accounted for, but no single counter ever loses an increment.
use core::sync::atomic::AtomicU32;
use core::sync::atomic::Ordering;

pub use stat_macro::StatProvider;

/// A provider of named counters.
///
/// Rather than implementing this trait manually, the stat-macro
/// should be used.
///
/// # Example
///
/// To declare a new provider simply define a struct of named fields
/// with type [`StatU32`] and derive [`StatProvider`].
///
/// ```
/// use ipid::sys::stat::StatProvider;
/// use ipid::sys::stat::StatU32;
///
/// #[derive(StatProvider)]
/// struct SomeStats {
///     pkts_out: StatU32,
///     errors_out: StatU32,
/// }
///
/// let stats = SomeStats::new();
/// stats.pkts_out.incr(1);
/// assert_eq!(stats.snapshot().pkts_out, 1);
/// ```
pub trait StatProvider {
    const NUM_FIELDS: u32;
    const FIELD_NAMES: &'static [&'static str];
    type Snap;

    fn new() -> Self;

    fn num_fields(&self) -> u32 {
        Self::NUM_FIELDS
    }

    /// Return a snapshot of the stats. This is how you obtain a copy,
    /// as opposed to the traditional clone().
    fn snapshot(&self) -> Self::Snap;
}

/// A 32-bit unsigned named counter.
///
/// Arithmetic wraps, as the counters are for observation only.
#[derive(Debug, Default)]
pub struct StatU32 {
    value: AtomicU32,
}

impl StatU32 {
    pub const fn new() -> Self {
        Self { value: AtomicU32::new(0) }
    }

    /// Add `n`, returning the value *after* the addition.
    #[inline]
    pub fn incr(&self, n: u32) -> u32 {
        self.value.fetch_add(n, Ordering::Relaxed).wrapping_add(n)
    }

    pub fn set(&self, val: u32) {
        self.value.store(val, Ordering::Relaxed);
    }

    pub fn val(&self) -> u32 {
        self.value.load(Ordering::Relaxed)
    }
}
