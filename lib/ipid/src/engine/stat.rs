// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Engine diagnostics: counters and the throttled summary.
//!
//! A summary line is due each time the modified count reaches the next
//! power of two (2, 4, 8, …), which keeps log volume logarithmic in
//! traffic while still showing that the engine is alive.
//!
//! The threshold is not stored. Each increment of `modified` hands
//! back a count no other context sees, so whichever context lands on
//! a power of two owns that summary. A slow context can delay a
//! summary line but never suppresses a later one.

use crate::sys::stat::StatProvider;
use crate::sys::stat::StatU32;
use core::fmt;
use core::fmt::Display;
use core::sync::atomic::AtomicBool;
use core::sync::atomic::Ordering;

#[derive(StatProvider)]
pub struct IpidStats {
    /// Packets whose Identification was rewritten.
    pub modified: StatU32,
    /// Of those, how many got a random value.
    pub random: StatU32,
    /// Captured packets whose header could not be made writable.
    pub not_writable: StatU32,
    /// Captured packets dropped from sequencing because interface
    /// state could not be created.
    pub alloc_fail: StatU32,
    /// Captured packets without a valid IPv4 header.
    pub bad_hdr: StatU32,
}

impl IpidStatsSnap {
    /// Packets rewritten with a sequential value.
    pub fn sequential(&self) -> u32 {
        self.modified.wrapping_sub(self.random)
    }
}

/// The counters reported by a periodic summary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Summary {
    pub modified: u32,
    pub sequential: u32,
    pub random: u32,
    pub not_writable: u32,
}

impl Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "modified {} packets, {} sequential, {} random; \
             {} packets not writable",
            self.modified, self.sequential, self.random, self.not_writable,
        )
    }
}

pub struct Diag {
    stats: IpidStats,
    warned_not_writable: AtomicBool,
    warned_alloc_fail: AtomicBool,
}

impl Default for Diag {
    fn default() -> Self {
        Self::new()
    }
}

/// Is a summary due at this modified count?
#[inline]
fn summary_due(modified: u32) -> bool {
    modified >= 2 && modified.is_power_of_two()
}

impl Diag {
    pub fn new() -> Self {
        Self {
            stats: IpidStats::new(),
            warned_not_writable: AtomicBool::new(false),
            warned_alloc_fail: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> IpidStatsSnap {
        self.stats.snapshot()
    }

    /// Account for a rewritten packet, returning a summary if one is
    /// due.
    pub fn modified(&self, random: bool) -> Option<Summary> {
        let vals = &self.stats;
        if random {
            vals.random.incr(1);
        }
        let modified = vals.modified.incr(1);

        if !summary_due(modified) {
            return None;
        }

        let random = vals.random.val();
        Some(Summary {
            modified,
            sequential: modified.wrapping_sub(random),
            random,
            not_writable: vals.not_writable.val(),
        })
    }

    /// Account for a packet that could not be made writable. Returns
    /// true the first time this happens.
    pub fn not_writable(&self) -> bool {
        self.stats.not_writable.incr(1);
        !self.warned_not_writable.swap(true, Ordering::Relaxed)
    }

    /// Account for a failure to create interface state. Returns true
    /// the first time this happens.
    pub fn alloc_fail(&self) -> bool {
        self.stats.alloc_fail.incr(1);
        !self.warned_alloc_fail.swap(true, Ordering::Relaxed)
    }

    pub fn bad_hdr(&self) {
        self.stats.bad_hdr.incr(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn summary_at_powers_of_two() {
        let diag = Diag::new();
        let mut due = vec![];

        for _ in 0..1100 {
            if let Some(s) = diag.modified(false) {
                due.push(s.modified);
            }
        }

        assert_eq!(due, vec![2, 4, 8, 16, 32, 64, 128, 256, 512, 1024]);
    }

    #[test]
    fn summary_counts() {
        let diag = Diag::new();
        assert!(diag.not_writable());
        assert!(!diag.not_writable());
        assert_eq!(diag.modified(true), None);

        let s = diag.modified(false).unwrap();
        assert_eq!(
            s,
            Summary { modified: 2, sequential: 1, random: 1, not_writable: 2 }
        );
        assert_eq!(
            s.to_string(),
            "modified 2 packets, 1 sequential, 1 random; 2 packets not writable"
        );
    }

    #[test]
    fn warn_once_but_count_all() {
        let diag = Diag::new();
        assert!(diag.alloc_fail());
        assert!(!diag.alloc_fail());
        assert!(!diag.alloc_fail());
        diag.bad_hdr();

        let snap = diag.snapshot();
        assert_eq!(snap.alloc_fail, 3);
        assert_eq!(snap.bad_hdr, 1);
        assert_eq!(snap.modified, 0);
        assert_eq!(snap.sequential(), 0);
    }

    // A context that took count 2 but has not yet checked it must not
    // hold up the summaries that follow.
    #[test]
    fn late_context_does_not_stall_summaries() {
        let diag = Diag::new();
        assert_eq!(diag.modified(false), None);

        // Count 2 is taken by a context which stalls before checking.
        diag.stats.modified.incr(1);

        assert_eq!(diag.modified(false), None);
        assert_eq!(diag.modified(false).map(|s| s.modified), Some(4));

        let due = (0..100_000)
            .filter_map(|_| diag.modified(false))
            .map(|s| s.modified)
            .collect::<Vec<_>>();
        assert_eq!(due, (3..=16).map(|n| 1u32 << n).collect::<Vec<_>>());
    }

    #[test]
    fn one_summary_per_power_under_contention() {
        let diag = Diag::new();
        let mut due = std::thread::scope(|s| {
            let handles = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        (0..4096)
                            .filter_map(|_| diag.modified(false))
                            .map(|s| s.modified)
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });
        due.sort_unstable();

        // 8 * 4096 = 2^15 packets.
        assert_eq!(due, (1..=15).map(|n| 1u32 << n).collect::<Vec<_>>());
    }

    #[test]
    fn summary_at_top_power_and_after_wrap() {
        let diag = Diag::new();
        diag.stats.modified.set((1 << 31) - 1);
        assert_eq!(diag.modified(false).map(|s| s.modified), Some(1 << 31));

        diag.stats.modified.set(u32::MAX);
        // The count wraps to 0 and cadence restarts.
        assert_eq!(diag.modified(false), None);
        assert_eq!(diag.modified(false), None);
        assert_eq!(diag.modified(false).map(|s| s.modified), Some(2));
    }
}
