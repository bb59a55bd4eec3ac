// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Identification value assignment.
//!
//! There are two ways to pick the new Identification of a captured
//! packet:
//!
//! * Random: 16 bits straight from a cryptographically strong source.
//!   The sequence store is not consulted.
//!
//! * Sequential: the next value of the egress interface's counter.
//!   The counter is seeded from the same strong source when the
//!   interface is first seen, so sequences are not correlated across
//!   interfaces or restarts.

use super::seq::SeqError;
use super::seq::SeqStore;
use crate::api::IfIndex;
use rand::Rng;

/// A source of random Identification values.
pub trait IdSource: Send + Sync {
    fn random_id(&self) -> u16;
}

/// Draws from the thread-local CSPRNG, which is itself seeded from
/// the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsIdSource;

impl IdSource for OsIdSource {
    fn random_id(&self) -> u16 {
        rand::rng().random()
    }
}

/// The Identification value chosen for a packet, and how.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Assigned {
    Random(u16),
    Sequential {
        id: u16,
        /// This packet was the first seen for its interface.
        new_iface: bool,
    },
}

impl Assigned {
    pub fn id(&self) -> u16 {
        match self {
            Self::Random(id) => *id,
            Self::Sequential { id, .. } => *id,
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self, Self::Random(_))
    }
}

pub fn assign_random(src: &dyn IdSource) -> Assigned {
    Assigned::Random(src.random_id())
}

pub fn assign_sequential(
    seqs: &SeqStore,
    ifindex: IfIndex,
    src: &dyn IdSource,
) -> Result<Assigned, SeqError> {
    let hdl = seqs.get_or_create(ifindex, || src.random_id())?;
    Ok(Assigned::Sequential { id: hdl.advance(), new_iface: hdl.created() })
}
