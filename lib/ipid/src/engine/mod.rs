// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The per-packet engine.
//!
//! A captured packet travels through the pieces here in a fixed
//! order: the [`hook`] classifies it by mark, [`packet`] makes the
//! IPv4 header privately writable, [`ident`] picks the new
//! Identification value (consulting [`seq`] for sequential mode),
//! [`ip4`] writes it and [`checksum`] repairs the header checksum,
//! and finally [`stat`] accounts for the result.
pub mod checksum;
pub mod hook;
pub mod ident;
pub mod ip4;
pub mod packet;
pub mod seq;
pub mod stat;

pub use hook::Engine;
pub use hook::Outcome;
pub use hook::PacketHook;

use ip4::Ipv4HdrError;
use packet::WriteError;
use seq::SeqError;

/// Some type of problem occurred while processing a captured packet.
///
/// None of these are fatal: every one of them results in the packet
/// being forwarded exactly as it arrived.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ProcessError {
    /// The header could not be made privately writable.
    #[error("header not writable: {0}")]
    NotWritable(#[from] WriteError),

    /// The bytes at the L3 offset are not a usable IPv4 header.
    #[error("bad IPv4 header: {0}")]
    BadHdr(#[from] Ipv4HdrError),

    /// Sequence state for the egress interface could not be created.
    #[error("no sequence state: {0}")]
    NoSeqState(#[from] SeqError),
}
