// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The IP Identification rewriting engine.
//!
//! Packets leaving a NAT box through the same interface normally carry
//! IPv4 Identification values drawn from several independent
//! per-host generators. An observer can count the interleaved
//! sequences and so count the hosts hiding behind one address. This
//! engine rewrites the field of marked packets so that everything
//! leaving one interface carries a single increasing sequence, or
//! fully random values, and then fixes up the header checksum.
//!
//! The engine is a passenger on the host's per-packet path: it never
//! blocks, never drops a packet, and always hands back
//! [`api::Verdict::Accept`].

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

// This is needed so that the stat-macro (`#[derive(StatProvider)]`)
// can use fully-qualified type paths.
extern crate self as ipid;

pub mod api;
pub mod engine;
pub mod provider;
pub mod sys;

/// The package version reported by the engine on start.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
