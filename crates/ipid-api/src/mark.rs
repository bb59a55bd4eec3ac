// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Packet mark selectors.
//!
//! The mark is a 32-bit value attached to a packet by some classifier
//! upstream of the engine (e.g. an `iptables -j MARK` rule). The
//! engine never sets it; it only tests it against two masks.

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub const DEF_CAPTURE_MASK: u32 = 0x10;
pub const DEF_RANDOM_MASK: u32 = 0x20;

/// How a single packet is to be handled, derived once from its mark.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PktClass {
    /// No capture bit is set: the packet is not ours to touch.
    Ignore,
    /// Overwrite the ID with random bits.
    Random,
    /// Overwrite the ID with the next value of the egress interface
    /// sequence.
    Sequential,
}

impl Display for PktClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Ignore => "IGNORE",
            Self::Random => "RANDOM",
            Self::Sequential => "SEQUENTIAL",
        };
        write!(f, "{s}")
    }
}

/// The pair of mark masks the engine is configured with.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct MarkCfg {
    /// A packet is captured when `mark & capture != 0`.
    pub capture: u32,
    /// A captured packet is randomized when `mark & random != 0`.
    pub random: u32,
}

impl Default for MarkCfg {
    fn default() -> Self {
        Self { capture: DEF_CAPTURE_MASK, random: DEF_RANDOM_MASK }
    }
}

impl MarkCfg {
    pub fn new(capture: u32, random: u32) -> Self {
        Self { capture, random }
    }

    /// Classify a packet by its mark.
    ///
    /// The random mask is only consulted for captured packets.
    #[inline]
    pub fn classify(&self, mark: u32) -> PktClass {
        if mark & self.capture == 0 {
            PktClass::Ignore
        } else if mark & self.random != 0 {
            PktClass::Random
        } else {
            PktClass::Sequential
        }
    }
}

impl Display for MarkCfg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "capture=0x{:x} random=0x{:x}", self.capture, self.random)
    }
}

/// Parse a mask given either in hex (`0x` prefix) or decimal.
pub fn parse_mask(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let res = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };

    res.map_err(|e| format!("invalid mask {s}: {e}"))
}
