// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types shared between the engine and the host packet hook.

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The identifier of an egress interface, as resolved by routing.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct IfIndex(pub i32);

impl Display for IfIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for IfIndex {
    fn from(val: i32) -> Self {
        Self(val)
    }
}

/// The verdict handed back to the host for each packet.
///
/// The engine only ever rewrites a field already present in the
/// packet. It never drops, queues, or steals a packet, not even when
/// it fails internally.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Verdict {
    Accept,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "ACCEPT"),
        }
    }
}

/// Protocol families a hook may be attached to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HookFamily {
    Ipv4,
}

/// The point in the host's packet path the engine is attached to.
///
/// Only post-routing is used: the egress interface must already be
/// resolved when the engine sees a packet.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HookPoint {
    PostRouting,
}

/// Priority of source NAT on the post-routing hook. The engine sits
/// at the same priority so it sees packets as they leave the box.
pub const HOOK_PRI_NAT_SRC: i32 = 100;

/// Where the host should attach the engine.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HookSpec {
    pub family: HookFamily,
    pub point: HookPoint,
    pub priority: i32,
}

impl HookSpec {
    pub const fn egress() -> Self {
        Self {
            family: HookFamily::Ipv4,
            point: HookPoint::PostRouting,
            priority: HOOK_PRI_NAT_SRC,
        }
    }
}

impl Display for HookSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}/{:?}/{}", self.family, self.point, self.priority)
    }
}
