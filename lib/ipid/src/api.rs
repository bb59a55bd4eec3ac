// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

pub use ipid_api::*;

use core::num::NonZeroU32;
use serde::Deserialize;
use serde::Serialize;

/// The default bound on the number of egress interfaces the engine
/// will track sequence state for.
pub const DEF_MAX_IFACES: u32 = 8192;

/// Engine configuration, as handed over by the host at start.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct EngineCfg {
    pub marks: MarkCfg,
    pub max_ifaces: NonZeroU32,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            marks: MarkCfg::default(),
            max_ifaces: NonZeroU32::new(DEF_MAX_IFACES)
                .unwrap_or(NonZeroU32::MIN),
        }
    }
}
