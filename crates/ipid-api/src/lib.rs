// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

pub mod hook;
pub mod mark;

pub use hook::*;
pub use mark::*;

/// The overall version of the API. Anytime a type in this crate is
/// added, removed, or modified, this number should increment. It is
/// reported in the engine's start message so that a host shim and
/// engine built from different trees can be told apart.
pub const API_VERSION: u64 = 1;

/// Major version of the ipid package.
pub const MAJOR_VERSION: u64 = 0;
