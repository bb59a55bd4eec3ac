// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Providers let the engine run in different contexts by plugging in
//! the host's implementation of services the engine needs but should
//! not own. Today that is only logging: a host shim routes messages to
//! its logger, a unit test captures them, and nothing in the engine
//! writes to a console on its own.

use std::boxed::Box;
use std::fmt;
use std::fmt::Display;

/// The set of all host-specific providers required by the engine.
pub struct Providers {
    pub log: Box<dyn LogProvider>,
}

/// A logging provider provides the means to log messages to some
/// destination based on the context in which the engine is running.
///
/// For example, in a unit test this could map to `println!`. In a
/// daemon it would map to its structured logger.
///
/// Logging levels are provided by [`LogLevel`]. These levels will map
/// to the underlying provider with varying degrees of success.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

#[derive(Clone, Copy)]
pub struct PrintlnLog;

impl LogProvider for PrintlnLog {
    fn log(&self, level: LogLevel, msg: &str) {
        println!("{level} {msg}");
    }
}
