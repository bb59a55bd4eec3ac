// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A log provider which records every message for later inspection.

use ipid::provider::LogLevel;
use ipid::provider::LogProvider;
use std::sync::Arc;
use std::sync::Mutex;

#[derive(Clone, Default)]
pub struct CaptureLog {
    msgs: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages logged so far.
    pub fn msgs(&self) -> Vec<(LogLevel, String)> {
        self.msgs.lock().unwrap().clone()
    }

    /// Messages containing `pat`.
    pub fn matching(&self, pat: &str) -> Vec<String> {
        self.msgs
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m.contains(pat))
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn count(&self, pat: &str) -> usize {
        self.matching(pat).len()
    }
}

impl LogProvider for CaptureLog {
    fn log(&self, level: LogLevel, msg: &str) {
        self.msgs.lock().unwrap().push((level, msg.to_string()));
    }
}
