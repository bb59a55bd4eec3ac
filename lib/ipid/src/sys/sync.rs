// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Safe abstractions for synchronization primitives.
//!
//! The packet path must never wedge because some other context
//! panicked while holding a lock, so these wrappers recover the guard
//! from a poisoned lock instead of propagating the poison. Every
//! critical section the engine runs under these locks is a bounded,
//! in-memory operation that leaves the protected data consistent at
//! each step.
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

/// A reader-writer lock.
///
/// We name it `KRwLock` on purpose: it is not quite the std `RwLock`
/// API (there is no poisoning to handle), and the name makes it
/// obvious which one is in use.
#[derive(Debug, Default)]
pub struct KRwLock<T> {
    inner: RwLock<T>,
}

pub struct KRwLockReadGuard<'a, T: 'a> {
    guard: RwLockReadGuard<'a, T>,
}

pub struct KRwLockWriteGuard<'a, T: 'a> {
    guard: RwLockWriteGuard<'a, T>,
}

impl<T> Deref for KRwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> Deref for KRwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.deref()
    }
}

impl<T> DerefMut for KRwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.deref_mut()
    }
}

impl<T> KRwLock<T> {
    pub const fn new(val: T) -> Self {
        KRwLock { inner: RwLock::new(val) }
    }

    pub fn read(&self) -> KRwLockReadGuard<'_, T> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        KRwLockReadGuard { guard }
    }

    pub fn write(&self) -> KRwLockWriteGuard<'_, T> {
        let guard =
            self.inner.write().unwrap_or_else(PoisonError::into_inner);
        KRwLockWriteGuard { guard }
    }
}
