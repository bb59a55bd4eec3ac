// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Packet buffers and the writability guard.
//!
//! A packet handed to the engine may share its data buffer with other
//! holders (a clone queued to a packet capture tap, say). Writing
//! through a shared buffer would change their view of the packet too,
//! so before any mutation the engine asks for an exclusive, in-place
//! mutable region. If the buffer is shared, a private copy is made;
//! if that copy cannot be allocated, the guard fails and the packet
//! goes out unmodified.

use super::ProcessError;
use super::ip4;
use super::ip4::Ipv4HdrMut;
use std::sync::Arc;
use std::vec::Vec;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum WriteError {
    #[error("need {needed} bytes, buffer has {avail}")]
    NotEnoughBytes { needed: usize, avail: usize },

    #[error("failed to allocate private copy of {len} bytes")]
    AllocFailed { len: usize },
}

/// A reference-counted, copy-on-write packet data buffer.
///
/// Cloning a `PktBuf` shares the underlying bytes.
#[derive(Clone, Debug)]
pub struct PktBuf {
    data: Arc<Vec<u8>>,
}

impl PktBuf {
    /// Wrap an owned buffer.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: Arc::new(data) }
    }

    /// Allocate a new buffer holding a copy of `buf`.
    pub fn copy(buf: impl AsRef<[u8]>) -> Self {
        Self::new(buf.as_ref().to_vec())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Is some other holder also referencing these bytes?
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1 || Arc::weak_count(&self.data) > 0
    }

    /// Return exclusive mutable access to the first `len` bytes.
    ///
    /// When the buffer is shared the whole buffer is first copied into
    /// a private allocation; other holders keep the original.
    pub fn ensure_writable(
        &mut self,
        len: usize,
    ) -> Result<&mut [u8], WriteError> {
        let avail = self.data.len();
        if len > avail {
            return Err(WriteError::NotEnoughBytes { needed: len, avail });
        }

        if Arc::get_mut(&mut self.data).is_none() {
            let mut private = Vec::new();
            private
                .try_reserve_exact(avail)
                .map_err(|_| WriteError::AllocFailed { len: avail })?;
            private.extend_from_slice(&self.data);
            self.data = Arc::new(private);
        }

        // Unique at this point, so this never clones.
        Ok(&mut Arc::make_mut(&mut self.data)[..len])
    }

    /// Consume the buffer, returning the bytes. Copies only if the
    /// buffer is still shared.
    pub fn into_vec(self) -> Vec<u8> {
        Arc::try_unwrap(self.data).unwrap_or_else(|data| data.as_ref().clone())
    }
}

impl From<Vec<u8>> for PktBuf {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// An outbound packet, as seen by the engine.
///
/// The L3 offset is where the host found the IPv4 header (past any
/// link-layer framing). The mark is whatever the upstream classifier
/// set; the engine only reads it.
#[derive(Clone, Debug)]
pub struct Packet {
    mark: u32,
    l3_off: usize,
    buf: PktBuf,
}

impl Packet {
    pub fn new(buf: impl Into<PktBuf>, l3_off: usize, mark: u32) -> Self {
        Self { mark, l3_off, buf: buf.into() }
    }

    #[inline]
    pub fn mark(&self) -> u32 {
        self.mark
    }

    #[inline]
    pub fn l3_off(&self) -> usize {
        self.l3_off
    }

    pub fn buf(&self) -> &PktBuf {
        &self.buf
    }

    pub fn bytes(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// The bytes from the start of the IPv4 header onward.
    pub fn l3_bytes(&self) -> &[u8] {
        self.buf.as_slice().get(self.l3_off..).unwrap_or(&[])
    }

    pub fn into_buf(self) -> PktBuf {
        self.buf
    }

    /// The writability guard.
    ///
    /// Make the whole IPv4 header, from its first byte through the
    /// last option byte, exclusively owned and return a mutable view
    /// of it. This covers the Identification and checksum fields as
    /// well as everything the checksum is computed over.
    ///
    /// Only the first header byte is read before the guard succeeds;
    /// nothing is written on failure.
    pub fn ip4_hdr_mut(&mut self) -> Result<Ipv4HdrMut<'_>, ProcessError> {
        let l3_off = self.l3_off;
        let avail = self.buf.len();
        let first = *self
            .buf
            .as_slice()
            .get(l3_off)
            .ok_or_else(|| WriteError::NotEnoughBytes {
                needed: l3_off.saturating_add(1),
                avail,
            })?;
        let hdr_len = ip4::hdr_len_from(first)?;

        let bytes = self.buf.ensure_writable(l3_off + hdr_len)?;
        Ok(Ipv4HdrMut::parse(&mut bytes[l3_off..])?)
    }
}
