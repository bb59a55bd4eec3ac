// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types for calculating the internet checksum.
//!
//! The [`Checksum`] type provides a rolling one's complement sum which
//! is finalized into a [`HeaderChecksum`], the value stored in the
//! actual header bytes.
//!
//! # Checksums and Endianness
//!
//! A logical value in a header, like the IPv4 Identification, is a
//! number and must be converted to network order (big endian) before
//! it is stored. The checksum is not such a value. It is a pair of
//! bytes computed by treating the (already network-ordered) header as
//! a sequence of 16-bit words. Summing each pair of bytes as a
//! native-endian word and storing the result native-endian puts the
//! sum back in network order on any host: a little-endian machine
//! swaps the bytes on every load and swaps them back on the store.
//! Hence this module uses `{to,from}_ne_bytes()` throughout, and the
//! checksum field is never byte-order converted.
//!
//! RFC 1071 §1.B says the same:
//!
//! > Therefore, the sum may be calculated in exactly the same way
//! > regardless of the byte order ("big-endian" or "little-endian")
//! > of the underlaying hardware.
//!
//! # Relevant RFCs
//!
//! * 1071 Computing the Internet Checksum

/// The checksum value, as it is contained in a network header.
///
/// This holds the bytes with one's complement already applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderChecksum {
    inner: [u8; 2],
}

impl HeaderChecksum {
    /// Return the bytes of this header checksum.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form by
    /// performing one's complement.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        Self { inner: (!csum.finalize()).to_ne_bytes() }
    }
}

/// A rolling one's complement checksum calculation.
///
/// Carries are accumulated in the upper half and only folded in when
/// the sum is finalized.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    inner: u32,
}

impl Checksum {
    /// Update the sum by adding the contents of `bytes`.
    ///
    /// An odd trailing byte is summed as if padded with a zero byte,
    /// so `bytes` should only be odd-length when it is the last chunk.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_add(self.inner, bytes);
    }

    /// Create a new rolling checksum, starting with the passed in
    /// `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        Self { inner: csum_add(0, bytes) }
    }

    /// Finalize the sum by adding up all the accumulated carries and
    /// returning the resulting value as a `u16`.
    pub fn finalize(&mut self) -> u16 {
        while (self.inner >> 16) != 0 {
            self.inner = (self.inner >> 16) + (self.inner & 0xFFFF);
        }

        (self.inner & 0xFFFF) as u16
    }
}

fn csum_add(mut csum: u32, bytes: &[u8]) -> u32 {
    let mut chunks = bytes.chunks_exact(2);

    for pair in &mut chunks {
        csum += u16::from_ne_bytes([pair[0], pair[1]]) as u32;
        csum = fold(csum);
    }

    if let [last] = chunks.remainder() {
        csum += u16::from_ne_bytes([*last, 0]) as u32;
    }

    csum
}

// Keep the accumulator from overflowing on very long inputs.
#[inline]
fn fold(csum: u32) -> u32 {
    if csum > 0xFFFF_0000 { (csum >> 16) + (csum & 0xFFFF) } else { csum }
}
