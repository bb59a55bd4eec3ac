// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! IPv4 headers.

use super::checksum::Checksum;
use super::checksum::HeaderChecksum;
use core::fmt;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV4_HDR_LEN_MASK: u8 = 0x0F;
pub const IPV4_HDR_VER_SHIFT: u8 = 4;
pub const IPV4_VERSION: u8 = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Ipv4HdrError {
    #[error("bad version: {vsn}")]
    BadVersion { vsn: u8 },

    #[error("header truncated: {hdr_len} bytes declared")]
    HeaderTruncated { hdr_len: usize },
}

/// Validate the first byte of an IPv4 header and return the header
/// length it declares, in bytes.
pub fn hdr_len_from(ver_hdr_len: u8) -> Result<usize, Ipv4HdrError> {
    let vsn = ver_hdr_len >> IPV4_HDR_VER_SHIFT;
    if vsn != IPV4_VERSION {
        return Err(Ipv4HdrError::BadVersion { vsn });
    }

    let hdr_len = usize::from(ver_hdr_len & IPV4_HDR_LEN_MASK) * 4;
    if hdr_len < Ipv4HdrRaw::SIZE {
        return Err(Ipv4HdrError::HeaderTruncated { hdr_len });
    }

    Ok(hdr_len)
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub dscp_ecn: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl Ipv4HdrRaw {
    pub const SIZE: usize = core::mem::size_of::<Self>();
}

/// A mutable view of an IPv4 header, options included.
///
/// This can only be had over bytes the caller owns exclusively; see
/// [`super::packet::Packet::ip4_hdr_mut`].
pub struct Ipv4HdrMut<'a> {
    base: &'a mut Ipv4HdrRaw,
    opts: &'a mut [u8],
}

impl<'a> Ipv4HdrMut<'a> {
    /// Interpret the front of `bytes` as an IPv4 header.
    ///
    /// Anything past the declared header length is left untouched.
    pub fn parse(bytes: &'a mut [u8]) -> Result<Self, Ipv4HdrError> {
        let first = *bytes
            .first()
            .ok_or(Ipv4HdrError::HeaderTruncated { hdr_len: 0 })?;
        let hdr_len = hdr_len_from(first)?;

        let avail = bytes.len();
        let (base, rest) = Ipv4HdrRaw::mut_from_prefix(bytes)
            .map_err(|_| Ipv4HdrError::HeaderTruncated { hdr_len: avail })?;
        let opts = rest
            .get_mut(..hdr_len - Ipv4HdrRaw::SIZE)
            .ok_or(Ipv4HdrError::HeaderTruncated { hdr_len })?;

        Ok(Self { base, opts })
    }

    /// Return the header length, in bytes.
    #[inline]
    pub fn hdr_len(&self) -> usize {
        Ipv4HdrRaw::SIZE + self.opts.len()
    }

    /// Return the Identification as a host integer.
    #[inline]
    pub fn ident(&self) -> u16 {
        u16::from_be_bytes(self.base.ident)
    }

    /// Set the Identification.
    ///
    /// `ident` is a host integer; it is stored in network order so
    /// that a sequence `n, n + 1, …` reads back as such on the wire.
    #[inline]
    pub fn set_ident(&mut self, ident: u16) {
        self.base.ident = ident.to_be_bytes();
    }

    #[inline]
    pub fn csum(&self) -> [u8; 2] {
        self.base.csum
    }

    /// Recompute the header checksum over the whole header, options
    /// included, and store it.
    pub fn compute_csum(&mut self) {
        self.base.csum = [0; 2];
        let mut csum = Checksum::compute(self.base.as_bytes());
        csum.add_bytes(self.opts);
        self.base.csum = HeaderChecksum::from(csum).bytes();
    }

    /// Does the stored checksum match the header contents?
    pub fn csum_valid(&self) -> bool {
        let mut csum = Checksum::compute(self.base.as_bytes());
        csum.add_bytes(self.opts);
        csum.finalize() == 0xFFFF
    }
}

impl fmt::Debug for Ipv4HdrMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Ipv4HdrMut")
            .field("hdr_len", &self.hdr_len())
            .field("ident", &self.ident())
            .field("csum", &self.csum())
            .finish()
    }
}
