// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod log;
pub mod pcap;

// Let's make our lives easier and pub use a bunch of stuff.
pub use ipid::api::EngineCfg;
pub use ipid::api::IfIndex;
pub use ipid::api::MarkCfg;
pub use ipid::api::Verdict;
pub use ipid::engine::Engine;
pub use ipid::engine::Outcome;
pub use ipid::engine::PacketHook;
pub use ipid::engine::ProcessError;
pub use ipid::engine::ident::Assigned;
pub use ipid::engine::ident::IdSource;
pub use ipid::engine::packet::Packet;
pub use ipid::engine::packet::PktBuf;
pub use ipid::provider::LogLevel;
pub use ipid::provider::Providers;
pub use log::CaptureLog;
pub use smoltcp::wire::IpProtocol;
pub use smoltcp::wire::Ipv4Address;
pub use std::sync::Arc;

use core::sync::atomic::AtomicU16;
use core::sync::atomic::Ordering;
use smoltcp::phy::ChecksumCapabilities;
use smoltcp::wire::EthernetAddress;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::EthernetRepr;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::Ipv4Repr;

pub const ETHER_HDR_LEN: usize = 14;

pub const GUEST_MAC: EthernetAddress =
    EthernetAddress([0xA8, 0x40, 0x25, 0xFA, 0xFA, 0x37]);
pub const GW_MAC: EthernetAddress =
    EthernetAddress([0xA8, 0x40, 0x25, 0xFF, 0x77, 0x77]);

/// An [`IdSource`] handing out `start, start + step, …`, so tests can
/// know every seed and random value in advance.
pub struct StepIdSource {
    next: AtomicU16,
    step: u16,
}

impl StepIdSource {
    pub fn new(start: u16, step: u16) -> Self {
        Self { next: AtomicU16::new(start), step }
    }
}

impl IdSource for StepIdSource {
    fn random_id(&self) -> u16 {
        self.next.fetch_add(self.step, Ordering::Relaxed)
    }
}

/// Build an engine with default masks, logging into a [`CaptureLog`].
pub fn test_engine(ids: Option<Box<dyn IdSource>>) -> (Engine, CaptureLog) {
    test_engine_cfg(EngineCfg::default(), ids)
}

pub fn test_engine_cfg(
    cfg: EngineCfg,
    ids: Option<Box<dyn IdSource>>,
) -> (Engine, CaptureLog) {
    let log = CaptureLog::new();
    let providers = Providers { log: Box::new(log.clone()) };
    let engine = match ids {
        Some(ids) => Engine::with_id_source(cfg, providers, ids),
        None => Engine::new(cfg, providers),
    };
    (engine, log)
}

/// Build the bytes of an IPv4/UDP datagram with a valid header
/// checksum and the given Identification.
pub fn ip4_bytes(ident: u16, payload_len: usize) -> Vec<u8> {
    let repr = Ipv4Repr {
        src_addr: Ipv4Address::new(10, 0, 0, 99),
        dst_addr: Ipv4Address::new(52, 10, 128, 69),
        next_header: IpProtocol::Udp,
        payload_len,
        hop_limit: 64,
    };

    let mut bytes = vec![0u8; repr.buffer_len() + payload_len];
    let mut ip = Ipv4Packet::new_unchecked(&mut bytes);
    repr.emit(&mut ip, &ChecksumCapabilities::default());
    ip.set_ident(ident);
    ip.fill_checksum();

    for (i, b) in bytes[repr.buffer_len()..].iter_mut().enumerate() {
        *b = i as u8;
    }

    bytes
}

/// Wrap an IPv4 datagram in an Ethernet frame.
pub fn ether_frame(l3: &[u8]) -> Vec<u8> {
    let eth = EthernetRepr {
        src_addr: GUEST_MAC,
        dst_addr: GW_MAC,
        ethertype: EthernetProtocol::Ipv4,
    };

    let mut bytes = vec![0u8; eth.buffer_len() + l3.len()];
    eth.emit(&mut EthernetFrame::new_unchecked(&mut bytes));
    bytes[eth.buffer_len()..].copy_from_slice(l3);
    bytes
}

/// A raw IPv4 packet carrying `mark`.
pub fn ip4_pkt(ident: u16, mark: u32) -> Packet {
    Packet::new(ip4_bytes(ident, 32), 0, mark)
}

/// An Ethernet-framed IPv4 packet carrying `mark`.
pub fn ether_ip4_pkt(ident: u16, mark: u32) -> Packet {
    Packet::new(ether_frame(&ip4_bytes(ident, 32)), ETHER_HDR_LEN, mark)
}

/// Read the Identification out of a packet, via smoltcp.
pub fn ident_of(pkt: &Packet) -> u16 {
    Ipv4Packet::new_checked(pkt.l3_bytes())
        .expect("valid IPv4 packet")
        .ident()
}

/// Verify the IPv4 header checksum of a packet, via smoltcp.
pub fn csum_ok(pkt: &Packet) -> bool {
    Ipv4Packet::new_checked(pkt.l3_bytes())
        .map(|ip| ip.verify_checksum())
        .unwrap_or(false)
}
