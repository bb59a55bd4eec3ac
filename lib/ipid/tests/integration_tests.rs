// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Integration tests.
//!
//! These drive the engine through its public entry points the way a
//! host would, and check the resulting bytes with an independent IPv4
//! implementation (smoltcp).

use core::num::NonZeroU32;
use ipid::engine::ident::OsIdSource;
use ipid::engine::ip4::Ipv4HdrError;
use ipid::engine::packet::WriteError;
use ipid::engine::seq::SeqError;
use ipid_test_utils::*;
use itertools::Itertools;
use std::sync::Barrier;
use std::thread;

const SEQ: u32 = 0x10;
const RAND: u32 = 0x30;

#[test]
fn unmarked_packets_pass_through_untouched() {
    let (engine, log) = test_engine(None);

    for mark in [0x0, 0x20, 0x01, 0xFFFF_FFEF] {
        let mut pkt = ip4_pkt(0xABCD, mark);
        let before = pkt.bytes().to_vec();

        assert_eq!(engine.process(&mut pkt, IfIndex(5)), Ok(Outcome::Ignored));
        assert_eq!(pkt.bytes(), &before[..]);
    }

    assert_eq!(engine.stats(), Default::default());
    assert!(engine.dump_seqs().is_empty());
    assert_eq!(log.count("found new interface"), 0);
}

#[test]
fn sequential_ids_increment_on_the_wire() {
    let (engine, log) =
        test_engine(Some(Box::new(StepIdSource::new(0x1234, 1))));

    let ids = (0..4)
        .map(|_| {
            let mut pkt = ip4_pkt(0, SEQ);
            assert_eq!(engine.hook(&mut pkt, IfIndex(3)), Verdict::Accept);
            assert!(csum_ok(&pkt));
            ident_of(&pkt)
        })
        .collect::<Vec<_>>();

    assert_eq!(ids, vec![0x1234, 0x1235, 0x1236, 0x1237]);

    // Read back as network byte order.
    let mut pkt = ip4_pkt(0, SEQ);
    engine.hook(&mut pkt, IfIndex(3));
    assert_eq!(&pkt.l3_bytes()[4..6], &[0x12, 0x38]);

    assert_eq!(log.matching("found new interface"), vec![
        "ipid: found new interface, ifindex=3".to_string()
    ]);
    assert_eq!(engine.peek_next_id(IfIndex(3)), Some(0x1239));
}

#[test]
fn sequential_wraps_around() {
    let (engine, _log) =
        test_engine(Some(Box::new(StepIdSource::new(0xFFFE, 1))));

    let ids = (0..4)
        .map(|_| {
            let mut pkt = ip4_pkt(0x7777, SEQ);
            engine.hook(&mut pkt, IfIndex(1));
            assert!(csum_ok(&pkt));
            ident_of(&pkt)
        })
        .collect::<Vec<_>>();

    assert_eq!(ids, vec![0xFFFE, 0xFFFF, 0x0000, 0x0001]);
}

#[test]
fn interfaces_have_independent_sequences() {
    let (engine, log) =
        test_engine(Some(Box::new(StepIdSource::new(100, 1000))));

    let next = |ifindex| {
        let mut pkt = ip4_pkt(0, SEQ);
        engine.hook(&mut pkt, IfIndex(ifindex));
        ident_of(&pkt)
    };

    // Seeds are drawn in order of first appearance.
    assert_eq!(next(1), 100);
    assert_eq!(next(2), 1100);
    assert_eq!(next(1), 101);
    assert_eq!(next(1), 102);
    assert_eq!(next(2), 1101);

    assert_eq!(engine.dump_seqs(), vec![(IfIndex(1), 103), (IfIndex(2), 1102)]);
    assert_eq!(log.count("found new interface"), 2);
}

// Marks 0x10, 0x10, 0x30 all leaving through ifindex 5: the two
// sequential packets get consecutive values and the random one does
// not disturb the sequence.
#[test]
fn random_does_not_touch_sequence() {
    let (engine, log) =
        test_engine(Some(Box::new(StepIdSource::new(0x4000, 0x0101))));

    let mut p1 = ip4_pkt(1, SEQ);
    let mut p2 = ip4_pkt(2, SEQ);
    let mut p3 = ip4_pkt(3, RAND);

    let o1 = engine.process(&mut p1, IfIndex(5)).unwrap();
    let o2 = engine.process(&mut p2, IfIndex(5)).unwrap();
    let o3 = engine.process(&mut p3, IfIndex(5)).unwrap();

    assert_eq!(
        o1,
        Outcome::Rewritten(Assigned::Sequential { id: 0x4000, new_iface: true })
    );
    assert_eq!(
        o2,
        Outcome::Rewritten(Assigned::Sequential {
            id: 0x4001,
            new_iface: false,
        })
    );
    assert_eq!(o3, Outcome::Rewritten(Assigned::Random(0x4101)));

    assert_eq!(ident_of(&p1), 0x4000);
    assert_eq!(ident_of(&p2), 0x4001);
    assert_eq!(ident_of(&p3), 0x4101);
    assert!([&p1, &p2, &p3].iter().all(|p| csum_ok(p)));
    assert_eq!(engine.peek_next_id(IfIndex(5)), Some(0x4002));

    let stats = engine.stats();
    assert_eq!(stats.modified, 3);
    assert_eq!(stats.random, 1);
    assert_eq!(stats.sequential(), 2);

    // The summary at two modified packets, before the random one.
    assert_eq!(log.matching("modified"), vec![
        "ipid: modified 2 packets, 2 sequential, 0 random; 0 packets not \
         writable"
            .to_string()
    ]);
}

#[test]
fn random_only_never_creates_state() {
    let (engine, log) = test_engine(None);

    for _ in 0..32 {
        let mut pkt = ip4_pkt(0, RAND);
        engine.hook(&mut pkt, IfIndex(9));
        assert!(csum_ok(&pkt));
    }

    assert!(engine.dump_seqs().is_empty());
    assert_eq!(engine.stats().random, 32);
    assert_eq!(log.count("found new interface"), 0);
}

#[test]
fn only_ident_and_csum_change() {
    let (engine, _log) = test_engine(Some(Box::new(OsIdSource)));

    let mut pkt = ether_ip4_pkt(0x0F0F, RAND);
    let before = pkt.bytes().to_vec();
    engine.hook(&mut pkt, IfIndex(2));
    assert!(csum_ok(&pkt));

    // Ident sits at L3 bytes 4..6 and the checksum at 10..12.
    let l3 = ETHER_HDR_LEN;
    let changed = before
        .iter()
        .zip(pkt.bytes())
        .positions(|(a, b)| a != b)
        .collect::<Vec<_>>();
    assert!(
        changed.iter().all(|i| [l3 + 4, l3 + 5, l3 + 10, l3 + 11].contains(i)),
        "unexpected bytes changed: {changed:?}"
    );
    assert_eq!(pkt.bytes().len(), before.len());
}

#[test]
fn header_options_covered_by_checksum() {
    let (engine, _log) =
        test_engine(Some(Box::new(StepIdSource::new(0xBEEF, 1))));

    // Stretch a 20-byte header to 24 with a NOP/NOP/NOP/EOL option.
    let base = ip4_bytes(0, 8);
    let mut bytes = Vec::with_capacity(base.len() + 4);
    bytes.extend_from_slice(&base[..20]);
    bytes.extend_from_slice(&[1, 1, 1, 0]);
    bytes.extend_from_slice(&base[20..]);
    bytes[0] = 0x46;
    let total = (bytes.len() as u16).to_be_bytes();
    bytes[2..4].copy_from_slice(&total);

    let mut pkt = Packet::new(ether_frame(&bytes), ETHER_HDR_LEN, SEQ);
    assert!(!csum_ok(&pkt));

    engine.hook(&mut pkt, IfIndex(4));
    assert!(csum_ok(&pkt));
    assert_eq!(ident_of(&pkt), 0xBEEF);
    assert_eq!(&pkt.l3_bytes()[20..24], &[1, 1, 1, 0]);
}

#[test]
fn shared_buffer_is_copied() {
    let (engine, _log) =
        test_engine(Some(Box::new(StepIdSource::new(0x0042, 1))));

    let mut pkt = ether_ip4_pkt(0x1111, SEQ);
    let tap = pkt.clone();
    assert!(pkt.buf().is_shared());

    engine.hook(&mut pkt, IfIndex(1));

    assert_eq!(ident_of(&pkt), 0x0042);
    assert!(csum_ok(&pkt));
    assert_eq!(ident_of(&tap), 0x1111);
    assert!(csum_ok(&tap));
    assert!(!pkt.buf().is_shared());
}

#[test]
fn truncated_packet_fails_open() {
    let (engine, log) = test_engine(None);

    // Claims a 60-byte header but only 20 bytes are present.
    let mut bytes = ip4_bytes(0x2222, 0);
    bytes[0] = 0x4F;
    let mut pkt = Packet::new(bytes.clone(), 0, SEQ);

    assert_eq!(
        engine.process(&mut pkt, IfIndex(1)),
        Err(ProcessError::NotWritable(WriteError::NotEnoughBytes {
            needed: 60,
            avail: 20,
        }))
    );
    assert_eq!(pkt.bytes(), &bytes[..]);

    // Again, through the hook, which must still accept.
    let mut pkt = Packet::new(bytes.clone(), 0, SEQ);
    assert_eq!(engine.hook(&mut pkt, IfIndex(1)), Verdict::Accept);
    assert_eq!(pkt.bytes(), &bytes[..]);

    assert_eq!(engine.stats().not_writable, 2);
    assert_eq!(engine.stats().modified, 0);
    assert!(engine.dump_seqs().is_empty());

    // Warned only once.
    let warns = log
        .msgs()
        .into_iter()
        .filter(|(lvl, _)| *lvl == LogLevel::Warn)
        .collect::<Vec<_>>();
    assert_eq!(warns.len(), 1);
    assert!(warns[0].1.contains("not writable"));
}

#[test]
fn non_ipv4_fails_open() {
    let (engine, log) = test_engine(None);

    let mut bytes = ip4_bytes(0x3333, 8);
    bytes[0] = 0x65;
    let mut pkt = Packet::new(bytes.clone(), 0, SEQ);

    assert_eq!(
        engine.process(&mut pkt, IfIndex(1)),
        Err(ProcessError::BadHdr(Ipv4HdrError::BadVersion { vsn: 6 }))
    );
    assert_eq!(pkt.bytes(), &bytes[..]);
    assert_eq!(engine.stats().bad_hdr, 1);
    assert!(engine.dump_seqs().is_empty());
    assert!(log.msgs().iter().all(|(lvl, _)| *lvl == LogLevel::Note));
}

#[test]
fn iface_limit_fails_open() {
    let cfg = EngineCfg {
        max_ifaces: NonZeroU32::new(1).unwrap(),
        ..Default::default()
    };
    let (engine, log) =
        test_engine_cfg(cfg, Some(Box::new(StepIdSource::new(10, 1))));

    let mut pkt = ip4_pkt(0, SEQ);
    engine.hook(&mut pkt, IfIndex(1));
    assert_eq!(ident_of(&pkt), 10);

    for _ in 0..3 {
        let mut pkt = ip4_pkt(0x5555, SEQ);
        let before = pkt.bytes().to_vec();
        assert_eq!(
            engine.process(&mut pkt, IfIndex(2)),
            Err(ProcessError::NoSeqState(SeqError::MaxCapacity(1)))
        );
        assert_eq!(pkt.bytes(), &before[..]);
    }

    // Random traffic on the untracked interface is still rewritten.
    let mut pkt = ip4_pkt(0x5555, RAND);
    assert_eq!(engine.hook(&mut pkt, IfIndex(2)), Verdict::Accept);
    assert_ne!(ident_of(&pkt), 0x5555);
    assert!(csum_ok(&pkt));

    let stats = engine.stats();
    assert_eq!(stats.alloc_fail, 3);
    assert_eq!(stats.modified, 2);
    assert_eq!(engine.dump_seqs(), vec![(IfIndex(1), 11)]);
    assert_eq!(log.count("failed to create state for ifindex=2"), 1);
}

#[test]
fn summary_cadence() {
    let (engine, log) = test_engine(None);

    for _ in 0..1100 {
        let mut pkt = ip4_pkt(0, SEQ);
        engine.hook(&mut pkt, IfIndex(1));
    }

    let due = log
        .matching("ipid: modified")
        .iter()
        .map(|m| {
            m.trim_start_matches("ipid: modified ")
                .split(' ')
                .next()
                .unwrap()
                .parse::<u32>()
                .unwrap()
        })
        .collect::<Vec<_>>();

    assert_eq!(due, vec![2, 4, 8, 16, 32, 64, 128, 256, 512, 1024]);
}

#[test]
fn startup_is_logged() {
    let (engine, log) = test_engine(None);
    let started = log.matching("ipid: started");

    assert_eq!(started.len(), 1);
    assert!(started[0].contains("capture=0x10 random=0x20"));
    assert!(started[0].contains(&format!("{}", engine.spec())));
}

#[test]
fn concurrent_first_access() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let (engine, log) = test_engine(None);
    let engine = Arc::new(engine);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles = (0..THREADS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|_| {
                        let mut pkt = ip4_pkt(0, SEQ);
                        engine.hook(&mut pkt, IfIndex(7));
                        assert!(csum_ok(&pkt));
                        ident_of(&pkt)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    let ids = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect::<Vec<_>>();

    // One sequence, no value handed out twice, no gaps.
    let total = THREADS * PER_THREAD;
    let next = engine.peek_next_id(IfIndex(7)).unwrap();
    let seed = next.wrapping_sub(total as u16);
    let mut expected =
        (0..total).map(|i| seed.wrapping_add(i as u16)).collect::<Vec<_>>();
    let mut got = ids.clone();
    expected.sort_unstable();
    got.sort_unstable();
    assert_eq!(got, expected);
    assert_eq!(ids.iter().unique().count(), total);

    assert_eq!(log.count("found new interface"), 1);
    assert_eq!(engine.stats().modified, total as u32);
}
