// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The per-packet entry point.

use super::ProcessError;
use super::ident;
use super::ident::Assigned;
use super::ident::IdSource;
use super::ident::OsIdSource;
use super::packet::Packet;
use super::seq::SeqStore;
use super::stat::Diag;
use super::stat::IpidStatsSnap;
use crate::VERSION;
use crate::api::API_VERSION;
use crate::api::EngineCfg;
use crate::api::HookSpec;
use crate::api::IfIndex;
use crate::api::PktClass;
use crate::api::Verdict;
use crate::provider::LogLevel;
use crate::provider::LogProvider;
use crate::provider::Providers;
use std::boxed::Box;
use std::vec::Vec;

/// Something the host can attach to its outbound packet path.
///
/// The host calls [`PacketHook::hook`] once per packet, from any
/// number of contexts at once, with the egress interface resolved by
/// routing.
pub trait PacketHook: Send + Sync {
    /// Where and at what priority the hook wants to be attached.
    fn spec(&self) -> HookSpec;

    fn hook(&self, pkt: &mut Packet, out: IfIndex) -> Verdict;
}

/// What processing did to a packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The packet was not captured and was not looked at.
    Ignored,
    /// The Identification was rewritten and the checksum fixed.
    Rewritten(Assigned),
}

/// The Identification rewriting engine.
///
/// An engine is built once, at start, and then shared by reference
/// with every packet-processing context. It owns all of its state: the
/// per-interface sequences and the diagnostic counters.
pub struct Engine {
    cfg: EngineCfg,
    seqs: SeqStore,
    diag: Diag,
    ids: Box<dyn IdSource>,
    log: Box<dyn LogProvider>,
}

impl Engine {
    pub fn new(cfg: EngineCfg, providers: Providers) -> Self {
        Self::with_id_source(cfg, providers, Box::new(OsIdSource))
    }

    /// Create an engine drawing random values from `ids`.
    pub fn with_id_source(
        cfg: EngineCfg,
        providers: Providers,
        ids: Box<dyn IdSource>,
    ) -> Self {
        let engine = Self {
            cfg,
            seqs: SeqStore::new(cfg.max_ifaces),
            diag: Diag::new(),
            ids,
            log: providers.log,
        };

        engine.log.log(
            LogLevel::Note,
            &format!(
                "ipid: started, version={VERSION} api={API_VERSION}, {}, \
                 hook={}",
                engine.cfg.marks,
                engine.spec(),
            ),
        );

        engine
    }

    pub fn cfg(&self) -> &EngineCfg {
        &self.cfg
    }

    /// Process a single outbound packet.
    ///
    /// Every outcome, including every error, is already accounted for
    /// in the engine's counters and log when this returns. On error
    /// the packet bytes are exactly as they were passed in.
    pub fn process(
        &self,
        pkt: &mut Packet,
        out: IfIndex,
    ) -> Result<Outcome, ProcessError> {
        let res = self.process_captured(pkt, out);
        match &res {
            Ok(Outcome::Rewritten(assigned)) => self.account(assigned, out),
            Ok(Outcome::Ignored) => {}
            Err(e) => self.account_err(e, out),
        }
        res
    }

    fn process_captured(
        &self,
        pkt: &mut Packet,
        out: IfIndex,
    ) -> Result<Outcome, ProcessError> {
        let class = self.cfg.marks.classify(pkt.mark());
        if class == PktClass::Ignore {
            return Ok(Outcome::Ignored);
        }

        let mut ip = pkt.ip4_hdr_mut()?;

        let assigned = if class == PktClass::Random {
            ident::assign_random(&*self.ids)
        } else {
            ident::assign_sequential(&self.seqs, out, &*self.ids)?
        };

        ip.set_ident(assigned.id());
        ip.compute_csum();
        Ok(Outcome::Rewritten(assigned))
    }

    fn account(&self, assigned: &Assigned, out: IfIndex) {
        if let Assigned::Sequential { new_iface: true, .. } = assigned {
            self.log.log(
                LogLevel::Note,
                &format!("ipid: found new interface, ifindex={out}"),
            );
        }

        if let Some(summary) = self.diag.modified(assigned.is_random()) {
            self.log.log(LogLevel::Note, &format!("ipid: {summary}"));
        }
    }

    fn account_err(&self, err: &ProcessError, out: IfIndex) {
        match err {
            ProcessError::NotWritable(_) => {
                if self.diag.not_writable() {
                    self.log.log(
                        LogLevel::Warn,
                        &format!(
                            "ipid: a packet was not writable ({err}); \
                             make sure the host has enough memory"
                        ),
                    );
                }
            }

            ProcessError::BadHdr(_) => self.diag.bad_hdr(),

            ProcessError::NoSeqState(_) => {
                if self.diag.alloc_fail() {
                    self.log.log(
                        LogLevel::Warn,
                        &format!(
                            "ipid: failed to create state for ifindex={out} \
                             ({err}); make sure the host has enough memory"
                        ),
                    );
                }
            }
        }
    }

    pub fn stats(&self) -> IpidStatsSnap {
        self.diag.snapshot()
    }

    /// The next sequential ID of every interface seen so far.
    pub fn dump_seqs(&self) -> Vec<(IfIndex, u16)> {
        self.seqs.dump()
    }

    /// The next sequential ID of `ifindex`, if it has been seen.
    #[cfg(any(feature = "test-help", test))]
    pub fn peek_next_id(&self, ifindex: IfIndex) -> Option<u16> {
        self.seqs.peek(ifindex)
    }
}

impl PacketHook for Engine {
    fn spec(&self) -> HookSpec {
        HookSpec::egress()
    }

    /// Run [`Engine::process`] and hand the packet back to the host.
    ///
    /// The verdict is always [`Verdict::Accept`].
    fn hook(&self, pkt: &mut Packet, out: IfIndex) -> Verdict {
        let _ = self.process(pkt, out);
        Verdict::Accept
    }
}
