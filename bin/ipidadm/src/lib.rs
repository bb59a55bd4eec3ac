// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A userland host for the ipid engine.
//!
//! The host plays the part of the kernel's outbound packet path: it
//! reads frames from a capture file, resolves the IPv4 header offset,
//! hands each one to the engine's hook with a caller-chosen mark and
//! egress interface, and writes every frame back out.

use ipid::api::EngineCfg;
use ipid::api::HookSpec;
use ipid::api::IfIndex;
use ipid::api::MarkCfg;
use ipid::engine::Engine;
use ipid::engine::PacketHook;
use ipid::engine::packet::Packet;
use ipid::engine::stat::IpidStatsSnap;
use ipid::provider::LogLevel;
use ipid::provider::LogProvider;
use ipid::provider::Providers;
use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use serde::Deserialize;
use serde::Serialize;
use slog::Drain;
use std::io::Write;
use std::path::Path;
use tabwriter::TabWriter;

pub use ipid::api::API_VERSION;
pub use ipid::api::MAJOR_VERSION;

/// The ethertype of IPv4, as found in an Ethernet header.
const ETHERTYPE_IPV4: [u8; 2] = [0x08, 0x00];
const ETHER_HDR_LEN: usize = 14;

/// Link type of raw IPv4 captures (`LINKTYPE_IPV4`).
const LINKTYPE_IPV4: Linktype = Linktype(228);

/// Errors encountered by the host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("malformed capture file: {0}")]
    Pcap(String),

    #[error("failed to write capture file: {0}")]
    PcapWrite(String),

    #[error("unsupported link type: {0}")]
    UnsupportedLinktype(i32),
}

/// A [`LogProvider`] which hands engine messages to a `slog` logger.
pub struct SlogLog {
    log: slog::Logger,
}

impl SlogLog {
    pub fn new(log: slog::Logger) -> Self {
        Self { log }
    }
}

impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Note => slog::info!(self.log, "{}", msg),
            LogLevel::Warn => slog::warn!(self.log, "{}", msg),
            LogLevel::Error => slog::error!(self.log, "{}", msg),
        }
    }
}

/// Build the terminal logger used by `ipidadm`.
///
/// The level filter is taken from `RUST_LOG`, as with `env_logger`.
pub fn term_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!("component" => "ipid"))
}

/// Load an engine configuration from a TOML file, or use the defaults
/// if no path is given. Fields missing from the file take their
/// default values.
pub fn load_cfg(path: Option<&Path>) -> Result<EngineCfg, Error> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&text)?)
        }
        None => Ok(EngineCfg::default()),
    }
}

/// Where to find the IPv4 header of a frame, if it has one.
pub fn l3_offset(network: Linktype, frame: &[u8]) -> Option<usize> {
    match network {
        Linktype::ETHERNET => {
            let ethertype = frame.get(12..ETHER_HDR_LEN)?;
            (ethertype == ETHERTYPE_IPV4).then_some(ETHER_HDR_LEN)
        }

        Linktype::RAW | LINKTYPE_IPV4 => {
            let first = frame.first()?;
            (first >> 4 == 4).then_some(0)
        }

        _ => None,
    }
}

/// How each frame of a replay is presented to the engine.
#[derive(Clone, Copy, Debug)]
pub struct ReplayOpts {
    /// The mark every IPv4 frame carries.
    pub mark: u32,
    /// The egress interface every IPv4 frame leaves through.
    pub ifindex: IfIndex,
}

/// The outcome of a replay.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReplayReport {
    /// Every frame read, and written back out.
    pub frames: u32,
    /// Frames that were not IPv4 and so never reached the engine.
    pub non_ip: u32,
    pub stats: IpidStatsSnap,
    /// The next sequential ID of each interface seen.
    pub seqs: Vec<(IfIndex, u16)>,
}

/// Run every frame of the capture file at `input` through `engine`,
/// writing the results to `output`.
pub fn replay(
    engine: &Engine,
    input: &Path,
    output: &Path,
    opts: ReplayOpts,
) -> Result<ReplayReport, Error> {
    let data = std::fs::read(input)?;
    let (mut rest, in_hdr) = pcap::parse_pcap_header(&data)
        .map_err(|e| Error::Pcap(format!("bad header: {e:?}")))?;

    let network = in_hdr.network;
    if !matches!(network, Linktype::ETHERNET | Linktype::RAW | LINKTYPE_IPV4) {
        return Err(Error::UnsupportedLinktype(network.0));
    }

    let mut out_hdr = PcapHeader {
        magic_number: if in_hdr.is_nanosecond_precision() {
            0xa1b23c4d
        } else {
            0xa1b2c3d4
        },
        version_major: 2,
        version_minor: 4,
        thiszone: 0,
        sigfigs: 0,
        snaplen: in_hdr.snaplen,
        network,
    };

    let mut out = std::io::BufWriter::new(std::fs::File::create(output)?);
    out.write_all(&out_hdr.to_vec().map_err(pcap_write_err)?)?;

    let mut frames = 0;
    let mut non_ip = 0;

    while !rest.is_empty() {
        let res = if in_hdr.is_bigendian() {
            pcap::parse_pcap_frame_be(rest)
        } else {
            pcap::parse_pcap_frame(rest)
        };
        let (next, block) = res.map_err(|e| {
            Error::Pcap(format!("bad frame {}: {e:?}", frames + 1))
        })?;
        rest = next;
        frames += 1;

        let bytes = match l3_offset(network, block.data) {
            Some(l3_off) => {
                let mut pkt =
                    Packet::new(block.data.to_vec(), l3_off, opts.mark);
                let _ = engine.hook(&mut pkt, opts.ifindex);
                pkt.into_buf().into_vec()
            }

            None => {
                non_ip += 1;
                block.data.to_vec()
            }
        };

        let mut out_block = LegacyPcapBlock {
            ts_sec: block.ts_sec,
            ts_usec: block.ts_usec,
            caplen: bytes.len() as u32,
            origlen: block.origlen,
            data: &bytes,
        };
        out.write_all(&out_block.to_vec().map_err(pcap_write_err)?)?;
    }

    out.flush()?;

    Ok(ReplayReport {
        frames,
        non_ip,
        stats: engine.stats(),
        seqs: engine.dump_seqs(),
    })
}

fn pcap_write_err(e: impl core::fmt::Debug) -> Error {
    Error::PcapWrite(format!("{e:?}"))
}

/// Build an engine which logs through `log`.
pub fn new_engine(cfg: EngineCfg, log: slog::Logger) -> Engine {
    Engine::new(cfg, Providers { log: Box::new(SlogLog::new(log)) })
}

/// Print a [`ReplayReport`].
pub fn print_report(report: &ReplayReport) -> std::io::Result<()> {
    print_report_into(&mut std::io::stdout(), report)
}

/// Print a [`ReplayReport`] into a given writer.
pub fn print_report_into(
    writer: &mut impl Write,
    report: &ReplayReport,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    let stats = &report.stats;

    writeln!(t, "FRAMES\tNON-IP\tMODIFIED\tSEQUENTIAL\tRANDOM")?;
    writeln!(
        t,
        "{}\t{}\t{}\t{}\t{}",
        report.frames,
        report.non_ip,
        stats.modified,
        stats.sequential(),
        stats.random,
    )?;
    t.flush()?;

    writeln!(t)?;
    writeln!(t, "NOT WRITABLE\tALLOC FAIL\tBAD HDR")?;
    writeln!(
        t,
        "{}\t{}\t{}",
        stats.not_writable, stats.alloc_fail, stats.bad_hdr,
    )?;
    t.flush()?;

    if !report.seqs.is_empty() {
        writeln!(t)?;
        writeln!(t, "IFINDEX\tNEXT ID")?;
        for (ifindex, next) in &report.seqs {
            writeln!(t, "{ifindex}\t0x{next:04x}")?;
        }
    }
    t.flush()
}

/// The effective configuration, as shown by `show-config`.
#[derive(Clone, Debug, Serialize)]
pub struct ShowCfg {
    pub marks: MarkCfg,
    pub max_ifaces: u32,
    pub hook: String,
}

impl From<&EngineCfg> for ShowCfg {
    fn from(cfg: &EngineCfg) -> Self {
        Self {
            marks: cfg.marks,
            max_ifaces: cfg.max_ifaces.get(),
            hook: HookSpec::egress().to_string(),
        }
    }
}

/// Print a [`ShowCfg`] into a given writer.
pub fn print_cfg_into(
    writer: &mut impl Write,
    cfg: &ShowCfg,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "CAPTURE MASK\tRANDOM MASK\tMAX IFACES\tHOOK")?;
    writeln!(
        t,
        "0x{:08x}\t0x{:08x}\t{}\t{}",
        cfg.marks.capture, cfg.marks.random, cfg.max_ifaces, cfg.hook,
    )?;
    t.flush()
}
