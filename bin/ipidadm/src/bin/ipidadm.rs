// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use std::path::PathBuf;

use clap::Args;
use clap::Parser;

use ipid::VERSION;
use ipid::api::EngineCfg;
use ipid::api::IfIndex;
use ipid::api::parse_mask;
use ipidadm::API_VERSION;
use ipidadm::MAJOR_VERSION;
use ipidadm::ReplayOpts;
use ipidadm::ShowCfg;

/// Rewrite IPv4 Identification values of marked packets
#[derive(Debug, Parser)]
#[command(version=ipid_pkg_version())]
enum Command {
    /// Run every frame of a capture file through the engine.
    Replay {
        /// The capture file to read.
        #[arg(long)]
        input: PathBuf,

        /// Where to write the processed frames.
        #[arg(long)]
        output: PathBuf,

        /// The mark every IPv4 frame carries, in hex (0x...) or
        /// decimal.
        #[arg(long, value_parser = parse_mask, default_value = "0x10")]
        mark: u32,

        /// The egress interface every IPv4 frame leaves through.
        #[arg(long, default_value_t = 1)]
        ifindex: i32,

        #[command(flatten)]
        cfg: CfgArgs,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective engine configuration.
    ShowConfig {
        #[command(flatten)]
        cfg: CfgArgs,

        /// Print the configuration as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Clone, Debug)]
struct CfgArgs {
    /// A TOML file holding the engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the capture mask.
    #[arg(long, value_parser = parse_mask)]
    capture_mask: Option<u32>,

    /// Override the random mask.
    #[arg(long, value_parser = parse_mask)]
    random_mask: Option<u32>,
}

impl CfgArgs {
    fn resolve(&self) -> anyhow::Result<EngineCfg> {
        let mut cfg = ipidadm::load_cfg(self.config.as_deref())?;
        if let Some(capture) = self.capture_mask {
            cfg.marks.capture = capture;
        }
        if let Some(random) = self.random_mask {
            cfg.marks.random = random;
        }
        Ok(cfg)
    }
}

fn ipid_pkg_version() -> String {
    format!("{MAJOR_VERSION}.{API_VERSION} ({VERSION})")
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    match cmd {
        Command::Replay { input, output, mark, ifindex, cfg, json } => {
            let cfg = cfg.resolve()?;
            let engine = ipidadm::new_engine(cfg, ipidadm::term_logger());
            let opts = ReplayOpts { mark, ifindex: IfIndex(ifindex) };
            let report = ipidadm::replay(&engine, &input, &output, opts)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                ipidadm::print_report(&report)?;
            }
        }

        Command::ShowConfig { cfg, json } => {
            let show = ShowCfg::from(&cfg.resolve()?);
            if json {
                println!("{}", serde_json::to_string_pretty(&show)?);
            } else {
                ipidadm::print_cfg_into(&mut std::io::stdout(), &show)?;
            }
        }
    }

    Ok(())
}
