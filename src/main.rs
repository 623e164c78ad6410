// TRIX: Inference of Transient Violation Times from Logged Routing Events or Collected BGP Messages
// Copyright (C) 2024-2025 Roland Schmid <roschmi@ethz.ch> and Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;

use trix_cpu_monitor::{prelude::*, util};

/// Monitor CPU usage of the BGP process.
#[derive(Parser, Debug)]
#[command(long_about = None)]
struct Args {
    /// RouterId of the monitored router.
    #[arg(short, long)]
    router_id: usize,
    /// Router name of the monitored router.
    #[arg(short = 'n', long, default_value = "")]
    router_name: String,
    /// Time interval between measurements in seconds.
    #[arg(short, long, default_value = "0.01", value_parser = parse_interval)]
    interval: Duration,
    /// Path to the control file. Monitoring starts once it contains `1` and stops as soon as it
    /// contains anything else.
    #[arg(short, long, default_value = CPU_MONITOR_CONTROL_FILE)]
    control_file: PathBuf,
    /// Print results to stdout instead of writing to a file.
    #[arg(long)]
    std_out: bool,
    /// Get CPU usage of all processes.
    #[arg(long)]
    all_processes: bool,
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{e}"))
}

fn write_log<R: SampleRecord>(log: &SampleLog<R>, output_path: Option<&Path>) -> csv::Result<()> {
    match output_path {
        Some(path) => log.write_to_file(path),
        None => log.print(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();

    let args = Args::parse();

    // prepare output file path based on current timestamp
    let output_path = (!args.std_out).then(util::default_output_path);

    let mut sampler = Sampler::new(
        SamplerConfig::new(args.router_id, args.router_name, args.interval),
        ControlFile::new(&args.control_file),
        ProcfsView::new(),
    );
    log::debug!("Monitoring with {:?}", sampler.config());

    if args.all_processes {
        let log = sampler.monitor_all_processes();
        write_log(&log, output_path.as_deref())?;
    } else {
        let log = sampler.monitor_bgp_cpu().inspect_err(|e| log::error!("{e}"))?;
        write_log(&log, output_path.as_deref())?;
    }

    Ok(())
}
