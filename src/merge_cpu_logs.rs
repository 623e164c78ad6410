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
use std::path::PathBuf;

use clap::Parser;

use trix_cpu_monitor::{merge::merge_logs, util};

/// Combine the CPU logs of several routers into a single csv file, sorted by timestamp.
#[derive(Parser, Debug)]
#[command(long_about = None)]
struct Args {
    /// Path of the combined csv file.
    #[arg(short, long, default_value = "cpu_log/cpu_monitoring.csv")]
    output: PathBuf,
    /// CPU logs to combine. All must have the same columns.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();

    let args = Args::parse();
    let num_rows = merge_logs(&args.inputs, &args.output)?;
    log::info!(
        "Combined {} logs with {num_rows} samples into {:?}",
        args.inputs.len(),
        args.output
    );

    Ok(())
}
