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

use clap::{Parser, ValueEnum};

use trix_cpu_monitor::{
    control::{read_control, write_control, CPU_MONITOR_CONTROL_FILE},
    util,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Start (or resume) the monitoring.
    Start,
    /// Stop the monitoring, causing the monitor to write its log and exit.
    Stop,
    /// Print the current value of the control file.
    Status,
}

/// Start or stop a running CPU monitor through its control file.
#[derive(Parser, Debug)]
#[command(long_about = None)]
struct Args {
    /// Path to the control file.
    #[arg(short, long, default_value = CPU_MONITOR_CONTROL_FILE)]
    control_file: PathBuf,
    #[arg(value_enum)]
    action: Action,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();

    let args = Args::parse();
    match args.action {
        Action::Start => write_control(&args.control_file, true)?,
        Action::Stop => write_control(&args.control_file, false)?,
        Action::Status => println!("{}", read_control(&args.control_file)),
    }
    log::info!("{:?}: {:?}", args.action, args.control_file);

    Ok(())
}
