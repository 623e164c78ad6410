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
//! Start/stop signaling for the CPU monitor.
//!
//! The monitor is controlled by a level-triggered flag: it samples while the flag reads `1` and
//! stops as soon as it reads anything else. The flag usually lives in a small text file on the
//! router, written by the experiment runner, but it can also be a shared in-process flag.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Default location of the control file, relative to the working directory of the monitor.
pub const CPU_MONITOR_CONTROL_FILE: &str = ".router_lab_cpu_monitor_control";

/// Source of the start/stop flag polled by the sampler.
pub trait ControlSignal {
    /// Read the current value of the flag.
    fn read(&mut self) -> i64;

    /// Whether the monitor should (continue to) sample.
    fn is_active(&mut self) -> bool {
        self.read() == 1
    }
}

/// Read the control file and return its integer content. A missing file or content that does
/// not parse as an integer reads as `0`.
pub fn read_control(control_file: impl AsRef<Path>) -> i64 {
    fs::read_to_string(control_file.as_ref())
        .ok()
        .and_then(|content| content.trim().parse().ok())
        .unwrap_or(0)
}

/// Enable or disable the monitoring by writing `1` or `0` into the control file.
pub fn write_control(control_file: impl AsRef<Path>, enabled: bool) -> io::Result<()> {
    let control_file = control_file.as_ref();
    if let Some(parent) = control_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    log::debug!(
        "Setting {control_file:?} to {}",
        if enabled { "running" } else { "stopped" }
    );
    fs::write(control_file, format!("{}\n", enabled as i32))
}

/// Control signal backed by a file on disk.
#[derive(Debug, Clone)]
pub struct ControlFile {
    path: PathBuf,
}

impl ControlFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlSignal for ControlFile {
    fn read(&mut self) -> i64 {
        read_control(&self.path)
    }
}

/// Control signal shared between threads of the same process. Cloning yields a handle to the
/// same flag, so one handle can be given to the sampler while another one starts and stops it.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    running: Arc<AtomicBool>,
}

impl StopFlag {
    /// Create a new flag in the stopped state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl ControlSignal for StopFlag {
    fn read(&mut self) -> i64 {
        self.running.load(Ordering::SeqCst) as i64
    }
}
