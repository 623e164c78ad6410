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
//! Utility module collection of functions

use std::path::{Path, PathBuf};

use time::{format_description, OffsetDateTime};

/// Directory in which the monitor stores its logs unless they are printed to stdout.
pub const CPU_LOG_DIR: &str = "cpu_log";

/// Initialize logging from `log4rs.yml`. Falls back to `pretty_env_logger` (configured through
/// `RUST_LOG`) if the config file cannot be loaded.
pub fn init_logging() {
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        pretty_env_logger::init();
        log::debug!("Cannot load log4rs.yml ({e}), using pretty_env_logger instead.");
    }
}

/// Produces a timestamp `String` of the current time in YYYY-MM-DD_HH-mm-SS format.
pub fn get_timestamp() -> String {
    // the format description is static and known to be valid
    let format = format_description::parse("[year]-[month]-[day]_[hour]-[minute]-[second]")
        .unwrap_or_default();
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .format(&format)
        .unwrap_or_default()
}

/// Current time in seconds since the UNIX epoch (UTC).
pub fn unix_timestamp() -> f64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 * 1e-9
}

/// Output file of a monitoring run started now, e.g., `cpu_log/cpu_log_2024-05-01_12-00-00.csv`.
pub fn default_output_path() -> PathBuf {
    Path::new(CPU_LOG_DIR).then_ts("cpu_log_{}.csv", &get_timestamp())
}

pub trait PathBufExt: Sized {
    fn then(self, p: impl AsRef<Path>) -> PathBuf;

    fn then_ts(self, p: impl AsRef<str>, ts: &str) -> PathBuf {
        self.then(p.as_ref().replacen("{}", ts, 1))
    }
}

impl PathBufExt for PathBuf {
    fn then(mut self, p: impl AsRef<Path>) -> PathBuf {
        self.push(p);
        self
    }
}

impl PathBufExt for &Path {
    fn then(self, p: impl AsRef<Path>) -> PathBuf {
        let mut path = self.to_path_buf();
        path.push(p);
        path
    }
}
