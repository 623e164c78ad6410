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
//! Combine the CPU logs of several routers into a single csv file, sorted by timestamp.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use itertools::Itertools;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("No input files given.")]
    NoInput,
    #[error("Header of {0:?} does not match the header of the other logs.")]
    HeaderMismatch(PathBuf),
    #[error("{0:?} has no timestamp column.")]
    MissingTimestamp(PathBuf),
    #[error("Invalid timestamp {1:?} in {0:?}.")]
    InvalidTimestamp(PathBuf, String),
}

/// Read all rows of the given logs, sort them by timestamp, and write them to `output_path`.
/// All logs must have been written in the same mode on machines with the same number of cores.
/// Returns the number of rows written.
pub fn merge_logs<P: AsRef<Path>>(
    inputs: impl IntoIterator<Item = P>,
    output_path: impl AsRef<Path>,
) -> Result<usize, Error> {
    let mut header: Option<csv::StringRecord> = None;
    let mut timestamp_col = 0;
    let mut rows = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        let mut csv = csv::Reader::from_path(input)?;
        let input_header = csv.headers()?.clone();

        match &header {
            Some(h) if *h != input_header => return Err(Error::HeaderMismatch(input.into())),
            Some(_) => {}
            None => {
                timestamp_col = input_header
                    .iter()
                    .position(|h| h == "timestamp")
                    .ok_or_else(|| Error::MissingTimestamp(input.into()))?;
                header = Some(input_header);
            }
        }

        let mut num_rows = 0;
        for row in csv.into_records() {
            let row = row?;
            let timestamp: f64 = row
                .get(timestamp_col)
                .and_then(|ts| ts.parse().ok())
                .ok_or_else(|| {
                    Error::InvalidTimestamp(
                        input.into(),
                        row.get(timestamp_col).unwrap_or_default().to_string(),
                    )
                })?;
            rows.push((timestamp, row));
            num_rows += 1;
        }
        log::debug!("Read {num_rows} rows from {input:?}");
    }

    let header = header.ok_or(Error::NoInput)?;

    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut csv = csv::Writer::from_path(output_path)?;
    csv.write_record(&header)?;
    let num_rows = rows.len();
    for (_, row) in rows.into_iter().sorted_by(|a, b| a.0.total_cmp(&b.0)) {
        csv.write_record(&row)?;
    }
    csv.flush()?;

    log::info!("Merged {num_rows} rows into {output_path:?}");
    Ok(num_rows)
}
