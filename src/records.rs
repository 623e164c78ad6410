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
//! Module defining the records collected by the CPU monitor and the log holding them until they
//! are written to CSV.
use std::{fs, io, path::Path, str::FromStr};

use itertools::Itertools;
use serde::{de::IntoDeserializer, Deserialize, Deserializer, Serialize, Serializer};

/// One row of a [`SampleLog`].
pub trait SampleRecord {
    /// Time at which the sample was taken, in seconds since the UNIX epoch.
    fn timestamp(&self) -> f64;

    /// Append this record as a single row to `csv`.
    fn write_row<W: io::Write>(&self, csv: &mut csv::Writer<W>) -> csv::Result<()>;
}

/// Separator of the entries of a list cell.
pub const LIST_SEPARATOR: char = ';';

/// Attributes of a single process, as collected in the all-processes mode. Attributes that the
/// OS did not reveal (e.g., due to missing permissions) are left empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub rid: usize,
    pub router_name: String,
    pub timestamp: f64,
    pub pid: u32,
    pub name: String,
    pub exe: Option<String>,
    /// CPU usage since the last sample in `[%]` of a single core.
    pub cpu_percent: Option<f64>,
    /// Resident memory relative to the total physical memory in `[%]`.
    pub memory_percent: Option<f64>,
    pub num_threads: Option<u64>,
    pub nice: Option<i64>,
    pub num_fds: Option<u64>,
    /// Regular files held open, written as a single cell joined by [`LIST_SEPARATOR`]. A path
    /// that itself contains the separator is split when the cell is read back.
    #[serde(serialize_with = "serialize_list", deserialize_with = "deserialize_list")]
    pub open_files: Vec<String>,
}

impl ProcessRecord {
    pub const HEADER: [&'static str; 12] = [
        "rid",
        "router_name",
        "timestamp",
        "pid",
        "name",
        "exe",
        "cpu_percent",
        "memory_percent",
        "num_threads",
        "nice",
        "num_fds",
        "open_files",
    ];
}

impl SampleRecord for ProcessRecord {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn write_row<W: io::Write>(&self, csv: &mut csv::Writer<W>) -> csv::Result<()> {
        csv.serialize(self)
    }
}

/// Record for CPU measurements relevant for BGP workloads. Fields `cpu`, `cores`, and the
/// per-process columns are given in `[%]`.
#[derive(Clone, Debug, PartialEq)]
pub struct BgpCpuRecord {
    pub rid: usize,
    pub router_name: String,
    pub timestamp: f64,
    /// The sum of the CPU usage of all cores. The maximum is `100.0 * cores.len()`.
    pub cpu: f64,
    /// Usage of each core, written as columns `cpu1`, `cpu2`, ...
    pub cores: Vec<f64>,
    pub bgp_cpu: f64,
    pub ipfib_cpu: f64,
    pub urib_cpu: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Column {0} is missing.")]
    MissingColumn(String),
    #[error("Cannot parse column {0}: {1:?}")]
    InvalidValue(String, String),
}

impl BgpCpuRecord {
    /// Build a record, computing the total CPU usage as the sum over all cores.
    pub fn new(
        rid: usize,
        router_name: impl Into<String>,
        timestamp: f64,
        cores: Vec<f64>,
        bgp_cpu: f64,
        ipfib_cpu: f64,
        urib_cpu: f64,
    ) -> Self {
        Self {
            rid,
            router_name: router_name.into(),
            timestamp,
            cpu: cores.iter().sum(),
            cores,
            bgp_cpu,
            ipfib_cpu,
            urib_cpu,
        }
    }

    /// Column names for a machine with `num_cpus` cores.
    pub fn header(num_cpus: usize) -> Vec<String> {
        ["rid", "router_name", "timestamp", "cpu"]
            .into_iter()
            .map(String::from)
            .chain((1..=num_cpus).map(|i| format!("cpu{i}")))
            .chain(["bgp_cpu", "ipfib_cpu", "urib_cpu"].map(String::from))
            .collect()
    }

    /// Parse a record from a CSV row, using `header` to locate the columns.
    pub fn from_csv(
        header: &csv::StringRecord,
        row: &csv::StringRecord,
    ) -> Result<Self, RecordError> {
        let num_cpus = header
            .iter()
            .filter(|h| {
                h.strip_prefix("cpu")
                    .is_some_and(|i| !i.is_empty() && i.bytes().all(|b| b.is_ascii_digit()))
            })
            .count();

        Ok(Self {
            rid: parse_column(header, row, "rid")?,
            router_name: column(header, row, "router_name")?.to_string(),
            timestamp: parse_column(header, row, "timestamp")?,
            cpu: parse_column(header, row, "cpu")?,
            cores: (1..=num_cpus)
                .map(|i| parse_column(header, row, &format!("cpu{i}")))
                .collect::<Result<_, _>>()?,
            bgp_cpu: parse_column(header, row, "bgp_cpu")?,
            ipfib_cpu: parse_column(header, row, "ipfib_cpu")?,
            urib_cpu: parse_column(header, row, "urib_cpu")?,
        })
    }

    fn fields(&self) -> Vec<String> {
        [self.rid.to_string(), self.router_name.clone()]
            .into_iter()
            .chain([self.timestamp, self.cpu].map(float_field))
            .chain(self.cores.iter().copied().map(float_field))
            .chain([self.bgp_cpu, self.ipfib_cpu, self.urib_cpu].map(float_field))
            .collect()
    }
}

impl SampleRecord for BgpCpuRecord {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn write_row<W: io::Write>(&self, csv: &mut csv::Writer<W>) -> csv::Result<()> {
        csv.write_record(self.fields())
    }
}

fn column<'a>(
    header: &csv::StringRecord,
    row: &'a csv::StringRecord,
    name: &str,
) -> Result<&'a str, RecordError> {
    header
        .iter()
        .position(|h| h == name)
        .and_then(|i| row.get(i))
        .ok_or_else(|| RecordError::MissingColumn(name.to_string()))
}

fn parse_column<T: FromStr>(
    header: &csv::StringRecord,
    row: &csv::StringRecord,
    name: &str,
) -> Result<T, RecordError> {
    let value = column(header, row, name)?;
    value
        .parse()
        .map_err(|_| RecordError::InvalidValue(name.to_string(), value.to_string()))
}

fn float_field(x: f64) -> String {
    format!("{x:?}")
}

/// Append-only log of samples of a single run. The record type fixes the shape of every row.
#[derive(Clone, Debug)]
pub struct SampleLog<R> {
    header: Vec<String>,
    records: Vec<R>,
}

impl<R: SampleRecord> SampleLog<R> {
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: R) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Write the header row followed by all records.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv.write_record(&self.header)?;
        for record in &self.records {
            record.write_row(&mut csv)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the log to `path`, creating its parent directories if necessary.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> csv::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        log::info!("Writing {} samples to {path:?}", self.len());
        self.write_csv(fs::File::create(path)?)
    }

    /// Print the log to stdout. The output goes through the same CSV writer as
    /// [`Self::write_csv`], so cells containing a comma (e.g., a router name) are quoted.
    pub fn print(&self) -> csv::Result<()> {
        self.write_csv(io::stdout().lock())
    }
}

fn serialize_list<S: Serializer, T: ToString>(
    list: &[T],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let separator = LIST_SEPARATOR.to_string();
    serializer.serialize_str(&list.iter().map(|x| x.to_string()).join(&separator))
}

fn deserialize_list<'de, D: Deserializer<'de>, T: Deserialize<'de>>(
    deserializer: D,
) -> Result<Vec<T>, D::Error> {
    let buf = String::deserialize(deserializer)?;
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    buf.split(LIST_SEPARATOR)
        .map(|x| T::deserialize(x.into_deserializer()))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn process(pid: u32, open_files: Vec<&str>) -> ProcessRecord {
        ProcessRecord {
            rid: 3,
            router_name: "Zurich".to_string(),
            timestamp: 1700000000.25,
            pid,
            name: "bgp".to_string(),
            exe: Some("/isan/bin/bgp".to_string()),
            cpu_percent: Some(12.5),
            memory_percent: None,
            num_threads: Some(4),
            nice: Some(-5),
            num_fds: Some(17),
            open_files: open_files.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn bgp_cpu_header() {
        assert_eq!(
            BgpCpuRecord::header(2),
            vec![
                "rid",
                "router_name",
                "timestamp",
                "cpu",
                "cpu1",
                "cpu2",
                "bgp_cpu",
                "ipfib_cpu",
                "urib_cpu"
            ]
        );
    }

    #[test]
    fn bgp_cpu_total_is_sum_of_cores() {
        let record = BgpCpuRecord::new(0, "", 1.0, vec![10.0, 20.5, 0.0, 3.25], 1.0, 2.0, 3.0);
        assert_eq!(record.cpu, 33.75);
    }

    #[test]
    fn serialize_bgp_cpu_log() {
        let mut log = SampleLog::new(BgpCpuRecord::header(2));
        log.push(BgpCpuRecord::new(1, "r1", 2.5, vec![0.0, 50.0], 10.0, 0.0, 1.5));

        let mut buffer = Vec::new();
        log.write_csv(&mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "rid,router_name,timestamp,cpu,cpu1,cpu2,bgp_cpu,ipfib_cpu,urib_cpu\n\
             1,r1,2.5,50.0,0.0,50.0,10.0,0.0,1.5\n"
        );
    }

    #[test]
    fn read_back_bgp_cpu_log() {
        let mut log = SampleLog::new(BgpCpuRecord::header(3));
        for i in 0..5 {
            log.push(BgpCpuRecord::new(
                7,
                "Basel",
                i as f64 * 0.1,
                vec![i as f64, 2.0, 3.5],
                1.0,
                2.0,
                3.0,
            ));
        }
        let mut buffer = Vec::new();
        log.write_csv(&mut buffer).unwrap();

        let mut csv = csv::Reader::from_reader(buffer.as_slice());
        let header = csv.headers().unwrap().clone();
        assert_eq!(header.iter().collect_vec(), log.header());
        let records: Vec<BgpCpuRecord> = csv
            .records()
            .map(|row| BgpCpuRecord::from_csv(&header, &row.unwrap()).unwrap())
            .collect();
        assert_eq!(records, log.records());
    }

    #[test]
    fn read_back_process_log() {
        let mut log = SampleLog::new(ProcessRecord::HEADER);
        log.push(process(1, vec![]));
        log.push(process(2, vec!["/var/log/bgp.log"]));
        log.push(process(3, vec!["/tmp/a", "/tmp/b"]));

        let mut buffer = Vec::new();
        log.write_csv(&mut buffer).unwrap();

        let mut csv = csv::Reader::from_reader(buffer.as_slice());
        assert_eq!(
            csv.headers().unwrap().iter().collect_vec(),
            ProcessRecord::HEADER
        );
        let records: Vec<ProcessRecord> = csv.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(records, log.records());
    }

    #[test]
    fn open_files_with_commas() {
        let mut log = SampleLog::new(ProcessRecord::HEADER);
        log.push(process(5, vec!["/data/run 1, final.csv", "/tmp/b"]));

        let mut buffer = Vec::new();
        log.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.ends_with(",17,\"/data/run 1, final.csv;/tmp/b\"\n"));

        let mut csv = csv::Reader::from_reader(buffer.as_slice());
        let records: Vec<ProcessRecord> = csv.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(records, log.records());
    }

    #[test]
    fn cells_with_commas_are_quoted() {
        let mut log = SampleLog::new(BgpCpuRecord::header(1));
        log.push(BgpCpuRecord::new(1, "Zurich, ETH", 2.5, vec![50.0], 10.0, 0.0, 1.5));

        let mut buffer = Vec::new();
        log.write_csv(&mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer.clone()).unwrap().lines().nth(1),
            Some("1,\"Zurich, ETH\",2.5,50.0,50.0,10.0,0.0,1.5")
        );

        let mut csv = csv::Reader::from_reader(buffer.as_slice());
        let header = csv.headers().unwrap().clone();
        let row = csv.records().next().unwrap().unwrap();
        assert_eq!(
            BgpCpuRecord::from_csv(&header, &row).unwrap().router_name,
            "Zurich, ETH"
        );
    }

    #[test]
    fn missing_column() {
        let header = csv::StringRecord::from(vec!["rid", "router_name", "timestamp"]);
        let row = csv::StringRecord::from(vec!["0", "", "1.0"]);
        assert!(matches!(
            BgpCpuRecord::from_csv(&header, &row),
            Err(RecordError::MissingColumn(c)) if c == "cpu"
        ));
    }

    #[test]
    fn write_to_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpu_log").join("run.csv");
        let mut log = SampleLog::new(ProcessRecord::HEADER);
        log.push(process(42, vec![]));
        log.write_to_file(&path).unwrap();

        let mut csv = csv::Reader::from_path(&path).unwrap();
        assert_eq!(csv.records().count(), 1);
    }
}
