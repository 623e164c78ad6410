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
//! The sampling loop of the CPU monitor.
//!
//! The sampler waits until its [`ControlSignal`] reads `1`, then samples at a fixed interval
//! until the signal reads anything else. All samples are kept in memory and returned as a
//! [`SampleLog`] once the loop terminates.
//!
//! Two modes are available:
//! - [`Sampler::monitor_bgp_cpu`] records one row per interval with the utilization of each core
//!   and of the `bgp`, `ipfib`, and `urib` processes.
//! - [`Sampler::monitor_all_processes`] records one row per process. Note that in this mode the
//!   sampler sleeps for one interval after *every process*, and checks the control signal after
//!   every process as well. A full snapshot of the process table thus takes
//!   `interval * #processes`, and a stop signal may end the loop in the middle of a snapshot.
use std::{io, thread, time::Duration};

use crate::{
    control::ControlSignal,
    records::{BgpCpuRecord, ProcessRecord, SampleLog},
    system::{ProcessInfo, SystemView},
    util,
};

/// Processes monitored in [`Sampler::monitor_bgp_cpu`], in the order of their columns.
pub const BGP_PROCESSES: [&str; 3] = ["bgp", "ipfib", "urib"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("'{0}' process not found.")]
    ProcessNotFound(String),
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
}

/// Static parameters of a monitoring run.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Time to sleep between two samples.
    pub interval: Duration,
    pub router_id: usize,
    pub router_name: String,
}

impl SamplerConfig {
    pub fn new(router_id: usize, router_name: impl Into<String>, interval: Duration) -> Self {
        Self {
            interval,
            router_id,
            router_name: router_name.into(),
        }
    }
}

pub struct Sampler<C, P> {
    config: SamplerConfig,
    control: C,
    system: P,
}

impl<C: ControlSignal, P: SystemView> Sampler<C, P> {
    pub fn new(config: SamplerConfig, control: C, system: P) -> Self {
        Self {
            config,
            control,
            system,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn system(&self) -> &P {
        &self.system
    }

    /// Block until the control signal reads `1`, polling it once per interval.
    pub fn wait_for_start(&mut self) {
        log::debug!("Waiting for the control signal...");
        let mut polls: usize = 0;
        while !self.control.is_active() {
            polls += 1;
            thread::sleep(self.config.interval);
        }
        log::info!("Start monitoring after {polls} polls.");
    }

    /// Monitor the system and the processes relevant for BGP workloads for CPU usage. The
    /// processes are resolved before waiting for the control signal; if one of them is missing,
    /// no sampling is done at all.
    pub fn monitor_bgp_cpu(&mut self) -> Result<SampleLog<BgpCpuRecord>, Error> {
        let mut pids = [0; 3];
        for (pid, name) in pids.iter_mut().zip(BGP_PROCESSES) {
            *pid = self
                .system
                .find_process(name)
                .ok_or_else(|| Error::ProcessNotFound(name.to_string()))?;
            log::debug!("Found '{name}' process with pid {pid}.");
        }

        self.wait_for_start();

        // reset counters
        let num_cpus = self.system.per_core_cpu().len();
        for pid in pids {
            self.system.process_cpu(pid);
        }

        let mut log = SampleLog::new(BgpCpuRecord::header(num_cpus));
        let mut vanished = [false; 3];

        while self.control.is_active() {
            let timestamp = util::unix_timestamp();
            let mut cores = self.system.per_core_cpu();
            // keep the row shape fixed even if the set of online cores changes
            cores.resize(num_cpus, 0.0);

            let mut process_cpu = [0.0; 3];
            for (i, pid) in pids.into_iter().enumerate() {
                process_cpu[i] = self.system.process_cpu(pid).unwrap_or_else(|| {
                    if !vanished[i] {
                        log::warn!("'{}' process (pid {pid}) vanished.", BGP_PROCESSES[i]);
                        vanished[i] = true;
                    }
                    0.0
                });
            }
            let [bgp_cpu, ipfib_cpu, urib_cpu] = process_cpu;

            log.push(BgpCpuRecord::new(
                self.config.router_id,
                &self.config.router_name,
                timestamp,
                cores,
                bgp_cpu,
                ipfib_cpu,
                urib_cpu,
            ));

            thread::sleep(self.config.interval);
        }

        log::info!("Stopped monitoring after {} samples.", log.len());
        Ok(log)
    }

    /// Monitor the attributes of all processes, writing one record per process. Sleeps and
    /// re-checks the control signal after every single process.
    pub fn monitor_all_processes(&mut self) -> SampleLog<ProcessRecord> {
        self.wait_for_start();

        let mut log = SampleLog::new(ProcessRecord::HEADER);
        let mut snapshots: usize = 0;

        'sampling: loop {
            let processes = self.system.processes();
            snapshots += 1;
            log::trace!("Snapshot {snapshots} with {} processes.", processes.len());

            if processes.is_empty() {
                thread::sleep(self.config.interval);
                if !self.control.is_active() {
                    break;
                }
                continue;
            }

            for info in processes {
                log.push(self.process_record(info));

                thread::sleep(self.config.interval);
                if !self.control.is_active() {
                    break 'sampling;
                }
            }
        }

        log::info!(
            "Stopped monitoring after {} samples in {snapshots} snapshots.",
            log.len()
        );
        log
    }

    fn process_record(&self, info: ProcessInfo) -> ProcessRecord {
        ProcessRecord {
            rid: self.config.router_id,
            router_name: self.config.router_name.clone(),
            timestamp: util::unix_timestamp(),
            pid: info.pid,
            name: info.name,
            exe: info.exe,
            cpu_percent: info.cpu_percent,
            memory_percent: info.memory_percent,
            num_threads: info.num_threads,
            nice: info.nice,
            num_fds: info.num_fds,
            open_files: info.open_files,
        }
    }
}
