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
//! Read-only access to the CPU counters and the process table of the monitored machine.
//! Read-only access to the CPU counters and the process table of the monitored machine.
//!
//! Utilization is computed from the tick counters in `/proc/stat` and `/proc/<pid>/stat`. Every
//! call compares against the counters of the previous call, no matter how short the interval.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use itertools::Itertools;
use procfs::{
    process::{FDTarget, Process},
    CpuTime, Current, CurrentSI, KernelStats, Meminfo,
};

/// Snapshot of the attributes of a single process.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub exe: Option<String>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub num_threads: Option<u64>,
    pub nice: Option<i64>,
    pub num_fds: Option<u64>,
    pub open_files: Vec<String>,
}

/// View on the system used by the sampler. CPU utilization values are measured since the
/// previous call, so the first call after creating the system only establishes a baseline.
pub trait SystemView {
    /// Utilization of each logical core in `[%]`.
    fn per_core_cpu(&mut self) -> Vec<f64>;

    /// Find a process whose name is exactly `name`. If multiple processes match, the one with
    /// the smallest pid is returned.
    fn find_process(&mut self, name: &str) -> Option<u32>;

    /// CPU utilization of a single process in `[%]` of one core, or `None` if the process no
    /// longer exists.
    fn process_cpu(&mut self, pid: u32) -> Option<f64>;

    /// All processes currently visible, ordered by pid. Threads are not listed separately.
    fn processes(&mut self) -> Vec<ProcessInfo>;
}

/// Busy and total ticks of one core, as accumulated since boot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct CoreTicks {
    busy: u64,
    total: u64,
}

impl From<&CpuTime> for CoreTicks {
    fn from(t: &CpuTime) -> Self {
        let busy = t.user
            + t.nice
            + t.system
            + t.irq.unwrap_or_default()
            + t.softirq.unwrap_or_default()
            + t.steal.unwrap_or_default();
        let total = busy + t.idle + t.iowait.unwrap_or_default();
        Self { busy, total }
    }
}

/// Utilization of a core between two readings in `[%]`. No elapsed ticks read as idle.
fn core_utilization(curr: CoreTicks, prev: CoreTicks) -> f64 {
    let busy = curr.busy.saturating_sub(prev.busy);
    let total = curr.total.saturating_sub(prev.total);
    if total == 0 {
        0.0
    } else {
        (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// CPU time spent by a process relative to the wall time `elapsed`, in `[%]` of one core. A
/// process with several busy threads may exceed 100.
fn process_utilization(ticks: u64, ticks_per_second: u64, elapsed: Duration) -> f64 {
    let elapsed = elapsed.as_secs_f64();
    if ticks_per_second == 0 || elapsed <= 0.0 {
        0.0
    } else {
        ticks as f64 / ticks_per_second as f64 / elapsed * 100.0
    }
}

/// CPU ticks (user + system) of a process at the moment they were read.
#[derive(Clone, Copy, Debug)]
struct ProcessTicks {
    ticks: u64,
    at: Instant,
}

/// [`SystemView`] reading `/proc` through the `procfs` crate.
pub struct ProcfsView {
    cores: Vec<CoreTicks>,
    tasks: HashMap<u32, ProcessTicks>,
    ticks_per_second: u64,
    page_size: u64,
    total_memory: u64,
}

impl Default for ProcfsView {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsView {
    pub fn new() -> Self {
        let total_memory = match Meminfo::current() {
            Ok(meminfo) => meminfo.mem_total,
            Err(e) => {
                log::warn!("Cannot read /proc/meminfo: {e}");
                0
            }
        };
        let mut system = Self {
            cores: Vec::new(),
            tasks: HashMap::new(),
            ticks_per_second: procfs::ticks_per_second(),
            page_size: procfs::page_size(),
            total_memory,
        };
        system.cores = system.read_cores().unwrap_or_default();
        system
    }

    fn read_cores(&self) -> Option<Vec<CoreTicks>> {
        match KernelStats::current() {
            Ok(stats) => Some(stats.cpu_time.iter().map(CoreTicks::from).collect()),
            Err(e) => {
                log::warn!("Cannot read /proc/stat: {e}");
                None
            }
        }
    }

    /// Utilization of `pid` since the previous reading of the same pid, given its current CPU
    /// ticks. The first reading of a pid yields `0.0`.
    fn task_cpu(&mut self, pid: u32, ticks: u64) -> f64 {
        let now = ProcessTicks {
            ticks,
            at: Instant::now(),
        };
        match self.tasks.insert(pid, now) {
            Some(prev) => process_utilization(
                ticks.saturating_sub(prev.ticks),
                self.ticks_per_second,
                now.at.duration_since(prev.at),
            ),
            None => 0.0,
        }
    }

    fn process_info(&mut self, process: &Process) -> Option<ProcessInfo> {
        // a process without a readable stat file has exited in the meantime
        let stat = process.stat().ok()?;
        let pid = u32::try_from(process.pid).ok()?;

        // read the descriptor table once, so the count and the file list agree
        let (num_fds, open_files) = match process.fd() {
            Ok(fds) => {
                let fds = fds.filter_map(Result::ok).collect_vec();
                let files = fds
                    .iter()
                    .filter_map(|fd| match &fd.target {
                        FDTarget::Path(path) if path.is_absolute() && path.is_file() => {
                            Some(path.display().to_string())
                        }
                        _ => None,
                    })
                    .collect();
                (Some(fds.len() as u64), files)
            }
            Err(_) => (None, Vec::new()),
        };

        Some(ProcessInfo {
            pid,
            exe: process.exe().ok().map(|exe| exe.display().to_string()),
            cpu_percent: Some(self.task_cpu(pid, stat.utime + stat.stime)),
            memory_percent: (self.total_memory > 0).then(|| {
                (stat.rss * self.page_size) as f64 / self.total_memory as f64 * 100.0
            }),
            num_threads: u64::try_from(stat.num_threads).ok(),
            nice: Some(stat.nice),
            num_fds,
            open_files,
            name: stat.comm,
        })
    }
}

fn all_processes() -> Vec<Process> {
    match procfs::process::all_processes() {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(e) => {
            log::warn!("Cannot list processes: {e}");
            Vec::new()
        }
    }
}

impl SystemView for ProcfsView {
    fn per_core_cpu(&mut self) -> Vec<f64> {
        let Some(curr) = self.read_cores() else {
            return vec![0.0; self.cores.len()];
        };
        let util = curr
            .iter()
            .enumerate()
            .map(|(i, c)| match self.cores.get(i) {
                Some(prev) => core_utilization(*c, *prev),
                None => 0.0,
            })
            .collect();
        self.cores = curr;
        util
    }

    fn find_process(&mut self, name: &str) -> Option<u32> {
        all_processes()
            .into_iter()
            .filter(|p| p.stat().is_ok_and(|stat| stat.comm == name))
            .filter_map(|p| u32::try_from(p.pid).ok())
            .min()
    }

    fn process_cpu(&mut self, pid: u32) -> Option<f64> {
        let stat = i32::try_from(pid)
            .ok()
            .and_then(|id| Process::new(id).and_then(|p| p.stat()).ok());
        match stat {
            Some(stat) => Some(self.task_cpu(pid, stat.utime + stat.stime)),
            None => {
                self.tasks.remove(&pid);
                None
            }
        }
    }

    fn processes(&mut self) -> Vec<ProcessInfo> {
        let processes = all_processes()
            .iter()
            .filter_map(|p| self.process_info(p))
            .sorted_by_key(|p| p.pid)
            .collect_vec();
        // forget the counters of processes that exited
        let alive: HashSet<u32> = processes.iter().map(|p| p.pid).collect();
        self.tasks.retain(|pid, _| alive.contains(pid));
        processes
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
    };

    fn ticks(busy: u64, total: u64) -> CoreTicks {
        CoreTicks { busy, total }
    }

    #[test]
    fn core_utilization_from_deltas() {
        assert_eq!(core_utilization(ticks(150, 400), ticks(100, 300)), 50.0);
        assert_eq!(core_utilization(ticks(101, 301), ticks(100, 300)), 100.0);
        assert_eq!(core_utilization(ticks(100, 301), ticks(100, 300)), 0.0);
    }

    #[test]
    fn core_without_elapsed_ticks_is_idle() {
        assert_eq!(core_utilization(ticks(100, 300), ticks(100, 300)), 0.0);
        // counters reset (e.g., core went offline and back)
        assert_eq!(core_utilization(ticks(5, 10), ticks(100, 300)), 50.0);
    }

    #[test]
    fn process_utilization_against_wall_time() {
        let tick = Duration::from_millis(10);
        assert_eq!(process_utilization(1, 100, tick), 100.0);
        assert_eq!(process_utilization(0, 100, tick), 0.0);
        assert_eq!(process_utilization(4, 100, Duration::from_millis(20)), 200.0);
        assert_eq!(process_utilization(3, 100, Duration::ZERO), 0.0);
    }

    #[test]
    fn first_reading_of_a_process_is_baseline() {
        let mut system = ProcfsView::new();
        assert_eq!(system.task_cpu(42, 1_000), 0.0);
        assert_eq!(system.task_cpu(42, 1_000), 0.0);
        thread::sleep(Duration::from_millis(1));
        assert!(system.task_cpu(42, 1_001) > 0.0);
    }

    #[test]
    fn own_process_is_visible() {
        let mut system = ProcfsView::new();
        let own_pid = std::process::id();
        let processes = system.processes();
        let me = processes
            .iter()
            .find(|p| p.pid == own_pid)
            .expect("the test process itself must be listed");
        assert!(me.num_threads.is_some_and(|n| n >= 1));
        assert!(me.num_fds.is_some_and(|n| n as usize >= me.open_files.len()));
        assert!(me.memory_percent.is_some_and(|m| m > 0.0));
        assert!(processes.windows(2).all(|w| w[0].pid < w[1].pid));
        assert!(system.process_cpu(own_pid).is_some());
        assert!(!system.per_core_cpu().is_empty());
    }

    #[test]
    fn open_files_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("held, open.csv");
        let _file = std::fs::File::create(&path).unwrap();
        let path = path.canonicalize().unwrap();

        let mut system = ProcfsView::new();
        let me = system
            .processes()
            .into_iter()
            .find(|p| p.pid == std::process::id())
            .unwrap();
        assert!(me.open_files.contains(&path.display().to_string()));
    }

    #[test]
    fn vanished_process_has_no_cpu() {
        let mut system = ProcfsView::new();
        // pids are bounded by `/proc/sys/kernel/pid_max`, which is at most 2^22
        assert_eq!(system.process_cpu(i32::MAX as u32), None);
        assert_eq!(system.find_process("no such process name"), None);
    }

    #[test]
    fn busy_thread_at_short_interval() {
        let stop = Arc::new(AtomicBool::new(false));
        let spinner = {
            let stop = stop.clone();
            thread::spawn(move || {
                let mut x: u64 = 0;
                while !stop.load(Ordering::Relaxed) {
                    x = std::hint::black_box(x.wrapping_add(1));
                }
            })
        };

        let own_pid = std::process::id();
        let mut system = ProcfsView::new();
        system.per_core_cpu();
        system.process_cpu(own_pid);

        let mut process = Vec::new();
        let mut cores = Vec::new();
        for _ in 0..40 {
            thread::sleep(Duration::from_millis(10));
            cores.push(system.per_core_cpu());
            process.push(system.process_cpu(own_pid).unwrap());
        }
        stop.store(true, Ordering::Relaxed);
        spinner.join().unwrap();

        let mean_process = process.iter().sum::<f64>() / process.len() as f64;
        assert!(mean_process > 50.0, "process cpu: {process:?}");

        let distinct_cores = cores.iter().dedup().count();
        assert!(distinct_cores > 1, "per-core cpu never changed: {cores:?}");
        assert!(cores.iter().flatten().all(|c| (0.0..=100.0).contains(c)));
        let mean_total =
            cores.iter().map(|c| c.iter().sum::<f64>()).sum::<f64>() / cores.len() as f64;
        assert!(mean_total > 50.0, "per-core cpu: {cores:?}");
    }
}
