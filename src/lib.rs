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
//! Library for monitoring the CPU load of the routers throughout experiments.
pub mod control;
pub mod merge;
pub mod records;
pub mod sampler;
pub mod system;
pub mod util;

pub mod prelude {
    pub use super::{
        control::{ControlFile, ControlSignal, StopFlag, CPU_MONITOR_CONTROL_FILE},
        records::{BgpCpuRecord, ProcessRecord, SampleLog, SampleRecord},
        sampler::{Sampler, SamplerConfig},
        system::{ProcfsView, SystemView},
    };
}
