//! Resource probes. Each one reads kernel-exposed state from the paths in
//! [`ProbePaths`](crate::config::ProbePaths) and returns a typed record list
//! or a [`ProbeError`](crate::error::ProbeError). A missing primary source
//! fails the probe; unreadable sub-entries are skipped.

pub mod disks;
pub mod gpio;
pub mod ir;
pub mod net;
pub mod procs;
pub mod stats;
pub mod w1;
