//! Command handlers behind the CLI flags.
//!
//! `main` picks exactly one of these per invocation:
//!
//! - [`queues`]: `--available-queues`
//! - [`worker`]: hidden `--worker <ORDINAL>`, used by the supervisor
//! - [`supervise`]: everything else

pub mod queues;
pub mod supervise;
pub mod worker;
