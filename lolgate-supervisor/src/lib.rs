//! # lolgate Supervisor
//!
//! Owns the worker pool. Workers are independent processes that each run
//! the full request pipeline; when one exits for any reason the supervisor
//! launches exactly one replacement, immediately, with no restart limit.
//!
//! The supervisor handles no requests and holds no cache or rate state.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod process;
mod supervisor;

pub use process::{ChildWorker, ProcessLauncher, WORKER_SLOT_ENV};
pub use supervisor::{
    default_worker_count, Supervisor, SupervisorStats, WorkerExit, WorkerLauncher, WorkerProcess,
};
