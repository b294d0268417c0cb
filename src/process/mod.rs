//! Process management subsystem
//!
//! Process slots and their lifecycle around the scheduler.
//!
//! ## Module Organization
//!
//! - `types`: Type definitions (Pid, ProcessState, Context, Process) and constants
//! - `lifecycle`: allocation, spawn, fork, exit, wait, kill, sleep/wakeup
//! - `exec`: image replacement protocol for thread groups

mod exec;
mod lifecycle;
mod types;

pub use types::{
    AddressSpace, Context, FileRef, InodeRef, KernelStack, Pid, Process, ProcessState, TrapFrame,
    WaitChannel, NCPU, NOFILE, NPROC, PROC_NAME_LEN,
};
pub use lifecycle::USER_RFLAGS;
