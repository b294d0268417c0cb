//! Scheduler-related syscalls
//!
//! Provides set_cpu_share, getlev and yield.

use crate::arch::Platform;
use crate::error::SchedError;
use crate::scheduler::Kernel;

use super::{fail, succeed};

/// Request `tickets` of the pool for the calling process; 0 hands it back
/// to the MLFQ.
pub fn sys_set_cpu_share<P: Platform>(kernel: &Kernel<P>, tickets: i32) -> i64 {
    crate::ktrace!("[SYS_SET_CPU_SHARE] tickets={}", tickets);

    let Ok(tickets) = u32::try_from(tickets) else {
        return fail("SYS_SET_CPU_SHARE", SchedError::InvalidArgument);
    };
    match kernel.set_cpu_share(tickets) {
        Ok(()) => succeed(0),
        Err(err) => fail("SYS_SET_CPU_SHARE", err),
    }
}

/// MLFQ level of the calling process; -1 is a valid result (stride).
pub fn sys_getlev<P: Platform>(kernel: &Kernel<P>) -> i64 {
    match kernel.getlev() {
        Ok(level) => succeed(i64::from(level)),
        Err(err) => fail("SYS_GETLEV", err),
    }
}

pub fn sys_yield<P: Platform>(kernel: &Kernel<P>) -> i64 {
    match kernel.yield_cpu() {
        Ok(()) => succeed(0),
        Err(err) => fail("SYS_YIELD", err),
    }
}
