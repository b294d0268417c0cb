//! Thread management syscalls
//!
//! Implements: thread_create, thread_join, thread_exit, gettid

use crate::arch::Platform;
use crate::scheduler::Kernel;
use crate::thread::ThreadId;

use super::{fail, succeed};

/// Start a thread at `entry` with `arg`. `id` receives the new thread's id,
/// or [`ThreadId::INVALID`] on failure.
pub fn sys_thread_create<P: Platform>(
    kernel: &Kernel<P>,
    id: &mut ThreadId,
    entry: u64,
    arg: u64,
) -> i64 {
    crate::ktrace!("[SYS_THREAD_CREATE] entry={:#x} arg={:#x}", entry, arg);

    match kernel.thread_create(entry, arg) {
        Ok(new) => {
            *id = new;
            succeed(0)
        }
        Err(err) => {
            *id = ThreadId::INVALID;
            fail("SYS_THREAD_CREATE", err)
        }
    }
}

/// Wait for `id` to exit; its return value goes to `retval` if given.
pub fn sys_thread_join<P: Platform>(
    kernel: &Kernel<P>,
    id: ThreadId,
    retval: Option<&mut usize>,
) -> i64 {
    crate::ktrace!("[SYS_THREAD_JOIN] page={} tid={}", id.page, id.tid);

    match kernel.thread_join(id) {
        Ok(value) => {
            if let Some(out) = retval {
                *out = value;
            }
            succeed(0)
        }
        Err(err) => fail("SYS_THREAD_JOIN", err),
    }
}

pub fn sys_thread_exit<P: Platform>(kernel: &Kernel<P>, retval: usize) -> ! {
    crate::ktrace!("[SYS_THREAD_EXIT] retval={:#x}", retval);
    kernel.thread_exit(retval)
}

/// Thread id of the caller (the id only, without its directory page).
pub fn sys_gettid<P: Platform>(kernel: &Kernel<P>) -> i64 {
    match kernel.gettid() {
        Ok(id) => succeed(i64::from(id.tid)),
        Err(err) => fail("SYS_GETTID", err),
    }
}
