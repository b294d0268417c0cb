//! Syscall subsystem
//!
//! User-visible entry points of the scheduler. Each wrapper runs the
//! operation on the calling CPU's current process and translates the
//! result: `0` or a value on success, `-1` with errno set on failure.
//!
//! - `sched`: CPU share, MLFQ level, yield
//! - `thread`: thread create/join/exit and thread id

mod sched;
mod thread;

pub use sched::{sys_getlev, sys_set_cpu_share, sys_yield};
pub use thread::{sys_gettid, sys_thread_create, sys_thread_exit, sys_thread_join};

use crate::error::SchedError;
use crate::posix;

/// Record `err` in errno and return the failure value.
fn fail(name: &str, err: SchedError) -> i64 {
    crate::kdebug!("[{}] failed: {}", name, err);
    posix::set_errno(err.errno());
    -1
}

/// Clear errno and pass a successful result through.
fn succeed(value: i64) -> i64 {
    posix::set_errno(0);
    value
}
