use core::sync::atomic::{AtomicI32, Ordering};

/// Global errno value shared across the kernel.
static ERRNO: AtomicI32 = AtomicI32::new(0);

/// POSIX style error numbers (subset).
pub mod errno {
    pub const ESRCH: i32 = 3; // No such process
    pub const EINTR: i32 = 4; // Interrupted system call
    pub const ECHILD: i32 = 10; // No child processes
    pub const EAGAIN: i32 = 11; // Try again
    pub const ENOMEM: i32 = 12; // Out of memory
    pub const EFAULT: i32 = 14; // Bad address
    pub const EINVAL: i32 = 22; // Invalid argument
    pub const EDEADLK: i32 = 35; // Resource deadlock would occur
}

/// Set the current errno value.
pub fn set_errno(value: i32) {
    ERRNO.store(value, Ordering::Relaxed);
}

/// Obtain the current errno value.
pub fn errno() -> i32 {
    ERRNO.load(Ordering::Relaxed)
}
