use core::fmt;

use crate::posix::errno;

/// Recoverable scheduler failures, surfaced to user space as `-1` + errno.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedError {
    /// The ticket pool cannot cover the requested share.
    InsufficientTickets,
    /// Every slot of the thread directory is taken.
    ThreadTableFull,
    /// Kernel stack or user memory allocation failed.
    OutOfMemory,
    /// The thread id does not name a live thread.
    NoSuchThread,
    /// A thread tried to join itself.
    JoinSelf,
    /// No process is running on this CPU, or no process has the given pid.
    NoProcess,
    ProcessTableFull,
    NoChildren,
    /// The caller was killed while blocked.
    Killed,
    BadAddress,
    InvalidArgument,
}

impl SchedError {
    pub const fn errno(self) -> i32 {
        match self {
            SchedError::InsufficientTickets => errno::EAGAIN,
            SchedError::ThreadTableFull => errno::EAGAIN,
            SchedError::OutOfMemory => errno::ENOMEM,
            SchedError::NoSuchThread => errno::ESRCH,
            SchedError::JoinSelf => errno::EDEADLK,
            SchedError::NoProcess => errno::ESRCH,
            SchedError::ProcessTableFull => errno::EAGAIN,
            SchedError::NoChildren => errno::ECHILD,
            SchedError::Killed => errno::EINTR,
            SchedError::BadAddress => errno::EFAULT,
            SchedError::InvalidArgument => errno::EINVAL,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SchedError::InsufficientTickets => "not enough tickets left in the pool",
            SchedError::ThreadTableFull => "thread directory is full",
            SchedError::OutOfMemory => "out of memory",
            SchedError::NoSuchThread => "no such thread",
            SchedError::JoinSelf => "thread cannot join itself",
            SchedError::NoProcess => "no such process",
            SchedError::ProcessTableFull => "process table is full",
            SchedError::NoChildren => "no children to wait for",
            SchedError::Killed => "killed while blocked",
            SchedError::BadAddress => "bad user address",
            SchedError::InvalidArgument => "invalid argument",
        }
    }
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
