//! hybrid-sched: dual-mode CPU scheduler and LWP multiplexer
//!
//! A 3-level feedback queue and a stride scheduler share one ticket pool;
//! every process slot can host several lightweight threads, one of which is
//! mounted into the slot at any time.

#![no_std]

extern crate alloc;

pub mod arch;
pub mod config;
pub mod error;
pub mod logger;
pub mod posix;
pub mod process;
pub mod scheduler;
pub mod syscalls;
pub mod thread;

pub use arch::Platform;
pub use config::SchedConfig;
pub use error::SchedError;
pub use scheduler::Kernel;

#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {{
        $crate::logger::log($level, format_args!($($arg)*));
    }};
}

/// Log at PANIC level and bring the system down.
///
/// Used for broken scheduler invariants; these are never reported through
/// `Result`.
#[macro_export]
macro_rules! kpanic {
    ($($arg:tt)*) => {{
        let loc = core::panic::Location::caller();
        $crate::klog!(
            $crate::logger::LogLevel::PANIC,
            "------------[ cut here ]------------"
        );
        $crate::logger::log(
            $crate::logger::LogLevel::PANIC,
            format_args!("Kernel panic - not syncing: {}", format_args!($($arg)*)),
        );
        $crate::klog!(
            $crate::logger::LogLevel::PANIC,
            "Call Trace: <panic> at {file}:{line}:{column}",
            file = loc.file(),
            line = loc.line(),
            column = loc.column(),
        );
        panic!($($arg)*)
    }};
}

#[macro_export]
macro_rules! kfatal {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::FATAL, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::ERROR, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::WARN, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::INFO, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::DEBUG, $($arg)*);
    }};
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::TRACE, $($arg)*);
    }};
}
