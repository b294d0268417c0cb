use core::fmt;
use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use spin::RwLock;

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::INFO.priority());
static LOG_CLOCK: AtomicU64 = AtomicU64::new(0);
static SINK: RwLock<Option<&'static dyn LogSink>> = RwLock::new(None);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    PANIC,
    FATAL,
    ERROR,
    WARN,
    INFO,
    DEBUG,
    TRACE,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::PANIC => "PANIC",
            LogLevel::FATAL => "FATAL",
            LogLevel::ERROR => "ERROR",
            LogLevel::WARN => "WARN",
            LogLevel::INFO => "INFO",
            LogLevel::DEBUG => "DEBUG",
            LogLevel::TRACE => "TRACE",
        }
    }

    const fn priority(self) -> u8 {
        match self {
            LogLevel::PANIC => 0,
            LogLevel::FATAL => 1,
            LogLevel::ERROR => 2,
            LogLevel::WARN => 3,
            LogLevel::INFO => 4,
            LogLevel::DEBUG => 5,
            LogLevel::TRACE => 6,
        }
    }

    fn from_priority(value: u8) -> Self {
        match value {
            0 => LogLevel::PANIC,
            1 => LogLevel::FATAL,
            2 => LogLevel::ERROR,
            3 => LogLevel::WARN,
            4 => LogLevel::INFO,
            5 => LogLevel::DEBUG,
            _ => LogLevel::TRACE,
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("panic") {
            Some(LogLevel::PANIC)
        } else if value.eq_ignore_ascii_case("fatal") {
            Some(LogLevel::FATAL)
        } else if value.eq_ignore_ascii_case("error") {
            Some(LogLevel::ERROR)
        } else if value.eq_ignore_ascii_case("warn") || value.eq_ignore_ascii_case("warning") {
            Some(LogLevel::WARN)
        } else if value.eq_ignore_ascii_case("info") {
            Some(LogLevel::INFO)
        } else if value.eq_ignore_ascii_case("debug") {
            Some(LogLevel::DEBUG)
        } else if value.eq_ignore_ascii_case("trace") {
            Some(LogLevel::TRACE)
        } else {
            None
        }
    }
}

/// Destination for formatted log lines (serial port, console, test buffer).
///
/// `write_line` receives one complete line without the trailing newline.
pub trait LogSink: Sync {
    fn write_line(&self, level: LogLevel, line: fmt::Arguments<'_>);
}

/// Install the sink every subsequent log line is written to.
pub fn set_sink(sink: &'static dyn LogSink) {
    *SINK.write() = Some(sink);
}

/// Detach the current sink; later lines are dropped.
pub fn clear_sink() {
    *SINK.write() = None;
}

pub fn log(level: LogLevel, args: fmt::Arguments<'_>) {
    let current = LOG_LEVEL.load(Ordering::Relaxed);
    if level.priority() > current {
        return;
    }

    let sink = match *SINK.read() {
        Some(sink) => sink,
        None => return,
    };

    sink.write_line(
        level,
        format_args!(
            "[{timestamp}] [{level:<5}] {message}",
            timestamp = TimestampDisplay {
                ticks: LOG_CLOCK.load(Ordering::Relaxed)
            },
            level = LevelDisplay(level),
            message = args,
        ),
    );
}

pub fn set_max_level(level: LogLevel) {
    LOG_LEVEL.store(level.priority(), Ordering::Relaxed);
}

pub fn max_level() -> LogLevel {
    LogLevel::from_priority(LOG_LEVEL.load(Ordering::Relaxed))
}

pub fn parse_level_directive(cmdline: &str) -> Option<LogLevel> {
    for token in cmdline.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            if key.eq_ignore_ascii_case("log") || key.eq_ignore_ascii_case("loglevel") {
                if let Some(level) = LogLevel::from_str(value) {
                    return Some(level);
                }
            }
        }
    }
    None
}

/// Advance the timestamp stamped onto log lines. Driven by the timer tick.
pub fn set_clock(ticks: u64) {
    LOG_CLOCK.store(ticks, Ordering::Relaxed);
}

pub fn clock() -> u64 {
    LOG_CLOCK.load(Ordering::Relaxed)
}

struct TimestampDisplay {
    ticks: u64,
}

impl fmt::Display for TimestampDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", self.ticks)
    }
}

struct LevelDisplay(LogLevel);

impl fmt::Display for LevelDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.0.as_str())
    }
}
