//! Scheduler tunables
//!
//! Defaults reproduce the classic configuration (100 tickets, 20 of them
//! reserved for the feedback queue, quanta 5/10/20, allotments 20/40/unbounded,
//! boost every 200 ticks). Any of them can be overridden from the kernel
//! command line with `sched.*=` tokens.

use crate::error::SchedError;

/// Number of MLFQ levels.
pub const MLFQ_LEVELS: usize = 3;

/// Fixed-point numerator used to derive strides: `stride = STRIDE_CONST / tickets`.
pub const STRIDE_CONST: u64 = 1 << 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedConfig {
    /// Total tickets in the system-wide pool.
    pub ticket_pool: u32,
    /// Tickets reserved by the feedback queue as a whole.
    pub mlfq_tickets: u32,
    pub stride_const: u64,
    /// Time quantum per MLFQ level, in ticks.
    pub quantum: [u64; MLFQ_LEVELS],
    /// Time allotment per MLFQ level; `None` means unbounded.
    pub allotment: [Option<u64>; MLFQ_LEVELS],
    pub boost_period: u64,
    /// Quantum for stride-managed entities.
    pub stride_quantum: u64,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            ticket_pool: 100,
            mlfq_tickets: 20,
            stride_const: STRIDE_CONST,
            quantum: [5, 10, 20],
            allotment: [Some(20), Some(40), None],
            boost_period: 200,
            stride_quantum: 5,
        }
    }
}

impl SchedConfig {
    /// Build a configuration from `sched.*` tokens on the kernel command line.
    ///
    /// Unknown tokens are ignored. A malformed value keeps the default.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::default();

        for arg in cmdline.split_whitespace() {
            if let Some(value) = arg.strip_prefix("sched.tickets=") {
                if let Some(n) = parse_number(arg, value) {
                    config.ticket_pool = n as u32;
                }
            } else if let Some(value) = arg.strip_prefix("sched.mlfq_tickets=") {
                if let Some(n) = parse_number(arg, value) {
                    config.mlfq_tickets = n as u32;
                }
            } else if let Some(value) = arg.strip_prefix("sched.boost=") {
                if let Some(n) = parse_number(arg, value) {
                    config.boost_period = n;
                }
            } else if let Some(value) = arg.strip_prefix("sched.stride_quantum=") {
                if let Some(n) = parse_number(arg, value) {
                    config.stride_quantum = n;
                }
            } else if let Some(value) = arg.strip_prefix("sched.quantum=") {
                let mut quantum = [0u64; MLFQ_LEVELS];
                if parse_list(arg, value, &mut quantum) {
                    config.quantum = quantum;
                }
            } else if let Some(value) = arg.strip_prefix("sched.allot=") {
                // The lowest level never demotes, so only the upper two are set.
                let mut allot = [0u64; MLFQ_LEVELS - 1];
                if parse_list(arg, value, &mut allot) {
                    config.allotment = [Some(allot[0]), Some(allot[1]), None];
                }
            }
        }

        crate::kdebug!(
            "sched config: pool={} mlfq={} quantum={:?} allot={:?} boost={} stride_quantum={}",
            config.ticket_pool,
            config.mlfq_tickets,
            config.quantum,
            config.allotment,
            config.boost_period,
            config.stride_quantum
        );
        config
    }

    pub fn validate(&self) -> Result<(), SchedError> {
        if self.mlfq_tickets == 0 || self.mlfq_tickets > self.ticket_pool {
            return Err(SchedError::InvalidArgument);
        }
        if self.quantum.iter().any(|&q| q == 0) || self.stride_quantum == 0 {
            return Err(SchedError::InvalidArgument);
        }
        if self.allotment[MLFQ_LEVELS - 1].is_some() {
            return Err(SchedError::InvalidArgument);
        }
        if self.stride_const < u64::from(self.ticket_pool) {
            return Err(SchedError::InvalidArgument);
        }
        Ok(())
    }

    /// Stride charged to the feedback queue as a whole per tick.
    pub fn mlfq_stride(&self) -> u64 {
        self.stride_const / u64::from(self.mlfq_tickets.max(1))
    }
}

fn parse_number(arg: &str, value: &str) -> Option<u64> {
    match value.parse::<u64>() {
        Ok(n) if n <= u64::from(u32::MAX) => Some(n),
        _ => {
            crate::kwarn!("sched config: ignoring malformed '{}'", arg);
            None
        }
    }
}

fn parse_list(arg: &str, value: &str, out: &mut [u64]) -> bool {
    let mut count = 0;
    for part in value.split(',') {
        if count == out.len() {
            crate::kwarn!("sched config: too many values in '{}'", arg);
            return false;
        }
        match part.parse::<u64>() {
            Ok(n) => out[count] = n,
            Err(_) => {
                crate::kwarn!("sched config: ignoring malformed '{}'", arg);
                return false;
            }
        }
        count += 1;
    }
    if count != out.len() {
        crate::kwarn!("sched config: expected {} values in '{}'", out.len(), arg);
        return false;
    }
    true
}
