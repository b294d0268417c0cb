//! Per-slot scheduling record
//!
//! One record per process slot, same index. It carries the scheduling
//! bookkeeping of both run queues and the thread directory of the group.

use crate::thread::{ThreadDirectory, ThreadSlot};

use super::addrstack::AddrStack;

/// Level value of a stride-managed record.
///
/// Fresh records start at this value too, before they are inserted into
/// either run queue.
pub const STRIDE_LEVEL: i32 = -1;

pub struct SchedRecord {
    /// Tickets held; non-zero only while stride-managed.
    pub ticket: u32,
    pub pass: u64,
    pub stride: u64,
    /// Ticks consumed at the current MLFQ level (allotment).
    pub used_tick: u64,
    /// Ticks consumed in the current quantum.
    pub used_quantum_tick: u64,
    /// Last timer tick charged; guards against double accounting.
    pub last_tick: u64,
    /// MLFQ level 0..=2, or [`STRIDE_LEVEL`].
    pub level: i32,
    /// Next thread id handed out by the multiplexer.
    pub next_tid: u16,
    /// Thread currently mounted into the process slot.
    pub current: Option<ThreadSlot>,
    pub dir: ThreadDirectory,
    /// User-stack bases released by joined threads.
    pub trash: AddrStack,
    /// An LWP of this group is replacing the program image.
    pub exec_busy: bool,
}

impl SchedRecord {
    pub fn new() -> Self {
        Self {
            ticket: 0,
            pass: 0,
            stride: 0,
            used_tick: 0,
            used_quantum_tick: 0,
            last_tick: 0,
            level: STRIDE_LEVEL,
            next_tid: 0,
            current: None,
            dir: ThreadDirectory::new(),
            trash: AddrStack::new(),
            exec_busy: false,
        }
    }

    pub fn is_stride(&self) -> bool {
        self.level == STRIDE_LEVEL
    }

    /// MLFQ level as an index, `None` while stride-managed.
    pub fn mlfq_level(&self) -> Option<usize> {
        usize::try_from(self.level).ok()
    }

    /// Zero the tick counters kept for the current level.
    pub fn reset_ticks(&mut self) {
        self.used_tick = 0;
        self.used_quantum_tick = 0;
    }

    /// Forget stride bookkeeping after the tickets went back to the pool.
    pub fn clear_stride(&mut self) {
        self.ticket = 0;
        self.pass = 0;
        self.stride = 0;
    }
}

impl Default for SchedRecord {
    fn default() -> Self {
        Self::new()
    }
}
