//! Stride scheduler
//!
//! Proportional-share half of the scheduler: a 1-indexed binary min-heap of
//! slot indices ordered by pass. Entities that died or went back to the
//! feedback queue are purged lazily when they surface at the top.

use crate::error::SchedError;
use crate::process::{Process, ProcessState, NPROC};

use super::record::{SchedRecord, STRIDE_LEVEL};
use super::ticket::TicketBox;

pub struct StrideQueue {
    /// `heap[1..=len]` is the heap; `heap[0]` is unused.
    heap: [usize; NPROC + 1],
    len: usize,
}

impl StrideQueue {
    pub const fn new() -> Self {
        Self {
            heap: [0; NPROC + 1],
            len: 0,
        }
    }

    /// Insert `slot` keyed by its current pass. No-op when full.
    ///
    /// A slot is held at most once: an older entry is taken out first, since
    /// its pass may have changed while it sat in the heap.
    pub fn push(&mut self, records: &[SchedRecord], slot: usize) {
        self.remove(records, slot);
        if self.len == NPROC {
            return;
        }
        self.len += 1;
        self.heap[self.len] = slot;
        self.sift_up(records, self.len);
    }

    /// Remove and return the entry with the lowest pass.
    pub fn pop(&mut self, records: &[SchedRecord]) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let top = self.heap[1];
        self.heap[1] = self.heap[self.len];
        self.len -= 1;
        if self.len > 1 {
            self.sift_down(records, 1);
        }
        Some(top)
    }

    pub fn peek(&self) -> Option<usize> {
        if self.len == 0 {
            None
        } else {
            Some(self.heap[1])
        }
    }

    /// Take `slot` out of the heap wherever it sits.
    pub fn remove(&mut self, records: &[SchedRecord], slot: usize) -> bool {
        let Some(i) = (1..=self.len).find(|&i| self.heap[i] == slot) else {
            return false;
        };

        self.heap[i] = self.heap[self.len];
        self.len -= 1;
        if i <= self.len {
            self.sift_up(records, i);
            self.sift_down(records, i);
        }
        true
    }

    fn sift_up(&mut self, records: &[SchedRecord], mut i: usize) {
        while i > 1 {
            let parent = i / 2;
            if records[self.heap[i]].pass < records[self.heap[parent]].pass {
                self.heap.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, records: &[SchedRecord], mut i: usize) {
        loop {
            let left = i * 2;
            let right = left + 1;
            if left > self.len {
                break;
            }

            let child = if right <= self.len
                && records[self.heap[right]].pass < records[self.heap[left]].pass
            {
                right
            } else {
                left
            };

            if records[self.heap[child]].pass < records[self.heap[i]].pass {
                self.heap.swap(i, child);
                i = child;
            } else {
                break;
            }
        }
    }

    /// Negotiate `requested` tickets for `slot` and push it onto the heap.
    ///
    /// A record that already holds tickets returns its surplus or reserves
    /// the deficit and keeps its pass. A new member joins at `min_pass`.
    /// On failure nothing changes.
    pub fn insert_new(
        &mut self,
        records: &mut [SchedRecord],
        slot: usize,
        requested: u32,
        min_pass: u64,
        pool: &TicketBox,
        stride_const: u64,
    ) -> Result<(), SchedError> {
        Self::negotiate(&mut records[slot], requested, min_pass, pool, stride_const)?;
        self.push(records, slot);
        Ok(())
    }

    /// The ticket part of [`insert_new`](Self::insert_new): make `record`
    /// stride-managed with `requested` tickets without queueing it.
    pub fn negotiate(
        record: &mut SchedRecord,
        requested: u32,
        min_pass: u64,
        pool: &TicketBox,
        stride_const: u64,
    ) -> Result<(), SchedError> {
        if requested == 0 {
            return Err(SchedError::InvalidArgument);
        }

        if record.ticket != 0 {
            if record.ticket >= requested {
                pool.release(record.ticket - requested);
            } else {
                pool.reserve(requested - record.ticket)?;
            }
            record.ticket = requested;
        } else {
            pool.reserve(requested)?;
            record.ticket = requested;
            record.pass = min_pass;
        }

        record.stride = stride_const / u64::from(record.ticket);
        record.level = STRIDE_LEVEL;
        Ok(())
    }

    /// Pop entries until a runnable one surfaces.
    ///
    /// Dead entries and entries no longer stride-managed give their tickets
    /// back and are dropped. Live but blocked ones are set aside and pushed
    /// back after the scan, so they are not picked again within this call.
    pub fn search(
        &mut self,
        records: &mut [SchedRecord],
        procs: &[Process],
        pool: &TicketBox,
    ) -> Option<usize> {
        let mut blocked = [0usize; NPROC];
        let mut blocked_len = 0;
        let mut found = None;

        for _ in 0..self.len {
            let Some(top) = self.pop(records) else {
                break;
            };

            if Self::is_stale(&records[top], &procs[top]) {
                Self::purge(&mut records[top], pool);
            } else if procs[top].state == ProcessState::Runnable {
                found = Some(top);
                break;
            } else {
                blocked[blocked_len] = top;
                blocked_len += 1;
            }
        }

        for &slot in &blocked[..blocked_len] {
            self.push(records, slot);
        }

        found
    }

    /// Lowest pass among live members, purging stale entries on top.
    pub fn min_live_pass(
        &mut self,
        records: &mut [SchedRecord],
        procs: &[Process],
        pool: &TicketBox,
    ) -> Option<u64> {
        while let Some(top) = self.peek() {
            if !Self::is_stale(&records[top], &procs[top]) {
                return Some(records[top].pass);
            }
            self.pop(records);
            Self::purge(&mut records[top], pool);
        }
        None
    }

    fn is_stale(record: &SchedRecord, proc: &Process) -> bool {
        proc.state.is_dead() || !record.is_stride()
    }

    fn purge(record: &mut SchedRecord, pool: &TicketBox) {
        pool.release(record.ticket);
        record.clear_stride();
    }

    /// Heap contents in array order (index 0 is the top).
    pub fn as_slice(&self) -> &[usize] {
        &self.heap[1..=self.len]
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.as_slice().contains(&slot)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for StrideQueue {
    fn default() -> Self {
        Self::new()
    }
}
