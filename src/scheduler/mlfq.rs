//! Multi-level feedback queue
//!
//! Three levels with growing quanta. An entity that exhausts the allotment
//! of its level drops one level; every `boost_period` ticks charged to the
//! queue, every entity is moved back to level 0. The queue as a whole holds
//! a fixed number of tickets and advances one aggregate pass, which the
//! unified scheduler compares against the stride heap.

use crate::config::{SchedConfig, MLFQ_LEVELS};
use crate::error::SchedError;
use crate::process::{Process, ProcessState};

use super::level_queue::LevelQueue;
use super::record::SchedRecord;
use super::stats::SchedStats;
use super::ticket::TicketBox;

pub struct Mlfq {
    levels: [LevelQueue; MLFQ_LEVELS],
    /// Aggregate pass of the whole queue
    pub pass: u64,
    pub stride: u64,
    /// Ticks charged since the last boost
    pub used_tick: u64,
    boost_period: u64,
    tickets: u32,
}

impl Mlfq {
    /// Reserve the queue's ticket share from `pool` and build empty levels.
    pub fn new(config: &SchedConfig, pool: &TicketBox) -> Result<Self, SchedError> {
        pool.reserve(config.mlfq_tickets)?;

        Ok(Self {
            levels: [
                LevelQueue::new(0, config.quantum[0], config.allotment[0]),
                LevelQueue::new(1, config.quantum[1], config.allotment[1]),
                LevelQueue::new(2, config.quantum[2], config.allotment[2]),
            ],
            pass: 0,
            stride: config.mlfq_stride(),
            used_tick: 0,
            boost_period: config.boost_period,
            tickets: config.mlfq_tickets,
        })
    }

    /// Enqueue `slot` at level 0 with fresh counters and no tickets.
    ///
    /// Any older entry of the same slot is dropped first so a record is
    /// queued at most once.
    pub fn insert(&mut self, records: &mut [SchedRecord], slot: usize) {
        self.detach(slot);

        let record = &mut records[slot];
        record.level = 0;
        record.reset_ticks();
        record.clear_stride();

        self.levels[0].push(slot);
    }

    /// [`insert`](Self::insert) for an entity that is on a CPU right now:
    /// it goes to the front of level 0, where the dispatcher leaves the
    /// entity it picked.
    pub fn insert_running(&mut self, records: &mut [SchedRecord], slot: usize) {
        self.detach(slot);

        let record = &mut records[slot];
        record.level = 0;
        record.reset_ticks();
        record.clear_stride();

        self.levels[0].push_front(slot);
    }

    /// Remove every entry of `slot` from all levels.
    pub fn detach(&mut self, slot: usize) -> usize {
        self.levels.iter_mut().map(|q| q.remove(slot)).sum()
    }

    /// Pick the first runnable entity, scanning level 0, 1, then 2.
    ///
    /// The picked entity stays at the front of its level.
    pub fn search(
        &mut self,
        records: &mut [SchedRecord],
        procs: &[Process],
        stats: &mut SchedStats,
    ) -> Option<usize> {
        if self.used_tick >= self.boost_period {
            self.boost(records, procs);
            self.used_tick = 0;
            stats.boosts += 1;
        }

        (0..MLFQ_LEVELS).find_map(|level| self.search_level(level, records, procs, stats))
    }

    fn search_level(
        &mut self,
        level: usize,
        records: &mut [SchedRecord],
        procs: &[Process],
        stats: &mut SchedStats,
    ) -> Option<usize> {
        let queue = &mut self.levels[level];
        let front = queue.peek()?;

        if records[front].level == level as i32
            && records[front].used_quantum_tick >= queue.quantum()
        {
            queue.rotate();
            records[front].used_quantum_tick = 0;
        }

        // Sampled once: demotions and drops shrink the queue while scanning.
        let len = self.levels[level].len();
        for _ in 0..len {
            let slot = self.levels[level].peek()?;
            let record = &mut records[slot];

            if record.level != level as i32 || procs[slot].state.is_dead() {
                self.levels[level].pop();
            } else if self.levels[level]
                .allotment()
                .is_some_and(|allot| record.used_tick >= allot)
            {
                self.levels[level].pop();
                self.levels[level + 1].push(slot);
                record.reset_ticks();
                record.level = level as i32 + 1;
                stats.demotions += 1;
                crate::ktrace!("mlfq: slot {} demoted to level {}", slot, level + 1);
            } else if procs[slot].state == ProcessState::Runnable {
                return Some(slot);
            } else {
                self.levels[level].rotate();
            }
        }

        None
    }

    /// Move every entity to level 0.
    ///
    /// Lower levels are drained first so the most starved entities run
    /// first after the boost. Entities already at level 0 keep their
    /// counters; stale entries are dropped.
    pub fn boost(&mut self, records: &mut [SchedRecord], procs: &[Process]) {
        let mut top = self.levels[0];
        self.levels[0] = LevelQueue::new(0, top.quantum(), top.allotment());

        for level in (1..MLFQ_LEVELS).rev() {
            while let Some(slot) = self.levels[level].pop() {
                let record = &mut records[slot];
                if record.level != level as i32 || procs[slot].state.is_dead() {
                    continue;
                }
                record.reset_ticks();
                record.level = 0;
                self.levels[0].push(slot);
            }
        }

        while let Some(slot) = top.pop() {
            if records[slot].level == 0 && !procs[slot].state.is_dead() {
                self.levels[0].push(slot);
            }
        }

        crate::kdebug!("mlfq: boost, {} entities at level 0", self.levels[0].len());
    }

    /// Pop `slot` off the front of `level`; false if it is not the front.
    pub fn pop_front(&mut self, level: usize, slot: usize) -> bool {
        let queue = &mut self.levels[level];
        if queue.peek() != Some(slot) {
            return false;
        }
        queue.pop();
        true
    }

    /// Charge one tick of an MLFQ-managed entity to the whole queue.
    pub fn charge(&mut self) {
        self.used_tick += 1;
        self.pass += self.stride;
    }

    pub fn level(&self, level: usize) -> &LevelQueue {
        &self.levels[level]
    }

    pub fn quantum(&self, level: usize) -> u64 {
        self.levels[level].quantum()
    }

    /// Entries across all levels, stale ones included until purged.
    pub fn len(&self) -> usize {
        self.levels.iter().map(LevelQueue::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tickets(&self) -> u32 {
        self.tickets
    }

    /// Level a record would be found at, or `None` if it is not queued.
    pub fn find(&self, slot: usize) -> Option<usize> {
        self.levels.iter().position(|q| q.contains(slot))
    }
}

impl core::fmt::Debug for Mlfq {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mlfq")
            .field("len", &[self.levels[0].len(), self.levels[1].len(), self.levels[2].len()])
            .field("pass", &self.pass)
            .field("used_tick", &self.used_tick)
            .finish()
    }
}

