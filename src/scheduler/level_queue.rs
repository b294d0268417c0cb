//! One level of the feedback queue

use crate::process::NPROC;

/// Circular FIFO of slot indices.
///
/// Push on a full queue and pop on an empty one are no-ops. The only way to
/// reorder entries is pop-then-push.
#[derive(Clone, Copy)]
pub struct LevelQueue {
    slots: [usize; NPROC],
    front: usize,
    len: usize,
    level: usize,
    quantum: u64,
    allotment: Option<u64>,
}

impl LevelQueue {
    pub const fn new(level: usize, quantum: u64, allotment: Option<u64>) -> Self {
        Self {
            slots: [0; NPROC],
            front: 0,
            len: 0,
            level,
            quantum,
            allotment,
        }
    }

    pub fn push(&mut self, slot: usize) {
        if self.len == NPROC {
            return;
        }
        let back = (self.front + self.len) % NPROC;
        self.slots[back] = slot;
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let slot = self.slots[self.front];
        self.front = (self.front + 1) % NPROC;
        self.len -= 1;
        Some(slot)
    }

    pub fn peek(&self) -> Option<usize> {
        if self.len == 0 {
            None
        } else {
            Some(self.slots[self.front])
        }
    }

    /// Insert `slot` ahead of every other entry. No-op when full.
    pub fn push_front(&mut self, slot: usize) {
        if self.len == NPROC {
            return;
        }
        let others = self.len;
        self.push(slot);
        for _ in 0..others {
            self.rotate();
        }
    }

    /// Move the front entry to the back.
    pub fn rotate(&mut self) {
        if let Some(slot) = self.pop() {
            self.push(slot);
        }
    }

    /// Drop every occurrence of `slot`, keeping the others in order.
    /// Returns how many entries were removed.
    pub fn remove(&mut self, slot: usize) -> usize {
        let len = self.len;
        let mut removed = 0;
        for _ in 0..len {
            match self.pop() {
                Some(s) if s == slot => removed += 1,
                Some(s) => self.push(s),
                None => break,
            }
        }
        removed
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.iter().any(|s| s == slot)
    }

    /// Entries from front to back.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).map(move |i| self.slots[(self.front + i) % NPROC])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    /// `None` for the lowest level, which never demotes.
    pub fn allotment(&self) -> Option<u64> {
        self.allotment
    }
}
