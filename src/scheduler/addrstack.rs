//! Recycled user-stack bases

use x86_64::VirtAddr;

/// Capacity of one address stack.
pub const ADDR_STACK_CAPACITY: usize = 100;

/// Bounded LIFO of user-stack bases freed by joined threads.
///
/// Push on a full stack and pop on an empty one are silent no-ops.
#[derive(Clone, Copy)]
pub struct AddrStack {
    slots: [VirtAddr; ADDR_STACK_CAPACITY],
    len: usize,
}

impl AddrStack {
    pub const fn new() -> Self {
        Self {
            slots: [VirtAddr::zero(); ADDR_STACK_CAPACITY],
            len: 0,
        }
    }

    pub fn push(&mut self, addr: VirtAddr) {
        if self.len == ADDR_STACK_CAPACITY {
            return;
        }
        self.slots[self.len] = addr;
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<VirtAddr> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.slots[self.len])
    }

    pub fn peek(&self) -> Option<VirtAddr> {
        self.len.checked_sub(1).map(|top| self.slots[top])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for AddrStack {
    fn default() -> Self {
        Self::new()
    }
}
