//! Global ticket pool

use spin::Mutex;

use crate::error::SchedError;

/// Unallocated proportional-share tickets.
///
/// Every transfer between a scheduling record and the pool goes through
/// [`TicketBox::reserve`] and [`TicketBox::release`]. The lock nests inside
/// the process table lock.
pub struct TicketBox {
    available: Mutex<u32>,
    total: u32,
}

impl TicketBox {
    pub const fn new(total: u32) -> Self {
        Self {
            available: Mutex::new(total),
            total,
        }
    }

    /// Take `n` tickets out of the pool, or fail without touching it.
    pub fn reserve(&self, n: u32) -> Result<(), SchedError> {
        let mut available = self.available.lock();
        if n > *available {
            return Err(SchedError::InsufficientTickets);
        }
        *available -= n;
        Ok(())
    }

    pub fn release(&self, n: u32) {
        let mut available = self.available.lock();
        *available = available.saturating_add(n);
    }

    pub fn available(&self) -> u32 {
        *self.available.lock()
    }

    pub const fn total(&self) -> u32 {
        self.total
    }
}
