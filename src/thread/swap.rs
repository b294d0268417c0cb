//! Mounting and unmounting LWPs

use crate::process::{Process, ProcessState};
use crate::scheduler::SchedRecord;

use super::types::{Lwp, ThreadSlot, NTHREAD, NTHREADPAGE};

const DIRECTORY_SLOTS: usize = NTHREAD * NTHREADPAGE;

impl SchedRecord {
    /// Mount the next LWP in state `target` into `shared`.
    ///
    /// The mounted thread is saved into its private copy first. Candidates
    /// are searched starting just after it and wrapping around, the mounted
    /// thread itself last. On success returns the slot that was unmounted
    /// (equal to the new current thread if the search came back to it); on
    /// failure the previous thread is mounted again, `shared` unchanged,
    /// and `None` is returned.
    ///
    /// The user memory size of the slot is kept across the swap.
    pub fn swap(&mut self, shared: &mut Process, target: ProcessState) -> Option<ThreadSlot> {
        let current = self.current?;
        let sz = shared.sz;

        match self.dir.get_mut(current) {
            Some(thread) => thread.lwp = Lwp::Unmounted(*shared),
            None => return None,
        }

        let start = current.flat();
        for step in 1..=DIRECTORY_SLOTS {
            let slot = ThreadSlot::from_flat((start + step) % DIRECTORY_SLOTS);
            let Some(thread) = self.dir.get_mut(slot) else {
                continue;
            };
            let Lwp::Unmounted(copy) = thread.lwp else {
                continue;
            };
            if copy.state != target {
                continue;
            }

            *shared = copy;
            shared.sz = sz;
            thread.lwp = Lwp::Mounted;
            self.current = Some(slot);
            return Some(current);
        }

        // Nothing matched; the loop above already visited `current` and
        // left it unmounted with an unchanged copy.
        if let Some(thread) = self.dir.get_mut(current) {
            thread.lwp = Lwp::Mounted;
        }
        None
    }

    /// Process state of `slot`, taken from `shared` if it is mounted.
    pub fn thread_state(&self, shared: &Process, slot: ThreadSlot) -> Option<ProcessState> {
        self.dir.get(slot).map(|t| t.state(shared))
    }
}
