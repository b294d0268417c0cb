//! Program image replacement for thread groups
//!
//! Loading the new image is the caller's business. Around it, the group
//! serializes on the record's exec flag, and on commit every LWP but the
//! caller disappears: the caller becomes the new main thread and the record
//! starts over at MLFQ level 0.

use x86_64::VirtAddr;

use crate::arch::Platform;
use crate::error::SchedError;
use crate::scheduler::{Kernel, ProcTable, TicketBox};

use super::types::{AddressSpace, WaitChannel};

impl ProcTable {
    /// Drop every thread of `slot` except the mounted one and reinstall it
    /// as the main thread. The recycled stack bases go too.
    pub fn exec_reset_threads<P: Platform>(&mut self, slot: usize, platform: &P) {
        let record = &mut self.records[slot];
        record.trash.clear();
        record.release_threads(platform, true);
        record.install_main_thread();
        record.exec_busy = false;
    }

    /// Requeue `slot` for its new program.
    ///
    /// A stride-managed record returns its tickets and joins MLFQ level 0.
    /// An MLFQ record is taken off the front of its level and reinserted at
    /// level 0; not finding it at the front is fatal.
    pub fn exec_requeue(&mut self, slot: usize, pool: &TicketBox) {
        let ProcTable {
            records,
            mlfq,
            stride,
            ..
        } = self;

        match records[slot].mlfq_level() {
            None => {
                stride.remove(records, slot);
                pool.release(records[slot].ticket);
                records[slot].clear_stride();
            }
            Some(level) => {
                if !mlfq.pop_front(level, slot) {
                    crate::kpanic!(
                        "exec: slot {} is not at the front of level {}",
                        slot,
                        level
                    );
                }
            }
        }
        mlfq.insert(records, slot);
    }
}

impl<P: Platform> Kernel<P> {
    /// Claim the exec flag of the current record, waiting while another LWP
    /// of the group holds it.
    pub fn exec_begin(&self) -> Result<(), SchedError> {
        let mut table = self.lock();
        let slot = self.current_slot(&table)?;

        while table.records[slot].exec_busy {
            if table.procs[slot].killed {
                return Err(SchedError::Killed);
            }
            self.sleep_locked(&mut table, WaitChannel::Exec(slot));
        }
        table.records[slot].exec_busy = true;
        Ok(())
    }

    /// Loading failed: release the exec flag and wake LWPs waiting for it.
    pub fn exec_abort(&self) -> Result<(), SchedError> {
        let mut table = self.lock();
        let slot = self.current_slot(&table)?;
        table.records[slot].exec_busy = false;
        table.wake_group(slot, WaitChannel::Exec(slot));
        Ok(())
    }

    /// Switch the current process to the loaded image in `space`.
    ///
    /// The old address space is freed after the new one is active.
    pub fn exec_commit(
        &self,
        space: AddressSpace,
        size: u64,
        entry: VirtAddr,
        sp: VirtAddr,
        name: &str,
    ) -> Result<(), SchedError> {
        let mut table = self.lock();
        let slot = self.current_slot(&table)?;

        let trash = table.records[slot].trash.len();
        let threads = table.records[slot].dir.thread_count();
        table.exec_reset_threads(slot, &self.platform);

        let proc = &mut table.procs[slot];
        let old = proc.pgdir.replace(space);
        proc.sz = size;
        proc.tf.rip = entry.as_u64();
        proc.tf.rsp = sp.as_u64();
        proc.set_name(name);
        self.platform.switch_uvm(proc);
        if let Some(old) = old {
            self.platform.free_space(old);
        }

        table.exec_requeue(slot, &self.tickets);

        crate::kinfo!(
            "exec: pid {} now runs {} ({} thread(s) and {} stack(s) dropped)",
            table.procs[slot].pid,
            name,
            threads.saturating_sub(1),
            trash
        );
        Ok(())
    }
}
