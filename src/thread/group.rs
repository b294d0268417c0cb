//! Thread-group operations of the running process

use crate::arch::Platform;
use crate::error::SchedError;
use crate::process::ProcessState;
use crate::scheduler::{Kernel, ProcTable};

use super::types::{ThreadId, ThreadSlot};

impl ProcTable {
    /// One step of a join by the thread mounted on `slot`.
    ///
    /// Queues the caller on the target's join list (once) and returns the
    /// target if it already exited. Otherwise the caller is left SLEEPING
    /// and `None` is returned; the exit of the target makes it RUNNABLE
    /// again. A killed joiner leaves the list and fails with `Killed`.
    pub fn join_wait(
        &mut self,
        slot: usize,
        id: ThreadId,
    ) -> Result<Option<ThreadSlot>, SchedError> {
        let ProcTable { procs, records, .. } = self;
        let record = &mut records[slot];
        let shared = &mut procs[slot];

        let target = record.resolve(id)?;
        let me = record.current.ok_or(SchedError::NoSuchThread)?;
        if target == me {
            return Err(SchedError::JoinSelf);
        }

        if !record.is_waiting(target, me) {
            record.link_waiter(target, me);
        }
        if record.thread_state(shared, target) == Some(ProcessState::Zombie) {
            return Ok(Some(target));
        }

        if shared.killed {
            record.unlink_waiter(target, me);
            return Err(SchedError::Killed);
        }

        shared.state = ProcessState::Sleeping;
        shared.chan = None;
        Ok(None)
    }

    /// Collect the return value of the exited `target`.
    ///
    /// The joiner at the tail of the join list reclaims the thread; any
    /// other joiner just leaves the list.
    pub fn join_finish<P: Platform>(
        &mut self,
        slot: usize,
        target: ThreadSlot,
        platform: &P,
    ) -> usize {
        let ProcTable { procs, records, .. } = self;
        let record = &mut records[slot];

        let Some(thread) = record.dir.get(target) else {
            return 0;
        };
        let retval = thread.retval;
        let tail = thread.tail;

        match record.current {
            Some(me) if tail == Some(me) => record.free_thread(&procs[slot], target, platform),
            Some(me) => record.unlink_waiter(target, me),
            None => {}
        }
        retval
    }

    /// Terminate the thread mounted on `slot` with `retval`.
    ///
    /// Returns false if no other LWP of the group is still alive, in which
    /// case the thread was left untouched and the whole process must exit.
    pub fn exit_current_thread(&mut self, slot: usize, retval: usize) -> bool {
        let ProcTable { procs, records, .. } = self;
        let record = &mut records[slot];

        let current = record.current;
        let shared = &procs[slot];
        let siblings = record
            .dir
            .iter()
            .filter(|&(s, t)| Some(s) != current && !t.state(shared).is_dead())
            .count();
        if siblings == 0 {
            return false;
        }

        record.exit_thread(&mut procs[slot], retval);
        true
    }
}

impl<P: Platform> Kernel<P> {
    /// Start a new LWP in the current process at `entry` with `arg`.
    pub fn thread_create(&self, entry: u64, arg: u64) -> Result<ThreadId, SchedError> {
        let mut table = self.lock();
        let slot = self.current_slot(&table)?;
        let ProcTable { procs, records, .. } = &mut *table;
        records[slot].fork_thread(&mut procs[slot], entry, arg, &self.platform)
    }

    /// Wait for thread `id` of the current process to exit and return the
    /// value it passed to [`thread_exit`](Self::thread_exit).
    pub fn thread_join(&self, id: ThreadId) -> Result<usize, SchedError> {
        let mut table = self.lock();
        let slot = self.current_slot(&table)?;

        let target = loop {
            match table.join_wait(slot, id)? {
                Some(target) => break target,
                None => self.sched_local(&mut table),
            }
        };

        Ok(table.join_finish(slot, target, &self.platform))
    }

    /// Terminate the calling thread. The last live thread of a process
    /// takes the whole process down as [`exit`](Self::exit) does.
    pub fn thread_exit(&self, retval: usize) -> ! {
        let mut table = self.lock();
        let Ok(slot) = self.current_slot(&table) else {
            crate::kpanic!("thread_exit: no current process");
        };

        if !table.exit_current_thread(slot, retval) {
            drop(table);
            self.exit();
        }

        crate::kdebug!(
            "thread: pid {} tid {:?} exited with {:#x}",
            table.procs[slot].pid,
            table.records[slot].current_tid(),
            retval
        );
        self.sched_local(&mut table);
        crate::kpanic!("zombie thread exit");
    }

    /// Id of the calling thread.
    pub fn gettid(&self) -> Result<ThreadId, SchedError> {
        let table = self.lock();
        let slot = self.current_slot(&table)?;
        let record = &table.records[slot];
        record
            .current
            .and_then(|s| record.dir.get(s))
            .map(|t| t.id())
            .ok_or(SchedError::NoSuchThread)
    }
}
