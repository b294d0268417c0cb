//! Process lifecycle
//!
//! Slot allocation, fork/exit/wait, kill and sleep/wakeup. Every operation
//! runs under the process table lock; the blocking ones leave the CPU
//! through the LWP round robin first, like any other suspension point.

use spin::{Mutex, MutexGuard};
use x86_64::VirtAddr;

use crate::arch::Platform;
use crate::error::SchedError;
use crate::scheduler::{Kernel, ProcTable, SchedRecord, TicketBox, STRIDE_LEVEL};

use super::types::{AddressSpace, Pid, Process, ProcessState, TrapFrame, WaitChannel, NPROC};

/// RFLAGS of a fresh user context: interrupts enabled.
pub const USER_RFLAGS: u64 = 0x200;

impl ProcTable {
    /// Claim an UNUSED slot: EMBRYO with a fresh pid, kernel stack and
    /// context, a mounted main thread, queued at MLFQ level 0.
    pub fn alloc_process<P: Platform>(&mut self, platform: &P) -> Result<usize, SchedError> {
        let slot = self
            .procs
            .iter()
            .position(|p| p.state == ProcessState::Unused)
            .ok_or(SchedError::ProcessTableFull)?;

        let kstack = platform.alloc_kstack().ok_or_else(|| {
            crate::kerror!("proc: kernel stack allocation failed");
            SchedError::OutOfMemory
        })?;

        let proc = &mut self.procs[slot];
        *proc = Process::empty();
        proc.pid = self.next_pid;
        proc.state = ProcessState::Embryo;
        proc.kstack = Some(kstack);
        proc.context = platform.new_context(&kstack);
        self.next_pid += 1;

        let ProcTable {
            records,
            mlfq,
            stride,
            ..
        } = self;
        stride.remove(records, slot);
        records[slot] = SchedRecord::new();
        records[slot].install_main_thread();
        mlfq.insert(records, slot);

        Ok(slot)
    }

    /// Give back a slot that never became RUNNABLE.
    fn discard_process<P: Platform>(&mut self, slot: usize, platform: &P) {
        self.mlfq.detach(slot);
        self.records[slot].release_threads(platform, false);
        self.records[slot] = SchedRecord::new();
        if let Some(kstack) = self.procs[slot].kstack.take() {
            platform.free_kstack(kstack);
        }
        self.procs[slot] = Process::empty();
    }

    /// Tear down the exiting slot: close its files, wake its parent, hand
    /// its children to init and mark every LWP ZOMBIE.
    pub fn exit_current<P: Platform>(&mut self, slot: usize, platform: &P) {
        if self.init_slot == Some(slot) {
            crate::kpanic!("init exiting");
        }

        let proc = &mut self.procs[slot];
        for file in proc.ofile.iter_mut() {
            if let Some(file) = file.take() {
                platform.file_close(file);
            }
        }
        if let Some(cwd) = proc.cwd.take() {
            platform.inode_put(cwd);
        }

        if let Some(parent) = self.procs[slot].parent {
            self.wakeup(WaitChannel::Process(parent));
        }

        let init = self.init_slot;
        let mut zombie_orphan = false;
        for other in 0..NPROC {
            if other == slot || self.procs[other].state == ProcessState::Unused {
                continue;
            }
            if self.procs[other].parent != Some(slot) {
                continue;
            }
            self.for_each_lwp(other, |p| p.parent = init);
            if self.procs[other].state == ProcessState::Zombie {
                zombie_orphan = true;
            }
        }
        if let (true, Some(init)) = (zombie_orphan, init) {
            self.wakeup(WaitChannel::Process(init));
        }

        self.for_each_lwp(slot, |p| p.state = ProcessState::Zombie);

        crate::kinfo!(
            "proc: pid {} ({}) exited",
            self.procs[slot].pid,
            self.procs[slot].name()
        );
    }

    /// Reap one ZOMBIE child of `slot`.
    ///
    /// `Ok(None)` means children exist but none has exited yet. Fails with
    /// `NoChildren` if there are no children or `slot` was killed.
    pub fn try_reap<P: Platform>(
        &mut self,
        slot: usize,
        pool: &TicketBox,
        platform: &P,
    ) -> Result<Option<Pid>, SchedError> {
        let mut have_kids = false;
        for child in 0..NPROC {
            let proc = &self.procs[child];
            if proc.state == ProcessState::Unused || proc.parent != Some(slot) {
                continue;
            }
            have_kids = true;
            if proc.state == ProcessState::Zombie {
                return Ok(Some(self.reap(child, pool, platform)));
            }
        }

        if !have_kids || self.procs[slot].killed {
            return Err(SchedError::NoChildren);
        }
        Ok(None)
    }

    /// Free everything a ZOMBIE slot still holds and mark it UNUSED.
    fn reap<P: Platform>(&mut self, child: usize, pool: &TicketBox, platform: &P) -> Pid {
        let ProcTable {
            procs,
            records,
            mlfq,
            stride,
            ..
        } = self;

        stride.remove(records, child);
        mlfq.detach(child);

        let record = &mut records[child];
        pool.release(record.ticket);
        record.clear_stride();
        record.trash.clear();
        record.release_threads(platform, false);
        record.next_tid = 0;
        record.exec_busy = false;
        record.level = STRIDE_LEVEL;
        record.reset_ticks();

        let proc = &mut procs[child];
        let pid = proc.pid;
        if let Some(kstack) = proc.kstack.take() {
            platform.free_kstack(kstack);
        }
        if let Some(space) = proc.pgdir.take() {
            platform.free_space(space);
        }
        *proc = Process::empty();

        crate::kdebug!("proc: reaped pid {}", pid);
        pid
    }

    /// Set the killed flag on every LWP of `pid`; sleeping ones are made
    /// RUNNABLE so they notice.
    pub fn kill(&mut self, pid: Pid) -> Result<(), SchedError> {
        let slot = self.find_pid(pid).ok_or(SchedError::NoProcess)?;
        self.for_each_lwp(slot, |p| {
            p.killed = true;
            if p.state == ProcessState::Sleeping {
                p.state = ProcessState::Runnable;
            }
        });
        Ok(())
    }
}

impl<P: Platform> Kernel<P> {
    /// Allocate an EMBRYO slot; see [`ProcTable::alloc_process`].
    pub fn alloc_process(&self) -> Result<usize, SchedError> {
        self.lock().alloc_process(&self.platform)
    }

    /// Make a RUNNABLE process around an already loaded user image. The
    /// first process spawned becomes init.
    pub fn spawn(
        &self,
        space: AddressSpace,
        size: u64,
        entry: VirtAddr,
        sp: VirtAddr,
        name: &str,
    ) -> Result<Pid, SchedError> {
        let mut table = self.lock();
        let slot = table.alloc_process(&self.platform)?;

        let proc = &mut table.procs[slot];
        proc.pgdir = Some(space);
        proc.sz = size;
        proc.tf = TrapFrame {
            rip: entry.as_u64(),
            rsp: sp.as_u64(),
            rax: 0,
            rflags: USER_RFLAGS,
        };
        proc.set_name(name);
        proc.state = ProcessState::Runnable;
        let pid = proc.pid;

        if table.init_slot.is_none() {
            table.init_slot = Some(slot);
        }
        crate::kinfo!("proc: spawned pid {} ({}) in slot {}", pid, name, slot);
        Ok(pid)
    }

    /// Duplicate the current process. The child returns 0 from the call.
    pub fn fork(&self) -> Result<Pid, SchedError> {
        let mut table = self.lock();
        let parent = self.current_slot(&table)?;
        let child = table.alloc_process(&self.platform)?;

        let src = table.procs[parent];
        let space = src
            .pgdir
            .and_then(|space| self.platform.copy_space(space, src.sz));
        let Some(space) = space else {
            table.discard_process(child, &self.platform);
            crate::kerror!("proc: fork of pid {} failed to copy memory", src.pid);
            return Err(SchedError::OutOfMemory);
        };

        let trash = table.records[parent].trash;
        table.records[child].trash = trash;

        let proc = &mut table.procs[child];
        proc.pgdir = Some(space);
        proc.sz = src.sz;
        proc.parent = Some(parent);
        proc.tf = src.tf;
        proc.tf.rax = 0;
        for (dst, file) in proc.ofile.iter_mut().zip(src.ofile.iter()) {
            *dst = file.map(|f| self.platform.file_dup(f));
        }
        proc.cwd = src.cwd.map(|cwd| self.platform.inode_dup(cwd));
        proc.name = src.name;
        proc.state = ProcessState::Runnable;
        let pid = proc.pid;

        crate::kdebug!("proc: pid {} forked pid {}", src.pid, pid);
        Ok(pid)
    }

    /// Terminate the current process. It stays ZOMBIE until its parent
    /// reaps it in [`wait`](Self::wait).
    pub fn exit(&self) -> ! {
        let mut table = self.lock();
        let Ok(slot) = self.current_slot(&table) else {
            crate::kpanic!("exit: no current process");
        };

        table.exit_current(slot, &self.platform);
        self.sched(&mut table);
        crate::kpanic!("zombie exit");
    }

    /// Wait for a child to exit and return its pid.
    pub fn wait(&self) -> Result<Pid, SchedError> {
        let mut table = self.lock();
        let slot = self.current_slot(&table)?;
        loop {
            if let Some(pid) = table.try_reap(slot, &self.tickets, &self.platform)? {
                return Ok(pid);
            }
            self.sleep_locked(&mut table, WaitChannel::Process(slot));
        }
    }

    pub fn kill(&self, pid: Pid) -> Result<(), SchedError> {
        self.lock().kill(pid)
    }

    /// Block the calling LWP on `chan`.
    pub fn sleep(&self, chan: WaitChannel) {
        let mut table = self.lock();
        self.sleep_locked(&mut table, chan);
    }

    /// Block on `chan` while holding the table lock. Another LWP of the
    /// group gets the CPU first, if one is runnable.
    pub fn sleep_locked(&self, table: &mut ProcTable, chan: WaitChannel) {
        let Ok(slot) = self.current_slot(table) else {
            crate::kpanic!("sleep: no current process");
        };

        table.procs[slot].chan = Some(chan);
        table.procs[slot].state = ProcessState::Sleeping;
        self.sched_local(table);
        table.procs[slot].chan = None;
    }

    /// Atomically release `guard` and sleep on `chan`; `lock` is taken
    /// again before returning. No wakeup can slip in between because
    /// wakeups run under the table lock, which is taken first.
    pub fn sleep_on<'a, T>(
        &self,
        chan: WaitChannel,
        lock: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
    ) -> MutexGuard<'a, T> {
        {
            let mut table = self.lock();
            drop(guard);
            self.sleep_locked(&mut table, chan);
        }
        lock.lock()
    }

    /// Wake every LWP sleeping on `chan`.
    pub fn wakeup(&self, chan: WaitChannel) {
        self.lock().wakeup(chan);
    }

    /// Log one line per used slot and the scheduler counters.
    pub fn procdump(&self) {
        let table = self.lock();
        for slot in 0..NPROC {
            let proc = &table.procs[slot];
            if proc.state == ProcessState::Unused {
                continue;
            }
            let record = &table.records[slot];
            crate::kinfo!(
                "{} {} {} level={} tickets={} threads={}",
                proc.pid,
                proc.state.as_str(),
                proc.name(),
                record.level,
                record.ticket,
                record.dir.thread_count()
            );
        }

        let stats = table.stats;
        crate::kinfo!(
            "sched: mlfq={} stride={} idle={} boosts={} demotions={} lwp={} switches={} pool={}/{}",
            stats.mlfq_picks,
            stats.stride_picks,
            stats.idle_passes,
            stats.boosts,
            stats.demotions,
            stats.lwp_switches,
            stats.context_switches,
            self.tickets.available(),
            self.tickets.total()
        );
    }
}
