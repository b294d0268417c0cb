//! Process table and global scheduler state
//!
//! One lock (`Kernel::lock`) serializes every run-queue mutation, every
//! scheduling-record update, every mount/unmount and every process state
//! transition. The ticket pool has its own narrower lock nested inside it.

use spin::{Mutex, MutexGuard};

use crate::arch::Platform;
use crate::config::SchedConfig;
use crate::error::SchedError;
use crate::process::{Context, Pid, Process, ProcessState, WaitChannel, NCPU, NPROC};

use super::mlfq::Mlfq;
use super::record::SchedRecord;
use super::stats::SchedStats;
use super::stride::StrideQueue;
use super::ticket::TicketBox;

/// Per-CPU scheduler state
#[derive(Clone, Copy, Debug, Default)]
pub struct Cpu {
    /// Slot running on this CPU
    pub proc: Option<usize>,
    /// Context of the per-CPU scheduler loop
    pub scheduler: Context,
}

pub struct ProcTable {
    pub procs: [Process; NPROC],
    /// Scheduling record of each slot, same index
    pub records: [SchedRecord; NPROC],
    pub mlfq: Mlfq,
    pub stride: StrideQueue,
    pub cpus: [Cpu; NCPU],
    pub next_pid: Pid,
    /// Slot of the first spawned process; orphans are handed to it.
    pub init_slot: Option<usize>,
    pub stats: SchedStats,
}

impl ProcTable {
    fn new(mlfq: Mlfq) -> Self {
        Self {
            procs: [Process::empty(); NPROC],
            records: core::array::from_fn(|_| SchedRecord::new()),
            mlfq,
            stride: StrideQueue::new(),
            cpus: [Cpu::default(); NCPU],
            next_pid: 1,
            init_slot: None,
            stats: SchedStats::new(),
        }
    }

    /// Slot running on `cpu`.
    pub fn current(&self, cpu: usize) -> Option<usize> {
        self.cpus.get(cpu).and_then(|c| c.proc)
    }

    /// Hand `slot` to `cpu`: mark it RUNNING and make it the CPU's process.
    pub fn dispatch(&mut self, cpu: usize, slot: usize) {
        self.procs[slot].state = ProcessState::Running;
        self.cpus[cpu].proc = Some(slot);
    }

    pub fn find_pid(&self, pid: Pid) -> Option<usize> {
        self.procs
            .iter()
            .position(|p| p.state != ProcessState::Unused && p.pid == pid)
    }

    /// Run `f` on every LWP of `slot`: the shared slot for the mounted one,
    /// the private copy for the others.
    pub fn for_each_lwp(&mut self, slot: usize, mut f: impl FnMut(&mut Process)) {
        let ProcTable { procs, records, .. } = self;
        let shared = &mut procs[slot];
        for (_, thread) in records[slot].dir.iter_mut() {
            f(thread.proc_mut(shared));
        }
    }

    /// Make every LWP sleeping on `chan` RUNNABLE.
    pub fn wakeup(&mut self, chan: WaitChannel) {
        for slot in 0..NPROC {
            if self.procs[slot].state == ProcessState::Unused {
                continue;
            }
            self.wake_group(slot, chan);
        }
    }

    /// [`wakeup`](Self::wakeup) restricted to the LWPs of one slot.
    pub fn wake_group(&mut self, slot: usize, chan: WaitChannel) {
        self.for_each_lwp(slot, |p| {
            if p.state == ProcessState::Sleeping && p.chan == Some(chan) {
                p.state = ProcessState::Runnable;
            }
        });
    }

    /// Tickets currently held by records (excluding the MLFQ's own share).
    pub fn held_tickets(&self) -> u32 {
        self.records.iter().map(|r| r.ticket).sum()
    }
}

/// The scheduler instance: process table, ticket pool, tunables and the
/// platform it drives.
pub struct Kernel<P: Platform> {
    ptable: Mutex<ProcTable>,
    pub(crate) tickets: TicketBox,
    pub(crate) config: SchedConfig,
    pub(crate) platform: P,
}

impl<P: Platform> Kernel<P> {
    pub fn new(platform: P, config: SchedConfig) -> Result<Self, SchedError> {
        config.validate()?;

        let tickets = TicketBox::new(config.ticket_pool);
        let mlfq = Mlfq::new(&config, &tickets)?;

        crate::kinfo!(
            "scheduler initialized ({} slots, {} tickets, {} reserved for MLFQ)",
            NPROC,
            config.ticket_pool,
            config.mlfq_tickets
        );

        Ok(Self {
            ptable: Mutex::new(ProcTable::new(mlfq)),
            tickets,
            config,
            platform,
        })
    }

    /// Lock the process table for direct access.
    pub fn lock(&self) -> MutexGuard<'_, ProcTable> {
        self.ptable.lock()
    }

    pub fn tickets(&self) -> &TicketBox {
        &self.tickets
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn stats(&self) -> SchedStats {
        self.ptable.lock().stats
    }

    /// Slot running on the executing CPU.
    pub(crate) fn current_slot(&self, table: &ProcTable) -> Result<usize, SchedError> {
        table
            .current(self.platform.cpu_id())
            .ok_or(SchedError::NoProcess)
    }
}
