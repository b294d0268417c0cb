//! Core scheduling algorithms - MLFQ + stride
//!
//! The stride heap and the feedback queue each propose their best runnable
//! entity; the lower pass wins, with the MLFQ's aggregate pass standing in
//! for the whole queue. Tick accounting charges the running entity (and the
//! MLFQ aggregate) once per timer tick.

use crate::arch::Platform;
use crate::error::SchedError;
use crate::process::{Context, ProcessState, NPROC};

use super::stride::StrideQueue;
use super::table::{Kernel, ProcTable};
use super::ticket::TicketBox;

impl ProcTable {
    /// Select the next entity to run, or `None` if nothing is runnable.
    ///
    /// The stride side is asked first. Its candidate wins if its pass does
    /// not exceed the MLFQ aggregate pass; otherwise the MLFQ candidate runs
    /// and the stride candidate goes back onto the heap. Either side falls
    /// back to the other when it has nothing runnable.
    pub fn schedule(&mut self, pool: &TicketBox) -> Option<usize> {
        let ProcTable {
            procs,
            records,
            mlfq,
            stride,
            stats,
            ..
        } = self;

        if mlfq.is_empty() && stride.is_empty() {
            return None;
        }

        if stride.is_empty() {
            let picked = mlfq.search(records, procs, stats);
            if picked.is_some() {
                stats.mlfq_picks += 1;
            }
            return picked;
        }

        if mlfq.is_empty() {
            let picked = stride.search(records, procs, pool)?;
            records[picked].used_quantum_tick = 0;
            stats.stride_picks += 1;
            return Some(picked);
        }

        let Some(candidate) = stride.search(records, procs, pool) else {
            let picked = mlfq.search(records, procs, stats);
            if picked.is_some() {
                stats.mlfq_picks += 1;
            }
            return picked;
        };

        if records[candidate].pass <= mlfq.pass {
            records[candidate].used_quantum_tick = 0;
            stats.stride_picks += 1;
            return Some(candidate);
        }

        match mlfq.search(records, procs, stats) {
            Some(picked) => {
                stride.push(records, candidate);
                stats.mlfq_picks += 1;
                Some(picked)
            }
            None => {
                records[candidate].used_quantum_tick = 0;
                stats.stride_picks += 1;
                Some(candidate)
            }
        }
    }

    /// Mount a RUNNABLE LWP into every used slot that is not on a CPU,
    /// then [`schedule`](Self::schedule).
    pub fn pick_next(&mut self, pool: &TicketBox) -> Option<usize> {
        for slot in 0..NPROC {
            let state = self.procs[slot].state;
            if state == ProcessState::Unused || state == ProcessState::Running {
                continue;
            }
            self.records[slot].swap(&mut self.procs[slot], ProcessState::Runnable);
        }
        self.schedule(pool)
    }

    /// Charge timer tick `tick` to `slot`. A tick is charged at most once.
    pub fn add_ticks(&mut self, slot: usize, tick: u64) {
        let record = &mut self.records[slot];
        if record.last_tick >= tick {
            return;
        }

        if record.is_stride() {
            record.pass += record.stride;
            record.used_quantum_tick += 1;
        } else {
            record.used_tick += 1;
            record.used_quantum_tick += 1;
            self.mlfq.charge();
        }
        record.last_tick = tick;
    }

    /// Whether `slot` has used up the quantum of its mode or level.
    pub fn check_quantum(&self, slot: usize, stride_quantum: u64) -> bool {
        let record = &self.records[slot];
        let quantum = match record.mlfq_level() {
            Some(level) => self.mlfq.quantum(level),
            None => stride_quantum,
        };
        record.used_quantum_tick >= quantum
    }

    /// Move `slot` between the two halves.
    ///
    /// Zero tickets hands a stride-managed entity back to MLFQ level 0 and
    /// returns its tickets; one that is running goes to the front of the
    /// level, as if the dispatcher had just picked it there. Otherwise the entity joins (or renegotiates its
    /// share in) the stride heap; a new member starts at the lower of the
    /// heap's minimum live pass and the MLFQ aggregate pass.
    pub fn set_cpu_share(
        &mut self,
        slot: usize,
        tickets: u32,
        pool: &TicketBox,
        stride_const: u64,
    ) -> Result<(), SchedError> {
        let ProcTable {
            procs,
            records,
            mlfq,
            stride,
            ..
        } = self;

        if tickets == 0 {
            if records[slot].is_stride() {
                let held = records[slot].ticket;
                stride.remove(records, slot);
                pool.release(held);
                if procs[slot].state == ProcessState::Running {
                    mlfq.insert_running(records, slot);
                } else {
                    mlfq.insert(records, slot);
                }
                crate::kinfo!(
                    "sched: pid {} left stride scheduling, {} tickets returned",
                    procs[slot].pid,
                    held
                );
            }
            return Ok(());
        }

        let min_pass = match stride.min_live_pass(records, procs, pool) {
            Some(pass) => pass.min(mlfq.pass),
            None => mlfq.pass,
        };

        // A running entity is pushed when it leaves the CPU; its pass keeps
        // moving until then.
        if procs[slot].state == ProcessState::Running {
            StrideQueue::negotiate(&mut records[slot], tickets, min_pass, pool, stride_const)?;
            stride.remove(records, slot);
        } else {
            stride.insert_new(records, slot, tickets, min_pass, pool, stride_const)?;
        }
        mlfq.detach(slot);
        crate::kinfo!(
            "sched: pid {} holds {} tickets (stride {}, pass {}), {} left in pool",
            procs[slot].pid,
            records[slot].ticket,
            records[slot].stride,
            records[slot].pass,
            pool.available()
        );
        Ok(())
    }
}

impl<P: Platform> Kernel<P> {
    /// Switch from the current process to this CPU's scheduler loop.
    ///
    /// The caller holds the table lock and has already moved the process out
    /// of RUNNING. Interrupts must be off.
    pub fn sched(&self, table: &mut ProcTable) {
        if self.platform.interrupts_enabled() {
            crate::kpanic!("sched interruptible");
        }
        let cpu = self.platform.cpu_id();
        let Some(slot) = table.current(cpu) else {
            crate::kpanic!("sched: no process on cpu {}", cpu);
        };
        if table.procs[slot].state == ProcessState::Running {
            crate::kpanic!("sched running");
        }

        let from = &mut table.procs[slot].context as *mut Context;
        let to = &table.cpus[cpu].scheduler as *const Context;
        // SAFETY: both contexts live in the locked process table, which
        // outlives every context switch.
        unsafe { self.platform.switch_context(from, to) };
    }

    /// Round robin among the LWPs of the current slot.
    ///
    /// Another RUNNABLE LWP of the group is mounted and switched to
    /// directly. If there is none, the slot leaves the CPU through the
    /// per-CPU scheduler (stride entities re-enter the heap first). If the
    /// search came back to the current LWP it simply keeps running.
    pub fn sched_local(&self, table: &mut ProcTable) {
        if self.platform.interrupts_enabled() {
            crate::kpanic!("sched_local interruptible");
        }
        let cpu = self.platform.cpu_id();
        let Some(slot) = table.current(cpu) else {
            crate::kpanic!("sched_local: no process on cpu {}", cpu);
        };
        if table.procs[slot].state == ProcessState::Running {
            crate::kpanic!("sched_local running");
        }

        let prev = {
            let ProcTable { procs, records, .. } = &mut *table;
            records[slot].swap(&mut procs[slot], ProcessState::Runnable)
        };

        let Some(prev) = prev else {
            if table.records[slot].is_stride() {
                let ProcTable {
                    records, stride, ..
                } = &mut *table;
                stride.push(records, slot);
            }
            self.sched(table);
            return;
        };

        if table.records[slot].current == Some(prev) {
            if table.procs[slot].state != ProcessState::Runnable {
                crate::kpanic!("sched_local: remounted thread is not runnable");
            }
            table.procs[slot].state = ProcessState::Running;
            return;
        }

        if let Some(kstack) = table.procs[slot].kstack {
            self.platform.set_kernel_stack(&kstack);
        }
        table.procs[slot].state = ProcessState::Running;
        table.stats.lwp_switches += 1;

        let ProcTable { procs, records, .. } = &mut *table;
        let Some(from) = records[slot]
            .dir
            .get_mut(prev)
            .and_then(|t| match &mut t.lwp {
                crate::thread::Lwp::Unmounted(copy) => Some(&mut copy.context as *mut Context),
                crate::thread::Lwp::Mounted => None,
            })
        else {
            crate::kpanic!("sched_local: unmounted thread vanished");
        };
        let to = &procs[slot].context as *const Context;
        // SAFETY: the private copy sits in a boxed directory page and the
        // shared slot in the process table; neither moves while the lock
        // is held.
        unsafe { self.platform.switch_context(from, to) };
    }

    /// Give up the CPU for one scheduling round.
    pub fn yield_cpu(&self) -> Result<(), SchedError> {
        let mut table = self.lock();
        let slot = self.current_slot(&table)?;
        self.leave_cpu(&mut table, slot);
        Ok(())
    }

    /// Let the next RUNNABLE LWP of the group run.
    pub fn yield_local(&self) -> Result<(), SchedError> {
        let mut table = self.lock();
        let slot = self.current_slot(&table)?;
        table.procs[slot].state = ProcessState::Runnable;
        self.sched_local(&mut table);
        Ok(())
    }

    /// Put the running `slot` back to RUNNABLE and switch to the scheduler;
    /// a stride entity re-enters the heap on the way out.
    fn leave_cpu(&self, table: &mut ProcTable, slot: usize) {
        table.procs[slot].state = ProcessState::Runnable;
        if table.records[slot].is_stride() {
            let ProcTable {
                records, stride, ..
            } = &mut *table;
            stride.push(records, slot);
        }
        self.sched(table);
    }

    /// Timer interrupt: charge the running entity, then yield the CPU if its
    /// quantum is spent, or rotate among its LWPs otherwise.
    pub fn timer_tick(&self, tick: u64) {
        crate::logger::set_clock(tick);

        let mut table = self.lock();
        let Ok(slot) = self.current_slot(&table) else {
            return;
        };
        if table.procs[slot].state != ProcessState::Running {
            return;
        }
        table.add_ticks(slot, tick);

        if table.check_quantum(slot, self.config.stride_quantum) {
            self.leave_cpu(&mut table, slot);
        } else {
            table.procs[slot].state = ProcessState::Runnable;
            self.sched_local(&mut table);
        }
    }

    /// One pass of the per-CPU dispatch loop.
    ///
    /// Picks an entity with [`ProcTable::pick_next`] and switches to it.
    /// Once control comes back, a ZOMBIE slot with a SLEEPING LWP left gets
    /// that LWP mounted so the slot is not reaped under it. Returns the slot
    /// that ran.
    pub fn run_next(&self) -> Option<usize> {
        let cpu = self.platform.cpu_id();
        let mut guard = self.lock();
        let table = &mut *guard;

        let Some(slot) = table.pick_next(&self.tickets) else {
            table.stats.idle_passes += 1;
            return None;
        };

        crate::ktrace!(
            "sched: cpu {} -> pid {} (level {}, pass {})",
            cpu,
            table.procs[slot].pid,
            table.records[slot].level,
            table.records[slot].pass
        );

        table.dispatch(cpu, slot);
        self.platform.switch_uvm(&table.procs[slot]);
        table.stats.context_switches += 1;

        let from = &mut table.cpus[cpu].scheduler as *mut Context;
        let to = &table.procs[slot].context as *const Context;
        // SAFETY: see `sched`.
        unsafe { self.platform.switch_context(from, to) };
        self.platform.switch_kvm();

        if table.procs[slot].state == ProcessState::Zombie {
            table.records[slot].swap(&mut table.procs[slot], ProcessState::Sleeping);
        }
        table.cpus[cpu].proc = None;

        Some(slot)
    }

    /// Per-CPU scheduler loop. Never returns.
    pub fn scheduler(&self) -> ! {
        {
            let cpu = self.platform.cpu_id();
            self.lock().cpus[cpu].proc = None;
        }

        loop {
            // Let pending interrupts in before taking the table lock.
            self.platform.enable_interrupts();
            self.platform.disable_interrupts();
            self.run_next();
        }
    }

    /// Change the current process's CPU share; 0 returns it to the MLFQ.
    pub fn set_cpu_share(&self, tickets: u32) -> Result<(), SchedError> {
        let mut table = self.lock();
        let slot = self.current_slot(&table)?;
        table.set_cpu_share(slot, tickets, &self.tickets, self.config.stride_const)
    }

    /// MLFQ level of the current process, -1 if stride-managed.
    pub fn getlev(&self) -> Result<i32, SchedError> {
        let table = self.lock();
        let slot = self.current_slot(&table)?;
        Ok(table.records[slot].level)
    }
}
