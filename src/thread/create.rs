//! Thread allocation and creation

use x86_64::VirtAddr;

use crate::arch::{page_round_up, Platform, PAGE_SIZE};
use crate::error::SchedError;
use crate::process::{AddressSpace, Process, ProcessState};
use crate::scheduler::SchedRecord;

use super::types::{Lwp, Thread, ThreadId, ThreadSlot, MAIN_TID, NTHREAD, NTHREADPAGE};

/// Fake return address below a new thread's argument.
pub const FAKE_RETURN_PC: u64 = 0xffff_ffff;

impl SchedRecord {
    /// Install the main thread (id 0) mounted on the slot.
    ///
    /// Page 0 is reset; the next id handed out is 1.
    pub fn install_main_thread(&mut self) {
        let page = self.dir.page_or_alloc(0);
        page.threads = [None; NTHREAD];
        page.threads[0] = Some(Thread::new(0, MAIN_TID, Lwp::Mounted));
        page.live = 1;

        self.current = Some(ThreadSlot::new(0, 0));
        self.next_tid = MAIN_TID + 1;
    }

    /// Claim a thread record and give it a private EMBRYO copy of `shared`
    /// with its own kernel stack and a fresh context.
    pub fn alloc_thread<P: Platform>(
        &mut self,
        shared: &Process,
        platform: &P,
    ) -> Result<ThreadSlot, SchedError> {
        // An id whose index is taken in every page is skipped; one round
        // over all indices (plus the two skipped ids) finds any free record.
        let mut tid = self.next_tid;
        let mut found = None;
        for _ in 0..NTHREAD + 2 {
            if tid == u16::MAX || tid == MAIN_TID {
                // 0 stays reserved for the main thread.
                tid = MAIN_TID + 1;
            }
            let index = usize::from(tid) % NTHREAD;
            let free = (0..NTHREADPAGE).find(|&pn| {
                self.dir
                    .page(pn)
                    .map_or(true, |page| page.threads[index].is_none())
            });
            if let Some(pn) = free {
                found = Some((pn, index));
                break;
            }
            tid += 1;
        }
        let Some((pn, index)) = found else {
            crate::kwarn!("thread: directory full (next tid {})", self.next_tid);
            return Err(SchedError::ThreadTableFull);
        };

        // The page is only allocated once the kernel stack is there.
        let Some(kstack) = platform.alloc_kstack() else {
            crate::kerror!("thread: kernel stack allocation failed");
            return Err(SchedError::OutOfMemory);
        };

        let mut copy = *shared;
        copy.state = ProcessState::Embryo;
        copy.kstack = Some(kstack);
        copy.context = platform.new_context(&kstack);

        self.next_tid = tid + 1;

        let page = self.dir.page_or_alloc(pn);
        page.threads[index] = Some(Thread::new(pn, tid, Lwp::Unmounted(copy)));
        page.live += 1;

        Ok(ThreadSlot::new(pn, index))
    }

    /// Undo [`alloc_thread`](Self::alloc_thread) for a thread that never ran.
    fn discard_thread<P: Platform>(&mut self, slot: ThreadSlot, platform: &P) {
        let Some(page) = self.dir.page_mut(slot.page) else {
            return;
        };
        if let Some(thread) = page.threads[slot.index].take() {
            if let Lwp::Unmounted(copy) = thread.lwp {
                if let Some(kstack) = copy.kstack {
                    platform.free_kstack(kstack);
                }
            }
            page.live -= 1;
        }
        if page.live == 0 && slot.page != 0 {
            self.dir.free_page(slot.page);
        }
    }

    /// Create a RUNNABLE thread that starts at `entry` with `arg` on a new
    /// user stack.
    ///
    /// A stack base left behind by a joined thread is reused when one is
    /// available; otherwise two pages are added on top of user memory, the
    /// lower one as an inaccessible guard.
    pub fn fork_thread<P: Platform>(
        &mut self,
        shared: &mut Process,
        entry: u64,
        arg: u64,
        platform: &P,
    ) -> Result<ThreadId, SchedError> {
        let space = shared.pgdir.ok_or(SchedError::BadAddress)?;
        let slot = self.alloc_thread(shared, platform)?;

        match self.setup_user_stack(shared, space, arg, platform) {
            Ok((top, sp)) => {
                let Some(thread) = self.dir.get_mut(slot) else {
                    return Err(SchedError::NoSuchThread);
                };
                thread.ustack_top = top;
                if let Lwp::Unmounted(copy) = &mut thread.lwp {
                    copy.tf.rip = entry;
                    copy.tf.rsp = sp.as_u64();
                    copy.sz = shared.sz;
                    copy.state = ProcessState::Runnable;
                }
                let id = thread.id();
                crate::kdebug!(
                    "thread: pid {} created tid {} (page {}) entry={:#x} stack top={:#x}",
                    shared.pid,
                    id.tid,
                    id.page,
                    entry,
                    top.as_u64()
                );
                Ok(id)
            }
            Err(err) => {
                self.discard_thread(slot, platform);
                crate::kerror!("thread: user stack setup failed: {}", err);
                Err(err)
            }
        }
    }

    /// Returns the stack top and the initial stack pointer.
    fn setup_user_stack<P: Platform>(
        &mut self,
        shared: &mut Process,
        space: AddressSpace,
        arg: u64,
        platform: &P,
    ) -> Result<(VirtAddr, VirtAddr), SchedError> {
        let frame = [FAKE_RETURN_PC, arg];
        let frame_size = (frame.len() * core::mem::size_of::<u64>()) as u64;

        if let Some(base) = self.trash.pop() {
            // The hole is reused as is; user memory size does not change.
            let Some(top) = platform.grow_user(space, base, base + 2 * PAGE_SIZE) else {
                self.trash.push(base);
                return Err(SchedError::OutOfMemory);
            };
            platform.clear_user_access(space, top - 2 * PAGE_SIZE);
            let sp = top - frame_size;
            if let Err(err) = platform.copy_out(space, sp, &frame) {
                platform.shrink_user(space, top, base);
                self.trash.push(base);
                return Err(err);
            }
            return Ok((top, sp));
        }

        let base = page_round_up(shared.sz)?;
        let top = platform
            .grow_user(space, base, base + 2 * PAGE_SIZE)
            .ok_or(SchedError::OutOfMemory)?;
        platform.clear_user_access(space, top - 2 * PAGE_SIZE);
        let sp = top - frame_size;
        if let Err(err) = platform.copy_out(space, sp, &frame) {
            platform.shrink_user(space, top, base);
            return Err(err);
        }

        shared.sz = top.as_u64();
        Ok((top, sp))
    }
}
