//! Join lists, thread exit and reclamation

use crate::arch::{Platform, PAGE_SIZE};
use crate::error::SchedError;
use crate::process::{Process, ProcessState};
use crate::scheduler::SchedRecord;

use super::types::{Lwp, ThreadId, ThreadPage, ThreadSlot, NTHREADPAGE};

impl SchedRecord {
    /// Resolve a user-supplied id to a live thread of this group.
    pub fn resolve(&self, id: ThreadId) -> Result<ThreadSlot, SchedError> {
        let slot = id.slot().ok_or(SchedError::NoSuchThread)?;
        match self.dir.get(slot) {
            Some(thread) if i32::from(thread.tid) == id.tid => Ok(slot),
            _ => Err(SchedError::NoSuchThread),
        }
    }

    /// Append `waiter` to the join list of `target`.
    pub fn link_waiter(&mut self, target: ThreadSlot, waiter: ThreadSlot) {
        let old_tail = match self.dir.get_mut(target) {
            Some(thread) => {
                let old_tail = thread.tail;
                if old_tail.is_none() {
                    thread.head = Some(waiter);
                }
                thread.tail = Some(waiter);
                old_tail
            }
            None => return,
        };

        if let Some(tail) = old_tail {
            if let Some(prev) = self.dir.get_mut(tail) {
                prev.next = Some(waiter);
            }
        }
        if let Some(w) = self.dir.get_mut(waiter) {
            w.next = None;
        }
    }

    /// Whether `waiter` is queued on the join list of `target`.
    pub fn is_waiting(&self, target: ThreadSlot, waiter: ThreadSlot) -> bool {
        let mut cursor = self.dir.get(target).and_then(|t| t.head);
        while let Some(node) = cursor {
            if node == waiter {
                return true;
            }
            cursor = self.dir.get(node).and_then(|t| t.next);
        }
        false
    }

    /// Take `waiter` off the join list of `target` (a joiner that gave up).
    pub fn unlink_waiter(&mut self, target: ThreadSlot, waiter: ThreadSlot) {
        let Some(head) = self.dir.get(target).and_then(|t| t.head) else {
            return;
        };
        let after = self.dir.get(waiter).and_then(|w| w.next);

        let mut prev = None;
        let mut cursor = Some(head);
        while let Some(node) = cursor {
            if node == waiter {
                break;
            }
            prev = Some(node);
            cursor = self.dir.get(node).and_then(|t| t.next);
        }
        if cursor.is_none() {
            return;
        }

        match prev {
            Some(p) => {
                if let Some(p) = self.dir.get_mut(p) {
                    p.next = after;
                }
            }
            None => {
                if let Some(t) = self.dir.get_mut(target) {
                    t.head = after;
                }
            }
        }
        if let Some(t) = self.dir.get_mut(target) {
            if t.tail == Some(waiter) {
                t.tail = prev;
            }
        }
        if let Some(w) = self.dir.get_mut(waiter) {
            w.next = None;
        }
    }

    /// Store the mounted thread's return value, make every joiner RUNNABLE
    /// and mark the mounted thread ZOMBIE.
    pub fn exit_thread(&mut self, shared: &mut Process, retval: usize) {
        let Some(current) = self.current else {
            return;
        };

        let mut cursor = match self.dir.get_mut(current) {
            Some(thread) => {
                thread.retval = retval;
                thread.head
            }
            None => None,
        };
        while let Some(slot) = cursor {
            let Some(waiter) = self.dir.get_mut(slot) else {
                break;
            };
            if let Lwp::Unmounted(copy) = &mut waiter.lwp {
                copy.state = ProcessState::Runnable;
            }
            cursor = waiter.next;
        }

        shared.state = ProcessState::Zombie;
    }

    /// Reclaim a joined ZOMBIE thread: kernel stack, directory slot, page
    /// (unless page 0) and user stack, whose base is kept for reuse.
    ///
    /// Freeing the mounted thread or a thread that has not exited is a
    /// fatal invariant violation.
    pub fn free_thread<P: Platform>(&mut self, shared: &Process, target: ThreadSlot, platform: &P) {
        if self.current == Some(target) {
            crate::kpanic!("free_thread: target is the mounted thread");
        }
        let Some(thread) = self.dir.get(target).copied() else {
            crate::kpanic!("free_thread: no thread at {:?}", target);
        };
        let copy = match thread.lwp {
            Lwp::Unmounted(copy) if copy.state == ProcessState::Zombie => copy,
            _ => crate::kpanic!("free_thread: tid {} is not a zombie", thread.tid),
        };

        if let Some(kstack) = copy.kstack {
            platform.free_kstack(kstack);
        }

        if let Some(page) = self.dir.page_mut(target.page) {
            page.threads[target.index] = None;
            page.live -= 1;
            if page.live == 0 && target.page != 0 {
                self.dir.free_page(target.page);
            }
        }

        if let Some(space) = shared.pgdir {
            let top = thread.ustack_top;
            if top.as_u64() >= 2 * PAGE_SIZE {
                let base = platform.shrink_user(space, top, top - 2 * PAGE_SIZE);
                self.trash.push(base);
            }
            platform.switch_uvm(shared);
        }

        crate::kdebug!(
            "thread: pid {} freed tid {} (page {}), {} stack(s) to recycle",
            shared.pid,
            thread.tid,
            thread.page,
            self.trash.len()
        );
    }

    /// Free the kernel stacks of every unmounted LWP and drop the directory
    /// pages, page 0 included unless `keep_first`. The mounted LWP's kernel
    /// stack belongs to the process slot and is left alone.
    pub fn release_threads<P: Platform>(&mut self, platform: &P, keep_first: bool) {
        for (_, thread) in self.dir.iter() {
            if let Lwp::Unmounted(copy) = &thread.lwp {
                if let Some(kstack) = copy.kstack {
                    platform.free_kstack(kstack);
                }
            }
        }

        for pn in 0..NTHREADPAGE {
            if pn == 0 && keep_first {
                if let Some(page) = self.dir.page_mut(0) {
                    *page = ThreadPage::new();
                }
                continue;
            }
            self.dir.free_page(pn);
        }
        self.current = None;
    }

    pub fn current_tid(&self) -> Option<u16> {
        self.current
            .and_then(|slot| self.dir.get(slot))
            .map(|t| t.tid)
    }
}
