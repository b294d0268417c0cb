//! Thread records and the per-group thread directory

use alloc::boxed::Box;

use x86_64::VirtAddr;

use crate::process::{Process, ProcessState};

/// Thread records per directory page
pub const NTHREAD: usize = 26;
/// Pages per directory
pub const NTHREADPAGE: usize = 10;
/// Id of the main thread
pub const MAIN_TID: u16 = 0;

/// User-visible thread identity: directory page plus thread id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadId {
    pub page: i32,
    pub tid: i32,
}

impl ThreadId {
    pub const INVALID: ThreadId = ThreadId { page: -1, tid: -1 };

    pub const fn new(page: usize, tid: u16) -> Self {
        Self {
            page: page as i32,
            tid: tid as i32,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.page >= 0 && self.tid >= 0
    }

    /// Directory location this id resolves to, if it is in range.
    pub fn slot(&self) -> Option<ThreadSlot> {
        let page = usize::try_from(self.page).ok()?;
        let tid = u16::try_from(self.tid).ok()?;
        if page >= NTHREADPAGE {
            return None;
        }
        Some(ThreadSlot::new(page, usize::from(tid) % NTHREAD))
    }
}

/// Location of a thread record inside a directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadSlot {
    pub page: usize,
    pub index: usize,
}

impl ThreadSlot {
    pub const fn new(page: usize, index: usize) -> Self {
        Self { page, index }
    }

    /// Position in page-major order across the whole directory.
    pub const fn flat(&self) -> usize {
        self.page * NTHREAD + self.index
    }

    pub const fn from_flat(flat: usize) -> Self {
        Self {
            page: flat / NTHREAD,
            index: flat % NTHREAD,
        }
    }
}

/// Where an LWP's process state currently lives.
#[derive(Clone, Copy, Debug)]
pub enum Lwp {
    /// The state is the shared process slot.
    Mounted,
    /// The state is this private copy; the slot belongs to a sibling.
    Unmounted(Process),
}

#[derive(Clone, Copy, Debug)]
pub struct Thread {
    pub lwp: Lwp,
    pub page: usize,
    pub tid: u16,
    /// Next waiter in the join list this thread is queued on.
    pub next: Option<ThreadSlot>,
    /// First and last thread waiting to join this one.
    pub head: Option<ThreadSlot>,
    pub tail: Option<ThreadSlot>,
    pub retval: usize,
    /// Top of this thread's user stack.
    pub ustack_top: VirtAddr,
}

impl Thread {
    pub fn new(page: usize, tid: u16, lwp: Lwp) -> Self {
        Self {
            lwp,
            page,
            tid,
            next: None,
            head: None,
            tail: None,
            retval: 0,
            ustack_top: VirtAddr::zero(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.lwp, Lwp::Mounted)
    }

    /// Lifecycle state; `shared` is the slot the group is mounted on.
    pub fn state(&self, shared: &Process) -> ProcessState {
        match &self.lwp {
            Lwp::Mounted => shared.state,
            Lwp::Unmounted(copy) => copy.state,
        }
    }

    /// The process state this thread owns, wherever it lives.
    pub fn proc_mut<'a>(&'a mut self, shared: &'a mut Process) -> &'a mut Process {
        match &mut self.lwp {
            Lwp::Mounted => shared,
            Lwp::Unmounted(copy) => copy,
        }
    }

    pub fn id(&self) -> ThreadId {
        ThreadId::new(self.page, self.tid)
    }
}

/// One page of thread records.
pub struct ThreadPage {
    /// Live threads in this page
    pub live: usize,
    pub threads: [Option<Thread>; NTHREAD],
}

impl ThreadPage {
    pub const fn new() -> Self {
        Self {
            live: 0,
            threads: [None; NTHREAD],
        }
    }
}

/// Lazily populated pages of thread records.
pub struct ThreadDirectory {
    pages: [Option<Box<ThreadPage>>; NTHREADPAGE],
}

impl ThreadDirectory {
    pub fn new() -> Self {
        Self {
            pages: core::array::from_fn(|_| None),
        }
    }

    pub fn page(&self, page: usize) -> Option<&ThreadPage> {
        self.pages.get(page)?.as_deref()
    }

    pub fn page_mut(&mut self, page: usize) -> Option<&mut ThreadPage> {
        self.pages.get_mut(page)?.as_deref_mut()
    }

    /// Page `page`, allocated zeroed if absent.
    pub fn page_or_alloc(&mut self, page: usize) -> &mut ThreadPage {
        self.pages[page].get_or_insert_with(|| Box::new(ThreadPage::new()))
    }

    pub fn free_page(&mut self, page: usize) {
        self.pages[page] = None;
    }

    pub fn is_allocated(&self, page: usize) -> bool {
        self.pages.get(page).is_some_and(Option::is_some)
    }

    pub fn get(&self, slot: ThreadSlot) -> Option<&Thread> {
        self.page(slot.page)?.threads.get(slot.index)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: ThreadSlot) -> Option<&mut Thread> {
        self.page_mut(slot.page)?.threads.get_mut(slot.index)?.as_mut()
    }

    /// Occupied records in page-major order.
    pub fn iter(&self) -> impl Iterator<Item = (ThreadSlot, &Thread)> + '_ {
        self.pages
            .iter()
            .enumerate()
            .filter_map(|(pn, page)| page.as_deref().map(|p| (pn, p)))
            .flat_map(|(pn, page)| {
                page.threads
                    .iter()
                    .enumerate()
                    .filter_map(move |(i, t)| t.as_ref().map(|t| (ThreadSlot::new(pn, i), t)))
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ThreadSlot, &mut Thread)> + '_ {
        self.pages
            .iter_mut()
            .enumerate()
            .filter_map(|(pn, page)| page.as_deref_mut().map(|p| (pn, p)))
            .flat_map(|(pn, page)| {
                page.threads
                    .iter_mut()
                    .enumerate()
                    .filter_map(move |(i, t)| t.as_mut().map(|t| (ThreadSlot::new(pn, i), t)))
            })
    }

    pub fn thread_count(&self) -> usize {
        self.pages
            .iter()
            .filter_map(|p| p.as_deref())
            .map(|p| p.live)
            .sum()
    }

    pub fn mounted_count(&self) -> usize {
        self.iter().filter(|(_, t)| t.is_mounted()).count()
    }
}

impl Default for ThreadDirectory {
    fn default() -> Self {
        Self::new()
    }
}
