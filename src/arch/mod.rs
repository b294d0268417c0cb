//! Platform seam
//!
//! Everything the scheduler needs from the machine and from the memory,
//! file and trap layers is reached through [`Platform`]. The bare-metal
//! build gets interrupt-flag handling from the `x86_64` crate; hosted
//! builds (the test suite) supply their own.

use x86_64::structures::paging::{PageSize, Size4KiB};
use x86_64::VirtAddr;

use crate::error::SchedError;
use crate::process::{AddressSpace, Context, FileRef, InodeRef, KernelStack, Process};

/// Size of one user page.
pub const PAGE_SIZE: u64 = Size4KiB::SIZE;

/// Round a user size up to the next page boundary.
pub fn page_round_up(sz: u64) -> Result<VirtAddr, SchedError> {
    VirtAddr::try_new(sz)
        .map(|addr| addr.align_up(PAGE_SIZE))
        .map_err(|_| SchedError::BadAddress)
}

pub trait Platform: Sync {
    /// Index of the executing CPU; must be below `NCPU`.
    fn cpu_id(&self) -> usize;

    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    fn interrupts_enabled(&self) -> bool {
        x86_64::instructions::interrupts::are_enabled()
    }
    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    fn interrupts_enabled(&self) -> bool;

    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    fn enable_interrupts(&self) {
        x86_64::instructions::interrupts::enable();
    }
    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    fn enable_interrupts(&self);

    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    fn disable_interrupts(&self) {
        x86_64::instructions::interrupts::disable();
    }
    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    fn disable_interrupts(&self);

    fn alloc_kstack(&self) -> Option<KernelStack>;
    fn free_kstack(&self, stack: KernelStack);

    /// Fresh kernel context on `stack` that starts in the fork-return
    /// trampoline and from there returns to user mode.
    fn new_context(&self, stack: &KernelStack) -> Context;

    /// Save the running context into `from` and resume `to`.
    ///
    /// # Safety
    /// Both pointers must stay valid until the saved context is resumed;
    /// the process table lock is held across the call and released by the
    /// context that resumes.
    unsafe fn switch_context(&self, from: *mut Context, to: *const Context);

    /// Load the user address space and kernel stack of `proc`.
    fn switch_uvm(&self, proc: &Process);
    /// Return to the kernel-only address space.
    fn switch_kvm(&self);
    /// Point the task state segment at `stack` for the next user->kernel entry.
    fn set_kernel_stack(&self, stack: &KernelStack);

    /// Grow user memory from `old` to `new`; returns the new size.
    fn grow_user(&self, space: AddressSpace, old: VirtAddr, new: VirtAddr) -> Option<VirtAddr>;
    /// Shrink user memory from `old` down to `new`; returns the new size.
    fn shrink_user(&self, space: AddressSpace, old: VirtAddr, new: VirtAddr) -> VirtAddr;
    /// Make the page at `page` inaccessible from user mode (stack guard).
    fn clear_user_access(&self, space: AddressSpace, page: VirtAddr);
    /// Copy machine words to user memory at `dst`.
    fn copy_out(&self, space: AddressSpace, dst: VirtAddr, words: &[u64]) -> Result<(), SchedError>;
    /// Duplicate the first `size` bytes of `space` into a new address space.
    fn copy_space(&self, space: AddressSpace, size: u64) -> Option<AddressSpace>;
    fn free_space(&self, space: AddressSpace);

    fn file_dup(&self, file: FileRef) -> FileRef;
    fn file_close(&self, file: FileRef);
    fn inode_dup(&self, inode: InodeRef) -> InodeRef;
    fn inode_put(&self, inode: InodeRef);
}
