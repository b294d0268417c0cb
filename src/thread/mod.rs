//! Lightweight-thread multiplexer
//!
//! Every process slot hosts a group of LWPs. Exactly one of them is mounted:
//! its state *is* the process slot. The others keep private copies in their
//! thread records until they are swapped in.
//!
//! - `types`: thread records, directory pages, ids
//! - `create`: allocation and creation with a fresh user stack
//! - `swap`: mount/unmount
//! - `join`: join lists, exit and reclamation
//! - `group`: thread operations of the running process

mod create;
mod group;
mod join;
mod swap;
mod types;

pub use create::FAKE_RETURN_PC;
pub use types::{
    Lwp, Thread, ThreadDirectory, ThreadId, ThreadPage, ThreadSlot, MAIN_TID, NTHREAD,
    NTHREADPAGE,
};
