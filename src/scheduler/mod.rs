//! Scheduler subsystem
//!
//! Hybrid MLFQ + stride scheduling over a fixed process table.
//!
//! Every process slot is scheduled either by a three-level feedback queue
//! or, once it has asked for a CPU share, by a stride heap keyed on pass.
//! The feedback queue holds its own ticket share and competes against the
//! heap as a single aggregate entity.
//!
//! ## Module Organization
//!
//! - `ticket`: global ticket pool
//! - `record`: per-slot scheduling record
//! - `level_queue`: one MLFQ level (circular queue)
//! - `mlfq`: the feedback queue (demotion, boost)
//! - `stride`: the stride min-heap
//! - `addrstack`: recycled thread stack bases
//! - `table`: process table, CPUs and the `Kernel` instance
//! - `core`: unified selection, tick accounting, context switch entry points
//! - `stats`: counters reported by `procdump`

mod addrstack;
mod core;
mod level_queue;
mod mlfq;
mod record;
mod stats;
mod stride;
mod table;
mod ticket;

pub use addrstack::{AddrStack, ADDR_STACK_CAPACITY};
pub use level_queue::LevelQueue;
pub use mlfq::Mlfq;
pub use record::{SchedRecord, STRIDE_LEVEL};
pub use stats::SchedStats;
pub use stride::StrideQueue;
pub use table::{Cpu, Kernel, ProcTable};
pub use ticket::TicketBox;
