//! Thread Multiplexer Test Suite
//!
//! - `create`: ids, user stacks, recycled bases, failure rollback
//! - `swap`: mounting, LWP round robin, sleep inside a group
//! - `join`: join lists, exit, reclamation

mod join;
mod swap;
