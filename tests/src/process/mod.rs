//! Process Test Suite
//!
//! - `lifecycle`: slot allocation, fork, exit, wait, kill, sleep/wakeup
//! - `exec`: exec serialization and the group reset on commit
