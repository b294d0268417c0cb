/// Counters kept alongside the process table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// Entities picked from the feedback queue
    pub mlfq_picks: u64,
    /// Entities picked from the stride heap
    pub stride_picks: u64,
    /// Scheduler passes that found nothing runnable
    pub idle_passes: u64,
    pub boosts: u64,
    /// Allotment expiries (level 0 -> 1, 1 -> 2)
    pub demotions: u64,
    /// Direct switches between LWPs of one group
    pub lwp_switches: u64,
    /// Switches into a process from the per-CPU scheduler
    pub context_switches: u64,
}

impl SchedStats {
    pub const fn new() -> Self {
        Self {
            mlfq_picks: 0,
            stride_picks: 0,
            idle_passes: 0,
            boosts: 0,
            demotions: 0,
            lwp_switches: 0,
            context_switches: 0,
        }
    }
}
