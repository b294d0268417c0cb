//! Mount/unmount tests

#[cfg(test)]
mod tests {
    use hybrid_sched::arch::PAGE_SIZE;
    use hybrid_sched::process::{Process, ProcessState, WaitChannel};
    use hybrid_sched::scheduler::SchedRecord;
    use hybrid_sched::thread::{ThreadId, ThreadSlot};
    
    use crate::mock::{
        kernel, mounted, spawn_running, state_of, thread_copy, with_thread_copy, MockPlatform,
        FORKRET, IMAGE_SIZE,
    };

    const MAIN: ThreadSlot = ThreadSlot::new(0, 0);
    const T1: ThreadSlot = ThreadSlot::new(0, 1);
    const T2: ThreadSlot = ThreadSlot::new(0, 2);

    #[test]
    fn test_yield_local_mounts_next_runnable() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        k.thread_create(0x4000, 7).unwrap();
        let t1_kstack = thread_copy(&k, a, T1).unwrap().kstack.unwrap();

        k.yield_local().unwrap();

        assert_eq!(mounted(&k, a), Some(T1));
        assert_eq!(state_of(&k, a), ProcessState::Running);
        {
            let table = k.lock();
            assert_eq!(table.procs[a].tf.rip, 0x4000);
            assert_eq!(table.procs[a].kstack, Some(t1_kstack));
            // User memory size is a property of the group.
            assert_eq!(table.procs[a].sz, IMAGE_SIZE + 2 * PAGE_SIZE);
            assert_eq!(table.records[a].dir.mounted_count(), 1);
            assert_eq!(table.stats.lwp_switches, 1);
        }

        let main = thread_copy(&k, a, MAIN).unwrap();
        assert_eq!(main.state, ProcessState::Runnable);
        assert_eq!(k.platform().kernel_stack(), Some(t1_kstack));
        assert_eq!(k.platform().last_switch().unwrap().to.rip, FORKRET);
        assert_eq!(k.gettid(), Ok(ThreadId::new(0, 1)));
    }

    #[test]
    fn test_round_robin_wraps_to_main() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        k.thread_create(0x4000, 0).unwrap();
        k.thread_create(0x5000, 0).unwrap();

        let mut order = Vec::new();
        for _ in 0..3 {
            k.yield_local().unwrap();
            order.push(mounted(&k, a).unwrap());
        }
        assert_eq!(order, vec![T1, T2, MAIN]);
        assert_eq!(k.lock().records[a].dir.mounted_count(), 1);
    }

    #[test]
    fn test_lone_thread_keeps_running() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");

        k.yield_local().unwrap();

        assert_eq!(mounted(&k, a), Some(MAIN));
        assert_eq!(state_of(&k, a), ProcessState::Running);
        assert_eq!(k.platform().switch_count(), 0);
        assert_eq!(k.stats().lwp_switches, 0);
    }

    #[test]
    fn test_blocked_sibling_is_skipped() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        k.thread_create(0x4000, 0).unwrap();
        with_thread_copy(&k, a, T1, |p| p.state = ProcessState::Sleeping);

        k.yield_local().unwrap();

        assert_eq!(mounted(&k, a), Some(MAIN));
        assert_eq!(state_of(&k, a), ProcessState::Running);
    }

    #[test]
    fn test_sleep_hands_cpu_to_sibling() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        k.thread_create(0x4000, 0).unwrap();

        k.sleep(WaitChannel::External(1));

        assert_eq!(mounted(&k, a), Some(T1));
        assert_eq!(state_of(&k, a), ProcessState::Running);
        let main = thread_copy(&k, a, MAIN).unwrap();
        assert_eq!(main.state, ProcessState::Sleeping);
        assert_eq!(main.chan, Some(WaitChannel::External(1)));

        k.wakeup(WaitChannel::External(2));
        assert_eq!(thread_copy(&k, a, MAIN).unwrap().state, ProcessState::Sleeping);

        k.wakeup(WaitChannel::External(1));
        assert_eq!(thread_copy(&k, a, MAIN).unwrap().state, ProcessState::Runnable);
    }

    #[test]
    fn test_sleep_without_sibling_leaves_the_cpu() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");

        k.sleep(WaitChannel::External(3));

        assert_eq!(state_of(&k, a), ProcessState::Sleeping);
        let switch = k.platform().last_switch().unwrap();
        assert_eq!(switch.to, k.lock().cpus[0].scheduler);
    }

    #[test]
    fn test_failed_swap_restores_the_slot() {
        let platform = MockPlatform::new();
        let mut record = SchedRecord::new();
        record.install_main_thread();

        let mut shared = Process {
            pid: 9,
            state: ProcessState::Running,
            ..Process::empty()
        };
        shared.tf.rip = 0x1234;
        record.alloc_thread(&shared, &platform).unwrap();

        // The only sibling is still EMBRYO.
        assert_eq!(record.swap(&mut shared, ProcessState::Runnable), None);
        assert_eq!(record.current, Some(MAIN));
        assert_eq!(shared.tf.rip, 0x1234);
        assert_eq!(shared.state, ProcessState::Running);
        assert!(record.dir.get(MAIN).unwrap().is_mounted());

        assert_eq!(record.swap(&mut shared, ProcessState::Embryo), Some(MAIN));
        assert_eq!(record.current, Some(T1));
        assert_eq!(shared.state, ProcessState::Embryo);
        assert_eq!(shared.context.rip, FORKRET);
    }

    #[test]
    fn test_swap_without_threads() {
        let mut record = SchedRecord::new();
        let mut shared = Process::empty();
        assert_eq!(record.swap(&mut shared, ProcessState::Runnable), None);
        assert_eq!(record.thread_state(&shared, MAIN), None);
    }
}
