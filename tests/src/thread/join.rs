//! Join, thread exit and reclamation tests

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use hybrid_sched::arch::PAGE_SIZE;
    use hybrid_sched::process::{Process, ProcessState};
    use hybrid_sched::scheduler::SchedRecord;
    use hybrid_sched::thread::{ThreadId, ThreadSlot, NTHREAD};
    use hybrid_sched::SchedError;
    use x86_64::VirtAddr;

    use crate::mock::{
        exit_thread, kernel, mounted, spawn, spawn_running, state_of, thread_copy, MockPlatform,
        IMAGE_SIZE,
    };

    const MAIN: ThreadSlot = ThreadSlot::new(0, 0);
    const T1: ThreadSlot = ThreadSlot::new(0, 1);
    const T2: ThreadSlot = ThreadSlot::new(0, 2);

    #[test]
    fn test_join_exited_thread() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        let t1 = k.thread_create(0x4000, 0).unwrap();
        k.thread_create(0x5000, 0).unwrap();
        assert_eq!(k.platform().live_kstacks(), 3);

        k.yield_local().unwrap();
        assert_eq!(mounted(&k, a), Some(T1));
        exit_thread(&k, a, 42);
        assert_eq!(mounted(&k, a), Some(T2));
        assert_eq!(thread_copy(&k, a, T1).unwrap().state, ProcessState::Zombie);

        assert_eq!(k.thread_join(t1), Ok(42));

        let table = k.lock();
        let record = &table.records[a];
        assert!(record.dir.get(T1).is_none());
        assert_eq!(record.dir.thread_count(), 2);
        // Page 0 always stays.
        assert!(record.dir.is_allocated(0));
        // The stack base is kept for the next thread.
        assert_eq!(record.trash.peek(), Some(VirtAddr::new(IMAGE_SIZE)));
        assert_eq!(k.platform().live_kstacks(), 2);

        let space = table.procs[a].pgdir.unwrap();
        let mem = k.platform().space(space).unwrap();
        assert!(mem
            .shrunk
            .contains(&(IMAGE_SIZE + 2 * PAGE_SIZE, IMAGE_SIZE)));
    }

    #[test]
    fn test_reclaim_frees_emptied_page() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        let mut last = None;
        for _ in 0..NTHREAD {
            last = Some(k.thread_create(0x4000, 0).unwrap());
        }
        let target = last.unwrap();
        assert_eq!(target, ThreadId::new(1, NTHREAD as u16));
        let target_slot = ThreadSlot::new(1, 0);

        for _ in 0..NTHREAD {
            k.yield_local().unwrap();
        }
        assert_eq!(mounted(&k, a), Some(target_slot));

        exit_thread(&k, a, 7);
        assert_eq!(mounted(&k, a), Some(MAIN));

        assert_eq!(k.thread_join(target), Ok(7));
        assert!(!k.lock().records[a].dir.is_allocated(1));
        assert_eq!(k.lock().records[a].dir.thread_count(), NTHREAD);
    }

    #[test]
    fn test_joiner_sleeps_until_exit() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        let t1 = k.thread_create(0x4000, 0).unwrap();

        assert_eq!(k.lock().join_wait(a, t1), Ok(None));
        assert_eq!(state_of(&k, a), ProcessState::Sleeping);
        assert!(k.lock().records[a].is_waiting(T1, MAIN));

        {
            let mut table = k.lock();
            k.sched_local(&mut table);
        }
        assert_eq!(mounted(&k, a), Some(T1));

        exit_thread(&k, a, 5);
        // The exit woke the joiner, which is the next runnable thread.
        assert_eq!(mounted(&k, a), Some(MAIN));
        assert_eq!(state_of(&k, a), ProcessState::Running);

        assert_eq!(k.thread_join(t1), Ok(5));
        assert!(k.lock().records[a].dir.get(T1).is_none());
    }

    #[test]
    fn test_tail_joiner_reclaims() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        let t1 = k.thread_create(0x4000, 0).unwrap();
        k.thread_create(0x5000, 0).unwrap();

        // main waits on t1, then t2 does.
        assert_eq!(k.lock().join_wait(a, t1), Ok(None));
        {
            let mut table = k.lock();
            k.sched_local(&mut table);
        }
        assert_eq!(mounted(&k, a), Some(T1));
        k.yield_local().unwrap();
        assert_eq!(mounted(&k, a), Some(T2));
        assert_eq!(k.lock().join_wait(a, t1), Ok(None));
        {
            let mut table = k.lock();
            k.sched_local(&mut table);
        }
        assert_eq!(mounted(&k, a), Some(T1));
        assert_eq!(k.lock().records[a].dir.get(T1).unwrap().tail, Some(T2));

        exit_thread(&k, a, 9);
        assert_eq!(mounted(&k, a), Some(T2));
        assert_eq!(thread_copy(&k, a, MAIN).unwrap().state, ProcessState::Runnable);

        // t2 is the tail and frees t1.
        assert_eq!(k.thread_join(t1), Ok(9));
        assert!(k.lock().records[a].dir.get(T1).is_none());

        // main finds nothing left to join.
        k.yield_local().unwrap();
        assert_eq!(mounted(&k, a), Some(MAIN));
        assert_eq!(k.thread_join(t1), Err(SchedError::NoSuchThread));
    }

    #[test]
    fn test_non_tail_joiner_leaves_the_list() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        let t1 = k.thread_create(0x4000, 0).unwrap();
        k.thread_create(0x5000, 0).unwrap();

        assert_eq!(k.lock().join_wait(a, t1), Ok(None));
        {
            let mut table = k.lock();
            k.sched_local(&mut table);
        }
        k.yield_local().unwrap();
        assert_eq!(k.lock().join_wait(a, t1), Ok(None));
        {
            let mut table = k.lock();
            k.sched_local(&mut table);
        }
        exit_thread(&k, a, 9);
        assert_eq!(mounted(&k, a), Some(T2));

        // Let main (head of the list) collect first.
        k.yield_local().unwrap();
        assert_eq!(mounted(&k, a), Some(MAIN));
        assert_eq!(k.thread_join(t1), Ok(9));
        {
            let table = k.lock();
            assert!(table.records[a].dir.get(T1).is_some());
            assert!(!table.records[a].is_waiting(T1, MAIN));
        }

        k.yield_local().unwrap();
        assert_eq!(mounted(&k, a), Some(T2));
        assert_eq!(k.thread_join(t1), Ok(9));
        assert!(k.lock().records[a].dir.get(T1).is_none());
    }

    #[test]
    fn test_join_self() {
        let k = kernel();
        spawn_running(&k, "a");
        k.thread_create(0x4000, 0).unwrap();

        assert_eq!(k.thread_join(ThreadId::new(0, 0)), Err(SchedError::JoinSelf));
    }

    #[test]
    fn test_join_unknown_thread() {
        let k = kernel();
        spawn_running(&k, "a");
        k.thread_create(0x4000, 0).unwrap();

        for id in [
            ThreadId::new(0, 7),
            ThreadId::new(1, 1),
            ThreadId::INVALID,
            ThreadId { page: 99, tid: 1 },
            // Right slot, wrong id.
            ThreadId::new(0, 1 + NTHREAD as u16),
        ] {
            assert_eq!(k.thread_join(id), Err(SchedError::NoSuchThread), "{:?}", id);
        }
    }

    #[test]
    fn test_killed_joiner_gives_up() {
        let k = kernel();
        let (pid, a) = spawn_running(&k, "a");
        let t1 = k.thread_create(0x4000, 0).unwrap();

        assert_eq!(k.lock().join_wait(a, t1), Ok(None));
        k.kill(pid).unwrap();
        assert_eq!(state_of(&k, a), ProcessState::Runnable);

        assert_eq!(k.lock().join_wait(a, t1), Err(SchedError::Killed));
        let table = k.lock();
        assert!(!table.records[a].is_waiting(T1, MAIN));
        assert_eq!(table.records[a].dir.get(T1).unwrap().head, None);
    }

    #[test]
    fn test_last_thread_cannot_exit_alone() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        assert!(!k.lock().exit_current_thread(a, 1));
        assert_eq!(state_of(&k, a), ProcessState::Running);

        // Zombie siblings do not count.
        k.thread_create(0x4000, 0).unwrap();
        k.yield_local().unwrap();
        exit_thread(&k, a, 0);
        assert_eq!(mounted(&k, a), Some(MAIN));
        assert!(!k.lock().exit_current_thread(a, 1));
    }

    #[test]
    fn test_thread_exit_switches_to_sibling() {
        let k = kernel();
        let (_, a) = spawn_running(&k, "a");
        k.thread_create(0x4000, 0).unwrap();

        // The mock switch returns, so the exiting thread ends in a panic.
        let result = catch_unwind(AssertUnwindSafe(|| k.thread_exit(3)));
        assert!(result.is_err());

        assert_eq!(mounted(&k, a), Some(T1));
        let main = thread_copy(&k, a, MAIN).unwrap();
        assert_eq!(main.state, ProcessState::Zombie);
        assert_eq!(k.lock().records[a].dir.get(MAIN).unwrap().retval, 3);
    }

    #[test]
    fn test_thread_exit_of_last_thread_exits_process() {
        let k = kernel();
        spawn(&k, "init");
        let (_, a) = spawn_running(&k, "a");

        let result = catch_unwind(AssertUnwindSafe(|| k.thread_exit(0)));
        assert!(result.is_err());
        assert_eq!(state_of(&k, a), ProcessState::Zombie);
    }

    #[test]
    fn test_free_mounted_thread_is_fatal() {
        let platform = MockPlatform::new();
        let mut record = SchedRecord::new();
        record.install_main_thread();
        let shared = Process::empty();

        let result = catch_unwind(AssertUnwindSafe(|| {
            record.free_thread(&shared, MAIN, &platform)
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_free_live_thread_is_fatal() {
        let platform = MockPlatform::new();
        let mut record = SchedRecord::new();
        record.install_main_thread();
        let shared = Process::empty();
        let slot = record.alloc_thread(&shared, &platform).unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| {
            record.free_thread(&shared, slot, &platform)
        }));
        assert!(result.is_err());
        assert!(record.dir.get(slot).is_some());
    }

    #[test]
    fn test_gettid() {
        let k = kernel();
        assert_eq!(k.gettid(), Err(SchedError::NoProcess));

        spawn_running(&k, "a");
        assert_eq!(k.gettid(), Ok(ThreadId::new(0, 0)));
    }
}
