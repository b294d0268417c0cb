//! Stride heap tests

#[cfg(test)]
mod tests {
    use hybrid_sched::config::STRIDE_CONST;
    use hybrid_sched::process::{Process, ProcessState};
    use hybrid_sched::scheduler::{SchedRecord, StrideQueue, TicketBox, STRIDE_LEVEL};
    use hybrid_sched::SchedError;

    fn records(n: usize) -> Vec<SchedRecord> {
        (0..n).map(|_| SchedRecord::new()).collect()
    }

    fn procs(states: &[ProcessState]) -> Vec<Process> {
        states
            .iter()
            .map(|&state| Process {
                state,
                ..Process::empty()
            })
            .collect()
    }

    fn assert_heap(queue: &StrideQueue, records: &[SchedRecord]) {
        let heap = queue.as_slice();
        for i in 1..heap.len() {
            let parent = (i - 1) / 2;
            assert!(
                records[heap[parent]].pass <= records[heap[i]].pass,
                "heap order broken at {}",
                i
            );
        }
    }

    #[test]
    fn test_pop_in_pass_order() {
        let passes = [50, 10, 70, 30, 90, 20, 60, 40, 80, 0];
        let mut recs = records(passes.len());
        for (r, &p) in recs.iter_mut().zip(passes.iter()) {
            r.pass = p;
        }

        let mut queue = StrideQueue::new();
        for slot in 0..passes.len() {
            queue.push(&recs, slot);
            assert_heap(&queue, &recs);
        }
        assert_eq!(queue.peek(), Some(9));

        let mut popped = Vec::new();
        while let Some(slot) = queue.pop(&recs) {
            assert_heap(&queue, &recs);
            popped.push(recs[slot].pass);
        }
        assert_eq!(popped, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_rekeys_existing_entry() {
        let mut recs = records(3);
        recs[0].pass = 5;
        recs[1].pass = 10;
        recs[2].pass = 15;

        let mut queue = StrideQueue::new();
        for slot in 0..3 {
            queue.push(&recs, slot);
        }

        recs[0].pass = 100;
        queue.push(&recs, 0);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek(), Some(1));
        assert_heap(&queue, &recs);
    }

    #[test]
    fn test_remove_from_middle() {
        let mut recs = records(6);
        for (i, r) in recs.iter_mut().enumerate() {
            r.pass = (i as u64) * 10;
        }
        let mut queue = StrideQueue::new();
        for slot in 0..6 {
            queue.push(&recs, slot);
        }

        assert!(queue.remove(&recs, 2));
        assert!(!queue.remove(&recs, 2));
        assert!(!queue.contains(2));
        assert_eq!(queue.len(), 5);
        assert_heap(&queue, &recs);
    }

    #[test]
    fn test_insert_new_member() {
        let pool = TicketBox::new(100);
        let mut recs = records(2);
        let mut queue = StrideQueue::new();

        queue
            .insert_new(&mut recs, 0, 30, 7, &pool, STRIDE_CONST)
            .unwrap();

        assert_eq!(recs[0].ticket, 30);
        assert_eq!(recs[0].pass, 7);
        assert_eq!(recs[0].stride, STRIDE_CONST / 30);
        assert_eq!(recs[0].level, STRIDE_LEVEL);
        assert_eq!(pool.available(), 70);
        assert!(queue.contains(0));
    }

    #[test]
    fn test_renegotiate_keeps_pass() {
        let pool = TicketBox::new(100);
        let mut recs = records(1);
        let mut queue = StrideQueue::new();

        queue.insert_new(&mut recs, 0, 30, 0, &pool, STRIDE_CONST).unwrap();
        recs[0].pass = 1234;

        // Surplus goes back to the pool.
        queue.insert_new(&mut recs, 0, 10, 0, &pool, STRIDE_CONST).unwrap();
        assert_eq!(pool.available(), 90);
        assert_eq!(recs[0].stride, STRIDE_CONST / 10);
        assert_eq!(recs[0].pass, 1234);

        // Deficit is taken from it.
        queue.insert_new(&mut recs, 0, 50, 0, &pool, STRIDE_CONST).unwrap();
        assert_eq!(pool.available(), 50);
        assert_eq!(recs[0].ticket, 50);
        assert_eq!(recs[0].pass, 1234);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_insert_new_failure_changes_nothing() {
        let pool = TicketBox::new(100);
        let mut recs = records(2);
        let mut queue = StrideQueue::new();
        queue.insert_new(&mut recs, 0, 50, 0, &pool, STRIDE_CONST).unwrap();

        assert_eq!(
            queue.insert_new(&mut recs, 0, 101, 0, &pool, STRIDE_CONST),
            Err(SchedError::InsufficientTickets)
        );
        assert_eq!(recs[0].ticket, 50);
        assert_eq!(recs[0].stride, STRIDE_CONST / 50);

        assert_eq!(
            queue.insert_new(&mut recs, 1, 60, 0, &pool, STRIDE_CONST),
            Err(SchedError::InsufficientTickets)
        );
        assert_eq!(recs[1].ticket, 0);
        assert!(!queue.contains(1));
        assert_eq!(pool.available(), 50);
    }

    #[test]
    fn test_insert_new_rejects_zero() {
        let pool = TicketBox::new(100);
        let mut recs = records(1);
        let mut queue = StrideQueue::new();

        assert_eq!(
            queue.insert_new(&mut recs, 0, 0, 0, &pool, STRIDE_CONST),
            Err(SchedError::InvalidArgument)
        );
        assert!(queue.is_empty());
        assert_eq!(pool.available(), 100);
    }

    #[test]
    fn test_search_purges_dead_and_skips_blocked() {
        let pool = TicketBox::new(100);
        let mut recs = records(3);
        let mut queue = StrideQueue::new();
        for (slot, pass) in [(0, 1), (1, 5), (2, 10)] {
            queue.insert_new(&mut recs, slot, 20, pass, &pool, STRIDE_CONST).unwrap();
        }
        assert_eq!(pool.available(), 40);

        let procs = procs(&[
            ProcessState::Zombie,
            ProcessState::Sleeping,
            ProcessState::Runnable,
        ]);

        assert_eq!(queue.search(&mut recs, &procs, &pool), Some(2));

        // The zombie's tickets are back, its record forgot them.
        assert_eq!(pool.available(), 60);
        assert_eq!(recs[0].ticket, 0);
        assert!(!queue.contains(0));
        // The sleeper went back; the pick is the caller's to push.
        assert!(queue.contains(1));
        assert!(!queue.contains(2));
    }

    #[test]
    fn test_search_nothing_runnable() {
        let pool = TicketBox::new(100);
        let mut recs = records(2);
        let mut queue = StrideQueue::new();
        for slot in 0..2 {
            queue.insert_new(&mut recs, slot, 10, 0, &pool, STRIDE_CONST).unwrap();
        }
        let procs = procs(&[ProcessState::Sleeping, ProcessState::Embryo]);

        assert_eq!(queue.search(&mut recs, &procs, &pool), None);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_min_live_pass_skips_stale_top() {
        let pool = TicketBox::new(100);
        let mut recs = records(2);
        let mut queue = StrideQueue::new();
        queue.insert_new(&mut recs, 0, 10, 1, &pool, STRIDE_CONST).unwrap();
        queue.insert_new(&mut recs, 1, 10, 4, &pool, STRIDE_CONST).unwrap();
        let procs = procs(&[ProcessState::Zombie, ProcessState::Sleeping]);

        assert_eq!(queue.min_live_pass(&mut recs, &procs, &pool), Some(4));
        assert_eq!(queue.len(), 1);
        assert_eq!(pool.available(), 90);
    }
}
