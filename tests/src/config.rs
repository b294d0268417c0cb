//! Scheduler configuration tests

#[cfg(test)]
mod tests {
    use hybrid_sched::config::{MLFQ_LEVELS, STRIDE_CONST};
    use hybrid_sched::logger::LogLevel;
    use hybrid_sched::{Kernel, SchedConfig, SchedError};
    use serial_test::serial;

    use crate::mock::log::{capture, release};
    use crate::mock::MockPlatform;

    #[test]
    fn test_defaults() {
        let config = SchedConfig::default();
        assert_eq!(config.ticket_pool, 100);
        assert_eq!(config.mlfq_tickets, 20);
        assert_eq!(config.quantum, [5, 10, 20]);
        assert_eq!(config.allotment, [Some(20), Some(40), None]);
        assert_eq!(config.boost_period, 200);
        assert_eq!(config.stride_const, STRIDE_CONST);
        assert_eq!(config.mlfq_stride(), STRIDE_CONST / 20);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_from_cmdline() {
        let config = SchedConfig::from_cmdline(
            "root=/dev/sda1 sched.tickets=200 sched.mlfq_tickets=40 sched.quantum=2,4,8 \
             sched.allot=10,30 sched.boost=500 sched.stride_quantum=3 loglevel=debug",
        );

        assert_eq!(config.ticket_pool, 200);
        assert_eq!(config.mlfq_tickets, 40);
        assert_eq!(config.quantum, [2, 4, 8]);
        assert_eq!(config.allotment, [Some(10), Some(30), None]);
        assert_eq!(config.boost_period, 500);
        assert_eq!(config.stride_quantum, 3);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_empty_cmdline_is_default() {
        assert_eq!(SchedConfig::from_cmdline(""), SchedConfig::default());
        assert_eq!(
            SchedConfig::from_cmdline("console=ttyS0 quiet"),
            SchedConfig::default()
        );
    }

    #[test]
    #[serial]
    fn test_malformed_values_keep_defaults() {
        let sink = capture(LogLevel::WARN);

        let config = SchedConfig::from_cmdline(
            "sched.tickets=lots sched.quantum=1,2 sched.allot=1,2,3 sched.boost=-1",
        );
        assert_eq!(config, SchedConfig::default());

        assert!(sink.contains("ignoring malformed 'sched.tickets=lots'"));
        assert!(sink.contains("expected 3 values in 'sched.quantum=1,2'"));
        assert!(sink.contains("too many values in 'sched.allot=1,2,3'"));
        assert!(sink.contains("ignoring malformed 'sched.boost=-1'"));
        release();
    }

    #[test]
    fn test_validate_rejects() {
        let base = SchedConfig::default();
        let bad = [
            SchedConfig {
                mlfq_tickets: 0,
                ..base
            },
            SchedConfig {
                mlfq_tickets: 101,
                ..base
            },
            SchedConfig {
                quantum: [5, 0, 20],
                ..base
            },
            SchedConfig {
                stride_quantum: 0,
                ..base
            },
            SchedConfig {
                allotment: [Some(20), Some(40), Some(80)],
                ..base
            },
            SchedConfig {
                stride_const: 50,
                ..base
            },
        ];

        for config in bad {
            assert_eq!(config.validate(), Err(SchedError::InvalidArgument), "{:?}", config);
            assert_eq!(
                Kernel::new(MockPlatform::new(), config).err(),
                Some(SchedError::InvalidArgument)
            );
        }
    }

    #[test]
    fn test_whole_pool_for_mlfq() {
        let config = SchedConfig {
            mlfq_tickets: 100,
            ..SchedConfig::default()
        };
        let k = Kernel::new(MockPlatform::new(), config).unwrap();
        assert_eq!(k.tickets().available(), 0);
        assert_eq!(k.lock().mlfq.quantum(MLFQ_LEVELS - 1), 20);
    }
}
