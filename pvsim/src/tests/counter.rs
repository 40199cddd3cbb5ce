#[cfg(test)]
mod counter_test {
    use crate::{
        RunStatus,
        configuration::SimConfig,
        designs::{Counter, CounterBench},
        tests::{ScriptedBench, simulate},
        trace::{ChangeRecord, TraceValue},
    };

    fn counter_sim(cycles: i64, reset_cycles: u64) -> crate::Simulation<CounterBench> {
        simulate(SimConfig::builder().cycle_limit(cycles).build(), |cx, root| {
            Ok(CounterBench::build(cx, root, reset_cycles)?)
        })
    }

    #[test]
    fn counts_and_wraps() {
        let mut sim = counter_sim(20, 1);
        assert_eq!(sim.run().unwrap(), RunStatus::CycleLimitReached { cycle: 20 });

        let history = &sim.bench().history;
        assert_eq!(history.len(), 20);
        for (i, value) in history.iter().enumerate() {
            assert_eq!(*value, Some((i % 16) as u8), "cycle {}", i + 1);
        }
        assert_eq!(history[16], Some(0));
        assert_eq!(history[17], Some(1));
    }

    #[test]
    fn reset_holds_the_count_at_zero() {
        let mut sim = counter_sim(5, 3);
        sim.run().unwrap();
        assert_eq!(
            sim.bench().history,
            vec![Some(0), Some(0), Some(0), Some(1), Some(2)]
        );
        let counter = sim.bench().counter;
        assert_eq!(counter.count(sim.context()), Some(1));
    }

    #[test]
    fn display_widths() {
        let sim = counter_sim(1, 1);
        let counter = sim.bench().counter;
        let cx = sim.context();
        assert_eq!(cx.width(counter.value), Counter::WIDTH);
        assert_eq!(cx.width(counter.reset_n), 1);
        assert_eq!(cx.signal_path(counter.value), "tb.counter.value");
    }

    #[test]
    fn undriven_counter_is_unknown() {
        let mut counter = None;
        let mut sim = simulate(SimConfig::builder().cycle_limit(3).build(), |cx, root| {
            counter = Some(Counter::build(cx, root, "counter")?);
            Ok(ScriptedBench::new())
        });
        let counter = counter.unwrap();
        sim.run().unwrap();
        assert!(sim.context().is_unknown(counter.value));
        assert_eq!(counter.count(sim.context()), None);
    }

    #[test]
    fn enable_low_holds_the_count() {
        let mut counter = None;
        let mut sim = simulate(SimConfig::builder().cycle_limit(6).build(), |cx, root| {
            let c = Counter::build(cx, root, "counter")?;
            counter = Some(c);
            Ok(ScriptedBench::new().on_pre_clock(move |cycle, cx| {
                cx.set(c.reset_n, cycle > 1);
                cx.set(c.enable, cycle < 4);
            }))
        });
        let counter = counter.unwrap();
        sim.run().unwrap();
        assert_eq!(sim.context().get(counter.value), 2);
        assert_eq!(counter.count(sim.context()), Some(2));
    }

    #[test]
    fn reset_to_instance_state_round_trip() {
        let mut sim = counter_sim(10, 0);
        sim.run().unwrap();
        assert_eq!(
            sim.bench().history,
            (1..=10_u8).map(Some).collect::<Vec<_>>()
        );

        sim.reset_to_instance_state();
        let counter = sim.bench().counter;
        let cx = sim.context();
        assert_eq!(counter.count(cx), Some(0));
        assert!(cx.is_unknown(counter.value));
        assert!(cx.is_unknown(counter.reset_n));
        assert_eq!(cx.pending_modules().count(), 0);

        // the next run replays the first one
        sim.bench_mut().history.clear();
        sim.run().unwrap();
        assert_eq!(
            sim.bench().history,
            (1..=10_u8).map(Some).collect::<Vec<_>>()
        );
    }

    #[test]
    fn traced_register_changes_per_clock() {
        let mut sim = counter_sim(5, 1);
        sim.context_mut().trace_all_registers();
        sim.run().unwrap();

        let record = |start: &str, end: &str| ChangeRecord {
            path: "tb.counter.counter".into(),
            width: 4,
            start: TraceValue::Known(start.into()),
            end: TraceValue::Known(end.into()),
        };
        // held in reset for cycle 1, so the first edge that moves the count
        // is the one of cycle 3
        assert_eq!(
            sim.traced_changes(),
            &[
                (3_u64, record("0000", "0001")),
                (4, record("0001", "0010")),
                (5, record("0010", "0011")),
            ]
        );
        assert_eq!(
            sim.traced_changes()[0].1.to_string(),
            "R tb.counter.counter 0000 -> 0001"
        );
    }
}
