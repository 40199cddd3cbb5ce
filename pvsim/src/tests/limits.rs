#[cfg(test)]
mod limits_test {
    use crate::{
        RunStatus,
        configuration::SimConfig,
        designs::CounterBench,
        structures::ModuleId,
        tests::{Inverter, ScriptedBench, simulate},
        Simulation,
    };

    /// Two inverters feeding each other through the root. Never settles.
    fn ring(config: SimConfig) -> Simulation<ScriptedBench> {
        simulate(config, |cx, root| {
            let a = Inverter::build(cx, root, "a")?;
            let b = Inverter::build(cx, root, "b")?;
            Ok(ScriptedBench::new().on_eval(move |cx| {
                let ay = cx.get(a.y);
                let by = cx.get(b.y);
                cx.set(b.a, ay);
                cx.set(a.a, by);
            }))
        })
    }

    #[test]
    fn combinational_loop_trips_iteration_limit() {
        let mut sim = ring(
            SimConfig::builder()
                .cycle_limit(10)
                .iteration_limit(5)
                .build(),
        );
        let status = sim.run().unwrap();
        assert_eq!(
            status,
            RunStatus::IterationLimitExceeded {
                cycle: 1,
                iterations: 5
            }
        );
        assert_eq!(status.exit_code(), -3);
        assert!(status.is_abnormal());
        // the cycle still finishes
        assert_eq!(sim.bench().post_clocks, 1);
        assert_eq!(sim.stats().max_iterations, 5);
    }

    #[test]
    fn reset_drops_work_left_by_the_iteration_limit() {
        let mut sim = ring(
            SimConfig::builder()
                .cycle_limit(10)
                .iteration_limit(5)
                .continue_clock_sequence(true)
                .build(),
        );
        assert!(matches!(
            sim.run().unwrap(),
            RunStatus::IterationLimitExceeded { cycle: 1, .. }
        ));
        assert!(sim.context().pending_modules().count() > 0);

        sim.reset_to_instance_state();
        assert_eq!(sim.context().pending_modules().count(), 0);

        // nothing triggers the ring again
        let evals = sim.stats().evals;
        let status = sim.run().unwrap();
        assert_eq!(status, RunStatus::CycleLimitReached { cycle: 11 });
        assert_eq!(sim.stats().evals, evals);
        assert_eq!(sim.stats().max_iterations, 5);
        assert_eq!(sim.stats().iterations, 0);
    }

    #[test]
    fn limits_win_over_user_requests() {
        let mut sim = simulate(
            SimConfig::builder()
                .cycle_limit(10)
                .iteration_limit(5)
                .build(),
            |cx, root| {
                let a = Inverter::build(cx, root, "a")?;
                let b = Inverter::build(cx, root, "b")?;
                Ok(ScriptedBench::new()
                    .on_eval(move |cx| {
                        let ay = cx.get(a.y);
                        let by = cx.get(b.y);
                        cx.set(b.a, ay);
                        cx.set(a.a, by);
                    })
                    .on_post_clock(|_, cx| cx.end_simulation(0, "bye")))
            },
        );
        assert!(matches!(
            sim.run().unwrap(),
            RunStatus::IterationLimitExceeded { .. }
        ));
    }

    #[test]
    fn idle_designs_stop() {
        let mut sim = simulate(SimConfig::builder().idle_limit(3).build(), |_, _| {
            Ok(ScriptedBench::new())
        });
        let status = sim.run().unwrap();
        assert_eq!(
            status,
            RunStatus::IdleLimitExceeded {
                cycle: 4,
                idle_since: 2
            }
        );
        assert_eq!(status.exit_code(), -2);
        assert_eq!(sim.bench().evals, 1);
        assert_eq!(sim.bench().post_clocks, 4);
    }

    #[test]
    fn pending_work_resets_the_idle_count() {
        let mut sim = simulate(SimConfig::builder().idle_limit(2).build(), |_, _| {
            Ok(ScriptedBench::new().on_post_clock(|cycle, cx| {
                if cycle % 2 == 0 && cycle < 6 {
                    let root = cx.root();
                    cx.force_eval_next_clock(root);
                }
            }))
        });
        // evaluated in cycles 1, 3 and 5, idle in 6 and 7
        assert_eq!(
            sim.run().unwrap(),
            RunStatus::IdleLimitExceeded {
                cycle: 7,
                idle_since: 6
            }
        );
        assert_eq!(sim.bench().evals, 3);
    }

    #[test]
    fn cycle_limit_counts_per_run() {
        let mut sim = simulate(SimConfig::builder().cycle_limit(3).build(), |cx, root| {
            Ok(CounterBench::build(cx, root, 0)?)
        });
        let status = sim.run().unwrap();
        assert_eq!(status, RunStatus::CycleLimitReached { cycle: 3 });
        assert_eq!(status.exit_code(), -1);
        assert!(!status.is_abnormal());

        // a fresh run restarts the clock but keeps the design's state
        let status = sim.run().unwrap();
        assert_eq!(status, RunStatus::CycleLimitReached { cycle: 3 });
        assert_eq!(
            sim.bench().history,
            (1..=6_u8).map(Some).collect::<Vec<_>>()
        );
        assert_eq!(sim.stats().cycles, 3);
        assert_eq!(sim.stats().cumulative_cycles, 6);
    }

    #[test]
    fn continued_runs_keep_the_clock() {
        let config = SimConfig::builder()
            .cycle_limit(3)
            .continue_clock_sequence(true)
            .build();
        let mut sim = simulate(config, |cx, root| {
            Ok(CounterBench::build(cx, root, 0)?)
        });
        sim.run().unwrap();
        let evals = sim.stats().evals;

        let status = sim.run().unwrap();
        assert_eq!(status, RunStatus::CycleLimitReached { cycle: 6 });
        assert_eq!(sim.clock(), 6);
        assert_eq!(sim.bench().last_value(), Some(6));
        // no kick-start: the counter and the root watching its output run
        // once per cycle
        assert_eq!(sim.stats().evals, evals + 6);
    }

    #[test]
    fn user_requests() {
        let mut sim = simulate(SimConfig::builder().cycle_limit(10).build(), |_, _| {
            Ok(ScriptedBench::new().on_post_clock(|cycle, cx| {
                if cycle == 3 {
                    cx.end_simulation(7, "done");
                    cx.finish();
                }
            }))
        });
        let status = sim.run().unwrap();
        assert_eq!(
            status,
            RunStatus::UserRequested {
                code: 7,
                message: "done".into()
            }
        );
        assert_eq!(status.exit_code(), 7);
        assert!(status.is_abnormal());
        assert_eq!(sim.clock(), 3);
    }

    #[test]
    fn finish_stops_at_the_end_of_the_cycle() {
        let mut sim = simulate(SimConfig::builder().cycle_limit(2).build(), |_, _| {
            Ok(ScriptedBench::new().on_pre_clock(|cycle, cx| {
                if cycle == 2 {
                    cx.finish();
                }
            }))
        });
        // a request in the last cycle wins over the cycle limit
        let status = sim.run().unwrap();
        assert_eq!(status, RunStatus::Normal);
        assert_eq!(status.exit_code(), 0);
        assert_eq!(sim.bench().post_clocks, 2);
    }

    #[test]
    fn unlimited_runs_need_a_stop() {
        let mut sim = simulate(SimConfig::default(), |cx, root| {
            let module: ModuleId = cx.module(root, "idle")?;
            Ok(ScriptedBench::new().on_post_clock(move |cycle, cx| {
                assert!(cx.is_live(module));
                if cycle == 100 {
                    cx.finish();
                }
            }))
        });
        assert_eq!(sim.run().unwrap(), RunStatus::Normal);
        assert_eq!(sim.clock(), 100);
    }
}
