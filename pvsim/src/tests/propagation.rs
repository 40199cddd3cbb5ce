#[cfg(test)]
mod propagation_test {
    use std::{cell::RefCell, rc::Rc};

    use crate::{
        RunStatus, Simulation,
        configuration::SimConfig,
        errors::{ConstructionError, SimError},
        logging,
        structures::{EvalContext, Module, Register, SimContext, Signal},
        tests::{Buffer, ScriptedBench, behaviour, simulate},
    };

    fn limited(cycles: i64) -> SimConfig {
        SimConfig::builder().cycle_limit(cycles).build()
    }

    #[test]
    fn quiet_modules_are_not_reevaluated() {
        let mut buffer = None;
        let mut sim = simulate(limited(5), |cx, root| {
            let b = Buffer::build(cx, root, "buf")?;
            let a = b.a;
            buffer = Some(b);
            Ok(ScriptedBench::new().on_pre_clock(move |cycle, cx| {
                if cycle == 1 {
                    cx.set(a, true);
                }
            }))
        });
        let buffer = buffer.unwrap();

        let status = sim.run().unwrap();
        assert_eq!(status, RunStatus::CycleLimitReached { cycle: 5 });
        assert_eq!(buffer.evals.get(), 1);
        assert!(sim.context().get(buffer.y));
        // only the kick-start and the output change reached the root
        assert_eq!(sim.bench().evals, 2);
        assert_eq!(sim.stats().iterations, 0);
        assert_eq!(sim.stats().max_iterations, 2);
        assert_eq!(sim.context().pending_modules().count(), 0);
    }

    #[test]
    fn force_eval_next_clock_is_deferred() {
        let mut buffer = None;
        let mut sim = simulate(limited(4), |cx, root| {
            let b = Buffer::build(cx, root, "buf")?;
            let module = b.module;
            buffer = Some(b);
            Ok(ScriptedBench::new().on_post_clock(move |cycle, cx| {
                if cycle == 2 {
                    cx.force_eval_next_clock(module);
                    assert!(!cx.is_pending(module));
                }
            }))
        });
        let buffer = buffer.unwrap();
        sim.run().unwrap();
        // kick-start in cycle 1 and the forced evaluation in cycle 3
        assert_eq!(buffer.evals.get(), 2);
    }

    #[test]
    fn evaluation_follows_construction_order() {
        let order = Rc::new(RefCell::new(vec![]));

        let run_once = |order: Rc<RefCell<Vec<String>>>| {
            let mut sim = simulate(limited(1), |cx, root| {
                for name in ["c", "a", "b"] {
                    let m = cx.module(root, name)?;
                    let order = order.clone();
                    let name = name.to_string();
                    cx.install(
                        m,
                        behaviour(move |_| order.borrow_mut().push(name.clone())),
                    )?;
                }
                let order = order.clone();
                Ok(ScriptedBench::new().on_eval(move |_| {
                    order.borrow_mut().push("tb".into())
                }))
            });
            sim.run().unwrap();
        };

        run_once(order.clone());
        let first = order.borrow().clone();
        assert_eq!(first, vec!["tb", "c", "a", "b"]);

        order.borrow_mut().clear();
        run_once(order.clone());
        assert_eq!(*order.borrow(), first);
    }

    #[test]
    fn outputs_trigger_the_enclosing_module() {
        // grandparent (root) -> parent -> child. The output belongs to
        // `parent` and is driven from inside `child`.
        struct Child {
            drive: Signal<u8>,
            count: Rc<RefCell<Vec<&'static str>>>,
        }
        impl Module for Child {
            fn eval(&mut self, cx: &mut EvalContext<'_>) {
                self.count.borrow_mut().push("child");
                let next = cx.cycle() as u8;
                cx.set(self.drive, next);
            }
        }

        let log = Rc::new(RefCell::new(vec![]));
        let mut driven = None;
        let mut sim = simulate(limited(3), |cx, root| {
            let parent = cx.module(root, "parent")?;
            let child = cx.module(parent, "child")?;
            let out = cx.output(parent, "out", Some(0_u8))?;
            cx.install(
                child,
                Child {
                    drive: out,
                    count: log.clone(),
                },
            )?;
            let parent_log = log.clone();
            cx.install(
                parent,
                behaviour(move |_| parent_log.borrow_mut().push("parent")),
            )?;
            // the child re-evaluates every cycle
            let tick = cx.register(child, "tick", Some(0_u64))?;
            driven = Some(out);
            let root_log = log.clone();
            Ok(ScriptedBench::new()
                .on_pre_clock(move |cycle, cx| {
                    cx.assign_next(tick, cycle);
                    root_log.borrow_mut().push("pre");
                })
                .on_eval({
                    let log = log.clone();
                    move |_| log.borrow_mut().push("grandparent")
                }))
        });

        sim.run().unwrap();
        let out = driven.unwrap();
        assert_eq!(sim.context().dependents(out), vec![sim.context().root()]);
        assert_eq!(sim.context().get(out), 3);
        assert_eq!(
            *log.borrow(),
            vec![
                // cycle 1: kick-start of every module, then the output change
                "pre", "grandparent", "parent", "child", "grandparent",
                // cycle 2: the register commit re-runs the child only
                "pre", "child", "grandparent",
                "pre", "child", "grandparent",
            ]
        );
    }

    #[test]
    fn output_on_parentless_module_fails_fast() {
        let result = Simulation::with_logger(
            "tb",
            SimConfig::default(),
            logging::discard(),
            |cx, root| {
                cx.output::<bool, _>(root, "y", None)?;
                Ok(ScriptedBench::new())
            },
        );
        match result {
            Err(SimError::Construction(
                ConstructionError::OutputWithoutParent { name, module },
            )) => {
                assert_eq!(name, "y");
                assert_eq!(module, "tb");
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("construction should have failed"),
        }
        // the failed elaboration released the context
        assert!(SimContext::quiet("again").is_ok());
    }

    #[test]
    fn reevaluation_replays_from_committed_state() {
        struct Accumulator {
            acc: Register<u32>,
            last_cycle: u64,
            evals: Rc<RefCell<u32>>,
        }
        impl Module for Accumulator {
            fn eval(&mut self, cx: &mut EvalContext<'_>) {
                *self.evals.borrow_mut() += 1;
                let first = self.last_cycle != cx.cycle();
                self.last_cycle = cx.cycle();
                // reads the pending stage, so a replay without rollback
                // would add twice
                let next = cx.next_value(self.acc) + 1;
                cx.assign_next(self.acc, next);
                if first {
                    let this = cx.this();
                    cx.force_eval(this);
                }
            }
        }

        let evals = Rc::new(RefCell::new(0));
        let mut acc = None;
        let mut sim = simulate(limited(5), |cx, root| {
            let m = cx.module(root, "acc")?;
            let reg = cx.register(m, "acc", Some(0))?;
            acc = Some(reg);
            cx.install(
                m,
                Accumulator {
                    acc: reg,
                    last_cycle: 0,
                    evals: evals.clone(),
                },
            )?;
            Ok(ScriptedBench::new())
        });
        let acc = acc.unwrap();
        sim.run().unwrap();

        assert_eq!(*evals.borrow(), 10);
        assert_eq!(sim.context().q(acc), 4);
        assert_eq!(sim.context().next_value(acc), 5);
        assert_eq!(sim.stats().iterations, 2);
    }
}
