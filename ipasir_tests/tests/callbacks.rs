use std::{
    ffi::{c_int, c_void},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use ipasir_link::{
    callbacks::{CallbackKind, LearnCallback, TerminateCallback},
    registry::{self, NullData, SolverData},
    solver::SolveResult,
    types::err::{ErrorKind, InvocationCause, InvocationError},
};
use ipasir_tests::{add_formula, formulas, ipasir};

mod superseding {
    use super::*;

    #[test]
    fn only_the_latest_terminate_is_called() {
        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &formulas::pigeonhole(4, 3)).is_ok());

        let first = SolverData::new(AtomicUsize::new(0));
        let second = SolverData::new(AtomicUsize::new(0));
        let count = |polls: &AtomicUsize| {
            polls.fetch_add(1, Ordering::SeqCst);
            false
        };

        assert!(solver.set_terminate(&first, count).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));
        let first_polls = first.load(Ordering::SeqCst);
        assert!(first_polls > 0);

        assert!(solver.set_terminate(&second, count).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));

        assert_eq!(first.load(Ordering::SeqCst), first_polls);
        assert!(second.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn only_the_latest_learn_is_called() {
        let mut solver = ipasir().init().expect("solver");

        let first = SolverData::new(Mutex::new(Vec::<Vec<i32>>::new()));
        let second = SolverData::new(Mutex::new(Vec::<Vec<i32>>::new()));
        let record = |clauses: &Mutex<Vec<Vec<i32>>>, clause: &[i32]| {
            if let Ok(mut clauses) = clauses.lock() {
                clauses.push(clause.to_vec());
            }
        };

        assert!(solver.set_learn(&first, 100, record).is_ok());
        assert!(solver.set_learn(&second, 100, record).is_ok());

        assert!(add_formula(&mut solver, &formulas::pigeonhole(4, 3)).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));

        assert!(first.lock().expect("lock").is_empty());
        assert!(!second.lock().expect("lock").is_empty());
    }

    #[test]
    fn retired_closures_are_dropped() {
        let mut solver = ipasir().init().expect("solver");
        let token = std::sync::Arc::new(());

        let held = token.clone();
        assert!(solver
            .set_terminate(&SolverData::null(), move |_| {
                let _token = &held;
                false
            })
            .is_ok());
        assert_eq!(std::sync::Arc::strong_count(&token), 2);

        assert!(solver.clear_terminate().is_ok());
        assert_eq!(std::sync::Arc::strong_count(&token), 1);
        assert!(solver.callback(CallbackKind::Terminate).is_some_and(|scope| !scope.is_thunk()));
    }

    #[test]
    fn closures_on_many_live_solvers() {
        let polls = SolverData::new(AtomicUsize::new(0));
        let learnt = SolverData::new(AtomicUsize::new(0));

        let mut solvers = Vec::new();
        for index in 0..64 {
            let mut solver = ipasir().init().expect("solver");
            assert!(add_formula(&mut solver, &formulas::pigeonhole(3, 2)).is_ok());

            let installed = solver.set_terminate(&polls, |polls: &AtomicUsize| {
                polls.fetch_add(1, Ordering::SeqCst);
                false
            });
            assert!(installed.is_ok(), "solver {index}: {installed:?}");

            let installed = solver.set_learn(&learnt, 100, |learnt: &AtomicUsize, _| {
                learnt.fetch_add(1, Ordering::SeqCst);
            });
            assert!(installed.is_ok(), "solver {index}: {installed:?}");

            solvers.push(solver);
        }

        for solver in &mut solvers {
            assert!(solver.callback(CallbackKind::Terminate).is_some_and(|scope| scope.is_thunk()));
            assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));
        }

        assert!(polls.load(Ordering::SeqCst) >= 64);
        assert!(learnt.load(Ordering::SeqCst) >= 64);
    }
}

// Callbacks fixed at compile time.

struct CountPolls;

impl TerminateCallback for CountPolls {
    type Data = AtomicUsize;

    fn terminate(polls: &AtomicUsize) -> bool {
        polls.fetch_add(1, Ordering::SeqCst) >= 2
    }
}

struct LongestClause;

impl LearnCallback for LongestClause {
    type Data = AtomicUsize;

    fn learn(longest: &AtomicUsize, clause: &[i32]) {
        longest.fetch_max(clause.len(), Ordering::SeqCst);
    }
}

struct NoData;

impl TerminateCallback for NoData {
    type Data = NullData;

    fn terminate(_: &NullData) -> bool {
        true
    }
}

mod static_callbacks {
    use super::*;

    #[test]
    fn terminate_after_polls() {
        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &formulas::pigeonhole(5, 4)).is_ok());

        let polls = SolverData::new(AtomicUsize::new(0));
        assert!(solver.set_terminate_static::<CountPolls>(&polls).is_ok());

        assert_eq!(solver.solve(), Ok(SolveResult::Interrupted));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert!(solver
            .callback(CallbackKind::Terminate)
            .is_some_and(|scope| !scope.is_thunk()));
    }

    #[test]
    fn learn_within_bound() {
        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &formulas::pigeonhole(5, 4)).is_ok());

        let longest = SolverData::new(AtomicUsize::new(0));
        assert!(solver.set_learn_static::<LongestClause>(&longest, 6).is_ok());

        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));
        let longest = longest.load(Ordering::SeqCst);
        assert!(0 < longest && longest <= 6);
    }

    #[test]
    fn null_data() {
        let mut solver = ipasir().init().expect("solver");
        assert!(solver.add_clause(&[1, 2]).is_ok());

        assert!(solver.set_terminate_static::<NoData>(&SolverData::null()).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Interrupted));
    }
}

// Callbacks given as raw functions.

extern "C" fn raw_stop(data: *mut c_void) -> c_int {
    let polls = unsafe { &*(data as *const AtomicUsize) };
    polls.fetch_add(1, Ordering::SeqCst);
    1
}

mod raw_callbacks {
    use super::*;
    use ipasir_link::address::NativeAddress;

    #[test]
    fn terminate() {
        let mut solver = ipasir().init().expect("solver");
        assert!(solver.add_clause(&[1, 2]).is_ok());

        let polls = AtomicUsize::new(0);
        let data = NativeAddress::from(&polls as *const AtomicUsize);
        assert!(unsafe { solver.set_terminate_raw(data, Some(raw_stop)) }.is_ok());
        assert!(!registry::contains(data));

        assert_eq!(solver.solve(), Ok(SolveResult::Interrupted));
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        // Released before the data is dropped.
        solver.release();
    }
}

mod panics {
    use super::*;

    #[test]
    fn terminate_panic_is_reported() {
        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &formulas::pigeonhole(4, 3)).is_ok());

        assert!(solver
            .set_terminate(&SolverData::null(), |_| panic!("no more polls"))
            .is_ok());

        match solver.solve() {
            Err(ErrorKind::Invocation(InvocationError {
                function,
                cause: InvocationCause::CallbackPanic(message),
            })) => {
                assert_eq!(function, "solve");
                assert_eq!(message, "no more polls");
            }
            otherwise => panic!("unexpected {otherwise:?}"),
        }
        assert_eq!(solver.last_result(), None);

        // The handle remains usable.
        assert!(solver.clear_terminate().is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));
    }

    #[test]
    fn learn_panic_is_reported() {
        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &formulas::pigeonhole(4, 3)).is_ok());

        let installed = solver.set_learn(&SolverData::null(), 100, |_, clause| {
            panic!("learnt {} literals", clause.len())
        });
        assert!(installed.is_ok());

        assert!(matches!(
            solver.solve(),
            Err(ErrorKind::Invocation(InvocationError {
                cause: InvocationCause::CallbackPanic(_),
                ..
            }))
        ));
    }
}

mod data {
    use super::*;

    #[test]
    fn registered_on_install_removed_on_close() {
        let mut solver = ipasir().init().expect("solver");

        let data = SolverData::new(AtomicUsize::new(0));
        let address = data.address();
        assert!(!registry::contains(address));

        assert!(solver.set_terminate(&data, |_: &AtomicUsize| false).is_ok());
        assert!(registry::contains(address));

        solver.release();
        assert!(registry::contains(address));

        data.close();
        assert!(!registry::contains(address));
    }

    #[test]
    fn closed_data_skips_the_callback() {
        let mut solver = ipasir().init().expect("solver");
        assert!(solver.add_clause(&[1]).is_ok());

        let data = SolverData::new(AtomicUsize::new(0));
        let polls = data.share();
        assert!(solver
            .set_terminate(&data, |polls: &AtomicUsize| {
                polls.fetch_add(1, Ordering::SeqCst);
                true
            })
            .is_ok());

        data.close();
        assert_eq!(solver.solve(), Ok(SolveResult::Satisfiable));
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn shared_between_solvers() {
        let data = SolverData::new(AtomicUsize::new(0));
        let count = |polls: &AtomicUsize| {
            polls.fetch_add(1, Ordering::SeqCst);
            false
        };

        let mut a = ipasir().init().expect("solver");
        let mut b = ipasir().init().expect("solver");
        assert!(a.add_clause(&[1]).is_ok());
        assert!(b.add_clause(&[-1]).is_ok());

        assert!(a.set_terminate(&data, count).is_ok());
        assert!(b.set_terminate(&data, count).is_ok());

        assert_eq!(a.solve(), Ok(SolveResult::Satisfiable));
        assert_eq!(b.solve(), Ok(SolveResult::Satisfiable));
        assert!(data.load(Ordering::SeqCst) >= 2);
    }
}
