use std::sync::atomic::{AtomicUsize, Ordering};

use ipasir_link::{registry::SolverData, solver::SolveResult};
use ipasir_tests::{add_formula, formulas, ipasir, satisfied_by};

mod end_to_end {
    use super::*;

    #[test]
    fn satisfiable() {
        let clauses = vec![vec![1, 2, 3], vec![1, 2, -3], vec![-1, 3], vec![-2, -3]];

        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &clauses).is_ok());

        assert_eq!(solver.solve(), Ok(SolveResult::Satisfiable));
        assert!(satisfied_by(&clauses, &mut solver));

        for atom in 1..=3 {
            assert!(solver.value_of(atom).expect("val").is_some());
        }
        solver.release();
    }

    #[test]
    fn unsatisfiable() {
        let clauses = vec![vec![1, 2], vec![-1], vec![-2], vec![3], vec![-3]];

        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &clauses).is_ok());

        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));
        assert_eq!(solver.last_result(), Some(SolveResult::Unsatisfiable));
    }

    #[test]
    fn interrupted_at_the_first_poll() {
        let clauses = formulas::planted_three_sat(60, 210, 73);

        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &clauses).is_ok());

        let polls = SolverData::new(AtomicUsize::new(0));
        let installed = solver.set_terminate(&polls, |polls: &AtomicUsize| {
            polls.fetch_add(1, Ordering::SeqCst);
            true
        });
        assert!(installed.is_ok());

        assert_eq!(solver.solve(), Ok(SolveResult::Interrupted));
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        // Without the callback the instance is solved.
        assert!(solver.clear_terminate().is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Satisfiable));
        assert!(satisfied_by(&clauses, &mut solver));
    }

    #[test]
    fn learnt_clauses_within_bound() {
        let (sender, receiver) = crossbeam::channel::unbounded::<Vec<i32>>();

        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &formulas::pigeonhole(5, 4)).is_ok());

        let installed = solver.set_learn(&SolverData::null(), 10, move |_, clause| {
            let _ = sender.send(clause.to_vec());
        });
        assert!(installed.is_ok());

        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));
        solver.release();

        // The sender went with the callback, on release.
        let learnt: Vec<Vec<i32>> = receiver.iter().collect();
        assert!(!learnt.is_empty());

        for clause in learnt {
            assert!(!clause.is_empty());
            assert!(clause.len() <= 10);
            assert!(clause.iter().all(|literal| *literal != 0));
            assert!(clause.iter().all(|literal| literal.abs() <= 20));
        }
    }
}

mod incremental {
    use super::*;

    #[test]
    fn assumptions_and_failed() {
        let mut solver = ipasir().init().expect("solver");
        assert!(add_formula(&mut solver, &[vec![-1, 2], vec![-2, 3]]).is_ok());

        assert!(solver.assume_all(&[1, -3]).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));
        assert_eq!(solver.failed(1), Ok(true));
        assert_eq!(solver.failed(-3), Ok(true));

        // Assumptions hold for one solve only.
        assert_eq!(solver.solve(), Ok(SolveResult::Satisfiable));

        assert!(solver.assume(1).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Satisfiable));
        assert_eq!(solver.model(3), Ok(vec![1, 2, 3]));
        assert_eq!(solver.value_of(-3), Ok(Some(false)));
    }

    #[test]
    fn clauses_accumulate() {
        let mut solver = ipasir().init().expect("solver");

        assert!(solver.add_clause(&[1, 2]).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Satisfiable));

        assert!(solver.add(-1).is_ok());
        assert!(solver.add(0).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Satisfiable));
        assert_eq!(solver.val(2), Ok(2));

        assert!(solver.add_clause(&[-2]).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));
    }

    #[test]
    fn empty_clause() {
        let mut solver = ipasir().init().expect("solver");
        assert!(solver.add_clause(&[]).is_ok());
        assert_eq!(solver.solve(), Ok(SolveResult::Unsatisfiable));
    }
}
