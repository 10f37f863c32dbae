use std::sync::OnceLock;

use ipasir_link::{
    address::NativeAddress, ipasir::Ipasir, solver::Solver, symbols::SymbolTable, types::err,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// The symbols of the linked DPLL solver.
pub fn dpll_symbols() -> SymbolTable {
    ipasir_dpll::exports()
        .into_iter()
        .map(|(symbol, address)| (symbol, NativeAddress::from(address)))
        .collect()
}

static DPLL: OnceLock<Ipasir> = OnceLock::new();

/// A binding to the linked DPLL solver, shared by all tests of a binary.
pub fn ipasir() -> &'static Ipasir {
    DPLL.get_or_init(|| {
        #[cfg(feature = "log")]
        let _ = env_logger::try_init();

        Ipasir::new(dpll_symbols())
    })
}

pub fn add_formula(solver: &mut Solver, clauses: &[Vec<i32>]) -> Result<(), err::ErrorKind> {
    for clause in clauses {
        solver.add_clause(clause)?;
    }
    Ok(())
}

/// Whether every clause has some literal `l` with `val(l) == l`.
pub fn satisfied_by(clauses: &[Vec<i32>], solver: &mut Solver) -> bool {
    clauses.iter().all(|clause| {
        clause
            .iter()
            .any(|literal| matches!(solver.val(*literal), Ok(value) if value == *literal))
    })
}

pub mod formulas {
    use super::*;

    /// `pigeons` pigeons in `holes` holes, with at most one pigeon in each hole.
    ///
    /// Unsatisfiable whenever there are more pigeons than holes.
    pub fn pigeonhole(pigeons: i32, holes: i32) -> Vec<Vec<i32>> {
        let atom = |pigeon: i32, hole: i32| pigeon * holes + hole + 1;

        let mut clauses = Vec::new();
        for pigeon in 0..pigeons {
            clauses.push((0..holes).map(|hole| atom(pigeon, hole)).collect());
        }

        for hole in 0..holes {
            for a in 0..pigeons {
                for b in (a + 1)..pigeons {
                    clauses.push(vec![-atom(a, hole), -atom(b, hole)]);
                }
            }
        }
        clauses
    }

    /// A random 3-SAT formula satisfied by a hidden valuation of `atoms` atoms.
    pub fn planted_three_sat(atoms: i32, clause_count: usize, seed: u64) -> Vec<Vec<i32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let hidden: Vec<bool> = (0..=atoms).map(|_| rng.random_bool(0.5)).collect();

        let mut clauses = Vec::with_capacity(clause_count);
        while clauses.len() < clause_count {
            let clause: Vec<i32> = (0..3)
                .map(|_| {
                    let atom = rng.random_range(1..=atoms);
                    match rng.random_bool(0.5) {
                        true => atom,
                        false => -atom,
                    }
                })
                .collect();

            let satisfied = clause
                .iter()
                .any(|literal| hidden[literal.unsigned_abs() as usize] == literal.is_positive());
            if satisfied {
                clauses.push(clause);
            }
        }
        clauses
    }
}
