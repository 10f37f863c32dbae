//! A DPLL solver, with the state the IPASIR interface needs.
//!
//! # Search
//!
//! A solve assigns each assumption on a level of its own, and then makes decisions (false first) on the lowest unassigned atom, with unit propagation after each assignment.
//! Propagation is a naive scan of every clause until no clause is unit.
//!
//! On a conflict at level `l` the negation of every decision made is learnt as a clause, and the search backjumps to level `l - 1`.
//! There the learnt clause is unit, and so the last decision is flipped by propagation.
//! Learnt clauses follow from the formula, and are kept across solves.
//!
//! # Assumptions
//!
//! Assumptions hold for the next solve only.
//! An assumption found false, or a conflict with only assumptions made, ends the solve as unsatisfiable, and the assumptions involved are recorded as failed.

use std::{
    collections::HashSet,
    ffi::{c_int, c_void},
};

/// The native signature of a terminate callback.
pub type TerminateCallback = extern "C" fn(data: *mut c_void) -> c_int;

/// The native signature of a learn callback.
pub type LearnCallback = extern "C" fn(data: *mut c_void, clause: *const i32);

/// The result of a solve, with IPASIR codes as discriminants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Report {
    Unknown = 0,
    Satisfiable = 10,
    Unsatisfiable = 20,
}

/// Callbacks given through the IPASIR interface.
pub struct Callbacks {
    pub terminate: Option<TerminateCallback>,

    pub terminate_data: *mut c_void,

    pub learn: Option<LearnCallback>,

    pub learn_data: *mut c_void,

    /// Clauses longer than this are not passed to the learn callback.
    pub learn_length: usize,
}

impl Default for Callbacks {
    fn default() -> Self {
        Callbacks {
            terminate: None,
            terminate_data: std::ptr::null_mut(),
            learn: None,
            learn_data: std::ptr::null_mut(),
            learn_length: 0,
        }
    }
}

impl Callbacks {
    fn terminate(&self) -> bool {
        match self.terminate {
            Some(terminate) => terminate(self.terminate_data) != 0,
            None => false,
        }
    }

    fn learn(&self, clause: &[i32]) {
        if let Some(learn) = self.learn {
            if clause.len() <= self.learn_length {
                // The callback takes a zero-terminated clause.
                let mut terminated = Vec::with_capacity(clause.len() + 1);
                terminated.extend_from_slice(clause);
                terminated.push(0);
                learn(self.learn_data, terminated.as_ptr());
            }
        }
    }
}

/// A conflict, as the index of the falsified clause.
struct Conflict(usize);

#[derive(Default)]
pub struct Dpll {
    clauses: Vec<Vec<i32>>,

    /// The clause being added, literal by literal.
    clause_buffer: Vec<i32>,

    /// Set if the empty clause has been added.
    contradiction: bool,

    assumptions: Vec<i32>,

    failed: HashSet<i32>,

    /// The value of each atom, indexed by atom, with index zero unused.
    valuation: Vec<Option<bool>>,

    trail: Vec<i32>,

    /// The literal each level was opened with.
    decisions: Vec<i32>,

    /// For each level, the length of the trail when the level was opened.
    level_starts: Vec<usize>,

    report: Option<Report>,

    pub callbacks: Callbacks,
}

impl Dpll {
    fn grow_to(&mut self, literal: i32) {
        let atom = literal.unsigned_abs() as usize;
        if self.valuation.len() <= atom {
            self.valuation.resize(atom + 1, None);
        }
    }

    /// Any change to the formula or assumptions discards the result of the last solve.
    fn refresh(&mut self) {
        if self.report.take().is_some() {
            self.reset();
            self.failed.clear();
        }
    }

    /// Adds a literal to the clause being built, or ends the clause on zero.
    pub fn add(&mut self, lit_or_zero: i32) {
        self.refresh();
        match lit_or_zero {
            0 => {
                let mut clause = std::mem::take(&mut self.clause_buffer);
                clause.sort_unstable();
                clause.dedup();

                if clause.is_empty() {
                    self.contradiction = true;
                }
                self.clauses.push(clause);
            }
            literal => {
                self.grow_to(literal);
                self.clause_buffer.push(literal);
            }
        }
    }

    pub fn assume(&mut self, literal: i32) {
        self.refresh();
        self.grow_to(literal);
        self.assumptions.push(literal);
    }

    /// The value of `literal` in the last model: `literal` if true, `-literal` if false, and zero for an atom never seen.
    pub fn val(&self, literal: i32) -> i32 {
        match self.value_of(literal) {
            Some(true) => literal,
            Some(false) => -literal,
            None => 0,
        }
    }

    /// Whether `literal` was an assumption used to show the last solve unsatisfiable.
    pub fn failed(&self, literal: i32) -> bool {
        self.failed.contains(&literal)
    }

    fn value_of(&self, literal: i32) -> Option<bool> {
        let atom = literal.unsigned_abs() as usize;
        let value = (*self.valuation.get(atom)?)?;
        Some(value == literal.is_positive())
    }

    fn assign(&mut self, literal: i32) {
        let atom = literal.unsigned_abs() as usize;
        self.valuation[atom] = Some(literal.is_positive());
        self.trail.push(literal);
    }

    fn open_level(&mut self, decision: i32) {
        self.level_starts.push(self.trail.len());
        self.decisions.push(decision);
    }

    fn level(&self) -> usize {
        self.decisions.len()
    }

    /// Removes every assignment made above `level`.
    fn backjump(&mut self, level: usize) {
        if level < self.level() {
            let start = self.level_starts[level];
            self.clear_trail(start);
            self.level_starts.truncate(level);
            self.decisions.truncate(level);
        }
    }

    /// Removes every assignment.
    fn reset(&mut self) {
        self.backjump(0);
        self.clear_trail(0);
    }

    fn clear_trail(&mut self, from: usize) {
        for literal in self.trail.drain(from..) {
            self.valuation[literal.unsigned_abs() as usize] = None;
        }
    }

    fn propagate(&mut self) -> Result<(), Conflict> {
        loop {
            let mut assigned = false;

            for index in 0..self.clauses.len() {
                let mut satisfied = false;
                let mut open = None;
                let mut open_count = 0;

                for literal in &self.clauses[index] {
                    match self.value_of(*literal) {
                        Some(true) => {
                            satisfied = true;
                            break;
                        }
                        Some(false) => {}
                        None => {
                            open_count += 1;
                            open = Some(*literal);
                        }
                    }
                }

                if satisfied {
                    continue;
                }

                match (open_count, open) {
                    (0, _) => return Err(Conflict(index)),
                    (1, Some(literal)) => {
                        self.assign(literal);
                        assigned = true;
                    }
                    _ => {}
                }
            }

            if !assigned {
                return Ok(());
            }
        }
    }

    fn unassigned_atom(&self) -> Option<i32> {
        self.valuation
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, value)| value.is_none())
            .map(|(atom, _)| atom as i32)
    }

    fn conclude(&mut self, report: Report) -> Report {
        log::debug!("Solve: {report:?}");
        self.assumptions.clear();
        match report {
            Report::Unknown => {
                self.reset();
                self.report = None;
            }
            _ => self.report = Some(report),
        }
        report
    }

    /// Marks the first `count` assumptions as failed.
    fn fail_assumptions(&mut self, count: usize) {
        self.failed.extend(self.assumptions.iter().take(count).copied());
    }

    pub fn solve(&mut self) -> Report {
        self.reset();
        self.failed.clear();
        self.report = None;

        if self.callbacks.terminate() {
            return self.conclude(Report::Unknown);
        }

        if self.contradiction || self.propagate().is_err() {
            return self.conclude(Report::Unsatisfiable);
        }

        loop {
            let level = self.level();

            if level < self.assumptions.len() {
                let assumption = self.assumptions[level];
                match self.value_of(assumption) {
                    Some(true) => {
                        // Already holds, so the level is empty.
                        self.open_level(assumption);
                        continue;
                    }
                    Some(false) => {
                        self.fail_assumptions(level + 1);
                        return self.conclude(Report::Unsatisfiable);
                    }
                    None => {
                        self.open_level(assumption);
                        self.assign(assumption);
                    }
                }
            } else {
                if self.callbacks.terminate() {
                    return self.conclude(Report::Unknown);
                }

                let Some(atom) = self.unassigned_atom() else {
                    return self.conclude(Report::Satisfiable);
                };

                log::trace!("Decision: {}", -atom);
                self.open_level(-atom);
                self.assign(-atom);
            }

            while let Err(Conflict(index)) = self.propagate() {
                let level = self.level();
                log::trace!("Conflict on clause {index} at level {level}");

                if level == 0 {
                    return self.conclude(Report::Unsatisfiable);
                }

                if level <= self.assumptions.len() {
                    self.fail_assumptions(level);
                    return self.conclude(Report::Unsatisfiable);
                }

                let learnt: Vec<i32> = self.decisions.iter().map(|decision| -decision).collect();
                self.callbacks.learn(&learnt);
                self.clauses.push(learnt);

                self.backjump(level - 1);
            }
        }
    }
}
