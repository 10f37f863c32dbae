//! Bindings to incremental SAT solvers through the IPASIR C interface.
//!
//! IPASIR is a small C interface for incremental SAT solvers, made of nine functions (and `signature`), with callbacks for stopping a solve and for observing learnt clauses.
//! Any solver which exports the interface, whether a system library, a library loaded at runtime, or code linked into the program, can be driven through this library.
//!
//! Information about IPASIR may be found at <https://github.com/biotomas/ipasir>.
//!
//! # Orientation
//!
//! - An [Ipasir](ipasir::Ipasir) binds to one implementation, resolving its symbols through a [SymbolSource](symbols::SymbolSource) as they are needed.
//! - [Ipasir::init](ipasir::Ipasir::init) makes a [Solver](solver::Solver), which owns one native solver and releases it when done.
//! - Callbacks are bridged to the native side by the [callbacks] module, which recovers the data of a callback from its native address through the [registry].
//!
//! # Examples
//!
//! Binding to a library loaded at runtime, and stopping a solve after a time limit.
//!
//! ```rust,no_run
//! # use ipasir_link::{ipasir::Ipasir, registry::SolverData, solver::SolveResult};
//! # use std::time::{Duration, Instant};
//! let library = unsafe { libloading::Library::new("libcadical.so") }.expect("a library");
//! let ipasir = Ipasir::new(library);
//!
//! let mut solver = ipasir.init()?;
//! solver.add_clause(&[1, -2])?;
//! solver.add_clause(&[2, 3])?;
//!
//! let deadline = SolverData::new(Instant::now() + Duration::from_secs(5));
//! solver.set_terminate(&deadline, |deadline: &Instant| Instant::now() > *deadline)?;
//!
//! match solver.solve()? {
//!     SolveResult::Satisfiable => println!("s SATISFIABLE"),
//!     SolveResult::Unsatisfiable => println!("s UNSATISFIABLE"),
//!     SolveResult::Interrupted => println!("s UNKNOWN"),
//! }
//! # Ok::<(), ipasir_link::types::err::ErrorKind>(())
//! ```
//!
//! Observing learnt clauses, with a callback fixed at compile time.
//!
//! ```rust,no_run
//! # use ipasir_link::{callbacks::LearnCallback, ipasir::Ipasir, registry::SolverData};
//! # use std::sync::atomic::{AtomicUsize, Ordering};
//! struct CountUnits;
//!
//! impl LearnCallback for CountUnits {
//!     type Data = AtomicUsize;
//!
//!     fn learn(units: &AtomicUsize, _clause: &[i32]) {
//!         units.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let ipasir = Ipasir::process();
//! let mut solver = ipasir.init()?;
//!
//! let units = SolverData::new(AtomicUsize::new(0));
//! solver.set_learn_static::<CountUnits>(&units, 1)?;
//! solver.solve()?;
//! println!("c {} units learnt", units.load(Ordering::Relaxed));
//! # Ok::<(), ipasir_link::types::err::ErrorKind>(())
//! ```
//!
//! # Logging
//!
//! Calls are logged through the [log](https://docs.rs/log/latest/log/) facade, with targets listed in [misc::log::targets].
//! No logger is installed by the library.
//!
//! For example, when used with [env_logger](https://docs.rs/env_logger/latest/env_logger/):
//!
//! ```sh
//! RUST_LOG=callbacks=trace,solver=debug cargo test
//! ```

pub mod address;
pub mod callbacks;
pub mod clause;
pub mod config;
pub mod ipasir;
pub mod misc;
pub mod registry;
pub mod solver;
pub mod symbols;
pub mod types;
