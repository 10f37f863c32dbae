//! A small incremental SAT solver, exported through the IPASIR C interface.
//!
//! The solver is a plain DPLL search with unit propagation and decision clause learning (see [solver]).
//! It is slow, and kept simple, as it exists to exercise IPASIR bindings: each of the nine IPASIR functions (and `signature`) is exported with the standard name and signature, including the terminate and learn callbacks.
//!
//! # Linking
//!
//! The crate builds both as a Rust library and as a C dynamic library.
//! - As a dynamic library, the solver may be loaded like any other IPASIR implementation.
//! - As a Rust library, [exports] gives the address of each function, for programs which bind to the solver without loading a library.

use std::{ffi::CString, sync::OnceLock};

pub mod ipasir;
pub mod solver;

pub use ipasir::exports;

/// The signature of the solver, written (once) when needed using [env!].
pub static IPASIR_SIGNATURE: OnceLock<CString> = OnceLock::new();
