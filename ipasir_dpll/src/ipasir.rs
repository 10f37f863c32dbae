//! C bindings for the [Dpll] solver, following the IPASIR API.
//!
//! Each function takes the solver as the raw pointer returned by [ipasir_init].

use std::ffi::{c_char, c_int, c_void, CString};

use crate::{
    solver::{Dpll, LearnCallback, TerminateCallback},
    IPASIR_SIGNATURE,
};

/// # Safety
/// Writes the signature a raw pointer.
#[no_mangle]
pub unsafe extern "C" fn ipasir_signature() -> *const c_char {
    IPASIR_SIGNATURE
        .get_or_init(|| {
            CString::new(format!("ipasir_dpll {}", env!("CARGO_PKG_VERSION"))).unwrap_or_default()
        })
        .as_ptr()
}

/// Initialises a solver, returning its address.
///
/// # Safety
/// Releases the initialised solver to a raw pointer.
#[no_mangle]
pub unsafe extern "C" fn ipasir_init() -> *mut c_void {
    let solver = Box::new(Dpll::default());
    Box::into_raw(solver) as *mut c_void
}

/// Releases a solver.
///
/// # Safety
/// Recovers a solver from a raw pointer.
#[no_mangle]
pub unsafe extern "C" fn ipasir_release(solver: *mut c_void) {
    drop(Box::from_raw(solver as *mut Dpll));
}

/// Adds a literal to the clause being built, or ends the clause.
///
/// # Safety
/// Recovers a solver from a raw pointer.
#[no_mangle]
pub unsafe extern "C" fn ipasir_add(solver: *mut c_void, lit_or_zero: c_int) {
    let solver: &mut Dpll = &mut *(solver as *mut Dpll);
    solver.add(lit_or_zero);
}

/// Adds an assumption for the next solve.
///
/// # Safety
/// Recovers a solver from a raw pointer.
#[no_mangle]
pub unsafe extern "C" fn ipasir_assume(solver: *mut c_void, lit: c_int) {
    let solver: &mut Dpll = &mut *(solver as *mut Dpll);
    solver.assume(lit);
}

/// Solves, returning 10 if satisfiable, 20 if unsatisfiable, and 0 if interrupted.
///
/// # Safety
/// Recovers a solver from a raw pointer.
#[no_mangle]
pub unsafe extern "C" fn ipasir_solve(solver: *mut c_void) -> c_int {
    let solver: &mut Dpll = &mut *(solver as *mut Dpll);
    solver.solve() as c_int
}

/// # Safety
/// Recovers a solver from a raw pointer.
#[no_mangle]
pub unsafe extern "C" fn ipasir_val(solver: *mut c_void, lit: c_int) -> c_int {
    let solver: &Dpll = &*(solver as *mut Dpll);
    solver.val(lit)
}

/// # Safety
/// Recovers a solver from a raw pointer.
#[no_mangle]
pub unsafe extern "C" fn ipasir_failed(solver: *mut c_void, lit: c_int) -> c_int {
    let solver: &Dpll = &*(solver as *mut Dpll);
    match solver.failed(lit) {
        true => 1,
        false => 0,
    }
}

/// Sets a callback to be polled during a solve, with the solve stopped on any nonzero value.
///
/// # Safety
/// Recovers a solver from a raw pointer, and stores a pointer to data to be passed to the callback.
#[no_mangle]
pub unsafe extern "C" fn ipasir_set_terminate(
    solver: *mut c_void,
    data: *mut c_void,
    terminate: Option<TerminateCallback>,
) {
    let solver: &mut Dpll = &mut *(solver as *mut Dpll);
    solver.callbacks.terminate = terminate;
    solver.callbacks.terminate_data = data;
}

/// Sets a callback to be called with each clause learnt of length at most `max_length`.
///
/// # Safety
/// Recovers a solver from a raw pointer, and stores a pointer to data to be passed to the callback.
#[no_mangle]
pub unsafe extern "C" fn ipasir_set_learn(
    solver: *mut c_void,
    data: *mut c_void,
    max_length: c_int,
    learn: Option<LearnCallback>,
) {
    let solver: &mut Dpll = &mut *(solver as *mut Dpll);
    solver.callbacks.learn = learn;
    solver.callbacks.learn_data = data;
    solver.callbacks.learn_length = usize::try_from(max_length).unwrap_or(0);
}

/// The name and address of each IPASIR function, for programs which link the solver rather than load it.
pub fn exports() -> [(&'static str, *const c_void); 10] {
    [
        ("ipasir_signature", ipasir_signature as *const c_void),
        ("ipasir_init", ipasir_init as *const c_void),
        ("ipasir_release", ipasir_release as *const c_void),
        ("ipasir_add", ipasir_add as *const c_void),
        ("ipasir_assume", ipasir_assume as *const c_void),
        ("ipasir_solve", ipasir_solve as *const c_void),
        ("ipasir_val", ipasir_val as *const c_void),
        ("ipasir_failed", ipasir_failed as *const c_void),
        ("ipasir_set_terminate", ipasir_set_terminate as *const c_void),
        ("ipasir_set_learn", ipasir_set_learn as *const c_void),
    ]
}
