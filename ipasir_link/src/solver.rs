/*!
A handle on a native solver.

A [Solver] is made by [Ipasir::init](crate::ipasir::Ipasir::init), and owns the native solver it was made with.

# States

A handle moves through the states of [SolverState]:
- [Created](SolverState::Created), on return from the native `init`.
- [Active](SolverState::Active), from the first call made through the handle.
- [Released](SolverState::Released), once the native solver has been released.

Release happens either through [Solver::release], which consumes the handle, or when the handle is dropped.
So, there is no way to call through a released handle.

When a handle is released the native solver is released first, and the callbacks installed on the solver are retired after.
The native side may hold the callback pointers until it has been released, and so a callback is never retired while the native side could call it.

# Preconditions

The IPASIR contract has `val` meaningful only after a satisfiable solve, and `failed` only after an unsatisfiable solve, with no change to the solver in between.
These preconditions are not checked, though a call made outside of them is logged.

# Threads

A handle may be moved between threads, but not shared, matching the native contract of one call at a time per solver.
*/

use std::{
    cell::Cell,
    ffi::c_int,
    marker::PhantomData,
};

use crate::{
    address::NativeAddress,
    callbacks::{
        self, CallbackKind, CallbackScope, LearnCallback, LearnTrampoline, TerminateCallback,
        TerminateTrampoline,
    },
    ipasir::Ipasir,
    misc::log::targets::{self},
    registry::SolverData,
    symbols::{NativeFunction, ReleaseFn},
    types::err::{self, ErrorKind},
};

/// The state of a solver handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverState {
    /// The native solver has been made, and nothing has been called on it.
    Created,

    /// Calls have been made on the native solver.
    Active,

    /// The native solver has been released.
    Released,
}

/// The result of a solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveResult {
    /// The solve was stopped before a result was found, e.g. by a terminate callback.
    Interrupted,

    /// The formula is satisfiable under the assumptions.
    Satisfiable,

    /// The formula is unsatisfiable under the assumptions.
    Unsatisfiable,
}

impl SolveResult {
    /// The IPASIR result code.
    pub fn code(&self) -> c_int {
        match self {
            Self::Interrupted => 0,
            Self::Satisfiable => 10,
            Self::Unsatisfiable => 20,
        }
    }
}

impl TryFrom<c_int> for SolveResult {
    type Error = ErrorKind;

    fn try_from(code: c_int) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Interrupted),
            10 => Ok(Self::Satisfiable),
            20 => Ok(Self::Unsatisfiable),
            _ => Err(ErrorKind::UnknownResultCode(code)),
        }
    }
}

impl std::fmt::Display for SolveResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupted => write!(f, "Interrupted"),
            Self::Satisfiable => write!(f, "Satisfiable"),
            Self::Unsatisfiable => write!(f, "Unsatisfiable"),
        }
    }
}

/// A native solver, together with the callbacks installed on it.
pub struct Solver<'l> {
    ipasir: &'l Ipasir,

    /// The address returned by the native `init`.
    pointer: NativeAddress,

    state: SolverState,

    last_result: Option<SolveResult>,

    terminate: Option<CallbackScope>,

    learn: Option<CallbackScope>,

    /// Bound before the native solver is made, so the solver can always be released.
    release: NativeFunction<ReleaseFn>,

    _unsync: PhantomData<Cell<()>>,
}

impl<'l> Solver<'l> {
    pub(crate) fn new(
        ipasir: &'l Ipasir,
        pointer: NativeAddress,
        release: NativeFunction<ReleaseFn>,
    ) -> Self {
        log::debug!(target: targets::SOLVER, "Created solver {pointer}");
        Solver {
            ipasir,
            pointer,
            state: SolverState::Created,
            last_result: None,
            terminate: None,
            learn: None,
            release,
            _unsync: PhantomData,
        }
    }

    /// The address of the native solver.
    pub fn address(&self) -> NativeAddress {
        self.pointer
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    /// The result of the most recent solve, if there has been one.
    pub fn last_result(&self) -> Option<SolveResult> {
        self.last_result
    }

    /// The scope of the installed callback of the given kind, if any.
    pub fn callback(&self, kind: CallbackKind) -> Option<&CallbackScope> {
        match kind {
            CallbackKind::Terminate => self.terminate.as_ref(),
            CallbackKind::Learn => self.learn.as_ref(),
        }
    }

    fn activate(&mut self) {
        if self.state == SolverState::Created {
            log::trace!(target: targets::SOLVER, "Solver {} active", self.pointer);
            self.state = SolverState::Active;
        }
    }

    /// Adds a literal to the clause being built, or ends the clause on zero.
    pub fn add(&mut self, lit_or_zero: i32) -> Result<(), ErrorKind> {
        let add = self.ipasir.bind(&self.ipasir.symbols.add)?;
        self.activate();
        self.last_result = None;

        // Safety: The solver is live, as the handle is.
        unsafe { (add.entry)(self.pointer.as_ptr(), lit_or_zero) };
        Ok(())
    }

    /// Adds each literal of `clause`, followed by zero.
    ///
    /// An empty `clause` adds the empty clause.
    pub fn add_clause(&mut self, clause: &[i32]) -> Result<(), ErrorKind> {
        let add = self.ipasir.bind(&self.ipasir.symbols.add)?;
        self.activate();
        self.last_result = None;

        for literal in clause.iter().copied().chain(std::iter::once(0)) {
            // Safety: The solver is live, as the handle is.
            unsafe { (add.entry)(self.pointer.as_ptr(), literal) };
        }
        Ok(())
    }

    /// Assumes `lit` for the next solve only.
    pub fn assume(&mut self, lit: i32) -> Result<(), ErrorKind> {
        let assume = self.ipasir.bind(&self.ipasir.symbols.assume)?;
        self.activate();
        self.last_result = None;

        // Safety: The solver is live, as the handle is.
        unsafe { (assume.entry)(self.pointer.as_ptr(), lit) };
        Ok(())
    }

    pub fn assume_all(&mut self, literals: &[i32]) -> Result<(), ErrorKind> {
        let assume = self.ipasir.bind(&self.ipasir.symbols.assume)?;
        self.activate();
        self.last_result = None;

        for literal in literals {
            // Safety: The solver is live, as the handle is.
            unsafe { (assume.entry)(self.pointer.as_ptr(), *literal) };
        }
        Ok(())
    }

    /// Solves the formula under the current assumptions.
    ///
    /// The call blocks until the native solve returns, and any installed callbacks are called during the solve on the thread of the call.
    ///
    /// If a callback panicked during the solve an [InvocationError](err::InvocationError) holding the panic message is returned in place of the result.
    pub fn solve(&mut self) -> Result<SolveResult, ErrorKind> {
        let solve = self.ipasir.bind(&self.ipasir.symbols.solve)?;
        self.activate();
        self.last_result = None;

        // Clear any panic left over from a callback called outside of a solve.
        let _ = callbacks::take_panic();

        log::trace!(target: targets::SOLVER, "Solve on {}", self.pointer);
        // Safety: The solver is live, as the handle is.
        let code = unsafe { (solve.entry)(self.pointer.as_ptr()) };

        if let Some(message) = callbacks::take_panic() {
            return Err(ErrorKind::from(err::InvocationError {
                function: solve.name,
                cause: err::InvocationCause::CallbackPanic(message),
            }));
        }

        let result = match SolveResult::try_from(code) {
            Ok(result) => result,
            Err(e) => {
                log::error!(target: targets::SOLVER, "Solve on {} returned {code}", self.pointer);
                return Err(e);
            }
        };

        log::debug!(target: targets::SOLVER, "Solve on {}: {result}", self.pointer);
        self.last_result = Some(result);
        Ok(result)
    }

    /// The value of `lit` in the model found by the last solve.
    ///
    /// Returns `lit` if true, `-lit` if false, and zero if the value does not matter.
    pub fn val(&mut self, lit: i32) -> Result<i32, ErrorKind> {
        let val = self.ipasir.bind(&self.ipasir.symbols.val)?;
        if self.last_result != Some(SolveResult::Satisfiable) {
            log::debug!(target: targets::SOLVER, "val({lit}) after {:?}", self.last_result);
        }

        // Safety: The solver is live, as the handle is.
        Ok(unsafe { (val.entry)(self.pointer.as_ptr(), lit) })
    }

    /// The value of `lit` as a bool, with none if the value does not matter.
    pub fn value_of(&mut self, lit: i32) -> Result<Option<bool>, ErrorKind> {
        match self.val(lit)? {
            0 => Ok(None),
            value => Ok(Some(value.signum() == lit.signum())),
        }
    }

    /// The values of the variables `1..=variables`, as from [val](Solver::val).
    pub fn model(&mut self, variables: i32) -> Result<Vec<i32>, ErrorKind> {
        (1..=variables).map(|variable| self.val(variable)).collect()
    }

    /// Whether the assumption `lit` was used to show the last solve unsatisfiable.
    pub fn failed(&mut self, lit: i32) -> Result<bool, ErrorKind> {
        let failed = self.ipasir.bind(&self.ipasir.symbols.failed)?;
        if self.last_result != Some(SolveResult::Unsatisfiable) {
            log::debug!(target: targets::SOLVER, "failed({lit}) after {:?}", self.last_result);
        }

        // Safety: The solver is live, as the handle is.
        Ok(unsafe { (failed.entry)(self.pointer.as_ptr(), lit) } != 0)
    }

    // Terminate

    /// Installs `callback` as the terminate callback, with `data`.
    ///
    /// `callback` is called with the data registered at the address of `data`, and so the data should be kept (and not closed) for as long as the callback may be called.
    /// The native side is given the address of a thunk holding `callback`, rather than the address of `data`.
    ///
    /// Any previous terminate callback is retired once the native solver has been given the new callback.
    pub fn set_terminate<D, F>(&mut self, data: &SolverData<D>, callback: F) -> Result<(), ErrorKind>
    where
        D: Send + Sync + 'static,
        F: FnMut(&D) -> bool + Send + 'static,
    {
        let set_terminate = self.ipasir.bind(&self.ipasir.symbols.set_terminate)?;
        let (trampoline, thunk, scope) =
            CallbackScope::terminate_thunk(data.address(), callbacks::terminate_body(callback));

        // Safety: The trampoline and thunk are valid until the scope is dropped, which happens only after a replacement is installed or the solver is released.
        unsafe { self.install_terminate(set_terminate, thunk, Some(trampoline), scope) };
        data.register();
        Ok(())
    }

    /// Installs the terminate callback of `C`, with `data`.
    ///
    /// As [set_terminate](Solver::set_terminate), though the trampoline calls `C::terminate` directly.
    pub fn set_terminate_static<C: TerminateCallback>(
        &mut self,
        data: &SolverData<C::Data>,
    ) -> Result<(), ErrorKind> {
        let set_terminate = self.ipasir.bind(&self.ipasir.symbols.set_terminate)?;
        let (trampoline, scope) = CallbackScope::for_terminate::<C>();

        // Safety: Static trampolines are valid for the life of the program.
        unsafe { self.install_terminate(set_terminate, data.address(), Some(trampoline), scope) };
        data.register();
        Ok(())
    }

    /// Installs `callback` as the terminate callback, called with `data` as is.
    ///
    /// # Safety
    /// `callback` must be safe to call with `data` for as long as it is installed, and must not unwind.
    pub unsafe fn set_terminate_raw(
        &mut self,
        data: NativeAddress,
        callback: Option<TerminateTrampoline>,
    ) -> Result<(), ErrorKind> {
        let set_terminate = self.ipasir.bind(&self.ipasir.symbols.set_terminate)?;
        let scope = CallbackScope::raw(CallbackKind::Terminate);
        self.install_terminate(set_terminate, data, callback, scope);
        Ok(())
    }

    /// Removes the terminate callback.
    pub fn clear_terminate(&mut self) -> Result<(), ErrorKind> {
        let set_terminate = self.ipasir.bind(&self.ipasir.symbols.set_terminate)?;
        let scope = CallbackScope::cleared(CallbackKind::Terminate);
        // Safety: No callback is installed.
        unsafe { self.install_terminate(set_terminate, NativeAddress::NULL, None, scope) };
        Ok(())
    }

    /// # Safety
    /// `trampoline` must remain valid until `scope` is dropped.
    unsafe fn install_terminate(
        &mut self,
        set_terminate: NativeFunction<crate::symbols::SetTerminateFn>,
        data: NativeAddress,
        trampoline: Option<TerminateTrampoline>,
        scope: CallbackScope,
    ) {
        self.activate();
        (set_terminate.entry)(self.pointer.as_ptr(), data.as_ptr(), trampoline);
        log::trace!(target: targets::CALLBACKS, "Terminate on {} set with data {data}", self.pointer);

        // Retired only now the native side holds the replacement.
        let previous = self.terminate.replace(scope);
        drop(previous);
    }

    // Learn

    /// Installs `callback` as the learn callback, with `data`.
    ///
    /// `callback` is called with each clause learnt whose length is at most `max_length`.
    /// A `max_length` too large for a C `int` is taken to be `int` max.
    ///
    /// Any previous learn callback is retired once the native solver has been given the new callback.
    pub fn set_learn<D, F>(
        &mut self,
        data: &SolverData<D>,
        max_length: usize,
        callback: F,
    ) -> Result<(), ErrorKind>
    where
        D: Send + Sync + 'static,
        F: FnMut(&D, &[i32]) + Send + 'static,
    {
        let set_learn = self.ipasir.bind(&self.ipasir.symbols.set_learn)?;
        let (trampoline, thunk, scope) =
            CallbackScope::learn_thunk(data.address(), callbacks::learn_body(callback));

        // Safety: The trampoline and thunk are valid until the scope is dropped, which happens only after a replacement is installed or the solver is released.
        unsafe { self.install_learn(set_learn, thunk, max_length, Some(trampoline), scope) };
        data.register();
        Ok(())
    }

    /// Installs the learn callback of `C`, with `data`.
    pub fn set_learn_static<C: LearnCallback>(
        &mut self,
        data: &SolverData<C::Data>,
        max_length: usize,
    ) -> Result<(), ErrorKind> {
        let set_learn = self.ipasir.bind(&self.ipasir.symbols.set_learn)?;
        let (trampoline, scope) = CallbackScope::for_learn::<C>();

        // Safety: Static trampolines are valid for the life of the program.
        unsafe {
            self.install_learn(set_learn, data.address(), max_length, Some(trampoline), scope)
        };
        data.register();
        Ok(())
    }

    /// Installs `callback` as the learn callback, called with `data` as is.
    ///
    /// # Safety
    /// `callback` must be safe to call with `data` for as long as it is installed, and must not unwind.
    pub unsafe fn set_learn_raw(
        &mut self,
        data: NativeAddress,
        max_length: usize,
        callback: Option<LearnTrampoline>,
    ) -> Result<(), ErrorKind> {
        let set_learn = self.ipasir.bind(&self.ipasir.symbols.set_learn)?;
        let scope = CallbackScope::raw(CallbackKind::Learn);
        self.install_learn(set_learn, data, max_length, callback, scope);
        Ok(())
    }

    /// Removes the learn callback.
    pub fn clear_learn(&mut self) -> Result<(), ErrorKind> {
        let set_learn = self.ipasir.bind(&self.ipasir.symbols.set_learn)?;
        let scope = CallbackScope::cleared(CallbackKind::Learn);
        // Safety: No callback is installed.
        unsafe { self.install_learn(set_learn, NativeAddress::NULL, 0, None, scope) };
        Ok(())
    }

    /// # Safety
    /// `trampoline` must remain valid until `scope` is dropped.
    unsafe fn install_learn(
        &mut self,
        set_learn: NativeFunction<crate::symbols::SetLearnFn>,
        data: NativeAddress,
        max_length: usize,
        trampoline: Option<LearnTrampoline>,
        scope: CallbackScope,
    ) {
        self.activate();
        let max_length = c_int::try_from(max_length).unwrap_or(c_int::MAX);
        (set_learn.entry)(self.pointer.as_ptr(), data.as_ptr(), max_length, trampoline);
        log::trace!(target: targets::CALLBACKS, "Learn on {} set with data {data}, up to length {max_length}", self.pointer);

        let previous = self.learn.replace(scope);
        drop(previous);
    }

    // Release

    /// Releases the native solver, and retires its callbacks.
    pub fn release(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.state == SolverState::Released {
            return;
        }

        // Safety: The solver is live, and released only here.
        unsafe { (self.release.entry)(self.pointer.as_ptr()) };
        self.state = SolverState::Released;

        // The native solver is gone, so nothing may call the callbacks.
        drop(self.terminate.take());
        drop(self.learn.take());

        log::debug!(target: targets::SOLVER, "Released solver {}", self.pointer);
    }
}

impl Drop for Solver<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Solver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("pointer", &self.pointer)
            .field("state", &self.state)
            .field("last_result", &self.last_result)
            .field("terminate", &self.terminate)
            .field("learn", &self.learn)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;
    use std::{
        ffi::c_void,
        sync::atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn result_codes() {
        assert_eq!(SolveResult::try_from(0), Ok(SolveResult::Interrupted));
        assert_eq!(SolveResult::try_from(10), Ok(SolveResult::Satisfiable));
        assert_eq!(SolveResult::try_from(20), Ok(SolveResult::Unsatisfiable));

        for code in [-1, 1, 11, 30, c_int::MAX] {
            assert_eq!(
                SolveResult::try_from(code),
                Err(ErrorKind::UnknownResultCode(code))
            );
        }

        for result in [
            SolveResult::Interrupted,
            SolveResult::Satisfiable,
            SolveResult::Unsatisfiable,
        ] {
            assert_eq!(SolveResult::try_from(result.code()), Ok(result));
        }
    }

    // A native side which makes solvers and reports an unknown code on every solve.

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn init() -> *mut c_void {
        Box::into_raw(Box::new(0_u64)) as *mut c_void
    }

    unsafe extern "C" fn release(solver: *mut c_void) {
        drop(Box::from_raw(solver as *mut u64));
        RELEASED.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn solve(_solver: *mut c_void) -> c_int {
        7
    }

    fn odd_library() -> Ipasir {
        let table: SymbolTable = [
            ("ipasir_init", NativeAddress::from(init as *const ())),
            ("ipasir_release", NativeAddress::from(release as *const ())),
            ("ipasir_solve", NativeAddress::from(solve as *const ())),
        ]
        .into_iter()
        .collect();
        Ipasir::new(table)
    }

    #[test]
    fn unknown_codes_and_release() {
        let ipasir = odd_library();
        let before = RELEASED.load(Ordering::SeqCst);

        let mut solver = ipasir.init().expect("solver");
        assert_eq!(solver.state(), SolverState::Created);

        assert_eq!(solver.solve(), Err(ErrorKind::UnknownResultCode(7)));
        assert_eq!(solver.state(), SolverState::Active);
        assert_eq!(solver.last_result(), None);

        match solver.add(1) {
            Err(ErrorKind::SymbolNotFound(e)) => assert_eq!(e.symbol, "ipasir_add"),
            otherwise => panic!("unexpected {otherwise:?}"),
        }

        solver.release();
        assert_eq!(RELEASED.load(Ordering::SeqCst), before + 1);

        {
            let _dropped = ipasir.init().expect("solver");
        }
        assert_eq!(RELEASED.load(Ordering::SeqCst), before + 2);
    }

    // A native side which calls the callback it holds whenever it is about to give the callback up.
    // So, a replacement calls the previous callback, and a release calls the current callback.

    #[derive(Default)]
    struct Holder {
        terminate: Option<(TerminateTrampoline, *mut c_void)>,
        learn: Option<(LearnTrampoline, *mut c_void)>,
    }

    impl Holder {
        fn call_held(&self) {
            if let Some((terminate, data)) = self.terminate {
                terminate(data);
            }
            if let Some((learn, data)) = self.learn {
                learn(data, [1, -2, 0].as_ptr());
            }
        }
    }

    unsafe extern "C" fn holder_init() -> *mut c_void {
        Box::into_raw(Box::<Holder>::default()) as *mut c_void
    }

    unsafe extern "C" fn holder_release(solver: *mut c_void) {
        let holder = Box::from_raw(solver as *mut Holder);
        holder.call_held();
    }

    unsafe extern "C" fn holder_set_terminate(
        solver: *mut c_void,
        data: *mut c_void,
        terminate: Option<TerminateTrampoline>,
    ) {
        let holder = &mut *(solver as *mut Holder);
        if let Some((previous, previous_data)) = holder.terminate {
            previous(previous_data);
        }
        holder.terminate = terminate.map(|terminate| (terminate, data));
    }

    unsafe extern "C" fn holder_set_learn(
        solver: *mut c_void,
        data: *mut c_void,
        _max_length: c_int,
        learn: Option<LearnTrampoline>,
    ) {
        let holder = &mut *(solver as *mut Holder);
        if let Some((previous, previous_data)) = holder.learn {
            previous(previous_data, [3, 0].as_ptr());
        }
        holder.learn = learn.map(|learn| (learn, data));
    }

    fn holding_library() -> Ipasir {
        let table: SymbolTable = [
            ("ipasir_init", NativeAddress::from(holder_init as *const ())),
            ("ipasir_release", NativeAddress::from(holder_release as *const ())),
            ("ipasir_set_terminate", NativeAddress::from(holder_set_terminate as *const ())),
            ("ipasir_set_learn", NativeAddress::from(holder_set_learn as *const ())),
        ]
        .into_iter()
        .collect();
        Ipasir::new(table)
    }

    #[test]
    fn callbacks_outlive_their_native_use() {
        let ipasir = holding_library();
        let mut solver = ipasir.init().expect("solver");

        let first = SolverData::new(AtomicUsize::new(0));
        let second = SolverData::new(AtomicUsize::new(0));
        let count = |calls: &AtomicUsize| {
            calls.fetch_add(1, Ordering::SeqCst);
            false
        };

        assert!(solver.set_terminate(&first, count).is_ok());
        assert!(solver.set_terminate(&second, count).is_ok());
        assert!(solver.callback(CallbackKind::Terminate).is_some_and(|scope| scope.is_thunk()));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        let learnt = SolverData::new(std::sync::Mutex::new(Vec::<Vec<i32>>::new()));
        let record = |clauses: &std::sync::Mutex<Vec<Vec<i32>>>, clause: &[i32]| {
            if let Ok(mut clauses) = clauses.lock() {
                clauses.push(clause.to_vec());
            }
        };
        assert!(solver.set_learn(&learnt, 10, record).is_ok());
        assert!(solver.set_learn(&learnt, 10, record).is_ok());
        assert_eq!(*learnt.lock().expect("lock"), vec![vec![3]]);

        solver.release();
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(*learnt.lock().expect("lock"), vec![vec![3], vec![1, -2]]);
    }
}
