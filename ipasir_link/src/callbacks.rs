/*!
Native entry points for callbacks.

IPASIR has two callbacks:
- Terminate, `int (*)(void* data)`, asked during a solve whether to stop. Any nonzero value is a request to stop.
- Learn, `void (*)(void* data, int32_t* clause)`, told of each clause learnt during a solve which is no longer than a declared maximum. The clause is zero-terminated.

In each case the native side calls a function pointer with a data address it was given when the callback was installed.
A *trampoline* is an `extern "C"` function which stands at that pointer: it recovers the data from the address through the [registry](crate::registry), decodes the clause (for learn), and calls the body of the callback.

# Styles

Callbacks may be given in two styles:

- As a type implementing [TerminateCallback] or [LearnCallback].
  Each such type has its own trampoline, instantiated at compile time, and so no dispatch takes place between the native call and the body.
  This is the style to use for a learn callback, which may be called for every clause learnt.

- As a closure.
  A closure has no address a native library could call, and so each installed closure is boxed in a *thunk* together with its data address.
  The native side is given the address of the thunk as its data, and one trampoline for each kind recovers the thunk and calls the closure.
  The thunk is owned by the [CallbackScope] of the installation, and freed when the scope is dropped.

Further, a raw `extern "C"` function may be installed directly, in which case the binding has no part in the call.

# Panics

Unwinding into a native library is undefined behaviour, and so trampolines catch any panic from the body of a callback.
The panic is recorded for the thread of the call, and surfaced as an [InvocationError](crate::types::err::InvocationError) when the native call in progress returns.
A terminate callback which panics asks the solver to stop, and a learn callback which panics is passed over.
*/

use std::{
    any::Any,
    cell::RefCell,
    ffi::{c_int, c_void},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Mutex, PoisonError},
};

use crate::{
    address::NativeAddress,
    clause,
    misc::log::targets,
    registry,
};

/// The native signature of a terminate callback.
pub type TerminateTrampoline = extern "C" fn(data: *mut c_void) -> c_int;

/// The native signature of a learn callback.
pub type LearnTrampoline = extern "C" fn(data: *mut c_void, clause: *const c_int);

/// The kinds of callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Terminate,
    Learn,
}

impl std::fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminate => write!(f, "terminate"),
            Self::Learn => write!(f, "learn"),
        }
    }
}

/// A terminate callback known at compile time.
///
/// ```rust
/// # use ipasir_link::{callbacks::TerminateCallback, registry::NullData};
/// struct Never;
///
/// impl TerminateCallback for Never {
///     type Data = NullData;
///
///     fn terminate(_data: &NullData) -> bool {
///         false
///     }
/// }
/// ```
pub trait TerminateCallback: 'static {
    /// The type of data the callback is installed with.
    type Data: Send + Sync + 'static;

    /// Whether the solve in progress should stop.
    fn terminate(data: &Self::Data) -> bool;
}

/// A learn callback known at compile time.
pub trait LearnCallback: 'static {
    /// The type of data the callback is installed with.
    type Data: Send + Sync + 'static;

    /// Called with each clause learnt, up to the maximum length given on installation.
    fn learn(data: &Self::Data, clause: &[i32]);
}

/// The body of a terminate closure, given the data address passed from the native side.
pub(crate) type TerminateBody = Box<dyn FnMut(NativeAddress) -> bool + Send>;

/// The body of a learn closure, given the data address passed from the native side and the decoded clause.
pub(crate) type LearnBody = Box<dyn FnMut(NativeAddress, &[i32]) + Send>;

/// Wraps a closure on typed data as a body on addresses.
pub(crate) fn terminate_body<D, F>(mut body: F) -> TerminateBody
where
    D: Send + Sync + 'static,
    F: FnMut(&D) -> bool + Send + 'static,
{
    Box::new(move |address: NativeAddress| match registry::resolve::<D>(address) {
        Some(data) => body(&*data),
        None => {
            missing_data(CallbackKind::Terminate, address);
            false
        }
    })
}

/// Wraps a closure on typed data as a body on addresses.
pub(crate) fn learn_body<D, F>(mut body: F) -> LearnBody
where
    D: Send + Sync + 'static,
    F: FnMut(&D, &[i32]) + Send + 'static,
{
    Box::new(move |address: NativeAddress, clause: &[i32]| {
        match registry::resolve::<D>(address) {
            Some(data) => body(&*data, clause),
            None => missing_data(CallbackKind::Learn, address),
        }
    })
}

// Reached on each poll of a terminate callback once its data is closed.
fn missing_data(kind: CallbackKind, address: NativeAddress) {
    log::debug!(target: targets::CALLBACKS, "No {kind} data at {address}, the callback is skipped");
}

// Panics

thread_local! {
    static PENDING_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Calls `body`, stopping any panic.
fn guarded<R>(kind: CallbackKind, body: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => Some(value),
        Err(payload) => {
            record_panic(kind, payload);
            None
        }
    }
}

fn record_panic(kind: CallbackKind, payload: Box<dyn Any + Send>) {
    let message = match payload.downcast_ref::<&str>() {
        Some(message) => message.to_string(),
        None => match payload.downcast_ref::<String>() {
            Some(message) => message.clone(),
            None => "unknown panic".to_string(),
        },
    };

    log::error!(target: targets::CALLBACKS, "A {kind} callback panicked: {message}");

    // Only the first panic during a call is kept.
    PENDING_PANIC.with(|pending| {
        pending.borrow_mut().get_or_insert(message);
    });
}

/// Takes the panic recorded on this thread since the last call, if any.
pub(crate) fn take_panic() -> Option<String> {
    PENDING_PANIC.with(|pending| pending.borrow_mut().take())
}

fn terminate_code(request: Option<bool>) -> c_int {
    match request {
        Some(true) | None => 1,
        Some(false) => 0,
    }
}

// Trampolines for types.

extern "C" fn static_terminate<C: TerminateCallback>(data: *mut c_void) -> c_int {
    let address = NativeAddress::from(data);
    let Some(data) = registry::resolve::<C::Data>(address) else {
        missing_data(CallbackKind::Terminate, address);
        return 0;
    };

    terminate_code(guarded(CallbackKind::Terminate, || C::terminate(&data)))
}

extern "C" fn static_learn<C: LearnCallback>(data: *mut c_void, clause: *const c_int) {
    let address = NativeAddress::from(data);
    let Some(data) = registry::resolve::<C::Data>(address) else {
        missing_data(CallbackKind::Learn, address);
        return;
    };

    // Safety: The solver passes a zero-terminated clause, valid for the duration of the call.
    let clause = unsafe { clause::decode(clause) };
    guarded(CallbackKind::Learn, || C::learn(&data, clause));
}

// Thunks for closures.

/// A closure on the heap, together with the data address it is called with.
///
/// The address of the thunk is handed to the native side in place of the data address, and the trampoline of the kind recovers the thunk from it.
struct Thunk<B> {
    data: NativeAddress,
    body: Mutex<B>,
}

impl<B> Thunk<B> {
    fn boxed(data: NativeAddress, body: B) -> Box<Self> {
        Box::new(Thunk {
            data,
            body: Mutex::new(body),
        })
    }

    fn address(&self) -> NativeAddress {
        NativeAddress::from(self as *const Self)
    }
}

extern "C" fn thunk_terminate(thunk: *mut c_void) -> c_int {
    if thunk.is_null() {
        log::debug!(target: targets::CALLBACKS, "Terminate thunk called without a thunk");
        return 0;
    }

    // Safety: The native side was given the address of a thunk owned by a live scope.
    let thunk = unsafe { &*(thunk as *const Thunk<TerminateBody>) };
    let mut guard = thunk.body.lock().unwrap_or_else(PoisonError::into_inner);
    let body = &mut *guard;
    terminate_code(guarded(CallbackKind::Terminate, || body(thunk.data)))
}

extern "C" fn thunk_learn(thunk: *mut c_void, clause: *const c_int) {
    if thunk.is_null() {
        log::debug!(target: targets::CALLBACKS, "Learn thunk called without a thunk");
        return;
    }

    // Safety: The native side was given the address of a thunk owned by a live scope.
    let thunk = unsafe { &*(thunk as *const Thunk<LearnBody>) };
    // Safety: The solver passes a zero-terminated clause, valid for the duration of the call.
    let clause = unsafe { clause::decode(clause) };
    let mut guard = thunk.body.lock().unwrap_or_else(PoisonError::into_inner);
    let body = &mut *guard;
    guarded(CallbackKind::Learn, || body(thunk.data, clause));
}

// Scopes.

enum Origin {
    /// A trampoline instantiated for a callback type.
    Static,

    /// A function given by the caller.
    Raw,

    /// A terminate closure, owned by the scope.
    TerminateThunk(Box<Thunk<TerminateBody>>),

    /// A learn closure, owned by the scope.
    LearnThunk(Box<Thunk<LearnBody>>),

    /// The null callback.
    Cleared,
}

impl std::fmt::Debug for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "Static"),
            Self::Raw => write!(f, "Raw"),
            Self::TerminateThunk(thunk) => write!(f, "Thunk({}, data {})", thunk.address(), thunk.data),
            Self::LearnThunk(thunk) => write!(f, "Thunk({}, data {})", thunk.address(), thunk.data),
            Self::Cleared => write!(f, "Cleared"),
        }
    }
}

/// The lifetime of a native callback pointer.
///
/// The pointer handed to the native side, together with the data address handed with it, is valid until the scope is dropped, and invalid afterwards.
/// So, a scope is dropped only after the native side has been given a replacement pointer, or the solver has been released.
#[derive(Debug)]
pub struct CallbackScope {
    kind: CallbackKind,
    origin: Origin,
}

impl CallbackScope {
    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    /// Whether the scope holds a closure.
    pub fn is_thunk(&self) -> bool {
        matches!(
            self.origin,
            Origin::TerminateThunk(_) | Origin::LearnThunk(_)
        )
    }

    pub(crate) fn raw(kind: CallbackKind) -> Self {
        CallbackScope {
            kind,
            origin: Origin::Raw,
        }
    }

    pub(crate) fn cleared(kind: CallbackKind) -> Self {
        CallbackScope {
            kind,
            origin: Origin::Cleared,
        }
    }

    /// The trampoline for a terminate callback type.
    pub(crate) fn for_terminate<C: TerminateCallback>() -> (TerminateTrampoline, Self) {
        let scope = CallbackScope {
            kind: CallbackKind::Terminate,
            origin: Origin::Static,
        };
        (static_terminate::<C>, scope)
    }

    /// The trampoline for a learn callback type.
    pub(crate) fn for_learn<C: LearnCallback>() -> (LearnTrampoline, Self) {
        let scope = CallbackScope {
            kind: CallbackKind::Learn,
            origin: Origin::Static,
        };
        (static_learn::<C>, scope)
    }

    /// A trampoline for a terminate closure called with `data`, and the address to hand the native side in place of `data`.
    pub(crate) fn terminate_thunk(
        data: NativeAddress,
        body: TerminateBody,
    ) -> (TerminateTrampoline, NativeAddress, Self) {
        let thunk = Thunk::boxed(data, body);
        let address = thunk.address();
        log::trace!(target: targets::CALLBACKS, "Terminate thunk at {address} for data {data}");

        let scope = CallbackScope {
            kind: CallbackKind::Terminate,
            origin: Origin::TerminateThunk(thunk),
        };
        (thunk_terminate, address, scope)
    }

    /// A trampoline for a learn closure called with `data`, and the address to hand the native side in place of `data`.
    pub(crate) fn learn_thunk(
        data: NativeAddress,
        body: LearnBody,
    ) -> (LearnTrampoline, NativeAddress, Self) {
        let thunk = Thunk::boxed(data, body);
        let address = thunk.address();
        log::trace!(target: targets::CALLBACKS, "Learn thunk at {address} for data {data}");

        let scope = CallbackScope {
            kind: CallbackKind::Learn,
            origin: Origin::LearnThunk(thunk),
        };
        (thunk_learn, address, scope)
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        if self.is_thunk() {
            log::trace!(target: targets::CALLBACKS, "Retired {} thunk {:?}", self.kind, self.origin);
        }
    }
}
