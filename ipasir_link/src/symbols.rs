/*!
Resolution of the IPASIR symbols.

The binder turns a symbol name into a callable [NativeFunction], typed by the fixed signature of the IPASIR function the symbol names.
Only the nine IPASIR functions (and `signature`) are known, and their signatures are fixed at compile time as the `…Fn` aliases of this module.

# Sources

Symbols are looked up through a [SymbolSource]:
- [ProcessSymbols] resolves against the libraries the process has already loaded.
  The binding never loads a library itself.
- A [libloading::Library] the caller has loaded.
- A [SymbolTable], for implementations linked into the program.

# Memoization

Each symbol is resolved at most once per [Ipasir](crate::ipasir::Ipasir) instance.
The result of the first lookup, whether a function or a [SymbolError], is kept for the life of the instance and returned for every later use of the symbol.
*/

use std::{
    collections::HashMap,
    ffi::{c_char, c_int, c_void, CStr, CString},
    sync::OnceLock,
};

use crate::{
    address::NativeAddress,
    callbacks::{LearnTrampoline, TerminateTrampoline},
    config::Config,
    misc::log::targets::{self},
    types::err::{ErrorKind, SymbolError},
};

pub type SignatureFn = unsafe extern "C" fn() -> *const c_char;
pub type InitFn = unsafe extern "C" fn() -> *mut c_void;
pub type ReleaseFn = unsafe extern "C" fn(solver: *mut c_void);
pub type AddFn = unsafe extern "C" fn(solver: *mut c_void, lit_or_zero: c_int);
pub type AssumeFn = unsafe extern "C" fn(solver: *mut c_void, lit: c_int);
pub type SolveFn = unsafe extern "C" fn(solver: *mut c_void) -> c_int;
pub type ValFn = unsafe extern "C" fn(solver: *mut c_void, lit: c_int) -> c_int;
pub type FailedFn = unsafe extern "C" fn(solver: *mut c_void, lit: c_int) -> c_int;
pub type SetTerminateFn = unsafe extern "C" fn(
    solver: *mut c_void,
    data: *mut c_void,
    terminate: Option<TerminateTrampoline>,
);
pub type SetLearnFn = unsafe extern "C" fn(
    solver: *mut c_void,
    data: *mut c_void,
    max_length: c_int,
    learn: Option<LearnTrampoline>,
);

/// Something symbols may be looked up in.
pub trait SymbolSource: Send + Sync {
    /// The address of the symbol, if present.
    fn address_of(&self, symbol: &CStr) -> Option<NativeAddress>;
}

impl SymbolSource for libloading::Library {
    fn address_of(&self, symbol: &CStr) -> Option<NativeAddress> {
        // Safety: The symbol is read as an address, and is not called here.
        let found = unsafe { self.get::<*mut c_void>(symbol.to_bytes_with_nul()) }.ok()?;
        Some(NativeAddress::from(*found)).filter(|address| !address.is_null())
    }
}

impl<S: SymbolSource + ?Sized> SymbolSource for Box<S> {
    fn address_of(&self, symbol: &CStr) -> Option<NativeAddress> {
        (**self).address_of(symbol)
    }
}

impl<S: SymbolSource + ?Sized> SymbolSource for std::sync::Arc<S> {
    fn address_of(&self, symbol: &CStr) -> Option<NativeAddress> {
        (**self).address_of(symbol)
    }
}

#[cfg(unix)]
use libloading::os::unix::Library as ProcessLibrary;
#[cfg(windows)]
use libloading::os::windows::Library as ProcessLibrary;

/// The symbols of every library already loaded into the process.
pub struct ProcessSymbols {
    library: Option<ProcessLibrary>,
}

impl ProcessSymbols {
    #[cfg(unix)]
    pub fn new() -> Self {
        ProcessSymbols {
            library: Some(ProcessLibrary::this()),
        }
    }

    #[cfg(windows)]
    pub fn new() -> Self {
        match ProcessLibrary::this() {
            Ok(library) => ProcessSymbols {
                library: Some(library),
            },
            Err(e) => {
                log::warn!(target: targets::SYMBOLS, "No handle to the process: {e}");
                ProcessSymbols { library: None }
            }
        }
    }
}

impl Default for ProcessSymbols {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolSource for ProcessSymbols {
    fn address_of(&self, symbol: &CStr) -> Option<NativeAddress> {
        let library = self.library.as_ref()?;
        // Safety: The symbol is read as an address, and is not called here.
        let found = unsafe { library.get::<*mut c_void>(symbol.to_bytes_with_nul()) }.ok()?;
        Some(NativeAddress::from(*found)).filter(|address| !address.is_null())
    }
}

/// An explicit table from symbol names to addresses.
///
/// ```rust
/// # use ipasir_link::{address::NativeAddress, symbols::SymbolTable};
/// extern "C" fn solve(_solver: *mut std::ffi::c_void) -> std::ffi::c_int {
///     10
/// }
///
/// let mut table = SymbolTable::default();
/// table.insert("ipasir_solve", NativeAddress::from(solve as *const ()));
/// assert!(table.get("ipasir_solve").is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<String, NativeAddress>,
}

impl SymbolTable {
    /// Adds a symbol to the table, returning the address previously stored under the name, if any.
    pub fn insert(&mut self, symbol: &str, address: NativeAddress) -> Option<NativeAddress> {
        self.entries.insert(symbol.to_string(), address)
    }

    pub fn get(&self, symbol: &str) -> Option<NativeAddress> {
        self.entries.get(symbol).copied()
    }
}

impl<'s> FromIterator<(&'s str, NativeAddress)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (&'s str, NativeAddress)>>(iter: I) -> Self {
        let mut table = SymbolTable::default();
        for (symbol, address) in iter {
            table.insert(symbol, address);
        }
        table
    }
}

impl SymbolSource for SymbolTable {
    fn address_of(&self, symbol: &CStr) -> Option<NativeAddress> {
        self.get(symbol.to_str().ok()?)
            .filter(|address| !address.is_null())
    }
}

/// A resolved IPASIR function.
///
/// The binding is immutable, and copies of it are interchangeable.
#[derive(Clone, Copy, Debug)]
pub struct NativeFunction<F: Copy> {
    /// The IPASIR name of the function, without prefix.
    pub name: &'static str,

    /// The C signature of the function, for diagnostics.
    pub signature: &'static str,

    /// Where the function was found.
    pub address: NativeAddress,

    /// The function, typed by its signature.
    pub entry: F,
}

/// A symbol, resolved on first use.
pub(crate) struct LazySymbol<F: Copy> {
    name: &'static str,
    signature: &'static str,
    resolved: OnceLock<Result<NativeFunction<F>, SymbolError>>,
}

impl<F: Copy> LazySymbol<F> {
    const fn new(name: &'static str, signature: &'static str) -> Self {
        LazySymbol {
            name,
            signature,
            resolved: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The function for the symbol, resolving it from `source` under the prefix of `config` on the first call only.
    ///
    /// # Safety
    /// `F` must be a function pointer type matching the native signature of the symbol.
    pub unsafe fn get(
        &self,
        source: &dyn SymbolSource,
        config: &Config,
    ) -> Result<NativeFunction<F>, ErrorKind> {
        self.resolved
            .get_or_init(|| unsafe { self.resolve(source, config) })
            .clone()
            .map_err(ErrorKind::from)
    }

    unsafe fn resolve(
        &self,
        source: &dyn SymbolSource,
        config: &Config,
    ) -> Result<NativeFunction<F>, SymbolError> {
        let symbol = config.symbol_name(self.name);

        let found = CString::new(symbol.as_str())
            .ok()
            .and_then(|c_symbol| source.address_of(&c_symbol));

        match found {
            Some(address) if !address.is_null() => {
                debug_assert_eq!(
                    std::mem::size_of::<F>(),
                    std::mem::size_of::<*mut c_void>()
                );
                let pointer = address.as_ptr();
                let entry = std::mem::transmute_copy::<*mut c_void, F>(&pointer);

                log::debug!(target: targets::SYMBOLS, "Bound {symbol} {} at {address}", self.signature);
                Ok(NativeFunction {
                    name: self.name,
                    signature: self.signature,
                    address,
                    entry,
                })
            }

            _ => {
                log::warn!(target: targets::SYMBOLS, "Missing symbol {symbol}");
                Err(SymbolError { symbol })
            }
        }
    }
}

/// The IPASIR functions.
pub(crate) struct Symbols {
    pub signature: LazySymbol<SignatureFn>,
    pub init: LazySymbol<InitFn>,
    pub release: LazySymbol<ReleaseFn>,
    pub add: LazySymbol<AddFn>,
    pub assume: LazySymbol<AssumeFn>,
    pub solve: LazySymbol<SolveFn>,
    pub val: LazySymbol<ValFn>,
    pub failed: LazySymbol<FailedFn>,
    pub set_terminate: LazySymbol<SetTerminateFn>,
    pub set_learn: LazySymbol<SetLearnFn>,
}

impl Symbols {
    pub const fn new() -> Self {
        Symbols {
            signature: LazySymbol::new("signature", "() -> const char*"),
            init: LazySymbol::new("init", "() -> void*"),
            release: LazySymbol::new("release", "(void*) -> void"),
            add: LazySymbol::new("add", "(void*, int32_t) -> void"),
            assume: LazySymbol::new("assume", "(void*, int32_t) -> void"),
            solve: LazySymbol::new("solve", "(void*) -> int"),
            val: LazySymbol::new("val", "(void*, int32_t) -> int32_t"),
            failed: LazySymbol::new("failed", "(void*, int32_t) -> int"),
            set_terminate: LazySymbol::new(
                "set_terminate",
                "(void*, void*, int (*)(void*)) -> void",
            ),
            set_learn: LazySymbol::new(
                "set_learn",
                "(void*, void*, int, void (*)(void*, int32_t*)) -> void",
            ),
        }
    }
}
