//! The entrypoint to a native IPASIR implementation.
//!
//! An [Ipasir] instance stands for one IPASIR implementation, reached through a [SymbolSource].
//! Symbols are resolved as needed, and each is resolved at most once for the life of the instance (see [symbols](crate::symbols)).
//!
//! Most programs need only the implementation linked into (or already loaded by) the process, which is [Ipasir::process].
//! Other implementations, e.g. from a library loaded with [libloading], are bound with [Ipasir::new].
//!
//! ```rust,no_run
//! # use ipasir_link::{ipasir::Ipasir, solver::SolveResult};
//! let ipasir = Ipasir::process();
//! println!("c Bound to {}", ipasir.signature()?);
//!
//! let mut solver = ipasir.init()?;
//! solver.add_clause(&[1, 2])?;
//! solver.add_clause(&[-1])?;
//! assert_eq!(solver.solve()?, SolveResult::Satisfiable);
//! assert_eq!(solver.val(2)?, 2);
//! # Ok::<(), ipasir_link::types::err::ErrorKind>(())
//! ```

use std::{ffi::CStr, sync::OnceLock};

use crate::{
    address::NativeAddress,
    config::Config,
    misc::log::targets,
    solver::Solver,
    symbols::{LazySymbol, NativeFunction, ProcessSymbols, SymbolSource, Symbols},
    types::err::{self, ErrorKind},
};

/// A binding to an IPASIR implementation.
pub struct Ipasir {
    source: Box<dyn SymbolSource>,

    config: Config,

    pub(crate) symbols: Symbols,
}

static PROCESS: OnceLock<Ipasir> = OnceLock::new();

impl Ipasir {
    /// A binding to the implementation found in `source`, with the default configuration.
    pub fn new(source: impl SymbolSource + 'static) -> Self {
        Self::with_config(source, Config::default())
    }

    pub fn with_config(source: impl SymbolSource + 'static, config: Config) -> Self {
        log::trace!(target: targets::SYMBOLS, "Binding with prefix {}", config.symbol_prefix);
        Ipasir {
            source: Box::new(source),
            config,
            symbols: Symbols::new(),
        }
    }

    /// The binding to the implementation loaded into the process, made on first use.
    pub fn process() -> &'static Ipasir {
        PROCESS.get_or_init(|| Ipasir::new(ProcessSymbols::new()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The function for `symbol`.
    pub(crate) fn bind<F: Copy>(
        &self,
        symbol: &LazySymbol<F>,
    ) -> Result<NativeFunction<F>, ErrorKind> {
        // Safety: Each lazy symbol is typed by the signature of the IPASIR function it names.
        unsafe { symbol.get(&*self.source, &self.config) }
    }

    /// Resolves every IPASIR symbol, returning the error of the first missing symbol, if any.
    pub fn resolve_all(&self) -> Result<(), ErrorKind> {
        let symbols = &self.symbols;
        self.bind(&symbols.signature)?;
        self.bind(&symbols.init)?;
        self.bind(&symbols.release)?;
        self.bind(&symbols.add)?;
        self.bind(&symbols.assume)?;
        self.bind(&symbols.solve)?;
        self.bind(&symbols.val)?;
        self.bind(&symbols.failed)?;
        self.bind(&symbols.set_terminate)?;
        self.bind(&symbols.set_learn)?;
        Ok(())
    }

    /// The identifier of the implementation, e.g. its name and version.
    pub fn signature(&self) -> Result<String, ErrorKind> {
        let signature = self.bind(&self.symbols.signature)?;

        // Safety: The signature is a function without arguments.
        let pointer = unsafe { (signature.entry)() };
        if pointer.is_null() {
            return Err(ErrorKind::from(err::InvocationError {
                function: signature.name,
                cause: err::InvocationCause::NullSignature,
            }));
        }

        // Safety: A non-null signature is a nul-terminated string, which lives for the life of the library.
        let signature_string = unsafe { CStr::from_ptr(pointer) };
        match signature_string.to_str() {
            Ok(text) => Ok(text.to_string()),
            Err(e) => Err(ErrorKind::from(err::InvocationError {
                function: signature.name,
                cause: err::InvocationCause::Utf8(e),
            })),
        }
    }

    /// A fresh native solver.
    ///
    /// The native `release` is resolved before the solver is made, so every solver returned can be released.
    pub fn init(&self) -> Result<Solver<'_>, ErrorKind> {
        let init = self.bind(&self.symbols.init)?;
        let release = self.bind(&self.symbols.release)?;

        // Safety: Init is a function without arguments.
        let pointer = NativeAddress::from(unsafe { (init.entry)() });
        if pointer.is_null() {
            log::error!(target: targets::SOLVER, "Init returned a null solver");
            return Err(ErrorKind::from(err::InvocationError {
                function: init.name,
                cause: err::InvocationCause::NullSolver,
            }));
        }

        Ok(Solver::new(self, pointer, release))
    }
}

impl std::fmt::Debug for Ipasir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipasir")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
