//! Error types used in the library.
//!
//! - A missing symbol is permanent for the binding it was looked up in, and the same error is returned for each later use of the symbol.
//! - Native calls themselves do not report failure, so an invocation error is raised by the binding when the result of a call is unusable (e.g. a null solver) or when a callback body panicked during the call.
//! - No error is retried.
//!
//! Names of the error enums overlap, in part, with the structures they concern.
//  As such, err::{self} is used to prefix use of the types with `err::` where the overlap is confusing.

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// A required native symbol is absent.
    SymbolNotFound(SymbolError),

    /// A native call completed, though its result could not be used.
    Invocation(InvocationError),

    /// `solve` returned a code outside of 0, 10, and 20.
    UnknownResultCode(i32),
}

/// A symbol could not be found in the library bound to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SymbolError {
    /// The full name of the symbol, prefix included.
    pub symbol: String,
}

impl From<SymbolError> for ErrorKind {
    fn from(e: SymbolError) -> Self {
        ErrorKind::SymbolNotFound(e)
    }
}

/// A call to an IPASIR function failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvocationError {
    /// The name of the IPASIR function, without prefix.
    pub function: &'static str,

    pub cause: InvocationCause,
}

impl From<InvocationError> for ErrorKind {
    fn from(e: InvocationError) -> Self {
        ErrorKind::Invocation(e)
    }
}

/// What went wrong during an invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InvocationCause {
    /// `init` returned a null solver.
    NullSolver,

    /// `signature` returned a null string.
    NullSignature,

    /// `signature` returned a string which is not valid UTF-8.
    Utf8(std::str::Utf8Error),

    /// A callback panicked while the native call was in progress.
    /// The panic was stopped at the native boundary, and its message is kept here.
    CallbackPanic(String),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SymbolNotFound(e) => write!(f, "{e}"),
            Self::Invocation(e) => write!(f, "{e}"),
            Self::UnknownResultCode(code) => {
                write!(f, "solve returned the unknown result code {code}")
            }
        }
    }
}

impl std::fmt::Display for SymbolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to bind to ipasir function {}, is an ipasir implementation loaded?",
            self.symbol
        )
    }
}

impl std::fmt::Display for InvocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "error while invoking ipasir function {}: {}",
            self.function, self.cause
        )
    }
}

impl std::fmt::Display for InvocationCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NullSolver => write!(f, "a null solver was returned"),
            Self::NullSignature => write!(f, "a null signature was returned"),
            Self::Utf8(e) => write!(f, "the signature is not UTF-8 ({e})"),
            Self::CallbackPanic(message) => write!(f, "a callback panicked: {message}"),
        }
    }
}

impl std::error::Error for ErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SymbolNotFound(e) => Some(e),
            Self::Invocation(e) => Some(e),
            Self::UnknownResultCode(_) => None,
        }
    }
}

impl std::error::Error for SymbolError {}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

impl std::error::Error for InvocationCause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Utf8(e) => Some(e),
            _ => None,
        }
    }
}
