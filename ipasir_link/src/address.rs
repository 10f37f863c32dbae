//! Opaque native addresses.
//!
//! A [NativeAddress] is a pointer value the binding passes across the native boundary without interpreting it.
//! Addresses are compared by bit pattern only, and are never dereferenced here.
//!
//! The representation is an integer rather than a raw pointer, so addresses may be used as keys of the [registry](crate::registry) and moved between threads freely.

use std::ffi::c_void;

/// An opaque, copyable native pointer value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeAddress(usize);

impl NativeAddress {
    /// The distinguished address representing "no data".
    pub const NULL: NativeAddress = NativeAddress(0);

    /// An address from its bit pattern.
    pub const fn from_bits(bits: usize) -> Self {
        NativeAddress(bits)
    }

    /// The bit pattern of the address.
    pub const fn to_bits(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The address as a pointer, for handing to a native function.
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl<T> From<*const T> for NativeAddress {
    fn from(pointer: *const T) -> Self {
        NativeAddress(pointer as usize)
    }
}

impl<T> From<*mut T> for NativeAddress {
    fn from(pointer: *mut T) -> Self {
        NativeAddress(pointer as usize)
    }
}

impl std::fmt::Display for NativeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
