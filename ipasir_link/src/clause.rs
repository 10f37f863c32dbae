/*!
Decoding of clauses passed from the native side.

A clause from a learn callback is a run of `int32_t` literals ended by a zero.
There is no length, and so the run is scanned up to the terminator, which is not part of the clause.

The decoded clause is a view on the native memory, valid for the duration of the callback only.
*/

use std::ffi::c_int;

/// The literals of a zero-terminated clause.
///
/// A null `base`, or a `base` pointing at a zero, decodes to the empty clause.
///
/// # Safety
/// `base` must be null or point to a run of literals ending with a zero, which remains unchanged for `'a`.
/// No literal past the terminator is read.
pub unsafe fn decode<'a>(base: *const c_int) -> &'a [i32] {
    if base.is_null() {
        return &[];
    }

    let mut length = 0;
    while *base.add(length) != 0 {
        length += 1;
    }

    std::slice::from_raw_parts(base, length)
}

/// An owned copy of a zero-terminated clause.
///
/// # Safety
/// As [decode].
pub unsafe fn decode_owned(base: *const c_int) -> Vec<i32> {
    decode(base).to_vec()
}
