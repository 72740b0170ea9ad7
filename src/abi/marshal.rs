//! Purpose: Fixed-layout result records and the ownership rules for what they carry.
//! Exports: `mango_error`, `mango_handle_ret`, `mango_int_ret`, `mango_str_ret`,
//! `mango_error_free`, `mango_string_free`.
//! Invariants: Each record carries a meaningful `value` or a non-null `err`, never both.
//! Invariants: On failure `value` is 0 / null.
//! Invariants: Every non-null `char*` and `mango_error*` handed out is a fresh allocation
//! owned by the host until it calls the matching free function.
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use crate::core::error::{Error, ErrorKind, to_exit_code};
use crate::core::handle::Handle;

#[repr(C)]
pub struct mango_error {
    pub kind: i32,
    pub message: *mut c_char,
}

#[repr(C)]
pub struct mango_handle_ret {
    pub value: u64,
    pub err: *mut mango_error,
}

#[repr(C)]
pub struct mango_int_ret {
    pub value: i64,
    pub err: *mut mango_error,
}

#[repr(C)]
pub struct mango_str_ret {
    pub value: *mut c_char,
    pub err: *mut mango_error,
}

impl From<Result<Handle, Error>> for mango_handle_ret {
    fn from(result: Result<Handle, Error>) -> Self {
        match result {
            Ok(handle) => Self {
                value: handle.into_raw(),
                err: ptr::null_mut(),
            },
            Err(err) => Self {
                value: 0,
                err: error_ptr(err),
            },
        }
    }
}

impl From<Result<i64, Error>> for mango_int_ret {
    fn from(result: Result<i64, Error>) -> Self {
        match result {
            Ok(value) => Self {
                value,
                err: ptr::null_mut(),
            },
            Err(err) => Self {
                value: 0,
                err: error_ptr(err),
            },
        }
    }
}

impl From<Result<String, Error>> for mango_str_ret {
    fn from(result: Result<String, Error>) -> Self {
        let copied = result.and_then(|value| {
            CString::new(value).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("value contains a NUL byte")
                    .with_source(err)
            })
        });
        match copied {
            Ok(value) => Self {
                value: value.into_raw(),
                err: ptr::null_mut(),
            },
            Err(err) => Self {
                value: ptr::null_mut(),
                err: error_ptr(err),
            },
        }
    }
}

/// `null` on success, an owned error record otherwise.
pub fn status(result: Result<(), Error>) -> *mut mango_error {
    match result {
        Ok(()) => ptr::null_mut(),
        Err(err) => error_ptr(err),
    }
}

pub fn error_ptr(err: Error) -> *mut mango_error {
    let error = Box::new(mango_error {
        kind: to_exit_code(err.kind()),
        message: to_c_string(&err.host_message()),
    });
    Box::into_raw(error)
}

// Messages are diagnostics; interior NULs are dropped rather than losing the text.
fn to_c_string(input: &str) -> *mut c_char {
    let cleaned: String = input.chars().filter(|c| *c != '\0').collect();
    CString::new(cleaned)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_error_free(err: *mut mango_error) {
    if err.is_null() {
        return;
    }
    unsafe {
        let err = Box::from_raw(err);
        if !err.message.is_null() {
            drop(CString::from_raw(err.message));
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_string_free(value: *mut c_char) {
    if value.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(value));
    }
}
