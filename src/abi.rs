//! Purpose: C ABI bridge for host processes (libmango).
//! Exports: C-callable corpus/concordance/frequency/vector functions and free helpers.
//! Role: Stable ABI surface; every call resolves handles through the process-wide boundary.
//! Invariants: Handles are opaque `uint64_t`; 0 is never a valid handle.
//! Invariants: Every entry point runs inside the fault boundary; panics never cross it.
//! Invariants: Error kinds map 1:1 with core error kinds (`to_exit_code`).
//! Notes: The process-wide boundary reads `MANGO_REGISTRY_PATH`/`MANGO_LOG` once, on first use.
#![allow(non_camel_case_types)]

mod marshal;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::OnceLock;

use crate::boundary::Boundary;
use crate::config::Config;
use crate::core::error::{Error, ErrorKind};
use crate::core::fault::guard;
use crate::core::handle::Handle;
use crate::engine::VerticalEngine;
use crate::logging;

pub use marshal::{
    mango_error, mango_error_free, mango_handle_ret, mango_int_ret, mango_str_ret,
    mango_string_free,
};

static BOUNDARY: OnceLock<Boundary<VerticalEngine>> = OnceLock::new();

fn boundary() -> &'static Boundary<VerticalEngine> {
    BOUNDARY.get_or_init(|| Boundary::new(VerticalEngine, Config::from_env()))
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_init_logging() {
    let filter = boundary()
        .config()
        .log_filter
        .clone()
        .unwrap_or_else(|| "warn".to_string());
    logging::init(&filter);
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_corpus_open(path: *const c_char) -> mango_handle_ret {
    guard("corpus_open", || {
        let path = read_str(path, "path")?;
        boundary().open_corpus(path)
    })
    .into()
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_corpus_close(corpus: u64) {
    release("corpus_close", || {
        boundary().close_corpus(Handle::from_raw(corpus))
    });
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_corpus_size(corpus: u64) -> mango_int_ret {
    guard("corpus_size", || {
        boundary().corpus_size(Handle::from_raw(corpus))
    })
    .into()
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_corpus_conf(corpus: u64, key: *const c_char) -> mango_str_ret {
    guard("corpus_conf", || {
        let key = read_str(key, "key")?;
        boundary().corpus_conf(Handle::from_raw(corpus), key)
    })
    .into()
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_concordance_create(corpus: u64, query: *const c_char) -> mango_handle_ret {
    guard("concordance_create", || {
        let query = read_str(query, "query")?;
        boundary().create_concordance(Handle::from_raw(corpus), query)
    })
    .into()
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_concordance_size(conc: u64) -> mango_int_ret {
    guard("concordance_size", || {
        boundary().concordance_size(Handle::from_raw(conc))
    })
    .into()
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_concordance_close(conc: u64) {
    release("concordance_close", || {
        boundary().close_concordance(Handle::from_raw(conc))
    });
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_str_vector_new() -> mango_handle_ret {
    guard("str_vector_new", || boundary().new_str_vector()).into()
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_int_vector_new() -> mango_handle_ret {
    guard("int_vector_new", || boundary().new_int_vector()).into()
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_vector_free(vector: u64) {
    release("vector_free", || {
        boundary().free_vector(Handle::from_raw(vector))
    });
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_vector_size(vector: u64) -> mango_int_ret {
    guard("vector_size", || {
        boundary().vector_size(Handle::from_raw(vector))
    })
    .into()
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_str_vector_get(vector: u64, index: i64) -> mango_str_ret {
    guard("str_vector_get", || {
        boundary().str_vector_get(Handle::from_raw(vector), index)
    })
    .into()
}

#[unsafe(no_mangle)]
pub extern "C" fn mango_int_vector_get(vector: u64, index: i64) -> mango_int_ret {
    guard("int_vector_get", || {
        boundary().int_vector_get(Handle::from_raw(vector), index)
    })
    .into()
}

/// Fills `words`, `freqs` and `norms` (created with the `*_vector_new` calls) with
/// the frequency distribution of `conc`. Returns null on success.
#[unsafe(no_mangle)]
pub extern "C" fn mango_freq_dist(
    corpus: u64,
    conc: u64,
    criteria: *const c_char,
    flimit: i64,
    words: u64,
    freqs: u64,
    norms: u64,
) -> *mut mango_error {
    marshal::status(guard("freq_dist", || {
        let criteria = read_str(criteria, "criteria")?;
        boundary().freq_dist(
            Handle::from_raw(corpus),
            Handle::from_raw(conc),
            criteria,
            flimit,
            Handle::from_raw(words),
            Handle::from_raw(freqs),
            Handle::from_raw(norms),
        )
    }))
}

// Release calls have no error channel; misuse is logged and otherwise ignored.
fn release(op: &'static str, f: impl FnOnce() -> Result<(), Error>) {
    if let Err(err) = guard(op, f) {
        tracing::warn!(op, error = %err, "release ignored");
    }
}

fn read_str<'a>(input: *const c_char, what: &str) -> Result<&'a str, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{what} is null")));
    }
    unsafe { CStr::from_ptr(input) }
        .to_str()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message(format!("{what} is not valid UTF-8")))
}
