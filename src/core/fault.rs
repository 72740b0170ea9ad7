//! Purpose: The one fault boundary every engine invocation and ABI entry point runs through.
//! Exports: `guard`.
//! Invariants: A panic inside `f` never unwinds past `guard`; it becomes an `Internal` error.
//! Invariants: `Err` values from `f` pass through untouched.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::core::error::{Error, ErrorKind};

pub fn guard<T>(op: &'static str, f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::debug!(op, kind = ?err.kind(), error = %err, "call failed");
            Err(err)
        }
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            tracing::warn!(op, detail, "panic caught at call boundary");
            Err(Error::new(ErrorKind::Internal).with_message(format!("{op} panicked: {detail}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::guard;
    use crate::core::error::{Error, ErrorKind};

    #[test]
    fn ok_values_pass_through() {
        assert_eq!(guard("size", || Ok(42)).unwrap(), 42);
    }

    #[test]
    fn errors_pass_through_unchanged() {
        let err = guard::<()>("conf", || Err(Error::engine("no such key"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert_eq!(err.message(), Some("no such key"));
    }

    #[test]
    fn panics_become_internal_errors() {
        let err = guard::<()>("open", || panic!("index file truncated")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.message(), Some("open panicked: index file truncated"));

        let formatted = guard::<()>("sync", || panic!("bad span {}", 3)).unwrap_err();
        assert_eq!(formatted.message(), Some("sync panicked: bad span 3"));
    }
}
