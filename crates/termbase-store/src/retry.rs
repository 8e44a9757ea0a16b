//! Single automatic retry for transient filesystem failures.

use std::io;

use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// Errors worth one more attempt: the operation may succeed unchanged.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Run `f`, retrying exactly once if the first failure is transient.
pub fn retry_once<T, F>(op: &'static str, path: &str, mut f: F) -> StoreResult<T>
where
    F: FnMut() -> io::Result<T>,
{
    match f() {
        Ok(value) => Ok(value),
        Err(err) if is_transient(&err) => {
            warn!(op, path, error = %err, "transient I/O failure; retrying once");
            f().map_err(|source| StoreError::io(op, path, source))
        }
        Err(err) => Err(StoreError::io(op, path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_after_one_transient_failure() {
        let mut calls = 0;
        let out = retry_once("read", "a.yaml", || {
            calls += 1;
            if calls == 1 {
                Err(io::Error::new(io::ErrorKind::Interrupted, "signal"))
            } else {
                Ok(7)
            }
        })
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls, 2);
    }

    #[test]
    fn gives_up_after_second_failure() {
        let mut calls = 0;
        let err = retry_once::<(), _>("write", "a.yaml", || {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::TimedOut, "slow disk"))
        })
        .unwrap_err();
        assert_eq!(calls, 2);
        assert!(matches!(err, StoreError::Io { op: "write", .. }));
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let mut calls = 0;
        let err = retry_once::<(), _>("read", "a.yaml", || {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "nope"))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(!err.is_skippable());
    }
}
