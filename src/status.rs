// MIT License
// Copyright 2025--present gametracer developers

//! Return codes, last-error reporting and the panic boundary.
//!
//! Every exported function reports its outcome through a plain `int`:
//!
//! 1. **Non-negative values** are the solver's own result (an equilibrium
//!    count for `gnm`, the upstream return for `ipa`). `0` is a legitimate
//!    "no equilibrium found" outcome, not an error.
//!
//! 2. **[`gametracer_status_t`]** names the three negative codes the shim
//!    itself produces: invalid arguments, allocation failure, and anything
//!    else that went wrong below the boundary.
//!
//! 3. **Thread-local error message**: on failure, a human-readable
//!    description is stored in a thread-local slot. Messages produced by
//!    the shim are formatted into a fixed buffer, so reporting a rejected
//!    call or an exhausted heap never allocates. The C caller
//!    retrieves it with [`gametracer_last_error()`]. The pointer is valid
//!    until the next call into this library on the same thread.
//!
//! 4. **[`catch_unwind`]**: wraps the body of every entry point so that a
//!    Rust panic never unwinds across the FFI boundary. A caught panic
//!    becomes `GAMETRACER_INTERNAL_ERROR` with its message stored.
//!
//! ## Usage from C
//!
//! ```c
//! double *answers = NULL;
//! int n = gnm(2, actions, payoffs, ray, &answers, 100, 1e-12, 3, 10, -10.0, 0, 1e-2);
//! if (n < 0) {
//!     fprintf(stderr, "gametracer error %d: %s\n", n, gametracer_last_error());
//! }
//! gametracer_free(answers);
//! ```

use std::cell::RefCell;
use std::ffi::CString;
use std::fmt;
use std::os::raw::{c_char, c_int};

/// Negative return codes produced by the shim itself.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum gametracer_status_t {
    /// Invalid arguments: null pointer, non-positive sizes, or size overflow.
    GAMETRACER_INVALID_ARGUMENT = -1,
    /// The heap could not satisfy an allocation.
    GAMETRACER_ALLOCATION_FAILURE = -2,
    /// Any other failure below the boundary (caught panic, unexpected solver
    /// return, broken collaborator contract).
    GAMETRACER_INTERNAL_ERROR = -3,
}

impl gametracer_status_t {
    /// The value returned across the boundary for this status.
    pub const fn code(self) -> c_int {
        self as c_int
    }
}

/// Longest message, NUL included, that the slot holds without the heap.
const INLINE_CAPACITY: usize = 256;

enum LastError {
    /// Formatted in place; `buf[len]` is always NUL.
    Inline { buf: [u8; INLINE_CAPACITY], len: usize },
    Owned(CString),
}

impl LastError {
    const EMPTY: LastError = LastError::Inline {
        buf: [0; INLINE_CAPACITY],
        len: 0,
    };

    fn as_ptr(&self) -> *const c_char {
        match self {
            LastError::Inline { buf, .. } => buf.as_ptr().cast(),
            LastError::Owned(c) => c.as_ptr(),
        }
    }
}

/// `fmt::Write` sink over a fixed buffer. Output past the capacity is cut
/// at a char boundary and interior NULs become `?`.
struct InlineWriter {
    buf: [u8; INLINE_CAPACITY],
    len: usize,
}

impl fmt::Write for InlineWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = INLINE_CAPACITY - 1 - self.len;
        let mut end = s.len().min(room);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        for &b in &s.as_bytes()[..end] {
            self.buf[self.len] = if b == 0 { b'?' } else { b };
            self.len += 1;
        }
        Ok(())
    }
}

thread_local! {
    static LAST_ERROR: RefCell<LastError> = const { RefCell::new(LastError::EMPTY) };
}

/// Store an error message in the thread-local slot.
pub(crate) fn set_last_error(msg: &str) {
    LAST_ERROR.with(|cell| {
        let c = CString::new(msg).unwrap_or_else(|_| {
            CString::new("(error message contained interior NUL)").unwrap_or_default()
        });
        *cell.borrow_mut() = LastError::Owned(c);
    });
}

/// Format an error message straight into the thread-local slot.
///
/// Never touches the heap, so it is safe on the validation path and after an
/// allocation failure. Messages longer than the slot are truncated.
pub(crate) fn set_last_error_fmt(args: fmt::Arguments<'_>) {
    let mut w = InlineWriter {
        buf: [0; INLINE_CAPACITY],
        len: 0,
    };
    let _ = fmt::write(&mut w, args);
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = LastError::Inline {
            buf: w.buf,
            len: w.len,
        }
    });
}

/// Reset the thread-local slot to the empty string.
pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = LastError::EMPTY);
}

/// Retrieve a pointer to the last error message for the current thread.
///
/// Returns an empty string if the most recent call succeeded. The pointer
/// is valid until the next call into this library on the same thread.
///
/// # Safety
/// This is intended to be called from C. The returned pointer must not
/// be freed by the caller.
#[no_mangle]
pub unsafe extern "C" fn gametracer_last_error() -> *const c_char {
    LAST_ERROR.with(|cell| cell.borrow().as_ptr())
}

/// Execute a closure, catching any panics and converting them to a code.
///
/// On a normal return the closure's value is passed through. On panic, the
/// panic message is stored in the thread-local error slot and
/// `GAMETRACER_INTERNAL_ERROR` is returned.
pub(crate) fn catch_unwind<F>(f: F) -> c_int
where
    F: FnOnce() -> c_int + std::panic::UnwindSafe,
{
    match std::panic::catch_unwind(f) {
        Ok(code) => code,
        Err(e) => {
            let msg = if let Some(s) = e.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = e.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            tracing::warn!(panic = %msg, "panic caught at the C boundary");
            set_last_error(&msg);
            gametracer_status_t::GAMETRACER_INTERNAL_ERROR.code()
        }
    }
}
