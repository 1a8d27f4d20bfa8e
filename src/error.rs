// MIT License
// Copyright 2025--present gametracer developers

//! Typed failures used below the C boundary.
//!
//! Nothing in here crosses the boundary as-is: the entry points turn a
//! [`ShimError`] into one of the negative codes of
//! [`gametracer_status_t`](crate::status::gametracer_status_t) and store its
//! `Display` text as the thread-local last error.

use std::collections::TryReserveError;
use std::os::raw::c_int;

use thiserror::Error;

use crate::sizes::SizeError;
use crate::status::gametracer_status_t;

/// Any failure the shim can report.
#[derive(Debug, Error)]
pub enum ShimError {
    /// A required pointer argument was NULL.
    #[error("{0} is NULL")]
    NullArgument(&'static str),
    /// The game dimensions were rejected by the size validator.
    #[error(transparent)]
    Size(#[from] SizeError),
    /// The heap could not satisfy an allocation of `bytes` bytes.
    #[error("allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },
    /// The collaborator returned something its contract rules out, or a
    /// step below the boundary failed in an unexpected way.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShimError {
    /// Shorthand for [`ShimError::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        ShimError::Internal(msg.into())
    }

    /// The status category this error belongs to.
    pub fn status(&self) -> gametracer_status_t {
        match self {
            ShimError::NullArgument(_) | ShimError::Size(_) => {
                gametracer_status_t::GAMETRACER_INVALID_ARGUMENT
            }
            ShimError::Allocation { .. } => gametracer_status_t::GAMETRACER_ALLOCATION_FAILURE,
            ShimError::Internal(_) => gametracer_status_t::GAMETRACER_INTERNAL_ERROR,
        }
    }

    /// The negative value returned across the boundary.
    pub fn code(&self) -> c_int {
        self.status().code()
    }
}

/// Reserve room for exactly `len` elements, reporting heap exhaustion as
/// [`ShimError::Allocation`] instead of aborting.
pub(crate) fn try_vec<T>(len: usize) -> Result<Vec<T>, ShimError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|e: TryReserveError| {
            tracing::debug!(error = %e, len, "reservation failed");
            ShimError::Allocation {
                bytes: len.saturating_mul(std::mem::size_of::<T>()),
            }
        })?;
    Ok(v)
}
