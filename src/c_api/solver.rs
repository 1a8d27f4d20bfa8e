// MIT License
// Copyright 2025--present gametracer developers

//! C API for solver handles: create, install, free.
//!
//! A host that embeds the native kernels wires them in once at start-up:
//!
//! ```c
//! gametracer_solver_t *s =
//!     gametracer_solver_new(my_ipa, my_gnm, my_release, my_ctx, my_ctx_free);
//! gametracer_install_solver(s);   // ipa()/gnm() now dispatch to s
//! // ...
//! gametracer_install_solver(NULL); // uninstall and destroy s
//! ```
//!
//! The installed solver is shared by every thread. Whether concurrent calls
//! are safe depends on the kernels: if they keep global state (a shared
//! random source, say), the host has to serialise calls itself.

use std::os::raw::c_void;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::solver::{
    gametracer_solver_t, CallbackSolver, FreeFn, GnmCallback, IpaCallback, ReleaseFn,
};
use crate::status::set_last_error_fmt;

static INSTALLED: RwLock<Option<Arc<CallbackSolver>>> = parking_lot::const_rwlock(None);

/// The solver `ipa` and `gnm` dispatch to, if any.
///
/// The lock is only held long enough to clone the `Arc`.
pub(crate) fn installed_solver() -> Option<Arc<CallbackSolver>> {
    INSTALLED.read().clone()
}

/// Create a solver handle from kernel callbacks.
///
/// - `ipa`, `gnm`: kernels; either may be NULL, in which case the matching
///   entry point fails with `-3`.
/// - `release`: called once for every answer pointer and once for every
///   answer array a GNM kernel hands back. Required.
/// - `user_data`: forwarded to every callback.
/// - `free_fn`: optional destructor for `user_data`.
///
/// Returns NULL (and sets the last error) if `release` is NULL. The handle
/// must be destroyed with `gametracer_solver_free` unless it is passed to
/// `gametracer_install_solver`.
#[no_mangle]
pub unsafe extern "C" fn gametracer_solver_new(
    ipa: Option<IpaCallback>,
    gnm: Option<GnmCallback>,
    release: Option<ReleaseFn>,
    user_data: *mut c_void,
    free_fn: Option<FreeFn>,
) -> *mut gametracer_solver_t {
    let Some(release) = release else {
        set_last_error_fmt(format_args!("gametracer_solver_new: release is NULL"));
        return std::ptr::null_mut();
    };
    let solver = CallbackSolver::new(ipa, gnm, release, user_data, free_fn);
    Box::into_raw(Box::new(solver))
}

/// Free a solver handle obtained from `gametracer_solver_new`.
///
/// If `solver` is NULL, this function is a no-op. Do not free a handle that
/// was installed; install NULL instead.
#[no_mangle]
pub unsafe extern "C" fn gametracer_solver_free(solver: *mut gametracer_solver_t) {
    if !solver.is_null() {
        drop(unsafe { Box::from_raw(solver) });
    }
}

/// Make `solver` the target of `ipa` and `gnm`, taking ownership of it.
///
/// Passing NULL uninstalls. A previously installed solver is destroyed once
/// the last call still running on it returns.
#[no_mangle]
pub unsafe extern "C" fn gametracer_install_solver(solver: *mut gametracer_solver_t) {
    let next = if solver.is_null() {
        None
    } else {
        Some(Arc::from(unsafe { Box::from_raw(solver) }))
    };
    let previous = std::mem::replace(&mut *INSTALLED.write(), next);
    tracing::debug!(
        replaced = previous.is_some(),
        "solver installation changed"
    );
    drop(previous);
}
