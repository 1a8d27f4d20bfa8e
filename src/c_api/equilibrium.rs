// MIT License
// Copyright 2025--present gametracer developers

//! The fixed-signature solver entry points and the paired deallocator.
//!
//! ```c
//! int actions[] = {3, 2};
//! double payoffs[12] = { ... };        // player-major, first player fastest
//! double g[5] = { ... };               // perturbation ray, length M = 5
//!
//! // GNM: the shim allocates the answers, the caller frees them.
//! double *answers = NULL;
//! int n = gnm(2, actions, payoffs, g, &answers, 100, 1e-12, 3, 10, -10.0, 0, 1e-2);
//! for (int k = 0; k < n; ++k) { /* answers[k*5 + i] */ }
//! gametracer_free(answers);            // also fine when answers == NULL
//!
//! // IPA: every buffer belongs to the caller.
//! double zh[5] = {1, 1, 1, 1, 1}, ans[5];
//! int r = ipa(2, actions, payoffs, g, zh, 0.02, 1e-6, ans);
//! ```
//!
//! `ipa` and `gnm` run on the solver installed with
//! `gametracer_install_solver`; `gametracer_solver_ipa` and
//! `gametracer_solver_gnm` take the solver explicitly.

use std::os::raw::{c_int, c_void};

use crate::boundary::{gnm_raw, ipa_raw};
use crate::c_api::solver::installed_solver;
use crate::marshal::release_block;
use crate::solver::{gametracer_solver_t, GnmParams, IpaParams};

/// Release a buffer returned through `gnm`'s `answers`. NULL is a no-op.
///
/// # Safety
/// `p` must be NULL or a pointer produced by this library that has not been
/// released yet.
#[no_mangle]
pub unsafe extern "C" fn gametracer_free(p: *mut c_void) {
    unsafe { release_block(p.cast()) };
}

/// Iterated polymatrix approximation on the installed solver.
///
/// - `payoffs`: `num_players * P` doubles; `g`, `zh`, `ans`: `M` doubles each.
/// - `zh` is an in/out work buffer. `ans` receives the answer; its previous
///   contents are ignored.
///
/// Returns `>0` on success, `0` if no equilibrium was found, `-1` for
/// invalid arguments or size overflow, `-2` on allocation failure and `-3`
/// for any other failure (including a negative solver return).
///
/// # Safety
/// Every non-null pointer must reference at least the number of elements
/// given above.
#[no_mangle]
pub unsafe extern "C" fn ipa(
    num_players: c_int,
    actions: *const c_int,
    payoffs: *const f64,
    g: *const f64,
    zh: *mut f64,
    alpha: f64,
    fuzz: f64,
    ans: *mut f64,
) -> c_int {
    let solver = installed_solver();
    unsafe {
        ipa_raw(
            "ipa",
            solver.as_deref(),
            num_players,
            actions,
            payoffs,
            g,
            zh,
            IpaParams { alpha, fuzz },
            ans,
        )
    }
}

/// Global Newton method on the installed solver.
///
/// `g` (length `M`) is never modified. On a positive return `*answers` is a
/// heap block of `ret * M` doubles, equilibrium `k` at `answers[k*M + i]`,
/// to be released with `gametracer_free`. On every other return `*answers`
/// is NULL.
///
/// Returns the number of equilibria found (`>= 0`) or `-1`, `-2`, `-3` as
/// for `ipa`.
///
/// # Safety
/// Every non-null pointer must reference at least the number of elements
/// given above; `answers` must be writable.
#[no_mangle]
pub unsafe extern "C" fn gnm(
    num_players: c_int,
    actions: *const c_int,
    payoffs: *const f64,
    g: *const f64,
    answers: *mut *mut f64,
    steps: c_int,
    fuzz: f64,
    lnmfreq: c_int,
    lnmmax: c_int,
    lambdamin: f64,
    wobble: c_int,
    threshold: f64,
) -> c_int {
    let solver = installed_solver();
    let params = GnmParams {
        steps,
        fuzz,
        lnmfreq,
        lnmmax,
        lambdamin,
        wobble,
        threshold,
    };
    unsafe {
        gnm_raw(
            "gnm",
            solver.as_deref(),
            num_players,
            actions,
            payoffs,
            g,
            answers,
            params,
        )
    }
}

/// Same contract as `ipa`, on an explicit solver handle.
///
/// A NULL `solver` is reported as `-3` once the arguments have validated.
///
/// # Safety
/// As for `ipa`; `solver` must be NULL or a live handle.
#[no_mangle]
pub unsafe extern "C" fn gametracer_solver_ipa(
    solver: *const gametracer_solver_t,
    num_players: c_int,
    actions: *const c_int,
    payoffs: *const f64,
    g: *const f64,
    zh: *mut f64,
    alpha: f64,
    fuzz: f64,
    ans: *mut f64,
) -> c_int {
    let solver = unsafe { solver.as_ref() };
    unsafe {
        ipa_raw(
            "gametracer_solver_ipa",
            solver,
            num_players,
            actions,
            payoffs,
            g,
            zh,
            IpaParams { alpha, fuzz },
            ans,
        )
    }
}

/// Same contract as `gnm`, on an explicit solver handle and a parameter
/// block (NULL selects `gametracer_gnm_params_default()`).
///
/// # Safety
/// As for `gnm`; `solver` must be NULL or a live handle and `params` NULL
/// or readable.
#[no_mangle]
pub unsafe extern "C" fn gametracer_solver_gnm(
    solver: *const gametracer_solver_t,
    num_players: c_int,
    actions: *const c_int,
    payoffs: *const f64,
    g: *const f64,
    answers: *mut *mut f64,
    params: *const crate::solver::gametracer_gnm_params_t,
) -> c_int {
    let solver = unsafe { solver.as_ref() };
    let params = unsafe { params.as_ref() }.copied().unwrap_or_default();
    unsafe {
        gnm_raw(
            "gametracer_solver_gnm",
            solver,
            num_players,
            actions,
            payoffs,
            g,
            answers,
            params,
        )
    }
}
