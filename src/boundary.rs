// MIT License
// Copyright 2025--present gametracer developers

//! The IPA and GNM call flows, from raw C arguments to a return code.
//!
//! Each flow runs in two phases:
//!
//! 1. **Validation**, outside any failure scope: pointer checks and the
//!    size validator. Failing here returns `-1` before anything is allocated.
//! 2. **Execution**, inside [`catch_unwind`]: copy the game and vectors in,
//!    call the solver, marshal the output. Every [`ShimError`] and every
//!    panic is turned into a negative code here, and the thread-local last
//!    error is set. A successful call clears it.
//!
//! The slice-level functions [`ipa_on_game`] and [`gnm_on_game`] hold the
//! contract checks shared by the raw entry points and Rust callers.

use std::os::raw::c_int;
use std::panic::AssertUnwindSafe;

use crate::error::{try_vec, ShimError};
use crate::game::{copy_in_vector, zeroed_vector, NormalFormGame};
use crate::marshal::{copy_out, pack_equilibria, ResultBlock};
use crate::sizes::{GameSizes, SizeError};
use crate::solver::{EquilibriumSolver, GnmParams, IpaParams};
use crate::status::{catch_unwind, clear_last_error, set_last_error_fmt};

/// Turn a flow result into the value returned across the boundary.
fn finish(entry: &str, result: Result<c_int, ShimError>) -> c_int {
    match result {
        Ok(code) => {
            clear_last_error();
            code
        }
        Err(e) => {
            let code = e.code();
            tracing::warn!(entry, code, error = %e, "call failed");
            set_last_error_fmt(format_args!("{entry}: {e}"));
            code
        }
    }
}

/// Size-check the game and make sure every other required pointer is set.
unsafe fn validate(
    num_players: c_int,
    actions: *const c_int,
    required: &[(&'static str, bool)],
) -> Result<GameSizes, ShimError> {
    let sizes = unsafe { GameSizes::from_raw(num_players, actions) }?;
    if let Some(&(name, _)) = required.iter().find(|(_, is_null)| *is_null) {
        return Err(ShimError::NullArgument(name));
    }
    Ok(sizes)
}

fn check_len(expected: usize, got: usize) -> Result<(), ShimError> {
    if expected != got {
        return Err(SizeError::LengthMismatch { expected, got }.into());
    }
    Ok(())
}

/// Run IPA on an adapted game.
///
/// `zh` is updated in place and `ans` receives the answer. Both, and `ray`,
/// must have length `game.num_actions()`. A negative solver return is
/// reported as an internal error.
pub fn ipa_on_game<S: EquilibriumSolver + ?Sized>(
    solver: &S,
    game: &NormalFormGame,
    ray: &[f64],
    zh: &mut [f64],
    params: &IpaParams,
    ans: &mut [f64],
) -> Result<c_int, ShimError> {
    let m = game.num_actions();
    check_len(m, ray.len())?;
    check_len(m, zh.len())?;
    check_len(m, ans.len())?;

    let ret = solver.ipa(game, ray, zh, params, ans)?;
    tracing::debug!(ret, "IPA returned");
    if ret < 0 {
        return Err(ShimError::internal(format!(
            "IPA returned unexpected value {ret}"
        )));
    }
    Ok(ret)
}

/// Run GNM on an adapted game and pack the answers.
///
/// The solver works on a private copy of `ray`. Returns the number of
/// equilibria and, if there are any, the block holding them row by row.
/// Every answer handle is released before this returns, on all paths.
pub fn gnm_on_game<S: EquilibriumSolver + ?Sized>(
    solver: &S,
    game: &NormalFormGame,
    ray: &[f64],
    params: &GnmParams,
) -> Result<(c_int, Option<ResultBlock>), ShimError> {
    let m = game.num_actions();
    check_len(m, ray.len())?;

    let mut ray_copy = try_vec(m)?;
    ray_copy.extend_from_slice(ray);

    let outcome = solver.gnm(game, &mut ray_copy, params)?;
    let found = outcome.found;
    tracing::debug!(found, handles = outcome.equilibria.len(), "GNM returned");

    if found < 0 {
        return Err(ShimError::internal(format!(
            "GNM returned unexpected count {found}"
        )));
    }
    if found == 0 {
        return Ok((0, None));
    }
    if outcome.equilibria.len() != found as usize {
        return Err(ShimError::internal(format!(
            "GNM reported {found} equilibria but produced {}",
            outcome.equilibria.len()
        )));
    }

    let block = pack_equilibria(&outcome.equilibria, m)?;
    drop(outcome);
    Ok((found, Some(block)))
}

/// Raw IPA flow behind `ipa` and `gametracer_solver_ipa`.
///
/// `solver == None` passes validation and then fails with an internal error.
///
/// # Safety
/// Pointer arguments must satisfy the length contract of `ipa`.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn ipa_raw<S: EquilibriumSolver + ?Sized>(
    entry: &str,
    solver: Option<&S>,
    num_players: c_int,
    actions: *const c_int,
    payoffs: *const f64,
    g: *const f64,
    zh: *mut f64,
    params: IpaParams,
    ans: *mut f64,
) -> c_int {
    let required = [
        ("payoffs", payoffs.is_null()),
        ("g", g.is_null()),
        ("zh", zh.is_null()),
        ("ans", ans.is_null()),
    ];
    let sizes = match unsafe { validate(num_players, actions, &required) } {
        Ok(s) => s,
        Err(e) => return finish(entry, Err(e)),
    };
    tracing::debug!(
        entry,
        players = sizes.num_players,
        actions = sizes.num_actions,
        profiles = sizes.num_profiles,
        "game validated"
    );

    catch_unwind(AssertUnwindSafe(|| {
        let result = (|| -> Result<c_int, ShimError> {
            let solver = solver.ok_or_else(|| ShimError::internal("no solver installed"))?;
            let game = unsafe { NormalFormGame::copy_in(sizes, actions, payoffs) }?;
            let m = sizes.actions();
            let ray = unsafe { copy_in_vector(g, m) }?;
            let mut zh_vec = unsafe { copy_in_vector(zh, m) }?;
            let mut ans_vec = zeroed_vector(m)?;

            let ret = ipa_on_game(solver, &game, &ray, &mut zh_vec, &params, &mut ans_vec)?;

            unsafe {
                copy_out(zh, &zh_vec);
                copy_out(ans, &ans_vec);
            }
            Ok(ret)
        })();
        finish(entry, result)
    }))
}

/// Raw GNM flow behind `gnm` and `gametracer_solver_gnm`.
///
/// `*answers` is NULL on every return except a positive count.
///
/// # Safety
/// Pointer arguments must satisfy the length contract of `gnm`.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn gnm_raw<S: EquilibriumSolver + ?Sized>(
    entry: &str,
    solver: Option<&S>,
    num_players: c_int,
    actions: *const c_int,
    payoffs: *const f64,
    g: *const f64,
    answers: *mut *mut f64,
    params: GnmParams,
) -> c_int {
    if !answers.is_null() {
        unsafe { *answers = std::ptr::null_mut() };
    }
    let required = [
        ("payoffs", payoffs.is_null()),
        ("g", g.is_null()),
        ("answers", answers.is_null()),
    ];
    let sizes = match unsafe { validate(num_players, actions, &required) } {
        Ok(s) => s,
        Err(e) => return finish(entry, Err(e)),
    };
    tracing::debug!(
        entry,
        players = sizes.num_players,
        actions = sizes.num_actions,
        profiles = sizes.num_profiles,
        steps = params.steps,
        "game validated"
    );

    catch_unwind(AssertUnwindSafe(|| {
        let result = (|| -> Result<c_int, ShimError> {
            let solver = solver.ok_or_else(|| ShimError::internal("no solver installed"))?;
            let game = unsafe { NormalFormGame::copy_in(sizes, actions, payoffs) }?;
            let ray = unsafe { std::slice::from_raw_parts(g, sizes.actions()) };

            let (found, block) = gnm_on_game(solver, &game, ray, &params)?;
            if let Some(block) = block {
                unsafe { *answers = block.into_raw() };
            }
            Ok(found)
        })();
        finish(entry, result)
    }))
}
