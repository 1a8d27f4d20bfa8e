// MIT License
// Copyright 2025--present gametracer developers

//! Size queries and parameter defaults for C callers.
//!
//! `gametracer_game_sizes` lets a host size its buffers with exactly the
//! checks the solver entry points apply, before allocating anything:
//!
//! ```c
//! gametracer_game_sizes_t sz;
//! if (gametracer_game_sizes(n, actions, &sz) != 0) { /* reject the game */ }
//! double *zh  = malloc(sz.num_actions * sizeof(double));
//! double *pay = malloc(sz.payoff_len  * sizeof(double));
//! ```

use std::os::raw::c_int;

use crate::error::ShimError;
use crate::sizes::{gametracer_game_sizes_t, GameSizes};
use crate::solver::{gametracer_gnm_params_t, gametracer_ipa_params_t};
use crate::status::{clear_last_error, set_last_error_fmt};

/// Validate a game's dimensions and report N, M, P and the payoff length.
///
/// Returns 0 and fills `*out` on success. Returns -1 (leaving `*out`
/// untouched) for a non-positive player count, NULL `actions` or `out`, a
/// non-positive action count, or any size that overflows an `int`.
///
/// # Safety
/// `actions` must be NULL or point to `num_players` ints; `out` must be
/// NULL or writable.
#[no_mangle]
pub unsafe extern "C" fn gametracer_game_sizes(
    num_players: c_int,
    actions: *const c_int,
    out: *mut gametracer_game_sizes_t,
) -> c_int {
    let result = unsafe { GameSizes::from_raw(num_players, actions) }
        .map_err(ShimError::from)
        .and_then(|sz| {
            if out.is_null() {
                Err(ShimError::NullArgument("out"))
            } else {
                Ok(sz)
            }
        });
    match result {
        Ok(sz) => {
            unsafe { *out = sz };
            clear_last_error();
            0
        }
        Err(e) => {
            set_last_error_fmt(format_args!("gametracer_game_sizes: {e}"));
            e.code()
        }
    }
}

/// GNM parameters used by the GameTracer command-line driver.
#[no_mangle]
pub extern "C" fn gametracer_gnm_params_default() -> gametracer_gnm_params_t {
    gametracer_gnm_params_t::default()
}

/// IPA parameters used by the GameTracer command-line driver.
#[no_mangle]
pub extern "C" fn gametracer_ipa_params_default() -> gametracer_ipa_params_t {
    gametracer_ipa_params_t::default()
}
