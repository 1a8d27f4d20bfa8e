// MIT License
// Copyright 2025--present gametracer developers

//! Shim-owned copy of a normal-form game.
//!
//! A [`NormalFormGame`] is built by copying the caller's action counts and
//! payoffs into storage owned by the shim. The solver only ever sees that
//! copy, through the `#[repr(C)]` view [`gametracer_game_t`], so nothing it
//! does can reach the caller's arrays.
//!
//! ## Layout
//!
//! | Data | Length | Indexing |
//! |------|--------|----------|
//! | `actions` | `N` | `actions[p]` = action count of player `p` |
//! | `payoffs` | `N * P` | `payoffs[p * P + profile_index(s)]` |
//! | flattened action vector | `M` | `offset[p] + j` = player `p`, action `j` |
//!
//! `profile_index(s) = s0 + s1*a0 + s2*a0*a1 + ...`, so the first player
//! varies fastest.

use std::os::raw::c_int;

use crate::error::{try_vec, ShimError};
use crate::sizes::{GameSizes, SizeError};

/// Borrowed C view of a [`NormalFormGame`], handed to solver callbacks.
///
/// The pointers stay valid for the duration of one solver call only.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct gametracer_game_t {
    /// N.
    pub num_players: c_int,
    /// `N` action counts.
    pub actions: *const c_int,
    /// `N * P` payoffs, player-major.
    pub payoffs: *const f64,
    /// M, length of every flattened action vector.
    pub num_actions: c_int,
    /// P.
    pub num_profiles: c_int,
}

/// A validated game whose arrays are owned by the shim.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalFormGame {
    sizes: GameSizes,
    actions: Vec<c_int>,
    offsets: Vec<usize>,
    payoffs: Vec<f64>,
}

impl NormalFormGame {
    /// Validate and copy a game described by Rust slices.
    pub fn new(actions: &[c_int], payoffs: &[f64]) -> Result<Self, ShimError> {
        let sizes = GameSizes::from_actions(actions)?;
        if payoffs.len() != sizes.payoffs() {
            return Err(SizeError::LengthMismatch {
                expected: sizes.payoffs(),
                got: payoffs.len(),
            }
            .into());
        }
        Self::from_parts(sizes, actions, payoffs)
    }

    /// Copy a game out of caller-owned C arrays.
    ///
    /// # Safety
    /// `sizes` must come from validating `actions`, and `payoffs` must point
    /// to at least `sizes.payoff_len` readable doubles.
    pub(crate) unsafe fn copy_in(
        sizes: GameSizes,
        actions: *const c_int,
        payoffs: *const f64,
    ) -> Result<Self, ShimError> {
        let actions = unsafe { std::slice::from_raw_parts(actions, sizes.players()) };
        let payoffs = unsafe { std::slice::from_raw_parts(payoffs, sizes.payoffs()) };
        Self::from_parts(sizes, actions, payoffs)
    }

    fn from_parts(sizes: GameSizes, actions: &[c_int], payoffs: &[f64]) -> Result<Self, ShimError> {
        let mut owned_actions = try_vec(actions.len())?;
        owned_actions.extend_from_slice(actions);

        let mut offsets = try_vec(actions.len())?;
        let mut acc = 0usize;
        for &a in actions {
            offsets.push(acc);
            acc += a as usize;
        }

        let mut owned_payoffs = try_vec(payoffs.len())?;
        owned_payoffs.extend_from_slice(payoffs);

        Ok(Self {
            sizes,
            actions: owned_actions,
            offsets,
            payoffs: owned_payoffs,
        })
    }

    pub fn sizes(&self) -> GameSizes {
        self.sizes
    }

    pub fn num_players(&self) -> usize {
        self.sizes.players()
    }

    /// M, the length of every flattened action vector for this game.
    pub fn num_actions(&self) -> usize {
        self.sizes.actions()
    }

    pub fn num_profiles(&self) -> usize {
        self.sizes.profiles()
    }

    pub fn actions(&self) -> &[c_int] {
        &self.actions
    }

    pub fn payoffs(&self) -> &[f64] {
        &self.payoffs
    }

    /// Index of player `p`'s first entry in a flattened action vector.
    pub fn action_offset(&self, player: usize) -> Option<usize> {
        self.offsets.get(player).copied()
    }

    /// Position of a pure profile (one action per player) in a payoff block.
    ///
    /// Returns `None` if the profile has the wrong length or an action is
    /// out of range for its player.
    pub fn profile_index(&self, profile: &[usize]) -> Option<usize> {
        if profile.len() != self.actions.len() {
            return None;
        }
        let mut index = 0;
        let mut stride = 1;
        for (&s, &a) in profile.iter().zip(&self.actions) {
            let a = a as usize;
            if s >= a {
                return None;
            }
            index += s * stride;
            stride *= a;
        }
        Some(index)
    }

    /// Payoff to `player` at the given pure profile.
    pub fn payoff(&self, player: usize, profile: &[usize]) -> Option<f64> {
        if player >= self.num_players() {
            return None;
        }
        let idx = self.profile_index(profile)?;
        self.payoffs.get(player * self.num_profiles() + idx).copied()
    }

    /// C view over the owned arrays. Valid while `self` is alive and unmoved.
    pub fn as_ffi(&self) -> gametracer_game_t {
        gametracer_game_t {
            num_players: self.sizes.num_players,
            actions: self.actions.as_ptr(),
            payoffs: self.payoffs.as_ptr(),
            num_actions: self.sizes.num_actions,
            num_profiles: self.sizes.num_profiles,
        }
    }
}

/// Copy `len` doubles from a caller buffer into shim-owned storage.
///
/// # Safety
/// `src` must point to at least `len` readable doubles.
pub(crate) unsafe fn copy_in_vector(src: *const f64, len: usize) -> Result<Vec<f64>, ShimError> {
    let values = unsafe { std::slice::from_raw_parts(src, len) };
    let mut owned = try_vec(len)?;
    owned.extend_from_slice(values);
    Ok(owned)
}

/// A shim-owned vector of `len` zeros.
pub(crate) fn zeroed_vector(len: usize) -> Result<Vec<f64>, ShimError> {
    let mut v = try_vec(len)?;
    v.resize(len, 0.0);
    Ok(v)
}
