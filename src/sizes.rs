// MIT License
// Copyright 2025--present gametracer developers

//! Game dimension checks performed before anything is allocated.
//!
//! From the per-player action counts `a_0 .. a_{N-1}` three quantities are
//! derived:
//!
//! | Symbol | Meaning | Formula |
//! |--------|---------|---------|
//! | `M` | total actions, length of every flattened action vector | `sum a_p` |
//! | `P` | pure-profile count | `prod a_p` |
//! | `N*P` | payoff array length | `N * P` |
//!
//! Each of them must fit in a C `int`. The running sum and product are
//! bounds-checked at every step, so overflow is reported as a
//! [`SizeError`] and never wraps.

use std::os::raw::c_int;

use thiserror::Error;

/// Reasons a game description is rejected before any computation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SizeError {
    #[error("num_players must be positive, got {0}")]
    NoPlayers(c_int),
    #[error("more players than a C int can count")]
    TooManyPlayers,
    #[error("actions is NULL")]
    NullActions,
    #[error("player {player} has {count} actions; every player needs at least one")]
    NonPositiveActions { player: usize, count: c_int },
    #[error("total action count overflows a C int at player {player}")]
    ActionCountOverflow { player: usize },
    #[error("pure-profile count overflows a C int at player {player}")]
    ProfileCountOverflow { player: usize },
    #[error("payoff length num_players * profiles overflows a C int")]
    PayoffLengthOverflow,
    #[error("expected {expected} values, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

/// Validated dimensions of a game.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct gametracer_game_sizes_t {
    /// N, number of players.
    pub num_players: c_int,
    /// M, sum of the action counts.
    pub num_actions: c_int,
    /// P, product of the action counts.
    pub num_profiles: c_int,
    /// N * P, length of the payoff array.
    pub payoff_len: c_int,
}

/// Rust-side name for [`gametracer_game_sizes_t`].
pub type GameSizes = gametracer_game_sizes_t;

impl gametracer_game_sizes_t {
    /// Validate a slice of action counts, one per player.
    pub fn from_actions(actions: &[c_int]) -> Result<Self, SizeError> {
        let n = c_int::try_from(actions.len()).map_err(|_| SizeError::TooManyPlayers)?;
        if n == 0 {
            return Err(SizeError::NoPlayers(0));
        }

        let mut m: c_int = 0;
        let mut p: c_int = 1;
        for (player, &count) in actions.iter().enumerate() {
            if count <= 0 {
                return Err(SizeError::NonPositiveActions { player, count });
            }
            m = m
                .checked_add(count)
                .ok_or(SizeError::ActionCountOverflow { player })?;
            p = p
                .checked_mul(count)
                .ok_or(SizeError::ProfileCountOverflow { player })?;
        }
        let payoff_len = n.checked_mul(p).ok_or(SizeError::PayoffLengthOverflow)?;

        Ok(Self {
            num_players: n,
            num_actions: m,
            num_profiles: p,
            payoff_len,
        })
    }

    /// Validate the raw `(num_players, actions)` pair received from C.
    ///
    /// # Safety
    /// If `num_players > 0` and `actions` is non-null, `actions` must point to
    /// at least `num_players` readable `int`s.
    pub unsafe fn from_raw(num_players: c_int, actions: *const c_int) -> Result<Self, SizeError> {
        if num_players <= 0 {
            return Err(SizeError::NoPlayers(num_players));
        }
        if actions.is_null() {
            return Err(SizeError::NullActions);
        }
        let counts = unsafe { std::slice::from_raw_parts(actions, num_players as usize) };
        Self::from_actions(counts)
    }

    pub fn players(&self) -> usize {
        self.num_players as usize
    }

    /// M as a length.
    pub fn actions(&self) -> usize {
        self.num_actions as usize
    }

    /// P as a length.
    pub fn profiles(&self) -> usize {
        self.num_profiles as usize
    }

    pub fn payoffs(&self) -> usize {
        self.payoff_len as usize
    }
}
