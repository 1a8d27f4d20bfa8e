// MIT License
// Copyright 2025--present gametracer developers

//! # gametracer-core
//!
//! A C ABI boundary around the GameTracer equilibrium solvers: iterated
//! polymatrix approximation (IPA) and the global Newton method (GNM).
//!
//! The crate does not solve games itself. It validates a flat, C-friendly
//! description of an N-player normal-form game, copies it into storage it
//! owns, hands it to the solver kernels, and copies the answers back, so
//! that hosts in any language get:
//!
//! - sizes checked for overflow before anything is allocated,
//! - no aliasing between solver state and caller buffers,
//! - no panic or failure escaping the boundary, only documented codes,
//! - one clear owner for every buffer that outlives a call.
//!
//! ## Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`sizes`] | action/profile/payoff counts with overflow checks |
//! | [`game`] | shim-owned game copy and layout helpers |
//! | [`solver`] | kernel call contract, parameters, callback-backed solver |
//! | [`marshal`] | result block allocation and copy-back |
//! | [`boundary`] | the IPA/GNM flows and failure translation |
//! | [`status`] | return codes, last-error slot, panic guard |
//! | [`c_api`] | exported `extern "C"` functions |
//!
//! ## Return codes
//!
//! | Value | Meaning |
//! |-------|---------|
//! | `> 0` | success (IPA) / number of equilibria (GNM) |
//! | `0` | no equilibrium found |
//! | `-1` | invalid arguments or size overflow |
//! | `-2` | allocation failure |
//! | `-3` | any other internal failure |

#![allow(non_camel_case_types)]

pub mod boundary;
pub mod c_api;
pub mod error;
pub mod game;
pub mod marshal;
pub mod sizes;
pub mod solver;
pub mod status;

pub use boundary::{gnm_on_game, ipa_on_game};
pub use error::ShimError;
pub use game::NormalFormGame;
pub use marshal::ResultBlock;
pub use sizes::{GameSizes, SizeError};
pub use solver::{
    CallbackSolver, EquilibriumHandle, EquilibriumSolver, GnmOutcome, GnmParams, IpaParams,
};
pub use status::gametracer_status_t;
