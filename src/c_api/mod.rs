// MIT License
// Copyright 2025--present gametracer developers

//! Public C API entry points.
//!
//! Each submodule exposes `extern "C"` functions that cbindgen collects into
//! `include/gametracer.h`. The entry points share three rules:
//!
//! 1. **Return an `int`**: the solver's non-negative result, or a negative
//!    [`gametracer_status_t`](crate::status::gametracer_status_t) code.
//! 2. **Validate first**: pointer and size checks run before anything is
//!    allocated and report `-1`.
//! 3. **Never unwind**: everything after validation runs inside
//!    [`catch_unwind`](crate::status::catch_unwind), and failures leave a
//!    message for `gametracer_last_error()`.
//!
//! ## Submodules
//!
//! - [`equilibrium`]: `ipa`, `gnm`, their explicit-solver variants, and
//!   `gametracer_free` for the buffers `gnm` hands out.
//! - [`solver`]: lifecycle of
//!   [`gametracer_solver_t`](crate::solver::gametracer_solver_t) handles and
//!   installation of the solver behind `ipa` / `gnm`.
//! - [`types`]: size queries and parameter defaults.

pub mod equilibrium;
pub mod solver;
pub mod types;
