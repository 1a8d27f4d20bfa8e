// MIT License
// Copyright 2025--present gametracer developers

//! The equilibrium solvers as seen from the shim.
//!
//! The numerical kernels (iterated polymatrix approximation and the global
//! Newton method) live outside this crate. The shim only relies on their
//! call contract, captured by [`EquilibriumSolver`]:
//!
//! - **IPA** mutates the work vector `zh` in place and writes one answer.
//!   A positive return is success, `0` means no equilibrium was found, and
//!   anything negative is treated by the shim as an internal error.
//! - **GNM** may scribble on the ray it is given (the shim always hands it a
//!   private copy) and yields `found >= 0` equilibria, each owned by an
//!   [`EquilibriumHandle`] that releases its storage when dropped.
//!
//! **Plugging in a native solver**
//!
//! [`CallbackSolver`] lets a C or C++ host register its kernels as function
//! pointers together with a `void* user_data`, the same way the upstream
//! library is driven from its own command-line tool:
//!
//! 1. The host writes trampolines with the [`IpaCallback`] and
//!    [`GnmCallback`] signatures that unpack the flat arrays and call the
//!    upstream `IPA` / `GNM`.
//! 2. For GNM, the trampoline returns a `malloc`-style array of answer
//!    pointers. The shim calls the [`ReleaseFn`] once per answer and once for
//!    the array itself, on every exit path.
//! 3. An optional [`FreeFn`] destroys `user_data` when the solver is dropped.

use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;

use crate::error::{try_vec, ShimError};
use crate::game::{gametracer_game_t, NormalFormGame};

/// Number of steps GNM takes along the path before giving up.
pub const DEFAULT_GNM_STEPS: c_int = 100;
/// Equilibrium tolerance for GNM.
pub const DEFAULT_GNM_FUZZ: f64 = 1e-12;
/// How often (in steps) GNM runs the local Newton method.
pub const DEFAULT_GNM_LNMFREQ: c_int = 3;
/// Upper bound on local Newton iterations per correction.
pub const DEFAULT_GNM_LNMMAX: c_int = 10;
/// GNM stops once lambda drops below this.
pub const DEFAULT_GNM_LAMBDAMIN: f64 = -10.0;
/// Wobbles disabled.
pub const DEFAULT_GNM_WOBBLE: c_int = 0;
/// Support-change threshold before a wobble.
pub const DEFAULT_GNM_THRESHOLD: f64 = 1e-2;
/// IPA step size.
pub const DEFAULT_IPA_ALPHA: f64 = 0.02;
/// IPA equilibrium tolerance.
pub const DEFAULT_IPA_FUZZ: f64 = 1e-6;

/// Tuning knobs for the global Newton method.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct gametracer_gnm_params_t {
    /// Step budget along the path.
    pub steps: c_int,
    /// Equilibrium tolerance.
    pub fuzz: f64,
    /// Local Newton frequency, in steps.
    pub lnmfreq: c_int,
    /// Maximum local Newton iterations.
    pub lnmmax: c_int,
    /// Lower bound on lambda.
    pub lambdamin: f64,
    /// Non-zero enables wobbles.
    pub wobble: c_int,
    /// Wobble threshold.
    pub threshold: f64,
}

pub type GnmParams = gametracer_gnm_params_t;

impl Default for gametracer_gnm_params_t {
    fn default() -> Self {
        Self {
            steps: DEFAULT_GNM_STEPS,
            fuzz: DEFAULT_GNM_FUZZ,
            lnmfreq: DEFAULT_GNM_LNMFREQ,
            lnmmax: DEFAULT_GNM_LNMMAX,
            lambdamin: DEFAULT_GNM_LAMBDAMIN,
            wobble: DEFAULT_GNM_WOBBLE,
            threshold: DEFAULT_GNM_THRESHOLD,
        }
    }
}

/// Tuning knobs for iterated polymatrix approximation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct gametracer_ipa_params_t {
    /// Step size of the polymatrix iteration.
    pub alpha: f64,
    /// Equilibrium tolerance.
    pub fuzz: f64,
}

pub type IpaParams = gametracer_ipa_params_t;

impl Default for gametracer_ipa_params_t {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_IPA_ALPHA,
            fuzz: DEFAULT_IPA_FUZZ,
        }
    }
}

/// IPA kernel: `(user_data, game, ray[M], zh[M] in/out, alpha, fuzz, ans[M] out) -> ret`.
pub type IpaCallback = unsafe extern "C" fn(
    user_data: *mut c_void,
    game: *const gametracer_game_t,
    ray: *const f64,
    zh: *mut f64,
    alpha: f64,
    fuzz: f64,
    ans: *mut f64,
) -> c_int;

/// GNM kernel. On a positive return, `*answers` must hold an array of that
/// many pointers, each to `M` doubles.
pub type GnmCallback = unsafe extern "C" fn(
    user_data: *mut c_void,
    game: *const gametracer_game_t,
    ray: *mut f64,
    params: *const gametracer_gnm_params_t,
    answers: *mut *mut *mut f64,
) -> c_int;

/// Releases one allocation handed out by a [`GnmCallback`].
pub type ReleaseFn = unsafe extern "C" fn(user_data: *mut c_void, ptr: *mut c_void);

/// Destructor for the user_data pointer.
pub type FreeFn = unsafe extern "C" fn(*mut c_void);

enum Storage {
    Owned(Vec<f64>),
    Foreign {
        ptr: NonNull<f64>,
        len: usize,
        release: ReleaseFn,
        user_data: *mut c_void,
    },
}

/// One equilibrium produced by GNM. Dropping the handle releases it.
pub struct EquilibriumHandle {
    storage: Storage,
}

impl EquilibriumHandle {
    /// Wrap an equilibrium computed in Rust.
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            storage: Storage::Owned(values),
        }
    }

    /// Take ownership of an answer allocated by a native kernel.
    ///
    /// Returns `None` for a NULL `ptr`; there is nothing to release then.
    ///
    /// # Safety
    /// `ptr` must be NULL or point to `len` readable doubles that stay valid
    /// until `release(user_data, ptr)` is called, which happens exactly once,
    /// when the handle is dropped.
    pub unsafe fn from_foreign(
        ptr: *mut f64,
        len: usize,
        release: ReleaseFn,
        user_data: *mut c_void,
    ) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self {
            storage: Storage::Foreign {
                ptr,
                len,
                release,
                user_data,
            },
        })
    }

    pub fn values(&self) -> &[f64] {
        match &self.storage {
            Storage::Owned(v) => v,
            Storage::Foreign { ptr, len, .. } => unsafe {
                std::slice::from_raw_parts(ptr.as_ptr(), *len)
            },
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for EquilibriumHandle {
    fn drop(&mut self) {
        if let Storage::Foreign {
            ptr,
            release,
            user_data,
            ..
        } = &self.storage
        {
            unsafe { (*release)(*user_data, ptr.as_ptr().cast()) };
        }
    }
}

impl std::fmt::Debug for EquilibriumHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EquilibriumHandle").field(&self.values()).finish()
    }
}

/// Raw GNM result: the count as returned by the kernel plus the answers.
///
/// `equilibria.len()` is expected to equal `found` when `found > 0`; the
/// shim checks this before marshalling.
#[derive(Debug)]
pub struct GnmOutcome {
    pub found: c_int,
    pub equilibria: Vec<EquilibriumHandle>,
}

impl GnmOutcome {
    /// No equilibrium found.
    pub fn none() -> Self {
        Self {
            found: 0,
            equilibria: Vec::new(),
        }
    }

    /// A well-formed outcome for the given answers.
    pub fn from_handles(equilibria: Vec<EquilibriumHandle>) -> Self {
        Self {
            found: c_int::try_from(equilibria.len()).unwrap_or(c_int::MAX),
            equilibria,
        }
    }
}

/// The call contract of the external IPA and GNM kernels.
///
/// Every vector argument has length `game.num_actions()`.
pub trait EquilibriumSolver {
    /// Run IPA from ray `ray`, updating `zh` and writing the answer to `ans`.
    fn ipa(
        &self,
        game: &NormalFormGame,
        ray: &[f64],
        zh: &mut [f64],
        params: &IpaParams,
        ans: &mut [f64],
    ) -> Result<c_int, ShimError>;

    /// Run GNM along `ray`, which the kernel may modify.
    fn gnm(
        &self,
        game: &NormalFormGame,
        ray: &mut [f64],
        params: &GnmParams,
    ) -> Result<GnmOutcome, ShimError>;
}

impl<S: EquilibriumSolver + ?Sized> EquilibriumSolver for &S {
    fn ipa(
        &self,
        game: &NormalFormGame,
        ray: &[f64],
        zh: &mut [f64],
        params: &IpaParams,
        ans: &mut [f64],
    ) -> Result<c_int, ShimError> {
        (**self).ipa(game, ray, zh, params, ans)
    }

    fn gnm(
        &self,
        game: &NormalFormGame,
        ray: &mut [f64],
        params: &GnmParams,
    ) -> Result<GnmOutcome, ShimError> {
        (**self).gnm(game, ray, params)
    }
}

/// Solver backed by C function pointers and an opaque `user_data`.
pub struct CallbackSolver {
    pub(crate) ipa: Option<IpaCallback>,
    pub(crate) gnm: Option<GnmCallback>,
    pub(crate) release: ReleaseFn,
    pub(crate) user_data: *mut c_void,
    pub(crate) free_fn: Option<FreeFn>,
}

// The handle only carries function pointers and `user_data`; whether the
// kernels behind them tolerate concurrent calls is up to the host.
unsafe impl Send for CallbackSolver {}
unsafe impl Sync for CallbackSolver {}

impl CallbackSolver {
    /// Create a solver from kernel callbacks. A missing kernel makes the
    /// corresponding entry point fail with an internal error.
    pub fn new(
        ipa: Option<IpaCallback>,
        gnm: Option<GnmCallback>,
        release: ReleaseFn,
        user_data: *mut c_void,
        free_fn: Option<FreeFn>,
    ) -> Self {
        Self {
            ipa,
            gnm,
            release,
            user_data,
            free_fn,
        }
    }

    /// Release every non-null entry of a GNM answer array, then the array.
    unsafe fn release_all(&self, list: *mut *mut f64, entries: &[*mut f64]) {
        for &p in entries {
            if !p.is_null() {
                unsafe { (self.release)(self.user_data, p.cast()) };
            }
        }
        unsafe { (self.release)(self.user_data, list.cast()) };
    }
}

impl Drop for CallbackSolver {
    fn drop(&mut self) {
        if let Some(free) = self.free_fn {
            if !self.user_data.is_null() {
                unsafe { free(self.user_data) };
            }
        }
    }
}

impl EquilibriumSolver for CallbackSolver {
    fn ipa(
        &self,
        game: &NormalFormGame,
        ray: &[f64],
        zh: &mut [f64],
        params: &IpaParams,
        ans: &mut [f64],
    ) -> Result<c_int, ShimError> {
        let kernel = self
            .ipa
            .ok_or_else(|| ShimError::internal("solver has no IPA kernel"))?;
        let view = game.as_ffi();
        let ret = unsafe {
            kernel(
                self.user_data,
                &view,
                ray.as_ptr(),
                zh.as_mut_ptr(),
                params.alpha,
                params.fuzz,
                ans.as_mut_ptr(),
            )
        };
        Ok(ret)
    }

    fn gnm(
        &self,
        game: &NormalFormGame,
        ray: &mut [f64],
        params: &GnmParams,
    ) -> Result<GnmOutcome, ShimError> {
        let kernel = self
            .gnm
            .ok_or_else(|| ShimError::internal("solver has no GNM kernel"))?;
        let view = game.as_ffi();
        let mut list: *mut *mut f64 = std::ptr::null_mut();
        let found = unsafe { kernel(self.user_data, &view, ray.as_mut_ptr(), params, &mut list) };

        if found <= 0 {
            if !list.is_null() {
                unsafe { (self.release)(self.user_data, list.cast()) };
            }
            return Ok(GnmOutcome {
                found,
                equilibria: Vec::new(),
            });
        }
        if list.is_null() {
            return Err(ShimError::internal(format!(
                "GNM kernel reported {found} equilibria but returned no answers"
            )));
        }

        let entries = unsafe { std::slice::from_raw_parts(list, found as usize) };
        let mut equilibria = match try_vec(entries.len()) {
            Ok(v) => v,
            Err(e) => {
                unsafe { self.release_all(list, entries) };
                return Err(e);
            }
        };

        let m = game.num_actions();
        let mut missing = 0usize;
        for &p in entries {
            match unsafe { EquilibriumHandle::from_foreign(p, m, self.release, self.user_data) } {
                Some(h) => equilibria.push(h),
                None => missing += 1,
            }
        }
        unsafe { (self.release)(self.user_data, list.cast()) };

        if missing > 0 {
            // `equilibria` drops here and releases the answers it holds.
            return Err(ShimError::internal(format!(
                "GNM kernel returned {missing} NULL answers out of {found}"
            )));
        }
        Ok(GnmOutcome { found, equilibria })
    }
}

/// Opaque solver handle exposed to C as `gametracer_solver_t`.
pub type gametracer_solver_t = CallbackSolver;
