// MIT License
// Copyright 2025--present gametracer developers

//! End-to-end checks of the exported C ABI through the installed solver.
//!
//! The installed solver is process-wide, so every test takes `SERIAL`.

use std::ffi::CStr;
use std::os::raw::{c_int, c_void};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use gametracer_core::c_api::equilibrium::{gametracer_free, gnm, ipa};
use gametracer_core::c_api::solver::{gametracer_install_solver, gametracer_solver_new};
use gametracer_core::game::gametracer_game_t;
use gametracer_core::solver::gametracer_gnm_params_t;
use gametracer_core::status::gametracer_last_error;
use parking_lot::Mutex;

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

static KERNEL_CALLS: AtomicUsize = AtomicUsize::new(0);
static RELEASES: AtomicUsize = AtomicUsize::new(0);
/// How many equilibria the GNM kernel reports.
static GNM_FOUND: AtomicI32 = AtomicI32::new(0);
/// What the IPA kernel returns.
static IPA_RET: AtomicI32 = AtomicI32::new(1);

unsafe extern "C" fn release(_ud: *mut c_void, ptr: *mut c_void) {
    RELEASES.fetch_add(1, Ordering::SeqCst);
    unsafe { libc::free(ptr) };
}

/// IPA kernel: halves the work vector, answers with the uniform profile of
/// each player.
unsafe extern "C" fn ipa_kernel(
    _ud: *mut c_void,
    game: *const gametracer_game_t,
    _ray: *const f64,
    zh: *mut f64,
    _alpha: f64,
    _fuzz: f64,
    ans: *mut f64,
) -> c_int {
    KERNEL_CALLS.fetch_add(1, Ordering::SeqCst);
    let game = unsafe { &*game };
    let actions = unsafe { std::slice::from_raw_parts(game.actions, game.num_players as usize) };
    let m = game.num_actions as usize;
    let zh = unsafe { std::slice::from_raw_parts_mut(zh, m) };
    let ans = unsafe { std::slice::from_raw_parts_mut(ans, m) };
    zh.iter_mut().for_each(|z| *z /= 2.0);
    let mut i = 0;
    for &a in actions {
        for _ in 0..a {
            ans[i] = 1.0 / a as f64;
            i += 1;
        }
    }
    IPA_RET.load(Ordering::SeqCst)
}

/// GNM kernel: equilibrium k is `ray + k`; scribbles over the ray.
unsafe extern "C" fn gnm_kernel(
    _ud: *mut c_void,
    game: *const gametracer_game_t,
    ray: *mut f64,
    _params: *const gametracer_gnm_params_t,
    answers: *mut *mut *mut f64,
) -> c_int {
    KERNEL_CALLS.fetch_add(1, Ordering::SeqCst);
    let m = unsafe { (*game).num_actions } as usize;
    let ray = unsafe { std::slice::from_raw_parts_mut(ray, m) };
    let found = GNM_FOUND.load(Ordering::SeqCst);
    if found > 0 {
        let k_max = found as usize;
        let list =
            unsafe { libc::malloc(k_max * std::mem::size_of::<*mut f64>()) } as *mut *mut f64;
        for k in 0..k_max {
            let row = unsafe { libc::malloc(m * std::mem::size_of::<f64>()) } as *mut f64;
            for (i, g) in ray.iter().enumerate() {
                unsafe { *row.add(i) = g + k as f64 };
            }
            unsafe { *list.add(k) = row };
        }
        unsafe { *answers = list };
    }
    ray.iter_mut().for_each(|g| *g = 0.0);
    found
}

struct Installed;

impl Installed {
    fn new() -> Self {
        KERNEL_CALLS.store(0, Ordering::SeqCst);
        RELEASES.store(0, Ordering::SeqCst);
        GNM_FOUND.store(0, Ordering::SeqCst);
        IPA_RET.store(1, Ordering::SeqCst);
        let solver = unsafe {
            gametracer_solver_new(
                Some(ipa_kernel),
                Some(gnm_kernel),
                Some(release),
                std::ptr::null_mut(),
                None,
            )
        };
        assert!(!solver.is_null());
        unsafe { gametracer_install_solver(solver) };
        Installed
    }
}

impl Drop for Installed {
    fn drop(&mut self) {
        unsafe { gametracer_install_solver(std::ptr::null_mut()) };
    }
}

fn last_error() -> String {
    let ptr = unsafe { gametracer_last_error() };
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

const ACTIONS: [c_int; 2] = [3, 2];
const M: usize = 5;

fn payoffs() -> Vec<f64> {
    (0..12).map(|v| v as f64 * 0.5).collect()
}

fn ray() -> [f64; M] {
    [0.5, 0.25, 0.125, 0.0625, 0.03125]
}

unsafe fn call_gnm(actions: &[c_int], payoffs: &[f64], g: &[f64], answers: &mut *mut f64) -> c_int {
    unsafe {
        gnm(
            actions.len() as c_int,
            actions.as_ptr(),
            payoffs.as_ptr(),
            g.as_ptr(),
            answers,
            100,
            1e-12,
            3,
            10,
            -10.0,
            0,
            1e-2,
        )
    }
}

#[test]
fn gnm_returns_rows_at_row_times_m() {
    let _lock = SERIAL.lock();
    let _solver = Installed::new();
    GNM_FOUND.store(3, Ordering::SeqCst);

    let p = payoffs();
    let g = ray();
    let mut answers = std::ptr::null_mut();
    let n = unsafe { call_gnm(&ACTIONS, &p, &g, &mut answers) };
    assert_eq!(n, 3);
    assert!(!answers.is_null());

    let block = unsafe { std::slice::from_raw_parts(answers, 3 * M) };
    for row in 0..3 {
        for i in 0..M {
            assert_eq!(block[row * M + i], g[i] + row as f64);
        }
    }
    // 3 answers + the answer array, all released before returning
    assert_eq!(RELEASES.load(Ordering::SeqCst), 4);
    // the kernel zeroed its own copy of the ray, not ours
    assert_eq!(g, ray());
    assert_eq!(p, payoffs());
    assert_eq!(last_error(), "");

    unsafe { gametracer_free(answers.cast()) };
}

#[test]
fn gnm_zero_equilibria_sets_null() {
    let _lock = SERIAL.lock();
    let _solver = Installed::new();

    let p = payoffs();
    let g = ray();
    let mut answers = 0x40 as *mut f64;
    let n = unsafe { call_gnm(&ACTIONS, &p, &g, &mut answers) };
    assert_eq!(n, 0);
    assert!(answers.is_null());
    unsafe { gametracer_free(answers.cast()) };
}

#[test]
fn gnm_negative_count_is_internal_error() {
    let _lock = SERIAL.lock();
    let _solver = Installed::new();
    GNM_FOUND.store(-4, Ordering::SeqCst);

    let p = payoffs();
    let g = ray();
    let mut answers = std::ptr::null_mut();
    let n = unsafe { call_gnm(&ACTIONS, &p, &g, &mut answers) };
    assert_eq!(n, -3);
    assert!(answers.is_null());
    assert_eq!(last_error(), "gnm: internal error: GNM returned unexpected count -4");
}

#[test]
fn invalid_action_counts_are_rejected_by_both_entry_points() {
    let _lock = SERIAL.lock();
    let _solver = Installed::new();

    let p = payoffs();
    let g = ray();
    let mut zh = [1.0; M];
    let mut ans = [0.0; M];

    for bad in [[3, 0], [-1, 2], [0, 0]] {
        let mut answers = 0x40 as *mut f64;
        assert_eq!(unsafe { call_gnm(&bad, &p, &g, &mut answers) }, -1);
        assert!(answers.is_null());

        let r = unsafe {
            ipa(
                2,
                bad.as_ptr(),
                p.as_ptr(),
                g.as_ptr(),
                zh.as_mut_ptr(),
                0.02,
                1e-6,
                ans.as_mut_ptr(),
            )
        };
        assert_eq!(r, -1);
    }

    let mut answers = std::ptr::null_mut();
    let r = unsafe {
        gnm(
            2,
            std::ptr::null(),
            p.as_ptr(),
            g.as_ptr(),
            &mut answers,
            100,
            1e-12,
            3,
            10,
            -10.0,
            0,
            1e-2,
        )
    };
    assert_eq!(r, -1);
    let r = unsafe {
        ipa(
            2,
            std::ptr::null(),
            p.as_ptr(),
            g.as_ptr(),
            zh.as_mut_ptr(),
            0.02,
            1e-6,
            ans.as_mut_ptr(),
        )
    };
    assert_eq!(r, -1);

    assert_eq!(KERNEL_CALLS.load(Ordering::SeqCst), 0);
    assert_eq!(zh, [1.0; M]);
}

#[test]
fn overflowing_games_never_reach_the_solver() {
    let _lock = SERIAL.lock();
    let _solver = Installed::new();

    let dummy = [0.0; 1];
    // P = 2^32
    let profiles = [65536, 65536];
    // P = 2^30 but N * P = 2^31
    let payoff_len = [32768, 32768];
    for actions in [profiles, payoff_len] {
        let mut answers = std::ptr::null_mut();
        assert_eq!(unsafe { call_gnm(&actions, &dummy, &dummy, &mut answers) }, -1);
        assert!(answers.is_null());
    }
    assert_eq!(KERNEL_CALLS.load(Ordering::SeqCst), 0);
    assert!(last_error().contains("overflows"));
}

#[test]
fn ipa_writes_work_and_answer_buffers() {
    let _lock = SERIAL.lock();
    let _solver = Installed::new();

    let p = payoffs();
    let g = ray();
    let mut zh = [1.0; M];
    let mut ans = [f64::NAN, 42.0, -1.0, f64::INFINITY, 7.0];
    let r = unsafe {
        ipa(
            2,
            ACTIONS.as_ptr(),
            p.as_ptr(),
            g.as_ptr(),
            zh.as_mut_ptr(),
            0.02,
            1e-6,
            ans.as_mut_ptr(),
        )
    };
    assert_eq!(r, 1);
    assert_eq!(zh, [0.5; M]);
    assert_eq!(ans, [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 0.5, 0.5]);
    assert_eq!(g, ray());
}

#[test]
fn ipa_no_equilibrium_and_unexpected_returns() {
    let _lock = SERIAL.lock();
    let _solver = Installed::new();

    let p = payoffs();
    let g = ray();
    let mut zh = [1.0; M];
    let mut ans = [0.0; M];

    IPA_RET.store(0, Ordering::SeqCst);
    let r = unsafe {
        ipa(
            2,
            ACTIONS.as_ptr(),
            p.as_ptr(),
            g.as_ptr(),
            zh.as_mut_ptr(),
            0.02,
            1e-6,
            ans.as_mut_ptr(),
        )
    };
    assert_eq!(r, 0);

    IPA_RET.store(-2, Ordering::SeqCst);
    let r = unsafe {
        ipa(
            2,
            ACTIONS.as_ptr(),
            p.as_ptr(),
            g.as_ptr(),
            zh.as_mut_ptr(),
            0.02,
            1e-6,
            ans.as_mut_ptr(),
        )
    };
    assert_eq!(r, -3);
}

#[test]
fn nothing_installed_is_internal_error() {
    let _lock = SERIAL.lock();
    unsafe { gametracer_install_solver(std::ptr::null_mut()) };

    let p = payoffs();
    let g = ray();
    let mut answers = std::ptr::null_mut();
    assert_eq!(unsafe { call_gnm(&ACTIONS, &p, &g, &mut answers) }, -3);
    assert!(answers.is_null());
    assert_eq!(last_error(), "gnm: internal error: no solver installed");
}

#[test]
fn free_accepts_null() {
    unsafe { gametracer_free(std::ptr::null_mut()) };
}
