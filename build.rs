//! Emits `include/gametracer.h` when the `gen-header` feature is enabled:
//! `cargo build --features gen-header`.

use std::env;
use std::path::{Path, PathBuf};

#[cfg(feature = "gen-header")]
fn write_header(crate_dir: &Path) {
    let config = cbindgen::Config::from_file(crate_dir.join("cbindgen.toml"))
        .expect("cbindgen.toml is missing or malformed");
    let include = crate_dir.join("include");
    std::fs::create_dir_all(&include).expect("cannot create include/");

    cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_config(config)
        .generate()
        .expect("cbindgen could not parse the crate")
        .write_to_file(include.join("gametracer.h"));
}

#[cfg(not(feature = "gen-header"))]
fn write_header(_crate_dir: &Path) {}

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    // Cargo exports one CARGO_FEATURE_* variable per enabled feature.
    if env::var_os("CARGO_FEATURE_GEN_HEADER").is_none() {
        return;
    }
    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("set by cargo"));
    write_header(&crate_dir);
}
