//! Build script for focas-sys.
//!
//! 1. Optionally runs `bindgen` on the vendor header (feature `regenerate`).
//! 2. Configures the linker for the vendor `fwlib32` dynamic library.
//!
//! The library is proprietary and never downloaded. When it cannot be
//! located, no link directives are emitted and a warning is printed; crates
//! that only use the simulated transport still build.
//!
//! # Environment variables
//!
//! - `FOCAS_LIB_DIR`: Directory containing `libfwlib32.so` (Linux) or
//!   `fwlib32.lib` (Windows).
//!
//! - `FOCAS_INCLUDE_DIR`: Directory containing `fwlib32.h`. Required with
//!   the `regenerate` feature.
//!
//! - `FOCAS_UPDATE_BINDINGS`: When set alongside the `regenerate` feature,
//!   the generated `bindings.rs` is copied back to `src/bindings.rs`.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=FOCAS_LIB_DIR");
    println!("cargo:rerun-if-env-changed=FOCAS_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=FOCAS_UPDATE_BINDINGS");
    println!("cargo:rerun-if-env-changed=DOCS_RS");

    // docs.rs: no native libs, committed bindings suffice.
    if env::var("DOCS_RS").is_ok() {
        return;
    }

    let target = env::var("TARGET").expect("TARGET not set");

    #[cfg(feature = "regenerate")]
    {
        let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
        let include = env::var("FOCAS_INCLUDE_DIR")
            .expect("FOCAS_INCLUDE_DIR must point at fwlib32.h when `regenerate` is enabled");
        generate_bindings(&std::path::Path::new(&include).join("fwlib32.h"), &out_dir);
    }

    let Some(lib_dir) = locate_library(&target) else {
        println!(
            "cargo:warning=focas-sys: {} not found (set FOCAS_LIB_DIR); skipping link",
            lib_filename(&target)
        );
        return;
    };
    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=dylib=fwlib32");
    println!("cargo:LIB_DIR={}", lib_dir.display());
}

// ===========================================================================
// Bindings generation (only compiled with `regenerate` feature)
// ===========================================================================

/// Run `bindgen` on the header to produce `$OUT_DIR/bindings.rs`.
#[cfg(feature = "regenerate")]
fn generate_bindings(header: &std::path::Path, out_dir: &std::path::Path) {
    let out_file = out_dir.join("bindings.rs");
    println!("cargo:rerun-if-changed={}", header.display());

    let bindings = bindgen::Builder::default()
        .header(header.to_str().expect("path is not valid UTF-8"))
        .use_core()
        .allowlist_function("cnc_startupprocess")
        .allowlist_function("cnc_exitprocess")
        .allowlist_function("cnc_allclibhndl3")
        .allowlist_function("cnc_freelibhndl")
        .allowlist_function("cnc_statinfo")
        .allowlist_function("cnc_sysinfo")
        .allowlist_function("cnc_rdaxisname")
        .allowlist_function("cnc_rdposition")
        .allowlist_function("cnc_exeprgname")
        .allowlist_function("cnc_rdexecprog")
        .allowlist_function("cnc_upstart")
        .allowlist_function("cnc_upload")
        .allowlist_function("cnc_upend")
        .allowlist_function("cnc_actf")
        .allowlist_function("cnc_acts")
        .allowlist_function("cnc_rdalmmsg2")
        .allowlist_function("cnc_upstart4")
        .allowlist_function("cnc_getpath")
        .allowlist_function("cnc_rdparam")
        .allowlist_function("cnc_rdtofs")
        .allowlist_function("cnc_rdspmeter")
        .allowlist_function("cnc_rdspload")
        .allowlist_var("MAX_AXIS")
        .allowlist_var("MAX_SPINDLE")
        .allowlist_var("EW_.*")
        .derive_debug(true)
        .derive_copy(true)
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()
        .expect("bindgen failed to generate bindings from fwlib32.h");

    bindings
        .write_to_file(&out_file)
        .expect("Failed to write bindings.rs");

    if env::var("FOCAS_UPDATE_BINDINGS").is_ok() {
        let manifest =
            PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
        let committed = manifest.join("src").join("bindings.rs");
        std::fs::copy(&out_file, &committed).expect("Failed to copy bindings.rs to src/");
        println!(
            "cargo:warning=Updated committed bindings: {}",
            committed.display()
        );
    }
}

// ===========================================================================
// Library discovery
// ===========================================================================

/// Returns the directory holding the vendor library, if it exists there.
fn locate_library(target: &str) -> Option<PathBuf> {
    let dir = PathBuf::from(env::var_os("FOCAS_LIB_DIR")?);
    dir.join(lib_filename(target)).exists().then_some(dir)
}

fn lib_filename(target: &str) -> &'static str {
    if target.contains("windows") {
        "fwlib32.lib"
    } else {
        "libfwlib32.so"
    }
}
