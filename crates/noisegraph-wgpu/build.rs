//! Build script for noisegraph-wgpu crate
//!
//! Compiles the WGSL kernels listed in `wgsl/kernels.yaml` into `kernels.rs`, a table of
//! minified shader sources and binding layouts embedded directly into the library.

use noisegraph_wgpu_build::{codegen::dump_kernel_table, compile_manifest};

fn main() {
    let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let manifest_path = manifest_dir.join("wgsl").join("kernels.yaml");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=wgsl");

    let manifest_path = manifest_path.to_str().expect("Manifest path is not valid UTF-8");
    let compiled = compile_manifest(manifest_path, true).unwrap_or_else(|e| panic!("Failed to compile kernels from {manifest_path}: {e}"));

    // Write the generated code to the build output directory
    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set");
    let output_path = std::path::PathBuf::from(out_dir).join("kernels.rs");
    std::fs::write(output_path, dump_kernel_table(&compiled)).expect("Failed to write kernels.rs");
}
