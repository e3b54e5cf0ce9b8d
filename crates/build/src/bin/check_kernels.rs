//! Kernel manifest checker
//!
//! Loads a kernel manifest, validates every shader it references and prints the kernel
//! table. With `--json` the parsed manifest is dumped as JSON instead.

use noisegraph_wgpu_build::{compile_manifest, manifest::KernelManifest};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    let (manifest_path, json) = match args.as_slice() {
        [_, path] => (path, false),
        [_, flag, path] if flag == "--json" => (path, true),
        _ => {
            eprintln!("Usage: {} [--json] <kernels.yaml>", args[0]);
            eprintln!("Validates every kernel in the manifest and prints a summary");
            process::exit(1);
        }
    };

    if json {
        match KernelManifest::from_file(manifest_path).and_then(|manifest| Ok(serde_json::to_string_pretty(&manifest)?)) {
            Ok(dump) => println!("{dump}"),
            Err(e) => {
                eprintln!("Error reading manifest '{manifest_path}': {e}");
                process::exit(1);
            }
        }
        return;
    }

    match compile_manifest(manifest_path, true) {
        Ok(compiled) => {
            for kernel in &compiled.kernels {
                let stops = if kernel.stops { " +stops" } else { "" };
                println!("{:<28} {:<18} inputs={}{stops}", kernel.name, kernel.file, kernel.inputs);
            }
            let bytes: usize = compiled.shaders.iter().map(|shader| shader.source.len()).sum();
            println!("{} kernels in {} files ({bytes} bytes minified)", compiled.kernels.len(), compiled.shaders.len());
        }
        Err(e) => {
            eprintln!("Error compiling manifest '{manifest_path}': {e}");
            process::exit(1);
        }
    }
}
