//! Build utilities for noisegraph-wgpu
//!
//! This crate turns the kernel manifest and its WGSL sources into the kernel table that
//! the library embeds. Every shader is parsed and validated with `naga`, checked against
//! the binding layout its manifest entry promises, and optionally minified.

mod minify;

pub mod codegen;
pub mod manifest;

pub use minify::{minify_wgsl, parse_and_validate};

use manifest::{KernelManifest, KernelSpec};

/// Workgroup size every kernel must declare
pub const WORKGROUP_SIZE: [u32; 3] = [8, 8, 1];

/// WGSL source of one manifest file after validation
#[derive(Debug, Clone)]
pub struct CompiledShader {
    /// File path relative to the manifest
    pub file: String,
    /// Source code, minified if requested
    pub source: String,
}

/// Kernels and shader sources ready for code generation
#[derive(Debug, Clone)]
pub struct CompiledKernels {
    pub kernels: Vec<KernelSpec>,
    pub shaders: Vec<CompiledShader>,
}

impl CompiledKernels {
    /// Index into `shaders` of the file a kernel lives in
    pub fn shader_index(&self, kernel: &KernelSpec) -> Option<usize> {
        self.shaders.iter().position(|shader| shader.file == kernel.file)
    }
}

/// Checks that a kernel's entry point exists in the module and that the module's
/// bindings fit the layout the manifest declares
///
/// # Arguments
/// * `kernel` - Manifest entry of the kernel
/// * `module` - Parsed module of the kernel's file
pub fn check_kernel_layout(kernel: &KernelSpec, module: &naga::Module) -> Result<(), std::boxed::Box<dyn std::error::Error>> {
    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.name == kernel.entry_point())
        .ok_or_else(|| format!("Kernel {}: entry point '{}' not found in {}", kernel.name, kernel.entry_point(), kernel.file))?;

    if entry_point.stage != naga::ShaderStage::Compute {
        return Err(format!("Kernel {}: entry point '{}' is not a compute shader", kernel.name, kernel.entry_point()).into());
    }
    if entry_point.workgroup_size != WORKGROUP_SIZE {
        return Err(format!("Kernel {}: workgroup size {:?} (expected {:?})", kernel.name, entry_point.workgroup_size, WORKGROUP_SIZE).into());
    }

    let bindings: Vec<u32> = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| var.binding.as_ref())
        .map(|binding| {
            if binding.group != 0 {
                return Err(format!("Kernel {}: binding {} uses group {} (only group 0 is bound)", kernel.name, binding.binding, binding.group));
            }
            Ok(binding.binding)
        })
        .collect::<Result<_, _>>()?;

    let last_binding = kernel.stops_binding().unwrap_or(kernel.uniform_binding());
    if let Some(binding) = bindings.iter().find(|&&binding| binding > last_binding) {
        return Err(format!("Kernel {}: binding {binding} is outside the declared layout (0..={last_binding})", kernel.name).into());
    }
    for required in [kernel.output_binding(), kernel.uniform_binding()] {
        if !bindings.contains(&required) {
            return Err(format!("Kernel {}: binding {required} is missing", kernel.name).into());
        }
    }

    Ok(())
}

/// Loads a kernel manifest and compiles every shader it references
///
/// # Arguments
/// * `manifest_filepath` - Path to the YAML manifest file
/// * `minify` - Whether to minify the WGSL code
///
/// # Returns
/// The validated kernel list with one compiled source per distinct file
pub fn compile_manifest(manifest_filepath: &str, minify: bool) -> Result<CompiledKernels, std::boxed::Box<dyn std::error::Error>> {
    let manifest = KernelManifest::from_file(manifest_filepath)?;
    let dir = std::path::Path::new(manifest_filepath).parent().unwrap_or(std::path::Path::new("."));

    let mut shaders = Vec::new();
    for file in manifest.files() {
        let path = dir.join(file);
        let code = std::fs::read_to_string(&path).map_err(|e| format!("Error reading file {path:?}: {e}"))?;
        let (module, _) = parse_and_validate(&code).map_err(|e| format!("Invalid WGSL in file {path:?}: {e}"))?;

        for kernel in manifest.kernels.iter().filter(|kernel| kernel.file == file) {
            check_kernel_layout(kernel, &module)?;
        }

        let source = if minify {
            minify_wgsl(&code).map_err(|e| format!("Error minifying WGSL code in file {path:?}: {e}"))?
        } else {
            code
        };
        shaders.push(CompiledShader { file: file.to_string(), source });
    }

    Ok(CompiledKernels {
        kernels: manifest.kernels,
        shaders,
    })
}
