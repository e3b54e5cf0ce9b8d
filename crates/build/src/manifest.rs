//! Kernel Manifest Parser
//!
//! This module parses and validates the YAML manifest that lists every compute kernel
//! the library embeds. Each entry names the kernel, the WGSL file it lives in and the
//! shape of its binding layout.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Upper bound on texture inputs; selectors use three.
pub const MAX_KERNEL_INPUTS: u32 = 3;

/// One kernel entry of the manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KernelSpec {
    /// Name the library resolves kernels by
    pub name: String,
    /// WGSL file path relative to the manifest
    pub file: String,
    /// Entry point inside the file (defaults to the kernel name)
    #[serde(default)]
    pub entry: Option<String>,
    /// Number of sampled texture inputs, bound at `0..inputs`
    pub inputs: u32,
    /// Whether the kernel reads a colour-stop storage buffer at binding `inputs + 2`
    #[serde(default)]
    pub stops: bool,
}

impl KernelSpec {
    /// Returns the entry point name, falling back to the kernel name
    pub fn entry_point(&self) -> &str {
        self.entry.as_deref().unwrap_or(&self.name)
    }

    /// Binding index of the storage output texture
    pub fn output_binding(&self) -> u32 {
        self.inputs
    }

    /// Binding index of the uniform parameter block
    pub fn uniform_binding(&self) -> u32 {
        self.inputs + 1
    }

    /// Binding index of the colour-stop buffer, if the kernel has one
    pub fn stops_binding(&self) -> Option<u32> {
        self.stops.then_some(self.inputs + 2)
    }
}

/// The kernel manifest as parsed from YAML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KernelManifest {
    pub kernels: Vec<KernelSpec>,
}

impl KernelManifest {
    /// Parses and validates a manifest from YAML content
    ///
    /// # Arguments
    /// * `yaml_content` - YAML string containing the manifest
    pub fn from_yaml(yaml_content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let manifest: Self = serde_norway::from_str(yaml_content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parses and validates a manifest from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML manifest file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Checks structural rules that serde cannot express
    pub fn validate(&self) -> Result<(), ManifestValidationError> {
        if self.kernels.is_empty() {
            return Err(ManifestValidationError::Empty);
        }

        let mut seen = HashSet::new();
        for kernel in &self.kernels {
            if kernel.name.is_empty() {
                return Err(ManifestValidationError::EmptyName);
            }
            if !seen.insert(kernel.name.as_str()) {
                return Err(ManifestValidationError::DuplicateKernel(kernel.name.clone()));
            }
            if kernel.inputs > MAX_KERNEL_INPUTS {
                return Err(ManifestValidationError::TooManyInputs {
                    kernel: kernel.name.clone(),
                    inputs: kernel.inputs,
                });
            }
        }

        Ok(())
    }

    /// Returns the distinct shader files in manifest order
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for kernel in &self.kernels {
            if !files.contains(&kernel.file.as_str()) {
                files.push(kernel.file.as_str());
            }
        }
        files
    }
}

/// Errors found while validating a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestValidationError {
    /// The manifest lists no kernels
    Empty,
    /// A kernel has an empty name
    EmptyName,
    /// Two kernels share a name
    DuplicateKernel(String),
    /// A kernel declares more texture inputs than any node kind uses
    TooManyInputs { kernel: String, inputs: u32 },
}

impl fmt::Display for ManifestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Manifest contains no kernels"),
            Self::EmptyName => write!(f, "Kernel name cannot be empty"),
            Self::DuplicateKernel(name) => write!(f, "Duplicate kernel name: {name}"),
            Self::TooManyInputs { kernel, inputs } => write!(f, "Kernel {kernel} declares {inputs} inputs (at most {MAX_KERNEL_INPUTS} allowed)"),
        }
    }
}

impl std::error::Error for ManifestValidationError {}
