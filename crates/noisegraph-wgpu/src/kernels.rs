//! Compute kernels embedded at build time.
//!
//! The table is generated by `build.rs` from `wgsl/kernels.yaml`; every entry has been
//! validated with naga against the binding layout described on [`KernelSource`].

/// A WGSL compute kernel and the shape of its binding layout
///
/// Bindings: sampled inputs at `0..inputs`, the `rgba8unorm` storage output at `inputs`,
/// the uniform parameter block at `inputs + 1` and, when `stops` is set, a read-only
/// storage buffer of colour stops at `inputs + 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSource {
    /// Name nodes refer to the kernel by
    pub name: &'static str,
    /// Entry point in `shader`
    pub entry_point: &'static str,
    /// Number of sampled texture inputs
    pub inputs: u32,
    /// Whether the kernel reads a colour-stop buffer
    pub stops: bool,
    /// Minified WGSL source
    pub shader: &'static str,
}

include!(concat!(env!("OUT_DIR"), "/kernels.rs"));

/// Looks up an embedded kernel by name
pub fn find(name: &str) -> Option<&'static KernelSource> {
    KERNELS.iter().find(|kernel| kernel.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_names_are_unique() {
        let mut names: Vec<_> = KERNELS.iter().map(|kernel| kernel.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), KERNELS.len());
    }

    #[test]
    fn test_find_kernel() {
        let select = find("select_selector").unwrap();
        assert_eq!(select.inputs, 3);
        assert!(!select.stops);
        assert!(find("colour_modifier").unwrap().stops);
        assert!(find("no_such_kernel").is_none());
    }
}
