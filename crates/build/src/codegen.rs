//! Rust code generation for the embedded kernel table.

use crate::CompiledKernels;

/// Converts WGSL shader source into a Rust string literal
fn dump_shader_string_literal(shader: &str) -> String {
    let escaped_shader = shader.replace('\\', "\\\\").replace('"', "\\\"").replace('\r', "").replace('\n', "\\n");
    format!("\"{escaped_shader}\"")
}

/// Generates the contents of `kernels.rs`
///
/// Each distinct shader file becomes one `SHADER_<n>` constant and every kernel refers to
/// the constant of its file, so files with many entry points are embedded once. The
/// generated code expects `KernelSource` to be in scope at the include site.
///
/// # Arguments
/// * `compiled` - Output of [`crate::compile_manifest`]
pub fn dump_kernel_table(compiled: &CompiledKernels) -> String {
    let mut code = String::new();
    code.push_str("// This file is generated by the build script.\n\n");

    for (index, shader) in compiled.shaders.iter().enumerate() {
        code.push_str(&format!("// {}\n", shader.file));
        code.push_str(&format!("const SHADER_{index}: &str = {};\n\n", dump_shader_string_literal(&shader.source)));
    }

    code.push_str("pub const KERNELS: &[KernelSource] = &[\n");
    for kernel in &compiled.kernels {
        // compile_manifest produces one shader per referenced file
        let Some(index) = compiled.shader_index(kernel) else {
            continue;
        };
        code.push_str("    KernelSource {\n");
        code.push_str(&format!("        name: \"{}\",\n", kernel.name));
        code.push_str(&format!("        entry_point: \"{}\",\n", kernel.entry_point()));
        code.push_str(&format!("        inputs: {},\n", kernel.inputs));
        code.push_str(&format!("        stops: {},\n", kernel.stops));
        code.push_str(&format!("        shader: SHADER_{index},\n"));
        code.push_str("    },\n");
    }
    code.push_str("];\n\n");

    code.push_str("// END OF GENERATED CODE\n");
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompiledShader, manifest::KernelSpec};

    #[test]
    fn test_kernel_table_shares_shader_constants() {
        let kernel = |name: &str| KernelSpec {
            name: name.to_string(),
            file: "combiner.wgsl".to_string(),
            entry: None,
            inputs: 2,
            stops: false,
        };
        let compiled = CompiledKernels {
            kernels: vec![kernel("add_combiner"), kernel("min_combiner")],
            shaders: vec![CompiledShader {
                file: "combiner.wgsl".to_string(),
                source: "fn f() {}\n// \"quoted\"".to_string(),
            }],
        };

        let code = dump_kernel_table(&compiled);
        assert_eq!(code.matches("const SHADER_").count(), 1);
        assert_eq!(code.matches("shader: SHADER_0").count(), 2);
        assert!(code.contains(r#"fn f() {}\n// \"quoted\""#));
        assert!(code.contains("name: \"min_combiner\""));
    }
}
