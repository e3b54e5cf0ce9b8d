//! WGSL minification and validation.
//!
//! Kernels are embedded into the library as string literals, so every source file goes
//! through `naga` once at build time. This catches shader errors before a device ever
//! sees them and shrinks the embedded text.

/// Parses and validates a WGSL source, returning the `naga` module.
///
/// # Arguments
///
/// * `shader` - WGSL source code.
pub fn parse_and_validate(shader: &str) -> Result<(naga::Module, naga::valid::ModuleInfo), std::boxed::Box<dyn std::error::Error>> {
    let module = naga::front::wgsl::parse_str(shader).map_err(|e| e.emit_to_string(shader))?;

    let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
    let info = validator.validate(&module)?;

    Ok((module, info))
}

/// Minifies WGSL shader source code to reduce binary size.
///
/// The module is parsed, minified, revalidated and written back out; entry point names
/// are preserved so pipelines can still be created by name.
///
/// # Arguments
///
/// * `shader` - A string slice containing the WGSL shader source code.
///
/// # Returns
///
/// A `Result` containing the minified WGSL source code as a `String`, or an error if parsing fails.
pub fn minify_wgsl(shader: &str) -> Result<String, std::boxed::Box<dyn std::error::Error>> {
    let (mut module, _) = parse_and_validate(shader)?;

    wgsl_minifier::minify_module(&mut module);

    let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
    let info = validator.validate(&module)?;
    let output = naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty())?;

    Ok(wgsl_minifier::minify_wgsl_source(&output))
}
