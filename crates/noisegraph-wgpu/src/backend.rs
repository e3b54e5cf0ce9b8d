//! Kernel binding and texture store contract.
//!
//! The graph never touches a device directly. Everything it needs from the outside world
//! goes through [`Backend`]: resolving kernels by name, allocating RGBA8 textures,
//! dispatching kernels over them, running image filters and reading pixels back.

use std::sync::Arc;

use image::RgbaImage;

use crate::Result;

/// Shared compute context handed to every graph
pub type Context = Arc<dyn Backend>;

/// Opaque handle to a resolved kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(pub u32);

/// Opaque handle to an RGBA8 texture owned by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    /// Backend-assigned identifier
    pub id: u64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl TextureHandle {
    /// Returns `(width, height)`
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// One kernel invocation
///
/// `inputs` are bound in order starting at binding 0, followed by `output`, the uniform
/// block and, for kernels that take one, the colour-stop buffer.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Parameter block, laid out as [`crate::uniforms::KernelParams`]
    pub uniforms: &'a [u8],
    /// Colour stops, laid out as a slice of [`crate::uniforms::ColourStopData`]
    pub stops: Option<&'a [u8]>,
    /// Input textures
    pub inputs: &'a [TextureHandle],
    /// Texture the kernel writes to
    pub output: TextureHandle,
    /// Number of invocations in x and y; always the output size
    pub extent: (u32, u32),
}

/// Image-processing operations that run outside the kernel path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageFilter {
    /// Gaussian blur with the given standard deviation in pixels
    GaussianBlur { sigma: f32 },
    /// Tangent-space normal map from the red channel used as a height field
    NormalMap { intensity: f32, smoothing: f32 },
}

/// Compute and texture services used by the graph
///
/// Implementations must be usable from one thread at a time at minimum; the graph calls
/// every method synchronously and waits for completion.
pub trait Backend: Send + Sync {
    /// Resolves a kernel by name
    ///
    /// # Errors
    /// [`crate::Error::KernelNotFound`] when the backend does not know the name.
    fn resolve_kernel(&self, name: &str) -> Result<KernelId>;

    /// Allocates an RGBA8 texture; the contents are undefined until written
    fn allocate(&self, width: u32, height: u32) -> Result<TextureHandle>;

    /// Frees a texture; unknown handles are ignored
    fn release(&self, texture: TextureHandle);

    /// Replaces the contents of a texture with an image of the same size
    fn upload(&self, texture: TextureHandle, image: &RgbaImage) -> Result<()>;

    /// Runs a kernel and blocks until its output is written
    fn dispatch(&self, kernel: KernelId, invocation: &Invocation<'_>) -> Result<()>;

    /// Runs an image filter from `input` into `output`
    fn apply_filter(&self, filter: &ImageFilter, input: TextureHandle, output: TextureHandle) -> Result<()>;

    /// Reads a whole texture back into host memory
    fn read_pixels(&self, texture: TextureHandle) -> Result<RgbaImage>;
}
