//! Reference backend that runs every kernel on the host.
//!
//! Textures live in a map of [`RgbaImage`]s and kernels are evaluated pixel by pixel with
//! the same arithmetic as the WGSL sources. Useful for tests and for machines without a
//! usable adapter.

mod kernels;
mod noise;

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use glam::{UVec2, Vec4};
use image::{Rgba, RgbaImage};

pub use noise::{cellular3, cellular4, simplex3, simplex4};

use crate::{
    Error, Result,
    backend::{Backend, ImageFilter, Invocation, KernelId, TextureHandle},
    filter,
    uniforms::{ColourStopData, KernelParams},
};

/// Host-memory implementation of [`Backend`]
#[derive(Debug, Default)]
pub struct CpuBackend {
    textures: Mutex<HashMap<u64, RgbaImage>>,
    next_id: AtomicU64,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.textures().len()
    }

    fn textures(&self) -> MutexGuard<'_, HashMap<u64, RgbaImage>> {
        self.textures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_rgba(colour: Vec4) -> Rgba<u8> {
    let scaled = colour.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
    Rgba(scaled.to_array().map(|channel| channel.round() as u8))
}

fn decode_stops(bytes: &[u8]) -> Option<Vec<ColourStopData>> {
    let stride = std::mem::size_of::<ColourStopData>();
    if bytes.is_empty() || bytes.len() % stride != 0 {
        return None;
    }
    Some(bytes.chunks_exact(stride).map(bytemuck::pod_read_unaligned).collect())
}

impl Backend for CpuBackend {
    fn resolve_kernel(&self, name: &str) -> Result<KernelId> {
        kernels::CPU_KERNELS
            .iter()
            .position(|kernel| kernel.name == name)
            .map(|index| KernelId(index as u32))
            .ok_or_else(|| Error::KernelNotFound(name.to_string()))
    }

    fn allocate(&self, width: u32, height: u32) -> Result<TextureHandle> {
        if width == 0 || height == 0 {
            return Err(Error::Allocation(format!("zero-sized texture {width}x{height}")));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.textures().insert(id, RgbaImage::new(width, height));
        Ok(TextureHandle { id, width, height })
    }

    fn release(&self, texture: TextureHandle) {
        self.textures().remove(&texture.id);
    }

    fn upload(&self, texture: TextureHandle, image: &RgbaImage) -> Result<()> {
        let mut textures = self.textures();
        let target = textures
            .get_mut(&texture.id)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown texture {}", texture.id)))?;
        if target.dimensions() != image.dimensions() {
            return Err(Error::InvalidArgument(format!(
                "upload of {}x{} image into {}x{} texture",
                image.width(),
                image.height(),
                target.width(),
                target.height()
            )));
        }
        target.copy_from_slice(image.as_raw());
        Ok(())
    }

    fn dispatch(&self, kernel: KernelId, invocation: &Invocation<'_>) -> Result<()> {
        let cpu = kernels::CPU_KERNELS
            .get(kernel.0 as usize)
            .ok_or_else(|| Error::KernelNotFound(format!("kernel id {}", kernel.0)))?;
        let failed = |message: String| Error::Dispatch { kernel: cpu.name.to_string(), message };

        if invocation.inputs.len() != cpu.inputs {
            return Err(failed(format!("expected {} inputs, got {}", cpu.inputs, invocation.inputs.len())));
        }
        let params: KernelParams = bytemuck::try_pod_read_unaligned(invocation.uniforms).map_err(|e| failed(format!("bad parameter block: {e}")))?;
        let stops = match invocation.stops {
            Some(bytes) => decode_stops(bytes).ok_or_else(|| failed(format!("bad colour-stop buffer of {} bytes", bytes.len())))?,
            None if crate::kernels::find(cpu.name).is_some_and(|source| source.stops) => return Err(failed("missing colour-stop buffer".to_string())),
            None => Vec::new(),
        };

        let output = invocation.output;
        if invocation.extent != output.size() {
            return Err(failed(format!("extent {:?} does not match output {:?}", invocation.extent, output.size())));
        }

        let mut textures = self.textures();
        if !textures.contains_key(&output.id) {
            return Err(failed(format!("unknown output texture {}", output.id)));
        }
        let image = {
            let inputs = invocation
                .inputs
                .iter()
                .map(|input| textures.get(&input.id).ok_or_else(|| failed(format!("unknown input texture {}", input.id))))
                .collect::<Result<Vec<_>>>()?;
            let args = kernels::KernelArgs {
                params,
                stops,
                inputs,
                dims: UVec2::new(output.width, output.height),
            };
            RgbaImage::from_fn(output.width, output.height, |x, y| to_rgba((cpu.run)(&args, UVec2::new(x, y))))
        };
        tracing::trace!(kernel = cpu.name, width = output.width, height = output.height, "cpu dispatch");
        textures.insert(output.id, image);
        Ok(())
    }

    fn apply_filter(&self, filter: &ImageFilter, input: TextureHandle, output: TextureHandle) -> Result<()> {
        let mut textures = self.textures();
        let source = textures
            .get(&input.id)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown texture {}", input.id)))?;
        if source.dimensions() != output.size() {
            return Err(Error::InvalidArgument(format!("filter output {:?} does not match input {:?}", output.size(), source.dimensions())));
        }
        let filtered = filter::apply(filter, source);
        textures.insert(output.id, filtered);
        Ok(())
    }

    fn read_pixels(&self, texture: TextureHandle) -> Result<RgbaImage> {
        self.textures()
            .get(&texture.id)
            .cloned()
            .ok_or_else(|| Error::Readback(format!("unknown texture {}", texture.id)))
    }
}
