//! wgpu implementation of the kernel backend.
//!
//! Kernels are compiled into compute pipelines with explicit bind group layouts the first
//! time they are resolved and cached by id. Every dispatch records one compute pass,
//! submits it and waits for the device, so textures are always complete when the graph
//! reads them.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::{
    Error, Result,
    backend::{Backend, ImageFilter, Invocation, KernelId, TextureHandle},
    filter,
    kernels::{self, KernelSource},
    uniforms::KernelParams,
};

/// Compute shader workgroup size in X dimension
const COMPUTE_WORKGROUP_SIZE_X: u32 = 8;
/// Compute shader workgroup size in Y dimension
const COMPUTE_WORKGROUP_SIZE_Y: u32 = 8;

/// Every texture can be sampled, written by a kernel, uploaded to and read back
pub const TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::STORAGE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// Format of every texture in the store
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Adapter and device selection
#[derive(Debug, Clone)]
pub struct GpuOptions {
    /// Backends the instance may use
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Use a software adapter even when hardware is available
    pub force_fallback_adapter: bool,
    /// Debug label for the device
    pub label: Option<String>,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::PRIMARY,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            label: None,
        }
    }
}

/// A kernel compiled for this device
#[derive(Debug)]
struct KernelPipeline {
    source: &'static KernelSource,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// [`Backend`] running kernels as wgpu compute passes
#[derive(Debug)]
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: Mutex<HashMap<u32, Arc<KernelPipeline>>>,
    textures: Mutex<HashMap<u64, wgpu::Texture>>,
    next_id: AtomicU64,
}

fn layout_entry(binding: u32, ty: wgpu::BindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty,
        count: None,
    }
}

/// Builds the bind group layout entries for a kernel
///
/// Sampled inputs come first, then the storage output, the uniform block and the
/// optional colour-stop buffer.
fn layout_entries(source: &KernelSource) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = (0..source.inputs)
        .map(|binding| {
            layout_entry(
                binding,
                wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
            )
        })
        .collect::<Vec<_>>();

    entries.push(layout_entry(
        source.inputs,
        wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: TEXTURE_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
    ));
    entries.push(layout_entry(
        source.inputs + 1,
        wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
    ));
    if source.stops {
        entries.push(layout_entry(
            source.inputs + 2,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        ));
    }
    entries
}

fn full_extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

impl GpuBackend {
    /// Acquires an adapter and device, blocking the current thread
    ///
    /// # Arguments
    /// * `options` - Adapter and device selection
    ///
    /// # Returns
    /// A backend with an empty texture store, or [`Error::Device`] when no adapter fits
    pub fn new(options: &GpuOptions) -> Result<Self> {
        pollster::block_on(Self::new_async(options))
    }

    /// Acquires an adapter and device
    pub async fn new_async(options: &GpuOptions) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: None,
                force_fallback_adapter: options.force_fallback_adapter,
            })
            .await
            .map_err(|e| Error::Device(format!("no suitable adapter: {e}")))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: options.label.as_deref(),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| Error::Device(format!("device request failed: {e}")))?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU initialized");

        Ok(Self::from_device(device, queue))
    }

    /// Wraps an existing device, for applications that already own one
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            pipelines: Mutex::new(HashMap::new()),
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.textures().len()
    }

    fn textures(&self) -> MutexGuard<'_, HashMap<u64, wgpu::Texture>> {
        self.textures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn texture(&self, handle: TextureHandle) -> Option<wgpu::Texture> {
        self.textures().get(&handle.id).cloned()
    }

    fn pipeline(&self, kernel: KernelId) -> Result<Arc<KernelPipeline>> {
        self.pipelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kernel.0)
            .cloned()
            .ok_or_else(|| Error::KernelNotFound(format!("kernel id {}", kernel.0)))
    }

    /// Compiles a kernel into a compute pipeline with its explicit layout
    fn compile(&self, source: &'static KernelSource) -> Result<KernelPipeline> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.name),
            source: wgpu::ShaderSource::Wgsl(source.shader.into()),
        });

        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(source.name),
            entries: &layout_entries(source),
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(source.name),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(source.name),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some(source.entry_point),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(Error::Device(format!("kernel {} failed to compile: {error}", source.name)));
        }

        Ok(KernelPipeline {
            source,
            pipeline,
            bind_group_layout,
        })
    }

    /// Waits for all submitted work
    fn wait(&self) -> std::result::Result<(), wgpu::PollError> {
        self.device.poll(wgpu::PollType::Wait).map(|_| ())
    }
}

impl Backend for GpuBackend {
    fn resolve_kernel(&self, name: &str) -> Result<KernelId> {
        let index = kernels::KERNELS
            .iter()
            .position(|kernel| kernel.name == name)
            .ok_or_else(|| Error::KernelNotFound(name.to_string()))?;
        let id = KernelId(index as u32);

        if self.pipeline(id).is_err() {
            let compiled = self.compile(&kernels::KERNELS[index])?;
            tracing::debug!(kernel = name, "compiled kernel pipeline");
            self.pipelines.lock().unwrap_or_else(PoisonError::into_inner).insert(id.0, Arc::new(compiled));
        }
        Ok(id)
    }

    fn allocate(&self, width: u32, height: u32) -> Result<TextureHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(Error::Allocation(format!("texture size {width}x{height} outside 1..={max}")));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Node Texture"),
            size: full_extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: TEXTURE_USAGE,
            view_formats: &[],
        });

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.textures().insert(id, texture);
        Ok(TextureHandle { id, width, height })
    }

    fn release(&self, texture: TextureHandle) {
        if let Some(texture) = self.textures().remove(&texture.id) {
            texture.destroy();
        }
    }

    fn upload(&self, texture: TextureHandle, image: &RgbaImage) -> Result<()> {
        let target = self.texture(texture).ok_or_else(|| Error::InvalidArgument(format!("unknown texture {}", texture.id)))?;
        let (width, height) = image.dimensions();
        if (width, height) != (target.width(), target.height()) {
            return Err(Error::InvalidArgument(format!(
                "upload of {width}x{height} image into {}x{} texture",
                target.width(),
                target.height()
            )));
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            full_extent(width, height),
        );
        Ok(())
    }

    fn dispatch(&self, kernel: KernelId, invocation: &Invocation<'_>) -> Result<()> {
        let compiled = self.pipeline(kernel)?;
        let source = compiled.source;
        let failed = |message: String| Error::Dispatch {
            kernel: source.name.to_string(),
            message,
        };

        if invocation.inputs.len() != source.inputs as usize {
            return Err(failed(format!("expected {} inputs, got {}", source.inputs, invocation.inputs.len())));
        }
        if invocation.uniforms.len() != std::mem::size_of::<KernelParams>() {
            return Err(failed(format!("parameter block is {} bytes", invocation.uniforms.len())));
        }
        if source.stops != invocation.stops.is_some() {
            return Err(failed("colour-stop buffer does not match the kernel layout".to_string()));
        }

        let view = |handle: &TextureHandle| {
            self.texture(*handle)
                .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default()))
                .ok_or_else(|| failed(format!("unknown texture {}", handle.id)))
        };
        let input_views = invocation.inputs.iter().map(view).collect::<Result<Vec<_>>>()?;
        let output_view = view(&invocation.output)?;

        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Kernel Params"),
            contents: invocation.uniforms,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let stops_buffer = invocation.stops.map(|stops| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Colour Stops"),
                contents: stops,
                usage: wgpu::BufferUsages::STORAGE,
            })
        });

        let mut bind_group_entries = input_views
            .iter()
            .zip(0u32..)
            .map(|(view, binding)| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect::<Vec<_>>();
        bind_group_entries.push(wgpu::BindGroupEntry {
            binding: source.inputs,
            resource: wgpu::BindingResource::TextureView(&output_view),
        });
        bind_group_entries.push(wgpu::BindGroupEntry {
            binding: source.inputs + 1,
            resource: uniform_buffer.as_entire_binding(),
        });
        if let Some(stops_buffer) = &stops_buffer {
            bind_group_entries.push(wgpu::BindGroupEntry {
                binding: source.inputs + 2,
                resource: stops_buffer.as_entire_binding(),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(source.name),
            layout: &compiled.bind_group_layout,
            entries: &bind_group_entries,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(source.name) });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(source.name),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&compiled.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);

            let (compute_width, compute_height) = invocation.extent;
            compute_pass.dispatch_workgroups(compute_width.div_ceil(COMPUTE_WORKGROUP_SIZE_X), compute_height.div_ceil(COMPUTE_WORKGROUP_SIZE_Y), 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        let waited = self.wait();
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(failed(error.to_string()));
        }
        waited.map_err(|e| failed(e.to_string()))
    }

    fn apply_filter(&self, filter: &ImageFilter, input: TextureHandle, output: TextureHandle) -> Result<()> {
        let source = self.read_pixels(input)?;
        let filtered = filter::apply(filter, &source);
        self.upload(output, &filtered)
    }

    fn read_pixels(&self, texture: TextureHandle) -> Result<RgbaImage> {
        let source = self.texture(texture).ok_or_else(|| Error::Readback(format!("unknown texture {}", texture.id)))?;
        let (width, height) = (source.width(), source.height());

        // Copies need rows aligned to COPY_BYTES_PER_ROW_ALIGNMENT
        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &source,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            full_extent(width, height),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.wait().map_err(|e| Error::Readback(e.to_string()))?;
        pollster::block_on(receiver.receive())
            .ok_or_else(|| Error::Readback("buffer mapping was cancelled".to_string()))?
            .map_err(|e| Error::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        {
            let data = buffer_slice.get_mapped_range();
            for row in data.chunks(padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        buffer.unmap();

        RgbaImage::from_raw(width, height, pixels).ok_or_else(|| Error::Readback("short readback buffer".to_string()))
    }
}
