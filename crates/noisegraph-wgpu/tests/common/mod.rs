#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use image::RgbaImage;
use noisegraph_wgpu::{
    Backend, CpuBackend, Error, Generator, GeneratorFunction, ImageFilter, Invocation, KernelId, NodeId, Result, TextureGraph, TextureHandle,
};

/// CPU backend that records how often each kernel runs
#[derive(Debug, Default)]
pub struct CountingBackend {
    inner: CpuBackend,
    names: Mutex<HashMap<KernelId, String>>,
    counts: Mutex<HashMap<String, usize>>,
    rejected: Mutex<HashSet<String>>,
}

impl CountingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes later resolutions of `name` fail with `KernelNotFound`
    pub fn reject(&self, name: &str) {
        self.rejected.lock().unwrap().insert(name.to_string());
    }

    /// Dispatches of one kernel, or filter applications for `"filter"`
    pub fn runs(&self, name: &str) -> usize {
        self.counts.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn total_runs(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    pub fn texture_count(&self) -> usize {
        self.inner.texture_count()
    }

    fn record(&self, name: &str) {
        *self.counts.lock().unwrap().entry(name.to_string()).or_default() += 1;
    }
}

impl Backend for CountingBackend {
    fn resolve_kernel(&self, name: &str) -> Result<KernelId> {
        if self.rejected.lock().unwrap().contains(name) {
            return Err(Error::KernelNotFound(name.to_string()));
        }
        let id = self.inner.resolve_kernel(name)?;
        self.names.lock().unwrap().insert(id, name.to_string());
        Ok(id)
    }

    fn allocate(&self, width: u32, height: u32) -> Result<TextureHandle> {
        self.inner.allocate(width, height)
    }

    fn release(&self, texture: TextureHandle) {
        self.inner.release(texture)
    }

    fn upload(&self, texture: TextureHandle, image: &RgbaImage) -> Result<()> {
        self.inner.upload(texture, image)
    }

    fn dispatch(&self, kernel: KernelId, invocation: &Invocation<'_>) -> Result<()> {
        let name = self.names.lock().unwrap().get(&kernel).cloned().unwrap_or_default();
        self.record(&name);
        self.inner.dispatch(kernel, invocation)
    }

    fn apply_filter(&self, filter: &ImageFilter, input: TextureHandle, output: TextureHandle) -> Result<()> {
        self.record("filter");
        self.inner.apply_filter(filter, input, output)
    }

    fn read_pixels(&self, texture: TextureHandle) -> Result<RgbaImage> {
        self.inner.read_pixels(texture)
    }
}

pub fn counting_graph() -> (TextureGraph, Arc<CountingBackend>) {
    let backend = CountingBackend::new();
    (TextureGraph::new(backend.clone()), backend)
}

pub fn cpu_graph() -> TextureGraph {
    TextureGraph::new(Arc::new(CpuBackend::new()))
}

/// Adds a constant-colour generator
pub fn constant(graph: &mut TextureGraph, colour: [f32; 4], size: u32) -> NodeId {
    graph
        .add(Generator::new(GeneratorFunction::Constant { colour }).with_size(size, size))
        .unwrap()
}

pub fn grey(graph: &mut TextureGraph, value: f32, size: u32) -> NodeId {
    constant(graph, [value, value, value, 1.0], size)
}

/// Colour of a node's output at one pixel
pub fn colour_at(graph: &mut TextureGraph, id: NodeId, position: (u32, u32)) -> [f32; 4] {
    graph.colour_values_at(id, &[position]).unwrap().remove(0).unwrap()
}

/// Asserts two colours agree within two quantisation steps per channel
#[track_caller]
pub fn assert_colour(actual: [f32; 4], expected: [f32; 4]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() <= 2.0 / 255.0, "expected {expected:?}, got {actual:?}");
    }
}

#[track_caller]
pub fn assert_close(actual: f32, expected: f32) {
    assert!((actual - expected).abs() <= 2.0 / 255.0, "expected {expected}, got {actual}");
}
