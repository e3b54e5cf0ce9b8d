//! Procedural texture graphs evaluated with compute kernels.
//!
//! Build a [`TextureGraph`] on a compute [`Context`], add generator, modifier, combiner,
//! selector and canvas nodes, wire them by [`Port`] and pull any node's output. Only
//! stale nodes are recomputed; everything else is served from per-node texture caches.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use noisegraph_wgpu::{CpuBackend, Generator, GeneratorFunction, Modifier, Port, TextureGraph};
//!
//! # fn main() -> noisegraph_wgpu::Result<()> {
//! let mut graph = TextureGraph::new(Arc::new(CpuBackend::new()));
//! let noise = graph.add(Generator::new(GeneratorFunction::simplex()).with_size(256, 256))?;
//! let inverted = graph.add(Modifier::Invert)?;
//! graph.connect(inverted, Port::Provider, noise)?;
//! let heights = graph.greyscale_values_at(inverted, &[(0, 0), (128, 128)])?;
//! # Ok(())
//! # }
//! ```

mod error;

pub mod backend;
pub mod cpu;
pub mod filter;
pub mod gpu;
pub mod graph;
pub mod kernels;
pub mod node;
pub mod uniforms;

pub use backend::{Backend, Context, ImageFilter, Invocation, KernelId, TextureHandle};
pub use cpu::CpuBackend;
pub use error::{Error, Result, SampleError};
pub use gpu::{GpuBackend, GpuOptions};
pub use graph::{Position, TextureGraph};
pub use node::{
    Coherent, ColourRamp, ColourStop, Combiner, EdgeMode, Generator, GeneratorFunction, Kind, Modifier, NodeId, NodeOperation, Operation, Port, ScaleCanvas,
    Selector, TextureOp,
};
