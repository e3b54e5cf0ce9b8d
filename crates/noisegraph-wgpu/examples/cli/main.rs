//! Procedural planet texture generator
//!
//! Builds a small node graph (continents, mountain ridges, a colour ramp and an optional
//! normal map) and writes the result as PNG.
//!
//! # Usage
//! ```bash
//! cargo run --example cli -- planet.png --width 1024 --height 512 --noise simplex --backend gpu
//! RUST_LOG=noisegraph_wgpu=debug cargo run --example cli -- planet.png --backend cpu
//! ```

use std::{path::PathBuf, sync::Arc, time::Instant};

use clap::{Parser, ValueEnum};
use noisegraph_wgpu::{
    ColourRamp, ColourStop, Context, CpuBackend, Generator, GeneratorFunction, GpuBackend, GpuOptions, Modifier, NodeId, Port, Selector, TextureGraph,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Noise {
    Simplex,
    Billow,
    Ridged,
    Voronoi,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendKind {
    Cpu,
    Gpu,
}

/// Command-line arguments for the planet generator
#[derive(Parser)]
#[command(version, about = "Generate a procedural planet texture")]
struct Args {
    /// Output PNG path
    output: PathBuf,

    /// Texture width in pixels
    #[arg(long, default_value_t = 512)]
    width: u32,

    /// Texture height in pixels
    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Noise family for the continents
    #[arg(long, value_enum, default_value_t = Noise::Simplex)]
    noise: Noise,

    /// Z offset of the noise origin; different values give different planets
    #[arg(long, short, default_value_t = 0.0)]
    z: f32,

    /// Wrap the texture around a sphere (equirectangular)
    #[arg(long)]
    sphere: bool,

    /// Where to compute
    #[arg(long, value_enum, default_value_t = BackendKind::Gpu)]
    backend: BackendKind,

    /// Also write a normal map of the terrain height
    #[arg(long)]
    normals: Option<PathBuf>,
}

fn noise_function(noise: Noise) -> GeneratorFunction {
    match noise {
        Noise::Simplex => GeneratorFunction::simplex(),
        Noise::Billow => GeneratorFunction::billow(),
        Noise::Ridged => GeneratorFunction::ridged_multi(),
        Noise::Voronoi => GeneratorFunction::voronoi(),
    }
}

fn terrain_generator(args: &Args, function: GeneratorFunction, frequency: f32, octaves: u32) -> Generator {
    let mut generator = Generator::new(function).with_size(args.width, args.height);
    if let Some(coherent) = generator.function.coherent_mut() {
        coherent.frequency = frequency;
        coherent.octaves = octaves;
        coherent.origin[2] += args.z;
        coherent.sphere_map = args.sphere;
    }
    generator
}

fn stop(colour: [f32; 4], position: f32) -> ColourStop {
    ColourStop {
        colour,
        position,
        intensity: 1.0,
    }
}

/// Wires the planet graph and returns the height and colour nodes
fn build_planet(graph: &mut TextureGraph, args: &Args) -> noisegraph_wgpu::Result<(NodeId, NodeId)> {
    let continents = graph.add(terrain_generator(args, noise_function(args.noise), 3.0, 8))?;
    let ridges = graph.add(terrain_generator(args, GeneratorFunction::ridged_multi(), 6.0, 6))?;

    // Mountains only rise where the continents are high
    let height = graph.add(Selector::Select {
        boundary: 0.6,
        transition: 0.15,
    })?;
    graph.connect(height, Port::Provider, continents)?;
    graph.connect(height, Port::Provider2, ridges)?;
    graph.connect(height, Port::Selector, continents)?;

    let ramp = ColourRamp::new(vec![
        stop([0.02, 0.05, 0.25, 1.0], 0.0),
        stop([0.10, 0.30, 0.60, 1.0], 0.48),
        stop([0.85, 0.80, 0.55, 1.0], 0.50),
        stop([0.20, 0.50, 0.15, 1.0], 0.56),
        stop([0.45, 0.35, 0.25, 1.0], 0.75),
        stop([0.95, 0.95, 0.95, 1.0], 0.90),
    ])?;
    let colour = graph.add(Modifier::Colour(ramp))?;
    graph.connect(colour, Port::Provider, height)?;

    Ok((height, colour))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let context: Context = match args.backend {
        BackendKind::Cpu => Arc::new(CpuBackend::new()),
        BackendKind::Gpu => Arc::new(GpuBackend::new_async(&GpuOptions::default()).await?),
    };

    let mut graph = TextureGraph::new(context);
    let (height, colour) = build_planet(&mut graph, &args)?;

    let start = Instant::now();
    let image = graph.image(colour)?.ok_or("planet graph is not fully wired")?;
    println!("Rendered {}x{} in {:.2?}", image.width(), image.height(), start.elapsed());
    image.save(&args.output)?;
    println!("Saved {}", args.output.display());

    if let Some(path) = &args.normals {
        let normals = graph.add(Modifier::NormalMap {
            intensity: 4.0,
            smoothing: 0.25,
        })?;
        graph.connect(normals, Port::Provider, height)?;
        // Only the normal map itself is computed; the terrain comes from the cache
        let image = graph.image(normals)?.ok_or("normal map is not wired")?;
        image.save(path)?;
        println!("Saved {}", path.display());
    }

    Ok(())
}
