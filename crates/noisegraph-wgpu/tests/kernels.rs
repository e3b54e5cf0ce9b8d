mod common;

use std::f32::consts::FRAC_PI_4;

use common::{assert_close, assert_colour, colour_at, constant, cpu_graph, grey};
use noisegraph_wgpu::{
    ColourRamp, ColourStop, Combiner, EdgeMode, Generator, GeneratorFunction, Modifier, NodeId, Port, ScaleCanvas, Selector, TextureGraph,
};

fn combine(graph: &mut TextureGraph, combiner: Combiner, a: f32, b: f32) -> f32 {
    let a = grey(graph, a, 8);
    let b = grey(graph, b, 8);
    let node = graph.add(combiner).unwrap();
    graph.connect(node, Port::Provider, a).unwrap();
    graph.connect(node, Port::Provider2, b).unwrap();
    colour_at(graph, node, (3, 3))[0]
}

fn modify(graph: &mut TextureGraph, modifier: Modifier, source: NodeId) -> NodeId {
    let node = graph.add(modifier).unwrap();
    graph.connect(node, Port::Provider, source).unwrap();
    node
}

fn select(graph: &mut TextureGraph, selector: Selector, value: f32) -> [f32; 4] {
    let a = constant(graph, [1.0, 0.0, 0.0, 1.0], 8);
    let b = constant(graph, [0.0, 0.0, 1.0, 1.0], 8);
    let s = grey(graph, value, 8);
    let node = graph.add(selector).unwrap();
    graph.connect(node, Port::Provider, a).unwrap();
    graph.connect(node, Port::Provider2, b).unwrap();
    graph.connect(node, Port::Selector, s).unwrap();
    colour_at(graph, node, (0, 0))
}

#[test]
fn test_arithmetic_combiners() {
    let mut graph = cpu_graph();
    assert_close(combine(&mut graph, Combiner::Add { normalise: false }, 0.3, 0.6), 0.9);
    assert_close(combine(&mut graph, Combiner::Add { normalise: true }, 0.3, 0.6), 0.45);
    assert_close(combine(&mut graph, Combiner::Add { normalise: false }, 0.7, 0.6), 1.0);
    assert_close(combine(&mut graph, Combiner::Multiply, 0.3, 0.6), 0.18);
    assert_close(combine(&mut graph, Combiner::Divide, 0.3, 0.6), 0.5);
    assert_close(combine(&mut graph, Combiner::Power, 0.25, 0.5), 0.5);
}

#[test]
fn test_subtract_takes_second_from_first() {
    let mut graph = cpu_graph();
    assert_close(combine(&mut graph, Combiner::Subtract, 0.6, 0.3), 0.3);
    assert_close(combine(&mut graph, Combiner::Subtract, 0.3, 0.6), 0.0);
}

#[test]
fn test_division_and_power_by_zero() {
    let mut graph = cpu_graph();
    assert_close(combine(&mut graph, Combiner::Divide, 0.4, 0.0), 1.0);
    assert_close(combine(&mut graph, Combiner::Divide, 0.0, 0.0), 0.0);
    assert_close(combine(&mut graph, Combiner::Power, 0.0, 0.0), 1.0);
    assert_close(combine(&mut graph, Combiner::Power, 0.0, 0.5), 0.0);
}

#[test]
fn test_min_max_keep_the_winning_colour() {
    let mut graph = cpu_graph();
    let red = constant(&mut graph, [1.0, 0.0, 0.0, 1.0], 8);
    let mid = grey(&mut graph, 0.5, 8);

    let min = graph.add(Combiner::Min).unwrap();
    let max = graph.add(Combiner::Max).unwrap();
    for node in [min, max] {
        graph.connect(node, Port::Provider, red).unwrap();
        graph.connect(node, Port::Provider2, mid).unwrap();
    }
    assert_colour(colour_at(&mut graph, min, (1, 1)), [1.0, 0.0, 0.0, 1.0]);
    assert_colour(colour_at(&mut graph, max, (1, 1)), [0.5, 0.5, 0.5, 1.0]);
}

#[test]
fn test_smaller_input_reads_transparent_outside() {
    let mut graph = cpu_graph();
    let small = grey(&mut graph, 0.4, 4);
    let large = grey(&mut graph, 0.2, 8);
    let add = graph.add(Combiner::Add { normalise: false }).unwrap();
    graph.connect(add, Port::Provider, small).unwrap();
    graph.connect(add, Port::Provider2, large).unwrap();

    assert_colour(colour_at(&mut graph, add, (1, 1)), [0.6, 0.6, 0.6, 1.0]);
    assert_colour(colour_at(&mut graph, add, (6, 6)), [0.2, 0.2, 0.2, 1.0]);
}

#[test]
fn test_select_boundary() {
    let mut graph = cpu_graph();
    let hard = Selector::Select { boundary: 0.5, transition: 0.0 };
    assert_colour(select(&mut graph, hard, 0.49), [1.0, 0.0, 0.0, 1.0]);
    assert_colour(select(&mut graph, hard, 0.51), [0.0, 0.0, 1.0, 1.0]);

    // A selector value exactly at the boundary picks the second provider
    let exact = 128.0 / 255.0;
    let tie = Selector::Select { boundary: exact, transition: 0.0 };
    assert_colour(select(&mut graph, tie, exact), [0.0, 0.0, 1.0, 1.0]);
}

#[test]
fn test_select_transition_and_blend() {
    let mut graph = cpu_graph();
    let soft = Selector::Select { boundary: 0.5, transition: 0.4 };
    assert_colour(select(&mut graph, soft, 0.2), [1.0, 0.0, 0.0, 1.0]);
    assert_colour(select(&mut graph, soft, 0.8), [0.0, 0.0, 1.0, 1.0]);
    assert_colour(select(&mut graph, soft, 0.5), [0.5, 0.0, 0.5, 1.0]);

    assert_colour(select(&mut graph, Selector::Blend, 0.25), [0.75, 0.0, 0.25, 1.0]);
}

#[test]
fn test_pointwise_modifiers() {
    let mut graph = cpu_graph();
    let source = grey(&mut graph, 0.25, 8);

    let cases = [
        (Modifier::Invert, 0.75),
        (Modifier::Absolute { normalise: false }, 0.75),
        (Modifier::Absolute { normalise: true }, 0.5),
        (Modifier::Clamp { minimum: 0.3, maximum: 0.6, normalise: false }, 0.3),
        (Modifier::Clamp { minimum: 0.0, maximum: 0.5, normalise: true }, 0.5),
        (Modifier::ScaleBias { scale: 2.0, bias: 0.1 }, 0.6),
        (Modifier::Round { step: 0.2 }, 0.2),
        (Modifier::Step { low: 0.1, high: 0.9, boundary: 0.2 }, 0.9),
        (Modifier::Loop { boundary: 0.2, normalise: false }, 0.05),
        (Modifier::Loop { boundary: 0.2, normalise: true }, 0.25),
    ];
    for (modifier, expected) in cases {
        let node = modify(&mut graph, modifier.clone(), source);
        let colour = colour_at(&mut graph, node, (2, 5));
        assert!((colour[0] - expected).abs() <= 2.0 / 255.0, "{modifier:?}: expected {expected}, got {colour:?}");
        assert_close(colour[3], 1.0);
    }
}

#[test]
fn test_colour_ramp() {
    let mut graph = cpu_graph();
    let ramp = ColourRamp::new(vec![
        ColourStop {
            colour: [1.0, 0.0, 0.0, 1.0],
            position: 0.0,
            intensity: 1.0,
        },
        ColourStop {
            colour: [0.0, 0.0, 1.0, 1.0],
            position: 1.0,
            intensity: 1.0,
        },
    ])
    .unwrap();

    let low = grey(&mut graph, 0.0, 4);
    let mid = grey(&mut graph, 0.5, 4);
    let high = grey(&mut graph, 1.0, 4);
    let tinted_low = modify(&mut graph, Modifier::Colour(ramp.clone()), low);
    let tinted_mid = modify(&mut graph, Modifier::Colour(ramp.clone()), mid);
    let tinted_high = modify(&mut graph, Modifier::Colour(ramp), high);

    assert_colour(colour_at(&mut graph, tinted_low, (0, 0)), [1.0, 0.0, 0.0, 1.0]);
    assert_colour(colour_at(&mut graph, tinted_mid, (0, 0)), [0.5, 0.0, 0.5, 1.0]);
    assert_colour(colour_at(&mut graph, tinted_high, (0, 0)), [0.0, 0.0, 1.0, 1.0]);

    // The default ramp has zero intensity and leaves the input alone
    let untouched = modify(&mut graph, Modifier::Colour(ColourRamp::default()), mid);
    assert_colour(colour_at(&mut graph, untouched, (0, 0)), [0.5, 0.5, 0.5, 1.0]);
}

#[test]
fn test_rotate_edge_modes() {
    let mut graph = cpu_graph();
    let white = grey(&mut graph, 1.0, 16);
    let rotate = |edges| Modifier::Rotate {
        anchor: [0.5, 0.5],
        angle: FRAC_PI_4,
        edges,
    };
    let clipped = modify(&mut graph, rotate(EdgeMode::Clip), white);
    let filled = modify(&mut graph, rotate(EdgeMode::Fill), white);

    assert_colour(colour_at(&mut graph, clipped, (0, 0)), [0.0, 0.0, 0.0, 0.0]);
    assert_colour(colour_at(&mut graph, filled, (0, 0)), [0.0, 0.0, 0.0, 1.0]);
    assert_colour(colour_at(&mut graph, clipped, (8, 8)), [1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn test_stretch_shrinks_about_anchor() {
    let mut graph = cpu_graph();
    let white = grey(&mut graph, 1.0, 16);
    let shrunk = modify(
        &mut graph,
        Modifier::Stretch {
            factor: [0.5, 0.5],
            anchor: [0.5, 0.5],
        },
        white,
    );
    assert_colour(colour_at(&mut graph, shrunk, (8, 8)), [1.0, 1.0, 1.0, 1.0]);
    assert_colour(colour_at(&mut graph, shrunk, (1, 1)), [0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn test_scale_canvas_places_input() {
    let mut graph = cpu_graph();
    let white = grey(&mut graph, 1.0, 16);
    let canvas = modify_canvas(
        &mut graph,
        ScaleCanvas {
            anchor: [0.5, 0.5],
            ..ScaleCanvas::new(32, 32)
        },
        white,
    );

    assert_eq!(graph.size(canvas).unwrap(), (32, 32));
    assert_colour(colour_at(&mut graph, canvas, (0, 0)), [0.0, 0.0, 0.0, 0.0]);
    assert_colour(colour_at(&mut graph, canvas, (20, 20)), [1.0, 1.0, 1.0, 1.0]);
    assert_colour(colour_at(&mut graph, canvas, (31, 31)), [1.0, 1.0, 1.0, 1.0]);

    let doubled = modify_canvas(
        &mut graph,
        ScaleCanvas {
            scale: [2.0, 2.0],
            ..ScaleCanvas::new(48, 48)
        },
        white,
    );
    assert_colour(colour_at(&mut graph, doubled, (31, 31)), [1.0, 1.0, 1.0, 1.0]);
    assert_colour(colour_at(&mut graph, doubled, (33, 2)), [0.0, 0.0, 0.0, 0.0]);
}

fn modify_canvas(graph: &mut TextureGraph, canvas: ScaleCanvas, source: NodeId) -> NodeId {
    let node = graph.add(canvas).unwrap();
    graph.connect(node, Port::Provider, source).unwrap();
    node
}

#[test]
fn test_linear_gradient() {
    let mut graph = cpu_graph();
    let gradient = graph
        .add(
            Generator::new(GeneratorFunction::LinearGradient {
                start: [0.0, 0.0],
                end: [1.0, 0.0],
            })
            .with_size(4, 4),
        )
        .unwrap();
    let values = graph.greyscale_values_at(gradient, &[(0, 1), (1, 1), (2, 1), (3, 1)]).unwrap();
    for (value, expected) in values.into_iter().zip([0.125, 0.375, 0.625, 0.875]) {
        assert_close(value.unwrap(), expected);
    }
}

#[test]
fn test_offset_inputs_displace_the_slice() {
    let mut graph = cpu_graph();
    let horizontal = GeneratorFunction::LinearGradient {
        start: [0.0, 0.0],
        end: [1.0, 0.0],
    };
    let plain = graph.add(Generator::new(horizontal).with_size(8, 8)).unwrap();
    let neutral = graph.add(Generator::new(horizontal).with_size(8, 8)).unwrap();
    let shifted = graph.add(Generator::new(horizontal).with_size(8, 8)).unwrap();

    let mid = grey(&mut graph, 128.0 / 255.0, 8);
    let full = grey(&mut graph, 1.0, 8);
    graph.connect(neutral, Port::OffsetX, mid).unwrap();
    graph.connect(shifted, Port::OffsetX, full).unwrap();

    let base = colour_at(&mut graph, plain, (2, 2))[0];
    assert_close(colour_at(&mut graph, neutral, (2, 2))[0], base);
    // (1 - 128/255) * 0.2 is just under 0.1
    assert_close(colour_at(&mut graph, shifted, (2, 2))[0], base + 0.0996);
}

#[test]
fn test_checker_and_constant() {
    let mut graph = cpu_graph();
    let checker = graph
        .add(Generator::new(GeneratorFunction::Checker { frequency: 2.0, z: 0.25 }).with_size(8, 8))
        .unwrap();
    let image = graph.image(checker).unwrap().unwrap();
    assert!(image.pixels().all(|pixel| pixel.0[0] == 0 || pixel.0[0] == 255));
    assert_ne!(image.get_pixel(1, 1), image.get_pixel(6, 1));

    let colour = constant(&mut graph, [0.2, 0.4, 0.6, 0.8], 4);
    assert_colour(colour_at(&mut graph, colour, (3, 3)), [0.2, 0.4, 0.6, 0.8]);
}

#[test]
fn test_noise_families_differ_and_fill_range() {
    let mut graph = cpu_graph();
    let functions = [
        GeneratorFunction::simplex(),
        GeneratorFunction::billow(),
        GeneratorFunction::ridged_multi(),
        GeneratorFunction::voronoi(),
    ];
    let mut images = Vec::new();
    for function in functions {
        let node = graph.add(Generator::new(function).with_size(32, 32)).unwrap();
        let image = graph.image(node).unwrap().unwrap();
        let min = image.pixels().map(|pixel| pixel.0[0]).min().unwrap();
        let max = image.pixels().map(|pixel| pixel.0[0]).max().unwrap();
        assert!(max - min > 20, "{function:?} is nearly flat: {min}..{max}");
        assert!(image.pixels().all(|pixel| pixel.0[0] == pixel.0[1] && pixel.0[3] == 255));
        images.push(image);
    }
    for (i, a) in images.iter().enumerate() {
        for b in &images[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_noise_modes_change_output() {
    let mut graph = cpu_graph();
    let base = Generator::new(GeneratorFunction::simplex()).with_size(16, 16);
    let mut variants = Vec::new();
    for mode in 0..4 {
        let mut generator = base;
        if let Some(coherent) = generator.function.coherent_mut() {
            match mode {
                1 => coherent.use_4d = true,
                2 => coherent.sphere_map = true,
                3 => coherent.seamless = true,
                _ => {}
            }
        }
        let node = graph.add(generator).unwrap();
        variants.push(graph.image(node).unwrap().unwrap());
    }
    for (i, a) in variants.iter().enumerate() {
        for b in &variants[i + 1..] {
            assert_ne!(a, b);
        }
    }
}
