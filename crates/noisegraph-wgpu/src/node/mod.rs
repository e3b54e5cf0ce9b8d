//! Node kinds and their parameter records.
//!
//! A node's behaviour is fully described by its [`Operation`]: which kind it is (and so
//! which input ports it has), which kernel or filter produces its pixels and the
//! parameter block that kernel receives. The graph owns the evaluation protocol; the
//! operations only describe what to run.

mod canvas;
mod combiner;
mod generator;
mod modifier;
mod selector;

use std::fmt;

pub use canvas::ScaleCanvas;
pub use combiner::Combiner;
pub use generator::{Coherent, Generator, GeneratorFunction};
pub use modifier::{ColourRamp, ColourStop, EdgeMode, Modifier};
pub use selector::Selector;

use crate::{
    Error, Result,
    backend::ImageFilter,
    uniforms::{ColourStopData, KernelParams},
};

/// Size used when nothing else determines a node's size
pub const DEFAULT_SIZE: (u32, u32) = (128, 128);

/// Generation-checked index of a node in a [`crate::TextureGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}.{}", self.index, self.generation)
    }
}

/// The five node shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// No required inputs; optional displacement inputs; explicit size
    Generator,
    /// One input; size follows the input
    Modifier,
    /// Two inputs; size is the componentwise maximum
    Combiner,
    /// Two value inputs and a selector; size is the componentwise maximum
    Selector,
    /// One input placed on a canvas of explicit size
    ScaleCanvas,
}

/// Named input slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Provider,
    Provider2,
    Selector,
    /// Horizontal displacement of a generator's sample point
    OffsetX,
    /// Vertical displacement of a generator's sample point
    OffsetY,
}

impl Kind {
    /// Ports in binding order
    pub fn ports(self) -> &'static [Port] {
        match self {
            Kind::Generator => &[Port::OffsetX, Port::OffsetY],
            Kind::Modifier | Kind::ScaleCanvas => &[Port::Provider],
            Kind::Combiner => &[Port::Provider, Port::Provider2],
            Kind::Selector => &[Port::Provider, Port::Provider2, Port::Selector],
        }
    }

    /// Whether a node of this kind needs every port connected to evaluate
    pub fn requires_inputs(self) -> bool {
        self != Kind::Generator
    }

    /// Slot index of a port, if this kind has it
    pub fn slot(self, port: Port) -> Option<usize> {
        self.ports().iter().position(|&p| p == port)
    }
}

/// How a node produces its pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Compute {
    /// A compute kernel resolved by name
    Kernel(&'static str),
    /// An image filter applied to the single input
    Filter(ImageFilter),
}

/// Shared interface of every parameter record
pub trait TextureOp {
    fn kind(&self) -> Kind;

    fn compute(&self) -> Compute;

    /// Parameter block passed to the kernel
    fn params(&self) -> KernelParams {
        KernelParams::default()
    }

    /// Colour stops for kernels that read them
    fn stops(&self) -> Option<Vec<ColourStopData>> {
        None
    }

    /// Explicit output size, for kinds that do not derive it from their inputs
    fn explicit_size(&self) -> Option<(u32, u32)> {
        None
    }

    /// Rejects parameter values the kernels cannot handle
    fn validate(&self) -> Result<()>;
}

/// Parameter record of any node
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Generator(Generator),
    Modifier(Modifier),
    Combiner(Combiner),
    Selector(Selector),
    ScaleCanvas(ScaleCanvas),
}

impl Operation {
    fn inner(&self) -> &dyn TextureOp {
        match self {
            Operation::Generator(op) => op,
            Operation::Modifier(op) => op,
            Operation::Combiner(op) => op,
            Operation::Selector(op) => op,
            Operation::ScaleCanvas(op) => op,
        }
    }
}

impl TextureOp for Operation {
    fn kind(&self) -> Kind {
        self.inner().kind()
    }

    fn compute(&self) -> Compute {
        self.inner().compute()
    }

    fn params(&self) -> KernelParams {
        self.inner().params()
    }

    fn stops(&self) -> Option<Vec<ColourStopData>> {
        self.inner().stops()
    }

    fn explicit_size(&self) -> Option<(u32, u32)> {
        self.inner().explicit_size()
    }

    fn validate(&self) -> Result<()> {
        self.inner().validate()
    }
}

/// Typed access to the record inside an [`Operation`], used by [`crate::TextureGraph::edit`]
pub trait NodeOperation: TextureOp + Into<Operation> {
    fn from_operation(operation: &Operation) -> Option<&Self>;

    fn from_operation_mut(operation: &mut Operation) -> Option<&mut Self>;
}

macro_rules! node_operation {
    ($variant:ident) => {
        impl From<$variant> for Operation {
            fn from(op: $variant) -> Self {
                Operation::$variant(op)
            }
        }

        impl NodeOperation for $variant {
            fn from_operation(operation: &Operation) -> Option<&Self> {
                match operation {
                    Operation::$variant(op) => Some(op),
                    _ => None,
                }
            }

            fn from_operation_mut(operation: &mut Operation) -> Option<&mut Self> {
                match operation {
                    Operation::$variant(op) => Some(op),
                    _ => None,
                }
            }
        }
    };
}

node_operation!(Generator);
node_operation!(Modifier);
node_operation!(Combiner);
node_operation!(Selector);
node_operation!(ScaleCanvas);

pub(crate) fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition { Ok(()) } else { Err(Error::InvalidArgument(message())) }
}

pub(crate) fn ensure_finite(name: &str, values: &[f32]) -> Result<()> {
    ensure(values.iter().all(|v| v.is_finite()), || format!("{name} must be finite"))
}

pub(crate) fn ensure_size(name: &str, width: u32, height: u32) -> Result<()> {
    ensure(width > 0 && height > 0, || format!("{name} size must be non-zero, got {width}x{height}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ports() {
        assert_eq!(Kind::Generator.slot(Port::OffsetY), Some(1));
        assert_eq!(Kind::Selector.slot(Port::Selector), Some(2));
        assert_eq!(Kind::Modifier.slot(Port::Provider2), None);
        assert_eq!(Kind::ScaleCanvas.ports(), &[Port::Provider]);
        assert!(!Kind::Generator.requires_inputs());
        assert!(Kind::Combiner.requires_inputs());
    }

    #[test]
    fn test_typed_access() {
        let mut operation: Operation = Combiner::Multiply.into();
        assert!(Generator::from_operation(&operation).is_none());

        *Combiner::from_operation_mut(&mut operation).unwrap() = Combiner::Add { normalise: true };
        assert_eq!(operation.compute(), Compute::Kernel("add_combiner"));
        assert_eq!(operation.kind(), Kind::Combiner);
    }
}
