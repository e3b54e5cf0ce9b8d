//! Error types shared by the graph and the backends.

use crate::node::NodeId;

/// Errors produced while building or evaluating a texture graph
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend has no kernel with this name
    #[error("kernel not found: {0}")]
    KernelNotFound(String),

    /// A parameter record or wiring request was rejected
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The id does not refer to a live node of this graph
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Wiring `input` into `node` would make `node` its own ancestor
    #[error("connecting {input} to {node} would create a cycle")]
    Cycle { node: NodeId, input: NodeId },

    /// Sampling was requested on a node that cannot produce output
    #[error("node {0} cannot be evaluated: a required input is not connected")]
    NotEvaluable(NodeId),

    /// Adapter or device acquisition failed, or a kernel failed to compile
    #[error("device error: {0}")]
    Device(String),

    /// A kernel invocation was rejected or failed on the backend
    #[error("dispatch of {kernel} failed: {message}")]
    Dispatch { kernel: String, message: String },

    /// A texture could not be allocated
    #[error("texture allocation failed: {0}")]
    Allocation(String),

    /// Pixel readback failed
    #[error("readback failed: {0}")]
    Readback(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Per-position failure of a batch sample query
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("position ({x}, {y}) is outside the {width}x{height} texture")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },
}
