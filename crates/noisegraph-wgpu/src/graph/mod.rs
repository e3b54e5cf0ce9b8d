//! Node arena and the pull-based evaluation protocol.
//!
//! Nodes are owned by a [`TextureGraph`] and wired together by [`NodeId`]. Asking for a
//! node's output walks its inputs depth first, recomputes whatever is stale and returns
//! the cached texture. A node is stale when its own parameters or wiring changed, when
//! it has never been computed, or when an input has been recomputed since the node last
//! consumed it. Recompute versions make a shared ancestor run once per change no matter
//! how many consumers pull it.

mod sample;

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use image::{Rgba, RgbaImage};

pub use sample::Position;

use crate::{
    Error, Result,
    backend::{Context, Invocation, KernelId, TextureHandle},
    node::{Compute, DEFAULT_SIZE, Kind, NodeId, NodeOperation, Operation, Port, TextureOp},
};

const MAX_PORTS: usize = 3;

/// Value of the texture bound to unconnected generator offset ports
const NEUTRAL_GREY: u8 = 128;

#[derive(Debug)]
struct Node {
    operation: Operation,
    /// Resolved kernel; `None` for filter operations
    kernel: Option<KernelId>,
    inputs: [Option<NodeId>; MAX_PORTS],
    dirty: bool,
    /// Bumped on every successful recompute; 0 means never computed
    version: u64,
    /// Input versions consumed by the last recompute
    seen: [u64; MAX_PORTS],
    output: Option<TextureHandle>,
}

/// Per-call memo so shared ancestors are walked once
#[derive(Debug, Default)]
struct Walk {
    producing: HashMap<NodeId, bool>,
    sizes: HashMap<NodeId, (u32, u32)>,
    stale: HashMap<NodeId, bool>,
    outputs: HashMap<NodeId, Option<TextureHandle>>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena of texture nodes sharing one compute context
pub struct TextureGraph {
    context: Context,
    slots: Vec<Slot>,
    free: Vec<u32>,
    neutral: Option<TextureHandle>,
}

impl fmt::Debug for TextureGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureGraph").field("nodes", &self.len()).field("neutral", &self.neutral).finish_non_exhaustive()
    }
}

impl TextureGraph {
    /// Creates an empty graph evaluating on `context`
    pub fn new(context: Context) -> Self {
        Self {
            context,
            slots: Vec::new(),
            free: Vec::new(),
            neutral: None,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` refers to a live node of this graph
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Ids of all live nodes in slot order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().zip(0u32..).filter(|(slot, _)| slot.node.is_some()).map(|(slot, index)| NodeId {
            index,
            generation: slot.generation,
        })
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or(Error::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(Error::UnknownNode(id))
    }

    fn resolve(&self, operation: &Operation) -> Result<Option<KernelId>> {
        match operation.compute() {
            Compute::Kernel(name) => self.context.resolve_kernel(name).map(Some),
            Compute::Filter(_) => Ok(None),
        }
    }

    /// Adds a node with no inputs connected
    ///
    /// # Arguments
    /// * `operation` - Parameter record of any node kind
    ///
    /// # Returns
    /// The new node's id. The node starts dirty with no cached output.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] when the parameters are rejected and
    /// [`Error::KernelNotFound`] when the backend cannot resolve the node's kernel.
    pub fn add(&mut self, operation: impl Into<Operation>) -> Result<NodeId> {
        let operation = operation.into();
        operation.validate()?;
        let kernel = self.resolve(&operation)?;

        let node = Node {
            operation,
            kernel,
            inputs: [None; MAX_PORTS],
            dirty: true,
            version: 0,
            seen: [0; MAX_PORTS],
            output: None,
        };

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(node) });
                NodeId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        tracing::debug!(node = %id, "added node");
        Ok(id)
    }

    /// Removes a node, releasing its texture
    ///
    /// Every port that referenced the node is disconnected and its owner marked dirty.
    /// The id becomes stale; a later node may reuse the slot under a new generation.
    pub fn remove(&mut self, id: NodeId) -> Result<Operation> {
        self.get(id)?;
        let slot = &mut self.slots[id.index as usize];
        let node = slot.node.take().ok_or(Error::UnknownNode(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        if let Some(output) = node.output {
            self.context.release(output);
        }
        for other in self.slots.iter_mut().filter_map(|slot| slot.node.as_mut()) {
            for input in other.inputs.iter_mut() {
                if *input == Some(id) {
                    *input = None;
                    other.dirty = true;
                }
            }
        }
        tracing::debug!(node = %id, "removed node");
        Ok(node.operation)
    }

    fn port_slot(&self, id: NodeId, port: Port) -> Result<usize> {
        let kind = self.get(id)?.operation.kind();
        kind.slot(port).ok_or_else(|| Error::InvalidArgument(format!("{kind:?} node {id} has no {port:?} port")))
    }

    /// Whether `target` is `from` or one of its ancestors
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut stack = vec![from];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.node(id) {
                stack.extend(node.inputs.iter().flatten());
            }
        }
        false
    }

    /// Wires `input` into a port of `node`, replacing any previous connection
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] when the node kind has no such port and
    /// [`Error::Cycle`] when `node` is `input` or one of its ancestors.
    pub fn connect(&mut self, node: NodeId, port: Port, input: NodeId) -> Result<()> {
        self.get(input)?;
        let slot = self.port_slot(node, port)?;
        if self.reaches(input, node) {
            return Err(Error::Cycle { node, input });
        }

        let target = self.get_mut(node)?;
        target.inputs[slot] = Some(input);
        target.dirty = true;
        Ok(())
    }

    /// Clears a port, returning the node that was connected to it
    pub fn disconnect(&mut self, node: NodeId, port: Port) -> Result<Option<NodeId>> {
        let slot = self.port_slot(node, port)?;
        let target = self.get_mut(node)?;
        let previous = target.inputs[slot].take();
        if previous.is_some() {
            target.dirty = true;
        }
        Ok(previous)
    }

    /// Node connected to a port, if any
    pub fn input(&self, node: NodeId, port: Port) -> Result<Option<NodeId>> {
        let slot = self.port_slot(node, port)?;
        Ok(self.get(node)?.inputs[slot])
    }

    /// Mutates a node's parameter record in place
    ///
    /// The closure runs on a copy; the copy is validated and its kernel resolved before it
    /// replaces the node's record. The node is marked dirty even if nothing changed.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] when `T` is not the node's record type or the edited
    /// record is rejected, [`Error::KernelNotFound`] when the new kernel cannot be resolved.
    /// A failed edit leaves the node untouched.
    pub fn edit<T: NodeOperation>(&mut self, id: NodeId, edit: impl FnOnce(&mut T)) -> Result<()> {
        let mut operation = self.get(id)?.operation.clone();
        let kind = operation.kind();
        let record = T::from_operation_mut(&mut operation)
            .ok_or_else(|| Error::InvalidArgument(format!("{id} is a {kind:?} node and holds a different parameter record")))?;
        edit(record);
        self.commit(id, operation)
    }

    /// Replaces a node's parameter record; the node kind must not change
    pub fn replace(&mut self, id: NodeId, operation: impl Into<Operation>) -> Result<()> {
        let operation = operation.into();
        let kind = self.get(id)?.operation.kind();
        if operation.kind() != kind {
            return Err(Error::InvalidArgument(format!("{id} is a {kind:?} node, not a {:?} node", operation.kind())));
        }
        self.commit(id, operation)
    }

    fn commit(&mut self, id: NodeId, operation: Operation) -> Result<()> {
        operation.validate()?;
        let kernel = self.resolve(&operation)?;
        let node = self.get_mut(id)?;
        node.operation = operation;
        node.kernel = kernel;
        node.dirty = true;
        Ok(())
    }

    /// The node's parameter record
    pub fn operation(&self, id: NodeId) -> Result<&Operation> {
        Ok(&self.get(id)?.operation)
    }

    /// The node's parameter record as its concrete type, if it is one
    pub fn operation_as<T: NodeOperation>(&self, id: NodeId) -> Result<Option<&T>> {
        Ok(T::from_operation(&self.get(id)?.operation))
    }

    pub fn kind(&self, id: NodeId) -> Result<Kind> {
        Ok(self.get(id)?.operation.kind())
    }

    /// Whether every port the node kind requires is connected
    ///
    /// Generators can always evaluate. This does not look further upstream; a node whose
    /// input cannot produce output yields no output either.
    pub fn can_evaluate(&self, id: NodeId) -> Result<bool> {
        let node = self.get(id)?;
        let kind = node.operation.kind();
        Ok(!kind.requires_inputs() || node.inputs[..kind.ports().len()].iter().all(Option::is_some))
    }

    fn produces_output(&self, id: NodeId, walk: &mut Walk) -> bool {
        if let Some(&known) = walk.producing.get(&id) {
            return known;
        }
        let produces = match self.node(id) {
            None => false,
            Some(node) => {
                let kind = node.operation.kind();
                !kind.requires_inputs()
                    || node.inputs[..kind.ports().len()]
                        .iter()
                        .all(|input| input.is_some_and(|input| self.produces_output(input, walk)))
            }
        };
        walk.producing.insert(id, produces);
        produces
    }

    /// Output size the node computes at
    ///
    /// Generators and canvases report their explicit size. A modifier mirrors its input;
    /// combiners and selectors take the componentwise maximum over connected inputs.
    /// Without inputs the size is [`DEFAULT_SIZE`].
    pub fn size(&self, id: NodeId) -> Result<(u32, u32)> {
        self.size_in(id, &mut Walk::default())
    }

    fn size_in(&self, id: NodeId, walk: &mut Walk) -> Result<(u32, u32)> {
        if let Some(&size) = walk.sizes.get(&id) {
            return Ok(size);
        }
        let node = self.get(id)?;
        let size = match node.operation.explicit_size() {
            Some(size) => size,
            None => {
                let mut size: Option<(u32, u32)> = None;
                for input in node.inputs.iter().flatten() {
                    let (width, height) = self.size_in(*input, walk)?;
                    size = Some(match size {
                        Some((w, h)) => (w.max(width), h.max(height)),
                        None => (width, height),
                    });
                }
                size.unwrap_or(DEFAULT_SIZE)
            }
        };
        walk.sizes.insert(id, size);
        Ok(size)
    }

    /// Whether the node or anything upstream of it is stale
    ///
    /// True when the next [`Self::output`] call would recompute this node or an ancestor,
    /// and also while any connected input, offset ports included, cannot produce output.
    pub fn is_dirty(&self, id: NodeId) -> Result<bool> {
        self.get(id)?;
        Ok(self.needs_update(id, &mut Walk::default()))
    }

    fn needs_update(&self, id: NodeId, walk: &mut Walk) -> bool {
        if let Some(&stale) = walk.stale.get(&id) {
            return stale;
        }
        let stale = match self.node(id) {
            None => false,
            Some(node) if node.dirty || node.output.is_none() => true,
            Some(node) => node.inputs.iter().zip(node.seen).any(|(input, seen)| match input {
                Some(input) => {
                    let moved = if self.produces_output(*input, walk) {
                        self.node(*input).is_none_or(|n| n.version != seen)
                    } else {
                        seen != 0
                    };
                    moved || self.needs_update(*input, walk)
                }
                None => seen != 0,
            }),
        };
        walk.stale.insert(id, stale);
        stale
    }

    /// Evaluates a node, recomputing stale ancestors first
    ///
    /// # Returns
    /// The node's texture, or `None` when the node or a required ancestor is not fully
    /// wired. The handle stays valid until the node recomputes at a different size or
    /// is removed.
    ///
    /// # Errors
    /// Allocation and dispatch failures propagate; the failing node stays dirty and is
    /// retried on the next call.
    pub fn output(&mut self, id: NodeId) -> Result<Option<TextureHandle>> {
        self.get(id)?;
        self.evaluate(id, &mut Walk::default())
    }

    /// Each node is visited once per walk; shared ancestors return their first result
    fn evaluate(&mut self, id: NodeId, walk: &mut Walk) -> Result<Option<TextureHandle>> {
        if let Some(&output) = walk.outputs.get(&id) {
            return Ok(output);
        }
        let output = self.evaluate_node(id, walk)?;
        walk.outputs.insert(id, output);
        Ok(output)
    }

    fn evaluate_node(&mut self, id: NodeId, walk: &mut Walk) -> Result<Option<TextureHandle>> {
        if !self.can_evaluate(id)? {
            return Ok(None);
        }
        let node = self.get(id)?;
        let kind = node.operation.kind();
        let inputs = node.inputs;
        let ports = kind.ports().len();

        let mut bound: [Option<TextureHandle>; MAX_PORTS] = [None; MAX_PORTS];
        let mut versions = [0; MAX_PORTS];
        for slot in 0..ports {
            let Some(input) = inputs[slot] else {
                continue;
            };
            match self.evaluate(input, walk)? {
                Some(handle) => {
                    bound[slot] = Some(handle);
                    versions[slot] = self.get(input)?.version;
                }
                None if kind.requires_inputs() => return Ok(None),
                None => {}
            }
        }

        let node = self.get(id)?;
        if let Some(output) = node.output
            && !node.dirty
            && node.seen == versions
        {
            tracing::trace!(node = %id, "cache hit");
            return Ok(Some(output));
        }

        let mut handles = Vec::with_capacity(ports);
        for handle in &bound[..ports] {
            handles.push(match handle {
                Some(handle) => *handle,
                None => self.neutral()?,
            });
        }

        let (width, height) = self.size_in(id, walk)?;
        let output = self.ensure_output(id, width, height)?;

        let node = self.get(id)?;
        let label = match node.operation.compute() {
            Compute::Kernel(name) => {
                let kernel = match node.kernel {
                    Some(kernel) => kernel,
                    None => self.context.resolve_kernel(name)?,
                };
                let params = node.operation.params();
                let stops = node.operation.stops();
                let invocation = Invocation {
                    uniforms: params.as_bytes(),
                    stops: stops.as_deref().map(bytemuck::cast_slice),
                    inputs: &handles,
                    output,
                    extent: (width, height),
                };
                self.context.dispatch(kernel, &invocation)?;
                name
            }
            Compute::Filter(filter) => {
                self.context.apply_filter(&filter, handles[0], output)?;
                "filter"
            }
        };

        let node = self.get_mut(id)?;
        node.dirty = false;
        node.version += 1;
        node.seen = versions;
        tracing::debug!(node = %id, kernel = label, width, height, version = node.version, "recomputed");
        Ok(Some(output))
    }

    /// Returns the node's texture, reallocating it when the size changed
    fn ensure_output(&mut self, id: NodeId, width: u32, height: u32) -> Result<TextureHandle> {
        let current = self.get(id)?.output;
        if let Some(texture) = current {
            if texture.size() == (width, height) {
                return Ok(texture);
            }
            tracing::debug!(node = %id, from = ?texture.size(), to = ?(width, height), "reallocating output");
            self.context.release(texture);
            self.get_mut(id)?.output = None;
        }

        let texture = self.context.allocate(width, height)?;
        self.get_mut(id)?.output = Some(texture);
        Ok(texture)
    }

    /// 1x1 mid-grey texture standing in for unconnected offset ports
    fn neutral(&mut self) -> Result<TextureHandle> {
        if let Some(texture) = self.neutral {
            return Ok(texture);
        }
        let texture = self.context.allocate(1, 1)?;
        let grey = RgbaImage::from_pixel(1, 1, Rgba([NEUTRAL_GREY, NEUTRAL_GREY, NEUTRAL_GREY, 255]));
        if let Err(e) = self.context.upload(texture, &grey) {
            self.context.release(texture);
            return Err(e);
        }
        self.neutral = Some(texture);
        Ok(texture)
    }
}

impl Drop for TextureGraph {
    fn drop(&mut self) {
        let outputs = self.slots.iter().filter_map(|slot| slot.node.as_ref()).filter_map(|node| node.output);
        for texture in outputs.chain(self.neutral) {
            self.context.release(texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        CpuBackend,
        node::{Combiner, Generator, Modifier},
    };

    fn graph() -> TextureGraph {
        TextureGraph::new(Arc::new(CpuBackend::new()))
    }

    #[test]
    fn test_stale_id_is_rejected() {
        let mut graph = graph();
        let id = graph.add(Generator::default()).unwrap();
        graph.remove(id).unwrap();
        assert!(matches!(graph.is_dirty(id), Err(Error::UnknownNode(_))));

        let reused = graph.add(Generator::default()).unwrap();
        assert_eq!(reused.index, id.index);
        assert_ne!(reused, id);
        assert!(!graph.contains(id));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_wrong_port_is_rejected() {
        let mut graph = graph();
        let source = graph.add(Generator::default()).unwrap();
        let invert = graph.add(Modifier::Invert).unwrap();
        let err = graph.connect(invert, Port::Provider2, source).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!graph.can_evaluate(invert).unwrap());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut graph = graph();
        let source = graph.add(Generator::default()).unwrap();
        let a = graph.add(Modifier::Invert).unwrap();
        let b = graph.add(Modifier::Invert).unwrap();
        graph.connect(a, Port::Provider, source).unwrap();
        graph.connect(b, Port::Provider, a).unwrap();

        assert!(matches!(graph.connect(a, Port::Provider, b), Err(Error::Cycle { .. })));
        assert!(matches!(graph.connect(a, Port::Provider, a), Err(Error::Cycle { .. })));
        // The rejected connection leaves the old one in place
        assert_eq!(graph.input(a, Port::Provider).unwrap(), Some(source));
    }

    #[test]
    fn test_replace_keeps_kind() {
        let mut graph = graph();
        let add = graph.add(Combiner::Add { normalise: false }).unwrap();
        graph.replace(add, Combiner::Max).unwrap();
        assert_eq!(graph.operation_as::<Combiner>(add).unwrap(), Some(&Combiner::Max));
        assert!(matches!(graph.replace(add, Modifier::Invert), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_remove_disconnects_consumers() {
        let mut graph = graph();
        let source = graph.add(Generator::default()).unwrap();
        let invert = graph.add(Modifier::Invert).unwrap();
        graph.connect(invert, Port::Provider, source).unwrap();
        graph.output(invert).unwrap().unwrap();
        assert!(!graph.is_dirty(invert).unwrap());

        graph.remove(source).unwrap();
        assert_eq!(graph.input(invert, Port::Provider).unwrap(), None);
        assert!(graph.is_dirty(invert).unwrap());
        assert_eq!(graph.output(invert).unwrap(), None);
    }
}
