use std::collections::HashSet;

use crate::value::{Node, NodeId, Value};
use crate::StateError;

/// Slot no arena ever hands out; references that dangle keep dangling here
/// after a collection.
const DANGLING: NodeId = NodeId(u32::MAX);

/// Arena holding every composite reachable from live state.
///
/// An overwritten location simply stops referencing its old node; the node
/// stays until [`Heap::collect`] runs.
#[derive(Clone, Debug, Default)]
pub struct Heap {
    nodes: Vec<Node>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> Result<NodeId, StateError> {
        let id = NodeId(self.reserve(1)?);
        self.nodes.push(node);
        Ok(id)
    }

    /// Allocates `node` and returns a reference value to it.
    pub fn alloc_ref(&mut self, node: Node) -> Result<Value, StateError> {
        self.alloc(node).map(Value::Ref)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the next free slot, provided `count` more slots fit below
    /// [`DANGLING`].
    fn reserve(&self, count: usize) -> Result<u32, StateError> {
        let fits = self
            .nodes
            .len()
            .checked_add(count)
            .and_then(|end| u32::try_from(end).ok())
            .is_some_and(|end| end < DANGLING.0);
        if !fits {
            return Err(StateError::HeapExhausted(count));
        }
        u32::try_from(self.nodes.len()).map_err(|_| StateError::HeapExhausted(count))
    }

    /// Copies a detached graph into the arena and returns the value that
    /// refers to its root. Sharing inside the graph is preserved.
    ///
    /// Fails without touching the arena when a reference inside the graph
    /// points past its own nodes.
    pub fn attach(&mut self, graph: &Graph) -> Result<Value, StateError> {
        graph.check_references()?;
        let base = self.reserve(graph.nodes.len())?;
        let shift = |value: &mut Value| {
            if let Value::Ref(id) = value {
                *id = NodeId(id.0 + base);
            }
        };
        for node in &graph.nodes {
            let mut node = node.clone();
            node.children_mut().for_each(&shift);
            self.nodes.push(node);
        }
        let mut root = graph.root.clone();
        shift(&mut root);
        Ok(root)
    }

    /// Drops every node `roots` cannot reach and compacts the rest.
    ///
    /// Survivors keep their relative order. References inside the arena and
    /// in `roots` are rewritten to the new slots, so any other [`NodeId`]
    /// taken before the call is stale afterwards. Returns the number of nodes
    /// freed.
    pub fn collect<'v, I>(&mut self, roots: I) -> usize
    where
        I: IntoIterator<Item = &'v mut Value>,
    {
        let roots: Vec<&mut Value> = roots.into_iter().collect();
        let mut live = vec![false; self.nodes.len()];
        let mut pending: Vec<NodeId> = roots.iter().filter_map(|root| root.node_id()).collect();
        while let Some(id) = pending.pop() {
            match live.get_mut(id.index()) {
                Some(seen) if !*seen => *seen = true,
                _ => continue,
            }
            pending.extend(
                self.nodes[id.index()]
                    .children()
                    .filter_map(|(_, child)| child.node_id()),
            );
        }

        let mut next = 0u32;
        let remap: Vec<Option<NodeId>> = live
            .iter()
            .map(|&keep| {
                keep.then(|| {
                    let id = NodeId(next);
                    next += 1;
                    id
                })
            })
            .collect();
        let rewrite = |value: &mut Value| {
            if let Value::Ref(id) = value {
                *id = remap.get(id.index()).copied().flatten().unwrap_or(DANGLING);
            }
        };

        let before = self.nodes.len();
        self.nodes = std::mem::take(&mut self.nodes)
            .into_iter()
            .zip(&live)
            .filter(|(_, keep)| **keep)
            .map(|(mut node, _)| {
                node.children_mut().for_each(&rewrite);
                node
            })
            .collect();
        for root in roots {
            rewrite(root);
        }
        before - self.nodes.len()
    }

    /// Structural comparison of a live value against a detached graph.
    ///
    /// Container entries are matched by key, so insertion order is ignored.
    /// Cycles are handled by assuming a pair of nodes equal while it is
    /// being compared.
    pub fn equals_graph(&self, value: &Value, graph: &Graph) -> bool {
        let mut assumed: HashSet<(NodeId, NodeId)> = HashSet::new();
        let mut pending: Vec<(Value, Value)> = vec![(value.clone(), graph.root.clone())];

        while let Some((left, right)) = pending.pop() {
            let (l_id, r_id) = match (&left, &right) {
                (Value::Ref(l), Value::Ref(r)) => (*l, *r),
                (l, r) => {
                    if l != r {
                        return false;
                    }
                    continue;
                }
            };
            if !assumed.insert((l_id, r_id)) {
                continue;
            }
            let (Some(l_node), Some(r_node)) = (self.get(l_id), graph.node(r_id)) else {
                return false;
            };
            match (l_node, r_node) {
                (Node::Array { entries: l }, Node::Array { entries: r })
                | (Node::Closure { bound: l }, Node::Closure { bound: r }) => {
                    if l.len() != r.len() {
                        return false;
                    }
                    for (key, l_value) in l {
                        let Some(r_value) = r.get(key) else {
                            return false;
                        };
                        pending.push((l_value.clone(), r_value.clone()));
                    }
                }
                (
                    Node::Object {
                        class: l_class,
                        fields: l,
                    },
                    Node::Object {
                        class: r_class,
                        fields: r,
                    },
                ) => {
                    if l_class != r_class || l.len() != r.len() {
                        return false;
                    }
                    for (key, l_value) in l {
                        let Some(r_value) = r.get(key) else {
                            return false;
                        };
                        pending.push((l_value.clone(), r_value.clone()));
                    }
                }
                (Node::Resource { kind: l }, Node::Resource { kind: r }) => {
                    if l != r {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

/// A self-contained value: a root plus the nodes it can reach.
///
/// References inside a graph index its own `nodes`, never a [`Heap`].
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Graph {
    root: Value,
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new(root: Value, nodes: Vec<Node>) -> Self {
        Self { root, nodes }
    }

    /// Wraps a scalar. A `Value::Ref` passed here dangles and is rejected
    /// by [`Heap::attach`].
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self {
            root: value.into(),
            nodes: Vec::new(),
        }
    }

    pub fn null() -> Self {
        Self::scalar(Value::Null)
    }

    /// Graph whose root is a single node holding only scalars.
    pub fn single(node: Node) -> Self {
        Self {
            root: Value::Ref(NodeId(0)),
            nodes: vec![node],
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn is_scalar(&self) -> bool {
        self.root.is_scalar()
    }

    /// Root node, when the root is composite.
    pub fn root_node(&self) -> Option<&Node> {
        self.root.node_id().and_then(|id| self.node(id))
    }

    /// Fails on the first reference that points past `nodes`.
    pub fn check_references(&self) -> Result<(), StateError> {
        let members = self
            .nodes
            .iter()
            .flat_map(|node| node.children().map(|(_, child)| child));
        for value in std::iter::once(&self.root).chain(members) {
            if let Some(id) = value.node_id() {
                if id.index() >= self.nodes.len() {
                    return Err(StateError::DanglingReference(id));
                }
            }
        }
        Ok(())
    }
}
