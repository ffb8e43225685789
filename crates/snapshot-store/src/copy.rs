use std::collections::{HashMap, VecDeque};

use globalstate_core_types::{Graph, Introspection, Node, NodeId, Value};

use crate::errors::{SnapErrKind, SnapError, SnapResult};
use crate::model::CapturedValue;

/// Copies values out of live state into self-contained graphs.
///
/// Within one copy every source node maps to exactly one copied node, so
/// shared sub-graphs stay shared and cycles stay cycles. Nothing is shared
/// with live state or with other copies.
pub struct DeepCopyEngine<'a, S: Introspection + ?Sized> {
    source: &'a S,
}

impl<'a, S: Introspection + ?Sized> DeepCopyEngine<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub fn copy(&self, value: &Value) -> SnapResult<CapturedValue> {
        self.detach(value).map(CapturedValue::new)
    }

    pub fn detach(&self, value: &Value) -> SnapResult<Graph> {
        let Some(root) = value.node_id() else {
            return Ok(Graph::scalar(value.clone()));
        };

        let heap = self.source.heap();
        // Slots are handed out in queue order, so `nodes[slot]` lines up.
        let mut slots: HashMap<NodeId, NodeId> = HashMap::new();
        let mut queue = VecDeque::new();
        let mut nodes: Vec<Node> = Vec::new();
        slots.insert(root, NodeId(0));
        queue.push_back(root);

        while let Some(source_id) = queue.pop_front() {
            let node = heap.get(source_id).ok_or_else(|| {
                copy_failed(format!("dangling reference {source_id}"))
            })?;
            self.ensure_duplicable(node)?;

            let mut copied = node.clone();
            for child in copied.children_mut() {
                let child_id = match child {
                    Value::Ref(id) => *id,
                    _ => continue,
                };
                let slot = match slots.get(&child_id) {
                    Some(slot) => *slot,
                    None => {
                        let slot = NodeId(slots.len() as u32);
                        slots.insert(child_id, slot);
                        queue.push_back(child_id);
                        slot
                    }
                };
                *child = Value::Ref(slot);
            }
            nodes.push(copied);
        }

        Ok(Graph::new(Value::Ref(NodeId(0)), nodes))
    }

    fn ensure_duplicable(&self, node: &Node) -> SnapResult<()> {
        match node {
            Node::Resource { kind } => Err(copy_failed(format!("resource handle ({kind})"))),
            Node::Closure { .. } => Err(copy_failed("instance of an anonymous type")),
            Node::Object { class, .. } if !self.source.is_serializable(class) => Err(
                copy_failed(format!("instance of non-serializable class {class}")),
            ),
            Node::Array { .. } | Node::Object { .. } => Ok(()),
        }
    }
}

fn copy_failed(message: impl Into<String>) -> SnapError {
    SnapErrKind::CopyFailed(message.into()).into()
}
