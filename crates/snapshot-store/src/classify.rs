use std::collections::HashSet;

use globalstate_core_types::{Introspection, Node, NodeId, Value};

use crate::model::{UnsafeMember, UnsafeReason};

/// Decides whether a value can be duplicated without sharing or losing
/// external state.
///
/// Each call walks the graph with its own visited set, so cycles terminate
/// and a sub-graph reachable along several paths is inspected once.
pub struct GraphSafetyClassifier<'a, S: Introspection + ?Sized> {
    source: &'a S,
}

impl<'a, S: Introspection + ?Sized> GraphSafetyClassifier<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Scalars are always safe. Stops at the first unsafe member.
    pub fn is_safe_to_duplicate(&self, value: &Value) -> bool {
        self.walk(value, true).is_empty()
    }

    /// Every unsafe member reachable from `value`, each reported once.
    pub fn unsafe_members(&self, value: &Value) -> Vec<UnsafeMember> {
        self.walk(value, false)
    }

    fn walk(&self, value: &Value, stop_at_first: bool) -> Vec<UnsafeMember> {
        let mut found = Vec::new();
        let Some(root) = value.node_id() else {
            return found;
        };

        let heap = self.source.heap();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![(root, String::from("$"))];
        while let Some((id, path)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let reason = match heap.get(id) {
                Some(node) => self.inspect(node),
                None => Some(UnsafeReason::Dangling { node: id }),
            };
            if let Some(reason) = reason {
                found.push(UnsafeMember { path, reason });
                if stop_at_first {
                    break;
                }
                continue;
            }

            let Some(node) = heap.get(id) else {
                continue;
            };
            let children: Vec<(NodeId, String)> = node
                .children()
                .filter_map(|(key, child)| {
                    child
                        .node_id()
                        .filter(|child_id| !visited.contains(child_id))
                        .map(|child_id| (child_id, format!("{path}[{key}]")))
                })
                .collect();
            // Reversed so members pop in declaration order.
            stack.extend(children.into_iter().rev());
        }
        found
    }

    fn inspect(&self, node: &Node) -> Option<UnsafeReason> {
        match node {
            Node::Resource { kind } => Some(UnsafeReason::Resource {
                resource: kind.clone(),
            }),
            Node::Closure { .. } => Some(UnsafeReason::AnonymousType),
            Node::Object { class, .. } if !self.source.is_serializable(class) => {
                Some(UnsafeReason::Unserializable {
                    class: class.clone(),
                })
            }
            Node::Array { .. } | Node::Object { .. } => None,
        }
    }
}
