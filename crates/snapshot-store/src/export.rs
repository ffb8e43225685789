use std::fmt::Write as _;

use globalstate_core_types::{Graph, Node, NodeId, Value};

use crate::api::Snapshot;
use crate::errors::{SnapErrKind, SnapResult};
use crate::model::CapturedValue;

/// Renders captured globals, constants and settings as source text that
/// recreates them.
///
/// Scalars and arrays holding only scalars (or further such arrays) become
/// literals. Anything else is emitted as `decode("<json>")` over the JSON
/// encoding of the captured graph.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodeExporter;

impl CodeExporter {
    pub fn new() -> Self {
        Self
    }

    /// A `clear globals;` line, then one `set global "name" = <expr>;` line
    /// per captured free global. Running the result leaves exactly the
    /// captured globals defined.
    pub fn export_globals(&self, snapshot: &Snapshot) -> SnapResult<String> {
        if !snapshot.options().global_variables {
            return Err(SnapErrKind::NotCaptured("global variables").into());
        }
        let mut out = String::from("clear globals;\n");
        for (name, value) in snapshot.global_variables() {
            let _ = writeln!(out, "set global {} = {};", quote(name), self.expression(value)?);
        }
        Ok(out)
    }

    /// One `const NAME = <expr>;` line per captured constant.
    pub fn export_constants(&self, snapshot: &Snapshot) -> SnapResult<String> {
        let mut out = String::new();
        for (name, value) in snapshot.constants() {
            let _ = writeln!(out, "const {name} = {};", self.expression(value)?);
        }
        Ok(out)
    }

    /// One `set "name" = <expr>;` line per captured setting.
    pub fn export_settings(&self, snapshot: &Snapshot) -> String {
        let mut out = String::new();
        for (name, setting) in snapshot.settings() {
            let value = match &setting.value {
                Some(text) => quote(text),
                None => String::from("null"),
            };
            let _ = writeln!(out, "set {} = {value};", quote(name));
        }
        out
    }

    /// Globals (when captured), then constants, then settings.
    pub fn export(&self, snapshot: &Snapshot) -> SnapResult<String> {
        let mut out = String::new();
        if snapshot.options().global_variables {
            out.push_str(&self.export_globals(snapshot)?);
        }
        out.push_str(&self.export_constants(snapshot)?);
        out.push_str(&self.export_settings(snapshot));
        Ok(out)
    }

    pub fn expression(&self, value: &CapturedValue) -> SnapResult<String> {
        let graph = value.graph();
        if let Some(text) = literal(graph, graph.root(), &mut Vec::new()) {
            return Ok(text);
        }
        let encoded = serde_json::to_string(graph)
            .map_err(|err| SnapErrKind::Export(format!("encode captured value: {err}")))?;
        Ok(format!("decode({})", quote(&encoded)))
    }
}

fn literal(graph: &Graph, value: &Value, visiting: &mut Vec<NodeId>) -> Option<String> {
    let id = match value {
        Value::Ref(id) => *id,
        scalar => return Some(scalar_literal(scalar)),
    };
    if visiting.contains(&id) {
        return None;
    }
    let Some(Node::Array { entries }) = graph.node(id) else {
        return None;
    };

    visiting.push(id);
    let is_list = entries
        .keys()
        .enumerate()
        .all(|(idx, key)| key.parse::<usize>() == Ok(idx));
    let mut parts = Vec::with_capacity(entries.len());
    for (key, member) in entries {
        let rendered = literal(graph, member, visiting)?;
        if is_list {
            parts.push(rendered);
        } else {
            parts.push(format!("{} => {rendered}", quote(key)));
        }
    }
    visiting.pop();
    Some(format!("[{}]", parts.join(", ")))
}

fn scalar_literal(value: &Value) -> String {
    match value {
        Value::Null => String::from("null"),
        Value::Bool(flag) => flag.to_string(),
        Value::Int(number) => number.to_string(),
        Value::Float(number) if number.is_nan() => String::from("NAN"),
        Value::Float(number) if number.is_infinite() => {
            if number.is_sign_negative() {
                String::from("-INF")
            } else {
                String::from("INF")
            }
        }
        Value::Float(number) => format!("{number:?}"),
        Value::Str(text) => quote(text),
        Value::Ref(id) => format!("{id}"),
    }
}

fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}
