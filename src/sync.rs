//! Synchronizer.
//!
//! Keeps every composite's hidden carrier equal to the bottom-up
//! reconstruction of its visible children. Recomputation is always a
//! full re-read in fragment order - never incremental - so one pass is
//! correct no matter how many nested levels changed, and two passes
//! with no intervening edit produce byte-identical carrier text.

use serde_json::{Map, Value};

use crate::error::RenderError;
use crate::fragment::{attr, Fragment, NodeId};
use crate::render::leaf;
use crate::schema::{ArraySchema, BlocksSchema, FieldSchema, ObjectSchema};

/// Attach the synchronizer behavior to a composite root. Attaching to
/// an already-attached root is a no-op; the marker lives on the
/// fragment, not in any process-wide state.
pub fn attach(f: &mut Fragment, root: NodeId) -> bool {
    if f.has_attr(root, attr::SYNCED) {
        tracing::debug!(?root, "synchronizer already attached; skipping");
        return false;
    }
    f.set_attr(root, attr::SYNCED, "true");
    true
}

pub fn is_attached(f: &Fragment, root: NodeId) -> bool {
    f.has_attr(root, attr::SYNCED)
}

/// Recompute the canonical value of the field rooted at `root` and
/// write it (and every nested composite's value) into the hidden
/// carriers. Returns the root's serialized canonical value.
pub fn recompute(
    f: &mut Fragment,
    root: NodeId,
    schema: &FieldSchema,
) -> Result<String, RenderError> {
    let mut writes: Vec<(NodeId, String)> = Vec::new();
    let value = read_field(f, root, schema, &mut writes)?;
    let serialized = match writes.iter().find(|(node, _)| *node == root) {
        Some((_, s)) => s.clone(),
        // Primitive top-level fields have no carrier of their own.
        None => serde_json::to_string(&value)?,
    };
    for (carrier_owner, text) in writes {
        let carrier = f
            .carrier(carrier_owner)
            .ok_or(RenderError::MissingCarrier)?;
        f.set_value(carrier, Value::String(text));
    }
    Ok(serialized)
}

/// Read the current value of any field node per its schema, queueing a
/// carrier write for every composite encountered
fn read_field(
    f: &Fragment,
    node: NodeId,
    schema: &FieldSchema,
    writes: &mut Vec<(NodeId, String)>,
) -> Result<Value, RenderError> {
    let value = match schema {
        FieldSchema::Primitive(_) => leaf::read_value(f, node),
        FieldSchema::Object(obj) => read_object(f, node, obj, writes)?,
        FieldSchema::Array(arr) => read_array(f, node, arr, writes)?,
        FieldSchema::Blocks(blocks) => read_blocks(f, node, blocks, writes)?,
    };
    if schema.is_composite() {
        writes.push((node, serde_json::to_string(&value)?));
    }
    Ok(value)
}

fn read_object(
    f: &Fragment,
    node: NodeId,
    obj: &ObjectSchema,
    writes: &mut Vec<(NodeId, String)>,
) -> Result<Value, RenderError> {
    if let Some(prop) = obj.collapsed_property() {
        let child = prop_child(f, node, &prop.name);
        return match child {
            Some(child) => read_field(f, child, &prop.schema, writes),
            None => Ok(Value::Null),
        };
    }
    let mut map = Map::new();
    for prop in &obj.properties {
        let value = match prop_child(f, node, &prop.name) {
            Some(child) => read_field(f, child, &prop.schema, writes)?,
            None => Value::Null,
        };
        map.insert(prop.name.clone(), value);
    }
    Ok(Value::Object(map))
}

fn read_array(
    f: &Fragment,
    node: NodeId,
    arr: &ArraySchema,
    writes: &mut Vec<(NodeId, String)>,
) -> Result<Value, RenderError> {
    let Some(list) = list_of(f, node) else {
        return Ok(Value::Array(Vec::new()));
    };
    let mut out = Vec::new();
    for item in f.items(list) {
        out.push(read_item(f, item, &arr.item, writes)?);
    }
    Ok(Value::Array(out))
}

fn read_blocks(
    f: &Fragment,
    node: NodeId,
    blocks: &BlocksSchema,
    writes: &mut Vec<(NodeId, String)>,
) -> Result<Value, RenderError> {
    let Some(list) = list_of(f, node) else {
        return Ok(Value::Array(Vec::new()));
    };
    let mut out = Vec::new();
    for item in f.items(list) {
        // Drifted items pass through exactly as stored.
        if f.has_attr(item, attr::OPAQUE) {
            out.push(f.value(item).cloned().unwrap_or(Value::Null));
            continue;
        }
        let Some(def) = f
            .attr(item, attr::BLOCK)
            .and_then(|tag| blocks.definition(tag))
        else {
            tracing::warn!(?item, "blocks item carries no recognizable definition tag");
            continue;
        };
        let item_schema = ObjectSchema {
            common: Default::default(),
            properties: def.properties.clone(),
            collapse: false,
        };
        let mut map = Map::new();
        map.insert(
            blocks.discriminator.clone(),
            Value::String(def.name.clone()),
        );
        if let Value::Object(props) = read_item(f, item, &item_schema, writes)? {
            for (key, value) in props {
                map.insert(key, value);
            }
        }
        out.push(Value::Object(map));
    }
    Ok(Value::Array(out))
}

fn read_item(
    f: &Fragment,
    item: NodeId,
    item_schema: &ObjectSchema,
    writes: &mut Vec<(NodeId, String)>,
) -> Result<Value, RenderError> {
    let Some(body) = item_body(f, item) else {
        return Ok(Value::Null);
    };
    if let Some(prop) = item_schema.collapsed_property() {
        return match prop_child(f, body, &prop.name) {
            Some(child) => read_field(f, child, &prop.schema, writes),
            None => Ok(Value::Null),
        };
    }
    let mut map = Map::new();
    for prop in &item_schema.properties {
        let value = match prop_child(f, body, &prop.name) {
            Some(child) => read_field(f, child, &prop.schema, writes)?,
            None => Value::Null,
        };
        map.insert(prop.name.clone(), value);
    }
    Ok(Value::Object(map))
}

/// The member container of a list item, below its reorder chrome
pub(crate) fn item_body(f: &Fragment, item: NodeId) -> Option<NodeId> {
    f.children(item)
        .iter()
        .copied()
        .find(|&c| f.attr(c, "class") == Some("item-body"))
}

/// Direct child of a composite node occupying a named property
fn prop_child(f: &Fragment, parent: NodeId, name: &str) -> Option<NodeId> {
    f.child_with_attr(parent, attr::PROP, name)
}

/// The ordered item container of an array/blocks composite
pub fn list_of(f: &Fragment, composite: NodeId) -> Option<NodeId> {
    f.children(composite)
        .iter()
        .copied()
        .find(|&c| f.has_attr(c, attr::LIST))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_is_idempotent() {
        let mut f = Fragment::new("div");
        let root = f.root();
        assert!(attach(&mut f, root));
        assert!(!attach(&mut f, root));
        assert!(is_attached(&f, root));
    }
}
