//! Composite renderer for object, array and blocks schemas.
//!
//! Each composite renders as one node carrying `data-composite`, a
//! hidden carrier as its first child, and recursively rendered members.
//! List members live under a `data-list` container so item order in
//! the fragment is the canonical order. A blocks item whose
//! discriminator names no definition renders as a passive placeholder
//! holding the stored value untouched.

use serde_json::Value;

use crate::fragment::{attr, Fragment, NodeId};
use crate::render::leaf;
use crate::schema::{
    ArraySchema, BlockDefinition, BlocksSchema, FieldSchema, ObjectSchema,
};
use crate::session::RenderContext;
use crate::template::{ListKind, ListSpec, TemplateRegistry, IDX_TOKEN};
use crate::value::coerce;

/// Render any field (leaf or composite) under `parent`. `prop` is the
/// property name within the enclosing object; `name` the full form
/// input name.
pub fn render_field(
    f: &mut Fragment,
    parent: NodeId,
    schema: &FieldSchema,
    prop: &str,
    name: &str,
    value: &Value,
    ctx: &RenderContext,
    reg: &mut TemplateRegistry,
) -> NodeId {
    match schema {
        FieldSchema::Primitive(prim) => leaf::render(f, parent, prim, prop, name, value, ctx),
        composite => {
            let node = f.append(parent, "div");
            f.set_attr(node, attr::PROP, prop);
            fill_composite(f, node, composite, name, value, ctx, reg);
            node
        }
    }
}

fn fill_composite(
    f: &mut Fragment,
    node: NodeId,
    schema: &FieldSchema,
    name: &str,
    value: &Value,
    ctx: &RenderContext,
    reg: &mut TemplateRegistry,
) {
    render_carrier(f, node, name);
    if let Some(label) = schema.label() {
        let label_node = f.append(node, "label");
        f.set_text(label_node, label.to_string());
    }
    match schema {
        FieldSchema::Object(obj) => fill_object(f, node, obj, name, value, ctx, reg),
        FieldSchema::Array(arr) => fill_array(f, node, arr, name, value, ctx, reg),
        FieldSchema::Blocks(blocks) => fill_blocks(f, node, blocks, name, value, ctx, reg),
        FieldSchema::Primitive(_) => unreachable!("leaf handled by render_field"),
    }
}

/// The hidden carrier is always the composite's first child; the
/// synchronizer fills its value after render.
fn render_carrier(f: &mut Fragment, node: NodeId, name: &str) {
    let carrier = f.append(node, "input");
    f.set_attr(carrier, "type", "hidden")
        .set_attr(carrier, attr::CARRIER, "true")
        .set_attr(carrier, attr::NAME, name);
}

fn fill_object(
    f: &mut Fragment,
    node: NodeId,
    obj: &ObjectSchema,
    name: &str,
    value: &Value,
    ctx: &RenderContext,
    reg: &mut TemplateRegistry,
) {
    f.set_attr(node, attr::COMPOSITE, "object");
    if let Some(prop) = obj.collapsed_property() {
        // A collapsed object carries its single member's value
        // directly, without a wrapper mapping.
        let child_value = coerce(value.clone(), &prop.schema);
        let child_name = format!("{name}.{}", prop.name);
        render_field(f, node, &prop.schema, &prop.name, &child_name, &child_value, ctx, reg);
        return;
    }
    for prop in &obj.properties {
        let child_value = coerce(
            value.get(&prop.name).cloned().unwrap_or(Value::Null),
            &prop.schema,
        );
        let child_name = format!("{name}.{}", prop.name);
        render_field(f, node, &prop.schema, &prop.name, &child_name, &child_value, ctx, reg);
    }
}

fn fill_array(
    f: &mut Fragment,
    node: NodeId,
    arr: &ArraySchema,
    name: &str,
    value: &Value,
    ctx: &RenderContext,
    reg: &mut TemplateRegistry,
) {
    f.set_attr(node, attr::COMPOSITE, "array");
    let list = f.append(node, "div");
    f.set_attr(list, attr::LIST, "true");
    f.set_attr(list, attr::NAME, name);

    let empty = Vec::new();
    let stored = value.as_array().unwrap_or(&empty);
    for (index, item_value) in stored.iter().enumerate() {
        let item = f.append(list, "div");
        f.set_attr(item, attr::ITEM, "true");
        fill_item(f, item, &arr.item, None, &index.to_string(), item_value, name, ctx, reg);
    }

    let add = f.append(node, "button");
    f.set_attr(add, attr::ACTION, "add-item");
    f.set_text(add, "Add item");

    reg.register_list(
        list,
        ListSpec {
            kind: ListKind::Array((*arr.item).clone()),
            base_name: name.to_string(),
        },
        ctx,
    );
    crate::reorder::refresh_list_chrome(f, list);
}

fn fill_blocks(
    f: &mut Fragment,
    node: NodeId,
    blocks: &BlocksSchema,
    name: &str,
    value: &Value,
    ctx: &RenderContext,
    reg: &mut TemplateRegistry,
) {
    f.set_attr(node, attr::COMPOSITE, "blocks");
    f.set_attr(node, "data-discriminator", blocks.discriminator.clone());
    let list = f.append(node, "div");
    f.set_attr(list, attr::LIST, "true");
    f.set_attr(list, attr::NAME, name);

    let empty = Vec::new();
    let stored = value.as_array().unwrap_or(&empty);
    for (index, item_value) in stored.iter().enumerate() {
        render_block_item(f, list, blocks, index, item_value, name, ctx, reg);
    }

    // Type selector plus add action, listing every definition.
    let picker = f.append(node, "select");
    f.set_attr(picker, attr::ACTION, "block-picker");
    for def in &blocks.definitions {
        let option = f.append(picker, "option");
        f.set_attr(option, "value", def.name.clone());
        f.set_text(option, def.label.clone());
        if let Some(description) = &def.description {
            f.set_attr(option, "title", description.clone());
        }
    }
    let add = f.append(node, "button");
    f.set_attr(add, attr::ACTION, "add-block");
    f.set_text(add, "Add block");

    reg.register_list(
        list,
        ListSpec {
            kind: ListKind::Blocks(blocks.clone()),
            base_name: name.to_string(),
        },
        ctx,
    );
    crate::reorder::refresh_list_chrome(f, list);
}

fn render_block_item(
    f: &mut Fragment,
    list: NodeId,
    blocks: &BlocksSchema,
    index: usize,
    item_value: &Value,
    base_name: &str,
    ctx: &RenderContext,
    reg: &mut TemplateRegistry,
) {
    let item = f.append(list, "div");
    f.set_attr(item, attr::ITEM, "true");

    let tag = item_value
        .get(&blocks.discriminator)
        .and_then(|v| v.as_str());
    let definition = tag.and_then(|t| blocks.definition(t));

    match definition {
        Some(def) => {
            f.set_attr(item, attr::BLOCK, def.name.clone());
            let item_schema = ObjectSchema {
                common: Default::default(),
                properties: def.properties.clone(),
                collapse: false,
            };
            fill_item(
                f,
                item,
                &item_schema,
                Some(def),
                &index.to_string(),
                item_value,
                base_name,
                ctx,
                reg,
            );
        }
        None => {
            // Schema drift: hold the stored value verbatim behind a
            // passive placeholder. It keeps its position and survives
            // serialization byte-for-byte, but gets no controls.
            tracing::warn!(
                tag = tag.unwrap_or("<missing>"),
                "blocks item has no matching definition; preserving opaquely"
            );
            f.set_attr(item, attr::OPAQUE, "true");
            f.set_value(item, item_value.clone());
            item_chrome(f, item, false);
            let notice = f.append(item, "p");
            f.set_attr(notice, "class", "opaque-notice");
            f.set_text(
                notice,
                format!(
                    "Unknown block type '{}'. The stored content is kept as-is.",
                    tag.unwrap_or("?")
                ),
            );
        }
    }
}

/// Decorate an existing item node with chrome and member controls.
/// `idx` is a literal index or the template placeholder token.
pub(crate) fn fill_item(
    f: &mut Fragment,
    item: NodeId,
    item_schema: &ObjectSchema,
    block: Option<&BlockDefinition>,
    idx: &str,
    value: &Value,
    base_name: &str,
    ctx: &RenderContext,
    reg: &mut TemplateRegistry,
) {
    item_chrome(f, item, true);
    if let Some(def) = block {
        let title = f.append(item, "span");
        f.set_attr(title, "class", "block-title");
        f.set_text(title, def.label.clone());
    }

    let body = f.append(item, "div");
    f.set_attr(body, "class", "item-body");
    if let Some(prop) = item_schema.collapsed_property() {
        let child_value = coerce(value.clone(), &prop.schema);
        let child_name = format!("{base_name}.{idx}.{}", prop.name);
        render_field(f, body, &prop.schema, &prop.name, &child_name, &child_value, ctx, reg);
    } else {
        for prop in &item_schema.properties {
            let child_value = coerce(
                value.get(&prop.name).cloned().unwrap_or(Value::Null),
                &prop.schema,
            );
            let child_name = format!("{base_name}.{idx}.{}", prop.name);
            render_field(f, body, &prop.schema, &prop.name, &child_name, &child_value, ctx, reg);
        }
    }
}

/// Reorder and removal affordances for one item. Opaque placeholders
/// keep their position controls but cannot be removed here.
fn item_chrome(f: &mut Fragment, item: NodeId, removable: bool) {
    let handle = f.append(item, "span");
    f.set_attr(handle, attr::HANDLE, "true");
    let order = f.append(item, "span");
    f.set_attr(order, attr::ORDER_LABEL, "true");
    let up = f.append(item, "button");
    f.set_attr(up, attr::ACTION, "move-up");
    f.set_text(up, "Move up");
    let down = f.append(item, "button");
    f.set_attr(down, attr::ACTION, "move-down");
    f.set_text(down, "Move down");
    if removable {
        let remove = f.append(item, "button");
        f.set_attr(remove, attr::ACTION, "remove");
        f.set_text(remove, "Remove");
    }
}

/// Build the inert item template for a list: an item rendered with an
/// empty value and the placeholder token in place of its index.
pub(crate) fn build_item_template(
    item_schema: &ObjectSchema,
    block: Option<&BlockDefinition>,
    base_name: &str,
    ctx: &RenderContext,
    reg: &mut TemplateRegistry,
) -> Fragment {
    let mut f = Fragment::new("div");
    let item = f.root();
    f.set_attr(item, attr::ITEM, "true");
    if let Some(def) = block {
        f.set_attr(item, attr::BLOCK, def.name.clone());
    }
    fill_item(
        &mut f,
        item,
        item_schema,
        block,
        IDX_TOKEN,
        &Value::Null,
        base_name,
        ctx,
        reg,
    );
    f
}
