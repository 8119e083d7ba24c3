//! Leaf control renderer.
//!
//! One primitive kind maps to exactly one control archetype. Each leaf
//! renders as a wrapper node carrying `data-leaf`, with a label, the
//! editable control (`data-control`), and any companion nodes; the
//! matching `read_value` turns the live control state back into a
//! FieldValue for the synchronizer.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::fragment::{attr, Fragment, NodeId};
use crate::schema::{KindOptions, PrimitiveKind, PrimitiveSchema};
use crate::session::RenderContext;

/// Render one primitive field. `prop` is the property name the leaf
/// occupies in its parent object; `name` is the full form input name.
pub fn render(
    f: &mut Fragment,
    parent: NodeId,
    schema: &PrimitiveSchema,
    prop: &str,
    name: &str,
    value: &Value,
    ctx: &RenderContext,
) -> NodeId {
    let wrapper = f.append(parent, "div");
    f.set_attr(wrapper, attr::LEAF, schema.kind.as_str());
    f.set_attr(wrapper, attr::PROP, prop);

    render_label(f, wrapper, schema, prop);

    match schema.kind {
        PrimitiveKind::Text => {
            let control = text_input(f, wrapper, schema, name, "text");
            set_initial(f, control, value);
        }
        PrimitiveKind::Slug => {
            let control = text_input(f, wrapper, schema, name, "text");
            // Carried on the control so an availability checker can be
            // attached after render without the schema in hand.
            if let Some(opts) = schema.slug_options() {
                if let Some(source) = &opts.source_field {
                    f.set_attr(control, attr::SOURCE_FIELD, source.clone());
                }
                if let Some(pattern) = &opts.pattern {
                    f.set_attr(control, "pattern", pattern.clone());
                }
            }
            set_initial(f, control, value);
        }
        PrimitiveKind::Textarea => {
            let control = mark_control(f, wrapper, "textarea", schema.kind, name);
            set_initial(f, control, value);
        }
        PrimitiveKind::RichText => {
            let control = mark_control(f, wrapper, "textarea", schema.kind, name);
            if ctx.capabilities.rich_text {
                f.set_attr(control, "data-enhanced", "rich");
            } else {
                // Field stays editable; the enhancement is just absent.
                let notice = f.append(wrapper, "p");
                f.set_attr(notice, "class", "notice");
                f.set_text(
                    notice,
                    "Rich text editing is unavailable; editing as plain text.",
                );
            }
            set_initial(f, control, value);
        }
        PrimitiveKind::Number => {
            let control = text_input(f, wrapper, schema, name, "number");
            if let KindOptions::Number(opts) = &schema.options {
                if let Some(min) = opts.minimum {
                    f.set_attr(control, "min", min.to_string());
                }
                if let Some(max) = opts.maximum {
                    f.set_attr(control, "max", max.to_string());
                }
                if let Some(step) = opts.step {
                    f.set_attr(control, "step", step.to_string());
                }
            }
            set_initial(f, control, value);
        }
        PrimitiveKind::Boolean => {
            let control = mark_control(f, wrapper, "input", schema.kind, name);
            f.set_attr(control, "type", "checkbox");
            f.set_value(control, Value::Bool(value.as_bool().unwrap_or(false)));
            // Companion marker so an unchecked box is distinguishable
            // from a field absent from the submission.
            let marker = f.append(wrapper, "input");
            f.set_attr(marker, "type", "hidden")
                .set_attr(marker, attr::PRESENT, "true")
                .set_attr(marker, attr::NAME, format!("{name}__present"))
                .set_value(marker, Value::String("1".into()));
        }
        PrimitiveKind::Date => {
            let control = text_input(f, wrapper, schema, name, "date");
            set_initial(f, control, value);
        }
        PrimitiveKind::DateTime => {
            let control = text_input(f, wrapper, schema, name, "datetime-local");
            set_initial(f, control, value);
        }
        PrimitiveKind::Select => {
            let control = mark_control(f, wrapper, "select", schema.kind, name);
            let opts = schema.select_options().cloned().unwrap_or_default();
            if opts.multiple {
                f.set_attr(control, "multiple", "multiple");
            }
            for opt in &opts.options {
                let option = f.append(control, "option");
                f.set_attr(option, "value", opt.value.clone());
                f.set_text(option, opt.label.clone());
            }
            set_initial(f, control, value);
            refresh_select_display(f, control);
        }
        PrimitiveKind::Media | PrimitiveKind::Reference => {
            // The edited value lives in a hidden carrier input mutated
            // only through explicit pick/clear actions; the visible
            // part is a read-only summary.
            let control = mark_control(f, wrapper, "input", schema.kind, name);
            f.set_attr(control, "type", "hidden");
            set_initial(f, control, value);
            let summary = f.append(wrapper, "span");
            f.set_attr(summary, "class", "ref-summary");
            let picker_available =
                schema.kind == PrimitiveKind::Reference || ctx.capabilities.enhanced_media;
            if picker_available {
                let pick = f.append(wrapper, "button");
                f.set_attr(pick, attr::ACTION, "pick");
                f.set_text(pick, if schema.kind == PrimitiveKind::Media { "Choose media" } else { "Select" });
            } else {
                // Summary-only mode: the stored selection stays visible
                // and clearable, but nothing new can be picked.
                let notice = f.append(wrapper, "p");
                f.set_attr(notice, "class", "notice");
                f.set_text(notice, "Media picker is unavailable; the current selection is kept.");
            }
            let clear = f.append(wrapper, "button");
            f.set_attr(clear, attr::ACTION, "clear");
            f.set_text(clear, "Clear");
            refresh_ref_summary(f, wrapper);
        }
    }

    wrapper
}

fn render_label(f: &mut Fragment, wrapper: NodeId, schema: &PrimitiveSchema, prop: &str) {
    let label = f.append(wrapper, "label");
    let text = schema.common.label.clone().unwrap_or_else(|| prop.to_string());
    f.set_text(label, text);
    if schema.common.required {
        f.set_attr(label, "data-required", "true");
        let star = f.append(label, "span");
        f.set_attr(star, "class", "required");
        f.set_text(star, "*");
    }
    if let Some(help) = &schema.common.help {
        let node = f.append(wrapper, "p");
        f.set_attr(node, "class", "help");
        f.set_text(node, help.clone());
    }
}

fn mark_control(
    f: &mut Fragment,
    wrapper: NodeId,
    tag: &str,
    kind: PrimitiveKind,
    name: &str,
) -> NodeId {
    let control = f.append(wrapper, tag);
    f.set_attr(control, attr::CONTROL, "true")
        .set_attr(control, attr::KIND, kind.as_str())
        .set_attr(control, attr::NAME, name);
    control
}

fn text_input(
    f: &mut Fragment,
    wrapper: NodeId,
    schema: &PrimitiveSchema,
    name: &str,
    input_type: &str,
) -> NodeId {
    let control = mark_control(f, wrapper, "input", schema.kind, name);
    f.set_attr(control, "type", input_type);
    if let KindOptions::Text(opts) = &schema.options {
        if let Some(placeholder) = &opts.placeholder {
            f.set_attr(control, "placeholder", placeholder.clone());
        }
        if let Some(pattern) = &opts.pattern {
            f.set_attr(control, "pattern", pattern.clone());
        }
    }
    control
}

fn set_initial(f: &mut Fragment, control: NodeId, value: &Value) {
    if !value.is_null() {
        f.set_value(control, value.clone());
    }
}

/// The editable control node inside a leaf wrapper
pub fn control_of(f: &Fragment, wrapper: NodeId) -> Option<NodeId> {
    f.find(wrapper, |f, n| f.has_attr(n, attr::CONTROL))
}

/// Read the live value back out of a leaf wrapper
pub fn read_value(f: &Fragment, wrapper: NodeId) -> Value {
    let Some(kind) = f.attr(wrapper, attr::LEAF).and_then(PrimitiveKind::parse) else {
        return Value::Null;
    };
    let Some(control) = control_of(f, wrapper) else {
        return Value::Null;
    };
    let live = f.value(control).cloned().unwrap_or(Value::Null);

    match kind {
        PrimitiveKind::Text
        | PrimitiveKind::Textarea
        | PrimitiveKind::RichText
        | PrimitiveKind::Slug => match live {
            Value::String(_) => live,
            Value::Null => Value::String(String::new()),
            other => Value::String(value_as_text(&other)),
        },
        PrimitiveKind::Number => match live {
            Value::Number(_) => live,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        PrimitiveKind::Boolean => Value::Bool(live.as_bool().unwrap_or(false)),
        PrimitiveKind::Date => match live.as_str() {
            Some(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => live,
            _ => Value::Null,
        },
        PrimitiveKind::DateTime => match live.as_str() {
            Some(s) if DateTime::parse_from_rfc3339(s).is_ok() => live,
            _ => Value::Null,
        },
        PrimitiveKind::Select => read_select(f, control, live),
        PrimitiveKind::Media | PrimitiveKind::Reference => match live {
            Value::Object(_) => live,
            _ => Value::Null,
        },
    }
}

/// Single select reads back as a string; multiple select as the
/// ordered list of selected option values (option-list order, with
/// drifted unknown values preserved at the end).
fn read_select(f: &Fragment, control: NodeId, live: Value) -> Value {
    let multiple = f.has_attr(control, "multiple");
    if !multiple {
        return match live {
            Value::String(_) => live,
            _ => Value::Null,
        };
    }

    let selected: Vec<String> = match live {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    };

    let option_values: Vec<&str> = f
        .children(control)
        .iter()
        .filter_map(|&o| f.attr(o, "value"))
        .collect();

    let mut ordered: Vec<Value> = option_values
        .iter()
        .filter(|v| selected.iter().any(|s| s == *v))
        .map(|v| Value::String(v.to_string()))
        .collect();
    for s in &selected {
        if !option_values.iter().any(|v| v == s) {
            ordered.push(Value::String(s.clone()));
        }
    }
    Value::Array(ordered)
}

/// Mirror the live selection onto option `selected` attributes so the
/// serialized HTML matches the control state
pub fn refresh_select_display(f: &mut Fragment, control: NodeId) {
    let selected: Vec<String> = match f.value(control) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    let options: Vec<NodeId> = f.children(control).to_vec();
    for option in options {
        let is_selected = f
            .attr(option, "value")
            .map(|v| selected.iter().any(|s| s == v))
            .unwrap_or(false);
        if is_selected {
            f.set_attr(option, "selected", "selected");
        } else {
            f.remove_attr(option, "selected");
        }
    }
}

/// Recompute the human-readable summary of a media/reference leaf from
/// its hidden carrier input
pub fn refresh_ref_summary(f: &mut Fragment, wrapper: NodeId) {
    let Some(control) = control_of(f, wrapper) else {
        return;
    };
    let text = f
        .value(control)
        .and_then(|v| v.get("displayLabel"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| "Not selected".to_string());
    if let Some(summary) = f.find(wrapper, |f, n| f.attr(n, "class") == Some("ref-summary")) {
        f.set_text(summary, text);
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, PrimitiveSchema};
    use crate::session::{Capabilities, RenderContext};
    use serde_json::json;

    fn prim(definition: Value) -> PrimitiveSchema {
        match FieldSchema::from_definition(definition).unwrap() {
            FieldSchema::Primitive(p) => p,
            _ => panic!("expected primitive"),
        }
    }

    fn ctx() -> RenderContext {
        RenderContext {
            capabilities: Capabilities { rich_text: true, enhanced_media: true },
            collection_id: "posts".into(),
            content_id: None,
        }
    }

    fn no_richtext_ctx() -> RenderContext {
        RenderContext {
            capabilities: Capabilities { rich_text: false, enhanced_media: false },
            ..ctx()
        }
    }

    fn render_one(schema: &PrimitiveSchema, value: Value, ctx: &RenderContext) -> (Fragment, NodeId) {
        let mut f = Fragment::new("div");
        let root = f.root();
        let wrapper = render(&mut f, root, schema, "field", "field", &value, ctx);
        (f, wrapper)
    }

    #[test]
    fn text_round_trips() {
        let schema = prim(json!({"type": "text"}));
        let (f, wrapper) = render_one(&schema, json!("hello"), &ctx());
        assert_eq!(read_value(&f, wrapper), json!("hello"));
    }

    #[test]
    fn empty_text_reads_as_empty_string() {
        let schema = prim(json!({"type": "text"}));
        let (f, wrapper) = render_one(&schema, Value::Null, &ctx());
        assert_eq!(read_value(&f, wrapper), json!(""));
    }

    #[test]
    fn number_parses_string_input() {
        let schema = prim(json!({"type": "number"}));
        let (mut f, wrapper) = render_one(&schema, Value::Null, &ctx());
        let control = control_of(&f, wrapper).unwrap();
        f.set_value(control, json!("3.5"));
        assert_eq!(read_value(&f, wrapper), json!(3.5));
        f.set_value(control, json!("not a number"));
        assert_eq!(read_value(&f, wrapper), Value::Null);
    }

    #[test]
    fn boolean_has_presence_marker_and_reads_false_unchecked() {
        let schema = prim(json!({"type": "boolean"}));
        let (f, wrapper) = render_one(&schema, Value::Null, &ctx());
        assert_eq!(read_value(&f, wrapper), json!(false));
        assert!(f.find(wrapper, |f, n| f.has_attr(n, attr::PRESENT)).is_some());
    }

    #[test]
    fn invalid_date_reads_null() {
        let schema = prim(json!({"type": "date"}));
        let (mut f, wrapper) = render_one(&schema, json!("2024-06-01"), &ctx());
        assert_eq!(read_value(&f, wrapper), json!("2024-06-01"));
        let control = control_of(&f, wrapper).unwrap();
        f.set_value(control, json!("junk"));
        assert_eq!(read_value(&f, wrapper), Value::Null);
    }

    #[test]
    fn multi_select_reads_in_option_order() {
        let schema = prim(json!({
            "type": "select",
            "multiple": true,
            "options": ["red", "green", "blue"]
        }));
        let (mut f, wrapper) = render_one(&schema, Value::Null, &ctx());
        let control = control_of(&f, wrapper).unwrap();
        f.set_value(control, json!(["blue", "red"]));
        assert_eq!(read_value(&f, wrapper), json!(["red", "blue"]));
    }

    #[test]
    fn richtext_falls_back_without_capability() {
        let schema = prim(json!({"type": "richtext"}));
        let (f, wrapper) = render_one(&schema, json!("body"), &no_richtext_ctx());
        let control = control_of(&f, wrapper).unwrap();
        assert!(!f.has_attr(control, "data-enhanced"));
        assert!(f
            .find(wrapper, |f, n| f.attr(n, "class") == Some("notice"))
            .is_some());
        // Still editable.
        assert_eq!(read_value(&f, wrapper), json!("body"));
    }

    #[test]
    fn media_falls_back_to_summary_only_without_capability() {
        let schema = prim(json!({"type": "media"}));
        let stored = json!({"id": "m-1", "displayLabel": "Sunset"});
        let (f, wrapper) = render_one(&schema, stored.clone(), &no_richtext_ctx());
        assert!(f
            .find(wrapper, |f, n| f.attr(n, attr::ACTION) == Some("pick"))
            .is_none());
        assert!(f
            .find(wrapper, |f, n| f.attr(n, "class") == Some("notice"))
            .is_some());
        // The stored selection is still visible and clearable.
        assert!(f
            .find(wrapper, |f, n| f.attr(n, attr::ACTION) == Some("clear"))
            .is_some());
        assert_eq!(read_value(&f, wrapper), stored);
    }

    #[test]
    fn reference_summary_tracks_hidden_value() {
        let schema = prim(json!({"type": "reference", "collections": ["authors"]}));
        let (mut f, wrapper) = render_one(
            &schema,
            json!({"id": "a1", "displayLabel": "Ada"}),
            &ctx(),
        );
        let summary = f
            .find(wrapper, |f, n| f.attr(n, "class") == Some("ref-summary"))
            .unwrap();
        assert_eq!(f.text(summary), Some("Ada"));
        let control = control_of(&f, wrapper).unwrap();
        f.clear_value(control);
        refresh_ref_summary(&mut f, wrapper);
        let summary_text = f.text(summary).unwrap().to_string();
        assert_eq!(summary_text, "Not selected");
        assert_eq!(read_value(&f, wrapper), Value::Null);
    }
}
