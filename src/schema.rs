//! Field schema model.
//!
//! Collection definitions arrive as loose JSON (`RawFieldSchema`,
//! mirroring whatever the schema source stored) and are normalized
//! exactly once into the closed `FieldSchema` union the renderer and
//! synchronizer work with. Legacy shapes - a select expressed as an
//! `enum` list with parallel labels, an array item collapsed into a
//! single implicit `value` property - are rewritten here, not at
//! render time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::config;
use crate::error::SchemaError;

/// Loose, serde-facing shape of one field definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFieldSchema {
    #[serde(rename = "type")]
    pub field_type: String,
    pub label: Option<String>,
    pub help: Option<String>,
    pub required: Option<bool>,
    pub default: Option<Value>,
    pub placeholder: Option<String>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub step: Option<f64>,
    /// Canonical select options
    pub options: Option<Vec<RawSelectOption>>,
    /// Legacy select shape: values plus an optional parallel label list
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<String>>,
    #[serde(rename = "enumLabels")]
    pub enum_labels: Option<Vec<String>>,
    pub multiple: Option<bool>,
    pub collections: Option<Vec<String>>,
    pub accept: Option<String>,
    #[serde(rename = "sourceField")]
    pub source_field: Option<String>,
    /// Object properties, in declaration order
    pub properties: Option<Map<String, Value>>,
    /// Array item schema
    pub item: Option<Box<RawFieldSchema>>,
    /// Explicit marker for the single-implicit-value convention
    pub collapse: Option<bool>,
    /// Blocks definitions
    pub blocks: Option<Vec<RawBlockDefinition>>,
    pub discriminator: Option<String>,
    /// Unrecognized keys pass through opaquely for per-kind use
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Legacy or canonical select option shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSelectOption {
    Bare(String),
    Labeled { value: String, label: Option<String> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBlockDefinition {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub properties: Map<String, Value>,
}

// ========================================
// Normalized model
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Text,
    Textarea,
    #[serde(rename = "richtext")]
    RichText,
    Number,
    Boolean,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Select,
    Slug,
    Media,
    Reference,
}

impl PrimitiveKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "textarea" => Some(Self::Textarea),
            "richtext" => Some(Self::RichText),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "datetime" => Some(Self::DateTime),
            "select" => Some(Self::Select),
            "slug" => Some(Self::Slug),
            "media" => Some(Self::Media),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::RichText => "richtext",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Select => "select",
            Self::Slug => "slug",
            Self::Media => "media",
            Self::Reference => "reference",
        }
    }
}

/// Options shared by every primitive kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonOptions {
    pub label: Option<String>,
    pub help: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
    /// Unrecognized definition keys, passed through for per-kind use
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextOptions {
    pub pattern: Option<String>,
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumberOptions {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub step: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectOptions {
    pub options: Vec<SelectOption>,
    pub multiple: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlugOptions {
    /// Sibling title-like field the slug auto-generates from
    pub source_field: Option<String>,
    /// Override for the engine-wide slug pattern
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaOptions {
    pub accept: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceOptions {
    /// Collections the reference may point into
    pub collections: Vec<String>,
}

/// Closed per-kind options record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KindOptions {
    Text(TextOptions),
    Number(NumberOptions),
    Select(SelectOptions),
    Slug(SlugOptions),
    Media(MediaOptions),
    Reference(ReferenceOptions),
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimitiveSchema {
    pub kind: PrimitiveKind,
    pub common: CommonOptions,
    pub options: KindOptions,
}

impl PrimitiveSchema {
    pub fn select_options(&self) -> Option<&SelectOptions> {
        match &self.options {
            KindOptions::Select(o) => Some(o),
            _ => None,
        }
    }

    pub fn slug_options(&self) -> Option<&SlugOptions> {
        match &self.options {
            KindOptions::Slug(o) => Some(o),
            _ => None,
        }
    }
}

/// One named property of an object schema, in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub schema: FieldSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub common: CommonOptions,
    pub properties: Vec<Property>,
    /// When set, the object carries its single property's value
    /// directly, without a wrapper mapping
    pub collapse: bool,
}

impl ObjectSchema {
    /// The single property a collapsed object delegates to
    pub fn collapsed_property(&self) -> Option<&Property> {
        if self.collapse {
            self.properties.first()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArraySchema {
    pub common: CommonOptions,
    /// Item shape, uniform across elements. Primitive item schemas are
    /// wrapped into a collapsed single-property object at load time so
    /// items are always object-shaped downstream.
    pub item: Box<ObjectSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocksSchema {
    pub common: CommonOptions,
    /// Property naming which BlockDefinition an item represents
    pub discriminator: String,
    pub definitions: Vec<BlockDefinition>,
}

impl BlocksSchema {
    pub fn definition(&self, name: &str) -> Option<&BlockDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }
}

/// Normalized description of one field's shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldSchema {
    Primitive(PrimitiveSchema),
    Object(ObjectSchema),
    Array(ArraySchema),
    Blocks(BlocksSchema),
}

impl FieldSchema {
    /// Parse and normalize a stored definition in one step
    pub fn from_definition(definition: Value) -> Result<Self, SchemaError> {
        let raw: RawFieldSchema = serde_json::from_value(definition)?;
        normalize(&raw)
    }

    pub fn is_composite(&self) -> bool {
        !matches!(self, FieldSchema::Primitive(_))
    }

    pub fn label(&self) -> Option<&str> {
        self.common().label.as_deref()
    }

    pub fn common(&self) -> &CommonOptions {
        match self {
            FieldSchema::Primitive(p) => &p.common,
            FieldSchema::Object(o) => &o.common,
            FieldSchema::Array(a) => &a.common,
            FieldSchema::Blocks(b) => &b.common,
        }
    }
}

// ========================================
// Normalization
// ========================================

/// Normalize one raw definition into the closed schema union
pub fn normalize(raw: &RawFieldSchema) -> Result<FieldSchema, SchemaError> {
    normalize_at(raw, 0)
}

fn normalize_at(raw: &RawFieldSchema, depth: u32) -> Result<FieldSchema, SchemaError> {
    let max_depth = config().render.max_depth;
    if depth > max_depth {
        return Err(SchemaError::DepthExceeded(max_depth));
    }

    match raw.field_type.as_str() {
        "object" => Ok(FieldSchema::Object(normalize_object(raw, depth)?)),
        "array" => {
            let item_raw = raw.item.as_deref().ok_or_else(|| {
                SchemaError::InvalidDefinition("array field is missing an item schema".into())
            })?;
            let item = match normalize_at(item_raw, depth + 1)? {
                FieldSchema::Object(obj) => obj,
                FieldSchema::Primitive(prim) => wrap_collapsed(prim),
                _ => {
                    return Err(SchemaError::InvalidDefinition(
                        "array items must be primitive or object shaped".into(),
                    ))
                }
            };
            Ok(FieldSchema::Array(ArraySchema {
                common: common_options(raw),
                item: Box::new(item),
            }))
        }
        "blocks" => {
            let defs = raw.blocks.as_deref().unwrap_or(&[]);
            if defs.is_empty() {
                return Err(SchemaError::InvalidDefinition(
                    "blocks field declares no block definitions".into(),
                ));
            }
            let mut definitions = Vec::with_capacity(defs.len());
            for def in defs {
                if def.name.is_empty() {
                    return Err(SchemaError::InvalidDefinition(
                        "block definition is missing a name".into(),
                    ));
                }
                definitions.push(BlockDefinition {
                    name: def.name.clone(),
                    label: def.label.clone().unwrap_or_else(|| def.name.clone()),
                    description: def.description.clone(),
                    properties: normalize_properties(&def.properties, depth + 1)?,
                });
            }
            Ok(FieldSchema::Blocks(BlocksSchema {
                common: common_options(raw),
                discriminator: raw
                    .discriminator
                    .clone()
                    .unwrap_or_else(|| config().render.discriminator.clone()),
                definitions,
            }))
        }
        other => {
            let kind = PrimitiveKind::parse(other)
                .ok_or_else(|| SchemaError::UnknownKind(other.to_string()))?;
            Ok(FieldSchema::Primitive(PrimitiveSchema {
                kind,
                options: kind_options(kind, raw),
                common: common_options(raw),
            }))
        }
    }
}

fn normalize_object(raw: &RawFieldSchema, depth: u32) -> Result<ObjectSchema, SchemaError> {
    let props = raw.properties.as_ref().ok_or_else(|| {
        SchemaError::InvalidDefinition("object field declares no properties".into())
    })?;
    let properties = normalize_properties(props, depth + 1)?;

    // Legacy definitions mark the single-implicit-value shape by naming
    // the lone primitive property "value"; an explicit collapse flag
    // always wins.
    let collapse = raw.collapse.unwrap_or_else(|| {
        properties.len() == 1
            && properties[0].name == "value"
            && matches!(properties[0].schema, FieldSchema::Primitive(_))
    });
    if collapse && properties.len() != 1 {
        return Err(SchemaError::InvalidDefinition(
            "a collapsed object must declare exactly one property".into(),
        ));
    }

    Ok(ObjectSchema {
        common: common_options(raw),
        properties,
        collapse,
    })
}

fn normalize_properties(
    props: &Map<String, Value>,
    depth: u32,
) -> Result<Vec<Property>, SchemaError> {
    let mut out = Vec::with_capacity(props.len());
    for (name, value) in props {
        let raw: RawFieldSchema = serde_json::from_value(value.clone())?;
        out.push(Property {
            name: name.clone(),
            schema: normalize_at(&raw, depth)?,
        });
    }
    Ok(out)
}

/// Wrap a bare primitive item schema into the collapsed object shape
fn wrap_collapsed(prim: PrimitiveSchema) -> ObjectSchema {
    ObjectSchema {
        common: CommonOptions::default(),
        properties: vec![Property {
            name: "value".to_string(),
            schema: FieldSchema::Primitive(prim),
        }],
        collapse: true,
    }
}

fn common_options(raw: &RawFieldSchema) -> CommonOptions {
    CommonOptions {
        label: raw.label.clone(),
        help: raw.help.clone(),
        required: raw.required.unwrap_or(false),
        default: raw.default.clone(),
        extra: raw.extra.clone(),
    }
}

fn kind_options(kind: PrimitiveKind, raw: &RawFieldSchema) -> KindOptions {
    match kind {
        PrimitiveKind::Text | PrimitiveKind::Textarea | PrimitiveKind::RichText => {
            KindOptions::Text(TextOptions {
                pattern: raw.pattern.clone(),
                placeholder: raw.placeholder.clone(),
            })
        }
        PrimitiveKind::Number => KindOptions::Number(NumberOptions {
            minimum: raw.minimum,
            maximum: raw.maximum,
            step: raw.step,
        }),
        PrimitiveKind::Select => KindOptions::Select(SelectOptions {
            options: select_options(raw),
            multiple: raw.multiple.unwrap_or(false),
        }),
        PrimitiveKind::Slug => KindOptions::Slug(SlugOptions {
            source_field: raw.source_field.clone(),
            pattern: raw.pattern.clone(),
        }),
        PrimitiveKind::Media => KindOptions::Media(MediaOptions {
            accept: raw.accept.clone(),
        }),
        PrimitiveKind::Reference => KindOptions::Reference(ReferenceOptions {
            collections: raw.collections.clone().unwrap_or_default(),
        }),
        PrimitiveKind::Boolean | PrimitiveKind::Date | PrimitiveKind::DateTime => {
            KindOptions::None
        }
    }
}

/// Build the canonical option list, folding the legacy enum + parallel
/// label shape into `{value, label}` pairs
fn select_options(raw: &RawFieldSchema) -> Vec<SelectOption> {
    if let Some(options) = &raw.options {
        return options
            .iter()
            .map(|opt| match opt {
                RawSelectOption::Bare(value) => SelectOption {
                    value: value.clone(),
                    label: value.clone(),
                },
                RawSelectOption::Labeled { value, label } => SelectOption {
                    value: value.clone(),
                    label: label.clone().unwrap_or_else(|| value.clone()),
                },
            })
            .collect();
    }

    let values = raw.enum_values.as_deref().unwrap_or(&[]);
    let labels = raw.enum_labels.as_deref().unwrap_or(&[]);
    if !labels.is_empty() && labels.len() != values.len() {
        tracing::warn!(
            values = values.len(),
            labels = labels.len(),
            "select label list does not match enum length; falling back to values"
        );
    }
    values
        .iter()
        .enumerate()
        .map(|(i, value)| SelectOption {
            value: value.clone(),
            label: labels.get(i).cloned().unwrap_or_else(|| value.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(definition: Value) -> FieldSchema {
        FieldSchema::from_definition(definition).expect("definition is valid")
    }

    #[test]
    fn primitive_text_with_options() {
        let schema = parse(json!({
            "type": "text",
            "label": "Title",
            "required": true,
            "pattern": "^.{1,80}$",
            "placeholder": "Post title"
        }));
        let FieldSchema::Primitive(prim) = schema else {
            panic!("expected primitive");
        };
        assert_eq!(prim.kind, PrimitiveKind::Text);
        assert!(prim.common.required);
        let KindOptions::Text(opts) = &prim.options else {
            panic!("expected text options");
        };
        assert_eq!(opts.placeholder.as_deref(), Some("Post title"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = FieldSchema::from_definition(json!({"type": "hologram"})).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownKind(k) if k == "hologram"));
    }

    #[test]
    fn legacy_enum_select_is_normalized() {
        let schema = parse(json!({
            "type": "select",
            "enum": ["draft", "live"],
            "enumLabels": ["Draft", "Published"]
        }));
        let FieldSchema::Primitive(prim) = schema else {
            panic!("expected primitive");
        };
        let opts = prim.select_options().unwrap();
        assert_eq!(
            opts.options,
            vec![
                SelectOption { value: "draft".into(), label: "Draft".into() },
                SelectOption { value: "live".into(), label: "Published".into() },
            ]
        );
    }

    #[test]
    fn mismatched_labels_fall_back_to_values() {
        let schema = parse(json!({
            "type": "select",
            "enum": ["a", "b", "c"],
            "enumLabels": ["Alpha"]
        }));
        let FieldSchema::Primitive(prim) = schema else {
            panic!("expected primitive");
        };
        let opts = prim.select_options().unwrap();
        assert_eq!(opts.options[0].label, "Alpha");
        assert_eq!(opts.options[2].label, "c");
    }

    #[test]
    fn primitive_array_items_collapse() {
        let schema = parse(json!({
            "type": "array",
            "item": {"type": "text"}
        }));
        let FieldSchema::Array(arr) = schema else {
            panic!("expected array");
        };
        assert!(arr.item.collapse);
        assert_eq!(arr.item.properties[0].name, "value");
    }

    #[test]
    fn single_value_object_derives_collapse() {
        let schema = parse(json!({
            "type": "object",
            "properties": {"value": {"type": "number"}}
        }));
        let FieldSchema::Object(obj) = schema else {
            panic!("expected object");
        };
        assert!(obj.collapse);
    }

    #[test]
    fn explicit_collapse_false_wins() {
        let schema = parse(json!({
            "type": "object",
            "collapse": false,
            "properties": {"value": {"type": "number"}}
        }));
        let FieldSchema::Object(obj) = schema else {
            panic!("expected object");
        };
        assert!(!obj.collapse);
    }

    #[test]
    fn blocks_require_definitions() {
        let err = FieldSchema::from_definition(json!({"type": "blocks"})).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefinition(_)));
    }

    #[test]
    fn blocks_get_default_discriminator() {
        let schema = parse(json!({
            "type": "blocks",
            "blocks": [
                {"name": "quote", "properties": {"text": {"type": "textarea"}}}
            ]
        }));
        let FieldSchema::Blocks(blocks) = schema else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.discriminator, "blockType");
        assert_eq!(blocks.definitions[0].label, "quote");
    }

    #[test]
    fn property_order_is_preserved() {
        let schema = parse(json!({
            "type": "object",
            "properties": {
                "zeta": {"type": "text"},
                "alpha": {"type": "text"},
                "mid": {"type": "text"}
            }
        }));
        let FieldSchema::Object(obj) = schema else {
            panic!("expected object");
        };
        let names: Vec<_> = obj.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }
}
