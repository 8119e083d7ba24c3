//! Field session runtime.
//!
//! A `FieldSession` owns the rendered fragment of one field and routes
//! discrete user actions - edits, structural list changes, reference
//! picks - to the renderer, reorder controller and synchronizer. Each
//! action ends with a full recompute scoped to this field's root, so
//! the hidden carrier always holds the canonical value at submission
//! time. Sessions are independent failure domains: nothing here can
//! abort another field's render.

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{RenderError, SessionError};
use crate::fragment::{attr, Fragment, NodeId};
use crate::render::{composite, leaf};
use crate::reorder::{self, ItemGeometry};
use crate::schema::{FieldSchema, ObjectSchema, PrimitiveKind, SlugOptions};
use crate::slug::{SlugChecker, SlugLookup, SlugStatus};
use crate::sync;
use crate::template::{ListKind, ListSpec, TemplateRegistry};
use crate::value::parse_stored;

/// Optional capabilities supplied by the host once per render; the
/// engine never probes for them itself
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub rich_text: bool,
    pub enhanced_media: bool,
}

/// Read-only snapshot passed through the whole recursive render
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub capabilities: Capabilities,
    /// Collection owning the content, scoping reference/slug lookups
    pub collection_id: String,
    /// Content being edited, `None` when creating
    pub content_id: Option<Uuid>,
}

/// Result of the external reference/media picker
#[derive(Debug, Clone)]
pub struct ReferencePick {
    pub id: String,
    pub display_label: String,
    pub preview_url: Option<String>,
}

impl ReferencePick {
    fn to_value(&self) -> Value {
        let mut value = json!({
            "id": self.id,
            "displayLabel": self.display_label,
        });
        if let Some(preview) = &self.preview_url {
            value["previewUrl"] = json!(preview);
        }
        value
    }
}

/// An availability checker bound to one slug control, with the sibling
/// title control it regenerates from resolved at attach time
struct SlugBinding {
    control: NodeId,
    source: Option<NodeId>,
    checker: SlugChecker,
}

/// One rendered field and its attached behaviors
pub struct FieldSession {
    name: String,
    schema: FieldSchema,
    ctx: RenderContext,
    fragment: Fragment,
    root: NodeId,
    templates: TemplateRegistry,
    slug_bindings: Vec<SlugBinding>,
}

impl FieldSession {
    /// Render a field from its schema and stored raw value. Never
    /// fails on bad stored content; malformed JSON renders as empty.
    pub fn render(
        name: &str,
        schema: FieldSchema,
        stored: Option<&str>,
        ctx: RenderContext,
    ) -> Result<Self, RenderError> {
        let value = parse_stored(stored, &schema);
        let mut fragment = Fragment::new("div");
        let container = fragment.root();
        fragment.set_attr(container, "data-field-root", "true");
        let mut templates = TemplateRegistry::new();
        let root = composite::render_field(
            &mut fragment,
            container,
            &schema,
            name,
            name,
            &value,
            &ctx,
            &mut templates,
        );

        for node in fragment.find_all(root, |f, n| f.has_attr(n, attr::COMPOSITE)) {
            sync::attach(&mut fragment, node);
        }

        let mut session = Self {
            name: name.to_string(),
            schema,
            ctx,
            fragment,
            root,
            templates,
            slug_bindings: Vec::new(),
        };
        session.resync()?;
        Ok(session)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    /// Root node of the rendered field
    pub fn field_root(&self) -> NodeId {
        self.root
    }

    pub fn to_html(&self) -> String {
        self.fragment.to_html()
    }

    /// Apply one edit to an editable control, then resynchronize.
    /// Media/reference controls are rejected; they change only through
    /// [`FieldSession::pick_reference`] and [`FieldSession::clear_reference`].
    pub fn edit(&mut self, control: NodeId, value: Value) -> Result<(), SessionError> {
        if !self.fragment.contains(control) || !self.fragment.has_attr(control, attr::CONTROL) {
            return Err(RenderError::NotAControl(control).into());
        }
        let kind = self
            .fragment
            .attr(control, attr::KIND)
            .and_then(PrimitiveKind::parse);
        if matches!(kind, Some(PrimitiveKind::Media | PrimitiveKind::Reference)) {
            return Err(RenderError::NotAControl(control).into());
        }
        let text = value.as_str().map(str::to_string).unwrap_or_default();
        self.fragment.set_value(control, value);
        if kind == Some(PrimitiveKind::Select) {
            leaf::refresh_select_display(&mut self.fragment, control);
        }
        self.route_slug_edit(control, &text);
        self.resync()?;
        Ok(())
    }

    /// Bind an availability checker to a slug-kind leaf. Attaching to
    /// an already-bound leaf is a no-op, like [`sync::attach`]. Returns
    /// whether a new binding was made.
    pub fn attach_slug_checker(
        &mut self,
        wrapper: NodeId,
        lookup: Arc<dyn SlugLookup>,
    ) -> Result<bool, SessionError> {
        if !self.fragment.contains(wrapper) {
            return Err(RenderError::NotAControl(wrapper).into());
        }
        let control = leaf::control_of(&self.fragment, wrapper)
            .ok_or(RenderError::NotAControl(wrapper))?;
        let kind = self
            .fragment
            .attr(control, attr::KIND)
            .and_then(PrimitiveKind::parse);
        if kind != Some(PrimitiveKind::Slug) {
            return Err(RenderError::NotAControl(control).into());
        }
        if self.slug_bindings.iter().any(|b| b.control == control) {
            tracing::debug!(?control, "slug checker already attached; skipping");
            return Ok(false);
        }

        let options = SlugOptions {
            source_field: self
                .fragment
                .attr(control, attr::SOURCE_FIELD)
                .map(str::to_string),
            pattern: self.fragment.attr(control, "pattern").map(str::to_string),
        };
        let source = options
            .source_field
            .as_deref()
            .and_then(|prop| self.sibling_control(wrapper, prop));
        let checker = SlugChecker::new(&self.ctx, &options, lookup);
        self.slug_bindings.push(SlugBinding {
            control,
            source,
            checker,
        });
        Ok(true)
    }

    /// Current availability status of a bound slug leaf
    pub fn slug_status(&self, wrapper: NodeId) -> Option<SlugStatus> {
        let control = leaf::control_of(&self.fragment, wrapper)?;
        self.slug_bindings
            .iter()
            .find(|b| b.control == control)
            .map(|b| b.checker.status())
    }

    /// Await every outstanding availability probe of every binding
    pub async fn settle_slug_checkers(&self) {
        for binding in &self.slug_bindings {
            binding.checker.settle().await;
        }
    }

    /// Feed one control edit to the slug bindings it concerns: direct
    /// slug input, or a title edit a slug regenerates from. Regenerated
    /// slugs are written back before the caller resynchronizes.
    fn route_slug_edit(&mut self, control: NodeId, text: &str) {
        let mut regenerated: Vec<(NodeId, String)> = Vec::new();
        for binding in &self.slug_bindings {
            if binding.control == control {
                binding.checker.on_input(text);
            } else if binding.source == Some(control) {
                binding.checker.on_title_change(text);
                regenerated.push((binding.control, binding.checker.value()));
            }
        }
        for (slug_control, slug) in regenerated {
            self.fragment.set_value(slug_control, Value::String(slug));
        }
    }

    /// Editable control of a sibling leaf within the same object
    fn sibling_control(&self, wrapper: NodeId, prop: &str) -> Option<NodeId> {
        let parent = self.fragment.parent(wrapper)?;
        let sibling = self.fragment.child_with_attr(parent, attr::PROP, prop)?;
        leaf::control_of(&self.fragment, sibling)
    }

    /// Instantiate the array item template at the end of a list
    pub fn add_array_item(&mut self, list: NodeId) -> Result<NodeId, SessionError> {
        self.add_from_template(list, None)
    }

    /// Instantiate a block by definition name at the end of a list
    pub fn add_block(&mut self, list: NodeId, block: &str) -> Result<NodeId, SessionError> {
        self.add_from_template(list, Some(block))
    }

    fn add_from_template(
        &mut self,
        list: NodeId,
        block: Option<&str>,
    ) -> Result<NodeId, SessionError> {
        let index = self.fragment.items(list).len();
        let clone = self.templates.instantiate(list, block, index)?;
        let item = self.fragment.graft(list, None, &clone, &|s| s.to_string());
        self.post_render_init(list, item, block);
        reorder::refresh_list_chrome(&mut self.fragment, list);
        self.resync()?;
        Ok(item)
    }

    /// Post-render initialization scoped to a freshly spliced item:
    /// attach the synchronizer to its composites and register any
    /// nested lists it brought along.
    fn post_render_init(&mut self, list: NodeId, item: NodeId, block: Option<&str>) {
        for node in self
            .fragment
            .find_all(item, |f, n| f.has_attr(n, attr::COMPOSITE))
        {
            sync::attach(&mut self.fragment, node);
        }
        let Some(spec) = self.templates.spec(list).cloned() else {
            return;
        };
        let item_schema = match (&spec.kind, block) {
            (ListKind::Array(item_schema), None) => item_schema.clone(),
            (ListKind::Blocks(blocks), Some(name)) => match blocks.definition(name) {
                Some(def) => ObjectSchema {
                    common: Default::default(),
                    properties: def.properties.clone(),
                    collapse: false,
                },
                None => return,
            },
            _ => return,
        };
        register_item_lists(
            &self.fragment,
            &mut self.templates,
            &self.ctx,
            item,
            &item_schema,
        );
    }

    /// Detach an item from its list. There is no soft-delete or undo
    /// at this layer.
    pub fn remove_item(&mut self, item: NodeId) -> Result<(), SessionError> {
        if !self.fragment.contains(item) || !self.fragment.has_attr(item, attr::ITEM) {
            return Err(crate::error::ReorderError::NotAnItem(item).into());
        }
        let list = self.fragment.parent(item);
        self.fragment.remove(item);
        if let Some(list) = list {
            reorder::refresh_list_chrome(&mut self.fragment, list);
        }
        self.resync()?;
        Ok(())
    }

    pub fn move_item_up(&mut self, item: NodeId) -> Result<(), SessionError> {
        reorder::move_up(&mut self.fragment, item)?;
        self.resync()?;
        Ok(())
    }

    pub fn move_item_down(&mut self, item: NodeId) -> Result<(), SessionError> {
        reorder::move_down(&mut self.fragment, item)?;
        self.resync()?;
        Ok(())
    }

    /// Freeform drag repositioning; see [`reorder::drag_to`] for the
    /// midpoint rule
    pub fn drag_item(
        &mut self,
        item: NodeId,
        pointer_y: f64,
        geometry: &[ItemGeometry],
    ) -> Result<usize, SessionError> {
        let to = reorder::drag_to(&mut self.fragment, item, pointer_y, geometry)?;
        self.resync()?;
        Ok(to)
    }

    /// Store the external picker's result into a media/reference leaf
    pub fn pick_reference(
        &mut self,
        wrapper: NodeId,
        pick: &ReferencePick,
    ) -> Result<(), SessionError> {
        let control = self.ref_control(wrapper)?;
        self.fragment.set_value(control, pick.to_value());
        leaf::refresh_ref_summary(&mut self.fragment, wrapper);
        self.resync()?;
        Ok(())
    }

    pub fn clear_reference(&mut self, wrapper: NodeId) -> Result<(), SessionError> {
        let control = self.ref_control(wrapper)?;
        self.fragment.clear_value(control);
        leaf::refresh_ref_summary(&mut self.fragment, wrapper);
        self.resync()?;
        Ok(())
    }

    fn ref_control(&self, wrapper: NodeId) -> Result<NodeId, SessionError> {
        if !self.fragment.contains(wrapper) {
            return Err(RenderError::NotAControl(wrapper).into());
        }
        let control = leaf::control_of(&self.fragment, wrapper)
            .ok_or(RenderError::NotAControl(wrapper))?;
        let kind = self
            .fragment
            .attr(control, attr::KIND)
            .and_then(PrimitiveKind::parse);
        if !matches!(kind, Some(PrimitiveKind::Media | PrimitiveKind::Reference)) {
            return Err(RenderError::NotAControl(control).into());
        }
        Ok(control)
    }

    /// Serialized canonical value exactly as the surrounding form
    /// would submit it
    pub fn submission_text(&self) -> Result<String, SessionError> {
        if self.schema.is_composite() {
            let carrier = self
                .fragment
                .carrier(self.root)
                .ok_or(RenderError::MissingCarrier)?;
            match self.fragment.value(carrier) {
                Some(Value::String(text)) => Ok(text.clone()),
                _ => Err(RenderError::MissingCarrier.into()),
            }
        } else {
            let value = leaf::read_value(&self.fragment, self.root);
            Ok(serde_json::to_string(&value).map_err(RenderError::Serialize)?)
        }
    }

    /// Parsed canonical value; guaranteed to match the schema's shape
    pub fn submission_value(&self) -> Result<Value, SessionError> {
        let text = self.submission_text()?;
        Ok(serde_json::from_str(&text).map_err(RenderError::Serialize)?)
    }

    fn resync(&mut self) -> Result<(), RenderError> {
        if self.schema.is_composite() {
            sync::recompute(&mut self.fragment, self.root, &self.schema)?;
        }
        Ok(())
    }

    // ========================================
    // Lookup helpers
    // ========================================

    /// Editable control with the given form name
    pub fn control_named(&self, name: &str) -> Option<NodeId> {
        self.fragment.find(self.root, |f, n| {
            f.has_attr(n, attr::CONTROL) && f.attr(n, attr::NAME) == Some(name)
        })
    }

    /// Leaf wrapper whose control has the given form name
    pub fn leaf_named(&self, name: &str) -> Option<NodeId> {
        let control = self.control_named(name)?;
        let mut cursor = self.fragment.parent(control);
        while let Some(node) = cursor {
            if self.fragment.has_attr(node, attr::LEAF) {
                return Some(node);
            }
            cursor = self.fragment.parent(node);
        }
        None
    }

    /// Item list container with the given form name
    pub fn list_named(&self, name: &str) -> Option<NodeId> {
        self.fragment.find(self.root, |f, n| {
            f.has_attr(n, attr::LIST) && f.attr(n, attr::NAME) == Some(name)
        })
    }

    /// Items of a list, in fragment order
    pub fn items(&self, list: NodeId) -> Vec<NodeId> {
        self.fragment.items(list)
    }
}

/// Walk a freshly instantiated item against its schema and register
/// nested lists the template brought along
fn register_item_lists(
    f: &Fragment,
    templates: &mut TemplateRegistry,
    ctx: &RenderContext,
    item: NodeId,
    item_schema: &ObjectSchema,
) {
    let Some(body) = sync::item_body(f, item) else {
        return;
    };
    let props: Vec<_> = match item_schema.collapsed_property() {
        Some(prop) => vec![prop],
        None => item_schema.properties.iter().collect(),
    };
    for prop in props {
        if let Some(child) = f.child_with_attr(body, attr::PROP, &prop.name) {
            register_field_lists(f, templates, ctx, child, &prop.schema);
        }
    }
}

/// Recursive registration over one field node
fn register_field_lists(
    f: &Fragment,
    templates: &mut TemplateRegistry,
    ctx: &RenderContext,
    node: NodeId,
    schema: &FieldSchema,
) {
    match schema {
        FieldSchema::Primitive(_) => {}
        FieldSchema::Object(obj) => {
            let props: Vec<_> = match obj.collapsed_property() {
                Some(prop) => vec![prop],
                None => obj.properties.iter().collect(),
            };
            for prop in props {
                if let Some(child) = f.child_with_attr(node, attr::PROP, &prop.name) {
                    register_field_lists(f, templates, ctx, child, &prop.schema);
                }
            }
        }
        FieldSchema::Array(arr) => {
            if let Some(list) = sync::list_of(f, node) {
                if !templates.is_registered(list) {
                    let base = f.attr(list, attr::NAME).unwrap_or_default().to_string();
                    templates.register_list(
                        list,
                        ListSpec {
                            kind: ListKind::Array((*arr.item).clone()),
                            base_name: base,
                        },
                        ctx,
                    );
                }
                for item in f.items(list) {
                    register_item_lists(f, templates, ctx, item, &arr.item);
                }
            }
        }
        FieldSchema::Blocks(blocks) => {
            if let Some(list) = sync::list_of(f, node) {
                if !templates.is_registered(list) {
                    let base = f.attr(list, attr::NAME).unwrap_or_default().to_string();
                    templates.register_list(
                        list,
                        ListSpec {
                            kind: ListKind::Blocks(blocks.clone()),
                            base_name: base,
                        },
                        ctx,
                    );
                }
                for item in f.items(list) {
                    if f.has_attr(item, attr::OPAQUE) {
                        continue;
                    }
                    let Some(def) = f
                        .attr(item, attr::BLOCK)
                        .and_then(|tag| blocks.definition(tag))
                    else {
                        continue;
                    };
                    let item_schema = ObjectSchema {
                        common: Default::default(),
                        properties: def.properties.clone(),
                        collapse: false,
                    };
                    register_item_lists(f, templates, ctx, item, &item_schema);
                }
            }
        }
    }
}
