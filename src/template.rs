//! Block template registry.
//!
//! Every array/blocks list gets one inert template fragment per
//! instantiable shape, generated at render time and never mutated.
//! Instantiating clones the template and rewrites the positional
//! placeholder token through the clone's identifiers; the caller
//! splices the clone into the list and re-runs post-render
//! initialization on the new subtree only.

use std::collections::HashMap;

use crate::error::TemplateError;
use crate::fragment::{Fragment, NodeId};
use crate::schema::{BlocksSchema, ObjectSchema};
use crate::session::RenderContext;

/// Positional placeholder rewritten to the insertion index
pub const IDX_TOKEN: &str = "__IDX__";

/// Template key used for the uniform array item shape
const ARRAY_ITEM: &str = "__item__";

/// What a list can instantiate
#[derive(Debug, Clone)]
pub enum ListKind {
    Array(ObjectSchema),
    Blocks(BlocksSchema),
}

/// Registration record for one list node
#[derive(Debug, Clone)]
pub struct ListSpec {
    pub kind: ListKind,
    /// Form-name prefix of the list's items, placeholder included
    pub base_name: String,
}

/// Inert item templates, keyed by list node
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    specs: HashMap<NodeId, ListSpec>,
    templates: HashMap<(NodeId, String), Fragment>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a list and generate its templates. Called once per list
    /// at initial render, and again (for new list nodes only) when an
    /// instantiated item contains nested lists.
    pub fn register_list(&mut self, list: NodeId, spec: ListSpec, ctx: &RenderContext) {
        if self.specs.contains_key(&list) {
            return;
        }
        // Nested lists inside a template get their own registration
        // when an item is instantiated into the live fragment, so
        // template building uses a throwaway registry.
        let mut scratch = TemplateRegistry::new();
        match &spec.kind {
            ListKind::Array(item) => {
                let tpl = crate::render::composite::build_item_template(
                    item,
                    None,
                    &spec.base_name,
                    ctx,
                    &mut scratch,
                );
                self.templates.insert((list, ARRAY_ITEM.to_string()), tpl);
            }
            ListKind::Blocks(blocks) => {
                for def in &blocks.definitions {
                    let item = ObjectSchema {
                        common: Default::default(),
                        properties: def.properties.clone(),
                        collapse: false,
                    };
                    let tpl = crate::render::composite::build_item_template(
                        &item,
                        Some(def),
                        &spec.base_name,
                        ctx,
                        &mut scratch,
                    );
                    self.templates.insert((list, def.name.clone()), tpl);
                }
            }
        }
        tracing::debug!(?list, base = %spec.base_name, "registered list templates");
        self.specs.insert(list, spec);
    }

    pub fn spec(&self, list: NodeId) -> Option<&ListSpec> {
        self.specs.get(&list)
    }

    pub fn is_registered(&self, list: NodeId) -> bool {
        self.specs.contains_key(&list)
    }

    /// Clone a template with the placeholder token rewritten to the
    /// target insertion index. `block` is `None` for the uniform array
    /// item shape. The clone is a standalone fragment rooted at the
    /// item node, ready to graft into the list.
    pub fn instantiate(
        &self,
        list: NodeId,
        block: Option<&str>,
        index: usize,
    ) -> Result<Fragment, TemplateError> {
        if !self.specs.contains_key(&list) {
            return Err(TemplateError::NotAList(list));
        }
        let key = block.unwrap_or(ARRAY_ITEM);
        let template = self
            .templates
            .get(&(list, key.to_string()))
            .ok_or_else(|| TemplateError::UnknownBlock(key.to_string()))?;
        let index_text = index.to_string();
        Ok(template.clone_with(&|s| s.replace(IDX_TOKEN, &index_text)))
    }
}
