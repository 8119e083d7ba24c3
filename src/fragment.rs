//! Abstract fragment tree.
//!
//! A `Fragment` stands in for the rendered DOM subtree of one field: a
//! tree of element-like nodes with attributes, optional text, and an
//! optional live control value. Structural mutations (append, remove,
//! reorder, graft) are synchronous; node ids stay stable across them.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Well-known attribute names shared by the renderer, synchronizer and
/// reorder controller.
pub mod attr {
    /// Form input name of a control or carrier
    pub const NAME: &str = "name";
    /// Primitive kind of an editable control
    pub const KIND: &str = "data-kind";
    /// Marks the editable control inside a leaf wrapper
    pub const CONTROL: &str = "data-control";
    /// Marks the hidden canonical-value carrier of a composite
    pub const CARRIER: &str = "data-carrier";
    /// Marks a leaf field wrapper; value is the primitive kind
    pub const LEAF: &str = "data-leaf";
    /// Marks a composite field root; value is object/array/blocks
    pub const COMPOSITE: &str = "data-composite";
    /// Property name a leaf or composite occupies inside its parent object
    pub const PROP: &str = "data-prop";
    /// Marks the ordered container of array/blocks items
    pub const LIST: &str = "data-list";
    /// Marks one array/blocks item root
    pub const ITEM: &str = "data-item";
    /// Block definition name of a recognized blocks item
    pub const BLOCK: &str = "data-block";
    /// Marks a drifted blocks item held verbatim
    pub const OPAQUE: &str = "data-opaque";
    /// Idempotent-attach marker set by the synchronizer
    pub const SYNCED: &str = "data-synced";
    /// Companion marker distinguishing unchecked from absent booleans
    pub const PRESENT: &str = "data-present";
    /// Drag handle of a list item
    pub const HANDLE: &str = "data-handle";
    /// Display-only order label ("#1", "#2", ...)
    pub const ORDER_LABEL: &str = "data-order-label";
    /// Action name of a button-like node (add-item, move-up, pick, ...)
    pub const ACTION: &str = "data-action";
    /// Sibling property a slug control regenerates from
    pub const SOURCE_FIELD: &str = "data-source-field";
}

/// Stable identifier of a node within one `Fragment`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: Option<String>,
    value: Option<Value>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            text: None,
            value: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Owned tree of nodes with a single root
#[derive(Debug, Clone)]
pub struct Fragment {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
}

impl Fragment {
    /// Create a fragment with a single root node
    pub fn new(tag: &str) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new(tag));
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Whether `id` still names a live node of this fragment
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn alloc(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(tag));
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(&id).expect("node id belongs to this fragment")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(&id).expect("node id belongs to this fragment")
    }

    /// Create a new node and append it as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.alloc(tag);
        self.node_mut(id).parent = Some(parent);
        self.node_mut(parent).children.push(id);
        id
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.node(id).tag
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: impl Into<String>) -> &mut Self {
        self.node_mut(id).attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) {
        self.node_mut(id).attrs.remove(key);
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id).attrs.get(key).map(|s| s.as_str())
    }

    pub fn has_attr(&self, id: NodeId, key: &str) -> bool {
        self.node(id).attrs.contains_key(key)
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> &mut Self {
        self.node_mut(id).text = Some(text.into());
        self
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).text.as_deref()
    }

    /// Live control value of a control or carrier node
    pub fn value(&self, id: NodeId) -> Option<&Value> {
        self.node(id).value.as_ref()
    }

    pub fn set_value(&mut self, id: NodeId, value: Value) -> &mut Self {
        self.node_mut(id).value = Some(value);
        self
    }

    pub fn clear_value(&mut self, id: NodeId) {
        self.node_mut(id).value = None;
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Index of `child` within its parent's child list
    pub fn child_index(&self, child: NodeId) -> Option<usize> {
        let parent = self.parent(child)?;
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Detach `id` from its parent and drop the whole subtree
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.nodes.remove(&n) {
                stack.extend(node.children);
            }
        }
    }

    /// Swap two children of `parent` by index
    pub fn swap_children(&mut self, parent: NodeId, a: usize, b: usize) {
        self.node_mut(parent).children.swap(a, b);
    }

    /// Move the child at `from` to position `to` within the same parent
    pub fn move_child(&mut self, parent: NodeId, from: usize, to: usize) {
        let children = &mut self.node_mut(parent).children;
        let child = children.remove(from);
        children.insert(to, child);
    }

    /// Depth-first (document order) walk of the subtree rooted at `id`,
    /// including `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            for &c in self.children(n).iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// First node in document order under `root` matching the predicate
    pub fn find(&self, root: NodeId, pred: impl Fn(&Fragment, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(root).into_iter().find(|&n| pred(self, n))
    }

    /// All nodes in document order under `root` matching the predicate
    pub fn find_all(
        &self,
        root: NodeId,
        pred: impl Fn(&Fragment, NodeId) -> bool,
    ) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&n| pred(self, n))
            .collect()
    }

    /// Direct child of `parent` carrying the given attribute value
    pub fn child_with_attr(&self, parent: NodeId, key: &str, value: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.attr(c, key) == Some(value))
    }

    /// The hidden canonical-value carrier of a composite root.
    /// Carriers are always direct children so a nested composite's
    /// carrier is never mistaken for its parent's.
    pub fn carrier(&self, composite_root: NodeId) -> Option<NodeId> {
        self.children(composite_root)
            .iter()
            .copied()
            .find(|&c| self.has_attr(c, attr::CARRIER))
    }

    /// Item nodes of a list container, in fragment order
    pub fn items(&self, list: NodeId) -> Vec<NodeId> {
        self.children(list)
            .iter()
            .copied()
            .filter(|&c| self.has_attr(c, attr::ITEM))
            .collect()
    }

    /// Deep-copy another fragment's tree under `parent`, inserting at
    /// `position` (or appending), rewriting attribute values and text
    /// through `subst`. Copied nodes receive fresh ids.
    pub fn graft(
        &mut self,
        parent: NodeId,
        position: Option<usize>,
        other: &Fragment,
        subst: &dyn Fn(&str) -> String,
    ) -> NodeId {
        let new_root = self.copy_subtree(other, other.root(), subst);
        self.node_mut(new_root).parent = Some(parent);
        let children = &mut self.node_mut(parent).children;
        match position {
            Some(pos) if pos <= children.len() => children.insert(pos, new_root),
            _ => children.push(new_root),
        }
        new_root
    }

    /// Deep-copy the whole fragment, rewriting attribute values and
    /// text through `subst`. The copy's root corresponds to this
    /// fragment's root.
    pub fn clone_with(&self, subst: &dyn Fn(&str) -> String) -> Fragment {
        let src_root = self.node(self.root);
        let mut out = Fragment::new(&src_root.tag);
        let root = out.root;
        {
            let node = out.node_mut(root);
            node.attrs = src_root
                .attrs
                .iter()
                .map(|(k, v)| (k.clone(), subst(v)))
                .collect();
            node.text = src_root.text.as_deref().map(subst);
            node.value = src_root.value.clone();
        }
        for &child in &src_root.children {
            let copied = out.copy_subtree(self, child, subst);
            out.node_mut(copied).parent = Some(root);
            out.node_mut(root).children.push(copied);
        }
        out
    }

    fn copy_subtree(
        &mut self,
        other: &Fragment,
        src: NodeId,
        subst: &dyn Fn(&str) -> String,
    ) -> NodeId {
        let src_node = other.node(src);
        let id = self.alloc(&src_node.tag);
        {
            let node = self.node_mut(id);
            node.attrs = src_node
                .attrs
                .iter()
                .map(|(k, v)| (k.clone(), subst(v)))
                .collect();
            node.text = src_node.text.as_deref().map(subst);
            node.value = src_node.value.clone();
        }
        for &child in other.children(src) {
            let copied = self.copy_subtree(other, child, subst);
            self.node_mut(copied).parent = Some(id);
            self.node_mut(id).children.push(copied);
        }
        id
    }

    /// Serialize the whole fragment to HTML text. Deterministic:
    /// identical trees produce identical output.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(self.root, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        out.push('<');
        out.push_str(&node.tag);
        for (key, value) in &node.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(value));
            out.push('"');
        }
        if let Some(value) = &node.value {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(" value=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(&text));
            out.push('"');
        }
        out.push('>');
        if let Some(text) = &node.text {
            out.push_str(&html_escape::encode_text(text));
        }
        for &child in &node.children {
            self.write_html(child, out);
        }
        out.push_str("</");
        out.push_str(&node.tag);
        out.push('>');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> (Fragment, NodeId, NodeId) {
        let mut f = Fragment::new("div");
        let root = f.root();
        let a = f.append(root, "span");
        f.set_attr(a, attr::NAME, "a").set_text(a, "first");
        let b = f.append(root, "span");
        f.set_attr(b, attr::NAME, "b");
        (f, a, b)
    }

    #[test]
    fn append_and_query() {
        let (f, a, b) = sample();
        assert_eq!(f.children(f.root()), &[a, b]);
        assert_eq!(f.parent(a), Some(f.root()));
        assert_eq!(f.child_with_attr(f.root(), attr::NAME, "b"), Some(b));
        assert_eq!(f.child_index(b), Some(1));
    }

    #[test]
    fn remove_drops_subtree() {
        let (mut f, a, b) = sample();
        let nested = f.append(a, "em");
        f.remove(a);
        assert_eq!(f.children(f.root()), &[b]);
        assert!(!f.descendants(f.root()).contains(&nested));
    }

    #[test]
    fn move_child_reorders() {
        let (mut f, a, b) = sample();
        f.move_child(f.root(), 1, 0);
        assert_eq!(f.children(f.root()), &[b, a]);
    }

    #[test]
    fn graft_substitutes_placeholders() {
        let mut tpl = Fragment::new("div");
        let c = tpl.append(tpl.root(), "input");
        tpl.set_attr(c, attr::NAME, "tags.__IDX__.value");

        let mut live = Fragment::new("div");
        let root = live.root();
        let new_root = live.graft(root, None, &tpl, &|s| s.replace("__IDX__", "3"));
        let input = live.children(new_root)[0];
        assert_eq!(live.attr(input, attr::NAME), Some("tags.3.value"));
    }

    #[test]
    fn html_is_escaped_and_deterministic() {
        let mut f = Fragment::new("div");
        let input = f.append(f.root(), "input");
        f.set_attr(input, attr::NAME, "title")
            .set_value(input, json!("a <b> & \"c\""));
        let html = f.to_html();
        assert!(html.contains("&amp;"));
        assert!(html.contains("&quot;c&quot;"));
        assert_eq!(html, f.to_html());
    }
}
