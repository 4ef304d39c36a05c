//! In-memory document
//!
//! A small arena-backed DOM that implements [`Document`]. It records
//! child-list and style mutations on connected nodes the way a
//! `MutationObserver` on the document would, and lets callers attach click
//! handlers to simulate how the host page reacts to its own controls.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::{Binding, Document, MutationRecord};

const TEXT_TAG: &str = "#text";

/// Handle of a node in a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Default)]
struct Node {
    tag: String,
    text: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    checked: bool,
    value: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    binding: Option<Binding>,
}

impl Node {
    fn is_text(&self) -> bool {
        self.tag == TEXT_TAG
    }
}

type ClickHandler = Rc<dyn Fn(&MemoryDocument, NodeId)>;

struct Tree {
    nodes: Vec<Node>,
    mutations: Vec<MutationRecord<NodeId>>,
    click_handlers: HashMap<NodeId, ClickHandler>,
    clicks: Vec<NodeId>,
}

impl Tree {
    const ROOT: NodeId = NodeId(0);

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn is_connected(&self, mut id: NodeId) -> bool {
        loop {
            if id == Self::ROOT {
                return true;
            }
            match self.node(id).parent {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Descendants of `id` in document order, excluding `id`.
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.node(next).children.iter().rev().copied());
        }
        out
    }

    fn text_of(&self, id: NodeId) -> String {
        let node = self.node(id);
        if node.is_text() {
            return node.text.clone();
        }
        self.descendants(id)
            .into_iter()
            .filter(|d| self.node(*d).is_text())
            .map(|d| self.node(d).text.clone())
            .collect()
    }

    /// Unlink `id` from its parent. Returns the former parent.
    fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.node_mut(id).parent.take()?;
        self.node_mut(parent).children.retain(|c| *c != id);
        Some(parent)
    }

    fn record_child_list(&mut self, target: NodeId, added: &[NodeId], removed: &[NodeId]) {
        if !self.is_connected(target) {
            return;
        }
        let mut record = MutationRecord::child_list(Vec::new(), Vec::new());
        for id in added {
            if self.node(*id).is_text() {
                record.other_nodes += 1;
            } else {
                record.added.push(*id);
            }
        }
        for id in removed {
            if self.node(*id).is_text() {
                record.other_nodes += 1;
            } else {
                record.removed.push(*id);
            }
        }
        self.mutations.push(record);
    }

    fn insert(&mut self, parent: NodeId, child: NodeId, position: Option<usize>) {
        if let Some(old) = self.detach(child) {
            self.record_child_list(old, &[], &[child]);
        }
        self.node_mut(child).parent = Some(parent);
        let children = &mut self.node_mut(parent).children;
        match position {
            Some(index) if index <= children.len() => children.insert(index, child),
            _ => children.push(child),
        }
        self.record_child_list(parent, &[child], &[]);
    }
}

/// Shared in-memory document. Clones refer to the same tree.
#[derive(Clone)]
pub struct MemoryDocument {
    tree: Rc<RefCell<Tree>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// A document holding only an empty `body` root.
    pub fn new() -> Self {
        let root = Node { tag: "body".to_string(), ..Node::default() };
        Self {
            tree: Rc::new(RefCell::new(Tree {
                nodes: vec![root],
                mutations: Vec::new(),
                click_handlers: HashMap::new(),
                clicks: Vec::new(),
            })),
        }
    }

    pub fn root(&self) -> NodeId {
        Tree::ROOT
    }

    /// Append a new element with `classes` to `parent`.
    pub fn element(&self, parent: NodeId, tag: &str, classes: &[&str]) -> NodeId {
        let node = Node {
            tag: tag.to_ascii_lowercase(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            ..Node::default()
        };
        let mut tree = self.tree.borrow_mut();
        let id = tree.alloc(node);
        tree.insert(parent, id, None);
        id
    }

    /// Append a new element with an id to `parent`.
    pub fn element_with_id(&self, parent: NodeId, tag: &str, id: &str) -> NodeId {
        let node = self.element(parent, tag, &[]);
        self.tree.borrow_mut().node_mut(node).id = Some(id.to_string());
        node
    }

    /// Append a text node to `parent`.
    pub fn text(&self, parent: NodeId, text: &str) -> NodeId {
        let mut tree = self.tree.borrow_mut();
        let id = tree.alloc(Node { tag: TEXT_TAG.to_string(), text: text.to_string(), ..Node::default() });
        tree.insert(parent, id, None);
        id
    }

    /// Run `handler` whenever `node` is clicked.
    pub fn on_click(&self, node: NodeId, handler: impl Fn(&MemoryDocument, NodeId) + 'static) {
        self.tree.borrow_mut().click_handlers.insert(node, Rc::new(handler));
    }

    /// Drain the recorded mutations.
    pub fn take_mutations(&self) -> Vec<MutationRecord<NodeId>> {
        std::mem::take(&mut self.tree.borrow_mut().mutations)
    }

    /// Every node clicked so far, in order.
    pub fn clicks(&self) -> Vec<NodeId> {
        self.tree.borrow().clicks.clone()
    }

    pub fn binding(&self, node: NodeId) -> Option<Binding> {
        self.tree.borrow().node(node).binding.clone()
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.tree.borrow().node(node).styles.get(property).cloned()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree.borrow().node(node).attributes.get(name).cloned()
    }

    pub fn value(&self, node: NodeId) -> String {
        self.tree.borrow().node(node).value.clone()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree.borrow().node(node).children.clone()
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.tree.borrow().is_connected(node)
    }

    /// Number of connected nodes, text included.
    pub fn node_count(&self) -> usize {
        let tree = self.tree.borrow();
        tree.descendants(Tree::ROOT).len() + 1
    }

    fn scope_descendants(&self, scope: Option<&NodeId>) -> Vec<NodeId> {
        let tree = self.tree.borrow();
        tree.descendants(scope.copied().unwrap_or(Tree::ROOT))
    }
}

impl Document for MemoryDocument {
    type Element = NodeId;

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let tree = self.tree.borrow();
        tree.descendants(Tree::ROOT)
            .into_iter()
            .find(|n| tree.node(*n).id.as_deref() == Some(id))
    }

    fn elements_by_class(&self, scope: Option<&NodeId>, class: &str) -> Vec<NodeId> {
        let candidates = self.scope_descendants(scope);
        let tree = self.tree.borrow();
        candidates
            .into_iter()
            .filter(|n| tree.node(*n).classes.iter().any(|c| c == class))
            .collect()
    }

    fn elements_by_tag(&self, scope: Option<&NodeId>, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        let candidates = self.scope_descendants(scope);
        let tree = self.tree.borrow();
        candidates.into_iter().filter(|n| tree.node(*n).tag == tag).collect()
    }

    fn parent(&self, element: &NodeId) -> Option<NodeId> {
        self.tree.borrow().node(*element).parent
    }

    fn has_class(&self, element: &NodeId, class: &str) -> bool {
        self.tree.borrow().node(*element).classes.iter().any(|c| c == class)
    }

    fn tag_name(&self, element: &NodeId) -> String {
        self.tree.borrow().node(*element).tag.clone()
    }

    fn first_text(&self, element: &NodeId) -> Option<String> {
        let tree = self.tree.borrow();
        let first = *tree.node(*element).children.first()?;
        Some(tree.text_of(first))
    }

    fn inner_text(&self, element: &NodeId) -> String {
        self.tree.borrow().text_of(*element)
    }

    fn is_hidden(&self, element: &NodeId) -> bool {
        self.style(*element, "display").as_deref() == Some("none")
    }

    fn is_checked(&self, element: &NodeId) -> bool {
        self.tree.borrow().node(*element).checked
    }

    fn create_element(&self, tag: &str) -> NodeId {
        self.tree.borrow_mut().alloc(Node { tag: tag.to_ascii_lowercase(), ..Node::default() })
    }

    fn add_class(&self, element: &NodeId, class: &str) {
        let mut tree = self.tree.borrow_mut();
        let classes = &mut tree.node_mut(*element).classes;
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }

    fn set_attribute(&self, element: &NodeId, name: &str, value: &str) {
        let mut tree = self.tree.borrow_mut();
        let node = tree.node_mut(*element);
        if name == "id" {
            node.id = Some(value.to_string());
        }
        node.attributes.insert(name.to_string(), value.to_string());
    }

    fn set_style(&self, element: &NodeId, property: &str, value: Option<&str>) {
        let mut tree = self.tree.borrow_mut();
        let styles = &mut tree.node_mut(*element).styles;
        match value {
            Some(value) => styles.insert(property.to_string(), value.to_string()),
            None => styles.remove(property),
        };
        if tree.is_connected(*element) {
            tree.mutations.push(MutationRecord::attributes());
        }
    }

    fn set_text(&self, element: &NodeId, text: &str) {
        let mut tree = self.tree.borrow_mut();
        let old = std::mem::take(&mut tree.node_mut(*element).children);
        for child in &old {
            tree.node_mut(*child).parent = None;
        }
        if !old.is_empty() {
            tree.record_child_list(*element, &[], &old);
        }
        let id = tree.alloc(Node { tag: TEXT_TAG.to_string(), text: text.to_string(), ..Node::default() });
        tree.insert(*element, id, None);
    }

    fn append_text(&self, parent: &NodeId, text: &str) {
        self.text(*parent, text);
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) {
        self.tree.borrow_mut().insert(*parent, *child, None);
    }

    fn insert_before(&self, parent: &NodeId, child: &NodeId, reference: &NodeId) {
        let mut tree = self.tree.borrow_mut();
        if let Some(old) = tree.detach(*child) {
            tree.record_child_list(old, &[], &[*child]);
        }
        let position = tree.node(*parent).children.iter().position(|c| c == reference);
        tree.insert(*parent, *child, position);
    }

    fn remove(&self, element: &NodeId) {
        let mut tree = self.tree.borrow_mut();
        if let Some(parent) = tree.detach(*element) {
            tree.record_child_list(parent, &[], &[*element]);
        }
    }

    fn bind(&self, element: &NodeId, binding: Binding) {
        self.tree.borrow_mut().node_mut(*element).binding = Some(binding);
    }

    fn resolve_asset(&self, path: &str) -> String {
        format!("extension://ogplus{path}")
    }

    fn set_checked(&self, element: &NodeId, checked: bool) {
        self.tree.borrow_mut().node_mut(*element).checked = checked;
    }

    fn set_value(&self, element: &NodeId, value: &str) {
        self.tree.borrow_mut().node_mut(*element).value = value.to_string();
    }

    fn click(&self, element: &NodeId) {
        let handler = {
            let mut tree = self.tree.borrow_mut();
            tree.clicks.push(*element);
            tree.click_handlers.get(element).cloned()
        };
        if let Some(handler) = handler {
            handler(self, *element);
        }
    }
}
