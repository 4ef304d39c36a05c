//! Host document facade
//!
//! The engine never touches a concrete DOM. It reads and patches the host page
//! through [`Document`], which the browser build implements over `web-sys` and
//! tests implement with [`memory::MemoryDocument`].
//!
//! Event wiring is declarative: the engine tags injected controls with a
//! [`Binding`] and the implementation routes the matching user event back to
//! the engine.

pub mod memory;

/// What a user event on an injected control means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A "safe" checkbox changed. Clicks on the checkbox must not propagate to
    /// the host element it sits in.
    ToggleCategory(String),
    /// The bulk-fix button was clicked.
    FixCategories,
    /// A popup row's unmark button was clicked.
    UnmarkCategory(String),
}

/// Kind of a DOM mutation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// One observed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord<E> {
    pub kind: MutationKind,
    /// Element nodes added to the target.
    pub added: Vec<E>,
    /// Element nodes removed from the target.
    pub removed: Vec<E>,
    /// Non-element nodes (text, comments) added or removed.
    pub other_nodes: usize,
}

impl<E> MutationRecord<E> {
    pub fn child_list(added: Vec<E>, removed: Vec<E>) -> Self {
        Self { kind: MutationKind::ChildList, added, removed, other_nodes: 0 }
    }

    pub fn attributes() -> Self {
        Self { kind: MutationKind::Attributes, added: Vec::new(), removed: Vec::new(), other_nodes: 0 }
    }
}

/// Minimal DOM surface used by the sync engine, remediation and popup.
///
/// Lookups mirror `getElementsByClassName`/`getElementsByTagName`: a `None`
/// scope searches the whole document, and results are in document order.
pub trait Document {
    type Element: Clone + PartialEq;

    // Queries

    fn element_by_id(&self, id: &str) -> Option<Self::Element>;
    fn elements_by_class(&self, scope: Option<&Self::Element>, class: &str) -> Vec<Self::Element>;
    fn elements_by_tag(&self, scope: Option<&Self::Element>, tag: &str) -> Vec<Self::Element>;
    fn parent(&self, element: &Self::Element) -> Option<Self::Element>;
    fn has_class(&self, element: &Self::Element, class: &str) -> bool;
    /// Lower-case tag name.
    fn tag_name(&self, element: &Self::Element) -> String;
    /// Text content of the element's first child node.
    fn first_text(&self, element: &Self::Element) -> Option<String>;
    /// Rendered text of the element and its descendants.
    fn inner_text(&self, element: &Self::Element) -> String;
    fn is_hidden(&self, element: &Self::Element) -> bool;
    fn is_checked(&self, element: &Self::Element) -> bool;

    // Construction

    fn create_element(&self, tag: &str) -> Self::Element;
    fn add_class(&self, element: &Self::Element, class: &str);
    fn set_attribute(&self, element: &Self::Element, name: &str, value: &str);
    /// Set an inline style property; `None` removes it.
    fn set_style(&self, element: &Self::Element, property: &str, value: Option<&str>);
    /// Replace the element's children with a single text node.
    fn set_text(&self, element: &Self::Element, text: &str);
    fn append_text(&self, parent: &Self::Element, text: &str);
    fn append_child(&self, parent: &Self::Element, child: &Self::Element);
    fn insert_before(&self, parent: &Self::Element, child: &Self::Element, reference: &Self::Element);
    fn remove(&self, element: &Self::Element);
    fn bind(&self, element: &Self::Element, binding: Binding);
    /// Absolute URL of a packaged extension resource.
    fn resolve_asset(&self, path: &str) -> String;

    // Interaction

    fn set_checked(&self, element: &Self::Element, checked: bool);
    fn set_value(&self, element: &Self::Element, value: &str);
    fn click(&self, element: &Self::Element);

    // Helpers

    fn set_hidden(&self, element: &Self::Element, hidden: bool) {
        self.set_style(element, "display", hidden.then_some("none"));
    }

    fn first_by_class(&self, scope: Option<&Self::Element>, class: &str) -> Option<Self::Element> {
        self.elements_by_class(scope, class).into_iter().next()
    }

    /// Trimmed text of the first child node, the way host pages label things.
    fn label_of(&self, element: &Self::Element) -> Option<String> {
        self.first_text(element).map(|text| text.trim().to_string())
    }
}
