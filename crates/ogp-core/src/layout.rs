//! Host layouts
//!
//! The host app renders categories in two shapes: the shopping list itself
//! (category headers grouping item rows) and the categories settings list
//! (one row per category). The sync engine is written once against
//! [`Layout`]; each shape supplies its lookups and its remediation routine.

use crate::config::HostMarkers;
use crate::dom::Document;
use crate::options::Options;
use crate::remediate::{self, RemediationError, RemediationReport, Remediator};

/// Which host layout a page uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// List-detail view: category headers with item rows.
    ShoppingList,
    /// Flat settings list of categories.
    Categories,
}

impl LayoutKind {
    /// Pick the layout from the page URL and list title. The categories
    /// settings page is reached from a shopping list and titled
    /// "Categories".
    pub fn detect(has_source_list_param: bool, list_title: &str, markers: &HostMarkers) -> Self {
        if has_source_list_param && list_title.trim() == markers.categories_page_title {
            Self::Categories
        } else {
            Self::ShoppingList
        }
    }
}

/// Capability interface over a host layout.
#[allow(async_fn_in_trait)]
pub trait Layout<D: Document> {
    fn kind(&self) -> LayoutKind;

    fn markers(&self) -> &HostMarkers;

    /// Elements that represent one category each.
    fn category_elements(&self, doc: &D) -> Vec<D::Element>;

    /// Category name shown by `element`.
    fn display_name_of(&self, doc: &D, element: &D::Element) -> Option<String>;

    /// Where the "safe" checkbox for `element` goes.
    fn injection_point_for(&self, doc: &D, element: &D::Element) -> Option<D::Element>;

    /// Drive the host UI to clear out every category not in `opts`' safe list.
    async fn remediate(
        &self,
        remediator: &Remediator<'_, D>,
        opts: &Options,
    ) -> Result<RemediationReport, RemediationError>;
}

// =============================================================================
// Shopping list
// =============================================================================

/// List-detail layout. Category headers carry the name as their first text
/// node and receive the checkbox directly.
#[derive(Debug, Clone, Default)]
pub struct ShoppingListLayout {
    markers: HostMarkers,
}

impl ShoppingListLayout {
    pub fn new(markers: HostMarkers) -> Self {
        Self { markers }
    }
}

impl<D: Document> Layout<D> for ShoppingListLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::ShoppingList
    }

    fn markers(&self) -> &HostMarkers {
        &self.markers
    }

    fn category_elements(&self, doc: &D) -> Vec<D::Element> {
        doc.elements_by_class(None, &self.markers.category_header_class)
    }

    fn display_name_of(&self, doc: &D, element: &D::Element) -> Option<String> {
        doc.label_of(element)
    }

    fn injection_point_for(&self, _doc: &D, element: &D::Element) -> Option<D::Element> {
        Some(element.clone())
    }

    async fn remediate(
        &self,
        remediator: &Remediator<'_, D>,
        opts: &Options,
    ) -> Result<RemediationReport, RemediationError> {
        remediate::uncategorize_items(remediator, &self.markers, opts).await
    }
}

// =============================================================================
// Categories settings
// =============================================================================

/// Flat layout. Each list row holds a value cell whose first text node is the
/// category name; the checkbox goes into that cell.
#[derive(Debug, Clone, Default)]
pub struct CategoriesLayout {
    markers: HostMarkers,
}

impl CategoriesLayout {
    pub fn new(markers: HostMarkers) -> Self {
        Self { markers }
    }

    fn value_cell<D: Document>(&self, doc: &D, element: &D::Element) -> Option<D::Element> {
        doc.first_by_class(Some(element), &self.markers.item_value_class)
    }
}

impl<D: Document> Layout<D> for CategoriesLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Categories
    }

    fn markers(&self) -> &HostMarkers {
        &self.markers
    }

    fn category_elements(&self, doc: &D) -> Vec<D::Element> {
        doc.elements_by_class(None, &self.markers.list_item_class)
    }

    fn display_name_of(&self, doc: &D, element: &D::Element) -> Option<String> {
        doc.label_of(&self.value_cell(doc, element)?)
    }

    fn injection_point_for(&self, doc: &D, element: &D::Element) -> Option<D::Element> {
        self.value_cell(doc, element)
    }

    async fn remediate(
        &self,
        remediator: &Remediator<'_, D>,
        opts: &Options,
    ) -> Result<RemediationReport, RemediationError> {
        remediate::delete_categories(remediator, &self.markers, opts).await
    }
}

// =============================================================================
// Runtime selection
// =============================================================================

/// Either layout, chosen at runtime.
#[derive(Debug, Clone)]
pub enum HostLayout {
    ShoppingList(ShoppingListLayout),
    Categories(CategoriesLayout),
}

impl HostLayout {
    pub fn for_kind(kind: LayoutKind, markers: HostMarkers) -> Self {
        match kind {
            LayoutKind::ShoppingList => Self::ShoppingList(ShoppingListLayout::new(markers)),
            LayoutKind::Categories => Self::Categories(CategoriesLayout::new(markers)),
        }
    }
}

impl<D: Document> Layout<D> for HostLayout {
    fn kind(&self) -> LayoutKind {
        match self {
            Self::ShoppingList(_) => LayoutKind::ShoppingList,
            Self::Categories(_) => LayoutKind::Categories,
        }
    }

    fn markers(&self) -> &HostMarkers {
        match self {
            Self::ShoppingList(layout) => Layout::<D>::markers(layout),
            Self::Categories(layout) => Layout::<D>::markers(layout),
        }
    }

    fn category_elements(&self, doc: &D) -> Vec<D::Element> {
        match self {
            Self::ShoppingList(layout) => layout.category_elements(doc),
            Self::Categories(layout) => layout.category_elements(doc),
        }
    }

    fn display_name_of(&self, doc: &D, element: &D::Element) -> Option<String> {
        match self {
            Self::ShoppingList(layout) => layout.display_name_of(doc, element),
            Self::Categories(layout) => layout.display_name_of(doc, element),
        }
    }

    fn injection_point_for(&self, doc: &D, element: &D::Element) -> Option<D::Element> {
        match self {
            Self::ShoppingList(layout) => layout.injection_point_for(doc, element),
            Self::Categories(layout) => layout.injection_point_for(doc, element),
        }
    }

    async fn remediate(
        &self,
        remediator: &Remediator<'_, D>,
        opts: &Options,
    ) -> Result<RemediationReport, RemediationError> {
        match self {
            Self::ShoppingList(layout) => layout.remediate(remediator, opts).await,
            Self::Categories(layout) => layout.remediate(remediator, opts).await,
        }
    }
}
