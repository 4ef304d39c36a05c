//! Popup safe-list view
//!
//! Lists the categories currently marked safe and lets the user unmark them.
//! The popup's static markup provides the panes by id; rows are rebuilt on
//! every render.

use crate::config::PopupMarkers;
use crate::dom::{Binding, Document};
use crate::relay::{RelayClient, RelayError};

pub struct SafeListView<D> {
    doc: D,
    client: RelayClient,
    markers: PopupMarkers,
}

impl<D: Document> SafeListView<D> {
    pub fn new(doc: D, client: RelayClient, markers: PopupMarkers) -> Self {
        Self { doc, client, markers }
    }

    pub fn doc(&self) -> &D {
        &self.doc
    }

    /// Show the loading pane while `loading`, the content pane otherwise.
    pub fn set_loading(&self, loading: bool) {
        if let Some(pane) = self.doc.element_by_id(&self.markers.loading_id) {
            self.doc.set_hidden(&pane, !loading);
        }
        if let Some(pane) = self.doc.element_by_id(&self.markers.loaded_id) {
            self.doc.set_hidden(&pane, loading);
        }
    }

    /// Rebuild the list from the store. Returns the number of rows.
    pub async fn render(&self) -> Result<usize, RelayError> {
        let opts = self.client.get_opts().await?;
        let doc = &self.doc;
        let (Some(list), Some(empty)) = (
            doc.element_by_id(&self.markers.list_id),
            doc.element_by_id(&self.markers.empty_id),
        ) else {
            log::warn!("popup markup is missing the safe-category list");
            return Ok(0);
        };

        for row in doc.elements_by_class(Some(&list), &self.markers.row_class) {
            doc.remove(&row);
        }

        let safe = &opts.categories.safe;
        doc.set_hidden(&empty, !safe.is_empty());
        doc.set_hidden(&list, safe.is_empty());

        for category in safe {
            let row = doc.create_element("div");
            doc.add_class(&row, &self.markers.row_class);

            let name = doc.create_element("span");
            doc.set_text(&name, category);
            doc.append_child(&row, &name);

            let button = doc.create_element("button");
            doc.add_class(&button, &self.markers.delete_class);
            doc.set_attribute(&button, "title", &format!("Unmark '{category}'"));
            doc.set_text(&button, "⨯");
            doc.bind(&button, Binding::UnmarkCategory(category.clone()));
            doc.append_child(&row, &button);

            doc.append_child(&list, &row);
        }

        Ok(safe.len())
    }

    /// Unmark `category`, then re-render.
    pub async fn on_unmark(&self, category: &str) -> Result<usize, RelayError> {
        self.client.unmark_category_as_safe(category).await?;
        self.render().await
    }

    /// Route a user event from the popup.
    pub async fn dispatch(&self, binding: Binding) -> Result<(), RelayError> {
        match binding {
            Binding::UnmarkCategory(category) => {
                self.on_unmark(&category).await?;
            }
            other => log::debug!("ignoring {other:?} in the popup"),
        }
        Ok(())
    }
}
