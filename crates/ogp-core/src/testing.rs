//! Shared test fixtures.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use futures::future::{join, select, Either, LocalBoxFuture};
use futures::pin_mut;

use crate::dom::memory::{MemoryDocument, NodeId};
use crate::dom::Document;
use crate::prefs::PreferenceStore;
use crate::relay::{channel, RelayClient, RelayServer};
use crate::storage::MemoryStore;
use crate::wait::Timer;

/// Run `body` with a client connected to a server over `store`, driving both
/// ends of the channel until the body finishes.
pub(crate) async fn with_relay<F, Fut>(store: MemoryStore, body: F) -> Fut::Output
where
    F: FnOnce(RelayClient) -> Fut,
    Fut: Future,
{
    let (page, background) = channel::pair();
    let client = RelayClient::new(page.sender);
    let server = RelayServer::new(PreferenceStore::new(store));

    let serve = server.serve(background.receiver, background.sender);
    let pump = client.pump(page.receiver);
    let body = body(client.clone());
    let channel = join(serve, pump);
    pin_mut!(body, channel);

    match select(body, channel).await {
        Either::Left((output, _)) => output,
        Either::Right(_) => panic!("relay channel closed before the test body finished"),
    }
}

/// Timer that yields once per sleep instead of waiting, counting ticks.
#[derive(Clone, Default)]
pub(crate) struct TickTimer {
    ticks: Rc<Cell<u32>>,
    hooks: Rc<RefCell<Vec<Box<dyn FnMut(u32)>>>>,
}

impl TickTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn ticks(&self) -> u32 {
        self.ticks.get()
    }

    /// Run `hook` with the tick number on every sleep.
    pub(crate) fn on_tick(&self, hook: impl FnMut(u32) + 'static) {
        self.hooks.borrow_mut().push(Box::new(hook));
    }
}

impl Timer for TickTimer {
    fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
        let tick = self.ticks.get() + 1;
        self.ticks.set(tick);
        for hook in self.hooks.borrow_mut().iter_mut() {
            hook(tick);
        }
        Box::pin(tokio::task::yield_now())
    }
}

// =============================================================================
// Host page fixtures
// =============================================================================

/// A host page built in memory, with its list container.
pub(crate) struct HostPage {
    pub doc: MemoryDocument,
    pub list: NodeId,
}

/// Shopping list page with `categories` as (name, items). Clicking an item's
/// edit control opens a dialog whose submit moves the item to
/// "Uncategorized" when that value is selected.
pub(crate) fn shopping_list_page(categories: &[(&str, &[&str])]) -> HostPage {
    let doc = MemoryDocument::new();
    let wrapper = doc.element(doc.root(), "div", &["list-wrapper"]);
    let title = doc.element_with_id(wrapper, "h1", "listName");
    doc.text(title, "Groceries");
    let list = doc.element_with_id(wrapper, "div", "listDiv");

    for (name, items) in categories {
        let container = add_category(&doc, list, name);
        for item in items.iter() {
            add_item(&doc, list, container, item);
        }
    }

    doc.take_mutations();
    HostPage { doc, list }
}

/// Append a category section to a shopping list. Returns its container.
pub(crate) fn add_category(doc: &MemoryDocument, list: NodeId, name: &str) -> NodeId {
    let container = doc.element(list, "div", &["category-container"]);
    let header = doc.element(container, "div", &["category-header"]);
    doc.text(header, name);
    container
}

/// Append an item row with a working edit control.
pub(crate) fn add_item(doc: &MemoryDocument, list: NodeId, container: NodeId, name: &str) -> NodeId {
    let row = doc.element(container, "div", &["list-item"]);
    doc.text(row, name);
    let edit = doc.element(row, "span", &["edit"]);
    doc.text(edit, "Edit");
    doc.on_click(edit, move |doc, edit| open_item_dialog(doc, list, edit));
    row
}

/// What the host does when an item's edit control is clicked.
pub(crate) fn open_item_dialog(doc: &MemoryDocument, list: NodeId, edit: NodeId) {
    let Some(item) = doc.parent(&edit) else {
        return;
    };
    let dialog = doc.element(doc.root(), "dialog", &[]);
    let field = doc.element(dialog, "div", &["field"]);
    let label = doc.element(field, "label", &[]);
    doc.text(label, "Category:");
    let select = doc.element(field, "select", &[]);
    let submit = doc.element(dialog, "button", &["submit-button"]);
    doc.text(submit, "Save");

    doc.on_click(submit, move |doc, _| {
        if doc.value(select) == "uncategorized" {
            let target = category_container(doc, "Uncategorized")
                .unwrap_or_else(|| add_category(doc, list, "Uncategorized"));
            doc.append_child(&target, &item);
        }
        doc.remove(&dialog);
    });
}

fn category_container(doc: &MemoryDocument, name: &str) -> Option<NodeId> {
    doc.elements_by_class(None, "category-container")
        .into_iter()
        .find(|container| {
            doc.first_by_class(Some(container), "category-header")
                .and_then(|header| doc.label_of(&header))
                .as_deref()
                == Some(name)
        })
}

/// Item labels under the category called `name`.
pub(crate) fn category_items(doc: &MemoryDocument, name: &str) -> Vec<String> {
    let Some(container) = category_container(doc, name) else {
        return Vec::new();
    };
    doc.elements_by_class(Some(&container), "list-item")
        .iter()
        .filter_map(|item| doc.label_of(item))
        .collect()
}

/// Categories settings page with one row per name and the host's shared
/// settings dialog. "Delete Category" removes the row being edited.
pub(crate) fn categories_page(names: &[&str]) -> HostPage {
    let doc = MemoryDocument::new();
    let title = doc.element_with_id(doc.root(), "h1", "listName");
    doc.text(title, "Categories");
    let list = doc.element_with_id(doc.root(), "div", "listDiv");

    let dialog = doc.element(doc.root(), "div", &["ui-dialog"]);
    doc.set_hidden(&dialog, true);
    let archive = doc.element(dialog, "button", &["danger-button"]);
    doc.text(archive, "Archive");
    let delete = doc.element(dialog, "button", &["danger-button"]);
    doc.text(delete, "Delete Category");

    let editing: Rc<Cell<Option<NodeId>>> = Rc::default();
    for name in names {
        let row = doc.element(list, "div", &["list-item"]);
        let cell = doc.element(row, "span", &["value"]);
        doc.text(cell, name);
        let edit = doc.element(row, "span", &["edit"]);
        doc.text(edit, "Edit");

        let editing = editing.clone();
        doc.on_click(edit, move |doc, _| {
            editing.set(Some(row));
            doc.set_hidden(&dialog, false);
        });
    }
    doc.on_click(delete, move |doc, _| {
        if let Some(row) = editing.take() {
            doc.remove(&row);
        }
        doc.set_hidden(&dialog, true);
    });

    doc.take_mutations();
    HostPage { doc, list }
}

/// Category names still listed on a categories page.
pub(crate) fn row_names(doc: &MemoryDocument) -> Vec<String> {
    doc.elements_by_class(None, "list-item")
        .iter()
        .filter_map(|row| doc.first_by_class(Some(row), "value"))
        .filter_map(|cell| doc.label_of(&cell))
        .collect()
}
