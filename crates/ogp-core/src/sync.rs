//! DOM sync engine
//!
//! Two idempotent render passes over the host page:
//!
//! - [`SyncEngine::insert_category_checkmarks`] gives every category a "safe"
//!   checkbox reflecting the store, creating it only when missing.
//! - [`SyncEngine::insert_fix_categories_button`] makes sure the bulk-fix
//!   button exists before the list container and shows it only while some
//!   rendered category is unsafe.
//!
//! The engine is written once against [`Layout`]. The host may destroy and
//! recreate its category elements at any time, so nothing here caches
//! element handles between passes.

use std::rc::Rc;

use crate::config::{Config, InjectedMarkers};
use crate::dom::{Binding, Document, MutationKind, MutationRecord};
use crate::layout::Layout;
use crate::relay::{RelayClient, RelayError};
use crate::remediate::{RemediationError, RemediationReport, Remediator};
use crate::wait::{CancelToken, Timer, WaitPolicy};

/// Error type for sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
    #[error("Remediation error: {0}")]
    Remediation(#[from] RemediationError),
}

/// Outcome of a render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Checkboxes created.
    pub inserted: usize,
    /// Existing checkboxes brought up to date.
    pub updated: usize,
    /// Rendered categories whose checkbox is unchecked.
    pub unsafe_count: usize,
}

struct Inner<D, L> {
    doc: D,
    layout: L,
    client: RelayClient,
    markers: InjectedMarkers,
    timer: Rc<dyn Timer>,
    wait: WaitPolicy,
    cancel: CancelToken,
}

/// Sync engine for one page context. Clones share the same context.
pub struct SyncEngine<D, L> {
    inner: Rc<Inner<D, L>>,
}

impl<D, L> Clone for SyncEngine<D, L> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<D: Document, L: Layout<D>> SyncEngine<D, L> {
    pub fn new(doc: D, layout: L, client: RelayClient, config: &Config, timer: Rc<dyn Timer>) -> Self {
        Self {
            inner: Rc::new(Inner {
                doc,
                layout,
                client,
                markers: config.markers.injected.clone(),
                timer,
                wait: config.wait.policy(),
                cancel: CancelToken::new(),
            }),
        }
    }

    pub fn doc(&self) -> &D {
        &self.inner.doc
    }

    pub fn layout(&self) -> &L {
        &self.inner.layout
    }

    pub fn client(&self) -> &RelayClient {
        &self.inner.client
    }

    /// Token that aborts a running remediation at its next wait.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.inner.cancel
    }

    // =========================================================================
    // Render passes
    // =========================================================================

    /// Bring every category's checkbox in line with the stored options.
    pub async fn insert_category_checkmarks(&self) -> Result<SyncSummary, RelayError> {
        let opts = self.inner.client.get_opts().await?;
        let doc = &self.inner.doc;
        let layout = &self.inner.layout;
        let mut summary = SyncSummary::default();

        for element in layout.category_elements(doc) {
            let Some(name) = self.category_name(&element) else {
                continue;
            };
            let Some(point) = layout.injection_point_for(doc, &element) else {
                continue;
            };
            let safe = opts.is_marked_as_safe(&name);

            match doc.first_by_class(Some(&point), &self.inner.markers.checkbox_container_class) {
                Some(container) => {
                    if let Some(checkbox) = doc.first_by_class(Some(&container), &self.inner.markers.checkbox_class) {
                        if doc.is_checked(&checkbox) != safe {
                            doc.set_checked(&checkbox, safe);
                        }
                    }
                    summary.updated += 1;
                }
                None => {
                    let fragment = self.checkbox_fragment(&name, safe);
                    doc.append_child(&point, &fragment);
                    summary.inserted += 1;
                }
            }
            if !safe {
                summary.unsafe_count += 1;
            }
        }

        log::debug!(
            "checkmarks: {} inserted, {} updated, {} unsafe",
            summary.inserted,
            summary.updated,
            summary.unsafe_count
        );
        Ok(summary)
    }

    /// Create the bulk-fix button if needed and set its visibility. Returns
    /// the unsafe count it was based on.
    pub fn insert_fix_categories_button(&self) -> usize {
        let doc = &self.inner.doc;
        let container = doc
            .first_by_class(None, &self.inner.markers.button_container_class)
            .or_else(|| self.insert_button());
        let count = self.unsafe_count();
        if let Some(container) = container {
            doc.set_hidden(&container, count == 0);
        }
        count
    }

    /// Both passes, checkmarks first.
    pub async fn sync_pass(&self) -> Result<SyncSummary, RelayError> {
        let mut summary = self.insert_category_checkmarks().await?;
        summary.unsafe_count = self.insert_fix_categories_button();
        Ok(summary)
    }

    /// Categories currently rendered with an unchecked checkbox.
    pub fn unsafe_count(&self) -> usize {
        let doc = &self.inner.doc;
        self.inner
            .layout
            .category_elements(doc)
            .iter()
            .filter(|element| self.category_name(element).is_some())
            .filter_map(|element| self.checkbox_of(element))
            .filter(|checkbox| !doc.is_checked(checkbox))
            .count()
    }

    // =========================================================================
    // User actions
    // =========================================================================

    /// A checkbox changed: flip the category in the store, then refresh.
    pub async fn on_category_toggled(&self, category: &str) -> Result<SyncSummary, SyncError> {
        self.inner.client.toggle_category_safeness(category).await?;
        Ok(self.sync_pass().await?)
    }

    /// Run the layout's remediation against a single read of the options.
    pub async fn remediate(&self) -> Result<RemediationReport, SyncError> {
        let opts = self.inner.client.get_opts().await?;
        let remediator = Remediator::new(
            &self.inner.doc,
            self.inner.timer.as_ref(),
            self.inner.wait,
            &self.inner.cancel,
        );
        let report = self.inner.layout.remediate(&remediator, &opts).await?;
        log::info!(
            "remediation done: {} categories, {} items, {} skipped",
            report.categories.len(),
            report.items,
            report.skipped
        );
        Ok(report)
    }

    /// Route a user event on an injected control.
    pub async fn dispatch(&self, binding: Binding) -> Result<(), SyncError> {
        match binding {
            Binding::ToggleCategory(category) => {
                self.on_category_toggled(&category).await?;
            }
            Binding::FixCategories => {
                self.remediate().await?;
            }
            Binding::UnmarkCategory(category) => {
                log::debug!("ignoring popup binding for '{category}' on a host page");
            }
        }
        Ok(())
    }

    /// Whether `record` only adds fragments this engine injects.
    ///
    /// The engine never removes its own fragments, so any removal came from
    /// the host and must be treated as a host mutation.
    pub fn is_own_mutation(&self, record: &MutationRecord<D::Element>) -> bool {
        if record.kind != MutationKind::ChildList || record.other_nodes > 0 || !record.removed.is_empty() {
            return false;
        }
        let classes = self.inner.markers.fragment_classes();
        let doc = &self.inner.doc;
        !record.added.is_empty()
            && record
                .added
                .iter()
                .all(|node| classes.iter().any(|class| doc.has_class(node, class)))
    }

    // =========================================================================
    // Fragments
    // =========================================================================

    fn category_name(&self, element: &D::Element) -> Option<String> {
        let name = self.inner.layout.display_name_of(&self.inner.doc, element)?;
        (name != self.inner.layout.markers().uncategorized).then_some(name)
    }

    fn checkbox_of(&self, element: &D::Element) -> Option<D::Element> {
        let doc = &self.inner.doc;
        let point = self.inner.layout.injection_point_for(doc, element)?;
        let container = doc.first_by_class(Some(&point), &self.inner.markers.checkbox_container_class)?;
        doc.first_by_class(Some(&container), &self.inner.markers.checkbox_class)
    }

    /// Detached `<div><span>Safe</span><input type=checkbox></div>`.
    fn checkbox_fragment(&self, category: &str, checked: bool) -> D::Element {
        let doc = &self.inner.doc;
        let markers = &self.inner.markers;

        let container = doc.create_element("div");
        doc.add_class(&container, &markers.checkbox_container_class);
        doc.set_style(&container, "float", Some("right"));

        let label = doc.create_element("span");
        doc.set_text(&label, &markers.checkbox_label);
        doc.set_style(&label, "margin-right", Some("3px"));
        doc.append_child(&container, &label);

        let checkbox = doc.create_element("input");
        doc.add_class(&checkbox, &markers.checkbox_class);
        doc.set_attribute(&checkbox, "type", "checkbox");
        doc.set_style(&checkbox, "cursor", Some("pointer"));
        doc.set_checked(&checkbox, checked);
        doc.bind(&checkbox, Binding::ToggleCategory(category.to_string()));
        doc.append_child(&container, &checkbox);

        container
    }

    fn insert_button(&self) -> Option<D::Element> {
        let doc = &self.inner.doc;
        let markers = &self.inner.markers;
        let Some(list) = doc.element_by_id(&self.inner.layout.markers().list_container_id) else {
            log::warn!("list container not found, bulk-fix button not inserted");
            return None;
        };
        let parent = doc.parent(&list)?;

        let container = doc.create_element("div");
        doc.add_class(&container, &markers.button_container_class);

        let button = doc.create_element("button");
        doc.set_attribute(&button, "type", "button");
        doc.bind(&button, Binding::FixCategories);

        let icon = doc.create_element("img");
        doc.set_attribute(&icon, "src", &doc.resolve_asset(&markers.icon_path));
        doc.set_style(&icon, "width", Some("12px"));
        doc.append_child(&button, &icon);
        doc.append_text(&button, &markers.button_label);
        doc.append_child(&container, &button);

        doc.insert_before(&parent, &container, &list);
        Some(container)
    }
}
