//! Bulk remediation
//!
//! Clears out categories that are not marked safe by driving the host page's
//! own editing UI. The host app is the system of record for list content, so
//! nothing here writes list data directly. The host supports one open dialog
//! at a time, so every step runs sequentially and waits for the dialog to
//! settle before the next.
//!
//! Elements are re-queried before each step: the host re-renders its list
//! after every edit and earlier handles may be stale.

use std::time::Duration;

use crate::config::HostMarkers;
use crate::dom::Document;
use crate::options::Options;
use crate::wait::{wait_for, CancelToken, Timer, WaitOutcome, WaitPolicy};

/// Error type for remediation runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemediationError {
    #[error("Timed out after {waited:?} waiting for {step}")]
    TimedOut { step: &'static str, waited: Duration },
    #[error("Cancelled while waiting for {step}")]
    Cancelled { step: &'static str },
}

/// What a remediation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationReport {
    /// Categories that were stripped or deleted, in processing order.
    pub categories: Vec<String>,
    /// Host dialogs completed.
    pub items: usize,
    /// Rows left alone because their edit control was missing.
    pub skipped: usize,
}

/// Shared context for one remediation run.
pub struct Remediator<'a, D> {
    doc: &'a D,
    timer: &'a dyn Timer,
    policy: WaitPolicy,
    cancel: &'a CancelToken,
}

impl<'a, D: Document> Remediator<'a, D> {
    pub fn new(doc: &'a D, timer: &'a dyn Timer, policy: WaitPolicy, cancel: &'a CancelToken) -> Self {
        Self { doc, timer, policy, cancel }
    }

    pub fn doc(&self) -> &D {
        self.doc
    }

    /// Poll `condition` under the run's policy, naming `step` on failure.
    pub async fn wait_until<F>(&self, step: &'static str, condition: F) -> Result<(), RemediationError>
    where
        F: FnMut() -> bool,
    {
        match wait_for(self.timer, &self.policy, self.cancel, condition).await {
            WaitOutcome::Ready => Ok(()),
            WaitOutcome::TimedOut { waited } => Err(RemediationError::TimedOut { step, waited }),
            WaitOutcome::Cancelled => Err(RemediationError::Cancelled { step }),
        }
    }
}

fn is_exempt(markers: &HostMarkers, opts: &Options, name: &str) -> bool {
    name == markers.uncategorized || opts.is_marked_as_safe(name)
}

// =============================================================================
// Shopping list: move items to "uncategorized"
// =============================================================================

/// For every unsafe category, open each item's edit dialog, set its category
/// to uncategorized and submit.
pub async fn uncategorize_items<D: Document>(
    r: &Remediator<'_, D>,
    markers: &HostMarkers,
    opts: &Options,
) -> Result<RemediationReport, RemediationError> {
    let doc = r.doc;
    let mut report = RemediationReport::default();

    let targets: Vec<(String, usize)> = doc
        .elements_by_class(None, &markers.category_container_class)
        .iter()
        .filter_map(|container| {
            let name = container_name(doc, markers, container)?;
            let items = doc.elements_by_class(Some(container), &markers.list_item_class).len();
            Some((name, items))
        })
        .filter(|(name, _)| !is_exempt(markers, opts, name))
        .collect();

    'categories: for (name, item_count) in targets {
        log::debug!("uncategorizing {item_count} item(s) from '{name}'");
        for _ in 0..item_count {
            let Some(item) = first_item_of(doc, markers, &name) else {
                break;
            };
            let Some(edit) = doc.first_by_class(Some(&item), &markers.edit_class) else {
                log::warn!("item in '{name}' has no edit control, skipping category");
                report.skipped += 1;
                continue 'categories;
            };

            doc.click(&edit);
            r.wait_until("item dialog to open", || has_dialog(doc, markers)).await?;
            r.wait_until("category selector", || category_controls(doc, markers).is_some())
                .await?;
            if let Some((select, submit)) = category_controls(doc, markers) {
                doc.set_value(&select, &markers.uncategorized_value);
                doc.click(&submit);
            }
            r.wait_until("item dialog to close", || !has_dialog(doc, markers)).await?;
            report.items += 1;
        }
        report.categories.push(name);
    }

    Ok(report)
}

fn container_name<D: Document>(doc: &D, markers: &HostMarkers, container: &D::Element) -> Option<String> {
    let header = doc.first_by_class(Some(container), &markers.category_header_class)?;
    doc.label_of(&header)
}

fn first_item_of<D: Document>(doc: &D, markers: &HostMarkers, name: &str) -> Option<D::Element> {
    doc.elements_by_class(None, &markers.category_container_class)
        .into_iter()
        .find(|container| container_name(doc, markers, container).as_deref() == Some(name))
        .and_then(|container| doc.first_by_class(Some(&container), &markers.list_item_class))
}

fn has_dialog<D: Document>(doc: &D, markers: &HostMarkers) -> bool {
    !doc.elements_by_tag(None, &markers.dialog_tag).is_empty()
}

/// The open dialog's category selector and submit control.
fn category_controls<D: Document>(doc: &D, markers: &HostMarkers) -> Option<(D::Element, D::Element)> {
    let dialog = doc.elements_by_tag(None, &markers.dialog_tag).into_iter().next()?;
    let label = doc
        .elements_by_tag(Some(&dialog), "label")
        .into_iter()
        .find(|label| doc.inner_text(label).trim() == markers.category_label)?;
    let field = doc.parent(&label)?;
    let select = doc.elements_by_tag(Some(&field), "select").into_iter().next()?;
    let submit = doc.first_by_class(Some(&dialog), &markers.submit_class)?;
    Some((select, submit))
}

// =============================================================================
// Categories settings: delete categories
// =============================================================================

/// For every unsafe category row, open its settings dialog and press its
/// "Delete Category" control.
pub async fn delete_categories<D: Document>(
    r: &Remediator<'_, D>,
    markers: &HostMarkers,
    opts: &Options,
) -> Result<RemediationReport, RemediationError> {
    let doc = r.doc;
    let mut report = RemediationReport::default();

    let targets: Vec<String> = doc
        .elements_by_class(None, &markers.list_item_class)
        .iter()
        .filter_map(|row| row_name(doc, markers, row))
        .filter(|name| !opts.is_marked_as_safe(name))
        .collect();

    for name in targets {
        let Some(row) = doc
            .elements_by_class(None, &markers.list_item_class)
            .into_iter()
            .find(|row| row_name(doc, markers, row).as_deref() == Some(name.as_str()))
        else {
            continue;
        };
        let Some(edit) = doc.first_by_class(Some(&row), &markers.edit_class) else {
            log::warn!("category '{name}' has no edit control, skipping");
            report.skipped += 1;
            continue;
        };

        log::debug!("deleting category '{name}'");
        doc.click(&edit);
        r.wait_until("settings dialog to open", || visible_dialog(doc, markers).is_some()).await?;
        r.wait_until("delete control", || delete_button(doc, markers).is_some()).await?;
        if let Some(button) = delete_button(doc, markers) {
            doc.click(&button);
        }
        r.wait_until("settings dialog to close", || visible_dialog(doc, markers).is_none()).await?;

        report.items += 1;
        report.categories.push(name);
    }

    Ok(report)
}

fn row_name<D: Document>(doc: &D, markers: &HostMarkers, row: &D::Element) -> Option<String> {
    let cell = doc.first_by_class(Some(row), &markers.item_value_class)?;
    doc.label_of(&cell)
}

fn visible_dialog<D: Document>(doc: &D, markers: &HostMarkers) -> Option<D::Element> {
    doc.elements_by_class(None, &markers.settings_dialog_class)
        .into_iter()
        .find(|dialog| !doc.is_hidden(dialog))
}

fn delete_button<D: Document>(doc: &D, markers: &HostMarkers) -> Option<D::Element> {
    let dialog = visible_dialog(doc, markers)?;
    doc.elements_by_class(Some(&dialog), &markers.danger_button_class)
        .into_iter()
        .find(|button| {
            doc.tag_name(button) == "button" && doc.inner_text(button).trim() == markers.delete_label
        })
}
