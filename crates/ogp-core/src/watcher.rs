//! Mutation watcher
//!
//! Re-runs the sync passes when the host page changes its list. At most one
//! pass runs at a time per watcher. Host mutations that arrive while a pass
//! is in flight either set a single pending flag, which buys exactly one
//! follow-up pass, or are dropped when coalescing is off.
//!
//! Mutations caused by the engine's own writes are recognised by the injected
//! marker classes and never schedule a pass.

use std::cell::Cell;
use std::rc::Rc;

use crate::dom::{Document, MutationKind, MutationRecord};
use crate::layout::Layout;
use crate::sync::SyncEngine;

/// What the watcher did with a batch of mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Nothing relevant, or a pass was busy and coalescing is off.
    Ignored,
    /// A pass was busy; a follow-up pass is queued behind it.
    Deferred,
    /// This call ran `passes` sync passes back to back.
    Completed { passes: usize },
}

#[derive(Debug, Default)]
struct WatchState {
    running: Cell<bool>,
    pending: Cell<bool>,
}

/// Clears the running flag even if the pass future is dropped.
struct RunGuard<'a>(&'a WatchState);

impl<'a> RunGuard<'a> {
    fn enter(state: &'a WatchState) -> Self {
        state.running.set(true);
        Self(state)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.running.set(false);
        self.0.pending.set(false);
    }
}

/// Watches one page context. Clones share the guard state.
pub struct MutationWatcher<D, L> {
    engine: SyncEngine<D, L>,
    state: Rc<WatchState>,
    coalesce: bool,
}

impl<D, L> Clone for MutationWatcher<D, L> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            state: Rc::clone(&self.state),
            coalesce: self.coalesce,
        }
    }
}

impl<D: Document, L: Layout<D>> MutationWatcher<D, L> {
    pub fn new(engine: SyncEngine<D, L>, coalesce: bool) -> Self {
        Self { engine, state: Rc::default(), coalesce }
    }

    pub fn engine(&self) -> &SyncEngine<D, L> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }

    /// Feed one observer batch.
    pub async fn on_mutations(&self, records: &[MutationRecord<D::Element>]) -> WatchOutcome {
        let relevant = records
            .iter()
            .any(|record| record.kind == MutationKind::ChildList && !self.engine.is_own_mutation(record));
        if !relevant {
            return WatchOutcome::Ignored;
        }
        self.trigger().await
    }

    /// Run a pass now unless one is in flight. Used for the initial pass.
    pub async fn trigger(&self) -> WatchOutcome {
        if self.state.running.get() {
            if self.coalesce {
                self.state.pending.set(true);
                return WatchOutcome::Deferred;
            }
            log::debug!("sync pass in flight, dropping host mutations");
            return WatchOutcome::Ignored;
        }

        let _guard = RunGuard::enter(&self.state);
        let mut passes = 0;
        loop {
            self.state.pending.set(false);
            if let Err(e) = self.engine.sync_pass().await {
                log::warn!("sync pass failed: {e}");
            }
            passes += 1;
            if !self.state.pending.get() {
                break;
            }
        }
        WatchOutcome::Completed { passes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dom::memory::MemoryDocument;
    use crate::layout::ShoppingListLayout;
    use crate::relay::RelayClient;
    use crate::storage::MemoryStore;
    use crate::testing::{add_category, shopping_list_page, with_relay, TickTimer};
    use futures::pin_mut;

    fn watcher(doc: &MemoryDocument, client: RelayClient, coalesce: bool) -> MutationWatcher<MemoryDocument, ShoppingListLayout> {
        let engine = SyncEngine::new(
            doc.clone(),
            ShoppingListLayout::default(),
            client,
            &Config::default(),
            Rc::new(TickTimer::new()),
        );
        MutationWatcher::new(engine, coalesce)
    }

    fn checkbox_count(doc: &MemoryDocument) -> usize {
        doc.elements_by_class(None, "og+-checkbox").len()
    }

    #[tokio::test]
    async fn test_own_writes_do_not_retrigger() {
        let page = shopping_list_page(&[("Snacks", &["Chips"])]);
        let doc = page.doc.clone();
        with_relay(MemoryStore::new(), |client| async move {
            let watcher = watcher(&doc, client, true);
            assert_eq!(watcher.trigger().await, WatchOutcome::Completed { passes: 1 });

            let own = doc.take_mutations();
            assert!(!own.is_empty());
            assert_eq!(watcher.on_mutations(&own).await, WatchOutcome::Ignored);
            assert!(!watcher.is_running());
        })
        .await;
    }

    #[tokio::test]
    async fn test_host_render_triggers_pass() {
        let page = shopping_list_page(&[("Snacks", &["Chips"])]);
        let doc = page.doc.clone();
        let list = page.list;
        with_relay(MemoryStore::new(), |client| async move {
            let watcher = watcher(&doc, client, true);
            watcher.trigger().await;
            doc.take_mutations();

            add_category(&doc, list, "Frozen");
            let outcome = watcher.on_mutations(&doc.take_mutations()).await;
            assert_eq!(outcome, WatchOutcome::Completed { passes: 1 });
            assert_eq!(checkbox_count(&doc), 2);
        })
        .await;
    }

    #[tokio::test]
    async fn test_host_removing_checkbox_restores_it() {
        let page = shopping_list_page(&[("Snacks", &["Chips"])]);
        let doc = page.doc.clone();
        with_relay(MemoryStore::new(), |client| async move {
            let watcher = watcher(&doc, client, true);
            assert_eq!(watcher.trigger().await, WatchOutcome::Completed { passes: 1 });
            doc.take_mutations();

            let fragment = doc.elements_by_class(None, "og+-checkbox-container")[0];
            doc.remove(&fragment);
            assert_eq!(checkbox_count(&doc), 0);

            let outcome = watcher.on_mutations(&doc.take_mutations()).await;
            assert_eq!(outcome, WatchOutcome::Completed { passes: 1 });
            assert_eq!(checkbox_count(&doc), 1);
        })
        .await;
    }

    #[tokio::test]
    async fn test_attribute_changes_are_ignored() {
        let page = shopping_list_page(&[("Snacks", &["Chips"])]);
        let doc = page.doc.clone();
        with_relay(MemoryStore::new(), |client| async move {
            let watcher = watcher(&doc, client, true);
            let header = doc.elements_by_class(None, "category-header")[0];
            doc.set_style(&header, "color", Some("red"));
            assert_eq!(watcher.on_mutations(&doc.take_mutations()).await, WatchOutcome::Ignored);
            assert_eq!(checkbox_count(&doc), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn test_mid_pass_mutation_gets_one_follow_up() {
        let page = shopping_list_page(&[("Snacks", &["Chips"])]);
        let doc = page.doc.clone();
        let list = page.list;
        with_relay(MemoryStore::new(), |client| async move {
            let watcher = watcher(&doc, client, true);
            let pass = watcher.trigger();
            pin_mut!(pass);

            // First poll parks the pass on the options round trip.
            assert!(futures::poll!(pass.as_mut()).is_pending());
            assert!(watcher.is_running());

            add_category(&doc, list, "Frozen");
            add_category(&doc, list, "Bakery");
            let batch = doc.take_mutations();
            assert_eq!(watcher.on_mutations(&batch).await, WatchOutcome::Deferred);
            assert_eq!(watcher.on_mutations(&batch).await, WatchOutcome::Deferred);

            assert_eq!(pass.await, WatchOutcome::Completed { passes: 2 });
            assert!(!watcher.is_running());
            assert_eq!(checkbox_count(&doc), 3);
        })
        .await;
    }

    #[tokio::test]
    async fn test_mid_pass_mutation_dropped_without_coalescing() {
        let page = shopping_list_page(&[("Snacks", &["Chips"])]);
        let doc = page.doc.clone();
        let list = page.list;
        with_relay(MemoryStore::new(), |client| async move {
            let watcher = watcher(&doc, client, false);
            let pass = watcher.trigger();
            pin_mut!(pass);
            assert!(futures::poll!(pass.as_mut()).is_pending());

            add_category(&doc, list, "Frozen");
            assert_eq!(watcher.on_mutations(&doc.take_mutations()).await, WatchOutcome::Ignored);
            assert_eq!(pass.await, WatchOutcome::Completed { passes: 1 });
        })
        .await;
    }
}
