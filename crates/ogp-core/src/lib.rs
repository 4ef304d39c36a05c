//! OG+ Core Library
//!
//! This crate implements the category-safety synchronization subsystem of the
//! OG+ shopping-list extension. It is runtime-agnostic: storage, message ports,
//! timers and the host page are reached through small traits, and the
//! `ogp-wasm` crate plugs the browser implementations in.
//!
//! # Architecture
//!
//! The background process owns the only writer of the persisted options
//! ([`PreferenceStore`]) and serves it over a relay channel ([`RelayServer`]).
//! Page contexts hold one [`RelayClient`] each and drive a [`SyncEngine`] that
//! keeps injected "safe" checkboxes and the bulk-fix button consistent with the
//! store while the host page re-renders itself.
//!
//! # Modules
//!
//! - `options`: persisted options model and set semantics for safe categories
//! - `storage`: key-value store trait and in-memory store
//! - `prefs`: read-modify-write preference store
//! - `relay`: request/reply protocol between background and page contexts
//! - `wait`: polling wait primitive with timeout and cancellation
//! - `dom`: host-document facade and in-memory document
//! - `layout`: host layout capability interface (shopping list, categories)
//! - `sync`: idempotent checkbox and bulk-fix button render passes
//! - `watcher`: mutation watcher with single-slot coalescing
//! - `remediate`: bulk remediation driving the host page's dialogs
//! - `popup`: popup safe-category list view
//! - `config`: markers and timing configuration

pub mod config;
pub mod dom;
pub mod layout;
pub mod options;
pub mod popup;
pub mod prefs;
pub mod relay;
pub mod remediate;
pub mod storage;
pub mod sync;
pub mod wait;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{Config, Markers};
pub use dom::{Binding, Document, MutationKind, MutationRecord};
pub use layout::{CategoriesLayout, HostLayout, Layout, LayoutKind, ShoppingListLayout};
pub use options::{Categories, Options};
pub use popup::SafeListView;
pub use prefs::PreferenceStore;
pub use relay::{Action, RelayClient, RelayError, RelayReply, RelayRequest, RelayServer};
pub use remediate::{RemediationError, RemediationReport, Remediator};
pub use storage::{KvStore, MemoryStore, StorageError};
pub use sync::{SyncEngine, SyncError, SyncSummary};
pub use wait::{CancelToken, Timer, WaitOutcome, WaitPolicy};
pub use watcher::{MutationWatcher, WatchOutcome};
