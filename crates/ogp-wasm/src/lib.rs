//! WebAssembly bindings for OG+
//!
//! Three entry points, one per extension context:
//!
//! - `start_background`: owns the preference store and serves relay ports
//! - `start_content`: patches the host page and keeps it in sync
//! - `start_popup`: renders the safe-category list

use std::rc::Rc;
use std::sync::Once;

use ogp_core::wait::wait_for;
use ogp_core::{
    CancelToken, Config, Document, HostLayout, LayoutKind, MutationWatcher, PreferenceStore, RelayClient,
    RelayServer, SafeListView, SyncEngine,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

mod browser;
mod document;
mod port;
mod storage;
mod timer;

pub use document::WebDocument;
pub use port::Port;
pub use storage::SyncStorage;
pub use timer::GlooTimer;

static INIT: Once = Once::new();

fn init_runtime() {
    INIT.call_once(|| {
        console_error_panic_hook::set_once();
        wasm_logger::init(wasm_logger::Config::default());
    });
}

fn load_config(config: Option<String>) -> Result<Config, JsValue> {
    match config {
        Some(text) => Config::from_json(&text).map_err(|e| JsValue::from_str(&e.to_string())),
        None => Ok(Config::default()),
    }
}

/// Connect to the background and start delivering replies.
fn connect_client() -> Result<RelayClient, JsValue> {
    let (port, inbound) = port::connect()?;
    let client = RelayClient::new(port);
    let pump = client.clone();
    spawn_local(async move { pump.pump(inbound).await });
    Ok(client)
}

// =============================================================================
// Background
// =============================================================================

#[wasm_bindgen]
pub async fn start_background() -> Result<(), JsValue> {
    init_runtime();

    let prefs = PreferenceStore::new(SyncStorage::new()?);
    match prefs.init().await {
        Ok(true) => log::info!("initialized default options"),
        Ok(false) => {}
        Err(e) => log::error!("failed to initialize options: {e}"),
    }

    let server = RelayServer::new(prefs);
    port::on_connect(move |port, inbound| {
        let server = server.clone();
        spawn_local(async move {
            if let Err(e) = server.serve(inbound, port).await {
                log::warn!("relay connection ended: {e}");
            }
        });
    })
}

// =============================================================================
// Content script
// =============================================================================

#[wasm_bindgen]
pub async fn start_content(config: Option<String>) -> Result<(), JsValue> {
    init_runtime();
    let config = load_config(config)?;
    let host = config.markers.host.clone();
    let doc = WebDocument::new()?;

    // The host renders its list asynchronously after load.
    let ready = wait_for(&GlooTimer, &config.startup.policy(), &CancelToken::new(), || {
        doc.element_by_id(&host.list_container_id).is_some() && doc.element_by_id(&host.list_title_id).is_some()
    })
    .await;
    if !ready.is_ready() {
        return Err(JsValue::from_str("Host list did not appear"));
    }
    let (Some(list), Some(title)) = (doc.element_by_id(&host.list_container_id), doc.element_by_id(&host.list_title_id))
    else {
        return Err(JsValue::from_str("Host list disappeared"));
    };

    let search = web_sys::UrlSearchParams::new_with_str(&doc.location_search())?;
    let kind = LayoutKind::detect(search.has(&host.categories_page_param), &doc.inner_text(&title), &host);
    log::info!("detected {kind:?} layout");

    let client = connect_client()?;
    let layout = HostLayout::for_kind(kind, host);
    let engine = SyncEngine::new(doc.clone(), layout, client, &config, Rc::new(GlooTimer));
    let watcher = MutationWatcher::new(engine.clone(), config.coalesce_mutations);

    doc.listen(move |binding| {
        let engine = engine.clone();
        spawn_local(async move {
            if let Err(e) = engine.dispatch(binding).await {
                log::error!("action failed: {e}");
            }
        });
    })?;

    let observed = watcher.clone();
    doc.observe(&list, move |records| {
        let watcher = observed.clone();
        spawn_local(async move {
            watcher.on_mutations(&records).await;
        });
    })?;

    watcher.trigger().await;
    Ok(())
}

// =============================================================================
// Popup
// =============================================================================

#[wasm_bindgen]
pub async fn start_popup(config: Option<String>) -> Result<(), JsValue> {
    init_runtime();
    let config = load_config(config)?;
    let doc = WebDocument::new()?;
    let view = Rc::new(SafeListView::new(doc.clone(), connect_client()?, config.markers.popup));

    view.set_loading(true);
    let handler = view.clone();
    doc.listen(move |binding| {
        let view = handler.clone();
        spawn_local(async move {
            if let Err(e) = view.dispatch(binding).await {
                log::error!("action failed: {e}");
            }
        });
    })?;

    let rendered = view.render().await;
    view.set_loading(false);
    rendered.map(|_| ()).map_err(|e| JsValue::from_str(&e.to_string()))
}
