//! `runtime` ports as relay channels
//!
//! Each page context opens one port with `runtime.connect`; the background
//! accepts them with `runtime.onConnect`. Inbound messages are forwarded into
//! an unbounded channel that ends when the port disconnects.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use ogp_core::relay::Outbound;
use ogp_core::RelayError;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::browser::{call_method, describe, extension_api, from_js, get_path, to_js};

/// One end of a `runtime.Port`.
pub struct Port {
    port: JsValue,
}

impl Outbound for Port {
    fn post(&self, message: Value) -> Result<(), RelayError> {
        let message = to_js(&message).map_err(|e| RelayError::Post(describe(&e)))?;
        call_method(&self.port, "postMessage", &[message])
            .map(|_| ())
            .map_err(|e| {
                // Posting on a disconnected port throws.
                log::debug!("postMessage failed: {}", describe(&e));
                RelayError::Disconnected
            })
    }
}

/// Open the page context's port to the background.
pub fn connect() -> Result<(Port, UnboundedReceiver<Value>), JsValue> {
    let runtime = get_path(&extension_api()?, &["runtime"])?;
    let port = call_method(&runtime, "connect", &[])?;
    let inbound = listen(&port)?;
    Ok((Port { port }, inbound))
}

/// Run `handler` for every port a page context opens.
pub fn on_connect<F>(mut handler: F) -> Result<(), JsValue>
where
    F: FnMut(Port, UnboundedReceiver<Value>) + 'static,
{
    let event = get_path(&extension_api()?, &["runtime", "onConnect"])?;
    let callback = Closure::<dyn FnMut(JsValue)>::new(move |port: JsValue| match listen(&port) {
        Ok(inbound) => handler(Port { port }, inbound),
        Err(e) => log::error!("failed to listen on port: {}", describe(&e)),
    });
    call_method(&event, "addListener", &[callback.as_ref().clone()])?;
    callback.forget();
    Ok(())
}

fn listen(port: &JsValue) -> Result<UnboundedReceiver<Value>, JsValue> {
    let (sender, receiver) = mpsc::unbounded();
    let sender: Rc<RefCell<Option<UnboundedSender<Value>>>> = Rc::new(RefCell::new(Some(sender)));

    let forward = sender.clone();
    let on_message = Closure::<dyn FnMut(JsValue)>::new(move |message: JsValue| {
        let message = match from_js(&message) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("dropping unreadable port message: {}", describe(&e));
                return;
            }
        };
        if let Some(sender) = forward.borrow().as_ref() {
            let _ = sender.unbounded_send(message);
        }
    });
    let on_disconnect = Closure::<dyn FnMut(JsValue)>::new(move |_port: JsValue| {
        sender.borrow_mut().take();
    });

    call_method(&get_path(port, &["onMessage"])?, "addListener", &[on_message.as_ref().clone()])?;
    call_method(&get_path(port, &["onDisconnect"])?, "addListener", &[on_disconnect.as_ref().clone()])?;
    on_message.forget();
    on_disconnect.forget();
    Ok(receiver)
}
