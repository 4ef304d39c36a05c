//! Live DOM adapter
//!
//! Implements the core [`Document`] facade over `web-sys`, and wires injected
//! controls back to Rust. Bindings are stored as data attributes, and a pair
//! of delegated listeners on the document routes clicks and changes.

use js_sys::Reflect;
use ogp_core::{Binding, Document, MutationKind, MutationRecord};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlCollection, HtmlElement, HtmlInputElement, HtmlSelectElement};

use crate::browser::{call_method, extension_api, get_path};

const ACTION_ATTR: &str = "data-ogp-action";
const CATEGORY_ATTR: &str = "data-ogp-category";

#[derive(Clone)]
pub struct WebDocument {
    document: web_sys::Document,
}

impl WebDocument {
    pub fn new() -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("No document"))?;
        Ok(Self { document })
    }

    pub fn location_search(&self) -> String {
        web_sys::window()
            .and_then(|window| window.location().search().ok())
            .unwrap_or_default()
    }

    /// Route user events on bound controls to `handler`.
    ///
    /// Clicks are caught in the capture phase. A click on a toggle checkbox is
    /// stopped there so the host's header handler never sees it; the toggle
    /// itself is reported from the `change` event that follows.
    pub fn listen<F>(&self, handler: F) -> Result<(), JsValue>
    where
        F: Fn(Binding) + 'static,
    {
        let handler = std::rc::Rc::new(handler);

        let on_click = {
            let handler = handler.clone();
            Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
                let Some(binding) = bound_target(&event).and_then(|el| binding_of(&el)) else {
                    return;
                };
                match binding {
                    Binding::ToggleCategory(_) => event.stop_propagation(),
                    other => handler(other),
                }
            })
        };
        let on_change = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
            if let Some(binding @ Binding::ToggleCategory(_)) = bound_target(&event).and_then(|el| binding_of(&el)) {
                handler(binding);
            }
        });

        self.document
            .add_event_listener_with_callback_and_bool("click", on_click.as_ref().unchecked_ref(), true)?;
        self.document
            .add_event_listener_with_callback_and_bool("change", on_change.as_ref().unchecked_ref(), true)?;
        on_click.forget();
        on_change.forget();
        Ok(())
    }

    /// Observe `target`'s subtree for child-list changes.
    pub fn observe<F>(&self, target: &Element, handler: F) -> Result<web_sys::MutationObserver, JsValue>
    where
        F: Fn(Vec<MutationRecord<Element>>) + 'static,
    {
        let callback = Closure::<dyn FnMut(js_sys::Array, web_sys::MutationObserver)>::new(
            move |records: js_sys::Array, _observer: web_sys::MutationObserver| {
                let batch = records
                    .iter()
                    .filter_map(|record| record.dyn_into::<web_sys::MutationRecord>().ok())
                    .map(|record| convert(&record))
                    .collect();
                handler(batch);
            },
        );
        let observer = web_sys::MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let init = web_sys::MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer.observe_with_options(target, &init)?;
        callback.forget();
        Ok(observer)
    }
}

fn convert(record: &web_sys::MutationRecord) -> MutationRecord<Element> {
    let kind = match record.type_().as_str() {
        "attributes" => MutationKind::Attributes,
        "characterData" => MutationKind::CharacterData,
        _ => MutationKind::ChildList,
    };
    let (added, added_other) = split_nodes(&record.added_nodes());
    let (removed, removed_other) = split_nodes(&record.removed_nodes());
    MutationRecord { kind, added, removed, other_nodes: added_other + removed_other }
}

/// Element nodes, and the count of everything else.
fn split_nodes(nodes: &web_sys::NodeList) -> (Vec<Element>, usize) {
    let mut elements = Vec::new();
    let mut other = 0;
    for index in 0..nodes.length() {
        match nodes.item(index).map(|node| node.dyn_into::<Element>()) {
            Some(Ok(element)) => elements.push(element),
            _ => other += 1,
        }
    }
    (elements, other)
}

fn bound_target(event: &web_sys::Event) -> Option<Element> {
    let target: Element = event.target()?.dyn_into().ok()?;
    target.closest(&format!("[{ACTION_ATTR}]")).ok().flatten()
}

fn binding_of(element: &Element) -> Option<Binding> {
    let category = element.get_attribute(CATEGORY_ATTR).unwrap_or_default();
    match element.get_attribute(ACTION_ATTR)?.as_str() {
        "toggle" => Some(Binding::ToggleCategory(category)),
        "fix" => Some(Binding::FixCategories),
        "unmark" => Some(Binding::UnmarkCategory(category)),
        _ => None,
    }
}

fn collect(collection: HtmlCollection) -> Vec<Element> {
    (0..collection.length()).filter_map(|i| collection.item(i)).collect()
}

fn ignore(result: Result<(), JsValue>) {
    if let Err(e) = result {
        log::debug!("DOM call failed: {e:?}");
    }
}

impl Document for WebDocument {
    type Element = Element;

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn elements_by_class(&self, scope: Option<&Element>, class: &str) -> Vec<Element> {
        collect(match scope {
            Some(scope) => scope.get_elements_by_class_name(class),
            None => self.document.get_elements_by_class_name(class),
        })
    }

    fn elements_by_tag(&self, scope: Option<&Element>, tag: &str) -> Vec<Element> {
        collect(match scope {
            Some(scope) => scope.get_elements_by_tag_name(tag),
            None => self.document.get_elements_by_tag_name(tag),
        })
    }

    fn parent(&self, element: &Element) -> Option<Element> {
        element.parent_element()
    }

    fn has_class(&self, element: &Element, class: &str) -> bool {
        element.class_list().contains(class)
    }

    fn tag_name(&self, element: &Element) -> String {
        element.tag_name().to_ascii_lowercase()
    }

    fn first_text(&self, element: &Element) -> Option<String> {
        element.first_child()?.text_content()
    }

    fn inner_text(&self, element: &Element) -> String {
        match element.dyn_ref::<HtmlElement>() {
            Some(html) => html.inner_text(),
            None => element.text_content().unwrap_or_default(),
        }
    }

    fn is_hidden(&self, element: &Element) -> bool {
        element
            .dyn_ref::<HtmlElement>()
            .and_then(|html| html.style().get_property_value("display").ok())
            .is_some_and(|display| display == "none")
    }

    fn is_checked(&self, element: &Element) -> bool {
        element.dyn_ref::<HtmlInputElement>().is_some_and(|input| input.checked())
    }

    fn create_element(&self, tag: &str) -> Element {
        // Tag names come from fixed literals, so creation cannot fail.
        self.document.create_element(tag).expect_throw("invalid tag name")
    }

    fn add_class(&self, element: &Element, class: &str) {
        ignore(element.class_list().add_1(class));
    }

    fn set_attribute(&self, element: &Element, name: &str, value: &str) {
        ignore(element.set_attribute(name, value));
    }

    fn set_style(&self, element: &Element, property: &str, value: Option<&str>) {
        let Some(html) = element.dyn_ref::<HtmlElement>() else {
            return;
        };
        let style = html.style();
        match value {
            Some(value) => ignore(style.set_property(property, value)),
            None => ignore(style.remove_property(property).map(|_| ())),
        }
    }

    fn set_text(&self, element: &Element, text: &str) {
        element.set_text_content(Some(text));
    }

    fn append_text(&self, parent: &Element, text: &str) {
        let node = self.document.create_text_node(text);
        ignore(parent.append_child(&node).map(|_| ()));
    }

    fn append_child(&self, parent: &Element, child: &Element) {
        ignore(parent.append_child(child).map(|_| ()));
    }

    fn insert_before(&self, parent: &Element, child: &Element, reference: &Element) {
        ignore(parent.insert_before(child, Some(reference)).map(|_| ()));
    }

    fn remove(&self, element: &Element) {
        element.remove();
    }

    fn bind(&self, element: &Element, binding: Binding) {
        let (action, category) = match binding {
            Binding::ToggleCategory(category) => ("toggle", Some(category)),
            Binding::FixCategories => ("fix", None),
            Binding::UnmarkCategory(category) => ("unmark", Some(category)),
        };
        ignore(element.set_attribute(ACTION_ATTR, action));
        if let Some(category) = category {
            ignore(element.set_attribute(CATEGORY_ATTR, &category));
        }
    }

    fn resolve_asset(&self, path: &str) -> String {
        extension_api()
            .and_then(|api| get_path(&api, &["runtime"]))
            .and_then(|runtime| call_method(&runtime, "getURL", &[path.into()]))
            .ok()
            .and_then(|url| url.as_string())
            .unwrap_or_else(|| path.to_string())
    }

    fn set_checked(&self, element: &Element, checked: bool) {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.set_checked(checked);
        }
    }

    fn set_value(&self, element: &Element, value: &str) {
        if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        } else if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else {
            ignore(Reflect::set(element, &"value".into(), &value.into()).map(|_| ()));
        }
    }

    fn click(&self, element: &Element) {
        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            html.click();
        }
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_checkbox_click_stays_off_header() {
        let doc = WebDocument::new().unwrap();
        let body: Element = doc.document.body().unwrap().into();

        let header = doc.create_element("div");
        doc.append_child(&body, &header);
        let checkbox = doc.create_element("input");
        doc.set_attribute(&checkbox, "type", "checkbox");
        doc.bind(&checkbox, Binding::ToggleCategory("Snacks".into()));
        doc.append_child(&header, &checkbox);
        let fix = doc.create_element("button");
        doc.bind(&fix, Binding::FixCategories);
        doc.append_child(&header, &fix);

        let header_clicks = Rc::new(Cell::new(0));
        let on_header = {
            let header_clicks = header_clicks.clone();
            Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
                header_clicks.set(header_clicks.get() + 1);
            })
        };
        header
            .add_event_listener_with_callback("click", on_header.as_ref().unchecked_ref())
            .unwrap();
        on_header.forget();

        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = seen.clone();
            doc.listen(move |binding| seen.borrow_mut().push(binding)).unwrap();
        }

        doc.click(&checkbox);
        assert_eq!(header_clicks.get(), 0);
        assert!(doc.is_checked(&checkbox));
        assert_eq!(*seen.borrow(), vec![Binding::ToggleCategory("Snacks".into())]);

        doc.click(&fix);
        assert_eq!(header_clicks.get(), 1);
        assert_eq!(seen.borrow().last(), Some(&Binding::FixCategories));

        header.remove();
    }
}
