//! Browser backend
//!
//! [`WebDom`] implements [`Dom`] over `web-sys`, and [`launch`] wires an
//! [`Engine`] into the live page:
//!
//! - style overrides injected immediately
//! - initial scan now, or on `DOMContentLoaded` while the document is loading
//! - a `MutationObserver` on the whole document (child list, plus
//!   `style`/`class`/`id` attribute changes)
//! - passive `scroll`/`resize` listeners feeding the debounce
//! - capturing `click`/`keydown`/`touchstart` listeners re-applying the unlock
//! - one `setTimeout` re-armed at the engine's next deadline
//!
//! The engine sits in a `RefCell`. A callback that finds it already borrowed
//! skips its work; the periodic scan picks up anything missed. Callbacks are
//! leaked and live as long as the document.

use crate::clock::{Clock, PerformanceClock};
use crate::dom::{ComputedStyle, Dom, Mutation, Rect, Viewport};
use crate::engine::Engine;
use crate::result::{DomError, DomResult, UnveilError, UnveilResult};
use crate::watcher::WATCHED_ATTRIBUTES;
use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    AddEventListenerOptions, Document, DocumentReadyState, Element, EventTarget, HtmlElement,
    MutationObserver, MutationObserverInit, MutationRecord, Window,
};

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

// =============================================================================
// NODE HANDLE
// =============================================================================

/// Element handle with stable identity
///
/// Identity is a per-document counter stored in a `WeakMap` keyed by the
/// element, so two handles obtained separately for the same element compare
/// equal and hash alike.
#[derive(Clone)]
pub struct WebNode {
    id: u32,
    element: Element,
}

impl WebNode {
    /// The underlying element
    #[must_use]
    pub const fn element(&self) -> &Element {
        &self.element
    }
}

impl PartialEq for WebNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WebNode {}

impl Hash for WebNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for WebNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}#{}>", self.element.tag_name().to_ascii_lowercase(), self.id)
    }
}

// =============================================================================
// DOM
// =============================================================================

/// Live page document
pub struct WebDom {
    window: Window,
    document: Document,
    ids: js_sys::WeakMap,
    next_id: Cell<u32>,
}

impl fmt::Debug for WebDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDom")
            .field("handles", &self.next_id.get())
            .finish_non_exhaustive()
    }
}

impl WebDom {
    /// Wrap a window and its document
    #[must_use]
    pub fn new(window: Window, document: Document) -> Self {
        Self {
            window,
            document,
            ids: js_sys::WeakMap::new(),
            next_id: Cell::new(0),
        }
    }

    /// Handle for `element`, reusing its identity if it was seen before
    pub fn node(&self, element: Element) -> WebNode {
        let key: &js_sys::Object = element.as_ref();
        let id = match self.ids.get(key).as_f64() {
            Some(id) => id as u32,
            None => {
                let id = self.next_id.get();
                self.next_id.set(id.wrapping_add(1));
                self.ids.set(key, &JsValue::from(id));
                id
            }
        };
        WebNode { id, element }
    }

    fn collect(&self, collection: &web_sys::HtmlCollection, limit: usize) -> Vec<WebNode> {
        let len = (collection.length() as usize).min(limit);
        (0..len)
            .filter_map(|i| collection.item(i as u32))
            .map(|element| self.node(element))
            .collect()
    }

    fn style_of(node: &WebNode) -> DomResult<web_sys::CssStyleDeclaration> {
        node.element
            .dyn_ref::<HtmlElement>()
            .map(HtmlElement::style)
            .ok_or_else(|| DomError::Unsupported {
                tag: node.element.tag_name().to_ascii_lowercase(),
            })
    }

    /// Convert one observer record; non-element nodes are dropped
    pub fn convert_record(&self, record: &MutationRecord) -> Vec<Mutation<WebNode>> {
        match record.type_().as_str() {
            "childList" => {
                let added = record.added_nodes();
                (0..added.length())
                    .filter_map(|i| added.item(i))
                    .filter_map(|n| n.dyn_into::<Element>().ok())
                    .map(|element| Mutation::added(self.node(element)))
                    .collect()
            }
            "attributes" => {
                let target = record.target().and_then(|n| n.dyn_into::<Element>().ok());
                match (target, record.attribute_name()) {
                    (Some(element), Some(name)) => {
                        vec![Mutation::attribute(self.node(element), &name)]
                    }
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }
}

impl Dom for WebDom {
    type Node = WebNode;

    fn viewport(&self) -> DomResult<Viewport> {
        let read = |value: Result<JsValue, JsValue>| {
            value
                .map_err(|e| DomError::geometry(js_message(&e)))?
                .as_f64()
                .ok_or_else(|| DomError::geometry("viewport size is not a number"))
        };
        Ok(Viewport::new(
            read(self.window.inner_width())?,
            read(self.window.inner_height())?,
        ))
    }

    fn document_element(&self) -> Option<WebNode> {
        self.document.document_element().map(|e| self.node(e))
    }

    fn body(&self) -> Option<WebNode> {
        self.document
            .body()
            .map(|b| self.node(b.unchecked_into::<Element>()))
    }

    fn tag_name(&self, node: &WebNode) -> DomResult<String> {
        Ok(node.element.tag_name().to_ascii_lowercase())
    }

    fn attribute(&self, node: &WebNode, name: &str) -> DomResult<Option<String>> {
        Ok(node.element.get_attribute(name))
    }

    fn computed_style(&self, node: &WebNode) -> DomResult<ComputedStyle> {
        if !node.element.is_connected() {
            return Err(DomError::Detached);
        }
        let style = self
            .window
            .get_computed_style(&node.element)
            .map_err(|e| DomError::style(js_message(&e)))?
            .ok_or_else(|| DomError::style("no computed style"))?;
        let get = |property: &str| {
            style
                .get_property_value(property)
                .map_err(|e| DomError::style(js_message(&e)))
        };
        Ok(ComputedStyle::from_css(
            &get("display")?,
            &get("visibility")?,
            &get("position")?,
            &get("z-index")?,
        ))
    }

    fn bounding_rect(&self, node: &WebNode) -> DomResult<Rect> {
        if !node.element.is_connected() {
            return Err(DomError::Detached);
        }
        let r = node.element.get_bounding_client_rect();
        Ok(Rect::new(r.x(), r.y(), r.width(), r.height()))
    }

    fn is_connected(&self, node: &WebNode) -> bool {
        node.element.is_connected()
    }

    fn elements(&self, limit: usize) -> DomResult<Vec<WebNode>> {
        Ok(self.collect(&self.document.get_elements_by_tag_name("*"), limit))
    }

    fn descendants(&self, node: &WebNode, limit: usize) -> DomResult<Vec<WebNode>> {
        Ok(self.collect(&node.element.get_elements_by_tag_name("*"), limit))
    }

    fn query_all(&self, selector: &str) -> DomResult<Vec<WebNode>> {
        let list = self
            .document
            .query_selector_all(selector)
            .map_err(|e| DomError::query(selector, js_message(&e)))?;
        Ok((0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .map(|element| self.node(element))
            .collect())
    }

    fn set_important(&self, node: &WebNode, property: &str, value: &str) -> DomResult<()> {
        Self::style_of(node)?
            .set_property_with_priority(property, value, "important")
            .map_err(|e| DomError::mutation(js_message(&e)))
    }

    fn remove(&self, node: &WebNode) -> DomResult<()> {
        if !node.element.is_connected() {
            return Err(DomError::Detached);
        }
        node.element.remove();
        Ok(())
    }

    fn upsert_stylesheet(&self, marker: &str, css: &str) -> DomResult<()> {
        if let Some(existing) = self.document.get_element_by_id(marker) {
            existing.set_text_content(Some(css));
            return Ok(());
        }
        let style = self
            .document
            .create_element("style")
            .map_err(|e| DomError::mutation(js_message(&e)))?;
        style.set_id(marker);
        style.set_text_content(Some(css));

        // At document_start there may be no <head> yet.
        let parent: web_sys::Node = match self.document.head() {
            Some(head) => head.unchecked_into(),
            None => self
                .document
                .document_element()
                .ok_or_else(|| DomError::mutation("document has no root element"))?
                .unchecked_into(),
        };
        parent
            .append_child(&style)
            .map_err(|e| DomError::mutation(js_message(&e)))?;
        Ok(())
    }
}

// =============================================================================
// HOST WIRING
// =============================================================================

type PageEngine = Engine<WebDom, PerformanceClock>;

struct Host {
    engine: RefCell<PageEngine>,
    window: Window,
    timer: Cell<Option<i32>>,
    tick: OnceCell<Closure<dyn FnMut()>>,
}

impl Host {
    /// Run `f` on the engine unless a callback further up the stack holds it,
    /// then re-arm the timer
    fn with_engine<R>(&self, f: impl FnOnce(&mut PageEngine) -> R) -> Option<R> {
        let result = match self.engine.try_borrow_mut() {
            Ok(mut engine) => Some(f(&mut engine)),
            Err(_) => {
                tracing::trace!("engine busy, skipping callback");
                None
            }
        };
        self.rearm();
        result
    }

    fn rearm(&self) {
        let Ok(engine) = self.engine.try_borrow() else {
            return;
        };
        let deadline = engine.next_deadline();
        drop(engine);

        if let Some(handle) = self.timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
        let (Some(deadline), Some(tick)) = (deadline, self.tick.get()) else {
            return;
        };
        let delay = deadline.saturating_sub(PerformanceClock.now_ms());
        let delay = i32::try_from(delay).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(tick.as_ref().unchecked_ref(), delay)
        {
            Ok(handle) => self.timer.set(Some(handle)),
            Err(e) => tracing::trace!(error = %js_message(&e), "timer rejected"),
        }
    }

    fn install_tick(self: &Rc<Self>) {
        let weak: Weak<Self> = Rc::downgrade(self);
        let tick = Closure::wrap(Box::new(move || {
            if let Some(host) = weak.upgrade() {
                host.timer.set(None);
                host.with_engine(PageEngine::run_due);
            }
        }) as Box<dyn FnMut()>);
        // Only called once, right after construction.
        let _ = self.tick.set(tick);
    }

    fn observe(self: &Rc<Self>, document: &Document) -> UnveilResult<()> {
        let host = Rc::clone(self);
        let callback = Closure::wrap(Box::new(move |records: js_sys::Array, _: MutationObserver| {
            host.with_engine(|engine| {
                let mutations: Vec<Mutation<WebNode>> = records
                    .iter()
                    .filter_map(|r| r.dyn_into::<MutationRecord>().ok())
                    .flat_map(|r| engine.dom().convert_record(&r))
                    .collect();
                if !mutations.is_empty() {
                    engine.on_mutations(&mutations);
                }
            });
        }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|e| wiring("mutation observer", &e))?;
        let filter: js_sys::Array = WATCHED_ATTRIBUTES.iter().map(|a| JsValue::from_str(a)).collect();
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_attributes(true);
        init.set_attribute_filter(&filter);
        observer
            .observe_with_options(document, &init)
            .map_err(|e| wiring("mutation observer", &e))?;
        callback.forget();
        Ok(())
    }

    fn listen(
        self: &Rc<Self>,
        target: &EventTarget,
        events: &[&'static str],
        options: &AddEventListenerOptions,
        handler: fn(&mut PageEngine),
    ) -> UnveilResult<()> {
        let host = Rc::clone(self);
        let callback = Closure::wrap(Box::new(move |_: web_sys::Event| {
            host.with_engine(handler);
        }) as Box<dyn FnMut(web_sys::Event)>);
        for event in events {
            target
                .add_event_listener_with_callback_and_add_event_listener_options(
                    event,
                    callback.as_ref().unchecked_ref(),
                    options,
                )
                .map_err(|e| wiring(*event, &e))?;
        }
        callback.forget();
        Ok(())
    }
}

fn wiring(what: &'static str, err: &JsValue) -> UnveilError {
    UnveilError::Wiring {
        what,
        message: js_message(err),
    }
}

/// Bring the engine up in the current page
///
/// # Errors
///
/// Fails without a window or document, or if the observer or a listener
/// cannot be installed.
pub fn launch() -> UnveilResult<()> {
    let window = web_sys::window().ok_or(UnveilError::NoWindow)?;
    let document = window.document().ok_or(UnveilError::NoDocument)?;
    let ready = document.ready_state() != DocumentReadyState::Loading;

    let dom = WebDom::new(window.clone(), document.clone());
    let host = Rc::new(Host {
        engine: RefCell::new(Engine::new(dom, PerformanceClock)),
        window: window.clone(),
        timer: Cell::new(None),
        tick: OnceCell::new(),
    });
    host.install_tick();
    host.observe(&document)?;

    let passive = AddEventListenerOptions::new();
    passive.set_passive(true);
    host.listen(&window, &["scroll", "resize"], &passive, |engine| {
        engine.on_viewport_change();
    })?;

    let capture = AddEventListenerOptions::new();
    capture.set_capture(true);
    capture.set_passive(true);
    host.listen(&document, &["click", "keydown", "touchstart"], &capture, |engine| {
        engine.on_interaction();
    })?;

    if !ready {
        let once = AddEventListenerOptions::new();
        once.set_once(true);
        host.listen(&document, &["DOMContentLoaded"], &once, |engine| {
            engine.on_ready();
        })?;
    }

    host.with_engine(|engine| engine.start(ready));
    tracing::debug!(ready, "unveil launched");
    Ok(())
}

/// Packaging entry point
#[wasm_bindgen::prelude::wasm_bindgen(js_name = start)]
pub fn start() -> Result<(), JsValue> {
    launch().map_err(|e| JsValue::from_str(&e.to_string()))
}
