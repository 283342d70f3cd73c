//! DOM adapter: implements `Host` over the canvas element and the document.
//!
//! Document-level listeners are closures that route back into the app
//! through a weak handle. A removed listener's closure is parked in
//! `retired` rather than dropped, since removal often happens from inside
//! that very closure; `sweep` frees them once no handler is running.

use crate::app::App;
use sb_core::emitter::position_style;
use sb_core::id::CardId;
use sb_core::model::{ActionKind, Point, Size};
use sb_editor::host::{Host, ListenerId, ListenerKind, ListenerOwner};
use sb_editor::input::Region;
use sb_editor::menu::ExportFile;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, Event, EventTarget, HtmlAnchorElement, HtmlElement, MouseEvent, Node,
};

type Handler = Closure<dyn FnMut(Event)>;

struct Listener {
    event: &'static str,
    closure: Handler,
}

/// Listener the app installs for its own lifetime (canvas, menu box).
struct Binding {
    target: EventTarget,
    event: &'static str,
    closure: Handler,
}

pub(crate) struct DomHost {
    document: Document,
    canvas: HtmlElement,
    menu: MenuView,
    app: Weak<RefCell<App>>,
    next_listener: u32,
    listeners: HashMap<ListenerId, Listener>,
    retired: Vec<Handler>,
    bindings: Vec<Binding>,
}

impl DomHost {
    pub(crate) fn new(document: Document, canvas: HtmlElement, menu: MenuView, app: Weak<RefCell<App>>) -> Self {
        Self {
            document,
            canvas,
            menu,
            app,
            next_listener: 0,
            listeners: HashMap::new(),
            retired: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub(crate) fn canvas(&self) -> &HtmlElement {
        &self.canvas
    }

    pub(crate) fn menu_element(&self) -> &HtmlElement {
        &self.menu.element
    }

    /// Free closures of listeners removed earlier.
    pub(crate) fn sweep(&mut self) {
        self.retired.clear();
    }

    /// Install an app-lifetime listener on `target`.
    pub(crate) fn bind(&mut self, target: EventTarget, event: &'static str, closure: Handler) {
        if let Err(err) = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref()) {
            log::warn!("could not listen for {event}: {err:?}");
            return;
        }
        self.bindings.push(Binding {
            target,
            event,
            closure,
        });
    }

    /// Remove every app-lifetime listener and the menu element.
    pub(crate) fn unbind_all(&mut self) {
        for binding in self.bindings.drain(..) {
            let _ = binding
                .target
                .remove_event_listener_with_callback(binding.event, binding.closure.as_ref().unchecked_ref());
            self.retired.push(binding.closure);
        }
        self.menu.element.remove();
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    pub(crate) fn canvas_size(&self) -> Size {
        Size::new(self.canvas.client_width() as f32, self.canvas.client_height() as f32)
    }

    /// Pointer position relative to the canvas padding box, the frame card
    /// positions are resolved against.
    pub(crate) fn pointer(&self, event: &Event) -> Option<Point> {
        let mouse = event.dyn_ref::<MouseEvent>()?;
        let client = Point::new(mouse.client_x() as f32, mouse.client_y() as f32);
        Some(relative_to(client, self.padding_origin()))
    }

    /// Viewport coordinates of the canvas padding box's top-left corner.
    fn padding_origin(&self) -> Point {
        let rect = self.canvas.get_bounding_client_rect();
        inside_border(
            Point::new(rect.left() as f32, rect.top() as f32),
            self.canvas.client_left(),
            self.canvas.client_top(),
        )
    }

    // ─── Classification ──────────────────────────────────────────────────

    /// Where an event landed: inside the menu, outside the canvas, or on a
    /// card (its `data-card-id` tag and the region within it).
    pub(crate) fn locate(&self, event: &Event) -> Location {
        let Some(element) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
            return Location::Outside;
        };
        let node: &Node = &element;
        if self.menu.element.contains(Some(node)) {
            return Location::Menu;
        }
        if !self.canvas.contains(Some(node)) {
            return Location::Outside;
        }
        let Some(card) = element.closest("[data-card-id]").ok().flatten() else {
            return Location::Canvas(None, Region::Body);
        };
        let within = |selector: &str| {
            element
                .closest(selector)
                .ok()
                .flatten()
                .is_some_and(|found| card.contains(Some(&*found)))
        };
        let region = if within(".title") {
            Region::Title
        } else if within(".content") {
            Region::Content
        } else {
            Region::Body
        };
        Location::Canvas(card.get_attribute("data-card-id"), region)
    }

    /// The menu entry a click landed on.
    pub(crate) fn menu_action(&self, event: &Event) -> Option<ActionKind> {
        let element = event.target()?.dyn_into::<Element>().ok()?;
        let entry = element.closest("[data-action]").ok().flatten()?;
        ActionKind::from_name(&entry.get_attribute("data-action")?)
    }

    // ─── Canvas rendering ────────────────────────────────────────────────

    fn card_element(&self, id: CardId) -> Option<HtmlElement> {
        self.canvas
            .query_selector(&format!(r#"[data-card-id="{id}"]"#))
            .ok()
            .flatten()
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
    }

    fn content_element(&self, id: CardId) -> Option<HtmlElement> {
        self.card_element(id)?
            .query_selector(".content")
            .ok()
            .flatten()
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
    }

    pub(crate) fn append_card(&self, markup: &str) {
        if let Err(err) = self.canvas.insert_adjacent_html("beforeend", markup) {
            log::warn!("card insert failed: {err:?}");
        }
    }

    pub(crate) fn remove_card(&self, id: CardId) {
        if let Some(el) = self.card_element(id) {
            el.remove();
        }
    }

    /// Move a card element to the end of the canvas.
    pub(crate) fn raise_card(&self, id: CardId) {
        if let Some(el) = self.card_element(id)
            && let Err(err) = self.canvas.append_child(&el)
        {
            log::warn!("raise failed: {err:?}");
        }
    }

    pub(crate) fn replace_canvas(&self, markup: &str) {
        self.canvas.set_inner_html(markup);
    }

    pub(crate) fn set_card_attribute(&self, id: CardId, name: &str, value: &str) {
        if let Some(el) = self.card_element(id) {
            let _ = el.set_attribute(name, value);
        }
    }

    pub(crate) fn set_card_content(&self, id: CardId, markup: &str) {
        if let Some(el) = self.content_element(id)
            && el.inner_html() != markup
        {
            el.set_inner_html(markup);
        }
    }

    pub(crate) fn measure_card(&self, id: CardId) -> Option<Size> {
        let el = self.card_element(id)?;
        Some(Size::new(el.offset_width() as f32, el.offset_height() as f32))
    }

    pub(crate) fn measure_menu(&self) -> Size {
        Size::new(
            self.menu.element.offset_width() as f32,
            self.menu.element.offset_height() as f32,
        )
    }

    // ─── Page effects ────────────────────────────────────────────────────

    /// Offer `file` as a plain-text download.
    pub(crate) fn download(&self, file: &ExportFile) -> Result<(), JsValue> {
        let anchor: HtmlAnchorElement = self.document.create_element("a")?.dyn_into()?;
        anchor.set_href(&format!(
            "data:text/plain;charset=utf-8,{}",
            String::from(js_sys::encode_uri_component(&file.text))
        ));
        anchor.set_download(&file.file_name);
        anchor.click();
        Ok(())
    }
}

/// The padding box starts inside the left and top borders.
fn inside_border(border_box: Point, border_left: i32, border_top: i32) -> Point {
    Point::new(border_box.x + border_left as f32, border_box.y + border_top as f32)
}

fn relative_to(point: Point, origin: Point) -> Point {
    Point::new(point.x - origin.x, point.y - origin.y)
}

/// Result of `DomHost::locate`.
pub(crate) enum Location {
    Menu,
    Outside,
    Canvas(Option<String>, Region),
}

impl Host for DomHost {
    fn add_listener(&mut self, owner: ListenerOwner, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;

        let app = self.app.clone();
        let closure = Handler::new(move |event: Event| App::on_document_event(&app, owner, kind, event));
        let event = kind.event_name();
        if let Err(err) = self
            .document
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        {
            log::warn!("could not listen for {event}: {err:?}");
        }
        self.listeners.insert(id, Listener { event, closure });
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        let Some(listener) = self.listeners.remove(&id) else {
            return;
        };
        let _ = self
            .document
            .remove_event_listener_with_callback(listener.event, listener.closure.as_ref().unchecked_ref());
        self.retired.push(listener.closure);
    }

    fn place(&mut self, card: CardId, at: Point) {
        if let Some(el) = self.card_element(card) {
            let _ = el.set_attribute("style", &position_style(at));
        }
    }

    fn set_editable(&mut self, card: CardId, editable: bool) {
        let Some(content) = self.content_element(card) else {
            return;
        };
        if editable {
            let _ = content.set_attribute("contenteditable", "true");
            let _ = content.focus();
        } else {
            let _ = content.remove_attribute("contenteditable");
            let _ = content.blur();
        }
    }

    fn select_content(&mut self, card: CardId) {
        let Some(content) = self.content_element(card) else {
            return;
        };
        let selection = web_sys::window().and_then(|w| w.get_selection().ok().flatten());
        if let Some(selection) = selection
            && let Err(err) = selection.select_all_children(&content)
        {
            log::debug!("select all failed: {err:?}");
        }
    }

    fn live_content(&self, card: CardId) -> Option<String> {
        self.content_element(card).map(|el| el.inner_html())
    }

    fn show_menu(&mut self, at: Point, actions: &[ActionKind]) {
        let origin = self.padding_origin();
        self.menu.show(Point::new(origin.x + at.x, origin.y + at.y), actions);
    }

    fn hide_menu(&mut self) {
        self.menu.hide();
    }
}

// ─── Menu view ───────────────────────────────────────────────────────────

/// The context menu box: a fixed-position element holding one entry per
/// visible action.
pub(crate) struct MenuView {
    element: HtmlElement,
}

impl MenuView {
    pub(crate) fn create(document: &Document) -> Result<Self, JsValue> {
        let element: HtmlElement = document.create_element("div")?.dyn_into()?;
        element.set_class_name("context-menu hidden");
        let _ = element.style().set_property("position", "fixed");
        document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?
            .append_child(&element)?;
        Ok(Self { element })
    }

    fn show(&self, at: Point, actions: &[ActionKind]) {
        let items: String = actions
            .iter()
            .map(|a| format!(r#"<p data-action="{}">{}</p>"#, a.as_str(), a.label()))
            .collect();
        self.element.set_inner_html(&items);
        let _ = self.element.set_attribute("style", &format!("position: fixed; {}", position_style(at)));
        let _ = self.element.class_list().remove_1("hidden");
    }

    fn hide(&self) {
        let _ = self.element.class_list().add_1("hidden");
    }
}
