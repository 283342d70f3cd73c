//! The browser-side application: a `BoardSession` bound to the DOM.
//!
//! Every entry point (DOM listener, timer, async continuation) reaches the
//! app through a `Weak<RefCell<App>>` and `try_borrow_mut`. Focus, blur and
//! click can be dispatched synchronously from inside another handler; those
//! nested calls are skipped instead of panicking on a double borrow.

use crate::collab::{JsConfirm, JsMessages};
use crate::dom::{DomHost, Location, MenuView};
use crate::idb;
use crate::worker::{Delivery, WorkerChannel};
use js_sys::Date;
use sb_core::config::BoardConfig;
use sb_core::emitter::card_markup;
use sb_core::id::CardId;
use sb_core::model::{ActionKind, CanvasMutation, Point, Size};
use sb_core::snapshot::RestoreOutcome;
use sb_editor::capture::{Throttle, ThrottleDecision};
use sb_editor::collab::ConfirmDialog;
use sb_editor::host::{ListenerKind, ListenerOwner};
use sb_editor::input::{InputEvent, Target};
use sb_editor::menu::{ConfirmRequest, MenuEffect};
use sb_editor::metrics::MountCounter;
use sb_editor::session::BoardSession;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Event, HtmlElement, MouseEvent};

pub(crate) struct App {
    session: BoardSession,
    dom: DomHost,
    confirm: Rc<dyn ConfirmDialog>,
    mounts: Rc<MountCounter>,
    reset_guard: Throttle,
    delivery: Delivery,
    menu_size: Size,
    this: Weak<RefCell<App>>,
    timer: Option<i32>,
    on_timer: Option<Closure<dyn FnMut()>>,
    destroyed: bool,
}

impl App {
    /// Build the app and install its canvas and menu listeners.
    pub(crate) fn create(
        document: Document,
        canvas: HtmlElement,
        config: BoardConfig,
        confirm: JsConfirm,
        messages: JsMessages,
    ) -> Result<Rc<RefCell<App>>, JsValue> {
        let menu = MenuView::create(&document)?;
        let mounts = Rc::new(MountCounter::new());
        let canvas_size = Size::new(canvas.client_width() as f32, canvas.client_height() as f32);
        let reset_guard = Throttle::new(config.reset_guard_ms, true);
        let menu_size = config.menu_size;
        let (channel, delivery) = WorkerChannel::connect(&config);
        let session = BoardSession::new(
            config.clone(),
            canvas_size,
            Box::new(channel),
            Box::new(Rc::clone(&mounts)),
            Box::new(messages),
        );

        let app = Rc::new_cyclic(|this: &Weak<RefCell<App>>| {
            RefCell::new(App {
                session,
                dom: DomHost::new(document, canvas, menu, this.clone()),
                confirm: Rc::new(confirm),
                mounts,
                reset_guard,
                delivery,
                menu_size,
                this: this.clone(),
                timer: None,
                on_timer: None,
                destroyed: false,
            })
        });
        app.borrow_mut().install();
        Ok(app)
    }

    /// Run `f` on the app unless it is gone, destroyed or already busy.
    fn with(app: &Weak<RefCell<App>>, f: impl FnOnce(&mut App)) {
        let Some(app) = app.upgrade() else {
            return;
        };
        let Ok(mut app) = app.try_borrow_mut() else {
            log::debug!("board busy, skipping nested event");
            return;
        };
        if app.destroyed {
            return;
        }
        app.dom.sweep();
        f(&mut app);
    }

    fn install(&mut self) {
        let canvas = self.dom.canvas().clone();
        let menu = self.dom.menu_element().clone();

        let this = self.this.clone();
        self.dom.bind(
            canvas.clone().into(),
            "mousedown",
            Closure::new(move |event: Event| App::with(&this, |app| app.on_press(&event))),
        );
        let this = self.this.clone();
        self.dom.bind(
            canvas.into(),
            "dblclick",
            Closure::new(move |event: Event| App::with(&this, |app| app.on_double_click(&event))),
        );
        let this = self.this.clone();
        self.dom.bind(
            menu.into(),
            "click",
            Closure::new(move |event: Event| App::with(&this, |app| app.on_menu_click(&event))),
        );

        let this = self.this.clone();
        self.on_timer = Some(Closure::new(move || App::with(&this, App::on_timer)));

        self.session.mount(&mut self.dom);
    }

    // ─── Startup ─────────────────────────────────────────────────────────

    /// Adopt the canvas' current markup as the default, read the stored
    /// layout, restore, then start capturing changes.
    pub(crate) async fn start(app: Rc<RefCell<App>>) -> Result<usize, JsValue> {
        let (store, default_markup) = {
            let app = app.try_borrow().map_err(|_| JsValue::from_str("board is busy"))?;
            (app.session.config().store.clone(), app.dom.canvas().inner_html())
        };
        let read = idb::read_latest(&store).await;
        let outcome = RestoreOutcome::from_read(read, &store.record_key);

        let mut app = app
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("board is busy"))?;
        if app.destroyed {
            return Err(JsValue::from_str("board was destroyed"));
        }
        app.sync_canvas_size();
        let App { session, dom, .. } = &mut *app;
        let batch = session.complete_restore(outcome, &default_markup, dom);
        app.render(&batch);
        // Measuring the restored cards may pull some back inside the canvas.
        // That is layout, not an edit, so it is rendered without being saved.
        let settled = app.session.board_mut().take_mutations();
        app.render(&settled);
        app.schedule_tick();
        Ok(app.session.board().len())
    }

    // ─── Event entry points ──────────────────────────────────────────────

    /// A document-level listener registered through `Host::add_listener`.
    pub(crate) fn on_document_event(app: &Weak<RefCell<App>>, owner: ListenerOwner, kind: ListenerKind, event: Event) {
        App::with(app, |app| app.document_event(owner, kind, &event));
    }

    fn document_event(&mut self, owner: ListenerOwner, kind: ListenerKind, event: &Event) {
        self.sync_canvas_size();
        let target = self.target(event);
        let input = match kind {
            ListenerKind::MouseMove => self.dom.pointer(event).map(|at| InputEvent::PointerMove { at }),
            ListenerKind::MouseUp => self.dom.pointer(event).map(|at| InputEvent::PointerUp { at }),
            ListenerKind::Click => Some(InputEvent::Click { target }),
            ListenerKind::FocusOut => Some(InputEvent::FocusOut { target }),
            ListenerKind::ContextMenu => {
                // Only right-clicks on the canvas open the board's menu.
                if matches!(target, Target::Outside | Target::Menu) {
                    return;
                }
                event.prevent_default();
                if let Some(at) = self.dom.pointer(event) {
                    self.open_menu(at, target);
                }
                self.after_input();
                return;
            }
        };
        if let Some(input) = input {
            self.session.deliver(owner, input, &mut self.dom);
        }
        self.after_input();
    }

    fn on_press(&mut self, event: &Event) {
        if event.dyn_ref::<MouseEvent>().is_none_or(|m| m.button() != 0) {
            return;
        }
        self.sync_canvas_size();
        let target = self.target(event);
        let Some(at) = self.dom.pointer(event) else {
            return;
        };
        if matches!(target, Target::Title(_)) {
            // Keeps the browser from selecting text while dragging.
            event.prevent_default();
        }
        if let Target::Title(id) | Target::Content(id) | Target::Card(id) = target {
            self.measure(id);
        }
        self.session.handle(InputEvent::PointerDown { at, target }, &mut self.dom);
        self.after_input();
    }

    fn on_double_click(&mut self, event: &Event) {
        let target = self.target(event);
        self.session.handle(InputEvent::DoubleClick { target }, &mut self.dom);
        self.after_input();
    }

    fn on_menu_click(&mut self, event: &Event) {
        let Some(action) = self.dom.menu_action(event) else {
            return;
        };
        self.dispatch_action(action);
    }

    fn on_timer(&mut self) {
        self.timer = None;
        let now = Date::now();
        if self.session.tick(now) {
            log::debug!("trailing snapshot posted");
        }
        if self.reset_guard.poll(now) {
            self.ask(ConfirmRequest::ResetLayout);
        }
        self.schedule_tick();
    }

    fn target(&self, event: &Event) -> Target {
        match self.dom.locate(event) {
            Location::Menu => Target::Menu,
            Location::Outside => Target::Outside,
            Location::Canvas(tag, region) => self.session.board().classify(tag.as_deref(), region),
        }
    }

    fn sync_canvas_size(&mut self) {
        let size = self.dom.canvas_size();
        if size.is_measured() {
            let App { session, dom, .. } = self;
            session.board_mut().set_canvas_size(size, dom);
        }
    }

    // ─── Menu ────────────────────────────────────────────────────────────

    /// Show the menu, measuring it once it is visible. A box whose real size
    /// differs from the assumed one is placed again with the measured size.
    fn open_menu(&mut self, at: Point, target: Target) {
        self.session.open_menu(at, target, &mut self.dom);
        let measured = self.dom.menu_element().offset_width() > 0;
        if !measured {
            return;
        }
        let size = self.dom.measure_menu();
        if size != self.menu_size {
            self.menu_size = size;
            self.session.menu_mut().set_size(size);
            self.session.open_menu(at, target, &mut self.dom);
        }
    }

    fn dispatch_action(&mut self, action: ActionKind) {
        match self.session.dispatch(action, &mut self.dom) {
            MenuEffect::Export(file) => {
                if let Err(err) = self.dom.download(&file) {
                    log::warn!("export failed: {err:?}");
                }
            }
            MenuEffect::Print => print_next_tick(),
            MenuEffect::Confirm(request) => self.ask(request),
            MenuEffect::Added(id) => log::debug!("added {id}"),
            MenuEffect::Deleted(id) => log::debug!("deleted {id}"),
            MenuEffect::Editing(_) | MenuEffect::None => {}
        }
        self.after_input();
    }

    /// Ask the confirmation dialog, then apply the answer once it settles.
    /// A confirmed reset reloads only after the tombstone is stored, or
    /// after `reset_flush_ms` at the latest.
    fn ask(&self, request: ConfirmRequest) {
        let answer = self.confirm.confirm(request.prompt());
        let this = self.this.clone();
        let delivery = self.delivery.clone();
        let flush_ms = self.session.config().reset_flush_ms;
        wasm_bindgen_futures::spawn_local(async move {
            let confirmed = answer.await;
            let mut reload = false;
            App::with(&this, |app| {
                reload = app.session.resolve_confirm(request, confirmed, &mut app.dom);
                app.after_input();
            });
            if !reload {
                return;
            }
            if !delivery.flushed(flush_ms).await {
                log::warn!("reset not confirmed by the store after {flush_ms}ms, reloading anyway");
            }
            reload_page();
        });
    }

    /// Throttled "restore default layout" request from the page.
    pub(crate) fn reset_layout(&mut self) {
        match self.reset_guard.call(Date::now()) {
            ThrottleDecision::Fire => self.ask(ConfirmRequest::ResetLayout),
            ThrottleDecision::Scheduled => self.schedule_tick(),
            ThrottleDecision::Dropped => log::debug!("reset already pending"),
        }
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    fn after_input(&mut self) {
        let now = Date::now();
        let batch = self.session.flush(now);
        self.render(&batch);
        // Measuring during render can move cards; those moves are not
        // measured again, so one more pass drains them.
        let moved = self.session.flush(now);
        self.render(&moved);
        self.schedule_tick();
    }

    /// Patch the DOM from the board's mutation records.
    fn render(&mut self, batch: &[CanvasMutation]) {
        for mutation in batch {
            match *mutation {
                CanvasMutation::Inserted { id } => {
                    let Some(card) = self.session.board().card(id) else {
                        continue;
                    };
                    self.dom.append_card(&card_markup(card));
                    self.measure(id);
                }
                CanvasMutation::Removed { id } => self.dom.remove_card(id),
                CanvasMutation::Raised { id } => self.dom.raise_card(id),
                CanvasMutation::Cleared => self.dom.replace_canvas(""),
                CanvasMutation::Replaced => {
                    self.dom.replace_canvas(&self.session.board().markup());
                    let ids = self.session.board().z_order().to_vec();
                    for id in ids {
                        self.measure(id);
                    }
                }
                CanvasMutation::Attribute { id, attr } => {
                    if let Some(component) = self.session.board().component(id) {
                        self.dom
                            .set_card_attribute(id, attr.as_str(), &component.attribute(attr));
                    }
                }
                CanvasMutation::Content { id } => {
                    // The live surface already shows what the user typed.
                    if self.session.board().editing() != Some(id)
                        && let Some(card) = self.session.board().card(id)
                    {
                        self.dom.set_card_content(id, &card.content);
                    }
                    self.measure(id);
                }
            }
        }
    }

    /// Record the card's rendered size; a card that grew past an edge is
    /// pulled back in.
    fn measure(&mut self, id: CardId) {
        if let Some(size) = self.dom.measure_card(id).filter(Size::is_measured) {
            let App { session, dom, .. } = self;
            session.board_mut().set_card_size(id, size, dom);
        }
    }

    // ─── Timer ───────────────────────────────────────────────────────────

    /// One timer for both the trailing write and the reset guard, armed for
    /// whichever is due first.
    fn schedule_tick(&mut self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if let Some(handle) = self.timer.take() {
            window.clear_timeout_with_handle(handle);
        }
        let due = match (self.session.next_deadline(), self.reset_guard.deadline()) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return,
        };
        let Some(callback) = &self.on_timer else {
            return;
        };
        let delay = (due - Date::now()).max(0.0).ceil() as i32;
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), delay) {
            Ok(handle) => self.timer = Some(handle),
            Err(err) => log::warn!("could not arm timer: {err:?}"),
        }
    }

    // ─── Queries / teardown ──────────────────────────────────────────────

    pub(crate) fn card_count(&self) -> usize {
        self.session.board().len()
    }

    pub(crate) fn live_components(&self) -> usize {
        self.mounts.live()
    }

    pub(crate) fn markup(&self) -> String {
        self.session.board().markup()
    }

    /// Unmount every component and remove every listener. Idempotent.
    pub(crate) fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.session.unmount(&mut self.dom);
        let _ = self.session.board_mut().take_mutations();
        if let (Some(window), Some(handle)) = (web_sys::window(), self.timer.take()) {
            window.clear_timeout_with_handle(handle);
        }
        self.dom.unbind_all();
        log::debug!("board destroyed");
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Print once the menu has been hidden and repainted.
fn print_next_tick() {
    let Some(window) = web_sys::window() else {
        return;
    };
    let print = Closure::once_into_js(|| {
        if let Some(window) = web_sys::window()
            && let Err(err) = window.print()
        {
            log::warn!("print failed: {err:?}");
        }
    });
    if let Err(err) = window.set_timeout_with_callback_and_timeout_and_arguments_0(print.unchecked_ref(), 0) {
        log::warn!("could not schedule print: {err:?}");
    }
}

fn reload_page() {
    if let Some(window) = web_sys::window()
        && let Err(err) = window.location().reload()
    {
        log::warn!("reload failed: {err:?}");
    }
}
