//! Dedicated persistence worker: the UI-side channel and the worker entry.
//!
//! Messages are JSON strings. The worker announces itself with `"ready"`
//! once its handler is installed and answers every snapshot with
//! `"stored"` once its transaction has settled. Until `"ready"` arrives the
//! channel holds snapshots back; if the worker fails to load instead, the
//! held snapshots are written from the main thread.

use crate::idb::IdbStore;
use js_sys::{Function, Object, Promise, Reflect};
use sb_core::config::{BoardConfig, StoreConfig};
use sb_core::snapshot::Snapshot;
use sb_editor::persist::{InProcessChannel, PersistenceChannel, PersistenceWorker};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{DedicatedWorkerGlobalScope, Event, MessageEvent, Worker, WorkerOptions};

const READY: &str = "ready";
const STORED: &str = "stored";

// ─── Outbox ──────────────────────────────────────────────────────────────

/// Where snapshots go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// Worker spawned, not yet ready.
    Starting,
    Worker,
    /// Written from the main thread.
    Local,
}

/// What to do with a posted snapshot.
#[derive(Debug, PartialEq, Eq)]
enum Dispatch {
    Held,
    Worker(Snapshot),
    Local(Snapshot),
}

/// Snapshots held back while the worker starts, plus write accounting.
///
/// Only the newest capture is worth writing, so a held capture replaces the
/// captures held before it. A held tombstone is never dropped.
#[derive(Debug)]
struct Outbox {
    route: Route,
    held: VecDeque<Snapshot>,
    sent: u64,
    settled: u64,
}

impl Outbox {
    fn new() -> Self {
        Self {
            route: Route::Starting,
            held: VecDeque::new(),
            sent: 0,
            settled: 0,
        }
    }

    fn push(&mut self, snapshot: Snapshot) -> Dispatch {
        match self.route {
            Route::Starting => {
                if !snapshot.is_reset_signal {
                    self.held.retain(|held| held.is_reset_signal);
                }
                self.held.push_back(snapshot);
                Dispatch::Held
            }
            Route::Worker => {
                self.sent += 1;
                Dispatch::Worker(snapshot)
            }
            Route::Local => {
                self.sent += 1;
                Dispatch::Local(snapshot)
            }
        }
    }

    /// Leave `Starting` for `route` and hand back the held snapshots, oldest
    /// first. Only the first call has any effect.
    fn open(&mut self, route: Route) -> Vec<Snapshot> {
        if self.route != Route::Starting || route == Route::Starting {
            return Vec::new();
        }
        self.route = route;
        let held: Vec<Snapshot> = self.held.drain(..).collect();
        self.sent += held.len() as u64;
        held
    }

    /// One sent snapshot reached the store, or failed to.
    fn settle(&mut self) {
        if self.settled < self.sent {
            self.settled += 1;
        }
    }

    fn is_settled(&self) -> bool {
        self.held.is_empty() && self.settled == self.sent
    }
}

// ─── Link ────────────────────────────────────────────────────────────────

/// State shared by the channel, its event handlers and `Delivery`.
struct Link {
    outbox: RefCell<Outbox>,
    local: RefCell<Option<InProcessChannel<IdbStore>>>,
    /// Promise `resolve` functions waiting for the outbox to settle.
    waiters: RefCell<Vec<Function>>,
    store: StoreConfig,
}

impl Link {
    fn new(store: &StoreConfig) -> Rc<Self> {
        Rc::new(Self {
            outbox: RefCell::new(Outbox::new()),
            local: RefCell::new(None),
            waiters: RefCell::new(Vec::new()),
            store: store.clone(),
        })
    }

    /// Switch to main-thread writes and flush what was held.
    fn go_local(self: &Rc<Self>) {
        if self.local.borrow().is_none() {
            let link: Weak<Link> = Rc::downgrade(self);
            let store = IdbStore::open(&self.store, move || {
                if let Some(link) = link.upgrade() {
                    link.settle();
                }
            });
            let worker = PersistenceWorker::new(store, self.store.record_key.clone());
            *self.local.borrow_mut() = Some(InProcessChannel::new(worker));
        }
        let held = self.outbox.borrow_mut().open(Route::Local);
        for snapshot in held {
            self.post_local(&snapshot);
        }
    }

    fn post_local(&self, snapshot: &Snapshot) {
        if let Some(channel) = self.local.borrow_mut().as_mut() {
            channel.post(snapshot);
        }
    }

    fn settle(&self) {
        let settled = {
            let mut outbox = self.outbox.borrow_mut();
            outbox.settle();
            outbox.is_settled()
        };
        if !settled {
            return;
        }
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for resolve in waiters {
            let _ = resolve.call0(&JsValue::NULL);
        }
    }
}

/// Waits for posted snapshots to reach the store.
#[derive(Clone)]
pub(crate) struct Delivery {
    link: Rc<Link>,
}

impl Delivery {
    /// Resolve once every posted snapshot has been written (or has failed),
    /// or after `timeout_ms`. Returns whether everything settled.
    pub(crate) async fn flushed(&self, timeout_ms: u32) -> bool {
        if self.link.outbox.borrow().is_settled() {
            return true;
        }
        let link = Rc::clone(&self.link);
        let promise = Promise::new(&mut |resolve, _reject| {
            if let Some(window) = web_sys::window()
                && let Err(err) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                    &resolve,
                    timeout_ms.min(i32::MAX as u32) as i32,
                )
            {
                log::warn!("could not arm flush timeout: {err:?}");
            }
            link.waiters.borrow_mut().push(resolve);
        });
        let _ = JsFuture::from(promise).await;
        self.link.outbox.borrow().is_settled()
    }
}

// ─── Channel ─────────────────────────────────────────────────────────────

/// UI-side end of the persistence channel.
pub(crate) struct WorkerChannel {
    link: Rc<Link>,
    worker: Option<Worker>,
    _on_message: Option<Closure<dyn FnMut(MessageEvent)>>,
    _on_error: Option<Closure<dyn FnMut(Event)>>,
}

impl WorkerChannel {
    /// Start the module worker at `config.worker_url`, or write from the
    /// main thread when it cannot be constructed.
    pub(crate) fn connect(config: &BoardConfig) -> (Self, Delivery) {
        let link = Link::new(&config.store);
        let delivery = Delivery {
            link: Rc::clone(&link),
        };
        let mut channel = Self {
            link,
            worker: None,
            _on_message: None,
            _on_error: None,
        };
        if let Err(err) = channel.spawn(config) {
            log::warn!("persist worker unavailable ({err:?}), saving on the main thread");
            channel.link.go_local();
        }
        (channel, delivery)
    }

    /// The options JSON is handed over as the worker name.
    fn spawn(&mut self, config: &BoardConfig) -> Result<(), JsValue> {
        let options = Object::new();
        Reflect::set(&options, &"type".into(), &"module".into())?;
        Reflect::set(&options, &"name".into(), &config.to_json().into())?;
        let worker =
            Worker::new_with_options(&config.worker_url, options.unchecked_ref::<WorkerOptions>())?;

        let on_message = {
            let link = Rc::clone(&self.link);
            let worker = worker.clone();
            Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
                match event.data().as_string().as_deref() {
                    Some(READY) => {
                        let held = link.outbox.borrow_mut().open(Route::Worker);
                        log::debug!("persist worker ready, flushing {}", held.len());
                        for snapshot in held {
                            send(&worker, &snapshot);
                        }
                    }
                    Some(STORED) => link.settle(),
                    _ => log::debug!("ignored persist worker message"),
                }
            })
        };
        worker.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        let on_error = {
            let link = Rc::clone(&self.link);
            let worker = worker.clone();
            Closure::<dyn FnMut(Event)>::new(move |event: Event| {
                if link.outbox.borrow().route != Route::Starting {
                    log::warn!("persist worker error: {:?}", event.type_());
                    return;
                }
                log::warn!("persist worker failed to load, saving on the main thread");
                event.prevent_default();
                worker.set_onmessage(None);
                worker.terminate();
                link.go_local();
            })
        };
        worker.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        self.worker = Some(worker);
        self._on_message = Some(on_message);
        self._on_error = Some(on_error);
        Ok(())
    }
}

fn send(worker: &Worker, snapshot: &Snapshot) {
    let raw = match snapshot.encode() {
        Ok(raw) => raw,
        Err(err) => {
            log::warn!("persist encode failed: {err}");
            return;
        }
    };
    if let Err(err) = worker.post_message(&JsValue::from_str(&raw)) {
        log::warn!("persist post failed: {err:?}");
    }
}

impl PersistenceChannel for WorkerChannel {
    fn post(&mut self, snapshot: &Snapshot) {
        let dispatch = self.link.outbox.borrow_mut().push(snapshot.clone());
        match dispatch {
            Dispatch::Held => {}
            Dispatch::Worker(snapshot) => {
                if let Some(worker) = &self.worker {
                    send(worker, &snapshot);
                }
            }
            Dispatch::Local(snapshot) => self.link.post_local(&snapshot),
        }
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.set_onmessage(None);
            worker.set_onerror(None);
        }
    }
}

// ─── Worker side ─────────────────────────────────────────────────────────

/// Worker entry point: upsert every message into IndexedDB and answer each
/// one with `"stored"` once it has settled.
#[wasm_bindgen]
pub fn run_persistence_worker(options: &str) {
    let config = BoardConfig::from_json(options).unwrap_or_default();
    crate::logger::init(config.debug);
    crate::install_panic_hook();

    let scope: DedicatedWorkerGlobalScope = js_sys::global().unchecked_into();
    let store = {
        let scope = scope.clone();
        IdbStore::open(&config.store, move || acknowledge(&scope))
    };
    let mut worker = PersistenceWorker::new(store, config.store.record_key.clone());

    let on_message = {
        let scope = scope.clone();
        Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let decoded = event.data().as_string().map(|raw| Snapshot::decode(&raw));
            match decoded {
                Some(Ok(snapshot)) => worker.handle(snapshot),
                Some(Err(err)) => {
                    log::warn!("dropping malformed persist message: {err}");
                    acknowledge(&scope);
                }
                None => {
                    log::warn!("persist worker ignored a non-string message");
                    acknowledge(&scope);
                }
            }
        })
    };
    scope.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    // Lives as long as the worker.
    on_message.forget();

    if let Err(err) = scope.post_message(&JsValue::from_str(READY)) {
        log::warn!("persist worker could not announce itself: {err:?}");
    }
    log::debug!("persist worker started");
}

fn acknowledge(scope: &DedicatedWorkerGlobalScope) {
    if let Err(err) = scope.post_message(&JsValue::from_str(STORED)) {
        log::warn!("persist worker could not acknowledge: {err:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn capture(markup: &str) -> Snapshot {
        Snapshot::capture(markup)
    }

    #[test]
    fn starting_outbox_keeps_the_newest_capture_and_the_tombstone() {
        let mut outbox = Outbox::new();
        assert_eq!(outbox.push(capture("<p>1</p>")), Dispatch::Held);
        assert_eq!(outbox.push(capture("<p>2</p>")), Dispatch::Held);
        assert_eq!(outbox.push(Snapshot::reset()), Dispatch::Held);
        assert_eq!(outbox.held.len(), 2);
        assert!(!outbox.is_settled());

        let held = outbox.open(Route::Local);
        assert_eq!(held, vec![capture("<p>2</p>"), Snapshot::reset()]);
        assert!(!outbox.is_settled());
        outbox.settle();
        outbox.settle();
        assert!(outbox.is_settled());
    }

    #[test]
    fn held_captures_collapse_to_one() {
        let mut outbox = Outbox::new();
        for n in 0..50 {
            outbox.push(capture(&format!("<p>{n}</p>")));
        }
        assert_eq!(outbox.held.len(), 1);
        assert_eq!(outbox.open(Route::Worker), vec![capture("<p>49</p>")]);
    }

    #[test]
    fn open_outbox_dispatches_on_its_route() {
        let mut outbox = Outbox::new();
        assert!(outbox.open(Route::Worker).is_empty());
        assert_eq!(outbox.push(Snapshot::reset()), Dispatch::Worker(Snapshot::reset()));
        assert!(!outbox.is_settled());
        outbox.settle();
        assert!(outbox.is_settled());
    }

    #[test]
    fn only_the_first_open_switches_route() {
        let mut outbox = Outbox::new();
        outbox.open(Route::Worker);
        outbox.open(Route::Local);
        assert_eq!(outbox.route, Route::Worker);
        assert!(outbox.open(Route::Starting).is_empty());
    }

    #[test]
    fn spare_acknowledgements_do_not_cover_later_writes() {
        let mut outbox = Outbox::new();
        outbox.open(Route::Local);
        outbox.settle();
        outbox.settle();
        assert_eq!(outbox.push(capture("<p>x</p>")), Dispatch::Local(capture("<p>x</p>")));
        assert!(!outbox.is_settled());
        outbox.settle();
        assert!(outbox.is_settled());
    }
}
