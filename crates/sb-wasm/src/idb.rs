//! IndexedDB access: the startup read (main thread) and the durable store
//! the persistence worker writes through.
//!
//! One database, one object store keyed by `id` without auto-increment, one
//! record. Request callbacks are bridged to futures by handing the promise's
//! own `resolve`/`reject` to the request.

use js_sys::{JSON, Object, Promise, Reflect};
use sb_core::config::StoreConfig;
use sb_core::error::StoreError;
use sb_core::snapshot::StoreRecord;
use sb_editor::persist::DurableStore;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Event, IdbDatabase, IdbFactory, IdbObjectStoreParameters, IdbOpenDbRequest, IdbRequest,
    IdbTransactionMode,
};

fn js_error(context: &str, err: JsValue) -> StoreError {
    StoreError::Request(format!("{context}: {err:?}"))
}

/// `indexedDB` of the current global, window or worker.
fn factory() -> Result<IdbFactory, StoreError> {
    let global = js_sys::global();
    let value = Reflect::get(&global, &JsValue::from_str("indexedDB"))
        .map_err(|e| StoreError::Unavailable(format!("{e:?}")))?;
    if value.is_undefined() || value.is_null() {
        return Err(StoreError::Unavailable("indexedDB is not supported".into()));
    }
    Ok(value.unchecked_into())
}

/// Resolve once `request` succeeds or fails.
async fn settle(request: &IdbRequest) -> Result<JsValue, StoreError> {
    let promise = Promise::new(&mut |resolve, reject| {
        request.set_onsuccess(Some(&resolve));
        request.set_onerror(Some(&reject));
    });
    let outcome = JsFuture::from(promise).await;
    request.set_onsuccess(None);
    request.set_onerror(None);
    match outcome {
        Ok(_) => request.result().map_err(|e| js_error("request result", e)),
        Err(_) => {
            let reason = request
                .error()
                .ok()
                .flatten()
                .map(|e| e.message())
                .unwrap_or_else(|| "unknown error".to_string());
            Err(StoreError::Request(reason))
        }
    }
}

/// Open the database, creating the object store on first use.
pub(crate) async fn open(config: &StoreConfig) -> Result<IdbDatabase, StoreError> {
    let request: IdbOpenDbRequest = factory()?
        .open_with_u32(&config.database_name, config.version)
        .map_err(|e| StoreError::Unavailable(format!("{e:?}")))?;

    let store_name = config.store_name.clone();
    let on_upgrade = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        if let Err(err) = create_store(&event, &store_name) {
            log::warn!("object store creation failed: {err}");
        }
    });
    request.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));
    let opened = settle(&request).await;
    request.set_onupgradeneeded(None);
    drop(on_upgrade);

    opened
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
        .dyn_into::<IdbDatabase>()
        .map_err(|e| js_error("open result", e))
}

fn create_store(event: &Event, store_name: &str) -> Result<(), StoreError> {
    let db: IdbDatabase = event
        .target()
        .and_then(|t| t.dyn_into::<IdbOpenDbRequest>().ok())
        .ok_or_else(|| StoreError::Request("upgrade without request".into()))?
        .result()
        .map_err(|e| js_error("upgrade result", e))?
        .unchecked_into();
    if db.object_store_names().contains(store_name) {
        return Ok(());
    }
    let params = Object::new();
    Reflect::set(&params, &"keyPath".into(), &"id".into()).map_err(|e| js_error("keyPath", e))?;
    Reflect::set(&params, &"autoIncrement".into(), &JsValue::FALSE)
        .map_err(|e| js_error("autoIncrement", e))?;
    db.create_object_store_with_optional_parameters(
        store_name,
        params.unchecked_ref::<IdbObjectStoreParameters>(),
    )
    .map_err(|e| js_error("createObjectStore", e))?;
    log::info!("created object store {store_name}");
    Ok(())
}

/// Read the layout record as a JSON string. `Ok(None)` when absent.
pub(crate) async fn read_latest(config: &StoreConfig) -> Result<Option<String>, StoreError> {
    let db = open(config).await?;
    let result = read_record(&db, config).await;
    db.close();
    result
}

async fn read_record(db: &IdbDatabase, config: &StoreConfig) -> Result<Option<String>, StoreError> {
    let store = db
        .transaction_with_str_and_mode(&config.store_name, IdbTransactionMode::Readonly)
        .and_then(|tx| tx.object_store(&config.store_name))
        .map_err(|e| js_error("readonly transaction", e))?;
    let request = store
        .get(&JsValue::from_str(&config.record_key))
        .map_err(|e| js_error("get", e))?;
    let value = settle(&request).await?;
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    let json = JSON::stringify(&value).map_err(|e| js_error("stringify", e))?;
    Ok(json.as_string())
}

// ─── Durable store ───────────────────────────────────────────────────────

enum Connection {
    Opening(VecDeque<StoreRecord>),
    Open(IdbDatabase),
    Failed(String),
}

struct Shared {
    connection: Connection,
    store_name: String,
    /// Called once per `put`, when its transaction completes or aborts, or
    /// right away when the write could not be issued.
    on_settled: Rc<dyn Fn()>,
    /// Reused for every write so nothing leaks per write.
    on_error: Closure<dyn FnMut(Event)>,
    on_done: Closure<dyn FnMut(Event)>,
}

/// IndexedDB-backed `DurableStore`. Writes issued while the database is
/// still opening are queued and applied in order once it opens.
#[derive(Clone)]
pub(crate) struct IdbStore {
    shared: Rc<RefCell<Shared>>,
}

impl IdbStore {
    pub(crate) fn open(config: &StoreConfig, on_settled: impl Fn() + 'static) -> Self {
        let on_settled: Rc<dyn Fn()> = Rc::new(on_settled);
        let on_error = Closure::<dyn FnMut(Event)>::new(|event: Event| {
            let reason = event
                .target()
                .and_then(|t| t.dyn_into::<IdbRequest>().ok())
                .and_then(|r| r.error().ok().flatten())
                .map(|e| e.message())
                .unwrap_or_default();
            log::warn!("persist write failed: {reason}");
        });
        let on_done = {
            let on_settled = Rc::clone(&on_settled);
            Closure::<dyn FnMut(Event)>::new(move |_: Event| on_settled())
        };
        let store = Self {
            shared: Rc::new(RefCell::new(Shared {
                connection: Connection::Opening(VecDeque::new()),
                store_name: config.store_name.clone(),
                on_settled,
                on_error,
                on_done,
            })),
        };

        let pending = store.clone();
        let config = config.clone();
        wasm_bindgen_futures::spawn_local(async move {
            match open(&config).await {
                Ok(db) => pending.opened(db),
                Err(err) => pending.failed(err),
            }
        });
        store
    }

    fn opened(&self, db: IdbDatabase) {
        let queued = {
            let mut shared = self.shared.borrow_mut();
            match std::mem::replace(&mut shared.connection, Connection::Open(db)) {
                Connection::Opening(queue) => queue,
                _ => VecDeque::new(),
            }
        };
        log::debug!("persist store open, {} queued write(s)", queued.len());
        for record in queued {
            if let Err(err) = self.write(record) {
                log::warn!("persist write failed: {err}");
                self.settled();
            }
        }
    }

    fn failed(&self, err: StoreError) {
        log::warn!("persist store unavailable: {err}");
        let dropped = {
            let mut shared = self.shared.borrow_mut();
            match std::mem::replace(&mut shared.connection, Connection::Failed(err.to_string())) {
                Connection::Opening(queue) => queue.len(),
                _ => 0,
            }
        };
        for _ in 0..dropped {
            self.settled();
        }
    }

    fn settled(&self) {
        let on_settled = Rc::clone(&self.shared.borrow().on_settled);
        on_settled();
    }

    fn write(&self, record: StoreRecord) -> Result<(), StoreError> {
        let shared = self.shared.borrow();
        let Connection::Open(db) = &shared.connection else {
            return Err(StoreError::Unavailable("database not open".into()));
        };
        let value = JSON::parse(&record.to_json()?).map_err(|e| js_error("parse", e))?;
        let tx = db
            .transaction_with_str_and_mode(&shared.store_name, IdbTransactionMode::Readwrite)
            .map_err(|e| js_error("readwrite transaction", e))?;
        let request = tx
            .object_store(&shared.store_name)
            .and_then(|store| store.put(&value))
            .map_err(|e| js_error("put", e))?;
        request.set_onerror(Some(shared.on_error.as_ref().unchecked_ref()));
        tx.set_oncomplete(Some(shared.on_done.as_ref().unchecked_ref()));
        tx.set_onabort(Some(shared.on_done.as_ref().unchecked_ref()));
        Ok(())
    }
}

impl DurableStore for IdbStore {
    fn put(&mut self, record: StoreRecord) -> Result<(), StoreError> {
        let refused = {
            let mut shared = self.shared.borrow_mut();
            match &mut shared.connection {
                Connection::Opening(queue) => {
                    queue.push_back(record);
                    return Ok(());
                }
                Connection::Failed(reason) => Some(StoreError::Unavailable(reason.clone())),
                Connection::Open(_) => None,
            }
        };
        let outcome = match refused {
            Some(err) => Err(err),
            None => self.write(record),
        };
        if outcome.is_err() {
            self.settled();
        }
        outcome
    }
}
