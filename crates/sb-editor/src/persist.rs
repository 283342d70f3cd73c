//! Persistence: channel, durable store, worker, pipeline.
//!
//! The UI side only ever posts `Snapshot`s, fire-and-forget. On the other
//! side of the channel a `PersistenceWorker` upserts each message under the
//! fixed record key. The pipeline decides when the UI side may post at all.

use crate::capture::ChangeCapture;
use sb_core::config::BoardConfig;
use sb_core::error::StoreError;
use sb_core::model::CanvasMutation;
use sb_core::snapshot::{Snapshot, StoreRecord};
use std::cell::RefCell;
use std::rc::Rc;

/// Message boundary to the persistence context.
pub trait PersistenceChannel {
    /// Queue a snapshot. Never blocks, never reports failure to the caller.
    fn post(&mut self, snapshot: &Snapshot);
}

impl<T: PersistenceChannel + ?Sized> PersistenceChannel for Box<T> {
    fn post(&mut self, snapshot: &Snapshot) {
        (**self).post(snapshot);
    }
}

/// Key-value store holding the single layout record.
pub trait DurableStore {
    /// Insert or overwrite `record` under `record.id`.
    fn put(&mut self, record: StoreRecord) -> Result<(), StoreError>;
}

impl<S: DurableStore> DurableStore for Rc<RefCell<S>> {
    fn put(&mut self, record: StoreRecord) -> Result<(), StoreError> {
        self.borrow_mut().put(record)
    }
}

// ─── Memory store ────────────────────────────────────────────────────────

/// In-memory store. Used natively and as the fallback when the browser
/// worker cannot be started.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Option<StoreRecord>,
    writes: usize,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every request fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&StoreRecord> {
        self.record.as_ref().filter(|r| r.id == key)
    }

    /// The raw read the restore path consumes.
    pub fn read_latest(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store disabled".into()));
        }
        self.get(key).map(StoreRecord::to_json).transpose()
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DurableStore for MemoryStore {
    fn put(&mut self, record: StoreRecord) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Request("write rejected".into()));
        }
        self.record = Some(record);
        self.writes += 1;
        Ok(())
    }
}

// ─── Worker ──────────────────────────────────────────────────────────────

/// The persistence context's message handler.
pub struct PersistenceWorker<S> {
    store: S,
    key: String,
}

impl<S: DurableStore> PersistenceWorker<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upsert one message. Failures are logged and swallowed.
    pub fn handle(&mut self, snapshot: Snapshot) {
        let record = StoreRecord::new(self.key.clone(), snapshot);
        if let Err(err) = self.store.put(record) {
            log::warn!("persist write failed: {err}");
        }
    }

    /// Handle a message as it arrives over the wire.
    pub fn handle_encoded(&mut self, raw: &str) {
        match Snapshot::decode(raw) {
            Ok(snapshot) => self.handle(snapshot),
            Err(err) => log::warn!("dropping malformed persist message: {err}"),
        }
    }
}

/// Channel whose far side runs on the same thread.
///
/// Messages still go through encode/decode, the same copy a structured
/// clone would make.
pub struct InProcessChannel<S> {
    worker: PersistenceWorker<S>,
}

impl<S: DurableStore> InProcessChannel<S> {
    pub fn new(worker: PersistenceWorker<S>) -> Self {
        Self { worker }
    }

    pub fn worker(&self) -> &PersistenceWorker<S> {
        &self.worker
    }
}

impl<S: DurableStore> PersistenceChannel for InProcessChannel<S> {
    fn post(&mut self, snapshot: &Snapshot) {
        match snapshot.encode() {
            Ok(raw) => self.worker.handle_encoded(&raw),
            Err(err) => log::warn!("persist encode failed: {err}"),
        }
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Startup read in flight; nothing is observed.
    Restoring,
    /// Capture attached; changes are persisted.
    Observing,
    /// The reset tombstone was posted; the page is about to reload.
    Resetting,
}

/// Change capture wired to a persistence channel.
pub struct PersistencePipeline {
    phase: Phase,
    capture: ChangeCapture,
    channel: Box<dyn PersistenceChannel>,
    posted: usize,
}

impl PersistencePipeline {
    pub fn new(channel: Box<dyn PersistenceChannel>, config: &BoardConfig) -> Self {
        Self {
            phase: Phase::Restoring,
            capture: ChangeCapture::new(config.debounce_ms, config.leading_write),
            channel,
            posted: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn capture(&self) -> &ChangeCapture {
        &self.capture
    }

    /// Snapshots posted so far.
    pub fn posted(&self) -> usize {
        self.posted
    }

    /// The startup read finished, successfully or not. Start observing.
    pub fn complete_restore(&mut self) {
        if self.phase != Phase::Restoring {
            return;
        }
        self.phase = Phase::Observing;
        self.capture.attach();
        log::debug!("change capture attached");
    }

    /// Feed a drained mutation batch; `markup` is read only if a snapshot
    /// is emitted.
    pub fn observe(&mut self, batch: &[CanvasMutation], now: f64, markup: impl FnOnce() -> String) {
        if self.phase == Phase::Observing && self.capture.observe(batch, now) {
            self.emit(&markup());
        }
    }

    /// Fire the trailing write if due. Returns whether a snapshot was posted.
    pub fn poll(&mut self, now: f64, markup: impl FnOnce() -> String) -> bool {
        if self.phase == Phase::Observing && self.capture.poll(now) {
            self.emit(&markup());
            return true;
        }
        false
    }

    pub fn deadline(&self) -> Option<f64> {
        self.capture.deadline()
    }

    /// Stop capturing and post the tombstone. Nothing is posted afterwards.
    pub fn reset(&mut self) {
        self.capture.detach();
        self.phase = Phase::Resetting;
        self.channel.post(&Snapshot::reset());
        self.posted += 1;
        log::info!("layout reset requested");
    }

    /// Stop capturing without posting (board torn down).
    pub fn detach(&mut self) {
        self.capture.detach();
    }

    fn emit(&mut self, markup: &str) {
        self.channel.post(&Snapshot::capture(markup));
        self.posted += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::id::CardId;

    const KEY: &str = "data-view-key";

    fn pipeline() -> (PersistencePipeline, Rc<RefCell<MemoryStore>>) {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let channel = InProcessChannel::new(PersistenceWorker::new(Rc::clone(&store), KEY));
        let pipeline = PersistencePipeline::new(Box::new(channel), &BoardConfig::default());
        (pipeline, store)
    }

    fn content() -> [CanvasMutation; 1] {
        [CanvasMutation::Content {
            id: CardId::intern("persist_a"),
        }]
    }

    #[test]
    fn worker_upserts_under_fixed_key() {
        let mut worker = PersistenceWorker::new(MemoryStore::new(), KEY);
        worker.handle(Snapshot::capture("<p>1</p>"));
        worker.handle(Snapshot::capture("<p>2</p>"));
        let record = worker.store().get(KEY).unwrap();
        assert_eq!(record.data.payload, "<p>2</p>");
        assert_eq!(worker.store().writes(), 2);
    }

    #[test]
    fn worker_survives_failures_and_garbage() {
        let mut worker = PersistenceWorker::new(MemoryStore::unavailable(), KEY);
        worker.handle(Snapshot::capture("<p>x</p>"));
        worker.handle_encoded("{not json");
        assert_eq!(worker.store().writes(), 0);
    }

    #[test]
    fn nothing_posts_while_restoring() {
        let (mut p, store) = pipeline();
        p.observe(&content(), 0.0, || "<p>x</p>".into());
        assert_eq!(p.posted(), 0);
        assert!(store.borrow().get(KEY).is_none());
    }

    #[test]
    fn leading_then_trailing_write() {
        let (mut p, store) = pipeline();
        p.complete_restore();
        p.observe(&content(), 0.0, || "<p>a</p>".into());
        assert_eq!(store.borrow().get(KEY).unwrap().data.payload, "<p>a</p>");
        p.observe(&content(), 10.0, || "<p>b</p>".into());
        p.observe(&content(), 20.0, || "<p>c</p>".into());
        assert_eq!(p.posted(), 1);
        assert!(p.poll(220.0, || "<p>c</p>".into()));
        assert_eq!(p.posted(), 2);
        assert_eq!(store.borrow().get(KEY).unwrap().data.payload, "<p>c</p>");
    }

    #[test]
    fn reset_cancels_trailing_and_blocks_further_writes() {
        let (mut p, store) = pipeline();
        p.complete_restore();
        p.observe(&content(), 0.0, || "<p>a</p>".into());
        p.observe(&content(), 5.0, || "<p>b</p>".into());
        p.reset();
        assert_eq!(p.phase(), Phase::Resetting);
        assert!(!p.poll(1000.0, || "<p>b</p>".into()));
        p.observe(&content(), 1001.0, || "<p>late</p>".into());
        assert!(store.borrow().get(KEY).unwrap().data.is_reset_signal);
        assert_eq!(store.borrow().writes(), 2);
    }

    #[test]
    fn memory_read_reports_unavailable() {
        assert!(MemoryStore::unavailable().read_latest(KEY).is_err());
        assert_eq!(MemoryStore::new().read_latest(KEY).unwrap(), None);
    }
}
