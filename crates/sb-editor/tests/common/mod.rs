//! Shared harness for sb-editor integration tests.

#![allow(dead_code)]

use sb_core::config::BoardConfig;
use sb_core::model::Size;
use sb_core::snapshot::RestoreOutcome;
use sb_editor::collab::{ConfirmDialog, MessageKind, MessageSurface};
use sb_editor::host::{ListenerKind, RecordingHost};
use sb_editor::input::InputEvent;
use sb_editor::metrics::MountCounter;
use sb_editor::persist::{InProcessChannel, MemoryStore, PersistenceWorker};
use sb_editor::session::BoardSession;
use std::cell::RefCell;
use std::future::{Future, ready};
use std::pin::Pin;
use std::rc::Rc;

pub const CANVAS: Size = Size::new(800.0, 600.0);

pub type Messages = Rc<RefCell<Vec<(String, MessageKind)>>>;

pub struct Harness {
    pub session: BoardSession,
    pub host: RecordingHost,
    pub store: Rc<RefCell<MemoryStore>>,
    pub mounts: Rc<MountCounter>,
    pub messages: Messages,
    pub now: f64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let config = BoardConfig::default();
        let store = Rc::new(RefCell::new(store));
        let mounts = Rc::new(MountCounter::new());
        let messages = Messages::default();
        let channel = InProcessChannel::new(PersistenceWorker::new(
            Rc::clone(&store),
            config.store.record_key.clone(),
        ));
        let mut session = BoardSession::new(
            config,
            CANVAS,
            Box::new(channel),
            Box::new(Rc::clone(&mounts)),
            Box::new(RecordedMessages(Rc::clone(&messages))),
        );
        let mut host = RecordingHost::new();
        session.mount(&mut host);
        Self {
            session,
            host,
            store,
            mounts,
            messages,
            now: 0.0,
        }
    }

    pub fn key(&self) -> String {
        self.session.config().store.record_key.clone()
    }

    /// Run the startup read against the store and restore.
    pub fn restore(&mut self, default_markup: &str) {
        let read = self.store.borrow().read_latest(&self.key());
        let outcome = RestoreOutcome::from_read(read, &self.key());
        self.session
            .complete_restore(outcome, default_markup, &mut self.host);
    }

    pub fn handle(&mut self, event: InputEvent) {
        self.session.handle(event, &mut self.host);
        self.flush();
    }

    /// Deliver a document-level event to every listener of `kind`.
    pub fn fire(&mut self, kind: ListenerKind, event: InputEvent) {
        for owner in self.host.owners_of(kind) {
            self.session.deliver(owner, event, &mut self.host);
        }
        self.flush();
    }

    pub fn flush(&mut self) {
        self.session.flush(self.now);
    }

    /// Advance the clock, firing the trailing write if due.
    pub fn advance(&mut self, ms: f64) {
        self.now += ms;
        self.session.tick(self.now);
    }

    pub fn writes(&self) -> usize {
        self.store.borrow().writes()
    }

    pub fn stored_payload(&self) -> Option<String> {
        self.store
            .borrow()
            .get(&self.key())
            .map(|r| r.data.payload.clone())
    }
}

pub struct RecordedMessages(pub Messages);

impl MessageSurface for RecordedMessages {
    fn message(&self, text: &str, kind: MessageKind) {
        self.0.borrow_mut().push((text.to_string(), kind));
    }
}

/// Confirmation dialog that always gives the same answer.
pub struct FixedAnswer(pub bool);

impl ConfirmDialog for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> Pin<Box<dyn Future<Output = bool>>> {
        Box::pin(ready(self.0))
    }
}
