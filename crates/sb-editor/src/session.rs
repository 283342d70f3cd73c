//! Board session: one board, its context menu and its persistence pipeline.
//!
//! This is the surface a host drives. Input goes in through `handle` and
//! `deliver`; the host then calls `flush` to get the mutation records it
//! must render, and `tick` when the reported deadline passes.

use crate::board::Board;
use crate::collab::{MessageKind, MessageSurface};
use crate::host::{Component, Host, ListenerOwner};
use crate::input::{InputEvent, Target};
use crate::menu::{ConfirmRequest, ContextMenu, MenuEffect};
use crate::metrics::Collector;
use crate::persist::{PersistenceChannel, PersistencePipeline, Phase};
use sb_core::config::BoardConfig;
use sb_core::model::{ActionKind, CanvasMutation, Point, Size};
use sb_core::snapshot::RestoreOutcome;

pub struct BoardSession {
    board: Board,
    menu: ContextMenu,
    pipeline: PersistencePipeline,
    messages: Box<dyn MessageSurface>,
    config: BoardConfig,
    mounted: bool,
}

impl BoardSession {
    pub fn new(
        config: BoardConfig,
        canvas: Size,
        channel: Box<dyn PersistenceChannel>,
        collector: Box<dyn Collector>,
        messages: Box<dyn MessageSurface>,
    ) -> Self {
        Self {
            board: Board::new(canvas, config.card_size, collector),
            menu: ContextMenu::new(&config),
            pipeline: PersistencePipeline::new(channel, &config),
            messages,
            config,
            mounted: false,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn menu(&self) -> &ContextMenu {
        &self.menu
    }

    pub fn menu_mut(&mut self) -> &mut ContextMenu {
        &mut self.menu
    }

    pub fn pipeline(&self) -> &PersistencePipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.pipeline.phase()
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    pub fn mount(&mut self, host: &mut dyn Host) {
        if self.mounted {
            return;
        }
        self.menu.mount(host);
        self.mounted = true;
        log::debug!("board session mounted");
    }

    /// Tear down: every component is unmounted and capture stops.
    pub fn unmount(&mut self, host: &mut dyn Host) {
        self.menu.unmount(host);
        self.board.unmount_all(host);
        self.pipeline.detach();
        self.mounted = false;
        log::debug!("board session unmounted");
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Element-level event (press, double-click on a card).
    pub fn handle(&mut self, event: InputEvent, host: &mut dyn Host) {
        self.board.handle(event, host);
    }

    /// Document-level event delivered to the listener registered by `owner`.
    pub fn deliver(&mut self, owner: ListenerOwner, event: InputEvent, host: &mut dyn Host) {
        match owner {
            ListenerOwner::Card(id) => self.board.deliver(id, event, host),
            ListenerOwner::Menu => match event {
                InputEvent::Click { .. } => self.menu.hide(host),
                InputEvent::ContextMenu { at, target } => self.open_menu(at, target, host),
                _ => {}
            },
        }
    }

    pub fn open_menu(&mut self, at: Point, target: Target, host: &mut dyn Host) {
        self.menu.open(at, target, &self.board, host);
    }

    /// Run a menu action. Effects needing the page are returned.
    pub fn dispatch(&mut self, action: ActionKind, host: &mut dyn Host) -> MenuEffect {
        self.menu.dispatch(action, &mut self.board, host)
    }

    /// Apply the user's answer to a confirmation. Returns `true` when the
    /// host must reload the page.
    pub fn resolve_confirm(&mut self, request: ConfirmRequest, confirmed: bool, host: &mut dyn Host) -> bool {
        match (request, confirmed) {
            (ConfirmRequest::RemoveAll, true) => {
                let removed = self.board.len();
                self.board.clear(host);
                self.messages
                    .message(&format!("Removed {removed} card(s)"), MessageKind::Success);
                false
            }
            (ConfirmRequest::RemoveAll, false) => {
                self.messages.message("Nothing was removed", MessageKind::Info);
                false
            }
            (ConfirmRequest::ResetLayout, true) => {
                self.request_reset();
                true
            }
            (ConfirmRequest::ResetLayout, false) => false,
        }
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Drain the board's mutations, feed them to change capture, and return
    /// them for rendering.
    pub fn flush(&mut self, now: f64) -> Vec<CanvasMutation> {
        let batch = self.board.take_mutations();
        let board = &self.board;
        self.pipeline.observe(&batch, now, || board.markup());
        batch
    }

    /// Fire the trailing write if due.
    pub fn tick(&mut self, now: f64) -> bool {
        let board = &self.board;
        self.pipeline.poll(now, || board.markup())
    }

    /// When `tick` next needs to run.
    pub fn next_deadline(&self) -> Option<f64> {
        self.pipeline.deadline()
    }

    /// Finish startup: load the stored canvas (or the default markup), then
    /// attach change capture. The returned records are for rendering only;
    /// they are never observed.
    pub fn complete_restore(
        &mut self,
        outcome: RestoreOutcome,
        default_markup: &str,
        host: &mut dyn Host,
    ) -> Vec<CanvasMutation> {
        // Edits made before restore finished are superseded by it.
        let _ = self.board.take_mutations();

        match outcome {
            RestoreOutcome::Apply(payload) => match self.board.restore(&payload, host) {
                Ok(n) => log::info!("restored {n} card(s) from store"),
                Err(err) => {
                    log::warn!("stored canvas unreadable ({err}), using default");
                    self.restore_default(default_markup, host);
                }
            },
            RestoreOutcome::Default(reason) => {
                log::info!("using default canvas ({reason:?})");
                self.restore_default(default_markup, host);
            }
        }

        let rendered = self.board.take_mutations();
        self.pipeline.complete_restore();
        rendered
    }

    fn restore_default(&mut self, default_markup: &str, host: &mut dyn Host) {
        if let Err(err) = self.board.restore(default_markup, host) {
            log::warn!("default canvas unreadable: {err}");
            self.board.clear(host);
        }
    }

    /// Post the reset tombstone. The host reloads afterwards.
    pub fn request_reset(&mut self) {
        self.pipeline.reset();
    }
}
