//! Context menu component.
//!
//! Opened by a right-click inside the canvas, anchored at the pointer and
//! kept a margin away from every canvas edge. The visible action set
//! depends only on whether a card was targeted.

use crate::board::Board;
use crate::host::{Component, Host, ListenerId, ListenerKind, ListenerOwner};
use crate::input::Target;
use sb_core::clamp::clamp_with_margin;
use sb_core::config::BoardConfig;
use sb_core::id::CardId;
use sb_core::model::{ActionKind, Point, Size};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq)]
pub struct MenuState {
    pub visible: bool,
    /// Clamped top-left of the menu box.
    pub anchor: Point,
    pub target: Option<CardId>,
    pub actions: SmallVec<[ActionKind; 3]>,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            visible: false,
            anchor: Point::ORIGIN,
            target: None,
            actions: SmallVec::new(),
        }
    }
}

/// A plain-text download the host should offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub text: String,
}

/// Questions that need the confirmation dialog before anything happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmRequest {
    RemoveAll,
    ResetLayout,
}

impl ConfirmRequest {
    pub fn prompt(self) -> &'static str {
        match self {
            ConfirmRequest::RemoveAll => "Remove every card from the board?",
            ConfirmRequest::ResetLayout => "Restore the default layout?",
        }
    }
}

/// What a dispatched action left for the host to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEffect {
    /// Nothing (no-op action, or handled entirely by the board).
    None,
    Added(CardId),
    Deleted(CardId),
    Editing(CardId),
    Export(ExportFile),
    /// Print the page on the next tick, after the menu is gone.
    Print,
    Confirm(ConfirmRequest),
}

pub struct ContextMenu {
    state: MenuState,
    size: Size,
    margin: f32,
    default_content: String,
    export_file_name: String,
    listeners: SmallVec<[ListenerId; 2]>,
}

impl ContextMenu {
    pub fn new(config: &BoardConfig) -> Self {
        Self {
            state: MenuState::default(),
            size: config.menu_size,
            margin: config.menu_margin,
            default_content: config.default_content.clone(),
            export_file_name: config.export_file_name.clone(),
            listeners: SmallVec::new(),
        }
    }

    pub fn state(&self) -> &MenuState {
        &self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible
    }

    /// Use the measured menu box for placement.
    pub fn set_size(&mut self, size: Size) {
        if size.is_measured() {
            self.size = size;
        }
    }

    /// Show the menu for a right-click at `pointer` on `target`.
    pub fn open(&mut self, pointer: Point, target: Target, board: &Board, host: &mut dyn Host) -> &MenuState {
        let card = target.card().filter(|id| board.contains(*id));
        self.state = MenuState {
            visible: true,
            anchor: clamp_with_margin(pointer, self.size, board.canvas(), self.margin),
            target: card,
            actions: match card {
                Some(_) => SmallVec::from_slice(&ActionKind::CARD_ACTIONS),
                None => SmallVec::from_slice(&ActionKind::CANVAS_ACTIONS),
            },
        };
        host.show_menu(self.state.anchor, &self.state.actions);
        &self.state
    }

    /// Hide the menu. Safe to call when already hidden.
    pub fn hide(&mut self, host: &mut dyn Host) {
        if self.state.visible {
            self.state.visible = false;
            host.hide_menu();
        }
    }

    /// Run exactly one action, then close. Actions outside the visible set
    /// or aimed at a card that no longer exists do nothing.
    pub fn dispatch(&mut self, action: ActionKind, board: &mut Board, host: &mut dyn Host) -> MenuEffect {
        if !self.state.visible {
            return MenuEffect::None;
        }
        self.hide(host);
        if !self.state.actions.contains(&action) {
            log::debug!("{} not offered, ignoring", action.as_str());
            return MenuEffect::None;
        }

        let target = self.state.target.filter(|id| board.contains(*id));
        match (action, target) {
            (ActionKind::Add, _) => {
                let at = clamp_with_margin(self.state.anchor, board.card_size(), board.canvas(), self.margin);
                MenuEffect::Added(board.add_card(at, &self.default_content, host))
            }
            (ActionKind::Edit, Some(id)) if board.begin_edit(id, host) => {
                host.select_content(id);
                MenuEffect::Editing(id)
            }
            (ActionKind::Delete, Some(id)) if board.remove(id, host) => MenuEffect::Deleted(id),
            (ActionKind::Export, Some(id)) => match board.text_content(id) {
                Some(text) => MenuEffect::Export(ExportFile {
                    file_name: self.export_file_name.clone(),
                    text: text.trim().to_string(),
                }),
                None => MenuEffect::None,
            },
            (ActionKind::Print, _) => MenuEffect::Print,
            (ActionKind::RemoveAll, _) => MenuEffect::Confirm(ConfirmRequest::RemoveAll),
            _ => MenuEffect::None,
        }
    }
}

impl Component for ContextMenu {
    fn mount(&mut self, host: &mut dyn Host) {
        if !self.listeners.is_empty() {
            return;
        }
        self.listeners
            .push(host.add_listener(ListenerOwner::Menu, ListenerKind::Click));
        self.listeners
            .push(host.add_listener(ListenerOwner::Menu, ListenerKind::ContextMenu));
    }

    fn unmount(&mut self, host: &mut dyn Host) {
        self.hide(host);
        for id in self.listeners.drain(..) {
            host.remove_listener(id);
        }
    }

    fn on_attribute_change(&mut self, _name: &str, _value: &str, _host: &mut dyn Host) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::metrics::NoopCollector;
    use pretty_assertions::assert_eq;
    use sb_core::model::Card;

    fn setup() -> (ContextMenu, Board, RecordingHost) {
        let config = BoardConfig::default();
        let board = Board::new(Size::new(800.0, 600.0), config.card_size, Box::new(NoopCollector));
        (ContextMenu::new(&config), board, RecordingHost::new())
    }

    fn with_card(board: &mut Board, host: &mut RecordingHost, id: &str, content: &str) -> CardId {
        let id = CardId::intern(id);
        board.insert(Card::new(id, content), host);
        id
    }

    #[test]
    fn card_target_gets_card_actions() {
        let (mut menu, mut board, mut host) = setup();
        let id = with_card(&mut board, &mut host, "menu_card", "x");
        let state = menu.open(Point::new(50.0, 50.0), Target::Card(id), &board, &mut host);
        assert_eq!(state.actions.as_slice(), &ActionKind::CARD_ACTIONS);
        assert_eq!(state.target, Some(id));
        let (_, shown) = host.menu.clone().unwrap();
        assert!(!shown.contains(&ActionKind::Add));
    }

    #[test]
    fn stale_card_target_is_the_canvas() {
        let (mut menu, board, mut host) = setup();
        let ghost = CardId::intern("menu_ghost");
        let state = menu.open(Point::new(50.0, 50.0), Target::Title(ghost), &board, &mut host);
        assert_eq!(state.actions.as_slice(), &ActionKind::CANVAS_ACTIONS);
        assert_eq!(state.target, None);
    }

    #[test]
    fn placement_keeps_margin() {
        let (mut menu, board, mut host) = setup();
        let at = menu.open(Point::new(799.0, 599.0), Target::Canvas, &board, &mut host).anchor;
        assert_eq!(at, Point::new(556.0, 436.0));
        menu.set_size(Size::new(100.0, 100.0));
        let at = menu.open(Point::new(2.0, 599.0), Target::Canvas, &board, &mut host).anchor;
        assert_eq!(at, Point::new(4.0, 496.0));
    }

    #[test]
    fn add_uses_the_anchor() {
        let (mut menu, mut board, mut host) = setup();
        menu.open(Point::new(120.0, 80.0), Target::Canvas, &board, &mut host);
        let MenuEffect::Added(id) = menu.dispatch(ActionKind::Add, &mut board, &mut host) else {
            panic!("expected Added");
        };
        assert_eq!(board.card(id).unwrap().position(), Point::new(120.0, 80.0));
        assert!(!menu.is_visible());
        assert!(host.menu.is_none());
    }

    #[test]
    fn action_outside_the_set_is_a_noop_that_closes() {
        let (mut menu, mut board, mut host) = setup();
        menu.open(Point::new(10.0, 10.0), Target::Canvas, &board, &mut host);
        assert_eq!(
            menu.dispatch(ActionKind::Delete, &mut board, &mut host),
            MenuEffect::None
        );
        assert!(!menu.is_visible());
        assert!(board.is_empty());
    }

    #[test]
    fn delete_of_vanished_target_is_a_noop() {
        let (mut menu, mut board, mut host) = setup();
        let id = with_card(&mut board, &mut host, "menu_gone", "x");
        menu.open(Point::ORIGIN, Target::Card(id), &board, &mut host);
        board.remove(id, &mut host);
        assert_eq!(
            menu.dispatch(ActionKind::Delete, &mut board, &mut host),
            MenuEffect::None
        );
    }

    #[test]
    fn export_trims_plain_text() {
        let (mut menu, mut board, mut host) = setup();
        let id = with_card(&mut board, &mut host, "menu_export", "  <b>Hi</b> &amp; bye<br>  ");
        menu.open(Point::ORIGIN, Target::Content(id), &board, &mut host);
        assert_eq!(
            menu.dispatch(ActionKind::Export, &mut board, &mut host),
            MenuEffect::Export(ExportFile {
                file_name: "context.txt".into(),
                text: "Hi & bye".into(),
            })
        );
    }

    #[test]
    fn edit_selects_the_whole_content() {
        let (mut menu, mut board, mut host) = setup();
        let id = with_card(&mut board, &mut host, "menu_edit", "draft");
        menu.open(Point::ORIGIN, Target::Card(id), &board, &mut host);
        assert_eq!(
            menu.dispatch(ActionKind::Edit, &mut board, &mut host),
            MenuEffect::Editing(id)
        );
        assert!(host.editable.contains(&id));
        assert_eq!(host.selected, Some(id));

        board.commit_edit(&mut host);
        assert_eq!(host.selected, None);
    }

    #[test]
    fn remove_all_asks_first() {
        let (mut menu, mut board, mut host) = setup();
        with_card(&mut board, &mut host, "menu_keep", "x");
        menu.open(Point::ORIGIN, Target::Canvas, &board, &mut host);
        assert_eq!(
            menu.dispatch(ActionKind::RemoveAll, &mut board, &mut host),
            MenuEffect::Confirm(ConfirmRequest::RemoveAll)
        );
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn hide_is_idempotent_and_listeners_are_released() {
        let (mut menu, _board, mut host) = setup();
        menu.mount(&mut host);
        assert_eq!(host.active_listeners(), 2);
        menu.hide(&mut host);
        menu.hide(&mut host);
        menu.unmount(&mut host);
        assert_eq!(host.active_listeners(), 0);
    }
}
