//! Host adapter and component lifecycle.
//!
//! The engine never touches the DOM. Everything it needs from the page goes
//! through `Host`, and every widget exposes the same three lifecycle hooks
//! through `Component`. The wasm crate adapts custom-element style callbacks
//! onto these.

use sb_core::id::CardId;
use sb_core::model::{ActionKind, Point};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Handle of a document-level listener registered through the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u32);

/// The document-level events components subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    MouseMove,
    MouseUp,
    Click,
    FocusOut,
    ContextMenu,
}

impl ListenerKind {
    /// DOM event type name.
    pub fn event_name(self) -> &'static str {
        match self {
            ListenerKind::MouseMove => "mousemove",
            ListenerKind::MouseUp => "mouseup",
            ListenerKind::Click => "click",
            ListenerKind::FocusOut => "focusout",
            ListenerKind::ContextMenu => "contextmenu",
        }
    }
}

/// Which component a listener belongs to; events are routed back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerOwner {
    Card(CardId),
    Menu,
}

/// Page-side capabilities the engine drives.
pub trait Host {
    fn add_listener(&mut self, owner: ListenerOwner, kind: ListenerKind) -> ListenerId;

    fn remove_listener(&mut self, id: ListenerId);

    /// Move a card's element visually. Does not touch its attributes.
    fn place(&mut self, card: CardId, at: Point);

    /// Toggle the editable content surface; `true` also focuses it.
    fn set_editable(&mut self, card: CardId, editable: bool);

    /// Select everything on the card's editable surface.
    fn select_content(&mut self, card: CardId);

    /// Current markup of the card's editable surface.
    fn live_content(&self, card: CardId) -> Option<String>;

    fn show_menu(&mut self, at: Point, actions: &[ActionKind]);

    fn hide_menu(&mut self);
}

/// Lifecycle shared by every widget on the board.
pub trait Component {
    /// Attached to the page: render initial state, register listeners.
    fn mount(&mut self, host: &mut dyn Host);

    /// Detached: every listener registered in `mount` or later is removed.
    fn unmount(&mut self, host: &mut dyn Host);

    /// An observed attribute was set from outside the component.
    fn on_attribute_change(&mut self, name: &str, value: &str, host: &mut dyn Host);
}

// ─── Recording host ──────────────────────────────────────────────────────

/// In-memory `Host` that records what the engine asked for.
///
/// Used to drive the engine natively and to assert listener bookkeeping.
#[derive(Debug, Default)]
pub struct RecordingHost {
    next_listener: u32,
    listeners: BTreeMap<ListenerId, (ListenerOwner, ListenerKind)>,
    pub placed: HashMap<CardId, Point>,
    pub editable: HashSet<CardId>,
    pub live: HashMap<CardId, String>,
    pub selected: Option<CardId>,
    pub menu: Option<(Point, Vec<ActionKind>)>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// Kinds currently registered by `owner`.
    pub fn listeners_of(&self, owner: ListenerOwner) -> Vec<ListenerKind> {
        self.listeners
            .values()
            .filter(|(o, _)| *o == owner)
            .map(|(_, k)| *k)
            .collect()
    }

    /// Owners that would receive a document event of `kind`, in
    /// registration order.
    pub fn owners_of(&self, kind: ListenerKind) -> Vec<ListenerOwner> {
        self.listeners
            .values()
            .filter(|(_, k)| *k == kind)
            .map(|(o, _)| *o)
            .collect()
    }

    /// Simulate the user typing into a card's editable surface.
    pub fn type_into(&mut self, card: CardId, markup: &str) {
        self.live.insert(card, markup.to_string());
    }
}

impl Host for RecordingHost {
    fn add_listener(&mut self, owner: ListenerOwner, kind: ListenerKind) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, (owner, kind));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn place(&mut self, card: CardId, at: Point) {
        self.placed.insert(card, at);
    }

    fn set_editable(&mut self, card: CardId, editable: bool) {
        if editable {
            self.editable.insert(card);
        } else {
            self.editable.remove(&card);
            if self.selected == Some(card) {
                self.selected = None;
            }
        }
    }

    fn select_content(&mut self, card: CardId) {
        if self.editable.contains(&card) {
            self.selected = Some(card);
        }
    }

    fn live_content(&self, card: CardId) -> Option<String> {
        self.live.get(&card).cloned()
    }

    fn show_menu(&mut self, at: Point, actions: &[ActionKind]) {
        self.menu = Some((at, actions.to_vec()));
    }

    fn hide_menu(&mut self) {
        self.menu = None;
    }
}
