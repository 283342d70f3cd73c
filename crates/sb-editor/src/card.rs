//! Card component: one sticky note and its interaction state.
//!
//! The component owns the card model, its visual position (which runs ahead
//! of the `left`/`top` attributes while a drag is in progress), and the
//! document-level listeners it registered. Cross-card rules (one drag, one
//! editor, z-order) live in `Board`.

use crate::host::{Component, Host, ListenerId, ListenerKind, ListenerOwner};
use sb_core::id::CardId;
use sb_core::model::{Attr, Card, Point, Size, format_px, parse_px};
use smallvec::SmallVec;

/// Per-card state machine. Dragging and Editing are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardState {
    #[default]
    Idle,
    Dragging,
    Editing,
}

#[derive(Debug)]
pub struct CardComponent {
    card: Card,
    state: CardState,
    /// Where the element is drawn. Equals the attributes except mid-drag.
    visual: Point,
    listeners: SmallVec<[(ListenerKind, ListenerId); 4]>,
    mounted: bool,
}

impl CardComponent {
    pub fn new(card: Card) -> Self {
        let visual = card.position();
        Self {
            card,
            state: CardState::Idle,
            visual,
            listeners: SmallVec::new(),
            mounted: false,
        }
    }

    pub fn id(&self) -> CardId {
        self.card.id
    }

    pub fn card(&self) -> &Card {
        &self.card
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn visual(&self) -> Point {
        self.visual
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Measured size, or `fallback` while the element has not been laid out.
    pub fn size_or(&self, fallback: Size) -> Size {
        let size = self.card.size();
        if size.is_measured() { size } else { fallback }
    }

    pub(crate) fn set_size(&mut self, size: Size) {
        self.card.width = size.width;
        self.card.height = size.height;
    }

    fn listen(&mut self, host: &mut dyn Host, kind: ListenerKind) {
        let id = host.add_listener(ListenerOwner::Card(self.card.id), kind);
        self.listeners.push((kind, id));
    }

    fn unlisten(&mut self, host: &mut dyn Host, kinds: &[ListenerKind]) {
        self.listeners.retain(|(kind, id)| {
            if kinds.contains(kind) {
                host.remove_listener(*id);
                false
            } else {
                true
            }
        });
    }

    // ─── Drag ────────────────────────────────────────────────────────────

    pub(crate) fn begin_drag(&mut self, host: &mut dyn Host) {
        self.state = CardState::Dragging;
        self.listen(host, ListenerKind::MouseMove);
        self.listen(host, ListenerKind::MouseUp);
    }

    pub(crate) fn move_visual(&mut self, at: Point, host: &mut dyn Host) {
        self.visual = at;
        host.place(self.card.id, at);
    }

    /// Write the visual position back into the attributes and drop the drag
    /// listeners. Returns the attributes that changed.
    pub(crate) fn finish_drag(&mut self, host: &mut dyn Host) -> SmallVec<[Attr; 2]> {
        self.unlisten(host, &[ListenerKind::MouseMove, ListenerKind::MouseUp]);
        self.state = CardState::Idle;

        let mut changed = SmallVec::new();
        if self.card.left != self.visual.x {
            self.card.left = self.visual.x;
            changed.push(Attr::Left);
        }
        if self.card.top != self.visual.y {
            self.card.top = self.visual.y;
            changed.push(Attr::Top);
        }
        changed
    }

    // ─── Edit ────────────────────────────────────────────────────────────

    pub(crate) fn begin_edit(&mut self, host: &mut dyn Host) {
        self.state = CardState::Editing;
        host.set_editable(self.card.id, true);
    }

    /// Copy the live editable surface into `content`. Returns whether it
    /// changed.
    pub(crate) fn sync_content(&mut self, host: &dyn Host) -> bool {
        match host.live_content(self.card.id) {
            Some(live) if live != self.card.content => {
                self.card.content = live;
                true
            }
            _ => false,
        }
    }

    /// Commit and leave edit mode.
    pub(crate) fn end_edit(&mut self, host: &mut dyn Host) -> bool {
        let changed = self.sync_content(host);
        host.set_editable(self.card.id, false);
        self.state = CardState::Idle;
        changed
    }

    /// Set one observed attribute. Returns whether the value changed.
    pub(crate) fn apply_attribute(&mut self, attr: Attr, value: f32, host: &mut dyn Host) -> bool {
        let slot = match attr {
            Attr::Left => &mut self.card.left,
            Attr::Top => &mut self.card.top,
        };
        let changed = *slot != value;
        *slot = value;
        if self.state != CardState::Dragging {
            self.visual = self.card.position();
            if self.mounted {
                host.place(self.card.id, self.visual);
            }
        }
        changed
    }

    /// Current value of an observed attribute, as it appears in markup.
    pub fn attribute(&self, attr: Attr) -> String {
        let n = match attr {
            Attr::Left => self.card.left,
            Attr::Top => self.card.top,
        };
        format!("{}px", format_px(n))
    }
}

impl Component for CardComponent {
    fn mount(&mut self, host: &mut dyn Host) {
        if self.mounted {
            return;
        }
        self.visual = self.card.position();
        host.place(self.card.id, self.visual);
        self.listen(host, ListenerKind::Click);
        self.listen(host, ListenerKind::FocusOut);
        self.mounted = true;
    }

    fn unmount(&mut self, host: &mut dyn Host) {
        for (_, id) in self.listeners.drain(..) {
            host.remove_listener(id);
        }
        if self.state == CardState::Editing {
            host.set_editable(self.card.id, false);
        }
        self.state = CardState::Idle;
        self.mounted = false;
    }

    fn on_attribute_change(&mut self, name: &str, value: &str, host: &mut dyn Host) {
        let (Some(attr), Some(n)) = (Attr::from_name(name), parse_px(value)) else {
            return;
        };
        self.apply_attribute(attr, n, host);
    }
}
