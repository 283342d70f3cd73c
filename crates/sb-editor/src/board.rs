//! Board: the canvas controller.
//!
//! The board is the single source of truth for the canvas. It owns every
//! card component, the explicit z-order, the one drag session and the one
//! editing slot. Every observable change is appended to a mutation log that
//! the host drains to patch the DOM and the pipeline drains to persist.

use crate::card::{CardComponent, CardState};
use crate::host::{Component, Host};
use crate::input::{InputEvent, Region, Target};
use crate::metrics::{BoardEvent, Collector};
use sb_core::clamp::clamp_position;
use sb_core::emitter::emit_canvas;
use sb_core::id::CardId;
use sb_core::model::*;
use sb_core::parser::{parse_canvas, text_content};
use std::collections::HashMap;

/// The in-progress relocation of one card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub card: CardId,
    /// Pointer position relative to the card's top-left at drag start.
    pub offset: Point,
}

pub struct Board {
    canvas: Size,
    /// Clamp size for cards the host has not measured yet.
    card_size: Size,
    cards: HashMap<CardId, CardComponent>,
    /// Stacking order, bottom first. Also the serialization order.
    z_order: Vec<CardId>,
    drag: Option<DragSession>,
    editing: Option<CardId>,
    /// Non-card markup kept verbatim ahead of the cards.
    opaque: String,
    mutations: Vec<CanvasMutation>,
    collector: Box<dyn Collector>,
}

impl Board {
    pub fn new(canvas: Size, card_size: Size, collector: Box<dyn Collector>) -> Self {
        Self {
            canvas,
            card_size,
            cards: HashMap::new(),
            z_order: Vec::new(),
            drag: None,
            editing: None,
            opaque: String::new(),
            mutations: Vec::new(),
            collector,
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn canvas(&self) -> Size {
        self.canvas
    }

    /// Resize the canvas. Cards that no longer fit are pulled back inside,
    /// emitting `Attribute` records for the positions that moved.
    pub fn set_canvas_size(&mut self, size: Size, host: &mut dyn Host) {
        if self.canvas == size {
            return;
        }
        self.canvas = size;
        for id in self.z_order.clone() {
            self.rebound(id, host);
        }
    }

    pub fn card_size(&self) -> Size {
        self.card_size
    }

    pub fn len(&self) -> usize {
        self.z_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z_order.is_empty()
    }

    pub fn contains(&self, id: CardId) -> bool {
        self.cards.contains_key(&id)
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.get(&id).map(CardComponent::card)
    }

    pub fn component(&self, id: CardId) -> Option<&CardComponent> {
        self.cards.get(&id)
    }

    /// Cards bottom to top.
    pub fn z_order(&self) -> &[CardId] {
        &self.z_order
    }

    /// Stacking rank of a card; higher is on top.
    pub fn z_priority(&self, id: CardId) -> Option<usize> {
        self.z_order.iter().position(|c| *c == id)
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    pub fn editing(&self) -> Option<CardId> {
        self.editing
    }

    pub fn opaque(&self) -> &str {
        &self.opaque
    }

    /// Canvas markup: opaque content first, then cards in z-order.
    pub fn markup(&self) -> String {
        emit_canvas(
            &self.opaque,
            self.z_order.iter().filter_map(|id| self.card(*id)),
        )
    }

    /// Plain text of a card's content, as exported.
    pub fn text_content(&self, id: CardId) -> Option<String> {
        self.card(id).map(|card| text_content(&card.content))
    }

    /// An id no card on this board uses.
    pub fn fresh_id(&self) -> CardId {
        loop {
            let id = CardId::fresh();
            if !self.contains(id) {
                return id;
            }
        }
    }

    /// Classify an event target from the `data-card-id` tag the host found
    /// on the nearest card element. Unknown tags are the canvas.
    pub fn classify(&self, tag: Option<&str>, region: Region) -> Target {
        let Some(id) = tag.and_then(CardId::lookup).filter(|id| self.contains(*id)) else {
            return Target::Canvas;
        };
        match region {
            Region::Title => Target::Title(id),
            Region::Content => Target::Content(id),
            Region::Body => Target::Card(id),
        }
    }

    /// Drain the mutation log.
    pub fn take_mutations(&mut self) -> Vec<CanvasMutation> {
        std::mem::take(&mut self.mutations)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.mutations.is_empty()
    }

    // ─── Structure ───────────────────────────────────────────────────────

    /// Insert a card on top of the stack. Fails on a duplicate id.
    pub fn insert(&mut self, card: Card, host: &mut dyn Host) -> bool {
        let id = card.id;
        if self.contains(id) {
            log::warn!("card {id} already on the board");
            return false;
        }
        self.mount_card(card, host);
        self.mutations.push(CanvasMutation::Inserted { id });
        true
    }

    /// Create a card at `at`, clamped into the canvas.
    pub fn add_card(&mut self, at: Point, content: &str, host: &mut dyn Host) -> CardId {
        let id = self.fresh_id();
        let position = clamp_position(at, self.card_size, self.canvas);
        let card = Card::new(id, content).at(position);
        self.insert(card, host);
        id
    }

    pub fn remove(&mut self, id: CardId, host: &mut dyn Host) -> bool {
        if !self.contains(id) {
            return false;
        }
        if self.drag.is_some_and(|d| d.card == id) {
            self.drag = None;
        }
        if self.editing == Some(id) {
            self.editing = None;
        }
        self.unmount_card(id, host);
        self.z_order.retain(|c| *c != id);
        self.mutations.push(CanvasMutation::Removed { id });
        true
    }

    /// Remove every child of the canvas, cards and opaque markup alike.
    pub fn clear(&mut self, host: &mut dyn Host) {
        self.unmount_all(host);
        self.opaque.clear();
        self.mutations.push(CanvasMutation::Cleared);
    }

    /// Unmount every card and forget all session state.
    pub fn unmount_all(&mut self, host: &mut dyn Host) {
        self.drag = None;
        self.editing = None;
        for id in std::mem::take(&mut self.z_order) {
            self.unmount_card(id, host);
        }
        self.cards.clear();
    }

    /// Move a card to the top of the stack.
    pub fn raise(&mut self, id: CardId) -> bool {
        let Some(index) = self.z_priority(id) else {
            return false;
        };
        if index + 1 == self.z_order.len() {
            return false;
        }
        self.z_order.remove(index);
        self.z_order.push(id);
        self.mutations.push(CanvasMutation::Raised { id });
        true
    }

    /// Replace the whole canvas from markup. Emits a single `Replaced`.
    /// Stored positions are clamped into the current canvas.
    pub fn restore(&mut self, markup: &str, host: &mut dyn Host) -> Result<usize, String> {
        let doc = parse_canvas(markup)?;
        self.unmount_all(host);
        self.opaque = doc.opaque;
        for card in doc.cards {
            let size = if card.size().is_measured() { card.size() } else { self.card_size };
            let at = self.bounded(card.position(), size);
            self.mount_card(card.at(at), host);
        }
        self.mutations.push(CanvasMutation::Replaced);
        Ok(self.z_order.len())
    }

    fn mount_card(&mut self, card: Card, host: &mut dyn Host) {
        let id = card.id;
        let mut component = CardComponent::new(card);
        component.mount(host);
        self.cards.insert(id, component);
        self.z_order.push(id);
        self.collector.record(BoardEvent::Mounted(id));
    }

    fn unmount_card(&mut self, id: CardId, host: &mut dyn Host) {
        if let Some(mut component) = self.cards.remove(&id) {
            component.unmount(host);
            self.collector.record(BoardEvent::Unmounted(id));
        }
    }

    // ─── Attributes ──────────────────────────────────────────────────────

    /// Set an observed attribute from outside (scripting). The value is
    /// clamped like a drag would be.
    pub fn set_attribute(&mut self, id: CardId, name: &str, value: &str, host: &mut dyn Host) -> bool {
        let (Some(attr), Some(n)) = (Attr::from_name(name), parse_px(value)) else {
            return false;
        };
        let Some(component) = self.cards.get(&id) else {
            return false;
        };
        let mut at = component.card().position();
        match attr {
            Attr::Left => at.x = n,
            Attr::Top => at.y = n,
        }
        let at = self.bounded(at, component.size_or(self.card_size));
        let n = match attr {
            Attr::Left => at.x,
            Attr::Top => at.y,
        };
        self.apply(id, attr, n, host)
    }

    fn apply(&mut self, id: CardId, attr: Attr, value: f32, host: &mut dyn Host) -> bool {
        let Some(component) = self.cards.get_mut(&id) else {
            return false;
        };
        let changed = component.apply_attribute(attr, value, host);
        if changed {
            self.mutations.push(CanvasMutation::Attribute { id, attr });
        }
        changed
    }

    /// `at` clamped into the canvas, or unchanged while the canvas has no
    /// measured size yet.
    fn bounded(&self, at: Point, size: Size) -> Point {
        if self.canvas.is_measured() {
            clamp_position(at, size, self.canvas)
        } else {
            at
        }
    }

    /// Pull a card back inside the canvas if it sticks out.
    fn rebound(&mut self, id: CardId, host: &mut dyn Host) {
        let Some(component) = self.cards.get(&id) else {
            return;
        };
        if component.state() == CardState::Dragging {
            return;
        }
        let position = component.card().position();
        let at = self.bounded(position, component.size_or(self.card_size));
        if at.x != position.x {
            self.apply(id, Attr::Left, at.x, host);
        }
        if at.y != position.y {
            self.apply(id, Attr::Top, at.y, host);
        }
    }

    /// Record the laid-out size of a card element. A card that grew past
    /// the canvas edge is pulled back inside.
    pub fn set_card_size(&mut self, id: CardId, size: Size, host: &mut dyn Host) {
        let Some(component) = self.cards.get_mut(&id).filter(|_| size.is_measured()) else {
            return;
        };
        if component.size_or(Size::default()) == size {
            return;
        }
        component.set_size(size);
        self.rebound(id, host);
    }

    // ─── Drag ────────────────────────────────────────────────────────────

    /// Begin dragging `id` by its title. A stale session is ended first and
    /// an editing card commits, so at most one session of either kind runs.
    pub fn start_drag(&mut self, id: CardId, pointer: Point, host: &mut dyn Host) -> bool {
        if !self.contains(id) {
            return false;
        }
        if self.drag.is_some() {
            self.end_drag(host);
        }
        if self.editing.is_some() {
            self.commit_edit(host);
        }
        self.raise(id);

        let Some(component) = self.cards.get_mut(&id) else {
            return false;
        };
        let origin = component.visual();
        component.begin_drag(host);
        self.drag = Some(DragSession {
            card: id,
            offset: Point::new(pointer.x - origin.x, pointer.y - origin.y),
        });
        log::debug!("drag start {id}");
        true
    }

    /// Follow the pointer. Returns the clamped position applied.
    pub fn drag_to(&mut self, pointer: Point, host: &mut dyn Host) -> Option<Point> {
        let session = self.drag?;
        let component = self.cards.get_mut(&session.card)?;
        let candidate = Point::new(pointer.x - session.offset.x, pointer.y - session.offset.y);
        let at = clamp_position(candidate, component.size_or(self.card_size), self.canvas);
        component.move_visual(at, host);
        Some(at)
    }

    /// End the drag and write the final position into the attributes.
    pub fn end_drag(&mut self, host: &mut dyn Host) -> Option<CardId> {
        let session = self.drag.take()?;
        let component = self.cards.get_mut(&session.card)?;
        for attr in component.finish_drag(host) {
            self.mutations.push(CanvasMutation::Attribute {
                id: session.card,
                attr,
            });
        }
        log::debug!("drag end {}", session.card);
        Some(session.card)
    }

    // ─── Edit ────────────────────────────────────────────────────────────

    /// Make a card's content editable. Any other editing card commits first;
    /// a drag in progress ends.
    pub fn begin_edit(&mut self, id: CardId, host: &mut dyn Host) -> bool {
        if !self.contains(id) {
            return false;
        }
        if self.editing == Some(id) {
            return true;
        }
        if self.drag.is_some() {
            self.end_drag(host);
        }
        if self.editing.is_some() {
            self.commit_edit(host);
        }
        let Some(component) = self.cards.get_mut(&id) else {
            return false;
        };
        component.begin_edit(host);
        self.editing = Some(id);
        true
    }

    /// Copy the live surface into the editing card and leave edit mode.
    pub fn commit_edit(&mut self, host: &mut dyn Host) -> Option<CardId> {
        let id = self.editing.take()?;
        let component = self.cards.get_mut(&id)?;
        if component.end_edit(host) {
            self.mutations.push(CanvasMutation::Content { id });
        }
        Some(id)
    }

    /// Copy the live surface into the editing card, staying in edit mode.
    pub fn sync_edit(&mut self, host: &mut dyn Host) -> bool {
        let Some(id) = self.editing else {
            return false;
        };
        let Some(component) = self.cards.get_mut(&id) else {
            return false;
        };
        let changed = component.sync_content(host);
        if changed {
            self.mutations.push(CanvasMutation::Content { id });
        }
        changed
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// Element-level events: presses and double-clicks on cards.
    pub fn handle(&mut self, event: InputEvent, host: &mut dyn Host) {
        match event {
            InputEvent::PointerDown {
                at,
                target: Target::Title(id),
            } => {
                self.start_drag(id, at, host);
            }
            InputEvent::PointerDown {
                target: Target::Card(id) | Target::Content(id),
                ..
            } => {
                self.raise(id);
            }
            InputEvent::DoubleClick {
                target: Target::Content(id),
            } => {
                self.begin_edit(id, host);
            }
            _ => {}
        }
    }

    /// A document-level event delivered to the listener `owner` registered.
    pub fn deliver(&mut self, owner: CardId, event: InputEvent, host: &mut dyn Host) {
        let state = self.cards.get(&owner).map(CardComponent::state);
        match event {
            InputEvent::PointerMove { at } if state == Some(CardState::Dragging) => {
                self.drag_to(at, host);
            }
            InputEvent::PointerUp { at } if state == Some(CardState::Dragging) => {
                self.drag_to(at, host);
                self.end_drag(host);
            }
            InputEvent::Click { target }
                if self.editing == Some(owner)
                    && target != Target::Content(owner)
                    && target != Target::Menu =>
            {
                self.commit_edit(host);
            }
            InputEvent::FocusOut { target }
                if self.editing == Some(owner) && target == Target::Content(owner) =>
            {
                self.sync_edit(host);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ListenerKind, ListenerOwner, RecordingHost};
    use crate::metrics::NoopCollector;
    use pretty_assertions::assert_eq;

    const CANVAS: Size = Size::new(800.0, 600.0);
    const CARD: Size = Size::new(260.0, 70.0);

    fn board() -> Board {
        Board::new(CANVAS, CARD, Box::new(NoopCollector))
    }

    fn put(board: &mut Board, host: &mut RecordingHost, id: &str, x: f32, y: f32) -> CardId {
        let id = CardId::intern(id);
        assert!(board.insert(Card::new(id, "note").at(Point::new(x, y)), host));
        id
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let id = put(&mut b, &mut host, "b_dup", 0.0, 0.0);
        assert!(!b.insert(Card::new(id, "again"), &mut host));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn raise_moves_to_top_once() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_ra", 0.0, 0.0);
        let c = put(&mut b, &mut host, "b_rc", 0.0, 0.0);
        b.take_mutations();
        assert!(b.raise(a));
        assert!(!b.raise(a));
        assert_eq!(b.z_order(), &[c, a]);
        assert_eq!(b.take_mutations(), vec![CanvasMutation::Raised { id: a }]);
    }

    #[test]
    fn drag_raises_clamps_and_writes_back() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_da", 100.0, 100.0);
        let _ = put(&mut b, &mut host, "b_db", 0.0, 0.0);
        b.take_mutations();

        assert!(b.start_drag(a, Point::new(110.0, 105.0), &mut host));
        assert_eq!(b.z_priority(a), Some(1));
        assert_eq!(
            b.drag_to(Point::new(5000.0, -50.0), &mut host),
            Some(Point::new(540.0, 0.0))
        );
        assert_eq!(b.card(a).unwrap().position(), Point::new(100.0, 100.0));
        assert_eq!(b.end_drag(&mut host), Some(a));
        assert_eq!(b.card(a).unwrap().position(), Point::new(540.0, 0.0));
        assert_eq!(
            b.take_mutations(),
            vec![
                CanvasMutation::Raised { id: a },
                CanvasMutation::Attribute { id: a, attr: Attr::Left },
                CanvasMutation::Attribute { id: a, attr: Attr::Top },
            ]
        );
    }

    #[test]
    fn measured_size_drives_the_clamp() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_meas", 0.0, 0.0);
        b.set_card_size(a, Size::new(100.0, 50.0), &mut host);
        b.start_drag(a, Point::ORIGIN, &mut host);
        assert_eq!(
            b.drag_to(Point::new(900.0, 900.0), &mut host),
            Some(Point::new(700.0, 550.0))
        );
    }

    #[test]
    fn grown_card_clamps_with_its_new_height() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_grow", 0.0, 0.0);
        b.set_card_size(a, CARD, &mut host);
        b.set_card_size(a, Size::new(260.0, 200.0), &mut host);
        b.start_drag(a, Point::ORIGIN, &mut host);
        assert_eq!(
            b.drag_to(Point::new(0.0, 10_000.0), &mut host),
            Some(Point::new(0.0, 400.0))
        );
    }

    #[test]
    fn growing_past_the_edge_pulls_the_card_back() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_edge", 0.0, 530.0);
        b.take_mutations();
        b.set_card_size(a, Size::new(260.0, 150.0), &mut host);
        assert_eq!(b.card(a).unwrap().position(), Point::new(0.0, 450.0));
        assert_eq!(
            b.take_mutations(),
            vec![CanvasMutation::Attribute { id: a, attr: Attr::Top }]
        );
    }

    #[test]
    fn shrinking_canvas_rebounds_cards() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_shrink", 500.0, 100.0);
        b.take_mutations();
        b.set_canvas_size(Size::new(600.0, 600.0), &mut host);
        assert_eq!(b.card(a).unwrap().position(), Point::new(340.0, 100.0));
        assert_eq!(host.placed.get(&a), Some(&Point::new(340.0, 100.0)));
        assert_eq!(
            b.take_mutations(),
            vec![CanvasMutation::Attribute { id: a, attr: Attr::Left }]
        );
    }

    #[test]
    fn unmeasured_canvas_leaves_positions_alone() {
        let mut host = RecordingHost::new();
        let mut b = Board::new(Size::default(), CARD, Box::new(NoopCollector));
        b.restore(
            r#"<div data-card-id="b_unmeasured" left="900px" top="15px"></div>"#,
            &mut host,
        )
        .unwrap();
        let id = CardId::intern("b_unmeasured");
        assert_eq!(b.card(id).unwrap().position(), Point::new(900.0, 15.0));
    }

    #[test]
    fn external_attribute_is_clamped() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_attr_clamp", 10.0, 10.0);
        assert!(b.set_attribute(a, "left", "-300px", &mut host));
        assert!(b.set_attribute(a, "top", "9999px", &mut host));
        assert_eq!(b.card(a).unwrap().position(), Point::new(0.0, 530.0));
    }

    #[test]
    fn second_drag_terminates_the_first() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_sa", 0.0, 0.0);
        let c = put(&mut b, &mut host, "b_sc", 300.0, 0.0);
        b.start_drag(a, Point::ORIGIN, &mut host);
        b.drag_to(Point::new(20.0, 20.0), &mut host);
        b.start_drag(c, Point::new(300.0, 0.0), &mut host);

        assert_eq!(b.drag_session().map(|d| d.card), Some(c));
        assert_eq!(b.component(a).unwrap().state(), CardState::Idle);
        assert_eq!(b.card(a).unwrap().position(), Point::new(20.0, 20.0));
        assert!(
            !host
                .listeners_of(ListenerOwner::Card(a))
                .contains(&ListenerKind::MouseMove)
        );
    }

    #[test]
    fn editing_is_a_singleton() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_ea", 0.0, 0.0);
        let c = put(&mut b, &mut host, "b_ec", 0.0, 0.0);
        b.begin_edit(a, &mut host);
        host.type_into(a, "from a");
        b.begin_edit(c, &mut host);
        assert_eq!(b.editing(), Some(c));
        assert_eq!(b.card(a).unwrap().content, "from a");
        assert_eq!(host.editable.len(), 1);
    }

    #[test]
    fn drag_commits_an_open_edit() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_de", 0.0, 0.0);
        b.begin_edit(a, &mut host);
        host.type_into(a, "draft");
        b.start_drag(a, Point::ORIGIN, &mut host);
        assert_eq!(b.editing(), None);
        assert_eq!(b.component(a).unwrap().state(), CardState::Dragging);
        assert_eq!(b.card(a).unwrap().content, "draft");
    }

    #[test]
    fn classify_uses_registered_ids_only() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let a = put(&mut b, &mut host, "b_cls", 0.0, 0.0);
        assert_eq!(b.classify(Some("b_cls"), Region::Title), Target::Title(a));
        assert_eq!(b.classify(Some("b_cls"), Region::Body), Target::Card(a));
        assert_eq!(b.classify(Some("nobody_here"), Region::Body), Target::Canvas);
        assert_eq!(b.classify(None, Region::Content), Target::Canvas);
    }

    #[test]
    fn restore_replaces_everything() {
        let mut host = RecordingHost::new();
        let mut b = board();
        put(&mut b, &mut host, "b_old", 0.0, 0.0);
        b.take_mutations();
        let n = b
            .restore(
                r#"<p>hi</p><div class="card" data-card-id="b_new" left="5px" top="6px"><div class="title"></div><div class="content">x</div></div>"#,
                &mut host,
            )
            .unwrap();
        assert_eq!(n, 1);
        assert!(!b.contains(CardId::intern("b_old")));
        assert_eq!(b.opaque(), "<p>hi</p>");
        assert_eq!(b.take_mutations(), vec![CanvasMutation::Replaced]);
        assert_eq!(host.active_listeners(), 2);
    }

    #[test]
    fn add_card_clamps_into_canvas() {
        let mut host = RecordingHost::new();
        let mut b = board();
        let id = b.add_card(Point::new(790.0, 590.0), "", &mut host);
        assert_eq!(b.card(id).unwrap().position(), Point::new(540.0, 530.0));
    }
}
