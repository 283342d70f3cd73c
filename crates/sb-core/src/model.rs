//! Core data model for the board.
//!
//! A board is a flat, ordered collection of cards on a fixed-size canvas.
//! Stacking order is the order of the board's `z_order` sequence, never a
//! numeric field on the card, so the serialized markup and the visual
//! stacking always agree.

use crate::id::CardId;
use serde::{Deserialize, Serialize};

// ─── Geometry ────────────────────────────────────────────────────────────

/// A point in canvas coordinates (CSS pixels, origin at the canvas top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Width/height of a canvas, card, or menu box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Zero or negative sizes come from unmeasured (hidden) elements.
    pub fn is_measured(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

// ─── Card ────────────────────────────────────────────────────────────────

/// A sticky note.
///
/// `left`/`top` are the card's observed attributes: they only change when a
/// drag ends, when the card is created, or when they are set externally.
/// `content` is an HTML fragment kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub content: String,
}

impl Card {
    pub fn new(id: CardId, content: impl Into<String>) -> Self {
        Self {
            id,
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            content: content.into(),
        }
    }

    pub fn at(mut self, position: Point) -> Self {
        self.left = position.x;
        self.top = position.y;
        self
    }

    pub fn sized(mut self, size: Size) -> Self {
        self.width = size.width;
        self.height = size.height;
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// The observed attributes of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    Left,
    Top,
}

impl Attr {
    pub const ALL: [Attr; 2] = [Attr::Left, Attr::Top];

    pub fn as_str(self) -> &'static str {
        match self {
            Attr::Left => "left",
            Attr::Top => "top",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Attr::Left),
            "top" => Some(Attr::Top),
            _ => None,
        }
    }
}

/// Parse a `"12px"` / `"12"` attribute value.
pub fn parse_px(value: &str) -> Option<f32> {
    let v = value.trim();
    let v = v.strip_suffix("px").unwrap_or(v).trim();
    v.parse::<f32>().ok().filter(|n| n.is_finite())
}

/// Format a coordinate without trailing zeros (`12`, `12.5`).
pub fn format_px(n: f32) -> String {
    if n == n.floor() {
        format!("{}", n as i32)
    } else {
        format!("{n:.2}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

// ─── Canvas document ─────────────────────────────────────────────────────

/// Parsed canvas markup: non-card markup kept verbatim plus the cards in
/// stacking order (first = bottom).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanvasDocument {
    /// Top-level markup that is not a card (static decorations, text).
    pub opaque: String,
    pub cards: Vec<Card>,
}

impl CanvasDocument {
    pub fn is_empty(&self) -> bool {
        self.opaque.trim().is_empty() && self.cards.is_empty()
    }
}

// ─── Context menu actions ────────────────────────────────────────────────

/// An entry of the context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Add,
    Edit,
    Delete,
    Export,
    Print,
    RemoveAll,
}

impl ActionKind {
    /// Shown when a card is right-clicked.
    pub const CARD_ACTIONS: [ActionKind; 3] =
        [ActionKind::Edit, ActionKind::Delete, ActionKind::Export];

    /// Shown when the canvas background is right-clicked.
    pub const CANVAS_ACTIONS: [ActionKind; 3] =
        [ActionKind::Add, ActionKind::Print, ActionKind::RemoveAll];

    /// Menu rendering order.
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Add,
        ActionKind::Edit,
        ActionKind::Delete,
        ActionKind::Export,
        ActionKind::RemoveAll,
        ActionKind::Print,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Add => "add",
            ActionKind::Edit => "edit",
            ActionKind::Delete => "delete",
            ActionKind::Export => "export",
            ActionKind::Print => "print",
            ActionKind::RemoveAll => "remove-all",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ActionKind::ALL.into_iter().find(|a| a.as_str() == name)
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Add => "Add card",
            ActionKind::Edit => "Edit",
            ActionKind::Delete => "Delete",
            ActionKind::Export => "Export content",
            ActionKind::Print => "Print page",
            ActionKind::RemoveAll => "Remove all cards",
        }
    }

    pub fn targets_card(self) -> bool {
        ActionKind::CARD_ACTIONS.contains(&self)
    }
}

// ─── Mutation records ────────────────────────────────────────────────────

/// Observable change to the canvas, in the three categories a DOM mutation
/// observer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// A single change record emitted by the board.
///
/// The wasm host patches the DOM from these records; the change capture
/// observer only counts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasMutation {
    /// A card was appended (top of the z-order).
    Inserted { id: CardId },
    /// A card was removed.
    Removed { id: CardId },
    /// A card moved to the top of the z-order.
    Raised { id: CardId },
    /// Every child of the canvas was removed.
    Cleared,
    /// The whole canvas was replaced from markup (restore).
    Replaced,
    /// An observed attribute changed.
    Attribute { id: CardId, attr: Attr },
    /// Card content changed.
    Content { id: CardId },
}

impl CanvasMutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            CanvasMutation::Inserted { .. }
            | CanvasMutation::Removed { .. }
            | CanvasMutation::Raised { .. }
            | CanvasMutation::Cleared
            | CanvasMutation::Replaced => MutationKind::ChildList,
            CanvasMutation::Attribute { .. } => MutationKind::Attributes,
            CanvasMutation::Content { .. } => MutationKind::CharacterData,
        }
    }

    /// The card this record concerns, if any.
    pub fn card(&self) -> Option<CardId> {
        match self {
            CanvasMutation::Inserted { id }
            | CanvasMutation::Removed { id }
            | CanvasMutation::Raised { id }
            | CanvasMutation::Attribute { id, .. }
            | CanvasMutation::Content { id } => Some(*id),
            CanvasMutation::Cleared | CanvasMutation::Replaced => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn px_parsing() {
        assert_eq!(parse_px("12px"), Some(12.0));
        assert_eq!(parse_px(" 7.5px "), Some(7.5));
        assert_eq!(parse_px("40"), Some(40.0));
        assert_eq!(parse_px("auto"), None);
        assert_eq!(parse_px("NaNpx"), None);
    }

    #[test]
    fn px_formatting() {
        assert_eq!(format_px(12.0), "12");
        assert_eq!(format_px(12.5), "12.5");
        assert_eq!(format_px(0.126), "0.13");
        assert_eq!(format_px(-3.0), "-3");
    }

    #[test]
    fn action_sets_are_complementary() {
        for action in ActionKind::ALL {
            let in_card = ActionKind::CARD_ACTIONS.contains(&action);
            let in_canvas = ActionKind::CANVAS_ACTIONS.contains(&action);
            assert!(in_card ^ in_canvas, "{action:?} must be in exactly one set");
        }
    }

    #[test]
    fn action_names_roundtrip() {
        for action in ActionKind::ALL {
            assert_eq!(ActionKind::from_name(action.as_str()), Some(action));
        }
        assert_eq!(ActionKind::from_name("rename"), None);
    }

    #[test]
    fn mutation_kinds() {
        let id = CardId::intern("m");
        assert_eq!(
            CanvasMutation::Raised { id }.kind(),
            MutationKind::ChildList
        );
        assert_eq!(
            CanvasMutation::Attribute {
                id,
                attr: Attr::Left
            }
            .kind(),
            MutationKind::Attributes
        );
        assert_eq!(
            CanvasMutation::Content { id }.kind(),
            MutationKind::CharacterData
        );
        assert_eq!(CanvasMutation::Cleared.card(), None);
    }
}
