//! Input abstraction layer.
//!
//! The host normalizes DOM events into `InputEvent`s whose coordinates are
//! relative to the canvas top-left. Targets are classified by tagged lookup
//! (`Board::classify`), never by inspecting element types.

use sb_core::id::CardId;
use sb_core::model::Point;

/// What an event landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The canvas background.
    Canvas,
    /// A card's drag handle.
    Title(CardId),
    /// A card's editable content surface.
    Content(CardId),
    /// Any other part of a card.
    Card(CardId),
    /// The context menu box.
    Menu,
    /// Anything outside the canvas and the menu.
    Outside,
}

impl Target {
    /// The card this target belongs to, if any.
    pub fn card(self) -> Option<CardId> {
        match self {
            Target::Title(id) | Target::Content(id) | Target::Card(id) => Some(id),
            Target::Canvas | Target::Menu | Target::Outside => None,
        }
    }
}

/// Which part of a card element the host saw the event on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Title,
    Content,
    Body,
}

/// A normalized input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Primary button pressed.
    PointerDown { at: Point, target: Target },

    /// Pointer moved (document-level, only while a drag listener exists).
    PointerMove { at: Point },

    /// Primary button released.
    PointerUp { at: Point },

    DoubleClick { target: Target },

    /// A completed click anywhere in the document.
    Click { target: Target },

    /// Focus left `target`.
    FocusOut { target: Target },

    /// Secondary button (right-click) inside the canvas.
    ContextMenu { at: Point, target: Target },
}
