//! Emitter: cards → canvas markup.
//!
//! Produces the markup that is both rendered into the canvas element and
//! persisted as the snapshot payload. Output round-trips through
//! `parser::parse_canvas`.

use crate::model::*;
use std::fmt::Write;

/// Emit a whole canvas: opaque markup first, then cards bottom-to-top.
#[must_use]
pub fn emit_canvas<'a>(opaque: &str, cards: impl IntoIterator<Item = &'a Card>) -> String {
    let mut out = String::with_capacity(256 + opaque.len());
    out.push_str(opaque);
    for card in cards {
        emit_card(&mut out, card);
    }
    out
}

/// Emit a parsed document.
#[must_use]
pub fn emit_document(doc: &CanvasDocument) -> String {
    emit_canvas(&doc.opaque, &doc.cards)
}

/// Markup for a single card element.
#[must_use]
pub fn card_markup(card: &Card) -> String {
    let mut out = String::with_capacity(160 + card.content.len());
    emit_card(&mut out, card);
    out
}

/// Inner markup of a card element (title handle + content surface).
#[must_use]
pub fn card_inner_markup(card: &Card) -> String {
    format!(
        r#"<div class="title"></div><div class="content">{}</div>"#,
        card.content
    )
}

/// The attributes a card element carries, in emission order.
pub fn card_attributes(card: &Card) -> [(&'static str, String); 5] {
    let left = format_px(card.left);
    let top = format_px(card.top);
    [
        ("class", "card".to_string()),
        ("data-card-id", card.id.as_str().to_string()),
        ("left", format!("{left}px")),
        ("top", format!("{top}px")),
        ("style", position_style(card.position())),
    ]
}

/// Inline style that places an element at `at`.
pub fn position_style(at: Point) -> String {
    format!(
        "left: {}px; top: {}px;",
        format_px(at.x),
        format_px(at.y)
    )
}

fn emit_card(out: &mut String, card: &Card) {
    out.push_str("<div");
    for (name, value) in card_attributes(card) {
        let _ = write!(out, r#" {name}="{}""#, escape_attr(&value));
    }
    out.push('>');
    out.push_str(&card_inner_markup(card));
    out.push_str("</div>");
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
