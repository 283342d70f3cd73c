//! Integration tests: canvas markup emit ↔ parse (sb-core).

use pretty_assertions::assert_eq;
use sb_core::emitter::emit_document;
use sb_core::parser::parse_canvas;
use sb_core::snapshot::{RestoreOutcome, Snapshot, StoreRecord};
use sb_core::{Card, CardId, Point};

fn card(id: &str, x: f32, y: f32, content: &str) -> Card {
    Card::new(CardId::intern(id), content).at(Point::new(x, y))
}

#[test]
fn cards_survive_emit_then_parse() {
    let doc = sb_core::CanvasDocument {
        opaque: String::new(),
        cards: vec![
            card("rt_a", 0.0, 0.0, "first"),
            card("rt_b", 120.5, 44.0, "<b>bold</b> &amp; more"),
            card("rt_c", 540.0, 530.0, "line<br>break<div>block</div>"),
        ],
    };
    let markup = emit_document(&doc);
    let parsed = parse_canvas(&markup).unwrap();
    assert_eq!(parsed, doc);
    assert_eq!(emit_document(&parsed), markup);
}

#[test]
fn opaque_markup_roundtrips_exactly() {
    let markup = "<div>X</div>";
    let parsed = parse_canvas(markup).unwrap();
    assert!(parsed.cards.is_empty());
    assert_eq!(emit_document(&parsed), markup);
}

#[test]
fn mixed_canvas_keeps_decorations_before_cards() {
    let source = concat!(
        "<h2 class=\"hint\">Right-click to add a card</h2>",
        "<div class=\"card\" data-card-id=\"rt_mixed\" left=\"10px\" top=\"20px\" ",
        "style=\"left: 10px; top: 20px;\"><div class=\"title\"></div>",
        "<div class=\"content\">note</div></div>",
    );
    let parsed = parse_canvas(source).unwrap();
    assert_eq!(parsed.opaque, "<h2 class=\"hint\">Right-click to add a card</h2>");
    assert_eq!(parsed.cards.len(), 1);
    assert_eq!(parsed.cards[0].position(), Point::new(10.0, 20.0));
    assert_eq!(emit_document(&parsed), source);
}

#[test]
fn snapshot_restore_cycle_reproduces_canvas() {
    let doc = sb_core::CanvasDocument {
        opaque: "<p>board</p>".into(),
        cards: vec![card("rt_cycle", 33.0, 66.0, "persist me")],
    };
    let markup = emit_document(&doc);
    let record = StoreRecord::new("data-view-key", Snapshot::capture(&markup));
    let outcome = RestoreOutcome::from_read(record.to_json().map(Some), "data-view-key");
    let RestoreOutcome::Apply(payload) = outcome else {
        panic!("expected Apply, got {outcome:?}");
    };
    assert_eq!(parse_canvas(&payload).unwrap(), doc);
}
