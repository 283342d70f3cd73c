//! Parser for canvas markup → `CanvasDocument`.
//!
//! Built on `winnow` 0.7. This is not a general HTML parser: it recognizes
//! the card elements the emitter writes, and keeps every other top-level
//! node verbatim as opaque markup so foreign content survives a restore.

use crate::id::CardId;
use crate::model::*;
use std::collections::HashSet;
use winnow::combinator::{alt, delimited};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

/// Elements that never have a body.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parse canvas markup into cards + opaque markup.
///
/// Fails on a card element that is unterminated, has an invalid id, or
/// repeats an id already used by an earlier card.
#[must_use = "parsing result should be used"]
pub fn parse_canvas(input: &str) -> Result<CanvasDocument, String> {
    let mut doc = CanvasDocument::default();
    let mut seen: HashSet<CardId> = HashSet::new();
    let mut rest = input;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            doc.opaque.push_str(rest);
            break;
        };
        doc.opaque.push_str(&rest[..lt]);
        rest = &rest[lt..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map(|p| p + 3).unwrap_or(rest.len());
            doc.opaque.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        let start = rest;
        let tag = match parse_open_tag.parse_next(&mut rest) {
            Ok(tag) => tag,
            Err(_) => {
                // Stray '<' or a closing tag at top level.
                rest = start;
                doc.opaque.push('<');
                rest = &rest[1..];
                continue;
            }
        };

        if tag.is_card() {
            let body = take_element_body(&mut rest, tag.name)
                .ok_or_else(|| format!("unterminated card element near: {}", preview(start)))?;
            let card = card_from_tag(&tag, body)?;
            if !seen.insert(card.id) {
                return Err(format!("duplicate card id: {}", card.id));
            }
            doc.cards.push(card);
        } else if tag.self_closing || tag.is_void() {
            doc.opaque.push_str(&start[..start.len() - rest.len()]);
        } else if take_element_body(&mut rest, tag.name).is_some() {
            doc.opaque.push_str(&start[..start.len() - rest.len()]);
        } else {
            // Unterminated foreign element: keep the remainder verbatim.
            doc.opaque.push_str(start);
            rest = "";
        }
    }

    Ok(doc)
}

/// Plain text of an HTML fragment, as exported to a `.txt` file.
///
/// `<br>` and the end of block elements become newlines, other tags are
/// dropped, common entities are decoded. No trimming.
pub fn text_content(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut rest = fragment;

    while let Some(lt) = rest.find(|c: char| c == '<' || c == '&') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];
        if rest.starts_with('<') {
            let Some(gt) = rest.find('>') else {
                out.push_str(rest);
                return out;
            };
            let tag = rest[1..gt].trim().trim_end_matches('/').trim();
            let name = tag
                .split(|c: char| c.is_whitespace())
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            if matches!(name.as_str(), "br" | "/div" | "/p" | "/li") {
                out.push('\n');
            }
            rest = &rest[gt + 1..];
        } else {
            let (decoded, used) = decode_entity(rest);
            out.push_str(&decoded);
            rest = &rest[used..];
        }
    }
    out.push_str(rest);
    out
}

// ─── Tags ────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct OpenTag<'a> {
    name: &'a str,
    attrs: Vec<(&'a str, &'a str)>,
    self_closing: bool,
}

impl<'a> OpenTag<'a> {
    fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    fn is_card(&self) -> bool {
        self.name.eq_ignore_ascii_case("div") && self.attr("data-card-id").is_some()
    }

    fn is_void(&self) -> bool {
        VOID_ELEMENTS
            .iter()
            .any(|v| v.eq_ignore_ascii_case(self.name))
    }
}

fn card_from_tag(tag: &OpenTag<'_>, body: &str) -> Result<Card, String> {
    let raw_id = tag.attr("data-card-id").unwrap_or_default();
    if !CardId::is_valid(raw_id) {
        return Err(format!("invalid card id: {raw_id:?}"));
    }
    let left = tag.attr("left").and_then(parse_px).unwrap_or(0.0);
    let top = tag.attr("top").and_then(parse_px).unwrap_or(0.0);
    let content = find_child_with_class(body, "content").unwrap_or_default();

    Ok(Card::new(CardId::intern(raw_id), content).at(Point::new(left, top)))
}

/// Inner markup of the first direct-or-nested element carrying `class`.
fn find_child_with_class<'a>(body: &'a str, class: &str) -> Option<&'a str> {
    let mut rest = body;
    while let Some(lt) = rest.find('<') {
        rest = &rest[lt..];
        let mut cursor = rest;
        match parse_open_tag.parse_next(&mut cursor) {
            Ok(tag) if tag.has_class(class) && !tag.self_closing => {
                return take_element_body(&mut cursor, tag.name);
            }
            Ok(tag) if !tag.self_closing && !tag.is_void() => {
                // Search inside this element before moving on to its siblings.
                let inner_start = cursor;
                match take_element_body(&mut cursor, tag.name) {
                    Some(inner) => {
                        if let Some(found) = find_child_with_class(inner, class) {
                            return Some(found);
                        }
                        rest = cursor;
                    }
                    None => rest = inner_start,
                }
            }
            Ok(_) => rest = cursor,
            Err(_) => rest = &rest[1..],
        }
    }
    None
}

/// Consume up to and including the `</name>` that balances an already
/// consumed `<name ...>`. Returns the body between the tags.
fn take_element_body<'a>(input: &mut &'a str, name: &str) -> Option<&'a str> {
    let source = *input;
    let open = format!("<{}", name.to_ascii_lowercase());
    let close = format!("</{}>", name.to_ascii_lowercase());
    let lower = source.to_ascii_lowercase();
    let mut depth = 1usize;
    let mut pos = 0usize;

    loop {
        let next_close = lower[pos..].find(&close)? + pos;
        match find_open(&lower[pos..], &open).map(|o| o + pos) {
            Some(o) if o < next_close => {
                depth += 1;
                pos = o + open.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    *input = &source[next_close + close.len()..];
                    return Some(&source[..next_close]);
                }
                pos = next_close + close.len();
            }
        }
    }
}

/// Find `<name` followed by a tag-name boundary.
fn find_open(haystack: &str, open: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(i) = haystack[from..].find(open) {
        let at = from + i;
        let after = haystack[at + open.len()..].chars().next();
        if matches!(after, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            return Some(at);
        }
        from = at + open.len();
    }
    None
}

// ─── Low-level parsers ──────────────────────────────────────────────────

/// Consume optional whitespace (concrete error type avoids inference issues).
fn skip_space(input: &mut &str) {
    use winnow::ascii::multispace0;
    let _: Result<&str, winnow::error::ErrMode<ContextError>> = multispace0.parse_next(input);
}

fn parse_open_tag<'a>(input: &mut &'a str) -> ModalResult<OpenTag<'a>> {
    let _ = '<'.parse_next(input)?;
    let name: &str =
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)?;
    let mut attrs = Vec::new();

    loop {
        skip_space(input);
        if input.starts_with("/>") {
            *input = &input[2..];
            return Ok(OpenTag {
                name,
                attrs,
                self_closing: true,
            });
        }
        if input.starts_with('>') {
            *input = &input[1..];
            return Ok(OpenTag {
                name,
                attrs,
                self_closing: false,
            });
        }
        attrs.push(parse_attribute.parse_next(input)?);
    }
}

fn parse_attribute<'a>(input: &mut &'a str) -> ModalResult<(&'a str, &'a str)> {
    let name: &str = take_while(1.., |c: char| {
        !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'' | '<')
    })
    .parse_next(input)?;
    skip_space(input);
    if !input.starts_with('=') {
        return Ok((name, ""));
    }
    *input = &input[1..];
    skip_space(input);

    let value = alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
        take_while(1.., |c: char| !c.is_whitespace() && c != '>'),
    ))
    .parse_next(input)?;
    Ok((name, value))
}

/// Decode the entity at the start of `input` (which starts with `&`).
/// Returns the replacement text and the number of bytes consumed.
fn decode_entity(input: &str) -> (String, usize) {
    let Some(semi) = input
        .char_indices()
        .take(12)
        .find(|(_, c)| *c == ';')
        .map(|(i, _)| i)
    else {
        return ("&".to_string(), 1);
    };
    let body = &input[1..semi];
    let decoded = match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        _ => body
            .strip_prefix("#x")
            .or_else(|| body.strip_prefix("#X"))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .or_else(|| body.strip_prefix('#').and_then(|d| d.parse::<u32>().ok()))
            .and_then(char::from_u32),
    };
    match decoded {
        Some(c) => (c.to_string(), semi + 1),
        None => ("&".to_string(), 1),
    }
}

fn preview(s: &str) -> &str {
    let end = s
        .char_indices()
        .nth(40)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_single_card() {
        let doc = parse_canvas(
            r#"<div class="card" data-card-id="p_one" left="12px" top="30px"><div class="title"></div><div class="content">hi <b>there</b></div></div>"#,
        )
        .unwrap();
        assert_eq!(doc.opaque, "");
        assert_eq!(doc.cards.len(), 1);
        let card = &doc.cards[0];
        assert_eq!(card.id.as_str(), "p_one");
        assert_eq!(card.position(), Point::new(12.0, 30.0));
        assert_eq!(card.content, "hi <b>there</b>");
    }

    #[test]
    fn nested_divs_in_content() {
        let doc = parse_canvas(
            r#"<div data-card-id="p_nested"><div class="title"></div><div class="content"><div>a</div><div>b</div></div></div><p>after</p>"#,
        )
        .unwrap();
        assert_eq!(doc.cards[0].content, "<div>a</div><div>b</div>");
        assert_eq!(doc.opaque, "<p>after</p>");
    }

    #[test]
    fn missing_position_defaults_to_origin() {
        let doc = parse_canvas(r#"<div data-card-id="p_nopos"></div>"#).unwrap();
        assert_eq!(doc.cards[0].position(), Point::ORIGIN);
        assert_eq!(doc.cards[0].content, "");
    }

    #[test]
    fn foreign_markup_is_opaque() {
        let doc = parse_canvas("<div>X</div>").unwrap();
        assert!(doc.cards.is_empty());
        assert_eq!(doc.opaque, "<div>X</div>");
    }

    #[test]
    fn void_and_stray_tags_are_opaque() {
        let doc = parse_canvas("a<br>b</span> 1 < 2<!-- note -->").unwrap();
        assert_eq!(doc.opaque, "a<br>b</span> 1 < 2<!-- note -->");
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = parse_canvas(r#"<div data-card-id="p_dup"></div><div data-card-id="p_dup"></div>"#)
            .unwrap_err();
        assert!(err.contains("duplicate"), "{err}");
    }

    #[test]
    fn unterminated_card_rejected() {
        assert!(parse_canvas(r#"<div data-card-id="p_open"><div class="content">x"#).is_err());
    }

    #[test]
    fn invalid_id_rejected() {
        assert!(parse_canvas(r#"<div data-card-id="a b"></div>"#).is_err());
    }

    #[test]
    fn single_quoted_and_bare_attributes() {
        let doc = parse_canvas(r#"<div data-card-id='p_sq' left=5px top = '6px'></div>"#).unwrap();
        assert_eq!(doc.cards[0].position(), Point::new(5.0, 6.0));
    }

    #[test]
    fn text_content_strips_and_decodes() {
        assert_eq!(
            text_content("a<br>b &amp; c<div>d</div>&lt;e&gt;&#65;&#x42;"),
            "a\nb & cd\n<e>AB"
        );
        assert_eq!(text_content("5 & 6"), "5 & 6");
    }
}
