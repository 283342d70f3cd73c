//! Card identity.
//!
//! A card's id is the value of its `data-card-id` attribute. Ids are interned
//! once per process so the board can key its maps, z-order and mutation
//! records by a `Copy` handle instead of a string.

use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

static CARD_IDS: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Numeric suffix of the next id handed out by `CardId::fresh`.
static NEXT_CARD: AtomicU64 = AtomicU64::new(0);

/// Handle to a card's `data-card-id` value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardId(Spur);

impl CardId {
    /// The id for `tag`, registering it on first sight. Used when cards are
    /// parsed from stored or default markup.
    pub fn intern(tag: &str) -> Self {
        CardId(CARD_IDS.get_or_intern(tag))
    }

    /// The id for `tag` if some card already carries it.
    ///
    /// Event targets hand back whatever `data-card-id` the DOM holds, so a
    /// lookup must not grow the table.
    pub fn lookup(tag: &str) -> Option<Self> {
        CARD_IDS.get(tag).map(CardId)
    }

    /// The attribute value.
    pub fn as_str(&self) -> &str {
        CARD_IDS.resolve(&self.0)
    }

    /// A `card_<n>` id for a card created from the menu. Restored markup may
    /// already use the same tag; `Board::fresh_id` skips those.
    pub fn fresh() -> Self {
        let n = NEXT_CARD.fetch_add(1, Ordering::Relaxed);
        Self::intern(&format!("card_{n}"))
    }

    /// Whether `tag` can sit inside a quoted `data-card-id` attribute and an
    /// attribute selector without escaping: ASCII letters, digits, `_`, `-`.
    pub fn is_valid(tag: &str) -> bool {
        !tag.is_empty()
            && tag
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }
}

impl fmt::Debug for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardId({})", self.as_str())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CardId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(CardId::intern(&tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_tag_same_card() {
        let a = CardId::intern("note_a");
        assert_eq!(a, CardId::intern("note_a"));
        assert_ne!(a, CardId::intern("note_b"));
        assert_eq!(a.to_string(), "note_a");
    }

    #[test]
    fn menu_cards_get_distinct_ids() {
        let a = CardId::fresh();
        let b = CardId::fresh();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("card_"));
        assert!(CardId::is_valid(b.as_str()));
    }

    #[test]
    fn unknown_event_tags_stay_unknown() {
        assert!(CardId::lookup("tag_from_some_other_widget").is_none());
        assert!(CardId::lookup("tag_from_some_other_widget").is_none());
        let id = CardId::intern("tag_on_a_card");
        assert_eq!(CardId::lookup("tag_on_a_card"), Some(id));
    }

    #[test]
    fn attribute_safe_tags() {
        assert!(CardId::is_valid("card_12"));
        assert!(CardId::is_valid("Note-7"));
        assert!(!CardId::is_valid(""));
        assert!(!CardId::is_valid("a\"b"));
        assert!(!CardId::is_valid("a b"));
        assert!(!CardId::is_valid("é"));
    }

    #[test]
    fn serializes_as_the_tag() {
        let id = CardId::intern("wire_card");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""wire_card""#);
        let back: CardId = serde_json::from_str(r#""wire_card""#).unwrap();
        assert_eq!(back, id);
    }
}
