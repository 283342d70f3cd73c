//! Snapshot wire types shared by the UI and the persistence context.
//!
//! Two message shapes cross the channel: a captured canvas payload and the
//! reset tombstone. Both are stored under a single fixed key, last write
//! wins.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// A serialized copy of the canvas markup plus the reset flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub payload: String,
    pub is_reset_signal: bool,
}

impl Snapshot {
    /// Snapshot of the current canvas markup: newlines stripped, trimmed.
    pub fn capture(markup: &str) -> Self {
        Self {
            payload: markup.replace('\n', "").trim().to_string(),
            is_reset_signal: false,
        }
    }

    /// The logical tombstone: treat stored data as absent on next restore.
    pub fn reset() -> Self {
        Self {
            payload: String::new(),
            is_reset_signal: true,
        }
    }

    pub fn encode(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a channel message. A reset message never carries a payload,
    /// whatever the sender put in it.
    pub fn decode(raw: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot = serde_json::from_str(raw)?;
        Ok(snapshot.normalized())
    }

    fn normalized(self) -> Self {
        if self.is_reset_signal {
            Self::reset()
        } else {
            self
        }
    }
}

/// The single persisted row: `{ id, data: { payload, isResetSignal } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: String,
    pub data: Snapshot,
}

impl StoreRecord {
    pub fn new(key: impl Into<String>, data: Snapshot) -> Self {
        Self {
            id: key.into(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored row. Anything missing the expected fields is `None`.
    pub fn decode(raw: &str) -> Option<Self> {
        let record: StoreRecord = serde_json::from_str(raw).ok()?;
        Some(Self {
            data: record.data.normalized(),
            ..record
        })
    }
}

// ─── Restore ─────────────────────────────────────────────────────────────

/// Why restore fell back to the default canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultReason {
    /// Nothing stored under the key.
    Absent,
    /// The stored record is the reset tombstone.
    Reset,
    /// A record is present but is not a well-formed `StoreRecord`.
    Malformed,
    /// The read itself failed.
    Unavailable,
}

/// What the startup read decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Replace the canvas markup with this payload.
    Apply(String),
    /// Keep the built-in default markup.
    Default(DefaultReason),
}

impl RestoreOutcome {
    /// Decide from the raw result of reading `key`.
    pub fn from_read(read: Result<Option<String>, StoreError>, key: &str) -> Self {
        let raw = match read {
            Ok(Some(raw)) => raw,
            Ok(None) => return RestoreOutcome::Default(DefaultReason::Absent),
            Err(err) => {
                log::warn!("restore read failed: {err}");
                return RestoreOutcome::Default(DefaultReason::Unavailable);
            }
        };
        match StoreRecord::decode(&raw) {
            Some(record) if record.id != key => {
                log::warn!("stored record has unexpected key {:?}", record.id);
                RestoreOutcome::Default(DefaultReason::Malformed)
            }
            Some(record) if record.data.is_reset_signal => {
                RestoreOutcome::Default(DefaultReason::Reset)
            }
            Some(record) => RestoreOutcome::Apply(record.data.payload),
            None => {
                log::warn!("stored record is malformed, using default canvas");
                RestoreOutcome::Default(DefaultReason::Malformed)
            }
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, RestoreOutcome::Apply(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: &str = "data-view-key";

    fn stored(snapshot: Snapshot) -> Result<Option<String>, StoreError> {
        StoreRecord::new(KEY, snapshot).to_json().map(Some)
    }

    #[test]
    fn capture_strips_newlines_and_trims() {
        let s = Snapshot::capture("  <div>\nX\n</div>\n  ");
        assert_eq!(s.payload, "<div>X</div>");
        assert!(!s.is_reset_signal);
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let json = Snapshot::capture("<div>X</div>").encode().unwrap();
        assert_eq!(json, r#"{"payload":"<div>X</div>","isResetSignal":false}"#);
        let record = StoreRecord::new(KEY, Snapshot::reset()).to_json().unwrap();
        assert_eq!(
            record,
            r#"{"id":"data-view-key","data":{"payload":"","isResetSignal":true}}"#
        );
    }

    #[test]
    fn reset_message_drops_payload() {
        let s = Snapshot::decode(r#"{"payload":"<div>old</div>","isResetSignal":true}"#).unwrap();
        assert_eq!(s, Snapshot::reset());
    }

    #[test]
    fn decode_rejects_missing_fields() {
        assert!(Snapshot::decode(r#"{"payload":"x"}"#).is_err());
        assert!(StoreRecord::decode(r#"{"id":"k"}"#).is_none());
        assert!(StoreRecord::decode("not json").is_none());
    }

    #[test]
    fn restore_applies_live_record() {
        let outcome = RestoreOutcome::from_read(stored(Snapshot::capture("<div>X</div>")), KEY);
        assert_eq!(outcome, RestoreOutcome::Apply("<div>X</div>".into()));
    }

    #[test]
    fn restore_falls_back_on_every_failure() {
        assert_eq!(
            RestoreOutcome::from_read(Ok(None), KEY),
            RestoreOutcome::Default(DefaultReason::Absent)
        );
        assert_eq!(
            RestoreOutcome::from_read(stored(Snapshot::reset()), KEY),
            RestoreOutcome::Default(DefaultReason::Reset)
        );
        assert_eq!(
            RestoreOutcome::from_read(Ok(Some(r#"{"id":"data-view-key"}"#.into())), KEY),
            RestoreOutcome::Default(DefaultReason::Malformed)
        );
        assert_eq!(
            RestoreOutcome::from_read(Err(StoreError::Request("aborted".into())), KEY),
            RestoreOutcome::Default(DefaultReason::Unavailable)
        );
    }

    #[test]
    fn tombstone_with_stale_payload_is_not_applied() {
        let raw = r#"{"id":"data-view-key","data":{"payload":"<div>stale</div>","isResetSignal":true}}"#;
        assert_eq!(
            RestoreOutcome::from_read(Ok(Some(raw.into())), KEY),
            RestoreOutcome::Default(DefaultReason::Reset)
        );
    }
}
