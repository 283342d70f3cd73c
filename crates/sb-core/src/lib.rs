pub mod clamp;
pub mod config;
pub mod emitter;
pub mod error;
pub mod id;
pub mod model;
pub mod parser;
pub mod snapshot;

pub use clamp::{clamp_position, clamp_with_margin};
pub use config::{BoardConfig, StoreConfig};
pub use emitter::emit_document;
pub use error::StoreError;
pub use id::CardId;
pub use model::*;
pub use parser::{parse_canvas, text_content};
pub use snapshot::{DefaultReason, RestoreOutcome, Snapshot, StoreRecord};
