use thiserror::Error;

use crate::slot::GridKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("slot {position} is outside the {kind} grid")]
    OutOfRange { kind: GridKind, position: i32 },

    #[error("invalid uncap level {requested} (max {max})")]
    InvalidUncapLevel { requested: i32, max: u8 },

    #[error("invalid transcendence step {requested} (max {max})")]
    InvalidTranscendenceStep { requested: i32, max: u8 },

    #[error("no {kind} in slot {position}")]
    EmptySlot { kind: GridKind, position: i32 },

    #[error("{kind} slots do not take an element")]
    ElementNotSupported { kind: GridKind },

    #[error("unknown catalog id: {0}")]
    UnknownCatalogId(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
