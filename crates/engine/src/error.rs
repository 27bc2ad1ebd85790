use partygrid_core::{CoreError, GridItemId, GridKind};
use partygrid_storage::{RemoteOp, StorageError};
use thiserror::Error;

use crate::mutation::Lane;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("conflict not found: {0}")]
    ConflictNotFound(String),

    #[error("{kind} slot {position} is already taken")]
    SlotTaken { kind: GridKind, position: i32 },

    #[error("stored party breaks grid rules: {0}")]
    InvalidRecord(String),
}

/// A remote write that did not land. The local edit it belongs to stays
/// applied.
#[derive(Debug, Error)]
pub enum SyncFailure {
    #[error("remote {op} failed: {source}")]
    Remote {
        op: RemoteOp,
        /// `None` for party-level calls such as creation.
        lane: Option<Lane>,
        source: StorageError,
    },

    #[error("{kind} item {item_id} was never saved remotely")]
    NotPersisted { kind: GridKind, item_id: GridItemId },

    #[error("sync task aborted: {0}")]
    Aborted(String),
}

impl SyncFailure {
    pub fn op(&self) -> Option<RemoteOp> {
        match self {
            Self::Remote { op, .. } => Some(*op),
            Self::NotPersisted { .. } => Some(RemoteOp::UpdateItem),
            Self::Aborted(_) => None,
        }
    }
}
