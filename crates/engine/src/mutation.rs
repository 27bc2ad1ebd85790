use std::fmt;

use partygrid_core::{GridItemId, GridKind};
use partygrid_storage::{ItemPatch, NewGridItem, RemoteOp};

/// Unit of remote ordering. Writes on the same lane reach the server in
/// the order they were issued; different lanes do not wait on each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lane {
    Details,
    Slot { kind: GridKind, position: i32 },
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Details => f.write_str("details"),
            Self::Slot { kind, position } => write!(f, "{kind}[{position}]"),
        }
    }
}

/// A grid change waiting to be sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridMutation {
    Add {
        item_id: GridItemId,
        item: NewGridItem,
    },
    Remove {
        item_id: GridItemId,
        kind: GridKind,
        position: i32,
    },
    Update {
        item_id: GridItemId,
        kind: GridKind,
        position: i32,
        patch: ItemPatch,
    },
}

impl GridMutation {
    pub fn lane(&self) -> Lane {
        match self {
            Self::Add { item, .. } => Lane::Slot { kind: item.kind, position: item.position },
            Self::Remove { kind, position, .. } | Self::Update { kind, position, .. } => {
                Lane::Slot { kind: *kind, position: *position }
            }
        }
    }

    pub fn op(&self) -> RemoteOp {
        match self {
            Self::Add { .. } => RemoteOp::AddItem,
            Self::Remove { .. } => RemoteOp::RemoveItem,
            Self::Update { .. } => RemoteOp::UpdateItem,
        }
    }

    pub fn item_id(&self) -> GridItemId {
        match self {
            Self::Add { item_id, .. } | Self::Remove { item_id, .. } | Self::Update { item_id, .. } => *item_id,
        }
    }
}

/// What observers are told after the store applies a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridChange {
    Placed { kind: GridKind, position: i32, item_id: GridItemId },
    Removed { kind: GridKind, position: i32, item_id: GridItemId },
    Updated { kind: GridKind, position: i32, item_id: GridItemId },
    Cleared,
}

impl From<&GridMutation> for GridChange {
    fn from(mutation: &GridMutation) -> Self {
        match mutation {
            GridMutation::Add { item_id, item } => Self::Placed {
                kind: item.kind,
                position: item.position,
                item_id: *item_id,
            },
            GridMutation::Remove { item_id, kind, position } => Self::Removed {
                kind: *kind,
                position: *position,
                item_id: *item_id,
            },
            GridMutation::Update { item_id, kind, position, .. } => Self::Updated {
                kind: *kind,
                position: *position,
                item_id: *item_id,
            },
        }
    }
}
