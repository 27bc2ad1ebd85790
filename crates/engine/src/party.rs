use serde::{Deserialize, Serialize};

use partygrid_core::{PartyGrid, RemotePartyId, UserId};
use partygrid_storage::PartyDetails;

/// Server-side identity of a persisted party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParty {
    pub id: RemotePartyId,
    pub shortcode: String,
    pub owner: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    /// Not created remotely yet.
    Unsaved,
    /// Editable by whoever holds the edit key.
    Anonymous,
    User(UserId),
}

impl Ownership {
    pub fn of(remote: Option<&RemoteParty>) -> Self {
        match remote {
            None => Self::Unsaved,
            Some(RemoteParty { owner: Some(user), .. }) => Self::User(user.clone()),
            Some(_) => Self::Anonymous,
        }
    }
}

/// Read-only view of the party being edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub details: PartyDetails,
    pub ownership: Ownership,
    pub remote: Option<RemoteParty>,
    pub grid: PartyGrid,
}
