use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use partygrid_core::{
    catalog::Element,
    ids::*,
    slot::GridKind,
};

use crate::error::StorageError;

/// Session token of a signed-in user.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BearerToken(String);

/// Opaque secret that grants edit rights on an anonymous party.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditKey(String);

macro_rules! secret {
    ($name:ident) => {
        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn expose(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(..)", stringify!($name))
            }
        }
    };
}

secret!(BearerToken);
secret!(EditKey);

/// The credential attached to one remote call. Never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Bearer(BearerToken),
    EditKey(EditKey),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub bearer: Option<BearerToken>,
    pub edit_key: Option<EditKey>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(token: BearerToken) -> Self {
        Self { bearer: Some(token), edit_key: None }
    }

    /// The bearer token wins when both are present.
    pub fn authorization(&self) -> Option<Authorization> {
        match (&self.bearer, &self.edit_key) {
            (Some(token), _) => Some(Authorization::Bearer(token.clone())),
            (None, Some(key)) => Some(Authorization::EditKey(key.clone())),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    CreateParty,
    FetchParty,
    UpdateParty,
    DestroyParty,
    AddItem,
    RemoveItem,
    UpdateItem,
}

impl RemoteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateParty => "create_party",
            Self::FetchParty => "fetch_party",
            Self::UpdateParty => "update_party",
            Self::DestroyParty => "destroy_party",
            Self::AddItem => "add_item",
            Self::RemoveItem => "remove_item",
            Self::UpdateItem => "update_item",
        }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDetails {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedParty {
    pub id: RemotePartyId,
    pub shortcode: String,
    /// Only issued for anonymous parties.
    pub edit_key: Option<EditKey>,
    pub owner: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGridItem {
    pub kind: GridKind,
    pub catalog_id: CatalogId,
    pub position: i32,
    pub uncap_level: u8,
    pub transcendence_step: u8,
    pub element: Option<Element>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub uncap_level: Option<u8>,
    pub transcendence_step: Option<u8>,
    pub element: Option<Element>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.uncap_level.is_none() && self.transcendence_step.is_none() && self.element.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: RemoteItemId,
    pub kind: GridKind,
    pub catalog_id: CatalogId,
    pub position: i32,
    pub uncap_level: u8,
    pub transcendence_step: u8,
    pub element: Option<Element>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRecord {
    pub id: RemotePartyId,
    pub shortcode: String,
    pub details: PartyDetails,
    pub owner: Option<UserId>,
    pub items: Vec<ItemRecord>,
}

/// Remote persistence for parties and their grid items.
///
/// Calls are issued from a single-threaded event loop, so implementations
/// need not be `Send`.
#[async_trait(?Send)]
pub trait PartyBackend {
    /// `auth` is a bearer token for a user-owned party, `None` for an
    /// anonymous one (which gets an edit key back).
    async fn create_party(
        &self,
        auth: Option<&Authorization>,
        details: &PartyDetails,
    ) -> Result<CreatedParty, StorageError>;

    async fn fetch_party(&self, shortcode: &str) -> Result<PartyRecord, StorageError>;

    async fn update_party(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        details: &PartyDetails,
    ) -> Result<(), StorageError>;

    async fn destroy_party(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
    ) -> Result<(), StorageError>;

    async fn add_item(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        item: &NewGridItem,
    ) -> Result<RemoteItemId, StorageError>;

    async fn remove_item(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        kind: GridKind,
        item: &RemoteItemId,
    ) -> Result<(), StorageError>;

    async fn update_item(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        kind: GridKind,
        item: &RemoteItemId,
        patch: &ItemPatch,
    ) -> Result<(), StorageError>;
}
