pub mod conflict;
pub mod error;
pub mod mutation;
pub mod party;
pub mod store;
pub mod sync;

pub use conflict::{ConflictSet, ConflictStatus, Exclusive};
pub use error::{EngineError, SyncFailure};
pub use mutation::{GridChange, GridMutation, Lane};
pub use party::{Ownership, Party, RemoteParty};
pub use store::{GridStore, PlaceOutcome, Resolution, TRACKED_CONFLICTS};
pub use sync::{SyncCoordinator, SyncHandle, SyncReport};

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use tracing::info;

use partygrid_core::{
    Catalog, ConflictRules, CoreError, Element, GridItem, GridItemId, GridKind, PartyGrid,
    UpgradeState,
};
use partygrid_storage::{Credentials, ItemRecord, PartyBackend, PartyDetails};

use crate::store::with_kind;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorConfig {
    pub rules: ConflictRules,
}

impl EditorConfig {
    /// Read the weapon exclusion rules from a JSON file.
    pub fn load(rules_path: impl AsRef<Path>) -> Result<Self, CoreError> {
        Ok(Self { rules: ConflictRules::load(rules_path)? })
    }
}

/// Result of a local edit. The edit is already visible in the grid; `sync`
/// settles once the server has caught up, and is `None` when nothing had to
/// be sent.
#[must_use]
#[derive(Debug)]
pub struct Edit<T> {
    pub outcome: T,
    pub sync: Option<SyncHandle>,
}

/// Entry point for UI collaborators: owns the grid store of one party and
/// the coordinator that persists it.
pub struct PartyEditor<B: PartyBackend + 'static> {
    store: GridStore,
    sync: SyncCoordinator<B>,
}

impl<B: PartyBackend + 'static> PartyEditor<B> {
    /// Start a new, unsaved party. It is created remotely on its first edit.
    pub fn new(backend: Rc<B>, credentials: Credentials, config: EditorConfig) -> Self {
        Self {
            store: GridStore::new(config.rules),
            sync: SyncCoordinator::new(backend, &credentials),
        }
    }

    /// Load a saved party by shortcode. Every stored item must resolve in
    /// `catalog` and satisfy the grid rules.
    pub async fn open(
        backend: Rc<B>,
        credentials: Credentials,
        config: EditorConfig,
        catalog: &dyn Catalog,
        shortcode: &str,
    ) -> Result<Self, EngineError> {
        let record = backend.fetch_party(shortcode).await?;
        let mut store = GridStore::new(config.rules);
        let mut remote_ids = HashMap::new();
        for item in &record.items {
            let local = with_kind!(item.kind, T => restore_record::<T>(&mut store, catalog, item))?;
            remote_ids.insert(local, item.id.clone());
        }

        let mut sync = SyncCoordinator::new(backend, &credentials);
        let remote = RemoteParty { id: record.id, shortcode: record.shortcode, owner: record.owner };
        info!(party = %remote.id, items = remote_ids.len(), "party opened");
        sync.resume(remote, credentials.edit_key, record.details, remote_ids);
        Ok(Self { store, sync })
    }

    pub fn grid(&self) -> &PartyGrid {
        self.store.grid()
    }

    pub fn store(&self) -> &GridStore {
        &self.store
    }

    pub fn coordinator(&self) -> &SyncCoordinator<B> {
        &self.sync
    }

    pub fn party(&self) -> Party {
        let remote = self.sync.remote_party();
        Party {
            details: self.sync.details(),
            ownership: Ownership::of(remote.as_ref()),
            remote,
            grid: self.store.snapshot(),
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&GridChange, &PartyGrid) + 'static) {
        self.store.subscribe(observer);
    }

    // ========================================================================
    // Grid edits
    // ========================================================================

    pub fn place<T: Exclusive>(
        &mut self,
        object: T,
        position: i32,
    ) -> Result<Edit<PlaceOutcome<T>>, CoreError> {
        let outcome = self.store.place(object, position)?;
        Ok(self.flush(outcome))
    }

    pub fn resolve_conflict<T: Exclusive>(
        &mut self,
        set: &ConflictSet<T>,
        keep_incoming: bool,
    ) -> Result<Edit<Resolution<T>>, EngineError> {
        let outcome = self.store.resolve_conflict(set, keep_incoming)?;
        Ok(self.flush(outcome))
    }

    pub fn remove(
        &mut self,
        kind: GridKind,
        position: i32,
    ) -> Result<Edit<Option<GridItemId>>, CoreError> {
        let outcome = self.store.remove(kind, position)?;
        Ok(self.flush(outcome))
    }

    pub fn update_uncap(
        &mut self,
        kind: GridKind,
        position: i32,
        level: i32,
    ) -> Result<Edit<UpgradeState>, CoreError> {
        let outcome = self.store.update_uncap(kind, position, level)?;
        Ok(self.flush(outcome))
    }

    pub fn update_transcendence(
        &mut self,
        kind: GridKind,
        position: i32,
        step: i32,
    ) -> Result<Edit<UpgradeState>, CoreError> {
        let outcome = self.store.update_transcendence(kind, position, step)?;
        Ok(self.flush(outcome))
    }

    pub fn update_element(
        &mut self,
        kind: GridKind,
        position: i32,
        element: Element,
    ) -> Result<Edit<()>, CoreError> {
        self.store.update_element(kind, position, element)?;
        Ok(self.flush(()))
    }

    fn flush<O>(&mut self, outcome: O) -> Edit<O> {
        let batch = self.store.drain_mutations();
        let sync = (!batch.is_empty()).then(|| self.sync.submit(batch));
        Edit { outcome, sync }
    }

    // ========================================================================
    // Party lifecycle
    // ========================================================================

    pub fn update_details(&mut self, details: PartyDetails) -> SyncHandle {
        self.sync.submit_details(details)
    }

    /// Start a fresh unsaved party. Nothing is deleted remotely.
    pub fn reset(&mut self) {
        self.store.clear();
        self.sync.reset();
    }

    /// Delete the party remotely and start a fresh one. The local grid is
    /// cleared even if the remote call fails.
    pub async fn destroy(&mut self) -> Result<(), SyncFailure> {
        self.store.clear();
        self.sync.destroy().await
    }
}

fn restore_record<T: Exclusive>(
    store: &mut GridStore,
    catalog: &dyn Catalog,
    record: &ItemRecord,
) -> Result<GridItemId, EngineError> {
    let object = T::lookup(catalog, &record.catalog_id)
        .ok_or_else(|| CoreError::UnknownCatalogId(record.catalog_id.to_string()))?;
    let mut item = GridItem::new(object, record.position);
    item.uncap_level = record.uncap_level;
    item.transcendence_step = record.transcendence_step;
    item.element = record.element;
    store.restore(item)
}
