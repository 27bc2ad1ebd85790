use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use partygrid_core::{GridItemId, RemoteItemId, SessionId};
use partygrid_storage::{
    Authorization, BearerToken, Credentials, EditKey, PartyBackend, PartyDetails, RemoteOp,
    StorageError,
};

use crate::error::SyncFailure;
use crate::mutation::{GridMutation, Lane};
use crate::party::RemoteParty;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReport {
    /// Every call in the batch succeeded. Removals of items the server never
    /// saw are not counted.
    Applied { calls: usize },
    /// The party was reset or destroyed before the batch finished.
    Discarded,
}

/// Outcome of one batch of remote writes.
///
/// Dropping the handle does not cancel the writes.
#[must_use = "sync failures are only reported through the handle"]
#[derive(Debug)]
pub struct SyncHandle {
    task: JoinHandle<Result<SyncReport, SyncFailure>>,
}

impl SyncHandle {
    pub async fn settled(self) -> Result<SyncReport, SyncFailure> {
        self.task
            .await
            .map_err(|e| SyncFailure::Aborted(e.to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Everything tied to one party. Replaced wholesale on reset, so late
/// responses can only ever write into the session that issued them.
struct Session {
    id: SessionId,
    alive: Cell<bool>,
    party: OnceCell<RemoteParty>,
    edit_key: RefCell<Option<EditKey>>,
    details: RefCell<PartyDetails>,
    remote_ids: RefCell<HashMap<GridItemId, RemoteItemId>>,
    tails: RefCell<HashMap<Lane, watch::Receiver<()>>>,
}

impl Session {
    fn new(party: Option<RemoteParty>, edit_key: Option<EditKey>, details: PartyDetails) -> Self {
        Self {
            id: SessionId::new(),
            alive: Cell::new(true),
            party: OnceCell::new_with(party),
            edit_key: RefCell::new(edit_key),
            details: RefCell::new(details),
            remote_ids: RefCell::new(HashMap::new()),
            tails: RefCell::new(HashMap::new()),
        }
    }
}

enum Work {
    Items(Vec<GridMutation>),
    Details(PartyDetails),
}

impl Work {
    fn lanes(&self) -> BTreeSet<Lane> {
        match self {
            Self::Items(batch) => batch.iter().map(GridMutation::lane).collect(),
            Self::Details(_) => BTreeSet::from([Lane::Details]),
        }
    }
}

/// Replays grid mutation batches against a [`PartyBackend`] after they were
/// applied locally. Failures never roll the local grid back.
///
/// Ordering is kept per [`Lane`]: a batch waits for the previous batch on each
/// lane it touches, and nothing else. Tasks are spawned on the current thread,
/// so the coordinator must be driven from inside a [`tokio::task::LocalSet`].
pub struct SyncCoordinator<B> {
    backend: Rc<B>,
    bearer: Option<BearerToken>,
    session: Rc<Session>,
}

impl<B: PartyBackend + 'static> SyncCoordinator<B> {
    /// Start with an unsaved party. Only the bearer token of `credentials`
    /// is used; a new party gets its own edit key at creation.
    pub fn new(backend: Rc<B>, credentials: &Credentials) -> Self {
        Self {
            backend,
            bearer: credentials.bearer.clone(),
            session: Rc::new(Session::new(None, None, PartyDetails::default())),
        }
    }

    /// Attach to a party that already exists remotely.
    pub fn resume(
        &mut self,
        party: RemoteParty,
        edit_key: Option<EditKey>,
        details: PartyDetails,
        remote_ids: HashMap<GridItemId, RemoteItemId>,
    ) {
        let session = Session::new(Some(party), edit_key, details);
        *session.remote_ids.borrow_mut() = remote_ids;
        self.replace_session(session);
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id
    }

    pub fn backend(&self) -> &Rc<B> {
        &self.backend
    }

    pub fn remote_party(&self) -> Option<RemoteParty> {
        self.session.party.get().cloned()
    }

    pub fn edit_key(&self) -> Option<EditKey> {
        self.session.edit_key.borrow().clone()
    }

    pub fn details(&self) -> PartyDetails {
        self.session.details.borrow().clone()
    }

    pub fn remote_item_id(&self, item: GridItemId) -> Option<RemoteItemId> {
        self.session.remote_ids.borrow().get(&item).cloned()
    }

    /// Send one store batch. Must be called from inside a `LocalSet`.
    pub fn submit(&self, batch: Vec<GridMutation>) -> SyncHandle {
        self.spawn(Work::Items(batch))
    }

    pub fn submit_details(&self, details: PartyDetails) -> SyncHandle {
        *self.session.details.borrow_mut() = details.clone();
        self.spawn(Work::Details(details))
    }

    /// Drop the current party without touching the server. Responses still
    /// in flight are discarded.
    pub fn reset(&mut self) {
        self.replace_session(Session::new(None, None, PartyDetails::default()));
    }

    /// Delete the current party remotely, if it was ever saved, and start
    /// over with an unsaved one.
    ///
    /// A creation still in flight at this point is not waited for; the party
    /// it makes is left behind on the server.
    pub async fn destroy(&mut self) -> Result<(), SyncFailure> {
        let party = self.remote_party();
        let credentials = Credentials { bearer: self.bearer.clone(), edit_key: self.edit_key() };
        self.reset();

        let Some(party) = party else {
            return Ok(());
        };
        let failure = |source| SyncFailure::Remote { op: RemoteOp::DestroyParty, lane: None, source };
        let auth = credentials.authorization().ok_or_else(|| failure(missing_credentials()))?;
        self.backend.destroy_party(&auth, &party.id).await.map_err(failure)?;
        info!(party = %party.id, "party destroyed");
        Ok(())
    }

    fn replace_session(&mut self, session: Session) {
        self.session.alive.set(false);
        debug!(old = %self.session.id, new = %session.id, "sync session replaced");
        self.session = Rc::new(session);
    }

    fn spawn(&self, work: Work) -> SyncHandle {
        // Lane order is reserved here, synchronously, so batches queue in
        // the order they were submitted.
        let (done, tail) = watch::channel(());
        let predecessors: Vec<watch::Receiver<()>> = {
            let mut tails = self.session.tails.borrow_mut();
            work.lanes()
                .into_iter()
                .filter_map(|lane| tails.insert(lane, tail.clone()))
                .collect()
        };

        let task = Task {
            backend: Rc::clone(&self.backend),
            bearer: self.bearer.clone(),
            session: Rc::clone(&self.session),
        };
        let handle = tokio::task::spawn_local(async move {
            for mut previous in predecessors {
                // Err means the predecessor finished, which is all we wait for.
                let _ = previous.changed().await;
            }
            let result = task.run(work).await;
            drop(done);
            result
        });
        SyncHandle { task: handle }
    }
}

struct Task<B> {
    backend: Rc<B>,
    bearer: Option<BearerToken>,
    session: Rc<Session>,
}

impl<B: PartyBackend> Task<B> {
    fn live(&self) -> bool {
        self.session.alive.get()
    }

    async fn run(&self, work: Work) -> Result<SyncReport, SyncFailure> {
        let result = self.execute(work).await;
        match &result {
            Ok(SyncReport::Discarded) => {
                debug!(session = %self.session.id, "stale sync result discarded");
            }
            Ok(SyncReport::Applied { calls }) => {
                debug!(session = %self.session.id, calls, "batch synced");
            }
            Err(failure) => {
                warn!(session = %self.session.id, error = %failure, "sync failed");
            }
        }
        result
    }

    async fn execute(&self, work: Work) -> Result<SyncReport, SyncFailure> {
        if !self.live() {
            return Ok(SyncReport::Discarded);
        }
        let party = self.ensure_party().await;
        if !self.live() {
            return Ok(SyncReport::Discarded);
        }
        let party = party?;

        match work {
            Work::Details(details) => {
                let failure =
                    |source| SyncFailure::Remote { op: RemoteOp::UpdateParty, lane: Some(Lane::Details), source };
                let auth = self.authorization().map_err(failure)?;
                let result = self.backend.update_party(&auth, &party.id, &details).await;
                if !self.live() {
                    return Ok(SyncReport::Discarded);
                }
                result.map_err(failure)?;
                Ok(SyncReport::Applied { calls: 1 })
            }
            Work::Items(batch) => {
                let mut calls = 0;
                for mutation in &batch {
                    let sent = self.send(&party, mutation).await;
                    if !self.live() {
                        return Ok(SyncReport::Discarded);
                    }
                    calls += sent?;
                }
                Ok(SyncReport::Applied { calls })
            }
        }
    }

    /// The remote party, created on first use. Concurrent first batches share
    /// one creation; a failed creation is retried by the next batch.
    async fn ensure_party(&self) -> Result<RemoteParty, SyncFailure> {
        self.session
            .party
            .get_or_try_init(|| self.create_party())
            .await
            .cloned()
            .map_err(|source| SyncFailure::Remote { op: RemoteOp::CreateParty, lane: None, source })
    }

    async fn create_party(&self) -> Result<RemoteParty, StorageError> {
        let auth = self.bearer.clone().map(Authorization::Bearer);
        let details = self.session.details.borrow().clone();
        let created = self.backend.create_party(auth.as_ref(), &details).await?;
        info!(
            party = %created.id,
            shortcode = %created.shortcode,
            anonymous = created.owner.is_none(),
            "party created"
        );
        *self.session.edit_key.borrow_mut() = created.edit_key;
        Ok(RemoteParty { id: created.id, shortcode: created.shortcode, owner: created.owner })
    }

    fn authorization(&self) -> Result<Authorization, StorageError> {
        let credentials = Credentials {
            bearer: self.bearer.clone(),
            edit_key: self.session.edit_key.borrow().clone(),
        };
        credentials.authorization().ok_or_else(missing_credentials)
    }

    /// Send one mutation, returning the number of remote calls made.
    async fn send(&self, party: &RemoteParty, mutation: &GridMutation) -> Result<usize, SyncFailure> {
        let failure = |source| SyncFailure::Remote { op: mutation.op(), lane: Some(mutation.lane()), source };

        match mutation {
            GridMutation::Add { item_id, item } => {
                let auth = self.authorization().map_err(failure)?;
                let remote = self.backend.add_item(&auth, &party.id, item).await.map_err(failure)?;
                self.session.remote_ids.borrow_mut().insert(*item_id, remote);
                Ok(1)
            }
            GridMutation::Remove { item_id, kind, position } => {
                let Some(remote) = self.remote_id(*item_id) else {
                    debug!(%kind, position, item = %item_id, "removed item was never saved");
                    return Ok(0);
                };
                let auth = self.authorization().map_err(failure)?;
                self.backend
                    .remove_item(&auth, &party.id, *kind, &remote)
                    .await
                    .map_err(failure)?;
                self.session.remote_ids.borrow_mut().remove(item_id);
                Ok(1)
            }
            GridMutation::Update { item_id, kind, patch, .. } => {
                let remote = self
                    .remote_id(*item_id)
                    .ok_or(SyncFailure::NotPersisted { kind: *kind, item_id: *item_id })?;
                let auth = self.authorization().map_err(failure)?;
                self.backend
                    .update_item(&auth, &party.id, *kind, &remote, patch)
                    .await
                    .map_err(failure)?;
                Ok(1)
            }
        }
    }

    fn remote_id(&self, item: GridItemId) -> Option<RemoteItemId> {
        self.session.remote_ids.borrow().get(&item).cloned()
    }
}

fn missing_credentials() -> StorageError {
    StorageError::Unauthorized("no bearer token or edit key for this party".into())
}
