use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio::sync::Semaphore;

use partygrid_core::{GridKind, RemoteItemId, RemotePartyId, UserId};
use partygrid_storage::{
    Authorization, BearerToken, CreatedParty, ItemPatch, NewGridItem, PartyBackend, PartyDetails,
    PartyRecord, RemoteOp, SqliteBackend, StorageError,
};

/// One call as it reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: RemoteOp,
    /// The slot written, for item calls on items the server knows.
    pub slot: Option<(GridKind, i32)>,
    pub ok: bool,
}

/// SQLite backend with failure injection and call gating, for driving the
/// sync coordinator through slow and flaky remote conditions.
pub struct TestBackend {
    inner: SqliteBackend,
    faults: RefCell<HashMap<RemoteOp, usize>>,
    gates: RefCell<HashMap<RemoteOp, Rc<Semaphore>>>,
    waiting: RefCell<HashMap<RemoteOp, usize>>,
    calls: RefCell<Vec<Call>>,
}

impl TestBackend {
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self::wrap(SqliteBackend::open_in_memory()?))
    }

    pub fn open(path: &str) -> Result<Self, StorageError> {
        Ok(Self::wrap(SqliteBackend::open(path)?))
    }

    fn wrap(inner: SqliteBackend) -> Self {
        Self {
            inner,
            faults: RefCell::new(HashMap::new()),
            gates: RefCell::new(HashMap::new()),
            waiting: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &SqliteBackend {
        &self.inner
    }

    pub fn register_user(&self, name: &str, token: &BearerToken) -> Result<UserId, StorageError> {
        self.inner.register_user(name, token)
    }

    /// Make the next `count` calls of `op` fail with `Unavailable`.
    pub fn fail_next(&self, op: RemoteOp, count: usize) {
        *self.faults.borrow_mut().entry(op).or_default() += count;
    }

    /// Park every following call of `op` until released.
    pub fn hold(&self, op: RemoteOp) {
        self.gates.borrow_mut().insert(op, Rc::new(Semaphore::new(0)));
    }

    /// Let `count` parked (or future) calls of `op` through.
    pub fn release(&self, op: RemoteOp, count: usize) {
        if let Some(gate) = self.gates.borrow().get(&op) {
            gate.add_permits(count);
        }
    }

    /// Stop holding `op` and let every parked call through.
    pub fn open_gate(&self, op: RemoteOp) {
        if let Some(gate) = self.gates.borrow_mut().remove(&op) {
            gate.close();
        }
    }

    pub fn waiting(&self, op: RemoteOp) -> usize {
        self.waiting.borrow().get(&op).copied().unwrap_or(0)
    }

    /// Yield to other local tasks until `count` calls of `op` are parked.
    pub async fn until_waiting(&self, op: RemoteOp, count: usize) {
        while self.waiting(op) < count {
            tokio::task::yield_now().await;
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, op: RemoteOp) -> usize {
        self.calls.borrow().iter().filter(|c| c.op == op).count()
    }

    pub fn party_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self.inner.conn().query_row("SELECT COUNT(*) FROM parties", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn slot_of(&self, item: &RemoteItemId) -> Option<(GridKind, i32)> {
        self.inner
            .conn()
            .query_row(
                "SELECT kind, position FROM grid_items WHERE item_id = ?1",
                [item.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?)),
            )
            .optional()
            .ok()
            .flatten()
            .and_then(|(kind, position)| GridKind::parse(&kind).ok().map(|kind| (kind, position)))
    }

    async fn intercept<T, F, Fut>(
        &self,
        op: RemoteOp,
        slot: Option<(GridKind, i32)>,
        call: F,
    ) -> Result<T, StorageError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let gate = self.gates.borrow().get(&op).cloned();
        if let Some(gate) = gate {
            *self.waiting.borrow_mut().entry(op).or_default() += 1;
            // a closed gate lets everyone through
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
            *self.waiting.borrow_mut().entry(op).or_default() -= 1;
        }

        let injected = match self.faults.borrow_mut().get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        let result = if injected {
            Err(StorageError::Unavailable(format!("injected {op} failure")))
        } else {
            call().await
        };
        self.calls.borrow_mut().push(Call { op, slot, ok: result.is_ok() });
        result
    }
}

#[async_trait(?Send)]
impl PartyBackend for TestBackend {
    async fn create_party(
        &self,
        auth: Option<&Authorization>,
        details: &PartyDetails,
    ) -> Result<CreatedParty, StorageError> {
        self.intercept(RemoteOp::CreateParty, None, || self.inner.create_party(auth, details))
            .await
    }

    async fn fetch_party(&self, shortcode: &str) -> Result<PartyRecord, StorageError> {
        self.intercept(RemoteOp::FetchParty, None, || self.inner.fetch_party(shortcode))
            .await
    }

    async fn update_party(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        details: &PartyDetails,
    ) -> Result<(), StorageError> {
        self.intercept(RemoteOp::UpdateParty, None, || self.inner.update_party(auth, party, details))
            .await
    }

    async fn destroy_party(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
    ) -> Result<(), StorageError> {
        self.intercept(RemoteOp::DestroyParty, None, || self.inner.destroy_party(auth, party))
            .await
    }

    async fn add_item(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        item: &NewGridItem,
    ) -> Result<RemoteItemId, StorageError> {
        let slot = Some((item.kind, item.position));
        self.intercept(RemoteOp::AddItem, slot, || self.inner.add_item(auth, party, item))
            .await
    }

    async fn remove_item(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        kind: GridKind,
        item: &RemoteItemId,
    ) -> Result<(), StorageError> {
        let slot = self.slot_of(item);
        self.intercept(RemoteOp::RemoveItem, slot, || self.inner.remove_item(auth, party, kind, item))
            .await
    }

    async fn update_item(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        kind: GridKind,
        item: &RemoteItemId,
        patch: &ItemPatch,
    ) -> Result<(), StorageError> {
        let slot = self.slot_of(item);
        self.intercept(RemoteOp::UpdateItem, slot, || {
            self.inner.update_item(auth, party, kind, item, patch)
        })
        .await
    }
}
