use std::collections::HashMap;

use tracing::debug;

use partygrid_core::{
    slot, upgrade, ConflictId, ConflictRules, CoreError, Element, GridItem, GridItemId, GridKind,
    GridObject, PartyGrid, UncapCapability, UpgradeState,
};
use partygrid_storage::{ItemPatch, NewGridItem};

use crate::conflict::{self, ConflictSet, ConflictStatus, Exclusive};
use crate::error::EngineError;
use crate::mutation::{GridChange, GridMutation};

/// Runs `$body` with `$t` aliased to the catalog type stored for `$kind`.
macro_rules! with_kind {
    ($kind:expr, $t:ident => $body:expr) => {
        match $kind {
            partygrid_core::GridKind::Weapon => {
                type $t = partygrid_core::Weapon;
                $body
            }
            partygrid_core::GridKind::Summon => {
                type $t = partygrid_core::Summon;
                $body
            }
            partygrid_core::GridKind::Character => {
                type $t = partygrid_core::Character;
                $body
            }
        }
    };
}
pub(crate) use with_kind;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaceOutcome<T> {
    Placed(GridItem<T>),
    /// Nothing was changed; resolve the set to proceed.
    Conflict(ConflictSet<T>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Placed(GridItem<T>),
    Discarded,
    AlreadyResolved,
}

type Observer = Box<dyn FnMut(&GridChange, &PartyGrid)>;

/// Conflicts remembered at once. Older ones resolve to `ConflictNotFound`.
pub const TRACKED_CONFLICTS: usize = 64;

/// Sole owner of the party grid. Every write goes through here, is checked
/// against slot bounds, uniqueness rules and upgrade ranges, and is queued
/// for the sync coordinator.
pub struct GridStore {
    grid: PartyGrid,
    rules: ConflictRules,
    conflicts: HashMap<ConflictId, ConflictStatus>,
    outbox: Vec<GridMutation>,
    observers: Vec<Observer>,
}

impl GridStore {
    pub fn new(rules: ConflictRules) -> Self {
        Self {
            grid: PartyGrid::new(),
            rules,
            conflicts: HashMap::new(),
            outbox: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn grid(&self) -> &PartyGrid {
        &self.grid
    }

    pub fn snapshot(&self) -> PartyGrid {
        self.grid.clone()
    }

    pub fn rules(&self) -> &ConflictRules {
        &self.rules
    }

    pub fn conflict_status(&self, id: ConflictId) -> Option<ConflictStatus> {
        self.conflicts.get(&id).copied()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&GridChange, &PartyGrid) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Take the mutations applied since the last drain, in order.
    pub fn drain_mutations(&mut self) -> Vec<GridMutation> {
        std::mem::take(&mut self.outbox)
    }

    fn notify(&mut self, change: GridChange) {
        for observer in &mut self.observers {
            observer(&change, &self.grid);
        }
    }

    fn record(&mut self, mutation: GridMutation) {
        let change = GridChange::from(&mutation);
        self.outbox.push(mutation);
        self.notify(change);
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Place `object` at `position`, at the uncap floor.
    ///
    /// Returns `Conflict` without touching the grid when existing occupants
    /// break a uniqueness rule.
    pub fn place<T: Exclusive>(
        &mut self,
        object: T,
        position: i32,
    ) -> Result<PlaceOutcome<T>, CoreError> {
        slot::resolve_offset(T::KIND, position)?;
        let incoming = GridItem::new(object, position);

        if let Some(set) = conflict::detect(&self.grid, &self.rules, &incoming) {
            debug!(
                kind = %T::KIND,
                position,
                conflicting = set.conflicting.len(),
                "placement conflicts"
            );
            self.track_conflict(set.id);
            return Ok(PlaceOutcome::Conflict(set));
        }

        Ok(PlaceOutcome::Placed(self.commit_place(incoming)?))
    }

    fn commit_place<T: GridObject>(&mut self, item: GridItem<T>) -> Result<GridItem<T>, CoreError> {
        let previous = self.grid.slots_mut::<T>().insert(item.clone())?;
        if let Some(previous) = previous {
            self.record(GridMutation::Remove {
                item_id: previous.id,
                kind: T::KIND,
                position: previous.position,
            });
        }
        self.record(GridMutation::Add {
            item_id: item.id,
            item: NewGridItem {
                kind: T::KIND,
                catalog_id: item.catalog_id().clone(),
                position: item.position,
                uncap_level: item.uncap_level,
                transcendence_step: item.transcendence_step,
                element: item.element,
            },
        });
        Ok(item)
    }

    /// Settle a conflict returned by [`GridStore::place`].
    ///
    /// Keeping the incoming item removes every conflicting occupant (including
    /// any that appeared since detection) and then places it at the desired
    /// slot. The set only counts as resolved once that succeeds; resolving it
    /// again does nothing.
    pub fn resolve_conflict<T: Exclusive>(
        &mut self,
        set: &ConflictSet<T>,
        keep_incoming: bool,
    ) -> Result<Resolution<T>, EngineError> {
        match self.conflicts.get(&set.id) {
            None => return Err(EngineError::ConflictNotFound(set.id.to_string())),
            Some(ConflictStatus::Resolved) => return Ok(Resolution::AlreadyResolved),
            Some(ConflictStatus::Open) => {}
        }

        if !keep_incoming {
            self.conflicts.insert(set.id, ConflictStatus::Resolved);
            debug!(conflict = %set.id, "incoming item discarded");
            return Ok(Resolution::Discarded);
        }

        let mut incoming = set.incoming.clone();
        incoming.position = set.desired_position;
        slot::resolve_offset(T::KIND, incoming.position)?;
        upgrade::validate_state(T::KIND, incoming.object.capability(), incoming.upgrade())?;

        let mut losers: Vec<(GridItemId, i32)> = set
            .conflicting
            .iter()
            .filter(|c| self.grid.slots::<T>().find(c.id).is_some())
            .map(|c| (c.id, c.position))
            .collect();
        for late in conflict::conflicting_occupants(&self.grid, &self.rules, &incoming) {
            if !losers.iter().any(|(id, _)| *id == late.id) {
                losers.push((late.id, late.position));
            }
        }

        for (item_id, position) in losers {
            if self.grid.slots_mut::<T>().take(position)?.is_some() {
                self.record(GridMutation::Remove { item_id, kind: T::KIND, position });
            }
        }

        let placed = self.commit_place(incoming)?;
        self.conflicts.insert(set.id, ConflictStatus::Resolved);
        debug!(conflict = %set.id, kind = %T::KIND, position = placed.position, "incoming item kept");
        Ok(Resolution::Placed(placed))
    }

    /// Start tracking a new open conflict. Past [`TRACKED_CONFLICTS`] the
    /// oldest resolved entry is forgotten first, then the oldest open one.
    fn track_conflict(&mut self, id: ConflictId) {
        self.conflicts.insert(id, ConflictStatus::Open);
        if self.conflicts.len() <= TRACKED_CONFLICTS {
            return;
        }
        let evicted = self
            .conflicts
            .iter()
            .filter(|&(existing, _)| *existing != id)
            .min_by_key(|&(existing, status)| (*status == ConflictStatus::Open, *existing))
            .map(|(existing, _)| *existing);
        if let Some(evicted) = evicted {
            self.conflicts.remove(&evicted);
            debug!(conflict = %evicted, "conflict no longer tracked");
        }
    }

    // ========================================================================
    // Removal and upgrades
    // ========================================================================

    /// Clear a slot. An empty slot is not an error.
    pub fn remove(&mut self, kind: GridKind, position: i32) -> Result<Option<GridItemId>, CoreError> {
        with_kind!(kind, T => self.remove_typed::<T>(position))
    }

    fn remove_typed<T: GridObject>(&mut self, position: i32) -> Result<Option<GridItemId>, CoreError> {
        let Some(item) = self.grid.slots_mut::<T>().take(position)? else {
            return Ok(None);
        };
        self.record(GridMutation::Remove { item_id: item.id, kind: T::KIND, position });
        Ok(Some(item.id))
    }

    pub fn update_uncap(
        &mut self,
        kind: GridKind,
        position: i32,
        level: i32,
    ) -> Result<UpgradeState, CoreError> {
        with_kind!(kind, T => self.update_upgrade::<T>(position, |cap, current| {
            upgrade::apply_uncap(T::KIND, cap, current, level)
        }))
    }

    pub fn update_transcendence(
        &mut self,
        kind: GridKind,
        position: i32,
        step: i32,
    ) -> Result<UpgradeState, CoreError> {
        with_kind!(kind, T => self.update_upgrade::<T>(position, |cap, current| {
            upgrade::apply_transcendence(T::KIND, cap, current, step)
        }))
    }

    fn update_upgrade<T: GridObject>(
        &mut self,
        position: i32,
        transition: impl FnOnce(&UncapCapability, UpgradeState) -> Result<UpgradeState, CoreError>,
    ) -> Result<UpgradeState, CoreError> {
        let item = self
            .grid
            .slots_mut::<T>()
            .get_mut(position)?
            .ok_or(CoreError::EmptySlot { kind: T::KIND, position })?;
        let current = item.upgrade();
        let next = transition(item.object.capability(), current)?;
        if next == current {
            return Ok(next);
        }
        item.set_upgrade(next);
        let item_id = item.id;

        let patch = ItemPatch {
            uncap_level: (next.uncap_level != current.uncap_level).then_some(next.uncap_level),
            transcendence_step: (next.transcendence_step != current.transcendence_step)
                .then_some(next.transcendence_step),
            element: None,
        };
        self.record(GridMutation::Update { item_id, kind: T::KIND, position, patch });
        Ok(next)
    }

    /// Choose the element of a weapon whose element is selectable.
    pub fn update_element(
        &mut self,
        kind: GridKind,
        position: i32,
        element: Element,
    ) -> Result<(), CoreError> {
        if kind != GridKind::Weapon {
            return Err(CoreError::ElementNotSupported { kind });
        }
        let item = self
            .grid
            .weapons
            .get_mut(position)?
            .ok_or(CoreError::EmptySlot { kind, position })?;
        if item.element == Some(element) {
            return Ok(());
        }
        item.element = Some(element);
        let item_id = item.id;
        self.record(GridMutation::Update {
            item_id,
            kind,
            position,
            patch: ItemPatch { element: Some(element), ..ItemPatch::default() },
        });
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load an item read back from the server. Nothing is queued for sync.
    pub fn restore<T: Exclusive>(&mut self, item: GridItem<T>) -> Result<GridItemId, EngineError> {
        upgrade::validate_state(T::KIND, item.object.capability(), item.upgrade())?;
        if item.element.is_some() && T::KIND != GridKind::Weapon {
            return Err(CoreError::ElementNotSupported { kind: T::KIND }.into());
        }
        if self.grid.slots::<T>().get(item.position)?.is_some() {
            return Err(EngineError::SlotTaken { kind: T::KIND, position: item.position });
        }
        if let Some(other) = conflict::conflicting_occupants(&self.grid, &self.rules, &item).first() {
            return Err(EngineError::InvalidRecord(format!(
                "{} {} in slot {} conflicts with slot {}",
                T::KIND,
                item.catalog_id(),
                item.position,
                other.position
            )));
        }
        let item_id = item.id;
        let (kind, position) = (T::KIND, item.position);
        self.grid.slots_mut::<T>().insert(item)?;
        self.notify(GridChange::Placed { kind, position, item_id });
        Ok(item_id)
    }

    /// Empty the grid and forget pending conflicts and unsent mutations.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.conflicts.clear();
        self.outbox.clear();
        self.notify(GridChange::Cleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partygrid_core::{slot::MAINHAND, CatalogId, Character, SeriesKey, Weapon};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn character(id: &str, cap: UncapCapability) -> Character {
        Character { id: CatalogId::from(id), name: id.to_string(), capability: cap }
    }

    fn weapon(id: &str, series: &str) -> Weapon {
        Weapon {
            id: CatalogId::from(id),
            name: id.to_string(),
            series: Some(SeriesKey::from(series)),
            capability: UncapCapability::ssr().with_xlb(),
        }
    }

    fn placed<T: std::fmt::Debug>(outcome: PlaceOutcome<T>) -> GridItem<T> {
        match outcome {
            PlaceOutcome::Placed(item) => item,
            other => panic!("expected placement, got {other:?}"),
        }
    }

    fn conflict<T: std::fmt::Debug>(outcome: PlaceOutcome<T>) -> ConflictSet<T> {
        match outcome {
            PlaceOutcome::Conflict(set) => set,
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn place_queues_an_add() {
        let mut store = GridStore::new(ConflictRules::default());
        let item = placed(store.place(character("C1", UncapCapability::ssr()), 0).unwrap());
        assert_eq!(item.uncap_level, 0);
        let batch = store.drain_mutations();
        assert_eq!(batch.len(), 1);
        assert!(matches!(&batch[0], GridMutation::Add { item_id, .. } if *item_id == item.id));
        assert!(store.drain_mutations().is_empty());
    }

    #[test]
    fn replacing_an_occupant_removes_it_first() {
        let mut store = GridStore::new(ConflictRules::default());
        let first = placed(store.place(character("C1", UncapCapability::ssr()), 0).unwrap());
        store.drain_mutations();
        placed(store.place(character("C2", UncapCapability::ssr()), 0).unwrap());
        let batch = store.drain_mutations();
        assert_eq!(batch.len(), 2);
        assert!(matches!(&batch[0], GridMutation::Remove { item_id, .. } if *item_id == first.id));
        assert!(matches!(&batch[1], GridMutation::Add { .. }));
    }

    #[test]
    fn out_of_range_place_is_rejected() {
        let mut store = GridStore::new(ConflictRules::default());
        let err = store.place(character("C1", UncapCapability::ssr()), 5).unwrap_err();
        assert_eq!(err, CoreError::OutOfRange { kind: GridKind::Character, position: 5 });
        assert!(store.grid().is_empty());
        assert!(store.drain_mutations().is_empty());
    }

    #[test]
    fn conflict_leaves_grid_and_outbox_untouched() {
        let mut store = GridStore::new(ConflictRules::default());
        placed(store.place(weapon("opus", "opus"), MAINHAND).unwrap());
        store.drain_mutations();
        let before = store.grid().to_msgpack().unwrap();

        let set = conflict(store.place(weapon("dragon", "draconic"), 0).unwrap());
        assert_eq!(store.conflict_status(set.id()), Some(ConflictStatus::Open));
        assert_eq!(store.grid().to_msgpack().unwrap(), before);
        assert!(store.drain_mutations().is_empty());

        assert_eq!(store.resolve_conflict(&set, false).unwrap(), Resolution::Discarded);
        assert_eq!(store.grid().to_msgpack().unwrap(), before);
        assert_eq!(store.conflict_status(set.id()), Some(ConflictStatus::Resolved));
    }

    #[test]
    fn keeping_incoming_replaces_the_conflicting_weapon() {
        let mut store = GridStore::new(ConflictRules::default());
        let opus = placed(store.place(weapon("opus", "opus"), MAINHAND).unwrap());
        let set = conflict(store.place(weapon("dragon", "draconic"), 9).unwrap());
        store.drain_mutations();

        let kept = store.resolve_conflict(&set, true).unwrap();
        assert!(matches!(kept, Resolution::Placed(ref item) if item.position == 9));
        assert!(store.grid().weapons.get(MAINHAND).unwrap().is_none());
        let batch = store.drain_mutations();
        assert!(matches!(&batch[0], GridMutation::Remove { item_id, position: MAINHAND, .. } if *item_id == opus.id));
        assert!(matches!(&batch[1], GridMutation::Add { .. }));
    }

    #[test]
    fn keeping_incoming_also_clears_later_conflicts() {
        let mut store = GridStore::new(ConflictRules::default());
        placed(store.place(character("C1", UncapCapability::ssr()), 0).unwrap());
        let stale = conflict(store.place(character("C1", UncapCapability::ssr()), 2).unwrap());
        let fresh = conflict(store.place(character("C1", UncapCapability::ssr()), 3).unwrap());
        store.resolve_conflict(&fresh, true).unwrap();

        // the copy at 3 arrived after `stale` was detected
        store.resolve_conflict(&stale, true).unwrap();
        let positions: Vec<i32> = store.grid().characters.occupied().map(|c| c.position).collect();
        assert_eq!(positions, vec![2]);
    }

    #[test]
    fn resolving_twice_only_applies_once() {
        let mut store = GridStore::new(ConflictRules::default());
        placed(store.place(character("C1", UncapCapability::ssr()), 0).unwrap());
        let set = conflict(store.place(character("C1", UncapCapability::ssr()), 2).unwrap());
        store.drain_mutations();

        let first = store.resolve_conflict(&set, true).unwrap();
        assert!(matches!(first, Resolution::Placed(ref item) if item.position == 2));
        let batch = store.drain_mutations();
        assert_eq!(batch.len(), 2);
        let after = store.grid().to_msgpack().unwrap();

        assert_eq!(store.resolve_conflict(&set, true).unwrap(), Resolution::AlreadyResolved);
        assert!(store.drain_mutations().is_empty());
        assert_eq!(store.grid().to_msgpack().unwrap(), after);
    }

    #[test]
    fn resolution_rechecks_the_incoming_item() {
        let mut store = GridStore::new(ConflictRules::default());
        let first = placed(store.place(character("C1", UncapCapability::ssr().with_flb()), 0).unwrap());
        let set = conflict(store.place(character("C1", UncapCapability::ssr().with_flb()), 2).unwrap());
        store.drain_mutations();
        let before = store.grid().to_msgpack().unwrap();

        let mut over_uncapped = set.clone();
        over_uncapped.incoming.uncap_level = 99;
        assert!(matches!(
            store.resolve_conflict(&over_uncapped, true),
            Err(EngineError::Core(CoreError::InvalidUncapLevel { requested: 99, max: 5 }))
        ));

        let mut off_grid = set.clone();
        off_grid.desired_position = 9;
        assert!(matches!(
            store.resolve_conflict(&off_grid, true),
            Err(EngineError::Core(CoreError::OutOfRange { kind: GridKind::Character, position: 9 }))
        ));

        // nothing was removed or queued, and the set is still open
        assert_eq!(store.grid().to_msgpack().unwrap(), before);
        assert!(store.drain_mutations().is_empty());
        assert_eq!(store.conflict_status(set.id()), Some(ConflictStatus::Open));
        assert_eq!(store.grid().characters.get(0).unwrap().map(|c| c.id), Some(first.id));

        let kept = store.resolve_conflict(&set, true).unwrap();
        assert!(matches!(kept, Resolution::Placed(ref item) if item.position == 2 && item.uncap_level == 0));
        assert_eq!(store.conflict_status(set.id()), Some(ConflictStatus::Resolved));
    }

    #[test]
    fn conflict_tracking_is_bounded() {
        let mut store = GridStore::new(ConflictRules::default());
        placed(store.place(character("C1", UncapCapability::ssr()), 0).unwrap());
        let settled = conflict(store.place(character("C1", UncapCapability::ssr()), 1).unwrap());
        store.resolve_conflict(&settled, false).unwrap();

        let open: Vec<ConflictId> = (0..TRACKED_CONFLICTS)
            .map(|_| conflict(store.place(character("C1", UncapCapability::ssr()), 2).unwrap()).id())
            .collect();

        // the resolved entry goes before any open one
        assert_eq!(store.conflict_status(settled.id()), None);
        assert!(open.iter().all(|id| store.conflict_status(*id) == Some(ConflictStatus::Open)));
        assert!(matches!(
            store.resolve_conflict(&settled, true),
            Err(EngineError::ConflictNotFound(_))
        ));

        let newest = conflict(store.place(character("C1", UncapCapability::ssr()), 3).unwrap()).id();
        assert_eq!(store.conflict_status(newest), Some(ConflictStatus::Open));
        let still_open = open.iter().filter(|id| store.conflict_status(**id).is_some()).count();
        assert_eq!(still_open, TRACKED_CONFLICTS - 1);
    }

    #[test]
    fn unknown_conflict_is_an_error() {
        let mut store = GridStore::new(ConflictRules::default());
        placed(store.place(character("C1", UncapCapability::ssr()), 0).unwrap());
        let set = conflict(store.place(character("C1", UncapCapability::ssr()), 1).unwrap());
        store.clear();
        assert!(matches!(
            store.resolve_conflict(&set, true),
            Err(EngineError::ConflictNotFound(_))
        ));
    }

    #[test]
    fn remove_empty_slot_is_not_an_error() {
        let mut store = GridStore::new(ConflictRules::default());
        assert_eq!(store.remove(GridKind::Summon, 6), Ok(None));
        assert!(store.drain_mutations().is_empty());
        assert!(store.remove(GridKind::Summon, 7).is_err());
    }

    #[test]
    fn uncap_updates_are_validated() {
        let mut store = GridStore::new(ConflictRules::default());
        placed(store.place(character("C1", UncapCapability::ssr().with_flb()), 1).unwrap());
        store.drain_mutations();

        assert_eq!(
            store.update_uncap(GridKind::Character, 1, 6),
            Err(CoreError::InvalidUncapLevel { requested: 6, max: 5 })
        );
        assert!(store.drain_mutations().is_empty());

        let state = store.update_uncap(GridKind::Character, 1, 5).unwrap();
        assert_eq!(state.uncap_level, 5);
        let batch = store.drain_mutations();
        assert!(matches!(
            &batch[..],
            [GridMutation::Update { patch: ItemPatch { uncap_level: Some(5), transcendence_step: None, .. }, .. }]
        ));

        // unchanged level queues nothing
        store.update_uncap(GridKind::Character, 1, 5).unwrap();
        assert!(store.drain_mutations().is_empty());
    }

    #[test]
    fn update_on_empty_slot_fails() {
        let mut store = GridStore::new(ConflictRules::default());
        assert_eq!(
            store.update_uncap(GridKind::Weapon, 3, 1),
            Err(CoreError::EmptySlot { kind: GridKind::Weapon, position: 3 })
        );
    }

    #[test]
    fn lowering_uncap_clears_transcendence_in_one_update() {
        let mut store = GridStore::new(ConflictRules::default());
        placed(store.place(weapon("w", "grand"), 0).unwrap());
        store.update_uncap(GridKind::Weapon, 0, 6).unwrap();
        store.update_transcendence(GridKind::Weapon, 0, 3).unwrap();
        store.drain_mutations();

        let state = store.update_uncap(GridKind::Weapon, 0, 5).unwrap();
        assert_eq!(state, UpgradeState { uncap_level: 5, transcendence_step: 0 });
        let batch = store.drain_mutations();
        assert!(matches!(
            &batch[..],
            [GridMutation::Update { patch: ItemPatch { uncap_level: Some(5), transcendence_step: Some(0), .. }, .. }]
        ));
    }

    #[test]
    fn element_only_on_weapons() {
        let mut store = GridStore::new(ConflictRules::default());
        placed(store.place(weapon("w", "grand"), 0).unwrap());
        store.update_element(GridKind::Weapon, 0, Element::Dark).unwrap();
        assert_eq!(store.grid().weapons.get(0).unwrap().unwrap().element, Some(Element::Dark));
        assert_eq!(
            store.update_element(GridKind::Summon, 0, Element::Dark),
            Err(CoreError::ElementNotSupported { kind: GridKind::Summon })
        );
    }

    #[test]
    fn observers_see_every_change() {
        let mut store = GridStore::new(ConflictRules::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |change, grid| sink.borrow_mut().push((*change, grid.characters.len())));

        let item = placed(store.place(character("C1", UncapCapability::ssr()), 0).unwrap());
        store.remove(GridKind::Character, 0).unwrap();
        store.clear();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (GridChange::Placed { kind: GridKind::Character, position: 0, item_id: item.id }, 1));
        assert_eq!(seen[1], (GridChange::Removed { kind: GridKind::Character, position: 0, item_id: item.id }, 0));
        assert_eq!(seen[2], (GridChange::Cleared, 0));
    }

    #[test]
    fn restore_checks_rules() {
        let mut store = GridStore::new(ConflictRules::default());
        let mut item = GridItem::new(character("C1", UncapCapability::ssr()), 0);
        item.uncap_level = 4;
        store.restore(item).unwrap();
        assert!(store.drain_mutations().is_empty());

        let dup = GridItem::new(character("C1", UncapCapability::ssr()), 1);
        assert!(matches!(store.restore(dup), Err(EngineError::InvalidRecord(_))));

        let mut too_high = GridItem::new(character("C2", UncapCapability::ssr()), 2);
        too_high.uncap_level = 5;
        assert!(matches!(store.restore(too_high), Err(EngineError::Core(_))));

        let taken = GridItem::new(character("C3", UncapCapability::ssr()), 0);
        assert!(matches!(store.restore(taken), Err(EngineError::SlotTaken { .. })));
    }
}
