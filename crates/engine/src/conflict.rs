use partygrid_core::{
    Character, ConflictId, ConflictRules, GridItem, GridObject, PartyGrid, Summon, Weapon,
};

/// Per-kind uniqueness rule deciding whether two catalog objects may share a
/// party.
pub trait Exclusive: GridObject {
    fn excludes(&self, other: &Self, rules: &ConflictRules) -> bool;
}

impl Exclusive for Character {
    // Same catalog id, whatever the uncap level of either copy.
    fn excludes(&self, other: &Self, _rules: &ConflictRules) -> bool {
        self.id == other.id
    }
}

impl Exclusive for Weapon {
    fn excludes(&self, other: &Self, rules: &ConflictRules) -> bool {
        match (&self.series, &other.series) {
            (Some(a), Some(b)) => rules.excludes(a, b),
            _ => false,
        }
    }
}

impl Exclusive for Summon {
    fn excludes(&self, _other: &Self, _rules: &ConflictRules) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStatus {
    Open,
    Resolved,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
        }
    }
}

/// A placement that was refused because existing occupants break a
/// uniqueness rule. Handed to the caller, who resolves it through the store.
///
/// Read-only outside this crate, so the item that gets placed on resolution
/// is the one the store checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictSet<T> {
    pub(crate) id: ConflictId,
    pub(crate) incoming: GridItem<T>,
    pub(crate) conflicting: Vec<GridItem<T>>,
    pub(crate) desired_position: i32,
}

impl<T> ConflictSet<T> {
    pub fn id(&self) -> ConflictId {
        self.id
    }

    pub fn incoming(&self) -> &GridItem<T> {
        &self.incoming
    }

    pub fn conflicting(&self) -> &[GridItem<T>] {
        &self.conflicting
    }

    pub fn desired_position(&self) -> i32 {
        self.desired_position
    }
}

/// Every occupant `incoming` may not coexist with.
///
/// The occupant of the target slot is never reported: placing there replaces
/// it, and re-placing an item in its own slot is an in-place edit.
pub fn conflicting_occupants<'a, T: Exclusive>(
    grid: &'a PartyGrid,
    rules: &ConflictRules,
    incoming: &GridItem<T>,
) -> Vec<&'a GridItem<T>> {
    grid.slots::<T>()
        .occupied()
        .filter(|occupant| occupant.position != incoming.position && occupant.id != incoming.id)
        .filter(|occupant| incoming.object.excludes(&occupant.object, rules))
        .collect()
}

pub fn detect<T: Exclusive>(
    grid: &PartyGrid,
    rules: &ConflictRules,
    incoming: &GridItem<T>,
) -> Option<ConflictSet<T>> {
    let conflicting: Vec<GridItem<T>> = conflicting_occupants(grid, rules, incoming)
        .into_iter()
        .cloned()
        .collect();
    if conflicting.is_empty() {
        return None;
    }
    Some(ConflictSet {
        id: ConflictId::new(),
        incoming: incoming.clone(),
        conflicting,
        desired_position: incoming.position,
    })
}
