use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::{Catalog, Character, Element, Summon, UncapCapability, Weapon};
use crate::error::CoreError;
use crate::ids::{CatalogId, GridItemId};
use crate::slot::{self, GridKind};
use crate::upgrade::UpgradeState;

/// A catalog object type that can occupy a party grid.
pub trait GridObject:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + 'static
{
    const KIND: GridKind;

    fn catalog_id(&self) -> &CatalogId;
    fn capability(&self) -> &UncapCapability;
    fn slots(grid: &PartyGrid) -> &Slots<Self>;
    fn slots_mut(grid: &mut PartyGrid) -> &mut Slots<Self>;
    fn lookup(catalog: &dyn Catalog, id: &CatalogId) -> Option<Self>;
}

impl GridObject for Weapon {
    const KIND: GridKind = GridKind::Weapon;

    fn catalog_id(&self) -> &CatalogId {
        &self.id
    }

    fn capability(&self) -> &UncapCapability {
        &self.capability
    }

    fn slots(grid: &PartyGrid) -> &Slots<Self> {
        &grid.weapons
    }

    fn slots_mut(grid: &mut PartyGrid) -> &mut Slots<Self> {
        &mut grid.weapons
    }

    fn lookup(catalog: &dyn Catalog, id: &CatalogId) -> Option<Self> {
        catalog.weapon(id)
    }
}

impl GridObject for Summon {
    const KIND: GridKind = GridKind::Summon;

    fn catalog_id(&self) -> &CatalogId {
        &self.id
    }

    fn capability(&self) -> &UncapCapability {
        &self.capability
    }

    fn slots(grid: &PartyGrid) -> &Slots<Self> {
        &grid.summons
    }

    fn slots_mut(grid: &mut PartyGrid) -> &mut Slots<Self> {
        &mut grid.summons
    }

    fn lookup(catalog: &dyn Catalog, id: &CatalogId) -> Option<Self> {
        catalog.summon(id)
    }
}

impl GridObject for Character {
    const KIND: GridKind = GridKind::Character;

    fn catalog_id(&self) -> &CatalogId {
        &self.id
    }

    fn capability(&self) -> &UncapCapability {
        &self.capability
    }

    fn slots(grid: &PartyGrid) -> &Slots<Self> {
        &grid.characters
    }

    fn slots_mut(grid: &mut PartyGrid) -> &mut Slots<Self> {
        &mut grid.characters
    }

    fn lookup(catalog: &dyn Catalog, id: &CatalogId) -> Option<Self> {
        catalog.character(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridItem<T> {
    pub id: GridItemId,
    pub object: T,
    pub position: i32,
    pub uncap_level: u8,
    pub transcendence_step: u8,
    pub element: Option<Element>,
}

impl<T: GridObject> GridItem<T> {
    /// A new item at the uncap floor.
    pub fn new(object: T, position: i32) -> Self {
        let floor = UpgradeState::floor();
        Self {
            id: GridItemId::new(),
            object,
            position,
            uncap_level: floor.uncap_level,
            transcendence_step: floor.transcendence_step,
            element: None,
        }
    }

    pub fn kind(&self) -> GridKind {
        T::KIND
    }

    pub fn catalog_id(&self) -> &CatalogId {
        self.object.catalog_id()
    }

    pub fn upgrade(&self) -> UpgradeState {
        UpgradeState {
            uncap_level: self.uncap_level,
            transcendence_step: self.transcendence_step,
        }
    }

    pub fn set_upgrade(&mut self, state: UpgradeState) {
        self.uncap_level = state.uncap_level;
        self.transcendence_step = state.transcendence_step;
    }
}

/// Fixed-capacity slots for one kind, indexed by slot offset.
///
/// Deserializing checks the layout, so every offset a valid slot number
/// resolves to exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSlots<T>", bound(deserialize = "T: GridObject"))]
pub struct Slots<T> {
    items: Vec<Option<GridItem<T>>>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: GridObject"))]
struct RawSlots<T> {
    items: Vec<Option<GridItem<T>>>,
}

impl<T: GridObject> TryFrom<RawSlots<T>> for Slots<T> {
    type Error = CoreError;

    fn try_from(raw: RawSlots<T>) -> Result<Self, CoreError> {
        let slots = Self { items: raw.items };
        slots.check_layout()?;
        Ok(slots)
    }
}

impl<T: GridObject> Default for Slots<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: GridObject> Slots<T> {
    pub fn new() -> Self {
        Self {
            items: vec![None; slot::capacity(T::KIND).total()],
        }
    }

    pub fn get(&self, position: i32) -> Result<Option<&GridItem<T>>, CoreError> {
        let offset = slot::resolve_offset(T::KIND, position)?;
        Ok(self.items[offset].as_ref())
    }

    pub fn get_mut(&mut self, position: i32) -> Result<Option<&mut GridItem<T>>, CoreError> {
        let offset = slot::resolve_offset(T::KIND, position)?;
        Ok(self.items[offset].as_mut())
    }

    /// Put an item in its slot, returning the previous occupant.
    pub fn insert(&mut self, item: GridItem<T>) -> Result<Option<GridItem<T>>, CoreError> {
        let offset = slot::resolve_offset(T::KIND, item.position)?;
        Ok(self.items[offset].replace(item))
    }

    pub fn take(&mut self, position: i32) -> Result<Option<GridItem<T>>, CoreError> {
        let offset = slot::resolve_offset(T::KIND, position)?;
        Ok(self.items[offset].take())
    }

    pub fn find(&self, id: GridItemId) -> Option<&GridItem<T>> {
        self.occupied().find(|item| item.id == id)
    }

    /// Occupied slots in slot-number order.
    pub fn occupied(&self) -> impl Iterator<Item = &GridItem<T>> {
        self.items.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.occupied().count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.items.iter_mut().for_each(|slot| *slot = None);
    }

    fn check_layout(&self) -> Result<(), CoreError> {
        let expected = slot::capacity(T::KIND).total();
        if self.items.len() != expected {
            return Err(CoreError::Serialization(format!(
                "{} grid has {} slots, expected {expected}",
                T::KIND,
                self.items.len()
            )));
        }
        for (offset, item) in self.items.iter().enumerate() {
            if let Some(item) = item
                && slot::slot_number(T::KIND, offset) != Some(item.position)
            {
                return Err(CoreError::Serialization(format!(
                    "{} at offset {offset} claims slot {}",
                    T::KIND,
                    item.position
                )));
            }
        }
        Ok(())
    }
}

/// The three slotted collections of one party.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartyGrid {
    pub weapons: Slots<Weapon>,
    pub summons: Slots<Summon>,
    pub characters: Slots<Character>,
}

impl PartyGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots<T: GridObject>(&self) -> &Slots<T> {
        T::slots(self)
    }

    pub fn slots_mut<T: GridObject>(&mut self) -> &mut Slots<T> {
        T::slots_mut(self)
    }

    pub fn is_empty(&self) -> bool {
        self.weapons.is_empty() && self.summons.is_empty() && self.characters.is_empty()
    }

    pub fn clear(&mut self) {
        self.weapons.clear();
        self.summons.clear();
        self.characters.clear();
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}
