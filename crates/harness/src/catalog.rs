use std::collections::HashMap;

use partygrid_core::{
    Catalog, CatalogId, Character, CoreError, GridObject, SeriesKey, Summon, UncapCapability,
    Weapon,
};

/// In-memory catalog with a fixed set of game objects.
#[derive(Debug, Clone, Default)]
pub struct TestCatalog {
    characters: HashMap<CatalogId, Character>,
    weapons: HashMap<CatalogId, Weapon>,
    summons: HashMap<CatalogId, Summon>,
}

impl TestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Characters:
    /// - `C1` flb, ceiling 5
    /// - `C2` base SSR, ceiling 4
    /// - `C3` transcendence-capable
    /// - `C4` special, extra star instead of transcendence
    ///
    /// Weapons `opus-1`, `dragon-1`, `ultima-1`, `ultima-2`, `grand-1`,
    /// `grand-2` and the series-less `plain-1`; summons `bahamut` (xlb) and
    /// `lucifer`.
    pub fn fixtures() -> Self {
        let ssr = UncapCapability::ssr();
        Self::new()
            .with_character("C1", ssr.with_flb())
            .with_character("C2", ssr)
            .with_character("C3", ssr.with_xlb())
            .with_character("C4", ssr.with_xlb().special())
            .with_weapon("opus-1", Some("opus"), ssr.with_ulb())
            .with_weapon("dragon-1", Some("draconic"), ssr.with_ulb())
            .with_weapon("ultima-1", Some("ultima"), ssr.with_ulb())
            .with_weapon("ultima-2", Some("ultima"), ssr.with_ulb())
            .with_weapon("grand-1", Some("grand"), ssr.with_xlb())
            .with_weapon("grand-2", Some("grand"), ssr.with_flb())
            .with_weapon("plain-1", None, ssr)
            .with_summon("bahamut", ssr.with_xlb())
            .with_summon("lucifer", ssr.with_ulb())
    }

    pub fn with_character(mut self, id: &str, capability: UncapCapability) -> Self {
        let character = Character { id: CatalogId::from(id), name: id.to_string(), capability };
        self.characters.insert(character.id.clone(), character);
        self
    }

    pub fn with_weapon(mut self, id: &str, series: Option<&str>, capability: UncapCapability) -> Self {
        let weapon = Weapon {
            id: CatalogId::from(id),
            name: id.to_string(),
            series: series.map(SeriesKey::from),
            capability,
        };
        self.weapons.insert(weapon.id.clone(), weapon);
        self
    }

    pub fn with_summon(mut self, id: &str, capability: UncapCapability) -> Self {
        let summon = Summon { id: CatalogId::from(id), name: id.to_string(), capability };
        self.summons.insert(summon.id.clone(), summon);
        self
    }

    /// Look up an object of any kind by its string id.
    pub fn get<T: GridObject>(&self, id: &str) -> Result<T, CoreError> {
        T::lookup(self, &CatalogId::from(id)).ok_or_else(|| CoreError::UnknownCatalogId(id.to_string()))
    }
}

impl Catalog for TestCatalog {
    fn character(&self, id: &CatalogId) -> Option<Character> {
        self.characters.get(id).cloned()
    }

    fn weapon(&self, id: &CatalogId) -> Option<Weapon> {
        self.weapons.get(id).cloned()
    }

    fn summon(&self, id: &CatalogId) -> Option<Summon> {
        self.summons.get(id).cloned()
    }
}
