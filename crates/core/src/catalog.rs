use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{CatalogId, SeriesKey};

/// Immutable upgrade facts about a catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UncapCapability {
    pub flb: bool,
    pub ulb: bool,
    #[serde(default)]
    pub xlb: bool,
    #[serde(default)]
    pub special: bool,
    pub rarity: u8,
}

impl UncapCapability {
    pub fn ssr() -> Self {
        Self { rarity: 3, ..Self::default() }
    }

    pub fn with_flb(mut self) -> Self {
        self.flb = true;
        self
    }

    pub fn with_ulb(mut self) -> Self {
        self.flb = true;
        self.ulb = true;
        self
    }

    pub fn with_xlb(mut self) -> Self {
        self.flb = true;
        self.ulb = true;
        self.xlb = true;
        self
    }

    pub fn special(mut self) -> Self {
        self.special = true;
        self
    }
}

/// Element ids as the game numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Element {
    Wind = 1,
    Fire = 2,
    Water = 3,
    Earth = 4,
    Dark = 5,
    Light = 6,
}

impl TryFrom<u8> for Element {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Wind),
            2 => Ok(Self::Fire),
            3 => Ok(Self::Water),
            4 => Ok(Self::Earth),
            5 => Ok(Self::Dark),
            6 => Ok(Self::Light),
            _ => Err(CoreError::Serialization(format!("unknown element: {value}"))),
        }
    }
}

impl From<Element> for u8 {
    fn from(element: Element) -> Self {
        element as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CatalogId,
    pub name: String,
    pub capability: UncapCapability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub id: CatalogId,
    pub name: String,
    pub series: Option<SeriesKey>,
    pub capability: UncapCapability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summon {
    pub id: CatalogId,
    pub name: String,
    pub capability: UncapCapability,
}

/// Read-only catalog lookups, provided by the embedding application.
pub trait Catalog {
    fn character(&self, id: &CatalogId) -> Option<Character>;
    fn weapon(&self, id: &CatalogId) -> Option<Weapon>;
    fn summon(&self, id: &CatalogId) -> Option<Summon>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_imply_lower_uncaps() {
        let cap = UncapCapability::ssr().with_xlb();
        assert!(cap.flb && cap.ulb && cap.xlb);
        assert!(!cap.special);
        assert_eq!(cap.rarity, 3);
    }

    #[test]
    fn element_wire_format() {
        assert_eq!(serde_json::to_string(&Element::Light).unwrap(), "6");
        let fire: Element = serde_json::from_str("2").unwrap();
        assert_eq!(fire, Element::Fire);
        assert!(serde_json::from_str::<Element>("9").is_err());
    }

    #[test]
    fn capability_optional_flags_default() {
        let cap: UncapCapability = serde_json::from_str(r#"{"flb":true,"ulb":false,"rarity":3}"#).unwrap();
        assert!(!cap.xlb);
        assert!(!cap.special);
    }
}
