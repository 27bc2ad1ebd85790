pub mod catalog;
pub mod error;
pub mod grid;
pub mod ids;
pub mod rules;
pub mod slot;
pub mod upgrade;

pub use catalog::{Catalog, Character, Element, Summon, UncapCapability, Weapon};
pub use error::CoreError;
pub use grid::{GridItem, GridObject, PartyGrid, Slots};
pub use ids::*;
pub use rules::ConflictRules;
pub use slot::GridKind;
pub use upgrade::UpgradeState;
