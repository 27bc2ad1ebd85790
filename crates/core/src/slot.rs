use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

pub const MAINHAND: i32 = -1;
pub const MAIN_SUMMON: i32 = -1;
pub const FRIEND_SUMMON: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    Weapon,
    Summon,
    Character,
}

impl GridKind {
    pub const ALL: [GridKind; 3] = [GridKind::Weapon, GridKind::Summon, GridKind::Character];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Summon => "summon",
            Self::Character => "character",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "weapon" => Ok(Self::Weapon),
            "summon" => Ok(Self::Summon),
            "character" => Ok(Self::Character),
            _ => Err(CoreError::Serialization(format!("unknown grid kind: {s}"))),
        }
    }
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotRole {
    Main,
    Friend,
    Grid,
    Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    /// Named single slots: mainhand for weapons, main + friend for summons.
    pub main: usize,
    pub grid: usize,
    pub extra: usize,
}

impl Capacity {
    pub fn total(&self) -> usize {
        self.main + self.grid + self.extra
    }
}

pub fn capacity(kind: GridKind) -> Capacity {
    match kind {
        GridKind::Weapon => Capacity { main: 1, grid: 9, extra: 3 },
        GridKind::Summon => Capacity { main: 2, grid: 4, extra: 2 },
        GridKind::Character => Capacity { main: 0, grid: 5, extra: 0 },
    }
}

/// Lowest slot number for a kind. Offsets count up from here.
fn first_slot(kind: GridKind) -> i32 {
    match kind {
        GridKind::Weapon | GridKind::Summon => -1,
        GridKind::Character => 0,
    }
}

pub fn role(kind: GridKind, slot: i32) -> Result<SlotRole, CoreError> {
    let role = match (kind, slot) {
        (GridKind::Weapon, MAINHAND) => SlotRole::Main,
        (GridKind::Weapon, 0..=8) => SlotRole::Grid,
        (GridKind::Weapon, 9..=11) => SlotRole::Extra,
        (GridKind::Summon, MAIN_SUMMON) => SlotRole::Main,
        (GridKind::Summon, 0..=3) => SlotRole::Grid,
        (GridKind::Summon, 4..=5) => SlotRole::Extra,
        (GridKind::Summon, FRIEND_SUMMON) => SlotRole::Friend,
        (GridKind::Character, 0..=4) => SlotRole::Grid,
        _ => return Err(CoreError::OutOfRange { kind, position: slot }),
    };
    Ok(role)
}

/// Map a slot number (mainhand is `-1`, the friend summon is `6`) to its
/// dense offset in the kind's slot vector, in slot-number order.
pub fn resolve_offset(kind: GridKind, slot: i32) -> Result<usize, CoreError> {
    role(kind, slot)?;
    // role() accepted the slot, so it is at or above first_slot
    Ok((slot - first_slot(kind)) as usize)
}

/// Inverse of [`resolve_offset`].
pub fn slot_number(kind: GridKind, offset: usize) -> Option<i32> {
    if offset >= capacity(kind).total() {
        return None;
    }
    Some(first_slot(kind) + offset as i32)
}

pub fn slot_numbers(kind: GridKind) -> impl Iterator<Item = i32> {
    let first = first_slot(kind);
    (0..capacity(kind).total() as i32).map(move |offset| first + offset)
}
