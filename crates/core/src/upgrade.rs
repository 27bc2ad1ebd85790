use serde::{Deserialize, Serialize};

use crate::catalog::UncapCapability;
use crate::error::CoreError;
use crate::slot::GridKind;

pub const MIN_UNCAP_LEVEL: u8 = 0;
pub const MAX_TRANSCENDENCE_STEP: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpgradeState {
    pub uncap_level: u8,
    pub transcendence_step: u8,
}

impl UpgradeState {
    /// State of a freshly placed item.
    pub fn floor() -> Self {
        Self { uncap_level: MIN_UNCAP_LEVEL, transcendence_step: 0 }
    }
}

pub fn max_uncap_level(kind: GridKind, cap: &UncapCapability) -> u8 {
    let flb = u8::from(cap.flb);
    let ulb = u8::from(cap.ulb);
    match kind {
        GridKind::Character if cap.special => 3 + flb + ulb + u8::from(cap.ulb && cap.xlb),
        GridKind::Character => 4 + flb + ulb,
        GridKind::Weapon | GridKind::Summon => 3 + flb + ulb + u8::from(cap.xlb),
    }
}

/// Zero means the item cannot transcend at all.
pub fn max_transcendence_step(kind: GridKind, cap: &UncapCapability) -> u8 {
    let reachable = match kind {
        // special characters take an extra uncap star instead
        GridKind::Character => !cap.special && cap.ulb && cap.xlb,
        GridKind::Weapon | GridKind::Summon => cap.xlb,
    };
    if reachable { MAX_TRANSCENDENCE_STEP } else { 0 }
}

pub fn validate_uncap(kind: GridKind, cap: &UncapCapability, requested: i32) -> Result<u8, CoreError> {
    let max = max_uncap_level(kind, cap);
    if requested < i32::from(MIN_UNCAP_LEVEL) || requested > i32::from(max) {
        return Err(CoreError::InvalidUncapLevel { requested, max });
    }
    Ok(requested as u8)
}

/// Move to a new uncap level. Out-of-range requests are rejected, never
/// clamped; dropping below the ceiling resets transcendence.
pub fn apply_uncap(
    kind: GridKind,
    cap: &UncapCapability,
    current: UpgradeState,
    requested: i32,
) -> Result<UpgradeState, CoreError> {
    let uncap_level = validate_uncap(kind, cap, requested)?;
    let transcendence_step = if uncap_level < max_uncap_level(kind, cap) {
        0
    } else {
        current.transcendence_step
    };
    Ok(UpgradeState { uncap_level, transcendence_step })
}

/// Move to a new transcendence step. Steps above zero need the uncap ceiling.
pub fn apply_transcendence(
    kind: GridKind,
    cap: &UncapCapability,
    current: UpgradeState,
    requested: i32,
) -> Result<UpgradeState, CoreError> {
    let max = max_transcendence_step(kind, cap);
    if max == 0 {
        return Err(CoreError::InvalidTranscendenceStep { requested, max });
    }
    if requested < 0 || requested > i32::from(max) {
        return Err(CoreError::InvalidTranscendenceStep { requested, max });
    }
    if requested > 0 && current.uncap_level < max_uncap_level(kind, cap) {
        return Err(CoreError::InvalidTranscendenceStep { requested, max: 0 });
    }
    Ok(UpgradeState { uncap_level: current.uncap_level, transcendence_step: requested as u8 })
}

/// Check a stored state, as read back from the server.
pub fn validate_state(kind: GridKind, cap: &UncapCapability, state: UpgradeState) -> Result<(), CoreError> {
    validate_uncap(kind, cap, i32::from(state.uncap_level))?;
    if state.transcendence_step > 0 {
        apply_transcendence(kind, cap, state, i32::from(state.transcendence_step))?;
    }
    Ok(())
}
