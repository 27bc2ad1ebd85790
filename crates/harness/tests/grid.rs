use std::fmt::Debug;

use partygrid_core::{
    slot::{FRIEND_SUMMON, MAINHAND, MAIN_SUMMON},
    Character, ConflictRules, CoreError, Element, GridKind, Summon, Weapon,
};
use partygrid_engine::{ConflictSet, GridStore, PlaceOutcome, Resolution};
use partygrid_harness::TestCatalog;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn store() -> GridStore {
    GridStore::new(ConflictRules::default())
}

fn expect_conflict<T: Debug>(outcome: PlaceOutcome<T>) -> Result<ConflictSet<T>, Box<dyn std::error::Error>> {
    match outcome {
        PlaceOutcome::Conflict(set) => Ok(set),
        other => Err(format!("expected a conflict, got {other:?}").into()),
    }
}

fn expect_placed<T: Debug>(outcome: PlaceOutcome<T>) -> Result<partygrid_core::GridItem<T>, Box<dyn std::error::Error>> {
    match outcome {
        PlaceOutcome::Placed(item) => Ok(item),
        other => Err(format!("expected a placement, got {other:?}").into()),
    }
}

// ============================================================================
// Characters
// ============================================================================

#[test]
fn duplicate_character_at_another_uncap_conflicts() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    let a = expect_placed(store.place(catalog.get::<Character>("C1")?, 0)?)?;
    store.update_uncap(GridKind::Character, 0, 5)?;

    let set = expect_conflict(store.place(catalog.get::<Character>("C1")?, 2)?)?;
    assert_eq!(set.conflicting().len(), 1);
    assert_eq!(set.conflicting()[0].id, a.id);
    assert_eq!(set.conflicting()[0].position, 0);
    assert_eq!(set.desired_position(), 2);

    let resolution = store.resolve_conflict(&set, true)?;
    assert!(matches!(resolution, Resolution::Placed(ref item) if item.id == set.incoming().id));
    assert!(store.grid().characters.get(0)?.is_none());
    let kept = store.grid().characters.get(2)?.ok_or("slot 2 empty")?;
    assert_eq!(kept.id, set.incoming().id);
    assert_eq!(kept.uncap_level, 0);
    Ok(())
}

#[test]
fn editing_a_placed_character_never_self_conflicts() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    expect_placed(store.place(catalog.get::<Character>("C1")?, 3)?)?;
    for level in 0..=5 {
        store.update_uncap(GridKind::Character, 3, level)?;
    }
    // same character onto its own slot is a replacement, not a conflict
    expect_placed(store.place(catalog.get::<Character>("C1")?, 3)?)?;
    assert_eq!(store.grid().characters.len(), 1);
    Ok(())
}

#[test]
fn flb_character_uncap_range() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    expect_placed(store.place(catalog.get::<Character>("C1")?, 0)?)?;

    for level in 0..=5 {
        let state = store.update_uncap(GridKind::Character, 0, level)?;
        assert_eq!(i32::from(state.uncap_level), level);
    }
    assert_eq!(
        store.update_uncap(GridKind::Character, 0, 6),
        Err(CoreError::InvalidUncapLevel { requested: 6, max: 5 })
    );
    assert_eq!(
        store.update_uncap(GridKind::Character, 0, -1),
        Err(CoreError::InvalidUncapLevel { requested: -1, max: 5 })
    );
    // rejected, not clamped
    assert_eq!(store.grid().characters.get(0)?.map(|c| c.uncap_level), Some(5));
    Ok(())
}

#[test]
fn character_transcendence_rules() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    expect_placed(store.place(catalog.get::<Character>("C3")?, 0)?)?;
    expect_placed(store.place(catalog.get::<Character>("C4")?, 1)?)?;
    expect_placed(store.place(catalog.get::<Character>("C2")?, 2)?)?;

    assert!(matches!(
        store.update_transcendence(GridKind::Character, 0, 3),
        Err(CoreError::InvalidTranscendenceStep { requested: 3, .. })
    ));
    store.update_uncap(GridKind::Character, 0, 6)?;
    let state = store.update_transcendence(GridKind::Character, 0, 5)?;
    assert_eq!(state.transcendence_step, 5);
    assert!(store.update_transcendence(GridKind::Character, 0, 6).is_err());

    // special characters get a sixth star instead
    store.update_uncap(GridKind::Character, 1, 6)?;
    assert_eq!(
        store.update_transcendence(GridKind::Character, 1, 1),
        Err(CoreError::InvalidTranscendenceStep { requested: 1, max: 0 })
    );
    assert_eq!(
        store.update_transcendence(GridKind::Character, 2, 0),
        Err(CoreError::InvalidTranscendenceStep { requested: 0, max: 0 })
    );
    Ok(())
}

// ============================================================================
// Weapons and summons
// ============================================================================

#[test]
fn second_weapon_of_exclusive_series_conflicts() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    let first = expect_placed(store.place(catalog.get::<Weapon>("ultima-1")?, 10)?)?;
    let set = expect_conflict(store.place(catalog.get::<Weapon>("ultima-2")?, 4)?)?;
    assert_eq!(set.conflicting().iter().map(|w| w.id).collect::<Vec<_>>(), vec![first.id]);
    Ok(())
}

#[test]
fn opus_mainhand_excludes_draconic_grid_weapon() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    let opus = expect_placed(store.place(catalog.get::<Weapon>("opus-1")?, MAINHAND)?)?;
    let set = expect_conflict(store.place(catalog.get::<Weapon>("dragon-1")?, 0)?)?;
    assert_eq!(set.conflicting()[0].id, opus.id);
    assert_eq!(set.conflicting()[0].position, MAINHAND);
    Ok(())
}

#[test]
fn non_exclusive_series_fill_every_slot() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    for position in MAINHAND..=11 {
        let id = if position % 2 == 0 { "grand-1" } else { "grand-2" };
        expect_placed(store.place(catalog.get::<Weapon>(id)?, position)?)?;
    }
    expect_placed(store.place(catalog.get::<Weapon>("plain-1")?, 5)?)?;
    assert_eq!(store.grid().weapons.len(), 13);
    Ok(())
}

#[test]
fn weapon_transcendence_needs_full_uncap() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    expect_placed(store.place(catalog.get::<Weapon>("grand-1")?, 0)?)?;
    expect_placed(store.place(catalog.get::<Weapon>("grand-2")?, 1)?)?;

    assert!(store.update_transcendence(GridKind::Weapon, 0, 1).is_err());
    store.update_uncap(GridKind::Weapon, 0, 6)?;
    store.update_transcendence(GridKind::Weapon, 0, 4)?;
    let lowered = store.update_uncap(GridKind::Weapon, 0, 5)?;
    assert_eq!(lowered.transcendence_step, 0);

    assert_eq!(
        store.update_uncap(GridKind::Weapon, 1, 5),
        Err(CoreError::InvalidUncapLevel { requested: 5, max: 4 })
    );
    Ok(())
}

#[test]
fn weapon_element_can_be_chosen() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    expect_placed(store.place(catalog.get::<Weapon>("plain-1")?, MAINHAND)?)?;
    store.update_element(GridKind::Weapon, MAINHAND, Element::Light)?;
    assert_eq!(
        store.grid().weapons.get(MAINHAND)?.and_then(|w| w.element),
        Some(Element::Light)
    );
    assert_eq!(
        store.update_element(GridKind::Character, 0, Element::Light),
        Err(CoreError::ElementNotSupported { kind: GridKind::Character })
    );
    assert_eq!(
        store.update_element(GridKind::Weapon, 3, Element::Light),
        Err(CoreError::EmptySlot { kind: GridKind::Weapon, position: 3 })
    );
    Ok(())
}

#[test]
fn summons_may_repeat_across_main_friend_and_grid() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    for position in [MAIN_SUMMON, 0, 4, FRIEND_SUMMON] {
        expect_placed(store.place(catalog.get::<Summon>("bahamut")?, position)?)?;
    }
    assert_eq!(store.grid().summons.len(), 4);
    Ok(())
}

// ============================================================================
// Resolution protocol
// ============================================================================

#[test]
fn discarding_incoming_leaves_grid_byte_identical() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    expect_placed(store.place(catalog.get::<Weapon>("opus-1")?, MAINHAND)?)?;
    expect_placed(store.place(catalog.get::<Character>("C1")?, 0)?)?;
    store.drain_mutations();
    let before = store.grid().to_msgpack()?;

    let set = expect_conflict(store.place(catalog.get::<Weapon>("dragon-1")?, 2)?)?;
    assert_eq!(store.grid().to_msgpack()?, before);
    assert_eq!(store.resolve_conflict(&set, false)?, Resolution::Discarded);
    assert_eq!(store.grid().to_msgpack()?, before);
    assert!(store.drain_mutations().is_empty());

    // a later choice on the same set changes nothing
    assert_eq!(store.resolve_conflict(&set, true)?, Resolution::AlreadyResolved);
    assert_eq!(store.grid().to_msgpack()?, before);
    Ok(())
}

#[test]
fn keeping_incoming_twice_only_applies_once() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    expect_placed(store.place(catalog.get::<Weapon>("ultima-1")?, MAINHAND)?)?;
    store.drain_mutations();
    let set = expect_conflict(store.place(catalog.get::<Weapon>("ultima-2")?, 11)?)?;

    assert!(matches!(store.resolve_conflict(&set, true)?, Resolution::Placed(_)));
    let after = store.grid().to_msgpack()?;
    let first_batch = store.drain_mutations();
    assert_eq!(first_batch.len(), 2);

    assert_eq!(store.resolve_conflict(&set, true)?, Resolution::AlreadyResolved);
    assert_eq!(store.grid().to_msgpack()?, after);
    assert!(store.drain_mutations().is_empty());
    assert!(store.grid().weapons.get(MAINHAND)?.is_none());
    assert_eq!(store.grid().weapons.get(11)?.map(|w| w.id), Some(set.incoming().id));
    Ok(())
}

// ============================================================================
// Slot bounds
// ============================================================================

#[test]
fn placements_outside_capacity_are_rejected() -> TestResult {
    let catalog = TestCatalog::fixtures();
    let mut store = store();
    assert_eq!(
        store.place(catalog.get::<Character>("C1")?, 5).err(),
        Some(CoreError::OutOfRange { kind: GridKind::Character, position: 5 })
    );
    assert_eq!(
        store.place(catalog.get::<Character>("C1")?, MAINHAND).err(),
        Some(CoreError::OutOfRange { kind: GridKind::Character, position: MAINHAND })
    );
    assert!(store.place(catalog.get::<Weapon>("plain-1")?, 12).is_err());
    assert!(store.place(catalog.get::<Summon>("lucifer")?, 7).is_err());
    assert!(store.place(catalog.get::<Summon>("lucifer")?, -2).is_err());
    assert!(store.grid().is_empty());
    Ok(())
}

#[test]
fn removing_an_empty_slot_succeeds() -> TestResult {
    let mut store = store();
    assert_eq!(store.remove(GridKind::Weapon, MAINHAND)?, None);
    assert_eq!(store.remove(GridKind::Character, 4)?, None);
    assert!(store.remove(GridKind::Character, 5).is_err());
    Ok(())
}
