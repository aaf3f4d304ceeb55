mod common;

use bridgefront_game::actions::effects::recruit;
use bridgefront_game::combat::assign::{Target, assign_hits, targets_on};
use bridgefront_game::combat::{BattleEnd, BattleSetup, resolve_battle};
use bridgefront_game::modifiers::HitPolicy;
use bridgefront_game::rng::RngState;
use bridgefront_game::{CardInstanceId, ChampionId, HexKey, UnitId};
use common::arena;

fn mixed_targets() -> Vec<Target> {
    vec![
        Target { unit: UnitId(1), champion_hp: None },
        Target { unit: UnitId(2), champion_hp: Some(3) },
        Target { unit: UnitId(3), champion_hp: None },
        Target { unit: UnitId(4), champion_hp: Some(1) },
    ]
}

#[test]
fn every_rolled_hit_lands_on_exactly_one_target() {
    let targets = mixed_targets();
    let policies = [
        HitPolicy::Random,
        HitPolicy::ForcesFirst,
        HitPolicy::ChampionsFirst,
        HitPolicy::FocusFire { hits: 2 },
    ];
    let mut rng = RngState::from_seed(77, b"hits");
    for policy in policies {
        for hits in 0..12 {
            let (assigned, next) = assign_hits(&rng, policy, hits, &targets);
            rng = next;
            assert_eq!(assigned.len(), hits as usize, "{policy:?} with {hits} hits");
            assert!(assigned.iter().all(|unit| targets.iter().any(|t| t.unit == *unit)));
        }
    }
    let (nothing, _) = assign_hits(&rng, HitPolicy::Random, 5, &[]);
    assert!(nothing.is_empty());
}

#[test]
fn forces_first_exhausts_forces_before_champions() {
    let rng = RngState::from_seed(1, b"hits");
    let (assigned, _) = assign_hits(&rng, HitPolicy::ForcesFirst, 3, &mixed_targets());
    assert_eq!(&assigned[..2], &[UnitId(1), UnitId(3)]);
    assert_eq!(assigned[2], UnitId(4), "weakest champion next");
}

#[test]
fn battles_terminate_for_many_seeds_and_sizes() {
    for seed in 0..40 {
        let mut state = arena(seed);
        let hex = HexKey::origin();
        let battle = BattleSetup {
            hex,
            attacker: state.players[0].id.clone(),
            defender: state.players[1].id.clone(),
        };
        let size = u32::try_from(seed % 4).unwrap() + 1;
        state.board_mut().place_forces(hex, &battle.attacker, size);
        state.board_mut().place_forces(hex, &battle.defender, 5 - size);
        if seed % 3 == 0 {
            let _ = recruit(&mut state, &battle.defender, hex, &ChampionId::new("warlord"), CardInstanceId(0));
        }
        let before = state.board.units.len();
        let report = resolve_battle(&mut state, &battle, Vec::new());
        let lost: u32 = report.losses.values().sum();
        assert_eq!(before - lost as usize, state.board.units.len());
        match report.end {
            BattleEnd::Eliminated => {
                assert!(!state.board.is_contested(hex));
                assert_eq!(report.holder, state.board.sole_occupant(hex).cloned());
            }
            BattleEnd::Stale | BattleEnd::NoHits => assert!(state.board.is_contested(hex)),
            BattleEnd::Retreated => panic!("no retreats were queued"),
        }
        assert!(state.modifiers.iter().all(|m| {
            m.duration != bridgefront_game::modifiers::Duration::EndOfBattle
        }));
    }
}

#[test]
fn target_listing_reports_champion_hp() {
    let mut state = arena(3);
    let hex = HexKey::new(1, -1);
    let owner = state.players[0].id.clone();
    state.board_mut().place_forces(hex, &owner, 2);
    let champion = recruit(&mut state, &owner, hex, &ChampionId::new("sentinel"), CardInstanceId(0)).unwrap();
    let targets = targets_on(&state.board, hex, &owner);
    assert_eq!(targets.len(), 3);
    let listed = targets.iter().find(|t| t.unit == champion).unwrap();
    assert_eq!(listed.champion_hp, Some(3));
}
