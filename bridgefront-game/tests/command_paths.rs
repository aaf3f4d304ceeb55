mod common;

use bridgefront_game::round::pump;
use bridgefront_game::{
    Age, BasicAction, BlockKind, CollectionChoice, CollectionPrompt, Command, Declaration, EdgeKey,
    EventKind, GameState, HexKey, Phase, RoundStep, TileKind, apply_command,
};
use common::arena;

fn block_kind(state: &GameState) -> Option<&BlockKind> {
    state.block.as_ref().map(|block| &block.kind)
}

/// p0 marches from A into p1 on B; B has a second bridge out to C.
fn march_into_defender(seed: u64) -> (GameState, EdgeKey) {
    let mut state = arena(seed);
    let (a, b, c) = (HexKey::origin(), HexKey::new(1, 0), HexKey::new(2, 0));
    let exit = EdgeKey::new(b, c);
    state.board_mut().add_bridge(EdgeKey::new(a, b), None, false);
    state.board_mut().add_bridge(exit, None, false);
    let (p0, p1) = (state.players[0].id.clone(), state.players[1].id.clone());
    state.board_mut().place_forces(a, &p0, 2);
    state.board_mut().place_forces(b, &p1, 1);
    for player in &mut state.players {
        player.resources.mana = 3;
    }
    let mut state = pump(&state);
    assert!(matches!(block_kind(&state), Some(BlockKind::Declarations { .. })));

    let march = Declaration::Basic {
        action: BasicAction::March { from: a, to: b, units: Vec::new() },
    };
    state = apply_command(&state, &Command::SubmitAction { player: p0, declaration: march }).unwrap();
    state = apply_command(
        &state,
        &Command::SubmitAction { player: p1, declaration: Declaration::Done },
    )
    .unwrap();
    (state, exit)
}

#[test]
fn retreat_choices_pay_on_acceptance_and_resume_resolution() {
    for seed in 0..30 {
        let (mut state, exit) = march_into_defender(seed);
        let p1 = state.players[1].id.clone();
        let Some(BlockKind::Retreat { options, .. }) = block_kind(&state) else {
            panic!("seed {seed}: battle should wait on retreat choices");
        };
        assert!(options[&p1].contains(&exit));

        let mana_before = state.players[1].resources.mana;
        let waiting = state.block.as_ref().unwrap().waiting_for.clone();
        for player in waiting {
            let edge = (player == p1).then_some(exit);
            state = apply_command(&state, &Command::SubmitCombatRetreat { player, edge }).unwrap();
        }
        assert_eq!(
            state.players[1].resources.mana,
            mana_before - state.config.retreat_mana_cost
        );

        let resolved = state
            .log
            .iter()
            .rev()
            .find(|event| event.kind == EventKind::BattleResolved)
            .expect("battle resolved");
        let end = resolved.payload["end"].as_str().unwrap();
        assert!(matches!(end, "retreated" | "eliminated"), "seed {seed}: {end}");
        assert!(state.resolution.is_none());
        assert!(matches!(block_kind(&state), Some(BlockKind::Declarations { .. })));
        assert_eq!(state.phase, Phase::Round(RoundStep::Action));
    }
}

#[test]
fn retreat_through_a_foreign_edge_is_rejected() {
    let (state, _) = march_into_defender(5);
    let p1 = state.players[1].id.clone();
    let wrong = EdgeKey::new(HexKey::new(1, 0), HexKey::new(1, 1));
    let result = apply_command(
        &state,
        &Command::SubmitCombatRetreat { player: p1, edge: Some(wrong) },
    );
    assert!(result.is_err());
}

#[test]
fn forge_choices_draft_and_scrap_through_commands() {
    let mut state = arena(77);
    let p0 = state.players[0].id.clone();
    let forges = [HexKey::origin(), HexKey::new(1, 0)];
    for hex in forges {
        state.board_mut().hexes.get_mut(&hex).unwrap().tile = TileKind::Forge;
        state.board_mut().place_forces(hex, &p0, 1);
    }
    let spare = state.decks.get_mut(&Age::I).and_then(Vec::pop).unwrap();
    state.players[0].deck.hand.push(spare);
    state.phase = Phase::Round(RoundStep::Collection);

    let state = pump(&state);
    let block = state.block.as_ref().unwrap();
    assert_eq!(block.waiting_for, vec![p0.clone()]);
    let BlockKind::Collection { prompts, .. } = &block.kind else {
        panic!("collection block expected");
    };
    assert_eq!(prompts[&p0].len(), 2);
    let CollectionPrompt::Forge { offers, .. } = &prompts[&p0][0];
    let drafted = offers[0];

    let overfull = Command::SubmitCollectionChoices {
        player: p0.clone(),
        choices: vec![CollectionChoice::Skip; 3],
    };
    assert!(apply_command(&state, &overfull).is_err());

    let choices = vec![
        CollectionChoice::Draft { card: drafted },
        CollectionChoice::Scrap { card: spare },
    ];
    let state = apply_command(
        &state,
        &Command::SubmitCollectionChoices { player: p0, choices },
    )
    .unwrap();

    let deck = &state.players[0].deck;
    assert!(deck.scrapped.contains(&spare));
    assert!(!deck.hand.contains(&spare));
    let mut owned = deck.draw_pile.iter().chain(&deck.discard_pile).chain(&deck.hand);
    assert!(owned.any(|card| *card == drafted));
    assert!(state.decks.values().all(|cards| !cards.contains(&drafted)));
    assert!(!matches!(block_kind(&state), Some(BlockKind::Collection { .. })));
}
