mod common;

use bridgefront_game::block::BlockKind;
use bridgefront_game::ids::CardId;
use bridgefront_game::modifiers::{
    Duration, ModifierKind, ModifierSource, NewModifier, attach, consume_use, expire_end_of_round,
};
use bridgefront_game::round::pump;
use bridgefront_game::{GameState, Phase, RoundStep};
use common::arena;

fn card_modifier(state: &mut GameState, duration: Duration, kind: ModifierKind) -> bridgefront_game::ModifierId {
    attach(
        state,
        NewModifier {
            source: ModifierSource::Card {
                card: CardId::new("fixture"),
            },
            owner: Some(state.players[0].id.clone()),
            duration,
            scope: None,
            kind,
        },
    )
}

#[test]
fn end_of_round_modifiers_are_gone_after_cleanup() {
    let mut state = arena(12);
    card_modifier(&mut state, Duration::EndOfRound, ModifierKind::IgnoreBridges);
    card_modifier(&mut state, Duration::Permanent, ModifierKind::ExtraMove { amount: 1 });
    state.phase = Phase::Round(RoundStep::Cleanup);

    let next = pump(&state);
    assert_eq!(next.round, state.round + 1);
    assert!(matches!(next.block.as_ref().map(|b| &b.kind), Some(BlockKind::QuietStudy { .. })));
    assert_eq!(next.modifiers.len(), 1);
    assert_eq!(next.modifiers[0].duration, Duration::Permanent);
}

#[test]
fn single_use_modifiers_are_gone_after_firing() {
    let mut state = arena(13);
    let once = card_modifier(&mut state, Duration::Uses { remaining: 1 }, ModifierKind::Bodyguard);
    let twice = card_modifier(&mut state, Duration::Uses { remaining: 2 }, ModifierKind::Bodyguard);
    consume_use(&mut state, &once);
    consume_use(&mut state, &twice);
    assert!(state.modifiers.iter().all(|m| m.id != once));
    let left = state.modifiers.iter().find(|m| m.id == twice).unwrap();
    assert_eq!(left.duration, Duration::Uses { remaining: 1 });
}

#[test]
fn expiry_only_touches_round_scoped_modifiers() {
    let mut state = arena(14);
    card_modifier(&mut state, Duration::EndOfRound, ModifierKind::IgnoreBridges);
    card_modifier(&mut state, Duration::EndOfBattle, ModifierKind::ForceHitFaces { delta: 1 });
    card_modifier(&mut state, Duration::Uses { remaining: 1 }, ModifierKind::Bodyguard);
    assert_eq!(expire_end_of_round(&mut state), 1);
    assert_eq!(state.modifiers.len(), 2);
}
