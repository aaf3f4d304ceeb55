mod common;

use bridgefront_game::events::EventKind;
use bridgefront_game::{Command, CommandError, GameSession, Phase, PlayerId, apply_command, build_view};
use common::{catalog, config, lobby, new_state, run_passive};

const DUEL: [&str; 2] = ["ironbound", "wayfarers"];

#[test]
fn passive_games_run_to_the_round_cap() {
    let (state, history) = run_passive(new_state(&DUEL, 11));
    assert!(state.is_finished(), "stuck in {:?}", state.phase);
    assert_eq!(state.phase, Phase::Finished);
    assert_eq!(state.round, state.config.round_cap);
    assert!(state.block.is_none());
    assert!(!history.is_empty());
    assert_eq!(state.log.count_of(EventKind::GameWon), 1);
    let last_round = state.log.last_of(EventKind::RoundStarted).unwrap();
    assert_eq!(last_round.payload["round"], serde_json::json!(state.config.round_cap));
}

#[test]
fn four_player_games_finish_too() {
    let (state, _) = run_passive(new_state(&["ironbound", "wayfarers", "goldhand", "warhost"], 3));
    assert!(state.is_finished());
    let capitals: std::collections::BTreeSet<_> = state.players.iter().filter_map(|p| p.capital).collect();
    assert_eq!(capitals.len(), 4);
}

#[test]
fn same_seed_and_commands_give_the_same_digest() {
    let (first, first_history) = run_passive(new_state(&DUEL, 99));
    let (second, second_history) = run_passive(new_state(&DUEL, 99));
    assert_eq!(first_history, second_history);
    assert_eq!(first.digest(), second.digest());
    assert_eq!(first, second);

    let (other, _) = run_passive(new_state(&DUEL, 100));
    assert_ne!(first.digest(), other.digest());
}

#[test]
fn replaying_the_history_reproduces_the_game() {
    let (state, history) = run_passive(new_state(&DUEL, 5));
    let session = GameSession::replay(catalog(), config(), &lobby(&DUEL), 5, &history).unwrap();
    assert_eq!(session.digest(), state.digest());
    assert_eq!(session.history(), history.as_slice());
}

#[test]
fn finished_games_reject_commands() {
    let (state, _) = run_passive(new_state(&DUEL, 8));
    let err = apply_command(
        &state,
        &Command::AdvanceSetup {
            player: PlayerId::new("p0"),
        },
    )
    .unwrap_err();
    assert_eq!(err, CommandError::GameOver);
}

#[test]
fn saved_json_resumes_mid_game() {
    let state = new_state(&DUEL, 21);
    let (mid, _) = {
        let mut state = state;
        let mut history = Vec::new();
        for _ in 0..12 {
            let Some(command) = common::passive_command(&state) else { break };
            state = apply_command(&state, &command).unwrap();
            history.push(command);
        }
        (state, history)
    };
    let json = serde_json::to_string(&mid).unwrap();
    let restored: bridgefront_game::GameState = serde_json::from_str(&json).unwrap();
    let restored = restored.rehydrate(catalog());
    assert_eq!(restored.digest(), mid.digest());

    let (a, _) = run_passive(mid);
    let (b, _) = run_passive(restored);
    assert_eq!(a.digest(), b.digest());
}

#[test]
fn views_only_reveal_the_viewers_hand() {
    let (state, _) = {
        let mut state = new_state(&DUEL, 14);
        for _ in 0..40 {
            let Some(command) = common::passive_command(&state) else { break };
            state = apply_command(&state, &command).unwrap();
        }
        (state, ())
    };
    for player in &state.players {
        let view = build_view(&state, &player.id);
        let private = view.private.expect("seated viewer");
        let hand: Vec<_> = private.hand.iter().map(|card| card.instance).collect();
        assert_eq!(hand, player.deck.hand);
        let public = &view.public.players[player.seat];
        assert_eq!(public.hand_size, player.deck.hand.len());
    }
    let public = serde_json::to_value(build_view(&state, &PlayerId::new("p0")).public).unwrap();
    assert!(public["players"][1].get("hand").is_none());
}
