mod common;

use bridgefront_game::events::EventKind;
use bridgefront_game::market::Bid;
use bridgefront_game::{BlockKind, Command, GameState, apply_command};
use common::{new_state, passive_command};

const TRIO: [&str; 3] = ["ironbound", "wayfarers", "goldhand"];

fn at_first_bid(seed: u64) -> GameState {
    let mut state = new_state(&TRIO, seed);
    while !matches!(
        state.block.as_ref().map(|b| &b.kind),
        Some(BlockKind::MarketBids { .. })
    ) {
        let command = passive_command(&state).expect("market is reached");
        state = apply_command(&state, &command).unwrap();
    }
    state
}

/// Everyone bids `bid`, then every roll-off round is acknowledged.
fn three_way_tie(seed: u64, bid: Bid) -> (GameState, GameState) {
    let mut state = at_first_bid(seed);
    for player in &mut state.players {
        player.resources.gold = 6;
    }
    for player in state.player_ids() {
        state = apply_command(&state, &Command::SubmitMarketBid { player, bid }).unwrap();
    }
    let tied = state.clone();
    while let Some(BlockKind::MarketRollOff(_)) = state.block.as_ref().map(|b| &b.kind) {
        let waiting = state.block.as_ref().unwrap().waiting_for.clone();
        for player in waiting {
            state = apply_command(&state, &Command::SubmitMarketRollOff { player }).unwrap();
        }
    }
    (tied, state)
}

#[test]
fn three_way_buy_tie_rolls_off_and_charges_only_the_winner() {
    let (tied, state) = three_way_tie(40, Bid::Buy { amount: 2 });
    let Some(BlockKind::MarketRollOff(roll_off)) = tied.block.as_ref().map(|b| &b.kind) else {
        panic!("tie should open a roll-off");
    };
    assert_eq!(roll_off.contenders.len(), 3);
    assert_eq!(tied.block.as_ref().unwrap().waiting_for.len(), 3);

    let purchase = &state.market.purchases[0];
    assert_eq!(purchase.paid, 2);
    assert_eq!(purchase.card, roll_off.card);
    for player in &state.players {
        let expected = if player.id == purchase.player { 4 } else { 6 };
        assert_eq!(player.resources.gold, expected);
    }
    assert!(state.log.count_of(EventKind::RollOffRound) >= 1);

    // The last round's lowest roll takes the card.
    let last = state.log.last_of(EventKind::RollOffRound).unwrap();
    let rolls = last.payload["rolls"].as_object().unwrap();
    let lowest = rolls.values().filter_map(serde_json::Value::as_u64).min().unwrap();
    assert_eq!(rolls[purchase.player.as_str()].as_u64(), Some(lowest));
}

#[test]
fn three_way_pass_tie_pays_the_pot_to_the_roll_off_winner() {
    let (_, state) = three_way_tie(41, Bid::Pass { amount: 1 });
    let purchase = &state.market.purchases[0];
    assert_eq!(purchase.received, 3);
    for player in &state.players {
        let expected = if player.id == purchase.player { 6 - 1 + 3 } else { 5 };
        assert_eq!(player.resources.gold, expected);
    }
}

#[test]
fn roll_offs_are_seed_stable() {
    let (_, first) = three_way_tie(42, Bid::Buy { amount: 1 });
    let (_, second) = three_way_tie(42, Bid::Buy { amount: 1 });
    assert_eq!(first.market.purchases, second.market.purchases);
    assert_eq!(first.digest(), second.digest());
}
