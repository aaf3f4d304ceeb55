//! Per-card simultaneous-bid market.
//!
//! Each round deals a row sized to the player count. Cards are auctioned one
//! at a time: the highest buy wins, otherwise the lowest pass wins and takes
//! the pot. Ties go to a roll-off that keeps the lowest roll.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::block::{Block, BlockKind};
use crate::catalog::Age;
use crate::command::CommandError;
use crate::events::EventKind;
use crate::ids::{CardInstanceId, PlayerId};
use crate::numbers::{u32_to_usize, usize_to_u32};
use crate::constants::DIE_SIDES;
use crate::state::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Bid {
    Buy { amount: u32 },
    Pass { amount: u32 },
}

impl Bid {
    #[must_use]
    pub const fn amount(self) -> u32 {
        match self {
            Self::Buy { amount } | Self::Pass { amount } => amount,
        }
    }
}

/// Which comparison produced the tie being rolled off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RollOffMode {
    Buy { amount: u32 },
    Pass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOff {
    pub card: CardInstanceId,
    pub mode: RollOffMode,
    pub contenders: Vec<PlayerId>,
    /// Completed roll rounds, oldest first.
    #[serde(default)]
    pub rounds: Vec<BTreeMap<PlayerId, u32>>,
    pub bids: BTreeMap<PlayerId, Bid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub player: PlayerId,
    pub card: CardInstanceId,
    pub paid: u32,
    pub received: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    pub row: Vec<CardInstanceId>,
    pub row_index: usize,
    /// Players still bidding on this row, in seat order.
    pub active: Vec<PlayerId>,
    pub dealt: bool,
    #[serde(default)]
    pub purchases: Vec<Purchase>,
}

impl MarketState {
    #[must_use]
    pub fn current_card(&self) -> Option<CardInstanceId> {
        self.row.get(self.row_index).copied()
    }
}

fn take_from_deck(state: &mut GameState, age: Age, count: usize) -> Vec<CardInstanceId> {
    let Some(deck) = state.decks.get_mut(&age) else {
        return Vec::new();
    };
    let take = count.min(deck.len());
    deck.drain(..take).collect()
}

/// Return cards to the bottom of their age decks.
pub fn return_to_decks(state: &mut GameState, cards: &[CardInstanceId]) {
    for card in cards {
        let Some(age) = state.card_def(*card).and_then(|def| def.age) else {
            log::warn!("card {card} has no market age; dropping from market");
            continue;
        };
        state.decks.entry(age).or_default().push(*card);
    }
}

/// Deal this round's row: preview cards from the next age, the rest from the
/// current one, topped up from later ages when decks run dry.
pub fn deal_row(state: &mut GameState) {
    let size = state.players.len();
    let age = state.config.age_for_round(state.round);
    let preview = u32_to_usize(state.config.preview_for_round(state.round)).min(size);

    let mut row = match age.next() {
        Some(next) => take_from_deck(state, next, preview),
        None => Vec::new(),
    };
    let mut source = Some(age);
    while row.len() < size {
        let Some(current) = source else { break };
        let needed = size - row.len();
        row.extend(take_from_deck(state, current, needed));
        source = current.next();
    }
    let row = state.shuffle(row);

    state.market = MarketState {
        row,
        row_index: 0,
        active: state.player_ids(),
        dealt: true,
        purchases: Vec::new(),
    };
    let cards: Vec<_> = state
        .market
        .row
        .iter()
        .map(|card| state.card_id(*card).cloned())
        .collect();
    state.push_event(
        EventKind::MarketDealt,
        serde_json::json!({ "age": age, "preview": preview, "cards": cards }),
    );
}

/// Open a bid block for the next card. Returns `false` when the row is finished.
pub fn open_next_bid(state: &mut GameState) -> bool {
    let Some(card) = state.market.current_card() else {
        return false;
    };
    if state.market.active.is_empty() {
        return false;
    }
    state.block = Some(Block::new(
        state.market.active.clone(),
        BlockKind::MarketBids {
            card,
            row_index: state.market.row_index,
            bids: BTreeMap::new(),
        },
    ));
    true
}

/// Bid bounds: buys need at least 1 gold, every bid must be covered by gold on hand.
///
/// # Errors
///
/// Returns `CommandError::InvalidBid` when the bid is out of bounds.
pub fn validate_bid(state: &GameState, player: &PlayerId, bid: Bid) -> Result<(), CommandError> {
    let gold = state
        .player(player)
        .map(|p| p.resources.gold)
        .ok_or_else(|| CommandError::UnknownPlayer(player.clone()))?;
    if let Bid::Buy { amount: 0 } = bid {
        return Err(CommandError::InvalidBid(String::from("buy bids must be at least 1")));
    }
    if bid.amount() > gold {
        return Err(CommandError::InvalidBid(format!(
            "bid of {} exceeds {gold} gold on hand",
            bid.amount()
        )));
    }
    Ok(())
}

fn in_seat_order(state: &GameState, mut players: Vec<PlayerId>) -> Vec<PlayerId> {
    players.sort_by_key(|player| state.seat_of(player).unwrap_or(usize::MAX));
    players
}

/// Settle a completed bid block: a single best bid wins, ties roll off.
pub fn resolve_bids(state: &mut GameState, card: CardInstanceId, bids: BTreeMap<PlayerId, Bid>) {
    let best_buy = bids
        .values()
        .filter_map(|bid| match bid {
            Bid::Buy { amount } => Some(*amount),
            Bid::Pass { .. } => None,
        })
        .max();
    let (mode, tied): (RollOffMode, Vec<PlayerId>) = match best_buy {
        Some(amount) => (
            RollOffMode::Buy { amount },
            bids.iter()
                .filter(|(_, bid)| **bid == Bid::Buy { amount })
                .map(|(player, _)| player.clone())
                .collect(),
        ),
        None => {
            let lowest = bids.values().map(|bid| bid.amount()).min().unwrap_or(0);
            (
                RollOffMode::Pass,
                bids.iter()
                    .filter(|(_, bid)| **bid == Bid::Pass { amount: lowest })
                    .map(|(player, _)| player.clone())
                    .collect(),
            )
        }
    };
    let tied = in_seat_order(state, tied);
    match tied.as_slice() {
        [] => {
            log::error!("bid block for {card} resolved without bids");
            state.market.row_index += 1;
        }
        [winner] => {
            let winner = winner.clone();
            settle(state, &winner, card, mode, &bids);
        }
        _ => {
            state.block = Some(Block::new(
                tied.clone(),
                BlockKind::MarketRollOff(RollOff {
                    card,
                    mode,
                    contenders: tied,
                    rounds: Vec::new(),
                    bids,
                }),
            ));
        }
    }
}

/// Roll one die per contender and keep the tied-lowest.
#[must_use]
pub fn roll_off_round(state: &mut GameState, contenders: &[PlayerId]) -> (BTreeMap<PlayerId, u32>, Vec<PlayerId>) {
    let rolls: BTreeMap<PlayerId, u32> = contenders
        .iter()
        .map(|player| (player.clone(), state.roll_die(DIE_SIDES)))
        .collect();
    let lowest = rolls.values().copied().min().unwrap_or(0);
    let remaining = contenders
        .iter()
        .filter(|player| rolls.get(*player) == Some(&lowest))
        .cloned()
        .collect();
    (rolls, remaining)
}

/// Resolve one roll-off round once every contender acknowledged.
pub fn resolve_roll_off(state: &mut GameState, mut roll_off: RollOff) {
    let (rolls, remaining) = roll_off_round(state, &roll_off.contenders);
    state.push_event(
        EventKind::RollOffRound,
        serde_json::json!({
            "card": roll_off.card,
            "round": roll_off.rounds.len() + 1,
            "rolls": rolls,
        }),
    );
    roll_off.rounds.push(rolls);
    if let [winner] = remaining.as_slice() {
        let winner = winner.clone();
        settle(state, &winner, roll_off.card, roll_off.mode, &roll_off.bids);
        return;
    }
    roll_off.contenders = remaining.clone();
    state.block = Some(Block::new(remaining, BlockKind::MarketRollOff(roll_off)));
}

fn settle(
    state: &mut GameState,
    winner: &PlayerId,
    card: CardInstanceId,
    mode: RollOffMode,
    bids: &BTreeMap<PlayerId, Bid>,
) {
    let (paid, received) = match mode {
        RollOffMode::Buy { amount } => (state.take_gold(winner, amount), 0),
        RollOffMode::Pass => {
            let mut pot = 0;
            let mut own = 0;
            for (player, bid) in bids {
                let taken = state.take_gold(player, bid.amount());
                if player == winner {
                    own = taken;
                }
                pot += taken;
            }
            (own, state.gain_gold(winner, pot))
        }
    };

    let pile_len = state
        .player(winner)
        .map_or(0, |player| player.deck.draw_pile.len());
    let position = u32_to_usize(state.rand_int(0, usize_to_u32(pile_len)));
    if let Some(player) = state.player_mut(winner) {
        let position = position.min(player.deck.draw_pile.len());
        player.deck.draw_pile.insert(position, card);
    }

    state.market.active.retain(|player| player != winner);
    state.market.row_index += 1;
    state.market.purchases.push(Purchase {
        player: winner.clone(),
        card,
        paid,
        received,
    });
    state.push_event(
        EventKind::CardPurchased,
        serde_json::json!({
            "player": winner,
            "card": state.card_id(card),
            "paid": paid,
            "received": received,
        }),
    );
}

/// Send unsold row cards back under their decks.
pub fn close_market(state: &mut GameState) {
    let unsold: Vec<CardInstanceId> = state
        .market
        .row
        .get(state.market.row_index..)
        .map(<[CardInstanceId]>::to_vec)
        .unwrap_or_default();
    return_to_decks(state, &unsold);
    state.push_event(
        EventKind::MarketClosed,
        serde_json::json!({
            "sold": state.market.purchases.len(),
            "returned": unsold.len(),
        }),
    );
}
