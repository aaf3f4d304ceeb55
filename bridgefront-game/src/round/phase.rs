//! Round step handlers: reset, quiet study, sieges, collection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::block::{Block, BlockKind};
use crate::board::{HexKey, TileKind};
use crate::combat::BattleSetup;
use crate::command::CommandError;
use crate::events::EventKind;
use crate::ids::{CardInstanceId, PlayerId};
use crate::market::return_to_decks;
use crate::modifiers::hooks::EconomyCtx;
use crate::modifiers::query;
use crate::numbers::{u32_to_usize, usize_to_u32};
use crate::state::{GameState, RoundFlags};

/// One decision a player owes during collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CollectionPrompt {
    /// A held forge offers cards from the current age deck.
    Forge {
        hex: HexKey,
        offers: Vec<CardInstanceId>,
    },
}

/// Answer to one `CollectionPrompt`, matched by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CollectionChoice {
    /// Take one offered card into the discard pile.
    Draft { card: CardInstanceId },
    /// Remove a card in hand from the game.
    Scrap { card: CardInstanceId },
    Skip,
}

pub(crate) fn reset_round(state: &mut GameState) {
    state.round += 1;
    let count = state.players.len().max(1);
    state.lead_seat = u32_to_usize(state.round.saturating_sub(1)) % count;
    state.market.dealt = false;
    state.resolution = None;
    state.sieges_fought.clear();

    let mana_cap = state.config.mana_cap;
    let hand_limit = state.config.hand_limit;
    for id in state.player_ids() {
        if let Some(player) = state.player_mut(&id) {
            player.resources.mana = mana_cap;
            player.flags = RoundFlags::default();
            player.done_this_round = false;
        }
        state.draw_cards(&id, hand_limit);
    }
    state.push_event(
        EventKind::RoundStarted,
        serde_json::json!({
            "round": state.round,
            "lead": state.lead_order().first(),
            "age": state.config.age_for_round(state.round),
        }),
    );
}

pub(crate) fn open_study(state: &mut GameState) {
    let max_discard = state.config.study_max_discard;
    if max_discard == 0 {
        return;
    }
    let waiting: Vec<PlayerId> = state
        .players
        .iter()
        .filter(|p| !p.deck.hand.is_empty())
        .map(|p| p.id.clone())
        .collect();
    if waiting.is_empty() {
        return;
    }
    state.block = Some(Block::new(
        waiting,
        BlockKind::QuietStudy {
            max_discard,
            submitted: BTreeMap::new(),
        },
    ));
}

/// Discards must be distinct cards in hand, at most `max_discard` of them.
///
/// # Errors
///
/// Returns `CommandError::InvalidSelection` otherwise.
pub fn validate_study(
    state: &GameState,
    player: &PlayerId,
    discard: &[CardInstanceId],
    max_discard: u32,
) -> Result<(), CommandError> {
    if discard.len() > u32_to_usize(max_discard) {
        return Err(CommandError::InvalidSelection(format!(
            "discard at most {max_discard} cards"
        )));
    }
    let hand = state
        .player(player)
        .map(|p| p.deck.hand.as_slice())
        .unwrap_or_default();
    for (index, card) in discard.iter().enumerate() {
        if !hand.contains(card) || discard[..index].contains(card) {
            return Err(CommandError::InvalidSelection(format!("{card} is not in hand")));
        }
    }
    Ok(())
}

pub(crate) fn settle_study(state: &mut GameState, submitted: &BTreeMap<PlayerId, Vec<CardInstanceId>>) {
    for id in state.player_ids() {
        let Some(discard) = submitted.get(&id).filter(|cards| !cards.is_empty()) else {
            continue;
        };
        if let Some(player) = state.player_mut(&id) {
            player.deck.hand.retain(|card| !discard.contains(card));
            player.deck.discard_pile.extend(discard.iter().copied());
            player.flags.cards_discarded += usize_to_u32(discard.len());
        }
        let drawn = state.draw_cards(&id, usize_to_u32(discard.len()));
        state.push_event(
            EventKind::StudyResolved,
            serde_json::json!({ "player": id, "discarded": discard.len(), "drawn": drawn }),
        );
    }
}

/// Next contested hex to fight over this sieges step; the occupant earliest
/// in lead order attacks.
pub(crate) fn next_siege(state: &mut GameState) -> Option<BattleSetup> {
    let hex = state
        .board
        .contested_hexes()
        .into_iter()
        .find(|hex| !state.sieges_fought.contains(hex))?;
    state.sieges_fought.insert(hex);
    let mut present = state.board.players_at(hex);
    present.sort_by_key(|player| state.lead_rank(player));
    let mut present = present.into_iter();
    let attacker = present.next()?;
    let defender = present.next()?;
    Some(BattleSetup {
        hex,
        attacker,
        defender,
    })
}

/// Hexes a player holds alone, with their tile.
fn held_tiles(state: &GameState, player: &PlayerId) -> Vec<(HexKey, TileKind)> {
    state
        .board
        .hexes
        .iter()
        .filter(|(key, _)| state.board.sole_occupant(**key) == Some(player))
        .map(|(key, hex)| (*key, hex.tile))
        .collect()
}

pub(crate) fn collect_income(state: &mut GameState) {
    for id in state.player_ids() {
        let mut mine_gold = 0;
        for (hex, tile) in held_tiles(state, &id) {
            if tile != TileKind::Mine {
                continue;
            }
            let base = state
                .board
                .hex(hex)
                .and_then(|h| h.mine_value)
                .unwrap_or_default();
            let ctx = EconomyCtx::new(&id, Some(hex));
            mine_gold += query(&state.modifiers, |h| h.mine_gold, &ctx, base);
        }
        let base = state.config.base_gold_income;
        let gained = state.gain_gold(&id, base + mine_gold);
        state.push_event(
            EventKind::IncomeCollected,
            serde_json::json!({ "player": id, "base": base, "mines": mine_gold, "gained": gained }),
        );
    }
}

pub(crate) fn open_forge_prompts(state: &mut GameState) {
    let age = state.config.age_for_round(state.round);
    let mut prompts: BTreeMap<PlayerId, Vec<CollectionPrompt>> = BTreeMap::new();
    for id in state.player_ids() {
        for (hex, tile) in held_tiles(state, &id) {
            if tile != TileKind::Forge {
                continue;
            }
            let ctx = EconomyCtx::new(&id, Some(hex));
            let count = query(
                &state.modifiers,
                |h| h.card_choice_count,
                &ctx,
                state.config.forge_card_choices,
            );
            let deck = state.decks.entry(age).or_default();
            let take = u32_to_usize(count).min(deck.len());
            let offers: Vec<CardInstanceId> = deck.drain(..take).collect();
            prompts
                .entry(id.clone())
                .or_default()
                .push(CollectionPrompt::Forge { hex, offers });
        }
    }
    if prompts.is_empty() {
        return;
    }
    let waiting = state
        .player_ids()
        .into_iter()
        .filter(|id| prompts.contains_key(id))
        .collect();
    state.block = Some(Block::new(
        waiting,
        BlockKind::Collection {
            prompts,
            choices: BTreeMap::new(),
        },
    ));
}

/// One choice per prompt at most; drafts must come from that prompt's offers
/// and scraps from the hand.
///
/// # Errors
///
/// Returns `CommandError::InvalidSelection` for a mismatched choice.
pub fn validate_collection(
    state: &GameState,
    player: &PlayerId,
    prompts: &[CollectionPrompt],
    choices: &[CollectionChoice],
) -> Result<(), CommandError> {
    if choices.len() > prompts.len() {
        return Err(CommandError::InvalidSelection(format!(
            "{} choices for {} prompts",
            choices.len(),
            prompts.len()
        )));
    }
    let hand = state
        .player(player)
        .map(|p| p.deck.hand.as_slice())
        .unwrap_or_default();
    let mut scrapped = Vec::new();
    for (prompt, choice) in prompts.iter().zip(choices) {
        let CollectionPrompt::Forge { offers, .. } = prompt;
        match choice {
            CollectionChoice::Draft { card } if !offers.contains(card) => {
                return Err(CommandError::InvalidSelection(format!("{card} was not offered")));
            }
            CollectionChoice::Scrap { card } => {
                if !hand.contains(card) || scrapped.contains(card) {
                    return Err(CommandError::InvalidSelection(format!("{card} is not in hand")));
                }
                scrapped.push(*card);
            }
            _ => {}
        }
    }
    Ok(())
}

pub(crate) fn settle_collection(
    state: &mut GameState,
    prompts: &BTreeMap<PlayerId, Vec<CollectionPrompt>>,
    choices: &BTreeMap<PlayerId, Vec<CollectionChoice>>,
) {
    for (id, player_prompts) in prompts {
        let answers = choices.get(id).map(Vec::as_slice).unwrap_or_default();
        let mut drafted = 0;
        let mut scrapped = 0;
        for (index, prompt) in player_prompts.iter().enumerate() {
            let CollectionPrompt::Forge { offers, .. } = prompt;
            let choice = answers.get(index).copied().unwrap_or(CollectionChoice::Skip);
            let mut returned = offers.clone();
            match choice {
                CollectionChoice::Draft { card } => {
                    returned.retain(|offer| *offer != card);
                    if let Some(player) = state.player_mut(id) {
                        player.deck.discard_pile.push(card);
                    }
                    drafted += 1;
                }
                CollectionChoice::Scrap { card } => {
                    if let Some(player) = state.player_mut(id) {
                        if let Some(position) = player.deck.hand.iter().position(|held| *held == card) {
                            player.deck.hand.remove(position);
                            player.deck.scrapped.push(card);
                            scrapped += 1;
                        }
                    }
                }
                CollectionChoice::Skip => {}
            }
            return_to_decks(state, &returned);
        }
        state.push_event(
            EventKind::CollectionResolved,
            serde_json::json!({ "player": id, "drafted": drafted, "scrapped": scrapped }),
        );
    }
}
