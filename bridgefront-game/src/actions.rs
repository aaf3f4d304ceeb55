//! Action step: simultaneous declarations resolved one entry at a time.
//!
//! Declarations are validated and paid for when accepted. Resolution walks a
//! sorted entry list with a cursor (and an op cursor inside a card) so a
//! battle or scout report can pause the walk and resume it later.

pub mod effects;
pub mod movement;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::board::{EdgeKey, HexKey};
use crate::catalog::{Cost, Targets};
use crate::combat;
use crate::command::CommandError;
use crate::constants::CAPITAL_REINFORCE_FORCES;
use crate::events::EventKind;
use crate::ids::{CardInstanceId, PlayerId, UnitId};
use crate::state::GameState;

use effects::CardProgress;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BasicAction {
    BuildBridge {
        edge: EdgeKey,
    },
    /// Move units one step; an empty `units` list moves the whole stack.
    March {
        from: HexKey,
        to: HexKey,
        #[serde(default)]
        units: Vec<UnitId>,
    },
    CapitalReinforce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Declaration {
    PlayCard {
        card: CardInstanceId,
        #[serde(default)]
        targets: Targets,
    },
    Basic {
        action: BasicAction,
    },
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionEntry {
    pub player: PlayerId,
    pub declaration: Declaration,
}

/// Sorted declarations of one action step plus where resolution stands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResolution {
    pub entries: Vec<ResolutionEntry>,
    pub cursor: usize,
    /// Next effect op of the card under the cursor.
    #[serde(default)]
    pub op_cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Blocked,
    Finished,
}

/// Players who still declare this round, in lead order.
#[must_use]
pub fn eligible_players(state: &GameState) -> Vec<PlayerId> {
    state
        .lead_order()
        .into_iter()
        .filter(|id| {
            state
                .player(id)
                .is_some_and(|p| !p.done_this_round && p.resources.mana >= 1)
        })
        .collect()
}

fn ensure_affordable(state: &GameState, player: &PlayerId, cost: Cost) -> Result<(), CommandError> {
    let resources = state
        .player(player)
        .map(|p| p.resources)
        .ok_or_else(|| CommandError::UnknownPlayer(player.clone()))?;
    if resources.mana < cost.mana || resources.gold < cost.gold {
        return Err(CommandError::Unaffordable {
            mana: cost.mana,
            gold: cost.gold,
        });
    }
    Ok(())
}

/// Full price of playing `card` now, including the champion surcharge.
///
/// # Errors
///
/// Fails when the card is unknown or the champion limit is reached.
pub fn card_cost(state: &GameState, player: &PlayerId, card: CardInstanceId) -> Result<Cost, CommandError> {
    let def = state
        .card_def(card)
        .ok_or_else(|| CommandError::InvalidSelection(format!("unknown card {card}")))?;
    let mut cost = def.cost;
    if def.champion().is_some() {
        let owned = crate::numbers::usize_to_u32(state.board.champions_of(player));
        if owned >= state.config.champion_limit {
            return Err(CommandError::InvalidSelection(format!(
                "champion limit of {} reached",
                state.config.champion_limit
            )));
        }
        cost.gold += state.config.champion_cost_step * owned;
    }
    Ok(cost)
}

/// Check a declaration against the current state and return what it costs.
///
/// # Errors
///
/// Returns the `CommandError` describing the first failed check.
pub fn validate_declaration(
    state: &GameState,
    player: &PlayerId,
    declaration: &Declaration,
) -> Result<Cost, CommandError> {
    match declaration {
        Declaration::Done => Ok(Cost::default()),
        Declaration::PlayCard { card, targets } => {
            let in_hand = state
                .player(player)
                .is_some_and(|p| p.deck.hand.contains(card));
            if !in_hand {
                return Err(CommandError::InvalidSelection(format!("card {card} is not in hand")));
            }
            let cost = card_cost(state, player, *card)?;
            ensure_affordable(state, player, cost)?;
            let def = state
                .card_def(*card)
                .ok_or_else(|| CommandError::InvalidSelection(format!("unknown card {card}")))?;
            effects::validate_targets(state, player, def, targets)?;
            Ok(cost)
        }
        Declaration::Basic { action } => {
            let cost = Cost {
                mana: state.config.basic_action_mana_cost,
                gold: 0,
            };
            ensure_affordable(state, player, cost)?;
            validate_basic(state, player, action)?;
            Ok(cost)
        }
    }
}

fn validate_basic(state: &GameState, player: &PlayerId, action: &BasicAction) -> Result<(), CommandError> {
    match action {
        BasicAction::BuildBridge { edge } => {
            if !state.board.can_build_bridge(*edge) {
                return Err(CommandError::InvalidTarget(format!("cannot build a bridge on {edge}")));
            }
            let (a, b) = edge.endpoints();
            if !(effects::has_presence(state, player, a) || effects::has_presence(state, player, b)) {
                return Err(CommandError::InvalidTarget(format!("no presence next to {edge}")));
            }
            Ok(())
        }
        BasicAction::March { from, to, units } => {
            movement::validate_stack(state, player, *from, units)?;
            if movement::find_path(state, player, *from, *to, 1).is_none() {
                return Err(CommandError::InvalidTarget(format!("no route from {from} to {to}")));
            }
            Ok(())
        }
        BasicAction::CapitalReinforce => {
            let capital = state
                .player(player)
                .and_then(|p| p.capital)
                .ok_or_else(|| CommandError::InvalidTarget(String::from("no capital")))?;
            if !state.board.can_enter(capital, player) {
                return Err(CommandError::InvalidTarget(format!("capital {capital} is full")));
            }
            Ok(())
        }
    }
}

/// Deduct the accepted declaration's cost and take a played card out of hand.
pub fn pay_declaration(state: &mut GameState, player: &PlayerId, declaration: &Declaration, cost: Cost) {
    let Some(p) = state.player_mut(player) else {
        return;
    };
    p.resources.mana = p.resources.mana.saturating_sub(cost.mana);
    p.resources.gold = p.resources.gold.saturating_sub(cost.gold);
    match declaration {
        Declaration::PlayCard { card, .. } => p.deck.hand.retain(|held| held != card),
        Declaration::Done => p.done_this_round = true,
        Declaration::Basic { .. } => {}
    }
}

/// Order declarations: cards by initiative, then basics by faction priority,
/// then done markers; lead order breaks every tie.
#[must_use]
pub fn build_resolution(state: &GameState, declarations: BTreeMap<PlayerId, Declaration>) -> ActionResolution {
    let mut keyed: Vec<((u8, usize, usize), ResolutionEntry)> = declarations
        .into_iter()
        .map(|(player, declaration)| {
            let rank = state.lead_rank(&player);
            let key = match &declaration {
                Declaration::PlayCard { card, .. } => {
                    let initiative = state.card_def(*card).map_or(u32::MAX, |def| def.initiative);
                    (0, crate::numbers::u32_to_usize(initiative), rank)
                }
                Declaration::Basic { .. } => {
                    let faction_rank = state
                        .player(&player)
                        .map_or(usize::MAX, |p| state.config.basic_action_rank(&p.faction));
                    (1, faction_rank, rank)
                }
                Declaration::Done => (2, 0, rank),
            };
            (key, ResolutionEntry { player, declaration })
        })
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    ActionResolution {
        entries: keyed.into_iter().map(|(_, entry)| entry).collect(),
        cursor: 0,
        op_cursor: 0,
    }
}

fn advance(state: &mut GameState) {
    if let Some(resolution) = state.resolution.as_mut() {
        resolution.cursor += 1;
        resolution.op_cursor = 0;
    }
}

/// Resolve entries until one pauses on a block or the list runs out.
pub fn continue_resolution(state: &mut GameState) -> Progress {
    loop {
        let Some(resolution) = state.resolution.as_ref() else {
            return Progress::Finished;
        };
        let Some(entry) = resolution.entries.get(resolution.cursor).cloned() else {
            state.resolution = None;
            return Progress::Finished;
        };
        let op_cursor = resolution.op_cursor;
        let player = entry.player;

        match entry.declaration {
            Declaration::Done => {
                advance(state);
                state.push_event(EventKind::PlayerDone, serde_json::json!({ "player": player }));
            }
            Declaration::Basic { action } => {
                // Advance first so a battle pause resumes at the next entry.
                advance(state);
                if let Some(battle) = resolve_basic(state, &player, &action) {
                    if combat::begin_battle(state, battle).is_none() {
                        return Progress::Blocked;
                    }
                }
            }
            Declaration::PlayCard { card, targets } => {
                match effects::run_card(state, &player, card, &targets, op_cursor) {
                    CardProgress::Blocked { next_op } => {
                        if let Some(resolution) = state.resolution.as_mut() {
                            resolution.op_cursor = next_op;
                        }
                        return Progress::Blocked;
                    }
                    CardProgress::Done { fizzled } => {
                        finish_card(state, &player, card, fizzled);
                        advance(state);
                    }
                }
            }
        }
    }
}

/// Run a basic action; returns a battle to start when it made a hex contested.
fn resolve_basic(state: &mut GameState, player: &PlayerId, action: &BasicAction) -> Option<combat::BattleSetup> {
    if let Err(err) = validate_basic(state, player, action) {
        state.push_event(
            EventKind::CardFizzled,
            serde_json::json!({ "player": player, "basic": action, "reason": err.to_string() }),
        );
        return None;
    }
    let battle = match action {
        BasicAction::BuildBridge { edge } => {
            state.board_mut().add_bridge(*edge, Some(player.clone()), false);
            None
        }
        BasicAction::March { from, to, units } => {
            let stack = movement::select_stack(state, player, *from, units);
            movement::move_units(state, player, *from, *to, &stack)
        }
        BasicAction::CapitalReinforce => {
            let capital = state.player(player).and_then(|p| p.capital)?;
            state.board_mut().place_forces(capital, player, CAPITAL_REINFORCE_FORCES);
            movement::battle_at(state, player, capital)
        }
    };
    state.push_event(
        EventKind::BasicResolved,
        serde_json::json!({ "player": player, "action": action }),
    );
    battle
}

/// Move a resolved card to its resting pile and log the outcome.
fn finish_card(state: &mut GameState, player: &PlayerId, card: CardInstanceId, fizzled: bool) {
    let burns = state.card_def(card).is_some_and(crate::catalog::CardDef::burns_on_play);
    let card_id = state.card_id(card).cloned();
    if let Some(p) = state.player_mut(player) {
        if burns {
            p.burned.push(card);
        } else {
            p.deck.discard_pile.push(card);
        }
        p.flags.cards_played += 1;
    }
    let kind = if fizzled {
        EventKind::CardFizzled
    } else {
        EventKind::CardResolved
    };
    state.push_event(
        kind,
        serde_json::json!({ "player": player, "card": card_id, "burned": burns }),
    );
}
