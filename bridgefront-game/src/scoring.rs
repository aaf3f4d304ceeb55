//! Control scoring and winner ordering.

use std::cmp::Reverse;

use crate::board::TileKind;
use crate::constants::{CAPITAL_CONTROL_VP, CENTER_CONTROL_VP, FORGE_CONTROL_VP};
use crate::events::EventKind;
use crate::ids::PlayerId;
use crate::modifiers::hooks::ScoreCtx;
use crate::modifiers::query;
use crate::state::GameState;

/// Control points for hexes `player` holds alone: the center, forges and
/// enemy capitals, plus any control bonus when at least one is held.
#[must_use]
pub fn control_points(state: &GameState, player: &PlayerId) -> u32 {
    let mut points = 0;
    let mut held = 0;
    for (key, hex) in &state.board.hexes {
        if state.board.sole_occupant(*key) != Some(player) {
            continue;
        }
        let base = match hex.tile {
            TileKind::Center => CENTER_CONTROL_VP,
            TileKind::Forge => FORGE_CONTROL_VP,
            TileKind::Capital if hex.owner.as_ref() != Some(player) => CAPITAL_CONTROL_VP,
            _ => continue,
        };
        let ctx = ScoreCtx {
            player: player.clone(),
            hex: Some(*key),
            tile: Some(hex.tile),
        };
        points += query(&state.modifiers, |h| h.control_value, &ctx, base);
        held += 1;
    }
    if held > 0 {
        let ctx = ScoreCtx {
            player: player.clone(),
            hex: None,
            tile: None,
        };
        points += query(&state.modifiers, |h| h.control_bonus, &ctx, 0);
    }
    points
}

/// Recompute control and total victory points for every player.
pub fn update_scores(state: &mut GameState) {
    let scores: Vec<(PlayerId, u32)> = state
        .players
        .iter()
        .map(|p| (p.id.clone(), control_points(state, &p.id)))
        .collect();
    for (id, control) in scores {
        if let Some(player) = state.player_mut(&id) {
            player.vp.control = control;
            player.vp.recompute();
        }
    }
    let totals: std::collections::BTreeMap<String, u32> = state
        .players
        .iter()
        .map(|p| (p.id.to_string(), p.vp.total))
        .collect();
    state.push_event(
        EventKind::ScoreUpdated,
        serde_json::json!({ "round": state.round, "totals": totals }),
    );
}

/// Order candidates by total, permanent points and gold (all descending),
/// then by seat.
#[must_use]
pub fn winner_order(state: &GameState, candidates: &[PlayerId]) -> Vec<PlayerId> {
    let mut ranked: Vec<_> = candidates
        .iter()
        .filter_map(|id| state.player(id))
        .map(|p| {
            (
                (
                    Reverse(p.vp.total),
                    Reverse(p.vp.permanent),
                    Reverse(p.resources.gold),
                    p.seat,
                ),
                p.id.clone(),
            )
        })
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked.into_iter().map(|(_, id)| id).collect()
}

/// Winner after scoring: the best qualifying player, or the best overall
/// once the round cap is reached.
#[must_use]
pub fn determine_winner(state: &GameState) -> Option<PlayerId> {
    let qualifying: Vec<PlayerId> = state
        .players
        .iter()
        .filter(|p| p.vp.total >= state.config.vp_target)
        .map(|p| p.id.clone())
        .collect();
    let candidates = if !qualifying.is_empty() {
        qualifying
    } else if state.round >= state.config.round_cap {
        state.player_ids()
    } else {
        return None;
    };
    winner_order(state, &candidates).into_iter().next()
}
