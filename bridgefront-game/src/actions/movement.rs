//! Stack movement over bridges, with modifier-aware adjacency.

use std::collections::{BTreeMap, VecDeque};

use crate::board::HexKey;
use crate::combat::BattleSetup;
use crate::command::CommandError;
use crate::ids::{PlayerId, UnitId};
use crate::modifiers::hooks::MoveCtx;
use crate::modifiers::query;
use crate::state::GameState;

/// Whether `player` may step directly from `from` to `to`.
#[must_use]
pub fn step_allowed(state: &GameState, player: &PlayerId, from: HexKey, to: HexKey) -> bool {
    if from == to || !state.board.contains(from) || !state.board.contains(to) {
        return false;
    }
    let ctx = MoveCtx::new(player, from, to);
    let adjacent = query(
        &state.modifiers,
        |h| h.adjacency,
        &ctx,
        state.board.is_adjacent(from, to),
    );
    if !adjacent {
        return false;
    }
    let needs_bridge = query(&state.modifiers, |h| h.requires_bridge, &ctx, true);
    !needs_bridge || state.board.has_open_bridge(from, to)
}

/// Movement allowance for a stack starting at `from`.
#[must_use]
pub fn max_distance(state: &GameState, player: &PlayerId, from: HexKey, base: u32) -> u32 {
    let ctx = MoveCtx::new(player, from, from);
    query(&state.modifiers, |h| h.max_distance, &ctx, base)
}

/// Shortest legal route from `from` to `to`, excluding `from`.
///
/// Intermediate hexes must be free of enemies; the destination only has to
/// respect the occupancy cap.
#[must_use]
pub fn find_path(
    state: &GameState,
    player: &PlayerId,
    from: HexKey,
    to: HexKey,
    base_distance: u32,
) -> Option<Vec<HexKey>> {
    if from == to || !state.board.can_enter(to, player) {
        return None;
    }
    let limit = max_distance(state, player, from, base_distance);
    let mut parents: BTreeMap<HexKey, HexKey> = BTreeMap::new();
    let mut queue = VecDeque::from([(from, 0_u32)]);
    while let Some((hex, depth)) = queue.pop_front() {
        if depth >= limit {
            continue;
        }
        for next in state.board.hexes.keys().copied() {
            if next == from || parents.contains_key(&next) || !step_allowed(state, player, hex, next) {
                continue;
            }
            parents.insert(next, hex);
            if next == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(parent) = parents.get(&cursor).copied() {
                    if parent == from {
                        break;
                    }
                    path.push(parent);
                    cursor = parent;
                }
                path.reverse();
                return Some(path);
            }
            if !state.board.has_enemy_at(next, player) {
                queue.push_back((next, depth + 1));
            }
        }
    }
    None
}

/// Check that `units` (or the whole stack when empty) belong to `player` on `from`.
///
/// # Errors
///
/// Returns `CommandError::InvalidTarget` for an empty stack or foreign units.
pub fn validate_stack(
    state: &GameState,
    player: &PlayerId,
    from: HexKey,
    units: &[UnitId],
) -> Result<(), CommandError> {
    let present = state.board.units_at(from, player);
    if present.is_empty() {
        return Err(CommandError::InvalidTarget(format!("no units on {from}")));
    }
    if let Some(stray) = units.iter().find(|unit| !present.contains(unit)) {
        return Err(CommandError::InvalidTarget(format!("unit {stray} is not on {from}")));
    }
    Ok(())
}

/// The units that will move: the requested subset still on `from`, or all of them.
#[must_use]
pub fn select_stack(state: &GameState, player: &PlayerId, from: HexKey, units: &[UnitId]) -> Vec<UnitId> {
    let present = state.board.units_at(from, player);
    if units.is_empty() {
        present
    } else {
        units.iter().copied().filter(|unit| present.contains(unit)).collect()
    }
}

/// Battle to start after `player` arrived on `hex`, if anyone else is there.
#[must_use]
pub fn battle_at(state: &GameState, player: &PlayerId, hex: HexKey) -> Option<BattleSetup> {
    let defender = state
        .board
        .players_at(hex)
        .into_iter()
        .find(|present| present != player)?;
    Some(BattleSetup {
        hex,
        attacker: player.clone(),
        defender,
    })
}

/// Relocate a stack and flag the mover. Returns the battle the move provoked.
pub fn move_units(
    state: &mut GameState,
    player: &PlayerId,
    from: HexKey,
    to: HexKey,
    units: &[UnitId],
) -> Option<BattleSetup> {
    let mut moved = 0;
    for unit in units {
        if state.board_mut().move_unit(*unit, to) {
            moved += 1;
        }
    }
    if let Some(p) = state.player_mut(player) {
        p.flags.moved = true;
    }
    log::debug!("{player} moved {moved} units {from} -> {to}");
    battle_at(state, player, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::EdgeKey;
    use crate::ids::CardId;
    use crate::modifiers::{attach, Duration, ModifierKind, ModifierSource, NewModifier};
    use crate::test_support::arena_state;

    fn bridge_line(state: &mut GameState, hexes: &[HexKey]) {
        for pair in hexes.windows(2) {
            state.board_mut().add_bridge(EdgeKey::new(pair[0], pair[1]), None, false);
        }
    }

    #[test]
    fn movement_needs_bridges_and_respects_distance() {
        let mut state = arena_state(21);
        let a = state.players[0].id.clone();
        let line = [HexKey::origin(), HexKey::new(1, 0), HexKey::new(2, 0)];
        state.board_mut().place_forces(line[0], &a, 1);
        assert!(find_path(&state, &a, line[0], line[1], 1).is_none());

        bridge_line(&mut state, &line);
        assert_eq!(find_path(&state, &a, line[0], line[1], 1), Some(vec![line[1]]));
        assert!(find_path(&state, &a, line[0], line[2], 1).is_none());
        assert_eq!(
            find_path(&state, &a, line[0], line[2], 2),
            Some(vec![line[1], line[2]])
        );
    }

    #[test]
    fn enemies_stop_movement_through_a_hex() {
        let mut state = arena_state(22);
        let (a, b) = (state.players[0].id.clone(), state.players[1].id.clone());
        let line = [HexKey::origin(), HexKey::new(1, 0), HexKey::new(2, 0)];
        bridge_line(&mut state, &line);
        state.board_mut().place_forces(line[1], &b, 1);
        assert!(find_path(&state, &a, line[0], line[2], 2).is_none());
        assert_eq!(find_path(&state, &a, line[0], line[1], 2), Some(vec![line[1]]));
    }

    #[test]
    fn ignore_bridges_and_extra_move_widen_movement() {
        let mut state = arena_state(23);
        let a = state.players[0].id.clone();
        let far = HexKey::new(2, 0);
        attach(
            &mut state,
            NewModifier {
                source: ModifierSource::Card { card: CardId::new("test") },
                owner: Some(a.clone()),
                duration: Duration::EndOfRound,
                scope: None,
                kind: ModifierKind::IgnoreBridges,
            },
        );
        assert!(find_path(&state, &a, HexKey::origin(), far, 1).is_none());
        attach(
            &mut state,
            NewModifier {
                source: ModifierSource::Card { card: CardId::new("test") },
                owner: Some(a.clone()),
                duration: Duration::EndOfRound,
                scope: None,
                kind: ModifierKind::ExtraMove { amount: 1 },
            },
        );
        assert_eq!(find_path(&state, &a, HexKey::origin(), far, 1).map(|p| p.len()), Some(2));
    }

    #[test]
    fn tunnels_link_distant_hexes_for_their_owner() {
        let mut state = arena_state(24);
        let (a, b) = (state.players[0].id.clone(), state.players[1].id.clone());
        let far = HexKey::new(0, 3);
        attach(
            &mut state,
            NewModifier {
                source: ModifierSource::Card { card: CardId::new("tunnelers") },
                owner: Some(a.clone()),
                duration: Duration::EndOfRound,
                scope: None,
                kind: ModifierKind::Tunnel { a: HexKey::origin(), b: far },
            },
        );
        assert!(step_allowed(&state, &a, HexKey::origin(), far));
        assert!(step_allowed(&state, &a, far, HexKey::origin()));
        assert!(!step_allowed(&state, &b, HexKey::origin(), far));
    }

    #[test]
    fn moving_into_an_enemy_starts_a_battle() {
        let mut state = arena_state(25);
        let (a, b) = (state.players[0].id.clone(), state.players[1].id.clone());
        let to = HexKey::new(1, 0);
        let units = state.board_mut().place_forces(HexKey::origin(), &a, 2);
        state.board_mut().place_forces(to, &b, 1);
        let battle = move_units(&mut state, &a, HexKey::origin(), to, &units).unwrap();
        assert_eq!(battle.attacker, a);
        assert_eq!(battle.defender, b);
        assert!(state.players[0].flags.moved);
    }
}
