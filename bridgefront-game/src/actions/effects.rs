//! Card effect ops and their target checks.

use crate::actions::movement;
use crate::block::{Block, BlockKind};
use crate::board::{ChampionUnit, EdgeKey, HexKey};
use crate::catalog::{CardDef, EffectOp, ScopeTarget, TargetSpec, Targets};
use crate::combat::{self, BattleSetup};
use crate::command::CommandError;
use crate::events::EventKind;
use crate::ids::{CardInstanceId, ChampionId, PlayerId, UnitId};
use crate::modifiers::hooks::{EconomyCtx, SideCtx};
use crate::modifiers::{
    attach, attach_champion_abilities, query, Duration, ModifierKind, ModifierSource, NewModifier, Scope,
};
use crate::numbers::u32_to_usize;
use crate::state::GameState;

/// Outcome of a single effect op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    Applied,
    Fizzled,
    /// The op left a block behind; resolution pauses after it.
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardProgress {
    Blocked { next_op: usize },
    Done { fizzled: bool },
}

/// Tunnels reach two or three hexes away.
const TUNNEL_RANGE: std::ops::RangeInclusive<u32> = 2..=3;

/// The player's capital or a hex where they have units.
#[must_use]
pub fn has_presence(state: &GameState, player: &PlayerId, hex: HexKey) -> bool {
    state.board.has_units_at(hex, player)
        || state.player(player).and_then(|p| p.capital) == Some(hex)
}

fn invalid(message: String) -> CommandError {
    CommandError::InvalidTarget(message)
}

fn first_edge_op(def: &CardDef) -> Option<&EffectOp> {
    def.effects.iter().find(|op| {
        matches!(
            op,
            EffectOp::BuildBridge | EffectOp::TemporaryBridge | EffectOp::DestroyBridge | EffectOp::LockBridge
        )
    })
}

fn first_path_op(def: &CardDef) -> Option<&EffectOp> {
    def.effects
        .iter()
        .find(|op| matches!(op, EffectOp::MoveStack { .. } | EffectOp::OpenTunnel))
}

/// Check declared targets against the card's target spec.
///
/// # Errors
///
/// Returns `CommandError::InvalidTarget` naming the failed condition.
pub fn validate_targets(
    state: &GameState,
    player: &PlayerId,
    def: &CardDef,
    targets: &Targets,
) -> Result<(), CommandError> {
    match def.target {
        TargetSpec::None => Ok(()),
        TargetSpec::OwnHex => {
            let hex = targets.hex.ok_or_else(|| invalid(String::from("a hex is required")))?;
            if !has_presence(state, player, hex) {
                return Err(invalid(format!("no presence on {hex}")));
            }
            if !state.board.can_enter(hex, player) {
                return Err(invalid(format!("{hex} is full")));
            }
            Ok(())
        }
        TargetSpec::Edge => {
            let edge = targets.edge.ok_or_else(|| invalid(String::from("an edge is required")))?;
            let (a, b) = edge.endpoints();
            if !state.board.is_adjacent(a, b) {
                return Err(invalid(format!("{edge} is not a board edge")));
            }
            match first_edge_op(def) {
                Some(EffectOp::BuildBridge | EffectOp::TemporaryBridge) => {
                    if !state.board.can_build_bridge(edge) {
                        return Err(invalid(format!("{edge} already has a bridge")));
                    }
                    if !(has_presence(state, player, a) || has_presence(state, player, b)) {
                        return Err(invalid(format!("no presence next to {edge}")));
                    }
                    Ok(())
                }
                Some(_) if state.board.bridge(edge).is_none() => {
                    Err(invalid(format!("no bridge on {edge}")))
                }
                _ => Ok(()),
            }
        }
        TargetSpec::OwnChampion => {
            let unit = targets.unit.ok_or_else(|| invalid(String::from("a champion is required")))?;
            let owned = state
                .board
                .unit(unit)
                .is_some_and(|u| &u.owner == player && u.is_champion());
            if owned {
                Ok(())
            } else {
                Err(invalid(format!("{unit} is not your champion")))
            }
        }
        TargetSpec::EnemyUnit => {
            let unit = targets.unit.ok_or_else(|| invalid(String::from("a unit is required")))?;
            let target = state
                .board
                .unit(unit)
                .ok_or_else(|| invalid(format!("{unit} is not on the board")))?;
            if &target.owner == player {
                return Err(invalid(format!("{unit} is your own unit")));
            }
            let in_reach = state.board.has_units_at(target.hex, player)
                || state
                    .board
                    .neighbors(target.hex)
                    .any(|hex| state.board.has_units_at(hex, player));
            if in_reach {
                Ok(())
            } else {
                Err(invalid(format!("{unit} is out of reach")))
            }
        }
        TargetSpec::Path => {
            let (Some(from), Some(to)) = (targets.from, targets.to) else {
                return Err(invalid(String::from("a from and to hex are required")));
            };
            movement::validate_stack(state, player, from, &targets.units)?;
            match first_path_op(def) {
                Some(EffectOp::MoveStack { max_distance }) => {
                    if movement::find_path(state, player, from, to, *max_distance).is_none() {
                        return Err(invalid(format!("no route from {from} to {to}")));
                    }
                    Ok(())
                }
                Some(EffectOp::OpenTunnel) => {
                    if !state.board.contains(to) || !TUNNEL_RANGE.contains(&from.distance(to)) {
                        return Err(invalid(format!("cannot tunnel from {from} to {to}")));
                    }
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }
}

/// Run a card's ops starting at `start_op`.
pub fn run_card(
    state: &mut GameState,
    player: &PlayerId,
    card: CardInstanceId,
    targets: &Targets,
    start_op: usize,
) -> CardProgress {
    let Some(def) = state.card_def(card).cloned() else {
        log::error!("resolving unknown card instance {card}");
        return CardProgress::Done { fizzled: true };
    };
    if start_op == 0 {
        if let Err(err) = validate_targets(state, player, &def, targets) {
            log::debug!("{} fizzles for {player}: {err}", def.id);
            return CardProgress::Done { fizzled: true };
        }
    }
    let mut fizzled = false;
    for (index, op) in def.effects.iter().enumerate().skip(start_op) {
        match apply_op(state, player, card, &def, op, targets) {
            OpOutcome::Applied => {}
            OpOutcome::Fizzled => fizzled = true,
            OpOutcome::Blocked => return CardProgress::Blocked { next_op: index + 1 },
        }
    }
    CardProgress::Done { fizzled }
}

fn deploy_hex(state: &GameState, player: &PlayerId, targets: &Targets) -> Option<HexKey> {
    targets.hex.or_else(|| state.player(player).and_then(|p| p.capital))
}

/// Start the battle an op provoked; `Blocked` when it pauses on retreats.
fn fight(state: &mut GameState, battle: Option<BattleSetup>) -> OpOutcome {
    let Some(setup) = battle else {
        return OpOutcome::Applied;
    };
    if combat::begin_battle(state, setup).is_none() {
        OpOutcome::Blocked
    } else {
        OpOutcome::Applied
    }
}

fn apply_op(
    state: &mut GameState,
    player: &PlayerId,
    card: CardInstanceId,
    def: &CardDef,
    op: &EffectOp,
    targets: &Targets,
) -> OpOutcome {
    match op {
        EffectOp::GainGold { amount } => {
            state.gain_gold(player, *amount);
            OpOutcome::Applied
        }
        EffectOp::GainMana { amount } => {
            state.gain_mana(player, *amount);
            OpOutcome::Applied
        }
        EffectOp::DrawCards { count } => {
            state.draw_cards(player, *count);
            OpOutcome::Applied
        }
        EffectOp::GainVictoryPoints { amount } => {
            if let Some(p) = state.player_mut(player) {
                p.vp.permanent += amount;
                p.vp.recompute();
            }
            OpOutcome::Applied
        }
        EffectOp::DeployForces { count } => {
            let Some(hex) = deploy_hex(state, player, targets) else {
                return OpOutcome::Fizzled;
            };
            if !state.board.can_enter(hex, player) {
                return OpOutcome::Fizzled;
            }
            let ctx = EconomyCtx::new(player, Some(hex));
            let count = query(&state.modifiers, |h| h.deploy_count, &ctx, *count);
            state.board_mut().place_forces(hex, player, count);
            let battle = movement::battle_at(state, player, hex);
            fight(state, battle)
        }
        EffectOp::RecruitChampion { champion } => {
            let Some(hex) = deploy_hex(state, player, targets) else {
                return OpOutcome::Fizzled;
            };
            let at_limit = crate::numbers::usize_to_u32(state.board.champions_of(player))
                >= state.config.champion_limit;
            if at_limit || !state.board.can_enter(hex, player) {
                return OpOutcome::Fizzled;
            }
            if recruit(state, player, hex, champion, card).is_none() {
                return OpOutcome::Fizzled;
            }
            let battle = movement::battle_at(state, player, hex);
            fight(state, battle)
        }
        EffectOp::MoveStack { max_distance } => {
            let (Some(from), Some(to)) = (targets.from, targets.to) else {
                return OpOutcome::Fizzled;
            };
            if movement::find_path(state, player, from, to, *max_distance).is_none() {
                return OpOutcome::Fizzled;
            }
            let stack = movement::select_stack(state, player, from, &targets.units);
            if stack.is_empty() {
                return OpOutcome::Fizzled;
            }
            let battle = movement::move_units(state, player, from, to, &stack);
            fight(state, battle)
        }
        EffectOp::BuildBridge | EffectOp::TemporaryBridge => {
            let temporary = matches!(op, EffectOp::TemporaryBridge);
            match targets.edge {
                Some(edge) if state.board_mut().add_bridge(edge, Some(player.clone()), temporary) => {
                    OpOutcome::Applied
                }
                _ => OpOutcome::Fizzled,
            }
        }
        EffectOp::DestroyBridge => match targets.edge.and_then(|edge| state.board_mut().remove_bridge(edge)) {
            Some(_) => OpOutcome::Applied,
            None => OpOutcome::Fizzled,
        },
        EffectOp::LockBridge => match targets.edge {
            Some(edge) if state.board_mut().lock_bridge(edge) => OpOutcome::Applied,
            _ => OpOutcome::Fizzled,
        },
        EffectOp::Heal { amount } => {
            let champion = targets
                .unit
                .and_then(|unit| state.board_mut().unit_mut(unit))
                .filter(|unit| &unit.owner == player)
                .and_then(|unit| unit.champion_mut());
            if let Some(champion) = champion {
                champion.hp = (champion.hp + amount).min(champion.max_hp);
                OpOutcome::Applied
            } else {
                OpOutcome::Fizzled
            }
        }
        EffectOp::Strike { damage } => {
            let Some((unit, hex)) = targets
                .unit
                .and_then(|unit| state.board.unit(unit))
                .filter(|unit| &unit.owner != player)
                .map(|unit| (unit.id, unit.hex))
            else {
                return OpOutcome::Fizzled;
            };
            let attacker = SideCtx::new(player, hex, state.board.units_at(hex, player));
            combat::damage_unit(state, unit, *damage, &attacker);
            OpOutcome::Applied
        }
        EffectOp::OpenTunnel => {
            let (Some(a), Some(b)) = (targets.from, targets.to) else {
                return OpOutcome::Fizzled;
            };
            attach(
                state,
                NewModifier {
                    source: ModifierSource::Card { card: def.id.clone() },
                    owner: Some(player.clone()),
                    duration: Duration::EndOfRound,
                    scope: None,
                    kind: ModifierKind::Tunnel { a, b },
                },
            );
            OpOutcome::Applied
        }
        EffectOp::AddModifier {
            modifier,
            duration,
            scope,
        } => {
            let resolved = match resolve_scope(state, player, *scope, targets) {
                Ok(resolved) => resolved,
                Err(()) => return OpOutcome::Fizzled,
            };
            attach(
                state,
                NewModifier {
                    source: ModifierSource::Card { card: def.id.clone() },
                    owner: Some(player.clone()),
                    duration: *duration,
                    scope: resolved,
                    kind: modifier.clone(),
                },
            );
            OpOutcome::Applied
        }
        EffectOp::ScoutReport { look, keep } => scout(state, player, *look, *keep),
    }
}

fn resolve_scope(
    state: &GameState,
    player: &PlayerId,
    scope: ScopeTarget,
    targets: &Targets,
) -> Result<Option<Scope>, ()> {
    match scope {
        ScopeTarget::None => Ok(None),
        ScopeTarget::TargetHex => targets.hex.map(|hex| Some(Scope::Hex { hex })).ok_or(()),
        ScopeTarget::TargetEdge => targets.edge.map(|edge| Some(Scope::Edge { edge })).ok_or(()),
        ScopeTarget::TargetUnit => targets.unit.map(|unit| Some(Scope::Unit { unit })).ok_or(()),
        ScopeTarget::OwnCapital => state
            .player(player)
            .and_then(|p| p.capital)
            .map(|hex| Some(Scope::Hex { hex }))
            .ok_or(()),
    }
}

/// Place a champion from the catalog and attach its abilities.
pub fn recruit(
    state: &mut GameState,
    player: &PlayerId,
    hex: HexKey,
    champion: &ChampionId,
    card: CardInstanceId,
) -> Option<UnitId> {
    let Some(def) = state.catalog().champion(champion).cloned() else {
        log::warn!("champion {champion} missing from catalog");
        return None;
    };
    let ability_uses = def
        .abilities
        .iter()
        .filter_map(|ability| ability.uses.map(|uses| (ability.name.clone(), uses)))
        .collect();
    let unit = state.board_mut().place_champion(
        hex,
        player,
        ChampionUnit {
            champion: def.id.clone(),
            card,
            hp: def.hp,
            max_hp: def.hp,
            attack_dice: def.attack_dice,
            hit_faces: def.hit_faces,
            bounty: def.bounty,
            ability_uses,
        },
    )?;
    attach_champion_abilities(state, unit);
    Some(unit)
}

fn scout(state: &mut GameState, player: &PlayerId, look: u32, keep: u32) -> OpOutcome {
    let wanted = u32_to_usize(look);
    let needs_reshuffle = state
        .player(player)
        .is_some_and(|p| p.deck.draw_pile.len() < wanted && !p.deck.discard_pile.is_empty());
    if needs_reshuffle {
        let discards = state
            .player_mut(player)
            .map(|p| std::mem::take(&mut p.deck.discard_pile))
            .unwrap_or_default();
        let reshuffled = state.shuffle(discards);
        if let Some(p) = state.player_mut(player) {
            p.deck.draw_pile.extend(reshuffled);
        }
    }
    let revealed: Vec<CardInstanceId> = state
        .player_mut(player)
        .map(|p| {
            let take = wanted.min(p.deck.draw_pile.len());
            p.deck.draw_pile.drain(..take).collect()
        })
        .unwrap_or_default();
    if revealed.is_empty() {
        return OpOutcome::Fizzled;
    }
    state.block = Some(Block::new(
        vec![player.clone()],
        BlockKind::ScoutReport {
            player: player.clone(),
            revealed,
            keep,
            kept: None,
        },
    ));
    OpOutcome::Blocked
}

/// A keep list must be distinct revealed cards, no more than `limit`.
///
/// # Errors
///
/// Returns `CommandError::InvalidSelection` otherwise.
pub fn validate_scout_keep(
    revealed: &[CardInstanceId],
    limit: u32,
    keep: &[CardInstanceId],
) -> Result<(), CommandError> {
    if keep.len() > u32_to_usize(limit) {
        return Err(CommandError::InvalidSelection(format!("keep at most {limit} cards")));
    }
    for (index, card) in keep.iter().enumerate() {
        if !revealed.contains(card) || keep[..index].contains(card) {
            return Err(CommandError::InvalidSelection(format!("{card} cannot be kept")));
        }
    }
    Ok(())
}

/// Kept cards go to hand while it has room, everything else to the discard pile.
pub fn resolve_scout(state: &mut GameState, player: &PlayerId, revealed: &[CardInstanceId], kept: &[CardInstanceId]) {
    let limit = u32_to_usize(state.config.hand_limit);
    if let Some(p) = state.player_mut(player) {
        for card in revealed {
            if kept.contains(card) && p.deck.hand.len() < limit {
                p.deck.hand.push(*card);
            } else {
                p.deck.discard_pile.push(*card);
            }
        }
    }
    state.push_event(
        EventKind::ScoutResolved,
        serde_json::json!({ "player": player, "looked": revealed.len(), "kept": kept.len() }),
    );
}

/// Edges the player could bridge right now.
#[must_use]
pub fn buildable_edges(state: &GameState, player: &PlayerId) -> Vec<EdgeKey> {
    let mut edges: Vec<EdgeKey> = state
        .board
        .hexes
        .keys()
        .copied()
        .filter(|hex| has_presence(state, player, *hex))
        .flat_map(|hex| state.board.neighbors(hex).map(move |next| EdgeKey::new(hex, next)).collect::<Vec<_>>())
        .filter(|edge| state.board.can_build_bridge(*edge))
        .collect();
    edges.sort();
    edges.dedup();
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{action_state, hand_card};

    fn def(state: &GameState, card: CardInstanceId) -> CardDef {
        state.card_def(card).cloned().unwrap()
    }

    #[test]
    fn deploy_targets_need_presence() {
        let mut state = action_state(31);
        let a = state.players[0].id.clone();
        let capital = state.players[0].capital.unwrap();
        let rally = hand_card(&mut state, &a, "rally");
        let rally = def(&state, rally);
        let at_capital = Targets { hex: Some(capital), ..Targets::default() };
        assert!(validate_targets(&state, &a, &rally, &at_capital).is_ok());
        let elsewhere = Targets { hex: Some(HexKey::origin()), ..Targets::default() };
        assert!(validate_targets(&state, &a, &rally, &elsewhere).is_err());
        assert!(validate_targets(&state, &a, &rally, &Targets::default()).is_err());
    }

    #[test]
    fn rally_deploys_forces_at_the_target() {
        let mut state = action_state(32);
        let a = state.players[0].id.clone();
        let capital = state.players[0].capital.unwrap();
        let before = state.board.units_at(capital, &a).len();
        let card = hand_card(&mut state, &a, "rally");
        let targets = Targets { hex: Some(capital), ..Targets::default() };
        assert_eq!(run_card(&mut state, &a, card, &targets, 0), CardProgress::Done { fizzled: false });
        assert_eq!(state.board.units_at(capital, &a).len(), before + 2);
    }

    #[test]
    fn recruiting_attaches_champion_abilities() {
        let mut state = action_state(33);
        let a = state.players[0].id.clone();
        let capital = state.players[0].capital.unwrap();
        let card = hand_card(&mut state, &a, "sentinel_oath");
        let targets = Targets { hex: Some(capital), ..Targets::default() };
        run_card(&mut state, &a, card, &targets, 0);
        assert_eq!(state.board.champions_of(&a), 1);
        assert!(state
            .modifiers
            .iter()
            .any(|m| m.kind == ModifierKind::Bodyguard && m.duration == Duration::Uses { remaining: 1 }));
    }

    #[test]
    fn scout_report_pauses_and_resumes_with_kept_cards() {
        let mut state = action_state(34);
        let a = state.players[0].id.clone();
        let card = hand_card(&mut state, &a, "scouts");
        state.players[0].deck.hand.retain(|c| *c != card);
        let progress = run_card(&mut state, &a, card, &Targets::default(), 0);
        assert_eq!(progress, CardProgress::Blocked { next_op: 1 });
        let Some(Block {
            kind: BlockKind::ScoutReport { revealed, keep, .. },
            ..
        }) = state.block.clone()
        else {
            panic!("scout block expected");
        };
        assert_eq!(keep, 1);
        assert_eq!(revealed.len(), 3);
        assert!(validate_scout_keep(&revealed, keep, &revealed).is_err());
        let kept = vec![revealed[0]];
        assert!(validate_scout_keep(&revealed, keep, &kept).is_ok());
        state.block = None;
        resolve_scout(&mut state, &a, &revealed, &kept);
        assert_eq!(state.players[0].deck.hand, vec![revealed[0]]);
        for card in &revealed[1..] {
            assert!(state.players[0].deck.discard_pile.contains(card));
        }
    }

    #[test]
    fn strike_kills_a_force_in_reach() {
        let mut state = action_state(35);
        let (a, b) = (state.players[0].id.clone(), state.players[1].id.clone());
        let hex = HexKey::origin();
        state.board_mut().place_forces(hex, &a, 1);
        let victim = state.board_mut().place_forces(HexKey::new(1, 0), &b, 1)[0];
        let card = hand_card(&mut state, &a, "ambush");
        let targets = Targets { unit: Some(victim), ..Targets::default() };
        assert!(validate_targets(&state, &a, &def(&state, card), &targets).is_ok());
        run_card(&mut state, &a, card, &targets, 0);
        assert!(state.board.unit(victim).is_none());
    }

    #[test]
    fn tunnels_need_two_or_three_hexes_of_distance() {
        let mut state = action_state(36);
        let a = state.players[0].id.clone();
        state.board_mut().place_forces(HexKey::origin(), &a, 1);
        let card = hand_card(&mut state, &a, "tunnelers");
        let tunnel = def(&state, card);
        let near = Targets { from: Some(HexKey::origin()), to: Some(HexKey::new(1, 0)), ..Targets::default() };
        let far = Targets { from: Some(HexKey::origin()), to: Some(HexKey::new(2, 0)), ..Targets::default() };
        assert!(validate_targets(&state, &a, &tunnel, &near).is_err());
        assert!(validate_targets(&state, &a, &tunnel, &far).is_ok());
        run_card(&mut state, &a, card, &far, 0);
        assert!(movement::step_allowed(&state, &a, HexKey::origin(), HexKey::new(2, 0)));
    }

    #[test]
    fn changed_conditions_fizzle_the_card() {
        let mut state = action_state(37);
        let a = state.players[0].id.clone();
        let card = hand_card(&mut state, &a, "sappers");
        let edge = EdgeKey::new(HexKey::origin(), HexKey::new(1, 0));
        let targets = Targets { edge: Some(edge), ..Targets::default() };
        assert_eq!(run_card(&mut state, &a, card, &targets, 0), CardProgress::Done { fizzled: true });
    }

    #[test]
    fn forced_march_into_an_enemy_starts_a_battle() {
        let mut state = action_state(38);
        let (a, b) = (state.players[0].id.clone(), state.players[1].id.clone());
        let (from, to) = (HexKey::origin(), HexKey::new(1, 0));
        state.board_mut().add_bridge(EdgeKey::new(from, to), None, false);
        state.board_mut().place_forces(from, &a, 2);
        state.board_mut().place_forces(to, &b, 1);
        let targets = Targets { from: Some(from), to: Some(to), ..Targets::default() };

        let mut paused = state.clone();
        let card = hand_card(&mut paused, &a, "forced_march");
        assert_eq!(run_card(&mut paused, &a, card, &targets, 0), CardProgress::Blocked { next_op: 1 });
        assert!(matches!(
            paused.block,
            Some(Block { kind: BlockKind::Retreat { .. }, .. })
        ));

        for player in &mut state.players {
            player.resources.mana = 0;
        }
        let card = hand_card(&mut state, &a, "forced_march");
        assert_eq!(run_card(&mut state, &a, card, &targets, 0), CardProgress::Done { fizzled: false });
        assert!(state.block.is_none());
        let kinds: Vec<EventKind> = state.log.iter().map(|event| event.kind).collect();
        assert!(kinds.contains(&EventKind::BattleStarted));
        assert!(kinds.contains(&EventKind::BattleResolved));
    }
}
