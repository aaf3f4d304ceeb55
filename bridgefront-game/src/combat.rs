//! Two-sided battle resolution for a contested hex.
//!
//! A battle runs round by round until one side is gone, nobody can hit,
//! twenty consecutive rounds pass without a hit, or a queued retreat fires.
//! Every rule number (hit faces, dice, policy, armor, bounty) is read through
//! the modifier folds.

pub mod assign;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::block::{Block, BlockKind};
use crate::board::{EdgeKey, HexKey, UnitKind};
use crate::constants::{DIE_SIDES, FORCE_ATTACK_DICE, FORCE_HIT_FACES, STALE_ROUND_CAP};
use crate::events::EventKind;
use crate::ids::{PlayerId, UnitId};
use crate::modifiers::hooks::{BattleCtx, KillCtx, SideCtx, UnitCtx};
use crate::modifiers::{
    consume_use, expire_end_of_battle, first_granting, query, remove_unit_modifiers, run_events,
    HitPolicy,
};
use crate::state::GameState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSetup {
    pub hex: HexKey,
    pub attacker: PlayerId,
    pub defender: PlayerId,
}

impl BattleSetup {
    fn sides(&self) -> [(&PlayerId, &PlayerId); 2] {
        [
            (&self.attacker, &self.defender),
            (&self.defender, &self.attacker),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BattleEnd {
    Eliminated,
    NoHits,
    Stale,
    Retreated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetreatPlan {
    pub player: PlayerId,
    pub edge: EdgeKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    pub hex: HexKey,
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub rounds: u32,
    pub end: BattleEnd,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<PlayerId>,
    pub losses: BTreeMap<PlayerId, u32>,
}

/// Per-battle scratch state.
#[derive(Debug, Default)]
pub struct BattleMemo {
    bodyguard_used: BTreeSet<PlayerId>,
    losses: BTreeMap<PlayerId, u32>,
}

fn side_ctx(state: &GameState, hex: HexKey, player: &PlayerId) -> SideCtx {
    SideCtx::new(player, hex, state.board.units_at(hex, player))
}

/// Retreat exits per participant: open bridges to neighbours they may enter
/// that hold nobody else, for players who can pay the retreat cost.
#[must_use]
pub fn retreat_options(state: &GameState, setup: &BattleSetup) -> BTreeMap<PlayerId, Vec<EdgeKey>> {
    let cost = state.config.retreat_mana_cost;
    let mut options = BTreeMap::new();
    for (player, _) in setup.sides() {
        let affordable = state
            .player(player)
            .is_some_and(|p| p.resources.mana >= cost);
        if !affordable {
            continue;
        }
        let exits: Vec<EdgeKey> = state
            .board
            .neighbors(setup.hex)
            .filter(|next| {
                state.board.has_open_bridge(setup.hex, *next)
                    && !state.board.has_enemy_at(*next, player)
                    && state.board.can_enter(*next, player)
            })
            .map(|next| EdgeKey::new(setup.hex, next))
            .collect();
        if !exits.is_empty() {
            options.insert(player.clone(), exits);
        }
    }
    options
}

/// Start a battle: pause on a retreat decision when anyone can retreat,
/// otherwise fight it out immediately. Returns `None` while paused.
pub fn begin_battle(state: &mut GameState, setup: BattleSetup) -> Option<BattleReport> {
    state.push_event(
        EventKind::BattleStarted,
        serde_json::json!({
            "hex": setup.hex,
            "attacker": setup.attacker,
            "defender": setup.defender,
        }),
    );
    let options = retreat_options(state, &setup);
    if options.is_empty() {
        return Some(resolve_battle(state, &setup, Vec::new()));
    }
    let waiting_for: Vec<PlayerId> = state
        .lead_order()
        .into_iter()
        .filter(|player| options.contains_key(player))
        .collect();
    log::debug!("battle at {} waits on retreat choices from {waiting_for:?}", setup.hex);
    state.block = Some(Block::new(
        waiting_for,
        BlockKind::Retreat {
            battle: setup,
            options,
            choices: BTreeMap::new(),
        },
    ));
    None
}

/// Fight a battle to its end with the given queued retreats.
pub fn resolve_battle(
    state: &mut GameState,
    setup: &BattleSetup,
    mut retreats: Vec<RetreatPlan>,
) -> BattleReport {
    let hex = setup.hex;
    let mut memo = BattleMemo::default();
    let mut zero_hit_rounds = 0;
    let mut round = 0;

    let end = loop {
        round += 1;

        for (side, opponent) in setup.sides() {
            let ctx = BattleCtx {
                side: side_ctx(state, hex, side),
                opponent: opponent.clone(),
                round,
            };
            run_events(state, |h| h.before_combat_round, &ctx);
        }

        if !state.board.has_units_at(hex, &setup.attacker)
            || !state.board.has_units_at(hex, &setup.defender)
        {
            break BattleEnd::Eliminated;
        }

        let attack_dice = side_dice(state, hex, &setup.attacker);
        let defend_dice = side_dice(state, hex, &setup.defender);
        if !can_hit(&attack_dice) && !can_hit(&defend_dice) {
            if !retreats.is_empty() && execute_retreats(state, hex, &retreats) {
                break BattleEnd::Retreated;
            }
            break BattleEnd::NoHits;
        }

        let attacker_hits = roll_hits(state, &attack_dice);
        let defender_hits = roll_hits(state, &defend_dice);
        log::trace!(
            "battle {hex} round {round}: {} hits {attacker_hits}, {} hits {defender_hits}",
            setup.attacker,
            setup.defender
        );

        let attacker_side = side_ctx(state, hex, &setup.attacker);
        let defender_side = side_ctx(state, hex, &setup.defender);
        let on_defender = land_hits(state, &attacker_side, &defender_side, attacker_hits, &mut memo);
        let on_attacker = land_hits(state, &defender_side, &attacker_side, defender_hits, &mut memo);

        let dead_defenders = apply_damage(state, &on_defender);
        let dead_attackers = apply_damage(state, &on_attacker);
        for unit in dead_defenders {
            *memo.losses.entry(setup.defender.clone()).or_default() += 1;
            let killer = side_ctx(state, hex, &setup.attacker);
            kill_unit(state, unit, &killer);
        }
        for unit in dead_attackers {
            *memo.losses.entry(setup.attacker.clone()).or_default() += 1;
            let killer = side_ctx(state, hex, &setup.defender);
            kill_unit(state, unit, &killer);
        }

        if !state.board.has_units_at(hex, &setup.attacker)
            || !state.board.has_units_at(hex, &setup.defender)
        {
            break BattleEnd::Eliminated;
        }

        if attacker_hits + defender_hits == 0 {
            zero_hit_rounds += 1;
            if !retreats.is_empty() {
                if execute_retreats(state, hex, &retreats) {
                    break BattleEnd::Retreated;
                }
                retreats.clear();
            }
            if zero_hit_rounds >= STALE_ROUND_CAP {
                break BattleEnd::Stale;
            }
        } else {
            zero_hit_rounds = 0;
        }
    };

    for (side, opponent) in setup.sides() {
        let ctx = BattleCtx {
            side: side_ctx(state, hex, side),
            opponent: opponent.clone(),
            round,
        };
        run_events(state, |h| h.after_battle, &ctx);
    }
    expire_end_of_battle(state);

    let report = BattleReport {
        hex,
        attacker: setup.attacker.clone(),
        defender: setup.defender.clone(),
        rounds: round,
        end,
        holder: state.board.sole_occupant(hex).cloned(),
        losses: memo.losses,
    };
    state.push_event(
        EventKind::BattleResolved,
        serde_json::to_value(&report).unwrap_or_default(),
    );
    log::debug!("battle at {hex} ended {end:?} after {round} rounds");
    report
}

/// Resolve a battle once every retreat choice is in.
pub fn resolve_retreat_choices(
    state: &mut GameState,
    battle: &BattleSetup,
    choices: &BTreeMap<PlayerId, Option<EdgeKey>>,
) -> BattleReport {
    let plans = state
        .lead_order()
        .into_iter()
        .filter_map(|player| {
            choices
                .get(&player)
                .copied()
                .flatten()
                .map(|edge| RetreatPlan { player, edge })
        })
        .collect();
    resolve_battle(state, battle, plans)
}

/// `(unit, dice, hit faces)` for every unit of `player` on `hex`.
fn side_dice(state: &GameState, hex: HexKey, player: &PlayerId) -> Vec<(UnitId, u32, u32)> {
    state
        .board
        .units_at(hex, player)
        .into_iter()
        .filter_map(|id| state.board.unit(id))
        .map(|unit| {
            let ctx = UnitCtx::new(player, hex, unit.id);
            match &unit.kind {
                UnitKind::Force => (
                    unit.id,
                    FORCE_ATTACK_DICE,
                    query(&state.modifiers, |h| h.force_hit_faces, &ctx, FORCE_HIT_FACES),
                ),
                UnitKind::Champion(champion) => (
                    unit.id,
                    query(&state.modifiers, |h| h.champion_dice, &ctx, champion.attack_dice),
                    query(&state.modifiers, |h| h.champion_hit_faces, &ctx, champion.hit_faces),
                ),
            }
        })
        .collect()
}

fn can_hit(dice: &[(UnitId, u32, u32)]) -> bool {
    dice.iter().any(|(_, count, faces)| *count > 0 && *faces > 0)
}

fn roll_hits(state: &mut GameState, dice: &[(UnitId, u32, u32)]) -> u32 {
    let mut hits = 0;
    for (_, count, faces) in dice {
        for _ in 0..*count {
            if state.roll_die(DIE_SIDES) <= *faces {
                hits += 1;
            }
        }
    }
    hits
}

/// Assign one side's hits, then let the defenders redirect or absorb them.
fn land_hits(
    state: &mut GameState,
    attacker: &SideCtx,
    defender: &SideCtx,
    hits: u32,
    memo: &mut BattleMemo,
) -> Vec<UnitId> {
    let policy = query(&state.modifiers, |h| h.hit_policy, attacker, HitPolicy::Random);
    let targets = assign::targets_on(&state.board, defender.hex, &defender.player);
    let (mut assigned, rng) = assign::assign_hits(&state.rng, policy, hits, &targets);
    state.rng = rng;
    redirect_champion_hit(state, defender, &mut assigned, memo);
    absorb_with_gold(state, defender, assigned)
}

fn is_champion(state: &GameState, unit: UnitId) -> bool {
    state.board.unit(unit).is_some_and(|u| u.is_champion())
}

/// Bodyguard: the first champion hit of the battle moves onto a friendly force.
pub fn redirect_champion_hit(
    state: &mut GameState,
    defender: &SideCtx,
    hits: &mut [UnitId],
    memo: &mut BattleMemo,
) -> bool {
    if memo.bodyguard_used.contains(&defender.player) {
        return false;
    }
    let Some(slot) = hits.iter().position(|unit| is_champion(state, *unit)) else {
        return false;
    };
    let Some(guard) = defender
        .units
        .iter()
        .copied()
        .find(|unit| state.board.unit(*unit).is_some_and(|u| !u.is_champion()))
    else {
        return false;
    };
    let Some(modifier) = first_granting(&state.modifiers, |h| h.bodyguard, defender) else {
        return false;
    };
    let protected = hits[slot];
    hits[slot] = guard;
    consume_use(state, &modifier);
    memo.bodyguard_used.insert(defender.player.clone());
    state.push_event(
        EventKind::BodyguardRedirect,
        serde_json::json!({
            "player": defender.player,
            "hex": defender.hex,
            "protected": protected,
            "guard": guard,
            "source": modifier,
        }),
    );
    true
}

/// Gold armor: champion hits are cancelled one for one at `rate` gold each.
fn absorb_with_gold(state: &mut GameState, defender: &SideCtx, hits: Vec<UnitId>) -> Vec<UnitId> {
    let Some(rate) = query(&state.modifiers, |h| h.armor_rate, defender, None) else {
        return hits;
    };
    let mut absorbed = 0_u32;
    let mut kept = Vec::with_capacity(hits.len());
    for unit in hits {
        let gold = state
            .player(&defender.player)
            .map_or(0, |p| p.resources.gold);
        if is_champion(state, unit) && gold >= rate {
            state.take_gold(&defender.player, rate);
            absorbed += 1;
        } else {
            kept.push(unit);
        }
    }
    if absorbed > 0 {
        state.push_event(
            EventKind::ArmorAbsorbed,
            serde_json::json!({
                "player": defender.player,
                "hex": defender.hex,
                "hits": absorbed,
                "gold": absorbed * rate,
            }),
        );
    }
    kept
}

/// Apply assigned hits; returns the units that died, without removing them.
fn apply_damage(state: &mut GameState, hits: &[UnitId]) -> Vec<UnitId> {
    let mut tally: BTreeMap<UnitId, i32> = BTreeMap::new();
    for unit in hits {
        *tally.entry(*unit).or_default() += 1;
    }
    let mut dead = Vec::new();
    for (unit, count) in tally {
        let Some(target) = state.board_mut().unit_mut(unit) else {
            continue;
        };
        match &mut target.kind {
            UnitKind::Force => dead.push(unit),
            UnitKind::Champion(champion) => {
                champion.hp -= count;
                if champion.hp <= 0 {
                    dead.push(unit);
                }
            }
        }
    }
    dead
}

/// Deal damage outside the round loop (strikes, opening volleys).
/// Returns whether the unit died.
pub fn damage_unit(state: &mut GameState, unit: UnitId, damage: i32, attacker: &SideCtx) -> bool {
    if damage <= 0 {
        return false;
    }
    let Some(target) = state.board_mut().unit_mut(unit) else {
        return false;
    };
    let dies = match &mut target.kind {
        UnitKind::Force => true,
        UnitKind::Champion(champion) => {
            champion.hp -= damage;
            champion.hp <= 0
        }
    };
    if dies {
        kill_unit(state, unit, attacker);
    }
    dies
}

/// Remove a dead unit, pay the bounty and fire kill hooks.
pub fn kill_unit(state: &mut GameState, unit: UnitId, killer: &SideCtx) {
    let Some(removed) = state.board_mut().remove_unit(unit) else {
        return;
    };
    remove_unit_modifiers(state, unit);
    let base = removed.champion().map_or(0, |champion| champion.bounty);
    let ctx = KillCtx {
        killer: killer.clone(),
        victim: removed.owner.clone(),
        victim_was_champion: removed.is_champion(),
    };
    let bounty = query(&state.modifiers, |h| h.kill_bounty, &ctx, base);
    let paid = state.gain_gold(&killer.player, bounty);
    state.push_event(
        EventKind::UnitDestroyed,
        serde_json::json!({
            "unit": unit,
            "owner": removed.owner,
            "hex": removed.hex,
            "champion": removed.champion().map(|c| c.champion.clone()),
            "killer": killer.player,
            "bounty": paid,
        }),
    );
    run_events(state, |h| h.on_kill, &ctx);
}

fn execute_retreats(state: &mut GameState, hex: HexKey, plans: &[RetreatPlan]) -> bool {
    let mut executed = false;
    for plan in plans {
        let Some(to) = plan.edge.other(hex) else {
            continue;
        };
        let valid = state.board.has_units_at(hex, &plan.player)
            && state.board.has_open_bridge(hex, to)
            && !state.board.has_enemy_at(to, &plan.player)
            && state.board.can_enter(to, &plan.player);
        if valid {
            for unit in state.board.units_at(hex, &plan.player) {
                state.board_mut().move_unit(unit, to);
            }
            if let Some(player) = state.player_mut(&plan.player) {
                player.flags.moved = true;
            }
            executed = true;
        }
        state.push_event(
            EventKind::RetreatExecuted,
            serde_json::json!({
                "player": plan.player,
                "from": hex,
                "to": to,
                "blocked": !valid,
            }),
        );
    }
    executed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CardId;
    use crate::modifiers::{attach, Duration, ModifierKind, ModifierSource, NewModifier, Scope};
    use crate::test_support::{arena_state, place_champion};

    fn setup(state: &GameState, hex: HexKey) -> BattleSetup {
        BattleSetup {
            hex,
            attacker: state.players[0].id.clone(),
            defender: state.players[1].id.clone(),
        }
    }

    #[test]
    fn battles_without_retreat_terminate() {
        for seed in 0..25 {
            let mut state = arena_state(seed);
            let hex = HexKey::origin();
            let battle = setup(&state, hex);
            state.board_mut().place_forces(hex, &battle.attacker, 3);
            state.board_mut().place_forces(hex, &battle.defender, 3);
            let report = resolve_battle(&mut state, &battle, Vec::new());
            assert!(matches!(report.end, BattleEnd::Eliminated | BattleEnd::Stale));
            assert!(report.rounds >= 1);
            if report.end == BattleEnd::Eliminated {
                assert!(!state.board.is_contested(hex));
            }
        }
    }

    #[test]
    fn zero_faces_on_both_sides_stops_with_no_hits() {
        let mut state = arena_state(3);
        let hex = HexKey::origin();
        let battle = setup(&state, hex);
        state.board_mut().place_forces(hex, &battle.attacker, 1);
        state.board_mut().place_forces(hex, &battle.defender, 1);
        attach(
            &mut state,
            NewModifier {
                source: ModifierSource::Card {
                    card: CardId::new("test"),
                },
                owner: None,
                duration: Duration::EndOfBattle,
                scope: None,
                kind: ModifierKind::ForceHitFaces { delta: -6 },
            },
        );
        let report = resolve_battle(&mut state, &battle, Vec::new());
        assert_eq!(report.end, BattleEnd::NoHits);
        assert!(state.modifiers.is_empty(), "end-of-battle modifiers expire");
        assert!(state.board.is_contested(hex));
    }

    #[test]
    fn queued_retreat_moves_the_whole_side() {
        let mut state = arena_state(4);
        let hex = HexKey::origin();
        let exit = HexKey::new(1, 0);
        let battle = setup(&state, hex);
        state.board_mut().place_forces(hex, &battle.attacker, 2);
        state.board_mut().place_forces(hex, &battle.defender, 1);
        state.board_mut().add_bridge(EdgeKey::new(hex, exit), None, false);
        attach(
            &mut state,
            NewModifier {
                source: ModifierSource::Card {
                    card: CardId::new("test"),
                },
                owner: None,
                duration: Duration::EndOfBattle,
                scope: None,
                kind: ModifierKind::ForceHitFaces { delta: -6 },
            },
        );
        let plans = vec![RetreatPlan {
            player: battle.defender.clone(),
            edge: EdgeKey::new(hex, exit),
        }];
        let report = resolve_battle(&mut state, &battle, plans);
        assert_eq!(report.end, BattleEnd::Retreated);
        assert_eq!(state.board.units_at(exit, &battle.defender).len(), 1);
        assert_eq!(report.holder, Some(battle.attacker.clone()));
    }

    #[test]
    fn retreat_options_need_mana_and_an_open_bridge() {
        let mut state = arena_state(5);
        let hex = HexKey::origin();
        let battle = setup(&state, hex);
        state.board_mut().place_forces(hex, &battle.attacker, 1);
        state.board_mut().place_forces(hex, &battle.defender, 1);
        assert!(retreat_options(&state, &battle).is_empty());

        state.board_mut().add_bridge(EdgeKey::new(hex, HexKey::new(0, 1)), None, false);
        for player in &mut state.players {
            player.resources.mana = 1;
        }
        let options = retreat_options(&state, &battle);
        assert_eq!(options.len(), 2);

        state.players[1].resources.mana = 0;
        let options = retreat_options(&state, &battle);
        assert_eq!(options.keys().cloned().collect::<Vec<_>>(), vec![battle.attacker.clone()]);
    }

    #[test]
    fn champion_kills_pay_bounty() {
        let mut state = arena_state(6);
        let hex = HexKey::origin();
        let battle = setup(&state, hex);
        let victim = place_champion(&mut state, hex, &battle.defender, "sentinel");
        let gold_before = state.players[0].resources.gold;
        let killer = SideCtx::new(&battle.attacker, hex, Vec::new());
        assert!(damage_unit(&mut state, victim, 10, &killer));
        assert!(state.board.unit(victim).is_none());
        assert_eq!(state.players[0].resources.gold, gold_before + 1);
        assert!(state
            .modifiers
            .iter()
            .all(|m| m.scope != Some(Scope::Unit { unit: victim })));
    }

    #[test]
    fn gold_armor_cancels_champion_hits_while_gold_lasts() {
        let mut state = arena_state(7);
        let hex = HexKey::origin();
        let defender = state.players[1].id.clone();
        let champion = place_champion(&mut state, hex, &defender, "warlord");
        let force = state.board_mut().place_forces(hex, &defender, 1)[0];
        state.players[1].resources.gold = 3;
        attach(
            &mut state,
            NewModifier {
                source: ModifierSource::Card {
                    card: CardId::new("test"),
                },
                owner: Some(defender.clone()),
                duration: Duration::Permanent,
                scope: None,
                kind: ModifierKind::GoldArmor { rate: 2 },
            },
        );
        let side = side_ctx(&state, hex, &defender);
        let kept = absorb_with_gold(&mut state, &side, vec![champion, champion, force]);
        assert_eq!(kept, vec![champion, force]);
        assert_eq!(state.players[1].resources.gold, 1);
    }
}
