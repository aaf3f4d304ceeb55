//! Hook registry: the behaviour behind each `ModifierKind`.
//!
//! Query hooks transform a value; event hooks mutate the state and report
//! whether they fired. `hooks_for` is the only place a kind is mapped to
//! code, so resolvers never branch on which ability is active.

use std::collections::BTreeMap;

use crate::board::{EdgeKey, HexKey, TileKind};
use crate::combat;
use crate::constants::{DIE_SIDES, MAX_ATTACK_DICE};
use crate::events::EventKind;
use crate::ids::{PlayerId, UnitId};
use crate::modifiers::{HitPolicy, HookContext, Modifier, ModifierKind};
use crate::numbers::apply_delta;
use crate::state::GameState;

pub type QueryHook<C, T> = fn(&Modifier, &C, T) -> T;
pub type EventHook<C> = fn(&Modifier, &C, &mut GameState) -> bool;

/// A single movement step from `from` to `to`.
#[derive(Debug, Clone)]
pub struct MoveCtx {
    pub player: PlayerId,
    pub from: HexKey,
    pub to: HexKey,
}

impl MoveCtx {
    #[must_use]
    pub fn new(player: &PlayerId, from: HexKey, to: HexKey) -> Self {
        Self {
            player: player.clone(),
            from,
            to,
        }
    }

    fn is_pair(&self, a: HexKey, b: HexKey) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }
}

impl HookContext for MoveCtx {
    fn player(&self) -> Option<&PlayerId> {
        Some(&self.player)
    }

    fn hex(&self) -> Option<HexKey> {
        Some(self.from)
    }

    fn edge(&self) -> Option<EdgeKey> {
        Some(EdgeKey::new(self.from, self.to))
    }
}

/// One unit rolling its dice.
#[derive(Debug, Clone)]
pub struct UnitCtx {
    pub player: PlayerId,
    pub hex: HexKey,
    pub unit: [UnitId; 1],
}

impl UnitCtx {
    #[must_use]
    pub fn new(player: &PlayerId, hex: HexKey, unit: UnitId) -> Self {
        Self {
            player: player.clone(),
            hex,
            unit: [unit],
        }
    }
}

impl HookContext for UnitCtx {
    fn player(&self) -> Option<&PlayerId> {
        Some(&self.player)
    }

    fn hex(&self) -> Option<HexKey> {
        Some(self.hex)
    }

    fn units(&self) -> &[UnitId] {
        &self.unit
    }
}

/// One side of a battle: the player and their units on the hex.
#[derive(Debug, Clone)]
pub struct SideCtx {
    pub player: PlayerId,
    pub hex: HexKey,
    pub units: Vec<UnitId>,
}

impl SideCtx {
    #[must_use]
    pub fn new(player: &PlayerId, hex: HexKey, units: Vec<UnitId>) -> Self {
        Self {
            player: player.clone(),
            hex,
            units,
        }
    }
}

impl HookContext for SideCtx {
    fn player(&self) -> Option<&PlayerId> {
        Some(&self.player)
    }

    fn hex(&self) -> Option<HexKey> {
        Some(self.hex)
    }

    fn units(&self) -> &[UnitId] {
        &self.units
    }
}

/// A battle round or battle end, seen from one side.
#[derive(Debug, Clone)]
pub struct BattleCtx {
    pub side: SideCtx,
    pub opponent: PlayerId,
    pub round: u32,
}

impl HookContext for BattleCtx {
    fn player(&self) -> Option<&PlayerId> {
        Some(&self.side.player)
    }

    fn hex(&self) -> Option<HexKey> {
        Some(self.side.hex)
    }

    fn units(&self) -> &[UnitId] {
        &self.side.units
    }
}

/// A unit died; the killer side is the context player.
#[derive(Debug, Clone)]
pub struct KillCtx {
    pub killer: SideCtx,
    pub victim: PlayerId,
    pub victim_was_champion: bool,
}

impl HookContext for KillCtx {
    fn player(&self) -> Option<&PlayerId> {
        Some(&self.killer.player)
    }

    fn hex(&self) -> Option<HexKey> {
        Some(self.killer.hex)
    }

    fn units(&self) -> &[UnitId] {
        &self.killer.units
    }
}

/// Economy questions: deploys, income, card choices.
#[derive(Debug, Clone)]
pub struct EconomyCtx {
    pub player: PlayerId,
    pub hex: Option<HexKey>,
}

impl EconomyCtx {
    #[must_use]
    pub fn new(player: &PlayerId, hex: Option<HexKey>) -> Self {
        Self {
            player: player.clone(),
            hex,
        }
    }
}

impl HookContext for EconomyCtx {
    fn player(&self) -> Option<&PlayerId> {
        Some(&self.player)
    }

    fn hex(&self) -> Option<HexKey> {
        self.hex
    }
}

/// Control scoring for one held hex, or the per-player bonus when `hex` is empty.
#[derive(Debug, Clone)]
pub struct ScoreCtx {
    pub player: PlayerId,
    pub hex: Option<HexKey>,
    pub tile: Option<TileKind>,
}

impl HookContext for ScoreCtx {
    fn player(&self) -> Option<&PlayerId> {
        Some(&self.player)
    }

    fn hex(&self) -> Option<HexKey> {
        self.hex
    }
}

#[derive(Clone, Copy, Default)]
pub struct HookSet {
    // Movement
    pub requires_bridge: Option<QueryHook<MoveCtx, bool>>,
    pub adjacency: Option<QueryHook<MoveCtx, bool>>,
    pub max_distance: Option<QueryHook<MoveCtx, u32>>,
    // Combat
    pub force_hit_faces: Option<QueryHook<UnitCtx, u32>>,
    pub champion_hit_faces: Option<QueryHook<UnitCtx, u32>>,
    pub champion_dice: Option<QueryHook<UnitCtx, u32>>,
    pub hit_policy: Option<QueryHook<SideCtx, HitPolicy>>,
    pub bodyguard: Option<QueryHook<SideCtx, bool>>,
    pub armor_rate: Option<QueryHook<SideCtx, Option<u32>>>,
    pub before_combat_round: Option<EventHook<BattleCtx>>,
    pub after_battle: Option<EventHook<BattleCtx>>,
    // Economy
    pub deploy_count: Option<QueryHook<EconomyCtx, u32>>,
    pub mine_gold: Option<QueryHook<EconomyCtx, u32>>,
    pub kill_bounty: Option<QueryHook<KillCtx, u32>>,
    pub on_kill: Option<EventHook<KillCtx>>,
    pub card_choice_count: Option<QueryHook<EconomyCtx, u32>>,
    // Scoring
    pub control_value: Option<QueryHook<ScoreCtx, u32>>,
    pub control_bonus: Option<QueryHook<ScoreCtx, u32>>,
}

fn amount_of(modifier: &Modifier) -> u32 {
    match modifier.kind {
        ModifierKind::ExtraMove { amount }
        | ModifierKind::DeployBonus { amount }
        | ModifierKind::MineBonus { amount }
        | ModifierKind::BountyBonus { amount }
        | ModifierKind::Plunder { amount }
        | ModifierKind::Extortion { amount }
        | ModifierKind::CardChoiceBonus { amount }
        | ModifierKind::ControlBonus { amount } => amount,
        _ => 0,
    }
}

fn delta_of(modifier: &Modifier) -> i32 {
    match modifier.kind {
        ModifierKind::ForceHitFaces { delta }
        | ModifierKind::ChampionHitFaces { delta }
        | ModifierKind::ChampionDice { delta }
        | ModifierKind::ControlValue { delta, .. } => delta,
        _ => 0,
    }
}

fn add_amount<C>(modifier: &Modifier, _ctx: &C, acc: u32) -> u32 {
    acc.saturating_add(amount_of(modifier))
}

fn shift_faces(modifier: &Modifier, _ctx: &UnitCtx, acc: u32) -> u32 {
    apply_delta(acc, delta_of(modifier), DIE_SIDES)
}

fn shift_dice(modifier: &Modifier, _ctx: &UnitCtx, acc: u32) -> u32 {
    apply_delta(acc, delta_of(modifier), MAX_ATTACK_DICE)
}

fn no_bridge_needed(_modifier: &Modifier, _ctx: &MoveCtx, _acc: bool) -> bool {
    false
}

fn tunnel_adjacency(modifier: &Modifier, ctx: &MoveCtx, acc: bool) -> bool {
    match modifier.kind {
        ModifierKind::Tunnel { a, b } => acc || ctx.is_pair(a, b),
        _ => acc,
    }
}

fn tunnel_bridge(modifier: &Modifier, ctx: &MoveCtx, acc: bool) -> bool {
    match modifier.kind {
        ModifierKind::Tunnel { a, b } if ctx.is_pair(a, b) => false,
        _ => acc,
    }
}

fn set_policy(modifier: &Modifier, _ctx: &SideCtx, acc: HitPolicy) -> HitPolicy {
    match modifier.kind {
        ModifierKind::HitPolicy { policy } => policy,
        _ => acc,
    }
}

fn grant(_modifier: &Modifier, _ctx: &SideCtx, _acc: bool) -> bool {
    true
}

fn cheapest_armor(modifier: &Modifier, _ctx: &SideCtx, acc: Option<u32>) -> Option<u32> {
    match modifier.kind {
        ModifierKind::GoldArmor { rate } if rate > 0 => Some(acc.map_or(rate, |r| r.min(rate))),
        _ => acc,
    }
}

fn control_value(modifier: &Modifier, ctx: &ScoreCtx, acc: u32) -> u32 {
    match modifier.kind {
        ModifierKind::ControlValue { tile, delta } if ctx.tile == Some(tile) => {
            apply_delta(acc, delta, u32::MAX)
        }
        _ => acc,
    }
}

fn plunder(modifier: &Modifier, ctx: &KillCtx, state: &mut GameState) -> bool {
    let stolen = state.take_gold(&ctx.victim, amount_of(modifier));
    if stolen == 0 {
        return false;
    }
    state.gain_gold(&ctx.killer.player, stolen);
    state.push_event(
        EventKind::GoldStolen,
        serde_json::json!({
            "from": ctx.victim,
            "to": ctx.killer.player,
            "amount": stolen,
            "source": modifier.id,
        }),
    );
    true
}

fn extortion(modifier: &Modifier, ctx: &KillCtx, state: &mut GameState) -> bool {
    if ctx.victim_was_champion {
        return false;
    }
    plunder(modifier, ctx, state)
}

fn opening_volley(modifier: &Modifier, ctx: &BattleCtx, state: &mut GameState) -> bool {
    let ModifierKind::OpeningVolley { damage } = modifier.kind else {
        return false;
    };
    if ctx.round != 1 {
        return false;
    }
    let targets = state.board.units_at(ctx.side.hex, &ctx.opponent);
    if targets.is_empty() {
        return false;
    }
    let index = state.pick_index(targets.len());
    let target = targets[index];
    combat::damage_unit(state, target, damage, &ctx.side);
    true
}

fn battle_heal(modifier: &Modifier, ctx: &BattleCtx, state: &mut GameState) -> bool {
    let ModifierKind::BattleHeal { amount } = modifier.kind else {
        return false;
    };
    let mut healed = false;
    for unit in state.board.units_at(ctx.side.hex, &ctx.side.player) {
        if let Some(champion) = state.board_mut().unit_mut(unit).and_then(|u| u.champion_mut()) {
            if champion.hp < champion.max_hp {
                champion.hp = (champion.hp + amount).min(champion.max_hp);
                healed = true;
            }
        }
    }
    healed
}

/// Map a modifier kind to its hooks.
#[must_use]
pub fn hooks_for(kind: &ModifierKind) -> HookSet {
    match kind {
        ModifierKind::IgnoreBridges => HookSet {
            requires_bridge: Some(no_bridge_needed),
            ..HookSet::default()
        },
        ModifierKind::Tunnel { .. } => HookSet {
            adjacency: Some(tunnel_adjacency),
            requires_bridge: Some(tunnel_bridge),
            ..HookSet::default()
        },
        ModifierKind::ExtraMove { .. } => HookSet {
            max_distance: Some(add_amount::<MoveCtx>),
            ..HookSet::default()
        },
        ModifierKind::ForceHitFaces { .. } => HookSet {
            force_hit_faces: Some(shift_faces),
            ..HookSet::default()
        },
        ModifierKind::ChampionHitFaces { .. } => HookSet {
            champion_hit_faces: Some(shift_faces),
            ..HookSet::default()
        },
        ModifierKind::ChampionDice { .. } => HookSet {
            champion_dice: Some(shift_dice),
            ..HookSet::default()
        },
        ModifierKind::HitPolicy { .. } => HookSet {
            hit_policy: Some(set_policy),
            ..HookSet::default()
        },
        ModifierKind::Bodyguard => HookSet {
            bodyguard: Some(grant),
            ..HookSet::default()
        },
        ModifierKind::GoldArmor { .. } => HookSet {
            armor_rate: Some(cheapest_armor),
            ..HookSet::default()
        },
        ModifierKind::DeployBonus { .. } => HookSet {
            deploy_count: Some(add_amount::<EconomyCtx>),
            ..HookSet::default()
        },
        ModifierKind::MineBonus { .. } => HookSet {
            mine_gold: Some(add_amount::<EconomyCtx>),
            ..HookSet::default()
        },
        ModifierKind::BountyBonus { .. } => HookSet {
            kill_bounty: Some(add_amount::<KillCtx>),
            ..HookSet::default()
        },
        ModifierKind::Plunder { .. } => HookSet {
            on_kill: Some(plunder),
            ..HookSet::default()
        },
        ModifierKind::Extortion { .. } => HookSet {
            on_kill: Some(extortion),
            ..HookSet::default()
        },
        ModifierKind::CardChoiceBonus { .. } => HookSet {
            card_choice_count: Some(add_amount::<EconomyCtx>),
            ..HookSet::default()
        },
        ModifierKind::ControlBonus { .. } => HookSet {
            control_bonus: Some(add_amount::<ScoreCtx>),
            ..HookSet::default()
        },
        ModifierKind::ControlValue { .. } => HookSet {
            control_value: Some(control_value),
            ..HookSet::default()
        },
        ModifierKind::OpeningVolley { .. } => HookSet {
            before_combat_round: Some(opening_volley),
            ..HookSet::default()
        },
        ModifierKind::BattleHeal { .. } => HookSet {
            after_battle: Some(battle_heal),
            ..HookSet::default()
        },
    }
}

/// Names of the hooks a kind provides, for views and debugging.
#[must_use]
pub fn hook_names(kind: &ModifierKind) -> Vec<&'static str> {
    let set = hooks_for(kind);
    let table: BTreeMap<&'static str, bool> = BTreeMap::from([
        ("requiresBridge", set.requires_bridge.is_some()),
        ("adjacency", set.adjacency.is_some()),
        ("maxDistance", set.max_distance.is_some()),
        ("forceHitFaces", set.force_hit_faces.is_some()),
        ("championHitFaces", set.champion_hit_faces.is_some()),
        ("championDice", set.champion_dice.is_some()),
        ("hitPolicy", set.hit_policy.is_some()),
        ("bodyguard", set.bodyguard.is_some()),
        ("armorRate", set.armor_rate.is_some()),
        ("beforeCombatRound", set.before_combat_round.is_some()),
        ("afterBattle", set.after_battle.is_some()),
        ("deployCount", set.deploy_count.is_some()),
        ("mineGold", set.mine_gold.is_some()),
        ("killBounty", set.kill_bounty.is_some()),
        ("onKill", set.on_kill.is_some()),
        ("cardChoiceCount", set.card_choice_count.is_some()),
        ("controlValue", set.control_value.is_some()),
        ("controlBonus", set.control_bonus.is_some()),
    ]);
    table
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
}
