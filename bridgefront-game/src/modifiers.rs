//! Modifier records and the query/event folds over them.
//!
//! A modifier stores only data: where it came from, who owns it, how long it
//! lasts, what it is attached to, and a typed `ModifierKind`. The behaviour
//! for a kind is looked up in the hook registry (`hooks::hooks_for`) every
//! time a fold runs, so saved games rebuild their hooks from identity.

pub mod hooks;

use serde::{Deserialize, Serialize};

use crate::board::{EdgeKey, HexKey, TileKind, UnitKind};
use crate::events::EventKind;
use crate::ids::{CardId, ChampionId, FactionId, ModifierId, PlayerId, UnitId};
use crate::state::GameState;

pub use hooks::{hooks_for, EventHook, HookSet};

/// How an attacking side spreads its hits over the defenders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HitPolicy {
    #[default]
    Random,
    ForcesFirst,
    ChampionsFirst,
    /// Steer up to `hits` hits at the weakest champion, the rest land randomly.
    FocusFire { hits: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ModifierKind {
    IgnoreBridges,
    Tunnel { a: HexKey, b: HexKey },
    ExtraMove { amount: u32 },
    ForceHitFaces { delta: i32 },
    ChampionHitFaces { delta: i32 },
    ChampionDice { delta: i32 },
    HitPolicy { policy: HitPolicy },
    Bodyguard,
    GoldArmor { rate: u32 },
    DeployBonus { amount: u32 },
    MineBonus { amount: u32 },
    BountyBonus { amount: u32 },
    Plunder { amount: u32 },
    Extortion { amount: u32 },
    CardChoiceBonus { amount: u32 },
    ControlBonus { amount: u32 },
    ControlValue { tile: TileKind, delta: i32 },
    OpeningVolley { damage: i32 },
    BattleHeal { amount: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Duration {
    Permanent,
    EndOfRound,
    EndOfBattle,
    Uses { remaining: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Scope {
    Hex { hex: HexKey },
    Edge { edge: EdgeKey },
    Unit { unit: UnitId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ModifierSource {
    Card { card: CardId },
    Champion { champion: ChampionId, unit: UnitId, ability: String },
    Faction { faction: FactionId },
}

impl ModifierSource {
    fn tag(&self) -> String {
        match self {
            Self::Card { card } => format!("card.{card}"),
            Self::Champion { champion, unit, .. } => format!("champion.{champion}.{unit}"),
            Self::Faction { faction } => format!("faction.{faction}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub id: ModifierId,
    pub source: ModifierSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<PlayerId>,
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub kind: ModifierKind,
}

/// What a hook can see about the situation it is consulted in.
pub trait HookContext {
    fn player(&self) -> Option<&PlayerId>;

    fn hex(&self) -> Option<HexKey> {
        None
    }

    fn edge(&self) -> Option<EdgeKey> {
        None
    }

    fn units(&self) -> &[UnitId] {
        &[]
    }
}

impl Modifier {
    /// Owner and scope both match the context.
    #[must_use]
    pub fn applies_to<C: HookContext + ?Sized>(&self, ctx: &C) -> bool {
        let owner_matches = match (&self.owner, ctx.player()) {
            (Some(owner), Some(player)) => owner == player,
            _ => true,
        };
        let scope_matches = match self.scope {
            None => true,
            Some(Scope::Hex { hex }) => ctx.hex() == Some(hex),
            Some(Scope::Edge { edge }) => ctx.edge() == Some(edge),
            Some(Scope::Unit { unit }) => ctx.units().contains(&unit),
        };
        owner_matches && scope_matches
    }
}

/// Fold `base` through every applicable modifier's query hook, in list order.
pub fn query<C, T>(
    modifiers: &[Modifier],
    select: fn(&HookSet) -> Option<fn(&Modifier, &C, T) -> T>,
    ctx: &C,
    base: T,
) -> T
where
    C: HookContext,
{
    modifiers
        .iter()
        .filter(|modifier| modifier.applies_to(ctx))
        .fold(base, |acc, modifier| match select(&hooks_for(&modifier.kind)) {
            Some(hook) => hook(modifier, ctx, acc),
            None => acc,
        })
}

/// First applicable modifier whose boolean query hook turns `false` into `true`.
#[must_use]
pub fn first_granting<C: HookContext>(
    modifiers: &[Modifier],
    select: fn(&HookSet) -> Option<fn(&Modifier, &C, bool) -> bool>,
    ctx: &C,
) -> Option<ModifierId> {
    modifiers
        .iter()
        .filter(|modifier| modifier.applies_to(ctx))
        .find(|modifier| select(&hooks_for(&modifier.kind)).is_some_and(|hook| hook(modifier, ctx, false)))
        .map(|modifier| modifier.id.clone())
}

/// Thread the state through every applicable event hook. Hooks that report
/// firing consume a use from limited modifiers.
pub fn run_events<C: HookContext>(
    state: &mut GameState,
    select: fn(&HookSet) -> Option<EventHook<C>>,
    ctx: &C,
) {
    let candidates: Vec<ModifierId> = state
        .modifiers
        .iter()
        .filter(|modifier| modifier.applies_to(ctx) && select(&hooks_for(&modifier.kind)).is_some())
        .map(|modifier| modifier.id.clone())
        .collect();
    for id in candidates {
        // Earlier hooks may have removed this modifier (its unit died).
        let Some(modifier) = state.modifiers.iter().find(|m| m.id == id).cloned() else {
            continue;
        };
        let Some(hook) = select(&hooks_for(&modifier.kind)) else {
            continue;
        };
        if hook(&modifier, ctx, state) {
            consume_use(state, &id);
        }
    }
}

/// Decrement a limited modifier after it fired, removing it at zero.
pub fn consume_use(state: &mut GameState, id: &ModifierId) {
    let Some(index) = state.modifiers.iter().position(|m| &m.id == id) else {
        return;
    };
    let Duration::Uses { remaining } = state.modifiers[index].duration else {
        return;
    };
    let remaining = remaining.saturating_sub(1);
    if let ModifierSource::Champion { unit, ability, .. } = &state.modifiers[index].source {
        let (unit, ability) = (*unit, ability.clone());
        if let Some(champion) = state.board_mut().unit_mut(unit).and_then(|u| u.champion_mut()) {
            champion.ability_uses.insert(ability, remaining);
        }
    }
    if remaining == 0 {
        let removed = state.modifiers.remove(index);
        log::debug!("modifier {} exhausted", removed.id);
    } else {
        state.modifiers[index].duration = Duration::Uses { remaining };
    }
}

/// Parameters for attaching a new modifier.
#[derive(Debug, Clone)]
pub struct NewModifier {
    pub source: ModifierSource,
    pub owner: Option<PlayerId>,
    pub duration: Duration,
    pub scope: Option<Scope>,
    pub kind: ModifierKind,
}

/// Append a modifier with an id derived from source, owner and revision.
pub fn attach(state: &mut GameState, spec: NewModifier) -> ModifierId {
    let owner = spec
        .owner
        .as_ref()
        .map_or_else(|| String::from("-"), ToString::to_string);
    let prefix = format!("{}:{owner}:r{}", spec.source.tag(), state.revision);
    let id = (0_u32..)
        .map(|n| ModifierId(format!("{prefix}:{n}")))
        .find(|candidate| state.modifiers.iter().all(|m| &m.id != candidate))
        .unwrap_or_else(|| ModifierId(prefix.clone()));
    state.modifiers.push(Modifier {
        id: id.clone(),
        source: spec.source,
        owner: spec.owner,
        duration: spec.duration,
        scope: spec.scope,
        kind: spec.kind,
    });
    id
}

/// Attach the ability modifiers of a freshly placed champion.
pub fn attach_champion_abilities(state: &mut GameState, unit: UnitId) {
    let Some(placed) = state.board.unit(unit) else {
        return;
    };
    let owner = placed.owner.clone();
    let UnitKind::Champion(champion) = &placed.kind else {
        return;
    };
    let champion_id = champion.champion.clone();
    let Some(def) = state.catalog().champion(&champion_id).cloned() else {
        log::warn!("champion {champion_id} missing from catalog");
        return;
    };
    for ability in def.abilities {
        let duration = ability
            .uses
            .map_or(Duration::Permanent, |remaining| Duration::Uses { remaining });
        attach(
            state,
            NewModifier {
                source: ModifierSource::Champion {
                    champion: champion_id.clone(),
                    unit,
                    ability: ability.name.clone(),
                },
                owner: Some(owner.clone()),
                duration,
                scope: Some(Scope::Unit { unit }),
                kind: ability.modifier,
            },
        );
    }
}

fn expire(state: &mut GameState, reason: &str, keep: impl Fn(&Modifier) -> bool) -> usize {
    let before = state.modifiers.len();
    state.modifiers.retain(keep);
    let removed = before - state.modifiers.len();
    if removed > 0 {
        state.push_event(
            EventKind::ModifiersExpired,
            serde_json::json!({ "reason": reason, "count": removed }),
        );
    }
    removed
}

pub fn expire_end_of_round(state: &mut GameState) -> usize {
    expire(state, "endOfRound", |m| m.duration != Duration::EndOfRound)
}

pub fn expire_end_of_battle(state: &mut GameState) -> usize {
    expire(state, "endOfBattle", |m| m.duration != Duration::EndOfBattle)
}

/// Drop modifiers attached to or granted by a unit that left the board.
pub fn remove_unit_modifiers(state: &mut GameState, unit: UnitId) -> usize {
    let before = state.modifiers.len();
    state.modifiers.retain(|m| {
        let scoped = m.scope == Some(Scope::Unit { unit });
        let granted = matches!(&m.source, ModifierSource::Champion { unit: source, .. } if *source == unit);
        !(scoped || granted)
    });
    before - state.modifiers.len()
}
