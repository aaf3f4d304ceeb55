//! Per-viewer projections of the game state.
//!
//! `public` is safe to broadcast: it carries no hand contents, bid amounts,
//! forge offers or scout reveals. `private` holds what only the viewer may see.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::block::{Block, BlockKind};
use crate::board::Board;
use crate::catalog::Age;
use crate::events::GameEvent;
use crate::ids::{CardId, CardInstanceId, PlayerId};
use crate::market::Purchase;
use crate::modifiers::{hooks::hook_names, Duration, Modifier, ModifierKind, ModifierSource, Scope};
use crate::round::phase::CollectionPrompt;
use crate::round::Phase;
use crate::state::{GameState, Resources, VictoryPoints};

/// Events included in the public view, newest last.
const RECENT_EVENTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub instance: CardInstanceId,
    pub card: Option<CardId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub seat: usize,
    pub faction: String,
    pub capital: Option<String>,
    pub resources: Resources,
    pub vp: VictoryPoints,
    pub hand_size: usize,
    pub draw_pile_size: usize,
    pub discard_pile: Vec<CardView>,
    pub burned: usize,
    pub done_this_round: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifierView {
    pub id: String,
    pub source: ModifierSource,
    pub owner: Option<PlayerId>,
    pub duration: Duration,
    pub scope: Option<Scope>,
    pub kind: ModifierKind,
    pub hooks: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockView {
    #[serde(rename = "type")]
    pub tag: &'static str,
    pub waiting_for: Vec<PlayerId>,
    pub detail: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketView {
    pub row: Vec<CardView>,
    pub row_index: usize,
    pub active: Vec<PlayerId>,
    pub purchases: Vec<Purchase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicView {
    pub revision: u64,
    pub round: u32,
    pub phase: Phase,
    pub lead_seat: usize,
    pub players: Vec<PublicPlayer>,
    pub board: Arc<Board>,
    pub market: MarketView,
    pub deck_sizes: BTreeMap<Age, usize>,
    pub modifiers: Vec<ModifierView>,
    pub block: Option<BlockView>,
    pub recent_events: Vec<GameEvent>,
    pub winner: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrivateView {
    pub player: PlayerId,
    pub hand: Vec<CardView>,
    pub draw_pile_size: usize,
    /// The viewer's own part of the pending decision, if any.
    pub prompt: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameView {
    pub public: PublicView,
    pub private: Option<PrivateView>,
}

fn card_view(state: &GameState, instance: CardInstanceId) -> CardView {
    CardView {
        instance,
        card: state.card_id(instance).cloned(),
    }
}

fn cards(state: &GameState, instances: &[CardInstanceId]) -> Vec<CardView> {
    instances.iter().map(|card| card_view(state, *card)).collect()
}

fn modifier_view(modifier: &Modifier) -> ModifierView {
    ModifierView {
        id: modifier.id.to_string(),
        source: modifier.source.clone(),
        owner: modifier.owner.clone(),
        duration: modifier.duration,
        scope: modifier.scope,
        kind: modifier.kind.clone(),
        hooks: hook_names(&modifier.kind),
    }
}

/// Public details of a block: who answered, never what they answered.
fn public_block(state: &GameState, block: &Block) -> BlockView {
    let detail = match &block.kind {
        BlockKind::DeckPreview => Value::Null,
        BlockKind::CapitalDraft { available } => json!({ "available": available }),
        BlockKind::StartingBridges { required, submitted } => {
            json!({ "required": required, "answered": submitted.keys().collect::<Vec<_>>() })
        }
        BlockKind::FreeStartingCard { chosen, .. } => {
            json!({ "answered": chosen.keys().collect::<Vec<_>>() })
        }
        BlockKind::QuietStudy { max_discard, submitted } => {
            json!({ "maxDiscard": max_discard, "answered": submitted.keys().collect::<Vec<_>>() })
        }
        BlockKind::MarketBids { card, row_index, bids } => json!({
            "card": card_view(state, *card),
            "rowIndex": row_index,
            "answered": bids.keys().collect::<Vec<_>>(),
        }),
        BlockKind::MarketRollOff(roll_off) => json!({
            "card": card_view(state, roll_off.card),
            "mode": roll_off.mode,
            "contenders": roll_off.contenders,
            "rounds": roll_off.rounds,
        }),
        BlockKind::Declarations { declarations } => {
            json!({ "answered": declarations.keys().collect::<Vec<_>>() })
        }
        BlockKind::Collection { prompts, choices } => json!({
            "prompted": prompts.keys().collect::<Vec<_>>(),
            "answered": choices.keys().collect::<Vec<_>>(),
        }),
        BlockKind::Retreat {
            battle,
            options,
            choices,
        } => json!({
            "battle": battle,
            "options": options,
            "answered": choices.keys().collect::<Vec<_>>(),
        }),
        BlockKind::ScoutReport { player, revealed, keep, .. } => json!({
            "player": player,
            "looked": revealed.len(),
            "keep": keep,
        }),
    };
    BlockView {
        tag: block.kind.tag(),
        waiting_for: block.waiting_for.clone(),
        detail,
    }
}

/// The viewer's own slice of a block.
fn private_prompt(state: &GameState, block: &Block, viewer: &PlayerId) -> Option<Value> {
    match &block.kind {
        BlockKind::StartingBridges { submitted, .. } => submitted.get(viewer).map(|edges| json!({ "submitted": edges })),
        BlockKind::FreeStartingCard { offers, chosen } => offers.get(viewer).map(|offered| {
            json!({ "offers": cards(state, offered), "chosen": chosen.get(viewer) })
        }),
        BlockKind::QuietStudy { submitted, .. } => submitted.get(viewer).map(|cards| json!({ "discard": cards })),
        BlockKind::MarketBids { bids, .. } => bids.get(viewer).map(|bid| json!({ "bid": bid })),
        BlockKind::MarketRollOff(roll_off) => roll_off.bids.get(viewer).map(|bid| json!({ "bid": bid })),
        BlockKind::Declarations { declarations } => {
            declarations.get(viewer).map(|declaration| json!({ "declaration": declaration }))
        }
        BlockKind::Collection { prompts, choices } => prompts.get(viewer).map(|mine| {
            let offers: Vec<Value> = mine
                .iter()
                .map(|prompt| {
                    let CollectionPrompt::Forge { hex, offers } = prompt;
                    json!({ "type": "forge", "hex": hex, "offers": cards(state, offers) })
                })
                .collect();
            json!({ "prompts": offers, "choices": choices.get(viewer) })
        }),
        BlockKind::Retreat { choices, .. } => choices.get(viewer).map(|edge| json!({ "retreat": edge })),
        BlockKind::ScoutReport {
            player,
            revealed,
            keep,
            kept,
        } if player == viewer => Some(json!({
            "revealed": cards(state, revealed),
            "keep": keep,
            "kept": kept,
        })),
        _ => None,
    }
}

fn recent_events(state: &GameState) -> Vec<GameEvent> {
    let mut recent: Vec<GameEvent> = state.log.iter().rev().take(RECENT_EVENTS).cloned().collect();
    recent.reverse();
    recent
}

/// Project the state for one viewer. Unknown viewers get the public part only.
#[must_use]
pub fn build_view(state: &GameState, viewer: &PlayerId) -> GameView {
    let players = state
        .players
        .iter()
        .map(|p| PublicPlayer {
            id: p.id.clone(),
            seat: p.seat,
            faction: p.faction.to_string(),
            capital: p.capital.map(|hex| hex.to_string()),
            resources: p.resources,
            vp: p.vp,
            hand_size: p.deck.hand.len(),
            draw_pile_size: p.deck.draw_pile.len(),
            discard_pile: cards(state, &p.deck.discard_pile),
            burned: p.burned.len(),
            done_this_round: p.done_this_round,
            connected: p.connected,
        })
        .collect();
    let public = PublicView {
        revision: state.revision,
        round: state.round,
        phase: state.phase,
        lead_seat: state.lead_seat,
        players,
        board: Arc::clone(&state.board),
        market: MarketView {
            row: cards(state, &state.market.row),
            row_index: state.market.row_index,
            active: state.market.active.clone(),
            purchases: state.market.purchases.clone(),
        },
        deck_sizes: state.decks.iter().map(|(age, deck)| (*age, deck.len())).collect(),
        modifiers: state.modifiers.iter().map(modifier_view).collect(),
        block: state.block.as_ref().map(|block| public_block(state, block)),
        recent_events: recent_events(state),
        winner: state.winner.clone(),
    };
    let private = state.player(viewer).map(|p| PrivateView {
        player: p.id.clone(),
        hand: cards(state, &p.deck.hand),
        draw_pile_size: p.deck.draw_pile.len(),
        prompt: state
            .block
            .as_ref()
            .and_then(|block| private_prompt(state, block, viewer)),
    });
    GameView { public, private }
}
