//! The single root game value and its per-player records.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hasher;
use std::sync::Arc;
use twox_hash::XxHash64;

use crate::actions::ActionResolution;
use crate::block::Block;
use crate::board::{Board, HexKey};
use crate::catalog::{Age, CardDef, Catalog};
use crate::config::GameConfig;
use crate::constants::{DIGEST_SEED, HOST_SEAT};
use crate::events::{EventKind, EventLog};
use crate::ids::{CardId, CardInstanceId, FactionId, PlayerId};
use crate::market::MarketState;
use crate::modifiers::Modifier;
use crate::numbers::u32_to_usize;
use crate::rng::RngState;
use crate::round::Phase;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub gold: u32,
    pub mana: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryPoints {
    pub permanent: u32,
    pub control: u32,
    pub total: u32,
}

impl VictoryPoints {
    pub const fn recompute(&mut self) {
        self.total = self.permanent + self.control;
    }
}

/// Card piles; index 0 of `draw_pile` is the top card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub draw_pile: Vec<CardInstanceId>,
    pub discard_pile: Vec<CardInstanceId>,
    pub hand: Vec<CardInstanceId>,
    pub scrapped: Vec<CardInstanceId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundFlags {
    pub moved: bool,
    pub cards_played: u32,
    pub cards_discarded: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub seat: usize,
    pub faction: FactionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<HexKey>,
    pub resources: Resources,
    pub vp: VictoryPoints,
    pub deck: Deck,
    #[serde(default)]
    pub burned: Vec<CardInstanceId>,
    #[serde(default)]
    pub flags: RoundFlags,
    #[serde(default)]
    pub done_this_round: bool,
    #[serde(default = "default_connected")]
    pub connected: bool,
}

const fn default_connected() -> bool {
    true
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, seat: usize, faction: FactionId, starting_gold: u32) -> Self {
        Self {
            id,
            seat,
            faction,
            capital: None,
            resources: Resources {
                gold: starting_gold,
                mana: 0,
            },
            vp: VictoryPoints::default(),
            deck: Deck::default(),
            burned: Vec::new(),
            flags: RoundFlags::default(),
            done_this_round: false,
            connected: true,
        }
    }
}

/// Bookkeeping for the setup steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupProgress {
    /// Players still to pick a capital, next picker first.
    #[serde(default)]
    pub capital_queue: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    #[serde(skip)]
    catalog: Arc<Catalog>,
    pub config: Arc<GameConfig>,
    pub seed: u64,
    pub rng: RngState,
    pub revision: u64,
    pub players: Vec<Player>,
    pub round: u32,
    pub lead_seat: usize,
    pub phase: Phase,
    pub board: Arc<Board>,
    pub market: MarketState,
    pub decks: BTreeMap<Age, Vec<CardInstanceId>>,
    pub log: Arc<EventLog>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ActionResolution>,
    pub cards: Arc<BTreeMap<CardInstanceId, CardId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
    #[serde(default)]
    pub setup: SetupProgress,
    /// Contested hexes already fought over during this round's sieges step.
    #[serde(default)]
    pub sieges_fought: BTreeSet<HexKey>,
}

impl GameState {
    /// Assemble a fresh state. Setup logic lives in `round::setup`.
    #[must_use]
    pub(crate) fn assemble(
        catalog: Arc<Catalog>,
        config: Arc<GameConfig>,
        seed: u64,
        rng: RngState,
        players: Vec<Player>,
        cards: BTreeMap<CardInstanceId, CardId>,
        decks: BTreeMap<Age, Vec<CardInstanceId>>,
    ) -> Self {
        let log = Arc::new(EventLog::new(config.log_limit));
        let board = Arc::new(Board::with_radius(config.board.radius));
        Self {
            catalog,
            config,
            seed,
            rng,
            revision: 0,
            players,
            round: 0,
            lead_seat: 0,
            phase: Phase::initial(),
            board,
            market: MarketState::default(),
            decks,
            log,
            modifiers: Vec::new(),
            block: None,
            resolution: None,
            cards: Arc::new(cards),
            winner: None,
            setup: SetupProgress::default(),
            sieges_fought: BTreeSet::new(),
        }
    }

    /// Reattach the catalog after deserializing a saved state.
    #[must_use]
    pub fn rehydrate(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn catalog_handle(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| &player.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| &player.id == id)
    }

    #[must_use]
    pub fn seat_of(&self, id: &PlayerId) -> Option<usize> {
        self.player(id).map(|player| player.seat)
    }

    #[must_use]
    pub fn host(&self) -> Option<&PlayerId> {
        self.players.get(HOST_SEAT).map(|player| &player.id)
    }

    /// Player ids in seat order.
    #[must_use]
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|player| player.id.clone()).collect()
    }

    /// Player ids starting at the lead seat and wrapping around.
    #[must_use]
    pub fn lead_order(&self) -> Vec<PlayerId> {
        let count = self.players.len();
        (0..count)
            .filter_map(|offset| self.players.get((self.lead_seat + offset) % count.max(1)))
            .map(|player| player.id.clone())
            .collect()
    }

    /// Position of a player in the current lead order.
    #[must_use]
    pub fn lead_rank(&self, id: &PlayerId) -> usize {
        let count = self.players.len().max(1);
        self.seat_of(id)
            .map_or(usize::MAX, |seat| (seat + count - self.lead_seat % count) % count)
    }

    #[must_use]
    pub fn card_id(&self, instance: CardInstanceId) -> Option<&CardId> {
        self.cards.get(&instance)
    }

    #[must_use]
    pub fn card_def(&self, instance: CardInstanceId) -> Option<&CardDef> {
        self.cards
            .get(&instance)
            .and_then(|card| self.catalog.card(card))
    }

    /// The board, unshared from earlier revisions on first write.
    pub fn board_mut(&mut self) -> &mut Board {
        Arc::make_mut(&mut self.board)
    }

    pub fn push_event(&mut self, kind: EventKind, payload: serde_json::Value) {
        Arc::make_mut(&mut self.log).push(self.round, kind, payload);
    }

    /// Draw an integer in `[min, max]` and rebind the RNG.
    pub fn rand_int(&mut self, min: u32, max: u32) -> u32 {
        let (value, next) = self.rng.rand_int(min, max);
        self.rng = next;
        value
    }

    pub fn roll_die(&mut self, sides: u32) -> u32 {
        let (value, next) = self.rng.roll_die(sides);
        self.rng = next;
        value
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        let (value, next) = self.rng.pick_index(len);
        self.rng = next;
        value
    }

    pub fn shuffle<T>(&mut self, items: Vec<T>) -> Vec<T> {
        let (items, next) = self.rng.shuffle(items);
        self.rng = next;
        items
    }

    pub fn gain_gold(&mut self, id: &PlayerId, amount: u32) -> u32 {
        let cap = self.config.gold_cap;
        self.player_mut(id).map_or(0, |player| {
            let before = player.resources.gold;
            player.resources.gold = before.saturating_add(amount).min(cap.max(before));
            player.resources.gold - before
        })
    }

    pub fn gain_mana(&mut self, id: &PlayerId, amount: u32) -> u32 {
        let cap = self.config.mana_cap;
        self.player_mut(id).map_or(0, |player| {
            let before = player.resources.mana;
            player.resources.mana = before.saturating_add(amount).min(cap.max(before));
            player.resources.mana - before
        })
    }

    /// Remove up to `amount` gold; returns what was actually taken.
    pub fn take_gold(&mut self, id: &PlayerId, amount: u32) -> u32 {
        self.player_mut(id).map_or(0, |player| {
            let taken = amount.min(player.resources.gold);
            player.resources.gold -= taken;
            taken
        })
    }

    /// Draw up to `count` cards without exceeding the hand limit, reshuffling
    /// the discard pile when the draw pile runs out. Returns cards drawn.
    pub fn draw_cards(&mut self, id: &PlayerId, count: u32) -> u32 {
        let limit = u32_to_usize(self.config.hand_limit);
        let mut drawn = 0;
        for _ in 0..count {
            let Some(player) = self.player(id) else {
                return drawn;
            };
            if player.deck.hand.len() >= limit {
                break;
            }
            if player.deck.draw_pile.is_empty() {
                if player.deck.discard_pile.is_empty() {
                    break;
                }
                let discards = player.deck.discard_pile.clone();
                let reshuffled = self.shuffle(discards);
                if let Some(player) = self.player_mut(id) {
                    player.deck.discard_pile.clear();
                    player.deck.draw_pile = reshuffled;
                }
            }
            if let Some(player) = self.player_mut(id) {
                if player.deck.draw_pile.is_empty() {
                    break;
                }
                let card = player.deck.draw_pile.remove(0);
                player.deck.hand.push(card);
                drawn += 1;
            }
        }
        drawn
    }

    /// Flag a player's connection state; the turn still has to resolve.
    #[must_use]
    pub fn with_connectivity(&self, id: &PlayerId, connected: bool) -> Self {
        let mut next = self.clone();
        if let Some(player) = next.player_mut(id) {
            player.connected = connected;
        }
        next
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    /// xxHash64 over the canonical JSON encoding.
    #[must_use]
    pub fn digest(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(DIGEST_SEED);
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.write(&bytes),
            Err(err) => log::error!("state failed to serialize for digest: {err}"),
        }
        hasher.finish()
    }
}
