//! Blocks: data-only synchronization points.
//!
//! A block names the players still owed an answer and carries both the public
//! prompt and the answers received so far. The pump resolves it once
//! `waiting_for` is empty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::actions::Declaration;
use crate::board::{EdgeKey, HexKey};
use crate::combat::BattleSetup;
use crate::ids::{CardInstanceId, PlayerId};
use crate::market::{Bid, RollOff};
use crate::round::phase::{CollectionChoice, CollectionPrompt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlockKind {
    #[serde(rename = "setup.deckPreview")]
    DeckPreview,
    #[serde(rename = "setup.capitalDraft")]
    CapitalDraft { available: Vec<HexKey> },
    #[serde(rename = "setup.startingBridges")]
    StartingBridges {
        required: u32,
        #[serde(default)]
        submitted: BTreeMap<PlayerId, Vec<EdgeKey>>,
    },
    #[serde(rename = "setup.freeStartingCard")]
    FreeStartingCard {
        offers: BTreeMap<PlayerId, Vec<CardInstanceId>>,
        #[serde(default)]
        chosen: BTreeMap<PlayerId, CardInstanceId>,
    },
    #[serde(rename = "round.quietStudy")]
    QuietStudy {
        max_discard: u32,
        #[serde(default)]
        submitted: BTreeMap<PlayerId, Vec<CardInstanceId>>,
    },
    #[serde(rename = "market.bidsForCard")]
    MarketBids {
        card: CardInstanceId,
        row_index: usize,
        #[serde(default)]
        bids: BTreeMap<PlayerId, Bid>,
    },
    #[serde(rename = "market.rollOff")]
    MarketRollOff(RollOff),
    #[serde(rename = "actionStep.declarations")]
    Declarations {
        #[serde(default)]
        declarations: BTreeMap<PlayerId, Declaration>,
    },
    #[serde(rename = "collection.choices")]
    Collection {
        prompts: BTreeMap<PlayerId, Vec<CollectionPrompt>>,
        #[serde(default)]
        choices: BTreeMap<PlayerId, Vec<CollectionChoice>>,
    },
    #[serde(rename = "combat.retreat")]
    Retreat {
        battle: BattleSetup,
        options: BTreeMap<PlayerId, Vec<EdgeKey>>,
        #[serde(default)]
        choices: BTreeMap<PlayerId, Option<EdgeKey>>,
    },
    #[serde(rename = "action.scoutReport")]
    ScoutReport {
        player: PlayerId,
        revealed: Vec<CardInstanceId>,
        keep: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kept: Option<Vec<CardInstanceId>>,
    },
}

impl BlockKind {
    /// Stable tag, identical to the serialized `type`.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::DeckPreview => "setup.deckPreview",
            Self::CapitalDraft { .. } => "setup.capitalDraft",
            Self::StartingBridges { .. } => "setup.startingBridges",
            Self::FreeStartingCard { .. } => "setup.freeStartingCard",
            Self::QuietStudy { .. } => "round.quietStudy",
            Self::MarketBids { .. } => "market.bidsForCard",
            Self::MarketRollOff(_) => "market.rollOff",
            Self::Declarations { .. } => "actionStep.declarations",
            Self::Collection { .. } => "collection.choices",
            Self::Retreat { .. } => "combat.retreat",
            Self::ScoutReport { .. } => "action.scoutReport",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub waiting_for: Vec<PlayerId>,
    pub kind: BlockKind,
}

impl Block {
    #[must_use]
    pub fn new(waiting_for: Vec<PlayerId>, kind: BlockKind) -> Self {
        log::debug!("block {} waiting on {waiting_for:?}", kind.tag());
        Self { waiting_for, kind }
    }

    #[must_use]
    pub fn is_waiting_for(&self, player: &PlayerId) -> bool {
        self.waiting_for.contains(player)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.waiting_for.is_empty()
    }

    /// Mark a player as answered.
    pub fn answered(&mut self, player: &PlayerId) {
        self.waiting_for.retain(|candidate| candidate != player);
    }
}
