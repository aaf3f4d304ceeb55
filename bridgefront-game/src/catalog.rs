//! Static, id-keyed card, champion and faction definitions.
//!
//! The resolvers interpret these records; nothing in the catalog executes
//! rules by itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::board::{EdgeKey, HexKey};
use crate::ids::{CardId, ChampionId, FactionId, UnitId};
use crate::modifiers::{Duration, ModifierKind};

const DEFAULT_CATALOG_DATA: &str = include_str!("../assets/catalog.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Age {
    I,
    II,
    III,
}

impl Age {
    pub const ALL: [Self; 3] = [Self::I, Self::II, Self::III];

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::I => Some(Self::II),
            Self::II => Some(Self::III),
            Self::III => None,
        }
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::I => "I",
            Self::II => "II",
            Self::III => "III",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    #[serde(default)]
    pub mana: u32,
    #[serde(default)]
    pub gold: u32,
}

/// What a card asks its player to point at when declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetSpec {
    #[default]
    None,
    /// A hex the player may deploy onto: their capital or a hex they hold.
    OwnHex,
    Edge,
    OwnChampion,
    EnemyUnit,
    /// A `from` hex holding the player's units and a destination `to`.
    Path,
}

/// Declared targets travelling with a card play.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<HexKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<HexKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<HexKey>,
    /// Subset of units to move; empty means every unit on `from`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<UnitId>,
}

/// Where an `AddModifier` effect attaches its modifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeTarget {
    #[default]
    None,
    TargetHex,
    TargetEdge,
    TargetUnit,
    OwnCapital,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum EffectOp {
    GainGold {
        amount: u32,
    },
    GainMana {
        amount: u32,
    },
    DrawCards {
        count: u32,
    },
    GainVictoryPoints {
        amount: u32,
    },
    DeployForces {
        count: u32,
    },
    RecruitChampion {
        champion: ChampionId,
    },
    MoveStack {
        max_distance: u32,
    },
    BuildBridge,
    TemporaryBridge,
    DestroyBridge,
    LockBridge,
    Heal {
        amount: i32,
    },
    Strike {
        damage: i32,
    },
    OpenTunnel,
    AddModifier {
        modifier: ModifierKind,
        duration: Duration,
        #[serde(default)]
        scope: ScopeTarget,
    },
    ScoutReport {
        look: u32,
        keep: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDef {
    pub id: CardId,
    pub name: String,
    /// Market age; `None` marks starter and faction cards.
    #[serde(default)]
    pub age: Option<Age>,
    #[serde(default = "default_copies")]
    pub copies: u32,
    #[serde(default)]
    pub cost: Cost,
    pub initiative: u32,
    /// Burned cards leave the game when played instead of being discarded.
    #[serde(default)]
    pub burn: bool,
    #[serde(default)]
    pub target: TargetSpec,
    #[serde(default)]
    pub effects: Vec<EffectOp>,
}

const fn default_copies() -> u32 {
    1
}

impl CardDef {
    /// Champion recruited by this card, if it is a champion card.
    #[must_use]
    pub fn champion(&self) -> Option<&ChampionId> {
        self.effects.iter().find_map(|op| match op {
            EffectOp::RecruitChampion { champion } => Some(champion),
            _ => None,
        })
    }

    #[must_use]
    pub fn burns_on_play(&self) -> bool {
        self.burn || self.champion().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub name: String,
    pub modifier: ModifierKind,
    /// Limited abilities expire after this many firings.
    #[serde(default)]
    pub uses: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChampionDef {
    pub id: ChampionId,
    pub name: String,
    pub hp: i32,
    pub attack_dice: u32,
    pub hit_faces: u32,
    #[serde(default)]
    pub bounty: u32,
    #[serde(default)]
    pub abilities: Vec<AbilityDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionDef {
    pub id: FactionId,
    pub name: String,
    #[serde(default)]
    pub passives: Vec<ModifierKind>,
    pub starter_deck: Vec<CardId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("faction {faction} lists unknown starter card {card}")]
    UnknownStarterCard { faction: FactionId, card: CardId },
    #[error("card {card} recruits unknown champion {champion}")]
    UnknownChampion { card: CardId, champion: ChampionId },
    #[error("catalog has no {0}")]
    Empty(&'static str),
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    factions: Vec<FactionDef>,
    #[serde(default)]
    champions: Vec<ChampionDef>,
    #[serde(default)]
    cards: Vec<CardDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub cards: BTreeMap<CardId, CardDef>,
    pub champions: BTreeMap<ChampionId, ChampionDef>,
    pub factions: BTreeMap<FactionId, FactionDef>,
}

impl Catalog {
    /// Create an empty catalog (useful for tests)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load catalog data from a JSON document with `factions`, `champions` and `cards` lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into catalog records.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Ok(Self {
            cards: document
                .cards
                .into_iter()
                .map(|card| (card.id.clone(), card))
                .collect(),
            champions: document
                .champions
                .into_iter()
                .map(|champion| (champion.id.clone(), champion))
                .collect(),
            factions: document
                .factions
                .into_iter()
                .map(|faction| (faction.id.clone(), faction))
                .collect(),
        })
    }

    /// The bundled default catalog.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_CATALOG_DATA).unwrap_or_else(|err| {
            log::error!("bundled catalog failed to parse: {err}");
            Self::empty()
        })
    }

    #[must_use]
    pub fn card(&self, id: &CardId) -> Option<&CardDef> {
        self.cards.get(id)
    }

    #[must_use]
    pub fn champion(&self, id: &ChampionId) -> Option<&ChampionDef> {
        self.champions.get(id)
    }

    #[must_use]
    pub fn faction(&self, id: &FactionId) -> Option<&FactionDef> {
        self.factions.get(id)
    }

    /// Market cards of one age, in id order.
    pub fn market_cards(&self, age: Age) -> impl Iterator<Item = &CardDef> {
        self.cards.values().filter(move |card| card.age == Some(age))
    }

    /// Check cross references between records.
    ///
    /// # Errors
    ///
    /// Returns the first dangling reference found.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.factions.is_empty() {
            return Err(CatalogError::Empty("factions"));
        }
        for faction in self.factions.values() {
            if let Some(card) = faction
                .starter_deck
                .iter()
                .find(|card| !self.cards.contains_key(*card))
            {
                return Err(CatalogError::UnknownStarterCard {
                    faction: faction.id.clone(),
                    card: card.clone(),
                });
            }
        }
        for card in self.cards.values() {
            if let Some(champion) = card.champion() {
                if !self.champions.contains_key(champion) {
                    return Err(CatalogError::UnknownChampion {
                        card: card.id.clone(),
                        champion: champion.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
