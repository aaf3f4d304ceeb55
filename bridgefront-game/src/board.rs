//! Hex board primitives: coordinates, bridges, units and occupancy.
//!
//! Everything here is plain data plus queries. Rule checks that depend on
//! modifiers (movement, combat) live in the resolvers; the one rule the board
//! owns is the two-players-per-hex cap, exposed as [`Board::can_enter`].

pub mod layout;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::MAX_PLAYERS_PER_HEX;
use crate::ids::{CardInstanceId, ChampionId, PlayerId, UnitId};

/// Axial neighbour offsets, clockwise from east.
pub const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("malformed hex key `{0}`")]
    Hex(String),
    #[error("malformed edge key `{0}`")]
    Edge(String),
}

/// Axial hex coordinate. Serializes as `"q,r"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct HexKey {
    pub q: i32,
    pub r: i32,
}

impl HexKey {
    #[must_use]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    #[must_use]
    pub const fn origin() -> Self {
        Self { q: 0, r: 0 }
    }

    #[must_use]
    pub const fn offset(self, dq: i32, dr: i32) -> Self {
        Self {
            q: self.q + dq,
            r: self.r + dr,
        }
    }

    #[must_use]
    pub fn distance(self, other: Self) -> u32 {
        let dq = self.q - other.q;
        let dr = self.r - other.r;
        (dq.unsigned_abs() + dr.unsigned_abs() + (dq + dr).unsigned_abs()) / 2
    }

    #[must_use]
    pub fn ring_distance(self) -> u32 {
        self.distance(Self::origin())
    }

    /// All six axial neighbours, on or off the board.
    pub fn neighbors(self) -> impl Iterator<Item = Self> {
        DIRECTIONS.iter().map(move |(dq, dr)| self.offset(*dq, *dr))
    }

    #[must_use]
    pub fn is_adjacent(self, other: Self) -> bool {
        self.distance(other) == 1
    }
}

impl fmt::Display for HexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.q, self.r)
    }
}

impl FromStr for HexKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (q, r) = s
            .split_once(',')
            .ok_or_else(|| KeyParseError::Hex(s.to_string()))?;
        let q = q
            .trim()
            .parse()
            .map_err(|_| KeyParseError::Hex(s.to_string()))?;
        let r = r
            .trim()
            .parse()
            .map_err(|_| KeyParseError::Hex(s.to_string()))?;
        Ok(Self { q, r })
    }
}

impl From<HexKey> for String {
    fn from(value: HexKey) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for HexKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Canonical undirected edge between two hexes (`a < b`). Serializes as `"q,r|q,r"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EdgeKey {
    a: HexKey,
    b: HexKey,
}

impl EdgeKey {
    #[must_use]
    pub fn new(x: HexKey, y: HexKey) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    #[must_use]
    pub const fn endpoints(self) -> (HexKey, HexKey) {
        (self.a, self.b)
    }

    #[must_use]
    pub fn touches(self, hex: HexKey) -> bool {
        self.a == hex || self.b == hex
    }

    /// The endpoint opposite `hex`, if `hex` is on this edge.
    #[must_use]
    pub fn other(self, hex: HexKey) -> Option<HexKey> {
        if self.a == hex {
            Some(self.b)
        } else if self.b == hex {
            Some(self.a)
        } else {
            None
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.a, self.b)
    }
}

impl FromStr for EdgeKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once('|')
            .ok_or_else(|| KeyParseError::Edge(s.to_string()))?;
        let a = a.parse().map_err(|_| KeyParseError::Edge(s.to_string()))?;
        let b = b.parse().map_err(|_| KeyParseError::Edge(s.to_string()))?;
        Ok(Self::new(a, b))
    }
}

impl From<EdgeKey> for String {
    fn from(value: EdgeKey) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for EdgeKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TileKind {
    Normal,
    Center,
    Forge,
    Mine,
    Capital,
}

impl TileKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Center => "center",
            Self::Forge => "forge",
            Self::Mine => "mine",
            Self::Capital => "capital",
        }
    }
}

pub type Occupants = SmallVec<[UnitId; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hex {
    pub tile: TileKind,
    #[serde(default)]
    pub occupants: BTreeMap<PlayerId, Occupants>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mine_value: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<PlayerId>,
}

impl Hex {
    #[must_use]
    pub fn new(tile: TileKind) -> Self {
        Self {
            tile,
            occupants: BTreeMap::new(),
            mine_value: None,
            owner: None,
        }
    }

    /// Players with at least one unit here, in id order.
    pub fn present_players(&self) -> impl Iterator<Item = &PlayerId> {
        self.occupants
            .iter()
            .filter(|(_, units)| !units.is_empty())
            .map(|(player, _)| player)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bridge {
    pub edge: EdgeKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<PlayerId>,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChampionUnit {
    pub champion: ChampionId,
    pub card: CardInstanceId,
    pub hp: i32,
    pub max_hp: i32,
    pub attack_dice: u32,
    pub hit_faces: u32,
    pub bounty: u32,
    /// Remaining uses of limited abilities, keyed by ability name.
    #[serde(default)]
    pub ability_uses: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UnitKind {
    Force,
    Champion(ChampionUnit),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub owner: PlayerId,
    pub hex: HexKey,
    pub kind: UnitKind,
}

impl Unit {
    #[must_use]
    pub const fn is_champion(&self) -> bool {
        matches!(self.kind, UnitKind::Champion(_))
    }

    #[must_use]
    pub const fn champion(&self) -> Option<&ChampionUnit> {
        match &self.kind {
            UnitKind::Champion(champion) => Some(champion),
            UnitKind::Force => None,
        }
    }

    pub fn champion_mut(&mut self) -> Option<&mut ChampionUnit> {
        match &mut self.kind {
            UnitKind::Champion(champion) => Some(champion),
            UnitKind::Force => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub radius: i32,
    pub hexes: BTreeMap<HexKey, Hex>,
    #[serde(default)]
    pub bridges: BTreeMap<EdgeKey, Bridge>,
    #[serde(default)]
    pub units: BTreeMap<UnitId, Unit>,
    #[serde(default)]
    pub next_unit_id: u32,
}

impl Board {
    /// A board of normal tiles covering every hex within `radius` of the origin.
    #[must_use]
    pub fn with_radius(radius: i32) -> Self {
        let mut hexes = BTreeMap::new();
        for q in -radius..=radius {
            for r in (-radius).max(-q - radius)..=radius.min(-q + radius) {
                hexes.insert(HexKey::new(q, r), Hex::new(TileKind::Normal));
            }
        }
        Self {
            radius,
            hexes,
            bridges: BTreeMap::new(),
            units: BTreeMap::new(),
            next_unit_id: 1,
        }
    }

    #[must_use]
    pub fn contains(&self, hex: HexKey) -> bool {
        self.hexes.contains_key(&hex)
    }

    #[must_use]
    pub fn hex(&self, key: HexKey) -> Option<&Hex> {
        self.hexes.get(&key)
    }

    pub fn hex_mut(&mut self, key: HexKey) -> Option<&mut Hex> {
        self.hexes.get_mut(&key)
    }

    #[must_use]
    pub fn tile(&self, key: HexKey) -> Option<TileKind> {
        self.hexes.get(&key).map(|hex| hex.tile)
    }

    /// On-board neighbours of `key`.
    pub fn neighbors(&self, key: HexKey) -> impl Iterator<Item = HexKey> + '_ {
        key.neighbors().filter(|candidate| self.contains(*candidate))
    }

    #[must_use]
    pub fn is_adjacent(&self, a: HexKey, b: HexKey) -> bool {
        self.contains(a) && self.contains(b) && a.is_adjacent(b)
    }

    #[must_use]
    pub fn bridge(&self, edge: EdgeKey) -> Option<&Bridge> {
        self.bridges.get(&edge)
    }

    /// A bridge exists between `a` and `b` and is not locked.
    #[must_use]
    pub fn has_open_bridge(&self, a: HexKey, b: HexKey) -> bool {
        self.bridges
            .get(&EdgeKey::new(a, b))
            .is_some_and(|bridge| !bridge.locked)
    }

    /// Whether a new bridge may be placed on `edge`.
    #[must_use]
    pub fn can_build_bridge(&self, edge: EdgeKey) -> bool {
        let (a, b) = edge.endpoints();
        self.is_adjacent(a, b) && !self.bridges.contains_key(&edge)
    }

    pub fn add_bridge(&mut self, edge: EdgeKey, owner: Option<PlayerId>, temporary: bool) -> bool {
        if !self.can_build_bridge(edge) {
            return false;
        }
        self.bridges.insert(
            edge,
            Bridge {
                edge,
                owner,
                temporary,
                locked: false,
            },
        );
        true
    }

    pub fn remove_bridge(&mut self, edge: EdgeKey) -> Option<Bridge> {
        self.bridges.remove(&edge)
    }

    pub fn lock_bridge(&mut self, edge: EdgeKey) -> bool {
        match self.bridges.get_mut(&edge) {
            Some(bridge) => {
                bridge.locked = true;
                true
            }
            None => false,
        }
    }

    /// Remove temporary bridges and clear locks; returns how many bridges changed.
    pub fn cleanup_bridges(&mut self) -> usize {
        let before = self.bridges.len();
        self.bridges.retain(|_, bridge| !bridge.temporary);
        let mut changed = before - self.bridges.len();
        for bridge in self.bridges.values_mut() {
            if bridge.locked {
                bridge.locked = false;
                changed += 1;
            }
        }
        changed
    }

    /// Players with units on `hex`.
    #[must_use]
    pub fn players_at(&self, hex: HexKey) -> Vec<PlayerId> {
        self.hexes
            .get(&hex)
            .map(|tile| tile.present_players().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn units_at(&self, hex: HexKey, player: &PlayerId) -> Vec<UnitId> {
        self.hexes
            .get(&hex)
            .and_then(|tile| tile.occupants.get(player))
            .map(|units| units.to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_units_at(&self, hex: HexKey, player: &PlayerId) -> bool {
        self.hexes
            .get(&hex)
            .and_then(|tile| tile.occupants.get(player))
            .is_some_and(|units| !units.is_empty())
    }

    /// The single place the two-players-per-hex cap is decided.
    #[must_use]
    pub fn can_enter(&self, hex: HexKey, player: &PlayerId) -> bool {
        let Some(tile) = self.hexes.get(&hex) else {
            return false;
        };
        let others = tile
            .present_players()
            .filter(|present| *present != player)
            .count();
        others < MAX_PLAYERS_PER_HEX
    }

    /// Whether `player` entering would start a fight there.
    #[must_use]
    pub fn has_enemy_at(&self, hex: HexKey, player: &PlayerId) -> bool {
        self.hexes
            .get(&hex)
            .is_some_and(|tile| tile.present_players().any(|present| present != player))
    }

    #[must_use]
    pub fn is_contested(&self, hex: HexKey) -> bool {
        self.hexes
            .get(&hex)
            .is_some_and(|tile| tile.present_players().count() >= 2)
    }

    #[must_use]
    pub fn contested_hexes(&self) -> Vec<HexKey> {
        self.hexes
            .keys()
            .copied()
            .filter(|key| self.is_contested(*key))
            .collect()
    }

    /// The only player on `hex`, if exactly one is present.
    #[must_use]
    pub fn sole_occupant(&self, hex: HexKey) -> Option<&PlayerId> {
        let tile = self.hexes.get(&hex)?;
        let mut present = tile.present_players();
        let first = present.next()?;
        present.next().is_none().then_some(first)
    }

    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    fn allocate_unit_id(&mut self) -> UnitId {
        let id = UnitId(self.next_unit_id.max(1));
        self.next_unit_id = id.0 + 1;
        id
    }

    fn place(&mut self, hex: HexKey, owner: &PlayerId, kind: UnitKind) -> Option<UnitId> {
        if !self.contains(hex) {
            return None;
        }
        let id = self.allocate_unit_id();
        self.units.insert(
            id,
            Unit {
                id,
                owner: owner.clone(),
                hex,
                kind,
            },
        );
        if let Some(tile) = self.hexes.get_mut(&hex) {
            tile.occupants.entry(owner.clone()).or_default().push(id);
        }
        Some(id)
    }

    pub fn place_forces(&mut self, hex: HexKey, owner: &PlayerId, count: u32) -> Vec<UnitId> {
        (0..count)
            .filter_map(|_| self.place(hex, owner, UnitKind::Force))
            .collect()
    }

    pub fn place_champion(
        &mut self,
        hex: HexKey,
        owner: &PlayerId,
        champion: ChampionUnit,
    ) -> Option<UnitId> {
        self.place(hex, owner, UnitKind::Champion(champion))
    }

    fn detach(&mut self, id: UnitId) -> Option<(HexKey, PlayerId)> {
        let unit = self.units.get(&id)?;
        let (hex, owner) = (unit.hex, unit.owner.clone());
        if let Some(tile) = self.hexes.get_mut(&hex) {
            if let Some(list) = tile.occupants.get_mut(&owner) {
                list.retain(|candidate| *candidate != id);
                if list.is_empty() {
                    tile.occupants.remove(&owner);
                }
            }
        }
        Some((hex, owner))
    }

    /// Move one unit to `to`, keeping the occupant lists in sync.
    pub fn move_unit(&mut self, id: UnitId, to: HexKey) -> bool {
        if !self.contains(to) {
            return false;
        }
        let Some((_, owner)) = self.detach(id) else {
            return false;
        };
        if let Some(unit) = self.units.get_mut(&id) {
            unit.hex = to;
        }
        if let Some(tile) = self.hexes.get_mut(&to) {
            tile.occupants.entry(owner).or_default().push(id);
        }
        true
    }

    /// Delete a unit from both the unit map and its occupant list.
    pub fn remove_unit(&mut self, id: UnitId) -> Option<Unit> {
        self.detach(id)?;
        self.units.remove(&id)
    }

    #[must_use]
    pub fn champions_of(&self, player: &PlayerId) -> usize {
        self.units
            .values()
            .filter(|unit| &unit.owner == player && unit.is_champion())
            .count()
    }

    /// Hexes where `player` currently has units.
    #[must_use]
    pub fn hexes_with_units(&self, player: &PlayerId) -> Vec<HexKey> {
        self.hexes
            .iter()
            .filter(|(_, tile)| tile.occupants.get(player).is_some_and(|u| !u.is_empty()))
            .map(|(key, _)| *key)
            .collect()
    }
}
