//! Default board layout: a deterministic tile pass over a radius board.
//!
//! Layout generation is a seam. The engine only needs something that turns
//! chosen capitals into a populated `Board`; `StandardLayout` is the shipped
//! implementation.

use crate::board::{Board, HexKey, TileKind, DIRECTIONS};
use crate::config::BoardConfig;
use crate::constants::{MAX_MINE_VALUE, MIN_MINE_VALUE};
use crate::ids::PlayerId;
use crate::rng::RngState;

/// The six corner slots of the outer ring, in direction order.
#[must_use]
pub fn capital_slots(radius: i32) -> Vec<HexKey> {
    DIRECTIONS
        .iter()
        .map(|(dq, dr)| HexKey::new(dq * radius, dr * radius))
        .collect()
}

pub trait BoardLayout {
    /// Build a board around the drafted capitals, threading the RNG.
    fn build(
        &self,
        config: &BoardConfig,
        capitals: &[(PlayerId, HexKey)],
        rng: &RngState,
    ) -> (Board, RngState);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardLayout;

impl BoardLayout for StandardLayout {
    fn build(
        &self,
        config: &BoardConfig,
        capitals: &[(PlayerId, HexKey)],
        rng: &RngState,
    ) -> (Board, RngState) {
        let mut board = Board::with_radius(config.radius);
        if let Some(center) = board.hex_mut(HexKey::origin()) {
            center.tile = TileKind::Center;
        }
        for (player, hex) in capitals {
            if let Some(tile) = board.hex_mut(*hex) {
                tile.tile = TileKind::Capital;
                tile.owner = Some(player.clone());
            }
        }

        // Specials go on the interior ring band, never next to a capital.
        let candidates: Vec<HexKey> = board
            .hexes
            .iter()
            .filter(|(key, hex)| {
                hex.tile == TileKind::Normal
                    && key.ring_distance() < board.radius.unsigned_abs()
                    && !capitals.iter().any(|(_, capital)| capital.is_adjacent(**key))
            })
            .map(|(key, _)| *key)
            .collect();
        let (shuffled, mut rng) = rng.shuffle(candidates);

        let mut slots = shuffled.into_iter();
        for _ in 0..config.forge_count {
            let Some(key) = slots.next() else { break };
            if let Some(hex) = board.hex_mut(key) {
                hex.tile = TileKind::Forge;
            }
        }
        for _ in 0..config.mine_count {
            let Some(key) = slots.next() else { break };
            let (value, next) = rng.rand_int(MIN_MINE_VALUE, MAX_MINE_VALUE);
            rng = next;
            if let Some(hex) = board.hex_mut(key) {
                hex.tile = TileKind::Mine;
                hex.mine_value = Some(value);
            }
        }
        log::debug!(
            "board built: radius {} with {} capitals",
            config.radius,
            capitals.len()
        );
        (board, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capital_slots_sit_on_the_outer_ring() {
        let slots = capital_slots(4);
        assert_eq!(slots.len(), 6);
        assert!(slots.iter().all(|slot| slot.ring_distance() == 4));
    }

    #[test]
    fn layout_is_deterministic_and_places_specials() {
        let config = BoardConfig::default();
        let capitals = vec![
            (PlayerId::new("a"), HexKey::new(4, 0)),
            (PlayerId::new("b"), HexKey::new(-4, 0)),
        ];
        let rng = RngState::from_seed(11, b"layout");
        let (first, rng_a) = StandardLayout.build(&config, &capitals, &rng);
        let (second, rng_b) = StandardLayout.build(&config, &capitals, &rng);
        assert_eq!(first, second);
        assert_eq!(rng_a, rng_b);

        let count = |kind: TileKind| first.hexes.values().filter(|hex| hex.tile == kind).count();
        assert_eq!(count(TileKind::Center), 1);
        assert_eq!(count(TileKind::Capital), 2);
        assert_eq!(count(TileKind::Forge), 3);
        assert_eq!(count(TileKind::Mine), 4);
        assert_eq!(
            first.hex(HexKey::new(4, 0)).and_then(|hex| hex.owner.clone()),
            Some(PlayerId::new("a"))
        );
        assert!(first
            .hexes
            .values()
            .filter(|hex| hex.tile == TileKind::Mine)
            .all(|hex| hex.mine_value.is_some_and(|v| (1..=3).contains(&v))));
    }
}
