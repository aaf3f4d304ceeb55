//! Hit assignment policies.
//!
//! Assignment is a pure function of the RNG, the policy and the defenders, so
//! every rolled hit lands on exactly one target unit.

use std::collections::BTreeMap;

use crate::board::{Board, HexKey, UnitKind};
use crate::ids::{PlayerId, UnitId};
use crate::modifiers::HitPolicy;
use crate::numbers::u32_to_usize;
use crate::rng::RngState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub unit: UnitId,
    /// Current hp for champions, `None` for forces.
    pub champion_hp: Option<i32>,
}

impl Target {
    const fn capacity(self) -> u32 {
        match self.champion_hp {
            Some(hp) if hp > 0 => hp.unsigned_abs(),
            Some(_) => 0,
            None => 1,
        }
    }
}

/// Defending units of `player` on `hex`, in placement order.
#[must_use]
pub fn targets_on(board: &Board, hex: HexKey, player: &PlayerId) -> Vec<Target> {
    board
        .units_at(hex, player)
        .into_iter()
        .filter_map(|id| board.unit(id))
        .map(|unit| Target {
            unit: unit.id,
            champion_hp: match &unit.kind {
                UnitKind::Force => None,
                UnitKind::Champion(champion) => Some(champion.hp),
            },
        })
        .collect()
}

/// Spread `hits` over `targets` according to `policy`.
///
/// Returns one entry per hit (a unit may appear several times). With no
/// targets nothing is assigned.
#[must_use]
pub fn assign_hits(
    rng: &RngState,
    policy: HitPolicy,
    hits: u32,
    targets: &[Target],
) -> (Vec<UnitId>, RngState) {
    if targets.is_empty() || hits == 0 {
        return (Vec::new(), rng.clone());
    }
    match policy {
        HitPolicy::Random => random_hits(rng, hits, targets, Vec::new()),
        HitPolicy::ForcesFirst => ordered_hits(rng, hits, targets, true),
        HitPolicy::ChampionsFirst => ordered_hits(rng, hits, targets, false),
        HitPolicy::FocusFire { hits: steer } => focus_fire(rng, hits, steer, targets),
    }
}

fn random_hits(
    rng: &RngState,
    hits: u32,
    targets: &[Target],
    mut assigned: Vec<UnitId>,
) -> (Vec<UnitId>, RngState) {
    let mut cursor = rng.clone();
    for _ in 0..hits {
        let (index, next) = cursor.pick_index(targets.len());
        cursor = next;
        assigned.push(targets[index].unit);
    }
    (assigned, cursor)
}

fn ordered_hits(
    rng: &RngState,
    hits: u32,
    targets: &[Target],
    forces_first: bool,
) -> (Vec<UnitId>, RngState) {
    let mut forces: Vec<Target> = targets
        .iter()
        .copied()
        .filter(|t| t.champion_hp.is_none())
        .collect();
    let mut champions: Vec<Target> = targets
        .iter()
        .copied()
        .filter(|t| t.champion_hp.is_some())
        .collect();
    champions.sort_by_key(|t| (t.champion_hp, t.unit));
    let order: Vec<Target> = if forces_first {
        forces.append(&mut champions);
        forces
    } else {
        champions.append(&mut forces);
        champions
    };

    let mut assigned = Vec::with_capacity(u32_to_usize(hits));
    let mut remaining = hits;
    for target in order {
        if remaining == 0 {
            break;
        }
        let take = target.capacity().min(remaining);
        assigned.extend(std::iter::repeat_n(target.unit, u32_to_usize(take)));
        remaining -= take;
    }
    // Overkill hits still land somewhere.
    random_hits(rng, remaining, targets, assigned)
}

fn focus_fire(
    rng: &RngState,
    hits: u32,
    steer: u32,
    targets: &[Target],
) -> (Vec<UnitId>, RngState) {
    let mut hp: BTreeMap<UnitId, i32> = targets
        .iter()
        .filter_map(|t| t.champion_hp.map(|hp| (t.unit, hp)))
        .collect();
    let mut assigned = Vec::new();
    let mut steered = 0;
    while steered < steer.min(hits) {
        let Some((&unit, _)) = hp
            .iter()
            .filter(|(_, hp)| **hp > 0)
            .min_by_key(|(unit, hp)| (**hp, **unit))
        else {
            break;
        };
        if let Some(entry) = hp.get_mut(&unit) {
            *entry -= 1;
        }
        assigned.push(unit);
        steered += 1;
    }
    random_hits(rng, hits - steered, targets, assigned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn force(id: u32) -> Target {
        Target {
            unit: UnitId(id),
            champion_hp: None,
        }
    }

    fn champion(id: u32, hp: i32) -> Target {
        Target {
            unit: UnitId(id),
            champion_hp: Some(hp),
        }
    }

    #[test]
    fn every_policy_conserves_hits() {
        let targets = vec![force(1), force(2), champion(3, 3), champion(4, 1)];
        let policies = [
            HitPolicy::Random,
            HitPolicy::ForcesFirst,
            HitPolicy::ChampionsFirst,
            HitPolicy::FocusFire { hits: 2 },
        ];
        let mut rng = RngState::from_seed(5, b"assign");
        for policy in policies {
            for hits in 0..12 {
                let (assigned, next) = assign_hits(&rng, policy, hits, &targets);
                rng = next;
                assert_eq!(assigned.len(), u32_to_usize(hits), "{policy:?} with {hits} hits");
                assert!(assigned.iter().all(|unit| targets.iter().any(|t| t.unit == *unit)));
            }
        }
    }

    #[test]
    fn forces_first_fills_forces_before_champions() {
        let targets = vec![champion(3, 2), force(1), force(2)];
        let rng = RngState::from_seed(1, b"order");
        let (assigned, _) = assign_hits(&rng, HitPolicy::ForcesFirst, 3, &targets);
        assert_eq!(assigned, vec![UnitId(1), UnitId(2), UnitId(3)]);
    }

    #[test]
    fn champions_first_targets_the_weakest_champion() {
        let targets = vec![force(1), champion(3, 2), champion(4, 1)];
        let rng = RngState::from_seed(1, b"order");
        let (assigned, _) = assign_hits(&rng, HitPolicy::ChampionsFirst, 2, &targets);
        assert_eq!(assigned, vec![UnitId(4), UnitId(3)]);
    }

    #[test]
    fn focus_fire_steers_only_the_requested_hits() {
        let targets = vec![force(1), champion(2, 5)];
        let rng = RngState::from_seed(1, b"focus");
        let (assigned, _) = assign_hits(&rng, HitPolicy::FocusFire { hits: 2 }, 4, &targets);
        assert_eq!(&assigned[..2], &[UnitId(2), UnitId(2)]);
        assert_eq!(assigned.len(), 4);
    }

    #[test]
    fn no_targets_means_no_assignment() {
        let rng = RngState::from_seed(1, b"empty");
        let (assigned, next) = assign_hits(&rng, HitPolicy::Random, 3, &[]);
        assert!(assigned.is_empty());
        assert_eq!(next, rng);
    }
}
