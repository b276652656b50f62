/// Teleporter registry: output positions per group, built once per map.
///
/// Two tables, both keyed by group number:
///   - `outs`         `TeleTile::Out(n)` cells, used by standard and evil
///                     entrances of group `n`
///   - `check_outs`   `TeleTile::CheckpointOut(n)` cells, used when resuming
///                     from tele-checkpoint `n`
///
/// Positions are cell centres in map order. Selection among several
/// outputs is uniform through the world's RNG; an empty group selects
/// nothing.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::math::Vec2;
use crate::domain::tile::TeleTile;

use super::map::GameMap;

#[derive(Clone, Debug, Default)]
pub struct Teleporters {
    outs: BTreeMap<u8, Vec<Vec2>>,
    check_outs: BTreeMap<u8, Vec<Vec2>>,
}

impl Teleporters {
    pub fn build(map: &GameMap) -> Self {
        let mut t = Teleporters::default();
        for (i, tele) in map.tele.iter().enumerate() {
            match tele {
                Some(TeleTile::Out(n)) => t.outs.entry(*n).or_default().push(map.cell_center(i)),
                Some(TeleTile::CheckpointOut(n)) => {
                    t.check_outs.entry(*n).or_default().push(map.cell_center(i))
                }
                _ => {}
            }
        }
        for tele in map.tele.iter().flatten() {
            if let TeleTile::In(n) | TeleTile::EvilIn(n) = tele {
                if !t.outs.contains_key(n) {
                    log::warn!("teleporter group {n} has an entrance but no outputs");
                }
            }
        }
        t
    }

    pub fn outs(&self, group: u8) -> &[Vec2] {
        self.outs.get(&group).map_or(&[], Vec::as_slice)
    }

    pub fn check_outs(&self, group: u8) -> &[Vec2] {
        self.check_outs.get(&group).map_or(&[], Vec::as_slice)
    }

    /// Uniform pick among the outputs of `group`.
    pub fn pick<R: Rng>(&self, group: u8, rng: &mut R) -> Option<Vec2> {
        self.outs(group).choose(rng).copied()
    }

    /// Resume point for tele-checkpoint `from`: the first checkpoint group
    /// at or below `from` that has outputs.
    pub fn pick_checkpoint<R: Rng>(&self, from: u8, rng: &mut R) -> Option<Vec2> {
        (1..=from).rev().find_map(|n| self.check_outs(n).choose(rng).copied())
    }
}
