/// GameMap: every tile layer of a loaded map plus the queries built on them.
///
/// ## Layers
///
/// All layers share the same `width × height` grid, row-major, indexed by
/// `y * width + x`:
///   - `game`     solidity, hazards, race markers, toggles, stoppers
///   - `front`    same tile kinds, stacked over `game` (never solid)
///   - `tele`     teleporter entrances/outputs and tele-checkpoints
///   - `switch`   switch-group cells
///   - `speedup`  speed modifiers
///   - `tune`     tune-zone numbers
///
/// Layers are immutable after load. Runtime state (switch status) lives in
/// `Switchers` and is combined at sampling time.
///
/// ## Out-of-range lookups
///
/// Points outside the grid are clamped onto the border cell, so the map
/// behaves as if its edge tiles extended forever.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::math::{Vec2, TILE_SIZE};
use crate::domain::physics::{Collision, PHYS_SIZE};
use crate::domain::rules::{LayerSample, TileContext, NEIGHBOUR_OFFSET};
use crate::domain::tile::{SwitchCell, SwitchTile, Speedup, TeleTile, Tile};

use super::switch::{Switchers, TEAM_SUPER};

/// Tiles beyond the grid a character may travel before it is killed.
const CLIP_MARGIN: f32 = 200.0 * TILE_SIZE;

#[derive(Clone, Debug)]
pub struct GameMap {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub game: Vec<Tile>,
    pub front: Vec<Tile>,
    pub tele: Vec<Option<TeleTile>>,
    pub switch: Vec<Option<SwitchCell>>,
    pub speedup: Vec<Option<Speedup>>,
    pub tune: Vec<u8>,
    /// Spawn points, cell centres, in map order.
    pub spawns: Vec<Vec2>,
}

impl GameMap {
    /// All-air map of the given size.
    pub fn new(name: &str, width: usize, height: usize) -> Self {
        let n = width * height;
        GameMap {
            name: name.to_string(),
            width,
            height,
            game: vec![Tile::Air; n],
            front: vec![Tile::Air; n],
            tele: vec![None; n],
            switch: vec![None; n],
            speedup: vec![None; n],
            tune: vec![0; n],
            spawns: vec![],
        }
    }

    // ── Indexing ──

    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Cell of a point, clamped onto the grid.
    pub fn clamped_cell(&self, p: Vec2) -> (usize, usize) {
        let (cx, cy) = p.cell();
        (
            cx.clamp(0, self.width as i32 - 1) as usize,
            cy.clamp(0, self.height as i32 - 1) as usize,
        )
    }

    pub fn index_of(&self, p: Vec2) -> usize {
        let (x, y) = self.clamped_cell(p);
        self.index(x, y)
    }

    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    pub fn cell_center(&self, index: usize) -> Vec2 {
        let (x, y) = self.coords(index);
        Vec2::new((x as f32 + 0.5) * TILE_SIZE, (y as f32 + 0.5) * TILE_SIZE)
    }

    pub fn game_at(&self, p: Vec2) -> Tile {
        self.game[self.index_of(p)]
    }

    pub fn tune_zone_at(&self, p: Vec2) -> u8 {
        self.tune[self.index_of(p)]
    }

    /// Highest switch group referenced anywhere on the map.
    pub fn max_switch_group(&self) -> u8 {
        self.switch.iter().flatten().map(|c| c.group).max().unwrap_or(0)
    }

    /// Uniform pick among the spawn points.
    pub fn pick_spawn<R: Rng>(&self, rng: &mut R) -> Option<Vec2> {
        self.spawns.choose(rng).copied()
    }

    // ── Tile Sampler ──

    /// Game, front and (team-visible) switch stopper of one cell.
    pub fn sample_index(&self, index: usize, team: usize, switchers: &Switchers, tick: i64) -> LayerSample {
        let (x, y) = self.coords(index);
        let switch_stopper = match self.switch[index] {
            Some(SwitchCell { group, kind: SwitchTile::Stopper(s) })
                if team != TEAM_SUPER && switchers.status(group, team, tick) =>
            {
                Some(s)
            }
            _ => None,
        };
        LayerSample {
            cell: (x as i32, y as i32),
            game: self.game[index],
            front: self.front[index],
            switch_stopper,
        }
    }

    pub fn sample(&self, p: Vec2, team: usize, switchers: &Switchers, tick: i64) -> LayerSample {
        self.sample_index(self.index_of(p), team, switchers, tick)
    }

    /// The five-point tile context: `index` as the centre cell, neighbours
    /// sampled around `at`.
    pub fn context(&self, index: usize, at: Vec2, team: usize, switchers: &Switchers, tick: i64) -> TileContext {
        let d = NEIGHBOUR_OFFSET;
        TileContext {
            center: self.sample_index(index, team, switchers, tick),
            right: self.sample(Vec2::new(at.x + d, at.y), team, switchers, tick),
            left: self.sample(Vec2::new(at.x - d, at.y), team, switchers, tick),
            up: self.sample(Vec2::new(at.x, at.y - d), team, switchers, tick),
            down: self.sample(Vec2::new(at.x, at.y + d), team, switchers, tick),
        }
    }

    /// Game and front tiles under the four body-corner sample points
    /// (a third of the body size off-centre).
    pub fn corner_tiles(&self, p: Vec2) -> [(Tile, Tile); 4] {
        let r = PHYS_SIZE / 3.0;
        [(r, -r), (r, r), (-r, -r), (-r, r)].map(|(dx, dy)| {
            let i = self.index_of(Vec2::new(p.x + dx, p.y + dy));
            (self.game[i], self.front[i])
        })
    }

    /// Any corner sample on `tile` (either layer)?
    pub fn corners_touch(&self, p: Vec2, tile: Tile) -> bool {
        self.corner_tiles(p).iter().any(|&(g, f)| g == tile || f == tile)
    }

    /// Far outside the grid: the character is lost.
    pub fn game_layer_clipped(&self, p: Vec2) -> bool {
        let w = self.width as f32 * TILE_SIZE;
        let h = self.height as f32 * TILE_SIZE;
        p.x < -CLIP_MARGIN || p.x > w + CLIP_MARGIN || p.y < -CLIP_MARGIN || p.y > h + CLIP_MARGIN
    }
}

impl Collision for GameMap {
    fn check_point(&self, p: Vec2) -> bool {
        self.game_at(p).is_solid()
    }

    fn is_hookable(&self, p: Vec2) -> bool {
        self.game_at(p).is_hookable()
    }
}
