/// Tile rules: stoppers and speedups, truth-table driven.
///
/// Pure functions over a sampled `TileContext`. They decide what a tile does
/// to velocity/position without touching the world.
///
/// ## Tile context
///
/// Five sample points, each across game, front and switch layers:
///
/// ```text
///              up (y - 18)
///   left (x - 18)  centre  right (x + 18)
///             down (y + 18)
/// ```
///
/// 18 = half the body radius + 4. The centre is the scanned cell itself;
/// neighbours are sampled around the point where the scan leaves that cell.
/// Switch-layer stoppers are only present when their group is open for the
/// character's team.
///
/// ## Stopper Truth Table
///
/// ┌────────────┬──────────────────────────┬────────────────────────────────┐
/// │ Travel     │ Own cell blocks if        │ Neighbour (ahead) blocks if     │
/// ├────────────┼──────────────────────────┼────────────────────────────────┤
/// │ +x (right) │ one-way R270              │ one-way R270, two-way R90/R270, │
/// │            │                           │ stop-all                        │
/// │ -x (left)  │ one-way R90               │ one-way R90, two-way R90/R270,  │
/// │            │                           │ stop-all                        │
/// │ -y (up)    │ one-way R180              │ one-way R180, two-way R0/R180,  │
/// │            │                           │ stop-all                        │
/// │ +y (down)  │ one-way R0                │ one-way R0, two-way R0/R180,    │
/// │            │                           │ stop-all                        │
/// └────────────┴──────────────────────────┴────────────────────────────────┘
///
/// Any layer (game, front, open switch) matching blocks. A blocked axis has
/// its velocity zeroed; blocking downward travel also refills jumps. If the
/// position already went past the blocking tile, it is rolled back to where
/// the tick started.
///
/// ## Speedup
///
/// ┌─────────────────────────────┬─────────────────────────────────────────┐
/// │ Condition                    │ New velocity                             │
/// ├─────────────────────────────┼─────────────────────────────────────────┤
/// │ force = 255, max > 0         │ dir × ⌊max / 5⌋                          │
/// │ max = 0                      │ vel + dir × force                        │
/// │ |⌊left⌋| > force, left > 0   │ vel + dir × force                        │
/// │ |⌊left⌋| > force, left ≤ 0   │ vel − dir × force                        │
/// │ otherwise                    │ vel + dir × left                         │
/// └─────────────────────────────┴─────────────────────────────────────────┘
///   where left = max/5 − cos(angle(dir) − angle(vel)) × |vel|, max ≥ 5,
///   and angle is `screen_angle` (radians, y down).
/// The result then passes through the stopper clamp (no roll-back).

use std::f32::consts::{FRAC_PI_2, PI};

use super::math::Vec2;
use super::tile::{Heading, Speedup, Stopper, Tile};

/// Offset from the body centre to the neighbour sample points.
pub const NEIGHBOUR_OFFSET: f32 = 28.0 / 2.0 + 4.0;

const EPS: f32 = 0.0000001;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct LayerSample {
    pub cell: (i32, i32),
    pub game: Tile,
    pub front: Tile,
    /// Stopper on the switch layer whose group is open for the sampling team.
    pub switch_stopper: Option<Stopper>,
}

impl LayerSample {
    fn stoppers(&self) -> impl Iterator<Item = Stopper> {
        [self.game.stopper(), self.front.stopper(), self.switch_stopper]
            .into_iter()
            .flatten()
    }

    pub fn any(&self, tile: Tile) -> bool {
        self.game == tile || self.front == tile
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TileContext {
    pub center: LayerSample,
    pub right: LayerSample,
    pub left: LayerSample,
    pub up: LayerSample,
    pub down: LayerSample,
}

impl TileContext {
    fn ahead(&self, heading: Heading) -> &LayerSample {
        match heading {
            Heading::Right => &self.right,
            Heading::Left => &self.left,
            Heading::Up => &self.up,
            Heading::Down => &self.down,
        }
    }

    /// Which sample (if any) blocks travel along `heading`.
    pub fn blocker(&self, heading: Heading) -> Option<Blocker> {
        if self.center.stoppers().any(|s| s.blocks(heading, true)) {
            return Some(Blocker::OwnCell(self.center.cell));
        }
        let ahead = self.ahead(heading);
        if ahead.stoppers().any(|s| s.blocks(heading, false)) {
            return Some(Blocker::Neighbour(ahead.cell));
        }
        None
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Blocker {
    OwnCell((i32, i32)),
    Neighbour((i32, i32)),
}

impl Blocker {
    /// Has a body at cell `pos_cell` moved past this blocker along `heading`?
    /// Own-cell stoppers are passed once the body leaves the cell, neighbour
    /// stoppers once it enters theirs.
    pub fn passed(self, heading: Heading, pos_cell: (i32, i32)) -> bool {
        let ((bx, by), inclusive) = match self {
            Blocker::OwnCell(c) => (c, false),
            Blocker::Neighbour(c) => (c, true),
        };
        let (px, py) = pos_cell;
        match (heading, inclusive) {
            (Heading::Right, false) => px > bx,
            (Heading::Right, true) => px >= bx,
            (Heading::Left, false) => px < bx,
            (Heading::Left, true) => px <= bx,
            (Heading::Down, false) => py > by,
            (Heading::Down, true) => py >= by,
            (Heading::Up, false) => py < by,
            (Heading::Up, true) => py <= by,
        }
    }
}

fn headings(vel: Vec2) -> [(Heading, bool); 4] {
    [
        (Heading::Right, vel.x > 0.0),
        (Heading::Left, vel.x < 0.0),
        (Heading::Up, vel.y < 0.0),
        (Heading::Down, vel.y > 0.0),
    ]
}

/// Outcome of applying the stoppers of one cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct StopOutcome {
    /// Position went past a blocking tile and must return to the tick start.
    pub roll_back: bool,
    /// Downward travel was stopped: jumps refill.
    pub landed: bool,
}

/// Zero every velocity component a stopper blocks.
pub fn apply_stoppers(ctx: &TileContext, pos: Vec2, vel: &mut Vec2) -> StopOutcome {
    let mut out = StopOutcome::default();
    for (heading, moving) in headings(*vel) {
        if !moving {
            continue;
        }
        let Some(blocker) = ctx.blocker(heading) else { continue };
        match heading {
            Heading::Right | Heading::Left => vel.x = 0.0,
            Heading::Up | Heading::Down => vel.y = 0.0,
        }
        if heading == Heading::Down {
            out.landed = true;
        }
        if blocker.passed(heading, pos.cell()) {
            out.roll_back = true;
        }
    }
    out
}

/// Stopper clamp without roll-back, used after a speedup push.
pub fn clamp_velocity(ctx: &TileContext, vel: Vec2) -> Vec2 {
    let mut v = vel;
    for (heading, moving) in headings(vel) {
        if moving && ctx.blocker(heading).is_some() {
            match heading {
                Heading::Right | Heading::Left => v.x = 0.0,
                Heading::Up | Heading::Down => v.y = 0.0,
            }
        }
    }
    v
}

/// Angle of `v` in radians, in [0, 2π), on screen (y down).
///
/// Right is 0, up is π/2, left is π, down is 3π/2. Vectors pointing left
/// use `atan(y/x) + π` without flipping y, so up-left lands at 5π/4 and
/// down-left at 3π/4; speedups compare both their own direction and the
/// velocity this way. Vertical and zero vectors take explicit branches
/// instead of dividing by zero.
pub fn screen_angle(v: Vec2) -> f32 {
    let angle = if v.x > EPS {
        -(v.y / v.x).atan()
    } else if v.x < -EPS {
        (v.y / v.x).atan() + PI
    } else if v.y > EPS {
        -FRAC_PI_2
    } else if v.y < -EPS {
        FRAC_PI_2
    } else {
        0.0
    };
    angle.rem_euclid(2.0 * PI)
}

/// Velocity after one tick on a speedup tile, before the stopper clamp.
pub fn speedup_velocity(vel: Vec2, s: Speedup) -> Vec2 {
    let dir = s.direction();
    let force = s.force as f32;
    if s.force == 255 && s.max_speed > 0 {
        return dir * (s.max_speed / 5) as f32;
    }
    if s.max_speed == 0 {
        return vel + dir * force;
    }
    let max_speed = s.max_speed.max(5) as f32;
    let diff = screen_angle(dir) - screen_angle(vel);
    let speed_left = max_speed / 5.0 - diff.cos() * vel.length();
    let whole = (speed_left as i32).abs() as f32;
    if whole > force && speed_left > EPS {
        vel + dir * force
    } else if whole > force {
        vel - dir * force
    } else {
        vel + dir * speed_left
    }
}
