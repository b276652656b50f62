/// Tile kinds for every map layer, each carrying its own typed parameters.
///
/// Layers:
///   - game / front: `Tile` (solidity, hazards, race markers, toggles, stoppers)
///   - tele:         `TeleTile` (entrances, outputs, checkpoint markers)
///   - switch:       `SwitchCell` (group number + `SwitchTile` effect)
///   - speedup:      `Speedup` (force, max speed, angle)
///   - tune:         zone number (`u8`, 0 = base tuning)
///
/// Properties are queried via methods so tile semantics stay in one place.

use super::entity::Weapon;
use super::math::{direction, Vec2};

/// Rotation flag of a directional tile, clockwise from the tile's default facing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

/// Direction of travel along one axis.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Heading {
    Right,
    Left,
    Up,
    Down,
}

/// Stopper tiles: one-way, two-way (one axis) and all-direction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stopper {
    OneWay(Rotation),
    TwoWay(Rotation),
    All,
}

impl Stopper {
    /// Does this stopper block travel along `heading`?
    ///
    /// `own_cell` is true when the entity is inside the stopper's cell;
    /// there only a one-way stopper with the matching rotation applies.
    /// Seen from the neighbouring cell, matching one-way, two-way on the same
    /// axis, and stop-all tiles all block.
    pub fn blocks(self, heading: Heading, own_cell: bool) -> bool {
        let (one_way, axis) = match heading {
            Heading::Right => (Rotation::R270, [Rotation::R90, Rotation::R270]),
            Heading::Left => (Rotation::R90, [Rotation::R90, Rotation::R270]),
            Heading::Up => (Rotation::R180, [Rotation::R0, Rotation::R180]),
            Heading::Down => (Rotation::R0, [Rotation::R0, Rotation::R180]),
        };
        match self {
            Stopper::OneWay(r) => r == one_way,
            Stopper::TwoWay(r) => !own_cell && axis.contains(&r),
            Stopper::All => !own_cell,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Game / front layer
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Tile {
    #[default]
    Air,
    Solid,
    NoHook,
    Death,
    Freeze,
    Unfreeze,
    DeepFreeze,
    DeepUnfreeze,
    Start,
    Finish,
    Checkpoint(u8),
    Stopper(Stopper),
    EndlessHookOn,
    EndlessHookOff,
    HitOn,
    HitOff,
    CollisionOn,
    CollisionOff,
    HookOthersOn,
    HookOthersOff,
    SuperJumpOn,
    SuperJumpOff,
    WallJump,
    SoloOn,
    SoloOff,
    RefillJumps,
    TeleGunOn,
    TeleGunOff,
    TeleGrenadeOn,
    TeleGrenadeOff,
    TeleLaserOn,
    TeleLaserOff,
    UnlockTeam,
}

/// Named tiles accepted by the map loader's `@game`/`@front` directives.
const TILE_NAMES: &[(&str, Tile)] = &[
    ("air", Tile::Air),
    ("solid", Tile::Solid),
    ("nohook", Tile::NoHook),
    ("death", Tile::Death),
    ("freeze", Tile::Freeze),
    ("unfreeze", Tile::Unfreeze),
    ("deep-freeze", Tile::DeepFreeze),
    ("deep-unfreeze", Tile::DeepUnfreeze),
    ("start", Tile::Start),
    ("finish", Tile::Finish),
    ("endless-hook-on", Tile::EndlessHookOn),
    ("endless-hook-off", Tile::EndlessHookOff),
    ("hit-on", Tile::HitOn),
    ("hit-off", Tile::HitOff),
    ("collision-on", Tile::CollisionOn),
    ("collision-off", Tile::CollisionOff),
    ("hook-others-on", Tile::HookOthersOn),
    ("hook-others-off", Tile::HookOthersOff),
    ("super-jump-on", Tile::SuperJumpOn),
    ("super-jump-off", Tile::SuperJumpOff),
    ("walljump", Tile::WallJump),
    ("solo-on", Tile::SoloOn),
    ("solo-off", Tile::SoloOff),
    ("refill-jumps", Tile::RefillJumps),
    ("tele-gun-on", Tile::TeleGunOn),
    ("tele-gun-off", Tile::TeleGunOff),
    ("tele-grenade-on", Tile::TeleGrenadeOn),
    ("tele-grenade-off", Tile::TeleGrenadeOff),
    ("tele-laser-on", Tile::TeleLaserOn),
    ("tele-laser-off", Tile::TeleLaserOff),
    ("unlock-team", Tile::UnlockTeam),
];

impl Tile {
    /// Blocks movement.
    pub fn is_solid(self) -> bool {
        matches!(self, Tile::Solid | Tile::NoHook)
    }

    /// Solid, and a hook attaches to it.
    pub fn is_hookable(self) -> bool {
        matches!(self, Tile::Solid)
    }

    pub fn stopper(self) -> Option<Stopper> {
        match self {
            Tile::Stopper(s) => Some(s),
            _ => None,
        }
    }

    pub fn checkpoint(self) -> Option<u8> {
        match self {
            Tile::Checkpoint(n) => Some(n),
            _ => None,
        }
    }

    /// Map glyph → tile. `P` (spawn) is not a tile and is handled by the loader.
    pub fn from_glyph(ch: char) -> Option<Tile> {
        let tile = match ch {
            ' ' | '.' => Tile::Air,
            '#' => Tile::Solid,
            '=' => Tile::NoHook,
            'x' => Tile::Death,
            '~' => Tile::Freeze,
            'o' => Tile::Unfreeze,
            'Z' => Tile::DeepFreeze,
            'z' => Tile::DeepUnfreeze,
            'S' => Tile::Start,
            'E' => Tile::Finish,
            '0'..='9' => Tile::Checkpoint(ch as u8 - b'0'),
            '>' => Tile::Stopper(Stopper::OneWay(Rotation::R270)),
            '<' => Tile::Stopper(Stopper::OneWay(Rotation::R90)),
            '^' => Tile::Stopper(Stopper::OneWay(Rotation::R180)),
            'v' => Tile::Stopper(Stopper::OneWay(Rotation::R0)),
            '|' => Tile::Stopper(Stopper::TwoWay(Rotation::R90)),
            '_' => Tile::Stopper(Stopper::TwoWay(Rotation::R0)),
            '+' => Tile::Stopper(Stopper::All),
            _ => return None,
        };
        Some(tile)
    }

    /// Tile name → tile. Checkpoints are `checkpoint-N`, directional
    /// stoppers `stop-right` / `stop-left` / `stop-up` / `stop-down`.
    pub fn from_name(name: &str) -> Option<Tile> {
        if let Some(n) = name.strip_prefix("checkpoint-") {
            return n.parse().ok().map(Tile::Checkpoint);
        }
        if let Some(stopper) = stopper_from_name(name) {
            return Some(Tile::Stopper(stopper));
        }
        TILE_NAMES.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
    }
}

/// `stop-<dir>` names a one-way stopper blocking travel toward `<dir>`;
/// `stop-horizontal` / `stop-vertical` name two-way stoppers.
pub fn stopper_from_name(name: &str) -> Option<Stopper> {
    let s = match name {
        "stop-right" => Stopper::OneWay(Rotation::R270),
        "stop-left" => Stopper::OneWay(Rotation::R90),
        "stop-up" => Stopper::OneWay(Rotation::R180),
        "stop-down" => Stopper::OneWay(Rotation::R0),
        "stop-horizontal" => Stopper::TwoWay(Rotation::R90),
        "stop-vertical" => Stopper::TwoWay(Rotation::R0),
        "stop-all" => Stopper::All,
        _ => return None,
    };
    Some(s)
}

// ══════════════════════════════════════════════════════════════
// Tele layer
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TeleTile {
    /// Standard entrance to group N.
    In(u8),
    /// Entrance that also zeroes velocity and always releases the hook.
    EvilIn(u8),
    /// Output position of group N.
    Out(u8),
    /// Records N as the entity's tele-checkpoint.
    Checkpoint(u8),
    /// Output used when resuming from tele-checkpoint N.
    CheckpointOut(u8),
    /// Resumes at the latest reachable tele-checkpoint output.
    CheckpointIn,
    CheckpointEvilIn,
}

// ══════════════════════════════════════════════════════════════
// Switch layer
// ══════════════════════════════════════════════════════════════

/// A switch-layer cell: the effect plus the switcher group gating or
/// written by it. Group 0 is ungated.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SwitchCell {
    pub group: u8,
    pub kind: SwitchTile,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SwitchTile {
    Open,
    TimedOpen { seconds: u8 },
    TimedClose { seconds: u8 },
    Close,
    Freeze { seconds: u8 },
    DeepFreeze,
    DeepUnfreeze,
    HitOn(Weapon),
    HitOff(Weapon),
    Jump { count: u8 },
    Penalty { minutes: u8, seconds: u8 },
    Bonus { minutes: u8, seconds: u8 },
    Stopper(Stopper),
}

// ══════════════════════════════════════════════════════════════
// Speedup layer
// ══════════════════════════════════════════════════════════════

/// Speed modifier. `angle` is in degrees, clockwise on screen (y down).
/// `force == 255` with a non-zero `max_speed` overrides velocity outright.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Speedup {
    pub force: u8,
    pub max_speed: u8,
    pub angle: i16,
}

impl Speedup {
    pub fn direction(self) -> Vec2 {
        direction((self.angle as f32).to_radians())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopper_truth_table() {
        let right = Stopper::OneWay(Rotation::R270);
        assert!(right.blocks(Heading::Right, true));
        assert!(right.blocks(Heading::Right, false));
        assert!(!right.blocks(Heading::Left, true));

        let horizontal = Stopper::TwoWay(Rotation::R90);
        assert!(horizontal.blocks(Heading::Right, false));
        assert!(horizontal.blocks(Heading::Left, false));
        assert!(!horizontal.blocks(Heading::Up, false));
        assert!(!horizontal.blocks(Heading::Right, true)); // inside: passable

        let vertical = Stopper::TwoWay(Rotation::R180);
        assert!(vertical.blocks(Heading::Down, false));
        assert!(!vertical.blocks(Heading::Left, false));

        assert!(Stopper::All.blocks(Heading::Up, false));
        assert!(!Stopper::All.blocks(Heading::Up, true));
    }

    #[test]
    fn glyphs_and_names_agree() {
        assert_eq!(Tile::from_glyph('>'), Tile::from_name("stop-right"));
        assert_eq!(Tile::from_glyph('+'), Tile::from_name("stop-all"));
        assert_eq!(Tile::from_glyph('~'), Tile::from_name("freeze"));
        assert_eq!(Tile::from_glyph('7'), Some(Tile::Checkpoint(7)));
        assert_eq!(Tile::from_name("checkpoint-12"), Some(Tile::Checkpoint(12)));
        assert_eq!(Tile::from_name("no-such-tile"), None);
        assert_eq!(Tile::from_glyph('?'), None);
    }

    #[test]
    fn solidity() {
        assert!(Tile::Solid.is_solid() && Tile::Solid.is_hookable());
        assert!(Tile::NoHook.is_solid() && !Tile::NoHook.is_hookable());
        assert!(!Tile::Freeze.is_solid());
    }

    #[test]
    fn speedup_direction_is_screen_space() {
        let down = Speedup { force: 10, max_speed: 0, angle: 90 }.direction();
        assert!(down.x.abs() < 1e-6 && (down.y - 1.0).abs() < 1e-6);
    }
}
