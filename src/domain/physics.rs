/// Movement / physics advance for a single character core.
///
/// ## Per-tick phases
///
///   1. `tick`           ground check, gravity, input (direction, jump, hook fire),
///                        hook flight / attach / drag
///   2. `tick_deferred`  player ↔ player pushes, drag on a hooked player,
///                        velocity clamp
///   3. `move_core`      velocity ramp + box sweep against the geometry
///   4. `quantize`       round-trip through `NetCore`
///
/// ## Geometry
///
/// Solidity comes from a `Collision` implementation. Only `check_point` and
/// `is_hookable` are required; box tests, the box sweep and line
/// intersection are derived from them.
///
/// ## Quantization
///
/// `NetCore` is the integer form the network layer carries:
/// positions in whole units, velocities and hook direction in 1/256ths.
/// `quantize(quantize(c)) == quantize(c)` for every core.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::entity::{CharacterId, Input};
use super::math::{closest_point_on_segment, round_to_int, saturated_add, Vec2};

/// Collision box edge length of a character.
pub const PHYS_SIZE: f32 = 28.0;
const MAX_VELOCITY: f32 = 6000.0;

bitflags! {
    /// One-shot events raised during a core tick, for audio/visual consumers.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct CoreEvents: u8 {
        const GROUND_JUMP        = 0x01;
        const AIR_JUMP           = 0x02;
        const HOOK_LAUNCH        = 0x04;
        const HOOK_ATTACH_PLAYER = 0x08;
        const HOOK_ATTACH_GROUND = 0x10;
        const HOOK_HIT_NOHOOK    = 0x20;
        const HOOK_RETRACT       = 0x40;
    }
}

bitflags! {
    /// Jump bookkeeping: HELD while the jump input stays pressed after a jump,
    /// AIR_EXHAUSTED once no air jump is left.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Jumped: u8 {
        const HELD          = 0x1;
        const AIR_EXHAUSTED = 0x2;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum HookState {
    Retracted,
    #[default]
    Idle,
    /// Retract animation, stages 1..=3.
    Retracting(u8),
    Flying,
    Grabbed,
}

impl HookState {
    fn to_net(self) -> i32 {
        match self {
            HookState::Retracted => -1,
            HookState::Idle => 0,
            HookState::Retracting(stage) => stage as i32,
            HookState::Flying => 4,
            HookState::Grabbed => 5,
        }
    }

    fn from_net(v: i32) -> HookState {
        match v {
            -1 => HookState::Retracted,
            1..=3 => HookState::Retracting(v as u8),
            4 => HookState::Flying,
            5 => HookState::Grabbed,
            _ => HookState::Idle,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Tuning
// ══════════════════════════════════════════════════════════════

/// Physics parameters. Every field falls back to the standard value when
/// missing from a `[tuning]` / `[[tune_zone]]` table.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub ground_control_speed: f32,
    pub ground_control_accel: f32,
    pub ground_friction: f32,
    pub ground_jump_impulse: f32,
    pub air_jump_impulse: f32,
    pub air_control_speed: f32,
    pub air_control_accel: f32,
    pub air_friction: f32,
    pub hook_length: f32,
    pub hook_fire_speed: f32,
    pub hook_drag_accel: f32,
    pub hook_drag_speed: f32,
    pub hook_duration: f32,
    pub gravity: f32,
    pub velramp_start: f32,
    pub velramp_range: f32,
    pub velramp_curvature: f32,
    pub player_collision: bool,
    pub player_hooking: bool,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            ground_control_speed: 10.0,
            ground_control_accel: 100.0 / 50.0,
            ground_friction: 0.5,
            ground_jump_impulse: 13.2,
            air_jump_impulse: 12.0,
            air_control_speed: 250.0 / 50.0,
            air_control_accel: 1.5,
            air_friction: 0.95,
            hook_length: 380.0,
            hook_fire_speed: 80.0,
            hook_drag_accel: 3.0,
            hook_drag_speed: 15.0,
            hook_duration: 1.25,
            gravity: 0.5,
            velramp_start: 550.0,
            velramp_range: 2000.0,
            velramp_curvature: 1.4,
            player_collision: true,
            player_hooking: true,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Geometry
// ══════════════════════════════════════════════════════════════

/// Where a line first touched solid geometry.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct LineHit {
    pub point: Vec2,
    pub before: Vec2,
    pub hookable: bool,
}

pub trait Collision {
    /// Is the point inside solid geometry?
    fn check_point(&self, p: Vec2) -> bool;

    /// Is the solid geometry at `p` hookable? Only meaningful where `check_point` holds.
    fn is_hookable(&self, p: Vec2) -> bool;

    fn test_box(&self, pos: Vec2, size: Vec2) -> bool {
        let h = size * 0.5;
        self.check_point(Vec2::new(pos.x - h.x, pos.y - h.y))
            || self.check_point(Vec2::new(pos.x + h.x, pos.y - h.y))
            || self.check_point(Vec2::new(pos.x - h.x, pos.y + h.y))
            || self.check_point(Vec2::new(pos.x + h.x, pos.y + h.y))
    }

    /// Sweep a box along `vel` in unit-length steps, cancelling (or reflecting
    /// by `elasticity`) the velocity component that runs into geometry.
    fn move_box(&self, pos: &mut Vec2, vel: &mut Vec2, size: Vec2, elasticity: f32) {
        let distance = vel.length();
        if distance <= 0.00001 {
            return;
        }
        let max = distance as i32;
        let fraction = 1.0 / (max + 1) as f32;
        let mut p = *pos;
        let mut v = *vel;
        for _ in 0..=max {
            let mut next = p + v * fraction;
            if self.test_box(next, size) {
                let mut hits = 0;
                if self.test_box(Vec2::new(p.x, next.y), size) {
                    next.y = p.y;
                    v.y *= -elasticity;
                    hits += 1;
                }
                if self.test_box(Vec2::new(next.x, p.y), size) {
                    next.x = p.x;
                    v.x *= -elasticity;
                    hits += 1;
                }
                // corner case: only the diagonal is blocked
                if hits == 0 {
                    next = p;
                    v = v * -elasticity;
                }
            }
            p = next;
        }
        *pos = p;
        *vel = v;
    }

    fn intersect_line(&self, from: Vec2, to: Vec2) -> Option<LineHit> {
        let distance = from.distance(to);
        let end = (distance + 1.0) as i32;
        let mut last = from;
        for i in 0..=end {
            let a = i as f32 / end as f32;
            let p = from.mix(to, a);
            let rounded = Vec2::new(round_to_int(p.x) as f32, round_to_int(p.y) as f32);
            if self.check_point(rounded) {
                return Some(LineHit {
                    point: p,
                    before: last,
                    hookable: self.is_hookable(rounded),
                });
            }
            last = p;
        }
        None
    }
}

// ══════════════════════════════════════════════════════════════
// Character core
// ══════════════════════════════════════════════════════════════

/// Physical state of one character. Owned by the character, mutated only
/// during its own tick (hook drag on a hooked player goes through `HookPull`).
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterCore {
    pub id: CharacterId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub hook_pos: Vec2,
    pub hook_dir: Vec2,
    pub hook_tick: i32,
    pub hook_state: HookState,
    /// Weak reference: validated against the world on every use.
    pub hooked_player: Option<CharacterId>,
    pub jumped: Jumped,
    pub jumped_total: i32,
    /// Jumps available (ground jump included).
    pub jumps: i32,
    pub direction: i8,
    pub angle: i32,
    pub triggered_events: CoreEvents,
    /// Collides with other characters.
    pub collision: bool,
    /// Hook attaches to other characters.
    pub hook_others: bool,
    pub solo: bool,
    pub is_super: bool,
    /// Blocked horizontally during the last move.
    pub colliding: bool,
    /// Has left a wall since the last walljump.
    pub left_wall: bool,
    /// Hard-resync request for the reconciler.
    pub reset: bool,
}

impl CharacterCore {
    pub fn new(id: CharacterId, pos: Vec2) -> Self {
        CharacterCore {
            id,
            pos,
            vel: Vec2::ZERO,
            hook_pos: pos,
            hook_dir: Vec2::ZERO,
            hook_tick: 0,
            hook_state: HookState::Idle,
            hooked_player: None,
            jumped: Jumped::empty(),
            jumped_total: 0,
            jumps: 2,
            direction: 0,
            angle: 0,
            triggered_events: CoreEvents::empty(),
            collision: true,
            hook_others: true,
            solo: false,
            is_super: false,
            colliding: false,
            left_wall: true,
            reset: false,
        }
    }

    pub fn release_hook(&mut self) {
        self.hooked_player = None;
        self.hook_state = HookState::Retracted;
        self.hook_pos = self.pos;
    }
}

/// What a core can see of another character during its tick.
#[derive(Clone, Copy, Debug)]
pub struct Peer {
    pub id: CharacterId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub is_super: bool,
    pub solo: bool,
    pub collision: bool,
    /// Team predicate: may these two interact at all?
    pub same_world: bool,
}

impl Peer {
    fn interacts_with(&self, core: &CharacterCore) -> bool {
        (self.is_super || core.is_super) || (self.same_world && !self.solo && !core.solo)
    }
}

/// Velocity to apply to a hooked player after the hooker's deferred tick.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct HookPull {
    pub target: CharacterId,
    pub vel: Vec2,
}

pub fn is_grounded(core: &CharacterCore, collision: &dyn Collision) -> bool {
    let half = PHYS_SIZE / 2.0;
    collision.check_point(Vec2::new(core.pos.x + half, core.pos.y + half + 5.0))
        || collision.check_point(Vec2::new(core.pos.x - half, core.pos.y + half + 5.0))
}

/// Core tick. `input` is `None` for the reckoning shadow, which only
/// integrates gravity and the hook state it already has.
pub fn tick(
    core: &mut CharacterCore,
    input: Option<&Input>,
    tuning: &Tuning,
    collision: &dyn Collision,
    peers: &[Peer],
    tick_speed: i32,
) {
    core.triggered_events = CoreEvents::empty();

    let grounded = is_grounded(core, collision);
    core.vel.y += tuning.gravity;

    let (max_speed, accel, friction) = if grounded {
        (tuning.ground_control_speed, tuning.ground_control_accel, tuning.ground_friction)
    } else {
        (tuning.air_control_speed, tuning.air_control_accel, tuning.air_friction)
    };

    if let Some(input) = input {
        apply_input(core, input, grounded, tuning, tick_speed);
    }

    if core.direction < 0 {
        core.vel.x = saturated_add(-max_speed, max_speed, core.vel.x, -accel);
    } else if core.direction > 0 {
        core.vel.x = saturated_add(-max_speed, max_speed, core.vel.x, accel);
    } else {
        core.vel.x *= friction;
    }

    if grounded {
        core.jumped.remove(Jumped::AIR_EXHAUSTED);
        core.jumped_total = 0;
    }

    advance_hook(core, tuning, collision, peers, input.is_none(), tick_speed);
}

fn apply_input(core: &mut CharacterCore, input: &Input, grounded: bool, tuning: &Tuning, tick_speed: i32) {
    core.direction = input.direction.signum();

    let target = input.target.normalize();
    let raw = input.target.y.atan2(input.target.x);
    core.angle = if raw < -std::f32::consts::FRAC_PI_2 {
        ((raw + 2.0 * std::f32::consts::PI) * 256.0) as i32
    } else {
        (raw * 256.0) as i32
    };

    if input.jump {
        if !core.jumped.contains(Jumped::HELD) {
            if grounded {
                core.triggered_events |= CoreEvents::GROUND_JUMP;
                core.vel.y = -tuning.ground_jump_impulse;
                core.jumped |= Jumped::HELD;
                core.jumped_total = 1;
            } else if !core.jumped.contains(Jumped::AIR_EXHAUSTED) {
                core.triggered_events |= CoreEvents::AIR_JUMP;
                core.vel.y = -tuning.air_jump_impulse;
                core.jumped |= Jumped::HELD | Jumped::AIR_EXHAUSTED;
                core.jumped_total += 1;
            }
        }
    } else {
        core.jumped.remove(Jumped::HELD);
    }

    if input.hook {
        if core.hook_state == HookState::Idle {
            core.hook_state = HookState::Flying;
            core.hook_pos = core.pos + target * PHYS_SIZE * 1.5;
            core.hook_dir = target;
            core.hooked_player = None;
            core.hook_tick = (tick_speed as f32 * (1.25 - tuning.hook_duration)) as i32;
            core.triggered_events |= CoreEvents::HOOK_LAUNCH;
        }
    } else {
        core.hooked_player = None;
        core.hook_state = HookState::Idle;
        core.hook_pos = core.pos;
    }
}

fn advance_hook(
    core: &mut CharacterCore,
    tuning: &Tuning,
    collision: &dyn Collision,
    peers: &[Peer],
    shadow: bool,
    tick_speed: i32,
) {
    match core.hook_state {
        HookState::Idle => {
            core.hooked_player = None;
            core.hook_pos = core.pos;
        }
        HookState::Retracting(stage) if stage < 3 => {
            core.hook_state = HookState::Retracting(stage + 1);
        }
        HookState::Retracting(_) => {
            core.hook_state = HookState::Retracted;
            core.triggered_events |= CoreEvents::HOOK_RETRACT;
        }
        HookState::Flying => fly_hook(core, tuning, collision, peers),
        HookState::Retracted | HookState::Grabbed => {}
    }

    if core.hook_state != HookState::Grabbed {
        return;
    }

    if let Some(hooked) = core.hooked_player {
        match peers.iter().find(|p| p.id == hooked) {
            Some(peer) => core.hook_pos = peer.pos,
            // the shadow sees no peers but keeps holding
            None if shadow => {}
            None => core.release_hook(),
        }
    }

    if core.hooked_player.is_none() && core.hook_pos.distance(core.pos) > 46.0 {
        let mut hook_vel = (core.hook_pos - core.pos).normalize() * tuning.hook_drag_accel;
        // pulling up is stronger than pulling down
        if hook_vel.y > 0.0 {
            hook_vel.y *= 0.3;
        }
        if (hook_vel.x < 0.0 && core.direction < 0) || (hook_vel.x > 0.0 && core.direction > 0) {
            hook_vel.x *= 0.95;
        } else {
            hook_vel.x *= 0.75;
        }
        let new_vel = core.vel + hook_vel;
        if new_vel.length() < tuning.hook_drag_speed || new_vel.length() < core.vel.length() {
            core.vel = new_vel;
        }
    }

    core.hook_tick += 1;
    if core.hooked_player.is_some() && core.hook_tick > tick_speed + tick_speed / 5 {
        core.release_hook();
    }
}

fn fly_hook(core: &mut CharacterCore, tuning: &Tuning, collision: &dyn Collision, peers: &[Peer]) {
    let mut new_pos = core.hook_pos + core.hook_dir * tuning.hook_fire_speed;
    if core.pos.distance(new_pos) > tuning.hook_length {
        core.hook_state = HookState::Retracting(1);
        new_pos = core.pos + (new_pos - core.pos).normalize() * tuning.hook_length;
        core.reset = true;
    }

    let hit = collision.intersect_line(core.hook_pos, new_pos);
    if let Some(h) = hit {
        new_pos = h.point;
    }

    if core.hook_others && tuning.player_hooking {
        let from = core.hook_pos;
        let target = peers
            .iter()
            .filter(|p| p.id != core.id && p.interacts_with(core))
            .filter(|p| p.pos.distance(closest_point_on_segment(from, new_pos, p.pos)) < PHYS_SIZE + 2.0)
            .min_by(|a, b| from.distance(a.pos).total_cmp(&from.distance(b.pos)))
            .map(|p| p.id);
        if let Some(id) = target {
            core.triggered_events |= CoreEvents::HOOK_ATTACH_PLAYER;
            core.hook_state = HookState::Grabbed;
            core.hooked_player = Some(id);
        }
    }

    if core.hook_state == HookState::Flying {
        match hit {
            Some(h) if h.hookable => {
                core.triggered_events |= CoreEvents::HOOK_ATTACH_GROUND;
                core.hook_state = HookState::Grabbed;
            }
            Some(_) => {
                core.triggered_events |= CoreEvents::HOOK_HIT_NOHOOK;
                core.hook_state = HookState::Retracting(1);
            }
            None => {}
        }
        core.hook_pos = new_pos;
    }
}

/// Player pushes and hook drag on a hooked player. Returns the hooked
/// player's new velocity, which the caller applies to that character.
pub fn tick_deferred(core: &mut CharacterCore, tuning: &Tuning, peers: &[Peer]) -> Option<HookPull> {
    let mut pull = None;
    for peer in peers.iter().filter(|p| p.id != core.id) {
        if !peer.same_world && !(core.is_super || peer.is_super) {
            continue;
        }
        if !(core.is_super || peer.is_super) && (core.solo || peer.solo) {
            continue;
        }
        let distance = core.pos.distance(peer.pos);
        if distance <= 0.0 {
            continue;
        }
        let dir = (core.pos - peer.pos).normalize();

        let can_collide = (core.is_super || peer.is_super)
            || (core.collision && peer.collision && tuning.player_collision);
        if can_collide && distance < PHYS_SIZE * 1.25 {
            let a = PHYS_SIZE * 1.45 - distance;
            let mut velocity = 0.5;
            if core.vel.length() > 0.0001 {
                velocity = 1.0 - (core.vel.normalize().dot(dir) + 1.0) / 2.0;
            }
            core.vel += dir * a * (velocity * 0.75);
            core.vel = core.vel * 0.85;
        }

        if core.hook_others
            && core.hooked_player == Some(peer.id)
            && tuning.player_hooking
            && distance > PHYS_SIZE * 1.5
        {
            let accel = tuning.hook_drag_accel * (distance / tuning.hook_length);
            let drag = tuning.hook_drag_speed;
            pull = Some(HookPull {
                target: peer.id,
                vel: Vec2::new(
                    saturated_add(-drag, drag, peer.vel.x, accel * dir.x * 1.5),
                    saturated_add(-drag, drag, peer.vel.y, accel * dir.y * 1.5),
                ),
            });
            core.vel = Vec2::new(
                saturated_add(-drag, drag, core.vel.x, -accel * dir.x * 0.25),
                saturated_add(-drag, drag, core.vel.y, -accel * dir.y * 0.25),
            );
        }
    }

    if core.vel.length() > MAX_VELOCITY {
        core.vel = core.vel.normalize() * MAX_VELOCITY;
    }
    pull
}

fn velocity_ramp(value: f32, start: f32, range: f32, curvature: f32) -> f32 {
    if value < start {
        return 1.0;
    }
    1.0 / curvature.powf((value - start) / range)
}

/// Integrate velocity into position against the geometry, then stop short
/// of any character this one collides with along the way.
pub fn move_core(core: &mut CharacterCore, tuning: &Tuning, collision: &dyn Collision, peers: &[Peer]) {
    let ramp = velocity_ramp(
        core.vel.length() * 50.0,
        tuning.velramp_start,
        tuning.velramp_range,
        tuning.velramp_curvature,
    );

    core.vel.x *= ramp;
    let mut new_pos = core.pos;
    let old_vel = core.vel;
    collision.move_box(&mut new_pos, &mut core.vel, Vec2::new(PHYS_SIZE, PHYS_SIZE), 0.0);

    core.colliding = false;
    if core.vel.x.abs() < 0.001 {
        core.colliding = old_vel.x != 0.0;
    } else {
        core.left_wall = true;
    }
    core.vel.x /= ramp;

    let collides = core.is_super || (tuning.player_collision && core.collision && !core.solo);
    if collides {
        let distance = core.pos.distance(new_pos);
        if distance > 0.0 {
            let end = (distance + 1.0) as i32;
            let mut last = core.pos;
            for i in 0..end {
                let a = i as f32 / distance;
                let p = core.pos.mix(new_pos, a);
                for peer in peers.iter().filter(|p| p.id != core.id) {
                    let skip = !(peer.is_super || core.is_super)
                        && (peer.solo || !peer.collision || !peer.same_world);
                    if skip {
                        continue;
                    }
                    let d = p.distance(peer.pos);
                    if d < PHYS_SIZE {
                        if a > 0.0 {
                            core.pos = last;
                        } else if new_pos.distance(peer.pos) > d {
                            core.pos = new_pos;
                        }
                        return;
                    }
                }
                last = p;
            }
        }
    }

    core.pos = new_pos;
}

// ══════════════════════════════════════════════════════════════
// Network quantization
// ══════════════════════════════════════════════════════════════

/// Integer, network-representable form of the public core state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
pub struct NetCore {
    pub x: i32,
    pub y: i32,
    pub vel_x: i32,
    pub vel_y: i32,
    pub hook_state: i32,
    pub hook_tick: i32,
    pub hook_x: i32,
    pub hook_y: i32,
    pub hook_dx: i32,
    pub hook_dy: i32,
    pub hooked_player: i32,
    pub jumped: i32,
    pub direction: i32,
    pub angle: i32,
}

impl NetCore {
    pub fn write(core: &CharacterCore) -> NetCore {
        NetCore {
            x: round_to_int(core.pos.x),
            y: round_to_int(core.pos.y),
            vel_x: round_to_int(core.vel.x * 256.0),
            vel_y: round_to_int(core.vel.y * 256.0),
            hook_state: core.hook_state.to_net(),
            hook_tick: core.hook_tick,
            hook_x: round_to_int(core.hook_pos.x),
            hook_y: round_to_int(core.hook_pos.y),
            hook_dx: round_to_int(core.hook_dir.x * 256.0),
            hook_dy: round_to_int(core.hook_dir.y * 256.0),
            hooked_player: core.hooked_player.map_or(-1, |id| id.0 as i32),
            jumped: core.jumped.bits() as i32,
            direction: core.direction as i32,
            angle: core.angle,
        }
    }

    pub fn read(&self, core: &mut CharacterCore) {
        core.pos = Vec2::new(self.x as f32, self.y as f32);
        core.vel = Vec2::new(self.vel_x as f32 / 256.0, self.vel_y as f32 / 256.0);
        core.hook_state = HookState::from_net(self.hook_state);
        core.hook_tick = self.hook_tick;
        core.hook_pos = Vec2::new(self.hook_x as f32, self.hook_y as f32);
        core.hook_dir = Vec2::new(self.hook_dx as f32 / 256.0, self.hook_dy as f32 / 256.0);
        core.hooked_player = usize::try_from(self.hooked_player).ok().map(CharacterId);
        core.jumped = Jumped::from_bits_truncate(self.jumped as u8);
        core.direction = self.direction as i8;
        core.angle = self.angle;
    }
}

pub fn quantize(core: &mut CharacterCore) {
    NetCore::write(core).read(core);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Floor at y >= `floor_y`, walls at x < 0 and x >= `wall_x`.
    struct Box2 {
        floor_y: f32,
        wall_x: f32,
    }

    impl Collision for Box2 {
        fn check_point(&self, p: Vec2) -> bool {
            p.y >= self.floor_y || p.x < 0.0 || p.x >= self.wall_x
        }
        fn is_hookable(&self, p: Vec2) -> bool {
            p.y >= self.floor_y
        }
    }

    fn room() -> Box2 {
        Box2 { floor_y: 320.0, wall_x: 640.0 }
    }

    fn core_at(x: f32, y: f32) -> CharacterCore {
        CharacterCore::new(CharacterId(0), Vec2::new(x, y))
    }

    #[test]
    fn quantize_is_idempotent() {
        let mut c = core_at(100.37, 55.51);
        c.vel = Vec2::new(3.14159, -7.77777);
        c.hook_dir = Vec2::new(0.6, 0.8);
        c.hook_pos = Vec2::new(12.5, -3.5);
        quantize(&mut c);
        let once = NetCore::write(&c);
        quantize(&mut c);
        assert_eq!(NetCore::write(&c), once);
        assert_eq!(c.pos, Vec2::new(100.0, 56.0));
    }

    #[test]
    fn gravity_and_floor() {
        let col = room();
        let mut c = core_at(100.0, 100.0);
        for _ in 0..200 {
            tick(&mut c, None, &Tuning::default(), &col, &[], 50);
            move_core(&mut c, &Tuning::default(), &col, &[]);
        }
        // resting on the floor: box bottom just above y = 320
        assert!(c.pos.y <= 320.0 - PHYS_SIZE / 2.0);
        assert!(c.pos.y > 300.0);
        assert!(is_grounded(&c, &col));
    }

    #[test]
    fn ground_jump_then_one_air_jump() {
        let col = room();
        let mut c = core_at(100.0, 320.0 - PHYS_SIZE / 2.0 - 1.0);
        let t = Tuning::default();
        let jump = Input { jump: true, ..Input::default() };
        tick(&mut c, Some(&jump), &t, &col, &[], 50);
        assert!(c.triggered_events.contains(CoreEvents::GROUND_JUMP));
        assert_eq!(c.vel.y, -t.ground_jump_impulse);
        move_core(&mut c, &t, &col, &[]);

        // holding jump does nothing, releasing and pressing again air-jumps once
        tick(&mut c, Some(&jump), &t, &col, &[], 50);
        assert!(c.triggered_events.is_empty());
        tick(&mut c, Some(&Input::default()), &t, &col, &[], 50);
        tick(&mut c, Some(&jump), &t, &col, &[], 50);
        assert!(c.triggered_events.contains(CoreEvents::AIR_JUMP));
        assert!(c.jumped.contains(Jumped::AIR_EXHAUSTED));
        tick(&mut c, Some(&Input::default()), &t, &col, &[], 50);
        tick(&mut c, Some(&jump), &t, &col, &[], 50);
        assert!(c.triggered_events.is_empty());
    }

    #[test]
    fn wall_stops_horizontal_motion() {
        let col = room();
        let mut c = core_at(600.0, 100.0);
        c.vel = Vec2::new(40.0, 0.0);
        move_core(&mut c, &Tuning::default(), &col, &[]);
        assert!(c.pos.x + PHYS_SIZE / 2.0 < 640.0);
        assert_eq!(c.vel.x, 0.0);
        assert!(c.colliding);
    }

    #[test]
    fn hook_attaches_to_ground() {
        let col = room();
        let mut c = core_at(100.0, 200.0);
        let aim_down = Input { hook: true, target: Vec2::new(0.0, 1.0), ..Input::default() };
        let t = Tuning::default();
        // fired from 42 units below the centre, the floor is within one flight step
        tick(&mut c, Some(&aim_down), &t, &col, &[], 50);
        assert!(c.triggered_events.contains(CoreEvents::HOOK_LAUNCH | CoreEvents::HOOK_ATTACH_GROUND));
        assert_eq!(c.hook_state, HookState::Grabbed);

        let vy = c.vel.y;
        tick(&mut c, Some(&aim_down), &t, &col, &[], 50);
        assert_eq!(c.hook_state, HookState::Grabbed);
        assert!(c.vel.y > vy + t.gravity); // dragged toward the floor
    }

    #[test]
    fn hook_attaches_to_peer_and_pulls() {
        let col = room();
        let t = Tuning::default();
        let mut c = core_at(100.0, 100.0);
        let peer = Peer {
            id: CharacterId(1),
            pos: Vec2::new(250.0, 100.0),
            vel: Vec2::ZERO,
            is_super: false,
            solo: false,
            collision: true,
            same_world: true,
        };
        let aim = Input { hook: true, target: Vec2::new(1.0, 0.0), ..Input::default() };
        tick(&mut c, Some(&aim), &t, &col, &[peer], 50);
        tick(&mut c, Some(&aim), &t, &col, &[peer], 50);
        assert_eq!(c.hooked_player, Some(CharacterId(1)));
        let pull = tick_deferred(&mut c, &t, &[peer]);
        let pull = pull.map(|p| (p.target, p.vel.x < 0.0));
        assert_eq!(pull, Some((CharacterId(1), true)));
    }

    #[test]
    fn solo_peer_is_not_hookable() {
        let col = room();
        let t = Tuning::default();
        let mut c = core_at(100.0, 100.0);
        let peer = Peer {
            id: CharacterId(1),
            pos: Vec2::new(200.0, 100.0),
            vel: Vec2::ZERO,
            is_super: false,
            solo: true,
            collision: true,
            same_world: true,
        };
        let aim = Input { hook: true, target: Vec2::new(1.0, 0.0), ..Input::default() };
        tick(&mut c, Some(&aim), &t, &col, &[peer], 50);
        tick(&mut c, Some(&aim), &t, &col, &[peer], 50);
        assert_eq!(c.hooked_player, None);
    }

    #[test]
    fn hook_grabs_the_closest_peer_on_its_path() {
        let col = room();
        let t = Tuning::default();
        let mut c = core_at(100.0, 100.0);
        let peer = |id: usize, x: f32| Peer {
            id: CharacterId(id),
            pos: Vec2::new(x, 100.0),
            vel: Vec2::ZERO,
            is_super: false,
            solo: false,
            collision: true,
            same_world: true,
        };
        let peers = [peer(1, 210.0), peer(2, 180.0)];
        let aim = Input { hook: true, target: Vec2::new(1.0, 0.0), ..Input::default() };
        tick(&mut c, Some(&aim), &t, &col, &peers, 50);
        assert_eq!(c.hook_state, HookState::Grabbed);
        assert_eq!(c.hooked_player, Some(CharacterId(2)));
        assert!(c.triggered_events.contains(CoreEvents::HOOK_ATTACH_PLAYER));
    }

    #[test]
    fn quantize_is_idempotent_across_random_cores() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let states = [
            HookState::Retracted,
            HookState::Idle,
            HookState::Retracting(1),
            HookState::Retracting(3),
            HookState::Flying,
            HookState::Grabbed,
        ];
        for _ in 0..500 {
            let mut c = core_at(rng.gen_range(-4000.0..4000.0), rng.gen_range(-4000.0..4000.0));
            c.vel = Vec2::new(rng.gen_range(-80.0..80.0), rng.gen_range(-80.0..80.0));
            c.hook_pos = Vec2::new(rng.gen_range(-4000.0..4000.0), rng.gen_range(-4000.0..4000.0));
            c.hook_dir = Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)).normalize();
            c.hook_state = states[rng.gen_range(0..states.len())];
            c.hook_tick = rng.gen_range(-10..200);
            c.hooked_player = rng.gen_bool(0.5).then(|| CharacterId(rng.gen_range(0..64)));
            c.jumped = Jumped::from_bits_truncate(rng.gen_range(0..4));
            c.direction = rng.gen_range(-1..=1);
            c.angle = rng.gen_range(-804..1608);

            quantize(&mut c);
            let once = NetCore::write(&c);
            let kept = c.clone();
            quantize(&mut c);
            assert_eq!(NetCore::write(&c), once);
            assert_eq!(c, kept);

            let mut copy = core_at(0.0, 0.0);
            once.read(&mut copy);
            assert_eq!(NetCore::write(&copy), once);
        }
    }
}
