/// Characters: physical core plus everything the tile rules read or write.
///
/// ## Freeze state machine
///
/// ```text
///   Thawed ──freeze_for(s)──▶ Ticks(n) ──countdown to 1──▶ Thawed
///                                │
///                                └──unfreeze()──▶ Thawed (weapons restored)
/// ```
///
/// `deep` is orthogonal: while set, the post-core pass keeps re-applying the
/// default freeze. Only a deep-unfreeze tile or a super grant clears it.
///
/// ## Race progress
///
/// Idle → Started (start tile) → Finished (finish tile). Checkpoints only
/// advance while Started, and only upward.

use bitflags::bitflags;
use serde::Serialize;

use super::math::Vec2;
use super::physics::{CharacterCore, NetCore};
use super::reckoning::Reckoning;
use super::tile::Tile;

pub const MAX_CLIENTS: usize = 64;
pub const MAX_CHECKPOINTS: usize = 25;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize)]
pub struct CharacterId(pub usize);

/// Per-tick input. `target` is the aim vector relative to the character.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Input {
    pub direction: i8,
    pub target: Vec2,
    pub jump: bool,
    pub hook: bool,
}

impl Input {
    /// Input with movement stripped, as seen by a frozen character.
    pub fn frozen(self) -> Input {
        Input { direction: 0, jump: false, hook: false, ..self }
    }
}

// ══════════════════════════════════════════════════════════════
// Weapons
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Weapon {
    Hammer,
    Gun,
    Shotgun,
    Grenade,
    Laser,
    Ninja,
}

impl Weapon {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Weapon> {
        let w = match name {
            "hammer" => Weapon::Hammer,
            "gun" => Weapon::Gun,
            "shotgun" => Weapon::Shotgun,
            "grenade" => Weapon::Grenade,
            "laser" => Weapon::Laser,
            "ninja" => Weapon::Ninja,
            _ => return None,
        };
        Some(w)
    }

    /// Hit-disable flag for this weapon, if hits with it can be toggled.
    pub fn hit_flag(self) -> Option<HitDisabled> {
        match self {
            Weapon::Hammer => Some(HitDisabled::HAMMER),
            Weapon::Shotgun => Some(HitDisabled::SHOTGUN),
            Weapon::Grenade => Some(HitDisabled::GRENADE),
            Weapon::Laser => Some(HitDisabled::LASER),
            Weapon::Gun | Weapon::Ninja => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct WeaponSlot {
    pub got: bool,
    /// -1 = unlimited.
    pub ammo: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Weapons {
    pub slots: [WeaponSlot; 6],
    pub active: Weapon,
    backup: Option<[i32; 6]>,
}

impl Weapons {
    /// Hammer and gun, both unlimited.
    pub fn new() -> Self {
        let mut slots = [WeaponSlot::default(); 6];
        slots[Weapon::Hammer.index()] = WeaponSlot { got: true, ammo: -1 };
        slots[Weapon::Gun.index()] = WeaponSlot { got: true, ammo: -1 };
        Weapons { slots, active: Weapon::Gun, backup: None }
    }

    pub fn has(&self, w: Weapon) -> bool {
        self.slots[w.index()].got
    }

    pub fn remove(&mut self, w: Weapon) {
        self.slots[w.index()].got = false;
        if self.active == w {
            self.active = Weapon::Gun;
        }
    }

    /// Shotgun, grenade and laser are lost on teleport or run start
    /// when the server is configured to strip them.
    pub fn strip_pickups(&mut self) {
        for w in [Weapon::Shotgun, Weapon::Grenade, Weapon::Laser] {
            self.remove(w);
        }
    }

    /// Stash ammo and empty every slot. Only the first call before a
    /// restore takes effect.
    fn backup(&mut self) {
        if self.backup.is_some() {
            return;
        }
        let mut saved = [0; 6];
        for (i, slot) in self.slots.iter_mut().enumerate() {
            saved[i] = slot.ammo;
            slot.ammo = 0;
        }
        self.backup = Some(saved);
    }

    fn restore(&mut self) {
        if let Some(saved) = self.backup.take() {
            for (slot, ammo) in self.slots.iter_mut().zip(saved) {
                slot.ammo = ammo;
            }
            self.slots[Weapon::Ninja.index()].ammo = -1;
        }
        if !self.has(self.active) {
            self.active = Weapon::Gun;
        }
    }
}

impl Default for Weapons {
    fn default() -> Self {
        Weapons::new()
    }
}

// ══════════════════════════════════════════════════════════════
// Ability flags
// ══════════════════════════════════════════════════════════════

bitflags! {
    /// Weapon classes this character can no longer hit others with.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct HitDisabled: u8 {
        const HAMMER  = 0x1;
        const SHOTGUN = 0x2;
        const GRENADE = 0x4;
        const LASER   = 0x8;
    }
}

bitflags! {
    /// Tuning deviations the client must be told about so its prediction
    /// matches the server.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct FakeTuning: u8 {
        const SOLO         = 0x01;
        const NO_JUMP      = 0x02;
        const NO_COLLISION = 0x04;
        const NO_HOOK      = 0x08;
        const NO_HAMMER    = 0x10;
    }
}

/// Teleporter weapons the character is allowed to use.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TeleItems {
    pub gun: bool,
    pub grenade: bool,
    pub laser: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Abilities {
    pub endless_hook: bool,
    pub super_jump: bool,
    pub hit_disabled: HitDisabled,
    pub tele: TeleItems,
}

// ══════════════════════════════════════════════════════════════
// Freeze
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FreezeTime {
    #[default]
    Thawed,
    /// Ticks left, always ≥ 1.
    Ticks(i32),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct FreezeState {
    pub time: FreezeTime,
    /// Tick of the last application; gates re-application to once a second.
    pub tick: Option<i64>,
    pub deep: bool,
}

// ══════════════════════════════════════════════════════════════
// Race progress
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
pub enum RaceState {
    #[default]
    Idle,
    Started,
    Finished,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RaceProgress {
    pub state: RaceState,
    pub start_tick: i64,
    pub active_checkpoint: Option<u8>,
    pub checkpoint_times: [Option<f32>; MAX_CHECKPOINTS],
    pub tele_checkpoint: u8,
    pub last_start_warning: Option<i64>,
}

impl Default for RaceProgress {
    fn default() -> Self {
        RaceProgress {
            state: RaceState::Idle,
            start_tick: 0,
            active_checkpoint: None,
            checkpoint_times: [None; MAX_CHECKPOINTS],
            tele_checkpoint: 0,
            last_start_warning: None,
        }
    }
}

impl RaceProgress {
    pub fn start(&mut self, tick: i64) {
        self.state = RaceState::Started;
        self.start_tick = tick;
        self.active_checkpoint = None;
        self.checkpoint_times = [None; MAX_CHECKPOINTS];
    }

    pub fn elapsed(&self, tick: i64, tick_speed: i32) -> f32 {
        (tick - self.start_tick) as f32 / tick_speed as f32
    }

    /// Record checkpoint `cp`. Returns the split time when it advances progress.
    pub fn reach_checkpoint(&mut self, cp: u8, tick: i64, tick_speed: i32) -> Option<f32> {
        if self.state != RaceState::Started || cp as usize >= MAX_CHECKPOINTS {
            return None;
        }
        if self.active_checkpoint.is_some_and(|active| cp <= active) {
            return None;
        }
        let time = self.elapsed(tick, tick_speed);
        self.active_checkpoint = Some(cp);
        self.checkpoint_times[cp as usize] = Some(time);
        Some(time)
    }

    /// Finish a started run. Returns the final time.
    pub fn finish(&mut self, tick: i64, tick_speed: i32) -> Option<f32> {
        if self.state != RaceState::Started {
            return None;
        }
        self.state = RaceState::Finished;
        Some(self.elapsed(tick, tick_speed))
    }
}

// ══════════════════════════════════════════════════════════════
// Character
// ══════════════════════════════════════════════════════════════

/// Tiles seen in the previously processed cell, used to fire toggles once
/// per entry rather than every tick spent on them.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct LastTiles {
    pub game: Tile,
    pub front: Tile,
    pub refill_jumps: bool,
    pub penalty: bool,
    pub bonus: bool,
}

impl LastTiles {
    /// Was `tile` absent from both layers of the previous cell?
    pub fn entered(&self, tile: Tile) -> bool {
        self.game != tile && self.front != tile
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct RescueState {
    pub save_pos: Option<Vec2>,
    pub last_rescue: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct Character {
    pub id: CharacterId,
    pub core: CharacterCore,
    pub input: Input,
    /// Position at the start of the current tick's move.
    pub prev_pos: Vec2,
    pub freeze: FreezeState,
    pub race: RaceProgress,
    pub abilities: Abilities,
    pub weapons: Weapons,
    pub last: LastTiles,
    pub tune_zone: u8,
    pub rescue: RescueState,
    pub reckoning: Reckoning,
}

impl Character {
    pub fn new(id: CharacterId, pos: Vec2, tick: i64) -> Self {
        let core = CharacterCore::new(id, pos);
        let reckoning = Reckoning::new(&core, tick);
        Character {
            id,
            core,
            input: Input::default(),
            prev_pos: pos,
            freeze: FreezeState::default(),
            race: RaceProgress::default(),
            abilities: Abilities::default(),
            weapons: Weapons::new(),
            last: LastTiles::default(),
            tune_zone: 0,
            rescue: RescueState::default(),
            reckoning,
        }
    }

    pub fn pos(&self) -> Vec2 {
        self.core.pos
    }

    pub fn is_super(&self) -> bool {
        self.core.is_super
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze.time != FreezeTime::Thawed
    }

    /// Timed freeze. Refused for super characters or when a longer freeze
    /// is already running; re-application within one second of the last
    /// one is ignored.
    pub fn freeze_for(&mut self, seconds: i32, tick: i64, tick_speed: i32) -> bool {
        if seconds <= 0 || self.is_super() {
            return false;
        }
        let ticks = seconds * tick_speed;
        if matches!(self.freeze.time, FreezeTime::Ticks(left) if left > ticks) {
            return false;
        }
        if self.freeze.tick.is_some_and(|t| t >= tick - tick_speed as i64) {
            return false;
        }
        self.weapons.backup();
        self.freeze.time = FreezeTime::Ticks(ticks);
        self.freeze.tick = Some(tick);
        true
    }

    /// Clear a timed freeze and restore weapons. Deep freeze is untouched.
    pub fn unfreeze(&mut self) -> bool {
        if !self.is_frozen() {
            return false;
        }
        self.weapons.restore();
        self.freeze.time = FreezeTime::Thawed;
        self.freeze.tick = None;
        true
    }

    /// Pre-tick countdown. Returns true on the tick the freeze wears off.
    pub fn tick_freeze(&mut self) -> bool {
        if let FreezeTime::Ticks(left) = self.freeze.time {
            let left = left - 1;
            self.freeze.time = FreezeTime::Ticks(left.max(1));
            if left <= 1 {
                return self.unfreeze();
            }
        }
        false
    }

    /// Grant or revoke the privileged state. Granting thaws the character
    /// and clears deep freeze.
    pub fn set_super(&mut self, on: bool) {
        self.core.is_super = on;
        if on {
            self.freeze.deep = false;
            self.unfreeze();
        }
    }

    /// Client-prediction deviations implied by the current state.
    pub fn fake_tuning(&self) -> FakeTuning {
        let mut t = FakeTuning::empty();
        t.set(FakeTuning::SOLO, self.core.solo);
        t.set(FakeTuning::NO_JUMP, self.core.jumps == 0);
        t.set(FakeTuning::NO_COLLISION, !self.core.collision);
        t.set(FakeTuning::NO_HOOK, !self.core.hook_others);
        t.set(FakeTuning::NO_HAMMER, self.abilities.hit_disabled.contains(HitDisabled::HAMMER));
        t
    }

    /// Public state as last exposed by the reconciler.
    pub fn snapshot(&self) -> CharacterSnapshot {
        CharacterSnapshot {
            id: self.id,
            core: NetCore::write(&self.reckoning.send_core),
            frozen: self.is_frozen(),
            deep_freeze: self.freeze.deep,
            is_super: self.is_super(),
            solo: self.core.solo,
            collision: self.core.collision,
            hook_others: self.core.hook_others,
            endless_hook: self.abilities.endless_hook,
            super_jump: self.abilities.super_jump,
            jumps: self.core.jumps,
            hit_disabled: self.abilities.hit_disabled.bits(),
            race: self.race.state,
        }
    }
}

/// Serializable public view of a character for an external snapshot writer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CharacterSnapshot {
    pub id: CharacterId,
    pub core: NetCore,
    pub frozen: bool,
    pub deep_freeze: bool,
    pub is_super: bool,
    pub solo: bool,
    pub collision: bool,
    pub hook_others: bool,
    pub endless_hook: bool,
    pub super_jump: bool,
    pub jumps: i32,
    pub hit_disabled: u8,
    pub race: RaceState,
}
