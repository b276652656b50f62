/// Tile Effect Processor: applies the tiles of one scanned cell to a character.
///
/// ## Order within a cell
///
///   1. Checkpoints (game, front) and tele-checkpoint
///   2. Start (may kill under the mandatory-team policy) and finish
///   3. Freeze / unfreeze, deep freeze / deep unfreeze
///   4. Ability toggles, walljump, unlock-team, solo, refill jumps
///   5. Stoppers (may roll the position back)
///   6. Switch layer: registry writes, gated freezes, hit toggles,
///      jump override, time penalty / bonus
///   7. Teleporters
///
/// Toggles fire when the tile is entered (absent from the previously
/// processed cell) and only notify when the state actually changes.
///
/// `handle_skippable` runs once per tick at the current position, before
/// the scan: death corners, map clipping and speedups.

use rand::rngs::StdRng;

use crate::config::{RaceConfig, TeamMode};
use crate::domain::entity::{Character, HitDisabled, RaceState, Weapon};
use crate::domain::math::Vec2;
use crate::domain::physics::{CoreEvents, Jumped};
use crate::domain::rules::{self, LayerSample};
use crate::domain::tile::{SwitchCell, SwitchTile, TeleTile, Tile};

use super::event::{DeathCause, GameEvent};
use super::map::GameMap;
use super::switch::{SwitchKind, Switchers, TEAM_FLOCK, TEAM_SUPER};
use super::teams::Teams;
use super::teleport::Teleporters;

/// Everything outside the character a tile may read or write.
pub struct TileEnv<'a> {
    pub map: &'a GameMap,
    pub teleporters: &'a Teleporters,
    pub switchers: &'a mut Switchers,
    pub teams: &'a mut Teams,
    pub rng: &'a mut StdRng,
    pub config: &'a RaceConfig,
    pub tick: i64,
    pub events: &'a mut Vec<GameEvent>,
}

impl TileEnv<'_> {
    fn tick_speed(&self) -> i32 {
        self.config.tick_speed
    }

    fn chat(&mut self, ch: &Character, message: impl Into<String>) {
        self.events.push(GameEvent::chat(ch.id, message));
    }

    fn tuning_changed(&mut self, ch: &Character) {
        self.events.push(GameEvent::TuningChanged { id: ch.id, zone: ch.tune_zone, fake: ch.fake_tuning() });
    }
}

/// What a cell did to the character's place in the world.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Fate {
    #[default]
    Continue,
    /// Went past a stopper; back at the tick start position.
    RolledBack,
    /// Teleported. Hooks held on the character let go when `release_hooked`.
    Relocated { release_hooked: bool },
    Died(DeathCause),
}

impl Fate {
    /// Later cells of this tick's scan must not be processed.
    pub fn ends_scan(self) -> bool {
        self != Fate::Continue
    }
}

/// Run-state changes to copy onto every teammate of a shared team.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TeamEffect {
    pub run_started: bool,
    pub start_tick: Option<i64>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TileReport {
    pub fate: Fate,
    pub team: TeamEffect,
}

// ══════════════════════════════════════════════════════════════
// Skippable tiles
// ══════════════════════════════════════════════════════════════

pub fn handle_skippable(ch: &mut Character, env: &mut TileEnv) -> Fate {
    let pos = ch.pos();
    let team = env.teams.team_of(ch.id);

    if env.map.corners_touch(pos, Tile::Death) && !ch.is_super() && !finished_in_team(ch, team, env.teams) {
        return Fate::Died(DeathCause::WorldHazard);
    }
    if env.map.game_layer_clipped(pos) {
        return Fate::Died(DeathCause::OutOfBounds);
    }

    let index = env.map.index_of(pos);
    if let Some(speedup) = env.map.speedup[index] {
        let vel = rules::speedup_velocity(ch.core.vel, speedup);
        ch.core.vel = if speedup.force == 255 && speedup.max_speed > 0 {
            vel
        } else {
            let ctx = env.map.context(index, pos, team, env.switchers, env.tick);
            rules::clamp_velocity(&ctx, vel)
        };
    }
    Fate::Continue
}

fn finished_in_team(ch: &Character, team: usize, teams: &Teams) -> bool {
    Teams::is_shared(team) && (ch.race.state == RaceState::Finished || teams.is_finished(team))
}

// ══════════════════════════════════════════════════════════════
// Per-cell processing
// ══════════════════════════════════════════════════════════════

/// Apply cell `index` to `ch`. `at` is where the scan left the cell; the
/// stopper neighbours are sampled around it.
pub fn handle_tiles(ch: &mut Character, index: usize, at: Vec2, env: &mut TileEnv) -> TileReport {
    let team = env.teams.team_of(ch.id);
    let cell = env.map.sample_index(index, team, env.switchers, env.tick);
    let mut report = TileReport::default();
    report.fate = apply_cell(ch, index, at, team, &cell, env, &mut report.team);
    ch.last.game = cell.game;
    ch.last.front = cell.front;
    report
}

fn apply_cell(
    ch: &mut Character,
    index: usize,
    at: Vec2,
    team: usize,
    cell: &LayerSample,
    env: &mut TileEnv,
    effect: &mut TeamEffect,
) -> Fate {
    resolve_checkpoints(ch, index, cell, env);
    if let Some(fate) = resolve_start(ch, team, cell, env, effect) {
        return fate;
    }
    resolve_finish(ch, cell, env);
    resolve_freeze(ch, cell, env);
    resolve_toggles(ch, team, cell, env);

    let mut fate = Fate::Continue;
    if resolve_stoppers(ch, index, at, team, env) {
        fate = Fate::RolledBack;
    }
    resolve_switch(ch, index, team, env, effect);
    if let Some(relocated) = resolve_teleport(ch, index, env) {
        fate = relocated;
    }
    fate
}

/// Tile present in the cell or under one of the body corners.
fn touches(ch: &Character, cell: &LayerSample, map: &GameMap, tile: Tile) -> bool {
    cell.any(tile) || map.corners_touch(ch.pos(), tile)
}

/// Tile present in the cell but not in the previously processed one.
fn entered(ch: &Character, cell: &LayerSample, tile: Tile) -> bool {
    cell.any(tile) && ch.last.entered(tile)
}

// ── Race ──

fn resolve_checkpoints(ch: &mut Character, index: usize, cell: &LayerSample, env: &mut TileEnv) {
    let ts = env.tick_speed();
    for cp in [cell.game.checkpoint(), cell.front.checkpoint()].into_iter().flatten() {
        if let Some(time) = ch.race.reach_checkpoint(cp, env.tick, ts) {
            env.events.push(GameEvent::CheckpointReached { id: ch.id, checkpoint: cp, time });
        }
    }
    if let Some(TeleTile::Checkpoint(n)) = env.map.tele[index] {
        ch.race.tele_checkpoint = n;
    }
}

fn resolve_start(
    ch: &mut Character,
    team: usize,
    cell: &LayerSample,
    env: &mut TileEnv,
    effect: &mut TeamEffect,
) -> Option<Fate> {
    if !touches(ch, cell, env.map, Tile::Start) {
        return None;
    }
    let was = ch.race.state;
    let may_start = match was {
        RaceState::Idle | RaceState::Finished => true,
        RaceState::Started => team == TEAM_FLOCK && env.config.team_mode != TeamMode::Solo,
    };
    if !may_start {
        return None;
    }
    if env.config.reset_pickups {
        ch.weapons.strip_pickups();
    }

    if env.config.team_mode == TeamMode::Mandatory && (team == TEAM_FLOCK || env.teams.count(team) <= 1) {
        let quiet_until = 3 * env.tick_speed() as i64;
        if ch.race.last_start_warning.map_or(true, |t| t < env.tick - quiet_until) {
            env.chat(ch, "You have to be in a team with other tees to start");
            ch.race.last_start_warning = Some(env.tick);
        }
        return Some(Fate::Died(DeathCause::TeamPolicy));
    }

    ch.race.start(env.tick);
    if was != RaceState::Started || ch.last.entered(Tile::Start) {
        env.events.push(GameEvent::RaceStarted { id: ch.id });
    }
    if was != RaceState::Started && Teams::is_shared(team) {
        effect.run_started = true;
        env.teams.set_finished(team, false);
    }
    None
}

fn resolve_finish(ch: &mut Character, cell: &LayerSample, env: &mut TileEnv) {
    if ch.race.state != RaceState::Started || !touches(ch, cell, env.map, Tile::Finish) {
        return;
    }
    if let Some(time) = ch.race.finish(env.tick, env.tick_speed()) {
        log::info!("character {} finished in {time:.2}s", ch.id.0);
        env.events.push(GameEvent::RaceFinished { id: ch.id, time });
    }
}

// ── Freeze ──

fn resolve_freeze(ch: &mut Character, cell: &LayerSample, env: &mut TileEnv) {
    let deep = ch.freeze.deep;
    if cell.any(Tile::Freeze) && !ch.is_super() && !deep {
        ch.freeze_for(env.config.freeze_delay, env.tick, env.tick_speed());
    } else if cell.any(Tile::Unfreeze) && !deep {
        ch.unfreeze();
    }

    if cell.any(Tile::DeepFreeze) && !ch.is_super() && !deep {
        ch.freeze.deep = true;
    } else if cell.any(Tile::DeepUnfreeze) && !ch.is_super() && deep {
        ch.freeze.deep = false;
    }
}

// ── Toggles ──

fn resolve_toggles(ch: &mut Character, team: usize, cell: &LayerSample, env: &mut TileEnv) {
    if entered(ch, cell, Tile::EndlessHookOn) && !ch.abilities.endless_hook {
        ch.abilities.endless_hook = true;
        env.chat(ch, "Endless hook has been activated");
    } else if entered(ch, cell, Tile::EndlessHookOff) && ch.abilities.endless_hook {
        ch.abilities.endless_hook = false;
        env.chat(ch, "Endless hook has been deactivated");
    }

    if entered(ch, cell, Tile::HitOff) && ch.abilities.hit_disabled != HitDisabled::all() {
        ch.abilities.hit_disabled = HitDisabled::all();
        env.chat(ch, "You can't hit others");
        env.tuning_changed(ch);
    } else if entered(ch, cell, Tile::HitOn) && !ch.abilities.hit_disabled.is_empty() {
        ch.abilities.hit_disabled = HitDisabled::empty();
        env.chat(ch, "You can hit others");
        env.tuning_changed(ch);
    }

    if entered(ch, cell, Tile::CollisionOff) && ch.core.collision {
        ch.core.collision = false;
        env.chat(ch, "You can't collide with others");
        env.tuning_changed(ch);
    } else if entered(ch, cell, Tile::CollisionOn) && !ch.core.collision {
        ch.core.collision = true;
        env.chat(ch, "You can collide with others");
        env.tuning_changed(ch);
    }

    if entered(ch, cell, Tile::HookOthersOff) && ch.core.hook_others {
        ch.core.hook_others = false;
        env.chat(ch, "You can't hook others");
        env.tuning_changed(ch);
    } else if entered(ch, cell, Tile::HookOthersOn) && !ch.core.hook_others {
        ch.core.hook_others = true;
        env.chat(ch, "You can hook others");
        env.tuning_changed(ch);
    }

    if entered(ch, cell, Tile::SuperJumpOn) && !ch.abilities.super_jump {
        ch.abilities.super_jump = true;
        env.chat(ch, "You have unlimited air jumps");
        if ch.core.jumps == 0 {
            env.tuning_changed(ch);
        }
    } else if entered(ch, cell, Tile::SuperJumpOff) && ch.abilities.super_jump {
        ch.abilities.super_jump = false;
        env.chat(ch, "You don't have unlimited air jumps");
        if ch.core.jumps == 0 {
            env.tuning_changed(ch);
        }
    }

    // walljump: sliding down a wall restores one jump
    if cell.any(Tile::WallJump) && ch.core.vel.y > 0.0 && ch.core.colliding && ch.core.left_wall {
        ch.core.left_wall = false;
        ch.core.jumped_total = ch.core.jumps - 1;
        ch.core.jumped = Jumped::HELD;
    }

    if cell.any(Tile::UnlockTeam) && env.teams.is_locked(team) {
        env.teams.set_lock(team, false);
        let members: Vec<_> = env.teams.members(team).collect();
        for id in members {
            env.events.push(GameEvent::chat(id, "Your team was unlocked by an unlock team tile"));
        }
    }

    if entered(ch, cell, Tile::SoloOn) && !ch.core.solo {
        ch.core.solo = true;
        env.chat(ch, "You are now in a solo part");
        env.tuning_changed(ch);
    } else if entered(ch, cell, Tile::SoloOff) && ch.core.solo {
        ch.core.solo = false;
        env.chat(ch, "You are now out of the solo part");
        env.tuning_changed(ch);
    }

    if cell.any(Tile::RefillJumps) {
        if !ch.last.refill_jumps {
            ch.core.jumped_total = 0;
            ch.core.jumped = Jumped::empty();
            ch.last.refill_jumps = true;
        }
    } else {
        ch.last.refill_jumps = false;
    }

    resolve_tele_items(ch, cell, env);
}

fn resolve_tele_items(ch: &mut Character, cell: &LayerSample, env: &mut TileEnv) {
    let (id, last) = (ch.id, ch.last);
    let tele = &mut ch.abilities.tele;
    let items = [
        (&mut tele.gun, Tile::TeleGunOn, Tile::TeleGunOff, "gun"),
        (&mut tele.grenade, Tile::TeleGrenadeOn, Tile::TeleGrenadeOff, "grenade"),
        (&mut tele.laser, Tile::TeleLaserOn, Tile::TeleLaserOff, "laser"),
    ];
    for (slot, on, off, name) in items {
        if cell.any(on) && last.entered(on) && !*slot {
            *slot = true;
            env.events.push(GameEvent::chat(id, format!("Teleport {name} enabled")));
        } else if cell.any(off) && last.entered(off) && *slot {
            *slot = false;
            env.events.push(GameEvent::chat(id, format!("Teleport {name} disabled")));
        }
    }
}

// ── Stoppers ──

/// Returns true when the position was rolled back.
fn resolve_stoppers(ch: &mut Character, index: usize, at: Vec2, team: usize, env: &mut TileEnv) -> bool {
    let ctx = env.map.context(index, at, team, env.switchers, env.tick);
    let out = rules::apply_stoppers(&ctx, ch.pos(), &mut ch.core.vel);
    if out.landed {
        ch.core.jumped = Jumped::empty();
        ch.core.jumped_total = 0;
    }
    if out.roll_back {
        ch.core.pos = ch.prev_pos;
    }
    out.roll_back
}

// ── Switch layer ──

fn resolve_switch(ch: &mut Character, index: usize, team: usize, env: &mut TileEnv, effect: &mut TeamEffect) {
    let Some(SwitchCell { group, kind }) = env.map.switch[index] else {
        ch.last.penalty = false;
        ch.last.bonus = false;
        return;
    };
    let ts = env.tick_speed();
    let tick = env.tick;
    let writable = team != TEAM_SUPER && group > 0;
    let open = team != TEAM_SUPER && env.switchers.status(group, team, tick);
    let ends = |seconds: u8| Some(tick + seconds as i64 * ts as i64);

    match kind {
        SwitchTile::Open if writable => {
            env.switchers.set(group, team, SwitchKind::Open, None);
        }
        SwitchTile::TimedOpen { seconds } if writable => {
            env.switchers.set(group, team, SwitchKind::TimedOpen, ends(seconds));
        }
        SwitchTile::TimedClose { seconds } if writable => {
            env.switchers.set(group, team, SwitchKind::TimedClose, ends(seconds));
        }
        SwitchTile::Close if writable => {
            env.switchers.set(group, team, SwitchKind::Close, None);
        }
        SwitchTile::Freeze { seconds } if open && !ch.freeze.deep => {
            ch.freeze_for(seconds as i32, tick, ts);
        }
        SwitchTile::DeepFreeze if open && !ch.is_super() => ch.freeze.deep = true,
        SwitchTile::DeepUnfreeze if open => ch.freeze.deep = false,
        SwitchTile::HitOn(weapon) if open => set_hit(ch, weapon, true, env),
        SwitchTile::HitOff(weapon) if open => set_hit(ch, weapon, false, env),
        SwitchTile::Jump { count } => set_jumps(ch, count as i32, env),
        SwitchTile::Penalty { minutes, seconds } if !ch.last.penalty => {
            ch.race.start_tick -= time_delta(minutes, seconds, ts);
            if Teams::is_shared(team) {
                effect.start_tick = Some(ch.race.start_tick);
            }
        }
        SwitchTile::Bonus { minutes, seconds } if !ch.last.bonus => {
            ch.race.start_tick = (ch.race.start_tick + time_delta(minutes, seconds, ts)).min(tick);
            if Teams::is_shared(team) {
                effect.start_tick = Some(ch.race.start_tick);
            }
        }
        _ => {}
    }

    ch.last.penalty = matches!(kind, SwitchTile::Penalty { .. });
    ch.last.bonus = matches!(kind, SwitchTile::Bonus { .. });
}

fn time_delta(minutes: u8, seconds: u8, tick_speed: i32) -> i64 {
    (minutes as i64 * 60 + seconds as i64) * tick_speed as i64
}

fn set_hit(ch: &mut Character, weapon: Weapon, can_hit: bool, env: &mut TileEnv) {
    let Some(flag) = weapon.hit_flag() else { return };
    let disabled = ch.abilities.hit_disabled.contains(flag);
    if can_hit != disabled {
        return;
    }
    ch.abilities.hit_disabled.set(flag, !can_hit);
    let message = match (weapon, can_hit) {
        (Weapon::Hammer, true) => "You can hammer hit others".to_string(),
        (Weapon::Hammer, false) => "You can't hammer hit others".to_string(),
        (_, true) => format!("You can shoot others with {}", weapon_name(weapon)),
        (_, false) => format!("You can't shoot others with {}", weapon_name(weapon)),
    };
    env.chat(ch, message);
    if weapon == Weapon::Hammer {
        env.tuning_changed(ch);
    }
}

fn weapon_name(weapon: Weapon) -> &'static str {
    match weapon {
        Weapon::Hammer => "hammer",
        Weapon::Gun => "gun",
        Weapon::Shotgun => "shotgun",
        Weapon::Grenade => "grenade",
        Weapon::Laser => "laser",
        Weapon::Ninja => "ninja",
    }
}

fn set_jumps(ch: &mut Character, count: i32, env: &mut TileEnv) {
    if count == ch.core.jumps {
        return;
    }
    let plural = if count == 1 { "" } else { "s" };
    env.chat(ch, format!("You can jump {count} time{plural}"));
    let was = ch.core.jumps;
    ch.core.jumps = count;
    if (count == 0 && !ch.abilities.super_jump) || was == 0 {
        env.tuning_changed(ch);
    }
}

// ── Teleporters ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Landing {
    Standard,
    Evil,
    Checkpoint,
    CheckpointEvil,
}

impl Landing {
    fn is_evil(self) -> bool {
        matches!(self, Landing::Evil | Landing::CheckpointEvil)
    }
}

fn resolve_teleport(ch: &mut Character, index: usize, env: &mut TileEnv) -> Option<Fate> {
    let tele = env.map.tele[index]?;
    if ch.is_super() {
        return None;
    }
    let (to, landing) = match tele {
        TeleTile::In(group) => (env.teleporters.pick(group, &mut *env.rng)?, Landing::Standard),
        TeleTile::EvilIn(group) => (env.teleporters.pick(group, &mut *env.rng)?, Landing::Evil),
        TeleTile::CheckpointIn => (checkpoint_target(ch, env)?, Landing::Checkpoint),
        TeleTile::CheckpointEvilIn => (checkpoint_target(ch, env)?, Landing::CheckpointEvil),
        TeleTile::Out(_) | TeleTile::Checkpoint(_) | TeleTile::CheckpointOut(_) => return None,
    };
    teleport(ch, to, landing, env);
    Some(Fate::Relocated { release_hooked: landing.is_evil() })
}

/// Latest reachable tele-checkpoint output, else a spawn point.
fn checkpoint_target(ch: &Character, env: &mut TileEnv) -> Option<Vec2> {
    match env.teleporters.pick_checkpoint(ch.race.tele_checkpoint, &mut *env.rng) {
        Some(p) => Some(p),
        None => env.map.pick_spawn(&mut *env.rng),
    }
}

fn teleport(ch: &mut Character, to: Vec2, landing: Landing, env: &mut TileEnv) {
    ch.core.pos = to;
    if landing.is_evil() {
        ch.core.vel = Vec2::ZERO;
    }
    if landing.is_evil() || !env.config.teleport_hold_hook {
        ch.core.release_hook();
        ch.core.triggered_events |= CoreEvents::HOOK_RETRACT;
    }
    if env.config.teleport_lose_weapons && matches!(landing, Landing::Standard | Landing::Evil) {
        ch.weapons.strip_pickups();
    }
    ch.core.reset = true;
    log::debug!("character {} teleported ({landing:?}) to {to:?}", ch.id.0);
    env.events.push(GameEvent::Teleported { id: ch.id, to });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{CharacterId, FakeTuning, FreezeTime};
    use crate::domain::math::TILE_SIZE;
    use rand::SeedableRng;

    const TS: i32 = 50;

    fn map_from(rows: &[&str]) -> GameMap {
        let mut map = GameMap::new("test", rows[0].len(), rows.len());
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let i = map.index(x, y);
                if ch == 'P' {
                    map.spawns.push(map.cell_center(i));
                }
                map.game[i] = Tile::from_glyph(ch).unwrap_or(Tile::Air);
            }
        }
        map
    }

    fn at(x: usize, y: usize) -> Vec2 {
        Vec2::new((x as f32 + 0.5) * TILE_SIZE, (y as f32 + 0.5) * TILE_SIZE)
    }

    struct Rig {
        map: GameMap,
        teleporters: Teleporters,
        switchers: Switchers,
        teams: Teams,
        rng: StdRng,
        config: RaceConfig,
        events: Vec<GameEvent>,
    }

    impl Rig {
        fn new(map: GameMap) -> Self {
            Rig {
                teleporters: Teleporters::build(&map),
                switchers: Switchers::new(map.max_switch_group()),
                teams: Teams::default(),
                rng: StdRng::seed_from_u64(7),
                config: RaceConfig::default(),
                events: vec![],
                map,
            }
        }

        fn env(&mut self, tick: i64) -> TileEnv<'_> {
            TileEnv {
                map: &self.map,
                teleporters: &self.teleporters,
                switchers: &mut self.switchers,
                teams: &mut self.teams,
                rng: &mut self.rng,
                config: &self.config,
                tick,
                events: &mut self.events,
            }
        }

        /// Process the cell under `ch` as a standing character would.
        fn visit(&mut self, ch: &mut Character, tick: i64) -> TileReport {
            let index = self.map.index_of(ch.pos());
            let pos = ch.pos();
            handle_tiles(ch, index, pos, &mut self.env(tick))
        }

        fn chats(&self) -> Vec<&str> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    GameEvent::Chat { message, .. } => Some(message.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    fn character(x: usize, y: usize) -> Character {
        Character::new(CharacterId(0), at(x, y), 0)
    }

    #[test]
    fn freeze_and_unfreeze_tiles() {
        let mut rig = Rig::new(map_from(&["~o"]));
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 100);
        assert_eq!(ch.freeze.time, FreezeTime::Ticks(3 * TS));

        ch.core.pos = at(1, 0);
        rig.visit(&mut ch, 101);
        assert!(!ch.is_frozen());
    }

    #[test]
    fn deep_freeze_ignores_timed_tiles() {
        let mut rig = Rig::new(map_from(&["Z~oz"]));
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 100);
        assert!(ch.freeze.deep);
        assert_eq!(ch.freeze.time, FreezeTime::Thawed);

        ch.core.pos = at(1, 0);
        rig.visit(&mut ch, 200);
        assert_eq!(ch.freeze.time, FreezeTime::Thawed);

        ch.freeze_for(3, 300, TS);
        let before = ch.freeze.time;
        ch.core.pos = at(2, 0);
        rig.visit(&mut ch, 301);
        assert_eq!(ch.freeze.time, before);

        ch.core.pos = at(3, 0);
        rig.visit(&mut ch, 302);
        assert!(!ch.freeze.deep);
    }

    #[test]
    fn super_is_exempt_from_freeze_death_and_teleport() {
        let mut map = map_from(&["~x..."]);
        map.tele[2] = Some(TeleTile::In(1));
        map.tele[4] = Some(TeleTile::Out(1));
        let mut rig = Rig::new(map);
        let mut ch = character(0, 0);
        ch.set_super(true);

        rig.visit(&mut ch, 100);
        assert!(!ch.is_frozen());

        ch.core.pos = at(1, 0);
        assert_eq!(handle_skippable(&mut ch, &mut rig.env(101)), Fate::Continue);

        ch.core.pos = at(2, 0);
        assert_eq!(rig.visit(&mut ch, 102).fate, Fate::Continue);
        assert_eq!(ch.pos(), at(2, 0));
    }

    #[test]
    fn death_corners_and_clipping() {
        let mut rig = Rig::new(map_from(&["..x"]));
        let mut ch = character(1, 0);
        ch.core.pos.x += 10.0;
        assert_eq!(handle_skippable(&mut ch, &mut rig.env(1)), Fate::Died(DeathCause::WorldHazard));

        ch.core.pos = Vec2::new(-7000.0, 16.0);
        assert_eq!(handle_skippable(&mut ch, &mut rig.env(1)), Fate::Died(DeathCause::OutOfBounds));
    }

    #[test]
    fn checkpoints_only_advance() {
        let mut rig = Rig::new(map_from(&["S53"]));
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 10);
        assert_eq!(ch.race.state, RaceState::Started);

        ch.core.pos = at(1, 0);
        rig.visit(&mut ch, 60);
        ch.core.pos = at(2, 0);
        rig.visit(&mut ch, 110);
        assert_eq!(ch.race.active_checkpoint, Some(5));
        assert_eq!(ch.race.checkpoint_times[5], Some(1.0));
        assert_eq!(ch.race.checkpoint_times[3], None);
    }

    #[test]
    fn start_then_finish() {
        let mut rig = Rig::new(map_from(&["S.E"]));
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 0);
        ch.core.pos = at(2, 0);
        rig.visit(&mut ch, 125);
        assert_eq!(ch.race.state, RaceState::Finished);
        assert!(rig.events.contains(&GameEvent::RaceFinished { id: ch.id, time: 2.5 }));
    }

    #[test]
    fn mandatory_team_kills_lone_starter_with_rate_limited_warning() {
        let mut rig = Rig::new(map_from(&["S"]));
        rig.config.team_mode = TeamMode::Mandatory;
        let mut ch = character(0, 0);

        assert_eq!(rig.visit(&mut ch, 500).fate, Fate::Died(DeathCause::TeamPolicy));
        assert_eq!(rig.visit(&mut ch, 510).fate, Fate::Died(DeathCause::TeamPolicy));
        assert_eq!(rig.chats().len(), 1);
        rig.visit(&mut ch, 500 + 3 * TS as i64 + 1);
        assert_eq!(rig.chats().len(), 2);
        assert_eq!(ch.race.state, RaceState::Idle);
    }

    #[test]
    fn team_start_requests_propagation() {
        let mut rig = Rig::new(map_from(&["S"]));
        rig.teams.set_team(CharacterId(0), 3);
        rig.teams.set_team(CharacterId(1), 3);
        let mut ch = character(0, 0);
        let report = rig.visit(&mut ch, 40);
        assert!(report.team.run_started);
        assert_eq!(ch.race.start_tick, 40);
    }

    #[test]
    fn toggles_fire_once_per_entry() {
        let mut rig = Rig::new(map_from(&[".."]));
        let i = rig.map.index(1, 0);
        rig.map.front[i] = Tile::EndlessHookOn;
        let mut ch = character(1, 0);

        rig.visit(&mut ch, 1);
        rig.visit(&mut ch, 2);
        assert!(ch.abilities.endless_hook);
        assert_eq!(rig.chats(), vec!["Endless hook has been activated"]);

        // leaving and coming back does not re-notify an unchanged state
        ch.core.pos = at(0, 0);
        rig.visit(&mut ch, 3);
        ch.core.pos = at(1, 0);
        rig.visit(&mut ch, 4);
        assert_eq!(rig.chats().len(), 1);
    }

    #[test]
    fn collision_toggle_pushes_tuning() {
        let mut rig = Rig::new(map_from(&["."]));
        rig.map.game[0] = Tile::CollisionOff;
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 1);
        assert!(!ch.core.collision);
        let fake = FakeTuning::NO_COLLISION;
        assert!(rig.events.contains(&GameEvent::TuningChanged { id: ch.id, zone: 0, fake }));
    }

    #[test]
    fn refill_jumps_once_per_entry() {
        let mut rig = Rig::new(map_from(&["."]));
        rig.map.game[0] = Tile::RefillJumps;
        let mut ch = character(0, 0);
        ch.core.jumped_total = 2;
        ch.core.jumped = Jumped::AIR_EXHAUSTED;
        rig.visit(&mut ch, 1);
        assert_eq!(ch.core.jumped_total, 0);
        assert!(ch.core.jumped.is_empty());

        ch.core.jumped_total = 1;
        rig.visit(&mut ch, 2);
        assert_eq!(ch.core.jumped_total, 1);
    }

    #[test]
    fn unlock_team_tells_every_member() {
        let mut rig = Rig::new(map_from(&["."]));
        rig.map.game[0] = Tile::UnlockTeam;
        rig.teams.set_team(CharacterId(0), 2);
        rig.teams.set_team(CharacterId(5), 2);
        rig.teams.set_lock(2, true);
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 1);
        assert!(!rig.teams.is_locked(2));
        assert_eq!(rig.chats().len(), 2);
    }

    #[test]
    fn switch_writes_are_per_team_and_timed() {
        let mut map = map_from(&["."]);
        map.switch[0] = Some(SwitchCell { group: 1, kind: SwitchTile::TimedClose { seconds: 2 } });
        let mut rig = Rig::new(map);
        rig.teams.set_team(CharacterId(0), 4);
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 100);

        assert!(!rig.switchers.status(1, 4, 100));
        assert!(!rig.switchers.status(1, 4, 199));
        assert!(rig.switchers.status(1, 4, 200));
        assert!(rig.switchers.status(1, TEAM_FLOCK, 150));
    }

    #[test]
    fn super_team_never_writes_switches() {
        let mut map = map_from(&["."]);
        map.switch[0] = Some(SwitchCell { group: 1, kind: SwitchTile::Close });
        let mut rig = Rig::new(map);
        rig.teams.set_team(CharacterId(0), TEAM_SUPER);
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 1);
        assert!(rig.switchers.status(1, TEAM_SUPER, 1));
    }

    #[test]
    fn gated_switch_freeze_follows_status() {
        let mut map = map_from(&[".."]);
        map.switch[0] = Some(SwitchCell { group: 1, kind: SwitchTile::Close });
        map.switch[1] = Some(SwitchCell { group: 1, kind: SwitchTile::Freeze { seconds: 2 } });
        let mut rig = Rig::new(map);
        let mut ch = character(1, 0);
        rig.visit(&mut ch, 10);
        assert_eq!(ch.freeze.time, FreezeTime::Ticks(2 * TS));

        let mut other = Character::new(CharacterId(1), at(0, 0), 0);
        rig.visit(&mut other, 20);
        other.core.pos = at(1, 0);
        rig.visit(&mut other, 21);
        assert!(!other.is_frozen());
    }

    #[test]
    fn hit_switch_per_weapon() {
        let mut map = map_from(&[".."]);
        map.switch[0] = Some(SwitchCell { group: 0, kind: SwitchTile::HitOff(Weapon::Hammer) });
        map.switch[1] = Some(SwitchCell { group: 0, kind: SwitchTile::HitOff(Weapon::Laser) });
        let mut rig = Rig::new(map);
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 1);
        rig.visit(&mut ch, 2);
        ch.core.pos = at(1, 0);
        rig.visit(&mut ch, 3);
        assert_eq!(ch.abilities.hit_disabled, HitDisabled::HAMMER | HitDisabled::LASER);
        assert_eq!(
            rig.chats(),
            vec!["You can't hammer hit others", "You can't shoot others with laser"]
        );
    }

    #[test]
    fn jump_override_message() {
        let mut map = map_from(&[".."]);
        map.switch[0] = Some(SwitchCell { group: 0, kind: SwitchTile::Jump { count: 1 } });
        map.switch[1] = Some(SwitchCell { group: 0, kind: SwitchTile::Jump { count: 0 } });
        let mut rig = Rig::new(map);
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 1);
        ch.core.pos = at(1, 0);
        rig.visit(&mut ch, 2);
        assert_eq!(ch.core.jumps, 0);
        assert_eq!(rig.chats(), vec!["You can jump 1 time", "You can jump 0 times"]);
        let fake = FakeTuning::NO_JUMP;
        assert!(rig.events.contains(&GameEvent::TuningChanged { id: ch.id, zone: 0, fake }));
    }

    #[test]
    fn penalty_applies_once_per_entry_and_bonus_is_capped() {
        let mut map = map_from(&["..."]);
        map.switch[0] = Some(SwitchCell { group: 0, kind: SwitchTile::Penalty { minutes: 0, seconds: 10 } });
        map.switch[2] = Some(SwitchCell { group: 0, kind: SwitchTile::Bonus { minutes: 1, seconds: 0 } });
        let mut rig = Rig::new(map);
        let mut ch = character(0, 0);
        ch.race.start(1000);

        rig.visit(&mut ch, 1001);
        rig.visit(&mut ch, 1002);
        assert_eq!(ch.race.start_tick, 1000 - 10 * TS as i64);

        ch.core.pos = at(1, 0);
        rig.visit(&mut ch, 1003);
        rig.visit(&mut ch, 1004);
        ch.core.pos = at(0, 0);
        rig.visit(&mut ch, 1005);
        assert_eq!(ch.race.start_tick, 1000 - 20 * TS as i64);

        ch.core.pos = at(2, 0);
        rig.visit(&mut ch, 1006);
        assert_eq!(ch.race.start_tick, 1006);
    }

    #[test]
    fn penalty_in_shared_team_is_reported() {
        let mut map = map_from(&["."]);
        map.switch[0] = Some(SwitchCell { group: 0, kind: SwitchTile::Penalty { minutes: 0, seconds: 1 } });
        let mut rig = Rig::new(map);
        rig.teams.set_team(CharacterId(0), 6);
        let mut ch = character(0, 0);
        let report = rig.visit(&mut ch, 10);
        assert_eq!(report.team.start_tick, Some(-TS as i64));
    }

    #[test]
    fn teleport_relocates_and_releases_hook() {
        let mut map = map_from(&["....."]);
        map.tele[0] = Some(TeleTile::In(1));
        map.tele[4] = Some(TeleTile::Out(1));
        let mut rig = Rig::new(map);
        let mut ch = character(0, 0);
        ch.core.vel = Vec2::new(5.0, 0.0);

        assert_eq!(rig.visit(&mut ch, 1).fate, Fate::Relocated { release_hooked: false });
        assert_eq!(ch.pos(), at(4, 0));
        assert_eq!(ch.core.vel, Vec2::new(5.0, 0.0));
        assert!(ch.core.reset);
        assert!(ch.core.triggered_events.contains(CoreEvents::HOOK_RETRACT));
    }

    #[test]
    fn evil_teleport_stops_the_character() {
        let mut map = map_from(&["....."]);
        map.tele[0] = Some(TeleTile::EvilIn(1));
        map.tele[3] = Some(TeleTile::Out(1));
        let mut rig = Rig::new(map);
        rig.config.teleport_hold_hook = true;
        let mut ch = character(0, 0);
        ch.core.vel = Vec2::new(5.0, -3.0);
        assert_eq!(rig.visit(&mut ch, 1).fate, Fate::Relocated { release_hooked: true });
        assert_eq!(ch.pos(), at(3, 0));
        assert_eq!(ch.core.vel, Vec2::ZERO);
        assert!(ch.core.triggered_events.contains(CoreEvents::HOOK_RETRACT));
    }

    #[test]
    fn teleport_without_outputs_is_a_no_op() {
        let mut map = map_from(&["..."]);
        map.tele[1] = Some(TeleTile::In(9));
        let mut rig = Rig::new(map);
        let mut ch = character(1, 0);
        assert_eq!(rig.visit(&mut ch, 1).fate, Fate::Continue);
        assert_eq!(ch.pos(), at(1, 0));
        assert!(!ch.core.reset);
    }

    #[test]
    fn checkpoint_teleport_walks_down_then_falls_back_to_spawn() {
        let mut map = map_from(&["P....."]);
        map.tele[1] = Some(TeleTile::Checkpoint(3));
        map.tele[2] = Some(TeleTile::CheckpointOut(2));
        map.tele[5] = Some(TeleTile::CheckpointIn);
        let mut rig = Rig::new(map);

        let mut ch = character(1, 0);
        rig.visit(&mut ch, 1);
        assert_eq!(ch.race.tele_checkpoint, 3);
        ch.core.pos = at(5, 0);
        rig.visit(&mut ch, 2);
        assert_eq!(ch.pos(), at(2, 0));

        let mut fresh = Character::new(CharacterId(1), at(5, 0), 0);
        rig.visit(&mut fresh, 3);
        assert_eq!(fresh.pos(), at(0, 0));
    }

    #[test]
    fn stopper_rolls_back_past_position() {
        let mut rig = Rig::new(map_from(&["..<.."]));
        let mut ch = character(1, 0);
        ch.prev_pos = at(4, 0);
        ch.core.vel = Vec2::new(-80.0, 0.0);
        // crossing the stopper cell, leaving it through its left edge
        let index = rig.map.index(2, 0);
        let report = handle_tiles(&mut ch, index, Vec2::new(64.0, 16.0), &mut rig.env(1));
        assert_eq!(report.fate, Fate::RolledBack);
        assert_eq!(ch.pos(), at(4, 0));
        assert_eq!(ch.core.vel.x, 0.0);
    }

    #[test]
    fn tele_items_toggle_on_entry() {
        let mut rig = Rig::new(map_from(&[".."]));
        rig.map.game[0] = Tile::TeleGrenadeOn;
        rig.map.game[1] = Tile::TeleGrenadeOff;
        let mut ch = character(0, 0);
        rig.visit(&mut ch, 1);
        assert!(ch.abilities.tele.grenade);
        ch.core.pos = at(1, 0);
        rig.visit(&mut ch, 2);
        assert!(!ch.abilities.tele.grenade);
        assert_eq!(rig.chats(), vec!["Teleport grenade enabled", "Teleport grenade disabled"]);
    }
}
