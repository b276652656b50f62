/// The step function: advances the world by one tick.
///
/// Characters are processed one at a time in id order. For each:
///   1. Pre-tick: freeze countdown, tune zone, rescue save position
///   2. Reckoning shadow predicts one tick without input
///   3. Core tick (input masked while frozen), then the deferred
///      player-vs-player pass; hook drag is applied to the hooked character
///   4. Move against the map and quantize (stuck states are logged)
///   5. Post-core: endless hook, deep freeze, jump normalisation
///   6. Skippable tiles at the current position (death, clipping, speedup)
///   7. Anti-tunneling scan from the previous to the current position,
///      every crossed cell fed to the tile processor in order; a death,
///      teleport or stopper roll-back ends the scan
///   8. Team propagation of run starts and start-time changes
///   9. Reconciler compares the shadow with the authoritative core
///
/// Shared state (switchers, teams, RNG) is mutated in place, so a later id
/// sees what an earlier id did in the same tick.

use crate::domain::entity::{Character, CharacterId, RaceState};
use crate::domain::math::Vec2;
use crate::domain::physics::{self, Collision, Jumped, Peer, Tuning, PHYS_SIZE};
use crate::domain::scan;
use crate::domain::tile::Tile;
use super::event::GameEvent;
use super::map::GameMap;
use super::teams::Teams;
use super::tiles::{self, Fate, TeamEffect, TileEnv};
use super::world::World;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut World) -> Vec<GameEvent> {
    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;

    for slot in 0..world.characters.len() {
        let Some(mut ch) = world.characters[slot].take() else { continue };
        let id = ch.id;
        let (fate, effect) = advance(world, &mut ch, &mut events);
        world.characters[slot] = Some(ch);

        resolve_team_effect(world, id, effect, &mut events);
        resolve_team_finish(world, id);
        match fate {
            Fate::Died(cause) => events.extend(world.kill(id, cause)),
            Fate::Relocated { release_hooked: true } => world.release_hooks_on(id),
            _ => {}
        }
    }

    events
}

fn advance(world: &mut World, ch: &mut Character, events: &mut Vec<GameEvent>) -> (Fate, TeamEffect) {
    let ts = world.config.tick_speed;

    let frozen = resolve_pre_tick(world, ch, events);
    let tuning = world.config.tuning_for(ch.tune_zone).clone();
    ch.reckoning.predict(&tuning, &world.map, ts);

    let peers = peers_of(world, ch.id);
    let input = if frozen { ch.input.frozen() } else { ch.input };
    physics::tick(&mut ch.core, Some(&input), &tuning, &world.map, &peers, ts);
    if let Some(pull) = physics::tick_deferred(&mut ch.core, &tuning, &peers) {
        if let Some(target) = world.character_mut(pull.target) {
            target.core.vel = pull.vel;
        }
    }

    resolve_move(&world.map, ch, &tuning, &peers);
    resolve_post_core(world, ch);

    let (fate, effect) = resolve_tiles(world, ch, events);
    if let Fate::Died(_) = fate {
        return (fate, effect);
    }

    ch.reckoning.reconcile(&mut ch.core, world.tick, ts);
    if !ch.core.triggered_events.is_empty() {
        events.push(GameEvent::Core { id: ch.id, events: ch.core.triggered_events });
    }
    (fate, effect)
}

// ══════════════════════════════════════════════════════════════
// Pre-tick
// ══════════════════════════════════════════════════════════════

/// Returns whether input is masked this tick.
fn resolve_pre_tick(world: &World, ch: &mut Character, events: &mut Vec<GameEvent>) -> bool {
    let frozen = ch.is_frozen();
    if frozen {
        ch.tick_freeze();
    }

    let zone = world.map.tune_zone_at(ch.pos());
    if zone != ch.tune_zone {
        ch.tune_zone = zone;
        events.push(GameEvent::TuningChanged { id: ch.id, zone, fake: ch.fake_tuning() });
    }

    if world.config.rescue && physics::is_grounded(&ch.core, &world.map) && !on_freeze(&world.map, ch.pos()) {
        ch.rescue.save_pos = Some(ch.pos());
    }
    frozen
}

fn on_freeze(map: &GameMap, p: Vec2) -> bool {
    let i = map.index_of(p);
    [map.game[i], map.front[i]].iter().any(|t| matches!(t, Tile::Freeze | Tile::DeepFreeze))
}

/// Everyone else, as this character's core sees them.
fn peers_of(world: &World, id: CharacterId) -> Vec<Peer> {
    world
        .alive()
        .filter(|o| o.id != id)
        .map(|o| Peer {
            id: o.id,
            pos: o.core.pos,
            vel: o.core.vel,
            is_super: o.is_super(),
            solo: o.core.solo,
            collision: o.core.collision,
            same_world: world.teams.can_collide(id, o.id),
        })
        .collect()
}

// ══════════════════════════════════════════════════════════════
// Movement
// ══════════════════════════════════════════════════════════════

fn resolve_move(map: &GameMap, ch: &mut Character, tuning: &Tuning, peers: &[Peer]) {
    let size = Vec2::new(PHYS_SIZE, PHYS_SIZE);
    let stuck_before = map.test_box(ch.core.pos, size);

    ch.prev_pos = ch.core.pos;
    physics::move_core(&mut ch.core, tuning, map, peers);
    physics::quantize(&mut ch.core);

    if stuck_before {
        log::debug!("character {} stuck before move at {:?}", ch.id.0, ch.prev_pos);
    } else if map.test_box(ch.core.pos, size) {
        log::debug!(
            "character {} stuck after move/quantize: {:?} -> {:?} vel {:?}",
            ch.id.0,
            ch.prev_pos,
            ch.core.pos,
            ch.core.vel
        );
    }
}

fn resolve_post_core(world: &World, ch: &mut Character) {
    if ch.abilities.endless_hook {
        ch.core.hook_tick = 0;
    }
    if ch.freeze.deep && !ch.is_super() {
        ch.freeze_for(world.config.freeze_delay, world.tick, world.config.tick_speed);
    }

    let core = &mut ch.core;
    let exhausted = Jumped::HELD | Jumped::AIR_EXHAUSTED;
    if core.jumps == 0 && !core.is_super {
        core.jumped = exhausted;
    } else if core.jumps == 1 && !core.jumped.is_empty() {
        core.jumped = exhausted;
    } else if core.jumped_total < core.jumps - 1 && core.jumped.contains(Jumped::AIR_EXHAUSTED) {
        core.jumped = Jumped::HELD;
    }
    if (core.is_super || ch.abilities.super_jump) && core.jumped.contains(Jumped::AIR_EXHAUSTED) {
        core.jumped = Jumped::HELD;
    }
}

// ══════════════════════════════════════════════════════════════
// Tiles
// ══════════════════════════════════════════════════════════════

fn resolve_tiles(world: &mut World, ch: &mut Character, events: &mut Vec<GameEvent>) -> (Fate, TeamEffect) {
    let World { map, teleporters, switchers, teams, rng, config, tick, .. } = world;
    let crossings = scan::crossings(ch.prev_pos, ch.pos(), map.width, map.height);
    let mut env = TileEnv { map, teleporters, switchers, teams, rng, config, tick: *tick, events };
    let mut effect = TeamEffect::default();

    let fate = tiles::handle_skippable(ch, &mut env);
    if fate.ends_scan() {
        return (fate, effect);
    }

    for crossing in crossings {
        let report = tiles::handle_tiles(ch, crossing.index, crossing.exit, &mut env);
        effect.run_started |= report.team.run_started;
        if report.team.start_tick.is_some() {
            effect.start_tick = report.team.start_tick;
        }
        if report.fate.ends_scan() {
            return (report.fate, effect);
        }
    }
    (Fate::Continue, effect)
}

// ══════════════════════════════════════════════════════════════
// Teams
// ══════════════════════════════════════════════════════════════

/// Copy a member's run start or start-time change onto its teammates.
/// With several writers in one tick the highest id wins.
fn resolve_team_effect(world: &mut World, id: CharacterId, effect: TeamEffect, events: &mut Vec<GameEvent>) {
    let team = world.teams.team_of(id);
    if !Teams::is_shared(team) || effect == TeamEffect::default() {
        return;
    }
    let mates: Vec<_> = world.teams.members(team).filter(|&m| m != id).collect();
    let tick = world.tick;
    for mate in mates {
        let Some(other) = world.character_mut(mate) else { continue };
        if effect.run_started {
            other.race.start(tick);
            events.push(GameEvent::RaceStarted { id: mate });
        }
        if let Some(start) = effect.start_tick {
            other.race.start_tick = start;
        }
    }
    if effect.run_started {
        log::info!("team {team} started");
    }
}

/// A shared team is finished once every live member is.
fn resolve_team_finish(world: &mut World, id: CharacterId) {
    let team = world.teams.team_of(id);
    if !Teams::is_shared(team) || world.teams.is_finished(team) {
        return;
    }
    let all_done = {
        let mut members = world.teams.members(team).filter_map(|m| world.character(m)).peekable();
        members.peek().is_some() && members.all(|c| c.race.state == RaceState::Finished)
    };
    if all_done {
        world.teams.set_finished(team, true);
        log::info!("team {team} finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaceConfig;
    use crate::domain::entity::{FakeTuning, FreezeTime, Input};
    use crate::domain::math::TILE_SIZE;
    use crate::domain::tile::{SwitchCell, SwitchTile};
    use crate::sim::event::DeathCause;
    use crate::sim::level::parse_map;

    fn world(text: &str) -> World {
        let mut config = RaceConfig::default();
        config.rng_seed = Some(11);
        World::new(parse_map(text).expect("test map"), config)
    }

    fn at(x: usize, y: usize) -> Vec2 {
        Vec2::new((x as f32 + 0.5) * TILE_SIZE, (y as f32 + 0.5) * TILE_SIZE)
    }

    fn character(w: &World, id: usize) -> &Character {
        w.character(CharacterId(id)).expect("character alive")
    }

    #[test]
    fn idle_character_falls_and_lands() {
        let mut w = world("......\n..P...\n......\n######");
        w.spawn(CharacterId(0));
        for _ in 0..40 {
            step(&mut w);
        }
        let ch = character(&w, 0);
        assert!(physics::is_grounded(&ch.core, &w.map));
        assert!(ch.pos().y + PHYS_SIZE / 2.0 <= 3.0 * TILE_SIZE);
        assert_eq!(ch.core.vel.y, 0.0);
    }

    #[test]
    fn walking_right_moves_right() {
        let mut w = world("P.........\n##########");
        w.spawn(CharacterId(0));
        w.set_input(CharacterId(0), Input { direction: 1, ..Input::default() });
        for _ in 0..20 {
            step(&mut w);
        }
        assert!(character(&w, 0).pos().x > at(0, 0).x + 20.0);
    }

    #[test]
    fn frozen_character_ignores_input() {
        let mut w = world("P.........\n##########");
        w.spawn(CharacterId(0));
        for _ in 0..5 {
            step(&mut w);
        }
        let x = character(&w, 0).pos().x;
        let tick = w.tick;
        if let Some(ch) = w.character_mut(CharacterId(0)) {
            ch.freeze_for(3, tick, 50);
        }
        w.set_input(CharacterId(0), Input { direction: 1, ..Input::default() });
        for _ in 0..10 {
            step(&mut w);
        }
        assert_eq!(character(&w, 0).pos().x, x);
    }

    #[test]
    fn death_tile_kills() {
        let mut w = world("P\nx\n#");
        w.spawn(CharacterId(0));
        let mut died = vec![];
        for _ in 0..30 {
            died.extend(step(&mut w).into_iter().filter(|e| matches!(e, GameEvent::Died { .. })));
        }
        assert_eq!(died, vec![GameEvent::Died { id: CharacterId(0), cause: DeathCause::WorldHazard }]);
        assert!(w.character(CharacterId(0)).is_none());
    }

    #[test]
    fn deep_freeze_keeps_character_frozen() {
        let mut w = world("PZ..\n####");
        w.spawn_at(CharacterId(0), at(1, 0));
        for _ in 0..(5 * 50) {
            step(&mut w);
        }
        let ch = character(&w, 0);
        assert!(ch.freeze.deep);
        assert!(matches!(ch.freeze.time, FreezeTime::Ticks(_)));
    }

    #[test]
    fn tune_zone_change_is_announced() {
        let mut w = world("@tune 2,0 1\nP...\n####");
        w.spawn_at(CharacterId(0), at(0, 0));
        if let Some(ch) = w.character_mut(CharacterId(0)) {
            ch.core.pos = at(2, 0);
        }
        let events = step(&mut w);
        assert!(events.contains(&GameEvent::TuningChanged { id: CharacterId(0), zone: 1, fake: FakeTuning::empty() }));
        assert_eq!(character(&w, 0).tune_zone, 1);
        assert!(!step(&mut w).iter().any(|e| matches!(e, GameEvent::TuningChanged { .. })));
    }

    #[test]
    fn switch_written_by_lower_id_is_seen_by_higher_id_same_tick() {
        let mut w = world("P..P.\n#####");
        let close = w.map.index(0, 0);
        let gated = w.map.index(3, 0);
        w.map.switch[close] = Some(SwitchCell { group: 1, kind: SwitchTile::Close });
        w.map.switch[gated] = Some(SwitchCell { group: 1, kind: SwitchTile::Freeze { seconds: 2 } });
        w.switchers = crate::sim::switch::Switchers::new(1);
        w.spawn_at(CharacterId(0), at(0, 0));
        w.spawn_at(CharacterId(1), at(3, 0));

        step(&mut w);
        assert!(!character(&w, 1).is_frozen());

        // reversed roles: the gate is read before it is closed
        let mut w2 = world("P..P.\n#####");
        w2.map.switch[close] = Some(SwitchCell { group: 1, kind: SwitchTile::Close });
        w2.map.switch[gated] = Some(SwitchCell { group: 1, kind: SwitchTile::Freeze { seconds: 2 } });
        w2.switchers = crate::sim::switch::Switchers::new(1);
        w2.spawn_at(CharacterId(0), at(3, 0));
        w2.spawn_at(CharacterId(1), at(0, 0));
        step(&mut w2);
        assert!(character(&w2, 0).is_frozen());
    }

    #[test]
    fn team_start_and_penalty_propagate() {
        let mut w = world("@switch 3,0 penalty 0 2\n.S.....\n#######");
        w.set_team(CharacterId(0), 5);
        w.set_team(CharacterId(1), 5);
        w.spawn_at(CharacterId(0), at(1, 0));
        w.spawn_at(CharacterId(1), at(6, 0));

        let events = step(&mut w);
        assert!(events.contains(&GameEvent::RaceStarted { id: CharacterId(1) }));
        let start = character(&w, 1).race.start_tick;
        assert_eq!(character(&w, 1).race.state, RaceState::Started);

        if let Some(ch) = w.character_mut(CharacterId(0)) {
            ch.core.pos = at(3, 0);
        }
        step(&mut w);
        assert_eq!(character(&w, 0).race.start_tick, start - 100);
        assert_eq!(character(&w, 1).race.start_tick, start - 100);
    }

    #[test]
    fn reckoning_resyncs_after_teleport() {
        let mut w = world("@tele 1,0 in 1\n@tele 5,0 out 1\nP.....\n######");
        w.spawn_at(CharacterId(0), at(1, 0));
        let events = step(&mut w);
        assert!(events.contains(&GameEvent::Teleported { id: CharacterId(0), to: at(5, 0) }));
        let ch = character(&w, 0);
        assert!(!ch.core.reset);
        assert_eq!(ch.reckoning.send_core.pos, at(5, 0));
    }

    #[test]
    fn evil_teleport_frees_the_character_from_other_hooks() {
        let mut w = world("@tele 1,0 evil 1\n@tele 6,0 out 1\nP......\n#######");
        w.spawn_at(CharacterId(0), at(1, 0));
        w.spawn_at(CharacterId(1), at(3, 0));
        w.set_input(CharacterId(1), Input { hook: true, target: Vec2::new(-1.0, 0.0), ..Input::default() });
        if let Some(hooker) = w.character_mut(CharacterId(1)) {
            hooker.core.hook_state = physics::HookState::Grabbed;
            hooker.core.hooked_player = Some(CharacterId(0));
        }

        let events = step(&mut w);
        assert!(events.contains(&GameEvent::Teleported { id: CharacterId(0), to: at(6, 0) }));
        assert_eq!(character(&w, 1).core.hooked_player, None);
    }

    #[test]
    fn plain_teleport_keeps_other_hooks() {
        let mut w = world("@tele 1,0 in 1\n@tele 6,0 out 1\nP......\n#######");
        w.spawn_at(CharacterId(0), at(1, 0));
        w.spawn_at(CharacterId(1), at(3, 0));
        w.set_input(CharacterId(1), Input { hook: true, target: Vec2::new(-1.0, 0.0), ..Input::default() });
        if let Some(hooker) = w.character_mut(CharacterId(1)) {
            hooker.core.hook_state = physics::HookState::Grabbed;
            hooker.core.hooked_player = Some(CharacterId(0));
        }

        step(&mut w);
        assert_eq!(character(&w, 1).core.hooked_player, Some(CharacterId(0)));
    }
}
