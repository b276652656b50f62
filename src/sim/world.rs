/// World: the map, its registries, the teams and every live character.
///
/// ## Ownership
///
///   - `map`, `teleporters`  immutable between map loads
///   - `switchers`           runtime gates, reset on every map load
///   - `teams`               membership survives death and map loads
///   - `characters`          one slot per client id, `None` while dead
///
/// Characters are advanced in id order every tick (see `step`), so a
/// switch written by a lower id is already visible to a higher id in the
/// same tick.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{RaceConfig, TeamMode};
use crate::domain::entity::{Character, CharacterId, CharacterSnapshot, Input, MAX_CLIENTS};
use crate::domain::math::Vec2;
use crate::domain::physics::{self, CoreEvents};
use crate::domain::tile::Tile;

use super::event::{DeathCause, GameEvent};
use super::map::GameMap;
use super::switch::{Switchers, TEAM_FLOCK, TEAM_SUPER};
use super::teams::Teams;
use super::teleport::Teleporters;

pub struct World {
    pub map: GameMap,
    pub teleporters: Teleporters,
    pub switchers: Switchers,
    pub teams: Teams,
    pub characters: Vec<Option<Character>>,
    pub config: RaceConfig,
    pub tick: i64,
    pub rng: StdRng,
}

impl World {
    pub fn new(map: GameMap, config: RaceConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        log::info!("world created on map '{}' ({}x{})", map.name, map.width, map.height);
        World {
            teleporters: Teleporters::build(&map),
            switchers: Switchers::new(map.max_switch_group()),
            teams: Teams::default(),
            characters: (0..MAX_CLIENTS).map(|_| None).collect(),
            config,
            tick: 0,
            rng,
            map,
        }
    }

    /// Replace the map. Registries are rebuilt and every character is
    /// removed; team membership is kept.
    pub fn load_map(&mut self, map: GameMap) {
        log::info!("loading map '{}' ({}x{})", map.name, map.width, map.height);
        self.teleporters = Teleporters::build(&map);
        self.switchers = Switchers::new(map.max_switch_group());
        self.map = map;
        for slot in &mut self.characters {
            *slot = None;
        }
    }

    // ── Lookup ──

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(id.0).and_then(Option::as_ref)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn alive(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter().flatten()
    }

    /// Public state of every live character, in id order.
    pub fn snapshot(&self) -> Vec<CharacterSnapshot> {
        self.alive().map(Character::snapshot).collect()
    }

    // ── Commands ──

    /// Spawn at a random spawn point of the map.
    pub fn spawn(&mut self, id: CharacterId) -> Vec<GameEvent> {
        match self.map.pick_spawn(&mut self.rng) {
            Some(pos) => self.spawn_at(id, pos),
            None => {
                log::warn!("map '{}' has no spawn points", self.map.name);
                vec![]
            }
        }
    }

    /// Place a fresh character at `pos`, replacing any existing one.
    pub fn spawn_at(&mut self, id: CharacterId, pos: Vec2) -> Vec<GameEvent> {
        let mut events = vec![];
        if id.0 >= MAX_CLIENTS {
            log::warn!("character id {} out of range", id.0);
            return events;
        }
        let mut ch = Character::new(id, pos, self.tick);
        ch.abilities.endless_hook = self.config.endless_hook;
        ch.tune_zone = self.map.tune_zone_at(pos);

        let team = self.teams.team_of(id);
        if team == TEAM_SUPER {
            ch.set_super(true);
        }
        if self.config.team_mode == TeamMode::Mandatory && team == TEAM_FLOCK {
            events.push(GameEvent::chat(id, "Please join a team before you start"));
            ch.race.last_start_warning = Some(self.tick);
        }
        // rejoining a locked team mid-run keeps the team's clock
        if Teams::is_shared(team) && self.teams.is_locked(team) {
            let mate = self.teams.members(team).filter(|&m| m != id).find_map(|m| self.character(m));
            if let Some(mate) = mate {
                ch.race.state = mate.race.state;
                ch.race.start_tick = mate.race.start_tick;
            }
        }

        log::debug!("character {} spawned at {pos:?}", id.0);
        self.characters[id.0] = Some(ch);
        events
    }

    /// Remove a live character. Returns the death notification.
    pub fn kill(&mut self, id: CharacterId, cause: DeathCause) -> Option<GameEvent> {
        let ch = self.characters.get_mut(id.0)?.take()?;
        log::debug!("character {} died ({cause:?}) at {:?}", id.0, ch.pos());
        self.release_hooks_on(id);
        Some(GameEvent::Died { id, cause })
    }

    /// Disconnect: character and team membership go.
    pub fn remove(&mut self, id: CharacterId) {
        if let Some(slot) = self.characters.get_mut(id.0) {
            *slot = None;
        }
        self.release_hooks_on(id);
        self.teams.remove(id);
    }

    /// Every hook attached to `id` lets go.
    pub fn release_hooks_on(&mut self, id: CharacterId) {
        for ch in self.characters.iter_mut().flatten() {
            if ch.core.hooked_player == Some(id) {
                ch.core.release_hook();
                ch.core.triggered_events |= CoreEvents::HOOK_RETRACT;
            }
        }
    }

    pub fn set_input(&mut self, id: CharacterId, input: Input) -> bool {
        match self.character_mut(id) {
            Some(ch) => {
                ch.input = input;
                true
            }
            None => false,
        }
    }

    /// Grant or revoke the privileged state. Super characters live in the
    /// super team; revoking returns them to the flock.
    pub fn set_super(&mut self, id: CharacterId, on: bool) -> bool {
        let Some(ch) = self.characters.get_mut(id.0).and_then(Option::as_mut) else {
            return false;
        };
        if ch.is_super() == on {
            return false;
        }
        ch.set_super(on);
        self.teams.set_team(id, if on { TEAM_SUPER } else { TEAM_FLOCK });
        true
    }

    /// Join a team. The super team is reserved for `set_super`.
    pub fn set_team(&mut self, id: CharacterId, team: usize) -> bool {
        if team == TEAM_SUPER || self.teams.team_of(id) == TEAM_SUPER {
            return false;
        }
        self.teams.set_team(id, team)
    }

    /// Pull a character standing still in a freeze back to its last safe
    /// position.
    pub fn rescue(&mut self, id: CharacterId) -> Vec<GameEvent> {
        if !self.config.rescue {
            return vec![];
        }
        let (tick, ts) = (self.tick, self.config.tick_speed as i64);
        let delay = self.config.rescue_delay as i64 * ts;
        let map = &self.map;
        let Some(ch) = self.characters.get_mut(id.0).and_then(Option::as_mut) else {
            return vec![];
        };
        let Some(save_pos) = ch.rescue.save_pos else { return vec![] };
        let still = ch.pos() == ch.prev_pos && physics::is_grounded(&ch.core, map);
        if ch.is_super() || ch.freeze.deep || !still {
            return vec![];
        }
        if let Some(last) = ch.rescue.last_rescue.filter(|&t| t + delay > tick) {
            let wait = (last + delay - tick) / ts;
            return vec![GameEvent::chat(id, format!("You have to wait {wait} seconds until you can rescue yourself"))];
        }
        let here = map.index_of(ch.pos());
        if map.game[here] != Tile::Freeze && map.front[here] != Tile::Freeze {
            return vec![];
        }

        ch.rescue.last_rescue = Some(tick);
        ch.core.pos = save_pos;
        ch.prev_pos = save_pos;
        ch.core.vel = Vec2::ZERO;
        ch.core.release_hook();
        ch.core.triggered_events |= CoreEvents::HOOK_RETRACT;
        ch.core.reset = true;
        ch.unfreeze();
        self.release_hooks_on(id);
        vec![GameEvent::Teleported { id, to: save_pos }]
    }
}
