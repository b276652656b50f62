/// Headless runner: load a map, spawn a few characters that run right,
/// step the world and log what happens.

use std::error::Error;

use racecore::config::RaceConfig;
use racecore::domain::entity::{CharacterId, Input};
use racecore::sim::event::GameEvent;
use racecore::sim::level::{load_map, parse_map, DEMO_MAP};
use racecore::sim::step::step;
use racecore::sim::world::World;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RaceConfig::load();
    let map = match &config.run.map {
        Some(path) => load_map(path)?,
        None => parse_map(DEMO_MAP)?,
    };
    let (ticks, count, tick_speed) = (config.run.ticks, config.run.characters, config.tick_speed);
    let mut world = World::new(map, config);

    for i in 0..count {
        let id = CharacterId(i);
        log_events(world.spawn(id).iter());
        world.set_input(id, Input { direction: 1, ..Input::default() });
    }

    for _ in 0..ticks {
        let events = step(&mut world);
        log_events(events.iter().filter(|e| !matches!(e, GameEvent::Core { .. })));
    }

    for snap in world.snapshot() {
        log::info!(
            "character {} at ({}, {}) race {:?} after {:.2}s",
            snap.id.0,
            snap.core.x,
            snap.core.y,
            snap.race,
            world.tick as f32 / tick_speed as f32
        );
    }
    Ok(())
}

fn log_events<'a>(events: impl Iterator<Item = &'a GameEvent>) {
    for event in events {
        match event {
            GameEvent::Chat { id, message } => log::info!("[{}] {message}", id.0),
            GameEvent::Died { id, cause } => log::info!("character {} died: {cause:?}", id.0),
            GameEvent::RaceFinished { id, time } => log::info!("character {} finished in {time:.2}s", id.0),
            other => log::debug!("{other:?}"),
        }
    }
}
