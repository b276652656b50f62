//! Racecore: per-tick movement and tile effects for a team race platformer.
//!
//! ## Layout
//!
//!   domain/  pure rules: vectors, tiles, the character core, physics,
//!             the anti-tunneling scan and dead reckoning
//!   sim/     the world: map, registries, teams, the tile processor and
//!             the step function that drives everything once per tick

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;
