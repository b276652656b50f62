pub mod event;
pub mod level;
pub mod map;
pub mod step;
pub mod switch;
pub mod teams;
pub mod teleport;
pub mod tiles;
pub mod world;
