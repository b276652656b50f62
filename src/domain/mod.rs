pub mod entity;
pub mod math;
pub mod physics;
pub mod reckoning;
pub mod rules;
pub mod scan;
pub mod tile;
