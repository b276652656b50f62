/// Events emitted during a simulation step.
/// Collaborators (chat, audio, scoring, respawn) consume these.

use crate::domain::entity::{CharacterId, FakeTuning};
use crate::domain::math::Vec2;
use crate::domain::physics::CoreEvents;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeathCause {
    /// Death tile.
    WorldHazard,
    /// Left the playable area.
    OutOfBounds,
    /// Started a run without the required team.
    TeamPolicy,
    /// Killed by command.
    Command,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// Targeted text notification.
    Chat { id: CharacterId, message: String },
    /// Client prediction parameters changed; resend tuning for `zone`,
    /// adjusted by the character's `fake` deviations.
    TuningChanged { id: CharacterId, zone: u8, fake: FakeTuning },
    /// Core event flags raised this tick (jumps, hook attach/retract).
    Core { id: CharacterId, events: CoreEvents },
    RaceStarted { id: CharacterId },
    CheckpointReached { id: CharacterId, checkpoint: u8, time: f32 },
    RaceFinished { id: CharacterId, time: f32 },
    Teleported { id: CharacterId, to: Vec2 },
    Died { id: CharacterId, cause: DeathCause },
}

impl GameEvent {
    pub fn chat(id: CharacterId, message: impl Into<String>) -> Self {
        GameEvent::Chat { id, message: message.into() }
    }
}
