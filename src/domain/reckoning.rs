/// Dead-reckoning reconciler.
///
/// A shadow core is advanced every tick without input, the way a client
/// extrapolates from the last state it was sent. After the authoritative
/// core has moved, both are compared in their network form:
///
/// ┌──────────────────────────────────────────┬──────────────┐
/// │ Condition                                 │ Result       │
/// ├──────────────────────────────────────────┼──────────────┤
/// │ authoritative core requested a reset      │ Diverged     │
/// │ last sync older than 3 seconds            │ Diverged     │
/// │ NetCore(shadow) != NetCore(authoritative) │ Diverged     │
/// │ otherwise                                 │ Tracking     │
/// └──────────────────────────────────────────┴──────────────┘
///
/// On Diverged the shadow and the sent core are re-seeded from the
/// authoritative core and the reset request is consumed.

use super::physics::{self, CharacterCore, Collision, NetCore, Tuning};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReckoningState {
    Tracking,
    Diverged,
}

#[derive(Clone, Debug)]
pub struct Reckoning {
    /// Shadow prediction, advanced without input.
    pub core: CharacterCore,
    /// The core last exposed to clients.
    pub send_core: CharacterCore,
    /// Tick of the last forced sync.
    pub tick: i64,
    pub state: ReckoningState,
}

impl Reckoning {
    pub fn new(core: &CharacterCore, tick: i64) -> Self {
        Reckoning {
            core: core.clone(),
            send_core: core.clone(),
            tick,
            state: ReckoningState::Diverged,
        }
    }

    /// Advance the shadow by one tick. Runs before the authoritative move.
    pub fn predict(&mut self, tuning: &Tuning, collision: &dyn Collision, tick_speed: i32) {
        physics::tick(&mut self.core, None, tuning, collision, &[], tick_speed);
        physics::move_core(&mut self.core, tuning, collision, &[]);
        physics::quantize(&mut self.core);
    }

    /// Compare the shadow with the authoritative core and resync if needed.
    pub fn reconcile(&mut self, actual: &mut CharacterCore, tick: i64, tick_speed: i32) -> ReckoningState {
        let stale = self.tick + 3 * i64::from(tick_speed) < tick;
        let differs = NetCore::write(&self.core) != NetCore::write(actual);
        self.state = if actual.reset || stale || differs {
            actual.reset = false;
            self.tick = tick;
            self.send_core = actual.clone();
            self.core = actual.clone();
            ReckoningState::Diverged
        } else {
            ReckoningState::Tracking
        };
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{CharacterId, Input};
    use crate::domain::math::Vec2;
    use crate::domain::physics::{HookState, Peer};

    struct Open;

    impl Collision for Open {
        fn check_point(&self, _p: Vec2) -> bool { false }
        fn is_hookable(&self, _p: Vec2) -> bool { false }
    }

    const TS: i32 = 50;

    /// One authoritative tick with the same pipeline order as the world step.
    fn advance(r: &mut Reckoning, core: &mut CharacterCore, input: &Input, tick: i64) -> ReckoningState {
        let t = Tuning::default();
        r.predict(&t, &Open, TS);
        physics::tick(core, Some(input), &t, &Open, &[], TS);
        physics::move_core(core, &t, &Open, &[]);
        physics::quantize(core);
        r.reconcile(core, tick, TS)
    }

    #[test]
    fn free_fall_tracks() {
        let mut core = CharacterCore::new(CharacterId(0), Vec2::new(100.0, 100.0));
        let mut r = Reckoning::new(&core, 0);
        let idle = Input::default();
        for tick in 1..=20 {
            assert_eq!(advance(&mut r, &mut core, &idle, tick), ReckoningState::Tracking);
        }
        assert_eq!(r.tick, 0);
    }

    #[test]
    fn input_change_diverges_then_tracks_again() {
        let mut core = CharacterCore::new(CharacterId(0), Vec2::new(100.0, 100.0));
        let mut r = Reckoning::new(&core, 0);
        let right = Input { direction: 1, ..Input::default() };
        assert_eq!(advance(&mut r, &mut core, &right, 1), ReckoningState::Diverged);
        // the shadow was re-seeded with direction = 1 and now extrapolates it
        assert_eq!(advance(&mut r, &mut core, &right, 2), ReckoningState::Tracking);
    }

    #[test]
    fn reset_flag_forces_resync_and_is_consumed() {
        let mut core = CharacterCore::new(CharacterId(0), Vec2::new(100.0, 100.0));
        let mut r = Reckoning::new(&core, 0);
        core.reset = true;
        assert_eq!(advance(&mut r, &mut core, &Input::default(), 1), ReckoningState::Diverged);
        assert!(!core.reset);
        assert_eq!(r.send_core, core);
    }

    #[test]
    fn resyncs_after_three_seconds() {
        let mut core = CharacterCore::new(CharacterId(0), Vec2::new(100.0, 100.0));
        let mut r = Reckoning::new(&core, 0);
        let idle = Input::default();
        let limit = 3 * TS as i64;
        for tick in 1..=limit {
            assert_eq!(advance(&mut r, &mut core, &idle, tick), ReckoningState::Tracking);
        }
        assert_eq!(advance(&mut r, &mut core, &idle, limit + 1), ReckoningState::Diverged);
        assert_eq!(r.tick, limit + 1);
    }

    #[test]
    fn shadow_keeps_a_player_hook() {
        let mut core = CharacterCore::new(CharacterId(0), Vec2::new(100.0, 100.0));
        core.hook_state = HookState::Grabbed;
        core.hooked_player = Some(CharacterId(1));
        core.hook_pos = Vec2::new(160.0, 100.0);
        let mut r = Reckoning::new(&core, 0);
        let held = Peer {
            id: CharacterId(1),
            pos: Vec2::new(160.0, 100.0),
            vel: Vec2::ZERO,
            is_super: false,
            solo: false,
            collision: true,
            same_world: true,
        };
        let t = Tuning::default();
        let hold = Input { hook: true, ..Input::default() };
        for tick in 1..=5 {
            r.predict(&t, &Open, TS);
            physics::tick(&mut core, Some(&hold), &t, &Open, &[held], TS);
            physics::move_core(&mut core, &t, &Open, &[]);
            physics::quantize(&mut core);
            assert_eq!(r.reconcile(&mut core, tick, TS), ReckoningState::Tracking);
        }
        assert_eq!(r.core.hooked_player, Some(CharacterId(1)));
    }
}
