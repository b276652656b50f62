/// Team service: membership, locks and run completion per team.
///
/// Every character belongs to exactly one team. `TEAM_FLOCK` (0) is the
/// default "no team"; `TEAM_SUPER` holds privileged characters.
/// Characters in different teams do not see each other (no collision, no
/// hooking), except that super characters see everyone.

use crate::domain::entity::{CharacterId, MAX_CLIENTS};

use super::switch::{NUM_TEAMS, TEAM_FLOCK, TEAM_SUPER};

#[derive(Clone, Debug)]
pub struct Teams {
    team_of: [usize; MAX_CLIENTS],
    locked: [bool; NUM_TEAMS],
    finished: [bool; NUM_TEAMS],
}

impl Default for Teams {
    fn default() -> Self {
        Teams {
            team_of: [TEAM_FLOCK; MAX_CLIENTS],
            locked: [false; NUM_TEAMS],
            finished: [false; NUM_TEAMS],
        }
    }
}

impl Teams {
    pub fn team_of(&self, id: CharacterId) -> usize {
        self.team_of.get(id.0).copied().unwrap_or(TEAM_FLOCK)
    }

    /// Move a character into `team`. Locked teams refuse newcomers.
    pub fn set_team(&mut self, id: CharacterId, team: usize) -> bool {
        if id.0 >= MAX_CLIENTS || team >= NUM_TEAMS {
            return false;
        }
        if team != TEAM_FLOCK && team != TEAM_SUPER && self.locked[team] && self.team_of(id) != team {
            return false;
        }
        self.team_of[id.0] = team;
        true
    }

    /// May these two characters collide and hook each other?
    pub fn can_collide(&self, a: CharacterId, b: CharacterId) -> bool {
        let (ta, tb) = (self.team_of(a), self.team_of(b));
        ta == tb || ta == TEAM_SUPER || tb == TEAM_SUPER
    }

    pub fn is_locked(&self, team: usize) -> bool {
        self.locked.get(team).copied().unwrap_or(false)
    }

    pub fn set_lock(&mut self, team: usize, locked: bool) {
        if let Some(l) = self.locked.get_mut(team) {
            *l = locked;
        }
    }

    pub fn members(&self, team: usize) -> impl Iterator<Item = CharacterId> + '_ {
        self.team_of
            .iter()
            .enumerate()
            .filter(move |&(_, &t)| t == team)
            .map(|(i, _)| CharacterId(i))
    }

    pub fn count(&self, team: usize) -> usize {
        self.members(team).count()
    }

    /// Real teams share run state; flock and super characters race alone.
    pub fn is_shared(team: usize) -> bool {
        team != TEAM_FLOCK && team != TEAM_SUPER
    }

    pub fn is_finished(&self, team: usize) -> bool {
        self.finished.get(team).copied().unwrap_or(false)
    }

    pub fn set_finished(&mut self, team: usize, finished: bool) {
        if let Some(f) = self.finished.get_mut(team) {
            *f = finished;
        }
    }

    /// Forget a character (disconnect): back to the flock.
    pub fn remove(&mut self, id: CharacterId) {
        if let Some(t) = self.team_of.get_mut(id.0) {
            *t = TEAM_FLOCK;
        }
    }
}
