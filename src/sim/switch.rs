/// Switcher registry: one gate per switch group, tracked per team.
///
/// Owned by the world and reset whenever a map is loaded. Group 0 is the
/// ungated group and always reads as open.
///
/// ## Status at read time
///
/// ┌─────────────┬──────────────────┬────────────────┐
/// │ Last write   │ tick < end_tick   │ tick ≥ end_tick │
/// ├─────────────┼──────────────────┼────────────────┤
/// │ Open         │ open              │ open            │
/// │ Close        │ closed            │ closed          │
/// │ TimedOpen    │ open              │ closed          │
/// │ TimedClose   │ closed            │ open            │
/// └─────────────┴──────────────────┴────────────────┘
///
/// Expiry is evaluated on every read; nothing needs to tick the registry.

use crate::domain::entity::MAX_CLIENTS;

/// Team every character starts in.
pub const TEAM_FLOCK: usize = 0;
/// Team of privileged characters; switch tiles never act for it.
pub const TEAM_SUPER: usize = MAX_CLIENTS;
pub const NUM_TEAMS: usize = MAX_CLIENTS + 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SwitchKind {
    #[default]
    Open,
    TimedOpen,
    TimedClose,
    Close,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SwitchEntry {
    pub status: bool,
    pub end_tick: Option<i64>,
    pub kind: SwitchKind,
}

impl Default for SwitchEntry {
    fn default() -> Self {
        SwitchEntry { status: true, end_tick: None, kind: SwitchKind::Open }
    }
}

impl SwitchEntry {
    fn status_at(&self, tick: i64) -> bool {
        match (self.kind, self.end_tick) {
            (SwitchKind::TimedOpen, Some(end)) if tick >= end => false,
            (SwitchKind::TimedClose, Some(end)) if tick >= end => true,
            _ => self.status,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Switchers {
    /// Indexed by group number; slot 0 is never written.
    groups: Vec<[SwitchEntry; NUM_TEAMS]>,
}

impl Switchers {
    /// Registry for groups `0..=max_group`, all open.
    pub fn new(max_group: u8) -> Self {
        Switchers { groups: vec![[SwitchEntry::default(); NUM_TEAMS]; max_group as usize + 1] }
    }

    pub fn reset(&mut self) {
        for group in &mut self.groups {
            *group = [SwitchEntry::default(); NUM_TEAMS];
        }
    }

    /// Is `group` open for `team` at `tick`? Group 0, unknown groups and
    /// out-of-range teams read as open.
    pub fn status(&self, group: u8, team: usize, tick: i64) -> bool {
        if group == 0 {
            return true;
        }
        self.entry(group, team).map_or(true, |e| e.status_at(tick))
    }

    pub fn entry(&self, group: u8, team: usize) -> Option<&SwitchEntry> {
        self.groups.get(group as usize).and_then(|g| g.get(team))
    }

    /// Write a group for one team. Returns false (no-op) for group 0,
    /// for the super team, and for groups the map never declared.
    pub fn set(&mut self, group: u8, team: usize, kind: SwitchKind, end_tick: Option<i64>) -> bool {
        if group == 0 || team == TEAM_SUPER {
            return false;
        }
        let Some(entry) = self.groups.get_mut(group as usize).and_then(|g| g.get_mut(team)) else {
            log::warn!("switch group {group} is not declared by the map");
            return false;
        };
        let status = matches!(kind, SwitchKind::Open | SwitchKind::TimedOpen);
        *entry = SwitchEntry { status, end_tick, kind };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: i64 = 50;

    #[test]
    fn everything_starts_open() {
        let s = Switchers::new(3);
        for team in [TEAM_FLOCK, 5, TEAM_SUPER] {
            for group in 0..=3 {
                assert!(s.status(group, team, 0));
            }
        }
    }

    #[test]
    fn close_is_per_team() {
        let mut s = Switchers::new(2);
        assert!(s.set(1, 3, SwitchKind::Close, None));
        assert!(!s.status(1, 3, 10));
        assert!(s.status(1, 4, 10));
        assert!(s.status(2, 3, 10));
    }

    #[test]
    fn timed_close_reopens_exactly_at_end_tick() {
        let mut s = Switchers::new(1);
        let t = 100;
        let d = 2;
        s.set(1, 1, SwitchKind::TimedClose, Some(t + d * TS));
        for tick in t..t + d * TS {
            assert!(!s.status(1, 1, tick), "tick {tick}");
        }
        assert!(s.status(1, 1, t + d * TS));
        assert!(s.status(1, 1, t + d * TS + 1));
    }

    #[test]
    fn timed_open_closes_at_end_tick() {
        let mut s = Switchers::new(1);
        s.set(1, 2, SwitchKind::Close, None);
        s.set(1, 2, SwitchKind::TimedOpen, Some(60));
        assert!(s.status(1, 2, 59));
        assert!(!s.status(1, 2, 60));
    }

    #[test]
    fn group_zero_and_super_team_are_never_written() {
        let mut s = Switchers::new(1);
        assert!(!s.set(0, 1, SwitchKind::Close, None));
        assert!(!s.set(1, TEAM_SUPER, SwitchKind::Close, None));
        assert!(s.status(0, 1, 0));
        assert!(s.status(1, TEAM_SUPER, 0));
    }

    #[test]
    fn unknown_group_reads_open_and_ignores_writes() {
        let mut s = Switchers::new(1);
        assert!(!s.set(9, 1, SwitchKind::Close, None));
        assert!(s.status(9, 1, 0));
    }

    #[test]
    fn reset_reopens() {
        let mut s = Switchers::new(1);
        s.set(1, 1, SwitchKind::Close, None);
        s.reset();
        assert!(s.status(1, 1, 0));
    }
}
