/// Map loader for the `.map.txt` text format.
///
/// ## Format
///   ```text
///   # Map Name
///   @front 3,4 freeze
///   @tele 10,2 in 1
///   @tele 20,2 out 1
///   @switch 5,6 timed-close 2 3
///   @speedup 7,8 4 50 90
///   @tune 9,9 1
///   <map rows>
///   ```
///
/// Line 1 (optional): `# Name`. `@` lines place tiles on the non-glyph
/// layers (or game tiles without a glyph) and may appear anywhere; their
/// coordinates are checked once the rows are known. Every other line is a
/// game-layer row. Short rows are padded with air.
///
/// ## Tile legend
///   '.' / ' ' = Air        '#' = Solid            '=' = Solid, unhookable
///   'x' = Death            '~' = Freeze           'o' = Unfreeze
///   'Z' = Deep freeze      'z' = Deep unfreeze    'S' = Start
///   'E' = Finish           '0'-'9' = Checkpoint   'P' = Spawn (air)
///   '>' '<' 'v' '^' = one-way stopper blocking that direction
///   '|' = two-way stopper (horizontal)   '_' = two-way stopper (vertical)
///   '+' = stop-all
///
/// ## Switch kinds
///   open N | close N | timed-open N SECS | timed-close N SECS |
///   freeze N SECS | deep-freeze N | deep-unfreeze N |
///   hit-on WEAPON [N] | hit-off WEAPON [N] | jump COUNT |
///   penalty MIN SEC | bonus MIN SEC | stop-<dir> N | stop-all N

use std::path::Path;

use crate::domain::entity::Weapon;
use crate::domain::math::{Vec2, TILE_SIZE};
use crate::domain::tile::{stopper_from_name, Speedup, SwitchCell, SwitchTile, TeleTile, Tile};
use crate::error::MapError;

use super::map::GameMap;

/// Small course used by the headless runner when no map is configured.
pub const DEMO_MAP: &str = "\
# Demo - Freeze Alley
@speedup 8,6 2 60 0
@switch 12,6 timed-close 1 2
@front 16,6 endless-hook-on
@switch 20,6 stop-all 1
@tele 31,6 in 1
@tele 2,6 out 1
..................................
.#################################
.#...............................#
.#...............................#
.#...............................#
.#...............................#
.#.P.S.....1......~......2....E..#
.#################################
";

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

pub fn load_map(path: &Path) -> Result<GameMap, MapError> {
    let text = std::fs::read_to_string(path)?;
    let map = parse_map(&text)?;
    log::info!(
        "loaded map '{}' ({}x{}, {} spawns) from {}",
        map.name,
        map.width,
        map.height,
        map.spawns.len(),
        path.display()
    );
    Ok(map)
}

pub fn parse_map(text: &str) -> Result<GameMap, MapError> {
    let mut name = String::new();
    let mut rows: Vec<(usize, &str)> = vec![];
    let mut directives: Vec<(usize, &str)> = vec![];

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        if line.starts_with('#') && name.is_empty() && rows.is_empty() && is_name_line(line) {
            name = line[1..].trim().to_string();
        } else if let Some(rest) = line.strip_prefix('@') {
            directives.push((line_no, rest));
        } else {
            rows.push((line_no, line));
        }
    }

    while rows.first().map_or(false, |(_, r)| r.trim().is_empty()) {
        rows.remove(0);
    }
    while rows.last().map_or(false, |(_, r)| r.trim().is_empty()) {
        rows.pop();
    }
    if rows.is_empty() {
        return Err(MapError::Empty);
    }
    if name.is_empty() {
        name = "Unnamed Map".to_string();
    }

    let width = rows.iter().map(|(_, r)| r.chars().count()).max().unwrap_or(0);
    let mut map = GameMap::new(&name, width, rows.len());

    for (y, (line_no, row)) in rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            let i = map.index(x, y);
            if ch == 'P' {
                map.spawns.push(Vec2::new((x as f32 + 0.5) * TILE_SIZE, (y as f32 + 0.5) * TILE_SIZE));
                continue;
            }
            map.game[i] = Tile::from_glyph(ch)
                .ok_or_else(|| MapError::parse(*line_no, format!("unknown tile glyph '{ch}'")))?;
        }
    }

    for (line_no, directive) in directives {
        apply_directive(&mut map, line_no, directive)?;
    }

    Ok(map)
}

// ══════════════════════════════════════════════════════════════
// Directives
// ══════════════════════════════════════════════════════════════

fn apply_directive(map: &mut GameMap, line: usize, directive: &str) -> Result<(), MapError> {
    let mut words = directive.split_whitespace();
    let kind = words.next().ok_or_else(|| MapError::parse(line, "empty directive"))?;
    let coords = words.next().ok_or_else(|| MapError::parse(line, "missing X,Y"))?;
    let (x, y) = parse_coords(line, coords)?;
    if x >= map.width || y >= map.height {
        return Err(MapError::OutOfRange { line, x, y });
    }
    let i = map.index(x, y);
    let args: Vec<&str> = words.collect();

    match kind {
        "game" | "front" => {
            let tile_name = arg(line, &args, 0)?;
            let tile = Tile::from_name(tile_name)
                .ok_or_else(|| MapError::parse(line, format!("unknown tile '{tile_name}'")))?;
            if kind == "front" {
                if tile.is_solid() {
                    return Err(MapError::parse(line, "front layer tiles cannot be solid"));
                }
                map.front[i] = tile;
            } else {
                map.game[i] = tile;
            }
        }
        "tele" => map.tele[i] = Some(parse_tele(line, &args)?),
        "switch" => map.switch[i] = Some(parse_switch(line, &args)?),
        "speedup" => {
            map.speedup[i] = Some(Speedup {
                force: number(line, &args, 0)?,
                max_speed: number(line, &args, 1)?,
                angle: number(line, &args, 2)?,
            });
        }
        "tune" => map.tune[i] = number(line, &args, 0)?,
        other => return Err(MapError::parse(line, format!("unknown directive '@{other}'"))),
    }
    Ok(())
}

fn parse_tele(line: usize, args: &[&str]) -> Result<TeleTile, MapError> {
    let tele = match arg(line, args, 0)? {
        "in" => TeleTile::In(group(line, args, 1)?),
        "evil" => TeleTile::EvilIn(group(line, args, 1)?),
        "out" => TeleTile::Out(group(line, args, 1)?),
        "cp" => TeleTile::Checkpoint(group(line, args, 1)?),
        "cp-out" => TeleTile::CheckpointOut(group(line, args, 1)?),
        "cp-in" => TeleTile::CheckpointIn,
        "cp-evil" => TeleTile::CheckpointEvilIn,
        other => return Err(MapError::parse(line, format!("unknown teleporter kind '{other}'"))),
    };
    Ok(tele)
}

fn parse_switch(line: usize, args: &[&str]) -> Result<SwitchCell, MapError> {
    let kind_name = arg(line, args, 0)?;
    let cell = |group: u8, kind: SwitchTile| -> Result<SwitchCell, MapError> { Ok(SwitchCell { group, kind }) };

    if let Some(stopper) = stopper_from_name(kind_name) {
        return cell(number(line, args, 1)?, SwitchTile::Stopper(stopper));
    }
    match kind_name {
        "open" => cell(group(line, args, 1)?, SwitchTile::Open),
        "close" => cell(group(line, args, 1)?, SwitchTile::Close),
        "timed-open" => cell(group(line, args, 1)?, SwitchTile::TimedOpen { seconds: number(line, args, 2)? }),
        "timed-close" => cell(group(line, args, 1)?, SwitchTile::TimedClose { seconds: number(line, args, 2)? }),
        "freeze" => cell(number(line, args, 1)?, SwitchTile::Freeze { seconds: number(line, args, 2)? }),
        "deep-freeze" => cell(number(line, args, 1)?, SwitchTile::DeepFreeze),
        "deep-unfreeze" => cell(number(line, args, 1)?, SwitchTile::DeepUnfreeze),
        "hit-on" | "hit-off" => {
            let weapon_name = arg(line, args, 1)?;
            let weapon = Weapon::from_name(weapon_name)
                .ok_or_else(|| MapError::parse(line, format!("unknown weapon '{weapon_name}'")))?;
            let group = if args.len() > 2 { number(line, args, 2)? } else { 0 };
            let kind = if kind_name == "hit-on" { SwitchTile::HitOn(weapon) } else { SwitchTile::HitOff(weapon) };
            cell(group, kind)
        }
        "jump" => cell(0, SwitchTile::Jump { count: number(line, args, 1)? }),
        "penalty" => cell(0, SwitchTile::Penalty { minutes: number(line, args, 1)?, seconds: number(line, args, 2)? }),
        "bonus" => cell(0, SwitchTile::Bonus { minutes: number(line, args, 1)?, seconds: number(line, args, 2)? }),
        other => Err(MapError::parse(line, format!("unknown switch kind '{other}'"))),
    }
}

// ── Argument helpers ──

fn parse_coords(line: usize, s: &str) -> Result<(usize, usize), MapError> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| MapError::parse(line, format!("expected X,Y, got '{s}'")))?;
    match (x.parse(), y.parse()) {
        (Ok(x), Ok(y)) => Ok((x, y)),
        _ => Err(MapError::parse(line, format!("bad coordinates '{s}'"))),
    }
}

fn arg<'a>(line: usize, args: &[&'a str], n: usize) -> Result<&'a str, MapError> {
    args.get(n)
        .copied()
        .ok_or_else(|| MapError::parse(line, format!("missing argument {}", n + 1)))
}

fn number<T: std::str::FromStr>(line: usize, args: &[&str], n: usize) -> Result<T, MapError> {
    let s = arg(line, args, n)?;
    s.parse()
        .map_err(|_| MapError::parse(line, format!("'{s}' is not a valid number")))
}

/// Group numbers used by writes and teleporters start at 1.
fn group(line: usize, args: &[&str], n: usize) -> Result<u8, MapError> {
    match number(line, args, n)? {
        0 => Err(MapError::parse(line, "group number must be at least 1")),
        g => Ok(g),
    }
}

/// Distinguish `# Map Name` from a row of solid tiles.
/// A name line starts with `#` and contains at least one letter.
fn is_name_line(line: &str) -> bool {
    line[1..].chars().any(|c| c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::{Rotation, Stopper};

    #[test]
    fn demo_map_parses() {
        let map = parse_map(DEMO_MAP).unwrap();
        assert_eq!(map.name, "Demo - Freeze Alley");
        assert_eq!(map.spawns.len(), 1);
        assert_eq!(map.max_switch_group(), 1);
        assert_eq!(map.tele[map.index(31, 6)], Some(TeleTile::In(1)));
        assert_eq!(map.front[map.index(16, 6)], Tile::EndlessHookOn);
    }

    #[test]
    fn rows_name_and_spawns() {
        let map = parse_map("# Tiny\n.P.\n###\n").unwrap();
        assert_eq!((map.width, map.height), (3, 2));
        assert_eq!(map.spawns, vec![Vec2::new(48.0, 16.0)]);
        assert_eq!(map.game[map.index(1, 0)], Tile::Air);
        assert_eq!(map.game[map.index(1, 1)], Tile::Solid);
    }

    #[test]
    fn solid_first_row_is_not_a_name() {
        let map = parse_map("###\n...\n").unwrap();
        assert_eq!(map.height, 2);
        assert_eq!(map.name, "Unnamed Map");
    }

    #[test]
    fn short_rows_are_padded() {
        let map = parse_map("#####\n#\n").unwrap();
        assert_eq!(map.width, 5);
        assert_eq!(map.game[map.index(4, 1)], Tile::Air);
    }

    #[test]
    fn switch_directives() {
        let map = parse_map(
            "@switch 0,0 timed-close 2 3\n@switch 1,0 hit-off hammer\n@switch 2,0 stop-left 4\n@switch 3,0 penalty 1 30\n....\n",
        )
        .unwrap();
        assert_eq!(map.switch[0], Some(SwitchCell { group: 2, kind: SwitchTile::TimedClose { seconds: 3 } }));
        assert_eq!(map.switch[1], Some(SwitchCell { group: 0, kind: SwitchTile::HitOff(Weapon::Hammer) }));
        assert_eq!(
            map.switch[2],
            Some(SwitchCell { group: 4, kind: SwitchTile::Stopper(Stopper::OneWay(Rotation::R90)) })
        );
        assert_eq!(map.switch[3], Some(SwitchCell { group: 0, kind: SwitchTile::Penalty { minutes: 1, seconds: 30 } }));
        assert_eq!(map.max_switch_group(), 4);
    }

    #[test]
    fn speedup_and_tune() {
        let map = parse_map("@speedup 1,0 255 40 -90\n@tune 0,0 3\n..\n").unwrap();
        assert_eq!(map.speedup[1], Some(Speedup { force: 255, max_speed: 40, angle: -90 }));
        assert_eq!(map.tune[0], 3);
    }

    #[test]
    fn errors_carry_line_numbers() {
        match parse_map("# M\n..\n.Q\n") {
            Err(MapError::Parse { line: 3, .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
        match parse_map("@tele 5,5 in 1\n..\n") {
            Err(MapError::OutOfRange { line: 1, x: 5, y: 5 }) => {}
            other => panic!("unexpected {other:?}"),
        }
        match parse_map("@tele 0,0 in 0\n..\n") {
            Err(MapError::Parse { line: 1, .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(parse_map("# Only a name\n\n"), Err(MapError::Empty)));
        assert!(matches!(parse_map("@front 0,0 solid\n..\n"), Err(MapError::Parse { .. })));
    }
}
