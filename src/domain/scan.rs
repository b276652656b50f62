/// Anti-tunneling tile scan.
///
/// Walks the straight segment from the previous to the current position
/// through the tile grid (Amanatides–Woo traversal) and lists every cell it
/// touches, earliest first. A fast entity therefore still "touches" a
/// one-tile strip it flew over inside a single tick.
///
/// ## Rules
///   - prev == cur (same cell)     → exactly that cell
///   - segment through a corner    → both side cells, then the diagonal cell
///   - cells outside the map       → clamped to the border, consecutive
///                                   duplicates dropped
///   - each crossing carries the point where the segment leaves the cell
///     (the current position for the last one)

use super::math::{Vec2, TILE_SIZE};

/// Hard cap on cells per scan; far beyond the longest legal per-tick move.
const MAX_CELLS: usize = 1024;

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Crossing {
    pub index: usize,
    pub exit: Vec2,
}

pub fn map_indices(from: Vec2, to: Vec2, width: usize, height: usize) -> Vec<usize> {
    crossings(from, to, width, height).into_iter().map(|c| c.index).collect()
}

pub fn crossings(from: Vec2, to: Vec2, width: usize, height: usize) -> Vec<Crossing> {
    let mut out: Vec<Crossing> = Vec::new();
    if width == 0 || height == 0 {
        return out;
    }
    let push = |out: &mut Vec<Crossing>, cx: i32, cy: i32, exit: Vec2| {
        let x = cx.clamp(0, width as i32 - 1) as usize;
        let y = cy.clamp(0, height as i32 - 1) as usize;
        let index = y * width + x;
        match out.last_mut() {
            Some(last) if last.index == index => last.exit = exit,
            _ => out.push(Crossing { index, exit }),
        }
    };

    let d = to - from;
    let (mut cx, mut cy) = from.cell();
    let (step_x, mut t_max_x, t_delta_x) = axis_setup(from.x, d.x, cx);
    let (step_y, mut t_max_y, t_delta_y) = axis_setup(from.y, d.y, cy);

    for _ in 0..MAX_CELLS {
        let t_next = t_max_x.min(t_max_y);
        if t_next > 1.0 {
            push(&mut out, cx, cy, to);
            return out;
        }
        let exit = from + d * t_next;
        push(&mut out, cx, cy, exit);
        if t_max_x < t_max_y {
            cx += step_x;
            t_max_x += t_delta_x;
        } else if t_max_y < t_max_x {
            cy += step_y;
            t_max_y += t_delta_y;
        } else {
            // exactly through a corner: the segment touches both side cells
            push(&mut out, cx + step_x, cy, exit);
            push(&mut out, cx, cy + step_y, exit);
            cx += step_x;
            cy += step_y;
            t_max_x += t_delta_x;
            t_max_y += t_delta_y;
        }
    }
    log::debug!("tile scan capped at {MAX_CELLS} cells from {from:?} to {to:?}");
    out
}

/// (step, t of first boundary, t between boundaries) along one axis.
fn axis_setup(origin: f32, delta: f32, cell: i32) -> (i32, f32, f32) {
    if delta > 0.0 {
        let boundary = (cell + 1) as f32 * TILE_SIZE;
        (1, (boundary - origin) / delta, TILE_SIZE / delta)
    } else if delta < 0.0 {
        let boundary = cell as f32 * TILE_SIZE;
        (-1, (boundary - origin) / delta, TILE_SIZE / -delta)
    } else {
        (0, f32::INFINITY, f32::INFINITY)
    }
}
