use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{Cell, GridSize, TermInt};
use Direction::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Up, Down, Left, Right];

    pub fn opposite(self) -> Direction {
        match self {
            Up => Down,
            Down => Up,
            Left => Right,
            Right => Left,
        }
    }

    pub fn is_opposite(self, other: Direction) -> bool {
        self.opposite() == other
    }

    /// Unit step as `(d_row, d_col)`.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Up => (-1, 0),
            Down => (1, 0),
            Left => (0, -1),
            Right => (0, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Snake {
    body: VecDeque<Cell>,
    direction: Direction,
    rows: i32,
    cols: i32,
}

impl Snake {
    /// Lays out `size` cells walking back from `head` against `direction`.
    pub fn new(grid: GridSize, head: Cell, size: usize, direction: Direction) -> Self {
        let rows = grid.height as i32 - 2;
        let cols = grid.width as i32 - 2;
        let (dy, dx) = direction.delta();

        let body = (0..size as i32)
            .map(|i| {
                (
                    wrap(head.0 as i32 - dy * i, rows),
                    wrap(head.1 as i32 - dx * i, cols),
                )
            })
            .collect();

        Snake { body, direction, rows, cols }
    }

    pub fn body(&self) -> &VecDeque<Cell> {
        &self.body
    }

    pub fn head(&self) -> Cell {
        self.body[0]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn occupies(&self, cell: &Cell) -> bool {
        self.body.contains(cell)
    }

    /// Where the head lands after one step. Wraps onto the opposite
    /// interior edge, never onto the border.
    pub fn next_move(&self) -> Cell {
        let (y, x) = self.head();
        let (dy, dx) = self.direction.delta();
        (wrap(y as i32 + dy, self.rows), wrap(x as i32 + dx, self.cols))
    }

    /// Callers filter reversals before getting here.
    pub fn change_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn move_step(&mut self) {
        let next = self.next_move();
        self.body.push_front(next);
        self.body.pop_back();
    }

    pub fn eat(&mut self) {
        let next = self.next_move();
        self.body.push_front(next);
    }

    pub fn cells(&self) -> Vec<Cell> {
        self.body.iter().copied().collect()
    }
}

// Interior coordinates run 1..=span.
fn wrap(v: i32, span: i32) -> TermInt {
    match v.rem_euclid(span) {
        0 => span as TermInt,
        r => r as TermInt,
    }
}
