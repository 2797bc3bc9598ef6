use std::collections::BTreeSet;

use rand::Rng;

use crate::config::GameConfig;
use crate::snake::{Direction, Snake};
use crate::{Cell, GridSize};

pub type FoodSet = BTreeSet<Cell>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoloOutcome {
    Alive,
    Crashed,
}

/// Result of one head-to-head tick. The host drives snake one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelOutcome {
    Continue,
    Tie,
    FirstLost,
    SecondLost,
}

impl DuelOutcome {
    pub fn is_over(&self) -> bool {
        !matches!(self, DuelOutcome::Continue)
    }
}

/// Uniform pick in `[2, h-2] x [2, w-2]`, blind to what is already there.
pub fn spawn_food<R: Rng + ?Sized>(rng: &mut R, size: GridSize) -> Cell {
    (rng.gen_range(2..=size.height - 2), rng.gen_range(2..=size.width - 2))
}

/// Authoritative match state.
#[derive(Debug, Clone)]
pub struct Arena {
    size: GridSize,
    snakes: Vec<Snake>,
    food: FoodSet,
}

impl Arena {
    fn new(size: GridSize, snakes: Vec<Snake>, food: FoodSet) -> Self {
        Arena { size, snakes, food }
    }

    /// One snake centred on the field heading right, plus one food cell.
    pub fn solo<R: Rng + ?Sized>(size: GridSize, config: &GameConfig, rng: &mut R) -> Self {
        let len = config.initial_snake_length;
        let head = (size.height / 2, (size.width.saturating_sub(len as u16)) / 2);
        let snake = Snake::new(size, head, len, Direction::Right);

        let mut arena = Arena::new(size, vec![snake], FoodSet::new());
        arena.spawn_food(rng);
        arena
    }

    /// Two snakes at a quarter and three quarters of the width, both heading right.
    pub fn duel<R: Rng + ?Sized>(size: GridSize, config: &GameConfig, rng: &mut R) -> Self {
        let len = config.initial_snake_length;
        let span = size.width.saturating_sub(len as u16);
        let row = size.height / 2;
        let snakes = vec![
            Snake::new(size, (row, span / 4), len, Direction::Right),
            Snake::new(size, (row, span * 3 / 4), len, Direction::Right),
        ];

        let mut arena = Arena::new(size, snakes, FoodSet::new());
        arena.spawn_food(rng);
        arena
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn snakes(&self) -> &[Snake] {
        &self.snakes
    }

    pub fn snake_mut(&mut self, index: usize) -> Option<&mut Snake> {
        self.snakes.get_mut(index)
    }

    pub fn food(&self) -> &FoodSet {
        &self.food
    }

    pub fn bodies(&self) -> Vec<Vec<Cell>> {
        self.snakes.iter().map(Snake::cells).collect()
    }

    pub fn spawn_food<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Cell {
        let cell = spawn_food(rng, self.size);
        self.food.insert(cell);
        cell
    }

    /// Single-snake tick: self-collision, then food, then plain movement.
    /// Only the first snake is stepped.
    pub fn step_solo(&mut self) -> SoloOutcome {
        let Some(snake) = self.snakes.first_mut() else {
            return SoloOutcome::Crashed;
        };
        let next = snake.next_move();
        if snake.occupies(&next) {
            return SoloOutcome::Crashed;
        }

        advance(snake, &mut self.food, next);
        SoloOutcome::Alive
    }

    /// Two-snake tick. Both next moves are taken before anything mutates,
    /// and symmetric collisions are ruled a tie before one-sided ones.
    /// An arena without exactly two snakes has nothing to contest: `Tie`.
    pub fn step_duel(&mut self) -> DuelOutcome {
        let [first, second] = &mut self.snakes[..] else {
            return DuelOutcome::Tie;
        };

        let nxt = first.next_move();
        let cnxt = second.next_move();

        if nxt == cnxt || (second.occupies(&nxt) && first.occupies(&cnxt)) {
            return DuelOutcome::Tie;
        }
        // Only the two cases above are ties. Both snakes running into their
        // own bodies on the same tick is still a loss for snake one.
        if first.occupies(&nxt) || second.occupies(&nxt) {
            return DuelOutcome::FirstLost;
        }
        if first.occupies(&cnxt) || second.occupies(&cnxt) {
            return DuelOutcome::SecondLost;
        }

        advance(first, &mut self.food, nxt);
        advance(second, &mut self.food, cnxt);
        DuelOutcome::Continue
    }
}

fn advance(snake: &mut Snake, food: &mut FoodSet, next: Cell) {
    if food.remove(&next) {
        snake.eat();
    } else {
        snake.move_step();
    }
}
