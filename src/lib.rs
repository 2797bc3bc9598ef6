//! Evolving Snakes: a terminal snake game, solo or head-to-head over TCP.
//!
//! The server owns the only live [`arena::Arena`]; a joining client keeps a
//! [`protocol::Replica`] fed purely by the messages it receives.

use serde::{Deserialize, Serialize};

pub mod arena;
pub mod client;
pub mod clock;
pub mod config;
pub mod game;
pub mod menu;
pub mod protocol;
pub mod server;
pub mod snake;
pub mod term;
pub mod turns;

pub type TermInt = u16;

/// A grid position as `(row, column)`.
pub type Cell = (TermInt, TermInt);

/// Outer size of a playing field, border included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub height: TermInt,
    pub width: TermInt,
}

impl GridSize {
    pub fn new(height: TermInt, width: TermInt) -> Self {
        GridSize { height, width }
    }

    /// Session size shared by two peers: the element-wise minimum.
    pub fn negotiate(self, other: GridSize) -> GridSize {
        GridSize {
            height: self.height.min(other.height),
            width: self.width.min(other.width),
        }
    }

    pub fn fits(&self, min: GridSize) -> bool {
        self.height >= min.height && self.width >= min.width
    }
}
