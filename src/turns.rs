use std::collections::VecDeque;

use crate::snake::Direction;

/// Turns a snake has been asked to make but has not yet applied.
///
/// One turn is drained per tick. A turn is only admitted if it changes
/// course relative to the newest pending turn (or the snake's heading when
/// nothing is pending) without reversing it.
#[derive(Debug, Clone)]
pub struct TurnQueue {
    pending: VecDeque<Direction>,
    capacity: usize,
}

impl TurnQueue {
    pub fn new(capacity: usize) -> Self {
        TurnQueue { pending: VecDeque::with_capacity(capacity), capacity: capacity.max(1) }
    }

    /// Returns whether the turn was queued.
    pub fn offer(&mut self, turn: Direction, heading: Direction) -> bool {
        let reference = self.pending.back().copied().unwrap_or(heading);
        if turn == reference || turn.is_opposite(reference) || self.pending.len() >= self.capacity {
            return false;
        }

        self.pending.push_back(turn);
        true
    }

    pub fn next(&mut self) -> Option<Direction> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::*;

    #[test]
    fn test_rejects_reversal_of_heading() {
        let mut queue = TurnQueue::new(3);
        assert!(!queue.offer(Left, Right));
        assert!(!queue.offer(Right, Right));
        assert!(queue.is_empty());
        assert!(queue.offer(Up, Right));
    }

    #[test]
    fn test_rejects_reversal_of_last_pending() {
        let mut queue = TurnQueue::new(3);
        assert!(queue.offer(Up, Right));
        assert!(!queue.offer(Down, Right));
        assert!(!queue.offer(Up, Right));
        assert!(queue.offer(Left, Right));
        assert_eq!(queue.next(), Some(Up));
        assert_eq!(queue.next(), Some(Left));
        assert_eq!(queue.next(), None);
    }

    #[test]
    fn test_quick_double_turn_never_reverses() {
        // Up then Left while heading Right: a legal U-turn across two ticks.
        let mut queue = TurnQueue::new(3);
        queue.offer(Up, Right);
        queue.offer(Left, Right);

        let mut heading = Right;
        while let Some(turn) = queue.next() {
            assert!(!turn.is_opposite(heading));
            heading = turn;
        }
        assert_eq!(heading, Left);
    }

    #[test]
    fn test_no_adjacent_opposites_for_any_sequence() {
        for &heading in &Direction::ALL {
            for &a in &Direction::ALL {
                for &b in &Direction::ALL {
                    for &c in &Direction::ALL {
                        let mut queue = TurnQueue::new(3);
                        for turn in [a, b, c] {
                            queue.offer(turn, heading);
                        }
                        let mut prev = heading;
                        while let Some(turn) = queue.next() {
                            assert!(!turn.is_opposite(prev));
                            assert_ne!(turn, prev);
                            prev = turn;
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_capacity_bound() {
        let mut queue = TurnQueue::new(2);
        assert!(queue.offer(Up, Right));
        assert!(queue.offer(Left, Right));
        assert!(!queue.offer(Down, Right));
        assert_eq!(queue.len(), 2);
    }
}
