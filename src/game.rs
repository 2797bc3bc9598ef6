use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::arena::{Arena, SoloOutcome};
use crate::clock::SimulationClock;
use crate::config::GameConfig;
use crate::protocol::Verdict;
use crate::snake::Direction;
use crate::term::{Command, Frame, KeySource, Surface};

/// How a match left the loop that ran it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEnd {
    /// Solo game over, with the number of cells grown.
    Crashed { score: usize },
    /// A head-to-head verdict, from this side's point of view.
    Decided(Verdict),
    /// The peer went away without a verdict.
    Disconnected,
    /// The local player quit.
    Quit,
}

pub async fn countdown<S: Surface + ?Sized>(surface: &mut S, secs: u64) -> Result<()> {
    for i in (1..=secs).rev() {
        surface.announce(&[&format!("Beginning Match in {}", i)])?;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Ok(())
}

/// Resolves once the player presses a quit key. Meant to race against
/// something slow, like waiting for a peer.
pub async fn quit_pressed<K: KeySource + ?Sized>(keys: &mut K, every: Duration) -> Result<()> {
    loop {
        if keys.poll_command()? == Some(Command::Quit) {
            return Ok(());
        }
        tokio::time::sleep(every).await;
    }
}

pub async fn show_banner<S: Surface + ?Sized>(surface: &mut S, text: &str, hold: Duration) -> Result<()> {
    surface.announce(&[text])?;
    tokio::time::sleep(hold).await;
    Ok(())
}

pub fn draw_arena<S: Surface + ?Sized>(surface: &mut S, arena: &Arena) -> Result<()> {
    let snakes = arena.bodies();
    let frame = Frame { size: arena.size(), snakes: &snakes, food: arena.food() };
    surface.draw(&frame).context("Failed to draw frame")
}

/// Single-player match: one snake, local keys, no network.
pub struct SoloGame<'a> {
    config: &'a GameConfig,
    rng: StdRng,
}

impl<'a> SoloGame<'a> {
    pub fn new(config: &'a GameConfig) -> Self {
        SoloGame { config, rng: StdRng::from_entropy() }
    }

    pub fn with_rng(config: &'a GameConfig, rng: StdRng) -> Self {
        SoloGame { config, rng }
    }

    pub async fn play<T: Surface + KeySource>(&mut self, console: &mut T) -> Result<MatchEnd> {
        self.config.validate()?;
        let Some(size) = console.await_room(self.config.min_grid()).context("Failed to size the field")? else {
            return Ok(MatchEnd::Quit);
        };
        countdown(console, self.config.countdown_secs).await?;

        let mut arena = Arena::solo(size, self.config, &mut self.rng);
        let mut clock = SimulationClock::new(self.config, Instant::now());
        let mut wanted: Option<Direction> = None;
        draw_arena(console, &arena)?;

        info!(?size, "solo match started");

        loop {
            match console.poll_command()? {
                Some(Command::Turn(dir)) => wanted = Some(dir),
                Some(Command::Quit) => return Ok(MatchEnd::Quit),
                Some(Command::Select) | None => {}
            }

            let due = clock.poll(Instant::now());

            if due.tick {
                let snake = arena.snake_mut(0).context("solo arena has no snake")?;
                if let Some(dir) = wanted {
                    if !dir.is_opposite(snake.direction()) {
                        snake.change_direction(dir);
                    }
                }

                if arena.step_solo() == SoloOutcome::Crashed {
                    let score = arena.snakes()[0].len() - self.config.initial_snake_length;
                    info!(score, "solo match over");
                    show_banner(console, "GAME OVER", self.config.banner_duration()).await?;
                    return Ok(MatchEnd::Crashed { score });
                }
            }

            if due.spawn {
                arena.spawn_food(&mut self.rng);
            }

            if due.tick {
                draw_arena(console, &arena)?;
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::fake::FakeConsole;
    use crate::GridSize;

    fn fast_config() -> GameConfig {
        GameConfig {
            tick_interval_ms: 2,
            food_interval_ms: 60_000,
            countdown_secs: 0,
            banner_ms: 0,
            poll_interval_ms: 1,
            ..GameConfig::default()
        }
    }

    #[tokio::test]
    async fn test_quit_ends_solo_match() {
        let config = fast_config();
        let mut console = FakeConsole::new(GridSize::new(10, 20)).with_script(vec![Some(Command::Quit)]);

        let end = SoloGame::with_rng(&config, StdRng::seed_from_u64(1)).play(&mut console).await.unwrap();

        assert_eq!(end, MatchEnd::Quit);
        assert_eq!(console.frames.len(), 1);
        assert_eq!(console.frames[0].snakes[0].len(), 4);
    }

    #[tokio::test]
    async fn test_reversal_is_ignored_and_turns_apply() {
        let config = fast_config();
        // Reverse (ignored), then after a while turn down, then quit.
        let mut script = vec![Some(Command::Turn(Direction::Left))];
        script.extend(std::iter::repeat(None).take(20));
        script.push(Some(Command::Turn(Direction::Down)));
        script.extend(std::iter::repeat(None).take(20));
        script.push(Some(Command::Quit));
        let mut console = FakeConsole::new(GridSize::new(10, 20)).with_script(script);

        let end = SoloGame::with_rng(&config, StdRng::seed_from_u64(1)).play(&mut console).await.unwrap();
        assert_eq!(end, MatchEnd::Quit);

        // Every recorded step moves the head by one cell, never back onto the neck.
        for pair in console.frames.windows(2) {
            let (before, after) = (&pair[0].snakes[0], &pair[1].snakes[0]);
            assert_ne!(after[0], before[1]);
        }
    }

    #[tokio::test]
    async fn test_bad_config_is_an_error_not_a_panic() {
        let mut console = FakeConsole::new(GridSize::new(10, 20));

        let config = GameConfig { initial_snake_length: 0, ..fast_config() };
        let res = SoloGame::with_rng(&config, StdRng::seed_from_u64(1)).play(&mut console).await;
        assert!(res.is_err());

        let config = GameConfig { min_height: 3, min_width: 3, initial_snake_length: 1, ..fast_config() };
        let mut tiny = FakeConsole::new(GridSize::new(3, 3));
        let res = SoloGame::with_rng(&config, StdRng::seed_from_u64(1)).play(&mut tiny).await;
        assert!(res.is_err());
        assert!(tiny.frames.is_empty());
    }

    #[tokio::test]
    async fn test_quit_while_terminal_too_small() {
        let config = fast_config();
        let script = vec![None, Some(Command::Turn(Direction::Up)), Some(Command::Quit)];
        let mut console = FakeConsole::new(GridSize::new(8, 20)).with_script(script);

        let end = SoloGame::with_rng(&config, StdRng::seed_from_u64(1)).play(&mut console).await.unwrap();

        assert_eq!(end, MatchEnd::Quit);
        assert_eq!(console.last_banner(), Some("Enlarge Terminal"));
        assert!(console.frames.is_empty());
    }

    #[tokio::test]
    async fn test_quit_pressed_skips_other_keys() {
        let script = vec![None, Some(Command::Turn(Direction::Up)), Some(Command::Select), Some(Command::Quit)];
        let mut console = FakeConsole::new(GridSize::new(10, 20)).with_script(script);

        quit_pressed(&mut console, Duration::from_millis(1)).await.unwrap();
        assert_eq!(console.poll_command().unwrap(), None);
    }

    #[tokio::test]
    async fn test_countdown_announces_each_second() {
        tokio::time::pause();
        let mut console = FakeConsole::new(GridSize::new(10, 20));
        countdown(&mut console, 3).await.unwrap();

        let lines: Vec<&str> = console.banners.iter().map(|b| b[0].as_str()).collect();
        assert_eq!(lines, vec!["Beginning Match in 3", "Beginning Match in 2", "Beginning Match in 1"]);
    }
}
