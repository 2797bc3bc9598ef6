use std::io::{self, stdout, Stdout, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue, style, terminal};

use crate::arena::FoodSet;
use crate::snake::Direction;
use crate::{Cell, GridSize, TermInt};

const SNAKE_BODY_CHAR: char = '*';
const FOOD_CHAR: char = '#';
const TOP_BOTTOM_CHAR: char = '-';
const SIDE_CHAR: char = '|';

/// One full picture of the playing field.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub size: GridSize,
    pub snakes: &'a [Vec<Cell>],
    pub food: &'a FoodSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Turn(Direction),
    Select,
    Quit,
}

/// Where frames and banners end up.
pub trait Surface {
    fn size(&self) -> io::Result<GridSize>;

    /// Redraws the whole field, border included.
    fn draw(&mut self, frame: &Frame<'_>) -> io::Result<()>;

    /// Clears the screen and centres `lines` inside a border.
    fn announce(&mut self, lines: &[&str]) -> io::Result<()>;

    /// Blocks until the surface is at least `min`, prompting as needed.
    /// `None` if the player quit instead.
    fn await_room(&mut self, _min: GridSize) -> io::Result<Option<GridSize>> {
        self.size().map(Some)
    }
}

/// Non-blocking keyboard.
pub trait KeySource {
    /// At most one recognised command per call.
    fn poll_command(&mut self) -> io::Result<Option<Command>>;
}

/// Blocking line entry, for the lobby address.
pub trait Prompt {
    /// `None` if the player backed out.
    fn prompt_line(&mut self, question: &str) -> io::Result<Option<String>>;
}

pub fn command_for(key: &KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Command::Quit);
    }

    match key.code {
        KeyCode::Char('w') | KeyCode::Up => Some(Command::Turn(Direction::Up)),
        KeyCode::Char('a') | KeyCode::Left => Some(Command::Turn(Direction::Left)),
        KeyCode::Char('s') | KeyCode::Down => Some(Command::Turn(Direction::Down)),
        KeyCode::Char('d') | KeyCode::Right => Some(Command::Turn(Direction::Right)),
        KeyCode::Enter => Some(Command::Select),
        KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

fn pressed(event: &Event) -> Option<&KeyEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(key),
        _ => None,
    }
}

pub fn is_quit(event: &Event) -> bool {
    pressed(event).and_then(command_for) == Some(Command::Quit)
}

pub struct TermManager {
    stdout: Stdout,
}

impl TermManager {
    pub fn new() -> Self {
        TermManager { stdout: stdout() }
    }

    pub fn setup(&mut self) -> io::Result<()> {
        execute!(self.stdout, EnterAlternateScreen)?;
        terminal::enable_raw_mode()?;
        execute!(self.stdout, cursor::Hide, cursor::DisableBlinking)
    }

    pub fn restore(&mut self) -> io::Result<()> {
        terminal::disable_raw_mode()?;
        execute!(self.stdout, cursor::Show, cursor::EnableBlinking, LeaveAlternateScreen)
    }

    ///////////////////////////////////////////////////////////////////////////

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.stdout, terminal::Clear(ClearType::All))
    }

    fn draw_borders(&mut self, size: GridSize) -> io::Result<()> {
        let (height, width) = (size.height, size.width);
        if height < 2 || width < 2 {
            return Ok(());
        }

        let edge: String = std::iter::repeat(TOP_BOTTOM_CHAR).take(width as usize).collect();
        queue!(self.stdout, cursor::MoveTo(0, 0), style::Print(&edge))?;
        queue!(self.stdout, cursor::MoveTo(0, height - 1), style::Print(&edge))?;

        for y in 1..height - 1 {
            self.print_at((y, 0), SIDE_CHAR)?;
            self.print_at((y, width - 1), SIDE_CHAR)?;
        }

        Ok(())
    }

    fn print_at(&mut self, (row, col): Cell, ch: char) -> io::Result<()> {
        queue!(self.stdout, cursor::MoveTo(col, row), style::Print(ch))
    }
}

impl Default for TermManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for TermManager {
    fn size(&self) -> io::Result<GridSize> {
        let (cols, rows) = terminal::size()?;
        Ok(GridSize::new(rows, cols))
    }

    fn draw(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        let screen = self.size()?;
        // The field may be wider or taller than this terminal when a peer
        // negotiated it; anything past the edge is skipped.
        let visible = frame.size.negotiate(screen);
        let on_screen = |&(row, col): &Cell| row < screen.height && col < screen.width;

        self.clear()?;
        self.draw_borders(visible)?;

        for cell in frame.food.iter().filter(|c| on_screen(*c)) {
            self.print_at(*cell, FOOD_CHAR)?;
        }
        for snake in frame.snakes {
            for cell in snake.iter().filter(|c| on_screen(*c)) {
                self.print_at(*cell, SNAKE_BODY_CHAR)?;
            }
        }

        self.stdout.flush()
    }

    fn announce(&mut self, lines: &[&str]) -> io::Result<()> {
        let size = self.size()?;
        self.clear()?;
        self.draw_borders(size)?;

        let top = (size.height / 2).saturating_sub(lines.len() as TermInt / 2);
        for (i, line) in lines.iter().enumerate() {
            let left = size.width.saturating_sub(line.len() as TermInt) / 2;
            queue!(self.stdout, cursor::MoveTo(left, top + i as TermInt), style::Print(line))?;
        }

        self.stdout.flush()
    }

    fn await_room(&mut self, min: GridSize) -> io::Result<Option<GridSize>> {
        loop {
            let size = self.size()?;
            if size.fits(min) {
                return Ok(Some(size));
            }

            self.announce(&["Enlarge Terminal", "Esc to go back"])?;
            // Any resize or key press re-checks.
            if is_quit(&event::read()?) {
                return Ok(None);
            }
        }
    }
}

impl KeySource for TermManager {
    fn poll_command(&mut self) -> io::Result<Option<Command>> {
        while event::poll(Duration::ZERO)? {
            if let Some(command) = pressed(&event::read()?).and_then(command_for) {
                return Ok(Some(command));
            }
        }

        Ok(None)
    }
}

impl Prompt for TermManager {
    fn prompt_line(&mut self, question: &str) -> io::Result<Option<String>> {
        let mut line = String::new();
        loop {
            self.announce(&[question, &line])?;

            let event = event::read()?;
            let Some(key) = pressed(&event) else { continue };
            if command_for(key) == Some(Command::Quit) {
                return Ok(None);
            }
            match key.code {
                KeyCode::Enter => return Ok(Some(line)),
                KeyCode::Backspace => {
                    line.pop();
                }
                KeyCode::Char(c) if !c.is_control() => line.push(c),
                _ => {}
            }
        }
    }
}
