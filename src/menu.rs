//! Main menu and the screens between matches.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::client;
use crate::config::GameConfig;
use crate::game::{MatchEnd, SoloGame};
use crate::server;
use crate::snake::Direction;
use crate::term::{Command, KeySource, Prompt, Surface};

const TITLE: &str = "Evolving Snakes";
const ASK_ADDRESS: &str = "Enter Lobby IP Address:";
const ASK_AGAIN: &str = "Please Enter Valid Lobby IP Address:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Solo,
    Host,
    Join(IpAddr),
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Solo,
    Host,
    Join,
    Exit,
}

const ENTRIES: [(&str, Entry); 4] = [
    ("Single Player", Entry::Solo),
    ("Create Lobby", Entry::Host),
    ("Join Lobby", Entry::Join),
    ("Exit", Entry::Exit),
];

#[derive(Debug, Default)]
struct Menu {
    selection: usize,
}

impl Menu {
    fn lines(&self) -> Vec<String> {
        let mut lines = vec![TITLE.to_string(), String::new()];
        for (i, (label, _)) in ENTRIES.iter().enumerate() {
            if i == self.selection {
                lines.push(format!("> {} <", label));
            } else {
                lines.push(label.to_string());
            }
        }
        lines
    }

    fn step(&mut self, dir: Direction) {
        let n = ENTRIES.len();
        self.selection = match dir {
            Direction::Up | Direction::Left => (self.selection + n - 1) % n,
            Direction::Down | Direction::Right => (self.selection + 1) % n,
        };
    }

    fn entry(&self) -> Entry {
        ENTRIES[self.selection % ENTRIES.len()].1
    }
}

async fn next_command<K: KeySource + ?Sized>(keys: &mut K, every: Duration) -> Result<Command> {
    loop {
        if let Some(command) = keys.poll_command()? {
            return Ok(command);
        }
        tokio::time::sleep(every).await;
    }
}

fn show<S: Surface + ?Sized>(surface: &mut S, lines: &[String]) -> Result<()> {
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    surface.announce(&lines)?;
    Ok(())
}

/// Arrow keys move, Enter picks, Esc leaves the game.
pub async fn main_menu<T>(console: &mut T, config: &GameConfig) -> Result<Choice>
where
    T: Surface + KeySource + Prompt,
{
    let mut menu = Menu::default();
    loop {
        show(console, &menu.lines())?;

        match next_command(console, config.poll_interval()).await? {
            Command::Turn(dir) => menu.step(dir),
            Command::Quit => return Ok(Choice::Exit),
            Command::Select => match menu.entry() {
                Entry::Solo => return Ok(Choice::Solo),
                Entry::Host => return Ok(Choice::Host),
                Entry::Join => {
                    if let Some(addr) = ask_address(console)? {
                        return Ok(Choice::Join(addr));
                    }
                }
                Entry::Exit => return Ok(Choice::Exit),
            },
        }
    }
}

/// Asks until the answer parses as an IP address. `None` if the player
/// backed out.
pub fn ask_address<T: Prompt + ?Sized>(console: &mut T) -> Result<Option<IpAddr>> {
    let mut question = ASK_ADDRESS;
    loop {
        let Some(answer) = console.prompt_line(question)? else {
            return Ok(None);
        };
        match answer.trim().parse() {
            Ok(addr) => return Ok(Some(addr)),
            Err(_) => {
                warn!(%answer, "not an IP address");
                question = ASK_AGAIN;
            }
        }
    }
}

fn summary(end: &MatchEnd) -> String {
    match end {
        MatchEnd::Crashed { score } => format!("GAME OVER - Score: {}", score),
        MatchEnd::Decided(verdict) => verdict.banner().to_string(),
        MatchEnd::Disconnected => "Opponent left the match".to_string(),
        MatchEnd::Quit => "Match abandoned".to_string(),
    }
}

/// `true` to play the same mode again, `false` to go back to the menu.
pub async fn play_again<T>(console: &mut T, headline: &str, config: &GameConfig) -> Result<bool>
where
    T: Surface + KeySource + ?Sized,
{
    console.announce(&[headline, "", "Enter to play again", "Esc for the main menu"])?;
    loop {
        match next_command(console, config.poll_interval()).await? {
            Command::Select => return Ok(true),
            Command::Quit => return Ok(false),
            Command::Turn(_) => {}
        }
    }
}

pub async fn play<T: Surface + KeySource>(choice: Choice, config: &GameConfig, console: &mut T) -> Result<MatchEnd> {
    match choice {
        Choice::Solo => SoloGame::new(config).play(console).await,
        Choice::Host => server::host(config, console).await,
        Choice::Join(addr) => client::join(config, addr, console).await,
        Choice::Exit => Ok(MatchEnd::Quit),
    }
}

/// Plays matches until the player exits. `start` skips the menu for the
/// first one.
pub async fn run_session<T>(start: Option<Choice>, config: &GameConfig, console: &mut T) -> Result<()>
where
    T: Surface + KeySource + Prompt,
{
    let mut next = start;
    loop {
        let choice = match next.take() {
            Some(choice) => choice,
            None => main_menu(console, config).await?,
        };
        if choice == Choice::Exit {
            info!("leaving");
            return Ok(());
        }

        info!(?choice, "match starting");
        let headline = match play(choice, config, console).await {
            Ok(MatchEnd::Quit) => continue,
            Ok(end) => {
                info!(?end, "match finished");
                summary(&end)
            }
            // A failed match goes back to the menu; a broken terminal fails
            // again on the next screen and ends the session there.
            Err(err) => {
                error!(error = ?err, "match aborted");
                format!("Match aborted: {}", err)
            }
        };

        if play_again(console, &headline, config).await? {
            next = Some(choice);
        }
    }
}
