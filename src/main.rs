use std::fs::File;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use snakes::config::GameConfig;
use snakes::menu::{self, Choice};
use snakes::term::TermManager;

#[derive(Parser)]
#[command(name = "snakes")]
#[command(version, about = "Evolving Snakes: terminal snake, alone or head-to-head over the network")]
struct Cli {
    /// Start straight into a mode; without one the main menu opens
    #[command(subcommand)]
    mode: Option<Mode>,

    /// JSON file overriding the default game settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// TCP port to host on or connect to
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Where to write logs (the terminal belongs to the game)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Mode {
    /// Classic single-player snake
    Solo,
    /// Open a lobby and wait for one opponent
    Host,
    /// Join a lobby by IP address
    Join { addr: IpAddr },
}

impl Mode {
    fn choice(&self) -> Choice {
        match self {
            Mode::Solo => Choice::Solo,
            Mode::Host => Choice::Host,
            Mode::Join { addr } => Choice::Join(*addr),
        }
    }
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// The session error wins; a restore failure is only returned when the
/// session itself ended cleanly.
fn finish(res: Result<()>, restored: io::Result<()>) -> Result<()> {
    match res {
        Ok(()) => restored.context("Failed to restore terminal"),
        Err(err) => {
            error!(error = ?err, "session aborted");
            if let Err(e) = restored {
                error!(error = %e, "failed to restore terminal");
            }
            Err(err)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_file.clone().unwrap_or_else(|| std::env::temp_dir().join("snakes.log"));
    init_logging(&log_path)?;

    let mut config = match &cli.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }

    let mut term = TermManager::new();
    term.setup().context("Failed to set up terminal")?;

    let res = menu::run_session(cli.mode.as_ref().map(Mode::choice), &config, &mut term).await;
    let restored = term.restore();
    info!("session over");

    finish(res, restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_session_error_reported_before_restore_error() {
        let restored = Err(io::Error::new(io::ErrorKind::Other, "tty gone"));
        let err = finish(Err(anyhow!("Failed to connect")), restored).unwrap_err();
        assert_eq!(err.to_string(), "Failed to connect");
    }

    #[test]
    fn test_restore_error_surfaces_after_clean_session() {
        let restored = Err(io::Error::new(io::ErrorKind::Other, "tty gone"));
        let err = finish(Ok(()), restored).unwrap_err();
        assert_eq!(err.to_string(), "Failed to restore terminal");
        assert!(finish(Ok(()), Ok(())).is_ok());
    }

    #[test]
    fn test_cli_modes() {
        let cli = Cli::parse_from(["snakes", "join", "192.168.1.4", "--port", "4000"]);
        assert_eq!(cli.mode.as_ref().map(Mode::choice), Some(Choice::Join(IpAddr::from([192, 168, 1, 4]))));
        assert_eq!(cli.port, Some(4000));

        assert!(Cli::parse_from(["snakes"]).mode.is_none());
        assert!(Cli::try_parse_from(["snakes", "join", "not-an-ip"]).is_err());
    }
}
