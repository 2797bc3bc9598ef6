use std::net::IpAddr;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::game::{countdown, quit_pressed, show_banner, MatchEnd};
use crate::protocol::{receive_initial_state, request_handshake, Connection, Message, Replica, ReplicaUpdate};
use crate::term::{Command, Frame, KeySource, Surface};

/// Connects to a host and plays the match it runs.
pub async fn join<T: Surface + KeySource>(config: &GameConfig, addr: IpAddr, console: &mut T) -> Result<MatchEnd> {
    console.announce(&[&format!("Connecting to {}", addr), "Esc to go back"])?;

    let stream = tokio::select! {
        biased;
        connected = TcpStream::connect((addr, config.port)) => {
            connected.with_context(|| format!("Failed to connect to {}:{}", addr, config.port))?
        }
        quit = quit_pressed(&mut *console, config.poll_interval()) => {
            quit?;
            info!(%addr, "stopped connecting");
            return Ok(MatchEnd::Quit);
        }
    };
    stream.set_nodelay(true)?;
    info!(%addr, port = config.port, "connected to host");

    let mut conn = Connection::new(stream);
    let end = run_match(&mut conn, config, console).await;
    if let Err(e) = conn.close().await {
        debug!(error = %e, "closing connection");
    }
    end
}

fn draw_replica<S: Surface + ?Sized>(surface: &mut S, replica: &Replica) -> Result<()> {
    let frame = Frame { size: replica.size, snakes: &replica.snakes, food: &replica.food };
    surface.draw(&frame).context("Failed to draw frame")
}

/// Mirrors the host's match. Nothing is simulated here: the picture only
/// changes when a message arrives, and every key goes straight to the host.
pub async fn run_match<S, T>(conn: &mut Connection<S>, config: &GameConfig, console: &mut T) -> Result<MatchEnd>
where
    S: AsyncRead + AsyncWrite,
    T: Surface + KeySource,
{
    let Some(own) = console.await_room(config.min_grid())? else {
        return Ok(MatchEnd::Quit);
    };
    let size = request_handshake(conn, own).await.context("Handshake with host failed")?;
    info!(?size, "session grid agreed");

    let mut replica = receive_initial_state(conn, size)
        .await
        .context("Failed to receive initial state")?;

    countdown(console, config.countdown_secs).await?;
    draw_replica(console, &replica)?;

    loop {
        tokio::select! {
            biased;
            inbound = conn.recv() => match inbound {
                Ok(Some(message)) => match replica.apply(message) {
                    ReplicaUpdate::Changed => draw_replica(console, &replica)?,
                    ReplicaUpdate::Finished(verdict) => {
                        info!(?verdict, "match decided");
                        show_banner(console, verdict.banner(), config.banner_duration()).await?;
                        return Ok(MatchEnd::Decided(verdict));
                    }
                    ReplicaUpdate::Ignored => warn!("unexpected message from host"),
                },
                Ok(None) => {
                    info!("host closed the connection");
                    return Ok(MatchEnd::Disconnected);
                }
                Err(e) if e.is_recoverable() => warn!(error = %e, "rejected host message"),
                Err(e) if e.is_disconnect() => {
                    info!(error = %e, "host connection lost");
                    return Ok(MatchEnd::Disconnected);
                }
                Err(e) => return Err(e).context("Failed to read from host"),
            },
            _ = tokio::time::sleep(config.poll_interval()) => {}
        }

        match console.poll_command()? {
            Some(Command::Turn(dir)) => {
                if let Err(e) = conn.send(&Message::Turn(dir)).await {
                    if e.is_disconnect() {
                        info!(error = %e, "host connection lost");
                        return Ok(MatchEnd::Disconnected);
                    }
                    return Err(e).context("Failed to send turn to host");
                }
            }
            Some(Command::Quit) => {
                info!("guest quit");
                return Ok(MatchEnd::Quit);
            }
            Some(Command::Select) | None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::FoodSet;
    use crate::protocol::{accept_handshake, Verdict};
    use crate::server;
    use crate::snake::Direction;
    use crate::term::fake::FakeConsole;
    use crate::GridSize;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    fn fast_config() -> GameConfig {
        GameConfig {
            tick_interval_ms: 5,
            food_interval_ms: 3_600_000,
            countdown_secs: 0,
            banner_ms: 0,
            poll_interval_ms: 1,
            ..GameConfig::default()
        }
    }

    fn food(cells: &[(u16, u16)]) -> FoodSet {
        cells.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_client_renders_replica_and_shows_verdict() {
        let config = fast_config();
        let (server_io, client_io) = duplex(64 * 1024);
        let mut client_conn = Connection::new(client_io);
        let mut console = FakeConsole::new(GridSize::new(15, 25));

        let host = async move {
            let mut conn = Connection::new(server_io);
            let size = accept_handshake(&mut conn, GridSize::new(20, 20), GridSize::new(10, 20)).await.unwrap();
            assert_eq!(size, GridSize::new(15, 20));
            conn.send(&Message::Food(food(&[(3, 3)]))).await.unwrap();
            conn.send(&Message::Snakes(vec![vec![(7, 4)], vec![(7, 12)]])).await.unwrap();
            conn.send(&Message::Snakes(vec![vec![(7, 5)], vec![(7, 13)]])).await.unwrap();
            conn.send(&Message::Food(food(&[(3, 3), (4, 4)]))).await.unwrap();
            conn.send(&Message::Outcome(Verdict::Won)).await.unwrap();
            conn
        };

        let (end, _host_conn) = tokio::join!(run_match(&mut client_conn, &config, &mut console), host);

        assert_eq!(end.unwrap(), MatchEnd::Decided(Verdict::Won));
        assert_eq!(console.last_banner(), Some("YOU WON"));

        let last = console.frames.last().unwrap();
        assert_eq!(last.size, GridSize::new(15, 20));
        assert_eq!(last.snakes, vec![vec![(7, 5)], vec![(7, 13)]]);
        assert_eq!(last.food, food(&[(3, 3), (4, 4)]));
    }

    #[tokio::test]
    async fn test_client_exits_quietly_when_host_hangs_up() {
        let config = fast_config();
        let (server_io, client_io) = duplex(64 * 1024);
        let mut client_conn = Connection::new(client_io);
        let mut console = FakeConsole::new(GridSize::new(20, 20));

        let host = async move {
            let mut conn = Connection::new(server_io);
            accept_handshake(&mut conn, GridSize::new(20, 20), GridSize::new(10, 20)).await.unwrap();
            conn.send(&Message::Food(FoodSet::new())).await.unwrap();
            conn.send(&Message::Snakes(vec![])).await.unwrap();
        };

        let (end, ()) = tokio::join!(run_match(&mut client_conn, &config, &mut console), host);

        assert_eq!(end.unwrap(), MatchEnd::Disconnected);
        assert!(console.banners.is_empty());
    }

    #[tokio::test]
    async fn test_client_forwards_keys_unfiltered() {
        let config = fast_config();
        let (server_io, client_io) = duplex(64 * 1024);
        let mut client_conn = Connection::new(client_io);
        // Left while heading right would be a reversal; the client sends it anyway.
        let script = vec![Some(Command::Turn(Direction::Left)), Some(Command::Turn(Direction::Up))];
        let mut console = FakeConsole::new(GridSize::new(20, 20)).with_script(script);

        let host = async move {
            let mut conn = Connection::new(server_io);
            accept_handshake(&mut conn, GridSize::new(20, 20), GridSize::new(10, 20)).await.unwrap();
            conn.send(&Message::Food(FoodSet::new())).await.unwrap();
            conn.send(&Message::Snakes(vec![])).await.unwrap();

            let first = conn.recv().await.unwrap();
            let second = conn.recv().await.unwrap();
            conn.send(&Message::Outcome(Verdict::Tie)).await.unwrap();
            (first, second, conn)
        };

        let (end, (first, second, _conn)) = tokio::join!(run_match(&mut client_conn, &config, &mut console), host);

        assert_eq!(first, Some(Message::Turn(Direction::Left)));
        assert_eq!(second, Some(Message::Turn(Direction::Up)));
        assert_eq!(end.unwrap(), MatchEnd::Decided(Verdict::Tie));
    }

    #[tokio::test]
    async fn test_full_match_over_loopback_until_guest_quits() {
        let config = fast_config();
        let (server_io, client_io) = duplex(64 * 1024);
        let mut server_conn = Connection::new(server_io);
        let mut client_conn = Connection::new(client_io);
        let mut host_console = FakeConsole::new(GridSize::new(20, 20));
        let mut script: Vec<Option<Command>> = vec![None; 40];
        script.push(Some(Command::Quit));
        let mut guest_console = FakeConsole::new(GridSize::new(15, 25)).with_script(script);
        let mut rng = StdRng::seed_from_u64(11);

        let guest = async {
            let end = run_match(&mut client_conn, &config, &mut guest_console).await;
            // Hanging up is what the host observes.
            drop(client_conn);
            end
        };

        let (host_end, guest_end) = tokio::join!(
            server::run_match(&mut server_conn, &config, &mut host_console, &mut rng),
            guest,
        );

        assert_eq!(guest_end.unwrap(), MatchEnd::Quit);
        assert_eq!(host_end.unwrap(), MatchEnd::Disconnected);

        let seen = guest_console.frames.last().unwrap();
        assert_eq!(seen.size, GridSize::new(15, 20));
        assert_eq!(seen.snakes.len(), 2);
        assert!(host_console.frames.iter().any(|f| f.snakes == seen.snakes));
    }

    #[tokio::test]
    async fn test_join_and_serve_over_tcp() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let config = GameConfig { port: listener.local_addr().unwrap().port(), ..fast_config() };
        let mut host_console = FakeConsole::new(GridSize::new(20, 40));
        let mut script: Vec<Option<Command>> = vec![None; 30];
        script.push(Some(Command::Quit));
        let mut guest_console = FakeConsole::new(GridSize::new(20, 40)).with_script(script);

        let (host_end, guest_end) = tokio::join!(
            server::serve(listener, &config, &mut host_console),
            join(&config, IpAddr::from([127, 0, 0, 1]), &mut guest_console),
        );

        assert_eq!(guest_end.unwrap(), MatchEnd::Quit);
        assert_eq!(host_end.unwrap(), MatchEnd::Disconnected);
        assert_eq!(guest_console.banners[0][0], "Connecting to 127.0.0.1");
        assert!(!guest_console.frames.is_empty());
        assert_eq!(guest_console.frames[0].size, GridSize::new(20, 40));
    }

    #[tokio::test]
    async fn test_guest_can_leave_from_enlarge_prompt() {
        let config = fast_config();
        let (_server_io, client_io) = duplex(1024);
        let mut client_conn = Connection::new(client_io);
        let mut console = FakeConsole::new(GridSize::new(20, 10)).with_script(vec![None, Some(Command::Quit)]);

        let end = run_match(&mut client_conn, &config, &mut console).await.unwrap();
        assert_eq!(end, MatchEnd::Quit);
        assert_eq!(console.last_banner(), Some("Enlarge Terminal"));
    }
}
