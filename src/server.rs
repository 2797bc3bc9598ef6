use std::time::Instant;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::arena::{Arena, DuelOutcome};
use crate::clock::SimulationClock;
use crate::config::GameConfig;
use crate::game::{countdown, draw_arena, quit_pressed, show_banner, MatchEnd};
use crate::protocol::{accept_handshake, send_initial_state, Connection, Message, ProtocolError, Verdict};
use crate::term::{Command, KeySource, Surface};
use crate::turns::TurnQueue;

const HOST: usize = 0;
const GUEST: usize = 1;

/// Verdict for the host, and the one sent to the guest.
pub fn verdicts(outcome: DuelOutcome) -> Option<(Verdict, Verdict)> {
    let host = match outcome {
        DuelOutcome::Continue => return None,
        DuelOutcome::Tie => Verdict::Tie,
        DuelOutcome::FirstLost => Verdict::Lost,
        DuelOutcome::SecondLost => Verdict::Won,
    };
    Some((host, host.flipped()))
}

/// Listens on the configured port and plays one match against the first
/// client to connect.
pub async fn host<T: Surface + KeySource>(config: &GameConfig, console: &mut T) -> Result<MatchEnd> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to listen on port {}", config.port))?;
    serve(listener, config, console).await
}

/// Waits on `listener` for one opponent, or for the host to give up.
pub async fn serve<T: Surface + KeySource>(
    listener: TcpListener,
    config: &GameConfig,
    console: &mut T,
) -> Result<MatchEnd> {
    info!(addr = ?listener.local_addr().ok(), "waiting for opponent");
    console.announce(&["Waiting for Opponent", "Esc to go back"])?;

    let (stream, peer) = tokio::select! {
        biased;
        accepted = listener.accept() => accepted.context("Failed to accept opponent")?,
        quit = quit_pressed(&mut *console, config.poll_interval()) => {
            quit?;
            info!("stopped waiting for opponent");
            return Ok(MatchEnd::Quit);
        }
    };
    stream.set_nodelay(true)?;
    info!(%peer, "opponent connected");
    drop(listener);

    let mut conn = Connection::new(stream);
    let end = run_match(&mut conn, config, console, &mut StdRng::from_entropy()).await;
    if let Err(e) = conn.close().await {
        debug!(error = %e, "closing connection");
    }
    end
}

/// Authoritative side of a match over an already-open transport.
pub async fn run_match<S, T, R>(
    conn: &mut Connection<S>,
    config: &GameConfig,
    console: &mut T,
    rng: &mut R,
) -> Result<MatchEnd>
where
    S: AsyncRead + AsyncWrite,
    T: Surface + KeySource,
    R: Rng + ?Sized,
{
    config.validate()?;
    let Some(own) = console.await_room(config.min_grid())? else {
        return Ok(MatchEnd::Quit);
    };
    let size = accept_handshake(conn, own, config.min_grid())
        .await
        .context("Handshake with client failed")?;
    info!(?size, "session grid agreed");

    let mut arena = Arena::duel(size, config, rng);
    send_initial_state(conn, &arena).await.context("Failed to send initial state")?;

    countdown(console, config.countdown_secs).await?;
    draw_arena(console, &arena)?;

    let mut host_turns = TurnQueue::new(config.turn_queue_len);
    let mut guest_turns = TurnQueue::new(config.turn_queue_len);
    let mut clock = SimulationClock::new(config, Instant::now());
    let mut food_changed = false;

    loop {
        match console.poll_command()? {
            Some(Command::Turn(dir)) => {
                host_turns.offer(dir, arena.snakes()[HOST].direction());
            }
            Some(Command::Quit) => {
                info!("host quit");
                return Ok(MatchEnd::Quit);
            }
            Some(Command::Select) | None => {}
        }

        tokio::select! {
            biased;
            inbound = conn.recv() => match inbound {
                Ok(Some(Message::Turn(dir))) => {
                    if !guest_turns.offer(dir, arena.snakes()[GUEST].direction()) {
                        debug!(?dir, "guest turn dropped");
                    }
                }
                Ok(Some(other)) => warn!(kind = other.kind(), "unexpected message from client"),
                Ok(None) => {
                    info!("client disconnected");
                    return Ok(MatchEnd::Disconnected);
                }
                Err(e) if e.is_recoverable() => warn!(error = %e, "rejected client message"),
                Err(e) if e.is_disconnect() => {
                    info!(error = %e, "client connection lost");
                    return Ok(MatchEnd::Disconnected);
                }
                Err(e) => return Err(e).context("Failed to read from client"),
            },
            _ = tokio::time::sleep(config.poll_interval()) => {}
        }

        let due = clock.poll(Instant::now());

        if due.tick {
            for (index, turns) in [(HOST, &mut host_turns), (GUEST, &mut guest_turns)] {
                if let (Some(dir), Some(snake)) = (turns.next(), arena.snake_mut(index)) {
                    snake.change_direction(dir);
                }
            }

            let outcome = arena.step_duel();
            if let Some((own, theirs)) = verdicts(outcome) {
                info!(?outcome, "match decided");
                let sent = conn.send(&Message::Outcome(theirs)).await;
                if let Err(e) = sent {
                    warn!(error = %e, "failed to deliver verdict");
                }
                show_banner(console, own.banner(), config.banner_duration()).await?;
                return Ok(MatchEnd::Decided(own));
            }
        }

        if due.spawn {
            let cell = arena.spawn_food(rng);
            debug!(?cell, "food spawned");
            food_changed = true;
        }

        if due.tick {
            if let Err(e) = broadcast(conn, &arena, std::mem::take(&mut food_changed)).await {
                return end_on_send_error(e);
            }
            draw_arena(console, &arena)?;
        }
    }
}

async fn broadcast<S>(conn: &mut Connection<S>, arena: &Arena, food_changed: bool) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite,
{
    conn.send(&Message::Snakes(arena.bodies())).await?;
    if food_changed {
        conn.send(&Message::Food(arena.food().clone())).await?;
    }
    Ok(())
}

/// How a failed tick send ends the match. A frame too big for the wire
/// cannot be delivered, so the session stops as if the client had left.
fn end_on_send_error(err: ProtocolError) -> Result<MatchEnd> {
    match err {
        e if e.is_disconnect() => {
            info!(error = %e, "client connection lost");
            Ok(MatchEnd::Disconnected)
        }
        ProtocolError::Oversized(bytes) => {
            warn!(bytes, "tick too large to send, ending match");
            Ok(MatchEnd::Disconnected)
        }
        e => Err(e).context("Failed to send tick to client"),
    }
}
