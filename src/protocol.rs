//! Server/client exchange for head-to-head matches.
//!
//! Every message is one JSON object on its own line, tagged with its kind:
//!
//! ```text
//! {"kind":"hello","payload":{"height":24,"width":80}}
//! {"kind":"turn","payload":"up"}
//! {"kind":"outcome","payload":"YOU WON"}
//! ```
//!
//! Connect sequence: client `hello` -> server `grid` -> server `food` ->
//! server `snakes`. After that the server pushes `snakes` every tick (and
//! `food` when it changed) until it sends a single `outcome`; the client
//! only ever sends `turn`.

use std::io;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::arena::{Arena, FoodSet};
use crate::snake::Direction;
use crate::{Cell, GridSize};

/// Longest frame either side accepts, newline excluded.
pub const MAX_FRAME_LEN: usize = 8192;

/// End-of-match verdict, worded for whoever receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "TIE GAME")]
    Tie,
    #[serde(rename = "YOU WON")]
    Won,
    #[serde(rename = "YOU LOST")]
    Lost,
}

impl Verdict {
    pub fn banner(&self) -> &'static str {
        match self {
            Verdict::Tie => "TIE GAME",
            Verdict::Won => "YOU WON",
            Verdict::Lost => "YOU LOST",
        }
    }

    pub fn flipped(self) -> Verdict {
        match self {
            Verdict::Tie => Verdict::Tie,
            Verdict::Won => Verdict::Lost,
            Verdict::Lost => Verdict::Won,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Message {
    Hello(GridSize),
    Grid(GridSize),
    Food(FoodSet),
    Snakes(Vec<Vec<Cell>>),
    Turn(Direction),
    Outcome(Verdict),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello(_) => "hello",
            Message::Grid(_) => "grid",
            Message::Food(_) => "food",
            Message::Snakes(_) => "snakes",
            Message::Turn(_) => "turn",
            Message::Outcome(_) => "outcome",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let line = serde_json::to_string(self).map_err(ProtocolError::Malformed)?;
        if line.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::Oversized(line.len()));
        }
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Message, ProtocolError> {
        serde_json::from_str(line).map_err(ProtocolError::Malformed)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed message: {0}")]
    Malformed(serde_json::Error),
    #[error("frame of {0} bytes exceeds the {max} byte limit", max = MAX_FRAME_LEN)]
    Oversized(usize),
    #[error("expected {expected} message, got {got}")]
    Unexpected { expected: &'static str, got: &'static str },
    #[error("peer closed the connection")]
    Closed,
    #[error("grid {got:?} is smaller than the minimum {min:?}")]
    GridTooSmall { got: GridSize, min: GridSize },
}

impl ProtocolError {
    /// Bad input from the peer that can be skipped without ending the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::Malformed(_) | ProtocolError::Oversized(_))
    }

    pub fn is_disconnect(&self) -> bool {
        match self {
            ProtocolError::Closed => true,
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

impl From<LinesCodecError> for ProtocolError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => ProtocolError::Oversized(MAX_FRAME_LEN + 1),
            LinesCodecError::Io(e) => ProtocolError::Io(e),
        }
    }
}

/// A framed, bidirectional message stream over any byte transport.
pub struct Connection<S> {
    reader: FramedRead<ReadHalf<S>, LinesCodec>,
    writer: FramedWrite<WriteHalf<S>, LinesCodec>,
    // A codec error is followed by one `None` before the stream resumes.
    resync: bool,
}

impl<S: AsyncRead + AsyncWrite> Connection<S> {
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Connection {
            reader: FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_FRAME_LEN)),
            writer: FramedWrite::new(write_half, LinesCodec::new()),
            resync: false,
        }
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), ProtocolError> {
        let line = message.encode()?;
        debug!(kind = message.kind(), bytes = line.len(), "send");
        self.writer.send(line).await?;
        Ok(())
    }

    /// Next message, or `None` once the peer has closed its side.
    /// Cancel safe: a dropped call loses no buffered input.
    pub async fn recv(&mut self) -> Result<Option<Message>, ProtocolError> {
        let frame = match self.reader.next().await {
            None if std::mem::take(&mut self.resync) => self.reader.next().await,
            frame => frame,
        };

        match frame {
            None => Ok(None),
            Some(Ok(line)) => Message::decode(&line).map(Some),
            Some(Err(err)) => {
                self.resync = true;
                Err(err.into())
            }
        }
    }

    async fn expect_kind(&mut self, expected: &'static str) -> Result<Message, ProtocolError> {
        match self.recv().await? {
            Some(message) if message.kind() == expected => Ok(message),
            Some(other) => Err(ProtocolError::Unexpected { expected, got: other.kind() }),
            None => Err(ProtocolError::Closed),
        }
    }

    /// Flushes pending frames and shuts down the write side.
    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        SinkExt::<String>::close(&mut self.writer).await?;
        Ok(())
    }
}

/// Server side of the size handshake. Returns the session grid.
pub async fn accept_handshake<S>(
    conn: &mut Connection<S>,
    own: GridSize,
    min: GridSize,
) -> Result<GridSize, ProtocolError>
where
    S: AsyncRead + AsyncWrite,
{
    let requested = match conn.expect_kind("hello").await? {
        Message::Hello(size) => size,
        other => return Err(ProtocolError::Unexpected { expected: "hello", got: other.kind() }),
    };

    let size = own.negotiate(requested);
    if !size.fits(min) {
        return Err(ProtocolError::GridTooSmall { got: size, min });
    }

    conn.send(&Message::Grid(size)).await?;
    Ok(size)
}

/// Client side of the size handshake. Returns the session grid.
pub async fn request_handshake<S>(conn: &mut Connection<S>, own: GridSize) -> Result<GridSize, ProtocolError>
where
    S: AsyncRead + AsyncWrite,
{
    conn.send(&Message::Hello(own)).await?;
    match conn.expect_kind("grid").await? {
        Message::Grid(size) => Ok(size),
        other => Err(ProtocolError::Unexpected { expected: "grid", got: other.kind() }),
    }
}

/// Food first, then bodies. The client renders nothing until it has both.
pub async fn send_initial_state<S>(conn: &mut Connection<S>, arena: &Arena) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite,
{
    conn.send(&Message::Food(arena.food().clone())).await?;
    conn.send(&Message::Snakes(arena.bodies())).await
}

pub async fn receive_initial_state<S>(conn: &mut Connection<S>, size: GridSize) -> Result<Replica, ProtocolError>
where
    S: AsyncRead + AsyncWrite,
{
    let food = match conn.expect_kind("food").await? {
        Message::Food(food) => food,
        other => return Err(ProtocolError::Unexpected { expected: "food", got: other.kind() }),
    };
    let snakes = match conn.expect_kind("snakes").await? {
        Message::Snakes(snakes) => snakes,
        other => return Err(ProtocolError::Unexpected { expected: "snakes", got: other.kind() }),
    };

    Ok(Replica { size, food, snakes })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaUpdate {
    Changed,
    Finished(Verdict),
    Ignored,
}

/// Client-side copy of the match, written only by incoming messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    pub size: GridSize,
    pub food: FoodSet,
    pub snakes: Vec<Vec<Cell>>,
}

impl Replica {
    pub fn apply(&mut self, message: Message) -> ReplicaUpdate {
        match message {
            Message::Food(food) => {
                self.food = food;
                ReplicaUpdate::Changed
            }
            Message::Snakes(snakes) => {
                self.snakes = snakes;
                ReplicaUpdate::Changed
            }
            Message::Outcome(verdict) => ReplicaUpdate::Finished(verdict),
            Message::Hello(_) | Message::Grid(_) | Message::Turn(_) => ReplicaUpdate::Ignored,
        }
    }
}
