//! # Drawing Game Server Library
//!
//! Authoritative server for a turn-based drawing and guessing game played
//! over UDP. One player draws a secret word, everybody else guesses it from
//! the strokes, and faster correct guesses score more.
//!
//! ## Core Responsibilities
//!
//! ### Session Tracking Without Connections
//! UDP has no connections, so the server rebuilds them: the sender address of
//! every datagram is resolved to a player, identities are assigned on
//! CONNECT, and players are dropped on DISCONNECT or when they stop
//! answering heartbeat challenges.
//!
//! ### Round State Machine
//! The game waits until two players are present, then runs rounds back to
//! back. A round ends when the drawer leaves or too few players are still
//! guessing. Every state-changing event re-checks that condition.
//!
//! ### Liveness
//! A timer periodically requests a sweep. Each sweep evicts players that
//! ignored too many challenges and sends a new random token that clients must
//! echo back.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All datagram handling, liveness sweeps and state mutation happen on one
//! task. The liveness timer only flips an atomic flag that the loop checks
//! between receives, so no locks guard the game state.
//!
//! ### Sockets at the Edge
//! [`session::Session`] is a plain state machine that queues outgoing
//! messages. [`network::Server`] owns the socket, feeds datagrams into the
//! session and sends whatever it queued. Tests drive the session directly.
//!
//! ## Module Organization
//!
//! - `registry`: players, turn order, address lookup, id assignment
//! - `game`: round state, legality rules, guess ledger and scoring
//! - `words`: shuffled word supply
//! - `liveness`: heartbeat flag, challenge tokens, eviction threshold
//! - `session`: message routing and announcements for one game
//! - `network`: UDP receive loop
//! - `config` and `error`: configuration and startup errors
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod liveness;
pub mod network;
pub mod registry;
pub mod session;
pub mod words;
