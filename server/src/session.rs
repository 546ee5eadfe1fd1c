//! One game instance and its message routing
//!
//! A [`Session`] owns everything a game needs: the player registry, the round
//! state, the canvas, and the liveness state. It never touches a socket.
//! Handling a datagram or a liveness sweep only queues [`Outgoing`] messages,
//! which the network layer drains and sends after every step. Broadcast
//! recipients are resolved at the moment a message is queued, so a player who
//! leaves mid-step does not receive anything queued after their departure.

use crate::config::ServerConfig;
use crate::error::Result;
use crate::game::{ActionKind, RoundState};
use crate::liveness::LivenessMonitor;
use crate::registry::SessionRegistry;
use crate::words::WordPool;
use log::{debug, info, warn};
use shared::{chunk_points, ClientMessage, PlayerId, Point, ScoreEntry, ServerMessage, MIN_PLAYERS};
use std::collections::HashSet;
use std::net::SocketAddr;

/// A message queued for a single recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub addr: SocketAddr,
    pub message: ServerMessage,
}

/// State of one running game and the messages it wants sent
#[derive(Debug)]
pub struct Session {
    registry: SessionRegistry,
    round: RoundState,
    /// Every stroke of the current round, replayed to late joiners
    drawing_points: HashSet<Point>,
    liveness: LivenessMonitor,
    outbox: Vec<Outgoing>,
}

impl Session {
    /// Creates an empty game from a validated configuration
    ///
    /// Fails if the configuration is invalid or the word catalog is empty.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            registry: SessionRegistry::new(config.max_players),
            round: RoundState::new(WordPool::new(config.words.clone())?),
            drawing_points: HashSet::new(),
            liveness: LivenessMonitor::new(config.liveness.max_missed_checks),
            outbox: Vec::new(),
        })
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    pub fn drawing_points(&self) -> &HashSet<Point> {
        &self.drawing_points
    }

    /// Hands over everything queued since the last call
    pub fn take_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    /// Decodes and handles one datagram. Undecodable input is logged and
    /// dropped without a reply.
    pub fn handle_datagram(&mut self, addr: SocketAddr, data: &[u8]) {
        let message = match ClientMessage::decode(data) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping datagram from {}: {}", addr, e);
                return;
            }
        };

        // POINT and CHECK arrive constantly
        match message {
            ClientMessage::Point(_) | ClientMessage::Check { .. } => {
                debug!("{} from {}", message.kind(), addr)
            }
            _ => info!("{} from {}", message.kind(), addr),
        }

        self.handle_message(addr, message);
    }

    /// Routes a decoded message from `addr`
    ///
    /// Only CONNECT is accepted from unknown senders; anything else from them
    /// is dropped. Illegal actions from known players are answered with their
    /// current game state and the canvas so the client can resynchronize.
    pub fn handle_message(&mut self, addr: SocketAddr, message: ClientMessage) {
        let kind = message.kind();
        let sender = self.registry.find_by_addr(addr).map(|p| p.id);

        match (message, sender) {
            (ClientMessage::Connect, sender) => {
                let player = self.registry.find_by_addr(addr);
                if self.round.is_action_legal(player, ActionKind::Connect) {
                    self.handle_connect(addr);
                } else if let Some(id) = sender {
                    warn!("Illegal CONNECT from Player {}: already connected", id);
                    self.send_game_state(id, true);
                }
            }
            (_, None) => warn!("Dropping {} from {}: not a player", kind, addr),
            (ClientMessage::Guess { text }, Some(id)) => self.handle_guess(id, &text),
            (ClientMessage::Point(point), Some(id)) => self.handle_point(id, point),
            (ClientMessage::Check { token }, Some(id)) => self.handle_check(id, &token),
            (ClientMessage::Disconnect, Some(id)) => self.handle_disconnect(id),
        }
    }

    /// Runs a liveness sweep if the timer asked for one
    pub fn poll_liveness(&mut self) -> bool {
        if !self.liveness.take_pending() {
            return false;
        }

        self.run_liveness_sweep();
        true
    }

    /// Evicts unresponsive players, challenges the rest and ends the round if
    /// the evictions left it unplayable.
    pub fn run_liveness_sweep(&mut self) {
        let evicted = self.liveness.sweep(self.registry.players_mut());
        for id in evicted {
            info!("[CHECK] Player {} failed too many checks, removing", id);
            self.depart(id);
        }

        let token = self.liveness.issue_challenge();
        self.broadcast(ServerMessage::Check { token });

        self.finish_if_over();
    }

    fn handle_connect(&mut self, addr: SocketAddr) {
        if self.registry.is_full() {
            info!("Ignoring CONNECT from {}: game is full", addr);
            return;
        }

        let Some(id) = self.registry.register(addr) else {
            return;
        };

        self.broadcast_except(
            Some(id),
            ServerMessage::chat(format!("Player {} joined", id), false, true),
        );
        self.send(addr, ServerMessage::Connected { id });

        let player_count = self.registry.len();
        let start_round = match self.registry.get_mut(id) {
            Some(player) => self.round.admit(player, player_count),
            None => false,
        };

        if start_round {
            self.start_round(true);
        } else {
            self.send_game_state(id, true);
        }
        self.broadcast_scores();
    }

    fn handle_guess(&mut self, id: PlayerId, text: &str) {
        if !self
            .round
            .is_action_legal(self.registry.get(id), ActionKind::Guess)
        {
            warn!("Illegal GUESS from Player {}: not guessing", id);
            self.send_game_state(id, true);
            return;
        }

        info!("Player {} guessed {:?}", id, text);
        let Some(player) = self.registry.get_mut(id) else {
            return;
        };

        if !self.round.guess_word(player, text) {
            self.broadcast_chat(format!("Player {}: {}", id, text), false, false);
            return;
        }

        self.broadcast_chat(format!("Player {} guessed the word!", id), true, false);
        if self.round.is_round_finished(self.registry.players()) {
            self.end_round();
        } else {
            self.send_game_state(id, false);
        }
    }

    fn handle_point(&mut self, id: PlayerId, point: Point) {
        if !self
            .round
            .is_action_legal(self.registry.get(id), ActionKind::Point)
        {
            warn!("Illegal POINT from Player {}: not drawing", id);
            self.send_game_state(id, true);
            return;
        }

        self.drawing_points.insert(point);
        self.broadcast(ServerMessage::Points(vec![point]));
    }

    fn handle_check(&mut self, id: PlayerId, token: &str) {
        if let Some(player) = self.registry.get_mut(id) {
            self.liveness.accept_reply(player, token);
        }
    }

    fn handle_disconnect(&mut self, id: PlayerId) {
        self.depart(id);
        self.finish_if_over();
    }

    /// Removes a player and tells everyone left
    fn depart(&mut self, id: PlayerId) {
        let Some(player) = self.registry.remove(id) else {
            return;
        };

        self.broadcast_chat(format!("{} disconnected.", player), false, true);
        if player.drawing {
            info!("Drawer {} left", player);
            self.broadcast_chat("Drawer disconnected.", false, true);
        }
        self.broadcast_scores();
    }

    /// Ends the round when a departure left it unplayable
    fn finish_if_over(&mut self) {
        if self.round.is_waiting_for_players()
            || !self.round.is_round_finished(self.registry.players())
        {
            return;
        }

        self.broadcast_chat("Ending round.", false, true);
        self.end_round();
    }

    fn end_round(&mut self) {
        if self.finish_round() {
            self.start_round(false);
        }
    }

    /// Pays out the round. Returns false if too few players remain to start
    /// another one, in which case the game goes back to waiting.
    fn finish_round(&mut self) -> bool {
        self.round.finish_round(self.registry.players_mut());

        let word = self.round.current_word().unwrap_or_default().to_uppercase();
        info!("Round finished. Word: {}", word);
        self.broadcast_chat(format!("Round finished. Word was {}", word), true, true);
        self.broadcast_scores();

        if self.registry.len() < MIN_PLAYERS {
            info!("Waiting for players");
            self.round.set_waiting_for_players(true);
            self.broadcast(ServerMessage::Waiting);
            return false;
        }

        true
    }

    fn start_round(&mut self, is_first: bool) {
        let Some(drawer) = self.round.new_round(self.registry.players_mut(), is_first) else {
            return;
        };
        self.drawing_points.clear();

        let word = self.round.current_word().unwrap_or_default().to_string();
        info!("New round: Player {} is drawing {}", drawer, word);

        if let Some(addr) = self.registry.get(drawer).map(|p| p.addr) {
            self.send(addr, ServerMessage::Drawing { word });
        }

        let guessers: Vec<SocketAddr> = self
            .registry
            .players()
            .iter()
            .filter(|p| p.guessing)
            .map(|p| p.addr)
            .collect();
        for addr in guessers {
            self.send(addr, ServerMessage::Guessing);
        }

        self.broadcast_chat(format!("Player {} is drawing", drawer), false, true);
    }

    /// Sends a player their authoritative role, optionally followed by the
    /// canvas so a late or desynchronized client can redraw it.
    fn send_game_state(&mut self, id: PlayerId, send_canvas: bool) {
        let Some(player) = self.registry.get(id) else {
            return;
        };
        let addr = player.addr;
        let role = self.round.role_of(player);

        self.send(addr, ServerMessage::GameState(role));

        if send_canvas {
            for chunk in chunk_points(self.drawing_points.iter().copied()) {
                self.send(addr, ServerMessage::Points(chunk));
            }
        }
    }

    /// Scoreboard, highest score first; ties keep turn order
    fn broadcast_scores(&mut self) {
        let mut scores: Vec<ScoreEntry> = self
            .registry
            .players()
            .iter()
            .map(|p| ScoreEntry {
                id: p.id,
                score: p.score,
            })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score));

        self.broadcast(ServerMessage::Scores(scores));
    }

    fn broadcast_chat(&mut self, text: impl Into<String>, colored: bool, bold: bool) {
        self.broadcast(ServerMessage::chat(text, colored, bold));
    }

    fn broadcast(&mut self, message: ServerMessage) {
        self.broadcast_except(None, message);
    }

    fn broadcast_except(&mut self, exclude: Option<PlayerId>, message: ServerMessage) {
        for player in self.registry.players().iter() {
            if Some(player.id) == exclude {
                continue;
            }
            self.outbox.push(Outgoing {
                addr: player.addr,
                message: message.clone(),
            });
        }
    }

    fn send(&mut self, addr: SocketAddr, message: ServerMessage) {
        self.outbox.push(Outgoing { addr, message });
    }
}
