//! Round state machine
//!
//! The game is either waiting for players or running a round. A round has one
//! drawer (the front of the turn queue) and every other player guessing. It
//! ends when the drawer is gone or too few players are still guessing, at
//! which point correct guessers are paid out by how fast they were.
//!
//! This module only mutates state. Announcing anything to clients is left to
//! the session, which knows who to tell.

use crate::registry::{Player, TurnQueue};
use crate::words::WordPool;
use log::info;
use shared::{PlayerId, Role, MIN_PLAYERS};
use std::collections::VecDeque;

/// Player actions that depend on the current round state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Connect,
    Guess,
    Point,
}

/// Correct guessers of the current round, most recent first
///
/// Index 0 is the slowest correct guesser so far. Paying out `index + 1`
/// points gives the slowest guesser 1 point and the fastest one a point per
/// correct guesser. A player can only enter once per round because a correct
/// guess clears their `guessing` flag.
#[derive(Debug, Default, Clone)]
pub struct GuessLedger {
    order: VecDeque<PlayerId>,
}

impl GuessLedger {
    /// Records a correct guess; the most recent one goes to the front
    pub fn record(&mut self, id: PlayerId) {
        self.order.push_front(id);
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.order.contains(&id)
    }

    /// Points owed to each entry, as `(player, points)`
    pub fn awards(&self) -> impl Iterator<Item = (PlayerId, u32)> + '_ {
        self.order
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index as u32 + 1))
    }

    /// Forgets every entry, at the start and end of each round
    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Round progress for one game
///
/// Tracks whether the game is waiting for players, who guessed correctly and
/// in which order, and which word is being drawn. The players themselves
/// live in the registry and are passed in by the session.
#[derive(Debug)]
pub struct RoundState {
    waiting_for_players: bool,
    guessed_correct: GuessLedger,
    words: WordPool,
    current_word: Option<String>,
}

impl RoundState {
    /// Creates a game that waits for players before its first round
    pub fn new(words: WordPool) -> Self {
        Self {
            waiting_for_players: true,
            guessed_correct: GuessLedger::default(),
            words,
            current_word: None,
        }
    }

    pub fn is_waiting_for_players(&self) -> bool {
        self.waiting_for_players
    }

    /// Switches between waiting for players and running rounds
    ///
    /// The session sets this when a finished round leaves fewer than
    /// [`MIN_PLAYERS`] players; [`RoundState::admit`] clears it again.
    pub fn set_waiting_for_players(&mut self, waiting: bool) {
        self.waiting_for_players = waiting;
    }

    /// Word of the current or most recent round
    pub fn current_word(&self) -> Option<&str> {
        self.current_word.as_deref()
    }

    pub fn guess_ledger(&self) -> &GuessLedger {
        &self.guessed_correct
    }

    /// Brings a freshly registered player into the game
    ///
    /// Returns true when this player completes the minimum and a round should
    /// start now. Joining a running round makes the player a guesser.
    pub fn admit(&mut self, player: &mut Player, player_count: usize) -> bool {
        if self.waiting_for_players && player_count >= MIN_PLAYERS {
            self.waiting_for_players = false;
            return true;
        }

        if !self.waiting_for_players {
            player.guessing = true;
        }

        false
    }

    /// Checks whether `player` (if known) may perform `action` right now
    pub fn is_action_legal(&self, player: Option<&Player>, action: ActionKind) -> bool {
        match (action, player) {
            (ActionKind::Connect, None) => true,
            (ActionKind::Connect, Some(_)) | (_, None) => false,
            _ if self.waiting_for_players => false,
            (ActionKind::Guess, Some(player)) => player.guessing,
            (ActionKind::Point, Some(player)) => player.drawing,
        }
    }

    /// Compares a guess with the current word, ignoring case
    ///
    /// A correct guess stops the player from guessing again this round and
    /// records them in the ledger.
    pub fn guess_word(&mut self, player: &mut Player, guess: &str) -> bool {
        let Some(word) = self.current_word.as_deref() else {
            return false;
        };

        if word.to_lowercase() != guess.to_lowercase() {
            return false;
        }

        player.guessing = false;
        self.guessed_correct.record(player.id);
        true
    }

    /// True if `id` already found the word this round
    pub fn has_guessed_correct(&self, id: PlayerId) -> bool {
        self.guessed_correct.contains(id)
    }

    /// A round is over once nobody is drawing, or when too few players are
    /// left guessing: none with two or fewer players, fewer than two with
    /// more.
    pub fn is_round_finished(&self, players: &TurnQueue) -> bool {
        let guessing = players.iter().filter(|p| p.guessing).count();
        let drawer_present = players.iter().any(|p| p.drawing);

        !drawer_present
            || (players.len() <= 2 && guessing == 0)
            || (players.len() > 2 && guessing < 2)
    }

    /// Pays out the ledger and clears every role
    ///
    /// Ledger entries for players who already left are skipped but still
    /// count towards the positions of everyone else.
    pub fn finish_round(&mut self, players: &mut TurnQueue) {
        for (id, points) in self.guessed_correct.awards() {
            if let Some(player) = players.get_mut(id) {
                player.score += points;
                info!("{} scored {} points", player, points);
            }
        }

        for player in players.iter_mut() {
            player.clear_roles();
        }
        self.guessed_correct.clear();
    }

    /// Starts a round and returns the drawer
    ///
    /// Rotates the turn queue first unless `is_first` is set. Returns `None`
    /// if there is nobody to draw.
    pub fn new_round(&mut self, players: &mut TurnQueue, is_first: bool) -> Option<PlayerId> {
        if players.is_empty() {
            return None;
        }

        for player in players.iter_mut() {
            player.drawing = false;
            player.guessing = true;
        }

        if !is_first {
            players.rotate();
        }

        let drawer = players.front_mut()?;
        drawer.guessing = false;
        drawer.drawing = true;

        self.guessed_correct.clear();
        self.current_word = Some(self.words.draw());

        Some(drawer.id)
    }

    /// The role snapshot reported to `player` in a GAMESTATE message
    pub fn role_of(&self, player: &Player) -> Role {
        if player.guessing {
            Role::Guessing
        } else if player.drawing {
            Role::Drawing {
                word: self.current_word.clone().unwrap_or_default(),
            }
        } else if self.has_guessed_correct(player.id) {
            Role::Correct
        } else {
            Role::Waiting
        }
    }
}
