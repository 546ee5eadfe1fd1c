//! Player session tracking for the connectionless game server
//!
//! UDP gives the server no notion of a connection, so this module is what
//! turns a stream of datagrams back into participants:
//! - Address to player resolution for every incoming datagram
//! - Identity assignment that is never reused within a session
//! - Capacity enforcement for the lobby
//! - Turn order, kept as an explicit rotatable queue
//!
//! The registry does not know about rounds. Role flags live on the player so
//! the round state machine can flip them, but deciding *when* to flip them is
//! the job of [`crate::game`].

use log::info;
use shared::PlayerId;
use std::fmt;
use std::net::SocketAddr;

/// A connected participant
#[derive(Debug, Clone)]
pub struct Player {
    /// Unique identifier assigned by the registry
    pub id: PlayerId,
    /// Remote endpoint; all datagrams from here belong to this player
    pub addr: SocketAddr,
    /// Still trying to find the word this round
    pub guessing: bool,
    /// Drawer of the current round
    pub drawing: bool,
    /// Points accumulated over all finished rounds
    pub score: u32,
    /// Liveness sweeps since the last valid challenge reply
    pub unresponded_checks: u32,
}

impl Player {
    /// Creates a player with no role and no score
    ///
    /// New players neither draw nor guess until the round state machine
    /// admits them.
    pub fn new(id: PlayerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            guessing: false,
            drawing: false,
            score: 0,
            unresponded_checks: 0,
        }
    }

    /// Drops both role flags, as happens to everyone when a round ends
    pub fn clear_roles(&mut self) {
        self.guessing = false;
        self.drawing = false;
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.id)
    }
}

/// Players in turn order
///
/// The front of the queue is the drawer of the current round, or the next
/// drawer when no round is running. Rotating moves the front player to the
/// back so everybody else shifts one step closer to drawing.
#[derive(Debug, Default, Clone)]
pub struct TurnQueue {
    players: Vec<Player>,
}

impl TurnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a player at the back of the turn order
    ///
    /// Newcomers wait behind everyone already present before they draw.
    pub fn push(&mut self, player: Player) {
        self.players.push(player);
    }

    /// Removes a player and keeps the relative order of everyone else
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(index))
    }

    /// Moves the front player to the back
    ///
    /// Called at the start of every round except the first one after a wait,
    /// so the drawing turn passes to the next player in line.
    pub fn rotate(&mut self) {
        if !self.players.is_empty() {
            self.players.rotate_left(1);
        }
    }

    /// Current drawer, or the next one between rounds
    pub fn front(&self) -> Option<&Player> {
        self.players.first()
    }

    pub fn front_mut(&mut self) -> Option<&mut Player> {
        self.players.first_mut()
    }

    /// Looks up a player by identity
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Players in turn order, drawer first
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Maps transport addresses to players and hands out identities
///
/// Lookups are linear. The lobby never holds more than a dozen players, so a
/// scan over the turn queue is cheaper than keeping a second index in sync.
#[derive(Debug)]
pub struct SessionRegistry {
    players: TurnQueue,
    /// Next identity to assign; only ever increases
    next_player_id: PlayerId,
    max_players: usize,
}

impl SessionRegistry {
    /// Creates an empty registry. Player ids start from 1.
    pub fn new(max_players: usize) -> Self {
        Self {
            players: TurnQueue::new(),
            next_player_id: 1,
            max_players,
        }
    }

    /// Registers a new player for `addr`
    ///
    /// Returns `None` when the lobby is full or the address already belongs
    /// to a player.
    pub fn register(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        if self.is_full() || self.find_by_addr(addr).is_some() {
            return None;
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        info!("Player {} connected from {}", id, addr);
        self.players.push(Player::new(id, addr));

        Some(id)
    }

    /// Removes a player from the session
    ///
    /// Returns the removed player so the caller can announce the departure
    /// and check whether the drawer just left. Returns `None` if the player
    /// was already gone.
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(id)?;
        info!("Player {} removed", player.id);
        Some(player)
    }

    /// Resolves the sender of a datagram to a player
    ///
    /// Every incoming datagram goes through this lookup. Anything other than
    /// CONNECT from an unknown address is dropped by the caller.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<&Player> {
        self.players.iter().find(|p| p.addr == addr)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// All players in turn order
    pub fn players(&self) -> &TurnQueue {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut TurnQueue {
        &mut self.players
    }

    /// True once the lobby holds `max_players` players
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_player_creation() {
        let player = Player::new(3, addr(9000));

        assert_eq!(player.id, 3);
        assert_eq!(player.addr, addr(9000));
        assert!(!player.guessing);
        assert!(!player.drawing);
        assert_eq!(player.score, 0);
        assert_eq!(player.unresponded_checks, 0);
        assert_eq!(player.to_string(), "Player 3");
    }

    #[test]
    fn test_register_assigns_increasing_ids() {
        let mut registry = SessionRegistry::new(11);

        assert_eq!(registry.register(addr(1)), Some(1));
        assert_eq!(registry.register(addr(2)), Some(2));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ids_are_not_reused_after_removal() {
        let mut registry = SessionRegistry::new(11);

        let first = registry.register(addr(1)).unwrap();
        let second = registry.register(addr(2)).unwrap();
        registry.remove(second);
        registry.remove(first);

        let third = registry.register(addr(1)).unwrap();
        assert_eq!(third, 3);
    }

    #[test]
    fn test_register_rejects_when_full() {
        let mut registry = SessionRegistry::new(2);

        assert!(registry.register(addr(1)).is_some());
        assert!(registry.register(addr(2)).is_some());
        assert!(registry.is_full());
        assert_eq!(registry.register(addr(3)), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_rejects_known_address() {
        let mut registry = SessionRegistry::new(11);

        registry.register(addr(1));
        assert_eq!(registry.register(addr(1)), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_by_addr() {
        let mut registry = SessionRegistry::new(11);
        let id = registry.register(addr(1)).unwrap();
        registry.register(addr(2));

        assert_eq!(registry.find_by_addr(addr(1)).map(|p| p.id), Some(id));
        assert!(registry.find_by_addr(addr(99)).is_none());
    }

    #[test]
    fn test_remove_unknown_player() {
        let mut registry = SessionRegistry::new(11);
        assert!(registry.remove(42).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_turn_queue_rotation() {
        let mut queue = TurnQueue::new();
        for id in 1..=3 {
            queue.push(Player::new(id, addr(id as u16)));
        }

        queue.rotate();
        let order: Vec<PlayerId> = queue.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert_eq!(queue.front().map(|p| p.id), Some(2));
    }

    #[test]
    fn test_turn_queue_remove_keeps_order() {
        let mut queue = TurnQueue::new();
        for id in 1..=4 {
            queue.push(Player::new(id, addr(id as u16)));
        }

        assert_eq!(queue.remove(2).map(|p| p.id), Some(2));
        let order: Vec<PlayerId> = queue.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![1, 3, 4]);
        assert!(queue.remove(2).is_none());
    }

    #[test]
    fn test_rotate_empty_queue() {
        let mut queue = TurnQueue::new();
        queue.rotate();
        assert!(queue.is_empty());
        assert!(queue.front().is_none());
    }
}
