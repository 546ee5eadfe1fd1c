//! Heartbeat challenges over a connectionless transport
//!
//! A background timer only raises a flag. The session loop notices the flag
//! between datagrams and runs the sweep itself, so sweeps never interleave
//! with message handling. Each sweep:
//! 1. picks out players who ignored too many challenges,
//! 2. bumps the miss counter of everyone else,
//! 3. issues a fresh random token that clients must echo back.
//!
//! Only a reply carrying the latest token clears a player's counter.

use crate::config::LivenessConfig;
use crate::registry::{Player, TurnQueue};
use log::debug;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use shared::PlayerId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const CHALLENGE_TOKEN_LEN: usize = 12;

/// Sweep requests, the outstanding challenge and the eviction threshold
#[derive(Debug)]
pub struct LivenessMonitor {
    pending: Arc<AtomicBool>,
    outstanding_token: Option<String>,
    max_missed_checks: u32,
}

impl LivenessMonitor {
    /// Creates a monitor with no pending sweep and no challenge issued yet
    ///
    /// Players are evicted by the sweep that finds `max_missed_checks`
    /// unanswered challenges against them.
    pub fn new(max_missed_checks: u32) -> Self {
        Self {
            pending: Arc::new(AtomicBool::new(false)),
            outstanding_token: None,
            max_missed_checks,
        }
    }

    /// Spawns the timer that requests sweeps
    ///
    /// The task runs until the returned handle is aborted.
    pub fn spawn_timer(&self, config: &LivenessConfig) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        let start = Instant::now() + config.first_check;
        let period = config.interval;

        tokio::spawn(async move {
            let mut timer = interval_at(start, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                pending.store(true, Ordering::Release);
            }
        })
    }

    /// Asks for a sweep on the next pass of the session loop
    ///
    /// This is what the timer task does on every tick.
    pub fn request_sweep(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Consumes a pending sweep request, if any
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Counts one more unanswered challenge for every player and returns the
    /// players that already reached the limit. Those are left untouched; the
    /// caller removes them.
    pub fn sweep(&self, players: &mut TurnQueue) -> Vec<PlayerId> {
        let evicted: Vec<PlayerId> = players
            .iter()
            .filter(|p| p.unresponded_checks >= self.max_missed_checks)
            .map(|p| p.id)
            .collect();

        for player in players.iter_mut() {
            if !evicted.contains(&player.id) {
                player.unresponded_checks += 1;
            }
        }

        evicted
    }

    /// Replaces the outstanding challenge with a fresh token and returns it
    pub fn issue_challenge(&mut self) -> String {
        let token = loop {
            let candidate: String = thread_rng()
                .sample_iter(&Alphanumeric)
                .take(CHALLENGE_TOKEN_LEN)
                .map(char::from)
                .collect();

            if self.outstanding_token.as_deref() != Some(candidate.as_str()) {
                break candidate;
            }
        };

        self.outstanding_token = Some(token.clone());
        token
    }

    /// Resets the player's miss counter if `token` answers the latest
    /// challenge. Stale or foreign tokens are ignored.
    pub fn accept_reply(&self, player: &mut Player, token: &str) -> bool {
        match self.outstanding_token.as_deref() {
            Some(expected) if expected == token => {
                player.unresponded_checks = 0;
                true
            }
            _ => {
                debug!("{} answered with a stale check token", player);
                false
            }
        }
    }

    /// The token clients must currently echo
    pub fn outstanding_token(&self) -> Option<&str> {
        self.outstanding_token.as_deref()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn queue_of(count: u32) -> TurnQueue {
        let mut queue = TurnQueue::new();
        for id in 1..=count {
            queue.push(Player::new(id, SocketAddr::from(([127, 0, 0, 1], id as u16))));
        }
        queue
    }

    #[test]
    fn test_pending_flag_is_consumed_once() {
        let monitor = LivenessMonitor::new(4);
        assert!(!monitor.take_pending());

        monitor.request_sweep();
        assert!(monitor.take_pending());
        assert!(!monitor.take_pending());
    }

    #[test]
    fn test_tokens_are_fresh() {
        let mut monitor = LivenessMonitor::new(4);
        assert!(monitor.outstanding_token().is_none());

        let first = monitor.issue_challenge();
        let second = monitor.issue_challenge();

        assert_eq!(first.len(), CHALLENGE_TOKEN_LEN);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
        assert_eq!(monitor.outstanding_token(), Some(second.as_str()));
    }

    #[test]
    fn test_reply_before_any_challenge_is_ignored() {
        let monitor = LivenessMonitor::new(4);
        let mut player = Player::new(1, SocketAddr::from(([127, 0, 0, 1], 1)));
        player.unresponded_checks = 2;

        assert!(!monitor.accept_reply(&mut player, ""));
        assert_eq!(player.unresponded_checks, 2);
    }

    #[test]
    fn test_only_latest_token_resets_counter() {
        let mut monitor = LivenessMonitor::new(4);
        let mut player = Player::new(1, SocketAddr::from(([127, 0, 0, 1], 1)));
        player.unresponded_checks = 3;

        let stale = monitor.issue_challenge();
        let current = monitor.issue_challenge();

        assert!(!monitor.accept_reply(&mut player, &stale));
        assert_eq!(player.unresponded_checks, 3);

        assert!(monitor.accept_reply(&mut player, &current));
        assert_eq!(player.unresponded_checks, 0);
    }

    #[test]
    fn test_silent_player_reaches_limit_then_is_evicted() {
        let monitor = LivenessMonitor::new(4);
        let mut queue = queue_of(2);

        for sweep in 1..=4 {
            assert!(monitor.sweep(&mut queue).is_empty());
            assert_eq!(queue.get(1).unwrap().unresponded_checks, sweep);
        }

        assert_eq!(monitor.sweep(&mut queue), vec![1, 2]);
        // Evicted players are not counted again
        assert_eq!(queue.get(1).unwrap().unresponded_checks, 4);
    }

    #[test]
    fn test_answering_player_is_never_evicted() {
        let mut monitor = LivenessMonitor::new(4);
        let mut queue = queue_of(2);

        for _ in 0..10 {
            let evicted = monitor.sweep(&mut queue);
            assert!(!evicted.contains(&1));
            let token = monitor.issue_challenge();
            monitor.accept_reply(queue.get_mut(1).unwrap(), &token);
        }

        assert_eq!(queue.get(1).unwrap().unresponded_checks, 0);
    }

    #[tokio::test]
    async fn test_timer_raises_flag() {
        let monitor = LivenessMonitor::new(4);
        let config = LivenessConfig {
            first_check: Duration::from_millis(10),
            interval: Duration::from_millis(10),
            max_missed_checks: 4,
        };

        let timer = monitor.spawn_timer(&config);
        tokio::time::sleep(Duration::from_millis(100)).await;
        timer.abort();

        assert!(monitor.take_pending());
    }
}
