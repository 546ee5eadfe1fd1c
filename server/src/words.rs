use crate::error::ServerError;
use rand::seq::SliceRandom;
use rand::thread_rng;

pub const DEFAULT_WORDS: [&str; 10] = [
    "apple", "sweden", "war", "cool", "tree", "rain", "angry", "slide", "fast", "ostrich",
];

/// Shuffled supply of words for drawers
///
/// Words are handed out from a shuffled copy of the catalog. When the copy
/// runs dry it is refilled from the full catalog and shuffled again, so no
/// word repeats until every word has been drawn once.
#[derive(Debug, Clone)]
pub struct WordPool {
    catalog: Vec<String>,
    pool: Vec<String>,
}

impl WordPool {
    /// Creates a pool over `catalog`, which must not be empty
    pub fn new(catalog: Vec<String>) -> Result<Self, ServerError> {
        if catalog.is_empty() {
            return Err(ServerError::EmptyWordCatalog);
        }

        let mut pool = Self {
            catalog,
            pool: Vec::new(),
        };
        pool.refill();
        Ok(pool)
    }

    /// Takes the next word, reshuffling the full catalog once every word
    /// has been handed out
    pub fn draw(&mut self) -> String {
        if self.pool.is_empty() {
            self.refill();
        }

        // Refill never leaves the pool empty since the catalog is non-empty
        self.pool.pop().unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.pool.len()
    }

    fn refill(&mut self) {
        self.pool = self.catalog.clone();
        self.pool.shuffle(&mut thread_rng());
    }
}
