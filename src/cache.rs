//! Process-local cache of the most recent search results.
//!
//! Search results are rendered with compact [`ResultId`]s instead of full
//! title data; a later "subscribe" click resolves its id here. Each search
//! replaces the whole cache, so ids from an earlier search stop resolving.
use crate::catalog::TitleSummary;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The id belongs to an older search or was never issued.
    #[error("Results expired, search again")]
    Expired,
    #[error("Malformed result id: {0}")]
    Malformed(String),
}

/// Compact handle to one cached search result: `(generation, slot)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultId {
    generation: u64,
    slot: u32,
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.generation, self.slot)
    }
}

impl FromStr for ResultId {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (generation, slot) = s
            .split_once('.')
            .ok_or_else(|| CacheError::Malformed(s.to_string()))?;
        Ok(Self {
            generation: generation
                .parse()
                .map_err(|_| CacheError::Malformed(s.to_string()))?,
            slot: slot
                .parse()
                .map_err(|_| CacheError::Malformed(s.to_string()))?,
        })
    }
}

struct Generation {
    id: u64,
    entries: Vec<TitleSummary>,
}

/// Single-generation result cache behind one coarse lock.
pub struct ResultCache {
    current: Mutex<Generation>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Generation {
                id: 0,
                entries: Vec::new(),
            }),
        }
    }

    // Contents are disposable, so a poisoned lock is simply taken over.
    fn lock(&self) -> MutexGuard<'_, Generation> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the entire cache with `results` and return their ids in order.
    ///
    /// Every id handed out before this call is invalid once it returns.
    pub fn reset_and_store(&self, results: Vec<TitleSummary>) -> Vec<ResultId> {
        let mut current = self.lock();
        let generation = current.id.wrapping_add(1);
        let ids = (0..results.len())
            .map(|slot| ResultId {
                generation,
                slot: u32::try_from(slot).unwrap_or(u32::MAX),
            })
            .collect();
        *current = Generation {
            id: generation,
            entries: results,
        };
        tracing::debug!(generation, entries = current.entries.len(), "Result cache replaced");
        ids
    }

    /// Resolve an id from the current generation.
    ///
    /// # Errors
    ///
    /// [`CacheError::Expired`] if the id is from an older generation or out of
    /// range.
    pub fn lookup(&self, id: ResultId) -> Result<TitleSummary, CacheError> {
        let current = self.lock();
        if id.generation != current.id {
            return Err(CacheError::Expired);
        }
        current
            .entries
            .get(id.slot as usize)
            .cloned()
            .ok_or(CacheError::Expired)
    }

    /// Number of entries in the current generation.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
