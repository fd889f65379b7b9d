use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::error::{Error, ErrorCode, Result};
use crate::models::{Direction, Ledger, Tally, VoteRecord};
use crate::validation::{validate_entity_id, validate_owner_id};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Unavailable(String),
}

/// Durable home of the ledger. `save` always replaces the whole stored state.
pub trait Store {
    /// Returns an empty ledger when nothing has been stored yet.
    fn load(&self) -> std::result::Result<Ledger, StoreError>;
    fn save(&self, ledger: &Ledger) -> std::result::Result<(), StoreError>;
}

/// Up/down votes per entity, one direction per voter, persisted on every change.
#[derive(Debug)]
pub struct VoteLedger<S> {
    votes: Ledger,
    store: S,
}

impl<S: Store> VoteLedger<S> {
    pub fn open(store: S) -> std::result::Result<Self, StoreError> {
        let votes = store.load()?;
        debug!(entities = votes.len(), "Loaded vote ledger");
        Ok(Self { votes, store })
    }

    /// Casts `direction` for `voter_id` on `entity_id`.
    ///
    /// A repeat of the voter's current direction is a conflict. The opposite
    /// direction retracts the existing vote instead of flipping it. Returns the
    /// entity id once the change is persisted.
    pub fn set_vote(&mut self, entity_id: &str, direction: Direction, voter_id: &str) -> Result<String> {
        validate_entity_id(entity_id)?;
        validate_owner_id(voter_id)?;

        let current = self.votes.get(entity_id).and_then(|record| record.get(voter_id));
        if current == Some(direction) {
            return Err(Error::conflict("cannot vote twice in the same direction"));
        }

        let previous = self.votes.get(entity_id).cloned();
        let record = self.votes.entry(entity_id.to_string()).or_default();
        match current {
            Some(_) => {
                record.remove(voter_id);
                debug!(entity_id, voter_id, "Retracted vote");
            }
            None => {
                record.insert(voter_id, direction);
                debug!(entity_id, voter_id, direction = direction.as_str(), "Recorded vote");
            }
        }
        if record.is_empty() {
            self.votes.remove(entity_id);
        }

        self.persist(entity_id, previous)?;
        Ok(entity_id.to_string())
    }

    /// Net score of `entity_id` and the direction `voter_id` holds on it.
    pub fn votes_for_entity(&self, entity_id: &str, voter_id: &str) -> Result<Tally> {
        validate_entity_id(entity_id)?;
        validate_owner_id(voter_id)?;

        Ok(self.votes
            .get(entity_id)
            .map(|record| record.tally_for(voter_id))
            .unwrap_or_default())
    }

    /// Drops every vote on `entity_id`. Returns `false` when there was nothing to drop.
    pub fn delete_votes(&mut self, entity_id: &str) -> Result<bool> {
        if !self.votes.contains_key(entity_id) {
            return Ok(false);
        }

        let previous = self.votes.remove(entity_id);
        self.persist(entity_id, previous)?;
        debug!(entity_id, "Deleted votes");
        Ok(true)
    }

    pub fn record(&self, entity_id: &str) -> Option<&VoteRecord> {
        self.votes.get(entity_id)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.votes
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // Write first; only a successful save leaves the in-memory change in place.
    fn persist(&mut self, entity_id: &str, previous: Option<VoteRecord>) -> Result<()> {
        if let Err(e) = self.store.save(&self.votes) {
            match previous {
                Some(record) => { self.votes.insert(entity_id.to_string(), record); }
                None => { self.votes.remove(entity_id); }
            }
            return Err(Error::with_details(ErrorCode::InternalError, "failed to persist votes", e.to_string()));
        }
        Ok(())
    }
}

/// Keeps the "persisted" ledger in memory. Saves can be made to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Arc<Mutex<Ledger>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            saved: Arc::new(Mutex::new(ledger)),
            failing: Arc::default(),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Ledger {
        self.saved.lock().map(|ledger| ledger.clone()).unwrap_or_default()
    }
}

impl Store for MemoryStore {
    fn load(&self) -> std::result::Result<Ledger, StoreError> {
        self.saved
            .lock()
            .map(|ledger| ledger.clone())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn save(&self, ledger: &Ledger) -> std::result::Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is failing".into()));
        }
        let mut saved = self.saved.lock().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        *saved = ledger.clone();
        Ok(())
    }
}
