//! Shared registry of live matches.

use crate::connection::ConnectionHandle;
use crate::error::{MoveError, SessionError};
use crate::game_match::{Match, MoveOutcome};
use crate::protocol::{MatchSnapshot, Turn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use xo_rules::Symbol;

/// Opaque match identifier.
pub type MatchId = String;

/// A match shared between its participants' workers.
pub type SharedMatch = Arc<Mutex<Match>>;

type IdSource = Arc<dyn Fn() -> MatchId + Send + Sync>;

/// Locks a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate leaves its state consistent before
/// it can panic, so the guarded value is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Maps match ids to live matches.
///
/// Lock discipline: the map lock is only held for lookup, insert and remove.
/// Seating and moves run under the match's own lock, which may take the map
/// lock to evict, never the other way round.
#[derive(Clone)]
pub struct MatchRegistry {
    matches: Arc<Mutex<HashMap<MatchId, SharedMatch>>>,
    id_source: IdSource,
    waiting_timeout: Option<Duration>,
}

impl std::fmt::Debug for MatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchRegistry")
            .field("matches", &self.len())
            .field("waiting_timeout", &self.waiting_timeout)
            .finish_non_exhaustive()
    }
}

impl MatchRegistry {
    /// Creates an empty registry issuing UUID v4 match ids.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating match registry");
        Self {
            matches: Arc::new(Mutex::new(HashMap::new())),
            id_source: Arc::new(|| uuid::Uuid::new_v4().to_string()),
            waiting_timeout: None,
        }
    }

    /// Replaces the id generator.
    pub fn with_id_source(mut self, source: impl Fn() -> MatchId + Send + Sync + 'static) -> Self {
        self.id_source = Arc::new(source);
        self
    }

    /// Sets how long a match may wait for an opponent. `None` never expires.
    pub fn with_waiting_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.waiting_timeout = timeout;
        self
    }

    /// Opens a new match with the caller seated as X.
    ///
    /// The creator is told the id before anyone else can see the match. If
    /// the creator is already unreachable the match is never published.
    #[instrument(skip(self, handle))]
    pub fn create_match(&self, player_name: &str, handle: ConnectionHandle) -> MatchId {
        let mut matches = lock(&self.matches);
        let id = loop {
            let candidate = (self.id_source)();
            if !matches.contains_key(&candidate) {
                break candidate;
            }
            debug!(match_id = %candidate, "Generated id already in use, retrying");
        };

        let mut game = Match::new(id.clone(), player_name.to_string(), handle);
        match game.announce_created() {
            Ok(()) => {
                matches.insert(id.clone(), Arc::new(Mutex::new(game)));
                info!(match_id = %id, live = matches.len(), "Match registered");
            }
            Err(err) => warn!(match_id = %id, error = %err, "Creator gone, match not registered"),
        }
        id
    }

    /// Seats a second player in an existing match.
    ///
    /// The full-check and the seat write happen under the match lock, so of
    /// any number of racing joins at most one succeeds.
    #[instrument(skip(self, handle))]
    pub fn join_match(
        &self,
        match_id: &str,
        player_name: &str,
        handle: ConnectionHandle,
    ) -> Result<Symbol, SessionError> {
        let shared = self.get(match_id).ok_or_else(|| {
            debug!("Join to unknown match");
            SessionError::NotFound
        })?;
        let mut game = lock(&shared);
        let result = game.admit(player_name.to_string(), handle);
        if game.phase().is_terminal() {
            self.evict(match_id, &shared);
        }
        result
    }

    /// Routes a move to its match and evicts the match if the move ended it.
    #[instrument(skip(self))]
    pub fn submit_move(
        &self,
        match_id: &str,
        symbol: Symbol,
        turn: Turn,
    ) -> Result<MoveOutcome, MoveError> {
        let shared = self.get(match_id).ok_or(MoveError::MatchGone)?;
        let mut game = lock(&shared);
        let result = game.submit_move(symbol, turn);
        if game.phase().is_terminal() {
            self.evict(match_id, &shared);
        }
        Ok(result?)
    }

    /// Removes a participant whose connection ended.
    ///
    /// Leaving always ends the match: a waiting match is left empty and a
    /// live one is abandoned with the opponent notified.
    #[instrument(skip(self))]
    pub fn leave_match(&self, match_id: &str, symbol: Symbol) {
        let Some(shared) = self.get(match_id) else {
            debug!("Leave from match already evicted");
            return;
        };
        let mut game = lock(&shared);
        game.leave(symbol);
        if game.participant_count() == 0 || game.phase().is_terminal() {
            self.evict(match_id, &shared);
        }
    }

    /// Sends a snapshot to one participant. Returns false if the match is gone.
    #[instrument(skip(self))]
    pub fn sync(&self, match_id: &str, symbol: Symbol) -> bool {
        let Some(shared) = self.get(match_id) else {
            return false;
        };
        let mut game = lock(&shared);
        game.send_snapshot(symbol);
        if game.phase().is_terminal() {
            self.evict(match_id, &shared);
        }
        true
    }

    /// Evicts waiting matches older than the waiting timeout.
    ///
    /// Returns the evicted ids.
    #[instrument(skip(self))]
    pub fn sweep_expired(&self, now: Instant) -> Vec<MatchId> {
        let Some(timeout) = self.waiting_timeout else {
            return Vec::new();
        };
        let live: Vec<(MatchId, SharedMatch)> = lock(&self.matches)
            .iter()
            .map(|(id, shared)| (id.clone(), Arc::clone(shared)))
            .collect();

        let expired: Vec<MatchId> = live
            .into_iter()
            .filter(|(id, shared)| {
                let mut game = lock(shared);
                let stale = game.expire_if_stale(now, timeout);
                if stale {
                    self.evict(id, shared);
                }
                stale
            })
            .map(|(id, _)| id)
            .collect();
        if !expired.is_empty() {
            info!(count = expired.len(), "Swept expired matches");
        }
        expired
    }

    /// Current state of a match.
    pub fn snapshot(&self, match_id: &str) -> Option<MatchSnapshot> {
        self.get(match_id).map(|shared| lock(&shared).snapshot())
    }

    /// Number of seated participants in a match.
    pub fn participant_count(&self, match_id: &str) -> Option<usize> {
        self.get(match_id)
            .map(|shared| lock(&shared).participant_count())
    }

    /// Returns true if the id names a live match.
    pub fn contains(&self, match_id: &str) -> bool {
        lock(&self.matches).contains_key(match_id)
    }

    /// Number of live matches.
    pub fn len(&self) -> usize {
        lock(&self.matches).len()
    }

    /// Returns true if no match is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, match_id: &str) -> Option<SharedMatch> {
        lock(&self.matches).get(match_id).cloned()
    }

    fn evict(&self, match_id: &str, shared: &SharedMatch) {
        let mut matches = lock(&self.matches);
        if matches
            .get(match_id)
            .is_some_and(|current| Arc::ptr_eq(current, shared))
        {
            matches.remove(match_id);
            info!(match_id, live = matches.len(), "Match evicted");
        }
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Outbox, Outgoing};
    use crate::protocol::{ResultTag, ServerMessage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sequential() -> MatchRegistry {
        let counter = Arc::new(AtomicUsize::new(0));
        MatchRegistry::new()
            .with_id_source(move || format!("G{}", counter.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn connection() -> (ConnectionHandle, Outbox) {
        ConnectionHandle::channel(16)
    }

    #[test]
    fn test_create_assigns_id_and_notifies() {
        let registry = sequential();
        let (handle, mut outbox) = connection();
        let id = registry.create_match("alice", handle);
        assert_eq!(id, "G1");
        assert!(registry.contains("G1"));
        assert_eq!(
            outbox.drain(),
            vec![Outgoing::Message(ServerMessage::MatchCreated {
                match_id: "G1".to_string(),
                symbol: Symbol::X,
            })]
        );
    }

    #[test]
    fn test_colliding_ids_are_redrawn() {
        let ids = Arc::new(Mutex::new(vec!["B", "A", "A"]));
        let registry = MatchRegistry::new()
            .with_id_source(move || lock(&ids).pop().unwrap_or("Z").to_string());
        let (h1, _o1) = connection();
        let (h2, _o2) = connection();
        assert_eq!(registry.create_match("a", h1), "A");
        assert_eq!(registry.create_match("b", h2), "B");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unreachable_creator_is_not_registered() {
        let registry = sequential();
        let (handle, outbox) = connection();
        drop(outbox);
        let id = registry.create_match("ghost", handle);
        assert!(!registry.contains(&id));
    }

    #[test]
    fn test_join_unknown_match() {
        let registry = sequential();
        let (handle, _outbox) = connection();
        assert_eq!(
            registry.join_match("nope", "bob", handle),
            Err(SessionError::NotFound)
        );
    }

    #[test]
    fn test_leave_waiting_match_evicts() {
        let registry = sequential();
        let (handle, _outbox) = connection();
        let id = registry.create_match("alice", handle);
        registry.leave_match(&id, Symbol::X);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_submit_to_evicted_match() {
        let registry = sequential();
        assert_eq!(
            registry.submit_move("G9", Symbol::X, Turn::at(0, 0)),
            Err(MoveError::MatchGone)
        );
    }

    #[test]
    fn test_sweep_expires_only_stale_waiting_matches() {
        let registry = sequential().with_waiting_timeout(Some(Duration::from_secs(60)));
        let (a, mut a_out) = connection();
        let (b, _b_out) = connection();
        let (c, _c_out) = connection();
        let waiting = registry.create_match("alice", a);
        let paired = registry.create_match("bob", b);
        registry.join_match(&paired, "carol", c).unwrap();

        assert!(registry.sweep_expired(Instant::now()).is_empty());
        let later = Instant::now() + Duration::from_secs(120);
        assert_eq!(registry.sweep_expired(later), vec![waiting.clone()]);
        assert!(!registry.contains(&waiting));
        assert!(registry.contains(&paired));
        assert_eq!(a_out.drain().last(), Some(&Outgoing::Close(ResultTag::MatchExpired)));
    }

    #[test]
    fn test_sweep_disabled_without_timeout() {
        let registry = sequential();
        let (a, _a_out) = connection();
        registry.create_match("alice", a);
        let later = Instant::now() + Duration::from_secs(86_400);
        assert!(registry.sweep_expired(later).is_empty());
        assert_eq!(registry.len(), 1);
    }
}
