//! The seam between the sync manager and wherever covalues actually live.
//!
//! `covalue-sync` never holds a `Covalue` itself — `covalue-node` owns the
//! in-memory table and wires authorization (its `AuthorizationOracle` over
//! loaded groups) and key lookup internally, the same dependency-inversion
//! shape `covalue-content` uses for its own oracle/key-lookup seams.

use covalue_content::covalue::{KnownState, PendingEntry};
use covalue_content::header::Header;
use covalue_core::ids::{CoId, SessionId};
use covalue_core::CovalueError;
use covalue_journal::SessionEntry;

/// Everything the sync manager needs from the local store of covalues.
pub trait CovalueRegistry: Send + Sync {
    /// The current known-state snapshot for `id`, if we have ever loaded it.
    fn known_state(&self, id: CoId) -> Option<KnownState>;

    /// The immutable header for `id`, if we have ever loaded it — sent
    /// alongside `known`/`content` so a peer that has never seen `id` before
    /// can install it via [`Self::ensure_header`].
    fn header_for(&self, id: CoId) -> Option<Header>;

    /// The entries of `session` from `from_index` onward, for replying to a
    /// peer's `load`. Empty if `id` or `session` isn't present.
    fn session_slice(&self, id: CoId, session: SessionId, from_index: u64) -> Vec<SessionEntry>;

    /// Install `header` for `id` if we don't already have one, verifying
    /// `id == hash(header)` first. A no-op if we already have a header for
    /// `id` (whether or not it matches — the header is immutable by
    /// definition, so a mismatch here is a peer bug, not re-installable).
    fn ensure_header(&self, id: CoId, header: Header) -> Result<(), CovalueError>;

    /// Apply newly received entries for one session of `id`, returning how
    /// many were actually new (vs. already-seen duplicates).
    fn try_add_transactions(
        &self,
        id: CoId,
        session: SessionId,
        entries: Vec<PendingEntry>,
    ) -> Result<usize, CovalueError>;

    /// Every covalue id currently loaded, for unsolicited fan-out to
    /// `server`/`peer`-role connections.
    fn loaded_ids(&self) -> Vec<CoId>;
}
