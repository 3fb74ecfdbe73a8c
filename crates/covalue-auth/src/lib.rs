//! # Covalue Auth
//!
//! Group/permission semantics layered on top of `covalue-content`: a
//! `group`-ruleset covalue's map content interpreted as role assignments,
//! read-key seals, a previous-key wrap chain, and invites, plus the
//! `GroupWriter` operations (`addMember`, `removeMember`, `createInvite`,
//! `acceptInvite`) and an `AuthorizationOracle` adapter over a registry of
//! loaded groups.

#![forbid(unsafe_code)]

pub mod group;

pub use group::{
    read_key_id_at, resolve_key_secret, roles_at, GroupLookup, GroupOracle, GroupWriter,
};
