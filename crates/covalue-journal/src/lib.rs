//! # Covalue Journal
//!
//! The per-session signed hash chain: `Transaction`, `SessionEntry`,
//! and `SessionLog::{sign, try_add, slice}`. This crate knows nothing about
//! covalues, groups, or peers — it is the smallest unit both the
//! materialization engine (`covalue-content`) and the sync manager
//! (`covalue-sync`) build on.

#![forbid(unsafe_code)]

pub mod log;
pub mod transaction;

pub use log::{AppendOutcome, SessionEntry, SessionLog};
pub use transaction::Transaction;
