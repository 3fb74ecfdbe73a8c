//! Deterministic merge order: interleave every session's transactions by
//! `(madeAt, sessionID)`, decrypting private transactions along the way.

use crate::crdt::{ApplyContext, Change};
use covalue_core::ids::{KeyId, SessionId};
use covalue_crypto::KeySecret;
use covalue_journal::{SessionLog, Transaction};

/// Supplies the read key for a `KeyId`, as known by the covalue's owning
/// group at the moment materialization runs. A miss is not an error: the
/// transaction stays in the log and is retried on the next materialization
/// once the key arrives.
pub trait KeyLookup {
    /// Look up the current secret for `key_id`, if this reader holds it.
    fn key_for(&self, key_id: KeyId) -> Option<KeySecret>;
}

/// One change in merge order, annotated with where it came from.
#[derive(Debug, Clone)]
pub struct MergedChange {
    /// The change itself.
    pub change: Change,
    /// Context to pass to a `Content::apply`.
    pub ctx: ApplyContext,
}

/// Interleave `sessions` by `(madeAt, sessionID)` and decrypt private
/// transactions using `keys`. Transactions that fail to decrypt (missing
/// key, or MAC failure on a forged/tampered body) are silently skipped —
/// they remain in the session log for a future retry, they just don't
/// contribute to this materialization pass.
pub fn merge_sessions(
    sessions: &std::collections::HashMap<SessionId, SessionLog>,
    keys: &dyn KeyLookup,
) -> Vec<MergedChange> {
    // Build (madeAt, sessionID, txIndex) ordering keys for every entry
    // across every session, then sort once rather than doing an N-way
    // merge of already-sorted per-session sequences — session logs are
    // typically short enough that clarity wins over the marginal saving.
    //
    // The sessionID tiebreak compares the rendered `<agentID>_session_<nonce>`
    // string, not `SessionId`'s derived `Ord` over raw key bytes — two
    // writers must agree on this order without sharing byte-level key
    // material, so it has to be the same lexicographic string comparison
    // every peer can recompute from the wire-format id alone.
    let mut ordered: Vec<(u64, String, SessionId, u64)> = Vec::new();
    for (session_id, log) in sessions {
        for (tx_index, entry) in log.entries().iter().enumerate() {
            ordered.push((entry.tx.made_at(), session_id.to_string(), *session_id, tx_index as u64));
        }
    }
    ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut out = Vec::new();
    for (made_at, _session_string, session_id, tx_index) in ordered {
        let log = &sessions[&session_id];
        let entry = &log.entries()[tx_index as usize];
        let changes = match &entry.tx {
            Transaction::Trusting { changes, .. } => changes.clone(),
            Transaction::Private {
                ciphertext,
                key_id,
                ..
            } => {
                let Some(key) = keys.key_for(*key_id) else {
                    tracing::debug!(?session_id, tx_index, ?key_id, "no read key yet, deferring transaction");
                    continue;
                };
                let nonce_material = (session_id, tx_index);
                match covalue_crypto::decrypt_for_transaction::<Vec<serde_json::Value>, _>(
                    ciphertext,
                    &key,
                    &nonce_material,
                ) {
                    Ok(Some(changes)) => changes,
                    Ok(None) => {
                        tracing::warn!(?session_id, tx_index, "private transaction failed to decrypt under its key");
                        continue;
                    }
                    Err(error) => {
                        tracing::warn!(?session_id, tx_index, %error, "malformed private transaction");
                        continue;
                    }
                }
            }
        };
        for (change_seq, change) in changes.into_iter().enumerate() {
            let Ok(change) = serde_json::from_value::<Change>(change) else {
                tracing::warn!(?session_id, tx_index, change_seq, "unrecognized change, skipping");
                continue;
            };
            out.push(MergedChange {
                change,
                ctx: ApplyContext {
                    session: session_id,
                    made_at,
                    tx_index,
                    change_seq: change_seq as u32,
                },
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_core::ids::AgentId;
    use covalue_crypto::AgentSecret;
    use covalue_core::random::OsRandom;
    use std::collections::HashMap;

    struct NoKeys;
    impl KeyLookup for NoKeys {
        fn key_for(&self, _key_id: KeyId) -> Option<KeySecret> {
            None
        }
    }

    fn trusting_log(session: SessionId, signer: &AgentSecret, changes: Vec<serde_json::Value>, made_at: u64) -> SessionLog {
        let mut log = SessionLog::new(session);
        let tx = Transaction::Trusting { changes, made_at };
        let (after_hash, signature) = log.sign(tx.clone(), signer).unwrap();
        log.try_add(tx, after_hash, signature).unwrap();
        log
    }

    #[test]
    fn interleaves_two_sessions_by_made_at() {
        let rng = OsRandom;
        let secret_a = AgentSecret::generate(&rng);
        let secret_b = AgentSecret::generate(&rng);
        let session_a = SessionId::new(secret_a.id(), 0);
        let session_b = SessionId::new(secret_b.id(), 0);

        let log_a = trusting_log(
            session_a,
            &secret_a,
            vec![serde_json::json!({"op": "set", "key": "k", "value": "first"})],
            10,
        );
        let log_b = trusting_log(
            session_b,
            &secret_b,
            vec![serde_json::json!({"op": "set", "key": "k", "value": "second"})],
            20,
        );

        let mut sessions = HashMap::new();
        sessions.insert(session_a, log_a);
        sessions.insert(session_b, log_b);

        let merged = merge_sessions(&sessions, &NoKeys);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].ctx.made_at, 10);
        assert_eq!(merged[1].ctx.made_at, 20);
    }

    #[test]
    fn private_transaction_without_key_is_skipped() {
        let rng = OsRandom;
        let secret = AgentSecret::generate(&rng);
        let session = SessionId::new(secret.id(), 0);
        let mut log = SessionLog::new(session);
        let tx = Transaction::Private {
            ciphertext: vec![0u8; 40],
            key_id: KeyId::from_short_hash([1u8; 16]),
            made_at: 1,
        };
        let (after_hash, signature) = log.sign(tx.clone(), &secret).unwrap();
        log.try_add(tx, after_hash, signature).unwrap();

        let mut sessions = HashMap::new();
        sessions.insert(session, log);

        let merged = merge_sessions(&sessions, &NoKeys);
        assert!(merged.is_empty());
    }
}
