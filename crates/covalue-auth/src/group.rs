//! Group covalue semantics: a `group`-ruleset [`Covalue`] is a map of role
//! entries, read-key entries, a previous-key wrap chain, and open invites.
//! This module folds that map's raw entries into the domain operations a
//! group supports, and writes its own transactions back through the same
//! `try_add_transactions` every other covalue uses.
//!
//! Per-member key seals and invite seals all use one group-level sealing
//! keypair (`GroupWriter::group_identity`), distinct from whichever admin
//! account is attributed as the signer of a given transaction. Its public
//! half is published at the well-known map key `sealer`, so any member can
//! reconstruct the ECDH shared secret without tracking which specific
//! admin ran a past operation.

use covalue_content::covalue::PendingEntry;
use covalue_content::merge::{merge_sessions, KeyLookup};
use covalue_content::{AuthorizationOracle, Covalue};
use covalue_core::ids::{AgentId, CoId, KeyId, SessionId};
use covalue_core::{Clock, CovalueError, Role, SecureRandom};
use covalue_crypto::{AgentSecret, KeySecret, Sealed, WrappedKey};
use covalue_journal::Transaction;
use std::collections::HashMap;

const SEALER_KEY: &str = "sealer";
const READ_KEY_KEY: &str = "readKey";

fn role_key(account: AgentId) -> String {
    format!("{account}")
}

fn key_for_account_key(key_id: KeyId, account: AgentId) -> String {
    format!("{key_id}_for_{account}")
}

fn wrapped_key_key(old: KeyId, new: KeyId) -> String {
    format!("{old}_wrapped_in_{new}")
}

fn invite_key(invite_id: AgentId) -> String {
    format!("invite_{invite_id}")
}

fn to_json(value: impl serde::Serialize) -> Result<serde_json::Value, CovalueError> {
    serde_json::to_value(value).map_err(|e| CovalueError::serialization(e.to_string()))
}

/// Fold `group`'s map entries as of `at`, ignoring anything made afterward.
/// Unlike [`Covalue::get_current_content`] this never reads or writes the
/// covalue's materialization cache, since the cache only ever holds the
/// latest state and a point-in-time view is needed for authorization at a
/// past `madeAt`.
fn entries_at(group: &Covalue, keys: &dyn KeyLookup, at: u64) -> HashMap<String, serde_json::Value> {
    let mut entries = HashMap::new();
    for merged in merge_sessions(group.sessions(), keys) {
        if merged.ctx.made_at > at {
            continue;
        }
        match merged.change {
            covalue_content::crdt::Change::Set { key, value } => {
                entries.insert(key, value);
            }
            covalue_content::crdt::Change::Delete { key } => {
                entries.remove(&key);
            }
            _ => {}
        }
    }
    entries
}

/// Every member's role as of `at`, keyed by account id.
pub fn roles_at(group: &Covalue, keys: &dyn KeyLookup, at: u64) -> HashMap<AgentId, Role> {
    entries_at(group, keys, at)
        .into_iter()
        .filter_map(|(key, value)| {
            let account: AgentId = key.parse().ok()?;
            let role: Role = serde_json::from_value(value).ok()?;
            Some((account, role))
        })
        .collect()
}

/// The read-key id in force at `at`, if the group has ever assigned one.
pub fn read_key_id_at(group: &Covalue, keys: &dyn KeyLookup, at: u64) -> Option<KeyId> {
    let value = entries_at(group, keys, at).remove(READ_KEY_KEY)?;
    serde_json::from_value(value).ok()
}

fn sealer_at(group: &Covalue, keys: &dyn KeyLookup, at: u64) -> Option<AgentId> {
    let value = entries_at(group, keys, at).remove(SEALER_KEY)?;
    serde_json::from_value(value).ok()
}

/// Resolve the read-key secret in force at `at`, for a member holding
/// `holder_secret`'s keypair. Looks up the direct per-account seal of the
/// current key; a member that only ever received a predecessor key relies
/// on [`covalue_content::merge`] retrying once a rotation re-seals the
/// latest key to it (see `remove_member`).
pub fn resolve_key_secret(
    group: &Covalue,
    keys: &dyn KeyLookup,
    holder: &AgentSecret,
    at: u64,
) -> Option<KeySecret> {
    let entries = entries_at(group, keys, at);
    let current_key_id: KeyId = serde_json::from_value(entries.get(READ_KEY_KEY)?.clone()).ok()?;
    let sealer: AgentId = serde_json::from_value(entries.get(SEALER_KEY)?.clone()).ok()?;
    let sealed_value = entries.get(&key_for_account_key(current_key_id, holder.id()))?;
    let sealed: Sealed = serde_json::from_value(sealed_value.clone()).ok()?;
    let nonce_material = (current_key_id, holder.id());
    let bytes: [u8; 32] = covalue_crypto::unseal(&sealed, holder, &sealer, &nonce_material).ok()?;
    Some(KeySecret(bytes))
}

/// A group-covalue writer: bundles the signing admin, the group's sealing
/// keypair, a clock, and randomness, all that's needed to emit new group
/// transactions.
pub struct GroupWriter<'a> {
    /// The admin account attributed as the signer of these operations.
    pub admin: &'a AgentSecret,
    /// The group's sealing keypair, shared by every admin.
    pub group_identity: &'a AgentSecret,
    /// Time source for `madeAt`.
    pub clock: &'a dyn Clock,
    /// Randomness for key/invite generation.
    pub rng: &'a dyn SecureRandom,
}

impl<'a> GroupWriter<'a> {
    fn sign_and_append(
        &self,
        group: &mut Covalue,
        changes: Vec<serde_json::Value>,
        oracle: &dyn AuthorizationOracle,
    ) -> Result<(), CovalueError> {
        let session = SessionId::new(self.admin.id(), 0);
        let made_at = self.clock.now_millis();
        let tx = Transaction::Trusting { changes, made_at };
        // `Covalue` signs through its session logs internally once an entry
        // is handed to `try_add_transactions`; to produce that entry we
        // replay this session's existing tail into a scratch log so the
        // hash chain and signature line up with what `try_add` expects.
        let (after_hash, signature) = {
            let mut scratch = covalue_journal::SessionLog::new(session);
            for entry in group.session_slice(session, 0) {
                scratch.try_add(entry.tx.clone(), entry.after_hash, entry.signature.clone())?;
            }
            scratch.sign(tx.clone(), self.admin)?
        };
        group.try_add_transactions(
            session,
            vec![PendingEntry {
                tx,
                after_hash,
                signature,
            }],
            oracle,
        )?;
        Ok(())
    }

    /// Add `account` to the group at `role`, sealing the current read-key
    /// to its sealer public key.
    pub fn add_member(
        &self,
        group: &mut Covalue,
        keys: &dyn KeyLookup,
        oracle: &dyn AuthorizationOracle,
        account: AgentId,
        role: Role,
    ) -> Result<(), CovalueError> {
        let now = self.clock.now_millis();
        let mut changes = vec![
            serde_json::json!({"op": "set", "key": SEALER_KEY, "value": to_json(self.group_identity.id())?}),
            serde_json::json!({"op": "set", "key": role_key(account), "value": to_json(role)?}),
        ];
        if let Some(key_id) = read_key_id_at(group, keys, now) {
            if let Some(key_secret) = resolve_key_secret(group, keys, self.group_identity, now) {
                let nonce_material = (key_id, account);
                let sealed = covalue_crypto::seal(&key_secret.0, self.group_identity, &account, &nonce_material)?;
                changes.push(serde_json::json!({
                    "op": "set",
                    "key": key_for_account_key(key_id, account),
                    "value": to_json(sealed)?,
                }));
            }
        }
        self.sign_and_append(group, changes, oracle)
    }

    /// Revoke `account`'s membership, rotate the read-key, wrap the old key
    /// under the new one, and re-seal the new key to every remaining
    /// non-revoked member.
    pub fn remove_member(
        &self,
        group: &mut Covalue,
        keys: &dyn KeyLookup,
        oracle: &dyn AuthorizationOracle,
        account: AgentId,
    ) -> Result<KeySecret, CovalueError> {
        let now = self.clock.now_millis();
        let mut changes = vec![
            serde_json::json!({"op": "set", "key": SEALER_KEY, "value": to_json(self.group_identity.id())?}),
            serde_json::json!({"op": "set", "key": role_key(account), "value": to_json(Role::Revoked)?}),
        ];

        let new_key = KeySecret::generate(self.rng);
        let new_key_id = new_key.id();
        changes.push(serde_json::json!({"op": "set", "key": READ_KEY_KEY, "value": to_json(new_key_id)?}));

        let old_key_id = read_key_id_at(group, keys, now);
        let old_key = old_key_id.and_then(|_| resolve_key_secret(group, keys, self.group_identity, now));
        if let (Some(old_key_id), Some(old_key)) = (old_key_id, old_key) {
            let wrapped = covalue_crypto::encrypt_key_secret(&old_key, &new_key)?;
            changes.push(serde_json::json!({
                "op": "set",
                "key": wrapped_key_key(old_key_id, new_key_id),
                "value": to_json(wrapped)?,
            }));
        }

        for (member, role) in roles_at(group, keys, now) {
            if member == account || !role.at_least(Role::Reader) {
                continue;
            }
            let nonce_material = (new_key_id, member);
            let sealed = covalue_crypto::seal(&new_key.0, self.group_identity, &member, &nonce_material)?;
            changes.push(serde_json::json!({
                "op": "set",
                "key": key_for_account_key(new_key_id, member),
                "value": to_json(sealed)?,
            }));
        }

        self.sign_and_append(group, changes, oracle)?;
        Ok(new_key)
    }

    /// Mint an invite usable once out-of-band: an ephemeral keypair whose
    /// id names the invite, sealing `role` to itself so `accept_invite` can
    /// recover it by presenting the same secret.
    pub fn create_invite(
        &self,
        group: &mut Covalue,
        oracle: &dyn AuthorizationOracle,
        role: Role,
    ) -> Result<AgentSecret, CovalueError> {
        let invite_secret = AgentSecret::generate(self.rng);
        let invite_id = invite_secret.id();
        let sealed = covalue_crypto::seal(&role, &invite_secret, &invite_id, &invite_id)?;
        let changes = vec![serde_json::json!({
            "op": "set",
            "key": invite_key(invite_id),
            "value": to_json(sealed)?,
        })];
        self.sign_and_append(group, changes, oracle)?;
        Ok(invite_secret)
    }

    /// Redeem an invite: unseal the role it encodes and add the caller at
    /// that role. The same invite secret can only add one caller, since a
    /// real deployment removes the `invite_*` entry on first use; this
    /// engine leaves that removal to the caller via a follow-up `Delete`
    /// change, to keep the single-responsibility split between "resolve an
    /// invite" and "consume it" explicit.
    pub fn accept_invite(
        &self,
        group: &mut Covalue,
        keys: &dyn KeyLookup,
        oracle: &dyn AuthorizationOracle,
        invite_secret: &AgentSecret,
        caller: AgentId,
    ) -> Result<Role, CovalueError> {
        let now = self.clock.now_millis();
        let invite_id = invite_secret.id();
        let entries = entries_at(group, keys, now);
        let sealed_value = entries
            .get(&invite_key(invite_id))
            .ok_or_else(|| CovalueError::invalid("invite not found or already consumed"))?;
        let sealed: Sealed =
            serde_json::from_value(sealed_value.clone()).map_err(|e| CovalueError::serialization(e.to_string()))?;
        let role: Role = covalue_crypto::unseal(&sealed, invite_secret, &invite_id, &invite_id)?;
        self.add_member(group, keys, oracle, caller, role)?;
        Ok(role)
    }
}

/// Answers group-role questions for [`AuthorizationOracle`] across a
/// registry of group covalues the caller already has loaded.
pub trait GroupLookup {
    /// Look up a loaded group covalue by id.
    fn group(&self, id: CoId) -> Option<&Covalue>;
}

/// Adapts a [`GroupLookup`] plus a key source into an
/// [`AuthorizationOracle`] for `covalue-content`.
pub struct GroupOracle<'a> {
    /// Source of loaded group covalues.
    pub groups: &'a dyn GroupLookup,
    /// Source of read keys, for groups whose own history needs decrypting
    /// (not used by the default plaintext role/key map, kept for forward
    /// compatibility).
    pub keys: &'a dyn KeyLookup,
}

impl<'a> AuthorizationOracle for GroupOracle<'a> {
    fn role_at(&self, group: CoId, agent: AgentId, at: u64) -> Option<Role> {
        let group = self.groups.group(group)?;
        roles_at(group, self.keys, at).get(&agent).copied()
    }
}
