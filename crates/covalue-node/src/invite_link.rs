//! URL-fragment invite links: `#/invite/[<valueHint>/]<valueID>/<inviteSecret>`.
//!
//! The browser URL-bar adapter that produces/consumes these in practice is
//! out of scope; this is the pure, adapter-agnostic grammar the rest of the
//! engine builds on.

use covalue_core::ids::CoId;
use covalue_core::CovalueError;
use covalue_crypto::AgentSecret;

const PREFIX: &str = "#/invite/";

/// A parsed invite link.
#[derive(Debug)]
pub struct InviteLink {
    /// An optional hint about what kind of value this invite is for,
    /// purely advisory (e.g. a covalue type name for a loading spinner).
    pub value_hint: Option<String>,
    /// The group (or other covalue) being invited to.
    pub value_id: CoId,
    /// The invite secret minted by `createInvite`.
    pub invite_secret: AgentSecret,
}

fn encode_secret(secret: &AgentSecret) -> String {
    let (signing, sealing) = secret.to_bytes();
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(&signing);
    bytes.extend_from_slice(&sealing);
    bs58::encode(bytes).into_string()
}

fn decode_secret(s: &str) -> Result<AgentSecret, CovalueError> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|e| CovalueError::invalid(format!("bad invite secret encoding: {e}")))?;
    if bytes.len() != 64 {
        return Err(CovalueError::invalid("invite secret is not 64 bytes"));
    }
    let signing: [u8; 32] = bytes[..32].try_into().expect("checked length");
    let sealing: [u8; 32] = bytes[32..].try_into().expect("checked length");
    Ok(AgentSecret::from_bytes(signing, sealing))
}

impl InviteLink {
    /// Render this invite as a URL fragment.
    pub fn to_fragment(&self) -> String {
        let secret = encode_secret(&self.invite_secret);
        match &self.value_hint {
            Some(hint) => format!("{PREFIX}{hint}/{}/{}", self.value_id, secret),
            None => format!("{PREFIX}{}/{}", self.value_id, secret),
        }
    }

    /// Parse a URL fragment into its three parts, tolerating the presence
    /// or absence of `valueHint`.
    pub fn parse(fragment: &str) -> Result<Self, CovalueError> {
        let rest = fragment
            .strip_prefix(PREFIX)
            .ok_or_else(|| CovalueError::invalid("invite link missing '#/invite/' prefix"))?;
        let parts: Vec<&str> = rest.split('/').collect();
        let (value_hint, value_id, invite_secret) = match parts.as_slice() {
            [value_id, invite_secret] => (None, *value_id, *invite_secret),
            [hint, value_id, invite_secret] => (Some((*hint).to_string()), *value_id, *invite_secret),
            _ => return Err(CovalueError::invalid("invite link has the wrong number of segments")),
        };
        Ok(Self {
            value_hint,
            value_id: value_id.parse()?,
            invite_secret: decode_secret(invite_secret)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covalue_core::random::OsRandom;

    #[test]
    fn round_trips_without_a_hint() {
        let link = InviteLink {
            value_hint: None,
            value_id: CoId::from_hash([1u8; 32]),
            invite_secret: AgentSecret::generate(&OsRandom),
        };
        let fragment = link.to_fragment();
        let parsed = InviteLink::parse(&fragment).unwrap();
        assert_eq!(parsed.value_id, link.value_id);
        assert_eq!(parsed.invite_secret.id(), link.invite_secret.id());
        assert!(parsed.value_hint.is_none());
    }

    #[test]
    fn round_trips_with_a_hint() {
        let link = InviteLink {
            value_hint: Some("group".to_string()),
            value_id: CoId::from_hash([2u8; 32]),
            invite_secret: AgentSecret::generate(&OsRandom),
        };
        let fragment = link.to_fragment();
        let parsed = InviteLink::parse(&fragment).unwrap();
        assert_eq!(parsed.value_hint.as_deref(), Some("group"));
        assert_eq!(parsed.value_id, link.value_id);
    }

    #[test]
    fn rejects_a_missing_prefix() {
        assert!(InviteLink::parse("/invite/abc/def").is_err());
    }
}
