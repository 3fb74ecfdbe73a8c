//! The role lattice used by the group/permission engine.

use serde::{Deserialize, Serialize};

/// A member's standing within a group at a point in time.
///
/// Ordered `reader < writer < admin`; `revoked` is incomparable to the
/// others and is treated as "no standing" everywhere a minimum role is
/// checked (`role >= Role::Writer` is false for a revoked member).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May read decrypted content but not write transactions.
    Reader,
    /// May sign transactions in covalues owned by this group.
    Writer,
    /// May additionally modify the group covalue itself (roles, keys, invites).
    Admin,
    /// Former member; cannot read post-rotation content.
    Revoked,
}

impl Role {
    /// Numeric rank used for `>=` comparisons; `Revoked` has no valid rank.
    fn rank(self) -> Option<u8> {
        match self {
            Role::Reader => Some(0),
            Role::Writer => Some(1),
            Role::Admin => Some(2),
            Role::Revoked => None,
        }
    }

    /// Whether this role meets or exceeds `minimum` (`Revoked` never does).
    pub fn at_least(self, minimum: Role) -> bool {
        match (self.rank(), minimum.rank()) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_meets_reader_minimum() {
        assert!(Role::Writer.at_least(Role::Reader));
    }

    #[test]
    fn reader_does_not_meet_writer_minimum() {
        assert!(!Role::Reader.at_least(Role::Writer));
    }

    #[test]
    fn revoked_never_meets_any_minimum() {
        assert!(!Role::Revoked.at_least(Role::Reader));
    }
}
