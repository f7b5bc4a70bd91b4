//! ACL data model: identities, SIDs, permission masks, entries, snapshots.
//!
//! Mutation never happens through these types. Read operations return an
//! immutable [`AclSnapshot`]; all changes go through the engine's
//! grant/revoke/delete commands, which re-derive the snapshot afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// ObjectIdentity
// ============================================================================

/// The (domain class, external identifier) pair naming one protected object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    class: String,
    identifier: String,
}

impl ObjectIdentity {
    /// Create an identity from a domain-type name and an external identifier.
    ///
    /// The class name is trimmed; both parts must be non-blank.
    pub fn new(class: impl Into<String>, identifier: impl Into<String>) -> Result<Self> {
        let class = class.into().trim().to_string();
        if class.is_empty() {
            return Err(Error::InvalidArgument("identity class"));
        }
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(Error::InvalidArgument("identity identifier"));
        }
        Ok(Self { class, identifier })
    }

    /// The domain-type name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// The external object identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.class, self.identifier)
    }
}

// ============================================================================
// Sid
// ============================================================================

/// A security identifier: an individual principal or a granted authority.
///
/// A principal `"alice"` and an authority `"alice"` are distinct identifiers;
/// grants to one are never visible when querying the other.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Sid {
    /// An individual user, keyed by username.
    Principal(String),
    /// A role or group authority, keyed by authority name.
    Authority(String),
}

impl Sid {
    /// Create a principal SID from a username.
    pub fn principal(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("principal name"));
        }
        Ok(Self::Principal(name))
    }

    /// Create a granted-authority SID from a role name.
    pub fn authority(role: impl Into<String>) -> Result<Self> {
        let role = role.into();
        if role.trim().is_empty() {
            return Err(Error::InvalidArgument("authority name"));
        }
        Ok(Self::Authority(role))
    }

    /// The principal or authority string.
    pub fn value(&self) -> &str {
        match self {
            Self::Principal(v) | Self::Authority(v) => v,
        }
    }

    /// `true` for principals, `false` for granted authorities.
    pub fn is_principal(&self) -> bool {
        matches!(self, Self::Principal(_))
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Principal(v) => write!(f, "principal:{v}"),
            Self::Authority(v) => write!(f, "authority:{v}"),
        }
    }
}

// ============================================================================
// Permission
// ============================================================================

/// An integer bitfield encoding one or more permission bits.
///
/// The mask is always strictly positive; construction enforces this so the
/// engine never has to re-validate stored values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Permission(i32);

impl Permission {
    /// Create a permission from a raw mask. Fails if the mask is not positive.
    pub fn from_mask(mask: i32) -> Result<Self> {
        if mask <= 0 {
            return Err(Error::InvalidArgument("permission mask"));
        }
        Ok(Self(mask))
    }

    /// The raw bitmask.
    pub fn mask(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for Permission {
    type Error = Error;

    fn try_from(mask: i32) -> Result<Self> {
        Self::from_mask(mask)
    }
}

impl From<Permission> for i32 {
    fn from(permission: Permission) -> i32 {
        permission.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Well-known permission masks.
///
/// These mirror the conventional base permissions; any other positive mask is
/// equally valid — the engine treats masks as opaque positive bitfields.
pub mod masks {
    use super::Permission;

    /// Read access.
    pub const READ: Permission = Permission(1);
    /// Write access.
    pub const WRITE: Permission = Permission(1 << 1);
    /// Create access.
    pub const CREATE: Permission = Permission(1 << 2);
    /// Delete access.
    pub const DELETE: Permission = Permission(1 << 3);
    /// Administrative access.
    pub const ADMINISTRATION: Permission = Permission(1 << 4);
}

// ============================================================================
// AclEntry / AclSnapshot
// ============================================================================

/// One access-control entry: a (SID, mask, ordinal) grant or deny record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Stable entry row id.
    pub id: i64,
    /// Position within the identity's entry list; evaluation order.
    pub ace_order: i32,
    /// The SID this entry applies to.
    pub sid: Sid,
    /// The permission mask.
    pub permission: Permission,
    /// `true` grants the mask, `false` denies it.
    pub granting: bool,
    /// Whether successful matches are audited.
    pub audit_success: bool,
    /// Whether failed matches are audited.
    pub audit_failure: bool,
}

/// An immutable view of one object identity's access-control list.
///
/// Snapshots are derived from stored entries on demand and cannot be mutated;
/// callers change permissions only through the engine's command API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclSnapshot {
    identity: ObjectIdentity,
    entries_inheriting: bool,
    entries: Vec<AclEntry>,
}

impl AclSnapshot {
    /// Build a snapshot from entries already ordered by `ace_order`.
    pub fn new(identity: ObjectIdentity, entries_inheriting: bool, entries: Vec<AclEntry>) -> Self {
        Self {
            identity,
            entries_inheriting,
            entries,
        }
    }

    /// The identity this snapshot describes.
    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    /// Whether this identity is flagged to inherit entries from its parent.
    ///
    /// Advisory metadata: evaluation does not walk parent identities.
    pub fn entries_inheriting(&self) -> bool {
        self.entries_inheriting
    }

    /// Entries ordered by `ace_order` ascending.
    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    /// First-match evaluation: does any listed SID hold any of the permissions?
    ///
    /// Only granting entries participate; an exact mask match wins.
    pub fn is_granted(&self, permissions: &[Permission], sids: &[Sid]) -> bool {
        for entry in &self.entries {
            if !entry.granting {
                continue;
            }
            if !sids.contains(&entry.sid) {
                continue;
            }
            if permissions.contains(&entry.permission) {
                return true;
            }
        }
        false
    }
}

// ============================================================================
// Tests
// ============================================================================
