//! Persistence traits and row types for the four ACL stores.
//!
//! The engine and the administration service both talk to storage through
//! [`AclStore`], which combines one repository trait per table. Two
//! implementations ship with the crate: [`sqlite::SqliteAclStore`] and
//! [`memory::MemoryAclStore`].

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warden_core::{AclEntry, ObjectIdentity, Permission, Sid};

use crate::error::Result;

// ============================================================================
// Row types
// ============================================================================

/// One row of the class registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRow {
    /// Stable class id.
    pub id: i64,
    /// Trimmed, unique domain-type name.
    pub class_name: String,
}

/// One row of the SID registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidRow {
    /// Stable SID id.
    pub id: i64,
    /// Principal or authority string.
    pub sid: String,
    /// `true` for principals, `false` for granted authorities.
    pub principal: bool,
}

impl SidRow {
    /// Rebuild the tagged SID value from this row.
    pub fn to_sid(&self) -> Sid {
        if self.principal {
            Sid::Principal(self.sid.clone())
        } else {
            Sid::Authority(self.sid.clone())
        }
    }
}

/// One row of the object identity store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectIdentityRow {
    /// Stable identity id.
    pub id: i64,
    /// Owning class id.
    pub class_id: i64,
    /// Owning class name (joined for convenience).
    pub class_name: String,
    /// External object identifier.
    pub object_identifier: String,
    /// Optional parent identity for inheritance chains.
    pub parent_id: Option<i64>,
    /// Optional owner SID.
    pub owner_sid_id: Option<i64>,
    /// Whether entries inherit from the parent (advisory metadata).
    pub entries_inheriting: bool,
}

impl ObjectIdentityRow {
    /// Rebuild the (class, identifier) pair from this row.
    pub fn to_identity(&self) -> Result<ObjectIdentity> {
        Ok(ObjectIdentity::new(
            self.class_name.clone(),
            self.object_identifier.clone(),
        )?)
    }
}

/// One entry row joined with its SID.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRow {
    /// Stable entry id.
    pub id: i64,
    /// Owning object identity id.
    pub object_identity_id: i64,
    /// SID row id.
    pub sid_id: i64,
    /// SID value (joined).
    pub sid: String,
    /// SID principal flag (joined).
    pub principal: bool,
    /// Position within the identity's entry list.
    pub ace_order: i32,
    /// Permission bitmask, always positive.
    pub mask: i32,
    /// Granting or denying.
    pub granting: bool,
    /// Audit-on-success flag.
    pub audit_success: bool,
    /// Audit-on-failure flag.
    pub audit_failure: bool,
}

impl EntryRow {
    /// Convert to the model-level entry view.
    pub fn to_entry(&self) -> Result<AclEntry> {
        let sid = if self.principal {
            Sid::Principal(self.sid.clone())
        } else {
            Sid::Authority(self.sid.clone())
        };
        Ok(AclEntry {
            id: self.id,
            ace_order: self.ace_order,
            sid,
            permission: Permission::from_mask(self.mask)?,
            granting: self.granting,
            audit_success: self.audit_success,
            audit_failure: self.audit_failure,
        })
    }
}

/// A flattened grant row for downstream policy-cache construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRow {
    /// Domain-type name.
    pub class_name: String,
    /// External object identifier.
    pub object_identifier: String,
    /// SID value.
    pub sid: String,
    /// SID principal flag.
    pub principal: bool,
    /// Permission bitmask.
    pub mask: i32,
    /// Granting or denying.
    pub granting: bool,
}

/// Insertion payload for one entry row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEntry {
    /// Owning object identity id.
    pub object_identity_id: i64,
    /// SID row id.
    pub sid_id: i64,
    /// Position within the identity's entry list.
    pub ace_order: i32,
    /// Permission bitmask, must be positive.
    pub mask: i32,
    /// Granting or denying.
    pub granting: bool,
    /// Audit-on-success flag.
    pub audit_success: bool,
    /// Audit-on-failure flag.
    pub audit_failure: bool,
}

impl NewEntry {
    /// A granting entry with audit flags cleared, as the engine creates them.
    pub fn granting(object_identity_id: i64, sid_id: i64, ace_order: i32, mask: i32) -> Self {
        Self {
            object_identity_id,
            sid_id,
            ace_order,
            mask,
            granting: true,
            audit_success: false,
            audit_failure: false,
        }
    }
}

/// Insertion payload for one object identity row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewObjectIdentity {
    /// Owning class id; must exist.
    pub class_id: i64,
    /// External object identifier.
    pub object_identifier: String,
    /// Optional parent identity id; must exist when present.
    pub parent_id: Option<i64>,
    /// Optional owner SID id; must exist when present.
    pub owner_sid_id: Option<i64>,
    /// Whether entries inherit from the parent.
    pub entries_inheriting: bool,
}

// ============================================================================
// Repository traits, one per table
// ============================================================================

/// Class registry: maps a domain-type name to a stable identifier.
#[async_trait]
pub trait ClassStore: Send + Sync {
    /// Resolve the class row, inserting it when absent. The name is trimmed.
    /// Concurrent resolve-or-create races are settled by conditional insert.
    async fn ensure_class(&self, class_name: &str) -> Result<ClassRow>;

    /// Look up a class by its trimmed name.
    async fn find_class(&self, class_name: &str) -> Result<Option<ClassRow>>;

    /// Look up a class by id.
    async fn find_class_by_id(&self, id: i64) -> Result<Option<ClassRow>>;

    /// All class rows.
    async fn list_classes(&self) -> Result<Vec<ClassRow>>;

    /// Insert a class row. Duplicate names are a constraint violation.
    async fn create_class(&self, class_name: &str) -> Result<ClassRow>;

    /// Delete a class row by id; `false` if absent.
    async fn delete_class(&self, id: i64) -> Result<bool>;
}

/// Principal registry: maps a (value, principal-flag) pair to a stable id.
#[async_trait]
pub trait SidStore: Send + Sync {
    /// Resolve the SID row, inserting it when absent.
    async fn ensure_sid(&self, sid: &Sid) -> Result<SidRow>;

    /// Look up a SID row by value and flag.
    async fn find_sid(&self, sid: &Sid) -> Result<Option<SidRow>>;

    /// Look up a SID row by id.
    async fn find_sid_by_id(&self, id: i64) -> Result<Option<SidRow>>;

    /// All SID rows.
    async fn list_sids(&self) -> Result<Vec<SidRow>>;

    /// Insert a SID row. Duplicate (value, flag) pairs are a constraint
    /// violation.
    async fn create_sid(&self, value: &str, principal: bool) -> Result<SidRow>;

    /// Delete a SID row by id; `false` if absent.
    async fn delete_sid(&self, id: i64) -> Result<bool>;
}

/// Object identity store: one row per protected object instance.
#[async_trait]
pub trait ObjectIdentityStore: Send + Sync {
    /// Resolve the identity row, creating it (and its class) when absent.
    /// New rows default to `entries_inheriting = true` with no parent or
    /// owner.
    async fn ensure_object_identity(&self, identity: &ObjectIdentity)
        -> Result<ObjectIdentityRow>;

    /// Look up an identity row by (class, identifier).
    async fn find_object_identity(
        &self,
        identity: &ObjectIdentity,
    ) -> Result<Option<ObjectIdentityRow>>;

    /// Look up an identity row by id.
    async fn find_object_identity_by_id(&self, id: i64) -> Result<Option<ObjectIdentityRow>>;

    /// All identity rows.
    async fn list_object_identities(&self) -> Result<Vec<ObjectIdentityRow>>;

    /// Insert an identity row with explicit references.
    async fn create_object_identity(
        &self,
        new: &NewObjectIdentity,
    ) -> Result<ObjectIdentityRow>;

    /// Delete an identity row and, by cascade, all its entries; `false` if
    /// absent.
    async fn delete_object_identity(&self, id: i64) -> Result<bool>;
}

/// Entry store: one row per (object identity, SID) grant.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// The subset of `masks` already present as granting entries for this
    /// identity and SID. One call serves the whole bulk diff.
    async fn existing_masks(
        &self,
        object_identity_id: i64,
        sid_id: i64,
        masks: &[i32],
    ) -> Result<Vec<i32>>;

    /// Largest `ace_order` for an identity, or `None` when it has no entries.
    async fn max_ace_order(&self, object_identity_id: i64) -> Result<Option<i32>>;

    /// Conditional insert keyed on the (identity, SID, mask) uniqueness
    /// constraint; `false` when the row already existed.
    async fn insert_entry_if_absent(&self, entry: &NewEntry) -> Result<bool>;

    /// Conflict-free batch insert; rows whose (identity, SID, mask) already
    /// exist are skipped. Returns the number actually inserted.
    async fn insert_entries(&self, entries: &[NewEntry]) -> Result<u64>;

    /// Unconditional insert used by administration tooling. Duplicate
    /// (identity, SID, mask) rows are a constraint violation.
    async fn insert_entry(&self, entry: &NewEntry) -> Result<EntryRow>;

    /// Delete granting entries whose mask is in the set; returns the
    /// affected-row count.
    async fn delete_entries_by_masks(
        &self,
        object_identity_id: i64,
        sid_id: i64,
        masks: &[i32],
    ) -> Result<u64>;

    /// Delete every entry held by a SID, across all identities. Used before
    /// removing the SID row itself.
    async fn delete_entries_by_sid(&self, sid_id: i64) -> Result<u64>;

    /// Delete one entry row by id; `false` if absent.
    async fn delete_entry(&self, id: i64) -> Result<bool>;

    /// Entries for one identity, ordered by `ace_order` ascending.
    async fn list_entries(&self, object_identity_id: i64) -> Result<Vec<EntryRow>>;

    /// Every entry row, for administration listings.
    async fn list_all_entries(&self) -> Result<Vec<EntryRow>>;

    /// Flattened grant rows joined with class, identity, and SID, for
    /// policy-cache construction.
    async fn list_policy_rows(&self) -> Result<Vec<PolicyRow>>;
}

/// Combined store over the four ACL tables.
#[async_trait]
pub trait AclStore: ClassStore + SidStore + ObjectIdentityStore + EntryStore {
    /// Create or update the backing schema.
    async fn migrate(&self) -> Result<()>;
}

/// The next `ace_order` for an identity: `max(existing) + 1`, or 0 when the
/// identity has no entries. Shared by the engine and the administration
/// service so the two cannot drift.
pub async fn next_ace_order(store: &dyn AclStore, object_identity_id: i64) -> Result<i32> {
    let max = store.max_ace_order(object_identity_id).await?;
    Ok(max.map_or(0, |max| max + 1))
}
