//! In-memory ACL store.
//!
//! Backs unit and property tests, and deployments that keep their ACL graph
//! ephemeral. Enforces the same uniqueness and referential constraints as the
//! SQL schema, surfacing them as [`Error::Constraint`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use warden_core::{ObjectIdentity, Sid};

use crate::error::{Error, Result};
use crate::store::{
    AclStore, ClassRow, ClassStore, EntryRow, EntryStore, NewEntry, NewObjectIdentity,
    ObjectIdentityRow, ObjectIdentityStore, PolicyRow, SidRow, SidStore,
};

#[derive(Clone, Debug)]
struct StoredIdentity {
    id: i64,
    class_id: i64,
    object_identifier: String,
    parent_id: Option<i64>,
    owner_sid_id: Option<i64>,
    entries_inheriting: bool,
}

#[derive(Clone, Debug)]
struct StoredEntry {
    id: i64,
    object_identity_id: i64,
    sid_id: i64,
    ace_order: i32,
    mask: i32,
    granting: bool,
    audit_success: bool,
    audit_failure: bool,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    classes: Vec<ClassRow>,
    sids: Vec<SidRow>,
    identities: Vec<StoredIdentity>,
    entries: Vec<StoredEntry>,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn class_name(&self, class_id: i64) -> Option<&str> {
        self.classes
            .iter()
            .find(|c| c.id == class_id)
            .map(|c| c.class_name.as_str())
    }

    fn identity_row(&self, stored: &StoredIdentity) -> Result<ObjectIdentityRow> {
        let class_name = self
            .class_name(stored.class_id)
            .ok_or(Error::Constraint("object_id_class"))?;
        Ok(ObjectIdentityRow {
            id: stored.id,
            class_id: stored.class_id,
            class_name: class_name.to_string(),
            object_identifier: stored.object_identifier.clone(),
            parent_id: stored.parent_id,
            owner_sid_id: stored.owner_sid_id,
            entries_inheriting: stored.entries_inheriting,
        })
    }

    fn entry_row(&self, stored: &StoredEntry) -> Result<EntryRow> {
        let sid = self
            .sids
            .iter()
            .find(|s| s.id == stored.sid_id)
            .ok_or(Error::Constraint("sid"))?;
        Ok(EntryRow {
            id: stored.id,
            object_identity_id: stored.object_identity_id,
            sid_id: stored.sid_id,
            sid: sid.sid.clone(),
            principal: sid.principal,
            ace_order: stored.ace_order,
            mask: stored.mask,
            granting: stored.granting,
            audit_success: stored.audit_success,
            audit_failure: stored.audit_failure,
        })
    }

    fn entry_exists(&self, object_identity_id: i64, sid_id: i64, mask: i32) -> bool {
        self.entries
            .iter()
            .any(|e| e.object_identity_id == object_identity_id && e.sid_id == sid_id && e.mask == mask)
    }

    fn push_entry(&mut self, new: &NewEntry) -> StoredEntry {
        let stored = StoredEntry {
            id: self.allocate_id(),
            object_identity_id: new.object_identity_id,
            sid_id: new.sid_id,
            ace_order: new.ace_order,
            mask: new.mask,
            granting: new.granting,
            audit_success: new.audit_success,
            audit_failure: new.audit_failure,
        };
        self.entries.push(stored.clone());
        stored
    }

    fn check_entry_refs(&self, new: &NewEntry) -> Result<()> {
        if !self.identities.iter().any(|i| i.id == new.object_identity_id) {
            return Err(Error::Constraint("acl_object_identity"));
        }
        if !self.sids.iter().any(|s| s.id == new.sid_id) {
            return Err(Error::Constraint("sid"));
        }
        Ok(())
    }
}

/// ACL store holding all four tables in process memory.
#[derive(Default)]
pub struct MemoryAclStore {
    inner: Mutex<Inner>,
}

impl MemoryAclStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ClassStore for MemoryAclStore {
    async fn ensure_class(&self, class_name: &str) -> Result<ClassRow> {
        let trimmed = class_name.trim();
        let mut inner = self.lock();
        if let Some(row) = inner.classes.iter().find(|c| c.class_name == trimmed) {
            return Ok(row.clone());
        }
        let row = ClassRow {
            id: inner.allocate_id(),
            class_name: trimmed.to_string(),
        };
        inner.classes.push(row.clone());
        Ok(row)
    }

    async fn find_class(&self, class_name: &str) -> Result<Option<ClassRow>> {
        let trimmed = class_name.trim();
        Ok(self
            .lock()
            .classes
            .iter()
            .find(|c| c.class_name == trimmed)
            .cloned())
    }

    async fn find_class_by_id(&self, id: i64) -> Result<Option<ClassRow>> {
        Ok(self.lock().classes.iter().find(|c| c.id == id).cloned())
    }

    async fn list_classes(&self) -> Result<Vec<ClassRow>> {
        Ok(self.lock().classes.clone())
    }

    async fn create_class(&self, class_name: &str) -> Result<ClassRow> {
        let trimmed = class_name.trim();
        let mut inner = self.lock();
        if inner.classes.iter().any(|c| c.class_name == trimmed) {
            return Err(Error::Constraint("class_name"));
        }
        let row = ClassRow {
            id: inner.allocate_id(),
            class_name: trimmed.to_string(),
        };
        inner.classes.push(row.clone());
        Ok(row)
    }

    async fn delete_class(&self, id: i64) -> Result<bool> {
        let mut inner = self.lock();
        if inner.identities.iter().any(|i| i.class_id == id) {
            return Err(Error::Constraint("object_id_class"));
        }
        let before = inner.classes.len();
        inner.classes.retain(|c| c.id != id);
        Ok(inner.classes.len() < before)
    }
}

#[async_trait]
impl SidStore for MemoryAclStore {
    async fn ensure_sid(&self, sid: &Sid) -> Result<SidRow> {
        let mut inner = self.lock();
        if let Some(row) = inner
            .sids
            .iter()
            .find(|s| s.sid == sid.value() && s.principal == sid.is_principal())
        {
            return Ok(row.clone());
        }
        let row = SidRow {
            id: inner.allocate_id(),
            sid: sid.value().to_string(),
            principal: sid.is_principal(),
        };
        inner.sids.push(row.clone());
        Ok(row)
    }

    async fn find_sid(&self, sid: &Sid) -> Result<Option<SidRow>> {
        Ok(self
            .lock()
            .sids
            .iter()
            .find(|s| s.sid == sid.value() && s.principal == sid.is_principal())
            .cloned())
    }

    async fn find_sid_by_id(&self, id: i64) -> Result<Option<SidRow>> {
        Ok(self.lock().sids.iter().find(|s| s.id == id).cloned())
    }

    async fn list_sids(&self) -> Result<Vec<SidRow>> {
        Ok(self.lock().sids.clone())
    }

    async fn create_sid(&self, value: &str, principal: bool) -> Result<SidRow> {
        let mut inner = self.lock();
        if inner
            .sids
            .iter()
            .any(|s| s.sid == value && s.principal == principal)
        {
            return Err(Error::Constraint("sid"));
        }
        let row = SidRow {
            id: inner.allocate_id(),
            sid: value.to_string(),
            principal,
        };
        inner.sids.push(row.clone());
        Ok(row)
    }

    async fn delete_sid(&self, id: i64) -> Result<bool> {
        let mut inner = self.lock();
        if inner.entries.iter().any(|e| e.sid_id == id) {
            return Err(Error::Constraint("sid"));
        }
        if inner.identities.iter().any(|i| i.owner_sid_id == Some(id)) {
            return Err(Error::Constraint("owner_sid"));
        }
        let before = inner.sids.len();
        inner.sids.retain(|s| s.id != id);
        Ok(inner.sids.len() < before)
    }
}

#[async_trait]
impl ObjectIdentityStore for MemoryAclStore {
    async fn ensure_object_identity(
        &self,
        identity: &ObjectIdentity,
    ) -> Result<ObjectIdentityRow> {
        let class = self.ensure_class(identity.class()).await?;
        let mut inner = self.lock();
        if let Some(stored) = inner
            .identities
            .iter()
            .find(|i| i.class_id == class.id && i.object_identifier == identity.identifier())
        {
            let stored = stored.clone();
            return inner.identity_row(&stored);
        }
        let stored = StoredIdentity {
            id: inner.allocate_id(),
            class_id: class.id,
            object_identifier: identity.identifier().to_string(),
            parent_id: None,
            owner_sid_id: None,
            entries_inheriting: true,
        };
        inner.identities.push(stored.clone());
        inner.identity_row(&stored)
    }

    async fn find_object_identity(
        &self,
        identity: &ObjectIdentity,
    ) -> Result<Option<ObjectIdentityRow>> {
        let inner = self.lock();
        let Some(class) = inner
            .classes
            .iter()
            .find(|c| c.class_name == identity.class())
        else {
            return Ok(None);
        };
        inner
            .identities
            .iter()
            .find(|i| i.class_id == class.id && i.object_identifier == identity.identifier())
            .map(|stored| inner.identity_row(stored))
            .transpose()
    }

    async fn find_object_identity_by_id(&self, id: i64) -> Result<Option<ObjectIdentityRow>> {
        let inner = self.lock();
        inner
            .identities
            .iter()
            .find(|i| i.id == id)
            .map(|stored| inner.identity_row(stored))
            .transpose()
    }

    async fn list_object_identities(&self) -> Result<Vec<ObjectIdentityRow>> {
        let inner = self.lock();
        inner
            .identities
            .iter()
            .map(|stored| inner.identity_row(stored))
            .collect()
    }

    async fn create_object_identity(
        &self,
        new: &NewObjectIdentity,
    ) -> Result<ObjectIdentityRow> {
        let mut inner = self.lock();
        if !inner.classes.iter().any(|c| c.id == new.class_id) {
            return Err(Error::Constraint("object_id_class"));
        }
        if let Some(parent_id) = new.parent_id {
            if !inner.identities.iter().any(|i| i.id == parent_id) {
                return Err(Error::Constraint("parent_object"));
            }
        }
        if let Some(owner_sid_id) = new.owner_sid_id {
            if !inner.sids.iter().any(|s| s.id == owner_sid_id) {
                return Err(Error::Constraint("owner_sid"));
            }
        }
        if inner
            .identities
            .iter()
            .any(|i| i.class_id == new.class_id && i.object_identifier == new.object_identifier)
        {
            return Err(Error::Constraint("object_id_identity"));
        }
        let stored = StoredIdentity {
            id: inner.allocate_id(),
            class_id: new.class_id,
            object_identifier: new.object_identifier.clone(),
            parent_id: new.parent_id,
            owner_sid_id: new.owner_sid_id,
            entries_inheriting: new.entries_inheriting,
        };
        inner.identities.push(stored.clone());
        inner.identity_row(&stored)
    }

    async fn delete_object_identity(&self, id: i64) -> Result<bool> {
        let mut inner = self.lock();
        if inner.identities.iter().any(|i| i.parent_id == Some(id)) {
            return Err(Error::Constraint("parent_object"));
        }
        let before = inner.identities.len();
        inner.identities.retain(|i| i.id != id);
        if inner.identities.len() == before {
            return Ok(false);
        }
        // Cascade, as the SQL schema does with ON DELETE CASCADE.
        inner.entries.retain(|e| e.object_identity_id != id);
        Ok(true)
    }
}

#[async_trait]
impl EntryStore for MemoryAclStore {
    async fn existing_masks(
        &self,
        object_identity_id: i64,
        sid_id: i64,
        masks: &[i32],
    ) -> Result<Vec<i32>> {
        Ok(self
            .lock()
            .entries
            .iter()
            .filter(|e| {
                e.object_identity_id == object_identity_id
                    && e.sid_id == sid_id
                    && e.granting
                    && masks.contains(&e.mask)
            })
            .map(|e| e.mask)
            .collect())
    }

    async fn max_ace_order(&self, object_identity_id: i64) -> Result<Option<i32>> {
        Ok(self
            .lock()
            .entries
            .iter()
            .filter(|e| e.object_identity_id == object_identity_id)
            .map(|e| e.ace_order)
            .max())
    }

    async fn insert_entry_if_absent(&self, entry: &NewEntry) -> Result<bool> {
        let mut inner = self.lock();
        inner.check_entry_refs(entry)?;
        if inner.entry_exists(entry.object_identity_id, entry.sid_id, entry.mask) {
            return Ok(false);
        }
        inner.push_entry(entry);
        Ok(true)
    }

    async fn insert_entries(&self, entries: &[NewEntry]) -> Result<u64> {
        let mut inner = self.lock();
        let mut inserted = 0;
        for entry in entries {
            inner.check_entry_refs(entry)?;
            if inner.entry_exists(entry.object_identity_id, entry.sid_id, entry.mask) {
                continue;
            }
            inner.push_entry(entry);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn insert_entry(&self, entry: &NewEntry) -> Result<EntryRow> {
        let mut inner = self.lock();
        inner.check_entry_refs(entry)?;
        if inner.entry_exists(entry.object_identity_id, entry.sid_id, entry.mask) {
            return Err(Error::Constraint("acl_entry"));
        }
        let stored = inner.push_entry(entry);
        inner.entry_row(&stored)
    }

    async fn delete_entries_by_masks(
        &self,
        object_identity_id: i64,
        sid_id: i64,
        masks: &[i32],
    ) -> Result<u64> {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| {
            !(e.object_identity_id == object_identity_id
                && e.sid_id == sid_id
                && e.granting
                && masks.contains(&e.mask))
        });
        Ok((before - inner.entries.len()) as u64)
    }

    async fn delete_entries_by_sid(&self, sid_id: i64) -> Result<u64> {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.sid_id != sid_id);
        Ok((before - inner.entries.len()) as u64)
    }

    async fn delete_entry(&self, id: i64) -> Result<bool> {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.id != id);
        Ok(inner.entries.len() < before)
    }

    async fn list_entries(&self, object_identity_id: i64) -> Result<Vec<EntryRow>> {
        let inner = self.lock();
        let mut rows: Vec<EntryRow> = inner
            .entries
            .iter()
            .filter(|e| e.object_identity_id == object_identity_id)
            .map(|stored| inner.entry_row(stored))
            .collect::<Result<_>>()?;
        rows.sort_by_key(|r| r.ace_order);
        Ok(rows)
    }

    async fn list_all_entries(&self) -> Result<Vec<EntryRow>> {
        let inner = self.lock();
        inner
            .entries
            .iter()
            .map(|stored| inner.entry_row(stored))
            .collect()
    }

    async fn list_policy_rows(&self) -> Result<Vec<PolicyRow>> {
        let inner = self.lock();
        let mut rows = Vec::with_capacity(inner.entries.len());
        for stored in &inner.entries {
            let entry = inner.entry_row(stored)?;
            let identity = inner
                .identities
                .iter()
                .find(|i| i.id == stored.object_identity_id)
                .ok_or(Error::Constraint("acl_object_identity"))?;
            let class_name = inner
                .class_name(identity.class_id)
                .ok_or(Error::Constraint("object_id_class"))?;
            rows.push(PolicyRow {
                class_name: class_name.to_string(),
                object_identifier: identity.object_identifier.clone(),
                sid: entry.sid,
                principal: entry.principal,
                mask: entry.mask,
                granting: entry.granting,
            });
        }
        Ok(rows)
    }
}

#[async_trait]
impl AclStore for MemoryAclStore {
    async fn migrate(&self) -> Result<()> {
        Ok(())
    }
}
