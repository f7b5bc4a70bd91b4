//! Engine strategy delegating to an externally supplied ACL backend.
//!
//! The backend owns raw ACL storage (typically platform-provided
//! infrastructure); this layer adds what the backend does not guarantee:
//! idempotency checks, structured audit, metrics, and post-commit refresh.
//! When direct [`AclStore`] access is also wired, bulk operations take the
//! single-statement diff path shared with the repository strategy; without
//! it they fall back to one backend call per permission.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use warden_core::{
    AclConfig, AclEntry, AclSnapshot, MetricsRecorder, NoopMetrics, ObjectIdentity, Permission,
    RefreshPublisher, Sid,
};

use crate::engine::{
    audit, build_snapshot, bulk_grant, bulk_revoke, distinct_masks, publish_refresh, record,
    PermissionService,
};
use crate::error::Result;
use crate::store::{next_ace_order, AclStore, NewEntry};

// ============================================================================
// Backend boundary
// ============================================================================

/// A mutable-ACL backend as supplied by surrounding infrastructure.
///
/// Primitive commands only: no idempotency, audit, or metrics — those are
/// the delegating engine's responsibility.
#[async_trait]
pub trait AclBackend: Send + Sync {
    /// The current snapshot for an identity, `None` when no ACL exists.
    async fn read_acl(&self, identity: &ObjectIdentity) -> Result<Option<AclSnapshot>>;

    /// Append one granting entry, creating the ACL if needed, and return the
    /// updated snapshot.
    async fn grant(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permission: Permission,
    ) -> Result<AclSnapshot>;

    /// Remove granting entries matching the SID and mask; returns the
    /// affected-row count (0 when nothing matched or no ACL exists).
    async fn revoke(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permission: Permission,
    ) -> Result<u64>;

    /// Remove the ACL and all its entries; `false` when none existed.
    async fn delete_acl(&self, identity: &ObjectIdentity) -> Result<bool>;
}

/// [`AclBackend`] implemented over any [`AclStore`]; the backend used when
/// no external ACL infrastructure is present but the delegating wiring is.
pub struct StoreAclBackend {
    store: Arc<dyn AclStore>,
}

impl StoreAclBackend {
    /// Wrap a store as a backend.
    pub fn new(store: Arc<dyn AclStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AclBackend for StoreAclBackend {
    async fn read_acl(&self, identity: &ObjectIdentity) -> Result<Option<AclSnapshot>> {
        match self.store.find_object_identity(identity).await? {
            Some(row) => Ok(Some(build_snapshot(self.store.as_ref(), &row).await?)),
            None => Ok(None),
        }
    }

    async fn grant(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permission: Permission,
    ) -> Result<AclSnapshot> {
        let identity_row = self.store.ensure_object_identity(identity).await?;
        let sid_row = self.store.ensure_sid(sid).await?;
        let order = next_ace_order(self.store.as_ref(), identity_row.id).await?;
        self.store
            .insert_entry_if_absent(&NewEntry::granting(
                identity_row.id,
                sid_row.id,
                order,
                permission.mask(),
            ))
            .await?;
        build_snapshot(self.store.as_ref(), &identity_row).await
    }

    async fn revoke(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permission: Permission,
    ) -> Result<u64> {
        let Some(identity_row) = self.store.find_object_identity(identity).await? else {
            return Ok(0);
        };
        let Some(sid_row) = self.store.find_sid(sid).await? else {
            return Ok(0);
        };
        self.store
            .delete_entries_by_masks(identity_row.id, sid_row.id, &[permission.mask()])
            .await
    }

    async fn delete_acl(&self, identity: &ObjectIdentity) -> Result<bool> {
        match self.store.find_object_identity(identity).await? {
            Some(row) => self.store.delete_object_identity(row.id).await,
            None => Ok(false),
        }
    }
}

// ============================================================================
// Delegating engine
// ============================================================================

/// [`PermissionService`] strategy wrapping an [`AclBackend`].
pub struct DelegatingPermissionService {
    backend: Arc<dyn AclBackend>,
    store: Option<Arc<dyn AclStore>>,
    refresh: Option<Arc<dyn RefreshPublisher>>,
    metrics: Arc<dyn MetricsRecorder>,
    audit_enabled: bool,
}

impl DelegatingPermissionService {
    /// Create an engine over a backend, with no direct store access, no-op
    /// metrics, no refresh publisher, and audit disabled.
    pub fn new(backend: Arc<dyn AclBackend>) -> Self {
        Self {
            backend,
            store: None,
            refresh: None,
            metrics: Arc::new(NoopMetrics),
            audit_enabled: false,
        }
    }

    /// Wire direct entry-store access, enabling the bulk-diff fast path.
    pub fn with_store(mut self, store: Arc<dyn AclStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Apply configuration toggles.
    pub fn with_config(mut self, config: &AclConfig) -> Self {
        self.audit_enabled = config.audit_enabled;
        self
    }

    /// Wire a metrics recorder.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Wire a post-commit refresh publisher.
    pub fn with_refresh(mut self, refresh: Arc<dyn RefreshPublisher>) -> Self {
        self.refresh = Some(refresh);
        self
    }

    fn has_granting_entry(snapshot: &AclSnapshot, sid: &Sid, mask: i32) -> bool {
        snapshot
            .entries()
            .iter()
            .any(|entry| entry.granting && entry.sid == *sid && entry.permission.mask() == mask)
    }
}

#[async_trait]
impl PermissionService for DelegatingPermissionService {
    async fn grant_permission(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permission: Permission,
    ) -> Result<AclSnapshot> {
        let started = Instant::now();
        if let Some(snapshot) = self.backend.read_acl(identity).await? {
            if Self::has_granting_entry(&snapshot, sid, permission.mask()) {
                record(&self.metrics, "grant", started, 0);
                return Ok(snapshot);
            }
        }
        let snapshot = self.backend.grant(identity, sid, permission).await?;
        publish_refresh(&self.refresh);
        record(&self.metrics, "grant", started, 1);
        audit(
            self.audit_enabled,
            "grant",
            identity,
            Some(sid),
            &[permission.mask()],
            1,
        );
        Ok(snapshot)
    }

    async fn grant_permissions(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permissions: &[Permission],
    ) -> Result<u64> {
        let masks = distinct_masks(permissions)?;
        let started = Instant::now();
        let (inserted, inserted_masks) = match &self.store {
            Some(store) => bulk_grant(store.as_ref(), identity, sid, &masks).await?,
            None => {
                // No direct entry-store access: one backend call per mask
                // not already granted.
                let existing = self.backend.read_acl(identity).await?;
                let mut inserted_masks = Vec::new();
                for &mask in &masks {
                    if let Some(snapshot) = &existing {
                        if Self::has_granting_entry(snapshot, sid, mask) {
                            continue;
                        }
                    }
                    let permission = Permission::from_mask(mask)?;
                    self.backend.grant(identity, sid, permission).await?;
                    inserted_masks.push(mask);
                }
                (inserted_masks.len() as u64, inserted_masks)
            }
        };
        if inserted > 0 {
            publish_refresh(&self.refresh);
            audit(
                self.audit_enabled,
                "bulk_grant",
                identity,
                Some(sid),
                &inserted_masks,
                inserted,
            );
        }
        record(&self.metrics, "bulk_grant", started, inserted);
        Ok(inserted)
    }

    async fn revoke_permission(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permission: Permission,
    ) -> Result<Option<AclSnapshot>> {
        let started = Instant::now();
        if self.backend.read_acl(identity).await?.is_none() {
            log::warn!("revoke of {permission} on {identity}: no ACL exists");
            record(&self.metrics, "revoke", started, 0);
            return Ok(None);
        }
        let deleted = self.backend.revoke(identity, sid, permission).await?;
        if deleted > 0 {
            publish_refresh(&self.refresh);
            audit(
                self.audit_enabled,
                "revoke",
                identity,
                Some(sid),
                &[permission.mask()],
                deleted,
            );
        }
        record(&self.metrics, "revoke", started, deleted);
        let snapshot = match self.backend.read_acl(identity).await? {
            Some(snapshot) => snapshot,
            None => AclSnapshot::new(identity.clone(), true, Vec::new()),
        };
        Ok(Some(snapshot))
    }

    async fn revoke_permissions(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permissions: &[Permission],
    ) -> Result<u64> {
        let masks = distinct_masks(permissions)?;
        let started = Instant::now();
        let deleted = match &self.store {
            Some(store) => bulk_revoke(store.as_ref(), identity, sid, &masks).await?,
            None => {
                let mut deleted = 0;
                for &mask in &masks {
                    let permission = Permission::from_mask(mask)?;
                    deleted += self.backend.revoke(identity, sid, permission).await?;
                }
                deleted
            }
        };
        if deleted > 0 {
            publish_refresh(&self.refresh);
            audit(
                self.audit_enabled,
                "bulk_revoke",
                identity,
                Some(sid),
                &masks,
                deleted,
            );
        }
        record(&self.metrics, "bulk_revoke", started, deleted);
        Ok(deleted)
    }

    async fn list_permissions(&self, identity: &ObjectIdentity) -> Result<Vec<AclEntry>> {
        let started = Instant::now();
        let entries = match self.backend.read_acl(identity).await? {
            Some(snapshot) => snapshot.entries().to_vec(),
            None => Vec::new(),
        };
        record(&self.metrics, "list", started, entries.len() as u64);
        Ok(entries)
    }

    async fn delete_acl(&self, identity: &ObjectIdentity) -> Result<()> {
        let started = Instant::now();
        let existed = self.backend.delete_acl(identity).await?;
        if existed {
            publish_refresh(&self.refresh);
            record(&self.metrics, "delete", started, 1);
            audit(self.audit_enabled, "delete", identity, None, &[], 1);
        } else {
            log::warn!("delete of {identity}: no ACL exists");
            record(&self.metrics, "delete", started, 0);
        }
        Ok(())
    }
}
