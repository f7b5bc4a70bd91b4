//! Self-contained engine strategy backed directly by an [`AclStore`].
//!
//! Requires no external ACL infrastructure: class, SID, and identity
//! resolution happen here, and the snapshot returned by read paths is built
//! on demand from stored entries.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use warden_core::{
    AclConfig, AclEntry, AclSnapshot, MetricsRecorder, NoopMetrics, ObjectIdentity, Permission,
    RefreshPublisher, Sid,
};

use crate::engine::{
    audit, build_snapshot, bulk_grant, bulk_revoke, distinct_masks, publish_refresh, record,
    rows_to_entries, PermissionService,
};
use crate::error::Result;
use crate::store::{next_ace_order, AclStore, NewEntry};

/// Repository-backed [`PermissionService`] strategy.
pub struct RepositoryPermissionService {
    store: Arc<dyn AclStore>,
    refresh: Option<Arc<dyn RefreshPublisher>>,
    metrics: Arc<dyn MetricsRecorder>,
    audit_enabled: bool,
}

impl RepositoryPermissionService {
    /// Create an engine over a store, with no-op metrics, no refresh
    /// publisher, and audit disabled.
    pub fn new(store: Arc<dyn AclStore>) -> Self {
        Self {
            store,
            refresh: None,
            metrics: Arc::new(NoopMetrics),
            audit_enabled: false,
        }
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
}

#[async_trait]
impl PermissionService for RepositoryPermissionService {
    async fn grant_permission(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permission: Permission,
    ) -> Result<AclSnapshot> {
        let started = Instant::now();
        let identity_row = self.store.ensure_object_identity(identity).await?;
        let sid_row = self.store.ensure_sid(sid).await?;
        let order = next_ace_order(self.store.as_ref(), identity_row.id).await?;
        let inserted = self
            .store
            .insert_entry_if_absent(&NewEntry::granting(
                identity_row.id,
                sid_row.id,
                order,
                permission.mask(),
            ))
            .await?;
        if inserted {
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
        } else {
            record(&self.metrics, "grant", started, 0);
        }
        build_snapshot(self.store.as_ref(), &identity_row).await
    }

    async fn grant_permissions(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permissions: &[Permission],
    ) -> Result<u64> {
        let masks = distinct_masks(permissions)?;
        let started = Instant::now();
        let (inserted, inserted_masks) =
            bulk_grant(self.store.as_ref(), identity, sid, &masks).await?;
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
        let Some(identity_row) = self.store.find_object_identity(identity).await? else {
            log::warn!("revoke of {permission} on {identity}: no ACL exists");
            record(&self.metrics, "revoke", started, 0);
            return Ok(None);
        };
        let deleted = match self.store.find_sid(sid).await? {
            Some(sid_row) => {
                self.store
                    .delete_entries_by_masks(identity_row.id, sid_row.id, &[permission.mask()])
                    .await?
            }
            None => 0,
        };
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
        Ok(Some(build_snapshot(self.store.as_ref(), &identity_row).await?))
    }

    async fn revoke_permissions(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permissions: &[Permission],
    ) -> Result<u64> {
        let masks = distinct_masks(permissions)?;
        let started = Instant::now();
        let deleted = bulk_revoke(self.store.as_ref(), identity, sid, &masks).await?;
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
        let Some(identity_row) = self.store.find_object_identity(identity).await? else {
            record(&self.metrics, "list", started, 0);
            return Ok(Vec::new());
        };
        let entries = rows_to_entries(&self.store.list_entries(identity_row.id).await?)?;
        record(&self.metrics, "list", started, entries.len() as u64);
        Ok(entries)
    }

    async fn delete_acl(&self, identity: &ObjectIdentity) -> Result<()> {
        let started = Instant::now();
        let Some(identity_row) = self.store.find_object_identity(identity).await? else {
            log::warn!("delete of {identity}: no ACL exists");
            record(&self.metrics, "delete", started, 0);
            return Ok(());
        };
        self.store.delete_object_identity(identity_row.id).await?;
        publish_refresh(&self.refresh);
        record(&self.metrics, "delete", started, 1);
        audit(self.audit_enabled, "delete", identity, None, &[], 1);
        Ok(())
    }
}
