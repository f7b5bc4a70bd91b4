//! Administrative CRUD over the raw ACL tables.
//!
//! The engines cover the grant/revoke lifecycle; everything else an
//! operator needs — registry listings, explicit row creation with
//! referential checks, deletions, and the flattened policy projection —
//! lives here. Mutations that touch entries publish the same refresh,
//! audit, and metric signals as the engines so downstream caches never
//! see administrative writes as silent.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use warden_core::{
    AclConfig, MetricsRecorder, NoopMetrics, Permission, RefreshPublisher,
};

use crate::engine::{audit, publish_refresh, record};
use crate::error::{Error, Result};
use crate::store::{
    next_ace_order, AclStore, ClassRow, EntryRow, NewEntry, NewObjectIdentity,
    ObjectIdentityRow, PolicyRow, SidRow,
};

// ============================================================================
// Requests
// ============================================================================

/// Parameters for creating an object identity row directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectIdentityCreate {
    /// Referenced class row id.
    pub class_id: i64,
    /// Domain object identifier within the class.
    pub object_identifier: String,
    /// Optional parent identity row id.
    pub parent_id: Option<i64>,
    /// Optional owning SID row id.
    pub owner_sid_id: Option<i64>,
    /// Whether evaluation metadata marks this ACL as inheriting.
    pub entries_inheriting: bool,
}

/// Parameters for creating an entry row directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntryCreate {
    /// Referenced object identity row id.
    pub object_identity_id: i64,
    /// Referenced SID row id.
    pub sid_id: i64,
    /// Explicit ordinal; appended after the current maximum when `None`.
    pub ace_order: Option<i32>,
    /// Permission mask, a positive integer.
    pub mask: i32,
    /// Granting or denying.
    pub granting: bool,
    /// Audit successful evaluations against this entry.
    pub audit_success: bool,
    /// Audit failed evaluations against this entry.
    pub audit_failure: bool,
}

// ============================================================================
// Service
// ============================================================================

/// CRUD facade over the class, SID, object identity, and entry stores.
pub struct AclAdministrationService {
    store: Arc<dyn AclStore>,
    refresh: Option<Arc<dyn RefreshPublisher>>,
    metrics: Arc<dyn MetricsRecorder>,
    audit_enabled: bool,
    parent_depth_limit: usize,
}

impl AclAdministrationService {
    /// Create the service with no-op metrics, no refresh publisher, audit
    /// disabled, and the default parent depth limit.
    pub fn new(store: Arc<dyn AclStore>) -> Self {
        let defaults = AclConfig::default();
        Self {
            store,
            refresh: None,
            metrics: Arc::new(NoopMetrics),
            audit_enabled: false,
            parent_depth_limit: defaults.parent_depth_limit,
        }
    }

    /// Apply configuration toggles.
    pub fn with_config(mut self, config: &AclConfig) -> Self {
        self.audit_enabled = config.audit_enabled;
        self.parent_depth_limit = config.parent_depth_limit;
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

    // ------------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------------

    /// All registered classes.
    pub async fn list_classes(&self) -> Result<Vec<ClassRow>> {
        self.store.list_classes().await
    }

    /// Register a class by fully qualified name.
    pub async fn create_class(&self, class_name: &str) -> Result<ClassRow> {
        let class_name = class_name.trim();
        if class_name.is_empty() {
            return Err(Error::invalid_argument("class_name must not be blank"));
        }
        self.store.create_class(class_name).await
    }

    /// Delete a class row; fails while object identities still reference it.
    pub async fn delete_class(&self, id: i64) -> Result<()> {
        if !self.store.delete_class(id).await? {
            return Err(Error::missing_reference("class_id"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // SIDs
    // ------------------------------------------------------------------------

    /// All registered SIDs.
    pub async fn list_sids(&self) -> Result<Vec<SidRow>> {
        self.store.list_sids().await
    }

    /// Register a SID: a principal name or a granted authority string.
    pub async fn create_sid(&self, value: &str, principal: bool) -> Result<SidRow> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::invalid_argument("sid must not be blank"));
        }
        self.store.create_sid(value, principal).await
    }

    /// Delete a SID row along with every entry granted to it. Fails while
    /// object identities still name it as owner.
    pub async fn delete_sid(&self, id: i64) -> Result<u64> {
        if self.store.find_sid_by_id(id).await?.is_none() {
            return Err(Error::missing_reference("sid_id"));
        }
        // Owner references make the row delete fail; check before purging
        // entries so a refused delete leaves the store untouched.
        let owner_refs = self
            .store
            .list_object_identities()
            .await?
            .iter()
            .any(|row| row.owner_sid_id == Some(id));
        if owner_refs {
            return Err(Error::Constraint("owner_sid"));
        }
        let purged = self.store.delete_entries_by_sid(id).await?;
        self.store.delete_sid(id).await?;
        if purged > 0 {
            publish_refresh(&self.refresh);
        }
        Ok(purged)
    }

    // ------------------------------------------------------------------------
    // Object identities
    // ------------------------------------------------------------------------

    /// All object identity rows.
    pub async fn list_object_identities(&self) -> Result<Vec<ObjectIdentityRow>> {
        self.store.list_object_identities().await
    }

    /// Create an object identity row with explicit references.
    pub async fn create_object_identity(
        &self,
        request: &ObjectIdentityCreate,
    ) -> Result<ObjectIdentityRow> {
        let identifier = request.object_identifier.trim();
        if identifier.is_empty() {
            return Err(Error::invalid_argument(
                "object_identifier must not be blank",
            ));
        }
        if self.store.find_class_by_id(request.class_id).await?.is_none() {
            return Err(Error::missing_reference("class_id"));
        }
        if let Some(owner_sid_id) = request.owner_sid_id {
            if self.store.find_sid_by_id(owner_sid_id).await?.is_none() {
                return Err(Error::missing_reference("owner_sid_id"));
            }
        }
        if let Some(parent_id) = request.parent_id {
            self.check_parent_chain(parent_id).await?;
        }
        self.store
            .create_object_identity(&NewObjectIdentity {
                class_id: request.class_id,
                object_identifier: identifier.to_string(),
                parent_id: request.parent_id,
                owner_sid_id: request.owner_sid_id,
                entries_inheriting: request.entries_inheriting,
            })
            .await
    }

    /// Delete an object identity row; its entries go with it.
    pub async fn delete_object_identity(&self, id: i64) -> Result<()> {
        let had_entries = !self.store.list_entries(id).await?.is_empty();
        if !self.store.delete_object_identity(id).await? {
            return Err(Error::missing_reference("object_identity_id"));
        }
        if had_entries {
            publish_refresh(&self.refresh);
        }
        Ok(())
    }

    /// Walk the parent chain from a candidate parent, rejecting dangling
    /// references and chains longer than the configured limit. A cycle
    /// never terminates the walk, so the limit catches those too.
    async fn check_parent_chain(&self, parent_id: i64) -> Result<()> {
        let mut current = Some(parent_id);
        let mut depth = 0usize;
        while let Some(id) = current {
            if depth >= self.parent_depth_limit {
                return Err(warden_core::Error::ParentDepthExceeded(self.parent_depth_limit).into());
            }
            let Some(row) = self.store.find_object_identity_by_id(id).await? else {
                return Err(Error::missing_reference("parent_id"));
            };
            current = row.parent_id;
            depth += 1;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------------

    /// All entry rows for one object identity, ordered by ordinal.
    pub async fn list_entries(&self, object_identity_id: i64) -> Result<Vec<EntryRow>> {
        self.store.list_entries(object_identity_id).await
    }

    /// Every entry row in the store.
    pub async fn list_all_entries(&self) -> Result<Vec<EntryRow>> {
        self.store.list_all_entries().await
    }

    /// Create an entry row with explicit references and flags.
    pub async fn create_entry(&self, request: &EntryCreate) -> Result<EntryRow> {
        Permission::from_mask(request.mask)?;
        let Some(identity_row) = self
            .store
            .find_object_identity_by_id(request.object_identity_id)
            .await?
        else {
            return Err(Error::missing_reference("object_identity_id"));
        };
        let sid_row = match self.store.find_sid_by_id(request.sid_id).await? {
            Some(row) => row,
            None => return Err(Error::missing_reference("sid_id")),
        };
        let ace_order = match request.ace_order {
            Some(order) => {
                if order < 0 {
                    return Err(Error::invalid_argument("ace_order must not be negative"));
                }
                order
            }
            None => next_ace_order(self.store.as_ref(), identity_row.id).await?,
        };
        let started = Instant::now();
        let row = self
            .store
            .insert_entry(&NewEntry {
                object_identity_id: identity_row.id,
                sid_id: request.sid_id,
                ace_order,
                mask: request.mask,
                granting: request.granting,
                audit_success: request.audit_success,
                audit_failure: request.audit_failure,
            })
            .await?;
        publish_refresh(&self.refresh);
        record(&self.metrics, "admin_entry_create", started, 1);
        audit(
            self.audit_enabled,
            "admin_entry_create",
            &identity_row.to_identity()?,
            Some(&sid_row.to_sid()),
            &[request.mask],
            1,
        );
        Ok(row)
    }

    /// Delete one entry row by id.
    pub async fn delete_entry(&self, id: i64) -> Result<()> {
        let started = Instant::now();
        if !self.store.delete_entry(id).await? {
            record(&self.metrics, "admin_entry_delete", started, 0);
            return Err(Error::missing_reference("entry_id"));
        }
        publish_refresh(&self.refresh);
        record(&self.metrics, "admin_entry_delete", started, 1);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Policy projection
    // ------------------------------------------------------------------------

    /// The flattened policy view: one row per entry joined with its class,
    /// identifier, and SID, suitable for export or inspection.
    pub async fn list_policy(&self) -> Result<Vec<PolicyRow>> {
        self.store.list_policy_rows().await
    }
}

// ============================================================================
// Tests
// ============================================================================
