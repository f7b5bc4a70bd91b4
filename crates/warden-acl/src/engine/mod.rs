//! The permission engine contract and the pieces shared by both strategies.
//!
//! Two implementations exist and behave identically for every operation:
//!
//! - [`repository::RepositoryPermissionService`] resolves classes, SIDs,
//!   identities, and entries itself through an [`AclStore`].
//! - [`delegating::DelegatingPermissionService`] wraps an external
//!   [`delegating::AclBackend`] and layers idempotency, audit, and metrics on
//!   top of it.
//!
//! Picking one is a wiring decision made at construction time, driven by
//! which collaborators a deployment has available.

pub mod delegating;
pub mod repository;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use warden_core::{
    AclEntry, AclSnapshot, MetricsRecorder, ObjectIdentity, Permission, RefreshPublisher, Sid,
};

use crate::error::{Error, Result};
use crate::store::{next_ace_order, AclStore, EntryRow, NewEntry, ObjectIdentityRow};

// ============================================================================
// Contract
// ============================================================================

/// Grant, revoke, enumerate, and delete per-object permissions.
///
/// Identity, SID, and permission arguments arrive pre-validated by their
/// constructors; the engine additionally rejects empty permission sets.
/// Every operation records one metric sample whether or not rows changed.
#[async_trait]
pub trait PermissionService: Send + Sync {
    /// Grant one permission, creating registry rows as needed.
    ///
    /// Idempotent: when the granting entry already exists the stored state is
    /// untouched, a zero-count metric is recorded, and the current snapshot
    /// is returned.
    async fn grant_permission(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permission: Permission,
    ) -> Result<AclSnapshot>;

    /// Grant a set of permissions, inserting only the masks not already
    /// granted, in one batch. Returns the number of entries inserted.
    async fn grant_permissions(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permissions: &[Permission],
    ) -> Result<u64>;

    /// Remove every granting entry matching the identity, SID, and mask.
    ///
    /// Returns `None` (with a warning logged) when the identity has no ACL;
    /// otherwise the updated, possibly empty, snapshot.
    async fn revoke_permission(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permission: Permission,
    ) -> Result<Option<AclSnapshot>>;

    /// Batch-delete entries whose mask is in the set. Returns the
    /// affected-row count; 0 when the identity or SID is unknown.
    async fn revoke_permissions(
        &self,
        identity: &ObjectIdentity,
        sid: &Sid,
        permissions: &[Permission],
    ) -> Result<u64>;

    /// Entries for the identity ordered by `ace_order` ascending; empty for
    /// an unknown identity.
    async fn list_permissions(&self, identity: &ObjectIdentity) -> Result<Vec<AclEntry>>;

    /// Remove the identity and all its entries. A no-op when the identity
    /// does not exist.
    async fn delete_acl(&self, identity: &ObjectIdentity) -> Result<()>;
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Distinct masks of a non-empty permission set, in first-seen order.
pub(crate) fn distinct_masks(permissions: &[Permission]) -> Result<Vec<i32>> {
    if permissions.is_empty() {
        return Err(Error::invalid_argument("permissions"));
    }
    let mut masks = Vec::with_capacity(permissions.len());
    for permission in permissions {
        let mask = permission.mask();
        if !masks.contains(&mask) {
            masks.push(mask);
        }
    }
    Ok(masks)
}

/// Convert stored entry rows into the model view.
pub(crate) fn rows_to_entries(rows: &[EntryRow]) -> Result<Vec<AclEntry>> {
    rows.iter().map(EntryRow::to_entry).collect()
}

/// Re-derive the snapshot for a stored identity from its current entries.
pub(crate) async fn build_snapshot(
    store: &dyn AclStore,
    row: &ObjectIdentityRow,
) -> Result<AclSnapshot> {
    let entries = rows_to_entries(&store.list_entries(row.id).await?)?;
    Ok(AclSnapshot::new(
        row.to_identity()?,
        row.entries_inheriting,
        entries,
    ))
}

/// The shared bulk-grant diff: resolve-or-create the registries, query the
/// already-granted subset in one call, then batch-insert the remainder with
/// ordinals assigned sequentially from the running maximum. Returns the
/// inserted-row count and the masks that were actually inserted.
pub(crate) async fn bulk_grant(
    store: &dyn AclStore,
    identity: &ObjectIdentity,
    sid: &Sid,
    masks: &[i32],
) -> Result<(u64, Vec<i32>)> {
    let identity_row = store.ensure_object_identity(identity).await?;
    let sid_row = store.ensure_sid(sid).await?;
    let existing = store.existing_masks(identity_row.id, sid_row.id, masks).await?;
    let mut order = next_ace_order(store, identity_row.id).await?;
    let mut pending = Vec::new();
    for &mask in masks {
        if existing.contains(&mask) {
            continue;
        }
        pending.push(NewEntry::granting(identity_row.id, sid_row.id, order, mask));
        order += 1;
    }
    if pending.is_empty() {
        return Ok((0, Vec::new()));
    }
    let inserted_masks: Vec<i32> = pending.iter().map(|entry| entry.mask).collect();
    let inserted = store.insert_entries(&pending).await?;
    Ok((inserted, inserted_masks))
}

/// The shared bulk-revoke: one mask-set delete, 0 when the identity or SID
/// is unknown.
pub(crate) async fn bulk_revoke(
    store: &dyn AclStore,
    identity: &ObjectIdentity,
    sid: &Sid,
    masks: &[i32],
) -> Result<u64> {
    let Some(identity_row) = store.find_object_identity(identity).await? else {
        return Ok(0);
    };
    let Some(sid_row) = store.find_sid(sid).await? else {
        return Ok(0);
    };
    store
        .delete_entries_by_masks(identity_row.id, sid_row.id, masks)
        .await
}

/// Emit one structured audit line for an effective mutation.
pub(crate) fn audit(
    enabled: bool,
    action: &str,
    identity: &ObjectIdentity,
    sid: Option<&Sid>,
    masks: &[i32],
    count: u64,
) {
    if !enabled || !log::log_enabled!(log::Level::Info) {
        return;
    }
    let sid = sid.map_or_else(|| "none".to_string(), Sid::to_string);
    log::info!("ACL_AUDIT action={action} identity={identity} sid={sid} masks={masks:?} count={count}");
}

/// Record one metric sample against a start instant.
pub(crate) fn record(
    metrics: &Arc<dyn MetricsRecorder>,
    operation: &str,
    started: Instant,
    count: u64,
) {
    metrics.record(operation, started.elapsed(), count);
}

/// Invoke the refresh publisher when one is wired.
pub(crate) fn publish_refresh(refresh: &Option<Arc<dyn RefreshPublisher>>) {
    if let Some(publisher) = refresh {
        publisher.publish_after_commit();
    }
}
