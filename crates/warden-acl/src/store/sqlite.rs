//! SQLite-backed ACL store.
//!
//! Owns the four relational tables from the ACL data model. Registry
//! resolve-or-create and grant insertion use `INSERT ... ON CONFLICT DO
//! NOTHING` keyed on the schema's uniqueness constraints, so concurrent
//! callers racing on the same row settle in the database rather than with a
//! read-then-write check.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use warden_core::{ObjectIdentity, Sid};

use crate::error::Result;
use crate::store::{
    AclStore, ClassRow, ClassStore, EntryRow, EntryStore, NewEntry, NewObjectIdentity,
    ObjectIdentityRow, ObjectIdentityStore, PolicyRow, SidRow, SidStore,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS acl_class (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        class_name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS acl_sid (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sid TEXT NOT NULL,
        principal INTEGER NOT NULL,
        UNIQUE (sid, principal)
    )",
    "CREATE TABLE IF NOT EXISTS acl_object_identity (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        object_id_class INTEGER NOT NULL REFERENCES acl_class (id),
        object_id_identity TEXT NOT NULL,
        parent_object INTEGER REFERENCES acl_object_identity (id),
        owner_sid INTEGER REFERENCES acl_sid (id),
        entries_inheriting INTEGER NOT NULL,
        UNIQUE (object_id_class, object_id_identity)
    )",
    "CREATE TABLE IF NOT EXISTS acl_entry (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        acl_object_identity INTEGER NOT NULL
            REFERENCES acl_object_identity (id) ON DELETE CASCADE,
        ace_order INTEGER NOT NULL,
        sid INTEGER NOT NULL REFERENCES acl_sid (id),
        mask INTEGER NOT NULL,
        granting INTEGER NOT NULL,
        audit_success INTEGER NOT NULL,
        audit_failure INTEGER NOT NULL,
        UNIQUE (acl_object_identity, sid, mask)
    )",
    "CREATE INDEX IF NOT EXISTS idx_acl_entry_order
        ON acl_entry (acl_object_identity, ace_order)",
];

const ENTRY_COLUMNS: &str = "e.id, e.acl_object_identity, e.sid AS sid_id, s.sid AS sid_value, \
     s.principal, e.ace_order, e.mask, e.granting, e.audit_success, e.audit_failure";

const IDENTITY_COLUMNS: &str = "oi.id, oi.object_id_class, c.class_name, oi.object_id_identity, \
     oi.parent_object, oi.owner_sid, oi.entries_inheriting";

/// SQLite-based ACL store.
pub struct SqliteAclStore {
    pool: Pool<Sqlite>,
}

impl SqliteAclStore {
    /// Open (creating if missing) an on-disk store and run migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));
        // SQLite permits limited write concurrency; a single connection avoids
        // persistent lock failures under concurrent transactions.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open an in-memory store and run migrations. Used in tests and
    /// ephemeral deployments.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // An in-memory database lives and dies with its connection; pin one
        // connection open for the pool's lifetime.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

fn class_from_row(row: &SqliteRow) -> ClassRow {
    ClassRow {
        id: row.get("id"),
        class_name: row.get("class_name"),
    }
}

fn sid_from_row(row: &SqliteRow) -> SidRow {
    SidRow {
        id: row.get("id"),
        sid: row.get("sid"),
        principal: row.get("principal"),
    }
}

fn identity_from_row(row: &SqliteRow) -> ObjectIdentityRow {
    ObjectIdentityRow {
        id: row.get("id"),
        class_id: row.get("object_id_class"),
        class_name: row.get("class_name"),
        object_identifier: row.get("object_id_identity"),
        parent_id: row.get("parent_object"),
        owner_sid_id: row.get("owner_sid"),
        entries_inheriting: row.get("entries_inheriting"),
    }
}

fn entry_from_row(row: &SqliteRow) -> EntryRow {
    EntryRow {
        id: row.get("id"),
        object_identity_id: row.get("acl_object_identity"),
        sid_id: row.get("sid_id"),
        sid: row.get("sid_value"),
        principal: row.get("principal"),
        ace_order: row.get("ace_order"),
        mask: row.get("mask"),
        granting: row.get("granting"),
        audit_success: row.get("audit_success"),
        audit_failure: row.get("audit_failure"),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[async_trait]
impl ClassStore for SqliteAclStore {
    async fn ensure_class(&self, class_name: &str) -> Result<ClassRow> {
        let trimmed = class_name.trim();
        sqlx::query("INSERT INTO acl_class (class_name) VALUES (?) ON CONFLICT (class_name) DO NOTHING")
            .bind(trimmed)
            .execute(&self.pool)
            .await?;
        let row = sqlx::query("SELECT id, class_name FROM acl_class WHERE class_name = ?")
            .bind(trimmed)
            .fetch_one(&self.pool)
            .await?;
        Ok(class_from_row(&row))
    }

    async fn find_class(&self, class_name: &str) -> Result<Option<ClassRow>> {
        let row = sqlx::query("SELECT id, class_name FROM acl_class WHERE class_name = ?")
            .bind(class_name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(class_from_row))
    }

    async fn find_class_by_id(&self, id: i64) -> Result<Option<ClassRow>> {
        let row = sqlx::query("SELECT id, class_name FROM acl_class WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(class_from_row))
    }

    async fn list_classes(&self) -> Result<Vec<ClassRow>> {
        let rows = sqlx::query("SELECT id, class_name FROM acl_class ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(class_from_row).collect())
    }

    async fn create_class(&self, class_name: &str) -> Result<ClassRow> {
        let result = sqlx::query("INSERT INTO acl_class (class_name) VALUES (?)")
            .bind(class_name.trim())
            .execute(&self.pool)
            .await?;
        let row = sqlx::query("SELECT id, class_name FROM acl_class WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(class_from_row(&row))
    }

    async fn delete_class(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM acl_class WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SidStore for SqliteAclStore {
    async fn ensure_sid(&self, sid: &Sid) -> Result<SidRow> {
        sqlx::query(
            "INSERT INTO acl_sid (sid, principal) VALUES (?, ?)
             ON CONFLICT (sid, principal) DO NOTHING",
        )
        .bind(sid.value())
        .bind(sid.is_principal())
        .execute(&self.pool)
        .await?;
        let row = sqlx::query("SELECT id, sid, principal FROM acl_sid WHERE sid = ? AND principal = ?")
            .bind(sid.value())
            .bind(sid.is_principal())
            .fetch_one(&self.pool)
            .await?;
        Ok(sid_from_row(&row))
    }

    async fn find_sid(&self, sid: &Sid) -> Result<Option<SidRow>> {
        let row = sqlx::query("SELECT id, sid, principal FROM acl_sid WHERE sid = ? AND principal = ?")
            .bind(sid.value())
            .bind(sid.is_principal())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(sid_from_row))
    }

    async fn find_sid_by_id(&self, id: i64) -> Result<Option<SidRow>> {
        let row = sqlx::query("SELECT id, sid, principal FROM acl_sid WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(sid_from_row))
    }

    async fn list_sids(&self) -> Result<Vec<SidRow>> {
        let rows = sqlx::query("SELECT id, sid, principal FROM acl_sid ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(sid_from_row).collect())
    }

    async fn create_sid(&self, value: &str, principal: bool) -> Result<SidRow> {
        let result = sqlx::query("INSERT INTO acl_sid (sid, principal) VALUES (?, ?)")
            .bind(value)
            .bind(principal)
            .execute(&self.pool)
            .await?;
        let row = sqlx::query("SELECT id, sid, principal FROM acl_sid WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(sid_from_row(&row))
    }

    async fn delete_sid(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM acl_sid WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ObjectIdentityStore for SqliteAclStore {
    async fn ensure_object_identity(
        &self,
        identity: &ObjectIdentity,
    ) -> Result<ObjectIdentityRow> {
        let class = self.ensure_class(identity.class()).await?;
        sqlx::query(
            "INSERT INTO acl_object_identity
                 (object_id_class, object_id_identity, entries_inheriting)
             VALUES (?, ?, 1)
             ON CONFLICT (object_id_class, object_id_identity) DO NOTHING",
        )
        .bind(class.id)
        .bind(identity.identifier())
        .execute(&self.pool)
        .await?;
        let row = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS}
             FROM acl_object_identity oi
             JOIN acl_class c ON c.id = oi.object_id_class
             WHERE oi.object_id_class = ? AND oi.object_id_identity = ?"
        ))
        .bind(class.id)
        .bind(identity.identifier())
        .fetch_one(&self.pool)
        .await?;
        Ok(identity_from_row(&row))
    }

    async fn find_object_identity(
        &self,
        identity: &ObjectIdentity,
    ) -> Result<Option<ObjectIdentityRow>> {
        let row = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS}
             FROM acl_object_identity oi
             JOIN acl_class c ON c.id = oi.object_id_class
             WHERE c.class_name = ? AND oi.object_id_identity = ?"
        ))
        .bind(identity.class())
        .bind(identity.identifier())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(identity_from_row))
    }

    async fn find_object_identity_by_id(&self, id: i64) -> Result<Option<ObjectIdentityRow>> {
        let row = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS}
             FROM acl_object_identity oi
             JOIN acl_class c ON c.id = oi.object_id_class
             WHERE oi.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(identity_from_row))
    }

    async fn list_object_identities(&self) -> Result<Vec<ObjectIdentityRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS}
             FROM acl_object_identity oi
             JOIN acl_class c ON c.id = oi.object_id_class
             ORDER BY oi.id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(identity_from_row).collect())
    }

    async fn create_object_identity(
        &self,
        new: &NewObjectIdentity,
    ) -> Result<ObjectIdentityRow> {
        let result = sqlx::query(
            "INSERT INTO acl_object_identity
                 (object_id_class, object_id_identity, parent_object, owner_sid, entries_inheriting)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new.class_id)
        .bind(&new.object_identifier)
        .bind(new.parent_id)
        .bind(new.owner_sid_id)
        .bind(new.entries_inheriting)
        .execute(&self.pool)
        .await?;
        let row = sqlx::query(&format!(
            "SELECT {IDENTITY_COLUMNS}
             FROM acl_object_identity oi
             JOIN acl_class c ON c.id = oi.object_id_class
             WHERE oi.id = ?"
        ))
        .bind(result.last_insert_rowid())
        .fetch_one(&self.pool)
        .await?;
        Ok(identity_from_row(&row))
    }

    async fn delete_object_identity(&self, id: i64) -> Result<bool> {
        // Entries go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM acl_object_identity WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl EntryStore for SqliteAclStore {
    async fn existing_masks(
        &self,
        object_identity_id: i64,
        sid_id: i64,
        masks: &[i32],
    ) -> Result<Vec<i32>> {
        if masks.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT mask FROM acl_entry
             WHERE acl_object_identity = ? AND sid = ? AND granting = 1
               AND mask IN ({})",
            placeholders(masks.len())
        );
        let mut query = sqlx::query(&sql).bind(object_identity_id).bind(sid_id);
        for mask in masks {
            query = query.bind(mask);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| row.get("mask")).collect())
    }

    async fn max_ace_order(&self, object_identity_id: i64) -> Result<Option<i32>> {
        let row = sqlx::query("SELECT MAX(ace_order) AS max_order FROM acl_entry WHERE acl_object_identity = ?")
            .bind(object_identity_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("max_order"))
    }

    async fn insert_entry_if_absent(&self, entry: &NewEntry) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO acl_entry
                 (acl_object_identity, ace_order, sid, mask, granting, audit_success, audit_failure)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (acl_object_identity, sid, mask) DO NOTHING",
        )
        .bind(entry.object_identity_id)
        .bind(entry.ace_order)
        .bind(entry.sid_id)
        .bind(entry.mask)
        .bind(entry.granting)
        .bind(entry.audit_success)
        .bind(entry.audit_failure)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_entries(&self, entries: &[NewEntry]) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        // One statement for the whole batch; conflicts fall out via the
        // uniqueness constraint instead of a prior existence check.
        let values = vec!["(?, ?, ?, ?, ?, ?, ?)"; entries.len()].join(", ");
        let sql = format!(
            "INSERT INTO acl_entry
                 (acl_object_identity, ace_order, sid, mask, granting, audit_success, audit_failure)
             VALUES {values}
             ON CONFLICT (acl_object_identity, sid, mask) DO NOTHING"
        );
        let mut query = sqlx::query(&sql);
        for entry in entries {
            query = query
                .bind(entry.object_identity_id)
                .bind(entry.ace_order)
                .bind(entry.sid_id)
                .bind(entry.mask)
                .bind(entry.granting)
                .bind(entry.audit_success)
                .bind(entry.audit_failure);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert_entry(&self, entry: &NewEntry) -> Result<EntryRow> {
        let result = sqlx::query(
            "INSERT INTO acl_entry
                 (acl_object_identity, ace_order, sid, mask, granting, audit_success, audit_failure)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.object_identity_id)
        .bind(entry.ace_order)
        .bind(entry.sid_id)
        .bind(entry.mask)
        .bind(entry.granting)
        .bind(entry.audit_success)
        .bind(entry.audit_failure)
        .execute(&self.pool)
        .await?;
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM acl_entry e JOIN acl_sid s ON s.id = e.sid WHERE e.id = ?"
        ))
        .bind(result.last_insert_rowid())
        .fetch_one(&self.pool)
        .await?;
        Ok(entry_from_row(&row))
    }

    async fn delete_entries_by_masks(
        &self,
        object_identity_id: i64,
        sid_id: i64,
        masks: &[i32],
    ) -> Result<u64> {
        if masks.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM acl_entry
             WHERE acl_object_identity = ? AND sid = ? AND granting = 1
               AND mask IN ({})",
            placeholders(masks.len())
        );
        let mut query = sqlx::query(&sql).bind(object_identity_id).bind(sid_id);
        for mask in masks {
            query = query.bind(mask);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_entries_by_sid(&self, sid_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM acl_entry WHERE sid = ?")
            .bind(sid_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_entry(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM acl_entry WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_entries(&self, object_identity_id: i64) -> Result<Vec<EntryRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS}
             FROM acl_entry e
             JOIN acl_sid s ON s.id = e.sid
             WHERE e.acl_object_identity = ?
             ORDER BY e.ace_order ASC"
        ))
        .bind(object_identity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn list_all_entries(&self) -> Result<Vec<EntryRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS}
             FROM acl_entry e
             JOIN acl_sid s ON s.id = e.sid
             ORDER BY e.id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn list_policy_rows(&self) -> Result<Vec<PolicyRow>> {
        let rows = sqlx::query(
            "SELECT c.class_name, oi.object_id_identity, s.sid, s.principal, e.mask, e.granting
             FROM acl_entry e
             JOIN acl_object_identity oi ON oi.id = e.acl_object_identity
             JOIN acl_class c ON c.id = oi.object_id_class
             JOIN acl_sid s ON s.id = e.sid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| PolicyRow {
                class_name: row.get("class_name"),
                object_identifier: row.get("object_id_identity"),
                sid: row.get("sid"),
                principal: row.get("principal"),
                mask: row.get("mask"),
                granting: row.get("granting"),
            })
            .collect())
    }
}

#[async_trait]
impl AclStore for SqliteAclStore {
    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::next_ace_order;

    async fn store() -> SqliteAclStore {
        SqliteAclStore::in_memory().await.unwrap()
    }

    fn identity() -> ObjectIdentity {
        ObjectIdentity::new("Document", "42").unwrap()
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let store = store().await;
        store.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_class_settles_on_one_row() {
        let store = store().await;
        let a = store.ensure_class("Document").await.unwrap();
        let b = store.ensure_class(" Document ").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.list_classes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sid_unique_on_value_and_flag() {
        let store = store().await;
        let user = store.ensure_sid(&Sid::principal("alice").unwrap()).await.unwrap();
        let role = store.ensure_sid(&Sid::authority("alice").unwrap()).await.unwrap();
        assert_ne!(user.id, role.id);
        assert!(store.create_sid("alice", true).await.is_err());
    }

    #[tokio::test]
    async fn test_conditional_entry_insert() {
        let store = store().await;
        let oid = store.ensure_object_identity(&identity()).await.unwrap();
        let sid = store.ensure_sid(&Sid::principal("alice").unwrap()).await.unwrap();
        let entry = NewEntry::granting(oid.id, sid.id, 0, 1);
        assert!(store.insert_entry_if_absent(&entry).await.unwrap());
        assert!(!store.insert_entry_if_absent(&entry).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_insert_counts_only_new_rows() {
        let store = store().await;
        let oid = store.ensure_object_identity(&identity()).await.unwrap();
        let sid = store.ensure_sid(&Sid::principal("alice").unwrap()).await.unwrap();
        store
            .insert_entry_if_absent(&NewEntry::granting(oid.id, sid.id, 0, 1))
            .await
            .unwrap();
        let inserted = store
            .insert_entries(&[
                NewEntry::granting(oid.id, sid.id, 1, 1),
                NewEntry::granting(oid.id, sid.id, 1, 2),
                NewEntry::granting(oid.id, sid.id, 2, 4),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.list_entries(oid.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cascade_delete_from_identity() {
        let store = store().await;
        let oid = store.ensure_object_identity(&identity()).await.unwrap();
        let sid = store.ensure_sid(&Sid::principal("alice").unwrap()).await.unwrap();
        store
            .insert_entry_if_absent(&NewEntry::granting(oid.id, sid.id, 0, 1))
            .await
            .unwrap();
        assert!(store.delete_object_identity(oid.id).await.unwrap());
        assert!(store.list_entries(oid.id).await.unwrap().is_empty());
        assert!(store.list_all_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_max_ace_order_none_for_empty() {
        let store = store().await;
        let oid = store.ensure_object_identity(&identity()).await.unwrap();
        assert_eq!(store.max_ace_order(oid.id).await.unwrap(), None);
        assert_eq!(next_ace_order(&store, oid.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_existing_masks_filters_requested_set() {
        let store = store().await;
        let oid = store.ensure_object_identity(&identity()).await.unwrap();
        let sid = store.ensure_sid(&Sid::principal("alice").unwrap()).await.unwrap();
        store
            .insert_entries(&[
                NewEntry::granting(oid.id, sid.id, 0, 1),
                NewEntry::granting(oid.id, sid.id, 1, 2),
            ])
            .await
            .unwrap();
        let mut masks = store.existing_masks(oid.id, sid.id, &[1, 2, 4]).await.unwrap();
        masks.sort_unstable();
        assert_eq!(masks, vec![1, 2]);
        assert!(store.existing_masks(oid.id, sid.id, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acl.db");
        {
            let store = SqliteAclStore::connect(&path).await.unwrap();
            store.ensure_class("Document").await.unwrap();
        }
        let store = SqliteAclStore::connect(&path).await.unwrap();
        assert!(store.find_class("Document").await.unwrap().is_some());
    }
}
