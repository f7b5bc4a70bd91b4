//! Behavioural equivalence tests for the two engine strategies over both
//! stores. Every case runs against each wiring; the strategies must be
//! indistinguishable through the [`PermissionService`] contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warden_acl::store::memory::MemoryAclStore;
use warden_acl::store::sqlite::SqliteAclStore;
use warden_acl::{
    AclStore, DelegatingPermissionService, PermissionService, RepositoryPermissionService,
    StoreAclBackend,
};
use warden_core::{masks, AclConfig, MetricsRecorder, ObjectIdentity, RefreshPublisher, Sid};

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Default)]
struct CountingRefresh {
    published: AtomicUsize,
}

impl RefreshPublisher for CountingRefresh {
    fn publish_after_commit(&self) {
        self.published.fetch_add(1, Ordering::SeqCst);
    }
}

struct CapturingLog {
    lines: Mutex<Vec<String>>,
}

static LOG_CAPTURE: CapturingLog = CapturingLog {
    lines: Mutex::new(Vec::new()),
};

impl log::Log for CapturingLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.lines.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

// Tests share one process-global logger; callers filter captured lines by a
// marker unique to their scenario.
fn install_log_capture() {
    let _ = log::set_logger(&LOG_CAPTURE);
    log::set_max_level(log::LevelFilter::Info);
}

fn audit_lines_mentioning(marker: &str) -> Vec<String> {
    LOG_CAPTURE
        .lines
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with("ACL_AUDIT") && line.contains(marker))
        .cloned()
        .collect()
}

#[derive(Default)]
struct RecordingMetrics {
    samples: Mutex<Vec<(String, u64)>>,
}

impl MetricsRecorder for RecordingMetrics {
    fn record(&self, operation: &str, _elapsed: Duration, count: u64) {
        self.samples
            .lock()
            .unwrap()
            .push((operation.to_string(), count));
    }
}

// ============================================================================
// Wirings
// ============================================================================

async fn all_services() -> Vec<(&'static str, Arc<dyn PermissionService>)> {
    let mut services: Vec<(&'static str, Arc<dyn PermissionService>)> = Vec::new();

    let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new());
    services.push((
        "repository/memory",
        Arc::new(RepositoryPermissionService::new(store)),
    ));

    let store: Arc<dyn AclStore> = Arc::new(SqliteAclStore::in_memory().await.unwrap());
    services.push((
        "repository/sqlite",
        Arc::new(RepositoryPermissionService::new(store)),
    ));

    let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new());
    services.push((
        "delegating/memory",
        Arc::new(
            DelegatingPermissionService::new(Arc::new(StoreAclBackend::new(Arc::clone(&store))))
                .with_store(store),
        ),
    ));

    let store: Arc<dyn AclStore> = Arc::new(SqliteAclStore::in_memory().await.unwrap());
    services.push((
        "delegating/sqlite",
        Arc::new(
            DelegatingPermissionService::new(Arc::new(StoreAclBackend::new(Arc::clone(&store))))
                .with_store(store),
        ),
    ));

    // Backend-only wiring exercises the per-permission fallback paths.
    let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new());
    services.push((
        "delegating/backend-only",
        Arc::new(DelegatingPermissionService::new(Arc::new(
            StoreAclBackend::new(store),
        ))),
    ));

    services
}

fn report(id: &str) -> ObjectIdentity {
    ObjectIdentity::new("com.example.Report", id).unwrap()
}

// ============================================================================
// Grant
// ============================================================================

#[tokio::test]
async fn test_grant_is_idempotent() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let alice = Sid::principal("alice").unwrap();

        let first = service
            .grant_permission(&identity, &alice, masks::READ)
            .await
            .unwrap();
        let second = service
            .grant_permission(&identity, &alice, masks::READ)
            .await
            .unwrap();

        assert_eq!(first.entries().len(), 1, "{name}");
        assert_eq!(second.entries().len(), 1, "{name}");
        assert_eq!(second.entries()[0].ace_order, 0, "{name}");
        assert!(second.is_granted(&[masks::READ], &[alice.clone()]), "{name}");
    }
}

#[tokio::test]
async fn test_grant_assigns_sequential_orders() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let alice = Sid::principal("alice").unwrap();

        for permission in [masks::READ, masks::WRITE, masks::CREATE] {
            service
                .grant_permission(&identity, &alice, permission)
                .await
                .unwrap();
        }

        let entries = service.list_permissions(&identity).await.unwrap();
        let orders: Vec<i32> = entries.iter().map(|e| e.ace_order).collect();
        assert_eq!(orders, vec![0, 1, 2], "{name}");
    }
}

#[tokio::test]
async fn test_bulk_grant_inserts_only_the_difference() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let alice = Sid::principal("alice").unwrap();

        let first = service
            .grant_permissions(&identity, &alice, &[masks::READ, masks::WRITE])
            .await
            .unwrap();
        let second = service
            .grant_permissions(&identity, &alice, &[masks::READ, masks::WRITE, masks::CREATE])
            .await
            .unwrap();

        assert_eq!(first, 2, "{name}");
        assert_eq!(second, 1, "{name}");
        let entries = service.list_permissions(&identity).await.unwrap();
        assert_eq!(entries.len(), 3, "{name}");
        // New entries continue after the existing maximum ordinal.
        assert_eq!(entries[2].permission, masks::CREATE, "{name}");
        assert_eq!(entries[2].ace_order, 2, "{name}");
    }
}

#[tokio::test]
async fn test_bulk_grant_deduplicates_requested_masks() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let alice = Sid::principal("alice").unwrap();

        let inserted = service
            .grant_permissions(&identity, &alice, &[masks::READ, masks::READ, masks::WRITE])
            .await
            .unwrap();

        assert_eq!(inserted, 2, "{name}");
    }
}

#[tokio::test]
async fn test_bulk_grant_rejects_empty_permission_set() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let alice = Sid::principal("alice").unwrap();
        assert!(
            service.grant_permissions(&identity, &alice, &[]).await.is_err(),
            "{name}"
        );
    }
}

// ============================================================================
// Revoke
// ============================================================================

#[tokio::test]
async fn test_revoke_removes_only_the_matching_mask() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let alice = Sid::principal("alice").unwrap();

        service
            .grant_permissions(&identity, &alice, &[masks::READ, masks::WRITE])
            .await
            .unwrap();
        let snapshot = service
            .revoke_permission(&identity, &alice, masks::WRITE)
            .await
            .unwrap()
            .unwrap();

        assert!(snapshot.is_granted(&[masks::READ], &[alice.clone()]), "{name}");
        assert!(!snapshot.is_granted(&[masks::WRITE], &[alice.clone()]), "{name}");
        assert_eq!(snapshot.entries().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn test_revoke_on_missing_acl_returns_none() {
    for (name, service) in all_services().await {
        let identity = report("nope");
        let alice = Sid::principal("alice").unwrap();
        let result = service
            .revoke_permission(&identity, &alice, masks::READ)
            .await
            .unwrap();
        assert!(result.is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_revoke_unknown_sid_leaves_acl_intact() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let alice = Sid::principal("alice").unwrap();
        let stranger = Sid::principal("stranger").unwrap();

        service
            .grant_permission(&identity, &alice, masks::READ)
            .await
            .unwrap();
        let snapshot = service
            .revoke_permission(&identity, &stranger, masks::READ)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snapshot.entries().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn test_bulk_revoke_counts_deleted_rows() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let alice = Sid::principal("alice").unwrap();

        service
            .grant_permissions(&identity, &alice, &[masks::READ, masks::WRITE, masks::CREATE])
            .await
            .unwrap();
        let deleted = service
            .revoke_permissions(&identity, &alice, &[masks::WRITE, masks::CREATE, masks::DELETE])
            .await
            .unwrap();

        assert_eq!(deleted, 2, "{name}");
        let entries = service.list_permissions(&identity).await.unwrap();
        assert_eq!(entries.len(), 1, "{name}");
        assert_eq!(entries[0].permission, masks::READ, "{name}");
    }
}

#[tokio::test]
async fn test_bulk_revoke_on_missing_acl_is_zero() {
    for (name, service) in all_services().await {
        let identity = report("nope");
        let alice = Sid::principal("alice").unwrap();
        let deleted = service
            .revoke_permissions(&identity, &alice, &[masks::READ])
            .await
            .unwrap();
        assert_eq!(deleted, 0, "{name}");
    }
}

// ============================================================================
// SID disambiguation
// ============================================================================

#[tokio::test]
async fn test_principal_and_authority_with_same_value_are_distinct() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let principal = Sid::principal("ops").unwrap();
        let authority = Sid::authority("ops").unwrap();

        service
            .grant_permission(&identity, &principal, masks::READ)
            .await
            .unwrap();
        let snapshot = service
            .grant_permission(&identity, &authority, masks::WRITE)
            .await
            .unwrap();

        assert_eq!(snapshot.entries().len(), 2, "{name}");
        assert!(snapshot.is_granted(&[masks::READ], &[principal.clone()]), "{name}");
        assert!(!snapshot.is_granted(&[masks::READ], &[authority.clone()]), "{name}");
        assert!(snapshot.is_granted(&[masks::WRITE], &[authority.clone()]), "{name}");
        assert!(!snapshot.is_granted(&[masks::WRITE], &[principal.clone()]), "{name}");
    }
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_delete_acl_removes_everything_and_orders_restart() {
    for (name, service) in all_services().await {
        let identity = report("1");
        let alice = Sid::principal("alice").unwrap();

        service
            .grant_permissions(&identity, &alice, &[masks::READ, masks::WRITE])
            .await
            .unwrap();
        service.delete_acl(&identity).await.unwrap();

        assert!(
            service.list_permissions(&identity).await.unwrap().is_empty(),
            "{name}"
        );

        let snapshot = service
            .grant_permission(&identity, &alice, masks::ADMINISTRATION)
            .await
            .unwrap();
        assert_eq!(snapshot.entries()[0].ace_order, 0, "{name}");
    }
}

#[tokio::test]
async fn test_delete_acl_on_missing_identity_is_a_no_op() {
    for (name, service) in all_services().await {
        let identity = report("nope");
        assert!(service.delete_acl(&identity).await.is_ok(), "{name}");
    }
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_on_unknown_identity_is_empty() {
    for (name, service) in all_services().await {
        let identity = report("nope");
        assert!(
            service.list_permissions(&identity).await.unwrap().is_empty(),
            "{name}"
        );
    }
}

// ============================================================================
// Full lifecycle
// ============================================================================

#[tokio::test]
async fn test_full_grant_revoke_delete_lifecycle() {
    for (name, service) in all_services().await {
        let identity = report(&uuid::Uuid::new_v4().to_string());
        let alice = Sid::principal("alice").unwrap();
        let auditors = Sid::authority("ROLE_AUDITOR").unwrap();

        service
            .grant_permission(&identity, &alice, masks::READ)
            .await
            .unwrap();
        service
            .grant_permission(&identity, &alice, masks::READ)
            .await
            .unwrap();
        let inserted = service
            .grant_permissions(
                &identity,
                &alice,
                &[masks::READ, masks::WRITE, masks::CREATE],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2, "{name}");

        service
            .grant_permission(&identity, &auditors, masks::READ)
            .await
            .unwrap();
        assert_eq!(service.list_permissions(&identity).await.unwrap().len(), 4, "{name}");

        let snapshot = service
            .revoke_permission(&identity, &alice, masks::WRITE)
            .await
            .unwrap()
            .unwrap();
        assert!(!snapshot.is_granted(&[masks::WRITE], &[alice.clone()]), "{name}");
        assert!(snapshot.is_granted(&[masks::READ], &[auditors.clone()]), "{name}");

        let deleted = service
            .revoke_permissions(&identity, &alice, &[masks::READ, masks::CREATE])
            .await
            .unwrap();
        assert_eq!(deleted, 2, "{name}");

        service.delete_acl(&identity).await.unwrap();
        assert!(
            service.list_permissions(&identity).await.unwrap().is_empty(),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_repeated_bulk_grant_then_partial_revoke() {
    for (name, service) in all_services().await {
        let identity = ObjectIdentity::new("Document", "42").unwrap();
        let alice = Sid::principal("alice").unwrap();

        let inserted = service
            .grant_permissions(&identity, &alice, &[masks::READ, masks::WRITE])
            .await
            .unwrap();
        assert_eq!(inserted, 2, "{name}");

        let inserted = service
            .grant_permissions(&identity, &alice, &[masks::READ, masks::WRITE])
            .await
            .unwrap();
        assert_eq!(inserted, 0, "{name}");

        let deleted = service
            .revoke_permissions(&identity, &alice, &[masks::READ])
            .await
            .unwrap();
        assert_eq!(deleted, 1, "{name}");

        let entries = service.list_permissions(&identity).await.unwrap();
        assert_eq!(entries.len(), 1, "{name}");
        assert_eq!(entries[0].permission, masks::WRITE, "{name}");
    }
}

// ============================================================================
// Collaborator signals
// ============================================================================

#[tokio::test]
async fn test_refresh_fires_only_on_effective_mutation() {
    let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new());
    let refresh = Arc::new(CountingRefresh::default());
    let service =
        RepositoryPermissionService::new(store)
            .with_refresh(Arc::clone(&refresh) as Arc<dyn RefreshPublisher>);

    let identity = report("1");
    let alice = Sid::principal("alice").unwrap();

    service
        .grant_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();
    assert_eq!(refresh.published.load(Ordering::SeqCst), 1);

    // Duplicate grant changes nothing, so no refresh.
    service
        .grant_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();
    assert_eq!(refresh.published.load(Ordering::SeqCst), 1);

    service
        .revoke_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();
    assert_eq!(refresh.published.load(Ordering::SeqCst), 2);

    // Revoke of an already-absent mask changes nothing.
    service
        .revoke_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();
    assert_eq!(refresh.published.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_metrics_record_operation_names_and_counts() {
    let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new());
    let metrics = Arc::new(RecordingMetrics::default());
    let service =
        RepositoryPermissionService::new(store)
            .with_metrics(Arc::clone(&metrics) as Arc<dyn MetricsRecorder>);

    let identity = report("1");
    let alice = Sid::principal("alice").unwrap();

    service
        .grant_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();
    service
        .grant_permissions(&identity, &alice, &[masks::READ, masks::WRITE])
        .await
        .unwrap();
    service
        .revoke_permissions(&identity, &alice, &[masks::READ, masks::WRITE])
        .await
        .unwrap();
    service.delete_acl(&identity).await.unwrap();

    let samples = metrics.samples.lock().unwrap().clone();
    assert_eq!(
        samples,
        vec![
            ("grant".to_string(), 1),
            ("bulk_grant".to_string(), 1),
            ("bulk_revoke".to_string(), 2),
            ("delete".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn test_audit_line_fires_only_when_enabled_and_effective() {
    install_log_capture();

    let marker = uuid::Uuid::new_v4().to_string();
    let identity = report(&marker);
    let alice = Sid::principal("alice").unwrap();

    let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new());
    let audited = RepositoryPermissionService::new(store).with_config(&AclConfig {
        audit_enabled: true,
        parent_depth_limit: 32,
    });

    audited
        .grant_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();
    // The duplicate grant changes no rows, so no audit line.
    audited
        .grant_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();

    let lines = audit_lines_mentioning(&marker);
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("action=grant"), "{}", lines[0]);
    assert!(
        lines[0].contains(&format!("identity=com.example.Report[{marker}]")),
        "{}",
        lines[0]
    );
    assert!(lines[0].contains("sid=principal:alice"), "{}", lines[0]);
    assert!(lines[0].contains("masks=[1]"), "{}", lines[0]);
    assert!(lines[0].contains("count=1"), "{}", lines[0]);

    audited
        .revoke_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();
    let lines = audit_lines_mentioning(&marker);
    assert_eq!(lines.len(), 2, "{lines:?}");
    assert!(lines[1].contains("action=revoke"), "{}", lines[1]);

    // With audit disabled (the default) the same mutations stay silent.
    let silent_marker = uuid::Uuid::new_v4().to_string();
    let silent_identity = report(&silent_marker);
    let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new());
    let silent = RepositoryPermissionService::new(store);
    silent
        .grant_permission(&silent_identity, &alice, masks::READ)
        .await
        .unwrap();
    silent.delete_acl(&silent_identity).await.unwrap();
    assert!(audit_lines_mentioning(&silent_marker).is_empty());
}

#[tokio::test]
async fn test_delegating_signals_match_repository() {
    let store: Arc<dyn AclStore> = Arc::new(MemoryAclStore::new());
    let refresh = Arc::new(CountingRefresh::default());
    let service = DelegatingPermissionService::new(Arc::new(StoreAclBackend::new(Arc::clone(
        &store,
    ))))
    .with_store(store)
    .with_config(&AclConfig::default())
    .with_refresh(Arc::clone(&refresh) as Arc<dyn RefreshPublisher>);

    let identity = report("1");
    let alice = Sid::principal("alice").unwrap();

    service
        .grant_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();
    service
        .grant_permission(&identity, &alice, masks::READ)
        .await
        .unwrap();
    assert_eq!(refresh.published.load(Ordering::SeqCst), 1);
}
