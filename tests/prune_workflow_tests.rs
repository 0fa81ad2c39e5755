//! End-to-end Prune Workflow Tests
//!
//! Full runs against in-memory records and either in-memory or on-disk
//! storage, covering report contents, remediation policies, orphan removal,
//! and convergence on re-run.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use prune_uploads::output::render_text;
use prune_uploads::services::DEFAULT_EXCLUDE_DIRS;
use prune_uploads::testing::{InMemoryRecordRepository, InMemoryStorage};
use prune_uploads::{
    Action, AttributeKey, DirExclusions, FileAttribute, LocalStorage, PruneError, PruneOptions,
    PruneReport, PruneService, RecordId, RecordType, SchemaRegistry, StorageBackend,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn document_schema() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            RecordType::new("Document", "documents"),
            vec![
                FileAttribute::new("file", true),
                FileAttribute::new("cover", false),
            ],
        )
        .expect("register Document");
    registry
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn options() -> PruneOptions {
    PruneOptions {
        exclusions: DirExclusions::new(DEFAULT_EXCLUDE_DIRS).expect("default exclusions"),
        ..PruneOptions::default()
    }
}

/// Two documents referencing `a.pdf` and `b.pdf`
fn seeded_records() -> Arc<InMemoryRecordRepository> {
    let repo = Arc::new(InMemoryRecordRepository::new());
    repo.insert("Document", "1", &[("file", "a.pdf")]);
    repo.insert("Document", "2", &[("file", "b.pdf")]);
    repo
}

fn memory_storage(files: &[&str]) -> Arc<InMemoryStorage> {
    let storage = Arc::new(InMemoryStorage::new(PathBuf::from("/srv/media")));
    storage.add_files(files.iter().copied());
    storage
}

fn service(
    records: Arc<InMemoryRecordRepository>,
    storage: Arc<dyn StorageBackend>,
) -> PruneService {
    PruneService::new(Arc::new(document_schema()), records, storage)
}

fn missing_paths(report: &PruneReport, key: &AttributeKey) -> Vec<String> {
    report
        .missing
        .iter()
        .find(|g| &g.key == key)
        .map(|g| g.paths.clone())
        .unwrap_or_default()
}

// ============================================================================
// Missing Files
// ============================================================================

#[tokio::test]
async fn test_report_only_lists_missing_without_mutation() {
    let records = seeded_records();
    let storage = memory_storage(&["a.pdf"]);

    let report = service(records.clone(), storage)
        .run(&options())
        .await
        .expect("run should succeed");

    assert_eq!(report.known_count, 2);
    assert_eq!(report.existing_count, 1);
    assert_eq!(report.missing_count, 1);
    assert_eq!(
        missing_paths(&report, &AttributeKey::new("Document", "file")),
        names(&["b.pdf"])
    );
    assert!(report.actions.is_empty());
    assert_eq!(records.mutation_count(), 0);
    assert_eq!(records.value("Document", "2", "file").as_deref(), Some("b.pdf"));
}

#[tokio::test]
async fn test_blank_missing_clears_attribute_and_converges() {
    let records = seeded_records();
    let storage = memory_storage(&["a.pdf"]);
    let svc = service(records.clone(), storage);

    let opts = PruneOptions {
        blank_missing: names(&["Document.file"]),
        ..options()
    };
    let report = svc.run(&opts).await.expect("first run");

    assert_eq!(
        report.actions,
        vec![Action::Blanked {
            record_type: "Document".to_string(),
            attribute: "file".to_string(),
            id: RecordId::from("2"),
            path: "b.pdf".to_string(),
        }]
    );
    assert!(report.missing.is_empty());
    assert_eq!(records.value("Document", "2", "file").as_deref(), Some(""));

    let text = render_text(&report, 1);
    assert!(text.contains("Emptying Document.file of 2 (b.pdf)"));

    let rerun = svc.run(&opts).await.expect("second run");
    assert_eq!(rerun.missing_count, 0);
    assert_eq!(rerun.known_count, 1);
    assert!(rerun.actions.is_empty());
}

#[tokio::test]
async fn test_delete_invalid_takes_precedence_over_blank() {
    let records = seeded_records();
    let storage = memory_storage(&["a.pdf"]);

    let report = service(records.clone(), storage)
        .run(&PruneOptions {
            blank_missing: names(&["document.file"]),
            delete_invalid: names(&["DOCUMENT.FILE"]),
            ..options()
        })
        .await
        .expect("run should succeed");

    assert_eq!(report.actions.len(), 1);
    assert!(matches!(report.actions[0], Action::DeletedRecord { .. }));
    assert!(!report
        .actions
        .iter()
        .any(|a| matches!(a, Action::Blanked { .. })));
    assert!(!records.exists("Document", "2"));
    assert!(records.exists("Document", "1"));
    assert_eq!(records.call_count("update"), 0);
}

#[tokio::test]
async fn test_blank_on_non_empty_attribute_is_reported_instead() {
    let records = Arc::new(InMemoryRecordRepository::new());
    records.insert("Document", "1", &[("file", "a.pdf"), ("cover", "covers/1.jpg")]);
    let storage = memory_storage(&["a.pdf"]);

    let report = service(records.clone(), storage)
        .run(&PruneOptions {
            blank_missing: names(&["document.cover"]),
            ..options()
        })
        .await
        .expect("run should succeed");

    assert!(report.actions.is_empty());
    assert_eq!(report.downgraded, vec![AttributeKey::new("Document", "cover")]);
    assert_eq!(
        missing_paths(&report, &AttributeKey::new("Document", "cover")),
        names(&["covers/1.jpg"])
    );
    assert_eq!(records.mutation_count(), 0);
}

#[tokio::test]
async fn test_records_removed_by_cascade_do_not_abort_the_run() {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            RecordType::new("Folder", "folders"),
            vec![FileAttribute::new("cover", false)],
        )
        .expect("register Folder");
    registry
        .register(
            RecordType::new("Document", "documents"),
            vec![FileAttribute::new("file", true)],
        )
        .expect("register Document");

    let records = Arc::new(InMemoryRecordRepository::new());
    records.insert("Folder", "1", &[("cover", "a-folder.jpg")]);
    records.insert("Document", "1", &[("file", "b-doc.pdf")]);
    records.insert("Document", "2", &[("file", "c-doc.pdf")]);
    records.cascade("Folder", "Document");
    let storage = memory_storage(&[]);

    let svc = PruneService::new(Arc::new(registry), records.clone(), storage);
    let opts = PruneOptions {
        delete_invalid: names(&["folder.cover", "document.file"]),
        ..options()
    };

    let report = svc.run(&opts).await.expect("cascaded delete should not fail");
    assert_eq!(report.missing_count, 3);
    assert_eq!(
        report.actions,
        vec![
            Action::DeletedRecord {
                record_type: "Folder".to_string(),
                attribute: "cover".to_string(),
                id: RecordId::from("1"),
                path: "a-folder.jpg".to_string(),
            },
            Action::DeletedRecord {
                record_type: "Document".to_string(),
                attribute: "file".to_string(),
                id: RecordId::from("2"),
                path: "c-doc.pdf".to_string(),
            },
        ]
    );
    assert!(!records.exists("Document", "1"));
    assert!(!records.exists("Document", "2"));
    assert_eq!(records.call_count("delete"), 3);

    let rerun = svc.run(&opts).await.expect("second run");
    assert_eq!(rerun.known_count, 0);
    assert!(rerun.actions.is_empty());
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[tokio::test]
async fn test_unknown_field_fails_before_any_read_or_scan() {
    for (blank, delete) in [
        (names(&["unknownEntity.field"]), vec![]),
        (vec![], names(&["unknownEntity.field"])),
    ] {
        let records = seeded_records();
        let storage = memory_storage(&["a.pdf", "orphan.pdf"]);

        let err = service(records.clone(), storage.clone())
            .run(&PruneOptions {
                blank_missing: blank,
                delete_invalid: delete,
                delete_orphans: true,
                ..options()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PruneError::Configuration(_)));
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("unknownentity.field"));
        assert!(records.calls().is_empty());
        assert_eq!(storage.call_count("walk"), 0);
        assert_eq!(storage.call_count("remove"), 0);
    }
}

#[tokio::test]
async fn test_all_unknown_fields_reported_together() {
    let err = service(seeded_records(), memory_storage(&[]))
        .run(&PruneOptions {
            blank_missing: names(&["a.b", "document.file"]),
            delete_invalid: names(&["c.d"]),
            ..options()
        })
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("a.b"));
    assert!(message.contains("c.d"));
    assert!(!message.contains("document.file"));
}

// ============================================================================
// Storage
// ============================================================================

#[tokio::test]
async fn test_unreadable_storage_aborts_before_mutation() {
    let records = seeded_records();
    let storage = memory_storage(&["a.pdf"]);
    storage.set_unreadable(true);

    let err = service(records.clone(), storage)
        .run(&PruneOptions {
            delete_invalid: names(&["document.file"]),
            ..options()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PruneError::StorageAccess(_)));
    assert_eq!(records.mutation_count(), 0);
    assert!(records.exists("Document", "1"));
    assert!(records.exists("Document", "2"));
}

#[tokio::test]
async fn test_orphans_reported_then_deleted_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a.pdf"), b"a").unwrap();
    fs::write(dir.path().join("b.pdf"), b"b").unwrap();
    fs::write(dir.path().join("orphan.pdf"), b"o").unwrap();
    fs::create_dir_all(dir.path().join("__cache__")).unwrap();
    fs::write(dir.path().join("__cache__/thumb.jpg"), b"t").unwrap();

    let records = seeded_records();
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(dir.path()));
    let svc = service(records, storage);

    let report = svc.run(&options()).await.expect("report run");
    assert_eq!(report.orphan_count, 1);
    assert_eq!(report.orphans, names(&["orphan.pdf"]));
    assert_eq!(report.existing_count, 3);
    assert!(dir.path().join("orphan.pdf").exists());
    assert!(render_text(&report, 1).contains("Media files not in DB: 1"));

    let report = svc
        .run(&PruneOptions {
            delete_orphans: true,
            ..options()
        })
        .await
        .expect("delete run");
    assert_eq!(
        report.actions,
        vec![Action::DeletedFile {
            path: "orphan.pdf".to_string()
        }]
    );
    assert!(!dir.path().join("orphan.pdf").exists());
    assert!(dir.path().join("__cache__/thumb.jpg").exists());
    assert!(render_text(&report, 1).contains("Deleting orphan.pdf"));
}

#[tokio::test]
async fn test_orphan_removal_failure_keeps_earlier_effects() {
    let records = seeded_records();
    let storage = memory_storage(&["a.pdf", "o1.pdf", "o2.pdf", "o3.pdf"]);
    storage.fail_remove("o2.pdf");

    let err = service(records.clone(), storage.clone())
        .run(&PruneOptions {
            delete_invalid: names(&["document.file"]),
            delete_orphans: true,
            ..options()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PruneError::StorageAccess(_)));
    // Remediation ran before orphan removal and stays applied
    assert!(!records.exists("Document", "2"));
    assert!(!storage.contains("o1.pdf"));
    assert!(storage.contains("o2.pdf"));
    assert!(storage.contains("o3.pdf"));
}

#[tokio::test]
async fn test_repository_failure_surfaces_context() {
    let records = seeded_records();
    records.insert("Document", "3", &[("file", "c.pdf")]);
    records.fail_on("update", "3");
    let storage = memory_storage(&["a.pdf", "orphan.pdf"]);

    let err = service(records.clone(), storage.clone())
        .run(&PruneOptions {
            blank_missing: names(&["document.file"]),
            delete_orphans: true,
            ..options()
        })
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "REPOSITORY_ERROR");
    let message = err.to_string();
    assert!(message.contains("Document.file"));
    assert!(message.contains("c.pdf"));
    assert!(message.contains('3'));

    // b.pdf sorts first and was blanked before the failure
    assert_eq!(records.value("Document", "2", "file").as_deref(), Some(""));
    // Orphan removal never started
    assert!(storage.contains("orphan.pdf"));
    assert_eq!(storage.call_count("remove"), 0);
}

// ============================================================================
// Convergence
// ============================================================================

#[tokio::test]
async fn test_full_policy_run_converges() {
    let records = Arc::new(InMemoryRecordRepository::new());
    records.insert("Document", "1", &[("file", "a.pdf"), ("cover", "c1.jpg")]);
    records.insert("Document", "2", &[("file", "gone.pdf"), ("cover", "c2.jpg")]);
    records.insert("Document", "3", &[("file", "also-gone.pdf")]);
    let storage = memory_storage(&["a.pdf", "c1.jpg", "stray.txt", "old/stray.bin"]);
    let svc = service(records.clone(), storage.clone());

    let opts = PruneOptions {
        blank_missing: names(&["document.file"]),
        delete_invalid: names(&["document.cover"]),
        delete_orphans: true,
        ..options()
    };

    let first = svc.run(&opts).await.expect("first run");
    assert!(first.missing_count > 0);
    assert_eq!(first.orphan_count, 2);

    let second = svc.run(&opts).await.expect("second run");
    assert_eq!(second.missing_count, 0);
    assert_eq!(second.orphan_count, 0);
    assert!(second.actions.is_empty());
    assert_eq!(storage.files(), names(&["a.pdf", "c1.jpg"]));
}

#[tokio::test]
async fn test_shared_paths_are_reported() {
    let records = Arc::new(InMemoryRecordRepository::new());
    records.insert("Document", "1", &[("file", "same.pdf")]);
    records.insert("Document", "2", &[("file", "same.pdf")]);
    let storage = memory_storage(&["same.pdf"]);

    let report = service(records, storage)
        .run(&options())
        .await
        .expect("run should succeed");

    assert_eq!(report.known_count, 1);
    assert_eq!(report.shared_paths.len(), 1);
    assert_eq!(report.shared_paths[0].owners.len(), 2);
    assert_eq!(report.missing_count, 0);
    assert_eq!(report.orphan_count, 0);
}
