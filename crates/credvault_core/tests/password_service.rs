use credvault_core::{
    open_db_in_memory, purge_deleted, FixedClock, LifecycleContext, LifecycleError, Overwrites,
    PasswordDraft, PasswordService, PasswordServiceError, StaticIdentity,
};
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

fn service_for<'conn>(conn: &'conn Connection, user: &str) -> PasswordService<'conn> {
    PasswordService::try_new(conn, &StaticIdentity::user(user), LifecycleContext::default())
        .unwrap()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn service_requires_a_user_identity() {
    let conn = open_db_in_memory().unwrap();
    for identity in [StaticIdentity::system(), StaticIdentity::user("  ")] {
        let result = PasswordService::try_new(&conn, &identity, LifecycleContext::default());
        assert!(matches!(result, Err(PasswordServiceError::MissingIdentity)));
    }
}

#[test]
fn create_links_password_and_first_revision() {
    let conn = open_db_in_memory().unwrap();
    let service = service_for(&conn, "alice");

    let mut draft = PasswordDraft::new("mail");
    draft.username = "alice".to_string();
    let created = service.create_password(draft).unwrap();

    assert_eq!(created.password.revision_uuid, created.revision.uuid);
    assert_eq!(created.revision.password_uuid, created.password.uuid);
    assert_eq!(created.password.user_id, "alice");
    assert_eq!(service.current(created.password.uuid).unwrap(), created);
}

#[test]
fn create_rejects_blank_label_and_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = service_for(&conn, "alice");

    let err = service.create_password(PasswordDraft::new(" ")).unwrap_err();
    assert!(matches!(
        err,
        PasswordServiceError::Lifecycle(LifecycleError::Storage(_))
    ));
    assert_eq!(count(&conn, "passwords"), 0);
    assert_eq!(count(&conn, "password_revisions"), 0);
}

#[test]
fn update_appends_revision_and_keeps_history() {
    let conn = open_db_in_memory().unwrap();
    let service = service_for(&conn, "alice");
    let created = service.create_password(PasswordDraft::new("mail")).unwrap();

    let updated = service
        .update_password(
            created.password.uuid,
            &Overwrites::new().set("password", "correct horse"),
        )
        .unwrap();

    assert_ne!(updated.revision.uuid, created.revision.uuid);
    assert_eq!(updated.password.uuid, created.password.uuid);
    assert_eq!(updated.password.revision_uuid, updated.revision.uuid);
    assert_eq!(updated.revision.password, "correct horse");
    assert_eq!(updated.revision.label, "mail");

    let history = service.history(created.password.uuid).unwrap();
    let history_uuids: Vec<Uuid> = history.iter().map(|revision| revision.uuid).collect();
    assert_eq!(
        history_uuids,
        vec![created.revision.uuid, updated.revision.uuid]
    );
    assert_eq!(history[0].password, "");
}

#[test]
fn update_rejects_protected_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = service_for(&conn, "alice");
    let created = service.create_password(PasswordDraft::new("mail")).unwrap();

    let err = service
        .update_password(
            created.password.uuid,
            &Overwrites::new().set("user_id", "bob"),
        )
        .unwrap_err();
    assert!(matches!(err, PasswordServiceError::ProtectedField(field) if field == "user_id"));
    assert_eq!(service.history(created.password.uuid).unwrap().len(), 1);
}

#[test]
fn tagging_is_idempotent_for_live_pairs() {
    let conn = open_db_in_memory().unwrap();
    let service = service_for(&conn, "alice");
    let created = service.create_password(PasswordDraft::new("mail")).unwrap();
    let tag = Uuid::new_v4();

    let first = service.tag_password(created.password.uuid, tag, false).unwrap();
    let second = service.tag_password(created.password.uuid, tag, true).unwrap();
    assert_eq!(first.uuid, second.uuid);
    assert!(!second.hidden);
    assert_eq!(count(&conn, "password_tag_relations"), 1);
}

#[test]
fn delete_cascades_to_revisions_and_relations() {
    let conn = open_db_in_memory().unwrap();
    let service = service_for(&conn, "alice");
    let created = service.create_password(PasswordDraft::new("mail")).unwrap();
    service
        .update_password(created.password.uuid, &Overwrites::new().set("notes", "n"))
        .unwrap();
    let tag = Uuid::new_v4();
    service.tag_password(created.password.uuid, tag, false).unwrap();

    let deleted = service.delete_password(created.password.uuid).unwrap();
    assert!(deleted.deleted);
    assert!(service
        .history(created.password.uuid)
        .unwrap()
        .iter()
        .all(|revision| revision.deleted));
    assert!(!service.is_tagged(created.password.uuid, tag).unwrap());
    assert!(service.passwords_in_folder(None).unwrap().is_empty());

    assert!(matches!(
        service.update_password(created.password.uuid, &Overwrites::new()),
        Err(PasswordServiceError::PasswordDeleted(uuid)) if uuid == created.password.uuid
    ));
    assert!(matches!(
        service.tag_password(created.password.uuid, tag, false),
        Err(PasswordServiceError::PasswordDeleted(_))
    ));
}

#[test]
fn destroy_removes_every_row_of_the_password() {
    let conn = open_db_in_memory().unwrap();
    let service = service_for(&conn, "alice");
    let created = service.create_password(PasswordDraft::new("mail")).unwrap();
    let kept = service.create_password(PasswordDraft::new("bank")).unwrap();
    service
        .update_password(created.password.uuid, &Overwrites::new().set("url", "u"))
        .unwrap();
    service
        .tag_password(created.password.uuid, Uuid::new_v4(), true)
        .unwrap();

    service.destroy_password(created.password.uuid).unwrap();

    assert_eq!(count(&conn, "passwords"), 1);
    assert_eq!(count(&conn, "password_revisions"), 1);
    assert_eq!(count(&conn, "password_tag_relations"), 0);
    assert!(matches!(
        service.current(created.password.uuid),
        Err(PasswordServiceError::Lifecycle(LifecycleError::NotFound { .. }))
    ));
    assert_eq!(service.current(kept.password.uuid).unwrap(), kept);
}

#[test]
fn passwords_are_invisible_to_other_users() {
    let conn = open_db_in_memory().unwrap();
    let alice = service_for(&conn, "alice");
    let bob = service_for(&conn, "bob");
    let created = alice.create_password(PasswordDraft::new("mail")).unwrap();

    assert!(matches!(
        bob.delete_password(created.password.uuid),
        Err(PasswordServiceError::Lifecycle(LifecycleError::NotFound { .. }))
    ));
    assert!(bob.passwords_in_folder(None).unwrap().is_empty());
    assert_eq!(alice.passwords_in_folder(None).unwrap().len(), 1);
}

#[test]
fn purge_removes_soft_deleted_rows_only_in_scope() {
    let conn = open_db_in_memory().unwrap();
    let alice = service_for(&conn, "alice");
    let bob = service_for(&conn, "bob");
    let alice_gone = alice.create_password(PasswordDraft::new("mail")).unwrap();
    let alice_kept = alice.create_password(PasswordDraft::new("bank")).unwrap();
    let bob_gone = bob.create_password(PasswordDraft::new("chat")).unwrap();
    alice.tag_password(alice_gone.password.uuid, Uuid::new_v4(), false).unwrap();
    alice.delete_password(alice_gone.password.uuid).unwrap();
    bob.delete_password(bob_gone.password.uuid).unwrap();

    let report = purge_deleted(
        &conn,
        &StaticIdentity::user("alice"),
        LifecycleContext::default(),
    )
    .unwrap();
    assert_eq!(
        (report.passwords, report.revisions, report.relations),
        (1, 1, 1)
    );
    assert_eq!(count(&conn, "passwords"), 2);

    let report = purge_deleted(&conn, &StaticIdentity::system(), LifecycleContext::default())
        .unwrap();
    assert_eq!(report.total(), 2);
    assert_eq!(count(&conn, "passwords"), 1);
    assert_eq!(alice.current(alice_kept.password.uuid).unwrap(), alice_kept);
}

fn service_at<'conn>(conn: &'conn Connection, user: &str, now: i64) -> PasswordService<'conn> {
    let context = LifecycleContext::default().with_clock(Arc::new(FixedClock(now)));
    PasswordService::try_new(conn, &StaticIdentity::user(user), context).unwrap()
}

fn timestamps(conn: &Connection, table: &str) -> Vec<(i64, i64)> {
    let mut stmt = conn
        .prepare(&format!("SELECT created_at, updated_at FROM {table} ORDER BY id;"))
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
        .unwrap();
    rows.map(Result::unwrap).collect()
}

#[test]
fn writes_take_timestamps_from_the_context_clock() {
    let conn = open_db_in_memory().unwrap();
    let created = service_at(&conn, "alice", 1_000)
        .create_password(PasswordDraft::new("mail"))
        .unwrap();
    service_at(&conn, "alice", 1_000)
        .tag_password(created.password.uuid, Uuid::new_v4(), false)
        .unwrap();

    service_at(&conn, "alice", 2_500)
        .delete_password(created.password.uuid)
        .unwrap();

    for table in ["passwords", "password_revisions", "password_tag_relations"] {
        assert_eq!(timestamps(&conn, table), vec![(1_000, 2_500)], "{table}");
    }
}

#[test]
fn delete_never_moves_updated_at_before_created_at() {
    let conn = open_db_in_memory().unwrap();
    let service = service_for(&conn, "alice");
    for index in 0..20 {
        let created = service
            .create_password(PasswordDraft::new(format!("login {index}")))
            .unwrap();
        service.delete_password(created.password.uuid).unwrap();
    }

    let early = service_at(&conn, "alice", 1);
    let created = service.create_password(PasswordDraft::new("late")).unwrap();
    early.delete_password(created.password.uuid).unwrap();

    for table in ["passwords", "password_revisions"] {
        let rows = timestamps(&conn, table);
        assert_eq!(rows.len(), 21);
        assert!(
            rows.iter().all(|(created_at, updated_at)| updated_at >= created_at),
            "{table}: {rows:?}"
        );
    }
}
