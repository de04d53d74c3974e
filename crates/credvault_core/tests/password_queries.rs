use credvault_core::{
    open_db_in_memory, LifecycleContext, ObjectStore, PasswordDraft, PasswordRepository,
    PasswordService, PasswordSnapshot, Persister, RepoError, RevisionRepository,
    SqlitePasswordRepository, SqliteRevisionRepository, SqliteTagRelationRepository,
    StaticIdentity, TagRelationRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn create_in_folder(conn: &Connection, user: &str, folder: Option<Uuid>) -> PasswordSnapshot {
    let service =
        PasswordService::try_new(conn, &StaticIdentity::user(user), LifecycleContext::default())
            .unwrap();
    let mut draft = PasswordDraft::new(format!("{user} login"));
    draft.folder_uuid = folder;
    service.create_password(draft).unwrap()
}

fn repo_for<'conn>(conn: &'conn Connection, user: &str) -> SqlitePasswordRepository<'conn> {
    SqlitePasswordRepository::try_new(conn, &StaticIdentity::user(user)).unwrap()
}

fn uuids(passwords: &[credvault_core::Password]) -> Vec<Uuid> {
    passwords.iter().map(|password| password.uuid).collect()
}

#[test]
fn folder_query_is_scoped_to_calling_user() {
    let conn = open_db_in_memory().unwrap();
    let folder = Uuid::new_v4();
    let created = create_in_folder(&conn, "alice", Some(folder));

    let as_alice = repo_for(&conn, "alice").get_by_folder(Some(folder)).unwrap();
    assert_eq!(uuids(&as_alice), vec![created.password.uuid]);

    let as_bob = repo_for(&conn, "bob").get_by_folder(Some(folder)).unwrap();
    assert!(as_bob.is_empty());
}

#[test]
fn root_folder_matches_revisions_without_folder() {
    let conn = open_db_in_memory().unwrap();
    let root = create_in_folder(&conn, "alice", None);
    let nested = create_in_folder(&conn, "alice", Some(Uuid::new_v4()));

    let repo = repo_for(&conn, "alice");
    assert_eq!(uuids(&repo.get_by_folder(None).unwrap()), vec![root.password.uuid]);
    assert_eq!(
        uuids(&repo.get_by_folder(nested.revision.folder_uuid).unwrap()),
        vec![nested.password.uuid]
    );
}

#[test]
fn folder_query_checks_owner_on_revision_too() {
    let conn = open_db_in_memory().unwrap();
    let folder = Uuid::new_v4();
    let created = create_in_folder(&conn, "alice", Some(folder));
    conn.execute(
        "UPDATE password_revisions SET user_id = 'mallory' WHERE uuid = ?1;",
        [created.revision.uuid.to_string()],
    )
    .unwrap();

    assert!(repo_for(&conn, "alice")
        .get_by_folder(Some(folder))
        .unwrap()
        .is_empty());
}

#[test]
fn folder_query_follows_current_revision_only() {
    let conn = open_db_in_memory().unwrap();
    let old_folder = Uuid::new_v4();
    let new_folder = Uuid::new_v4();
    let created = create_in_folder(&conn, "alice", Some(old_folder));

    let service = PasswordService::try_new(
        &conn,
        &StaticIdentity::user("alice"),
        LifecycleContext::default(),
    )
    .unwrap();
    service
        .update_password(
            created.password.uuid,
            &credvault_core::Overwrites::new().set("folder_uuid", Some(new_folder)),
        )
        .unwrap();

    let repo = repo_for(&conn, "alice");
    assert!(repo.get_by_folder(Some(old_folder)).unwrap().is_empty());
    assert_eq!(
        uuids(&repo.get_by_folder(Some(new_folder)).unwrap()),
        vec![created.password.uuid]
    );
}

#[test]
fn hidden_tag_relations_are_excluded_unless_requested() {
    let conn = open_db_in_memory().unwrap();
    let tag = Uuid::new_v4();
    let visible = create_in_folder(&conn, "alice", None);
    let hidden = create_in_folder(&conn, "alice", None);

    let service = PasswordService::try_new(
        &conn,
        &StaticIdentity::user("alice"),
        LifecycleContext::default(),
    )
    .unwrap();
    service.tag_password(visible.password.uuid, tag, false).unwrap();
    service.tag_password(hidden.password.uuid, tag, true).unwrap();

    let repo = repo_for(&conn, "alice");
    assert_eq!(
        uuids(&repo.get_by_tag(tag, false).unwrap()),
        vec![visible.password.uuid]
    );
    assert_eq!(
        uuids(&repo.get_by_tag(tag, true).unwrap()),
        vec![visible.password.uuid, hidden.password.uuid]
    );

    let relations =
        SqliteTagRelationRepository::try_new(&conn, &StaticIdentity::user("alice")).unwrap();
    assert!(relations.is_tagged(hidden.password.uuid, tag).unwrap());
}

#[test]
fn tag_query_ignores_deleted_relations_and_other_users() {
    let conn = open_db_in_memory().unwrap();
    let tag = Uuid::new_v4();
    let created = create_in_folder(&conn, "alice", None);

    let service = PasswordService::try_new(
        &conn,
        &StaticIdentity::user("alice"),
        LifecycleContext::default(),
    )
    .unwrap();
    service.tag_password(created.password.uuid, tag, false).unwrap();
    assert!(repo_for(&conn, "bob").get_by_tag(tag, true).unwrap().is_empty());

    assert!(service.untag_password(created.password.uuid, tag).unwrap());
    assert!(repo_for(&conn, "alice").get_by_tag(tag, true).unwrap().is_empty());
    assert!(!service.untag_password(created.password.uuid, tag).unwrap());
}

#[test]
fn find_by_uuid_reports_missing_rows() {
    let conn = open_db_in_memory().unwrap();
    let missing = Uuid::new_v4();
    let err = repo_for(&conn, "alice").find_by_uuid(missing).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { uuid, .. } if uuid == missing));
}

#[test]
fn find_by_uuid_reports_duplicate_rows_as_ambiguous() {
    let conn = open_db_in_memory().unwrap();
    let created = create_in_folder(&conn, "alice", None);
    conn.execute_batch("DROP INDEX idx_passwords_uuid;").unwrap();
    conn.execute(
        "INSERT INTO passwords (uuid, user_id, revision_uuid, is_deleted, created_at, updated_at)
         SELECT uuid, user_id, revision_uuid, is_deleted, created_at, updated_at
         FROM passwords WHERE uuid = ?1;",
        [created.password.uuid.to_string()],
    )
    .unwrap();

    let err = repo_for(&conn, "alice")
        .find_by_uuid(created.password.uuid)
        .unwrap_err();
    assert!(matches!(err, RepoError::AmbiguousResult { count: 2, .. }));
}

#[test]
fn find_by_uuid_hides_rows_of_other_users() {
    let conn = open_db_in_memory().unwrap();
    let created = create_in_folder(&conn, "alice", None);
    assert!(matches!(
        repo_for(&conn, "bob").find_by_uuid(created.password.uuid),
        Err(RepoError::NotFound { .. })
    ));

    let system = SqlitePasswordRepository::try_new(&conn, &StaticIdentity::system()).unwrap();
    assert_eq!(
        system.find_by_uuid(created.password.uuid).unwrap().user_id,
        "alice"
    );
}

#[test]
fn deleted_listing_spans_users_and_user_listing_includes_deleted() {
    let conn = open_db_in_memory().unwrap();
    let alice = create_in_folder(&conn, "alice", None);
    let bob = create_in_folder(&conn, "bob", None);
    let bob_kept = create_in_folder(&conn, "bob", None);

    for (user, uuid) in [("alice", alice.password.uuid), ("bob", bob.password.uuid)] {
        PasswordService::try_new(&conn, &StaticIdentity::user(user), LifecycleContext::default())
            .unwrap()
            .delete_password(uuid)
            .unwrap();
    }

    let repo = repo_for(&conn, "alice");
    assert_eq!(
        uuids(&repo.find_all_deleted().unwrap()),
        vec![alice.password.uuid, bob.password.uuid]
    );
    assert_eq!(
        uuids(&repo.find_all_by_user_id("bob").unwrap()),
        vec![bob.password.uuid, bob_kept.password.uuid]
    );
}

#[test]
fn revision_store_rejects_live_pointer_to_foreign_revision() {
    let conn = open_db_in_memory().unwrap();
    let alice = create_in_folder(&conn, "alice", None);
    let other = create_in_folder(&conn, "alice", None);

    let mut password = alice.password.clone();
    password.revision_uuid = other.revision.uuid;
    let err = repo_for(&conn, "alice").save(&password).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(credvault_core::ValidationError::RevisionParentMismatch { .. })
    ));

    let revisions =
        SqliteRevisionRepository::try_new(&conn, &StaticIdentity::user("alice")).unwrap();
    assert_eq!(revisions.find_by_password(alice.password.uuid).unwrap().len(), 1);
}

#[test]
fn hard_delete_refuses_live_rows() {
    let conn = open_db_in_memory().unwrap();
    let created = create_in_folder(&conn, "alice", None);
    let err = repo_for(&conn, "alice")
        .hard_delete(&created.password)
        .unwrap_err();
    assert!(matches!(err, RepoError::LiveObject { .. }));
}

#[test]
fn relation_and_revision_lookups_hide_other_users_rows() {
    let conn = open_db_in_memory().unwrap();
    let alice =
        PasswordService::try_new(&conn, &StaticIdentity::user("alice"), LifecycleContext::default())
            .unwrap();
    let mut draft = PasswordDraft::new("bank");
    draft.password = "hunter2".to_string();
    let created = alice.create_password(draft).unwrap();
    let password_uuid = created.password.uuid;
    let tag = Uuid::new_v4();
    alice.tag_password(password_uuid, tag, false).unwrap();

    let bob =
        PasswordService::try_new(&conn, &StaticIdentity::user("bob"), LifecycleContext::default())
            .unwrap();
    assert!(!bob.is_tagged(password_uuid, tag).unwrap());
    assert!(bob.revisions().history(password_uuid).unwrap().is_empty());
    assert!(bob.relations().relations_of(password_uuid, true).unwrap().is_empty());
    assert!(!bob.untag_password(password_uuid, tag).unwrap());
    assert!(alice.is_tagged(password_uuid, tag).unwrap());

    let bob_revisions =
        SqliteRevisionRepository::try_new(&conn, &StaticIdentity::user("bob")).unwrap();
    assert!(bob_revisions.find_by_password(password_uuid).unwrap().is_empty());
    let bob_relations =
        SqliteTagRelationRepository::try_new(&conn, &StaticIdentity::user("bob")).unwrap();
    assert!(bob_relations.find_live(password_uuid, tag).unwrap().is_none());

    let system_revisions =
        SqliteRevisionRepository::try_new(&conn, &StaticIdentity::system()).unwrap();
    assert_eq!(system_revisions.find_by_password(password_uuid).unwrap().len(), 1);
    let system_relations =
        SqliteTagRelationRepository::try_new(&conn, &StaticIdentity::system()).unwrap();
    assert!(system_relations.is_tagged(password_uuid, tag).unwrap());
}
