use credvault_core::{
    FieldError, FieldValue, ObjectKind, Overwrites, Password, PasswordRevision,
    PasswordTagRelation, VersionedObject,
};
use uuid::Uuid;

#[test]
fn kinds_match_hook_type_names() {
    let password = Password::new("alice", Uuid::new_v4());
    let revision = PasswordRevision::new(password.uuid, "alice", "mail");
    let relation = PasswordTagRelation::new(password.uuid, Uuid::new_v4(), "alice");

    assert_eq!(password.kind().as_str(), "Password");
    assert_eq!(revision.kind().as_str(), "PasswordRevision");
    assert_eq!(relation.kind().as_str(), "PasswordTagRelation");
}

#[test]
fn reset_identity_clears_id_and_regenerates_uuid() {
    let mut revision = PasswordRevision::new(Uuid::new_v4(), "alice", "mail");
    revision.id = Some(3);
    let before = revision.uuid;

    revision.reset_identity();
    assert_eq!(revision.id, None);
    assert_ne!(revision.uuid, before);
}

#[test]
fn overwrites_reject_unknown_fields_and_wrong_types() {
    let mut revision = PasswordRevision::new(Uuid::new_v4(), "alice", "mail");

    let err = Overwrites::new()
        .set("colour", "red")
        .apply_to(&mut revision)
        .unwrap_err();
    assert_eq!(
        err,
        FieldError::UnknownField {
            kind: ObjectKind::PasswordRevision,
            field: "colour".to_string(),
        }
    );

    let err = Overwrites::new()
        .set("favorite", "yes")
        .apply_to(&mut revision)
        .unwrap_err();
    assert!(matches!(err, FieldError::WrongType { expected: "bool", .. }));
}

#[test]
fn overwrites_can_move_revision_to_root_folder() {
    let mut revision = PasswordRevision::new(Uuid::new_v4(), "alice", "mail");
    revision.folder_uuid = Some(Uuid::new_v4());

    Overwrites::new()
        .set("folder_uuid", FieldValue::OptionalUuid(None))
        .apply_to(&mut revision)
        .unwrap();
    assert_eq!(revision.folder_uuid, None);
}

#[test]
fn models_serialize_with_field_names() {
    let password = Password::new("alice", Uuid::new_v4());
    let json = serde_json::to_value(&password).unwrap();
    assert_eq!(json["user_id"], "alice");
    assert_eq!(json["revision_uuid"], password.revision_uuid.to_string());
    assert_eq!(json["id"], serde_json::Value::Null);

    let decoded: Password = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, password);
}

#[test]
fn blank_owner_fails_validation() {
    let password = Password::new("  ", Uuid::new_v4());
    assert!(password.validate().is_err());
    let revision = PasswordRevision::new(Uuid::new_v4(), "alice", "");
    assert!(revision.validate().is_err());
}
