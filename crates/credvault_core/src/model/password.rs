//! Password entity: the stable logical object.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another password.
//! - Payload lives on revisions; the entity only points at the current one.

use crate::model::object::{
    ensure_user_id, now_epoch_ms, FieldError, FieldValue, ObjectKind, ObjectModel,
    ValidationError, VersionedObject,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use uuid::Uuid;

/// Logical credential record with a pointer to its active revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    /// Storage rowid. `None` until inserted.
    pub id: Option<i64>,
    /// Stable external identity.
    pub uuid: Uuid,
    /// Owning user.
    pub user_id: String,
    /// Current revision.
    pub revision_uuid: Uuid,
    /// Soft-delete tombstone.
    pub deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Password {
    /// Creates an unsaved password pointing at `revision_uuid`.
    pub fn new(user_id: impl Into<String>, revision_uuid: Uuid) -> Self {
        Self::with_id(Uuid::new_v4(), user_id, revision_uuid)
    }

    /// Creates an unsaved password with a caller-provided stable id.
    ///
    /// Used when the first revision must reference the password before the
    /// password row exists.
    pub fn with_id(uuid: Uuid, user_id: impl Into<String>, revision_uuid: Uuid) -> Self {
        let now = now_epoch_ms();
        Self {
            id: None,
            uuid,
            user_id: user_id.into(),
            revision_uuid,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates row-local invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_user_id(ObjectKind::Password, self.uuid, &self.user_id)
    }
}

impl VersionedObject for Password {
    fn kind(&self) -> ObjectKind {
        Self::KIND
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn set_timestamps(&mut self, created_at: i64, updated_at: i64) {
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn reset_identity(&mut self) {
        self.id = None;
        self.uuid = Uuid::new_v4();
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), FieldError> {
        match field {
            "user_id" => self.user_id = value.into_text(field)?,
            "revision_uuid" => self.revision_uuid = value.into_uuid(field)?,
            "deleted" => self.deleted = value.into_bool(field)?,
            "created_at" => self.created_at = value.into_integer(field)?,
            "updated_at" => self.updated_at = value.into_integer(field)?,
            _ => return Err(FieldError::unknown(Self::KIND, field)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl ObjectModel for Password {
    const KIND: ObjectKind = ObjectKind::Password;
}
