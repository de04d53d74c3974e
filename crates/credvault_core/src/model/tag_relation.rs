//! Password-to-tag association with its own lifecycle.

use crate::model::object::{
    ensure_user_id, now_epoch_ms, FieldError, FieldValue, ObjectKind, ObjectModel,
    ValidationError, VersionedObject,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use uuid::Uuid;

/// Many-to-many link between a password and a tag.
///
/// `hidden` relations are skipped by tag browsing but still count for
/// membership checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordTagRelation {
    pub id: Option<i64>,
    pub uuid: Uuid,
    pub password_uuid: Uuid,
    pub tag_uuid: Uuid,
    pub user_id: String,
    pub hidden: bool,
    pub deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PasswordTagRelation {
    pub fn new(password_uuid: Uuid, tag_uuid: Uuid, user_id: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            password_uuid,
            tag_uuid,
            user_id: user_id.into(),
            hidden: false,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_user_id(ObjectKind::PasswordTagRelation, self.uuid, &self.user_id)
    }
}

impl VersionedObject for PasswordTagRelation {
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
            "password_uuid" => self.password_uuid = value.into_uuid(field)?,
            "tag_uuid" => self.tag_uuid = value.into_uuid(field)?,
            "user_id" => self.user_id = value.into_text(field)?,
            "hidden" => self.hidden = value.into_bool(field)?,
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

impl ObjectModel for PasswordTagRelation {
    const KIND: ObjectKind = ObjectKind::PasswordTagRelation;
}
