//! Password revision: one immutable snapshot of credential payload.
//!
//! # Invariants
//! - `uuid` and `password_uuid` never change after insert.
//! - Only `deleted` may change on a stored revision; payload edits produce a
//!   new revision via clone.
//! - `folder_uuid = None` means the root folder.

use crate::model::object::{
    ensure_user_id, now_epoch_ms, FieldError, FieldValue, ObjectKind, ObjectModel,
    ValidationError, VersionedObject,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use uuid::Uuid;

/// Versioned credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRevision {
    pub id: Option<i64>,
    pub uuid: Uuid,
    /// Parent password entity.
    pub password_uuid: Uuid,
    pub user_id: String,
    pub folder_uuid: Option<Uuid>,
    pub label: String,
    pub username: String,
    /// Secret as handed to storage; field encryption happens outside the core.
    pub password: String,
    pub url: String,
    pub notes: String,
    pub favorite: bool,
    pub deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PasswordRevision {
    /// Creates an unsaved root-folder revision with empty optional payload.
    pub fn new(password_uuid: Uuid, user_id: impl Into<String>, label: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            password_uuid,
            user_id: user_id.into(),
            folder_uuid: None,
            label: label.into(),
            username: String::new(),
            password: String::new(),
            url: String::new(),
            notes: String::new(),
            favorite: false,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates row-local invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_user_id(ObjectKind::PasswordRevision, self.uuid, &self.user_id)?;
        if self.label.trim().is_empty() {
            return Err(ValidationError::BlankLabel { uuid: self.uuid });
        }
        Ok(())
    }
}

impl VersionedObject for PasswordRevision {
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
            "user_id" => self.user_id = value.into_text(field)?,
            "folder_uuid" => self.folder_uuid = value.into_optional_uuid(field)?,
            "label" => self.label = value.into_text(field)?,
            "username" => self.username = value.into_text(field)?,
            "password" => self.password = value.into_text(field)?,
            "url" => self.url = value.into_text(field)?,
            "notes" => self.notes = value.into_text(field)?,
            "favorite" => self.favorite = value.into_bool(field)?,
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

impl ObjectModel for PasswordRevision {
    const KIND: ObjectKind = ObjectKind::PasswordRevision;
}
