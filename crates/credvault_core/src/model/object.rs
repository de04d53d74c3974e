//! Shared contract for lifecycle-managed vault objects.
//!
//! # Responsibility
//! - Give the generic lifecycle engine a type-erased view of any stored object.
//! - Provide typed, name-addressed field writes for clone overwrites.
//!
//! # Invariants
//! - `id` and `uuid` are identity fields and are never writable by name.
//! - `kind()` always equals `ObjectModel::KIND` for the concrete type.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Concrete object types managed by the vault core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Password,
    PasswordRevision,
    PasswordTagRelation,
}

impl ObjectKind {
    /// Stable type name used as the object half of hook registry keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Password => "Password",
            Self::PasswordRevision => "PasswordRevision",
            Self::PasswordTagRelation => "PasswordTagRelation",
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-erased view over a lifecycle-managed object.
///
/// Lifecycle operations accept `dyn VersionedObject` so that a caller holding
/// the wrong concrete type gets a runtime `TypeMismatch` instead of silently
/// operating on it.
pub trait VersionedObject: Any + Debug + Send + Sync {
    fn kind(&self) -> ObjectKind;
    /// Storage rowid, `None` until first persisted.
    fn id(&self) -> Option<i64>;
    fn uuid(&self) -> Uuid;
    fn user_id(&self) -> &str;
    fn is_deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool);
    fn created_at(&self) -> i64;
    fn updated_at(&self) -> i64;
    fn set_timestamps(&mut self, created_at: i64, updated_at: i64);
    /// Sets `updated_at` to `now`, never earlier than `created_at`.
    fn touch(&mut self, now: i64) {
        let created_at = self.created_at();
        self.set_timestamps(created_at, now.max(created_at));
    }
    /// Drops storage identity and assigns a freshly generated uuid.
    fn reset_identity(&mut self);
    /// Writes one non-identity field by its snake_case name.
    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), FieldError>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Statically known object type, used to instantiate the generic engine.
pub trait ObjectModel: VersionedObject + Clone {
    const KIND: ObjectKind;
}

/// Field value accepted by `VersionedObject::set_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Uuid(Uuid),
    OptionalUuid(Option<Uuid>),
    Bool(bool),
    Integer(i64),
}

impl FieldValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::OptionalUuid(_) => "optional uuid",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
        }
    }

    pub(crate) fn into_text(self, field: &str) -> Result<String, FieldError> {
        match self {
            Self::Text(value) => Ok(value),
            other => Err(FieldError::wrong_type(field, "text", &other)),
        }
    }

    pub(crate) fn into_uuid(self, field: &str) -> Result<Uuid, FieldError> {
        match self {
            Self::Uuid(value) => Ok(value),
            other => Err(FieldError::wrong_type(field, "uuid", &other)),
        }
    }

    pub(crate) fn into_optional_uuid(self, field: &str) -> Result<Option<Uuid>, FieldError> {
        match self {
            Self::OptionalUuid(value) => Ok(value),
            Self::Uuid(value) => Ok(Some(value)),
            other => Err(FieldError::wrong_type(field, "optional uuid", &other)),
        }
    }

    pub(crate) fn into_bool(self, field: &str) -> Result<bool, FieldError> {
        match self {
            Self::Bool(value) => Ok(value),
            other => Err(FieldError::wrong_type(field, "bool", &other)),
        }
    }

    pub(crate) fn into_integer(self, field: &str) -> Result<i64, FieldError> {
        match self {
            Self::Integer(value) => Ok(value),
            other => Err(FieldError::wrong_type(field, "integer", &other)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<Option<Uuid>> for FieldValue {
    fn from(value: Option<Uuid>) -> Self {
        Self::OptionalUuid(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Rejected field write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// No writable field with this name exists on the object type.
    UnknownField { kind: ObjectKind, field: String },
    /// The value variant does not match the field type.
    WrongType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl FieldError {
    pub(crate) fn unknown(kind: ObjectKind, field: &str) -> Self {
        Self::UnknownField {
            kind,
            field: field.to_string(),
        }
    }

    fn wrong_type(field: &str, expected: &'static str, actual: &FieldValue) -> Self {
        Self::WrongType {
            field: field.to_string(),
            expected,
            actual: actual.type_name(),
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField { kind, field } => {
                write!(f, "{kind} has no writable field `{field}`")
            }
            Self::WrongType {
                field,
                expected,
                actual,
            } => write!(f, "field `{field}` expects {expected}, got {actual}"),
        }
    }
}

impl Error for FieldError {}

/// Caller-supplied field replacements for `clone`.
///
/// Entries for `id` or `uuid` are skipped: a clone always gets fresh identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overwrites {
    fields: BTreeMap<String, FieldValue>,
}

impl Overwrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one field overwrite.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }

    /// Applies all non-identity overwrites to `target`.
    pub fn apply_to(&self, target: &mut dyn VersionedObject) -> Result<(), FieldError> {
        for (field, value) in self.iter() {
            if is_identity_field(field) {
                continue;
            }
            target.set_field(field, value.clone())?;
        }
        Ok(())
    }
}

/// Returns whether `field` names storage or external identity.
pub fn is_identity_field(field: &str) -> bool {
    matches!(field, "id" | "uuid")
}

/// Model-level validation failures, checked before every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Every row must be owned by a non-blank user id.
    BlankUserId { kind: ObjectKind, uuid: Uuid },
    /// Revisions must carry a non-blank label.
    BlankLabel { uuid: Uuid },
    /// A live password points at a revision that is missing or deleted.
    RevisionNotLive { password: Uuid, revision: Uuid },
    /// A live password points at a revision owned by someone else.
    RevisionOwnerMismatch { password: Uuid, revision: Uuid },
    /// A live password points at a revision of another password.
    RevisionParentMismatch { password: Uuid, revision: Uuid },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankUserId { kind, uuid } => write!(f, "{kind} {uuid} has a blank user_id"),
            Self::BlankLabel { uuid } => write!(f, "revision {uuid} has a blank label"),
            Self::RevisionNotLive { password, revision } => write!(
                f,
                "password {password} points at missing or deleted revision {revision}"
            ),
            Self::RevisionOwnerMismatch { password, revision } => write!(
                f,
                "password {password} points at revision {revision} of another user"
            ),
            Self::RevisionParentMismatch { password, revision } => write!(
                f,
                "password {password} points at revision {revision} of another password"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub(crate) fn ensure_user_id(
    kind: ObjectKind,
    uuid: Uuid,
    user_id: &str,
) -> Result<(), ValidationError> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::BlankUserId { kind, uuid });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{is_identity_field, FieldValue, Overwrites};
    use uuid::Uuid;

    #[test]
    fn identity_fields_are_id_and_uuid_only() {
        assert!(is_identity_field("id"));
        assert!(is_identity_field("uuid"));
        assert!(!is_identity_field("user_id"));
        assert!(!is_identity_field("password_uuid"));
    }

    #[test]
    fn optional_uuid_accepts_plain_uuid_values() {
        let folder = Uuid::new_v4();
        let value = FieldValue::from(folder)
            .into_optional_uuid("folder_uuid")
            .expect("plain uuid should widen");
        assert_eq!(value, Some(folder));
    }

    #[test]
    fn overwrites_keep_last_value_per_field() {
        let overwrites = Overwrites::new().set("label", "a").set("label", "b");
        assert_eq!(overwrites.len(), 1);
        let (_, value) = overwrites.iter().next().expect("one entry");
        assert_eq!(value, &FieldValue::from("b"));
    }
}
