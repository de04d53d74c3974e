//! Password use-case service.
//!
//! # Responsibility
//! - Keep the password → current revision chain consistent across writes.
//! - Cascade soft delete and destroy from a password to its revisions and
//!   tag relations.
//! - Expose user-scoped folder/tag browsing and revision history.
//!
//! # Invariants
//! - Every multi-row write runs in one SQLite transaction. Hooks and events
//!   are not transactional and stay fired if the transaction rolls back.
//! - Updates never rewrite a stored revision: they clone the current one,
//!   save the clone and repoint the password.
//! - A soft-deleted password cannot be updated or tagged.

use crate::identity::IdentityProvider;
use crate::model::object::{Overwrites, VersionedObject};
use crate::model::password::Password;
use crate::model::revision::PasswordRevision;
use crate::model::tag_relation::PasswordTagRelation;
use crate::repo::password_repo::SqlitePasswordRepository;
use crate::repo::revision_repo::SqliteRevisionRepository;
use crate::repo::store::RepoError;
use crate::repo::tag_relation_repo::SqliteTagRelationRepository;
use crate::service::lifecycle::{LifecycleContext, LifecycleError, LifecycleService};
use log::info;
use rusqlite::{Connection, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Revision fields a caller may not change through `update_password`.
const PROTECTED_REVISION_FIELDS: &[&str] = &["password_uuid", "user_id", "deleted"];

/// Service error for password use-cases.
#[derive(Debug)]
pub enum PasswordServiceError {
    /// The identity provider returned no (or a blank) user.
    MissingIdentity,
    /// The password is soft-deleted and cannot be changed.
    PasswordDeleted(Uuid),
    /// An update tried to move a revision to another owner or password.
    ProtectedField(String),
    /// Lifecycle or storage failure.
    Lifecycle(LifecycleError),
}

pub type PasswordServiceResult<T> = Result<T, PasswordServiceError>;

impl Display for PasswordServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingIdentity => write!(f, "password service requires a user identity"),
            Self::PasswordDeleted(uuid) => write!(f, "password {uuid} is deleted"),
            Self::ProtectedField(field) => {
                write!(f, "revision field `{field}` cannot be overwritten")
            }
            Self::Lifecycle(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PasswordServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lifecycle(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LifecycleError> for PasswordServiceError {
    fn from(value: LifecycleError) -> Self {
        Self::Lifecycle(value)
    }
}

impl From<RepoError> for PasswordServiceError {
    fn from(value: RepoError) -> Self {
        Self::Lifecycle(value.into())
    }
}

impl From<rusqlite::Error> for PasswordServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(RepoError::from(value))
    }
}

/// Payload of a new password's first revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordDraft {
    pub folder_uuid: Option<Uuid>,
    pub label: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: String,
    pub favorite: bool,
}

impl PasswordDraft {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// A password together with its current revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordSnapshot {
    pub password: Password,
    pub revision: PasswordRevision,
}

/// Password use-cases for one user over one connection.
pub struct PasswordService<'conn> {
    conn: &'conn Connection,
    user_id: String,
    passwords: LifecycleService<SqlitePasswordRepository<'conn>>,
    revisions: LifecycleService<SqliteRevisionRepository<'conn>>,
    relations: LifecycleService<SqliteTagRelationRepository<'conn>>,
}

impl<'conn> PasswordService<'conn> {
    /// Builds the three lifecycle services over `conn`.
    ///
    /// # Errors
    /// - `MissingIdentity` when `identity` carries no usable user id.
    /// - Storage errors when `conn` is not migrated.
    pub fn try_new(
        conn: &'conn Connection,
        identity: &dyn IdentityProvider,
        context: LifecycleContext,
    ) -> PasswordServiceResult<Self> {
        let user_id = identity
            .user_id()
            .filter(|value| !value.trim().is_empty())
            .ok_or(PasswordServiceError::MissingIdentity)?;
        Ok(Self {
            conn,
            passwords: LifecycleService::new(
                SqlitePasswordRepository::try_new(conn, identity)?,
                context.clone(),
            ),
            revisions: LifecycleService::new(
                SqliteRevisionRepository::try_new(conn, identity)?,
                context.clone(),
            ),
            relations: LifecycleService::new(
                SqliteTagRelationRepository::try_new(conn, identity)?,
                context,
            ),
            user_id,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn passwords(&self) -> &LifecycleService<SqlitePasswordRepository<'conn>> {
        &self.passwords
    }

    pub fn revisions(&self) -> &LifecycleService<SqliteRevisionRepository<'conn>> {
        &self.revisions
    }

    pub fn relations(&self) -> &LifecycleService<SqliteTagRelationRepository<'conn>> {
        &self.relations
    }

    /// Creates a password and its first revision.
    pub fn create_password(&self, draft: PasswordDraft) -> PasswordServiceResult<PasswordSnapshot> {
        let tx = self.begin()?;
        let password_uuid = Uuid::new_v4();
        let now = self.now_ms();

        let mut revision = PasswordRevision::new(password_uuid, self.user_id.as_str(), draft.label);
        revision.folder_uuid = draft.folder_uuid;
        revision.username = draft.username;
        revision.password = draft.password;
        revision.url = draft.url;
        revision.notes = draft.notes;
        revision.favorite = draft.favorite;
        revision.set_timestamps(now, now);
        let revision = self.revisions.save(&revision)?;

        let mut password = Password::with_id(password_uuid, self.user_id.as_str(), revision.uuid);
        password.set_timestamps(now, now);
        let password = self.passwords.save(&password)?;
        tx.commit()?;

        info!(
            "event=password_create module=service status=ok uuid={} revision_uuid={}",
            password.uuid, revision.uuid
        );
        Ok(PasswordSnapshot { password, revision })
    }

    /// Password and its current revision.
    pub fn current(&self, password_uuid: Uuid) -> PasswordServiceResult<PasswordSnapshot> {
        let password = self.passwords.find_by_uuid(password_uuid)?;
        let revision = self.revisions.find_by_uuid(password.revision_uuid)?;
        Ok(PasswordSnapshot { password, revision })
    }

    /// Appends a revision cloned from the current one with `overwrites`
    /// applied, and makes it current.
    pub fn update_password(
        &self,
        password_uuid: Uuid,
        overwrites: &Overwrites,
    ) -> PasswordServiceResult<PasswordSnapshot> {
        if let Some((field, _)) = overwrites
            .iter()
            .find(|(field, _)| PROTECTED_REVISION_FIELDS.contains(field))
        {
            return Err(PasswordServiceError::ProtectedField(field.to_string()));
        }

        let tx = self.begin()?;
        let mut password = self.live_password(password_uuid)?;
        let current = self.revisions.find_by_uuid(password.revision_uuid)?;
        let next = self.revisions.clone_object(&current, overwrites)?;
        let next = self.revisions.save(&next)?;

        password.revision_uuid = next.uuid;
        password.touch(self.now_ms());
        let password = self.passwords.save(&password)?;
        tx.commit()?;

        info!(
            "event=password_update module=service status=ok uuid={} revision_uuid={} previous_revision_uuid={}",
            password.uuid, next.uuid, current.uuid
        );
        Ok(PasswordSnapshot {
            password,
            revision: next,
        })
    }

    /// Links a live password to a tag. An existing live relation for the
    /// pair is returned unchanged.
    pub fn tag_password(
        &self,
        password_uuid: Uuid,
        tag_uuid: Uuid,
        hidden: bool,
    ) -> PasswordServiceResult<PasswordTagRelation> {
        let password = self.live_password(password_uuid)?;
        if let Some(existing) = self.relations.find_live_relation(password.uuid, tag_uuid)? {
            return Ok(existing);
        }
        let mut relation = PasswordTagRelation::new(password.uuid, tag_uuid, self.user_id.as_str());
        relation.hidden = hidden;
        let now = self.now_ms();
        relation.set_timestamps(now, now);
        Ok(self.relations.save(&relation)?)
    }

    /// Soft-deletes the live relation for the pair. Returns whether one
    /// existed.
    pub fn untag_password(&self, password_uuid: Uuid, tag_uuid: Uuid) -> PasswordServiceResult<bool> {
        let Some(mut relation) = self.relations.find_live_relation(password_uuid, tag_uuid)? else {
            return Ok(false);
        };
        self.relations.delete(&mut relation)?;
        Ok(true)
    }

    /// Soft-deletes a password, then its live relations and revisions.
    pub fn delete_password(&self, password_uuid: Uuid) -> PasswordServiceResult<Password> {
        let tx = self.begin()?;
        let mut password = self.passwords.find_by_uuid(password_uuid)?;
        self.cascade_delete(&mut password)?;
        tx.commit()?;

        info!(
            "event=password_delete module=service status=ok uuid={}",
            password.uuid
        );
        Ok(password)
    }

    /// Permanently removes a password with every revision and relation it
    /// ever had, soft-deleting everything first.
    pub fn destroy_password(&self, password_uuid: Uuid) -> PasswordServiceResult<()> {
        let tx = self.begin()?;
        let mut password = self.passwords.find_by_uuid(password_uuid)?;
        if !password.deleted {
            self.cascade_delete(&mut password)?;
        }
        self.passwords.destroy(&mut password)?;
        for mut relation in self.relations.relations_of(password.uuid, true)? {
            self.relations.destroy(&mut relation)?;
        }
        for mut revision in self.revisions.history(password.uuid)? {
            self.revisions.destroy(&mut revision)?;
        }
        tx.commit()?;

        info!(
            "event=password_destroy module=service status=ok uuid={}",
            password.uuid
        );
        Ok(())
    }

    /// Every revision the password ever had, oldest first.
    pub fn history(&self, password_uuid: Uuid) -> PasswordServiceResult<Vec<PasswordRevision>> {
        let password = self.passwords.find_by_uuid(password_uuid)?;
        Ok(self.revisions.history(password.uuid)?)
    }

    pub fn passwords_in_folder(
        &self,
        folder_uuid: Option<Uuid>,
    ) -> PasswordServiceResult<Vec<Password>> {
        Ok(self.passwords.get_by_folder(folder_uuid)?)
    }

    pub fn passwords_with_tag(
        &self,
        tag_uuid: Uuid,
        include_hidden: bool,
    ) -> PasswordServiceResult<Vec<Password>> {
        Ok(self.passwords.get_by_tag(tag_uuid, include_hidden)?)
    }

    /// Whether the password carries the tag, hidden relations included.
    pub fn is_tagged(&self, password_uuid: Uuid, tag_uuid: Uuid) -> PasswordServiceResult<bool> {
        Ok(self.relations.is_tagged(password_uuid, tag_uuid)?)
    }

    fn now_ms(&self) -> i64 {
        self.passwords.context().now_ms()
    }

    fn begin(&self) -> PasswordServiceResult<Transaction<'conn>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    fn live_password(&self, password_uuid: Uuid) -> PasswordServiceResult<Password> {
        let password = self.passwords.find_by_uuid(password_uuid)?;
        if password.deleted {
            return Err(PasswordServiceError::PasswordDeleted(password.uuid));
        }
        Ok(password)
    }

    fn cascade_delete(&self, password: &mut Password) -> PasswordServiceResult<()> {
        self.passwords.delete(password)?;
        for mut relation in self.relations.relations_of(password.uuid, false)? {
            self.relations.delete(&mut relation)?;
        }
        for mut revision in self.revisions.history(password.uuid)? {
            if !revision.deleted {
                self.revisions.delete(&mut revision)?;
            }
        }
        Ok(())
    }
}

/// Rows removed by `purge_deleted`, per object type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub passwords: usize,
    pub revisions: usize,
    pub relations: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.passwords + self.revisions + self.relations
    }
}

/// Destroys soft-deleted rows.
///
/// With a user identity only that user's rows are purged; a system identity
/// purges every user. Each removal fires the regular destroy hooks and
/// events.
pub fn purge_deleted(
    conn: &Connection,
    identity: &dyn IdentityProvider,
    context: LifecycleContext,
) -> Result<PurgeReport, LifecycleError> {
    let scope = identity.user_id();
    let relations = LifecycleService::new(
        SqliteTagRelationRepository::try_new(conn, identity)?,
        context.clone(),
    );
    let revisions = LifecycleService::new(
        SqliteRevisionRepository::try_new(conn, identity)?,
        context.clone(),
    );
    let passwords =
        LifecycleService::new(SqlitePasswordRepository::try_new(conn, identity)?, context);

    let tx = conn.unchecked_transaction().map_err(RepoError::from)?;
    let mut report = PurgeReport::default();
    for mut relation in relations.find_deleted()? {
        if in_scope(scope.as_deref(), &relation) {
            relations.destroy(&mut relation)?;
            report.relations += 1;
        }
    }
    for mut revision in revisions.find_deleted()? {
        if in_scope(scope.as_deref(), &revision) {
            revisions.destroy(&mut revision)?;
            report.revisions += 1;
        }
    }
    for mut password in passwords.find_deleted()? {
        if in_scope(scope.as_deref(), &password) {
            passwords.destroy(&mut password)?;
            report.passwords += 1;
        }
    }
    tx.commit().map_err(RepoError::from)?;

    info!(
        "event=purge_deleted module=service status=ok scope={} passwords={} revisions={} relations={}",
        if scope.is_some() { "user" } else { "all" },
        report.passwords,
        report.revisions,
        report.relations
    );
    Ok(report)
}

fn in_scope(scope: Option<&str>, object: &dyn VersionedObject) -> bool {
    scope.map_or(true, |user_id| object.user_id() == user_id)
}
