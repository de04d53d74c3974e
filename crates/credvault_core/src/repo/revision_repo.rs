//! Append-only revision store.
//!
//! # Invariants
//! - Inserts write the full payload; updates only touch the tombstone and
//!   `updated_at`, so `uuid`, `password_uuid` and payload never change.
//! - History queries include soft-deleted revisions.
//! - With a user identity, lookups only see that user's revisions.

use crate::identity::IdentityProvider;
use crate::model::object::{ObjectKind, ObjectModel};
use crate::model::revision::PasswordRevision;
use crate::repo::store::{
    bool_to_int, ensure_connection_ready, exactly_one, parse_flag, parse_optional_uuid,
    parse_uuid, ObjectStore, Persister, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use uuid::Uuid;

const REVISION_COLUMNS: &[&str] = &[
    "id",
    "uuid",
    "password_uuid",
    "user_id",
    "folder_uuid",
    "label",
    "username",
    "password",
    "url",
    "notes",
    "favorite",
    "is_deleted",
    "created_at",
    "updated_at",
];

const REVISION_SELECT_SQL: &str = "SELECT
    id,
    uuid,
    password_uuid,
    user_id,
    folder_uuid,
    label,
    username,
    password,
    url,
    notes,
    favorite,
    is_deleted,
    created_at,
    updated_at
FROM password_revisions";

/// Revision-specific queries.
pub trait RevisionRepository: Persister<Object = PasswordRevision> {
    /// Full revision history of one password, oldest first.
    fn find_by_password(&self, password_uuid: Uuid) -> RepoResult<Vec<PasswordRevision>>;
}

/// SQLite-backed revision store.
pub struct SqliteRevisionRepository<'conn> {
    conn: &'conn Connection,
    user_id: Option<String>,
}

impl<'conn> SqliteRevisionRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, identity: &dyn IdentityProvider) -> RepoResult<Self> {
        ensure_connection_ready(conn, "password_revisions", REVISION_COLUMNS)?;
        Ok(Self {
            conn,
            user_id: identity.user_id(),
        })
    }

    fn query_revisions<P: Params>(&self, sql: &str, params: P) -> RepoResult<Vec<PasswordRevision>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut revisions = Vec::new();
        while let Some(row) = rows.next()? {
            revisions.push(parse_revision_row(row)?);
        }
        Ok(revisions)
    }

    fn load_by_id(&self, id: i64) -> RepoResult<PasswordRevision> {
        let rows = self.query_revisions(&format!("{REVISION_SELECT_SQL} WHERE id = ?1;"), [id])?;
        rows.into_iter().next().ok_or_else(|| {
            RepoError::InvalidData(format!("revision row {id} vanished after write"))
        })
    }
}

impl ObjectStore for SqliteRevisionRepository<'_> {
    type Object = PasswordRevision;

    fn find_by_uuid(&self, uuid: Uuid) -> RepoResult<PasswordRevision> {
        let rows = self.query_revisions(
            &format!(
                "{REVISION_SELECT_SQL}
                 WHERE uuid = ?1
                   AND (?2 IS NULL OR user_id = ?2);"
            ),
            params![uuid.to_string(), self.user_id.as_deref()],
        )?;
        exactly_one(PasswordRevision::KIND, uuid, rows)
    }

    fn find_all_by_user_id(&self, user_id: &str) -> RepoResult<Vec<PasswordRevision>> {
        self.query_revisions(
            &format!("{REVISION_SELECT_SQL} WHERE user_id = ?1 ORDER BY id ASC;"),
            [user_id],
        )
    }

    fn find_all_deleted(&self) -> RepoResult<Vec<PasswordRevision>> {
        self.query_revisions(
            &format!("{REVISION_SELECT_SQL} WHERE is_deleted = 1 ORDER BY id ASC;"),
            [],
        )
    }
}

impl Persister for SqliteRevisionRepository<'_> {
    fn save(&self, revision: &PasswordRevision) -> RepoResult<PasswordRevision> {
        revision.validate()?;

        let Some(id) = revision.id else {
            self.conn.execute(
                "INSERT INTO password_revisions (
                    uuid,
                    password_uuid,
                    user_id,
                    folder_uuid,
                    label,
                    username,
                    password,
                    url,
                    notes,
                    favorite,
                    is_deleted,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
                params![
                    revision.uuid.to_string(),
                    revision.password_uuid.to_string(),
                    revision.user_id.as_str(),
                    revision.folder_uuid.map(|value| value.to_string()),
                    revision.label.as_str(),
                    revision.username.as_str(),
                    revision.password.as_str(),
                    revision.url.as_str(),
                    revision.notes.as_str(),
                    bool_to_int(revision.favorite),
                    bool_to_int(revision.deleted),
                    revision.created_at,
                    revision.updated_at,
                ],
            )?;
            return self.load_by_id(self.conn.last_insert_rowid());
        };

        let changed = self.conn.execute(
            "UPDATE password_revisions
             SET
                is_deleted = ?2,
                updated_at = ?3
             WHERE id = ?1;",
            params![id, bool_to_int(revision.deleted), revision.updated_at],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: ObjectKind::PasswordRevision,
                uuid: revision.uuid,
            });
        }
        self.load_by_id(id)
    }

    fn hard_delete(&self, revision: &PasswordRevision) -> RepoResult<()> {
        let not_found = || RepoError::NotFound {
            kind: ObjectKind::PasswordRevision,
            uuid: revision.uuid,
        };
        let id = revision.id.ok_or_else(not_found)?;
        let is_deleted: i64 = self
            .conn
            .query_row(
                "SELECT is_deleted FROM password_revisions WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(not_found)?;
        if !parse_flag(is_deleted, "password_revisions.is_deleted")? {
            return Err(RepoError::LiveObject {
                kind: ObjectKind::PasswordRevision,
                uuid: revision.uuid,
            });
        }

        self.conn
            .execute("DELETE FROM password_revisions WHERE id = ?1;", [id])?;
        Ok(())
    }
}

impl RevisionRepository for SqliteRevisionRepository<'_> {
    fn find_by_password(&self, password_uuid: Uuid) -> RepoResult<Vec<PasswordRevision>> {
        self.query_revisions(
            &format!(
                "{REVISION_SELECT_SQL}
                 WHERE password_uuid = ?1
                   AND (?2 IS NULL OR user_id = ?2)
                 ORDER BY created_at ASC, id ASC;"
            ),
            params![password_uuid.to_string(), self.user_id.as_deref()],
        )
    }
}

fn parse_revision_row(row: &Row<'_>) -> RepoResult<PasswordRevision> {
    let uuid_text: String = row.get("uuid")?;
    let parent_text: String = row.get("password_uuid")?;
    Ok(PasswordRevision {
        id: Some(row.get("id")?),
        uuid: parse_uuid(&uuid_text, "password_revisions.uuid")?,
        password_uuid: parse_uuid(&parent_text, "password_revisions.password_uuid")?,
        user_id: row.get("user_id")?,
        folder_uuid: parse_optional_uuid(
            row.get("folder_uuid")?,
            "password_revisions.folder_uuid",
        )?,
        label: row.get("label")?,
        username: row.get("username")?,
        password: row.get("password")?,
        url: row.get("url")?,
        notes: row.get("notes")?,
        favorite: parse_flag(row.get("favorite")?, "password_revisions.favorite")?,
        deleted: parse_flag(row.get("is_deleted")?, "password_revisions.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
