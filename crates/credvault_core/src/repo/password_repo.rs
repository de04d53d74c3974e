//! Password entity store and its composed current-state queries.
//!
//! # Responsibility
//! - Persist password rows (identity + current revision pointer + tombstone).
//! - Resolve folder and tag membership by joining through the current
//!   revision and through tag relations.
//!
//! # Invariants
//! - Folder/tag queries are scoped to the calling user on every joined table.
//! - Hidden relations are excluded inside the join condition, not afterwards.
//! - A live password always points at a live revision of the same owner.

use crate::identity::IdentityProvider;
use crate::model::object::{ObjectKind, ObjectModel, ValidationError};
use crate::model::password::Password;
use crate::repo::store::{
    bool_to_int, ensure_connection_ready, exactly_one, parse_flag, parse_uuid, ObjectStore,
    Persister, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use uuid::Uuid;

const PASSWORD_COLUMNS: &[&str] = &[
    "id",
    "uuid",
    "user_id",
    "revision_uuid",
    "is_deleted",
    "created_at",
    "updated_at",
];

const PASSWORD_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.uuid AS uuid,
    p.user_id AS user_id,
    p.revision_uuid AS revision_uuid,
    p.is_deleted AS is_deleted,
    p.created_at AS created_at,
    p.updated_at AS updated_at
FROM passwords p";

/// Password-specific queries on top of the generic store capabilities.
pub trait PasswordRepository: Persister<Object = Password> {
    /// Live passwords of the calling user whose current revision is in
    /// `folder_uuid` (`None` = root folder).
    fn get_by_folder(&self, folder_uuid: Option<Uuid>) -> RepoResult<Vec<Password>>;
    /// Live passwords of the calling user linked to `tag_uuid`.
    fn get_by_tag(&self, tag_uuid: Uuid, include_hidden: bool) -> RepoResult<Vec<Password>>;
}

/// SQLite-backed password store scoped to one caller.
pub struct SqlitePasswordRepository<'conn> {
    conn: &'conn Connection,
    user_id: Option<String>,
}

impl<'conn> SqlitePasswordRepository<'conn> {
    /// Creates a store from a migrated connection, reading the caller once.
    pub fn try_new(conn: &'conn Connection, identity: &dyn IdentityProvider) -> RepoResult<Self> {
        ensure_connection_ready(conn, "passwords", PASSWORD_COLUMNS)?;
        Ok(Self {
            conn,
            user_id: identity.user_id(),
        })
    }

    /// Caller the store is scoped to.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn query_passwords<P: Params>(&self, sql: &str, params: P) -> RepoResult<Vec<Password>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut passwords = Vec::new();
        while let Some(row) = rows.next()? {
            passwords.push(parse_password_row(row)?);
        }
        Ok(passwords)
    }

    fn load_by_id(&self, id: i64) -> RepoResult<Password> {
        let rows = self.query_passwords(
            &format!("{PASSWORD_SELECT_SQL} WHERE p.id = ?1;"),
            [id],
        )?;
        rows.into_iter().next().ok_or_else(|| {
            RepoError::InvalidData(format!("password row {id} vanished after write"))
        })
    }

    fn ensure_revision_pointer(&self, password: &Password) -> RepoResult<()> {
        let revision: Option<(String, String, i64)> = self
            .conn
            .query_row(
                "SELECT password_uuid, user_id, is_deleted
                 FROM password_revisions
                 WHERE uuid = ?1;",
                [password.revision_uuid.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((parent, owner, is_deleted)) = revision else {
            return Err(ValidationError::RevisionNotLive {
                password: password.uuid,
                revision: password.revision_uuid,
            }
            .into());
        };
        if parse_flag(is_deleted, "password_revisions.is_deleted")? {
            return Err(ValidationError::RevisionNotLive {
                password: password.uuid,
                revision: password.revision_uuid,
            }
            .into());
        }
        if owner != password.user_id {
            return Err(ValidationError::RevisionOwnerMismatch {
                password: password.uuid,
                revision: password.revision_uuid,
            }
            .into());
        }
        if parse_uuid(&parent, "password_revisions.password_uuid")? != password.uuid {
            return Err(ValidationError::RevisionParentMismatch {
                password: password.uuid,
                revision: password.revision_uuid,
            }
            .into());
        }
        Ok(())
    }
}

impl ObjectStore for SqlitePasswordRepository<'_> {
    type Object = Password;

    fn find_by_uuid(&self, uuid: Uuid) -> RepoResult<Password> {
        let rows = self.query_passwords(
            &format!(
                "{PASSWORD_SELECT_SQL}
                 WHERE p.uuid = ?1
                   AND (?2 IS NULL OR p.user_id = ?2);"
            ),
            params![uuid.to_string(), self.user_id.as_deref()],
        )?;
        exactly_one(Password::KIND, uuid, rows)
    }

    fn find_all_by_user_id(&self, user_id: &str) -> RepoResult<Vec<Password>> {
        self.query_passwords(
            &format!("{PASSWORD_SELECT_SQL} WHERE p.user_id = ?1 ORDER BY p.id ASC;"),
            [user_id],
        )
    }

    fn find_all_deleted(&self) -> RepoResult<Vec<Password>> {
        self.query_passwords(
            &format!("{PASSWORD_SELECT_SQL} WHERE p.is_deleted = 1 ORDER BY p.id ASC;"),
            [],
        )
    }
}

impl Persister for SqlitePasswordRepository<'_> {
    fn save(&self, password: &Password) -> RepoResult<Password> {
        password.validate()?;
        if !password.deleted {
            self.ensure_revision_pointer(password)?;
        }

        let Some(id) = password.id else {
            self.conn.execute(
                "INSERT INTO passwords (
                    uuid,
                    user_id,
                    revision_uuid,
                    is_deleted,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    password.uuid.to_string(),
                    password.user_id.as_str(),
                    password.revision_uuid.to_string(),
                    bool_to_int(password.deleted),
                    password.created_at,
                    password.updated_at,
                ],
            )?;
            return self.load_by_id(self.conn.last_insert_rowid());
        };

        let changed = self.conn.execute(
            "UPDATE passwords
             SET
                user_id = ?2,
                revision_uuid = ?3,
                is_deleted = ?4,
                updated_at = ?5
             WHERE id = ?1;",
            params![
                id,
                password.user_id.as_str(),
                password.revision_uuid.to_string(),
                bool_to_int(password.deleted),
                password.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: ObjectKind::Password,
                uuid: password.uuid,
            });
        }
        self.load_by_id(id)
    }

    fn hard_delete(&self, password: &Password) -> RepoResult<()> {
        let not_found = || RepoError::NotFound {
            kind: ObjectKind::Password,
            uuid: password.uuid,
        };
        let id = password.id.ok_or_else(not_found)?;
        let is_deleted: Option<i64> = self
            .conn
            .query_row(
                "SELECT is_deleted FROM passwords WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        let is_deleted = is_deleted.ok_or_else(not_found)?;
        if !parse_flag(is_deleted, "passwords.is_deleted")? {
            return Err(RepoError::LiveObject {
                kind: ObjectKind::Password,
                uuid: password.uuid,
            });
        }

        self.conn
            .execute("DELETE FROM passwords WHERE id = ?1;", [id])?;
        Ok(())
    }
}

impl PasswordRepository for SqlitePasswordRepository<'_> {
    fn get_by_folder(&self, folder_uuid: Option<Uuid>) -> RepoResult<Vec<Password>> {
        self.query_passwords(
            &format!(
                "{PASSWORD_SELECT_SQL}
                 INNER JOIN password_revisions r ON p.revision_uuid = r.uuid
                 WHERE p.is_deleted = 0
                   AND p.user_id = ?1
                   AND r.folder_uuid IS ?2
                   AND r.is_deleted = 0
                   AND r.user_id = ?3
                 ORDER BY p.id ASC;"
            ),
            params![
                self.user_id.as_deref(),
                folder_uuid.map(|value| value.to_string()),
                self.user_id.as_deref(),
            ],
        )
    }

    fn get_by_tag(&self, tag_uuid: Uuid, include_hidden: bool) -> RepoResult<Vec<Password>> {
        let hidden_clause = if include_hidden {
            ""
        } else {
            " AND t.hidden = 0"
        };
        self.query_passwords(
            &format!(
                "{PASSWORD_SELECT_SQL}
                 INNER JOIN password_tag_relations t
                    ON p.uuid = t.password_uuid
                   AND t.tag_uuid = ?2
                   AND t.is_deleted = 0
                   AND t.user_id = ?3{hidden_clause}
                 WHERE p.is_deleted = 0
                   AND p.user_id = ?1
                 ORDER BY p.id ASC;"
            ),
            params![
                self.user_id.as_deref(),
                tag_uuid.to_string(),
                self.user_id.as_deref(),
            ],
        )
    }
}

fn parse_password_row(row: &Row<'_>) -> RepoResult<Password> {
    let uuid_text: String = row.get("uuid")?;
    let revision_text: String = row.get("revision_uuid")?;
    Ok(Password {
        id: Some(row.get("id")?),
        uuid: parse_uuid(&uuid_text, "passwords.uuid")?,
        user_id: row.get("user_id")?,
        revision_uuid: parse_uuid(&revision_text, "passwords.revision_uuid")?,
        deleted: parse_flag(row.get("is_deleted")?, "passwords.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
