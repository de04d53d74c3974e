//! Password/tag relation store.
//!
//! # Invariants
//! - Relations have their own tombstone; deleting one never touches either
//!   endpoint.
//! - `(password_uuid, tag_uuid)` should be unique among live rows. This store
//!   does not enforce it.
//! - With a user identity, lookups only see that user's relations.

use crate::identity::IdentityProvider;
use crate::model::object::{ObjectKind, ObjectModel};
use crate::model::tag_relation::PasswordTagRelation;
use crate::repo::store::{
    bool_to_int, ensure_connection_ready, exactly_one, parse_flag, parse_uuid, ObjectStore,
    Persister, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use uuid::Uuid;

const RELATION_COLUMNS: &[&str] = &[
    "id",
    "uuid",
    "password_uuid",
    "tag_uuid",
    "user_id",
    "hidden",
    "is_deleted",
    "created_at",
    "updated_at",
];

const RELATION_SELECT_SQL: &str = "SELECT
    id,
    uuid,
    password_uuid,
    tag_uuid,
    user_id,
    hidden,
    is_deleted,
    created_at,
    updated_at
FROM password_tag_relations";

/// Relation-specific queries.
pub trait TagRelationRepository: Persister<Object = PasswordTagRelation> {
    /// Relations of one password, optionally including tombstones.
    fn find_by_password(
        &self,
        password_uuid: Uuid,
        include_deleted: bool,
    ) -> RepoResult<Vec<PasswordTagRelation>>;
    /// First live relation for the pair, hidden or not.
    fn find_live(
        &self,
        password_uuid: Uuid,
        tag_uuid: Uuid,
    ) -> RepoResult<Option<PasswordTagRelation>>;
    /// Whether the password carries the tag, counting hidden relations.
    fn is_tagged(&self, password_uuid: Uuid, tag_uuid: Uuid) -> RepoResult<bool>;
}

/// SQLite-backed tag relation store.
pub struct SqliteTagRelationRepository<'conn> {
    conn: &'conn Connection,
    user_id: Option<String>,
}

impl<'conn> SqliteTagRelationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, identity: &dyn IdentityProvider) -> RepoResult<Self> {
        ensure_connection_ready(conn, "password_tag_relations", RELATION_COLUMNS)?;
        Ok(Self {
            conn,
            user_id: identity.user_id(),
        })
    }

    fn query_relations<P: Params>(
        &self,
        sql: &str,
        params: P,
    ) -> RepoResult<Vec<PasswordTagRelation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut relations = Vec::new();
        while let Some(row) = rows.next()? {
            relations.push(parse_relation_row(row)?);
        }
        Ok(relations)
    }

    fn load_by_id(&self, id: i64) -> RepoResult<PasswordTagRelation> {
        let rows = self.query_relations(&format!("{RELATION_SELECT_SQL} WHERE id = ?1;"), [id])?;
        rows.into_iter().next().ok_or_else(|| {
            RepoError::InvalidData(format!("tag relation row {id} vanished after write"))
        })
    }
}

impl ObjectStore for SqliteTagRelationRepository<'_> {
    type Object = PasswordTagRelation;

    fn find_by_uuid(&self, uuid: Uuid) -> RepoResult<PasswordTagRelation> {
        let rows = self.query_relations(
            &format!(
                "{RELATION_SELECT_SQL}
                 WHERE uuid = ?1
                   AND (?2 IS NULL OR user_id = ?2);"
            ),
            params![uuid.to_string(), self.user_id.as_deref()],
        )?;
        exactly_one(PasswordTagRelation::KIND, uuid, rows)
    }

    fn find_all_by_user_id(&self, user_id: &str) -> RepoResult<Vec<PasswordTagRelation>> {
        self.query_relations(
            &format!("{RELATION_SELECT_SQL} WHERE user_id = ?1 ORDER BY id ASC;"),
            [user_id],
        )
    }

    fn find_all_deleted(&self) -> RepoResult<Vec<PasswordTagRelation>> {
        self.query_relations(
            &format!("{RELATION_SELECT_SQL} WHERE is_deleted = 1 ORDER BY id ASC;"),
            [],
        )
    }
}

impl Persister for SqliteTagRelationRepository<'_> {
    fn save(&self, relation: &PasswordTagRelation) -> RepoResult<PasswordTagRelation> {
        relation.validate()?;

        let Some(id) = relation.id else {
            self.conn.execute(
                "INSERT INTO password_tag_relations (
                    uuid,
                    password_uuid,
                    tag_uuid,
                    user_id,
                    hidden,
                    is_deleted,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    relation.uuid.to_string(),
                    relation.password_uuid.to_string(),
                    relation.tag_uuid.to_string(),
                    relation.user_id.as_str(),
                    bool_to_int(relation.hidden),
                    bool_to_int(relation.deleted),
                    relation.created_at,
                    relation.updated_at,
                ],
            )?;
            return self.load_by_id(self.conn.last_insert_rowid());
        };

        let changed = self.conn.execute(
            "UPDATE password_tag_relations
             SET
                password_uuid = ?2,
                tag_uuid = ?3,
                user_id = ?4,
                hidden = ?5,
                is_deleted = ?6,
                updated_at = ?7
             WHERE id = ?1;",
            params![
                id,
                relation.password_uuid.to_string(),
                relation.tag_uuid.to_string(),
                relation.user_id.as_str(),
                bool_to_int(relation.hidden),
                bool_to_int(relation.deleted),
                relation.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: ObjectKind::PasswordTagRelation,
                uuid: relation.uuid,
            });
        }
        self.load_by_id(id)
    }

    fn hard_delete(&self, relation: &PasswordTagRelation) -> RepoResult<()> {
        let not_found = || RepoError::NotFound {
            kind: ObjectKind::PasswordTagRelation,
            uuid: relation.uuid,
        };
        let id = relation.id.ok_or_else(not_found)?;
        let is_deleted: i64 = self
            .conn
            .query_row(
                "SELECT is_deleted FROM password_tag_relations WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(not_found)?;
        if !parse_flag(is_deleted, "password_tag_relations.is_deleted")? {
            return Err(RepoError::LiveObject {
                kind: ObjectKind::PasswordTagRelation,
                uuid: relation.uuid,
            });
        }

        self.conn
            .execute("DELETE FROM password_tag_relations WHERE id = ?1;", [id])?;
        Ok(())
    }
}

impl TagRelationRepository for SqliteTagRelationRepository<'_> {
    fn find_by_password(
        &self,
        password_uuid: Uuid,
        include_deleted: bool,
    ) -> RepoResult<Vec<PasswordTagRelation>> {
        self.query_relations(
            &format!(
                "{RELATION_SELECT_SQL}
                 WHERE password_uuid = ?1
                   AND (?2 = 1 OR is_deleted = 0)
                   AND (?3 IS NULL OR user_id = ?3)
                 ORDER BY id ASC;"
            ),
            params![
                password_uuid.to_string(),
                bool_to_int(include_deleted),
                self.user_id.as_deref(),
            ],
        )
    }

    fn find_live(
        &self,
        password_uuid: Uuid,
        tag_uuid: Uuid,
    ) -> RepoResult<Option<PasswordTagRelation>> {
        let rows = self.query_relations(
            &format!(
                "{RELATION_SELECT_SQL}
                 WHERE password_uuid = ?1
                   AND tag_uuid = ?2
                   AND is_deleted = 0
                   AND (?3 IS NULL OR user_id = ?3)
                 ORDER BY id ASC
                 LIMIT 1;"
            ),
            params![
                password_uuid.to_string(),
                tag_uuid.to_string(),
                self.user_id.as_deref(),
            ],
        )?;
        Ok(rows.into_iter().next())
    }

    fn is_tagged(&self, password_uuid: Uuid, tag_uuid: Uuid) -> RepoResult<bool> {
        Ok(self.find_live(password_uuid, tag_uuid)?.is_some())
    }
}

fn parse_relation_row(row: &Row<'_>) -> RepoResult<PasswordTagRelation> {
    let uuid_text: String = row.get("uuid")?;
    let password_text: String = row.get("password_uuid")?;
    let tag_text: String = row.get("tag_uuid")?;
    Ok(PasswordTagRelation {
        id: Some(row.get("id")?),
        uuid: parse_uuid(&uuid_text, "password_tag_relations.uuid")?,
        password_uuid: parse_uuid(&password_text, "password_tag_relations.password_uuid")?,
        tag_uuid: parse_uuid(&tag_text, "password_tag_relations.tag_uuid")?,
        user_id: row.get("user_id")?,
        hidden: parse_flag(row.get("hidden")?, "password_tag_relations.hidden")?,
        deleted: parse_flag(row.get("is_deleted")?, "password_tag_relations.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
