//! Core domain logic for the credential vault.
//! This crate is the single source of truth for password lifecycle invariants.

pub mod config;
pub mod db;
pub mod extension;
pub mod identity;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use extension::diagnostics::{Diagnostics, LogDiagnostics};
pub use extension::events::{
    ClonedEvent, EventBindings, EventStage, EventSubject, LifecycleEvent, LifecyclePhase,
    ObjectEvent, TypedEventBus,
};
pub use extension::hooks::HookRegistry;
pub use identity::{IdentityProvider, StaticIdentity};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::object::{
    FieldError, FieldValue, ObjectKind, ObjectModel, Overwrites, ValidationError, VersionedObject,
};
pub use model::password::Password;
pub use model::revision::PasswordRevision;
pub use model::tag_relation::PasswordTagRelation;
pub use repo::password_repo::{PasswordRepository, SqlitePasswordRepository};
pub use repo::revision_repo::{RevisionRepository, SqliteRevisionRepository};
pub use repo::store::{ObjectStore, Persister, RepoError, RepoResult};
pub use repo::tag_relation_repo::{SqliteTagRelationRepository, TagRelationRepository};
pub use service::clock::{Clock, FixedClock, SystemClock};
pub use service::lifecycle::{LifecycleContext, LifecycleError, LifecycleResult, LifecycleService};
pub use service::password_service::{
    purge_deleted, PasswordDraft, PasswordService, PasswordServiceError, PasswordServiceResult,
    PasswordSnapshot, PurgeReport,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
