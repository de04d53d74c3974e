//! Domain model for the credential vault.
//!
//! # Responsibility
//! - Define the password entity, its append-only revisions and tag relations.
//! - Provide the type-erased object contract used by the lifecycle engine.
//!
//! # Invariants
//! - Every object is identified by a stable `Uuid` and owned by one user.
//! - Deletion is a soft-delete tombstone until an explicit destroy.

pub mod object;
pub mod password;
pub mod revision;
pub mod tag_relation;
