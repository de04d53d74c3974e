//! Repository layer: SQLite stores for passwords, revisions and tag relations.
//!
//! # Responsibility
//! - Define the store capabilities the lifecycle engine is generic over.
//! - Keep SQL, joins and row decoding inside the persistence boundary.
//!
//! # Invariants
//! - Writes validate the model before any SQL mutation.
//! - Uuid lookups report `NotFound` and `AmbiguousResult` distinctly.

pub mod password_repo;
pub mod revision_repo;
pub mod store;
pub mod tag_relation_repo;
