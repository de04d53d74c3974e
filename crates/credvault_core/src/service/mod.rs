//! Core use-case services.
//!
//! # Responsibility
//! - `lifecycle`: the generic clone/delete/destroy engine, one instance per
//!   object type.
//! - `password_service`: password use-cases composed from three engines.

pub mod clock;
pub mod lifecycle;
pub mod password_service;
