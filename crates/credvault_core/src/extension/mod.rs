//! Lifecycle extension points.
//!
//! Two independent registries observe every lifecycle transition:
//! - `hooks`: untyped callbacks keyed by `(object type name, phase name)`;
//! - `events`: typed event values resolved through `EventBindings` and
//!   delivered by `TypedEventBus`.
//!
//! Both are built at process startup and only read afterwards.

pub mod diagnostics;
pub mod events;
pub mod hooks;
