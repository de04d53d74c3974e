//! String-keyed lifecycle hook registry.
//!
//! Hooks are the lightweight, untyped extension point: callbacks registered
//! under `(object type name, phase name)` receive the objects involved in a
//! transition as `&dyn VersionedObject`.
//!
//! Keys are nested per object type so `emit` looks them up with borrowed
//! `&str` and allocates nothing.

use crate::model::object::VersionedObject;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

pub const PRE_CLONE: &str = "preClone";
pub const POST_CLONE: &str = "postClone";
pub const PRE_DELETE: &str = "preDelete";
pub const POST_DELETE: &str = "postDelete";
pub const PRE_DESTROY: &str = "preDestroy";
pub const POST_DESTROY: &str = "postDestroy";

/// Callback invoked with the objects of one lifecycle transition.
pub type HookCallback = Box<dyn Fn(&[&dyn VersionedObject]) + Send + Sync>;

/// Process-wide hook registry, populated at startup and read during
/// lifecycle operations.
#[derive(Default)]
pub struct HookRegistry {
    callbacks: BTreeMap<String, BTreeMap<String, Vec<HookCallback>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one callback. Callbacks under the same key run in
    /// registration order.
    pub fn register(
        &mut self,
        object_type: impl Into<String>,
        phase: impl Into<String>,
        callback: impl Fn(&[&dyn VersionedObject]) + Send + Sync + 'static,
    ) {
        self.callbacks
            .entry(object_type.into())
            .or_default()
            .entry(phase.into())
            .or_default()
            .push(Box::new(callback));
    }

    /// Invokes every callback under the key and returns how many ran.
    ///
    /// An unknown key is a no-op.
    pub fn emit(&self, object_type: &str, phase: &str, args: &[&dyn VersionedObject]) -> usize {
        let Some(callbacks) = self
            .callbacks
            .get(object_type)
            .and_then(|phases| phases.get(phase))
        else {
            return 0;
        };
        for callback in callbacks {
            callback(args);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl Debug for HookRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field(
                "keys",
                &self
                    .callbacks
                    .iter()
                    .flat_map(|(object_type, phases)| {
                        phases.keys().map(move |phase| (object_type, phase))
                    })
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{HookRegistry, PRE_DELETE};
    use crate::model::object::VersionedObject;
    use crate::model::password::Password;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[test]
    fn emit_without_listeners_is_a_no_op() {
        let registry = HookRegistry::new();
        let password = Password::new("alice", Uuid::new_v4());
        assert_eq!(registry.emit("Password", PRE_DELETE, &[&password]), 0);
    }

    #[test]
    fn emit_runs_callbacks_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        for label in ["first", "second"] {
            let seen = Arc::clone(&seen);
            registry.register("Password", PRE_DELETE, move |args| {
                seen.lock()
                    .expect("hook log lock")
                    .push(format!("{label}:{}", args.len()));
            });
        }

        let password = Password::new("alice", Uuid::new_v4());
        let args: [&dyn VersionedObject; 1] = [&password];
        assert_eq!(registry.emit("Password", PRE_DELETE, &args), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            *seen.lock().expect("hook log lock"),
            vec!["first:1".to_string(), "second:1".to_string()]
        );
    }

    #[test]
    fn keys_are_matched_on_both_object_type_and_phase() {
        let mut registry = HookRegistry::new();
        registry.register("PasswordRevision", PRE_DELETE, |_| {});
        let password = Password::new("alice", Uuid::new_v4());
        assert_eq!(registry.emit("Password", PRE_DELETE, &[&password]), 0);
        assert_eq!(registry.emit("PasswordRevision", "postDelete", &[&password]), 0);
    }

    #[test]
    fn runtime_built_keys_match_borrowed_lookups() {
        let mut registry = HookRegistry::new();
        registry.register(String::from("Password"), format!("pre{}", "Delete"), |_| {});
        registry.register("Password", "postDelete", |_| {});
        let password = Password::new("alice", Uuid::new_v4());
        let object_type = password.kind().to_string();
        assert_eq!(registry.emit(object_type.as_str(), PRE_DELETE, &[&password]), 1);
        assert_eq!(registry.len(), 2);
        assert!(format!("{registry:?}").contains("postDelete"));
    }
}
