//! Generic lifecycle engine for versioned vault objects.
//!
//! # Responsibility
//! - Run `clone`, `delete` and `destroy` for one concrete object type.
//! - Drive the hook registry and the typed event bus around every transition.
//! - Expose thin read accessors over the underlying store.
//!
//! # Invariants
//! - Every operation rejects objects of another type before anything fires.
//! - Per operation, hooks and events fire in this order:
//!   `pre*` hook, mutation, `before*` event, persist, bare event, `after*`
//!   event, `post*` hook.
//! - `clone` is the exception: the copy is built and stamped before
//!   `preClone`, so a rejected overwrite fires nothing.
//! - Timestamps come from the context clock; `updated_at` never precedes
//!   `created_at`.
//! - `destroy` never hard-removes a live row: it runs the full `delete`
//!   sequence first.
//! - Notifications already fired are not undone when a later step fails.
//!
//! There is no locking or version check: two concurrent `delete` calls on
//! the same uuid both fire their full sequence and converge on the same
//! stored state.

use crate::extension::diagnostics::{Diagnostics, LogDiagnostics};
use crate::extension::events::{EventBindings, EventSubject, LifecyclePhase, TypedEventBus};
use crate::extension::hooks::{
    HookRegistry, POST_CLONE, POST_DELETE, POST_DESTROY, PRE_CLONE, PRE_DELETE, PRE_DESTROY,
};
use crate::model::object::{FieldError, ObjectKind, ObjectModel, Overwrites, VersionedObject};
use crate::repo::password_repo::PasswordRepository;
use crate::repo::revision_repo::RevisionRepository;
use crate::repo::store::{ObjectStore, Persister, RepoError};
use crate::repo::tag_relation_repo::TagRelationRepository;
use crate::service::clock::{Clock, SystemClock};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle operation failure.
#[derive(Debug)]
pub enum LifecycleError {
    /// The object handed in is not of the service's configured type.
    TypeMismatch {
        expected: ObjectKind,
        actual: ObjectKind,
    },
    /// A clone overwrite named an unknown field or carried the wrong type.
    InvalidOverwrite(FieldError),
    /// Uuid lookup matched zero rows.
    NotFound { kind: ObjectKind, uuid: Uuid },
    /// Uuid lookup matched more than one row.
    AmbiguousResult {
        kind: ObjectKind,
        uuid: Uuid,
        count: usize,
    },
    /// Persistence or query failure, propagated unchanged.
    Storage(RepoError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch { expected, actual } => {
                write!(f, "lifecycle service for {expected} received {actual}")
            }
            Self::InvalidOverwrite(err) => write!(f, "invalid clone overwrite: {err}"),
            Self::NotFound { kind, uuid } => write!(f, "{kind} not found: {uuid}"),
            Self::AmbiguousResult { kind, uuid, count } => {
                write!(f, "{kind} uuid {uuid} matched {count} rows")
            }
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidOverwrite(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LifecycleError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, uuid } => Self::NotFound { kind, uuid },
            RepoError::AmbiguousResult { kind, uuid, count } => {
                Self::AmbiguousResult { kind, uuid, count }
            }
            other => Self::Storage(other),
        }
    }
}

impl From<FieldError> for LifecycleError {
    fn from(value: FieldError) -> Self {
        Self::InvalidOverwrite(value)
    }
}

/// Process-wide collaborators shared by every lifecycle service.
///
/// Registries are wrapped in `Arc` and never mutated once services exist.
#[derive(Clone)]
pub struct LifecycleContext {
    hooks: Arc<HookRegistry>,
    events: Arc<TypedEventBus>,
    bindings: Arc<EventBindings>,
    diagnostics: Arc<dyn Diagnostics>,
    clock: Arc<dyn Clock>,
}

impl LifecycleContext {
    /// Context with the standard event bindings, log diagnostics and the
    /// system clock.
    pub fn new(hooks: Arc<HookRegistry>, events: Arc<TypedEventBus>) -> Self {
        Self {
            hooks,
            events,
            bindings: Arc::new(EventBindings::standard()),
            diagnostics: Arc::new(LogDiagnostics::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_bindings(mut self, bindings: Arc<EventBindings>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn events(&self) -> &TypedEventBus {
        &self.events
    }

    /// Current time from the injected clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

impl Default for LifecycleContext {
    fn default() -> Self {
        Self::new(
            Arc::new(HookRegistry::new()),
            Arc::new(TypedEventBus::new()),
        )
    }
}

impl Debug for LifecycleContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleContext")
            .field("hooks", &self.hooks)
            .field("events", &self.events)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// Lifecycle engine instantiated once per concrete object type.
pub struct LifecycleService<P: Persister> {
    persister: P,
    context: LifecycleContext,
}

impl<P: Persister> LifecycleService<P> {
    pub fn new(persister: P, context: LifecycleContext) -> Self {
        Self { persister, context }
    }

    /// Underlying store.
    pub fn store(&self) -> &P {
        &self.persister
    }

    pub fn context(&self) -> &LifecycleContext {
        &self.context
    }

    /// Persists `object` through the type's own save rules.
    pub fn save(&self, object: &P::Object) -> LifecycleResult<P::Object> {
        self.persister
            .save(object)
            .map_err(|err| self.failed("save", object.uuid(), err))
    }

    /// Returns an unsaved copy of `source` with fresh identity, `overwrites`
    /// applied and both timestamps set to now.
    ///
    /// # Errors
    /// - `TypeMismatch` when `source` is not `P::Object`.
    /// - `InvalidOverwrite` when an overwrite does not fit the type. Nothing
    ///   fires in that case.
    pub fn clone_object(
        &self,
        source: &dyn VersionedObject,
        overwrites: &Overwrites,
    ) -> LifecycleResult<P::Object> {
        let original = self.downcast_ref(source)?;
        debug!(
            "event=lifecycle_clone module=service status=start object_type={} uuid={} overwrites={}",
            Self::kind(),
            original.uuid(),
            overwrites.len()
        );

        let mut clone = original.clone();
        clone.reset_identity();
        overwrites.apply_to(&mut clone)?;
        let now = self.context.clock.now_ms();
        clone.set_timestamps(now, now);

        self.emit_hook(PRE_CLONE, &[original]);
        self.fire(
            LifecyclePhase::BeforeCloned,
            EventSubject::Cloned {
                original,
                clone: None,
            },
        );
        for phase in [LifecyclePhase::Cloned, LifecyclePhase::AfterCloned] {
            self.fire(
                phase,
                EventSubject::Cloned {
                    original,
                    clone: Some(&clone),
                },
            );
        }
        self.emit_hook(POST_CLONE, &[original, &clone]);

        debug!(
            "event=lifecycle_clone module=service status=ok object_type={} uuid={} clone_uuid={}",
            Self::kind(),
            original.uuid(),
            clone.uuid()
        );
        Ok(clone)
    }

    /// Soft-deletes `object` and replaces it with the persisted state.
    ///
    /// Calling this twice persists the same state twice and fires every
    /// hook and event twice.
    pub fn delete(&self, object: &mut dyn VersionedObject) -> LifecycleResult<()> {
        let target = self.downcast_mut(object)?;
        self.run_delete(target)
    }

    /// Permanently removes `object`, soft-deleting it first if needed.
    pub fn destroy(&self, object: &mut dyn VersionedObject) -> LifecycleResult<()> {
        let target = self.downcast_mut(object)?;
        let uuid = target.uuid();
        debug!(
            "event=lifecycle_destroy module=service status=start object_type={} uuid={uuid}",
            Self::kind()
        );

        self.emit_hook(PRE_DESTROY, &[&*target]);
        if !target.is_deleted() {
            self.run_delete(target)?;
        }
        self.fire(
            LifecyclePhase::BeforeDestroyed,
            EventSubject::Object(&*target),
        );
        self.persister
            .hard_delete(target)
            .map_err(|err| self.failed("destroy", uuid, err))?;
        self.fire(LifecyclePhase::Destroyed, EventSubject::Object(&*target));
        self.fire(
            LifecyclePhase::AfterDestroyed,
            EventSubject::Object(&*target),
        );
        self.emit_hook(POST_DESTROY, &[&*target]);

        debug!(
            "event=lifecycle_destroy module=service status=ok object_type={} uuid={uuid}",
            Self::kind()
        );
        Ok(())
    }

    /// All soft-deleted rows of this type, across users.
    pub fn find_deleted(&self) -> LifecycleResult<Vec<P::Object>> {
        Ok(self.persister.find_all_deleted()?)
    }

    /// Every row owned by `user_id`, deleted or not.
    pub fn find_by_user_id(&self, user_id: &str) -> LifecycleResult<Vec<P::Object>> {
        Ok(self.persister.find_all_by_user_id(user_id)?)
    }

    pub fn find_by_uuid(&self, uuid: Uuid) -> LifecycleResult<P::Object> {
        Ok(self.persister.find_by_uuid(uuid)?)
    }

    fn kind() -> ObjectKind {
        <P::Object as ObjectModel>::KIND
    }

    fn run_delete(&self, target: &mut P::Object) -> LifecycleResult<()> {
        let uuid = target.uuid();
        debug!(
            "event=lifecycle_delete module=service status=start object_type={} uuid={uuid}",
            Self::kind()
        );

        self.emit_hook(PRE_DELETE, &[&*target]);
        target.set_deleted(true);
        target.touch(self.context.clock.now_ms());
        self.fire(LifecyclePhase::BeforeDeleted, EventSubject::Object(&*target));
        let persisted = self
            .persister
            .save(target)
            .map_err(|err| self.failed("delete", uuid, err))?;
        *target = persisted;
        self.fire(LifecyclePhase::Deleted, EventSubject::Object(&*target));
        self.fire(LifecyclePhase::AfterDeleted, EventSubject::Object(&*target));
        self.emit_hook(POST_DELETE, &[&*target]);

        debug!(
            "event=lifecycle_delete module=service status=ok object_type={} uuid={uuid}",
            Self::kind()
        );
        Ok(())
    }

    fn downcast_ref<'a>(&self, object: &'a dyn VersionedObject) -> LifecycleResult<&'a P::Object> {
        let actual = object.kind();
        if actual != Self::kind() {
            return Err(self.mismatch(actual));
        }
        object
            .as_any()
            .downcast_ref::<P::Object>()
            .ok_or_else(|| self.mismatch(actual))
    }

    fn downcast_mut<'a>(
        &self,
        object: &'a mut dyn VersionedObject,
    ) -> LifecycleResult<&'a mut P::Object> {
        let actual = object.kind();
        if actual != Self::kind() {
            return Err(self.mismatch(actual));
        }
        object
            .as_any_mut()
            .downcast_mut::<P::Object>()
            .ok_or_else(|| self.mismatch(actual))
    }

    fn mismatch(&self, actual: ObjectKind) -> LifecycleError {
        warn!(
            "event=lifecycle_guard module=service status=error object_type={} actual_type={actual} error_code=type_mismatch",
            Self::kind()
        );
        LifecycleError::TypeMismatch {
            expected: Self::kind(),
            actual,
        }
    }

    fn failed(&self, operation: &str, uuid: Uuid, err: RepoError) -> LifecycleError {
        warn!(
            "event=lifecycle_{operation} module=service status=error object_type={} uuid={uuid} error={err}",
            Self::kind()
        );
        err.into()
    }

    fn emit_hook(&self, phase: &str, args: &[&dyn VersionedObject]) {
        self.context.hooks.emit(Self::kind().as_str(), phase, args);
    }

    fn fire(&self, phase: LifecyclePhase, subject: EventSubject<'_>) {
        match self.context.bindings.resolve(Self::kind(), phase, subject) {
            Some(event) => {
                self.context.events.dispatch(&event);
            }
            None => self
                .context
                .diagnostics
                .missing_event_binding(Self::kind(), phase),
        }
    }
}

impl<P: PasswordRepository> LifecycleService<P> {
    /// See `PasswordRepository::get_by_folder`.
    pub fn get_by_folder(&self, folder_uuid: Option<Uuid>) -> LifecycleResult<Vec<P::Object>> {
        Ok(self.persister.get_by_folder(folder_uuid)?)
    }

    /// See `PasswordRepository::get_by_tag`.
    pub fn get_by_tag(
        &self,
        tag_uuid: Uuid,
        include_hidden: bool,
    ) -> LifecycleResult<Vec<P::Object>> {
        Ok(self.persister.get_by_tag(tag_uuid, include_hidden)?)
    }
}

impl<P: RevisionRepository> LifecycleService<P> {
    pub fn history(&self, password_uuid: Uuid) -> LifecycleResult<Vec<P::Object>> {
        Ok(self.persister.find_by_password(password_uuid)?)
    }
}

impl<P: TagRelationRepository> LifecycleService<P> {
    pub fn relations_of(
        &self,
        password_uuid: Uuid,
        include_deleted: bool,
    ) -> LifecycleResult<Vec<P::Object>> {
        Ok(self.persister.find_by_password(password_uuid, include_deleted)?)
    }

    pub fn find_live_relation(
        &self,
        password_uuid: Uuid,
        tag_uuid: Uuid,
    ) -> LifecycleResult<Option<P::Object>> {
        Ok(self.persister.find_live(password_uuid, tag_uuid)?)
    }

    pub fn is_tagged(&self, password_uuid: Uuid, tag_uuid: Uuid) -> LifecycleResult<bool> {
        Ok(self.persister.is_tagged(password_uuid, tag_uuid)?)
    }
}
