//! Typed lifecycle events, their binding table and the dispatch bus.
//!
//! # Responsibility
//! - Define one strongly-typed event value per (object type, transition).
//! - Map `(ObjectKind, LifecyclePhase)` to an event factory at startup.
//! - Fan dispatched events out to subscribed listeners.
//!
//! # Invariants
//! - Binding lookup never fails loudly: a miss returns `None` and the caller
//!   reports it as a diagnostic.
//! - Listeners are registered before the bus is shared; dispatch only reads.

use crate::model::object::{ObjectKind, ObjectModel, VersionedObject};
use crate::model::password::Password;
use crate::model::revision::PasswordRevision;
use crate::model::tag_relation::PasswordTagRelation;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};

/// Typed event phases fired by lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LifecyclePhase {
    BeforeCloned,
    Cloned,
    AfterCloned,
    BeforeDeleted,
    Deleted,
    AfterDeleted,
    BeforeDestroyed,
    Destroyed,
    AfterDestroyed,
}

impl LifecyclePhase {
    pub const ALL: [LifecyclePhase; 9] = [
        Self::BeforeCloned,
        Self::Cloned,
        Self::AfterCloned,
        Self::BeforeDeleted,
        Self::Deleted,
        Self::AfterDeleted,
        Self::BeforeDestroyed,
        Self::Destroyed,
        Self::AfterDestroyed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeCloned => "beforeCloned",
            Self::Cloned => "cloned",
            Self::AfterCloned => "afterCloned",
            Self::BeforeDeleted => "beforeDeleted",
            Self::Deleted => "deleted",
            Self::AfterDeleted => "afterDeleted",
            Self::BeforeDestroyed => "beforeDestroyed",
            Self::Destroyed => "destroyed",
            Self::AfterDestroyed => "afterDestroyed",
        }
    }

    pub fn stage(self) -> EventStage {
        match self {
            Self::BeforeCloned | Self::BeforeDeleted | Self::BeforeDestroyed => EventStage::Before,
            Self::Cloned | Self::Deleted | Self::Destroyed => EventStage::On,
            Self::AfterCloned | Self::AfterDeleted | Self::AfterDestroyed => EventStage::After,
        }
    }

    fn is_clone_phase(self) -> bool {
        matches!(
            self,
            Self::BeforeCloned | Self::Cloned | Self::AfterCloned
        )
    }
}

impl Display for LifecyclePhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of an event relative to persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventStage {
    Before,
    On,
    After,
}

/// Clone transition payload. `clone` is `None` before the clone exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClonedEvent<T> {
    pub stage: EventStage,
    pub original: T,
    pub clone: Option<T>,
}

/// Delete or destroy transition payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEvent<T> {
    pub stage: EventStage,
    pub object: T,
}

/// Every typed event the core can dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LifecycleEvent {
    PasswordCloned(ClonedEvent<Password>),
    PasswordDeleted(ObjectEvent<Password>),
    PasswordDestroyed(ObjectEvent<Password>),
    RevisionCloned(ClonedEvent<PasswordRevision>),
    RevisionDeleted(ObjectEvent<PasswordRevision>),
    RevisionDestroyed(ObjectEvent<PasswordRevision>),
    TagRelationDeleted(ObjectEvent<PasswordTagRelation>),
    TagRelationDestroyed(ObjectEvent<PasswordTagRelation>),
}

impl LifecycleEvent {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::PasswordCloned(_) | Self::PasswordDeleted(_) | Self::PasswordDestroyed(_) => {
                ObjectKind::Password
            }
            Self::RevisionCloned(_) | Self::RevisionDeleted(_) | Self::RevisionDestroyed(_) => {
                ObjectKind::PasswordRevision
            }
            Self::TagRelationDeleted(_) | Self::TagRelationDestroyed(_) => {
                ObjectKind::PasswordTagRelation
            }
        }
    }

    pub fn stage(&self) -> EventStage {
        match self {
            Self::PasswordCloned(event) => event.stage,
            Self::RevisionCloned(event) => event.stage,
            Self::PasswordDeleted(event) | Self::PasswordDestroyed(event) => event.stage,
            Self::RevisionDeleted(event) | Self::RevisionDestroyed(event) => event.stage,
            Self::TagRelationDeleted(event) | Self::TagRelationDestroyed(event) => event.stage,
        }
    }

    /// Phase this event was built for.
    pub fn phase(&self) -> LifecyclePhase {
        let transition = match self {
            Self::PasswordCloned(_) | Self::RevisionCloned(_) => 0,
            Self::PasswordDeleted(_) | Self::RevisionDeleted(_) | Self::TagRelationDeleted(_) => 1,
            Self::PasswordDestroyed(_)
            | Self::RevisionDestroyed(_)
            | Self::TagRelationDestroyed(_) => 2,
        };
        let stage = match self.stage() {
            EventStage::Before => 0,
            EventStage::On => 1,
            EventStage::After => 2,
        };
        LifecyclePhase::ALL[transition * 3 + stage]
    }
}

/// Objects handed to an event factory.
#[derive(Clone, Copy)]
pub enum EventSubject<'a> {
    Object(&'a dyn VersionedObject),
    Cloned {
        original: &'a dyn VersionedObject,
        clone: Option<&'a dyn VersionedObject>,
    },
}

/// Builds the typed event for one phase, or `None` if the subject does not
/// fit the bound type.
pub type EventFactory = fn(LifecyclePhase, EventSubject<'_>) -> Option<LifecycleEvent>;

/// Compile-time table from `(ObjectKind, LifecyclePhase)` to event factory.
#[derive(Clone, Default)]
pub struct EventBindings {
    factories: BTreeMap<(ObjectKind, LifecyclePhase), EventFactory>,
}

impl EventBindings {
    /// Empty table: every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings shipped with the core.
    ///
    /// Tag relations are never cloned through the engine, so they only bind
    /// the delete and destroy phases.
    pub fn standard() -> Self {
        let mut bindings = Self::new();
        for phase in LifecyclePhase::ALL {
            bindings.bind(ObjectKind::Password, phase, |phase, subject| {
                if phase.is_clone_phase() {
                    cloned_event::<Password>(phase, subject).map(LifecycleEvent::PasswordCloned)
                } else if phase_is_delete(phase) {
                    object_event::<Password>(phase, subject).map(LifecycleEvent::PasswordDeleted)
                } else {
                    object_event::<Password>(phase, subject).map(LifecycleEvent::PasswordDestroyed)
                }
            });
            bindings.bind(ObjectKind::PasswordRevision, phase, |phase, subject| {
                if phase.is_clone_phase() {
                    cloned_event::<PasswordRevision>(phase, subject)
                        .map(LifecycleEvent::RevisionCloned)
                } else if phase_is_delete(phase) {
                    object_event::<PasswordRevision>(phase, subject)
                        .map(LifecycleEvent::RevisionDeleted)
                } else {
                    object_event::<PasswordRevision>(phase, subject)
                        .map(LifecycleEvent::RevisionDestroyed)
                }
            });
            if phase.is_clone_phase() {
                continue;
            }
            bindings.bind(ObjectKind::PasswordTagRelation, phase, |phase, subject| {
                if phase_is_delete(phase) {
                    object_event::<PasswordTagRelation>(phase, subject)
                        .map(LifecycleEvent::TagRelationDeleted)
                } else {
                    object_event::<PasswordTagRelation>(phase, subject)
                        .map(LifecycleEvent::TagRelationDestroyed)
                }
            });
        }
        bindings
    }

    /// Binds or replaces the factory for one key.
    pub fn bind(&mut self, kind: ObjectKind, phase: LifecyclePhase, factory: EventFactory) {
        self.factories.insert((kind, phase), factory);
    }

    pub fn is_bound(&self, kind: ObjectKind, phase: LifecyclePhase) -> bool {
        self.factories.contains_key(&(kind, phase))
    }

    /// Builds the typed event for `(kind, phase)`, if one is bound.
    pub fn resolve(
        &self,
        kind: ObjectKind,
        phase: LifecyclePhase,
        subject: EventSubject<'_>,
    ) -> Option<LifecycleEvent> {
        let factory = self.factories.get(&(kind, phase))?;
        factory(phase, subject)
    }
}

impl Debug for EventBindings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBindings")
            .field("keys", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn phase_is_delete(phase: LifecyclePhase) -> bool {
    matches!(
        phase,
        LifecyclePhase::BeforeDeleted | LifecyclePhase::Deleted | LifecyclePhase::AfterDeleted
    )
}

fn downcast<T: ObjectModel>(object: &dyn VersionedObject) -> Option<T> {
    object.as_any().downcast_ref::<T>().cloned()
}

fn cloned_event<T: ObjectModel>(
    phase: LifecyclePhase,
    subject: EventSubject<'_>,
) -> Option<ClonedEvent<T>> {
    let EventSubject::Cloned { original, clone } = subject else {
        return None;
    };
    let clone = match clone {
        Some(object) => Some(downcast::<T>(object)?),
        None => None,
    };
    Some(ClonedEvent {
        stage: phase.stage(),
        original: downcast::<T>(original)?,
        clone,
    })
}

fn object_event<T: ObjectModel>(
    phase: LifecyclePhase,
    subject: EventSubject<'_>,
) -> Option<ObjectEvent<T>> {
    let EventSubject::Object(object) = subject else {
        return None;
    };
    Some(ObjectEvent {
        stage: phase.stage(),
        object: downcast::<T>(object)?,
    })
}

/// Listener invoked for every dispatched event.
pub type EventListener = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Typed event dispatcher.
#[derive(Default)]
pub struct TypedEventBus {
    listeners: Vec<EventListener>,
}

impl TypedEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl Fn(&LifecycleEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Delivers `event` to every listener in subscription order and returns
    /// how many listeners ran.
    pub fn dispatch(&self, event: &LifecycleEvent) -> usize {
        for listener in &self.listeners {
            listener(event);
        }
        self.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Debug for TypedEventBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedEventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBindings, EventStage, EventSubject, LifecycleEvent, LifecyclePhase};
    use crate::model::object::ObjectKind;
    use crate::model::password::Password;
    use crate::model::revision::PasswordRevision;
    use uuid::Uuid;

    #[test]
    fn standard_bindings_cover_password_and_revision_phases() {
        let bindings = EventBindings::standard();
        for phase in LifecyclePhase::ALL {
            assert!(bindings.is_bound(ObjectKind::Password, phase));
            assert!(bindings.is_bound(ObjectKind::PasswordRevision, phase));
        }
        assert!(!bindings.is_bound(ObjectKind::PasswordTagRelation, LifecyclePhase::Cloned));
        assert!(bindings.is_bound(ObjectKind::PasswordTagRelation, LifecyclePhase::Destroyed));
    }

    #[test]
    fn resolve_builds_event_matching_phase() {
        let bindings = EventBindings::standard();
        let password = Password::new("alice", Uuid::new_v4());
        for phase in LifecyclePhase::ALL {
            let subject = if matches!(
                phase,
                LifecyclePhase::BeforeCloned | LifecyclePhase::Cloned | LifecyclePhase::AfterCloned
            ) {
                EventSubject::Cloned {
                    original: &password,
                    clone: None,
                }
            } else {
                EventSubject::Object(&password)
            };
            let event = bindings
                .resolve(ObjectKind::Password, phase, subject)
                .expect("password phases are bound");
            assert_eq!(event.phase(), phase);
            assert_eq!(event.kind(), ObjectKind::Password);
        }
    }

    #[test]
    fn resolve_rejects_subject_of_another_type() {
        let bindings = EventBindings::standard();
        let revision = PasswordRevision::new(Uuid::new_v4(), "alice", "mail");
        let event = bindings.resolve(
            ObjectKind::Password,
            LifecyclePhase::Deleted,
            EventSubject::Object(&revision),
        );
        assert!(event.is_none());
    }

    #[test]
    fn empty_bindings_miss_every_lookup() {
        let bindings = EventBindings::new();
        let password = Password::new("alice", Uuid::new_v4());
        let event = bindings.resolve(
            ObjectKind::Password,
            LifecyclePhase::Deleted,
            EventSubject::Object(&password),
        );
        assert!(event.is_none());
    }

    #[test]
    fn before_stage_is_reported_for_before_phases() {
        let bindings = EventBindings::standard();
        let password = Password::new("alice", Uuid::new_v4());
        let event = bindings
            .resolve(
                ObjectKind::Password,
                LifecyclePhase::BeforeDestroyed,
                EventSubject::Object(&password),
            )
            .expect("bound");
        assert!(matches!(
            event,
            LifecycleEvent::PasswordDestroyed(ref inner) if inner.stage == EventStage::Before
        ));
    }
}
