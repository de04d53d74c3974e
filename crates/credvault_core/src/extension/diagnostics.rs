//! Diagnostics sink injected into lifecycle services.

use crate::extension::events::LifecyclePhase;
use crate::model::object::ObjectKind;
use log::error;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// Receives non-fatal anomalies observed during lifecycle operations.
pub trait Diagnostics: Send + Sync {
    /// No typed event is bound for `(kind, phase)`; the operation continues.
    fn missing_event_binding(&self, kind: ObjectKind, phase: LifecyclePhase);
}

/// Logs each missing binding once per `(kind, phase)` at error level.
#[derive(Debug, Default)]
pub struct LogDiagnostics {
    reported: Mutex<BTreeSet<(ObjectKind, LifecyclePhase)>>,
}

impl LogDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Diagnostics for LogDiagnostics {
    fn missing_event_binding(&self, kind: ObjectKind, phase: LifecyclePhase) {
        let first_report = self
            .reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((kind, phase));
        if first_report {
            error!(
                "event=missing_event_binding module=extension status=error object_type={kind} phase={phase}"
            );
        }
    }
}
