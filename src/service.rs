//! Dependency injection (§4.7, §9 design note).
//!
//! The original scans annotated methods at runtime; this crate has no
//! reflection, so each consumer declares its dependencies explicitly via
//! `Injectable::wire`, resolving services out of a `ServiceRegistry` by
//! type (and, for the ambiguous case, by name) — the same two-arity
//! `(service)` / `(service, name)` contract, made explicit instead of
//! discovered.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

struct Entry {
    name: String,
    value: Arc<dyn Any + Send + Sync>,
}

/// Holds every registered service, indexed by concrete type. Registration
/// order is preserved per type so "the one whose registered class matches
/// `T` exactly" resolution (§4.7) is deterministic when there's exactly one
/// candidate.
#[derive(Default)]
pub struct ServiceRegistry {
    by_type: Mutex<HashMap<TypeId, Vec<Entry>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Any + Send + Sync>(&self, name: impl Into<String>, service: Arc<T>) {
        let mut guard = self.by_type.lock().unwrap();
        guard.entry(TypeId::of::<T>()).or_default().push(Entry {
            name: name.into(),
            value: service,
        });
    }

    /// Resolves the single registered instance of `T`. Multiple
    /// implementers of `T` registered under different names is an
    /// ambiguous match unless the caller uses `resolve_named` — §4.7:
    /// "ambiguous matches ... raise a configuration error."
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let guard = self.by_type.lock().unwrap();
        match guard.get(&TypeId::of::<T>()).map(Vec::as_slice) {
            None | Some([]) => Err(Error::ServiceRegistration(format!(
                "no service registered for type {}",
                std::any::type_name::<T>()
            ))),
            Some([entry]) => Ok(entry.value.clone().downcast::<T>().expect("TypeId match guarantees downcast")),
            Some(_) => Err(Error::ServiceRegistration(format!(
                "ambiguous service registration for type {}: use resolve_named",
                std::any::type_name::<T>()
            ))),
        }
    }

    /// Resolves `T` registered under exactly `name`. Unmatched services of
    /// the right type but wrong name return `Ok(None)`, not an error — an
    /// unmatched interface is "silently skipped" per §4.7.
    pub fn resolve_named<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let guard = self.by_type.lock().unwrap();
        guard
            .get(&TypeId::of::<T>())?
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.clone().downcast::<T>().expect("TypeId match guarantees downcast"))
    }
}

/// Implemented by services and processors that need other registered
/// services at boot. `wire` runs once, during the orchestrator's
/// service-injection phase (§4.7), after every service has been registered
/// but before any `init()` call.
pub trait Injectable {
    fn wire(&mut self, registry: &ServiceRegistry) -> Result<()> {
        let _ = registry;
        Ok(())
    }
}

/// A server-managed service (§1 "out of scope" collaborator, §4.7
/// lifecycle participant). Unlike sources/processors — each exclusively
/// owned by one agent — services may be resolved and called concurrently
/// by any wired consumer, so lifecycle hooks take `&self`; implementers
/// that need mutable state synchronize internally (the same shape as
/// `ErrorReporter`, `SchedulerService`, and `AdminCommandRegistry`, which
/// all implement this trait).
pub trait Service: Send + Sync + 'static {
    fn init(&self) {}
    fn start(&self) {}
    fn start_complete(&self) {}
    fn stop(&self) {}
    fn tear_down(&self) {}
}

impl Service for crate::report::ErrorReporter {}
impl Service for crate::scheduler::SchedulerService {}
impl Service for crate::admin::AdminCommandRegistry {}
