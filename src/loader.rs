//! Bridges callback-style async loads to a property-level completion.
//!
//! An [`AsyncLoader`] names the property being loaded and owns a factory
//! closure that starts the work. The closure captures whatever parameters the
//! work needs, so there is no fixed-arity variant per parameter count.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::graph::Mobile;
use crate::portal::{Criteria, DataPortal};
use crate::visitor::MobileType;

type Notify<T> = Box<dyn FnOnce(&str, Result<T>) + Send>;

/// One-shot notifier handed to a loader factory.
///
/// [`Completion::complete`] consumes it, so a load reports at most once. If
/// the factory drops it instead, nobody is notified.
pub struct Completion<T> {
    property: Arc<str>,
    notify: Notify<T>,
    _pending: Option<PendingLoad>,
}

impl<T> Completion<T> {
    /// Property this load fills.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Reports the outcome.
    pub fn complete(self, outcome: Result<T>) {
        let Self {
            property,
            notify,
            _pending,
        } = self;
        drop(_pending);
        notify(&property, outcome);
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("property", &self.property)
            .finish_non_exhaustive()
    }
}

type Factory<T> = Arc<dyn Fn(Completion<T>) + Send + Sync>;

/// Loads one property value asynchronously.
///
/// ```rust
/// use graphportal::AsyncLoader;
///
/// let loader = AsyncLoader::new("Total", |done| done.complete(Ok(40 + 2)));
/// loader.load(|property, outcome| {
///     assert_eq!(property, "Total");
///     assert_eq!(outcome.ok(), Some(42));
/// });
/// ```
pub struct AsyncLoader<T> {
    property: Arc<str>,
    factory: Factory<T>,
}

impl<T> Clone for AsyncLoader<T> {
    fn clone(&self) -> Self {
        Self {
            property: Arc::clone(&self.property),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T: Send + 'static> AsyncLoader<T> {
    /// Creates a loader for `property` that starts work through `factory`.
    pub fn new<F>(property: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Completion<T>) + Send + Sync + 'static,
    {
        Self {
            property: Arc::from(property.into()),
            factory: Arc::new(factory),
        }
    }

    /// Property this loader fills.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Starts one load. `on_complete` runs at most once with `(property, outcome)`.
    pub fn load<F>(&self, on_complete: F)
    where
        F: FnOnce(&str, Result<T>) + Send + 'static,
    {
        self.start(on_complete, None);
    }

    fn start<F>(&self, on_complete: F, pending: Option<PendingLoad>)
    where
        F: FnOnce(&str, Result<T>) + Send + 'static,
    {
        log::trace!("loading property {}", self.property);
        (self.factory)(Completion {
            property: Arc::clone(&self.property),
            notify: Box::new(on_complete),
            _pending: pending,
        });
    }
}

impl<T: MobileType> AsyncLoader<Mobile<T>> {
    /// A loader that fetches a `T` through `portal`.
    pub fn from_fetch(property: impl Into<String>, portal: DataPortal<T>, criteria: Criteria) -> Self {
        Self::new(property, move |done: Completion<Mobile<T>>| {
            portal.begin_fetch(criteria.clone(), move |outcome| done.complete(outcome));
        })
    }

    /// A loader that creates a `T` through `portal`.
    pub fn from_create(
        property: impl Into<String>,
        portal: DataPortal<T>,
        criteria: Criteria,
    ) -> Self {
        Self::new(property, move |done: Completion<Mobile<T>>| {
            portal.begin_create(criteria.clone(), move |outcome| done.complete(outcome));
        })
    }
}

impl<T> fmt::Debug for AsyncLoader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLoader")
            .field("property", &self.property)
            .finish_non_exhaustive()
    }
}

/// Decrements the outstanding count when the load ends, completed or dropped.
struct PendingLoad {
    outstanding: Arc<AtomicUsize>,
}

impl Drop for PendingLoad {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Tracks the outstanding loads of one business object.
///
/// An object with outstanding loads reports itself busy.
#[derive(Debug, Clone, Default)]
pub struct LoadManager {
    outstanding: Arc<AtomicUsize>,
}

impl LoadManager {
    /// Creates a manager with nothing loading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `loader` and counts it until its completion runs or is dropped.
    pub fn start<T, F>(&self, loader: &AsyncLoader<T>, on_complete: F)
    where
        T: Send + 'static,
        F: FnOnce(&str, Result<T>) + Send + 'static,
    {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        loader.start(
            on_complete,
            Some(PendingLoad {
                outstanding: Arc::clone(&self.outstanding),
            }),
        );
    }

    /// Returns true while any load is outstanding.
    pub fn is_loading(&self) -> bool {
        self.outstanding() > 0
    }

    /// Number of outstanding loads.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}
