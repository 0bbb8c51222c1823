//! The path observation engine.
//!
//! A [`PathRuntime`] owns the accessor caches and the provider registry, and
//! turns a root object and a [`Path`] into a stream of changes of the value
//! at the end of the path.
//!
//! Observing `a.b.c` on `root` works link by link. The chain starts with the
//! root itself. For every link, each time the previous link produces a new
//! value, the subscription to the old value is dropped and the link is
//! observed on the new value instead, starting with its current value. A null
//! value produces a single "incomplete" event and observes nothing.

use crate::{
    change::{ChangeEvent, Direction, ObservedChange},
    config::ObserveConfig,
    error::{Error, Result},
    object::{ObjectRef, ObjectType, TypeInfo},
    observable::Observable,
    path::{Link, Path},
    reflection::AccessorResolver,
    registry::{ChangeSourceProvider, ProviderRegistry},
    value::Value,
};
use parking_lot::RwLock;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

static GLOBAL: RwLock<Option<PathRuntime>> = RwLock::new(None);

struct RuntimeInner {
    config: ObserveConfig,
    accessors: AccessorResolver,
    registry: ProviderRegistry,
}

/// Resolves accessors and providers, and observes paths.
///
/// Cloning is cheap: clones share their caches and registry.
#[derive(Clone)]
pub struct PathRuntime {
    inner: Arc<RuntimeInner>,
}

impl Debug for PathRuntime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathRuntime")
            .field("config", &self.inner.config)
            .field("accessors", &self.inner.accessors)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl Default for PathRuntime {
    fn default() -> Self {
        Self::new(ObserveConfig::default())
    }
}

impl PathRuntime {
    /// A runtime with the built-in providers registered.
    pub fn new(config: ObserveConfig) -> Self {
        let registry = ProviderRegistry::with_defaults(&config);
        Self::with_registry(config, registry)
    }

    /// A runtime without any provider.
    pub fn empty(config: ObserveConfig) -> Self {
        let registry = ProviderRegistry::new(config.big_cache_limit);
        Self::with_registry(config, registry)
    }

    fn with_registry(config: ObserveConfig, registry: ProviderRegistry) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                accessors: AccessorResolver::from_config(&config),
                registry,
                config,
            }),
        }
    }

    /// The process-wide runtime, created on first use from the environment
    /// (see [`ObserveConfig::from_env`]).
    pub fn global() -> Self {
        if let Some(runtime) = GLOBAL.read().as_ref() {
            return runtime.clone();
        }
        GLOBAL
            .write()
            .get_or_insert_with(|| {
                let config = ObserveConfig::from_env().unwrap_or_else(|err| {
                    tracing::warn!("using the default configuration: {err}");
                    ObserveConfig::default()
                });
                tracing::debug!(?config, "initializing the global path runtime");
                PathRuntime::new(config)
            })
            .clone()
    }

    /// Replaces the process-wide runtime, returning the previous one.
    pub fn set_global(runtime: PathRuntime) -> Option<PathRuntime> {
        GLOBAL.write().replace(runtime)
    }

    /// Drops the process-wide runtime. The next call to
    /// [`global`](Self::global) creates a fresh one.
    ///
    /// Observations made before the reset keep using the old runtime.
    pub fn reset_global() {
        let previous = GLOBAL.write().take();
        drop(previous);
    }

    /// The configuration this runtime was created with.
    pub fn config(&self) -> &ObserveConfig {
        &self.inner.config
    }

    /// The accessor caches.
    pub fn accessors(&self) -> &AccessorResolver {
        &self.inner.accessors
    }

    /// The provider registry.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    /// Registers an additional provider.
    pub fn register_provider(&self, provider: Arc<dyn ChangeSourceProvider>) {
        self.inner.registry.register(provider);
    }

    /// The raw change stream of `path` on `root`: one event each time the
    /// last link changes or is re-rooted, including incomplete events when
    /// the chain is broken by a null value.
    ///
    /// Unlike [`observe_property`](Self::observe_property), nothing is
    /// validated up front: every failure terminates the stream.
    pub fn observe_chain(
        &self,
        root: ObjectRef,
        path: &Path,
        direction: Direction,
    ) -> Observable<ChangeEvent> {
        let mut chain = Observable::just(ChangeEvent::root(Value::Object(root)));
        for link in path.links() {
            let runtime = self.clone();
            let link = link.clone();
            chain = chain.switch_map(move |parent| {
                runtime.observe_link(&parent, &link, direction)
            });
        }
        chain
    }

    /// Observes the value at the end of `path` on `root`.
    ///
    /// The stream starts with the current value unless `skip_initial` is
    /// set, in which case the first event of the chain is dropped. Only
    /// actual changes of the value are reported afterwards, so the repeated
    /// snapshots of objects without change notification collapse into one.
    /// While an intermediate value is null, nothing is reported.
    ///
    /// # Errors
    /// Reported synchronously: a root that does not match the type the path
    /// is bound to, a first member that cannot be read, and a first member
    /// no provider claims. Faults further down the path, and accessor
    /// faults while observing, terminate the stream instead.
    #[tracing::instrument(level = "trace", skip_all, fields(path = %path))]
    pub fn observe_property(
        &self,
        root: ObjectRef,
        path: &Path,
        direction: Direction,
        skip_initial: bool,
    ) -> Result<Observable<ObservedChange>> {
        let ty = root.type_info();
        if let Some(expected) = path.root_type() {
            if expected != ty {
                return Err(Error::RootTypeMismatch {
                    expected: expected.name(),
                    found: ty.name(),
                });
            }
        }
        let first = path.first();
        self.accessors().getter_or_err(ty, first)?;
        self.provider_for(ty, first, direction)?;

        let chain = self.observe_chain(Arc::clone(&root), path, direction);
        let chain = if skip_initial {
            chain.skip(1)
        } else {
            chain
        };
        let runtime = self.clone();
        let path = path.clone();
        Ok(chain
            .filter(ChangeEvent::is_complete)
            .try_map(move |event| {
                let value = event
                    .fetch_value(runtime.accessors())?
                    .unwrap_or_default();
                Ok(ObservedChange {
                    sender: Arc::clone(&root),
                    path: path.clone(),
                    value,
                })
            })
            .distinct_until_changed_by(|a, b| a.value == b.value))
    }

    /// Observes the value at the end of `path` on `root` after each change,
    /// starting with the current value.
    pub fn observe_value(
        &self,
        root: ObjectRef,
        path: &Path,
    ) -> Result<Observable<Value>> {
        Ok(self
            .observe_property(root, path, Direction::After, false)?
            .map(|change| change.value))
    }

    fn provider_for(
        &self,
        ty: TypeInfo,
        link: &Link,
        direction: Direction,
    ) -> Result<Arc<dyn ChangeSourceProvider>> {
        self.registry()
            .resolve(ty, link, direction)
            .ok_or_else(|| Error::ProviderNotFound {
                type_name: ty.name(),
                member: Arc::clone(link.name()),
            })
    }

    /// The changes of `link` on the value carried by `parent`.
    fn observe_link(
        &self,
        parent: &ChangeEvent,
        link: &Link,
        direction: Direction,
    ) -> Result<Observable<ChangeEvent>> {
        let sender = match parent.fetch_value(self.accessors())? {
            Some(Value::Object(sender)) => sender,
            Some(Value::Null) | None => {
                tracing::trace!(member = %link.name(), "chain is incomplete");
                return Ok(Observable::just(ChangeEvent::incomplete(
                    link.clone(),
                )));
            }
            Some(other) => {
                return Err(Error::MissingMember {
                    type_name: other.kind(),
                    member: Arc::clone(link.name()),
                })
            }
        };
        let ty = sender.type_info();
        tracing::trace!(ty = ty.name(), member = %link.name(), "re-rooting");

        let provider = self.provider_for(ty, link, direction)?;
        let current = self.accessors().get_value(sender.as_ref(), link)?;
        let kick =
            ChangeEvent::new(Arc::clone(&sender), link.clone()).with_value(current);

        let runtime = self.clone();
        Ok(provider
            .observe(&sender, link, direction)
            .try_map(move |event| {
                Ok(match event.fetch_value(runtime.accessors())? {
                    Some(value) => event.with_value(value),
                    None => event,
                })
            })
            .start_with(kick))
    }
}

/// Observation of typed objects through the global [`PathRuntime`].
///
/// ```rust
/// use parking_lot::{Mutex, RwLock};
/// use reactive_paths::prelude::*;
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Counter {
///     count: RwLock<i64>,
///     notifier: PropertyNotifier,
/// }
///
/// impl ObjectType for Counter {
///     fn capabilities() -> Capabilities {
///         Capabilities::REACTIVE
///     }
///
///     fn describe(members: &mut MemberTable<Self>) {
///         members.readonly_field("count", |c| Value::from(*c.count.read()));
///     }
///
///     fn as_reactive(&self) -> Option<&dyn ReactiveObject> {
///         Some(&self.notifier)
///     }
/// }
///
/// let counter = Arc::new(Counter::default());
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let _sub = counter.observe_value("count").unwrap().subscribe({
///     let seen = Arc::clone(&seen);
///     move |value| seen.lock().push(value)
/// });
/// let changes = Arc::new(Mutex::new(Vec::new()));
/// let _changes = counter.observe_property("count").unwrap().subscribe({
///     let changes = Arc::clone(&changes);
///     move |change| changes.lock().push(change.value)
/// });
/// counter.notifier.set_if_changed(&counter.count, "count", 1);
///
/// // only the value stream starts with the current value
/// assert_eq!(*seen.lock(), vec![Value::from(0), Value::from(1)]);
/// assert_eq!(*changes.lock(), vec![Value::from(1)]);
/// ```
pub trait ObserveExt {
    /// Observes `path` after each change. The current value is not
    /// reported.
    fn observe_property(&self, path: &str) -> Result<Observable<ObservedChange>> {
        self.observe_property_with(path, Direction::After, true)
    }

    /// Observes `path` in the given direction.
    fn observe_property_with(
        &self,
        path: &str,
        direction: Direction,
        skip_initial: bool,
    ) -> Result<Observable<ObservedChange>>;

    /// Observes the value at the end of `path`, starting with the current
    /// value.
    fn observe_value(&self, path: &str) -> Result<Observable<Value>> {
        Ok(self
            .observe_property_with(path, Direction::After, false)?
            .map(|change| change.value))
    }
}

impl<T: ObjectType> ObserveExt for Arc<T> {
    fn observe_property_with(
        &self,
        path: &str,
        direction: Direction,
        skip_initial: bool,
    ) -> Result<Observable<ObservedChange>> {
        let path = Path::parse(path)?.bind_root(TypeInfo::of::<T>());
        let root: ObjectRef = Arc::clone(self) as ObjectRef;
        PathRuntime::global().observe_property(root, &path, direction, skip_initial)
    }
}
