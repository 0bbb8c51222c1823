//! Observe changes along property paths of objects, whatever change
//! notification mechanism each object along the path uses.
//!
//! Given a root object and a path such as `child.Items[0].name`, the
//! [`PathRuntime`](runtime::PathRuntime) produces a single stream that emits
//! the value at the end of the path whenever it changes. When an
//! intermediate object is replaced, observation automatically moves to the
//! new object and stops watching the old one.
//!
//! Objects differ in how they announce changes. Each link is observed
//! through the [`ChangeSourceProvider`](registry::ChangeSourceProvider) that
//! claims the highest affinity for it:
//! 1. **Reactive objects** expose structured `changing`/`changed` streams
//!    ([`ReactiveObject`](notify::ReactiveObject)).
//! 2. **Conventional notifiers** raise "property changing" and "property
//!    changed" events ([`NotifyPropertyChanged`](notify::NotifyPropertyChanged)).
//! 3. **Plain objects** do not notify at all. Their current value is reported
//!    once and a warning is logged.
//!
//! Further providers can be registered at runtime.
//!
//! ```rust
//! use parking_lot::{Mutex, RwLock};
//! use reactive_paths::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Person {
//!     name: RwLock<String>,
//!     notifier: PropertyNotifier,
//! }
//!
//! #[derive(Default)]
//! struct Team {
//!     lead: RwLock<Option<Arc<Person>>>,
//!     notifier: PropertyNotifier,
//! }
//!
//! impl ObjectType for Person {
//!     fn capabilities() -> Capabilities {
//!         Capabilities::REACTIVE
//!     }
//!
//!     fn describe(members: &mut MemberTable<Self>) {
//!         members.readonly_field("name", |p| Value::from(p.name.read().clone()));
//!     }
//!
//!     fn as_reactive(&self) -> Option<&dyn ReactiveObject> {
//!         Some(&self.notifier)
//!     }
//! }
//!
//! impl ObjectType for Team {
//!     fn capabilities() -> Capabilities {
//!         Capabilities::REACTIVE
//!     }
//!
//!     fn describe(members: &mut MemberTable<Self>) {
//!         members.readonly_field("lead", |t| Value::from(t.lead.read().clone()));
//!     }
//!
//!     fn as_reactive(&self) -> Option<&dyn ReactiveObject> {
//!         Some(&self.notifier)
//!     }
//! }
//!
//! let team = Arc::new(Team::default());
//! let names = Arc::new(Mutex::new(Vec::new()));
//! let _subscription = team.observe_value("lead.name").unwrap().subscribe({
//!     let names = Arc::clone(&names);
//!     move |name| names.lock().push(name.to_string())
//! });
//!
//! // nothing is reported while the lead is missing
//! let ada = Arc::new(Person::default());
//! *ada.name.write() = "Ada".into();
//! *team.lead.write() = Some(Arc::clone(&ada));
//! team.notifier.raise_property_changed("lead");
//!
//! ada.notifier.set_if_changed(&ada.name, "name", "Ada L.".to_string());
//! assert_eq!(*names.lock(), ["Ada", "Ada L."]);
//! ```
//!
//! ## Threading
//! Nothing is spawned. Events are delivered on the thread that raised them,
//! and no internal lock is held while user code runs, so handlers may freely
//! change observed objects.
//!
//! ## Logging
//! The crate logs through [`tracing`] and never installs a subscriber.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod change;
pub mod config;
pub mod error;
pub mod notify;
pub mod object;
pub mod observable;
pub mod path;
pub mod providers;
pub mod reflection;
pub mod registry;
pub mod runtime;
pub mod value;

pub use error::{Error, Result};

/// Reexports frequently-used types and traits.
pub mod prelude {
    pub use crate::{
        change::{ChangeEvent, Direction, ObservedChange},
        error::{Error, Result},
        notify::{
            NotifyPropertyChanged, NotifyPropertyChanging, PropertyChangeArgs,
            PropertyNotifier, ReactiveObject,
        },
        object::{Capabilities, Object, ObjectRef, ObjectType, TypeInfo},
        observable::{EventSource, Observable, Subscription},
        path::{Link, Path},
        reflection::MemberTable,
        registry::ChangeSourceProvider,
        runtime::{ObserveExt, PathRuntime},
        value::Value,
    };
}
