//! The object model: types whose members can be observed along a path.
//!
//! An observable type implements [`ObjectType`], which describes its members
//! once through a [`MemberTable`] and declares which change-notification
//! capabilities it supports. Every `ObjectType` is automatically an
//! [`Object`], the object-safe trait the rest of the crate works with through
//! [`ObjectRef`].
//!
//! ```rust
//! use parking_lot::RwLock;
//! use reactive_paths::{
//!     object::{ObjectType, TypeInfo},
//!     reflection::MemberTable,
//!     value::Value,
//! };
//!
//! struct Point {
//!     x: RwLock<i64>,
//! }
//!
//! impl ObjectType for Point {
//!     fn describe(members: &mut MemberTable<Self>) {
//!         members.field(
//!             "x",
//!             |p| Value::from(*p.x.read()),
//!             |p, value| {
//!                 *p.x.write() = value.get()?;
//!                 Ok(())
//!             },
//!         );
//!     }
//! }
//!
//! let info = TypeInfo::of::<Point>();
//! assert!(!info.capabilities().is_reactive());
//! ```

use crate::{
    notify::{NotifyPropertyChanged, NotifyPropertyChanging, ReactiveObject},
    reflection::{MemberDef, MemberTable},
};
use std::{
    any::{Any, TypeId},
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};

/// A shared, type-erased reference to an observable object.
pub type ObjectRef = Arc<dyn Object>;

/// The change-notification conventions a type claims to support.
///
/// These are type-level claims used to score providers. A provider still
/// checks the instance when it subscribes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[must_use]
pub struct Capabilities {
    reactive: bool,
    property_changed: bool,
    property_changing: bool,
}

impl Capabilities {
    /// No native change notification.
    pub const NONE: Self = Self {
        reactive: false,
        property_changed: false,
        property_changing: false,
    };

    /// Raises conventional "property changed" events.
    pub const PROPERTY_CHANGED: Self = Self {
        reactive: false,
        property_changed: true,
        property_changing: false,
    };

    /// Raises conventional "property changing" events.
    pub const PROPERTY_CHANGING: Self = Self {
        reactive: false,
        property_changed: false,
        property_changing: true,
    };

    /// Exposes structured `changing`/`changed` streams. A reactive object is
    /// by construction also a conventional notifier in both directions.
    pub const REACTIVE: Self = Self {
        reactive: true,
        property_changed: true,
        property_changing: true,
    };

    /// Combines two sets of capabilities.
    pub const fn union(self, other: Self) -> Self {
        Self {
            reactive: self.reactive || other.reactive,
            property_changed: self.property_changed || other.property_changed,
            property_changing: self.property_changing
                || other.property_changing,
        }
    }

    /// Whether the type exposes structured change streams.
    pub const fn is_reactive(&self) -> bool {
        self.reactive
    }

    /// Whether the type raises "property changed" events.
    pub const fn notifies_changed(&self) -> bool {
        self.property_changed
    }

    /// Whether the type raises "property changing" events.
    pub const fn notifies_changing(&self) -> bool {
        self.property_changing
    }
}

/// Implemented by every type that can appear along an observed path.
///
/// Only [`describe`](ObjectType::describe) is required. Types that raise
/// change notifications override [`capabilities`](ObjectType::capabilities)
/// and the matching `as_*` accessors, usually by delegating to an embedded
/// [`PropertyNotifier`](crate::notify::PropertyNotifier).
pub trait ObjectType: Any + Send + Sync + Sized {
    /// The name used in diagnostics.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The notification conventions this type supports.
    fn capabilities() -> Capabilities {
        Capabilities::NONE
    }

    /// Registers the fields, properties, indexers and methods of this type.
    fn describe(members: &mut MemberTable<Self>);

    /// The structured change streams of this instance.
    fn as_reactive(&self) -> Option<&dyn ReactiveObject> {
        None
    }

    /// The "property changed" event of this instance.
    fn as_property_changed(&self) -> Option<&dyn NotifyPropertyChanged> {
        None
    }

    /// The "property changing" event of this instance.
    fn as_property_changing(&self) -> Option<&dyn NotifyPropertyChanging> {
        None
    }
}

/// The object-safe view of an [`ObjectType`].
///
/// This trait is implemented for every `ObjectType`; it is not meant to be
/// implemented by hand.
pub trait Object: Any + Send + Sync {
    /// The runtime type of this object.
    fn type_info(&self) -> TypeInfo;

    /// Borrows as [`Any`], for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Converts into a shared [`Any`], for downcasting an [`ObjectRef`].
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// See [`ObjectType::as_reactive`].
    fn as_reactive(&self) -> Option<&dyn ReactiveObject>;

    /// See [`ObjectType::as_property_changed`].
    fn as_property_changed(&self) -> Option<&dyn NotifyPropertyChanged>;

    /// See [`ObjectType::as_property_changing`].
    fn as_property_changing(&self) -> Option<&dyn NotifyPropertyChanging>;
}

impl<T: ObjectType> Object for T {
    fn type_info(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn as_reactive(&self) -> Option<&dyn ReactiveObject> {
        ObjectType::as_reactive(self)
    }

    fn as_property_changed(&self) -> Option<&dyn NotifyPropertyChanged> {
        ObjectType::as_property_changed(self)
    }

    fn as_property_changing(&self) -> Option<&dyn NotifyPropertyChanging> {
        ObjectType::as_property_changing(self)
    }
}

/// Describes a runtime type: its identity, name, capabilities and members.
///
/// Equality and hashing only consider the type's identity.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    capabilities: Capabilities,
    describe: fn() -> Vec<MemberDef>,
}

impl TypeInfo {
    /// The descriptor of `T`.
    pub fn of<T: ObjectType>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::type_name(),
            capabilities: T::capabilities(),
            describe: MemberTable::<T>::collect,
        }
    }

    /// The [`TypeId`] of the described type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The diagnostic name of the described type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The notification conventions the type claims.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Builds a fresh member table. Callers should go through the cached
    /// [`AccessorResolver::members`](crate::reflection::AccessorResolver::members).
    pub(crate) fn describe_members(&self) -> Vec<MemberDef> {
        (self.describe)()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeInfo").field(&self.name).finish()
    }
}
